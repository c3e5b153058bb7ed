/// Renderer configuration.
///
/// ```ignore
/// let config = RendererConfig::default()
///     .with_clear_color([0.1, 0.1, 0.1, 1.0])
///     .with_default_far_plane(800.0);
/// ```
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Color the surface is cleared to before each frame
    pub clear_color: [f64; 4],
    /// Far plane used when an out-of-plane transform starts a projection
    /// group without an explicit projection depth
    pub default_far_plane: f32,
    /// Format of pooled layer textures
    pub layer_format: wgpu::TextureFormat,
    /// Upper bound for blur and shadow kernel radii, in pixels
    pub max_blur_radius: u32,
    /// Adapter preference used by [`GpuContext`](crate::renderer::GpuContext)
    pub power_preference: wgpu::PowerPreference,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            default_far_plane: 1000.0,
            layer_format: wgpu::TextureFormat::Rgba8Unorm,
            max_blur_radius: 64,
            power_preference: wgpu::PowerPreference::LowPower,
        }
    }
}

impl RendererConfig {
    pub fn with_clear_color(mut self, color: [f64; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_default_far_plane(mut self, far_plane: f32) -> Self {
        self.default_far_plane = far_plane;
        self
    }

    pub fn with_layer_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.layer_format = format;
        self
    }

    pub fn with_max_blur_radius(mut self, radius: u32) -> Self {
        self.max_blur_radius = radius;
        self
    }

    pub fn with_power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }
}
