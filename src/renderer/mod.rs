//! GPU rendering of a [`Scene`].
//!
//! A frame runs in three steps. The [prepass](prepass) sizes the frame and
//! decides which subtrees become layers or projection groups, the
//! [builder](builder) turns the tree into screen-space quads and elements,
//! and the [executor](executor) issues draws against a [`DrawBackend`]. The
//! [`Renderer`] ties these to the wgpu backend and a surface.

pub mod backend;
pub mod builder;
pub mod executor;
mod gpu_context;
pub mod prepass;
pub mod program;
pub mod texture_pool;

use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use wgpu::{Device, Queue};

use crate::config::RendererConfig;
use crate::error::{Error, Result};
use crate::math::Vec2;
use crate::render_stats::FrameStats;
use crate::scene::{NodeId, Scene};

pub use backend::WgpuBackend;
pub use builder::{Element, FrameGeometry};
pub use executor::{execute_frame, BlurPass, DrawBackend};
pub use gpu_context::{GpuContext, SurfaceState};
pub use program::ProgramKind;
pub use texture_pool::{PoolStats, TextureId, TexturePool, TextureStorage};

/// Format of offscreen targets and uploaded textures.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A texture frames can be rendered into and read back from.
pub struct OffscreenTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

pub struct Renderer {
    backend: WgpuBackend,
    pool: TexturePool,
    config: RendererConfig,
    last_stats: FrameStats,
}

impl Renderer {
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        target_format: wgpu::TextureFormat,
        config: RendererConfig,
    ) -> Self {
        let backend = WgpuBackend::new(device, queue, target_format, config.layer_format);
        log::info!(
            "Created renderer for {:?} targets with {:?} layers",
            target_format,
            config.layer_format
        );
        Self {
            backend,
            pool: TexturePool::new(),
            config,
            last_stats: FrameStats::default(),
        }
    }

    pub fn from_context(
        context: &GpuContext,
        target_format: wgpu::TextureFormat,
        config: RendererConfig,
    ) -> Self {
        Self::new(
            context.device.clone(),
            context.queue.clone(),
            target_format,
            config,
        )
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Counters of the most recently rendered frame.
    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Render the scene into the surface's next texture and present it.
    /// Returns false when nothing was presented.
    pub fn render(&mut self, scene: &Scene, surface: &mut SurfaceState) -> bool {
        let Some(root) = scene.root() else {
            return false;
        };
        if surface.width() == 0 || surface.height() == 0 {
            return false;
        }

        let output = match surface.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost) => {
                log::warn!("Surface lost, reconfiguring");
                surface.reconfigure();
                return false;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of GPU memory");
                return false;
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                return false;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let size = Vec2::new(surface.width() as f32, surface.height() as f32);
        self.draw(scene, root, view, surface.format(), size);
        output.present();
        true
    }

    /// Render the scene into an offscreen target. Returns false when the
    /// scene has no root.
    pub fn render_offscreen(&mut self, scene: &Scene, target: &OffscreenTarget) -> bool {
        let Some(root) = scene.root() else {
            return false;
        };
        let size = Vec2::new(target.width as f32, target.height as f32);
        self.draw(scene, root, target.view.clone(), OFFSCREEN_FORMAT, size);
        true
    }

    /// Call once the rendered frame has been presented. Drops the storage of
    /// idle layer textures.
    pub fn frame_swapped(&mut self) {
        self.pool.compact(&mut self.backend);
    }

    fn draw(
        &mut self,
        scene: &Scene,
        root: NodeId,
        view: wgpu::TextureView,
        format: wgpu::TextureFormat,
        size: Vec2,
    ) {
        let [r, g, b, a] = self.config.clear_color;
        self.backend
            .begin_frame(view, format, wgpu::Color { r, g, b, a });
        let stats = execute_frame(
            scene,
            root,
            size,
            &mut self.backend,
            &mut self.pool,
            &self.config,
        );
        self.backend.finish_frame();

        stats.log();
        self.last_stats = stats;
    }

    pub fn create_offscreen_target(&self, width: u32, height: u32) -> OffscreenTarget {
        let width = width.max(1);
        let height = height.max(1);
        let texture = self
            .backend
            .device()
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Lamina Offscreen Target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: OFFSCREEN_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        OffscreenTarget {
            texture,
            view,
            width,
            height,
        }
    }

    /// Copy a region of `target` back to the CPU. Pixels are premultiplied.
    pub fn read_pixels(
        &self,
        target: &OffscreenTarget,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage> {
        if !region_fits(x, y, width, height, target.width, target.height) {
            return Err(Error::Readback(format!(
                "region {}x{} at ({}, {}) outside {}x{} target",
                width, height, x, y, target.width, target.height
            )));
        }

        let device = self.backend.device();
        let queue = self.backend.queue();

        let row_bytes = width * 4;
        let padded_row_bytes = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lamina Readback Buffer"),
            size: padded_row_bytes as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Lamina Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| Error::Readback(format!("device poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| Error::Readback("map callback dropped".to_string()))?
            .map_err(|e| Error::Readback(format!("buffer map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
        for row in 0..height as usize {
            let start = row * padded_row_bytes as usize;
            pixels.extend_from_slice(&mapped[start..start + row_bytes as usize]);
        }
        drop(mapped);
        buffer.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| Error::Readback("pixel buffer size mismatch".to_string()))
    }

    /// Upload straight-alpha RGBA pixels as a texture for
    /// [`TextureNode`](crate::scene::TextureNode)s.
    pub fn create_texture_from_image(&mut self, image: &RgbaImage) -> Result<TextureId> {
        self.create_texture_from_pixels(image.width(), image.height(), image.as_raw(), false)
    }

    /// Decode an image file and upload it.
    pub fn create_texture_from_file(&mut self, path: impl AsRef<Path>) -> Result<TextureId> {
        let image = image::open(path)?.to_rgba8();
        self.create_texture_from_image(&image)
    }

    /// Upload tightly packed RGBA8 pixels. Straight alpha is premultiplied
    /// before upload.
    pub fn create_texture_from_pixels(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
        premultiplied: bool,
    ) -> Result<TextureId> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidTexture(format!(
                "empty texture {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::InvalidTexture(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }

        let texture = self.backend.create_texture();
        if premultiplied {
            self.backend.upload_texture(texture, width, height, pixels);
        } else {
            let mut data = pixels.to_vec();
            premultiply(&mut data);
            self.backend.upload_texture(texture, width, height, &data);
        }
        log::debug!("Uploaded texture {:?} ({}x{})", texture, width, height);
        Ok(texture)
    }

    pub fn destroy_texture(&mut self, texture: TextureId) {
        self.backend.destroy_texture(texture);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.pool.clear(&mut self.backend);
    }
}

/// Whether a non-empty `width`x`height` region at (`x`, `y`) lies inside a
/// `target_width`x`target_height` target.
fn region_fits(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
) -> bool {
    let fits = |start: u32, len: u32, limit: u32| {
        len > 0 && start.checked_add(len).is_some_and(|end| end <= limit)
    };
    fits(x, width, target_width) && fits(y, height, target_height)
}

/// Multiply color channels by alpha in place.
pub fn premultiply(rgba: &mut [u8]) {
    for pixel in rgba.chunks_exact_mut(4) {
        let alpha = pixel[3] as u32;
        for channel in &mut pixel[..3] {
            *channel = ((*channel as u32 * alpha + 127) / 255) as u8;
        }
    }
}
