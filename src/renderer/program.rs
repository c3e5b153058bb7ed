//! Shader programs: one pipeline per drawing variant and target format.

use bitflags::bitflags;
use wgpu::{BindGroupLayout, Device, PipelineLayout, RenderPipeline, Sampler, ShaderModule, TextureFormat};

use crate::math::{Mat4, Vec4};

const SHADER_SOURCE: &str = include_str!("shader.wgsl");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Solid,
    Texture,
    AlphaTexture,
    ColorFilter,
    Blur,
    Shadow,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 6] = [
        ProgramKind::Solid,
        ProgramKind::Texture,
        ProgramKind::AlphaTexture,
        ProgramKind::ColorFilter,
        ProgramKind::Blur,
        ProgramKind::Shadow,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Dirty bit tracking whether this program's projection is stale.
    pub fn update_bit(self) -> ProgramUpdate {
        match self {
            ProgramKind::Solid => ProgramUpdate::SOLID,
            ProgramKind::Texture => ProgramUpdate::TEXTURE,
            ProgramKind::AlphaTexture => ProgramUpdate::ALPHA_TEXTURE,
            ProgramKind::ColorFilter => ProgramUpdate::COLOR_FILTER,
            ProgramKind::Blur => ProgramUpdate::BLUR,
            ProgramKind::Shadow => ProgramUpdate::SHADOW,
        }
    }

    /// Whether the program samples a source texture.
    pub fn is_textured(self) -> bool {
        !matches!(self, ProgramKind::Solid)
    }

    fn fragment_entry(self) -> &'static str {
        match self {
            ProgramKind::Solid => "fs_solid",
            ProgramKind::Texture => "fs_texture",
            ProgramKind::AlphaTexture => "fs_alpha_texture",
            ProgramKind::ColorFilter => "fs_color_filter",
            ProgramKind::Blur => "fs_blur",
            ProgramKind::Shadow => "fs_shadow",
        }
    }
}

bitflags! {
    /// Programs whose projection uniform must be re-uploaded on next use.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ProgramUpdate: u8 {
        const SOLID = 0x01;
        const TEXTURE = 0x02;
        const ALPHA_TEXTURE = 0x04;
        const COLOR_FILTER = 0x08;
        const BLUR = 0x10;
        const SHADOW = 0x20;
    }
}

/// Vertex of a quad; texture coordinates follow the corner order.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

impl QuadVertex {
    /// Texture coordinates for top-left, bottom-left, top-right, bottom-right.
    pub const TEX_COORDS: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Per-draw uniform block, bound with a dynamic offset.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    pub projection: [[f32; 4]; 4],
    pub color_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub params: [f32; 4],
    pub blur: [f32; 4],
}

impl DrawUniforms {
    pub fn new(projection: &Mat4) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            color_matrix: Mat4::IDENTITY.to_cols_array_2d(),
            color: Vec4::ONE.to_array(),
            params: [1.0, 0.0, 0.0, 0.0],
            blur: [0.0; 4],
        }
    }
}

/// Compiled pipelines plus the layouts and sampler they share.
pub struct Programs {
    shader: ShaderModule,
    pub uniform_layout: BindGroupLayout,
    pub texture_layout: BindGroupLayout,
    pub sampler: Sampler,
    solid_layout: PipelineLayout,
    textured_layout: PipelineLayout,
    pipelines: Vec<(TextureFormat, Vec<RenderPipeline>)>,
}

impl Programs {
    pub fn new(device: &Device, formats: &[TextureFormat]) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lamina Quad Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lamina Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lamina Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Lamina Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let solid_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lamina Solid Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout],
            immediate_size: 0,
        });

        let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lamina Textured Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        let mut programs = Self {
            shader,
            uniform_layout,
            texture_layout,
            sampler,
            solid_layout,
            textured_layout,
            pipelines: Vec::new(),
        };
        for &format in formats {
            programs.ensure_format(device, format);
        }
        programs
    }

    /// Compile every program for `format` unless already done.
    pub fn ensure_format(&mut self, device: &Device, format: TextureFormat) {
        if self.pipelines.iter().any(|(f, _)| *f == format) {
            return;
        }
        let pipelines = ProgramKind::ALL
            .iter()
            .map(|&kind| self.create_pipeline(device, kind, format))
            .collect();
        log::debug!("Compiled programs for {:?}", format);
        self.pipelines.push((format, pipelines));
    }

    pub fn pipeline(&self, format: TextureFormat, kind: ProgramKind) -> Option<&RenderPipeline> {
        self.pipelines
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, pipelines)| &pipelines[kind.index()])
    }

    fn create_pipeline(
        &self,
        device: &Device,
        kind: ProgramKind,
        format: TextureFormat,
    ) -> RenderPipeline {
        let layout = if kind.is_textured() {
            &self.textured_layout
        } else {
            &self.solid_layout
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(kind.fragment_entry()),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[QuadVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some(kind.fragment_entry()),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }
}
