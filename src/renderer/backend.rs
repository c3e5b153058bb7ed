//! wgpu implementation of [`DrawBackend`].
//!
//! Draw calls are recorded during execution and encoded in one go by
//! [`WgpuBackend::finish_frame`]. Each render target switch closes the
//! current segment; every segment becomes its own render pass, in recording
//! order, so a layer is always fully written before the pass that samples
//! it. Each draw gets its own uniform record (bound with a dynamic offset)
//! stamped with the projection its program had when the draw was recorded.

use std::sync::Arc;

use wgpu::{BindGroup, Buffer, BufferUsages, Device, Queue, TextureFormat, TextureView};

use crate::math::{Mat4, Vec2, Vec4};
use crate::renderer::executor::{BlurPass, DrawBackend};
use crate::renderer::program::{DrawUniforms, ProgramKind, Programs, QuadVertex};
use crate::renderer::texture_pool::{TextureId, TextureStorage};

const INITIAL_VERTEX_CAPACITY: usize = 256;
const INITIAL_UNIFORM_CAPACITY: usize = 64;

/// Usages shared by every texture slot: layers are rendered into and
/// sampled, uploaded images are copied into.
const SLOT_USAGES: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::COPY_SRC);

struct Backing {
    texture: wgpu::Texture,
    view: TextureView,
    width: u32,
    height: u32,
}

struct TextureSlot {
    format: TextureFormat,
    backing: Option<Backing>,
}

struct DrawCall {
    program: ProgramKind,
    first_vertex: u32,
    uniform_index: u32,
    texture: Option<TextureView>,
}

struct Segment {
    /// None when the layer being drawn has no storage; its draws are dropped.
    target: Option<(TextureView, TextureFormat)>,
    load: wgpu::LoadOp<wgpu::Color>,
    draws: Vec<DrawCall>,
}

pub struct WgpuBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    programs: Programs,
    layer_format: TextureFormat,

    slots: Vec<Option<TextureSlot>>,
    free_slots: Vec<u32>,

    vertex_buffer: Buffer,
    vertex_capacity: usize,
    uniform_buffer: Buffer,
    uniform_capacity: usize,
    uniform_stride: u64,
    uniform_bind_group: BindGroup,

    // Per-frame recording
    vertices: Vec<Vec2>,
    uniforms: Vec<DrawUniforms>,
    segments: Vec<Segment>,
    targets: Vec<Option<(TextureView, TextureFormat)>>,
    active_program: ProgramKind,
    projections: [Mat4; ProgramKind::ALL.len()],
}

impl WgpuBackend {
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        target_format: TextureFormat,
        layer_format: TextureFormat,
    ) -> Self {
        let programs = Programs::new(&device, &[target_format, layer_format]);

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let uniform_stride = align_to(std::mem::size_of::<DrawUniforms>() as u64, alignment);

        let vertex_buffer = create_vertex_buffer(&device, INITIAL_VERTEX_CAPACITY);
        let uniform_buffer =
            create_uniform_buffer(&device, INITIAL_UNIFORM_CAPACITY, uniform_stride);
        let uniform_bind_group = create_uniform_bind_group(&device, &programs, &uniform_buffer);

        Self {
            device,
            queue,
            programs,
            layer_format,
            slots: Vec::new(),
            free_slots: Vec::new(),
            vertex_buffer,
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
            uniform_buffer,
            uniform_capacity: INITIAL_UNIFORM_CAPACITY,
            uniform_stride,
            uniform_bind_group,
            vertices: Vec::new(),
            uniforms: Vec::new(),
            segments: Vec::new(),
            targets: Vec::new(),
            active_program: ProgramKind::Solid,
            projections: [Mat4::IDENTITY; ProgramKind::ALL.len()],
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Start recording a frame that draws into `view`.
    pub fn begin_frame(&mut self, view: TextureView, format: TextureFormat, clear: wgpu::Color) {
        self.programs.ensure_format(&self.device, format);
        self.vertices.clear();
        self.uniforms.clear();
        self.segments.clear();
        self.targets.clear();

        let target = Some((view, format));
        self.targets.push(target.clone());
        self.segments.push(Segment {
            target,
            load: wgpu::LoadOp::Clear(clear),
            draws: Vec::new(),
        });
    }

    /// Upload the recorded frame and submit it.
    pub fn finish_frame(&mut self) {
        if self.targets.len() > 1 {
            log::warn!("Frame finished with {} open layers", self.targets.len() - 1);
        }

        self.upload_vertices();
        self.upload_uniforms();

        // Bind groups must outlive the passes that use them.
        let bind_groups: Vec<Vec<Option<BindGroup>>> = self
            .segments
            .iter()
            .map(|segment| {
                segment
                    .draws
                    .iter()
                    .map(|draw| {
                        draw.texture
                            .as_ref()
                            .map(|view| self.create_texture_bind_group(view))
                    })
                    .collect()
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lamina Frame Encoder"),
            });

        for (segment, bind_groups) in self.segments.iter().zip(&bind_groups) {
            let Some((view, format)) = &segment.target else {
                continue;
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Lamina Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: segment.load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if segment.draws.is_empty() {
                continue;
            }
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));

            for (draw, texture_bind_group) in segment.draws.iter().zip(bind_groups) {
                let Some(pipeline) = self.programs.pipeline(*format, draw.program) else {
                    log::warn!("No {:?} pipeline for {:?}", draw.program, format);
                    continue;
                };
                render_pass.set_pipeline(pipeline);
                let offset = (draw.uniform_index as u64 * self.uniform_stride) as u32;
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
                if let Some(bind_group) = texture_bind_group {
                    render_pass.set_bind_group(1, bind_group, &[]);
                }
                render_pass.draw(draw.first_vertex..draw.first_vertex + 4, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.segments.clear();
        self.targets.clear();
    }

    /// Copy premultiplied RGBA8 pixels into `texture`, replacing its storage.
    pub fn upload_texture(&mut self, texture: TextureId, width: u32, height: u32, pixels: &[u8]) {
        if let Some(slot) = self.slot_mut(texture) {
            slot.format = TextureFormat::Rgba8Unorm;
        }
        self.resize_texture(texture, width, height);
        let Some(backing) = self.slot(texture).and_then(|slot| slot.backing.as_ref()) else {
            return;
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &backing.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Size of the storage behind `texture`, if it has any.
    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.slot(texture)
            .and_then(|slot| slot.backing.as_ref())
            .map(|backing| (backing.width, backing.height))
    }

    fn slot(&self, texture: TextureId) -> Option<&TextureSlot> {
        self.slots.get(texture.0 as usize).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, texture: TextureId) -> Option<&mut TextureSlot> {
        self.slots.get_mut(texture.0 as usize).and_then(Option::as_mut)
    }

    fn texture_view(&self, texture: TextureId) -> Option<TextureView> {
        self.slot(texture)
            .and_then(|slot| slot.backing.as_ref())
            .map(|backing| backing.view.clone())
    }

    fn record(&mut self, quad: u32, texture: Option<TextureId>, uniforms: DrawUniforms) {
        let texture = match texture {
            Some(id) => match self.texture_view(id) {
                Some(view) => Some(view),
                None => {
                    log::trace!("Dropping draw of texture {:?} without storage", id);
                    return;
                }
            },
            None => None,
        };

        let uniform_index = self.uniforms.len() as u32;
        self.uniforms.push(uniforms);
        let draw = DrawCall {
            program: self.active_program,
            first_vertex: quad,
            uniform_index,
            texture,
        };
        if let Some(segment) = self.segments.last_mut() {
            segment.draws.push(draw);
        }
    }

    fn uniforms(&self) -> DrawUniforms {
        DrawUniforms::new(&self.projections[self.active_program.index()])
    }

    fn upload_vertices(&mut self) {
        if self.vertices.len() > self.vertex_capacity {
            self.vertex_capacity = self.vertices.len().next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.device, self.vertex_capacity);
        }
        if self.vertices.is_empty() {
            return;
        }

        let data: Vec<QuadVertex> = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, v)| QuadVertex {
                position: v.to_array(),
                tex_coord: QuadVertex::TEX_COORDS[i % 4],
            })
            .collect();
        self.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&data));
    }

    fn upload_uniforms(&mut self) {
        if self.uniforms.len() > self.uniform_capacity {
            self.uniform_capacity = self.uniforms.len().next_power_of_two();
            self.uniform_buffer =
                create_uniform_buffer(&self.device, self.uniform_capacity, self.uniform_stride);
            self.uniform_bind_group =
                create_uniform_bind_group(&self.device, &self.programs, &self.uniform_buffer);
        }
        if self.uniforms.is_empty() {
            return;
        }

        let stride = self.uniform_stride as usize;
        let mut data = vec![0u8; stride * self.uniforms.len()];
        for (chunk, uniforms) in data.chunks_exact_mut(stride).zip(&self.uniforms) {
            let bytes = bytemuck::bytes_of(uniforms);
            chunk[..bytes.len()].copy_from_slice(bytes);
        }
        self.queue.write_buffer(&self.uniform_buffer, 0, &data);
    }

    fn create_texture_bind_group(&self, view: &TextureView) -> BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lamina Texture Bind Group"),
            layout: &self.programs.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.programs.sampler),
                },
            ],
        })
    }

    fn push_segment(
        &mut self,
        target: Option<(TextureView, TextureFormat)>,
        load: wgpu::LoadOp<wgpu::Color>,
    ) {
        self.segments.push(Segment {
            target,
            load,
            draws: Vec::new(),
        });
    }
}

impl TextureStorage for WgpuBackend {
    fn create_texture(&mut self) -> TextureId {
        let slot = TextureSlot {
            format: self.layer_format,
            backing: None,
        };
        match self.free_slots.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(slot);
                TextureId(index)
            }
            None => {
                self.slots.push(Some(slot));
                TextureId(self.slots.len() as u32 - 1)
            }
        }
    }

    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        let device = self.device.clone();
        // Oversized layers are rendered at reduced resolution.
        let max = device.limits().max_texture_dimension_2d;
        let (width, height) = (width.min(max), height.min(max));
        let Some(slot) = self.slot_mut(texture) else {
            log::warn!("Resizing unknown texture {:?}", texture);
            return;
        };

        if width == 0 || height == 0 {
            slot.backing = None;
            return;
        }
        if let Some(backing) = &slot.backing {
            if backing.width == width && backing.height == height {
                return;
            }
        }

        let new_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Lamina Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: slot.format,
            usage: SLOT_USAGES,
            view_formats: &[],
        });
        let view = new_texture.create_view(&wgpu::TextureViewDescriptor::default());
        slot.backing = Some(Backing {
            texture: new_texture,
            view,
            width,
            height,
        });
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.slots.get_mut(texture.0 as usize) {
            if slot.take().is_some() {
                self.free_slots.push(texture.0);
            }
        }
    }
}

impl DrawBackend for WgpuBackend {
    fn set_vertices(&mut self, vertices: &[Vec2]) {
        self.vertices.clear();
        self.vertices.extend_from_slice(vertices);
    }

    fn bind_program(&mut self, program: ProgramKind) {
        self.active_program = program;
    }

    fn upload_projection(&mut self, program: ProgramKind, projection: &Mat4) {
        self.projections[program.index()] = *projection;
    }

    fn begin_layer(&mut self, texture: TextureId) {
        let target = self.slot(texture).and_then(|slot| {
            slot.backing
                .as_ref()
                .map(|backing| (backing.view.clone(), slot.format))
        });
        match &target {
            Some((_, format)) => {
                let format = *format;
                self.programs.ensure_format(&self.device, format);
            }
            None => log::warn!("Layer texture {:?} has no storage", texture),
        }
        self.targets.push(target.clone());
        self.push_segment(target, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT));
    }

    fn end_layer(&mut self) {
        if self.targets.len() <= 1 {
            log::warn!("end_layer without a matching begin_layer");
            return;
        }
        self.targets.pop();
        let parent = self.targets.last().cloned().flatten();
        self.push_segment(parent, wgpu::LoadOp::Load);
    }

    fn draw_solid(&mut self, quad: u32, color: Vec4) {
        let mut uniforms = self.uniforms();
        uniforms.color = color.to_array();
        self.record(quad, None, uniforms);
    }

    fn draw_texture(&mut self, quad: u32, texture: TextureId, opacity: f32) {
        let mut uniforms = self.uniforms();
        uniforms.params[0] = opacity;
        self.record(quad, Some(texture), uniforms);
    }

    fn draw_color_filter(&mut self, quad: u32, texture: TextureId, color_matrix: &Mat4) {
        let mut uniforms = self.uniforms();
        uniforms.color_matrix = color_matrix.to_cols_array_2d();
        self.record(quad, Some(texture), uniforms);
    }

    fn draw_blur(&mut self, quad: u32, texture: TextureId, pass: &BlurPass) {
        let mut uniforms = self.uniforms();
        uniforms.blur = blur_params(pass);
        self.record(quad, Some(texture), uniforms);
    }

    fn draw_shadow(&mut self, quad: u32, texture: TextureId, pass: &BlurPass, color: Vec4) {
        let mut uniforms = self.uniforms();
        uniforms.blur = blur_params(pass);
        uniforms.color = color.to_array();
        self.record(quad, Some(texture), uniforms);
    }
}

fn blur_params(pass: &BlurPass) -> [f32; 4] {
    let step = pass.step();
    [step.x, step.y, pass.radius as f32, pass.sigma]
}

fn align_to(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

fn create_vertex_buffer(device: &Device, capacity: usize) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Lamina Vertex Buffer"),
        size: (capacity * std::mem::size_of::<QuadVertex>()) as u64,
        usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_buffer(device: &Device, capacity: usize, stride: u64) -> Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Lamina Uniform Buffer"),
        size: capacity as u64 * stride,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_uniform_bind_group(device: &Device, programs: &Programs, buffer: &Buffer) -> BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Lamina Uniform Bind Group"),
        layout: &programs.uniform_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniforms>() as u64),
            }),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_to() {
        assert_eq!(align_to(176, 256), 256);
        assert_eq!(align_to(176, 16), 176);
        assert_eq!(align_to(300, 256), 512);
        assert_eq!(align_to(176, 0), 176);
    }
}
