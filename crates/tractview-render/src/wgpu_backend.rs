//! The wgpu implementation of [`GpuBackend`].
//!
//! Renders offscreen into an RGBA8 target that can be read back with
//! [`WgpuBackend::read_pixels`]. Draw calls are recorded into batches during
//! the frame and encoded into a single render pass by `end_frame`.

use std::collections::{HashMap, VecDeque};

use glam::{Mat4, UVec3, Vec4};
use tractview_core::TextureId;

use crate::backend::{
    GpuBackend, GpuVertex, ProgramKind, RenderState, TextureContent, TextureFilter, Topology, Uniform,
};
use crate::binder::MAX_TEXTURES;
use crate::buffer::{aligned_bytes_per_row, create_readback_buffer, create_uniform_buffer, create_vertex_buffer};
use crate::error::{RenderError, RenderResult};
use crate::shader::{ShaderBuilder, ShaderKind};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const VOLUME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Maps OpenGL clip depth `[-1, 1]` to wgpu's `[0, 1]`.
const CLIP_FIX: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.5, 0.0, //
    0.0, 0.0, 0.5, 1.0,
]);

// Must match the FLAG_* constants in common.wgsl.
const FLAG_USE_COLOR_MAP: u32 = 1;
const FLAG_USE_TEX: u32 = 2;
const FLAG_SHOW_FS: u32 = 4;
const FLAG_USE_LIC: u32 = 8;
const FLAG_IS_GLYPH: u32 = 16;
const FLAG_CUT_AT_SURFACE: u32 = 32;
const FLAG_LIGHT_ON: u32 = 64;
const FLAG_ALPHA_TEST: u32 = 128;
const FLAG_LIGHTING: u32 = 256;

/// Error filters captured around every pass, innermost last.
const ERROR_SCOPES: [wgpu::ErrorFilter; 3] = [
    wgpu::ErrorFilter::Internal,
    wgpu::ErrorFilter::OutOfMemory,
    wgpu::ErrorFilter::Validation,
];

const MODE_FLAT: u32 = 0;
const MODE_LEGEND: u32 = 1;
const MODE_GRAPH: u32 = 2;

/// Per-draw uniform block, laid out like `DrawUniforms` in common.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    pub mvp: [[f32; 4]; 4],
    pub modelview: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub thresholds: [[f32; 4]; 3],
    pub alphas: [[f32; 4]; 3],
    pub contents: [[u32; 4]; 3],
    pub linear: [[u32; 4]; 3],
    pub flags: [u32; 4],
    pub params: [f32; 4],
}

impl Default for DrawUniforms {
    fn default() -> Self {
        Self {
            color: [1.0; 4],
            alphas: [[1.0; 4]; 3],
            params: [1.0, 0.0, 0.0, 0.0],
            ..bytemuck::Zeroable::zeroed()
        }
    }
}

impl DrawUniforms {
    fn set_flag(&mut self, flag: u32, on: bool) {
        if on {
            self.flags[0] |= flag;
        } else {
            self.flags[0] &= !flag;
        }
    }

    fn unit_slot(unit: usize) -> (usize, usize) {
        (unit / 4, unit % 4)
    }
}

fn content_code(content: TextureContent) -> u32 {
    match content {
        TextureContent::Scalar => 0,
        TextureContent::Overlay => 1,
        TextureContent::Color => 2,
    }
}

/// Pipelines are cached per shader and fixed-function state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: ShaderKind,
    topology: Topology,
    blend: bool,
    depth_test: bool,
    depth_write: bool,
}

/// A recorded draw.
struct Batch {
    key: PipelineKey,
    vertices: wgpu::Buffer,
    count: u32,
    uniforms: wgpu::BindGroup,
    textures: wgpu::BindGroup,
}

/// Headless wgpu renderer.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,
    color_texture: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    volume_sampler: wgpu::Sampler,
    /// Bound to texture units without a volume.
    dummy_view: wgpu::TextureView,
    modules: HashMap<ShaderKind, wgpu::ShaderModule>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    textures: HashMap<TextureId, (wgpu::Texture, wgpu::TextureView)>,
    next_texture: u64,
    units: [Option<TextureId>; MAX_TEXTURES],
    shader: ShaderKind,
    uniforms: DrawUniforms,
    state: RenderState,
    projection: Mat4,
    modelview: Mat4,
    clear_color: Vec4,
    batches: Vec<Batch>,
    errors: VecDeque<RenderError>,
}

impl WgpuBackend {
    /// Creates a backend rendering into a `width` × `height` offscreen target.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let (width, height) = (width.max(1), height.max(1));
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tractview device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        // Device errors are collected per pass through `take_error`.
        push_error_scopes(&device);

        let (color_texture, color_view) = create_target(&device, width, height, COLOR_FORMAT, "color target");
        let (_, depth_view) = create_target(&device, width, height, DEPTH_FORMAT, "depth target");

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw uniforms layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let mut texture_entries = vec![sampler_entry(0)];
        texture_entries.extend((0..MAX_TEXTURES as u32).map(|unit| wgpu::BindGroupLayoutEntry {
            binding: 1 + unit,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D3,
                multisampled: false,
            },
            count: None,
        }));
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("volume textures layout"),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tractview pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let volume_sampler = create_sampler(&device, wgpu::FilterMode::Linear, "volume sampler");

        let mut modules = HashMap::new();
        for kind in ShaderKind::ALL {
            modules.insert(kind, ShaderBuilder::for_kind(kind).build_module(&device)?);
        }

        let (dummy_texture, dummy_view) = create_volume_texture(&device, UVec3::ONE, "empty volume");
        queue.write_texture(
            dummy_texture.as_image_copy(),
            bytemuck::cast_slice(&[0u16; 4]),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(8),
                rows_per_image: Some(1),
            },
            extent(UVec3::ONE),
        );

        log::info!("headless wgpu backend ready ({width}x{height})");

        Ok(Self {
            device,
            queue,
            width,
            height,
            color_texture,
            color_view,
            depth_view,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            volume_sampler,
            dummy_view,
            modules,
            pipelines: HashMap::new(),
            textures: HashMap::new(),
            next_texture: 0,
            units: [None; MAX_TEXTURES],
            shader: ShaderKind::Flat,
            uniforms: DrawUniforms::default(),
            state: RenderState::default(),
            projection: Mat4::IDENTITY,
            modelview: Mat4::IDENTITY,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            batches: Vec::new(),
            errors: VecDeque::new(),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of volume textures currently on the GPU.
    #[must_use]
    pub fn resident_textures(&self) -> usize {
        self.textures.len()
    }

    /// Reads back the last finished frame as tightly packed RGBA8 rows, top row first.
    pub fn read_pixels(&self) -> RenderResult<Vec<u8>> {
        let bytes_per_row = aligned_bytes_per_row(self.width);
        let buffer = create_readback_buffer(&self.device, self.width, self.height);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::BufferMapFailed)?
            .map_err(|_| RenderError::BufferMapFailed)?;

        // Copy data, removing row padding
        let data = buffer_slice.get_mapped_range();
        let row_bytes = (self.width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * self.height as usize);
        for row in 0..self.height {
            let start = (row * bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }
        drop(data);
        buffer.unmap();
        Ok(pixels)
    }

    fn pipeline(&mut self, key: PipelineKey) -> RenderResult<()> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let module = self
            .modules
            .get(&key.shader)
            .ok_or_else(|| RenderError::ShaderCompilationFailed(format!("no module for {:?}", key.shader)))?;
        let topology = match key.topology {
            Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Topology::Lines => wgpu::PrimitiveTopology::LineList,
        };
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tractview pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                buffers: &[GpuVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: key.blend.then_some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: key.depth_write,
                depth_compare: if key.depth_test {
                    wgpu::CompareFunction::LessEqual
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        log::debug!("created pipeline {key:?}");
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    /// Closes the open error scopes, queues what they caught and opens fresh ones.
    fn collect_scoped_errors(&mut self) {
        for _ in ERROR_SCOPES {
            if let Some(e) = pollster::block_on(self.device.pop_error_scope()) {
                self.errors.push_back(RenderError::Gpu(e.to_string()));
            }
        }
        push_error_scopes(&self.device);
    }

    fn texture_bind_group(&mut self) -> wgpu::BindGroup {
        let mut views = Vec::with_capacity(MAX_TEXTURES);
        for unit in self.units {
            let view = match unit {
                Some(id) => match self.textures.get(&id) {
                    Some((_, view)) => view,
                    None => {
                        self.errors.push_back(RenderError::UnknownTexture(id.0));
                        &self.dummy_view
                    }
                },
                None => &self.dummy_view,
            };
            views.push(view);
        }
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Sampler(&self.volume_sampler),
        }];
        entries.extend(views.into_iter().enumerate().map(|(unit, view)| wgpu::BindGroupEntry {
            binding: 1 + unit as u32,
            resource: wgpu::BindingResource::TextureView(view),
        }));
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("volume textures"),
            layout: &self.texture_layout,
            entries: &entries,
        })
    }
}

impl GpuBackend for WgpuBackend {
    fn begin_frame(&mut self, clear_color: Vec4) {
        self.clear_color = clear_color;
        self.batches.clear();
        self.units = [None; MAX_TEXTURES];
        self.uniforms = DrawUniforms::default();
        self.state = RenderState::default();
        self.shader = ShaderKind::Flat;
    }

    fn upload_volume_texture(&mut self, dims: UVec3, rgba: &[f32]) -> RenderResult<TextureId> {
        let expected = (dims.x as usize) * (dims.y as usize) * (dims.z as usize) * 4;
        if rgba.len() != expected || expected == 0 {
            return Err(RenderError::TextureCreationFailed(format!(
                "expected {expected} floats for a {}x{}x{} volume, got {}",
                dims.x,
                dims.y,
                dims.z,
                rgba.len()
            )));
        }
        let (texture, view) = create_volume_texture(&self.device, dims, "volume");
        let half: Vec<u16> = rgba.iter().map(|&v| half::f16::from_f32(v).to_bits()).collect();
        self.queue.write_texture(
            texture.as_image_copy(),
            bytemuck::cast_slice(&half),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(8 * dims.x),
                rows_per_image: Some(dims.y),
            },
            extent(dims),
        );

        self.next_texture += 1;
        let id = TextureId(self.next_texture);
        self.textures.insert(id, (texture, view));
        log::debug!("uploaded volume texture {} ({}x{}x{})", id.0, dims.x, dims.y, dims.z);
        Ok(id)
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some((tex, _)) = self.textures.remove(&texture) {
            tex.destroy();
        }
    }

    fn bind_texture_3d(&mut self, unit: usize, texture: TextureId, filter: TextureFilter) {
        if unit >= MAX_TEXTURES {
            self.errors
                .push_back(RenderError::Gpu(format!("texture unit {unit} out of range")));
            return;
        }
        self.units[unit] = Some(texture);
        let (v, c) = DrawUniforms::unit_slot(unit);
        self.uniforms.linear[v][c] = u32::from(filter == TextureFilter::Linear);
    }

    fn unbind_textures(&mut self) {
        self.units = [None; MAX_TEXTURES];
        self.uniforms.flags[1] = 0;
    }

    fn use_program(&mut self, program: Option<ProgramKind>) {
        self.shader = ShaderKind::for_program(program);
        // Pass uniforms don't carry over between programs.
        self.uniforms.flags[0] &= FLAG_ALPHA_TEST | FLAG_LIGHTING;
        self.uniforms.flags[2] = match program {
            Some(ProgramKind::Legend) => MODE_LEGEND,
            Some(ProgramKind::Graph) => MODE_GRAPH,
            _ => MODE_FLAT,
        };
        self.uniforms.params[0] = 1.0;
    }

    fn set_uniform(&mut self, uniform: Uniform) {
        let u = &mut self.uniforms;
        match uniform {
            Uniform::UseColorMap(on) => u.set_flag(FLAG_USE_COLOR_MAP, on),
            Uniform::UseTex(on) => u.set_flag(FLAG_USE_TEX, on),
            Uniform::ShowFs(on) => u.set_flag(FLAG_SHOW_FS, on),
            Uniform::UseLic(on) => u.set_flag(FLAG_USE_LIC, on),
            Uniform::IsGlyph(on) => u.set_flag(FLAG_IS_GLYPH, on),
            Uniform::CutAtSurface(on) => u.set_flag(FLAG_CUT_AT_SURFACE, on),
            Uniform::LightOn(on) => u.set_flag(FLAG_LIGHT_ON, on),
            Uniform::Alpha(a) => u.params[0] = a,
            Uniform::Color(c) => u.color = c.to_array(),
            Uniform::TextureCount(n) => u.flags[1] = n.min(MAX_TEXTURES as u32),
            Uniform::TextureThreshold { unit, value } if unit < MAX_TEXTURES => {
                let (v, c) = DrawUniforms::unit_slot(unit);
                u.thresholds[v][c] = value;
            }
            Uniform::TextureAlpha { unit, value } if unit < MAX_TEXTURES => {
                let (v, c) = DrawUniforms::unit_slot(unit);
                u.alphas[v][c] = value;
            }
            Uniform::TextureContent { unit, content } if unit < MAX_TEXTURES => {
                let (v, c) = DrawUniforms::unit_slot(unit);
                u.contents[v][c] = content_code(content);
            }
            Uniform::TextureThreshold { unit, .. }
            | Uniform::TextureAlpha { unit, .. }
            | Uniform::TextureContent { unit, .. } => {
                self.errors
                    .push_back(RenderError::Gpu(format!("texture unit {unit} out of range")));
            }
        }
    }

    fn set_render_state(&mut self, state: RenderState) {
        self.state = state;
        self.uniforms.set_flag(FLAG_ALPHA_TEST, state.alpha_test);
        self.uniforms.set_flag(FLAG_LIGHTING, state.lighting);
    }

    fn set_matrices(&mut self, projection: Mat4, modelview: Mat4) {
        self.projection = projection;
        self.modelview = modelview;
    }

    fn draw(&mut self, topology: Topology, vertices: &[GpuVertex]) {
        if vertices.is_empty() {
            return;
        }
        let key = PipelineKey {
            shader: self.shader,
            topology,
            blend: self.state.blend,
            depth_test: self.state.depth_test,
            depth_write: self.state.depth_write,
        };
        if let Err(e) = self.pipeline(key) {
            self.errors.push_back(e);
            return;
        }

        let mut uniforms = self.uniforms;
        uniforms.mvp = (CLIP_FIX * self.projection * self.modelview).to_cols_array_2d();
        uniforms.modelview = self.modelview.to_cols_array_2d();
        let uniform_buffer = create_uniform_buffer(&self.device, &uniforms, Some("draw uniforms"));
        let uniform_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw uniforms"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let textures = self.texture_bind_group();

        self.batches.push(Batch {
            key,
            vertices: create_vertex_buffer(&self.device, vertices, Some("draw vertices")),
            count: vertices.len() as u32,
            uniforms: uniform_group,
            textures,
        });
    }

    fn take_error(&mut self) -> Option<RenderError> {
        if self.errors.is_empty() {
            self.collect_scoped_errors();
        }
        self.errors.pop_front()
    }

    fn end_frame(&mut self) -> RenderResult<()> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });
        {
            let c = self.clear_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(c.x),
                            g: f64::from(c.y),
                            b: f64::from(c.z),
                            a: f64::from(c.w),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for batch in &self.batches {
                let Some(pipeline) = self.pipelines.get(&batch.key) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &batch.uniforms, &[]);
                pass.set_bind_group(1, &batch.textures, &[]);
                pass.set_vertex_buffer(0, batch.vertices.slice(..));
                pass.draw(0..batch.count, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.batches.clear();

        self.collect_scoped_errors();
        if self.errors.is_empty() {
            return Ok(());
        }
        let messages: Vec<String> = self.errors.drain(..).map(|e| e.to_string()).collect();
        Err(RenderError::Gpu(messages.join("; ")))
    }
}

fn push_error_scopes(device: &wgpu::Device) {
    for filter in ERROR_SCOPES {
        device.push_error_scope(filter);
    }
}

fn create_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn extent(dims: UVec3) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: dims.x,
        height: dims.y,
        depth_or_array_layers: dims.z,
    }
}

fn create_volume_texture(device: &wgpu::Device, dims: UVec3, label: &str) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent(dims),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format: VOLUME_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_sampler(device: &wgpu::Device, filter: wgpu::FilterMode, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}
