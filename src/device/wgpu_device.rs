//! [`GraphicsDevice`] on top of wgpu.
//!
//! Each named uniform is its own `var<uniform>` binding. Values set on a
//! program are kept CPU side; every draw snapshots them into a per-frame
//! uniform slab and records which bind group resources it needs. The frame is
//! turned into render passes when it is presented, one pass per
//! [`clear`](GraphicsDevice::clear).
//!
//! Render pipelines are built lazily per program and fixed-function state
//! (topology, depth test, depth write, culling and blending) and cached.

use super::mipmaps::MipmapGenerator;
use super::{
    ActiveUniform, Capability, GeometryId, GraphicsDevice, ProgramId, ShaderId, ShaderStage,
    TextureDescriptor, TextureId, Topology, UniformType, UniformValue,
};
use crate::color::Color;
use crate::error::ShaderError;
use crate::gpu::GpuContext;
use crate::mesh::Vertex3d;
use crate::reflect::{self, BindingKind, CompiledStage, LinkedProgram, SAMPLER_SUFFIX};
use crate::texture::{FilterMode, TextureSettings, WrapMode};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::num::NonZeroU64;
use std::rc::Rc;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Uniform bindings are sized in 16 byte steps.
const UNIFORM_SLOT: u64 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    topology: Topology,
    depth_test: bool,
    depth_write: bool,
    cull_face: bool,
    blend: bool,
}

struct GpuProgram {
    linked: Rc<LinkedProgram>,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    layouts: Rc<[wgpu::BindGroupLayout]>,
    pipeline_layout: wgpu::PipelineLayout,
}

struct ProgramState {
    gpu: Option<GpuProgram>,
    values: BTreeMap<String, UniformValue>,
}

struct GpuTexture {
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

struct GpuGeometry {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
}

enum BoundResource {
    Uniform { offset: u64, size: u64 },
    Texture(wgpu::TextureView),
    Sampler(wgpu::Sampler),
}

struct DrawRecord {
    pipeline: wgpu::RenderPipeline,
    layouts: Rc<[wgpu::BindGroupLayout]>,
    /// Per bind group, `(binding, resource)` pairs.
    groups: Vec<Vec<(u32, BoundResource)>>,
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct PassRecord {
    clear: Option<Color>,
    draws: Vec<DrawRecord>,
}

/// Uniform bytes written by the draws of one frame.
///
/// Each write starts at a multiple of the device's uniform offset alignment
/// and occupies at least [`UNIFORM_SLOT`] bytes.
#[derive(Debug)]
struct UniformSlab {
    bytes: Vec<u8>,
    alignment: u64,
}

impl UniformSlab {
    fn new(alignment: u64) -> Self {
        Self {
            bytes: Vec::new(),
            alignment: alignment.max(1),
        }
    }

    /// Appends `data`, returning its offset and bound size.
    fn push(&mut self, data: &[u8]) -> (u64, u64) {
        let offset = align_up(self.bytes.len() as u64, self.alignment);
        let size = align_up((data.len() as u64).max(1), UNIFORM_SLOT);
        self.bytes.resize(offset as usize, 0);
        self.bytes.extend_from_slice(data);
        self.bytes.resize((offset + size) as usize, 0);
        (offset, size)
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

struct State {
    shaders: HashMap<ShaderId, Option<Rc<CompiledStage>>>,
    programs: HashMap<ProgramId, ProgramState>,
    textures: HashMap<TextureId, GpuTexture>,
    geometries: HashMap<GeometryId, GpuGeometry>,
    /// `None` marks a pipeline that failed validation.
    pipelines: HashMap<PipelineKey, Option<wgpu::RenderPipeline>>,
    current_program: Option<ProgramId>,
    units: BTreeMap<u32, TextureId>,
    capabilities: BTreeSet<Capability>,
    depth_write: bool,
    slab: UniformSlab,
    passes: Vec<PassRecord>,
    depth: Option<(u32, u32, wgpu::TextureView)>,
}

/// Renders through wgpu into the window surface of a [`GpuContext`], or into
/// any texture view of the same format.
///
/// Draw commands are recorded until [`present`](Self::present) or
/// [`render_to_view`](Self::render_to_view) submits them.
pub struct WgpuDevice {
    gpu: RefCell<GpuContext>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    fallback: GpuTexture,
    mipmaps: MipmapGenerator,
    next_id: Cell<u32>,
    state: RefCell<State>,
}

impl WgpuDevice {
    pub fn new(gpu: GpuContext) -> Self {
        let device = gpu.device.clone();
        let queue = gpu.queue.clone();
        let format = gpu.config.format;

        device.on_uncaptured_error(Arc::new(|e: wgpu::Error| {
            log::error!("wgpu error: {e}");
        }));

        let mipmaps = MipmapGenerator::new(&device, TEXTURE_FORMAT);
        let fallback = upload_texture(
            &device,
            &queue,
            &mipmaps,
            &TextureDescriptor::new(1, 1, TextureSettings::default()),
            &[255; 4],
            "Fallback White Texture",
        );
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);

        Self {
            gpu: RefCell::new(gpu),
            device,
            queue,
            format,
            fallback,
            mipmaps,
            next_id: Cell::new(1),
            state: RefCell::new(State {
                shaders: HashMap::new(),
                programs: HashMap::new(),
                textures: HashMap::new(),
                geometries: HashMap::new(),
                pipelines: HashMap::new(),
                current_program: None,
                units: BTreeMap::new(),
                capabilities: BTreeSet::new(),
                depth_write: true,
                slab: UniformSlab::new(alignment),
                passes: Vec::new(),
                depth: None,
            }),
        }
    }

    fn alloc(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Resizes the window surface. Zero sizes are ignored.
    pub fn resize(&self, width: u32, height: u32) {
        self.gpu.borrow_mut().resize(width, height);
    }

    pub fn width(&self) -> u32 {
        self.gpu.borrow().width()
    }

    pub fn height(&self) -> u32 {
        self.gpu.borrow().height()
    }

    pub fn aspect(&self) -> f32 {
        self.gpu.borrow().aspect()
    }

    /// Color format every pipeline renders to.
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Submits the recorded frame to the window surface and presents it.
    ///
    /// A lost or outdated surface is reconfigured and the frame dropped.
    pub fn present(&self) -> Result<(), wgpu::SurfaceError> {
        let output = {
            let gpu = self.gpu.borrow();
            match gpu.surface.get_current_texture() {
                Ok(output) => output,
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::warn!("surface lost or outdated, reconfiguring");
                    gpu.surface.configure(&gpu.device, &gpu.config);
                    self.discard_frame();
                    return Ok(());
                }
                Err(e) => {
                    self.discard_frame();
                    return Err(e);
                }
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.render_to_view(&view, output.texture.width(), output.texture.height());
        output.present();
        Ok(())
    }

    /// Submits the recorded frame into `view`, which must use
    /// [`format`](Self::format) and be `width` by `height` pixels.
    pub fn render_to_view(&self, view: &wgpu::TextureView, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        let mut passes = std::mem::take(&mut state.passes);
        if passes.is_empty() {
            passes.push(PassRecord {
                clear: Some(Color::BLACK),
                draws: Vec::new(),
            });
        }
        let slab = state.slab.take();
        let depth_view = self.depth_view(&mut state, width, height);
        drop(state);

        let mut contents = slab;
        if contents.len() < UNIFORM_SLOT as usize {
            contents.resize(UNIFORM_SLOT as usize, 0);
        }
        let uniforms = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Frame Uniforms"),
                contents: &contents,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_groups: Vec<Vec<wgpu::BindGroup>> = passes
            .iter()
            .flat_map(|pass| pass.draws.iter())
            .map(|draw| self.bind_groups(draw, &uniforms))
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let mut groups = bind_groups.iter();
        for (i, pass) in passes.iter().enumerate() {
            // Nothing defines the target before the first clear.
            let clear = match (pass.clear, i) {
                (Some(color), _) => Some(color),
                (None, 0) => Some(Color::BLACK),
                (None, _) => None,
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match clear {
                            Some(color) => wgpu::LoadOp::Clear(color.into()),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: match clear {
                            Some(_) => wgpu::LoadOp::Clear(1.0),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (draw, bind_groups) in pass.draws.iter().zip(groups.by_ref()) {
                render_pass.set_pipeline(&draw.pipeline);
                for (index, group) in bind_groups.iter().enumerate() {
                    render_pass.set_bind_group(index as u32, group, &[]);
                }
                render_pass.set_vertex_buffer(0, draw.vertices.slice(..));
                render_pass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn discard_frame(&self) {
        let mut state = self.state.borrow_mut();
        state.passes.clear();
        state.slab.take();
    }

    fn depth_view(&self, state: &mut State, width: u32, height: u32) -> wgpu::TextureView {
        if let Some((w, h, view)) = &state.depth {
            if (*w, *h) == (width, height) {
                return view.clone();
            }
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        state.depth = Some((width, height, view.clone()));
        view
    }

    fn bind_groups(&self, draw: &DrawRecord, uniforms: &wgpu::Buffer) -> Vec<wgpu::BindGroup> {
        draw.layouts
            .iter()
            .zip(&draw.groups)
            .map(|(layout, resources)| {
                let entries: Vec<wgpu::BindGroupEntry> = resources
                    .iter()
                    .map(|(binding, resource)| wgpu::BindGroupEntry {
                        binding: *binding,
                        resource: match resource {
                            BoundResource::Uniform { offset, size } => {
                                wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                    buffer: uniforms,
                                    offset: *offset,
                                    size: NonZeroU64::new(*size),
                                })
                            }
                            BoundResource::Texture(view) => {
                                wgpu::BindingResource::TextureView(view)
                            }
                            BoundResource::Sampler(sampler) => {
                                wgpu::BindingResource::Sampler(sampler)
                            }
                        },
                    })
                    .collect();
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Draw Bind Group"),
                    layout,
                    entries: &entries,
                })
            })
            .collect()
    }

    fn build_program(&self, linked: LinkedProgram, label: &str) -> GpuProgram {
        let module = |stage: &CompiledStage| {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(stage.source.as_str().into()),
                })
        };
        let vertex = module(&linked.vertex);
        let fragment = module(&linked.fragment);

        let group_count = linked.max_group().map_or(0, |g| g + 1);
        let layouts: Rc<[wgpu::BindGroupLayout]> = (0..group_count)
            .map(|group| {
                let entries: Vec<wgpu::BindGroupLayoutEntry> = linked
                    .group(group)
                    .map(|b| wgpu::BindGroupLayoutEntry {
                        binding: b.binding,
                        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                        ty: match b.kind {
                            BindingKind::Uniform(_) => wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            BindingKind::Texture => wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            BindingKind::Sampler => {
                                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
                            }
                        },
                        count: None,
                    })
                    .collect();
                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(label),
                        entries: &entries,
                    })
            })
            .collect();

        let layout_refs: Vec<&wgpu::BindGroupLayout> = layouts.iter().collect();
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &layout_refs,
                push_constant_ranges: &[],
            });

        GpuProgram {
            linked: Rc::new(linked),
            vertex,
            fragment,
            layouts,
            pipeline_layout,
        }
    }

    /// Builds a pipeline inside a validation error scope. Failures are
    /// logged here and cached as `None` by the caller.
    fn build_pipeline(
        &self,
        program: &GpuProgram,
        key: &PipelineKey,
    ) -> Option<wgpu::RenderPipeline> {
        log::debug!("building pipeline {key:?}");
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Program Pipeline"),
                layout: Some(&program.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some(&program.linked.vertex.entry_point),
                    buffers: &[Vertex3d::LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some(&program.linked.fragment.entry_point),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(blend_state(key.blend)),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: primitive_state(key),
                depth_stencil: Some(depth_stencil_state(key)),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            None => Some(pipeline),
            Some(e) => {
                log::error!("pipeline for program {} failed: {e}", key.program.0);
                None
            }
        }
    }

    fn texture_for<'a>(
        &'a self,
        state: &'a State,
        values: &BTreeMap<String, UniformValue>,
        name: &str,
    ) -> &'a GpuTexture {
        let unit = match values.get(name) {
            Some(UniformValue::Int(unit)) => u32::try_from(*unit).unwrap_or(0),
            _ => 0,
        };
        state
            .units
            .get(&unit)
            .and_then(|id| state.textures.get(id))
            .unwrap_or(&self.fallback)
    }
}

fn blend_state(enabled: bool) -> wgpu::BlendState {
    if enabled {
        wgpu::BlendState::ALPHA_BLENDING
    } else {
        wgpu::BlendState::REPLACE
    }
}

fn primitive_state(key: &PipelineKey) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: match key.topology {
            Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            Topology::LineList => wgpu::PrimitiveTopology::LineList,
        },
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: (key.cull_face && key.topology == Topology::TriangleList)
            .then_some(wgpu::Face::Back),
        ..Default::default()
    }
}

/// Depth writes only happen while the depth test is on.
fn depth_stencil_state(key: &PipelineKey) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: key.depth_test && key.depth_write,
        depth_compare: if key.depth_test {
            wgpu::CompareFunction::Less
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    mipmaps: &MipmapGenerator,
    desc: &TextureDescriptor,
    pixels: &[u8],
    label: &str,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: desc.width,
        height: desc.height,
        depth_or_array_layers: 1,
    };
    let mip_level_count = desc.mip_level_count.max(1);
    let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
    if mip_level_count > 1 {
        usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * desc.width),
            rows_per_image: Some(desc.height),
        },
        size,
    );
    mipmaps.generate(device, queue, &texture);
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let settings = desc.settings;
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode(settings.wrap_s),
        address_mode_v: address_mode(settings.wrap_t),
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: filter_mode(settings.mag_filter),
        min_filter: filter_mode(settings.min_filter),
        mipmap_filter: filter_mode(settings.mipmap_filter),
        ..Default::default()
    });

    GpuTexture { view, sampler }
}

impl GraphicsDevice for WgpuDevice {
    fn create_shader(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> (ShaderId, Result<(), ShaderError>) {
        let id = ShaderId(self.alloc());
        let (compiled, result) = match reflect::compile(stage, source) {
            Ok(compiled) => (Some(Rc::new(compiled)), Ok(())),
            Err(e) => (None, Err(e)),
        };
        self.state.borrow_mut().shaders.insert(id, compiled);
        (id, result)
    }

    fn delete_shader(&self, shader: ShaderId) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self, shaders: &[ShaderId]) -> (ProgramId, Result<(), ShaderError>) {
        let id = ProgramId(self.alloc());
        let linked = {
            let state = self.state.borrow();
            let stages: Result<Vec<_>, _> = shaders
                .iter()
                .map(|s| match state.shaders.get(s) {
                    Some(Some(stage)) => Ok(Rc::clone(stage)),
                    _ => Err(ShaderError::Link(format!("shader {} is not compiled", s.0))),
                })
                .collect();
            stages.and_then(|stages| reflect::link(&stages))
        };

        let (gpu, result) = match linked {
            Ok(linked) => {
                let label = format!("Program {}", id.0);
                (Some(self.build_program(linked, &label)), Ok(()))
            }
            Err(e) => (None, Err(e)),
        };
        self.state.borrow_mut().programs.insert(
            id,
            ProgramState {
                gpu,
                values: BTreeMap::new(),
            },
        );
        (id, result)
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        state.pipelines.retain(|key, _| key.program != program);
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform> {
        let state = self.state.borrow();
        match state.programs.get(&program).and_then(|p| p.gpu.as_ref()) {
            Some(gpu) => gpu.linked.active_uniforms(),
            None => Vec::new(),
        }
    }

    fn use_program(&self, program: ProgramId) {
        self.state.borrow_mut().current_program = Some(program);
    }

    fn set_uniform(&self, program: ProgramId, name: &str, value: UniformValue) {
        let mut state = self.state.borrow_mut();
        let Some(entry) = state.programs.get_mut(&program) else {
            return;
        };
        let ty = entry
            .gpu
            .as_ref()
            .and_then(|gpu| gpu.linked.binding(name))
            .and_then(|b| match b.kind {
                BindingKind::Uniform(ty) => Some(ty),
                BindingKind::Texture => Some(UniformType::Sampler2D),
                BindingKind::Sampler => None,
            });
        if ty.is_some_and(|ty| value.fits(ty)) {
            entry.values.insert(name.to_owned(), value);
        }
    }

    fn create_texture(&self, desc: &TextureDescriptor, pixels: &[u8]) -> TextureId {
        let id = TextureId(self.alloc());
        let label = format!("Texture {}", id.0);
        let texture = upload_texture(
            &self.device,
            &self.queue,
            &self.mipmaps,
            desc,
            pixels,
            &label,
        );
        self.state.borrow_mut().textures.insert(id, texture);
        id
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut state = self.state.borrow_mut();
        state.textures.remove(&texture);
        state.units.retain(|_, t| *t != texture);
    }

    fn bind_texture(&self, unit: u32, texture: TextureId) {
        self.state.borrow_mut().units.insert(unit, texture);
    }

    fn create_geometry(&self, vertices: &[Vertex3d], indices: &[u32]) -> GeometryId {
        let id = GeometryId(self.alloc());
        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let indices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.state
            .borrow_mut()
            .geometries
            .insert(id, GpuGeometry { vertices, indices });
        id
    }

    fn delete_geometry(&self, geometry: GeometryId) {
        self.state.borrow_mut().geometries.remove(&geometry);
    }

    fn draw_indexed(&self, geometry: GeometryId, topology: Topology, index_count: u32) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let Some(program_id) = state.current_program else {
            return;
        };
        let Some(entry) = state.programs.get(&program_id) else {
            return;
        };
        let Some(program) = entry.gpu.as_ref() else {
            return;
        };
        let Some(buffers) = state.geometries.get(&geometry) else {
            return;
        };

        let key = PipelineKey {
            program: program_id,
            topology,
            depth_test: state.capabilities.contains(&Capability::DepthTest),
            depth_write: state.depth_write,
            cull_face: state.capabilities.contains(&Capability::CullFace),
            blend: state.capabilities.contains(&Capability::Blend),
        };
        let pipeline = state
            .pipelines
            .entry(key)
            .or_insert_with(|| self.build_pipeline(program, &key))
            .clone();
        let Some(pipeline) = pipeline else {
            return;
        };

        let mut groups: Vec<Vec<(u32, BoundResource)>> =
            (0..program.layouts.len()).map(|_| Vec::new()).collect();
        for b in &program.linked.bindings {
            let resource = match b.kind {
                BindingKind::Uniform(ty) => {
                    let mut bytes = Vec::with_capacity(ty.byte_size() as usize);
                    match entry.values.get(&b.name) {
                        Some(value) => value.write_bytes(&mut bytes),
                        None => bytes.resize(ty.byte_size() as usize, 0),
                    }
                    let (offset, size) = state.slab.push(&bytes);
                    BoundResource::Uniform { offset, size }
                }
                BindingKind::Texture => {
                    let texture = self.texture_for(state, &entry.values, &b.name);
                    BoundResource::Texture(texture.view.clone())
                }
                BindingKind::Sampler => {
                    let texture = match b.name.strip_suffix(SAMPLER_SUFFIX) {
                        Some(base) => self.texture_for(state, &entry.values, base),
                        None => &self.fallback,
                    };
                    BoundResource::Sampler(texture.sampler.clone())
                }
            };
            groups[b.group as usize].push((b.binding, resource));
        }

        let record = DrawRecord {
            pipeline,
            layouts: Rc::clone(&program.layouts),
            groups,
            vertices: buffers.vertices.clone(),
            indices: buffers.indices.clone(),
            index_count,
        };
        match state.passes.last_mut() {
            Some(pass) => pass.draws.push(record),
            None => state.passes.push(PassRecord {
                clear: None,
                draws: vec![record],
            }),
        }
    }

    fn set_capability(&self, capability: Capability, enabled: bool) {
        let mut state = self.state.borrow_mut();
        if enabled {
            state.capabilities.insert(capability);
        } else {
            state.capabilities.remove(&capability);
        }
    }

    fn set_depth_write(&self, enabled: bool) {
        self.state.borrow_mut().depth_write = enabled;
    }

    fn clear(&self, color: Color) {
        self.state.borrow_mut().passes.push(PassRecord {
            clear: Some(color),
            draws: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PipelineKey {
        PipelineKey {
            program: ProgramId(1),
            topology: Topology::TriangleList,
            depth_test: true,
            depth_write: true,
            cull_face: true,
            blend: false,
        }
    }

    #[test]
    fn slab_aligns_every_write() {
        let mut slab = UniformSlab::new(256);
        assert_eq!(slab.push(&[1; 4]), (0, 16));
        assert_eq!(slab.push(&[2; 64]), (256, 64));
        assert_eq!(slab.push(&[3; 12]), (512, 16));
        let bytes = slab.take();
        assert_eq!(bytes.len(), 528);
        assert_eq!(&bytes[256..260], &[2; 4]);
        assert_eq!(bytes[524], 0);
        assert!(slab.take().is_empty());
    }

    #[test]
    fn depth_state_follows_capabilities() {
        let on = depth_stencil_state(&key());
        assert!(on.depth_write_enabled);
        assert_eq!(on.depth_compare, wgpu::CompareFunction::Less);

        let read_only = depth_stencil_state(&PipelineKey {
            depth_write: false,
            ..key()
        });
        assert!(!read_only.depth_write_enabled);

        let off = depth_stencil_state(&PipelineKey {
            depth_test: false,
            ..key()
        });
        assert!(!off.depth_write_enabled);
        assert_eq!(off.depth_compare, wgpu::CompareFunction::Always);
    }

    #[test]
    fn culling_only_applies_to_triangles() {
        assert_eq!(primitive_state(&key()).cull_mode, Some(wgpu::Face::Back));
        let lines = PipelineKey {
            topology: Topology::LineList,
            ..key()
        };
        assert_eq!(primitive_state(&lines).cull_mode, None);
        assert_eq!(
            primitive_state(&lines).topology,
            wgpu::PrimitiveTopology::LineList
        );
        let no_cull = PipelineKey {
            cull_face: false,
            ..key()
        };
        assert_eq!(primitive_state(&no_cull).cull_mode, None);
    }

    #[test]
    fn sampler_modes() {
        assert_eq!(address_mode(WrapMode::MirroredRepeat), wgpu::AddressMode::MirrorRepeat);
        assert_eq!(address_mode(WrapMode::ClampToEdge), wgpu::AddressMode::ClampToEdge);
        assert_eq!(filter_mode(FilterMode::Nearest), wgpu::FilterMode::Nearest);
        assert_eq!(blend_state(true), wgpu::BlendState::ALPHA_BLENDING);
        assert_eq!(blend_state(false), wgpu::BlendState::REPLACE);
    }
}
