//! A [`GraphicsDevice`] that records instead of rendering.
//!
//! Shaders go through the same WGSL front end as the wgpu device, so compile
//! and link behaviour is identical. Every accepted command is appended to a
//! log, and each draw captures the uniforms, texture units and capabilities
//! in effect when it was issued.

use super::{
    ActiveUniform, Capability, GeometryId, GraphicsDevice, ProgramId, ShaderId, ShaderStage,
    TextureDescriptor, TextureId, Topology, UniformValue,
};
use crate::color::Color;
use crate::error::ShaderError;
use crate::mesh::Vertex3d;
use crate::reflect::{self, CompiledStage, LinkedProgram};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

/// One recorded device command.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCommand {
    CreateShader(ShaderId),
    DeleteShader(ShaderId),
    CreateProgram(ProgramId),
    DeleteProgram(ProgramId),
    CreateTexture(TextureId),
    DeleteTexture(TextureId),
    CreateGeometry(GeometryId),
    DeleteGeometry(GeometryId),
    UseProgram(ProgramId),
    SetUniform {
        program: ProgramId,
        name: String,
        value: UniformValue,
    },
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    SetCapability(Capability, bool),
    SetDepthWrite(bool),
    Clear(Color),
    Draw(DrawCall),
}

/// State captured by one indexed draw.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub program: ProgramId,
    pub geometry: GeometryId,
    pub topology: Topology,
    pub index_count: u32,
    /// Every uniform value stored on the program at draw time.
    pub uniforms: BTreeMap<String, UniformValue>,
    /// Texture unit bindings at draw time.
    pub textures: BTreeMap<u32, TextureId>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub cull_face: bool,
    pub blend: bool,
}

/// Contents of an uploaded texture.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub desc: TextureDescriptor,
    pub pixels: Vec<u8>,
}

/// Contents of an uploaded geometry.
#[derive(Clone, Debug)]
pub struct GeometryData {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

struct ProgramState {
    linked: Option<Rc<LinkedProgram>>,
    values: BTreeMap<String, UniformValue>,
}

#[derive(Default)]
struct State {
    shaders: HashMap<ShaderId, Option<Rc<CompiledStage>>>,
    programs: HashMap<ProgramId, ProgramState>,
    textures: HashMap<TextureId, TextureData>,
    geometries: HashMap<GeometryId, GeometryData>,
    current_program: Option<ProgramId>,
    units: BTreeMap<u32, TextureId>,
    capabilities: BTreeSet<Capability>,
    depth_write: bool,
    commands: Vec<DeviceCommand>,
}

/// Recording device for tests and offscreen tooling.
///
/// ```
/// use brazier::{HeadlessDevice, RenderContext, Mesh};
/// use std::rc::Rc;
///
/// let device = Rc::new(HeadlessDevice::new());
/// let ctx = RenderContext::new(device.clone());
/// let cube = Mesh::cube(&ctx, 1.0);
/// cube.draw();
/// assert_eq!(device.live_geometries(), 1);
/// ```
pub struct HeadlessDevice {
    next_id: Cell<u32>,
    state: RefCell<State>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            state: RefCell::new(State {
                depth_write: true,
                ..Default::default()
            }),
        }
    }

    fn alloc(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn record(&self, command: DeviceCommand) {
        self.state.borrow_mut().commands.push(command);
    }

    /// All commands recorded so far.
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.state.borrow().commands.clone()
    }

    /// Drains the command log.
    pub fn take_commands(&self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.state.borrow_mut().commands)
    }

    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state
            .borrow()
            .commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Draw(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_geometries(&self) -> usize {
        self.state.borrow().geometries.len()
    }

    /// Value currently stored for `name` on `program`.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let state = self.state.borrow();
        state.programs.get(&program)?.values.get(name).copied()
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.state.borrow().current_program
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureId> {
        self.state.borrow().units.get(&unit).copied()
    }

    pub fn capability(&self, capability: Capability) -> bool {
        self.state.borrow().capabilities.contains(&capability)
    }

    pub fn depth_write(&self) -> bool {
        self.state.borrow().depth_write
    }

    pub fn texture(&self, texture: TextureId) -> Option<TextureData> {
        self.state.borrow().textures.get(&texture).cloned()
    }

    pub fn geometry(&self, geometry: GeometryId) -> Option<GeometryData> {
        self.state.borrow().geometries.get(&geometry).cloned()
    }
}

impl GraphicsDevice for HeadlessDevice {
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
        let mut state = self.state.borrow_mut();
        state.shaders.insert(id, compiled);
        state.commands.push(DeviceCommand::CreateShader(id));
        (id, result)
    }

    fn delete_shader(&self, shader: ShaderId) {
        let mut state = self.state.borrow_mut();
        if state.shaders.remove(&shader).is_none() {
            log::warn!("delete of unknown shader {shader:?}");
        }
        state.commands.push(DeviceCommand::DeleteShader(shader));
    }

    fn create_program(&self, shaders: &[ShaderId]) -> (ProgramId, Result<(), ShaderError>) {
        let id = ProgramId(self.alloc());
        let mut state = self.state.borrow_mut();

        let stages: Result<Vec<_>, _> = shaders
            .iter()
            .map(|s| match state.shaders.get(s) {
                Some(Some(stage)) => Ok(Rc::clone(stage)),
                _ => Err(ShaderError::Link(format!("shader {} is not compiled", s.0))),
            })
            .collect();
        let linked = stages.and_then(|stages| reflect::link(&stages));

        let (linked, result) = match linked {
            Ok(program) => (Some(Rc::new(program)), Ok(())),
            Err(e) => (None, Err(e)),
        };
        state.programs.insert(
            id,
            ProgramState {
                linked,
                values: BTreeMap::new(),
            },
        );
        state.commands.push(DeviceCommand::CreateProgram(id));
        (id, result)
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        if state.programs.remove(&program).is_none() {
            log::warn!("delete of unknown program {program:?}");
        }
        if state.current_program == Some(program) {
            state.current_program = None;
        }
        state.commands.push(DeviceCommand::DeleteProgram(program));
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform> {
        let state = self.state.borrow();
        match state.programs.get(&program).and_then(|p| p.linked.as_ref()) {
            Some(linked) => linked.active_uniforms(),
            None => Vec::new(),
        }
    }

    fn use_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        state.current_program = Some(program);
        state.commands.push(DeviceCommand::UseProgram(program));
    }

    fn set_uniform(&self, program: ProgramId, name: &str, value: UniformValue) {
        let mut state = self.state.borrow_mut();
        let Some(entry) = state.programs.get_mut(&program) else {
            return;
        };
        let accepted = entry
            .linked
            .as_ref()
            .and_then(|linked| linked.active_uniforms().into_iter().find(|u| u.name == name))
            .is_some_and(|u| value.fits(u.ty));
        if !accepted {
            return;
        }
        entry.values.insert(name.to_owned(), value);
        state.commands.push(DeviceCommand::SetUniform {
            program,
            name: name.to_owned(),
            value,
        });
    }

    fn create_texture(&self, desc: &TextureDescriptor, pixels: &[u8]) -> TextureId {
        let id = TextureId(self.alloc());
        let mut state = self.state.borrow_mut();
        state.textures.insert(
            id,
            TextureData {
                desc: *desc,
                pixels: pixels.to_vec(),
            },
        );
        state.commands.push(DeviceCommand::CreateTexture(id));
        id
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut state = self.state.borrow_mut();
        if state.textures.remove(&texture).is_none() {
            log::warn!("delete of unknown texture {texture:?}");
        }
        state.units.retain(|_, t| *t != texture);
        state.commands.push(DeviceCommand::DeleteTexture(texture));
    }

    fn bind_texture(&self, unit: u32, texture: TextureId) {
        let mut state = self.state.borrow_mut();
        state.units.insert(unit, texture);
        state
            .commands
            .push(DeviceCommand::BindTexture { unit, texture });
    }

    fn create_geometry(&self, vertices: &[Vertex3d], indices: &[u32]) -> GeometryId {
        let id = GeometryId(self.alloc());
        let mut state = self.state.borrow_mut();
        state.geometries.insert(
            id,
            GeometryData {
                vertices: vertices.to_vec(),
                indices: indices.to_vec(),
            },
        );
        state.commands.push(DeviceCommand::CreateGeometry(id));
        id
    }

    fn delete_geometry(&self, geometry: GeometryId) {
        let mut state = self.state.borrow_mut();
        if state.geometries.remove(&geometry).is_none() {
            log::warn!("delete of unknown geometry {geometry:?}");
        }
        state.commands.push(DeviceCommand::DeleteGeometry(geometry));
    }

    fn draw_indexed(&self, geometry: GeometryId, topology: Topology, index_count: u32) {
        let mut state = self.state.borrow_mut();
        let Some(program) = state.current_program else {
            return;
        };
        let Some(entry) = state.programs.get(&program) else {
            return;
        };
        if entry.linked.is_none() || !state.geometries.contains_key(&geometry) {
            return;
        }
        let call = DrawCall {
            program,
            geometry,
            topology,
            index_count,
            uniforms: entry.values.clone(),
            textures: state.units.clone(),
            depth_test: state.capabilities.contains(&Capability::DepthTest),
            depth_write: state.depth_write,
            cull_face: state.capabilities.contains(&Capability::CullFace),
            blend: state.capabilities.contains(&Capability::Blend),
        };
        state.commands.push(DeviceCommand::Draw(call));
    }

    fn set_capability(&self, capability: Capability, enabled: bool) {
        let mut state = self.state.borrow_mut();
        if enabled {
            state.capabilities.insert(capability);
        } else {
            state.capabilities.remove(&capability);
        }
        state
            .commands
            .push(DeviceCommand::SetCapability(capability, enabled));
    }

    fn set_depth_write(&self, enabled: bool) {
        let mut state = self.state.borrow_mut();
        state.depth_write = enabled;
        state.commands.push(DeviceCommand::SetDepthWrite(enabled));
    }

    fn clear(&self, color: Color) {
        self.record(DeviceCommand::Clear(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::tests::{FRAGMENT, VERTEX};
    use crate::texture::TextureSettings;
    use glam::Mat4;

    fn program(device: &HeadlessDevice) -> ProgramId {
        let (vs, r1) = device.create_shader(ShaderStage::Vertex, VERTEX);
        let (fs, r2) = device.create_shader(ShaderStage::Fragment, FRAGMENT);
        r1.unwrap();
        r2.unwrap();
        let (program, result) = device.create_program(&[vs, fs]);
        result.unwrap();
        device.delete_shader(vs);
        device.delete_shader(fs);
        program
    }

    #[test]
    fn set_uniform_ignores_unknown_names_and_wrong_types() {
        let device = HeadlessDevice::new();
        let program = program(&device);

        device.set_uniform(program, "u_Missing", UniformValue::Float(1.0));
        device.set_uniform(program, "u_Model", UniformValue::Float(1.0));
        assert_eq!(device.uniform(program, "u_Missing"), None);
        assert_eq!(device.uniform(program, "u_Model"), None);

        device.set_uniform(program, "u_Model", Mat4::IDENTITY.into());
        assert_eq!(
            device.uniform(program, "u_Model"),
            Some(UniformValue::Mat4(Mat4::IDENTITY))
        );
    }

    #[test]
    fn program_outlives_its_shaders() {
        let device = HeadlessDevice::new();
        let program = program(&device);
        assert_eq!(device.live_shaders(), 0);
        assert_eq!(device.active_uniforms(program).len(), 15);
    }

    #[test]
    fn draw_snapshots_state() {
        let device = HeadlessDevice::new();
        let program = program(&device);
        let geometry = device.create_geometry(&[Vertex3d::default(); 3], &[0, 1, 2]);
        let texture = device.create_texture(
            &TextureDescriptor::new(1, 1, TextureSettings::default()),
            &[255; 4],
        );

        device.use_program(program);
        device.bind_texture(0, texture);
        device.set_uniform(program, "u_Texture", UniformValue::Int(0));
        device.set_capability(Capability::DepthTest, true);
        device.draw_indexed(geometry, Topology::TriangleList, 3);
        device.set_capability(Capability::DepthTest, false);

        let calls = device.draw_calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].depth_test);
        assert!(!calls[0].cull_face);
        assert_eq!(calls[0].textures.get(&0), Some(&texture));
        assert_eq!(calls[0].uniforms.get("u_Texture"), Some(&UniformValue::Int(0)));
    }

    #[test]
    fn failed_link_never_draws() {
        let device = HeadlessDevice::new();
        let (vs, _) = device.create_shader(ShaderStage::Vertex, VERTEX);
        let (program, result) = device.create_program(&[vs]);
        assert!(result.is_err());
        assert!(device.active_uniforms(program).is_empty());

        let geometry = device.create_geometry(&[Vertex3d::default(); 3], &[0, 1, 2]);
        device.use_program(program);
        device.draw_indexed(geometry, Topology::TriangleList, 3);
        assert!(device.draw_calls().is_empty());
    }
}
