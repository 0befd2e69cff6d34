//! WGSL front end shared by both devices.
//!
//! [`compile`] parses and validates one stage with naga and collects the
//! module-scope resources it declares. [`link`] combines a vertex and a
//! fragment stage into one binding table.
//!
//! Resources follow a flat convention: every uniform is its own
//! `var<uniform>` of a scalar, vector or square matrix type, every texture is
//! a `texture_2d<f32>` and a sampler named `<texture>_sampler` samples that
//! texture.
//!
//! ```wgsl
//! @group(0) @binding(0) var<uniform> u_Model: mat4x4f;
//! @group(1) @binding(0) var u_Texture: texture_2d<f32>;
//! @group(1) @binding(1) var u_Texture_sampler: sampler;
//! ```

use crate::device::{ActiveUniform, ShaderStage, UniformType};
use crate::error::ShaderError;
use naga::{AddressSpace, ImageClass, ImageDimension, ScalarKind, TypeInner, VectorSize};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Suffix naming the sampler paired with a texture.
pub const SAMPLER_SUFFIX: &str = "_sampler";

/// What a module-scope resource binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Uniform(UniformType),
    Texture,
    Sampler,
}

/// One `@group(g) @binding(b)` resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: BindingKind,
}

/// A stage that passed parsing and validation.
#[derive(Debug)]
pub struct CompiledStage {
    pub stage: ShaderStage,
    pub source: String,
    pub entry_point: String,
    pub bindings: Vec<ResourceBinding>,
}

/// The merged binding table of a vertex and a fragment stage.
#[derive(Debug)]
pub struct LinkedProgram {
    pub vertex: Rc<CompiledStage>,
    pub fragment: Rc<CompiledStage>,
    /// Sorted by group, then binding.
    pub bindings: Vec<ResourceBinding>,
}

impl LinkedProgram {
    pub fn binding(&self, name: &str) -> Option<&ResourceBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    /// Uniforms and textures, in binding order. Samplers are not listed.
    pub fn active_uniforms(&self) -> Vec<ActiveUniform> {
        self.bindings
            .iter()
            .filter_map(|b| {
                let ty = match b.kind {
                    BindingKind::Uniform(ty) => ty,
                    BindingKind::Texture => UniformType::Sampler2D,
                    BindingKind::Sampler => return None,
                };
                Some(ActiveUniform {
                    name: b.name.clone(),
                    ty,
                    group: b.group,
                    binding: b.binding,
                })
            })
            .collect()
    }

    /// Highest bind group index used, if any resource is declared.
    pub fn max_group(&self) -> Option<u32> {
        self.bindings.iter().map(|b| b.group).max()
    }

    /// Resources of one bind group.
    pub fn group(&self, group: u32) -> impl Iterator<Item = &ResourceBinding> {
        self.bindings.iter().filter(move |b| b.group == group)
    }
}

/// Parses and validates `source` as a `stage` shader.
pub fn compile(stage: ShaderStage, source: &str) -> Result<CompiledStage, ShaderError> {
    let fail = |log: String| ShaderError::Compile { stage, log };

    let module = naga::front::wgsl::parse_str(source).map_err(|e| fail(e.emit_to_string(source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    );
    validator
        .validate(&module)
        .map_err(|e| fail(e.as_inner().to_string()))?;

    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage.to_naga())
        .map(|ep| ep.name.clone())
        .ok_or_else(|| fail(format!("no {stage:?} entry point")))?;

    let mut bindings = Vec::new();
    for (_, global) in module.global_variables.iter() {
        let kind = match global.space {
            AddressSpace::Uniform | AddressSpace::Handle => {
                binding_kind(&module.types[global.ty].inner)
            }
            AddressSpace::Private | AddressSpace::WorkGroup | AddressSpace::Function => continue,
            other => Err(format!("{other:?} globals are not supported")),
        };
        let name = global.name.clone().unwrap_or_default();
        let kind = kind.map_err(|why| fail(format!("`{name}`: {why}")))?;
        let Some(res) = &global.binding else {
            return Err(fail(format!("`{name}` has no @group/@binding")));
        };
        bindings.push(ResourceBinding {
            name,
            group: res.group,
            binding: res.binding,
            kind,
        });
    }

    Ok(CompiledStage {
        stage,
        source: source.to_owned(),
        entry_point,
        bindings,
    })
}

fn binding_kind(inner: &TypeInner) -> Result<BindingKind, String> {
    let uniform = |ty| Ok(BindingKind::Uniform(ty));
    match *inner {
        TypeInner::Scalar(s) if s == naga::Scalar::I32 => uniform(UniformType::Int),
        TypeInner::Scalar(s) if s == naga::Scalar::F32 => uniform(UniformType::Float),
        TypeInner::Vector { size, scalar } if scalar == naga::Scalar::F32 => match size {
            VectorSize::Bi => uniform(UniformType::Vec2),
            VectorSize::Tri => uniform(UniformType::Vec3),
            VectorSize::Quad => uniform(UniformType::Vec4),
        },
        TypeInner::Matrix {
            columns: VectorSize::Tri,
            rows: VectorSize::Tri,
            scalar,
        } if scalar == naga::Scalar::F32 => uniform(UniformType::Mat3),
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar == naga::Scalar::F32 => uniform(UniformType::Mat4),
        TypeInner::Image {
            dim: ImageDimension::D2,
            arrayed: false,
            class:
                ImageClass::Sampled {
                    kind: ScalarKind::Float,
                    multi: false,
                },
        } => Ok(BindingKind::Texture),
        TypeInner::Sampler { comparison: false } => Ok(BindingKind::Sampler),
        _ => Err("unsupported uniform type".to_owned()),
    }
}

/// Links compiled stages into one program.
///
/// Exactly one vertex and one fragment stage are required. A name declared in
/// both stages must agree on group, binding and type, and two different names
/// may not share a slot.
pub fn link(stages: &[Rc<CompiledStage>]) -> Result<LinkedProgram, ShaderError> {
    let pick = |stage: ShaderStage| -> Result<Rc<CompiledStage>, ShaderError> {
        let mut found = stages.iter().filter(|s| s.stage == stage);
        match (found.next(), found.next()) {
            (Some(s), None) => Ok(Rc::clone(s)),
            (None, _) => Err(ShaderError::Link(format!("no {stage:?} stage attached"))),
            (Some(_), Some(_)) => Err(ShaderError::Link(format!(
                "more than one {stage:?} stage attached"
            ))),
        }
    };
    let vertex = pick(ShaderStage::Vertex)?;
    let fragment = pick(ShaderStage::Fragment)?;

    let mut by_name: BTreeMap<&str, &ResourceBinding> = BTreeMap::new();
    let mut by_slot: BTreeMap<(u32, u32), &ResourceBinding> = BTreeMap::new();
    for b in vertex.bindings.iter().chain(fragment.bindings.iter()) {
        if let Some(prev) = by_name.get(b.name.as_str()) {
            if *prev != b {
                return Err(ShaderError::Link(format!(
                    "`{}` is declared differently across stages",
                    b.name
                )));
            }
            continue;
        }
        if let Some(prev) = by_slot.get(&(b.group, b.binding)) {
            return Err(ShaderError::Link(format!(
                "`{}` and `{}` both use group {} binding {}",
                prev.name, b.name, b.group, b.binding
            )));
        }
        by_name.insert(&b.name, b);
        by_slot.insert((b.group, b.binding), b);
    }

    let bindings = by_slot.into_values().cloned().collect();
    Ok(LinkedProgram {
        vertex,
        fragment,
        bindings,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const VERTEX: &str = r#"
@group(0) @binding(0) var<uniform> u_Model: mat4x4f;
@group(0) @binding(1) var<uniform> u_View: mat4x4f;
@group(0) @binding(2) var<uniform> u_Projection: mat4x4f;
@group(0) @binding(3) var<uniform> u_Rotation: mat4x4f;
@group(0) @binding(4) var<uniform> u_ViewPosition: vec3f;
@group(0) @binding(5) var<uniform> u_ViewInverseRotation: mat4x4f;

struct VertexOutput {
    @builtin(position) clip: vec4f,
    @location(0) normal: vec3f,
    @location(1) uv: vec2f,
    @location(2) to_eye: vec3f,
}

@vertex
fn vs_main(
    @location(0) position: vec3f,
    @location(1) normal: vec3f,
    @location(2) uv: vec2f,
) -> VertexOutput {
    var out: VertexOutput;
    let world = u_Model * vec4f(position, 1.0);
    out.clip = u_Projection * u_View * world;
    out.normal = (u_Rotation * vec4f(normal, 0.0)).xyz;
    out.uv = uv;
    out.to_eye = (u_ViewInverseRotation * vec4f(u_ViewPosition - world.xyz, 0.0)).xyz;
    return out;
}
"#;

    pub const FRAGMENT: &str = r#"
@group(1) @binding(0) var<uniform> u_Color: vec4f;
@group(1) @binding(1) var<uniform> u_Shininess: f32;
@group(1) @binding(2) var<uniform> u_Tiling: vec2f;
@group(1) @binding(3) var<uniform> u_Tint: vec3f;
@group(1) @binding(4) var<uniform> u_Mode: i32;
@group(1) @binding(5) var u_Texture: texture_2d<f32>;
@group(1) @binding(6) var u_Texture_sampler: sampler;
@group(2) @binding(0) var<uniform> u_AmbientColor: vec3f;
@group(2) @binding(1) var<uniform> u_LightDirection: vec3f;
@group(2) @binding(2) var<uniform> u_LightColor: vec3f;

@fragment
fn fs_main(@location(0) normal: vec3f, @location(1) uv: vec2f) -> @location(0) vec4f {
    let base = textureSample(u_Texture, u_Texture_sampler, uv * u_Tiling) * u_Color;
    let diffuse = max(dot(normalize(normal), -u_LightDirection), 0.0) * u_LightColor;
    var rgb = base.rgb * u_Tint * (u_AmbientColor + diffuse);
    if u_Mode == 1 {
        rgb = rgb + vec3f(u_Shininess);
    }
    return vec4f(rgb, base.a);
}
"#;

    #[test]
    fn compile_reflects_uniforms_and_entry_point() {
        let stage = compile(ShaderStage::Vertex, VERTEX).unwrap();
        assert_eq!(stage.entry_point, "vs_main");
        assert_eq!(stage.bindings.len(), 6);
        assert_eq!(
            stage.bindings[0],
            ResourceBinding {
                name: "u_Model".into(),
                group: 0,
                binding: 0,
                kind: BindingKind::Uniform(UniformType::Mat4),
            }
        );
    }

    #[test]
    fn compile_rejects_syntax_errors() {
        let err = compile(ShaderStage::Fragment, "fn broken( {").unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
    }

    #[test]
    fn compile_requires_matching_entry_point() {
        let err = compile(ShaderStage::Fragment, VERTEX).unwrap_err();
        assert!(err.to_string().contains("entry point"), "{err}");
    }

    #[test]
    fn compile_rejects_struct_uniforms() {
        let src = r#"
struct Globals { a: vec4f }
@group(0) @binding(0) var<uniform> globals: Globals;
@vertex fn vs_main() -> @builtin(position) vec4f { return globals.a; }
"#;
        let err = compile(ShaderStage::Vertex, src).unwrap_err();
        assert!(err.to_string().contains("globals"), "{err}");
    }

    #[test]
    fn link_merges_and_sorts_bindings() {
        let vs = Rc::new(compile(ShaderStage::Vertex, VERTEX).unwrap());
        let fs = Rc::new(compile(ShaderStage::Fragment, FRAGMENT).unwrap());
        let program = link(&[fs, vs]).unwrap();

        assert_eq!(program.bindings.len(), 6 + 10);
        assert_eq!(program.max_group(), Some(2));
        let uniforms = program.active_uniforms();
        assert_eq!(uniforms.len(), 15);
        let texture = uniforms.iter().find(|u| u.name == "u_Texture").unwrap();
        assert_eq!(texture.ty, UniformType::Sampler2D);
        assert!(program.binding("u_Texture_sampler").is_some());
    }

    #[test]
    fn link_requires_both_stages() {
        let vs = Rc::new(compile(ShaderStage::Vertex, VERTEX).unwrap());
        assert!(matches!(link(&[vs.clone()]), Err(ShaderError::Link(_))));
        assert!(matches!(link(&[vs.clone(), vs]), Err(ShaderError::Link(_))));
    }

    #[test]
    fn link_rejects_conflicting_declarations() {
        let fs = r#"
@group(0) @binding(0) var<uniform> u_Model: vec4f;
@fragment fn fs_main() -> @location(0) vec4f { return u_Model; }
"#;
        let vs = Rc::new(compile(ShaderStage::Vertex, VERTEX).unwrap());
        let fs = Rc::new(compile(ShaderStage::Fragment, fs).unwrap());
        assert!(matches!(link(&[vs, fs]), Err(ShaderError::Link(_))));
    }
}
