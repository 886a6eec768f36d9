//! WGSL shader compiler for the editor path.
//!
//! [`compile_shader`] reads a WGSL file, injects the environment definitions
//! as `const` declarations, and parses and validates the result with naga.
//! The output bytes are what [`Rhi::create_vertex_shader`](crate::Rhi::create_vertex_shader)
//! and friends accept.

use std::collections::BTreeMap;
use std::path::Path;

use lumen_core::profile_scope;

use crate::error::ShaderCompileError;
use crate::types::{ShaderCompilerFlags, ShaderFrequency};

/// Definitions and flags applied to one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderCompilerEnvironment {
    /// `NAME -> value` pairs emitted as `const NAME = value;`.
    pub definitions: BTreeMap<String, String>,
    pub flags: ShaderCompilerFlags,
}

impl ShaderCompilerEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_definition(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.definitions.insert(name.into(), value.to_string());
        self
    }

    pub fn with_flags(mut self, flags: ShaderCompilerFlags) -> Self {
        self.flags |= flags;
        self
    }
}

/// Result of a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCompilerOutput {
    /// WGSL source ready for the backend.
    pub code: Vec<u8>,
    pub entry_point: String,
    /// Expression and statement count of the entry point, as a size estimate.
    pub num_instructions: u32,
    pub frequency: ShaderFrequency,
}

/// Compile the entry point `function_name` of the WGSL file at `source_file`.
pub fn compile_shader(
    source_file: impl AsRef<Path>,
    function_name: &str,
    frequency: ShaderFrequency,
    environment: &ShaderCompilerEnvironment,
) -> Result<ShaderCompilerOutput, ShaderCompileError> {
    let path = source_file.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| {
        let err = ShaderCompileError::SourceNotFound {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        log::error!("{err}");
        err
    })?;
    compile_shader_source(&source, function_name, frequency, environment)
}

/// Compile WGSL held in memory.
pub fn compile_shader_source(
    source: &str,
    function_name: &str,
    frequency: ShaderFrequency,
    environment: &ShaderCompilerEnvironment,
) -> Result<ShaderCompilerOutput, ShaderCompileError> {
    profile_scope!("compile_shader");
    compile_inner(source, function_name, frequency, environment).inspect_err(|e| {
        log::error!("Shader compile of '{function_name}' ({frequency}) failed: {e}");
    })
}

fn compile_inner(
    source: &str,
    function_name: &str,
    frequency: ShaderFrequency,
    environment: &ShaderCompilerEnvironment,
) -> Result<ShaderCompilerOutput, ShaderCompileError> {
    let stage = naga_stage(frequency)
        .ok_or_else(|| ShaderCompileError::UnsupportedFrequency(frequency.to_string()))?;

    let full_source = inject_definitions(source, &environment.definitions);

    let module = naga::front::wgsl::parse_str(&full_source)
        .map_err(|e| ShaderCompileError::Parse(e.emit_to_string(&full_source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    );
    let info = validator
        .validate(&module)
        .map_err(|e| ShaderCompileError::Validation(e.emit_to_string(&full_source)))?;

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == function_name && ep.stage == stage)
        .ok_or_else(|| ShaderCompileError::MissingEntryPoint {
            name: function_name.to_string(),
            frequency: frequency.to_string(),
        })?;
    let num_instructions =
        (entry.function.expressions.len() + count_statements(&entry.function.body)) as u32;

    if environment
        .flags
        .intersects(ShaderCompilerFlags::PREFER_FLOW_CONTROL | ShaderCompilerFlags::AVOID_FLOW_CONTROL)
    {
        log::trace!("Flow control hints have no WGSL equivalent, ignoring");
    }

    // Debug builds keep the authored source so names and comments survive.
    let code = if environment.flags.contains(ShaderCompilerFlags::DEBUG) {
        full_source
    } else {
        naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty())
            .map_err(|e| ShaderCompileError::Emit(e.to_string()))?
    };

    log::debug!(
        "Compiled {frequency} shader '{function_name}' ({num_instructions} instructions)"
    );

    Ok(ShaderCompilerOutput {
        code: code.into_bytes(),
        entry_point: function_name.to_string(),
        num_instructions,
        frequency,
    })
}

fn naga_stage(frequency: ShaderFrequency) -> Option<naga::ShaderStage> {
    match frequency {
        ShaderFrequency::Vertex => Some(naga::ShaderStage::Vertex),
        ShaderFrequency::Pixel => Some(naga::ShaderStage::Fragment),
        ShaderFrequency::Compute => Some(naga::ShaderStage::Compute),
        ShaderFrequency::Hull | ShaderFrequency::Domain | ShaderFrequency::Geometry => None,
    }
}

fn inject_definitions(source: &str, definitions: &BTreeMap<String, String>) -> String {
    if definitions.is_empty() {
        return source.to_string();
    }
    let mut out = String::with_capacity(source.len() + definitions.len() * 32);
    for (name, value) in definitions {
        out.push_str(&format!("const {name} = {value};\n"));
    }
    out.push_str(source);
    out
}

fn count_statements(block: &naga::Block) -> usize {
    block
        .iter()
        .map(|statement| match statement {
            naga::Statement::Block(inner) => count_statements(inner),
            naga::Statement::If { accept, reject, .. } => {
                1 + count_statements(accept) + count_statements(reject)
            }
            naga::Statement::Loop {
                body, continuing, ..
            } => 1 + count_statements(body) + count_statements(continuing),
            naga::Statement::Switch { cases, .. } => {
                1 + cases.iter().map(|c| count_statements(&c.body)).sum::<usize>()
            }
            _ => 1,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position * SCALE, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
}
"#;

    fn env() -> ShaderCompilerEnvironment {
        ShaderCompilerEnvironment::new().with_definition("SCALE", "2.0")
    }

    #[test]
    fn test_compile_vertex_entry() {
        let output = compile_shader_source(SOURCE, "vs_main", ShaderFrequency::Vertex, &env())
            .unwrap();
        assert_eq!(output.entry_point, "vs_main");
        assert_eq!(output.frequency, ShaderFrequency::Vertex);
        assert!(output.num_instructions > 0);
        assert!(!output.code.is_empty());
    }

    #[test]
    fn test_missing_definition_is_diagnosed() {
        let result = compile_shader_source(
            SOURCE,
            "vs_main",
            ShaderFrequency::Vertex,
            &ShaderCompilerEnvironment::new(),
        );
        match result {
            Err(ShaderCompileError::Parse(text)) => assert!(text.contains("SCALE")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_entry_point_must_match_stage() {
        let result = compile_shader_source(SOURCE, "fs_main", ShaderFrequency::Vertex, &env());
        assert!(matches!(
            result,
            Err(ShaderCompileError::MissingEntryPoint { .. })
        ));
    }

    #[test]
    fn test_geometry_is_unsupported() {
        let result = compile_shader_source(SOURCE, "vs_main", ShaderFrequency::Geometry, &env());
        assert_eq!(
            result,
            Err(ShaderCompileError::UnsupportedFrequency("gs_5_0".into()))
        );
    }

    #[test]
    fn test_debug_flag_keeps_source() {
        let env = env().with_flags(ShaderCompilerFlags::DEBUG);
        let output =
            compile_shader_source(SOURCE, "fs_main", ShaderFrequency::Pixel, &env).unwrap();
        let code = String::from_utf8(output.code).unwrap();
        assert!(code.starts_with("const SCALE = 2.0;"));
    }

    #[test]
    fn test_missing_file() {
        let result = compile_shader(
            "does/not/exist.wgsl",
            "vs_main",
            ShaderFrequency::Vertex,
            &env(),
        );
        assert!(matches!(
            result,
            Err(ShaderCompileError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn test_compile_from_file() {
        let path = std::env::temp_dir().join(format!("lumen_shader_{}.wgsl", std::process::id()));
        std::fs::write(&path, SOURCE).unwrap();
        let output = compile_shader(&path, "fs_main", ShaderFrequency::Pixel, &env()).unwrap();
        assert_eq!(output.frequency, ShaderFrequency::Pixel);
        let _ = std::fs::remove_file(&path);
    }
}
