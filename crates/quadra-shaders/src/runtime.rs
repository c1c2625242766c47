//! Runtime GLSL compilation.

use crate::error::{Result, ShaderError};
use shaderc::{CompileOptions, Compiler, OptimizationLevel, ShaderKind};
use std::path::Path;

/// Same level the build script compiles the bundled shaders with.
const OPTIMIZATION_LEVEL: OptimizationLevel = OptimizationLevel::Performance;

/// Vertex and fragment SPIR-V for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPair {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

fn compiler() -> Result<(Compiler, CompileOptions<'static>)> {
    let compiler = Compiler::new().ok_or_else(|| ShaderError::Compile {
        name: "<compiler>".to_string(),
        message: "Failed to create shader compiler".to_string(),
    })?;
    let mut options = CompileOptions::new().ok_or_else(|| ShaderError::Compile {
        name: "<options>".to_string(),
        message: "Failed to create compile options".to_string(),
    })?;
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_1 as u32,
    );
    options.set_target_spirv(shaderc::SpirvVersion::V1_3);
    options.set_optimization_level(OPTIMIZATION_LEVEL);
    Ok((compiler, options))
}

fn compile_one(
    compiler: &Compiler,
    options: &CompileOptions<'_>,
    source: &str,
    kind: ShaderKind,
    name: &str,
) -> Result<Vec<u32>> {
    let artifact = compiler
        .compile_into_spirv(source, kind, name, "main", Some(options))
        .map_err(|e| ShaderError::Compile {
            name: name.to_string(),
            message: e.to_string(),
        })?;

    if artifact.get_num_warnings() > 0 {
        tracing::warn!(
            shader = name,
            warnings = %artifact.get_warning_messages(),
            "Shader compiled with warnings"
        );
    }

    let words = artifact.as_binary().to_vec();
    crate::check_magic(&words)?;
    Ok(words)
}

/// Compile a vertex and a fragment shader from GLSL source text.
pub fn compile_glsl(vertex_src: &str, fragment_src: &str) -> Result<ShaderPair> {
    let (compiler, options) = compiler()?;
    Ok(ShaderPair {
        vertex: compile_one(&compiler, &options, vertex_src, ShaderKind::Vertex, "quad.vert")?,
        fragment: compile_one(
            &compiler,
            &options,
            fragment_src,
            ShaderKind::Fragment,
            "quad.frag",
        )?,
    })
}

/// Compile a vertex and a fragment shader from GLSL files.
pub fn compile_files(vertex_path: &Path, fragment_path: &Path) -> Result<ShaderPair> {
    let read = |path: &Path| {
        std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    let vertex_src = read(vertex_path)?;
    let fragment_src = read(fragment_path)?;

    let (compiler, options) = compiler()?;
    let name = |path: &Path| path.display().to_string();
    Ok(ShaderPair {
        vertex: compile_one(
            &compiler,
            &options,
            &vertex_src,
            ShaderKind::Vertex,
            &name(vertex_path),
        )?,
        fragment: compile_one(
            &compiler,
            &options,
            &fragment_src,
            ShaderKind::Fragment,
            &name(fragment_path),
        )?,
    })
}
