//! Shaders for the Quadra quad pipeline.
//!
//! The GLSL sources under `shaders/` are compiled to SPIR-V at build time using
//! shaderc. With the `runtime-compile` feature, GLSL can also be compiled while
//! the application runs.
//!
//! Shader interface shared by every quad pipeline:
//! - vertex inputs: location 0 `vec4` position, 1 `vec4` color, 2 `vec3` normal
//! - set 0, binding 0: uniform block holding the `mat4` MVP matrix
//! - set 0, binding 1: reserved uniform block

mod error;
#[cfg(feature = "runtime-compile")]
pub mod runtime;

pub use error::{Result, ShaderError};
#[cfg(feature = "runtime-compile")]
pub use runtime::{compile_files, compile_glsl, ShaderPair};

use std::sync::OnceLock;

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Embedded SPIR-V shader bytecode (raw bytes, may not be aligned).
mod spirv_bytes {
    pub static QUAD_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/quad_vert.spv"));
    pub static QUAD_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/quad_frag.spv"));
}

fn to_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Convert a byte slice to SPIR-V words.
///
/// Fails when the length is not a multiple of four or the magic number is missing.
pub fn spirv_from_bytes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(ShaderError::InvalidSpirv(format!(
            "length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    let words = to_words(bytes);
    check_magic(&words)?;
    Ok(words)
}

pub(crate) fn check_magic(words: &[u32]) -> Result<()> {
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(()),
        Some(&word) => Err(ShaderError::InvalidSpirv(format!(
            "bad magic number {word:#010x}"
        ))),
        None => Err(ShaderError::InvalidSpirv("empty module".to_string())),
    }
}

/// Convert build-script output to SPIR-V words (SPIR-V requires 4-byte alignment).
fn embedded(bytes: &[u8]) -> Vec<u32> {
    assert!(
        bytes.len() % 4 == 0,
        "SPIR-V bytecode must be 4-byte aligned"
    );
    to_words(bytes)
}

static QUAD_VERT_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static QUAD_FRAG_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();

/// Get the quad vertex shader as a u32 slice for Vulkan.
pub fn quad_vertex_shader() -> &'static [u32] {
    QUAD_VERT_SPIRV.get_or_init(|| embedded(spirv_bytes::QUAD_VERT))
}

/// Get the quad fragment shader as a u32 slice for Vulkan.
pub fn quad_fragment_shader() -> &'static [u32] {
    QUAD_FRAG_SPIRV.get_or_init(|| embedded(spirv_bytes::QUAD_FRAG))
}
