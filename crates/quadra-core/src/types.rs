//! Renderer data types.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_INDICES, INDICES_PER_QUAD, VERTICES_PER_QUAD};
use crate::error::{Error, Result};

/// Vertex consumed by the quad pipeline.
///
/// This structure must match the vertex inputs in `quad.vert`:
/// ```glsl
/// layout(location = 0) in vec4 a_position;  // offset 0
/// layout(location = 1) in vec4 a_color;     // offset 16
/// layout(location = 2) in vec3 a_normal;    // offset 32
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Homogeneous position.
    pub position: [f32; 4],
    /// RGBA color.
    pub color: [f32; 4],
    /// Surface normal.
    pub normal: [f32; 3],
}

impl Vertex {
    /// Size of one vertex in bytes (44).
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;
    pub const POSITION_OFFSET: u32 = std::mem::offset_of!(Self, position) as u32;
    pub const COLOR_OFFSET: u32 = std::mem::offset_of!(Self, color) as u32;
    pub const NORMAL_OFFSET: u32 = std::mem::offset_of!(Self, normal) as u32;

    /// Create a new vertex
    #[inline]
    pub const fn new(position: [f32; 4], color: [f32; 4], normal: [f32; 3]) -> Self {
        Self {
            position,
            color,
            normal,
        }
    }
}

/// Fixed capacity of a renderer, chosen at construction.
///
/// `max_vertices` is derived from `max_indices` so that every quad gets
/// four vertices and six indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CapabilitiesRepr", into = "CapabilitiesRepr")]
pub struct RendererCapabilities {
    max_indices: u32,
    max_vertices: u32,
}

impl RendererCapabilities {
    /// Create capabilities for the given index capacity.
    #[inline]
    pub const fn new(max_indices: u32) -> Self {
        let max_vertices = (max_indices as u64 * VERTICES_PER_QUAD as u64
            / INDICES_PER_QUAD as u64) as u32;
        Self {
            max_indices,
            max_vertices,
        }
    }

    /// Index capacity.
    #[inline]
    pub const fn max_indices(&self) -> u32 {
        self.max_indices
    }

    /// Vertex capacity (`max_indices * 4 / 6`).
    #[inline]
    pub const fn max_vertices(&self) -> u32 {
        self.max_vertices
    }

    /// Number of whole quads that fit in one frame.
    #[inline]
    pub const fn max_quads(&self) -> u32 {
        self.max_vertices / VERTICES_PER_QUAD
    }

    /// Check that the capacity can hold at least one quad.
    pub fn validate(&self) -> Result<()> {
        if self.max_quads() == 0 {
            return Err(Error::InvalidCapabilities(format!(
                "{} indices cannot hold a single quad",
                self.max_indices
            )));
        }
        Ok(())
    }
}

impl Default for RendererCapabilities {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INDICES)
    }
}

/// Serialized form: only the index capacity is stored, vertices are derived.
#[derive(Serialize, Deserialize)]
struct CapabilitiesRepr {
    max_indices: u32,
}

impl From<CapabilitiesRepr> for RendererCapabilities {
    fn from(repr: CapabilitiesRepr) -> Self {
        Self::new(repr.max_indices)
    }
}

impl From<RendererCapabilities> for CapabilitiesRepr {
    fn from(caps: RendererCapabilities) -> Self {
        Self {
            max_indices: caps.max_indices,
        }
    }
}

/// Per-frame renderer counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererStatistics {
    /// Indexed draw calls issued
    pub draw_calls: u32,
    /// Vertices accumulated
    pub vertex_count: u32,
    /// Indices referenced by the accumulated quads
    pub index_count: u32,
    /// Quads accumulated
    pub quad_count: u32,
}

impl RendererStatistics {
    /// Account for one quad.
    #[inline]
    pub fn record_quad(&mut self) {
        self.vertex_count += VERTICES_PER_QUAD;
        self.index_count += INDICES_PER_QUAD;
        self.quad_count += 1;
    }

    /// Account for one indexed draw call.
    #[inline]
    pub fn record_draw_call(&mut self) {
        self.draw_calls += 1;
    }

    /// Zero every counter.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout() {
        assert_eq!(Vertex::STRIDE, 44);
        assert_eq!(Vertex::POSITION_OFFSET, 0);
        assert_eq!(Vertex::COLOR_OFFSET, 16);
        assert_eq!(Vertex::NORMAL_OFFSET, 32);
    }

    #[test]
    fn capabilities_keep_quad_ratio() {
        let caps = RendererCapabilities::new(12);
        assert_eq!(caps.max_vertices(), 8);
        assert_eq!(caps.max_quads(), 2);

        let caps = RendererCapabilities::default();
        assert_eq!(caps.max_indices(), 9996);
        assert_eq!(caps.max_vertices(), 6664);
        assert_eq!(caps.max_quads(), 1666);
    }

    #[test]
    fn capabilities_floor_partial_quads() {
        // 10 * 4 / 6 = 6.67 -> 6 vertices, one whole quad
        let caps = RendererCapabilities::new(10);
        assert_eq!(caps.max_vertices(), 6);
        assert_eq!(caps.max_quads(), 1);
    }

    #[test]
    fn capabilities_validation() {
        assert!(RendererCapabilities::new(6).validate().is_ok());
        assert!(RendererCapabilities::new(5).validate().is_err());
        assert!(RendererCapabilities::new(0).validate().is_err());
    }

    #[test]
    fn capabilities_serialize_index_count_only() {
        let caps = RendererCapabilities::from(CapabilitiesRepr { max_indices: 12 });
        assert_eq!(caps, RendererCapabilities::new(12));
        let repr = CapabilitiesRepr::from(caps);
        assert_eq!(repr.max_indices, 12);
    }

    #[test]
    fn statistics_record_and_reset() {
        let mut stats = RendererStatistics::default();
        for _ in 0..3 {
            stats.record_quad();
        }
        stats.record_draw_call();

        assert_eq!(stats.quad_count, 3);
        assert_eq!(stats.vertex_count, 12);
        assert_eq!(stats.index_count, 18);
        assert_eq!(stats.draw_calls, 1);

        stats.reset();
        assert_eq!(stats, RendererStatistics::default());
    }
}
