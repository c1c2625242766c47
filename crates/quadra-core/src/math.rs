//! Quad geometry and projection math.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::constants::{INDICES_PER_QUAD, VERTICES_PER_QUAD};
use crate::types::Vertex;

/// Unit quad corners, counter-clockwise, centered on the origin.
pub const QUAD_TEMPLATE: [Vec4; 4] = [
    Vec4::new(-0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, 0.5, 0.0, 1.0),
    Vec4::new(-0.5, 0.5, 0.0, 1.0),
];

/// Normal shared by every quad vertex; rotation happens about this axis.
pub const QUAD_NORMAL: Vec3 = Vec3::Z;

/// Two triangles per quad, relative to the quad's first vertex.
pub const QUAD_INDEX_PATTERN: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Model transform for a quad: scale, then rotate about Z, then translate.
#[inline]
pub fn quad_transform(translation: Vec2, scale: Vec2, rotation: f32) -> Mat4 {
    Mat4::from_translation(translation.extend(0.0))
        * Mat4::from_rotation_z(rotation)
        * Mat4::from_scale(scale.extend(1.0))
}

/// Build the four vertices of a transformed quad.
pub fn quad_vertices(translation: Vec2, scale: Vec2, rotation: f32, color: Vec4) -> [Vertex; 4] {
    let transform = quad_transform(translation, scale, rotation);
    let color = color.to_array();
    let normal = QUAD_NORMAL.to_array();
    QUAD_TEMPLATE.map(|corner| Vertex::new((transform * corner).to_array(), color, normal))
}

/// Indices for `quad_count` quads, each using the fixed pattern offset by 4 vertices.
pub fn quad_indices(quad_count: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity((quad_count * INDICES_PER_QUAD) as usize);
    for quad in 0..quad_count {
        let base = quad * VERTICES_PER_QUAD;
        indices.extend(QUAD_INDEX_PATTERN.iter().map(|i| base + i));
    }
    indices
}

/// Fixed orthographic projection over [-1, 1] x [-1, 1].
///
/// Vulkan clip space has +Y pointing down, so Y is flipped to keep +Y up and
/// counter-clockwise quads front-facing. Depth [-1, 1] maps to [1, 0].
#[inline]
pub fn orthographic_projection() -> Mat4 {
    Mat4::orthographic_rh(-1.0, 1.0, 1.0, -1.0, -1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn index_pattern_repeats_per_quad() {
        let indices = quad_indices(3);
        assert_eq!(indices.len(), 18);
        for i in 0..3u32 {
            let start = (i * 6) as usize;
            let b = 4 * i;
            assert_eq!(
                &indices[start..start + 6],
                &[b, b + 1, b + 2, b + 2, b + 3, b]
            );
        }
    }

    #[test]
    fn identity_quad_matches_template() {
        let verts = quad_vertices(Vec2::ZERO, Vec2::ONE, 0.0, Vec4::ONE);
        for (vertex, corner) in verts.iter().zip(QUAD_TEMPLATE) {
            assert_eq!(vertex.position, corner.to_array());
            assert_eq!(vertex.color, [1.0; 4]);
            assert_eq!(vertex.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn scale_applies_before_translation() {
        let verts = quad_vertices(Vec2::new(1.0, 2.0), Vec2::splat(0.5), 0.0, Vec4::ONE);
        assert_relative_eq!(verts[0].position[0], 0.75);
        assert_relative_eq!(verts[0].position[1], 1.75);
        assert_relative_eq!(verts[2].position[0], 1.25);
        assert_relative_eq!(verts[2].position[1], 2.25);
    }

    #[test]
    fn rotation_is_about_normal_axis() {
        let verts = quad_vertices(
            Vec2::ZERO,
            Vec2::new(2.0, 1.0),
            std::f32::consts::FRAC_PI_2,
            Vec4::ONE,
        );
        // (-1, -0.5) rotated by 90 degrees -> (0.5, -1)
        assert_relative_eq!(verts[0].position[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(verts[0].position[1], -1.0, epsilon = 1e-6);
        assert_relative_eq!(verts[0].position[2], 0.0, epsilon = 1e-6);
        assert_relative_eq!(verts[0].position[3], 1.0);
    }

    #[test]
    fn projection_flips_y_and_maps_depth() {
        let p = orthographic_projection() * Vec4::new(0.5, 0.5, 0.0, 1.0);
        assert_relative_eq!(p.x, 0.5);
        assert_relative_eq!(p.y, -0.5);
        assert_relative_eq!(p.z, 0.5);
        assert_relative_eq!(p.w, 1.0);
    }

    #[test]
    fn projection_depth_range_is_reversed() {
        let near = orthographic_projection() * Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = orthographic_projection() * Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert_relative_eq!(near.z, 1.0);
        assert_relative_eq!(far.z, 0.0);
    }
}
