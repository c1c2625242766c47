//! Quad geometry: per-frame vertex accumulation and the GPU buffers it is
//! copied into.

use crate::error::{RenderError, Result};
use ash::vk;
use glam::{Vec2, Vec4};
use quadra_core::math::{quad_indices, quad_vertices};
use quadra_core::{RendererCapabilities, Vertex};
use quadra_gpu::{GraphicsContext, HostBuffer};

/// Vertices accumulated between `begin_scene` and `end_scene`.
///
/// Storage is reserved once for the full capacity and reused every frame.
#[derive(Debug, Clone)]
pub struct QuadBatch {
    capabilities: RendererCapabilities,
    vertices: Vec<Vertex>,
}

impl QuadBatch {
    pub fn new(capabilities: RendererCapabilities) -> Self {
        Self {
            capabilities,
            vertices: Vec::with_capacity(capabilities.max_vertices() as usize),
        }
    }

    /// Append one transformed quad.
    ///
    /// Fails without appending anything once the frame holds `max_quads` quads.
    pub fn push_quad(
        &mut self,
        translation: Vec2,
        scale: Vec2,
        rotation: f32,
        color: Vec4,
    ) -> Result<()> {
        if self.is_full() {
            return Err(RenderError::CapacityExceeded {
                max_quads: self.capabilities.max_quads(),
            });
        }
        self.vertices
            .extend_from_slice(&quad_vertices(translation, scale, rotation, color));
        Ok(())
    }

    /// Whether another quad would exceed the vertex capacity.
    pub fn is_full(&self) -> bool {
        self.quad_count() >= self.capabilities.max_quads()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn quad_count(&self) -> u32 {
        self.vertices.len() as u32 / 4
    }

    /// Indices to draw for the accumulated quads.
    pub fn index_count(&self) -> u32 {
        self.quad_count() * 6
    }

    pub fn capabilities(&self) -> RendererCapabilities {
        self.capabilities
    }

    /// Drop the accumulated vertices, keeping the allocation.
    pub fn clear(&mut self) {
        self.vertices.clear();
    }
}

/// Host-visible vertex and index buffers sized to the renderer capacity.
///
/// The vertex buffer stays mapped for its whole lifetime. The index buffer is
/// filled once with the repeating quad pattern and then unmapped.
pub struct GeometryBuffer {
    vertex_buffer: HostBuffer,
    index_buffer: HostBuffer,
    capabilities: RendererCapabilities,
}

impl GeometryBuffer {
    /// Allocate both buffers and write the index pattern.
    ///
    /// # Safety
    /// The context must be valid.
    pub unsafe fn new(ctx: &GraphicsContext, capabilities: RendererCapabilities) -> Result<Self> {
        let device = ctx.device();
        let vertex_size = u64::from(capabilities.max_vertices()) * u64::from(Vertex::STRIDE);
        let indices = quad_indices(capabilities.max_quads());
        let index_size = std::mem::size_of_val(indices.as_slice()) as u64;

        let mut vertex_buffer = HostBuffer::new(
            device,
            ctx.memory_properties(),
            vertex_size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;

        let index_buffer = HostBuffer::new(
            device,
            ctx.memory_properties(),
            index_size,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )
        .and_then(|mut buffer| match buffer.write(&indices) {
            Ok(()) => {
                buffer.unmap(device);
                Ok(buffer)
            }
            Err(e) => {
                buffer.destroy(device);
                Err(e)
            }
        });

        let index_buffer = match index_buffer {
            Ok(buffer) => buffer,
            Err(e) => {
                vertex_buffer.destroy(device);
                return Err(e.into());
            }
        };

        tracing::debug!(
            vertex_bytes = vertex_size,
            index_bytes = index_size,
            max_quads = capabilities.max_quads(),
            "Geometry buffers created"
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            capabilities,
        })
    }

    /// Copy a frame's vertices into the mapped vertex buffer.
    pub fn upload(&self, vertices: &[Vertex]) -> Result<()> {
        if vertices.len() > self.capabilities.max_vertices() as usize {
            return Err(RenderError::CapacityExceeded {
                max_quads: self.capabilities.max_quads(),
            });
        }
        self.vertex_buffer.write(vertices)?;
        Ok(())
    }

    /// Bind the vertex and index buffers.
    ///
    /// # Safety
    /// The command buffer must be recording.
    pub unsafe fn bind(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
        device.cmd_bind_index_buffer(cmd, self.index_buffer.buffer, 0, vk::IndexType::UINT32);
    }

    /// Unmap and free both buffers.
    ///
    /// # Safety
    /// The buffers must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        self.vertex_buffer.destroy(device);
        self.index_buffer.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Vec4 = Vec4::ONE;

    fn push(batch: &mut QuadBatch) -> Result<()> {
        batch.push_quad(Vec2::ZERO, Vec2::splat(0.5), 0.0, WHITE)
    }

    #[test]
    fn push_appends_four_vertices() {
        let mut batch = QuadBatch::new(RendererCapabilities::default());
        push(&mut batch).unwrap();
        push(&mut batch).unwrap();

        assert_eq!(batch.vertices().len(), 8);
        assert_eq!(batch.quad_count(), 2);
        assert_eq!(batch.index_count(), 12);
        assert_eq!(batch.vertices()[0].position, [-0.25, -0.25, 0.0, 1.0]);
        assert_eq!(batch.vertices()[2].position, [0.25, 0.25, 0.0, 1.0]);
    }

    #[test]
    fn overflow_is_rejected_without_appending() {
        // 12 indices -> 8 vertices -> 2 quads
        let mut batch = QuadBatch::new(RendererCapabilities::new(12));
        push(&mut batch).unwrap();
        push(&mut batch).unwrap();
        assert!(batch.is_full());

        let err = push(&mut batch).unwrap_err();
        assert!(matches!(err, RenderError::CapacityExceeded { max_quads: 2 }));
        assert_eq!(batch.vertices().len(), 8);
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut batch = QuadBatch::new(RendererCapabilities::new(60));
        let capacity = batch.vertices.capacity();
        push(&mut batch).unwrap();
        batch.clear();

        assert!(batch.vertices().is_empty());
        assert_eq!(batch.index_count(), 0);
        assert_eq!(batch.vertices.capacity(), capacity);
    }
}
