//! Per-frame state machine: `begin_scene`, `draw_quad`*, `end_scene`.
//!
//! [`FrameExecutor`] owns the CPU side of a frame (vertex accumulation,
//! statistics, acquire recovery) and drives a [`FrameBackend`] for every GPU
//! interaction. Exactly one frame is in flight: `end_scene` waits for the
//! submitted work before presenting.

use crate::camera::{Camera, MvpUniform};
use crate::error::{RenderError, Result};
use crate::geometry::QuadBatch;
use glam::{Vec2, Vec4};
use quadra_core::{RendererCapabilities, RendererStatistics, Vertex};
use quadra_gpu::{AcquireOutcome, GpuError};

/// Acquire attempts per frame before giving up.
pub const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

/// GPU operations the frame state machine is built from.
pub trait FrameBackend {
    /// Whether the window has a non-zero drawable area.
    fn is_presentable(&self) -> bool;

    /// Whether the swapchain-dependent resources are all live.
    fn is_ready(&self) -> bool;

    /// Reset the command buffer, begin recording and write the MVP uniform.
    fn begin_recording(&mut self, mvp: &MvpUniform) -> Result<()>;

    /// Ask the swapchain for the next image.
    fn acquire_next_image(&mut self) -> Result<AcquireOutcome>;

    /// Rebuild the swapchain, depth buffer, framebuffers and pipeline.
    ///
    /// Returns `false` if the surface has no area and the rebuild was deferred.
    fn resize(&mut self) -> Result<bool>;

    /// Replace a lost surface. Swapchain resources are torn down with it.
    fn recreate_surface(&mut self) -> Result<()>;

    /// Begin the render pass on an acquired image and bind frame state.
    fn begin_render_pass(&mut self, image_index: u32) -> Result<()>;

    /// Upload vertices, draw, submit, wait for completion and present.
    ///
    /// Returns `true` if presentation found the swapchain out of date.
    fn submit_and_present(
        &mut self,
        image_index: u32,
        vertices: &[Vertex],
        index_count: u32,
    ) -> Result<bool>;

    /// Block until the GPU is idle.
    fn wait_idle(&self) -> Result<()>;
}

/// Where the executor is within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Between frames.
    Idle,
    /// Recording into the render pass of an acquired image.
    Recording { image_index: u32 },
    /// The frame is dropped: draws are accepted but nothing is submitted.
    Skipped,
}

/// Frame state machine over a [`FrameBackend`].
pub struct FrameExecutor<B: FrameBackend> {
    backend: B,
    batch: QuadBatch,
    statistics: RendererStatistics,
    last_statistics: RendererStatistics,
    state: FrameState,
    poisoned: bool,
    resize_requested: bool,
    overflow_warned: bool,
    suboptimal_warned: bool,
}

impl<B: FrameBackend> FrameExecutor<B> {
    /// Wrap a backend whose buffers were sized for `capabilities`.
    pub fn new(backend: B, capabilities: RendererCapabilities) -> Result<Self> {
        capabilities.validate()?;
        Ok(Self {
            backend,
            batch: QuadBatch::new(capabilities),
            statistics: RendererStatistics::default(),
            last_statistics: RendererStatistics::default(),
            state: FrameState::Idle,
            poisoned: false,
            resize_requested: false,
            overflow_warned: false,
            suboptimal_warned: false,
        })
    }

    /// Start a frame viewed through `camera`.
    ///
    /// Acquires the next image, recovering from an out-of-date swapchain or a
    /// lost surface. If the window has no area the frame is skipped.
    pub fn begin_scene(&mut self, camera: &Camera) -> Result<()> {
        if self.poisoned {
            return Ok(());
        }
        if self.state != FrameState::Idle {
            return Err(RenderError::SceneAlreadyBegun);
        }

        self.statistics.reset();
        self.batch.clear();
        self.overflow_warned = false;

        let result = self.begin_frame(camera);
        self.guard(result)
    }

    fn begin_frame(&mut self, camera: &Camera) -> Result<()> {
        if !self.backend.is_presentable() {
            tracing::trace!("Window has no area, skipping frame");
            self.state = FrameState::Skipped;
            return Ok(());
        }

        if self.resize_requested || !self.backend.is_ready() {
            self.resize_requested = false;
            if !self.resize()? {
                self.state = FrameState::Skipped;
                return Ok(());
            }
        }

        self.backend.begin_recording(&MvpUniform::from(camera))?;

        match self.acquire()? {
            Some(image_index) => {
                self.backend.begin_render_pass(image_index)?;
                self.state = FrameState::Recording { image_index };
            }
            None => self.state = FrameState::Skipped,
        }
        Ok(())
    }

    fn acquire(&mut self) -> Result<Option<u32>> {
        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            match self.backend.acquire_next_image()? {
                AcquireOutcome::Acquired {
                    image_index,
                    suboptimal,
                } => {
                    if suboptimal && !self.suboptimal_warned {
                        tracing::warn!("Swapchain is suboptimal, continuing");
                        self.suboptimal_warned = true;
                    }
                    return Ok(Some(image_index));
                }
                AcquireOutcome::OutOfDate => {
                    tracing::debug!(attempt, "Swapchain out of date");
                    if !self.resize()? {
                        return Ok(None);
                    }
                }
                AcquireOutcome::SurfaceLost => {
                    tracing::warn!(attempt, "Surface lost, recreating");
                    self.backend.recreate_surface()?;
                    if !self.resize()? {
                        return Ok(None);
                    }
                }
            }
        }

        Err(GpuError::InvalidState(format!(
            "No swapchain image after {MAX_ACQUIRE_ATTEMPTS} attempts"
        ))
        .into())
    }

    fn resize(&mut self) -> Result<bool> {
        let ready = self.backend.resize()?;
        if ready {
            self.suboptimal_warned = false;
        }
        Ok(ready)
    }

    /// Queue a quad for this frame.
    ///
    /// Scale is applied first, then rotation about Z by `rotation` radians,
    /// then translation. Fails with [`RenderError::CapacityExceeded`] once the
    /// frame is full, leaving the frame untouched.
    pub fn draw_quad(
        &mut self,
        translation: Vec2,
        scale: Vec2,
        rotation: f32,
        color: Vec4,
    ) -> Result<()> {
        if self.poisoned {
            return Ok(());
        }
        if self.state == FrameState::Idle {
            return Err(RenderError::NotRecording);
        }

        if let Err(e) = self.batch.push_quad(translation, scale, rotation, color) {
            if !self.overflow_warned {
                tracing::warn!(
                    max_quads = self.batch.capabilities().max_quads(),
                    "Quad capacity reached, dropping further quads this frame"
                );
                self.overflow_warned = true;
            }
            return Err(e);
        }

        self.statistics.record_quad();
        Ok(())
    }

    /// Queue an opaque white quad.
    pub fn draw_quad_white(&mut self, translation: Vec2, scale: Vec2, rotation: f32) -> Result<()> {
        self.draw_quad(translation, scale, rotation, Vec4::ONE)
    }

    /// Draw the accumulated quads, submit, wait and present.
    ///
    /// Statistics and accumulated quads are reset whatever the outcome.
    pub fn end_scene(&mut self) -> Result<()> {
        if self.poisoned {
            return Ok(());
        }

        let result = match std::mem::replace(&mut self.state, FrameState::Idle) {
            FrameState::Idle => Err(RenderError::NotRecording),
            FrameState::Skipped => Ok(()),
            FrameState::Recording { image_index } => {
                let submitted = self.submit(image_index);
                self.guard(submitted)
            }
        };

        self.statistics.reset();
        self.batch.clear();
        result
    }

    fn submit(&mut self, image_index: u32) -> Result<()> {
        // One indexed draw per frame, even with no quads
        self.statistics.record_draw_call();
        let out_of_date = self.backend.submit_and_present(
            image_index,
            self.batch.vertices(),
            self.batch.index_count(),
        )?;
        self.last_statistics = self.statistics;

        if out_of_date {
            tracing::debug!("Swapchain out of date at present, resizing next frame");
            self.resize_requested = true;
        }
        Ok(())
    }

    /// Poison the executor on fatal errors so later calls do nothing.
    fn guard(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            if e.is_fatal() {
                tracing::debug!(error = %e, "Renderer stopped after fatal error");
                self.poisoned = true;
                self.state = FrameState::Idle;
            }
        }
        result
    }

    /// Rebuild swapchain resources before the next frame.
    pub fn request_resize(&mut self) {
        self.resize_requested = true;
    }

    /// Counters of the frame being recorded.
    pub fn statistics(&self) -> RendererStatistics {
        self.statistics
    }

    /// Counters of the most recently submitted frame.
    pub fn last_frame_statistics(&self) -> RendererStatistics {
        self.last_statistics
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Whether a fatal error has stopped the renderer.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn capabilities(&self) -> RendererCapabilities {
        self.batch.capabilities()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Block until the GPU is idle.
    pub fn wait_idle(&self) -> Result<()> {
        self.backend.wait_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use quadra_gpu::swapchain::calculate_extent;
    use quadra_gpu::{scissor, viewport};
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        BeginRecording,
        Acquire,
        Resize,
        RecreateSurface,
        BeginRenderPass(u32),
        Submit {
            image_index: u32,
            vertices: usize,
            indices: u32,
        },
    }

    /// Viewport and scissor recorded by one render pass.
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct DynamicState {
        viewport: [f32; 6],
        scissor: [i64; 4],
    }

    impl DynamicState {
        fn for_extent(extent: vk::Extent2D) -> Self {
            let vp = viewport(extent);
            let rect = scissor(extent);
            Self {
                viewport: [vp.x, vp.y, vp.width, vp.height, vp.min_depth, vp.max_depth],
                scissor: [
                    i64::from(rect.offset.x),
                    i64::from(rect.offset.y),
                    i64::from(rect.extent.width),
                    i64::from(rect.extent.height),
                ],
            }
        }
    }

    struct MockBackend {
        calls: Vec<Call>,
        surface: vk::SurfaceCapabilitiesKHR,
        window_size: (u32, u32),
        extent: vk::Extent2D,
        dynamic_states: Vec<DynamicState>,
        acquires: VecDeque<Result<AcquireOutcome>>,
        presentable: bool,
        ready: bool,
        resize_ready: bool,
        present_out_of_date: bool,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                surface: vk::SurfaceCapabilitiesKHR {
                    current_extent: vk::Extent2D {
                        width: u32::MAX,
                        height: u32::MAX,
                    },
                    min_image_extent: vk::Extent2D {
                        width: 1,
                        height: 1,
                    },
                    max_image_extent: vk::Extent2D {
                        width: 4096,
                        height: 4096,
                    },
                    ..Default::default()
                },
                window_size: (800, 600),
                extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                dynamic_states: Vec::new(),
                acquires: VecDeque::new(),
                presentable: true,
                ready: true,
                resize_ready: true,
                present_out_of_date: false,
            }
        }

        fn with_acquires(outcomes: impl IntoIterator<Item = Result<AcquireOutcome>>) -> Self {
            let mut backend = Self::new();
            backend.acquires = outcomes.into_iter().collect();
            backend
        }
    }

    fn acquired(image_index: u32) -> Result<AcquireOutcome> {
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    impl FrameBackend for MockBackend {
        fn is_presentable(&self) -> bool {
            self.presentable
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn begin_recording(&mut self, _mvp: &MvpUniform) -> Result<()> {
            self.calls.push(Call::BeginRecording);
            Ok(())
        }

        fn acquire_next_image(&mut self) -> Result<AcquireOutcome> {
            self.calls.push(Call::Acquire);
            self.acquires.pop_front().unwrap_or_else(|| acquired(0))
        }

        fn resize(&mut self) -> Result<bool> {
            self.calls.push(Call::Resize);
            let (width, height) = self.window_size;
            self.extent = calculate_extent(&self.surface, width, height);
            self.ready = self.resize_ready;
            Ok(self.resize_ready)
        }

        fn recreate_surface(&mut self) -> Result<()> {
            self.calls.push(Call::RecreateSurface);
            self.ready = false;
            Ok(())
        }

        fn begin_render_pass(&mut self, image_index: u32) -> Result<()> {
            self.calls.push(Call::BeginRenderPass(image_index));
            self.dynamic_states.push(DynamicState::for_extent(self.extent));
            Ok(())
        }

        fn submit_and_present(
            &mut self,
            image_index: u32,
            vertices: &[Vertex],
            index_count: u32,
        ) -> Result<bool> {
            self.calls.push(Call::Submit {
                image_index,
                vertices: vertices.len(),
                indices: index_count,
            });
            Ok(std::mem::take(&mut self.present_out_of_date))
        }

        fn wait_idle(&self) -> Result<()> {
            Ok(())
        }
    }

    fn executor(backend: MockBackend) -> FrameExecutor<MockBackend> {
        FrameExecutor::new(backend, RendererCapabilities::default()).unwrap()
    }

    fn draw_one(frame: &mut FrameExecutor<MockBackend>) -> Result<()> {
        frame.draw_quad_white(Vec2::ZERO, Vec2::splat(0.5), 0.0)
    }

    #[test]
    fn single_quad_frame() {
        let mut frame = executor(MockBackend::new());
        let camera = Camera::new();

        frame.begin_scene(&camera).unwrap();
        assert_eq!(frame.state(), FrameState::Recording { image_index: 0 });
        draw_one(&mut frame).unwrap();
        assert_eq!(frame.statistics().quad_count, 1);
        frame.end_scene().unwrap();

        assert_eq!(
            frame.backend().calls,
            vec![
                Call::BeginRecording,
                Call::Acquire,
                Call::BeginRenderPass(0),
                Call::Submit {
                    image_index: 0,
                    vertices: 4,
                    indices: 6
                },
            ]
        );
        assert_eq!(frame.statistics(), RendererStatistics::default());
        assert_eq!(
            frame.last_frame_statistics(),
            RendererStatistics {
                draw_calls: 1,
                vertex_count: 4,
                index_count: 6,
                quad_count: 1,
            }
        );
        assert_eq!(frame.state(), FrameState::Idle);
    }

    #[test]
    fn statistics_track_quad_count() {
        let mut frame = executor(MockBackend::new());
        let camera = Camera::new();

        for quads in [0u32, 1, 7, 100] {
            frame.begin_scene(&camera).unwrap();
            for _ in 0..quads {
                draw_one(&mut frame).unwrap();
            }
            let stats = frame.statistics();
            assert_eq!(stats.quad_count, quads);
            assert_eq!(stats.vertex_count, 4 * quads);
            assert_eq!(stats.index_count, 6 * quads);
            frame.end_scene().unwrap();

            assert_eq!(frame.statistics(), RendererStatistics::default());
            assert_eq!(frame.last_frame_statistics().draw_calls, 1);
            assert_eq!(frame.last_frame_statistics().quad_count, quads);
        }
    }

    #[test]
    fn out_of_date_rebuilds_before_continuing() {
        let backend = MockBackend::with_acquires([Ok(AcquireOutcome::OutOfDate), acquired(1)]);
        let mut frame = executor(backend);

        frame.begin_scene(&Camera::new()).unwrap();
        draw_one(&mut frame).unwrap();
        frame.end_scene().unwrap();

        assert_eq!(
            frame.backend().calls[..5],
            [
                Call::BeginRecording,
                Call::Acquire,
                Call::Resize,
                Call::Acquire,
                Call::BeginRenderPass(1),
            ]
        );
    }

    #[test]
    fn repeated_resize_at_same_size_keeps_dynamic_state() {
        let backend = MockBackend::with_acquires([
            Ok(AcquireOutcome::OutOfDate),
            acquired(0),
            Ok(AcquireOutcome::OutOfDate),
            acquired(1),
        ]);
        let mut frame = executor(backend);

        for _ in 0..2 {
            frame.begin_scene(&Camera::new()).unwrap();
            draw_one(&mut frame).unwrap();
            frame.end_scene().unwrap();
        }

        let backend = frame.backend();
        let resizes = backend.calls.iter().filter(|c| **c == Call::Resize).count();
        assert_eq!(resizes, 2);
        assert_eq!(backend.dynamic_states.len(), 2);
        assert_eq!(backend.dynamic_states[0], backend.dynamic_states[1]);
        assert_eq!(
            backend.dynamic_states[0],
            DynamicState::for_extent(vk::Extent2D {
                width: 800,
                height: 600,
            })
        );
    }

    #[test]
    fn resize_to_new_size_changes_dynamic_state() {
        let backend = MockBackend::with_acquires([acquired(0)]);
        let mut frame = executor(backend);

        frame.begin_scene(&Camera::new()).unwrap();
        frame.end_scene().unwrap();

        frame.backend_mut().window_size = (1024, 768);
        frame.request_resize();
        frame.begin_scene(&Camera::new()).unwrap();
        frame.end_scene().unwrap();

        let states = &frame.backend().dynamic_states;
        assert_eq!(states.len(), 2);
        assert_ne!(states[0], states[1]);
        assert_eq!(states[1].viewport[2..4], [1024.0, 768.0]);
        assert_eq!(states[1].scissor[2..], [1024, 768]);
    }

    #[test]
    fn suboptimal_frame_proceeds_without_resize() {
        let backend = MockBackend::with_acquires([Ok(AcquireOutcome::Acquired {
            image_index: 2,
            suboptimal: true,
        })]);
        let mut frame = executor(backend);

        frame.begin_scene(&Camera::new()).unwrap();
        frame.end_scene().unwrap();

        assert!(!frame.backend().calls.contains(&Call::Resize));
        assert!(frame.backend().calls.contains(&Call::BeginRenderPass(2)));
    }

    #[test]
    fn surface_lost_recreates_surface_then_resizes() {
        let backend = MockBackend::with_acquires([Ok(AcquireOutcome::SurfaceLost), acquired(0)]);
        let mut frame = executor(backend);

        frame.begin_scene(&Camera::new()).unwrap();

        assert_eq!(
            frame.backend().calls,
            vec![
                Call::BeginRecording,
                Call::Acquire,
                Call::RecreateSurface,
                Call::Resize,
                Call::Acquire,
                Call::BeginRenderPass(0),
            ]
        );
    }

    #[test]
    fn acquire_attempts_are_bounded() {
        let backend = MockBackend::with_acquires(
            std::iter::repeat_with(|| Ok(AcquireOutcome::OutOfDate))
                .take(MAX_ACQUIRE_ATTEMPTS as usize),
        );
        let mut frame = executor(backend);

        let err = frame.begin_scene(&Camera::new()).unwrap_err();
        assert!(matches!(err, RenderError::Gpu(GpuError::InvalidState(_))));
        assert!(frame.is_poisoned());
        let acquires = frame
            .backend()
            .calls
            .iter()
            .filter(|c| **c == Call::Acquire)
            .count();
        assert_eq!(acquires, MAX_ACQUIRE_ATTEMPTS as usize);
    }

    #[test]
    fn fatal_error_stops_the_renderer() {
        let backend = MockBackend::with_acquires([Err(GpuError::Call {
            op: "acquire next image",
            result: vk::Result::ERROR_DEVICE_LOST,
        }
        .into())]);
        let mut frame = executor(backend);
        let camera = Camera::new();

        assert!(frame.begin_scene(&camera).is_err());
        assert!(frame.is_poisoned());
        let calls = frame.backend().calls.len();

        frame.begin_scene(&camera).unwrap();
        draw_one(&mut frame).unwrap();
        frame.end_scene().unwrap();
        assert_eq!(frame.backend().calls.len(), calls);
    }

    #[test]
    fn zero_area_window_skips_frame() {
        let mut backend = MockBackend::new();
        backend.presentable = false;
        let mut frame = executor(backend);

        frame.begin_scene(&Camera::new()).unwrap();
        assert_eq!(frame.state(), FrameState::Skipped);
        draw_one(&mut frame).unwrap();
        frame.end_scene().unwrap();

        assert!(frame.backend().calls.is_empty());
        assert_eq!(frame.statistics(), RendererStatistics::default());
        assert_eq!(frame.state(), FrameState::Idle);
    }

    #[test]
    fn deferred_resize_skips_frame() {
        let mut backend = MockBackend::with_acquires([Ok(AcquireOutcome::OutOfDate)]);
        backend.resize_ready = false;
        let mut frame = executor(backend);

        frame.begin_scene(&Camera::new()).unwrap();
        assert_eq!(frame.state(), FrameState::Skipped);
        frame.end_scene().unwrap();

        assert!(!frame
            .backend()
            .calls
            .iter()
            .any(|c| matches!(c, Call::Submit { .. })));

        // Still torn down: the next frame retries the rebuild first
        frame.backend_mut().resize_ready = true;
        frame.backend_mut().calls.clear();
        frame.begin_scene(&Camera::new()).unwrap();
        assert_eq!(frame.backend().calls[0], Call::Resize);
    }

    #[test]
    fn out_of_date_present_resizes_next_frame() {
        let mut backend = MockBackend::new();
        backend.present_out_of_date = true;
        let mut frame = executor(backend);
        let camera = Camera::new();

        frame.begin_scene(&camera).unwrap();
        frame.end_scene().unwrap();
        frame.backend_mut().calls.clear();

        frame.begin_scene(&camera).unwrap();
        assert_eq!(frame.backend().calls[0], Call::Resize);
    }

    #[test]
    fn draws_outside_a_scene_are_rejected() {
        let mut frame = executor(MockBackend::new());
        assert!(matches!(
            draw_one(&mut frame),
            Err(RenderError::NotRecording)
        ));
        assert!(matches!(frame.end_scene(), Err(RenderError::NotRecording)));

        frame.begin_scene(&Camera::new()).unwrap();
        assert!(matches!(
            frame.begin_scene(&Camera::new()),
            Err(RenderError::SceneAlreadyBegun)
        ));
        assert!(!frame.is_poisoned());
    }

    #[test]
    fn overflow_rejects_and_keeps_frame() {
        let backend = MockBackend::new();
        let mut frame = FrameExecutor::new(backend, RendererCapabilities::new(12)).unwrap();

        frame.begin_scene(&Camera::new()).unwrap();
        draw_one(&mut frame).unwrap();
        draw_one(&mut frame).unwrap();
        assert!(matches!(
            draw_one(&mut frame),
            Err(RenderError::CapacityExceeded { max_quads: 2 })
        ));
        assert_eq!(frame.statistics().quad_count, 2);
        frame.end_scene().unwrap();

        assert_eq!(
            frame.backend().calls.last(),
            Some(&Call::Submit {
                image_index: 0,
                vertices: 8,
                indices: 12
            })
        );
    }

    #[test]
    fn invalid_capabilities_are_rejected() {
        assert!(matches!(
            FrameExecutor::new(MockBackend::new(), RendererCapabilities::new(5)),
            Err(RenderError::Core(_))
        ));
    }
}
