//! Frame scheduler: features contribute passes, the renderer drives their
//! lifecycle once per frame.
//!
//! Per frame the renderer
//!
//! 1. asks every feature to enqueue its passes,
//! 2. sorts them by [`InsertionPoint`] (stable),
//! 3. configures all passes, then executes them in order,
//! 4. cleans up **every** enqueued pass, even when a phase failed,
//! 5. closes the frame on the transient pool.

use log::{debug, error};

use crate::backend::{BackendError, RenderBackend};
use crate::command::CommandBuffer;
use crate::error::PassError;
use crate::handle::TextureHandle;
use crate::stage::InsertionPoint;
use crate::texture::TextureDesc;
use crate::transient::{TransientPool, TransientTexture};

/// The camera color buffer passes read from and write to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraTarget {
    pub color: TextureHandle,
    pub desc: TextureDesc,
}

/// A unit of per-frame GPU work with a configure / execute / cleanup lifecycle.
pub trait ScriptablePass {
    fn name(&self) -> &str;

    fn insertion_point(&self) -> InsertionPoint;

    /// Allocate per-frame resources derived from the camera description.
    fn configure(
        &mut self,
        ctx: &mut FrameContext<'_>,
        camera_desc: &TextureDesc,
    ) -> Result<(), PassError>;

    /// Record and submit the pass's commands.
    fn execute(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), PassError>;

    /// Release per-frame resources. Must be safe to call in any state.
    fn cleanup(&mut self, ctx: &mut FrameContext<'_>);
}

/// A pluggable renderer extension that owns one or more passes.
pub trait RendererFeature {
    fn name(&self) -> &str;

    /// (Re)build the feature's passes. Called on registration and on every
    /// pipeline rebuild.
    fn create(&mut self);

    /// Enqueue this frame's passes.
    fn add_render_passes<'a>(&'a mut self, queue: &mut PassQueue<'a>, camera: &CameraTarget);
}

/// Passes enqueued for the current frame.
#[derive(Default)]
pub struct PassQueue<'a> {
    passes: Vec<&'a mut dyn ScriptablePass>,
}

impl<'a> PassQueue<'a> {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn enqueue(&mut self, pass: &'a mut dyn ScriptablePass) {
        self.passes.push(pass);
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    fn sort(&mut self) {
        self.passes.sort_by_key(|p| p.insertion_point());
    }
}

/// What a pass sees during one lifecycle phase.
pub struct FrameContext<'a> {
    backend: &'a mut dyn RenderBackend,
    pool: &'a mut TransientPool,
    frame_index: u64,
    camera: CameraTarget,
    submitted_commands: usize,
}

impl<'a> FrameContext<'a> {
    /// Open a context for `frame_index`; marks the frame on `pool`.
    pub fn new(
        backend: &'a mut dyn RenderBackend,
        pool: &'a mut TransientPool,
        frame_index: u64,
        camera: CameraTarget,
    ) -> Self {
        pool.begin_frame(frame_index);
        Self {
            backend,
            pool,
            frame_index,
            camera,
            submitted_commands: 0,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn camera(&self) -> &CameraTarget {
        &self.camera
    }

    pub fn backend(&mut self) -> &mut dyn RenderBackend {
        &mut *self.backend
    }

    pub fn acquire_transient(
        &mut self,
        name: &'static str,
        desc: &TextureDesc,
    ) -> Result<TransientTexture, BackendError> {
        self.pool.acquire(&mut *self.backend, name, desc)
    }

    pub fn release_transient(&mut self, texture: TransientTexture) {
        self.pool.release(texture);
    }

    pub fn submit(&mut self, commands: CommandBuffer) -> Result<(), BackendError> {
        let count = commands.gpu_command_count();
        self.backend.submit(commands)?;
        self.submitted_commands += count;
        Ok(())
    }

    /// GPU work commands submitted through this context.
    pub fn submitted_commands(&self) -> usize {
        self.submitted_commands
    }
}

/// Summary of one rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame_index: u64,
    pub passes: usize,
    pub submitted_commands: usize,
    pub leaked_transients: usize,
}

/// Owns registered features and the transient pool.
#[derive(Default)]
pub struct Renderer {
    features: Vec<Box<dyn RendererFeature>>,
    pool: TransientPool,
    frame_index: u64,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a feature; its `create` runs immediately.
    pub fn add_feature(&mut self, mut feature: Box<dyn RendererFeature>) {
        feature.create();
        debug!("Registered renderer feature '{}'", feature.name());
        self.features.push(feature);
    }

    /// Drop every registered feature.
    pub fn clear_features(&mut self) {
        self.features.clear();
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    /// Re-run `create` on every feature (e.g. after a settings change).
    pub fn rebuild(&mut self) {
        for feature in &mut self.features {
            feature.create();
        }
        debug!("Rebuilt {} renderer feature(s)", self.features.len());
    }

    pub fn pool(&self) -> &TransientPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut TransientPool {
        &mut self.pool
    }

    /// Index the next frame will use.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Run one frame of every enqueued pass against `camera`.
    pub fn render_frame(
        &mut self,
        backend: &mut dyn RenderBackend,
        camera: CameraTarget,
    ) -> Result<FrameStats, PassError> {
        let frame_index = self.frame_index;
        self.frame_index += 1;

        let mut queue = PassQueue::new();
        for feature in self.features.iter_mut() {
            feature.add_render_passes(&mut queue, &camera);
        }
        queue.sort();

        let mut ctx = FrameContext::new(backend, &mut self.pool, frame_index, camera);
        let result = run_passes(&mut queue, &mut ctx, &camera.desc);
        for pass in queue.passes.iter_mut() {
            pass.cleanup(&mut ctx);
        }
        let submitted_commands = ctx.submitted_commands();
        let passes = queue.len();
        drop(ctx);
        let leaked_transients = self.pool.end_frame();

        match result {
            Ok(()) => Ok(FrameStats {
                frame_index,
                passes,
                submitted_commands,
                leaked_transients,
            }),
            Err(err) => {
                error!("Frame {} aborted: {}", frame_index, err);
                Err(err)
            }
        }
    }
}

fn run_passes(
    queue: &mut PassQueue<'_>,
    ctx: &mut FrameContext<'_>,
    camera_desc: &TextureDesc,
) -> Result<(), PassError> {
    for pass in queue.passes.iter_mut() {
        pass.configure(ctx, camera_desc)?;
    }
    for pass in queue.passes.iter_mut() {
        pass.execute(ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::backend::RecordingBackend;

    type Log = Rc<RefCell<Vec<String>>>;

    struct TracePass {
        name: &'static str,
        point: InsertionPoint,
        log: Log,
        fail_execute: bool,
        skip_release: bool,
        scratch: Option<TransientTexture>,
    }

    impl ScriptablePass for TracePass {
        fn name(&self) -> &str {
            self.name
        }

        fn insertion_point(&self) -> InsertionPoint {
            self.point
        }

        fn configure(
            &mut self,
            ctx: &mut FrameContext<'_>,
            camera_desc: &TextureDesc,
        ) -> Result<(), PassError> {
            self.log.borrow_mut().push(format!("configure {}", self.name));
            let tex = ctx
                .acquire_transient(self.name, &camera_desc.single_sampled())
                .map_err(|source| PassError::allocation(self.name, source))?;
            self.scratch = Some(tex);
            Ok(())
        }

        fn execute(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), PassError> {
            self.log.borrow_mut().push(format!("execute {}", self.name));
            if self.fail_execute {
                return Err(PassError::LifecycleMisuse {
                    pass: self.name.to_string(),
                    operation: "execute",
                    state: "broken",
                });
            }
            let Some(scratch) = &self.scratch else {
                return Ok(());
            };
            let mut cmd = CommandBuffer::new(self.name);
            cmd.copy(ctx.camera().color, scratch.handle());
            ctx.submit(cmd)?;
            Ok(())
        }

        fn cleanup(&mut self, ctx: &mut FrameContext<'_>) {
            self.log.borrow_mut().push(format!("cleanup {}", self.name));
            if let Some(tex) = self.scratch.take()
                && !self.skip_release
            {
                ctx.release_transient(tex);
            }
        }
    }

    struct TraceFeature {
        passes: Vec<TracePass>,
        creates: Rc<Cell<usize>>,
    }

    impl RendererFeature for TraceFeature {
        fn name(&self) -> &str {
            "trace"
        }

        fn create(&mut self) {
            self.creates.set(self.creates.get() + 1);
        }

        fn add_render_passes<'a>(&'a mut self, queue: &mut PassQueue<'a>, _: &CameraTarget) {
            for pass in &mut self.passes {
                queue.enqueue(pass);
            }
        }
    }

    fn trace_pass(name: &'static str, point: InsertionPoint, log: &Log) -> TracePass {
        TracePass {
            name,
            point,
            log: Rc::clone(log),
            fail_execute: false,
            skip_release: false,
            scratch: None,
        }
    }

    fn feature(passes: Vec<TracePass>) -> TraceFeature {
        TraceFeature {
            passes,
            creates: Rc::default(),
        }
    }

    fn camera(backend: &mut RecordingBackend) -> CameraTarget {
        let desc = TextureDesc::new(64, 64, wgpu::TextureFormat::Rgba16Float).with_samples(4);
        CameraTarget {
            color: backend.import_texture("camera", desc),
            desc,
        }
    }

    #[test]
    fn test_passes_run_in_insertion_order() {
        let log = Log::default();
        let mut backend = RecordingBackend::new();
        let camera = camera(&mut backend);
        let mut renderer = Renderer::new();
        renderer.add_feature(Box::new(feature(vec![
            trace_pass("post", InsertionPoint::BeforeRenderingPostProcessing, &log),
            trace_pass("sky-a", InsertionPoint::AfterRenderingSkybox, &log),
            trace_pass("sky-b", InsertionPoint::AfterRenderingSkybox, &log),
        ])));

        let stats = renderer.render_frame(&mut backend, camera).unwrap();
        assert_eq!(stats.passes, 3);
        assert_eq!(stats.submitted_commands, 3);
        assert_eq!(stats.leaked_transients, 0);
        assert_eq!(
            *log.borrow(),
            [
                "configure sky-a",
                "configure sky-b",
                "configure post",
                "execute sky-a",
                "execute sky-b",
                "execute post",
                "cleanup sky-a",
                "cleanup sky-b",
                "cleanup post",
            ]
        );
    }

    #[test]
    fn test_failed_execute_still_cleans_up() {
        let log = Log::default();
        let mut backend = RecordingBackend::new();
        let camera = camera(&mut backend);
        let mut failing = trace_pass("bad", InsertionPoint::AfterRenderingOpaques, &log);
        failing.fail_execute = true;

        let mut renderer = Renderer::new();
        renderer.add_feature(Box::new(feature(vec![
            failing,
            trace_pass("good", InsertionPoint::AfterRendering, &log),
        ])));

        let err = renderer.render_frame(&mut backend, camera).unwrap_err();
        assert!(err.is_lifecycle_misuse());
        let log = log.borrow();
        assert!(!log.contains(&"execute good".to_string()));
        assert!(log.contains(&"cleanup good".to_string()));
        assert!(log.contains(&"cleanup bad".to_string()));
        assert_eq!(renderer.pool().stats().outstanding, 0);
    }

    #[test]
    fn test_exhaustion_aborts_frame_and_releases() {
        let log = Log::default();
        // Only enough budget for one single-sampled scratch buffer.
        let one = TextureDesc::new(64, 64, wgpu::TextureFormat::Rgba16Float).byte_size();
        let mut backend = RecordingBackend::new().with_budget(one);
        let camera = camera(&mut backend);
        let mut renderer = Renderer::new();
        renderer.add_feature(Box::new(feature(vec![
            trace_pass("first", InsertionPoint::AfterRenderingSkybox, &log),
            trace_pass("second", InsertionPoint::AfterRenderingSkybox, &log),
        ])));

        let err = renderer.render_frame(&mut backend, camera).unwrap_err();
        assert!(err.is_resource_exhausted());
        assert!(backend.submissions().is_empty());
        assert!(!log.borrow().contains(&"execute first".to_string()));
        assert_eq!(renderer.pool().stats().outstanding, 0);
    }

    #[test]
    fn test_leaked_transient_reported() {
        let log = Log::default();
        let mut backend = RecordingBackend::new();
        let camera = camera(&mut backend);
        let mut leaky = trace_pass("leaky", InsertionPoint::AfterRenderingSkybox, &log);
        leaky.skip_release = true;

        let mut renderer = Renderer::new();
        renderer.add_feature(Box::new(feature(vec![leaky])));

        let stats = renderer.render_frame(&mut backend, camera).unwrap();
        assert_eq!(stats.leaked_transients, 1);
        assert_eq!(renderer.pool().stats().outstanding, 0);
    }

    #[test]
    fn test_frame_index_advances_and_pool_reuses() {
        let log = Log::default();
        let mut backend = RecordingBackend::new();
        let camera = camera(&mut backend);
        let mut renderer = Renderer::new();
        renderer.add_feature(Box::new(feature(vec![trace_pass(
            "p",
            InsertionPoint::AfterRenderingSkybox,
            &log,
        )])));

        for expected in 0..3 {
            let stats = renderer.render_frame(&mut backend, camera).unwrap();
            assert_eq!(stats.frame_index, expected);
        }
        assert_eq!(renderer.frame_index(), 3);
        assert_eq!(backend.created_count(), 1);
        assert_eq!(renderer.pool().stats().reused, 2);
    }

    #[test]
    fn test_rebuild_recreates_features() {
        let trace_feature = feature(Vec::new());
        let creates = Rc::clone(&trace_feature.creates);
        let mut renderer = Renderer::new();
        renderer.add_feature(Box::new(trace_feature));
        assert_eq!(creates.get(), 1);

        renderer.rebuild();
        assert_eq!(creates.get(), 2);
        assert_eq!(renderer.feature_names(), ["trace"]);

        let mut backend = RecordingBackend::new();
        let camera = camera(&mut backend);
        let stats = renderer.render_frame(&mut backend, camera).unwrap();
        assert_eq!(stats.passes, 0);
        assert_eq!(stats.submitted_commands, 0);
    }
}
