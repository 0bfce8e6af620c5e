//! The per-frame scattering pass.
//!
//! Lifecycle, driven by the scheduler once per frame:
//!
//! ```text
//!            setup(target)
//!   Idle ───────────────────► Idle (target recorded)
//!    │ configure                       ▲
//!    ▼                                 │ cleanup (from any state)
//!   Configured ── execute ──► Executed ┘
//! ```
//!
//! Out-of-order calls return [`PassError::LifecycleMisuse`]; `cleanup` is the
//! one operation that is valid everywhere.

use std::sync::Arc;

use aether_render::{
    CommandBuffer, FrameContext, InsertionPoint, PassError, ScriptablePass, TextureDesc,
    TextureHandle, TransientTexture,
};
use tracing::{debug, debug_span};

use crate::descriptor::EffectDescriptor;

/// Profiling scope label and pass name.
pub const PROFILER_TAG: &str = "Atmospheric Scattering";
/// Name the scratch texture is allocated under.
pub const SCRATCH_NAME: &str = "atmospheric-scattering-scratch";

#[derive(Debug, Default)]
enum PassState {
    #[default]
    Idle,
    /// `scratch` is `None` when the effect is disabled for this frame.
    Configured { scratch: Option<TransientTexture> },
    Executed { scratch: Option<TransientTexture> },
}

impl PassState {
    fn phase(&self) -> PassPhase {
        match self {
            Self::Idle => PassPhase::Idle,
            Self::Configured { .. } => PassPhase::Configured,
            Self::Executed { .. } => PassPhase::Executed,
        }
    }
}

/// Observable lifecycle phase of a [`ScatteringPass`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassPhase {
    Idle,
    Configured,
    Executed,
}

impl PassPhase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Configured => "configured",
            Self::Executed => "executed",
        }
    }
}

/// Copy-then-shade pass applying the scattering material to the camera target.
#[derive(Debug)]
pub struct ScatteringPass {
    descriptor: Arc<EffectDescriptor>,
    insertion_point: InsertionPoint,
    target: Option<TextureHandle>,
    enabled: bool,
    state: PassState,
}

impl ScatteringPass {
    pub fn new(descriptor: Arc<EffectDescriptor>, insertion_point: InsertionPoint) -> Self {
        Self {
            descriptor,
            insertion_point,
            target: None,
            enabled: false,
            state: PassState::Idle,
        }
    }

    /// Record this frame's color target and decide whether the effect runs.
    ///
    /// The enabled flag holds for the rest of the frame so `configure` and
    /// `execute` always agree.
    pub fn setup(&mut self, target: TextureHandle) {
        self.target = Some(target);
        self.enabled = self.descriptor.is_valid();
    }

    pub fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    pub fn phase(&self) -> PassPhase {
        self.state.phase()
    }

    pub fn target(&self) -> Option<TextureHandle> {
        self.target
    }

    /// Whether this frame's `setup` enabled the effect.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Description of the scratch texture held this frame, if any.
    pub fn scratch_desc(&self) -> Option<TextureDesc> {
        match &self.state {
            PassState::Configured { scratch } | PassState::Executed { scratch } => {
                scratch.as_ref().map(|s| *s.desc())
            }
            PassState::Idle => None,
        }
    }

    fn misuse(&self, operation: &'static str, state: &'static str) -> PassError {
        PassError::LifecycleMisuse {
            pass: PROFILER_TAG.to_string(),
            operation,
            state,
        }
    }
}

impl ScriptablePass for ScatteringPass {
    fn name(&self) -> &str {
        PROFILER_TAG
    }

    fn insertion_point(&self) -> InsertionPoint {
        self.insertion_point
    }

    fn configure(
        &mut self,
        ctx: &mut FrameContext<'_>,
        camera_desc: &TextureDesc,
    ) -> Result<(), PassError> {
        if !matches!(self.state, PassState::Idle) {
            return Err(self.misuse("configure", self.state.phase().name()));
        }
        if self.target.is_none() {
            return Err(self.misuse("configure", "no target was set up"));
        }
        if !self.enabled {
            self.state = PassState::Configured { scratch: None };
            return Ok(());
        }

        let desc = camera_desc.single_sampled();
        let scratch = ctx
            .acquire_transient(SCRATCH_NAME, &desc)
            .map_err(|source| PassError::allocation(SCRATCH_NAME, source))?;
        debug!(
            frame = ctx.frame_index(),
            width = desc.width,
            height = desc.height,
            "scattering scratch allocated"
        );
        self.state = PassState::Configured {
            scratch: Some(scratch),
        };
        Ok(())
    }

    fn execute(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), PassError> {
        let scratch = match &self.state {
            PassState::Configured { scratch } => scratch.as_ref().map(TransientTexture::handle),
            other => return Err(self.misuse("execute", other.phase().name())),
        };
        self.state = match std::mem::take(&mut self.state) {
            PassState::Configured { scratch } => PassState::Executed { scratch },
            other => other,
        };

        // Disabled: nothing recorded, nothing submitted.
        let (Some(scratch), Some(material), Some(target)) =
            (scratch, self.descriptor.material(), self.target)
        else {
            return Ok(());
        };

        let _span = debug_span!("atmospheric_scattering", frame = ctx.frame_index()).entered();
        let mut cmd = CommandBuffer::new(PROFILER_TAG);
        {
            let mut scope = cmd.scope(PROFILER_TAG);
            scope.copy(target, scratch).blit(
                scratch,
                target,
                material,
                0,
                self.descriptor.parameters().clone(),
            );
        }
        ctx.submit(cmd)?;
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut FrameContext<'_>) {
        match std::mem::take(&mut self.state) {
            PassState::Idle => {}
            PassState::Configured { scratch } | PassState::Executed { scratch } => {
                if let Some(scratch) = scratch {
                    ctx.release_transient(scratch);
                }
            }
        }
        self.target = None;
        self.enabled = false;
    }
}

#[cfg(test)]
#[path = "pass_tests.rs"]
mod tests;
