//! Host pipeline stages that passes can be inserted at.

use serde::{Deserialize, Serialize};

/// Point in the host frame at which a pass runs.
///
/// Variants are declared in execution order; passes are sorted by this
/// ordering (stable, so passes sharing a point keep their enqueue order).
#[derive(
    Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum InsertionPoint {
    BeforeRendering = 0,
    BeforeRenderingShadows = 1,
    AfterRenderingShadows = 2,
    BeforeRenderingPrePasses = 3,
    AfterRenderingPrePasses = 4,
    BeforeRenderingOpaques = 5,
    AfterRenderingOpaques = 6,
    BeforeRenderingSkybox = 7,
    /// Sky is drawn but transparent geometry is not; the default for
    /// atmospheric effects.
    #[default]
    AfterRenderingSkybox = 8,
    BeforeRenderingTransparents = 9,
    AfterRenderingTransparents = 10,
    BeforeRenderingPostProcessing = 11,
    AfterRenderingPostProcessing = 12,
    AfterRendering = 13,
}

impl InsertionPoint {
    pub const ALL: [Self; 14] = [
        Self::BeforeRendering,
        Self::BeforeRenderingShadows,
        Self::AfterRenderingShadows,
        Self::BeforeRenderingPrePasses,
        Self::AfterRenderingPrePasses,
        Self::BeforeRenderingOpaques,
        Self::AfterRenderingOpaques,
        Self::BeforeRenderingSkybox,
        Self::AfterRenderingSkybox,
        Self::BeforeRenderingTransparents,
        Self::AfterRenderingTransparents,
        Self::BeforeRenderingPostProcessing,
        Self::AfterRenderingPostProcessing,
        Self::AfterRendering,
    ];

    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeRendering => "BeforeRendering",
            Self::BeforeRenderingShadows => "BeforeRenderingShadows",
            Self::AfterRenderingShadows => "AfterRenderingShadows",
            Self::BeforeRenderingPrePasses => "BeforeRenderingPrePasses",
            Self::AfterRenderingPrePasses => "AfterRenderingPrePasses",
            Self::BeforeRenderingOpaques => "BeforeRenderingOpaques",
            Self::AfterRenderingOpaques => "AfterRenderingOpaques",
            Self::BeforeRenderingSkybox => "BeforeRenderingSkybox",
            Self::AfterRenderingSkybox => "AfterRenderingSkybox",
            Self::BeforeRenderingTransparents => "BeforeRenderingTransparents",
            Self::AfterRenderingTransparents => "AfterRenderingTransparents",
            Self::BeforeRenderingPostProcessing => "BeforeRenderingPostProcessing",
            Self::AfterRenderingPostProcessing => "AfterRenderingPostProcessing",
            Self::AfterRendering => "AfterRendering",
        }
    }
}
