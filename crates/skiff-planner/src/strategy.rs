use std::fmt;
use std::time::Duration;

use skiff_common::config::JoinConfig;
use skiff_ir::JoinKind;

use crate::plan::NativeJoinKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemiAntiStrategy {
    pub anti: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniBatchStrategy {
    pub left_outer: bool,
    pub right_outer: bool,
    pub size: usize,
    pub allow_latency: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeBridgeStrategy {
    pub native_kind: NativeJoinKind,
}

/// Execution strategy of one join operator; chosen once during translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    SemiAnti(SemiAntiStrategy),
    MiniBatch(MiniBatchStrategy),
    NativeBridge(NativeBridgeStrategy),
}

impl JoinStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            JoinStrategy::SemiAnti(_) => "semi-anti",
            JoinStrategy::MiniBatch(_) => "mini-batch",
            JoinStrategy::NativeBridge(_) => "native-bridge",
        }
    }

    pub fn uses_keyed_state(&self) -> bool {
        !matches!(self, JoinStrategy::NativeBridge(_))
    }
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub fn select_strategy(kind: JoinKind, config: &JoinConfig) -> JoinStrategy {
    let native_kind = match kind {
        JoinKind::Semi => return JoinStrategy::SemiAnti(SemiAntiStrategy { anti: false }),
        JoinKind::Anti => return JoinStrategy::SemiAnti(SemiAntiStrategy { anti: true }),
        JoinKind::Inner => NativeJoinKind::Inner,
        JoinKind::Left => NativeJoinKind::LeftOuter,
        JoinKind::Right => NativeJoinKind::RightOuter,
        JoinKind::Full => NativeJoinKind::FullOuter,
    };
    if config.mini_batch.enabled {
        JoinStrategy::MiniBatch(MiniBatchStrategy {
            left_outer: kind.is_left_outer(),
            right_outer: kind.is_right_outer(),
            size: config.mini_batch.size,
            allow_latency: config.mini_batch.allow_latency(),
        })
    } else {
        JoinStrategy::NativeBridge(NativeBridgeStrategy { native_kind })
    }
}
