//! 总线生命周期：Created → Running → Stopped（终态）
//!
use crate::error::{BusError, BusResult};
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Created),
        }
    }

    pub(crate) fn current(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Created → Running，其余状态拒绝且保持不变
    pub(crate) fn start(&self) -> BusResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            LifecycleState::Created => {
                *state = LifecycleState::Running;
                Ok(())
            }
            other => Err(BusError::illegal_state("start", other)),
        }
    }

    /// 任意状态 → Stopped，返回之前的状态
    pub(crate) fn stop(&self) -> LifecycleState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *state, LifecycleState::Stopped)
    }

    /// 非 Stopped 时返回当前状态，否则返回 `IllegalState`
    pub(crate) fn ensure_active(&self, operation: &'static str) -> BusResult<LifecycleState> {
        match self.current() {
            LifecycleState::Stopped => Err(BusError::illegal_state(operation, LifecycleState::Stopped)),
            other => Ok(other),
        }
    }
}
