//! Lifecycle state and shutdown coordination.
//!
//! # States
//! ```text
//! Uninitialized → Initialized → Running → ShuttingDown(cause) → Terminated(cause)
//!                      └──────────────────────┘
//! ```
//!
//! # Design Decisions
//! - State lives in a watch channel so any task can observe or await it
//! - Entering `ShuttingDown` is a compare-and-set on the channel value:
//!   of any number of concurrent requests exactly one succeeds
//! - The winning request's cause decides the exit status

use std::fmt;

use tokio::sync::watch;

use super::signals::ExitSignal;

/// Why the server stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCause {
    /// Programmatic exit with no signal.
    Requested,
    /// An OS signal arrived.
    Signal(ExitSignal),
}

impl ExitCause {
    /// Process exit status: 0 for a requested exit, 2 after a signal.
    pub fn exit_code(self) -> i32 {
        match self {
            ExitCause::Requested => 0,
            ExitCause::Signal(_) => 2,
        }
    }
}

impl fmt::Display for ExitCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCause::Requested => write!(f, "requested"),
            ExitCause::Signal(signal) => write!(f, "{signal}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
    Running,
    ShuttingDown(ExitCause),
    Terminated(ExitCause),
}

impl LifecycleState {
    /// The cause of shutdown, once one has begun.
    pub fn exit_cause(self) -> Option<ExitCause> {
        match self {
            LifecycleState::ShuttingDown(cause) | LifecycleState::Terminated(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Shared lifecycle state machine.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Uninitialized);
        Self { state }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn mark_initialized(&self) -> bool {
        self.transition(|state| match state {
            LifecycleState::Uninitialized => Some(LifecycleState::Initialized),
            _ => None,
        })
    }

    pub fn mark_running(&self) -> bool {
        self.transition(|state| match state {
            LifecycleState::Initialized => Some(LifecycleState::Running),
            _ => None,
        })
    }

    /// Enter `ShuttingDown`. Returns `false` if shutdown already began or
    /// the server was never initialized.
    pub fn begin_shutdown(&self, cause: ExitCause) -> bool {
        self.transition(|state| match state {
            LifecycleState::Initialized | LifecycleState::Running => {
                Some(LifecycleState::ShuttingDown(cause))
            }
            _ => None,
        })
    }

    pub fn mark_terminated(&self) -> bool {
        self.transition(|state| match state {
            LifecycleState::ShuttingDown(cause) => Some(LifecycleState::Terminated(cause)),
            _ => None,
        })
    }

    /// Wait until shutdown has begun and return its cause.
    pub async fn wait_for_shutdown(&self) -> ExitCause {
        let mut receiver = self.state.subscribe();
        let cause = receiver
            .wait_for(|state| state.exit_cause().is_some())
            .await
            .ok()
            .and_then(|state| state.exit_cause());
        // The sender outlives every receiver it hands out.
        cause.unwrap_or(ExitCause::Requested)
    }

    /// Wait until the server is serving or has moved past it. Returns `true`
    /// if it reached `Running`.
    pub async fn wait_until_running(&self) -> bool {
        let mut receiver = self.state.subscribe();
        let reached = receiver
            .wait_for(|state| {
                !matches!(
                    state,
                    LifecycleState::Uninitialized | LifecycleState::Initialized
                )
            })
            .await
            .map(|state| *state == LifecycleState::Running);
        reached.unwrap_or(false)
    }

    fn transition(&self, next: impl FnOnce(LifecycleState) -> Option<LifecycleState>) -> bool {
        self.state.send_if_modified(|state| match next(*state) {
            Some(new_state) => {
                *state = new_state;
                true
            }
            None => false,
        })
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
