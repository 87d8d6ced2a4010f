//! Per-run cancellation token.

use std::fmt;
use std::sync::OnceLock;

/// Why a run was asked to stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// A newer submission for the same application took over.
    Superseded {
        /// Generation of the run that replaced this one.
        by_generation: u64,
    },
    /// A caller asked for the run to stop.
    Requested(String),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Superseded { by_generation } => {
                write!(f, "superseded by run generation {by_generation}")
            }
            Self::Requested(reason) => f.write_str(reason),
        }
    }
}

impl From<&str> for CancelReason {
    fn from(reason: &str) -> Self {
        Self::Requested(reason.to_string())
    }
}

impl From<String> for CancelReason {
    fn from(reason: String) -> Self {
        Self::Requested(reason)
    }
}

/// Cooperative cancellation flag shared between the orchestrator and one run.
///
/// The pipeline checks it before starting each stage; a stage already
/// running is never interrupted. The first reason wins.
#[derive(Default)]
pub struct CancellationToken {
    reason: OnceLock<CancelReason>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Returns true if this call cancelled the token.
    pub fn cancel(&self, reason: impl Into<CancelReason>) -> bool {
        self.reason.set(reason.into()).is_ok()
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.reason.get().is_some()
    }

    /// Returns the reason given by the first `cancel` call.
    #[must_use]
    pub fn reason(&self) -> Option<&CancelReason> {
        self.reason.get()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancellationToken").field(&self.reason()).finish()
    }
}
