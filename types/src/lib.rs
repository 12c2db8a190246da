//! Core domain types for tether.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Every other crate in the workspace speaks in these terms: the error taxonomy of a
//! bridged call, the identity of a pending operation, and the policy applied when a
//! continuation is misused.

mod ids;
pub use ids::OperationId;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Protocol Violations
// ============================================================================

/// A broken exactly-once contract on a pending operation.
///
/// These are defects in the code driving a continuation, never transient
/// runtime conditions. They are surfaced loudly and must not be swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// A continuation was resumed after its slot had already been resolved.
    #[error("continuation for {operation} resumed more than once")]
    AlreadyResumed { operation: OperationId },
    /// Every handle to a continuation was dropped without resuming it.
    #[error("continuation for {operation} dropped without being resumed")]
    Abandoned { operation: OperationId },
}

impl ProtocolViolation {
    #[must_use]
    pub const fn operation(self) -> OperationId {
        match self {
            ProtocolViolation::AlreadyResumed { operation }
            | ProtocolViolation::Abandoned { operation } => operation,
        }
    }
}

// ============================================================================
// Bridge Errors
// ============================================================================

/// Failure outcome of a bridged call.
///
/// `Underlying` carries the wrapped primitive's error verbatim. The bridge adds
/// no error kinds of its own beyond `Violation`.
#[derive(Debug, Error)]
pub enum BridgeError<E> {
    #[error("{0}")]
    Underlying(E),
    #[error(transparent)]
    Violation(#[from] ProtocolViolation),
}

impl<E> BridgeError<E> {
    #[must_use]
    pub const fn is_violation(&self) -> bool {
        matches!(self, BridgeError::Violation(_))
    }

    #[must_use]
    pub fn underlying(&self) -> Option<&E> {
        match self {
            BridgeError::Underlying(err) => Some(err),
            BridgeError::Violation(_) => None,
        }
    }

    #[must_use]
    pub fn into_underlying(self) -> Option<E> {
        match self {
            BridgeError::Underlying(err) => Some(err),
            BridgeError::Violation(_) => None,
        }
    }

    #[must_use]
    pub fn violation(&self) -> Option<ProtocolViolation> {
        match self {
            BridgeError::Underlying(_) => None,
            BridgeError::Violation(violation) => Some(*violation),
        }
    }

    pub fn map_underlying<F, U>(self, f: F) -> BridgeError<U>
    where
        F: FnOnce(E) -> U,
    {
        match self {
            BridgeError::Underlying(err) => BridgeError::Underlying(f(err)),
            BridgeError::Violation(violation) => BridgeError::Violation(violation),
        }
    }
}

// ============================================================================
// Misuse Policy
// ============================================================================

/// How a detected double resume is surfaced.
///
/// Both variants log the violation at `error` level. `Panic` additionally
/// aborts the resuming code path; `Report` hands the violation back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MisusePolicy {
    Panic,
    Report,
}

impl MisusePolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MisusePolicy::Panic => "panic",
            MisusePolicy::Report => "report",
        }
    }
}

impl Default for MisusePolicy {
    /// Development builds fail fast; release builds report and keep running.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            MisusePolicy::Panic
        } else {
            MisusePolicy::Report
        }
    }
}
