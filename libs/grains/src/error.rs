//! Error taxonomy for the grain conventions layer.
//!
//! Three classes of failure: programmer errors (loud and immediate: duplicate
//! or unknown timer ids, capability types nothing produces), ambiguous-usage
//! errors (a wider type was used where a bound narrower one exists; the error
//! names the correction), and callback faults (logged and swallowed, because
//! a recurring timer must not silently stop ticking when one invocation
//! misbehaves).

use crate::id::{GrainId, TimerId};
use thiserror::Error;

/// Timer registration and unregistration errors
#[derive(Debug, Error)]
pub enum TimerError {
    /// A timer with this id is already active for the grain
    #[error("timer `{id}` is already registered for {grain}")]
    AlreadyRegistered { id: TimerId, grain: GrainId },

    /// No timer with this id is active for the grain
    #[error("no timer `{id}` is registered for {grain}")]
    NotRegistered { id: TimerId, grain: GrainId },
}

/// Failure surface of the external self-dispatch primitive
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatch channel to the grain no longer accepts messages
    #[error("dispatch channel to {grain} is closed")]
    Closed { grain: GrainId },

    /// The bus accepted the send but the grain rejected the command
    #[error("command `{command}` rejected by {grain}: {reason}")]
    Rejected {
        grain: GrainId,
        command: &'static str,
        reason: String,
    },
}

/// Proxy resolution and lifecycle errors
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Nothing in the producer catalog binds this capability type
    #[error("no proxy binding for capability `{capability}`: no producer exposes `{operation}` for it")]
    UnboundCapability {
        capability: &'static str,
        operation: &'static str,
    },

    /// The requested type strictly extends a capability that is bound;
    /// the caller should request the proxy for the narrower interface
    #[error("capability `{requested}` extends the bound capability `{narrower}`; request the proxy as `{narrower}` instead")]
    AmbiguousCapability {
        requested: &'static str,
        narrower: &'static str,
    },

    /// The resolved runtime operation itself failed
    #[error("proxy runtime operation failed: {0:#}")]
    Runtime(anyhow::Error),
}

/// Result type for timer operations
pub type TimerResult<T> = std::result::Result<T, TimerError>;

/// Result type for proxy operations
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;
