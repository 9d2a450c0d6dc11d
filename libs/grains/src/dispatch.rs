//! Self-addressed command dispatch contracts.
//!
//! Command timers do not run a local function on tick; they hand a command
//! back to the runtime's ordinary dispatch path. The recurring action then
//! flows through the same handling, logging, and retry semantics as any
//! externally triggered command instead of bypassing them.
//!
//! This module only consumes the dispatch contract. Routing, envelope
//! serialization, and delivery guarantees (at-least-once, grain-serialized)
//! belong to the host bus.

use crate::error::DispatchError;
use crate::id::GrainId;
use async_trait::async_trait;
use std::any::{type_name, Any};
use std::fmt;

/// Marker for commands a grain can dispatch to itself on a timer.
///
/// Implement this for each command type handled by the grain's ordinary
/// command pipeline that should also be schedulable as a recurring self-send.
pub trait GrainCommand: Send + 'static {}

/// Type-erased command addressed to one grain.
///
/// The receiving side recovers the concrete command with [`downcast`].
///
/// [`downcast`]: CommandEnvelope::downcast
pub struct CommandEnvelope {
    to: GrainId,
    command_type: &'static str,
    payload: Box<dyn Any + Send>,
}

impl CommandEnvelope {
    /// Wrap a command for delivery to `to`
    pub fn new<C: GrainCommand>(to: GrainId, command: C) -> Self {
        Self {
            to,
            command_type: type_name::<C>(),
            payload: Box::new(command),
        }
    }

    /// Destination grain
    pub fn to(&self) -> GrainId {
        self.to
    }

    /// Static type name of the wrapped command
    pub fn command_type(&self) -> &'static str {
        self.command_type
    }

    /// Recover the concrete command, or hand the envelope back untouched
    /// when the type does not match.
    pub fn downcast<C: GrainCommand>(self) -> Result<C, CommandEnvelope> {
        let Self { to, command_type, payload } = self;
        match payload.downcast::<C>() {
            Ok(command) => Ok(*command),
            Err(payload) => Err(Self { to, command_type, payload }),
        }
    }
}

impl fmt::Debug for CommandEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEnvelope")
            .field("to", &self.to)
            .field("command_type", &self.command_type)
            .finish_non_exhaustive()
    }
}

/// Asynchronous self-addressed send consumed by command timers.
#[async_trait]
pub trait SelfDispatch: Send + Sync {
    /// Deliver `envelope` to its destination grain's command pipeline.
    async fn dispatch(&self, envelope: CommandEnvelope) -> Result<(), DispatchError>;
}
