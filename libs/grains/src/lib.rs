//! Grain Conventions Layer
//!
//! Timer and observer-proxy conventions for grains (independently
//! addressable actors) on the Loam runtime.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐    ┌───────────────────────────┐
//! │     GrainTimers          │    │    ObserverRegistry       │
//! │  (one per grain)         │    │  (one per process)        │
//! │                          │    │                           │
//! │  ┌────────────────────┐  │    │  ┌─────────────────────┐  │
//! │  │  CallbackLedger    │  │    │  │  CapabilityIndex    │  │
//! │  │  id -> TimerHandle │  │    │  │  type -> (create,   │  │
//! │  └────────────────────┘  │    │  │           destroy)  │  │
//! │     │            │       │    │  └─────────────────────┘  │
//! └─────┼────────────┼───────┘    └──────────────┼────────────┘
//!       │            │                           │
//!  RecurringScheduler │ SelfDispatch             │ BindingCatalog
//!  (host timers)      │ (self-send bus)          │ (startup scan)
//! ```
//!
//! Two pieces:
//!
//! - **Timer subsystem** ([`GrainTimers`]): recurring callbacks under the
//!   grain's single-threaded turn discipline. The next tick is never
//!   scheduled until the current invocation settles, so two ticks of the
//!   same timer never overlap. Command timers dispatch a command back to
//!   the owning grain each tick instead of running a local function, so
//!   recurring behavior re-enters ordinary command handling.
//! - **Observer proxy registry** ([`ObserverRegistry`]): a built-once index
//!   from capability type to the (create, destroy) operation pair needed to
//!   materialize a remote-callable proxy for a client-side observer, with
//!   distinct failures for unbound and wrongly-widened capability types.
//!
//! Activation lifecycle, routing, serialization, and transport belong to the
//! host runtime; this crate consumes them through the
//! [`RecurringScheduler`], [`SelfDispatch`], and [`BindingCatalog`]
//! contracts.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use loam_grains::{GrainId, GrainTimers, TokioScheduler};
//! # use loam_grains::{CommandEnvelope, DispatchError, SelfDispatch};
//! # struct Bus;
//! # #[async_trait::async_trait]
//! # impl SelfDispatch for Bus {
//! #     async fn dispatch(&self, _envelope: CommandEnvelope) -> Result<(), DispatchError> { Ok(()) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let timers = GrainTimers::new(GrainId::new(), Arc::new(TokioScheduler), Arc::new(Bus));
//!     timers.register(
//!         "heartbeat",
//!         Duration::from_secs(1),
//!         Duration::from_secs(30),
//!         || async {
//!             tracing::info!("still alive");
//!             Ok(())
//!         },
//!     )?;
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod dispatch;
pub mod error;
pub mod id;
pub mod ledger;
pub mod proxy;
pub mod scheduler;
pub mod timers;

pub use capability::{
    BindingCatalog, CapabilityBinding, CapabilityIndex, CapabilityType, CreateProxyFn,
    DestroyProxyFn, InterfaceDescriptor, ProducerDescriptor, CREATE_OPERATION, DESTROY_OPERATION,
};
pub use dispatch::{CommandEnvelope, GrainCommand, SelfDispatch};
pub use error::{DispatchError, ProxyError, ProxyResult, TimerError, TimerResult};
pub use id::{GrainId, TimerId};
pub use ledger::CallbackLedger;
pub use proxy::{ObserverProxy, ObserverRegistry};
pub use scheduler::{RecurringScheduler, TickFn, TimerHandle, TokioScheduler};
pub use timers::{GrainTimers, TimerMetrics, TimerStats};
