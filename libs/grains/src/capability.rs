//! Capability index: capability type to proxy lifecycle operations.
//!
//! Built once from a catalog of producer descriptors and read-only
//! thereafter. There is no runtime type introspection: each capability
//! marker type declares its interface set statically, and each producer
//! registers explicit create/destroy function values. Lookup misses are
//! diagnosed by walking the requested type's declared interfaces, so a
//! caller that used a wider type than the bound minimal interface gets told
//! which narrower type to use instead.

use crate::error::ProxyError;
use crate::proxy::ObserverProxy;
use futures::future::BoxFuture;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Conventional name of the proxy creation operation, used in diagnostics
pub const CREATE_OPERATION: &str = "create_observer_proxy";

/// Conventional name of the proxy destruction operation, used in diagnostics
pub const DESTROY_OPERATION: &str = "delete_observer_proxy";

/// One interface in a capability type's declared set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub id: TypeId,
    pub name: &'static str,
    /// Whether the interface declares exactly the minimal observer +
    /// addressable pair and nothing more
    pub minimal: bool,
}

impl InterfaceDescriptor {
    /// Descriptor for a minimal capability interface (observer + addressable
    /// and nothing else)
    pub fn minimal<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            minimal: true,
        }
    }

    /// Descriptor for an interface that extends beyond the minimal shape
    pub fn extended<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            minimal: false,
        }
    }
}

/// Static metadata for a capability interface.
///
/// Implemented by the marker types standing for remotely invocable
/// interfaces. Replaces reflective scans: the interface set is declared
/// here, once, at the type definition.
pub trait CapabilityType: 'static {
    /// Descriptor for this interface itself
    fn descriptor() -> InterfaceDescriptor;

    /// The full declared interface set: this interface plus everything it
    /// extends. Defaults to the interface alone.
    fn interfaces() -> Vec<InterfaceDescriptor> {
        vec![Self::descriptor()]
    }
}

/// Boxed creation operation: client-side object in, live proxy out.
/// Asynchronous because creation is a runtime call that may suspend.
pub type CreateProxyFn = Arc<
    dyn Fn(Arc<dyn Any + Send + Sync>) -> BoxFuture<'static, Result<ObserverProxy, ProxyError>>
        + Send
        + Sync,
>;

/// Boxed destruction operation, symmetric to [`CreateProxyFn`]
pub type DestroyProxyFn =
    Arc<dyn Fn(ObserverProxy) -> BoxFuture<'static, Result<(), ProxyError>> + Send + Sync>;

/// One producer entry in the startup catalog
#[derive(Clone)]
pub struct ProducerDescriptor {
    pub produced: InterfaceDescriptor,
    /// Produced type declares the observer capability explicitly
    pub declares_observer: bool,
    /// Produced type is itself a grain
    pub declares_grain: bool,
    pub create: CreateProxyFn,
    pub destroy: DestroyProxyFn,
}

impl ProducerDescriptor {
    /// Plain client-side objects are eligible by default; grains are not,
    /// unless they also declare the observer capability explicitly.
    fn eligible(&self) -> bool {
        self.declares_observer || !self.declares_grain
    }
}

impl fmt::Debug for ProducerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerDescriptor")
            .field("produced", &self.produced)
            .field("declares_observer", &self.declares_observer)
            .field("declares_grain", &self.declares_grain)
            .finish_non_exhaustive()
    }
}

/// Catalog of producer descriptors available at process start.
/// The scan must be deterministic over a fixed catalog.
pub trait BindingCatalog: Send + Sync {
    fn scan(&self) -> Vec<ProducerDescriptor>;
}

/// Resolved (create, destroy) pair for one capability type
#[derive(Clone)]
pub struct CapabilityBinding {
    pub capability: InterfaceDescriptor,
    pub create: CreateProxyFn,
    pub destroy: DestroyProxyFn,
}

impl fmt::Debug for CapabilityBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityBinding")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Immutable capability-type index.
///
/// Built once per registry instance; every read thereafter is lock-free.
pub struct CapabilityIndex {
    bindings: HashMap<TypeId, CapabilityBinding>,
}

impl CapabilityIndex {
    /// Scan the catalog and index eligible producers, keyed by produced
    /// type. Pure and idempotent; last write wins per key.
    pub fn build(catalog: &dyn BindingCatalog) -> Self {
        let mut bindings = HashMap::new();
        for producer in catalog.scan() {
            if !producer.eligible() {
                debug!(capability = producer.produced.name, "skipping grain-only producer");
                continue;
            }
            bindings.insert(
                producer.produced.id,
                CapabilityBinding {
                    capability: producer.produced,
                    create: producer.create,
                    destroy: producer.destroy,
                },
            );
        }
        debug!(indexed = bindings.len(), "capability index built");
        Self { bindings }
    }

    /// Resolve the binding for capability `C`, or diagnose the miss.
    /// `operation` names the operation being resolved, for the not-found
    /// message.
    pub fn lookup<C: CapabilityType>(
        &self,
        operation: &'static str,
    ) -> Result<&CapabilityBinding, ProxyError> {
        match self.bindings.get(&C::descriptor().id) {
            Some(binding) => Ok(binding),
            None => Err(self.diagnose::<C>(operation)),
        }
    }

    /// Two-cause miss diagnosis: the requested type may strictly extend a
    /// bound minimal interface (wrong static type, correctable), or nothing
    /// may produce the capability at all.
    fn diagnose<C: CapabilityType>(&self, operation: &'static str) -> ProxyError {
        let requested = C::descriptor();
        let minimal: Vec<InterfaceDescriptor> = C::interfaces()
            .into_iter()
            .filter(|interface| interface.minimal)
            .collect();

        if let [narrower] = minimal.as_slice() {
            if narrower.id != requested.id && self.bindings.contains_key(&narrower.id) {
                return ProxyError::AmbiguousCapability {
                    requested: requested.name,
                    narrower: narrower.name,
                };
            }
        }

        ProxyError::UnboundCapability {
            capability: requested.name,
            operation,
        }
    }

    /// Names of all indexed capability types, sorted for stable output
    pub fn capability_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .bindings
            .values()
            .map(|binding| binding.capability.name)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for CapabilityIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityIndex")
            .field("capabilities", &self.capability_names())
            .finish()
    }
}
