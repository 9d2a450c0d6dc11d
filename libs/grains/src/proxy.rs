//! Observer proxy registry.
//!
//! Public façade over the capability index: creates and destroys
//! remote-callable proxies for client-side observer objects so other grains
//! can invoke callbacks on them. Construct one registry per process (or per
//! test) and inject the handle wherever proxies are needed; the index is
//! built on first use and shared read-only after that.

use crate::capability::{
    BindingCatalog, CapabilityIndex, CapabilityType, CREATE_OPERATION, DESTROY_OPERATION,
};
use crate::error::ProxyError;
use once_cell::sync::OnceCell;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Remote-callable reference standing in for a client-side object.
///
/// Owned by the caller that created it; hand it back to
/// [`ObserverRegistry::delete_proxy`] when no longer needed. The registry
/// does not track outstanding proxies.
pub struct ObserverProxy {
    capability: TypeId,
    capability_name: &'static str,
    handle: Box<dyn Any + Send + Sync>,
}

impl ObserverProxy {
    /// Mint a proxy around a runtime handle. Called by producer create
    /// operations, not by end users.
    pub fn new<C: CapabilityType>(handle: Box<dyn Any + Send + Sync>) -> Self {
        let descriptor = C::descriptor();
        Self {
            capability: descriptor.id,
            capability_name: descriptor.name,
            handle,
        }
    }

    /// Capability type this proxy was created under
    pub fn capability(&self) -> TypeId {
        self.capability
    }

    pub fn capability_name(&self) -> &'static str {
        self.capability_name
    }

    /// Recover the runtime handle; used by producer destroy operations
    pub fn into_handle(self) -> Box<dyn Any + Send + Sync> {
        self.handle
    }
}

impl fmt::Debug for ObserverProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverProxy")
            .field("capability", &self.capability_name)
            .finish_non_exhaustive()
    }
}

/// Process-scoped proxy registry.
///
/// An explicit handle rather than an ambient global: tests build independent
/// instances over independent catalogs.
pub struct ObserverRegistry {
    catalog: Box<dyn BindingCatalog>,
    index: OnceCell<CapabilityIndex>,
}

impl ObserverRegistry {
    /// Construction does no catalog scan; the index is built lazily on
    /// first use.
    pub fn new(catalog: impl BindingCatalog + 'static) -> Self {
        Self {
            catalog: Box::new(catalog),
            index: OnceCell::new(),
        }
    }

    /// Create a remote-callable proxy for `observer` under capability `C`.
    pub async fn create_proxy<C: CapabilityType>(
        &self,
        observer: Arc<dyn Any + Send + Sync>,
    ) -> Result<ObserverProxy, ProxyError> {
        let binding = self.index().lookup::<C>(CREATE_OPERATION)?;
        debug!(capability = binding.capability.name, "creating observer proxy");
        (binding.create)(observer).await
    }

    /// Destroy a proxy previously created under capability `C`.
    pub async fn delete_proxy<C: CapabilityType>(&self, proxy: ObserverProxy) -> Result<(), ProxyError> {
        let binding = self.index().lookup::<C>(DESTROY_OPERATION)?;
        debug!(capability = binding.capability.name, "deleting observer proxy");
        (binding.destroy)(proxy).await
    }

    /// Diagnostic enumeration of all indexed capability types
    pub fn registered_capability_types(&self) -> Vec<&'static str> {
        self.index().capability_names()
    }

    fn index(&self) -> &CapabilityIndex {
        // Single-flight build: concurrent first callers block on one scan,
        // and the build is pure, so repeating it would be safe anyway.
        self.index
            .get_or_init(|| CapabilityIndex::build(self.catalog.as_ref()))
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("built", &self.index.get().is_some())
            .finish_non_exhaustive()
    }
}
