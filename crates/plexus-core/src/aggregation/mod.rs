//! # Plexus Aggregation
//!
//! Capability based composition. A [`Component`] declares the capabilities it
//! provides; an [`Aggregate`] groups components so that each of them can be
//! asked for a capability any member provides.
//!
//! ```
//! use std::sync::Arc;
//! use plexus_core::aggregation::{query, Aggregate, Component};
//!
//! trait Editor: Send + Sync {}
//! trait Outline: Send + Sync {}
//! struct TextEditor;
//! struct SymbolOutline;
//! impl Editor for TextEditor {}
//! impl Outline for SymbolOutline {}
//!
//! let editor = Component::builder("editor").provide::<dyn Editor>(Arc::new(TextEditor)).build();
//! let outline = Component::builder("outline").provide::<dyn Outline>(Arc::new(SymbolOutline)).build();
//!
//! let aggregate = Aggregate::new();
//! aggregate.add(&editor).unwrap();
//! aggregate.add(&outline).unwrap();
//!
//! assert!(query::<dyn Outline>(&editor).is_some());
//! ```
//!
//! Registry bookkeeping lives in [`AggregateRegistry`]; everything else goes
//! through the handles.

pub mod aggregate;
pub mod component;
pub mod error;
pub mod registry;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use aggregate::{Aggregate, AggregateChange, AggregateEvent, AggregateId, ListenerId};
pub use component::{Component, ComponentBuilder, ComponentId};
pub use error::AggregationError;
pub use registry::AggregateRegistry;

/// Capability `T` of `component`, or of the aggregate it belongs to.
///
/// The component's own capability wins over its siblings'.
pub fn query<T: ?Sized + Send + Sync + 'static>(component: &Component) -> Option<Arc<T>> {
    if let Some(own) = component.capability::<T>() {
        return Some(own);
    }
    AggregateRegistry::global()
        .siblings_of(component.id())
        .and_then(|members| aggregate::first_capability::<T>(&members))
}

/// Every `T` in the aggregate `component` belongs to, in member order.
/// A component outside any aggregate yields its own capability, if any.
pub fn query_all<T: ?Sized + Send + Sync + 'static>(component: &Component) -> Vec<Arc<T>> {
    match AggregateRegistry::global().siblings_of(component.id()) {
        Some(members) => aggregate::all_capabilities::<T>(&members),
        None => component.capability::<T>().into_iter().collect(),
    }
}

pub fn query_aggregate<T: ?Sized + Send + Sync + 'static>(aggregate: Option<&Aggregate>) -> Option<Arc<T>> {
    aggregate.and_then(Aggregate::component::<T>)
}

pub fn query_all_aggregate<T: ?Sized + Send + Sync + 'static>(aggregate: Option<&Aggregate>) -> Vec<Arc<T>> {
    aggregate.map(Aggregate::components::<T>).unwrap_or_default()
}
