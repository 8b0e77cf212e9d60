//! The external entity evaluated by guards and actions.
//!
//! A statechart never owns the data it reasons about. Callers hand an
//! entity into every dispatch; guards read it, actions observe it, and
//! compiled expressions see it bound as the `entity` global.

use serde::Serialize;
use std::fmt::Debug;

/// Trait for the external entity a chart is evaluated against.
///
/// # Required Traits
///
/// - `Debug`: entities appear in error messages and diagnostics
/// - `Serialize`: compiled expressions bind the entity into script scope
/// - `Send + Sync`: entities cross thread boundaries with the dispatcher
/// - `'static`: evaluators over the entity type are stored as shared
///   trait objects inside the chart
///
/// # Example
///
/// ```rust
/// use chartflow::core::Entity;
/// use serde::Serialize;
///
/// #[derive(Debug, Serialize)]
/// struct Order {
///     id: String,
///     total: f64,
/// }
///
/// impl Entity for Order {
///     fn identity(&self) -> Option<String> {
///         Some(self.id.clone())
///     }
/// }
///
/// let order = Order { id: "ord-41".into(), total: 12.5 };
/// assert_eq!(order.identity().as_deref(), Some("ord-41"));
/// ```
pub trait Entity: Debug + Send + Sync + Serialize + 'static {
    /// Stable identity for diagnostics, if the entity has one.
    ///
    /// Default implementation returns `None`; anonymous entities are fine.
    fn identity(&self) -> Option<String> {
        None
    }
}

/// Charts that carry no entity data dispatch against `()`.
impl Entity for () {}

/// JSON values work directly as entities; an `"id"` field, when present,
/// becomes the diagnostic identity.
impl Entity for serde_json::Value {
    fn identity(&self) -> Option<String> {
        match self.get("id") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        }
    }
}

/// Plain scalar entities for charts gated on a single value.
impl Entity for i64 {}
impl Entity for u64 {}
impl Entity for bool {}
impl Entity for String {}

impl<T: Entity> Entity for Option<T> {
    fn identity(&self) -> Option<String> {
        self.as_ref().and_then(Entity::identity)
    }
}
