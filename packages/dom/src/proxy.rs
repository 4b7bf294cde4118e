//! Deferred node creation
//!
//! A handle whose lookup missed carries a [`Proxy`] instead of a node. The
//! proxy only records the intended tag name; the node it will be attached
//! under is whatever the handle's ancestor link resolves to, which is why
//! materialization goes through [`Anchor`].

use crate::errors::{DomError, DomResult};
use xmloxide::NodeId;

/// Intended element that does not exist in the tree yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    name: String,
}

impl Proxy {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ancestor marker for handles that cannot walk back up: results of
/// [`crate::Element::child`], [`crate::Element::children`] and queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Void;

/// Something a handle can be chained under
///
/// Implemented by [`Void`], [`crate::Document`] and every
/// [`crate::Element`] whose own ancestor is an `Anchor`, so a whole chain of
/// proxies resolves recursively, top-down.
pub trait Anchor {
    /// Node new children are appended to, materializing it first if needed
    fn anchor_node(&mut self) -> DomResult<NodeId>;

    /// Slash-separated path of the chain up to and including this link, or
    /// `None` when the chain starts here
    fn describe(&self) -> Option<String>;
}

impl Anchor for Void {
    fn anchor_node(&mut self) -> DomResult<NodeId> {
        Err(DomError::NotExist(
            "(unchained handle, nothing to materialize under)".to_string(),
        ))
    }

    fn describe(&self) -> Option<String> {
        None
    }
}
