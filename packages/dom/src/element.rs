//! # Node Handle
//!
//! [`Element<P>`] wraps one element of a shared tree together with the handle
//! it was derived from (`P`). Navigation that should be able to return
//! (`add_child`, `get`) nests the current handle as the new handle's ancestor,
//! so `up()` walks the chain back, eventually to the [`Document`].
//!
//! ```rust,ignore
//! let doc = Document::parse(&pom)?;
//! doc.root()
//!     .get("distributionManagement")
//!     .get("repository")
//!     .get("url")
//!     .materialize()?
//!     .set_text("http://x")?;
//! ```
//!
//! A handle is either bound to a node or a proxy for a node that a lookup did
//! not find. Reading a proxy yields `None`, mutating it fails with
//! [`DomError::NotExist`], and [`Element::materialize`] creates it, together
//! with any proxy ancestors. Clones of a handle share that state, so a proxy
//! materialized through one clone is bound in all of them.
//!
//! ## Branching
//!
//! To fill several children under one proxy, materialize each branch and
//! climb back with `up()` instead of cloning the parent:
//!
//! ```rust,ignore
//! doc.root()
//!     .get("distributionManagement")
//!         .get("repository").get("url").materialize()?.set_text("http://a")?.up().up()
//!         .get("snapshotRepository").get("url").materialize()?.set_text("http://b")?;
//! ```

use crate::document::Document;
use crate::errors::{DomError, DomResult};
use crate::proxy::{Anchor, Proxy, Void};
use crate::query::{self, XPath};
use crate::xml;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;
use xmloxide::{Document as XmlTree, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Bound(NodeId),
    Proxy(Proxy),
}

/// Chainable handle on an element
#[derive(Clone)]
pub struct Element<P = Void> {
    ancestor: P,
    tree: Rc<RefCell<XmlTree>>,
    state: Rc<RefCell<State>>,
}

impl Element<Void> {
    pub(crate) fn unchained(tree: Rc<RefCell<XmlTree>>, node: NodeId) -> Self {
        Self::bound(Void, tree, node)
    }
}

impl<P: Anchor> Element<P> {
    pub(crate) fn bound(ancestor: P, tree: Rc<RefCell<XmlTree>>, node: NodeId) -> Self {
        Self {
            ancestor,
            tree,
            state: Rc::new(RefCell::new(State::Bound(node))),
        }
    }

    fn proxy(ancestor: P, tree: Rc<RefCell<XmlTree>>, name: &str) -> Self {
        Self {
            ancestor,
            tree,
            state: Rc::new(RefCell::new(State::Proxy(Proxy::new(name)))),
        }
    }

    // Reading

    pub fn exists(&self) -> bool {
        self.node_id().is_some()
    }

    pub fn node_id(&self) -> Option<NodeId> {
        match *self.state.borrow() {
            State::Bound(node) => Some(node),
            State::Proxy(_) => None,
        }
    }

    pub fn tag_name(&self) -> Option<String> {
        let node = self.node_id()?;
        xml::element_name(&self.tree.borrow(), node)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        let node = self.node_id()?;
        xml::attribute_value(&self.tree.borrow(), node, name).map(str::to_string)
    }

    /// Concatenated text of all descendant text nodes
    pub fn text(&self) -> Option<String> {
        let node = self.node_id()?;
        Some(self.tree.borrow().text_content(node))
    }

    /// The handle this one was derived from
    pub fn ancestor(&self) -> &P {
        &self.ancestor
    }

    /// Walk one link back up the chain
    pub fn up(self) -> P {
        self.ancestor
    }

    /// A handle on the same node with the chain dropped. It still shares
    /// this handle's bound or proxy state.
    pub fn to_unchained(&self) -> Element<Void> {
        Element {
            ancestor: Void,
            tree: Rc::clone(&self.tree),
            state: Rc::clone(&self.state),
        }
    }

    /// Slash-separated names along the chain, e.g. `project/build/plugins`
    pub fn path(&self) -> String {
        let name = match &*self.state.borrow() {
            State::Bound(node) => xml::element_name(&self.tree.borrow(), *node).unwrap_or_default(),
            State::Proxy(proxy) => proxy.name().to_string(),
        };
        match self.ancestor.describe() {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name,
        }
    }

    // Mutation

    pub fn set_attribute(self, name: &str, value: impl Into<String>) -> DomResult<Self> {
        let node = self.require_bound()?;
        if !xml::is_valid_name(name) {
            return Err(DomError::InvalidName(name.to_string()));
        }
        let value = value.into();
        xml::check_chars(&value)?;
        xml::set_attribute(&mut self.tree.borrow_mut(), node, name, &value)?;
        Ok(self)
    }

    pub fn remove_attribute(self, name: &str) -> DomResult<Self> {
        let node = self.require_bound()?;
        xml::remove_attribute(&mut self.tree.borrow_mut(), node, name)?;
        Ok(self)
    }

    /// Replace all content with a single text node
    pub fn set_text(self, value: impl Into<String>) -> DomResult<Self> {
        let node = self.require_bound()?;
        let value = value.into();
        xml::check_chars(&value)?;
        xml::replace_text(&mut self.tree.borrow_mut(), node, &value);
        Ok(self)
    }

    /// Append a new element and return a handle on it chained under `self`
    pub fn add_child(self, name: &str) -> DomResult<Element<Self>> {
        let node = self.require_bound()?;
        let child = self.append_element(node, name)?;
        let tree = Rc::clone(&self.tree);
        Ok(Element::bound(self, tree, child))
    }

    /// Insert a new element right before `self`. The new handle takes over
    /// `self`'s ancestor, so the chain depth stays the same.
    pub fn add_sibling(self, name: &str) -> DomResult<Element<P>> {
        let node = self.require_bound()?;
        if !xml::is_valid_name(name) {
            return Err(DomError::InvalidName(name.to_string()));
        }
        let sibling = {
            let mut tree = self.tree.borrow_mut();
            match tree.parent(node) {
                None => {
                    return Err(DomError::illegal_state(format!(
                        "'{}' is detached and has no siblings",
                        xml::element_name(&tree, node).unwrap_or_default()
                    )))
                }
                Some(parent) if parent == tree.root() => {
                    return Err(DomError::illegal_state(
                        "a document cannot have a second root element",
                    ))
                }
                Some(_) => {}
            }
            let sibling = tree.create_element(name);
            tree.insert_before(node, sibling);
            sibling
        };
        debug!(sibling = name, before = node.into_raw(), "Inserted sibling element");
        Ok(Element::bound(self.ancestor, self.tree, sibling))
    }

    /// Detach the node from its parent. The handle stays bound to the
    /// detached node; removing it again is a no-op.
    pub fn remove(self) -> DomResult<Self> {
        let node = self.require_bound()?;
        {
            let mut tree = self.tree.borrow_mut();
            if tree.parent(node) == Some(tree.root()) {
                return Err(DomError::illegal_state("the root element cannot be removed"));
            }
            tree.detach(node);
        }
        debug!(node = node.into_raw(), path = %self.path(), "Removed element");
        Ok(self)
    }

    /// Append a deep copy of `other`'s node, which may live in another
    /// document
    pub fn adopt<Q: Anchor>(self, other: &Element<Q>) -> DomResult<Self> {
        let node = self.require_bound()?;
        let source = other.require_bound()?;
        let copy = if Rc::ptr_eq(&self.tree, &other.tree) {
            let mut tree = self.tree.borrow_mut();
            let copy = tree.clone_node(source, true);
            tree.append_child(node, copy);
            copy
        } else {
            let other_tree = other.tree.borrow();
            let mut tree = self.tree.borrow_mut();
            let copy = xml::import_subtree(&mut tree, &other_tree, source);
            tree.append_child(node, copy);
            copy
        };
        debug!(node = node.into_raw(), copy = copy.into_raw(), "Adopted subtree");
        Ok(self)
    }

    /// Run `f` on this handle for its side effects and hand the handle back
    pub fn apply<F>(self, f: F) -> DomResult<Self>
    where
        F: FnOnce(&Self) -> DomResult<()>,
    {
        self.require_bound()?;
        f(&self)?;
        Ok(self)
    }

    // Lookup

    /// First child element named `name`, or an unchained proxy
    pub fn child(&self, name: &str) -> Element<Void> {
        self.child_matching(name, |_| true)
    }

    pub fn child_matching<F>(&self, name: &str, mut predicate: F) -> Element<Void>
    where
        F: FnMut(&Element<Void>) -> bool,
    {
        self.children_named(name)
            .into_iter()
            .find(|child| predicate(child))
            .unwrap_or_else(|| Element::proxy(Void, Rc::clone(&self.tree), name))
    }

    /// Direct child elements in document order; empty for a proxy
    pub fn children(&self) -> Vec<Element<Void>> {
        let Some(node) = self.node_id() else {
            return Vec::new();
        };
        let ids: Vec<NodeId> = xml::element_children(&self.tree.borrow(), node).collect();
        self.wrap_all(ids)
    }

    pub fn children_named(&self, name: &str) -> Vec<Element<Void>> {
        let Some(node) = self.node_id() else {
            return Vec::new();
        };
        let ids = xml::children_named(&self.tree.borrow(), node, name);
        self.wrap_all(ids)
    }

    pub fn children_matching<F>(&self, name: &str, mut predicate: F) -> Vec<Element<Void>>
    where
        F: FnMut(&Element<Void>) -> bool,
    {
        self.children_named(name)
            .into_iter()
            .filter(|child| predicate(child))
            .collect()
    }

    /// Chain-preserving lookup that never touches the tree: the existing
    /// child named `name` if there is one, otherwise a proxy for it
    pub fn get(self, name: &str) -> Element<Self> {
        let found = self
            .node_id()
            .and_then(|node| xml::children_named(&self.tree.borrow(), node, name).first().copied());
        let tree = Rc::clone(&self.tree);
        match found {
            Some(child) => Element::bound(self, tree, child),
            None => Element::proxy(self, tree, name),
        }
    }

    /// Create this element, and any proxy ancestors, if it does not exist
    pub fn materialize(mut self) -> DomResult<Self> {
        self.materialize_in_place()?;
        Ok(self)
    }

    /// Evaluate `query` with this element as the context node
    pub fn query_path(&self, query: &XPath) -> DomResult<Vec<Element<Void>>> {
        let node = self.require_bound()?;
        query::select_elements(&self.tree, query, node)
    }

    // Helper methods

    fn materialize_in_place(&mut self) -> DomResult<NodeId> {
        let name = match &*self.state.borrow() {
            State::Bound(node) => return Ok(*node),
            State::Proxy(proxy) => proxy.name().to_string(),
        };
        if !xml::is_valid_name(&name) {
            return Err(DomError::InvalidName(name));
        }

        let parent = match self.ancestor.anchor_node() {
            Ok(parent) => parent,
            Err(DomError::NotExist(_)) if self.ancestor.describe().is_none() => {
                return Err(DomError::NotExist(self.path()));
            }
            Err(err) => return Err(err),
        };
        let node = self.append_element(parent, &name)?;
        *self.state.borrow_mut() = State::Bound(node);
        debug!(node = node.into_raw(), path = %self.path(), "Materialized element");
        Ok(node)
    }

    fn append_element(&self, parent: NodeId, name: &str) -> DomResult<NodeId> {
        if !xml::is_valid_name(name) {
            return Err(DomError::InvalidName(name.to_string()));
        }
        let mut tree = self.tree.borrow_mut();
        let node = tree.create_element(name);
        tree.append_child(parent, node);
        Ok(node)
    }

    fn require_bound(&self) -> DomResult<NodeId> {
        self.node_id().ok_or_else(|| DomError::NotExist(self.path()))
    }

    fn wrap_all(&self, ids: Vec<NodeId>) -> Vec<Element<Void>> {
        ids.into_iter()
            .map(|id| Element::unchained(Rc::clone(&self.tree), id))
            .collect()
    }
}

impl<P: Anchor> Anchor for Element<P> {
    fn anchor_node(&mut self) -> DomResult<NodeId> {
        self.materialize_in_place()
    }

    fn describe(&self) -> Option<String> {
        Some(self.path())
    }
}

/// Same tree and same node; two proxies are equal when they stand for the
/// same name. Ancestors are not compared.
impl<P, Q> PartialEq<Element<Q>> for Element<P> {
    fn eq(&self, other: &Element<Q>) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
            && (Rc::ptr_eq(&self.state, &other.state) || *self.state.borrow() == *other.state.borrow())
    }
}

impl<P: Anchor> fmt::Display for Element<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

impl<P: Anchor> fmt::Debug for Element<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Element");
        debug.field("path", &self.path());
        match &*self.state.borrow() {
            State::Bound(node) => debug.field("node", node),
            State::Proxy(proxy) => debug.field("proxy", &proxy.name()),
        };
        debug.finish()
    }
}

impl Element<Document> {
    /// The document this root element belongs to
    pub fn document(&self) -> &Document {
        &self.ancestor
    }
}
