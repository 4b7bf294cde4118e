//! # Document Handle
//!
//! A [`Document`] owns one tree, shared with every element handle derived
//! from it, and is the terminal ancestor of every chain.
//!
//! ## Lifecycle
//!
//! ```text
//! parse / load / create / wrap → root() → edit → write_to / save
//! ```
//!
//! Documents created by [`Document::load`] remember where they came from, so
//! [`Document::save`] can write them back.

use crate::element::Element;
use crate::errors::{DomError, DomResult};
use crate::proxy::{Anchor, Void};
use crate::query::{self, XPath};
use crate::xml::{self, OutputConfig, ParseOptions};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{info, instrument};
use xmloxide::{Document as XmlTree, NodeId};

/// XML document with a single root element
#[derive(Clone)]
pub struct Document {
    tree: Rc<RefCell<XmlTree>>,
    root: NodeId,
    origin: Option<PathBuf>,
}

impl Document {
    /// Parse a document from text
    pub fn parse(source: &str) -> DomResult<Self> {
        Self::parse_with(source, &ParseOptions::default())
    }

    #[instrument(skip_all, fields(bytes = source.len()))]
    pub fn parse_with(source: &str, options: &ParseOptions) -> DomResult<Self> {
        let tree = xml::parse_text(source, options)?;
        let document = Self::wrap(tree)?;
        info!(nodes = document.tree().node_count(), "Parsed document");
        Ok(document)
    }

    /// Parse raw bytes. The encoding comes from a byte order mark or the
    /// XML declaration and defaults to UTF-8.
    pub fn parse_bytes(bytes: &[u8]) -> DomResult<Self> {
        Self::wrap(xml::parse_bytes(bytes, &ParseOptions::default())?)
    }

    pub fn parse_reader<R: Read>(mut reader: R) -> DomResult<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::parse_bytes(&bytes)
    }

    /// Parse a file and remember its path for [`Document::save`]
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> DomResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mut document = Self::parse_bytes(&bytes)?;
        document.origin = Some(path.to_path_buf());
        info!("Loaded document");
        Ok(document)
    }

    /// A new document consisting of an empty root element
    pub fn create(root_name: &str) -> DomResult<Self> {
        if !xml::is_valid_name(root_name) {
            return Err(DomError::InvalidName(root_name.to_string()));
        }
        Self::wrap(xml::tree_with_root(root_name))
    }

    /// Take ownership of an already built tree
    pub fn wrap(mut tree: XmlTree) -> DomResult<Self> {
        tree.encoding = Some(xml::OUTPUT_ENCODING.to_string());
        let root = tree
            .root_element()
            .ok_or_else(|| DomError::illegal_state("tree has no root element"))?;
        Ok(Self {
            tree: Rc::new(RefCell::new(tree)),
            root,
            origin: None,
        })
    }

    /// Handle on the root element, chained under this document
    pub fn root(&self) -> Element<Document> {
        Element::bound(self.clone(), Rc::clone(&self.tree), self.root)
    }

    /// Unchained handle on any element of this document
    pub fn element(&self, node: NodeId) -> DomResult<Element<Void>> {
        let tree = self.tree.borrow();
        let in_arena = node.into_raw() as usize <= tree.node_count();
        if !in_arena || !tree.is_element(node) {
            return Err(DomError::illegal_state(format!(
                "node {} is not an element of this document",
                node.into_raw()
            )));
        }
        Ok(Element::unchained(Rc::clone(&self.tree), node))
    }

    /// Read access to the underlying tree
    ///
    /// The borrow must be released before editing through element handles.
    pub fn tree(&self) -> Ref<'_, XmlTree> {
        self.tree.borrow()
    }

    /// Path the document was loaded from, if any
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    // Output

    pub fn to_xml_string(&self) -> String {
        self.to_xml_string_with(&OutputConfig::default())
    }

    pub fn to_xml_string_with(&self, config: &OutputConfig) -> String {
        xml::render(&self.tree.borrow(), config)
    }

    /// Render the document into `sink` with the default output configuration
    pub fn write_to<W: Write>(&self, sink: &mut W) -> DomResult<()> {
        self.write_to_with(sink, &OutputConfig::default())
    }

    pub fn write_to_with<W: Write>(&self, sink: &mut W, config: &OutputConfig) -> DomResult<()> {
        let rendered = self.to_xml_string_with(config);
        sink.write_all(rendered.as_bytes())
            .and_then(|_| sink.flush())
            .map_err(DomError::Serialization)
    }

    /// Write back to the path the document was loaded from
    pub fn save(&self) -> DomResult<()> {
        match &self.origin {
            Some(origin) => self.save_to(origin),
            None => Err(DomError::illegal_state(
                "document has no origin path to save to",
            )),
        }
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save_to(&self, path: impl AsRef<Path>) -> DomResult<()> {
        let rendered = self.to_xml_string();
        {
            let mut file = File::create(path.as_ref()).map_err(DomError::Serialization)?;
            write_all(&mut file, rendered.as_bytes()).map_err(DomError::Serialization)?;
        }
        info!(bytes = rendered.len(), "Saved document");
        Ok(())
    }

    // Queries

    /// Evaluate `query` with the document node as context
    pub fn query(&self, query: &XPath) -> DomResult<Vec<Element<Void>>> {
        let document_node = self.tree.borrow().root();
        query::select_elements(&self.tree, query, document_node)
    }

    pub fn xpath(&self, expr: &str) -> DomResult<Vec<Element<Void>>> {
        self.query(&XPath::compile(expr)?)
    }

    pub fn xpath_with(&self, template: &str, args: &[&dyn fmt::Display]) -> DomResult<Vec<Element<Void>>> {
        self.query(&XPath::compile_with_args(template, args)?)
    }
}

fn write_all(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.sync_all()
}

impl Anchor for Document {
    fn anchor_node(&mut self) -> DomResult<NodeId> {
        Ok(self.root)
    }

    fn describe(&self) -> Option<String> {
        None
    }
}

/// Two handles are equal when they share the same tree
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root)
            .field("nodes", &self.tree.borrow().node_count())
            .field("origin", &self.origin)
            .finish()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_root() {
        let doc = Document::create("accounts").unwrap();
        let root = doc.root();
        assert_eq!(root.tag_name().as_deref(), Some("accounts"));
        assert_eq!(root.ancestor(), &doc);
        assert_eq!(root.up(), doc);
    }

    #[test]
    fn test_create_rejects_invalid_names() {
        assert!(matches!(Document::create(""), Err(DomError::InvalidName(_))));
        assert!(matches!(Document::create("two words"), Err(DomError::InvalidName(_))));
    }

    #[test]
    fn test_wrap_requires_root() {
        assert!(matches!(Document::wrap(XmlTree::new()), Err(DomError::IllegalState(_))));

        let mut tree = XmlTree::new();
        let document = tree.root();
        let root = tree.create_element("project");
        tree.append_child(document, root);
        tree.set_attribute(root, "version", "1");
        let doc = Document::wrap(tree).unwrap();
        assert_eq!(doc.root().attribute("version").as_deref(), Some("1"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Document::parse("<a><b></a>"), Err(DomError::MalformedDocument(_))));
        assert!(matches!(
            Document::parse_bytes(&[b'<', b'a', 0xff, b'/', b'>']),
            Err(DomError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_parse_bytes_with_bom() {
        let doc = Document::parse_bytes(b"\xEF\xBB\xBF<a>x</a>").unwrap();
        assert_eq!(doc.root().text().as_deref(), Some("x"));
    }

    #[test]
    fn test_save_without_origin_is_illegal() {
        let doc = Document::create("a").unwrap();
        assert!(matches!(doc.save(), Err(DomError::IllegalState(_))));
    }

    #[test]
    fn test_element_lookup_by_id() {
        let doc = Document::parse("<a><b/></a>").unwrap();
        let b = doc.root().child("b");
        let id = b.node_id().unwrap();
        assert_eq!(doc.element(id).unwrap(), b);
        assert!(matches!(
            doc.element(doc.tree().root()),
            Err(DomError::IllegalState(_))
        ));
    }

    #[test]
    fn test_write_to_failing_sink() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let doc = Document::create("a").unwrap();
        assert!(matches!(doc.write_to(&mut Broken), Err(DomError::Serialization(_))));
    }

    #[test]
    fn test_clones_share_the_tree() {
        let doc = Document::create("a").unwrap();
        let other = doc.clone();
        other.root().add_child("b").unwrap();
        assert_eq!(doc.root().children().len(), 1);
        assert_eq!(doc, other);
        assert_ne!(doc, Document::create("a").unwrap());
    }
}
