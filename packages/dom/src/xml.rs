//! Glue between element handles and the `xmloxide` engine: parse and output
//! options, XML name and character rules, and the few tree operations the
//! engine leaves to its callers.

use crate::errors::{DomError, DomResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use xmloxide::encoding::decode_to_utf8;
use xmloxide::error::{ParseError, SourceLocation};
use xmloxide::parser::{self, ParseOptions as EngineOptions};
use xmloxide::serial::{serialize_with_options, SerializeOptions};
use xmloxide::tree::NodeKind;
use xmloxide::{Attribute, Document as XmlTree, NodeId};

/// Output is always UTF-8, whatever the source declared
pub(crate) const OUTPUT_ENCODING: &str = "UTF-8";

/// Options controlling how source text becomes a tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseOptions {
    /// Keep whitespace-only text nodes. When false (the default) they are
    /// dropped while parsing.
    pub keep_whitespace: bool,
}

impl ParseOptions {
    fn engine_options(&self) -> EngineOptions {
        EngineOptions::default().no_blanks(!self.keep_whitespace)
    }
}

/// Output formatting options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    /// Leave out the `<?xml ...?>` declaration
    pub omit_declaration: bool,

    /// Spaces per nesting level when pretty printing
    pub indent_width: usize,

    /// Put element-only content on separate, indented lines
    pub pretty_print: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            omit_declaration: false,
            indent_width: 4,
            pretty_print: true,
        }
    }
}

impl OutputConfig {
    /// Single-line output without a declaration
    pub fn compact() -> Self {
        Self {
            omit_declaration: true,
            indent_width: 0,
            pretty_print: false,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// Parsing

pub(crate) fn parse_text(source: &str, options: &ParseOptions) -> Result<XmlTree, ParseError> {
    let source = source.strip_prefix('\u{FEFF}').unwrap_or(source);
    let mut tree = parser::parse_str_with_options(source, &options.engine_options())?;
    tree.encoding = Some(OUTPUT_ENCODING.to_string());
    Ok(tree)
}

/// Decode `bytes` (byte order mark, then declared encoding, then UTF-8)
/// before parsing
pub(crate) fn parse_bytes(bytes: &[u8], options: &ParseOptions) -> Result<XmlTree, ParseError> {
    let source = decode_to_utf8(bytes).map_err(|err| ParseError {
        message: err.message,
        location: SourceLocation::default(),
        diagnostics: Vec::new(),
    })?;
    parse_text(&source, options)
}

/// A tree holding nothing but an empty root element
pub(crate) fn tree_with_root(name: &str) -> XmlTree {
    let mut tree = XmlTree::new();
    let document = tree.root();
    let root = tree.create_element(name);
    tree.append_child(document, root);
    tree
}

// Output

pub(crate) fn render(tree: &XmlTree, config: &OutputConfig) -> String {
    let options = SerializeOptions::default()
        .indent(config.pretty_print)
        .indent_str(&" ".repeat(config.indent_width));
    let mut output = serialize_with_options(tree, &options);
    if config.omit_declaration {
        if let Some((_, body)) = output.split_once("?>\n") {
            output = body.to_string();
        }
    }
    if !config.pretty_print && output.ends_with('\n') {
        output.pop();
    }
    output
}

// Names and characters

/// Whether `name` matches the XML `Name` production
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | '_' | 'A'..='Z' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c, '-' | '.' | '0'..='9' | '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Reject text that could not be written back as well-formed XML
pub(crate) fn check_chars(value: &str) -> DomResult<()> {
    match value.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(DomError::InvalidCharacter(c)),
        None => Ok(()),
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

// Elements

/// Tag name as written in the source, prefix included
pub(crate) fn element_name(tree: &XmlTree, node: NodeId) -> Option<String> {
    if !tree.is_element(node) {
        return None;
    }
    let name = tree.node_name(node)?;
    Some(match tree.node_prefix(node) {
        Some(prefix) => format!("{}:{}", prefix, name),
        None => name.to_string(),
    })
}

pub(crate) fn element_children(tree: &XmlTree, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    tree.children(node).filter(move |child| tree.is_element(*child))
}

pub(crate) fn children_named(tree: &XmlTree, node: NodeId, name: &str) -> Vec<NodeId> {
    element_children(tree, node)
        .filter(|child| element_name(tree, *child).as_deref() == Some(name))
        .collect()
}

// Attributes

/// The name as written in the source, e.g. `xsi:schemaLocation`
pub(crate) fn qualified_name(attribute: &Attribute) -> String {
    match &attribute.prefix {
        Some(prefix) => format!("{}:{}", prefix, attribute.name),
        None => attribute.name.clone(),
    }
}

pub(crate) fn attribute_value<'a>(tree: &'a XmlTree, node: NodeId, name: &str) -> Option<&'a str> {
    tree.attributes(node)
        .iter()
        .find(|attribute| qualified_name(attribute) == name)
        .map(|attribute| attribute.value.as_str())
}

/// The engine edits attributes by local name only. Resolve `name` to that
/// local name, refusing when another attribute shares it.
fn engine_attribute_name(tree: &XmlTree, node: NodeId, name: &str) -> DomResult<String> {
    let attributes = tree.attributes(node);
    let local = attributes
        .iter()
        .find(|attribute| qualified_name(attribute) == name)
        .map_or_else(|| name.to_string(), |attribute| attribute.name.clone());
    let sharing = attributes
        .iter()
        .filter(|attribute| attribute.name == local && qualified_name(attribute) != name)
        .count();
    if sharing > 0 {
        return Err(DomError::illegal_state(format!(
            "attribute '{}' shares its local name with another attribute",
            name
        )));
    }
    Ok(local)
}

pub(crate) fn set_attribute(tree: &mut XmlTree, node: NodeId, name: &str, value: &str) -> DomResult<()> {
    let local = engine_attribute_name(tree, node, name)?;
    tree.set_attribute(node, &local, value);
    Ok(())
}

pub(crate) fn remove_attribute(tree: &mut XmlTree, node: NodeId, name: &str) -> DomResult<bool> {
    if attribute_value(tree, node, name).is_none() {
        return Ok(false);
    }
    let local = engine_attribute_name(tree, node, name)?;
    Ok(tree.remove_attribute(node, &local))
}

// Structure

/// Replace the content of `node` with `value`, reusing a sole text child so
/// repeated edits do not grow the arena
pub(crate) fn replace_text(tree: &mut XmlTree, node: NodeId, value: &str) {
    let children: Vec<NodeId> = tree.children(node).collect();
    if let [only] = children[..] {
        if matches!(tree.node(only).kind, NodeKind::Text { .. }) && !value.is_empty() {
            tree.set_text_content(only, value);
            return;
        }
    }
    for child in children {
        tree.detach(child);
    }
    if !value.is_empty() {
        let text = tree.create_text(value);
        tree.append_child(node, text);
    }
}

/// Deep copy of `node` from `source` into `target`, left detached
pub(crate) fn import_subtree(target: &mut XmlTree, source: &XmlTree, node: NodeId) -> NodeId {
    let copy = target.create_node(source.node(node).kind.clone());
    for child in source.children(node) {
        let child_copy = import_subtree(target, source, child);
        target.append_child(copy, child_copy);
    }
    copy
}

/// The engine orders query results by allocation, which drifts from
/// document order once nodes are inserted before existing ones
pub(crate) fn sort_in_document_order(tree: &XmlTree, nodes: &mut [NodeId]) {
    if nodes.len() < 2 {
        return;
    }
    let document = tree.root();
    let positions: HashMap<NodeId, usize> = std::iter::once(document)
        .chain(tree.descendants(document))
        .enumerate()
        .map(|(position, node)| (node, position))
        .collect();
    nodes.sort_by_key(|node| positions.get(node).copied().unwrap_or(usize::MAX));
}
