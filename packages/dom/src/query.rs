//! Compiled path queries, and the bridge from selected nodes to unchained
//! element handles

use crate::element::Element;
use crate::errors::{DomError, DomResult};
use crate::proxy::Void;
use crate::xml;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use tracing::debug;
use xmloxide::xpath::ast::Expr;
use xmloxide::xpath::lexer::XPathError as QuerySyntaxError;
use xmloxide::xpath::{parser, XPathContext, XPathNode, XPathValue};
use xmloxide::{Document as XmlTree, NodeId};

/// A compiled, reusable query
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    /// Failures surface as [`DomError::InvalidQuery`]
    pub fn compile(source: &str) -> DomResult<Self> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Compile a template whose `{}` placeholders are replaced, in order, by
    /// `args`. `{{` and `}}` stand for literal braces.
    pub fn compile_with_args(template: &str, args: &[&dyn fmt::Display]) -> DomResult<Self> {
        let mut source = String::with_capacity(template.len());
        let mut used = 0;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match (c, chars.peek()) {
                ('{', Some('{')) | ('}', Some('}')) => {
                    chars.next();
                    source.push(c);
                }
                ('{', Some('}')) => {
                    chars.next();
                    if let Some(arg) = args.get(used) {
                        source.push_str(&arg.to_string());
                    }
                    used += 1;
                }
                _ => source.push(c),
            }
        }

        if used != args.len() {
            return Err(DomError::InvalidQuery(QuerySyntaxError {
                message: format!("template has {} placeholder(s) but {} argument(s) were given", used, args.len()),
                position: 0,
            }));
        }

        Self::compile(&source)
    }

    /// The expression text this query was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate with `context` as the context node; failures surface as
    /// [`DomError::QueryEvaluation`]
    pub fn evaluate(&self, tree: &XmlTree, context: NodeId) -> DomResult<XPathValue> {
        let value = XPathContext::new(tree, context).evaluate(&self.expr)?;
        debug!(expr = %self.source, result = value.type_name(), "Evaluated XPath");
        Ok(value)
    }
}

impl PartialEq for XPath {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for XPath {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

pub fn compile(expr: &str) -> DomResult<XPath> {
    XPath::compile(expr)
}

pub fn compile_with_args(template: &str, args: &[&dyn fmt::Display]) -> DomResult<XPath> {
    XPath::compile_with_args(template, args)
}

/// Evaluate `query` at `context` and wrap every selected element, in
/// document order. Anything but a set of elements is a
/// [`DomError::QueryEvaluation`].
pub(crate) fn select_elements(
    tree: &Rc<RefCell<XmlTree>>,
    query: &XPath,
    context: NodeId,
) -> DomResult<Vec<Element<Void>>> {
    let nodes = {
        let tree = tree.borrow();
        let selected = match query.evaluate(&tree, context)? {
            XPathValue::NodeSet(selected) => selected,
            other => return Err(DomError::not_elements(other.type_name())),
        };
        let mut nodes = Vec::with_capacity(selected.len());
        for node in selected {
            match node {
                XPathNode::Node(id) if tree.is_element(id) => nodes.push(id),
                XPathNode::Node(id) => return Err(DomError::not_elements(kind_label(&tree, id))),
                XPathNode::Attribute { .. } => return Err(DomError::not_elements("attribute")),
            }
        }
        xml::sort_in_document_order(&tree, &mut nodes);
        nodes
    };

    debug!(query = %query, context = context.into_raw(), results = nodes.len(), "Selected elements");
    Ok(nodes
        .into_iter()
        .map(|id| Element::unchained(Rc::clone(tree), id))
        .collect())
}

fn kind_label(tree: &XmlTree, node: NodeId) -> &'static str {
    use xmloxide::tree::NodeKind;

    match tree.node(node).kind {
        NodeKind::Document => "document",
        NodeKind::Element { .. } => "element",
        NodeKind::Text { .. } | NodeKind::CData { .. } | NodeKind::EntityRef { .. } => "text",
        NodeKind::Comment { .. } => "comment",
        NodeKind::ProcessingInstruction { .. } => "processing instruction",
        NodeKind::DocumentType { .. } => "doctype",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{parse_text, ParseOptions};

    #[test]
    fn test_compile_with_args() {
        let query = XPath::compile_with_args(
            "//dependency[artifactId = '{}' and position() < {}]",
            &[&"junit", &3],
        )
        .unwrap();
        assert_eq!(query.as_str(), "//dependency[artifactId = 'junit' and position() < 3]");
    }

    #[test]
    fn test_compile_with_args_escapes() {
        let query = XPath::compile_with_args("concat('{{', '{}', '}}')", &[&"x"]).unwrap();
        assert_eq!(query.as_str(), "concat('{', 'x', '}')");
    }

    #[test]
    fn test_compile_with_args_count_mismatch() {
        assert!(matches!(
            XPath::compile_with_args("//a[@id = '{}']", &[]),
            Err(DomError::InvalidQuery(_))
        ));
        assert!(matches!(
            XPath::compile_with_args("//a", &[&1]),
            Err(DomError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(XPath::compile("//a["), Err(DomError::InvalidQuery(_))));
        assert!(matches!("".parse::<XPath>(), Err(DomError::InvalidQuery(_))));
    }

    #[test]
    fn test_evaluate_scalar() {
        let tree = parse_text("<a><b/><b/></a>", &ParseOptions::default()).unwrap();
        let query: XPath = "count(/a/b)".parse().unwrap();
        let value = query.evaluate(&tree, tree.root()).unwrap();
        assert_eq!(value.to_number(), 2.0);
        assert_eq!(query.to_string(), "count(/a/b)");
    }

    #[test]
    fn test_select_rejects_non_elements() {
        let tree = Rc::new(RefCell::new(
            parse_text("<a>text<b/></a>", &ParseOptions::default()).unwrap(),
        ));
        let document = tree.borrow().root();
        let scalar = XPath::compile("count(//b)").unwrap();
        assert!(matches!(
            select_elements(&tree, &scalar, document),
            Err(DomError::QueryEvaluation(_))
        ));
        let text = XPath::compile("/a/text()").unwrap();
        assert!(matches!(
            select_elements(&tree, &text, document),
            Err(DomError::QueryEvaluation(_))
        ));
        let elements = XPath::compile("//b").unwrap();
        assert_eq!(select_elements(&tree, &elements, document).unwrap().len(), 1);
    }
}
