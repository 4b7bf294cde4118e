//! # Vincer DOM
//!
//! Fluent XML editing that remembers where you came from.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ xmloxide: parser, arena tree, serializer,   │
//! │           XPath 1.0                         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ dom: Document + chained Element handles     │
//! │  - Parse/load/create/save documents         │
//! │  - Navigate with ancestor links (`up()`)    │
//! │  - Proxy handles for missing children       │
//! │  - Compiled queries returning handles       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vincer_dom::Document;
//!
//! let doc = Document::load("pom.xml")?;
//!
//! // Missing elements are created on demand
//! doc.root()
//!     .get("distributionManagement")
//!     .get("repository")
//!     .get("url")
//!     .materialize()?
//!     .set_text("https://repo.example.com")?;
//!
//! // Queries hand back unchained handles
//! for dependency in doc.xpath("//dependency[scope = 'test']")? {
//!     dependency.remove()?;
//! }
//!
//! doc.save()?;
//! ```

mod document;
mod element;
mod errors;
mod proxy;
mod query;
mod xml;

pub use document::Document;
pub use element::Element;
pub use errors::{DomError, DomResult};
pub use proxy::{Anchor, Proxy, Void};
pub use query::{compile, compile_with_args, XPath};
pub use xml::{OutputConfig, ParseOptions};

pub use xmloxide::{Document as XmlTree, NodeId};
