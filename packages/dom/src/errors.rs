//! Error types for the document facade

use thiserror::Error;
use xmloxide::error::ParseError;
use xmloxide::xpath::lexer::XPathError as QuerySyntaxError;
use xmloxide::xpath::XPathError;

pub type DomResult<T> = Result<T, DomError>;

#[derive(Error, Debug)]
pub enum DomError {
    #[error("Malformed document: {0}")]
    MalformedDocument(#[from] ParseError),

    #[error("Element '{0}' does not exist")]
    NotExist(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QuerySyntaxError),

    #[error("Query evaluation failed: {0}")]
    QueryEvaluation(#[from] XPathError),

    #[error("Serialization error: {0}")]
    Serialization(#[source] std::io::Error),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Invalid XML name '{0}'")]
    InvalidName(String),

    #[error("Character {0:?} is not allowed in XML")]
    InvalidCharacter(char),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DomError {
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// A query result that is not a set of elements
    pub(crate) fn not_elements(found: impl Into<String>) -> Self {
        Self::QueryEvaluation(XPathError::TypeError {
            expected: "element node-set".to_string(),
            found: found.into(),
        })
    }
}
