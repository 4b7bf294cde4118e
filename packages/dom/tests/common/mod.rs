//! Shared helpers for the integration tests

#![allow(dead_code)]

use vincer_dom::{Document, DomResult};

pub const SAMPLE_POM: &str = include_str!("../fixtures/sample-pom.xml");

pub fn sample_pom() -> DomResult<Document> {
    init_tracing();
    Document::parse(SAMPLE_POM)
}

/// Route library logs to the test harness output; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
