use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vincer_dom::Document;

fn build_source(count: usize) -> String {
    let mut source = String::from("<accounts>");
    for i in 0..count {
        source.push_str(&format!(
            r#"<account id="{:06}"><name>Account {}</name><balance currency="EUR">{}.50</balance></account>"#,
            i, i, i * 10
        ));
    }
    source.push_str("</accounts>");
    source
}

fn parse_large_document(c: &mut Criterion) {
    let source = build_source(1_000);
    c.bench_function("parse_large_document", |b| {
        b.iter(|| Document::parse(black_box(&source)))
    });
}

fn render_large_document(c: &mut Criterion) {
    let doc = Document::parse(&build_source(1_000)).unwrap();
    c.bench_function("render_large_document", |b| b.iter(|| black_box(doc.to_xml_string())));
}

fn materialize_chains(c: &mut Criterion) {
    c.bench_function("materialize_chains", |b| {
        b.iter(|| {
            let doc = Document::create("project").unwrap();
            for i in 0..100 {
                doc.root()
                    .get("profiles")
                    .materialize()
                    .and_then(|profiles| profiles.add_child("profile"))
                    .and_then(|profile| profile.get("id").materialize())
                    .and_then(|id| id.set_text(i.to_string()))
                    .ok();
            }
            black_box(doc)
        })
    });
}

fn query_large_document(c: &mut Criterion) {
    let doc = Document::parse(&build_source(1_000)).unwrap();
    let query = vincer_dom::compile("//account[balance > 5000]").unwrap();
    c.bench_function("query_large_document", |b| b.iter(|| doc.query(black_box(&query))));
}

criterion_group!(
    benches,
    parse_large_document,
    render_large_document,
    materialize_chains,
    query_large_document
);
criterion_main!(benches);
