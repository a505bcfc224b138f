//! Performance benchmarks for Spork
//!
//! These benchmarks measure the performance of key operations:
//! - Document parsing in both formats
//! - Expression parsing and evaluation
//! - Whole-document runs and selection runs over growing documents
//! - File walking with include/exclude filters
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench
//! cargo bench document_parsing
//! cargo bench program_runs
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use spork::document::{self, NodeRef};
use spork::engine::file_walker::FileWalker;
use spork::expr::{self, GlobalScope};
use spork::{Format, Namespace, ParserOptions, Spork};
use std::fs;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

/// A catalog document with `count` product entries
fn catalog(count: usize) -> String {
    let mut xml = String::from("<catalog currency=\"EUR\">\n");
    for i in 0..count {
        xml.push_str(&format!(
            "  <product id=\"p{i}\" category=\"c{}\"><name>Product {i}</name><price>{}.{:02}</price></product>\n",
            i % 7,
            i % 100,
            i % 97
        ));
    }
    xml.push_str("</catalog>\n");
    xml
}

fn parse_catalog(count: usize) -> NodeRef {
    document::parse(catalog(count).as_bytes(), Format::Xml, &ParserOptions::default()).unwrap()
}

const EXTRACTION: &str = "\
    product { ids: $id; currency: $currency }\n\
    product > name { names: _TEXT.strip() }\n\
    product > price { prices: float(_TEXT) }\n\
    _ { total: round(sum(prices), 2); cheap: [p for p in prices if p < 10] }\n";

// ============================================================================
// Document Benchmarks
// ============================================================================

fn bench_document_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_parsing");

    for count in [100, 1_000, 5_000].iter() {
        let text = catalog(*count);
        group.throughput(Throughput::Bytes(text.len() as u64));

        group.bench_with_input(BenchmarkId::new("xml", count), &text, |b, text| {
            b.iter(|| document::parse(black_box(text.as_bytes()), Format::Xml, &ParserOptions::default()))
        });

        group.bench_with_input(BenchmarkId::new("html", count), &text, |b, text| {
            b.iter(|| document::parse(black_box(text.as_bytes()), Format::Html, &ParserOptions::default()))
        });
    }

    group.finish();
}

// ============================================================================
// Expression Benchmarks
// ============================================================================

fn bench_expressions(c: &mut Criterion) {
    let mut group = c.benchmark_group("expressions");
    let globals = GlobalScope::new();
    let locals = Namespace::new();

    let source = "sorted([x * x for x in range(200) if x % 3], reverse=True)[:10]";
    group.bench_function("parse", |b| b.iter(|| expr::parse(black_box(source))));

    let parsed = expr::parse(source).unwrap();
    group.bench_function("evaluate", |b| {
        b.iter(|| expr::Interpreter::new(&globals, &locals).eval(black_box(&parsed)))
    });

    group.bench_function("string_methods", |b| {
        b.iter(|| expr::evaluate(black_box("' - '.join(w.title() for w in 'a quick brown fox'.split())"), &globals, &locals))
    });

    group.finish();
}

// ============================================================================
// Program Run Benchmarks
// ============================================================================

fn bench_program_runs(c: &mut Criterion) {
    let mut group = c.benchmark_group("program_runs");
    let spork = Spork::new(EXTRACTION).unwrap();

    for count in [100, 1_000].iter() {
        let root = parse_catalog(*count);
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::new("run", count), &root, |b, root| {
            b.iter(|| spork.run(Some(black_box(root))).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("select", count), &root, |b, root| {
            b.iter(|| spork.select("product", Some(black_box(root))).unwrap())
        });
    }

    group.finish();
}

fn bench_program_loading(c: &mut Criterion) {
    c.bench_function("program_loading", |b| b.iter(|| Spork::new(black_box(EXTRACTION)).unwrap()));
}

// ============================================================================
// File Walking Benchmarks
// ============================================================================

fn bench_file_walking(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_walking");

    for file_count in [10, 100].iter() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..*file_count {
            let ext = if i % 2 == 0 { "xml" } else { "html" };
            fs::write(temp_dir.path().join(format!("doc{i}.{ext}")), "<a/>").unwrap();
        }
        group.throughput(Throughput::Elements(*file_count as u64));

        group.bench_with_input(BenchmarkId::new("include_xml", file_count), file_count, |b, _| {
            b.iter(|| {
                let include = vec!["**/*.xml".to_string()];
                let walker = FileWalker::new(temp_dir.path(), &include, &[]).unwrap();
                black_box(walker.walk().count())
            })
        });
    }

    group.finish();
}

criterion_group!(document_benches, bench_document_parsing,);

criterion_group!(expression_benches, bench_expressions,);

criterion_group!(run_benches, bench_program_runs, bench_program_loading,);

criterion_group!(file_benches, bench_file_walking,);

criterion_main!(document_benches, expression_benches, run_benches, file_benches);
