//! Benchmarks for the hot paths of a relay session.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use part_relay::producer::partial_json::parse_partial;
use part_relay::relay::channel::materialized_strings;
use part_relay::relay::Part;

fn research_document() -> String {
    let queries: Vec<String> = (0..50).map(|i| format!("query number {i} about async rust")).collect();
    json!({
        "plan": "Break the question into runtime, ecosystem and performance topics. ".repeat(10),
        "queries": queries,
    })
    .to_string()
}

fn bench_partial_json(c: &mut Criterion) {
    let doc = research_document();
    let half = &doc[..doc.len() / 2];

    c.bench_function("partial_json_half_document", |b| {
        b.iter(|| parse_partial(black_box(half)))
    });

    // What a structured stream pays per delta: re-parse every growing prefix.
    let prefixes: Vec<&str> = (16..doc.len())
        .step_by(16)
        .filter(|&i| doc.is_char_boundary(i))
        .map(|i| &doc[..i])
        .collect();

    c.bench_function("partial_json_all_prefixes_16", |b| {
        b.iter(|| {
            for prefix in &prefixes {
                let _ = black_box(parse_partial(prefix));
            }
        })
    });

    let snapshot = json!(["a", null, "b", "c", null, "d"]);
    c.bench_function("materialized_strings", |b| {
        b.iter(|| materialized_strings(black_box(&snapshot)))
    });
}

fn bench_part_serialization(c: &mut Criterion) {
    let delta = Part::TextDelta {
        id: "2f1c6a3e-1b7d-4f0e-9d1c-3a6b5e8f7c90".into(),
        delta: "streamed text ".repeat(4),
    };
    let data = Part::Data {
        tag: "data-search-results".into(),
        id: "8a4e2d1c-5b3f-4a6e-8c7d-9e0f1a2b3c4d".into(),
        data: json!({
            "query": "tokio runtime",
            "hits": (0..5)
                .map(|i| json!({ "title": format!("Result {i}"), "url": format!("https://search.example/tokio/{i}"), "content": "..." }))
                .collect::<Vec<_>>(),
        }),
    };

    c.bench_function("serialize_text_delta", |b| {
        b.iter(|| serde_json::to_string(black_box(&delta)))
    });
    c.bench_function("serialize_search_results", |b| {
        b.iter(|| serde_json::to_string(black_box(&data)))
    });
}

criterion_group!(benches, bench_partial_json, bench_part_serialization);
criterion_main!(benches);
