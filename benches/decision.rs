use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::hint::black_box;
use toolrelay::decision::llm::{build_decision_prompt, parse_decision};
use toolrelay::decision::pattern::PatternDecider;
use toolrelay::mcp::ToolDescriptor;

fn make_catalog(n_tools: usize) -> Vec<ToolDescriptor> {
    let mut tools: Vec<ToolDescriptor> = [
        "get_all_patients",
        "get_patient_by_name",
        "get_patient_by_id",
        "get_progress_notes",
        "get_care_plan",
    ]
    .into_iter()
    .map(|name| {
        ToolDescriptor::new(name, "patient records").with_input_schema(json!({
            "type": "object",
            "properties": {"patient_id": {"type": "integer"}, "name": {"type": "string"}}
        }))
    })
    .collect();
    for i in tools.len()..n_tools {
        tools.push(ToolDescriptor::new(format!("extra_tool_{i}"), "filler"));
    }
    tools
}

fn bench_parse_decision(c: &mut Criterion) {
    let replies = [
        ("plain", r#"{"action":"call","tool":"get_patient_by_id","arguments":{"patient_id":42}}"#),
        (
            "fenced",
            "Here you go:\n```json\n{\"action\": \"call\", \"tool\": \"get_care_plan\", \"arguments\": {\"patient_id\": 7}}\n```",
        ),
        ("none", r#"{"action":"none"}"#),
        ("prose", "I don't think any tool is needed for this question."),
    ];

    let mut group = c.benchmark_group("parse_decision");
    for (label, reply) in replies {
        group.throughput(Throughput::Bytes(reply.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), reply, |b, reply| {
            b.iter(|| parse_decision(black_box(reply)))
        });
    }
    group.finish();
}

fn bench_pattern_rules(c: &mut Criterion) {
    let decider = PatternDecider::new().expect("patterns compile");
    let messages = [
        ("list", "please list all patients"),
        ("by_name", "find the patient named John Smith"),
        ("by_id", "show me patient id 42"),
        ("progress", "show the progress notes for patient 7"),
        ("miss", "hello, how are you doing today?"),
    ];

    for &n_tools in &[5usize, 50usize] {
        let catalog = make_catalog(n_tools);
        let mut group = c.benchmark_group(format!("pattern_rules_tools{}", n_tools));
        for (label, message) in messages {
            group.bench_with_input(BenchmarkId::from_parameter(label), message, |b, message| {
                b.iter(|| decider.match_message(black_box(message), &catalog))
            });
        }
        group.finish();
    }
}

fn bench_decision_prompt(c: &mut Criterion) {
    let mut group = c.benchmark_group("decision_prompt");
    for &n_tools in &[5usize, 50usize] {
        let catalog = make_catalog(n_tools);
        group.throughput(Throughput::Elements(n_tools as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_tools), &catalog, |b, catalog| {
            b.iter(|| build_decision_prompt(black_box("show me patient id 42"), catalog, &[]))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse_decision,
    bench_pattern_rules,
    bench_decision_prompt
);
criterion_main!(benches);
