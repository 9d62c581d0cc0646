//! 探测相关基准测试
//!
//! 覆盖退避计算、响应体解析和结果汇总

use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use service_probe::health::json::{extract_task_id, parse_object};
use service_probe::health::{Endpoint, EndpointResult, FanoutReport, HealthStatus, RetryPolicy};
use service_probe::ServiceBases;
use std::hint::black_box;
use std::time::Duration;

fn retry_benchmark(c: &mut Criterion) {
    let policy = RetryPolicy::new(10);

    c.bench_function("backoff_delay", |b| {
        b.iter(|| {
            for attempt in 1..=policy.max_attempts() {
                black_box(policy.delay_before_attempt(black_box(attempt)));
            }
        });
    });

    c.bench_function("backoff_total", |b| {
        b.iter(|| black_box(policy.total_backoff()));
    });
}

fn json_benchmark(c: &mut Criterion) {
    let body = br#"{"message": "created", "task": {"task": {"uuid": "3f1c"}}}"#;
    let nested = json!({"task": {"task": {"uuid": "3f1c"}}});

    c.bench_function("parse_object", |b| {
        b.iter(|| black_box(parse_object(black_box(body)).is_ok()));
    });

    c.bench_function("extract_task_id_nested", |b| {
        b.iter(|| black_box(extract_task_id(black_box(&nested))));
    });
}

fn report_benchmark(c: &mut Criterion) {
    let endpoints = ServiceBases::default().default_endpoints();
    let results: Vec<EndpointResult> = endpoints
        .iter()
        .enumerate()
        .map(|(i, endpoint)| {
            let status = if i % 4 == 0 {
                HealthStatus::Down
            } else {
                HealthStatus::Up
            };
            EndpointResult::new(endpoint, status)
                .with_status_code(200)
                .with_response_time(Duration::from_millis(i as u64 * 7))
        })
        .collect();

    let report = FanoutReport {
        results,
        started_at: chrono::Utc::now(),
        elapsed: Duration::from_millis(120),
    };

    c.bench_function("report_summary", |b| {
        b.iter(|| {
            black_box((
                report.passed(),
                report.up_count(),
                report.down_count(),
                report.failures().count(),
            ))
        });
    });

    c.bench_function("report_serialization", |b| {
        b.iter(|| {
            let json = serde_json::to_string(black_box(&report)).unwrap();
            black_box(json)
        });
    });

    c.bench_function("endpoint_creation", |b| {
        b.iter(|| black_box(Endpoint::new("Gateway-Project", "http://localhost:8000/project")));
    });
}

criterion_group!(benches, retry_benchmark, json_benchmark, report_benchmark);
criterion_main!(benches);
