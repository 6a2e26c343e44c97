//! Criterion benchmarks for the decision path.
//!
//! Performance targets:
//! - Pure evaluation: < 5us
//! - Query through the memory store: < 20us
//! - Query through SQLite: < 200us

use std::hint::black_box;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use criterion::{Criterion, criterion_group, criterion_main};

use popgate::catalog::{PromptCatalog, StaticSettings};
use popgate::clock::SystemClock;
use popgate::engine::{DecisionEngine, EvaluationInput, Evaluator};
use popgate::model::{
    Frequency, Placement, PromptPolicy, ReaderPromptRecord, SiteSettings, SuppressionFlags,
};
use popgate::signals::{ReaderRequest, Signals};
use popgate::store::{MemoryStore, SqliteStore};

fn policy() -> PromptPolicy {
    PromptPolicy::new(Frequency::Daily, Placement::Bottom)
        .with_utm_suppression("spring-promo")
        .with_newsletter_form()
}

fn settings() -> SiteSettings {
    SiteSettings {
        suppress_newsletter_campaigns: true,
        suppress_all_newsletter_campaigns_if_one_dismissed: true,
    }
}

fn request() -> ReaderRequest {
    ReaderRequest::new()
        .param("rid", "bench-reader")
        .param("popup_id", "1")
        .param("url", "https%3A%2F%2Fnews.example.com%2Fstory")
        .referer("https://news.example.com/story?utm_source=other&utm_medium=social")
}

fn evaluation_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    let evaluator = Evaluator::with_defaults();
    let policy = policy();
    let settings = settings();
    let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default();
    let record = ReaderPromptRecord {
        view_count: 3,
        last_viewed_at: Some(now - chrono::Duration::hours(30)),
        ..ReaderPromptRecord::default()
    };
    let mut flags = SuppressionFlags::default();
    flags.utm_sources.insert("winter-sale".to_string());
    let signals = Signals {
        reader_id: Some("bench-reader".into()),
        prompt_id: Some("1".into()),
        page_url: Some("https://news.example.com/story".into()),
        referer_url: Some("https://news.example.com/story?utm_source=other".into()),
        ..Signals::default()
    };

    group.bench_function("default_rules", |b| {
        b.iter(|| {
            evaluator.evaluate(black_box(&EvaluationInput {
                policy: &policy,
                record: &record,
                flags: &flags,
                signals: &signals,
                settings: &settings,
                now,
            }))
        });
    });
    group.finish();
}

fn engine_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    let catalog = Arc::new(PromptCatalog::new().with_prompt("1", policy()));
    let settings = Arc::new(StaticSettings(settings()));

    let memory = DecisionEngine::new(
        Arc::new(MemoryStore::default()),
        catalog.clone(),
        settings.clone(),
    );
    group.bench_function("query_memory", |b| {
        let request = request();
        b.iter(|| memory.query(black_box(&request)));
    });

    let dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let sqlite_store = SqliteStore::open_with_clock(dir.path().join("bench.db"), Arc::new(SystemClock))
        .unwrap_or_else(|err| panic!("open sqlite: {err}"));
    let sqlite = DecisionEngine::new(Arc::new(sqlite_store), catalog, settings);
    group.bench_function("query_sqlite", |b| {
        let request = request();
        b.iter(|| sqlite.query(black_box(&request)));
    });
    group.bench_function("acknowledge_sqlite", |b| {
        let request = request();
        b.iter(|| sqlite.acknowledge(black_box(&request)));
    });
    group.finish();
}

criterion_group!(benches, evaluation_benchmarks, engine_benchmarks);
criterion_main!(benches);
