//! Pipeline behavior tests
//!
//! Runs the aggregator against a scripted lookup and in-memory or file-backed
//! dedup stores. Pacing tests use tokio's paused clock.

mod helpers;

use cnpj_common::events::{EnrichEvent, EventBus};
use cnpj_enrich::services::{
    normalize_batch, write_report, DedupStore, FileDedupStore, MemoryDedupStore,
};
use cnpj_enrich::types::{
    Activity, Category, ClassifiedRecord, LookupError, OfficePayload,
};
use cnpj_enrich::workflow::{Pipeline, PipelineConfig};
use helpers::{company, ids, FakeLookup, Scripted, UnwritableStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn no_delay() -> PipelineConfig {
    PipelineConfig {
        rate_delay: Duration::ZERO,
    }
}

fn paced() -> PipelineConfig {
    PipelineConfig {
        rate_delay: Duration::from_secs(12),
    }
}

#[tokio::test]
async fn test_already_queried_identifiers_are_never_looked_up() {
    let lookup = Arc::new(FakeLookup::new().developer("22222222000122"));
    let mut store = MemoryDedupStore::with_entries(["11111111000111", "33333333000133"]);
    let pipeline = Pipeline::new(lookup.clone(), no_delay());

    let outcome = pipeline
        .run(
            &ids(&["11111111000111", "22222222000122", "33333333000133"]),
            &mut store,
        )
        .await;

    assert_eq!(lookup.calls(), ids(&["22222222000122"]));
    assert_eq!(outcome.records[0], ClassifiedRecord::already_queried("11111111000111"));
    assert_eq!(outcome.records[2], ClassifiedRecord::already_queried("33333333000133"));
    assert_eq!(outcome.counters.get(Category::AlreadyQueried), 2);
}

#[tokio::test]
async fn test_rerun_queries_nothing_already_processed() {
    let temp_dir = TempDir::new().unwrap();
    let dedup_path = temp_dir.path().join("ja_consultados.txt");
    let input = ids(&["22222222000122", "44444444000144", "55555555000155"]);
    let lookup = Arc::new(
        FakeLookup::new()
            .developer("22222222000122")
            .failing("55555555000155", LookupError::Transport("timed out".to_string())),
    );

    {
        let mut store = FileDedupStore::load(&dedup_path).unwrap();
        let outcome = Pipeline::new(lookup.clone(), no_delay())
            .run(&input, &mut store)
            .await;
        assert_eq!(outcome.live_calls, 3);
    }

    // Every live attempt, failed or not, is on disk
    let contents = std::fs::read_to_string(&dedup_path).unwrap();
    assert_eq!(
        contents.lines().collect::<Vec<_>>(),
        vec!["22222222000122", "44444444000144", "55555555000155"]
    );

    let mut store = FileDedupStore::load(&dedup_path).unwrap();
    let second = Pipeline::new(lookup.clone(), no_delay())
        .run(&input, &mut store)
        .await;

    assert_eq!(lookup.calls().len(), 3, "second run must not call the lookup");
    assert_eq!(second.live_calls, 0);
    assert!(second
        .records
        .iter()
        .all(|r| r.category == Category::AlreadyQueried));
}

#[tokio::test]
async fn test_developer_keyword_is_case_insensitive() {
    let mut payload = company("22222222000122", "DESENVOLVIMENTO DE PROGRAMAS");
    payload.side_activities = Some(vec![Activity {
        text: Some("Suporte técnico".to_string()),
    }]);
    let lookup = Arc::new(FakeLookup::new().respond("22222222000122", Scripted::Payload(payload)));
    let mut store = MemoryDedupStore::new();

    let outcome = Pipeline::new(lookup, no_delay())
        .run(&ids(&["22222222000122"]), &mut store)
        .await;

    assert_eq!(outcome.records[0].category, Category::Developer);
    assert_eq!(outcome.records[0].phone, "(11) 40028922");
    assert_eq!(outcome.records[0].name, "Empresa 22222222000122 LTDA");
}

#[tokio::test]
async fn test_payload_without_contact_is_not_found() {
    let payload = OfficePayload {
        tax_id: Some("22222222000122".to_string()),
        alias: Some("Software House".to_string()),
        main_activity: Some(Activity {
            text: Some("Desenvolvimento de programas".to_string()),
        }),
        ..Default::default()
    };
    let lookup = Arc::new(FakeLookup::new().respond("22222222000122", Scripted::Payload(payload)));
    let mut store = MemoryDedupStore::new();

    let outcome = Pipeline::new(lookup, no_delay())
        .run(&ids(&["22222222000122"]), &mut store)
        .await;

    assert_eq!(outcome.records, vec![ClassifiedRecord::not_found("22222222000122")]);
    assert_eq!(outcome.counters.get(Category::Developer), 0);
    assert_eq!(outcome.counters.get(Category::NotFound), 1);
}

#[tokio::test]
async fn test_report_rows_follow_category_priority() {
    let temp_dir = TempDir::new().unwrap();
    let report_path = temp_dir.path().join("resultado_final.csv");
    let lookup = Arc::new(
        FakeLookup::new()
            .developer("22222222000122")
            .non_developer("44444444000144"),
    );
    let mut store = MemoryDedupStore::with_entries(["33333333000133"]);

    // Discovery order: NotFound, Developer, AlreadyQueried, NonDeveloper
    let outcome = Pipeline::new(lookup, no_delay())
        .run(
            &ids(&["11111111000111", "22222222000122", "33333333000133", "44444444000144"]),
            &mut store,
        )
        .await;
    assert!(write_report(&outcome.records, &report_path).unwrap());

    let text = std::fs::read_to_string(&report_path).unwrap();
    let statuses: Vec<_> = text
        .lines()
        .skip(1)
        .map(|line| line.rsplit(',').next().unwrap().to_string())
        .collect();
    assert_eq!(
        statuses,
        vec!["NonDeveloper", "AlreadyQueried", "Developer", "NotFound"]
    );
}

#[tokio::test]
async fn test_one_failure_in_five_is_isolated() {
    let batch = ids(&[
        "11111111000111",
        "22222222000122",
        "33333333000133",
        "44444444000144",
        "55555555000155",
    ]);
    let lookup = Arc::new(
        FakeLookup::new()
            .developer("11111111000111")
            .developer("22222222000122")
            .failing("33333333000133", LookupError::Malformed("expected value".to_string()))
            .non_developer("44444444000144")
            .non_developer("55555555000155"),
    );
    let mut store = MemoryDedupStore::new();

    let outcome = Pipeline::new(lookup, no_delay()).run(&batch, &mut store).await;

    assert_eq!(outcome.records.len(), 5);
    assert_eq!(outcome.records[2], ClassifiedRecord::not_found("33333333000133"));
    assert_eq!(outcome.counters.get(Category::Developer), 2);
    assert_eq!(outcome.counters.get(Category::NonDeveloper), 2);
    assert_eq!(outcome.counters.get(Category::NotFound), 1);
}

#[tokio::test]
async fn test_panicking_lookup_does_not_abort_batch() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let lookup = Arc::new(
        FakeLookup::new()
            .panicking("11111111000111")
            .developer("22222222000122"),
    );
    let mut store = MemoryDedupStore::new();

    let outcome = Pipeline::with_events(lookup, no_delay(), bus)
        .run(&ids(&["11111111000111", "22222222000122"]), &mut store)
        .await;

    assert_eq!(outcome.records[0].category, Category::NotFound);
    assert_eq!(outcome.records[1].category, Category::Developer);
    assert!(store.contains("11111111000111"));

    let mut failed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EnrichEvent::ItemFailed { index, message, .. } = event {
            failed.push((index, message));
        }
    }
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, 1);
    assert!(failed[0].1.contains("panicked"));
}

#[tokio::test]
async fn test_store_append_failure_marks_item_not_found() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let lookup = Arc::new(
        FakeLookup::new()
            .developer("11111111000111")
            .non_developer("22222222000122"),
    );
    let mut store = UnwritableStore::new();

    let outcome = Pipeline::with_events(lookup.clone(), no_delay(), bus)
        .run(
            &ids(&["11111111000111", "22222222000122", "11111111000111"]),
            &mut store,
        )
        .await;

    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.records[0], ClassifiedRecord::not_found("11111111000111"));
    assert_eq!(outcome.records[1], ClassifiedRecord::not_found("22222222000122"));
    // Remembered in memory even though the append failed
    assert_eq!(outcome.records[2].category, Category::AlreadyQueried);
    assert_eq!(lookup.calls(), ids(&["11111111000111", "22222222000122"]));
    assert_eq!(store.attempts(), 2);

    let mut failed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let EnrichEvent::ItemFailed { index, cnpj, message, .. } = event {
            failed.push((index, cnpj, message));
        }
    }
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].0, 1);
    assert_eq!(failed[1].1, "22222222000122");
    assert!(failed[0].2.contains("no space left on device"));
}

#[tokio::test]
async fn test_counters_sum_to_non_empty_identifiers() {
    let raw = vec![
        "12.345.678/0001-95",
        "",
        "   ",
        "22.222.222/0001-22",
        "abc",
        "33333333000133",
        "12345678000195",
    ];
    let identifiers = normalize_batch(&raw);
    assert_eq!(identifiers.len(), 4);

    let lookup = Arc::new(FakeLookup::new().developer("22222222000122"));
    let mut store = MemoryDedupStore::with_entries(["33333333000133"]);

    let outcome = Pipeline::new(lookup, no_delay())
        .run(&identifiers, &mut store)
        .await;

    assert_eq!(outcome.counters.total(), identifiers.len() as u64);
    assert_eq!(outcome.records.len(), identifiers.len());
    assert_eq!(outcome.processed, outcome.total);
    // Duplicate of the first identifier in the same batch
    assert_eq!(outcome.records[3].category, Category::AlreadyQueried);
}

#[tokio::test(start_paused = true)]
async fn test_live_calls_are_spaced_by_rate_delay() {
    let lookup = Arc::new(
        FakeLookup::new()
            .developer("11111111000111")
            .developer("22222222000122")
            .developer("44444444000144"),
    );
    let mut store = MemoryDedupStore::with_entries(["33333333000133"]);
    let start = Instant::now();

    let outcome = Pipeline::new(lookup.clone(), paced())
        .run(
            &ids(&["11111111000111", "22222222000122", "33333333000133", "44444444000144"]),
            &mut store,
        )
        .await;

    let times = lookup.call_times();
    assert_eq!(times.len(), 3);
    assert_eq!(times[0] - start, Duration::ZERO, "first call is not delayed");
    for pair in times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(12), "gap {:?} shorter than delay", gap);
        assert!(gap < Duration::from_secs(13), "store hit added delay: {:?}", gap);
    }
    // No trailing wait after the last call
    assert!(start.elapsed() < Duration::from_secs(25));
    assert_eq!(outcome.live_calls, 3);
}

#[tokio::test(start_paused = true)]
async fn test_store_hits_incur_no_delay() {
    let lookup = Arc::new(FakeLookup::new());
    let mut store = MemoryDedupStore::with_entries(["11111111000111", "22222222000122"]);
    let start = Instant::now();

    Pipeline::new(lookup, paced())
        .run(&ids(&["11111111000111", "22222222000122"]), &mut store)
        .await;

    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_pacing_wait() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let lookup = Arc::new(
        FakeLookup::new()
            .developer("11111111000111")
            .developer("22222222000122"),
    );
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });
    let mut store = MemoryDedupStore::new();

    let outcome = Pipeline::with_events(lookup.clone(), paced(), bus)
        .with_cancellation(token)
        .run(&ids(&["11111111000111", "22222222000122"]), &mut store)
        .await;

    assert!(outcome.cancelled);
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.total, 2);
    assert_eq!(lookup.calls(), ids(&["11111111000111"]));
    assert!(!store.contains("22222222000122"));

    let mut saw_cancelled = false;
    while let Ok(event) = rx.try_recv() {
        if let EnrichEvent::RunCancelled { processed, total, .. } = event {
            assert_eq!((processed, total), (1, 2));
            saw_cancelled = true;
        }
    }
    assert!(saw_cancelled);
}

#[tokio::test]
async fn test_event_sequence_for_small_run() {
    let bus = EventBus::new(64);
    let mut rx = bus.subscribe();
    let lookup = Arc::new(FakeLookup::new().developer("22222222000122"));
    let mut store = MemoryDedupStore::with_entries(["11111111000111"]);

    Pipeline::with_events(lookup, no_delay(), bus)
        .run(&ids(&["11111111000111", "22222222000122"]), &mut store)
        .await;

    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type());
    }
    assert_eq!(
        types,
        vec![
            "RunStarted",
            "Progress",
            "ItemClassified",
            "Progress",
            "ItemClassified",
        ]
    );
}
