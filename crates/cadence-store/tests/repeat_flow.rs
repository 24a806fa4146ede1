// End-to-end: the repeat engine driving the real SQLite store.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use cadence_repeat::{Clock, Repeat, RepeatOptions, ScheduleOpts};
use cadence_store::SqliteStore;

const REG: &str = "cadence:flow:repeat";

struct ManualClock(AtomicI64);

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn engine(now: i64) -> (Repeat, Arc<SqliteStore>, Arc<ManualClock>) {
    let store = Arc::new(SqliteStore::in_memory().expect("open store"));
    let clock = Arc::new(ManualClock(AtomicI64::new(now)));
    let repeat = Repeat::new(store.clone(), store.clone(), REG).with_clock(clock.clone());
    (repeat, store, clock)
}

fn every(ms: i64) -> ScheduleOpts {
    ScheduleOpts {
        repeat: RepeatOptions {
            every: Some(ms),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn chain_advances_across_the_grid() {
    let (repeat, store, clock) = engine(12000);

    let first = repeat
        .schedule_next("report", serde_json::json!({"kind": "daily"}), &every(5000), true)
        .await
        .unwrap()
        .expect("first occurrence");
    assert_eq!(first.prev_millis, 15000);
    assert_eq!(first.delay, 3000);
    assert_eq!(store.pending_jobs().unwrap(), 1);

    clock.0.store(15500, Ordering::SeqCst);
    let second = repeat
        .schedule_next(
            "report",
            serde_json::json!({"kind": "daily"}),
            &ScheduleOpts {
                repeat: first.repeat.clone(),
                prev_millis: first.prev_millis,
                job_id: None,
            },
            false,
        )
        .await
        .unwrap()
        .expect("second occurrence");
    assert_eq!(second.prev_millis, 20000);
    assert_eq!(second.repeat.count, Some(2));

    // same definition: the registry holds one entry with the newest score
    assert_eq!(repeat.repeatable_count().await.unwrap(), 1);
    let listed = repeat.repeatables(0, i64::MAX, true).await.unwrap();
    assert_eq!(listed[0].next, 20000);
}

#[tokio::test]
async fn duplicate_scheduling_collapses_at_the_store() {
    let (repeat, store, _clock) = engine(12000);

    // two schedulers computing the same occurrence independently
    for _ in 0..2 {
        repeat
            .schedule_next("report", serde_json::json!({}), &every(5000), true)
            .await
            .unwrap()
            .expect("occurrence");
    }
    assert_eq!(store.pending_jobs().unwrap(), 1);
    assert_eq!(repeat.repeatable_count().await.unwrap(), 1);
}

#[tokio::test]
async fn removal_cancels_the_pending_instance() {
    let (repeat, store, _clock) = engine(12000);
    let opts = RepeatOptions {
        every: Some(5000),
        ..Default::default()
    };
    repeat
        .schedule_next(
            "report",
            serde_json::json!({}),
            &ScheduleOpts {
                repeat: opts.clone(),
                ..Default::default()
            },
            true,
        )
        .await
        .unwrap()
        .expect("occurrence");
    assert_eq!(store.pending_jobs().unwrap(), 1);

    assert_eq!(repeat.remove_repeatable("report", &opts, None).await.unwrap(), 1);
    assert_eq!(store.pending_jobs().unwrap(), 0);
    assert_eq!(repeat.repeatable_count().await.unwrap(), 0);

    // removing again affects nothing
    assert_eq!(repeat.remove_repeatable("report", &opts, None).await.unwrap(), 0);
}

#[tokio::test]
async fn removal_between_occurrences_stops_the_chain() {
    let (repeat, _store, clock) = engine(12000);

    let first = repeat
        .schedule_next("report", serde_json::json!({}), &every(5000), true)
        .await
        .unwrap()
        .expect("first occurrence");

    repeat
        .remove_repeatable_by_key(&first.repeat_key)
        .await
        .unwrap();

    // the worker finishing the first occurrence tries to schedule the next
    clock.0.store(15100, Ordering::SeqCst);
    let next = repeat
        .schedule_next(
            "report",
            serde_json::json!({}),
            &ScheduleOpts {
                repeat: first.repeat.clone(),
                prev_millis: first.prev_millis,
                job_id: None,
            },
            false,
        )
        .await
        .unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn listing_decodes_definitions_in_both_orders() {
    let (repeat, _store, _clock) = engine(0);
    for ms in [1000, 2000, 3000] {
        repeat
            .schedule_next("tick", serde_json::json!({}), &every(ms), true)
            .await
            .unwrap()
            .expect("occurrence");
    }

    let asc = repeat.repeatables(0, i64::MAX, true).await.unwrap();
    let mut desc = repeat.repeatables(0, i64::MAX, false).await.unwrap();
    assert_eq!(asc.len(), 3);
    desc.reverse();
    assert_eq!(asc, desc);
    assert_eq!(asc[0].name, "tick");
    assert_eq!(asc[0].pattern.as_deref(), Some("1000"));

    // bounded range
    let middle = repeat.repeatables(1500, 2500, true).await.unwrap();
    assert_eq!(middle.len(), 1);
    assert_eq!(middle[0].next, 2000);
}

#[tokio::test]
async fn cron_definition_round_trips_through_the_store() {
    let (repeat, _store, _clock) = engine(30_000);
    let opts = ScheduleOpts {
        repeat: RepeatOptions {
            pattern: Some("0 * * * * *".to_string()),
            tz: Some("Europe/Paris".to_string()),
            ..Default::default()
        },
        job_id: Some("minutely".to_string()),
        ..Default::default()
    };

    let job = repeat
        .schedule_next("cron-job", serde_json::json!({}), &opts, true)
        .await
        .unwrap()
        .expect("occurrence");
    assert_eq!(job.prev_millis, 60_000);

    let listed = repeat.repeatables(0, i64::MAX, true).await.unwrap();
    assert_eq!(listed[0].id.as_deref(), Some("minutely"));
    assert_eq!(listed[0].tz.as_deref(), Some("Europe/Paris"));
    assert_eq!(listed[0].pattern.as_deref(), Some("0 * * * * *"));
    assert_eq!(listed[0].next, 60_000);
}
