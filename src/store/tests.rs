use super::*;
use crate::feed::{Coordinates, EntityAttributes};
use chrono::Duration as ChronoDuration;

fn ship(id: &str, observed_at: DateTime<Utc>) -> FeedRecord {
    FeedRecord::new(EntityAttributes::Ship {
        name: Some(format!("VESSEL {}", id)),
        speed_knots: Some(12.5),
        course_deg: Some(45.0),
        heading_deg: Some(45.0),
    })
    .with_id(id)
    .at(Coordinates::new(39.95, -0.05))
    .observed(observed_at)
}

fn store(ttl_secs: u64, max_entities: usize) -> TtlStore {
    TtlStore::new(FeedKind::Ships, Duration::from_secs(ttl_secs), max_entities)
}

#[test]
fn test_upsert_inserts_new_entity() {
    let now = Utc::now();
    let mut store = store(600, 10);

    let replaced = store.upsert(ship("224000001", now), now).unwrap();

    assert!(replaced.is_none());
    assert_eq!(store.len(), 1);
    let entity = store.get("224000001").unwrap();
    assert_eq!(entity.observed_at, now);
    assert_eq!(entity.received_at, now);
}

#[test]
fn test_repeated_upserts_keep_one_entity_with_latest_observation() {
    let now = Utc::now();
    let mut store = store(600, 10);

    for offset in [30, 10, 20, 5] {
        store
            .upsert(ship("224000001", now - ChronoDuration::seconds(offset)), now)
            .unwrap();
    }

    assert_eq!(store.len(), 1);
    // Last write wins, not the newest timestamp
    assert_eq!(
        store.get("224000001").unwrap().observed_at,
        now - ChronoDuration::seconds(5)
    );
}

#[test]
fn test_upsert_returns_replaced_entity() {
    let now = Utc::now();
    let mut store = store(600, 10);
    store.upsert(ship("a", now - ChronoDuration::seconds(1)), now).unwrap();

    let replaced = store.upsert(ship("a", now), now).unwrap().unwrap();
    assert_eq!(replaced.observed_at, now - ChronoDuration::seconds(1));
}

#[test]
fn test_upsert_rejects_invalid_record_without_touching_store() {
    let now = Utc::now();
    let mut store = store(600, 10);
    store.upsert(ship("a", now), now).unwrap();

    let mut bad = ship("b", now);
    bad.coordinates = None;
    assert!(matches!(
        store.upsert(bad, now),
        Err(ValidationError::MissingCoordinates { .. })
    ));

    let mut bad = ship("c", now);
    bad.observed_at = None;
    assert!(matches!(
        store.upsert(bad, now),
        Err(ValidationError::MissingObservedAt { .. })
    ));

    assert_eq!(store.len(), 1);
}

#[test]
fn test_upsert_keeps_feed_supplied_receipt_time() {
    let now = Utc::now();
    let mut store = store(600, 10);
    let mut record = ship("a", now);
    record.received_at = Some(now - ChronoDuration::seconds(3));

    store.upsert(record, now).unwrap();
    assert_eq!(
        store.get("a").unwrap().received_at,
        now - ChronoDuration::seconds(3)
    );
}

#[test]
fn test_redelivered_observation_keeps_first_receipt_time() {
    let observed = Utc::now();
    let mut store = store(600, 10);

    for poll in 0..200 {
        let now = observed + ChronoDuration::seconds(poll * 3);
        store.upsert(ship("a", observed), now).unwrap();
    }

    let entity = store.get("a").unwrap();
    assert_eq!(entity.received_at, observed);
    assert_eq!(
        entity.receipt_age(observed + ChronoDuration::seconds(597)),
        Duration::from_secs(597)
    );
}

#[test]
fn test_new_observation_restarts_receipt_time() {
    let first = Utc::now();
    let later = first + ChronoDuration::seconds(30);
    let mut store = store(600, 10);

    store.upsert(ship("a", first), first).unwrap();
    store.upsert(ship("a", later), later).unwrap();

    assert_eq!(store.get("a").unwrap().received_at, later);
}

#[test]
fn test_sweep_removes_exactly_expired_entities() {
    let now = Utc::now();
    let mut store = store(120, 100);

    store.upsert(ship("fresh", now), now).unwrap();
    store
        .upsert(ship("edge", now - ChronoDuration::seconds(120)), now)
        .unwrap();
    store
        .upsert(ship("stale", now - ChronoDuration::seconds(121)), now)
        .unwrap();
    store
        .upsert(ship("ancient", now - ChronoDuration::hours(2)), now)
        .unwrap();

    let report = store.sweep(now);

    assert_eq!(report, SweepReport { expired: 2, evicted: 0 });
    assert!(store.get("fresh").is_some());
    assert!(store.get("edge").is_some());
    assert!(store.get("stale").is_none());
    assert!(store.get("ancient").is_none());
}

#[test]
fn test_sweep_never_removes_entities_within_ttl() {
    let now = Utc::now();
    let mut store = store(600, 100);
    for i in 0..50 {
        store
            .upsert(ship(&format!("s{}", i), now - ChronoDuration::seconds(i * 10)), now)
            .unwrap();
    }

    let report = store.sweep(now);
    assert_eq!(report.removed(), 0);
    assert_eq!(store.len(), 50);
}

#[test]
fn test_capacity_evicts_oldest_observation_first() {
    let now = Utc::now();
    let mut store = store(600, 2);

    store.upsert(ship("newest", now), now).unwrap();
    store
        .upsert(ship("middle", now - ChronoDuration::seconds(1)), now)
        .unwrap();
    store
        .upsert(ship("oldest", now - ChronoDuration::seconds(2)), now)
        .unwrap();

    let report = store.sweep(now);

    assert_eq!(report, SweepReport { expired: 0, evicted: 1 });
    assert_eq!(store.len(), 2);
    assert!(store.get("oldest").is_none());
    assert!(store.get("middle").is_some());
    assert!(store.get("newest").is_some());
}

#[test]
fn test_capacity_eviction_is_independent_of_insertion_order() {
    let now = Utc::now();
    let mut store = store(600, 1);

    store
        .upsert(ship("older", now - ChronoDuration::seconds(30)), now)
        .unwrap();
    store.upsert(ship("newer", now), now).unwrap();
    store.sweep(now);
    assert!(store.get("newer").is_some());

    let mut store = self::store(600, 1);
    store.upsert(ship("newer", now), now).unwrap();
    store
        .upsert(ship("older", now - ChronoDuration::seconds(30)), now)
        .unwrap();
    store.sweep(now);
    assert!(store.get("newer").is_some());
}

#[test]
fn test_sweep_expires_before_evicting() {
    let now = Utc::now();
    let mut store = store(60, 2);
    store
        .upsert(ship("expired", now - ChronoDuration::seconds(61)), now)
        .unwrap();
    store.upsert(ship("a", now), now).unwrap();
    store.upsert(ship("b", now), now).unwrap();

    let report = store.sweep(now);
    assert_eq!(report, SweepReport { expired: 1, evicted: 0 });
    assert_eq!(store.len(), 2);
}

#[test]
fn test_empty_store_snapshot_is_empty() {
    let mut store = store(600, 10);
    assert!(store.snapshot().is_empty());
    assert_eq!(store.sweep(Utc::now()), SweepReport::default());
}

#[test]
fn test_snapshot_is_point_in_time_copy() {
    let now = Utc::now();
    let mut store = store(600, 10);
    store.upsert(ship("b", now), now).unwrap();
    store.upsert(ship("a", now), now).unwrap();

    let copy = store.snapshot();
    store.clear();

    let ids: Vec<&str> = copy.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(store.is_empty());
}

#[test]
fn test_clear_reports_count() {
    let now = Utc::now();
    let mut store = store(600, 10);
    store.upsert(ship("a", now), now).unwrap();
    store.upsert(ship("b", now), now).unwrap();
    assert_eq!(store.clear(), 2);
    assert_eq!(store.len(), 0);
}
