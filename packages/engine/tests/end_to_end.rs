//! Crate-level integration tests driving the engine through its public
//! façades only -- no direct access to `MemoryState` or the dispatcher's
//! internal mailbox.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jobstore_core::{InvocationData, VirtualClock};
use jobstore_engine::{Engine, EngineConfig, StorageError};

fn job(type_tag: &str) -> InvocationData {
    InvocationData { type_tag: type_tag.to_string(), payload: Vec::new() }
}

#[tokio::test]
async fn create_enqueue_fetch() {
    let engine = Engine::start(EngineConfig::default());
    let conn = engine.connection();

    let mut txn = conn.create_transaction();
    let id = txn.create_job(
        job("send_email"),
        BTreeMap::from([("k".to_string(), "v".to_string())]),
        Some(Duration::from_secs(3600)),
    );
    txn.set_job_state(id, "Enqueued".to_string(), None, BTreeMap::new());
    txn.add_to_queue("default".to_string(), id);
    txn.commit().await.unwrap();

    let fetched = conn
        .get_next_job_from_queues(&["default".to_string()], Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(fetched.job_id, id);
    assert_eq!(fetched.queue_name, "default");
}

#[tokio::test]
async fn blocking_fetch_times_out_after_the_requested_deadline() {
    let engine = Engine::start(EngineConfig::default());
    let conn = engine.connection();

    let started = Instant::now();
    let result = conn.get_next_job_from_queues(&["default".to_string()], Duration::from_millis(200)).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(StorageError::FetchTimeout)));
    assert!(elapsed >= Duration::from_millis(200));
}

#[tokio::test]
async fn lock_reentrance_across_two_owners() {
    let engine = Engine::start(EngineConfig::default());
    let owner_a = engine.connection();
    let owner_b = engine.connection();

    let handle1 = owner_a.acquire_distributed_lock("resource", Duration::from_secs(1)).await.unwrap();
    let handle2 = owner_a.acquire_distributed_lock("resource", Duration::from_secs(1)).await.unwrap();

    let contended = owner_b.acquire_distributed_lock("resource", Duration::from_millis(100)).await;
    assert!(matches!(contended, Err(StorageError::LockTimeout { .. })));

    drop(handle1);
    drop(handle2);

    owner_b.acquire_distributed_lock("resource", Duration::from_millis(100)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn expiration_cap_applies_to_jobs_but_not_counters() {
    let clock = Arc::new(VirtualClock::new());
    let config = EngineConfig { max_expiration_time: Some(Duration::from_secs(3 * 3600)), ..EngineConfig::default() };
    let engine = Engine::start_with_clock(config, clock.clone());
    let conn = engine.connection();

    let mut txn = conn.create_transaction();
    let id = txn.create_job(job("report"), BTreeMap::new(), Some(Duration::from_secs(7 * 24 * 3600)));
    txn.increment_counter("stats:succeeded".to_string(), 1, Some(Duration::from_secs(7 * 24 * 3600)));
    txn.commit().await.unwrap();

    let past_cap = Duration::from_secs(3 * 3600) + Duration::from_millis(50);
    clock.advance(past_cap);
    tokio::time::advance(past_cap).await;

    let job_data = conn.get_job_data(id).await;
    assert!(matches!(job_data, Err(StorageError::UnknownJob { .. })), "job TTL should have been capped to 3h and evicted");

    let counter = conn.counter_value("stats:succeeded").await;
    assert_eq!(counter, Some(1), "counters bypass the expiration cap and must still be alive past 3h");
}

#[tokio::test(start_paused = true)]
async fn eviction_sweep_removes_only_entries_past_their_ttl() {
    let clock = Arc::new(VirtualClock::new());
    let config = EngineConfig { eviction_interval: Duration::from_millis(5), ..EngineConfig::default() };
    let engine = Engine::start_with_clock(config, clock.clone());
    let conn = engine.connection();

    let ttls_ms = [10_u64, 20, 30, 40, 50];
    let mut txn = conn.create_transaction();
    for (i, ttl) in ttls_ms.iter().enumerate() {
        let key = format!("h{i}");
        txn.set_hash_fields(key.clone(), BTreeMap::from([("a".to_string(), "1".to_string())]));
        txn.expire_hash(key, Some(Duration::from_millis(*ttl)));
    }
    txn.commit().await.unwrap();

    let elapsed = Duration::from_millis(35);
    clock.advance(elapsed);
    tokio::time::advance(elapsed + Duration::from_millis(5)).await;

    for (i, ttl) in ttls_ms.iter().enumerate() {
        let key = format!("h{i}");
        let still_present = conn.hash_all(&key).await.is_some();
        assert_eq!(still_present, *ttl > 35, "hash {key} with ttl {ttl}ms at t=35ms");
    }
}

#[tokio::test]
async fn transaction_partial_failure_keeps_earlier_writes_and_skips_later_ones() {
    let engine = Engine::start(EngineConfig::default());
    let conn = engine.connection();

    let mut txn = conn.create_transaction();
    txn.set_hash_fields("survivor".to_string(), BTreeMap::from([("a".to_string(), "1".to_string())]));
    txn.add_to_set("broken".to_string(), "member".to_string(), f64::NAN);
    txn.prepend_to_list("never-applied".to_string(), "x".to_string());

    let err = txn.commit().await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument { .. }));

    assert_eq!(conn.hash_all("survivor").await, Some(BTreeMap::from([("a".to_string(), "1".to_string())])));
    assert_eq!(conn.list_len("never-applied").await, 0);
}

#[tokio::test]
async fn blocked_fetch_is_woken_by_a_queue_push_even_when_the_rest_of_its_transaction_then_fails() {
    let engine = Engine::start(EngineConfig::default());
    let conn = engine.connection();

    let fetcher = engine.connection();
    let waiting = tokio::spawn(async move {
        fetcher.get_next_job_from_queues(&["default".to_string()], Duration::from_secs(5)).await
    });

    // Give the fetch a moment to park on the queue's Notify before the push.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut txn = conn.create_transaction();
    let job_id = txn.create_job(job("send_email"), BTreeMap::new(), None);
    txn.add_to_queue("default".to_string(), job_id);
    txn.add_to_set("broken".to_string(), "member".to_string(), f64::NAN);
    let err = txn.commit().await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidArgument { .. }));

    let fetched = tokio::time::timeout(Duration::from_secs(1), waiting)
        .await
        .expect("fetch should be woken promptly, not left parked until its own timeout")
        .unwrap()
        .unwrap();
    assert_eq!(fetched.job_id, job_id);
    assert_eq!(fetched.queue_name, "default");
}
