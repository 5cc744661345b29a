// Memtable Integration Tests
// These tests cover generation rotation, shadowing and draining

use lsmkv::{Error, Lookup, Memtable, Options};

fn small_memtable(threshold: usize) -> Memtable {
    let _ = env_logger::builder().is_test(true).try_init();
    Memtable::new(Options::default().memtable_size_threshold(threshold).tower_seed(1)).unwrap()
}

/// A write that would overflow the active generation rotates first
#[test]
fn test_rotation_before_overflowing_write() {
    let memtable = small_memtable(10);

    memtable.update("k1", "value1");
    assert_eq!(memtable.generation_count(), 1);
    assert_eq!(memtable.active_size(), 8);

    memtable.update("k2", "value2xx");
    assert_eq!(memtable.generation_count(), 2);
    assert_eq!(memtable.active_size(), 10);

    // k1 is served from the frozen generation
    assert_eq!(memtable.get("k1"), Some("value1".into()));
    assert_eq!(memtable.get("k2"), Some("value2xx".into()));
}

/// Overwriting a key charges only the growth of its value
#[test]
fn test_overwrite_charges_only_growth() {
    let memtable = small_memtable(10);

    memtable.update("k1", "value1");
    for round in 0..50 {
        memtable.update("k1", format!("value{}", round % 10));
    }
    assert_eq!(memtable.generation_count(), 1);
    assert_eq!(memtable.active_size(), 8);
    assert_eq!(memtable.get("k1"), Some("value9".into()));

    // shrinking then growing back within the threshold stays put
    memtable.update("k1", "v");
    memtable.update("k1", "value12");
    assert_eq!(memtable.generation_count(), 1);
    assert_eq!(memtable.active_size(), 9);
}

/// A stream of deletes rotates like a stream of writes
#[test]
fn test_deletes_rotate_generations() {
    let memtable = small_memtable(64);

    for i in 0..10_000 {
        memtable.delete(&format!("never_written_key_{:06}", i));
    }
    assert!(memtable.generation_count() > 1);
    assert!(memtable.active_footprint() <= 64);
    assert_eq!(memtable.active_size(), 0);
    assert!(memtable.is_empty());
    assert_eq!(memtable.lookup("never_written_key_000042"), Some(Lookup::Tombstone));
}

/// An entry bigger than the threshold still lands in an empty generation
#[test]
fn test_oversized_entry() {
    let memtable = small_memtable(4);

    memtable.update("big", "0123456789");
    assert_eq!(memtable.generation_count(), 1);
    assert_eq!(memtable.active_size(), 13);

    // The next write sees a full generation and rotates
    memtable.update("a", "b");
    assert_eq!(memtable.generation_count(), 2);
    assert_eq!(memtable.get("big"), Some("0123456789".into()));
}

/// A tombstone in a newer generation hides the value in an older one
#[test]
fn test_delete_shadows_older_generation() {
    let memtable = small_memtable(1024);

    memtable.update("user", "alice");
    assert!(memtable.freeze());
    memtable.delete("user");

    assert_eq!(memtable.generation_count(), 2);
    assert_eq!(memtable.get("user"), None);
    assert_eq!(memtable.lookup("user"), Some(Lookup::Tombstone));

    // A later write revives it in the same generation
    memtable.update("user", "bob");
    assert_eq!(memtable.get("user"), Some("bob".into()));
}

/// Newer generations win over older ones for the same key
#[test]
fn test_newest_value_wins() {
    let memtable = small_memtable(1024);

    for round in 0..5 {
        memtable.update("counter", format!("{}", round));
        memtable.freeze();
    }

    assert_eq!(memtable.generation_count(), 6);
    assert_eq!(memtable.get("counter"), Some("4".into()));
    assert_eq!(memtable.len(), 5);
}

/// Frozen generations drain oldest first and the active one is never handed out
#[test]
fn test_drain_oldest_first() {
    let memtable = small_memtable(1024);
    assert!(memtable.oldest_iterator().is_none());

    memtable.update("a", "1");
    assert!(memtable.oldest_iterator().is_none());
    memtable.freeze();
    memtable.update("b", "2");
    memtable.freeze();
    memtable.update("c", "3");

    let first = memtable.oldest_iterator().unwrap();
    let keys: Vec<String> = first.map(|entry| entry.key().to_string()).collect();
    assert_eq!(keys, vec!["a"]);

    let oldest = memtable.discard_oldest().unwrap();
    let second = memtable.oldest_iterator().unwrap();
    assert!(second.generation_id() > oldest);
    let keys: Vec<String> = second.map(|entry| entry.key().to_string()).collect();
    assert_eq!(keys, vec!["b"]);

    memtable.discard_oldest();
    assert!(memtable.oldest_iterator().is_none());
    assert_eq!(memtable.generation_count(), 1);
    assert_eq!(memtable.get("a"), None);
    assert_eq!(memtable.get("c"), Some("3".into()));
}

/// Discarding by id refuses a generation that is not the oldest
#[test]
fn test_discard_generation_checks_id() {
    let memtable = small_memtable(1024);
    memtable.update("a", "1");
    memtable.freeze();
    memtable.update("b", "2");

    let id = memtable.oldest_iterator().unwrap().generation_id();
    assert!(matches!(memtable.discard_generation(id + 1), Err(Error::InvalidState(_))));
    memtable.discard_generation(id).unwrap();
    assert!(matches!(memtable.discard_generation(id), Err(Error::InvalidState(_))));
}

/// Iterators keep their generation alive after it is discarded
#[test]
fn test_iterator_outlives_discard() {
    let memtable = small_memtable(1024);
    memtable.update("k", "v");
    memtable.delete("gone");
    memtable.freeze();

    let iter = memtable.oldest_iterator().unwrap();
    memtable.discard_oldest();

    let entries: Vec<_> = iter.map(|entry| entry.into_parts()).collect();
    assert_eq!(entries, vec![("gone".to_string(), None), ("k".to_string(), Some("v".into()))]);
}

/// Options are validated on construction
#[test]
fn test_invalid_options() {
    let result = Memtable::new(Options::default().memtable_size_threshold(0));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}
