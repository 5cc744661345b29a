//! Example demonstrating the memtable write path
//!
//! This example shows:
//! - Generation rotation when the active generation is full
//! - Tombstones shadowing older generations
//! - Flushing frozen generations into leaf pages on disk

use lsmkv::{flush_oldest, BTree, FilePageStore, Memtable, Options};

fn main() -> Result<(), lsmkv::Error> {
    env_logger::init();

    let pages_path = std::env::temp_dir().join("lsmkv_memtable_flush.pages");
    if pages_path.exists() {
        std::fs::remove_file(&pages_path).ok();
    }

    println!("=== Memtable Flush Example ===\n");

    // Example 1: Rotation
    println!("1. Generation rotation:");
    let options = Options::default().memtable_size_threshold(1024).leaf_fill_limit(1024);
    let memtable = Memtable::new(options)?;
    for i in 0..200 {
        let key = format!("user:{:04}", i);
        let value = format!("User {} data", i);
        memtable.update(&key, value);
    }
    println!("   Written 200 entries");
    println!("   Generations: {}", memtable.generation_count());
    println!("   Active generation size: {} bytes", memtable.active_size());

    // Example 2: Tombstones
    println!("\n2. Tombstones:");
    memtable.delete("user:0000");
    match memtable.get("user:0000") {
        Some(_) => println!("   user:0000 still visible (unexpected)"),
        None => println!("   ✓ user:0000 hidden by a tombstone in the active generation"),
    }

    // Example 3: Flush
    println!("\n3. Flush to {:?}:", pages_path);
    let store = FilePageStore::open(&pages_path)?;
    let tree = BTree::new(&store);
    while let Some(summary) = flush_oldest(&memtable, &tree)? {
        println!(
            "   ✓ Generation {} -> {} pages ({} entries, {} tombstones)",
            summary.generation_id,
            summary.pages.len(),
            summary.entries,
            summary.tombstones()
        );
    }
    store.sync()?;
    println!("   Page file slots: {}", store.slot_count());
    println!("   Generations left: {}", memtable.generation_count());

    std::fs::remove_file(&pages_path).ok();
    println!("\n=== Example completed successfully ===");
    Ok(())
}
