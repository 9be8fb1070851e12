//! Example demonstrating periodic reloads from a SQLite settings table.
//!
//! This example shows how to:
//! - Build a provider over a `Settings` table with auto-reload enabled
//! - Subscribe to newly published snapshots
//! - Trigger a manual reload through the process-wide hook
//!
//! Run with: cargo run --example periodic_reload
//!
//! While running, try editing the table with the sqlite3 CLI:
//!   sqlite3 demo-settings.db "UPDATE Settings SET Value = '9090' WHERE Key = 'Site:Port'"

use reloadable_sql_config::prelude::*;
use reloadable_sql_config::sources::SqliteRowSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Periodic Reload Example ===\n");

    // Create the settings database if it doesn't exist
    let db_path = "demo-settings.db";
    if !std::path::Path::new(db_path).exists() {
        let connection = rusqlite::Connection::open(db_path)?;
        connection.execute_batch(
            r#"
            CREATE TABLE Settings ("Key" TEXT PRIMARY KEY, "Value" TEXT);
            INSERT INTO Settings VALUES ('Site:Name', 'example.com');
            INSERT INTO Settings VALUES ('Site:Port', '8080');
            "#,
        )?;
        println!("Created {}", db_path);
    }

    let provider = SqlConfigSource::new(SqliteRowSource::new(db_path))
        .with_auto_reload(Duration::from_secs(2))
        .build()?;

    println!("Settings loaded with auto-reload every 2s\n");

    // Track the number of published snapshots
    let reload_count = Arc::new(AtomicUsize::new(0));
    let reload_count_clone = Arc::clone(&reload_count);
    let _subscription = provider.subscribe(move |snapshot| {
        let count = reload_count_clone.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[Event] Snapshot #{} published ({} keys)", count, snapshot.len());
    });

    print_settings(&provider.snapshot());

    println!("\nPress Ctrl+C to exit\n");

    let mut ticks = 0u32;
    loop {
        tokio::time::sleep(Duration::from_secs(5)).await;
        ticks += 1;

        // Every third pass, exercise the global hook too
        if ticks % 3 == 0 {
            println!("[Manual] Reloading through SqlConfigSource::reload()");
            SqlConfigSource::reload();
        }

        let stats = provider.stats();
        println!(
            "[Status] attempts: {}, failures: {}, last error: {:?}",
            stats.attempts,
            stats.failures,
            provider.last_error()
        );
        print_settings(&provider.snapshot());
    }
}

fn print_settings(snapshot: &Snapshot) {
    let mut entries: Vec<_> = snapshot.iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("  {} = {}", key, value.unwrap_or("<null>"));
    }
}
