//! Integration tests loading settings tables from SQLite.

#![cfg(feature = "sqlite")]

use reloadable_sql_config::prelude::*;
use reloadable_sql_config::sources::SqliteRowSource;
use rusqlite::{Connection, params};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

fn settings_db(dir: &TempDir, setup: &str) -> PathBuf {
    let path = dir.path().join("settings.db");
    let connection = Connection::open(&path).unwrap();
    connection.execute_batch(setup).unwrap();
    path
}

fn set_value(path: &Path, key: &str, value: &str) {
    let connection = Connection::open(path).unwrap();
    connection
        .execute(
            r#"UPDATE Settings SET "Value" = ?1 WHERE "Key" = ?2"#,
            params![value, key],
        )
        .unwrap();
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[test]
fn test_build_loads_default_table() {
    let temp_dir = TempDir::new().unwrap();
    let path = settings_db(
        &temp_dir,
        r#"
        CREATE TABLE Settings ("Key" TEXT PRIMARY KEY, "Value" TEXT);
        INSERT INTO Settings VALUES ('Site:Name', 'example.com');
        INSERT INTO Settings VALUES ('Site:Port', '8080');
        "#,
    );

    let provider = SqlConfigSource::new(SqliteRowSource::new(&path))
        .build()
        .unwrap();

    let expected: HashMap<String, Option<String>> = [
        ("Site:Name".to_string(), Some("example.com".to_string())),
        ("Site:Port".to_string(), Some("8080".to_string())),
    ]
    .into_iter()
    .collect();
    assert_eq!(provider.snapshot().to_map(), expected);
}

#[test]
fn test_schema_qualified_custom_columns() {
    let temp_dir = TempDir::new().unwrap();
    let path = settings_db(
        &temp_dir,
        r#"
        CREATE TABLE Configurations (K TEXT, V TEXT, Ignored TEXT);
        INSERT INTO Configurations VALUES ('Site:Name', 'example.com', 'x');
        INSERT INTO Configurations VALUES ('Site:Name', 'example.org', 'y');
        "#,
    );

    let provider = SqlConfigSource::new(SqliteRowSource::new(&path))
        .with_schema("main")
        .with_table("Configurations")
        .with_key_column("K")
        .with_value_column("V")
        .build()
        .unwrap();

    assert_eq!(
        provider.query().to_sql(),
        r#"SELECT "K", "V" FROM "main"."Configurations""#
    );
    // Duplicate keys resolve to the last row
    assert_eq!(provider.get("Site:Name"), Some("example.org".to_string()));
    assert_eq!(provider.snapshot().len(), 1);
}

#[test]
fn test_missing_table_yields_empty_snapshot_until_fixed() {
    let temp_dir = TempDir::new().unwrap();
    let path = settings_db(&temp_dir, "CREATE TABLE Unrelated (x TEXT);");

    let provider = SqlConfigSource::new(SqliteRowSource::new(&path))
        .build()
        .unwrap();
    assert!(provider.snapshot().is_empty());
    assert!(provider.last_error().is_some());
    assert!(provider.try_reload().is_err());

    let connection = Connection::open(&path).unwrap();
    connection
        .execute_batch(
            r#"
            CREATE TABLE Settings ("Key" TEXT, "Value" TEXT);
            INSERT INTO Settings VALUES ('A', '1');
            "#,
        )
        .unwrap();

    provider.reload();
    assert_eq!(provider.get("A"), Some("1".to_string()));
}

#[test]
fn test_outage_keeps_last_good_settings() {
    let temp_dir = TempDir::new().unwrap();
    let path = settings_db(
        &temp_dir,
        r#"
        CREATE TABLE Settings ("Key" TEXT, "Value" TEXT);
        INSERT INTO Settings VALUES ('A', '1');
        "#,
    );

    let provider = SqlConfigSource::new(SqliteRowSource::new(&path))
        .build()
        .unwrap();
    let before = provider.snapshot();

    let connection = Connection::open(&path).unwrap();
    connection.execute_batch("DROP TABLE Settings;").unwrap();

    provider.reload();
    assert_eq!(*provider.snapshot(), *before);
    assert_eq!(provider.stats().failures, 1);
}

#[derive(Debug, Deserialize, PartialEq)]
struct SiteSettings {
    name: String,
    port: u16,
}

#[derive(Debug, Deserialize, PartialEq)]
struct AppSettings {
    site: SiteSettings,
}

#[test]
fn test_bind_loaded_settings() {
    let temp_dir = TempDir::new().unwrap();
    let path = settings_db(
        &temp_dir,
        r#"
        CREATE TABLE Settings ("Key" TEXT, "Value");
        INSERT INTO Settings VALUES ('Site:Name', 'example.com');
        INSERT INTO Settings VALUES ('Site:Port', 8080);
        "#,
    );

    let provider = SqlConfigSource::new(SqliteRowSource::new(&path))
        .build()
        .unwrap();

    let settings: AppSettings = provider.snapshot().bind().unwrap();
    assert_eq!(
        settings,
        AppSettings {
            site: SiteSettings {
                name: "example.com".to_string(),
                port: 8080,
            },
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_auto_reload_picks_up_row_change() {
    let temp_dir = TempDir::new().unwrap();
    let path = settings_db(
        &temp_dir,
        r#"
        CREATE TABLE Settings ("Key" TEXT, "Value" TEXT);
        INSERT INTO Settings VALUES ('A', '1');
        "#,
    );

    let provider = SqlConfigSource::new(SqliteRowSource::new(&path))
        .with_auto_reload(Duration::from_millis(20))
        .build()
        .unwrap();
    assert_eq!(provider.get("A"), Some("1".to_string()));

    set_value(&path, "A", "2");

    assert!(wait_until(|| provider.get("A").as_deref() == Some("2")).await);
    assert!(provider.stats().attempts >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_options_configure_source() {
    let temp_dir = TempDir::new().unwrap();
    let path = settings_db(
        &temp_dir,
        r#"
        CREATE TABLE AppSettings (Name TEXT, Setting TEXT);
        INSERT INTO AppSettings VALUES ('A', '1');
        "#,
    );

    let options = SqlSourceOptions {
        schema: Some("main".to_string()),
        table: "AppSettings".to_string(),
        key_column: "Name".to_string(),
        value_column: "Setting".to_string(),
        auto_reload_interval_ms: Some(20),
    };

    let provider = SqlConfigSource::from_options(&options, SqliteRowSource::new(&path))
        .build()
        .unwrap();
    assert!(provider.is_watching());
    assert_eq!(provider.get("A"), Some("1".to_string()));

    let connection = Connection::open(&path).unwrap();
    connection
        .execute("INSERT INTO AppSettings VALUES ('B', '2')", [])
        .unwrap();

    assert!(wait_until(|| provider.get("B").as_deref() == Some("2")).await);
}
