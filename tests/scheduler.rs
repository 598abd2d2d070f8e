//! End-to-end scheduling tests against on-disk SQLite databases.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use cloudmetrics::config::SourceConfig;
use cloudmetrics::storage::{SqlitePool, SqliteTaskLock};
use cloudmetrics::task::{COLLECT_LOCK_KEY, TaskLock};
use cloudmetrics::{
    App, AppConfig, AppError, CheckStatus, CollectorHealth, Frequency, TaskError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn at(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .unwrap()
        .and_utc()
}

/// Host application database with a `user` table.
async fn create_source(dir: &TempDir) -> (String, sqlx::SqlitePool) {
    let url = format!("sqlite:{}", dir.path().join("app.db").display());
    let options = SqliteConnectOptions::from_str(&url)
        .unwrap()
        .journal_mode(SqliteJournalMode::Delete)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query(
        r#"
        CREATE TABLE "user" (
            id INTEGER PRIMARY KEY,
            deleted INTEGER NOT NULL DEFAULT 0,
            timecreated INTEGER NOT NULL DEFAULT 0,
            lastlogin INTEGER NOT NULL DEFAULT 0,
            lastaccess INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    (url, pool)
}

async fn add_user(pool: &sqlx::SqlitePool, login: DateTime<Utc>) {
    let t = login.timestamp();
    sqlx::query("INSERT INTO \"user\" (timecreated, lastlogin, lastaccess) VALUES (?1, ?1, ?1)")
        .bind(t)
        .execute(pool)
        .await
        .unwrap();
}

/// App reading users from `source_url`, configured by `metrics_yaml`.
async fn create_app(dir: &TempDir, source_url: &str, metrics_yaml: &str) -> App {
    let mut config: AppConfig = AppConfig::from_yaml(metrics_yaml).unwrap();
    config.database.url = format!("sqlite:{}?mode=rwc", dir.path().join("cm.db").display());
    config.source = Some(SourceConfig {
        url: source_url.to_string(),
        user_table: "user".to_string(),
    });
    App::build(config).await.unwrap()
}

const ONLY_ACTIVE_15MIN: &str = r#"
metrics:
  activeusers: {enabled: true, frequency: 15min, time_window: 1h}
  newusers: {enabled: false}
  onlineusers: {enabled: false}
  dailyusers: {enabled: false}
"#;

// =============================================================================
// Scheduling
// =============================================================================

#[tokio::test]
async fn test_first_pass_samples_latest_tick_then_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (source_url, source) = create_source(&dir).await;
    let app = create_app(&dir, &source_url, "{}").await;

    add_user(&source, at("2024-01-09T12:00")).await;

    // Wednesday 2024-01-10 00:00:30 UTC: every enabled builtin is due once.
    let now = at("2024-01-10T00:00") + chrono::TimeDelta::seconds(30);
    let report = app.collect(Some(now)).await.unwrap();

    let mut names: Vec<_> = report.sampled.iter().map(|s| s.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["activeusers", "dailyusers", "newusers", "onlineusers"]);
    assert!(report.sampled.iter().all(|s| s.items == 1));
    assert!(report.sampled.iter().all(|s| s.window.finish == at("2024-01-10T00:00")));
    assert_eq!(report.dispatch.delivered, ["database"]);

    let stored = app
        .database()
        .store()
        .query("dailyusers", at("2024-01-01T00:00"), now)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].value, 1.0);

    let again = app.collect(Some(now)).await.unwrap();
    assert_eq!(again.item_count(), 0);
    assert_eq!(again.dispatch.delivered.len(), 0);

    app.close().await;
}

#[tokio::test]
async fn test_catch_up_generates_every_missed_tick() {
    let dir = tempfile::tempdir().unwrap();
    let (source_url, source) = create_source(&dir).await;
    let app = create_app(&dir, &source_url, ONLY_ACTIVE_15MIN).await;

    add_user(&source, at("2024-01-10T00:40")).await;
    add_user(&source, at("2024-01-10T01:10")).await;

    app.settings()
        .set(
            "activeusers_last_generate_time",
            at("2024-01-10T00:20").timestamp(),
        )
        .await
        .unwrap();

    let report = app.collect(Some(at("2024-01-10T01:15"))).await.unwrap();
    assert_eq!(report.item_count(), 4);

    let stored = app
        .database()
        .store()
        .query("activeusers", at("2024-01-10T00:00"), at("2024-01-10T02:00"))
        .await
        .unwrap();
    let times: Vec<_> = stored.iter().map(|s| s.time).collect();
    assert_eq!(
        times,
        [
            at("2024-01-10T00:30"),
            at("2024-01-10T00:45"),
            at("2024-01-10T01:00"),
            at("2024-01-10T01:15"),
        ]
    );
    // One-hour trailing window at each tick.
    let values: Vec<_> = stored.iter().map(|s| s.value).collect();
    assert_eq!(values, [0.0, 1.0, 1.0, 2.0]);

    let descriptor = app.metrics().get("activeusers").unwrap();
    assert_eq!(
        descriptor.last_generate_time().await.unwrap(),
        Some(at("2024-01-10T01:15"))
    );
    assert_eq!(descriptor.last_value().await.unwrap(), Some(2.0));

    app.close().await;
}

#[tokio::test]
async fn test_frequency_change_realigns_to_new_grid() {
    let dir = tempfile::tempdir().unwrap();
    let (source_url, _source) = create_source(&dir).await;
    let app = create_app(&dir, &source_url, ONLY_ACTIVE_15MIN).await;

    let first = app.collect(Some(at("2024-01-10T00:50"))).await.unwrap();
    assert_eq!(first.sampled[0].window.finish, at("2024-01-10T00:45"));

    let descriptor = app.metrics().get("activeusers").unwrap();
    descriptor
        .set_frequency(Frequency::Hour, &app.timezone())
        .await
        .unwrap();
    assert_eq!(
        descriptor.last_generate_time().await.unwrap(),
        Some(at("2024-01-10T00:00"))
    );

    let report = app.collect(Some(at("2024-01-10T01:05"))).await.unwrap();
    assert_eq!(report.item_count(), 1);
    assert_eq!(report.sampled[0].window.finish, at("2024-01-10T01:00"));

    app.close().await;
}

#[tokio::test]
async fn test_backfill_reaches_database_only() {
    let dir = tempfile::tempdir().unwrap();
    let (source_url, source) = create_source(&dir).await;
    let app = create_app(&dir, &source_url, ONLY_ACTIVE_15MIN).await;
    add_user(&source, at("2024-01-10T00:40")).await;

    let report = app
        .backfill("activeusers", Duration::from_secs(3600), at("2024-01-10T01:07"))
        .await
        .unwrap();
    assert_eq!(report.delivered, ["database"]);

    let stored = app
        .database()
        .store()
        .query("activeusers", at("2024-01-10T00:00"), at("2024-01-10T02:00"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0].time, at("2024-01-10T00:15"));
    assert_eq!(stored[3].time, at("2024-01-10T01:00"));

    // Backfill leaves generation state and health alone.
    let descriptor = app.metrics().get("activeusers").unwrap();
    assert_eq!(descriptor.last_generate_time().await.unwrap(), None);
    assert_eq!(
        app.collectors().health("database").await.unwrap(),
        CollectorHealth::Never
    );

    // Backfilling the same ticks again replaces their values.
    app.backfill("activeusers", Duration::from_secs(3600), at("2024-01-10T01:07"))
        .await
        .unwrap();
    app.collect(Some(at("2024-01-10T01:07"))).await.unwrap();
    let stored = app
        .database()
        .store()
        .query("activeusers", at("2024-01-10T00:00"), at("2024-01-10T02:00"))
        .await
        .unwrap();
    assert_eq!(stored.len(), 4);

    app.close().await;
}

#[tokio::test]
async fn test_daily_catch_up_across_daylight_saving_start() {
    let dir = tempfile::tempdir().unwrap();
    let (source_url, _source) = create_source(&dir).await;
    let app = create_app(
        &dir,
        &source_url,
        r#"
timezone: Australia/Melbourne
metrics:
  activeusers: {enabled: true, frequency: day}
  newusers: {enabled: false}
  onlineusers: {enabled: false}
  dailyusers: {enabled: false}
"#,
    )
    .await;
    let melbourne = app.timezone();

    // Sunday 2024-10-06 00:00 at +10; clocks go forward to +11 at 02:00 that day.
    app.settings()
        .set(
            "activeusers_last_generate_time",
            at("2024-10-05T14:00").timestamp(),
        )
        .await
        .unwrap();

    // Monday 2024-10-14 02:00 at +11.
    let report = app.collect(Some(at("2024-10-13T15:00"))).await.unwrap();
    assert_eq!(report.item_count(), 8);

    let stored = app
        .database()
        .store()
        .query("activeusers", at("2024-10-05T00:00"), at("2024-10-14T00:00"))
        .await
        .unwrap();
    let times: Vec<_> = stored.iter().map(|s| s.time).collect();
    assert_eq!(times[0], at("2024-10-06T14:00"));
    // From the next Sunday on, ticks sit on local midnight again.
    assert_eq!(&times[6..], [at("2024-10-12T13:00"), at("2024-10-13T13:00")]);
    for time in &times[6..] {
        let local = time.with_timezone(&melbourne);
        assert_eq!((local.hour(), local.minute()), (0, 0));
    }

    let descriptor = app.metrics().get("activeusers").unwrap();
    assert_eq!(
        descriptor.last_generate_time().await.unwrap(),
        Some(at("2024-10-13T13:00"))
    );

    let next = app.collect(Some(at("2024-10-14T13:05"))).await.unwrap();
    assert_eq!(next.item_count(), 1);
    assert_eq!(next.sampled[0].window.finish, at("2024-10-14T13:00"));

    app.close().await;
}

#[tokio::test]
async fn test_overlapping_pass_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (source_url, _source) = create_source(&dir).await;
    let app = create_app(&dir, &source_url, ONLY_ACTIVE_15MIN).await;

    let pool = SqlitePool::connect(&app.config().database.url).await.unwrap();
    let lock = SqliteTaskLock::new(pool.clone());
    assert!(
        lock.try_acquire(COLLECT_LOCK_KEY, "other-host", Duration::from_secs(60), Utc::now())
            .await
            .unwrap()
    );

    let result = app.collect(Some(at("2024-01-10T00:50"))).await;
    assert!(matches!(
        result,
        Err(AppError::Task(TaskError::AlreadyRunning(_)))
    ));
    let descriptor = app.metrics().get("activeusers").unwrap();
    assert_eq!(descriptor.last_generate_time().await.unwrap(), None);

    lock.release(COLLECT_LOCK_KEY, "other-host").await.unwrap();
    assert!(app.collect(Some(at("2024-01-10T00:50"))).await.is_ok());

    pool.close().await;
    app.close().await;
}

#[tokio::test]
async fn test_reset_and_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let (source_url, _source) = create_source(&dir).await;
    let app = create_app(&dir, &source_url, ONLY_ACTIVE_15MIN).await;

    app.collect(Some(at("2024-01-10T00:50"))).await.unwrap();
    app.add_metrics("synthetic", 3, at("2022-01-01T00:00"))
        .await
        .unwrap();

    // Default retention is a year.
    assert_eq!(app.cleanup(at("2024-01-10T00:50")).await.unwrap(), 3);

    assert_eq!(app.reset("activeusers").await.unwrap(), 1);
    let descriptor = app.metrics().get("activeusers").unwrap();
    assert_eq!(descriptor.last_generate_time().await.unwrap(), None);

    let status = app.status(Utc::now()).await.unwrap();
    let database = &status.health.collectors[0];
    assert_eq!(database.status, CheckStatus::Ok);
    assert!(database.summary.starts_with("database working for"));

    app.close().await;
}
