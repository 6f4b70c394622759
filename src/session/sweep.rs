//! # Retention Sweep
//!
//! Out-of-band deletion of expired sessions. Session directories are named
//! with the client's millisecond timestamp, so the directory name doubles as
//! the creation time: the sweep parses each top-level name and recursively
//! deletes any directory older than the retention window.
//!
//! ## Sweep contract:
//! - Hidden (dotfile) and non-numeric directory names are skipped, never
//!   errors; UUID-keyed sessions are simply not subject to the sweep
//! - Per-directory delete failures are logged and skipped; one bad entry
//!   never aborts the whole sweep
//! - The sweep may race an in-flight generation reading a session near
//!   expiry; the loser of that race fails with `SourceUnavailable`, which is
//!   the accepted best-effort behavior

use crate::session::store::SessionStore;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Names that parse numerically but predate this are not real session
/// timestamps (2000-01-01 UTC in milliseconds); they are skipped like any
/// other non-timestamp name instead of being treated as infinitely old.
const MIN_PLAUSIBLE_TIMESTAMP_MS: i64 = 946_684_800_000;

/// Outcome counters for one sweep pass.
#[derive(Debug, Default, PartialEq)]
pub struct SweepReport {
    /// Top-level entries examined
    pub examined: usize,
    /// Session directories deleted
    pub deleted: usize,
    /// Entries skipped (hidden, non-numeric, or not yet expired)
    pub skipped: usize,
    /// Delete attempts that failed (logged, not fatal)
    pub failed: usize,
}

/// Delete every session directory whose name parses as a millisecond
/// timestamp older than `retention` relative to `now_ms`.
pub fn sweep_expired(store: &SessionStore, now_ms: i64, retention: Duration) -> SweepReport {
    let mut report = SweepReport::default();

    let entries = match fs::read_dir(store.root()) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(root = %store.root().display(), error = %e, "sweep could not list storage root");
            return report;
        }
    };

    let cutoff_ms = now_ms - retention.as_millis() as i64;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        report.examined += 1;

        let name = entry.file_name();
        let name = name.to_string_lossy();

        // Hidden directories and non-timestamp keys are not sweep targets.
        if name.starts_with('.') {
            report.skipped += 1;
            continue;
        }
        let created_ms: i64 = match name.parse() {
            Ok(ms) if ms >= MIN_PLAUSIBLE_TIMESTAMP_MS => ms,
            _ => {
                report.skipped += 1;
                continue;
            }
        };

        if created_ms >= cutoff_ms {
            report.skipped += 1;
            continue;
        }

        match fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::info!(session = %name, "sweep deleted expired session");
                report.deleted += 1;
            }
            Err(e) => {
                tracing::warn!(session = %name, error = %e, "sweep failed to delete session");
                report.failed += 1;
            }
        }
    }

    report
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Run the sweep forever on a fixed interval. Spawned as a background task
/// at startup; the sweep itself is blocking filesystem work, so each pass
/// runs on the blocking pool.
pub async fn run_periodic(store: Arc<SessionStore>, interval: Duration, retention: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; skip it so startup isn't spent
    // sweeping before the server binds.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let store = store.clone();
        let result = tokio::task::spawn_blocking(move || {
            sweep_expired(&store, now_millis(), retention)
        })
        .await;

        match result {
            Ok(report) => {
                if report.deleted > 0 || report.failed > 0 {
                    tracing::info!(
                        examined = report.examined,
                        deleted = report.deleted,
                        failed = report.failed,
                        "retention sweep finished"
                    );
                }
            }
            Err(e) => tracing::error!(error = %e, "retention sweep task panicked"),
        }
    }
}
