//! Geofence commands: a one-shot check and a streaming watch

use crate::error::Result;
use crate::geofence::{Geofence, Transition, Verdict};
use crate::models::GeoPoint;
use crate::session::Session;
use crate::store::LocationStore;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Result of checking one position against one TPH
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub block_code: String,
    pub point_id: String,
    pub target: Option<GeoPoint>,
    pub position: GeoPoint,
    pub radius_m: f64,
    pub verdict: Verdict,
}

/// Check `position` against the TPH `(block_code, point_id)`.
///
/// A TPH without a usable coordinate yields `Verdict::Unknown`.
pub async fn cmd_check(
    store: &LocationStore,
    geofence: &Geofence,
    block_code: &str,
    point_id: &str,
    position: GeoPoint,
) -> Result<CheckResult> {
    info!(block = %block_code, point = %point_id, "Checking position {}", position);

    let record = store.get(block_code, point_id).await?;
    let target = record.target();
    let verdict = geofence.evaluate(Some(position), target);

    Ok(CheckResult {
        block_code: record.block_code,
        point_id: record.point_id,
        target,
        position,
        radius_m: geofence.radius_m(),
        verdict,
    })
}

pub fn print_check(result: &CheckResult) {
    let icon = match result.verdict {
        Verdict::Inside { .. } => "✓",
        Verdict::Outside { .. } => "✗",
        Verdict::Unknown => "?",
    };
    println!(
        "{} TPH {} / {}: {} (radius {} m)",
        icon, result.block_code, result.point_id, result.verdict, result.radius_m
    );
    if result.target.is_none() {
        println!("  ⚠ This TPH has no usable coordinate");
    }
}

/// One accepted position from a watch stream
#[derive(Debug, Clone, Serialize)]
pub struct WatchUpdate {
    pub line: usize,
    pub position: GeoPoint,
    pub transition: Transition,
}

/// Totals for a finished watch
#[derive(Debug, Clone, Serialize)]
pub struct WatchSummary {
    pub positions: usize,
    pub skipped: usize,
    pub transitions: usize,
    pub final_verdict: Verdict,
}

/// Select the TPH in `session`, then feed it one `"lat,lng"` position per
/// input line until EOF. Blank lines are ignored and unparseable ones are
/// skipped with a warning.
pub async fn cmd_watch<R, F>(
    session: &mut Session,
    block_code: &str,
    point_id: &str,
    reader: R,
    mut on_update: F,
) -> Result<WatchSummary>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&WatchUpdate),
{
    session.select_block(Some(block_code)).await?;
    session.select_point(Some(point_id)).await?;
    info!(block = %block_code, point = %point_id, "Watching positions");

    let mut lines = reader.lines();
    let mut summary = WatchSummary {
        positions: 0,
        skipped: 0,
        transitions: 0,
        final_verdict: session.verdict(),
    };
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let position: GeoPoint = match line.parse() {
            Ok(p) => p,
            Err(e) => {
                warn!("Skipping line {}: {}", line_no, e);
                summary.skipped += 1;
                continue;
            }
        };

        let transition = session.update_position(position);
        summary.positions += 1;
        if transition.changed() {
            summary.transitions += 1;
        }
        debug!("Line {}: {}", line_no, transition.current);

        on_update(&WatchUpdate {
            line: line_no,
            position,
            transition,
        });
    }

    summary.final_verdict = session.verdict();
    Ok(summary)
}

pub fn print_watch_update(update: &WatchUpdate) {
    let marker = if update.transition.changed() { "*" } else { " " };
    println!("{} {} -> {}", marker, update.position, update.transition.current);
}

pub fn print_watch_summary(summary: &WatchSummary) {
    println!(
        "\n{} positions, {} skipped, {} transitions. Final: {}",
        summary.positions, summary.skipped, summary.transitions, summary.final_verdict
    );
}
