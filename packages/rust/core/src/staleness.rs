//! Decides which incidents need a fresh summary.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, instrument};

use summarizer_shared::{Incident, Result};
use summarizer_tracker::TrackerClient;

/// Outcome of the staleness check for one incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Summary missing or older than the last change.
    Stale,
    /// Summary is at least as new as the last change.
    Current,
    /// Last change predates the selection window.
    OutsideWindow,
}

/// Classify an incident from its last change and summary timestamps.
///
/// A summary written at exactly `changed_at` counts as current.
pub fn evaluate(
    changed_at: DateTime<Utc>,
    summary_updated_at: Option<DateTime<Utc>>,
    since: DateTime<Utc>,
) -> Staleness {
    if changed_at < since {
        return Staleness::OutsideWindow;
    }
    match summary_updated_at {
        None => Staleness::Stale,
        Some(updated) if changed_at > updated => Staleness::Stale,
        Some(_) => Staleness::Current,
    }
}

/// Start of the selection window. `None` or `0` days means no window, and
/// so does a window reaching back past the earliest representable time.
pub fn window_start(max_days_since_update: Option<u32>, now: DateTime<Utc>) -> DateTime<Utc> {
    max_days_since_update
        .filter(|days| *days > 0)
        .and_then(|days| TimeDelta::try_days(i64::from(days)))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Latest of the incident's own change time, its newest event update, and
/// its newest follow-up update. Missing values count as the minimum time.
pub async fn last_change_time(
    client: &TrackerClient,
    incident: &Incident,
) -> Result<DateTime<Utc>> {
    let event = client.latest_event_change(&incident.id).await?;
    let follow_up = client.latest_follow_up_change(&incident.id).await?;

    let changed_at = [incident.last_changed_at, event, follow_up]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    debug!(
        incident = %incident.incident_id,
        %changed_at,
        "computed last change time"
    );
    Ok(changed_at)
}

/// Keep the incidents whose summary is stale, in input order.
///
/// Any lookup failure aborts the whole selection.
#[instrument(skip_all, fields(candidates = incidents.len()))]
pub async fn select_stale(
    client: &TrackerClient,
    incidents: Vec<Incident>,
    max_days_since_update: Option<u32>,
    now: DateTime<Utc>,
) -> Result<Vec<Incident>> {
    let since = window_start(max_days_since_update, now);
    let mut selected = Vec::new();

    for incident in incidents {
        let changed_at = last_change_time(client, &incident).await?;

        match evaluate(changed_at, incident.ai_summary_updated_at, since) {
            Staleness::Stale => {
                info!(
                    incident = %incident.incident_id,
                    %changed_at,
                    summary_updated_at = ?incident.ai_summary_updated_at,
                    "incident needs a new summary"
                );
                selected.push(incident);
            }
            Staleness::Current => {
                debug!(incident = %incident.incident_id, "summary is up to date");
            }
            Staleness::OutsideWindow => {
                debug!(
                    incident = %incident.incident_id,
                    %changed_at,
                    %since,
                    "last change is outside the selection window"
                );
            }
        }
    }

    info!(selected = selected.len(), "stale incident selection complete");
    Ok(selected)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
