//! Timeline rollup engine.
//!
//! Subjects accumulate activity entries (pinned, resolved, title edited, …).
//! To keep timelines free of rapid back-and-forth noise, a new candidate
//! entry within [`defaults::ROLLUP_THRESHOLD_SECONDS`] of the latest entry
//! by the *same actor* is compacted instead of appended:
//!
//! - a symmetric opposite (pin after unpin, resolve after unresolve)
//!   deletes the prior entry and inserts nothing — the pair cancels out;
//! - a repeat of a merging action (title edit after title edit) deletes the
//!   prior entry and inserts one merged entry whose `from_*` metadata is
//!   carried from the prior entry, so chains of edits collapse to a single
//!   first-value-to-current-value entry.
//!
//! A different actor, or elapsed time past the threshold, always appends.

use chrono::{DateTime, Duration, Utc};

use tandem_core::{
    defaults, Result, TimelineCandidate, TimelineEvent, TimelineMetadata, TimelineRepository,
};

/// What the rollup pass did with a candidate entry.
#[derive(Debug)]
pub enum RollupOutcome {
    /// Candidate canceled against a fresh opposite entry; nothing remains.
    Canceled,
    /// Prior entry replaced by a merged one.
    Replaced(TimelineEvent),
    /// Candidate appended as a new entry.
    Appended(TimelineEvent),
}

fn within_threshold(prior_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - prior_at <= Duration::seconds(defaults::ROLLUP_THRESHOLD_SECONDS)
}

/// Record a candidate entry, applying rollup compaction.
pub async fn record(
    timeline: &dyn TimelineRepository,
    candidate: TimelineCandidate,
    now: DateTime<Utc>,
) -> Result<RollupOutcome> {
    // Cancellation: a fresh opposite entry by the same actor nets to zero.
    if let Some(opposite) = candidate.action.cancels() {
        if let Some(prior) = timeline
            .latest_for_subject_action(candidate.subject, opposite)
            .await?
        {
            if prior.actor == candidate.actor && within_threshold(prior.created_at, now) {
                timeline.delete(prior.id).await?;
                return Ok(RollupOutcome::Canceled);
            }
        }
    }

    // Merging: chains of rapid edits collapse to one first-to-current entry.
    if candidate.action.merges() {
        if let Some(prior) = timeline
            .latest_for_subject_action(candidate.subject, candidate.action)
            .await?
        {
            if prior.actor == candidate.actor && within_threshold(prior.created_at, now) {
                timeline.delete(prior.id).await?;
                let merged = TimelineCandidate {
                    metadata: merge_metadata(prior.metadata, candidate.metadata.clone()),
                    ..candidate
                };
                let entry = timeline.insert(&merged, None).await?;
                return Ok(RollupOutcome::Replaced(entry));
            }
        }
    }

    let entry = timeline.insert(&candidate, None).await?;
    Ok(RollupOutcome::Appended(entry))
}

/// Merge prior and candidate metadata: the `from_*` side comes from the
/// prior (original) entry, the `to_*` side from the candidate. The prior
/// entry's `from_*` is itself the original value when chains collapse
/// repeatedly, so merging composes transitively.
fn merge_metadata(
    prior: Option<TimelineMetadata>,
    candidate: Option<TimelineMetadata>,
) -> Option<TimelineMetadata> {
    match (prior, candidate) {
        (
            Some(TimelineMetadata::Title { from_title, .. }),
            Some(TimelineMetadata::Title { to_title, .. }),
        ) => Some(TimelineMetadata::Title {
            from_title,
            to_title,
        }),
        (
            Some(TimelineMetadata::Project {
                from_project_id, ..
            }),
            Some(TimelineMetadata::Project { to_project_id, .. }),
        ) => Some(TimelineMetadata::Project {
            from_project_id,
            to_project_id,
        }),
        (_, candidate) => candidate,
    }
}
