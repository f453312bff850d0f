//! Activity analytics over the event log and the note corpus.
//!
//! # Responsibility
//! - Record activity events after validation.
//! - Derive read-only views: sessions, study time, daily counts, rankings,
//!   tag frequency and note creation buckets.
//!
//! # Invariants
//! - Queries never fail. Store failures are logged and the affected section
//!   comes back empty; malformed records are skipped and counted.
//! - Every roster identity appears in roster-scoped views.
//! - Open sessions are measured against the clock at query time.

pub mod aggregate;
pub mod model;
pub mod sessions;

use crate::model::activity::{ActivityEvent, EventKind, NewActivityEvent, TimeWindow};
use crate::repo::event_log::{EventLog, EventQuery};
use crate::repo::note_repo::NoteCorpus;
use crate::repo::RepoResult;
use crate::time::CivilClock;
use chrono::{DateTime, FixedOffset};
use log::{error, info, warn};
use std::collections::{BTreeMap, HashSet};

use self::aggregate::{
    activity_chart, daily_activity, is_study_record, normalize_roster, notes_per_day,
    session_activity, study_activity, tag_frequency, top_owners, window_start,
    NOTES_PER_DAY_SPAN, TOP_OWNERS_LIMIT, TOP_TAGS_LIMIT,
};
use self::model::{
    ActiveIdentity, AnalyticsReport, DailyActivity, DataQuality, DayCount, EventLogSummary,
    OwnerNoteCount, RecordOutcome, SessionActivity, StudyActivity, TagCount,
};
use self::sessions::reconstruct_sessions;

const RECENT_RECORDS_LIMIT: usize = 5;

/// Roster-scoped event snapshot for one query.
struct Snapshot {
    roster: Vec<String>,
    events: Vec<ActivityEvent>,
    quality: DataQuality,
}

pub struct ActivityAggregator<L: EventLog, N: NoteCorpus> {
    log: L,
    corpus: N,
    clock: CivilClock,
}

impl<L: EventLog, N: NoteCorpus> ActivityAggregator<L, N> {
    pub fn new(log: L, corpus: N, clock: CivilClock) -> Self {
        Self { log, corpus, clock }
    }

    /// Validates and appends one event. Never returns an error.
    pub fn record_event(&self, event: &NewActivityEvent) -> RecordOutcome {
        if let Some(reason) = event.rejection_reason() {
            warn!(
                "event=activity_record module=analytics status=skip kind={} reason={reason}",
                event.kind.as_str()
            );
            return RecordOutcome::Skipped {
                reason: reason.to_string(),
            };
        }

        match self.log.append(event) {
            Ok(seq) => {
                info!(
                    "event=activity_record module=analytics status=ok kind={} seq={seq}",
                    event.kind.as_str()
                );
                RecordOutcome::Accepted { seq }
            }
            Err(err) => {
                error!("event=activity_record module=analytics status=error error={err}");
                RecordOutcome::Skipped {
                    reason: "store_unavailable".to_string(),
                }
            }
        }
    }

    pub fn session_activity(
        &self,
        window: TimeWindow,
        roster: &[String],
    ) -> BTreeMap<String, SessionActivity> {
        let snapshot = self.snapshot(window, roster);
        sessions_of(&snapshot, self.clock.now())
    }

    pub fn study_activity(
        &self,
        window: TimeWindow,
        roster: &[String],
    ) -> BTreeMap<String, StudyActivity> {
        let snapshot = self.snapshot(window, roster);
        study_activity(&snapshot.events, &snapshot.roster)
    }

    pub fn daily_summary(
        &self,
        window: TimeWindow,
        roster: &[String],
    ) -> BTreeMap<String, DailyActivity> {
        let snapshot = self.snapshot(window, roster);
        daily_activity(&snapshot.events, self.clock.zone())
    }

    pub fn most_active(&self, window: TimeWindow, roster: &[String]) -> Vec<ActiveIdentity> {
        aggregate::most_active(&self.session_activity(window, roster))
    }

    /// Top tags across all notes; not windowed.
    pub fn tag_frequency(&self) -> Vec<TagCount> {
        let lists = degrade("tag_lists", self.corpus.tag_lists());
        tag_frequency(&lists, TOP_TAGS_LIMIT)
    }

    /// Note creations per civil day over the trailing week, zero-filled.
    pub fn notes_per_day(&self) -> Vec<DayCount> {
        self.notes_per_day_at(self.clock.now())
    }

    pub fn top_owners(&self) -> Vec<OwnerNoteCount> {
        let counts = degrade("note_counts_by_owner", self.corpus.note_counts_by_owner());
        top_owners(counts, TOP_OWNERS_LIMIT)
    }

    /// Assembles every view into one report; all sections share one "now".
    pub fn dashboard(&self, window: TimeWindow, roster: &[String]) -> AnalyticsReport {
        let now = self.clock.now();
        let snapshot = self.snapshot(window, roster);
        let login_logout_activity = sessions_of(&snapshot, now);
        let most_active = aggregate::most_active(&login_logout_activity);

        let report = AnalyticsReport {
            window,
            generated_at: now,
            study_activity: study_activity(&snapshot.events, &snapshot.roster),
            daily_activity: daily_activity(&snapshot.events, self.clock.zone()),
            most_active_chart: activity_chart(&most_active),
            most_active,
            login_logout_activity,
            top_tags: self.tag_frequency(),
            notes_per_day: self.notes_per_day_at(now),
            top_owners: self.top_owners(),
            data_quality: snapshot.quality,
            roster: snapshot.roster,
        };
        info!(
            "event=analytics_dashboard module=analytics status=ok roster={} skipped_out_of_roster={} skipped_malformed={}",
            report.roster.len(),
            report.data_quality.out_of_roster_events,
            report.data_quality.malformed_study_events
        );
        report
    }

    /// Raw log counts in the window, across all identities.
    pub fn event_log_summary(&self, window: TimeWindow, roster: &[String]) -> EventLogSummary {
        let events = degrade("events", self.log.query_window(&EventQuery::all_in(window)));
        let login_logout: Vec<&ActivityEvent> = events
            .iter()
            .filter(|event| matches!(event.kind, EventKind::Login | EventKind::Logout))
            .collect();

        EventLogSummary {
            window,
            total_records: events.len() as u64,
            login_logout_records: login_logout.len() as u64,
            study_records: events
                .iter()
                .filter(|event| event.kind == EventKind::PageView)
                .count() as u64,
            roster: normalize_roster(roster),
            recent_login_logout: login_logout
                .iter()
                .rev()
                .take(RECENT_RECORDS_LIMIT)
                .map(|event| (*event).clone())
                .collect(),
        }
    }

    fn notes_per_day_at(&self, now: DateTime<FixedOffset>) -> Vec<DayCount> {
        let zone = self.clock.zone();
        let today = zone.day_of(&now);
        let created = match zone.start_of_day(window_start(today, NOTES_PER_DAY_SPAN)) {
            Some(since) => degrade("created_since", self.corpus.created_since(since)),
            None => Vec::new(),
        };
        notes_per_day(&created, zone, today, NOTES_PER_DAY_SPAN)
    }

    fn snapshot(&self, window: TimeWindow, roster: &[String]) -> Snapshot {
        let roster = normalize_roster(roster);
        let raw = degrade("events", self.log.query_window(&EventQuery::all_in(window)));

        let members: HashSet<&str> = roster.iter().map(String::as_str).collect();
        let mut quality = DataQuality::default();
        let mut events = Vec::with_capacity(raw.len());
        for event in raw {
            if !members.contains(event.identity.as_str()) {
                quality.out_of_roster_events += 1;
                continue;
            }
            if event.kind == EventKind::PageView && !is_study_record(&event) {
                warn!(
                    "event=analytics_read module=analytics status=skip seq={} reason=malformed_study_event",
                    event.seq
                );
                quality.malformed_study_events += 1;
                continue;
            }
            events.push(event);
        }

        Snapshot {
            roster,
            events,
            quality,
        }
    }
}

fn sessions_of(
    snapshot: &Snapshot,
    now: DateTime<FixedOffset>,
) -> BTreeMap<String, SessionActivity> {
    let ledgers = reconstruct_sessions(&snapshot.events);
    session_activity(&ledgers, &snapshot.roster, now)
}

/// Logs a store failure and substitutes an empty section.
fn degrade<T: Default>(section: &str, result: RepoResult<T>) -> T {
    result.unwrap_or_else(|err| {
        error!("event=analytics_query module=analytics status=error section={section} error={err}");
        T::default()
    })
}
