//! Pure aggregation over event and note snapshots.
//!
//! # Invariants
//! - Roster-scoped maps hold one record per roster identity, zero-filled
//!   when the identity has no events.
//! - Rankings are deterministic: ties resolve by identity ascending, or by
//!   first-seen order for tags.
//! - Day buckets are civil days in the configured zone.

use super::model::{
    ActiveIdentity, ActivityChart, DailyActivity, DayCount, OwnerNoteCount, SessionActivity,
    StudyActivity, TagCount,
};
use super::sessions::SessionLedger;
use crate::model::activity::{ActivityEvent, EventKind};
use crate::time::{format_duration, CivilZone};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const TOP_TAGS_LIMIT: usize = 5;
pub const TOP_OWNERS_LIMIT: usize = 5;
pub const NOTES_PER_DAY_SPAN: u32 = 7;

/// Trims, drops blanks and dedupes; output is sorted.
pub fn normalize_roster(roster: &[String]) -> Vec<String> {
    roster
        .iter()
        .map(|identity| identity.trim())
        .filter(|identity| !identity.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A page view that carries a usable, non-negative time spent.
pub fn is_study_record(event: &ActivityEvent) -> bool {
    event.kind == EventKind::PageView
        && matches!(event.time_spent_seconds, Some(spent) if spent >= 0)
}

pub fn session_activity(
    ledgers: &BTreeMap<String, SessionLedger>,
    roster: &[String],
    now: DateTime<FixedOffset>,
) -> BTreeMap<String, SessionActivity> {
    roster
        .iter()
        .map(|identity| {
            let activity = ledgers
                .get(identity)
                .map(|ledger| summarize_ledger(ledger, now))
                .unwrap_or_default();
            (identity.clone(), activity)
        })
        .collect()
}

fn summarize_ledger(ledger: &SessionLedger, now: DateTime<FixedOffset>) -> SessionActivity {
    let total_sessions = ledger.session_count();
    let total_time_seconds = ledger.total_seconds(now);
    SessionActivity {
        total_sessions,
        total_time_seconds,
        total_time_formatted: format_duration(total_time_seconds),
        login_count: ledger.login_count,
        logout_count: ledger.logout_count,
        avg_session_seconds: average(total_time_seconds, total_sessions),
        last_activity: ledger.last_activity,
    }
}

/// Study totals per roster identity. Events that fail `is_study_record` are
/// ignored; the caller accounts for them. Totals saturate at `i64::MAX`.
pub fn study_activity(
    events: &[ActivityEvent],
    roster: &[String],
) -> BTreeMap<String, StudyActivity> {
    let mut totals: HashMap<&str, (i64, u64, HashSet<&str>)> = HashMap::new();
    for event in events.iter().filter(|event| is_study_record(event)) {
        let entry = totals.entry(event.identity.as_str()).or_default();
        entry.0 = entry.0.saturating_add(event.time_spent_seconds.unwrap_or(0));
        entry.1 += 1;
        if let Some(page) = event.page.as_deref() {
            entry.2.insert(page);
        }
    }

    roster
        .iter()
        .map(|identity| {
            let activity = totals
                .get(identity.as_str())
                .map(|(seconds, sessions, pages)| StudyActivity {
                    total_study_seconds: *seconds,
                    total_study_formatted: format_duration(*seconds),
                    study_sessions: *sessions,
                    pages_visited: pages.len() as u64,
                    avg_study_seconds: average(*seconds, *sessions),
                })
                .unwrap_or_default();
            (identity.clone(), activity)
        })
        .collect()
}

/// Per-day kind counts, keyed `YYYY-MM-DD`. Independent of session pairing.
pub fn daily_activity(
    events: &[ActivityEvent],
    zone: CivilZone,
) -> BTreeMap<String, DailyActivity> {
    let mut days: BTreeMap<NaiveDate, DailyActivity> = BTreeMap::new();
    for event in events {
        if event.kind == EventKind::PageView && !is_study_record(event) {
            continue;
        }
        let counts = days.entry(zone.day_of(&event.timestamp)).or_default();
        match event.kind {
            EventKind::Login => counts.logins += 1,
            EventKind::Logout => counts.logouts += 1,
            EventKind::PageView => counts.study_sessions += 1,
        }
    }
    days.into_iter()
        .map(|(day, counts)| (day_label(day), counts))
        .collect()
}

/// Orders identities by total session time, descending; ties by identity.
pub fn most_active(activity: &BTreeMap<String, SessionActivity>) -> Vec<ActiveIdentity> {
    let mut ranking: Vec<ActiveIdentity> = activity
        .iter()
        .map(|(identity, record)| ActiveIdentity {
            identity: identity.clone(),
            total_time_seconds: record.total_time_seconds,
            total_time_formatted: record.total_time_formatted.clone(),
        })
        .collect();
    ranking.sort_by(|a, b| {
        b.total_time_seconds
            .cmp(&a.total_time_seconds)
            .then_with(|| a.identity.cmp(&b.identity))
    });
    ranking
}

pub fn activity_chart(ranking: &[ActiveIdentity]) -> ActivityChart {
    ActivityChart {
        labels: ranking.iter().map(|entry| entry.identity.clone()).collect(),
        data: ranking.iter().map(|entry| entry.total_time_seconds).collect(),
        formatted_data: ranking
            .iter()
            .map(|entry| entry.total_time_formatted.clone())
            .collect(),
    }
}

/// Counts tag occurrences across every list and keeps the top `limit`.
///
/// Ties keep the order in which tags were first seen.
pub fn tag_frequency(tag_lists: &[Vec<String>], limit: usize) -> Vec<TagCount> {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<TagCount> = Vec::new();
    for tag in tag_lists.iter().flatten() {
        match first_seen.get(tag.as_str()) {
            Some(&index) => counts[index].count += 1,
            None => {
                first_seen.insert(tag.as_str(), counts.len());
                counts.push(TagCount {
                    tag: tag.clone(),
                    count: 1,
                });
            }
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

/// First civil day of the trailing `span`-day window ending on `today`.
pub fn window_start(today: NaiveDate, span: u32) -> NaiveDate {
    today - Duration::days(i64::from(span.max(1)) - 1)
}

/// One bucket per civil day in the trailing window, oldest first, zeros
/// included. Instants outside the window are ignored.
pub fn notes_per_day(
    created: &[DateTime<FixedOffset>],
    zone: CivilZone,
    today: NaiveDate,
    span: u32,
) -> Vec<DayCount> {
    let start = window_start(today, span);
    let mut buckets: BTreeMap<NaiveDate, u64> = start
        .iter_days()
        .take_while(|day| *day <= today)
        .map(|day| (day, 0))
        .collect();
    for instant in created {
        if let Some(count) = buckets.get_mut(&zone.day_of(instant)) {
            *count += 1;
        }
    }
    buckets
        .into_iter()
        .map(|(day, count)| DayCount {
            date: day_label(day),
            count,
        })
        .collect()
}

/// Expects counts ordered by count descending then owner ascending.
pub fn top_owners(counts: Vec<(String, u64)>, limit: usize) -> Vec<OwnerNoteCount> {
    let mut owners: Vec<OwnerNoteCount> = counts
        .into_iter()
        .map(|(identity, note_count)| OwnerNoteCount {
            identity,
            note_count,
        })
        .collect();
    owners.sort_by(|a, b| {
        b.note_count
            .cmp(&a.note_count)
            .then_with(|| a.identity.cmp(&b.identity))
    });
    owners.truncate(limit);
    owners
}

fn day_label(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn average(total: i64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::sessions::reconstruct_sessions;
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        ist().with_ymd_and_hms(2024, 6, day, hour, minute, 0).unwrap()
    }

    fn event(
        seq: i64,
        identity: &str,
        kind: EventKind,
        timestamp: DateTime<FixedOffset>,
    ) -> ActivityEvent {
        ActivityEvent {
            seq,
            identity: identity.to_string(),
            kind,
            timestamp,
            page: None,
            time_spent_seconds: None,
        }
    }

    fn study(
        seq: i64,
        identity: &str,
        page: &str,
        spent: Option<i64>,
        timestamp: DateTime<FixedOffset>,
    ) -> ActivityEvent {
        ActivityEvent {
            page: Some(page.to_string()),
            time_spent_seconds: spent,
            ..event(seq, identity, EventKind::PageView, timestamp)
        }
    }

    fn tag_count(tag: &str, count: u64) -> TagCount {
        TagCount {
            tag: tag.to_string(),
            count,
        }
    }

    fn roster(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn roster_is_trimmed_deduped_and_sorted() {
        let normalized = normalize_roster(&roster(&[" b ", "a", "", "b"]));
        assert_eq!(normalized, roster(&["a", "b"]));
    }

    #[test]
    fn closed_session_reports_formatted_total() {
        let events = vec![
            event(1, "x", EventKind::Login, at(1, 9, 0)),
            event(2, "x", EventKind::Logout, at(1, 9, 5)),
        ];
        let ledgers = reconstruct_sessions(&events);
        let activity = session_activity(&ledgers, &roster(&["x"]), at(1, 12, 0));
        let record = &activity["x"];
        assert_eq!(record.total_sessions, 1);
        assert_eq!(record.total_time_seconds, 300);
        assert_eq!(record.total_time_formatted, "5m 0s");
        assert_eq!(record.avg_session_seconds, 300.0);
        assert_eq!(record.last_activity, Some(at(1, 9, 5)));
    }

    #[test]
    fn study_totals_saturate_instead_of_overflowing() {
        let events = vec![
            study(1, "x", "/notes", Some(i64::MAX), at(1, 9, 0)),
            study(2, "x", "/notes", Some(i64::MAX), at(1, 9, 5)),
        ];
        let activity = study_activity(&events, &roster(&["x"]));
        let record = &activity["x"];
        assert_eq!(record.total_study_seconds, i64::MAX);
        assert_eq!(record.study_sessions, 2);
        assert!(record.avg_study_seconds > 0.0);
    }

    #[test]
    fn roster_member_without_events_gets_zero_record() {
        let activity = session_activity(&BTreeMap::new(), &roster(&["idle"]), at(1, 9, 0));
        assert_eq!(activity["idle"], SessionActivity::default());
        assert_eq!(activity["idle"].total_time_formatted, "0s");

        let studies = study_activity(&[], &roster(&["idle"]));
        assert_eq!(studies["idle"], StudyActivity::default());
    }

    #[test]
    fn study_activity_sums_time_and_counts_distinct_pages() {
        let events = vec![
            study(1, "x", "/notes", Some(120), at(1, 9, 0)),
            study(2, "x", "/notes", Some(60), at(1, 9, 5)),
            study(3, "x", "/tags", Some(30), at(1, 9, 10)),
            study(4, "x", "/tags", None, at(1, 9, 11)),
            study(5, "x", "/tags", Some(-4), at(1, 9, 12)),
        ];
        let activity = study_activity(&events, &roster(&["x"]));
        let record = &activity["x"];
        assert_eq!(record.total_study_seconds, 210);
        assert_eq!(record.total_study_formatted, "3m 30s");
        assert_eq!(record.study_sessions, 3);
        assert_eq!(record.pages_visited, 2);
        assert_eq!(record.avg_study_seconds, 70.0);
    }

    #[test]
    fn daily_activity_buckets_by_civil_day() {
        let utc = FixedOffset::east_opt(0).unwrap();
        // 20:00 UTC on June 1st is already June 2nd at +05:30.
        let late_utc = utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        let events = vec![
            event(1, "x", EventKind::Login, at(1, 9, 0)),
            event(2, "x", EventKind::Logout, at(1, 10, 0)),
            event(3, "x", EventKind::Login, late_utc),
            study(4, "x", "/notes", Some(5), late_utc),
            study(5, "x", "/notes", None, late_utc),
        ];
        let days = daily_activity(&events, CivilZone::new(ist()));
        assert_eq!(days.len(), 2);
        assert_eq!(
            days["2024-06-01"],
            DailyActivity {
                logins: 1,
                logouts: 1,
                study_sessions: 0
            }
        );
        assert_eq!(
            days["2024-06-02"],
            DailyActivity {
                logins: 1,
                logouts: 0,
                study_sessions: 1
            }
        );
    }

    #[test]
    fn most_active_orders_by_time_then_identity() {
        let mut activity = BTreeMap::new();
        for (identity, seconds) in [("carol", 30), ("bob", 90), ("alice", 90)] {
            activity.insert(
                identity.to_string(),
                SessionActivity {
                    total_time_seconds: seconds,
                    total_time_formatted: format_duration(seconds),
                    ..SessionActivity::default()
                },
            );
        }
        let ranking = most_active(&activity);
        let order: Vec<&str> = ranking.iter().map(|entry| entry.identity.as_str()).collect();
        assert_eq!(order, vec!["alice", "bob", "carol"]);

        let chart = activity_chart(&ranking);
        assert_eq!(chart.labels, roster(&["alice", "bob", "carol"]));
        assert_eq!(chart.data, vec![90, 90, 30]);
        assert_eq!(chart.formatted_data, roster(&["1m 30s", "1m 30s", "30s"]));
    }

    #[test]
    fn tag_frequency_breaks_ties_by_first_seen() {
        let lists = vec![roster(&["a", "a", "b"]), roster(&["b", "c"])];
        let top = tag_frequency(&lists, TOP_TAGS_LIMIT);
        assert_eq!(
            top,
            vec![
                tag_count("a", 2),
                tag_count("b", 2),
                tag_count("c", 1),
            ]
        );
    }

    #[test]
    fn tag_frequency_keeps_top_five() {
        let lists = vec![roster(&["t1", "t2", "t3", "t4", "t5", "t6", "t6"])];
        let top = tag_frequency(&lists, TOP_TAGS_LIMIT);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].tag, "t6");
        assert_eq!(top[4].tag, "t4");
    }

    #[test]
    fn notes_per_day_zero_fills_seven_buckets() {
        let zone = CivilZone::new(ist());
        let today = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        let created = vec![
            at(2, 10, 0),
            at(2, 11, 0),
            at(7, 8, 0),
            at(5, 12, 0) - Duration::days(30),
        ];
        let buckets = notes_per_day(&created, zone, today, NOTES_PER_DAY_SPAN);

        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].date, "2024-06-01");
        assert_eq!(buckets[6].date, "2024-06-07");
        assert_eq!(buckets[1].count, 2);
        assert_eq!(buckets[6].count, 1);
        assert_eq!(buckets.iter().filter(|bucket| bucket.count == 0).count(), 5);
    }

    #[test]
    fn top_owners_orders_by_count_then_identity() {
        let owners = top_owners(
            vec![
                ("zed".to_string(), 3),
                ("amy".to_string(), 3),
                ("bo".to_string(), 7),
            ],
            2,
        );
        assert_eq!(owners[0].identity, "bo");
        assert_eq!(owners[1].identity, "amy");
        assert_eq!(owners.len(), 2);
    }
}
