//! Day-level statistics over recorded sessions.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::models::Session;
use crate::tags::has_all_tags;
use crate::utils::ceil_div;

/// Usage above this share of an hour is clipped (overlapping sessions)
const MAX_HOUR_PERCENT: i64 = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub total_minutes: i64,
    pub total_hours: f64,
    pub session_count: usize,
    pub completed_count: usize,
    pub in_progress_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourUsage {
    pub hour: u32,
    pub used_minutes: i64,
    pub percentage: i64,
    pub session_ids: Vec<i64>,
}

impl HourUsage {
    pub fn is_empty(&self) -> bool {
        self.session_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionGroup<'a> {
    Single(&'a Session),
    Overlapping {
        sessions: Vec<&'a Session>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        duration_minutes: i64,
    },
}

/// Sessions that started on `day` in `tz` and carry every selected title tag
pub fn sessions_on<'a, Tz: TimeZone>(
    sessions: &'a [Session],
    day: NaiveDate,
    tz: &Tz,
    selected_tags: &[String],
) -> Vec<&'a Session> {
    sessions
        .iter()
        .filter(|s| s.timestamp.with_timezone(tz).date_naive() == day)
        .filter(|s| has_all_tags(&s.title, selected_tags))
        .collect()
}

pub fn day_summary(sessions: &[&Session]) -> DaySummary {
    let total_minutes = sessions
        .iter()
        .fold(0_i64, |total, s| total.saturating_add(s.duration));
    DaySummary {
        total_minutes,
        total_hours: (total_minutes as f64 / 60.0 * 10.0).round() / 10.0,
        session_count: sessions.len(),
        completed_count: sessions.iter().filter(|s| s.completed).count(),
        in_progress_count: sessions
            .iter()
            .filter(|s| s.in_progress && !s.completed)
            .count(),
    }
}

/// Minutes of each hour on `day` covered by sessions
pub fn hourly_usage<Tz: TimeZone>(
    sessions: &[&Session],
    day: NaiveDate,
    tz: &Tz,
    start_hour: u32,
    end_hour: u32,
) -> Vec<HourUsage> {
    let mut usage = Vec::new();
    for hour in start_hour..=end_hour.min(23) {
        let Some(hour_start) = day
            .and_hms_opt(hour, 0, 0)
            .and_then(|naive| tz.from_local_datetime(&naive).earliest())
            .map(|dt| dt.with_timezone(&Utc))
        else {
            continue;
        };
        let hour_end = hour_start + Duration::hours(1);

        let mut used_millis = 0;
        let mut session_ids = Vec::new();
        for session in sessions {
            let start = session.timestamp.max(hour_start);
            let end = session.effective_end().min(hour_end);
            if start < end {
                used_millis += (end - start).num_milliseconds();
                session_ids.push(session.id);
            }
        }

        let used_minutes = (used_millis as f64 / 60_000.0).round() as i64;
        let percentage = ((used_millis as f64 / 3_600_000.0 * 100.0).round() as i64).min(MAX_HOUR_PERCENT);
        usage.push(HourUsage {
            hour,
            used_minutes,
            percentage,
            session_ids,
        });
    }
    usage
}

/// Cluster sessions that overlap the earliest unvisited session
pub fn group_overlapping<'a>(sessions: &[&'a Session]) -> Vec<SessionGroup<'a>> {
    let mut sorted: Vec<&Session> = sessions.to_vec();
    sorted.sort_by_key(|s| s.timestamp);

    let mut visited = HashSet::new();
    let mut groups = Vec::new();

    for session in &sorted {
        if visited.contains(&session.id) {
            continue;
        }
        let start = session.timestamp;
        let end = session.effective_end();
        let overlapping: Vec<&Session> = sorted
            .iter()
            .copied()
            .filter(|other| other.id != session.id && !visited.contains(&other.id))
            .filter(|other| start < other.effective_end() && end > other.timestamp)
            .collect();

        if overlapping.is_empty() {
            visited.insert(session.id);
            groups.push(SessionGroup::Single(*session));
            continue;
        }

        let mut members = vec![*session];
        members.extend(overlapping);
        let group_start = members.iter().map(|s| s.timestamp).min().unwrap_or(start);
        let group_end = members.iter().map(|s| s.effective_end()).max().unwrap_or(end);
        for member in &members {
            visited.insert(member.id);
        }
        groups.push(SessionGroup::Overlapping {
            sessions: members,
            start: group_start,
            end: group_end,
            duration_minutes: ceil_div((group_end - group_start).num_milliseconds(), 60_000),
        });
    }
    groups
}
