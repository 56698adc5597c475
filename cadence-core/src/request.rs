//! Placement requests: the uniform unit the solver consumes.

use std::cmp::Reverse;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::task::{OnceSpec, Task};
use crate::time::{end_of_day, start_of_day, Interval};

pub type RequestId = usize;

/// Solver processing key, see [`PlacementRequest::sort_key`].
pub type SortKey<'a> = (
    Tightness,
    Option<NaiveDateTime>,
    Reverse<i64>,
    &'a str,
    Option<u32>,
    RequestId,
);

/// Where a request is allowed to land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Exact start. With `slack_minutes > 0` the start may drift up to that much later.
    Fixed {
        start: NaiveDateTime,
        slack_minutes: u32,
    },
    /// Exact time of day on the first day (from `first_day`) where it fits.
    DayAt {
        time: NaiveTime,
        first_day: NaiveDate,
        last_day: Option<NaiveDate>,
    },
    /// Any start in `[earliest, latest_start]`.
    Window {
        earliest: NaiveDateTime,
        latest_start: NaiveDateTime,
        /// Bounded to a single day by an explicit date or weekday.
        pinned_day: bool,
    },
    /// Anywhere from now until the horizon.
    Open,
}

/// Solver ordering class; tighter classes are placed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tightness {
    Fixed,
    DayPinned,
    Deadline,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementRequest {
    pub id: RequestId,
    pub task: String,
    /// Set for habit occurrences.
    pub occurrence: Option<u32>,
    /// Minutes.
    pub duration: i64,
    pub priority: i64,
    pub constraint: Constraint,
    /// Intervals this request must not be placed into (slots it was evicted from).
    pub excluded: Vec<Interval>,
}

impl PlacementRequest {
    /// The single request a one-off task produces.
    pub fn for_once(id: RequestId, task: &Task, spec: &OnceSpec, now: NaiveDateTime) -> Self {
        let duration = Duration::minutes(task.duration);
        let constraint = match (spec.exact_date, spec.exact_time) {
            (Some(date), Some(time)) => Constraint::Fixed {
                start: date.and_time(time),
                slack_minutes: 0,
            },
            (Some(date), None) => Constraint::Window {
                earliest: start_of_day(date).max(now),
                latest_start: end_of_day(date) - duration,
                pinned_day: true,
            },
            (None, Some(time)) => Constraint::DayAt {
                time,
                first_day: now.date(),
                last_day: spec.deadline,
            },
            (None, None) => match spec.deadline {
                Some(deadline) => Constraint::Window {
                    earliest: now,
                    latest_start: end_of_day(deadline) - duration,
                    pinned_day: false,
                },
                None => Constraint::Open,
            },
        };
        Self {
            id,
            task: task.name.clone(),
            occurrence: None,
            duration: task.duration,
            priority: task.priority,
            constraint,
            excluded: Vec::new(),
        }
    }

    pub fn tightness(&self) -> Tightness {
        match &self.constraint {
            Constraint::Fixed { .. } => Tightness::Fixed,
            Constraint::DayAt { .. } => Tightness::DayPinned,
            Constraint::Window { pinned_day: true, .. } => Tightness::DayPinned,
            Constraint::Window { .. } => Tightness::Deadline,
            Constraint::Open => Tightness::Open,
        }
    }

    /// Earliest allowed start and, when bounded, the latest allowed start.
    pub fn bounds(&self, now: NaiveDateTime) -> (NaiveDateTime, Option<NaiveDateTime>) {
        match &self.constraint {
            Constraint::Fixed {
                start,
                slack_minutes,
            } => (
                *start,
                Some(*start + Duration::minutes(i64::from(*slack_minutes))),
            ),
            Constraint::DayAt {
                time,
                first_day,
                last_day,
            } => (
                first_day.and_time(*time).max(now),
                last_day.map(|d| d.and_time(*time)),
            ),
            Constraint::Window {
                earliest,
                latest_start,
                ..
            } => (*earliest, Some(*latest_start)),
            Constraint::Open => (now, None),
        }
    }

    /// Total processing order: tightness, nearest deadline, priority desc, name, occurrence.
    pub fn sort_key(&self) -> SortKey<'_> {
        let deadline = match (&self.constraint, self.tightness()) {
            (Constraint::Window { latest_start, .. }, Tightness::Deadline) => Some(*latest_start),
            _ => None,
        };
        (
            self.tightness(),
            deadline,
            Reverse(self.priority),
            self.task.as_str(),
            self.occurrence,
            self.id,
        )
    }

    pub fn is_excluded(&self, interval: &Interval) -> bool {
        self.excluded.iter().any(|x| x.overlaps(interval))
    }

    pub fn label(&self) -> String {
        match self.occurrence {
            Some(i) => format!("{}#{}", self.task, i),
            None => self.task.clone(),
        }
    }
}
