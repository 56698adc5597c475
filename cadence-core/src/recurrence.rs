//! Recurrence expander: habit -> one placement request per occurrence.
//!
//! Periods are calendar aligned (ISO weeks start Monday). Custom N-day periods
//! are counted from the planning start date. The period containing "now" is the
//! first one; anchors that already elapsed are dropped without being reported.
//!
//! Anchor preference inside a period:
//! 1. `exact_times` in given order (a date pins that date, a weekday pins every
//!    matching day, a bare time pins the day itself for daily habits and floats
//!    otherwise)
//! 2. `selected_days` in date order, skipping days already pinned
//! 3. evenly spaced days (or time segments for short periods), only when the
//!    habit names no days at all
//!
//! Day candidates pick up floating times in order; without one they become
//! whole-day windows.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};

use crate::request::{Constraint, PlacementRequest};
use crate::task::{AnchorDay, HabitSpec, Period, Task};
use crate::time::{end_of_day, start_of_day};

/// A period that could not supply `times_per` anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    pub occurrence: u32,
    pub period_start: NaiveDate,
    pub requested: u32,
    pub available: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Request ids are left at 0; the engine numbers them.
    pub requests: Vec<PlacementRequest>,
    pub shortfalls: Vec<Shortfall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    At(NaiveDateTime),
    Day(NaiveDate),
    Span(NaiveDateTime, NaiveDateTime),
}

impl Slot {
    fn start(&self) -> NaiveDateTime {
        match *self {
            Slot::At(t) => t,
            Slot::Day(d) => start_of_day(d),
            Slot::Span(a, _) => a,
        }
    }

    fn date(&self) -> NaiveDate {
        self.start().date()
    }
}

pub fn expand(
    task: &Task,
    spec: &HabitSpec,
    now: NaiveDateTime,
    horizon_end: NaiveDateTime,
    slack_minutes: u32,
) -> Expansion {
    let window_end = spec
        .end_date
        .map_or(horizon_end, |d| end_of_day(d).min(horizon_end));
    let mut out = Expansion::default();
    let mut next_index: u32 = 0;

    let mut p_start = period_start(spec.period, now.date());
    while start_of_day(p_start) < window_end {
        let Some(p_end) = period_end(spec.period, p_start) else {
            break;
        };
        // nothing of this period lies inside [now, window_end)
        if start_of_day(p_start).max(now) >= start_of_day(p_end).min(window_end) {
            p_start = p_end;
            continue;
        }

        if let Some(mut slots) = select_anchors(spec, p_start, p_end) {
            let available = slots.len() as u32;
            slots.sort_by_key(Slot::start);
            for slot in slots {
                let constraint =
                    slot_constraint(slot, task.duration, now, window_end, slack_minutes);
                let Some(constraint) = constraint else {
                    continue;
                };
                out.requests.push(PlacementRequest {
                    id: 0,
                    task: task.name.clone(),
                    occurrence: Some(next_index),
                    duration: task.duration,
                    priority: task.priority,
                    constraint,
                    excluded: Vec::new(),
                });
                next_index += 1;
            }
            for _ in available..spec.times_per {
                out.shortfalls.push(Shortfall {
                    occurrence: next_index,
                    period_start: p_start,
                    requested: spec.times_per,
                    available,
                });
                next_index += 1;
            }
        }

        p_start = p_end;
    }
    out
}

fn period_start(period: Period, date: NaiveDate) -> NaiveDate {
    match period {
        Period::Day | Period::CustomDays(_) => date,
        Period::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
        Period::Month => date.with_day(1).unwrap_or(date),
        Period::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

fn period_end(period: Period, start: NaiveDate) -> Option<NaiveDate> {
    match period {
        Period::Day => start.succ_opt(),
        Period::Week => start.checked_add_signed(Duration::days(7)),
        Period::Month => start.checked_add_months(Months::new(1)),
        Period::Year => start.checked_add_months(Months::new(12)),
        Period::CustomDays(n) => start.checked_add_signed(Duration::days(i64::from(n))),
    }
}

/// Pick up to `times_per` anchors for `[p_start, p_end)`.
///
/// `None` means the period is inactive (a daily habit on a day outside `selected_days`).
fn select_anchors(spec: &HabitSpec, p_start: NaiveDate, p_end: NaiveDate) -> Option<Vec<Slot>> {
    let daily = spec.period == Period::Day;
    if daily && !spec.selected_days.is_empty() && !spec.selected_days.contains(&p_start.weekday()) {
        return None;
    }

    let need = spec.times_per as usize;
    let days: Vec<NaiveDate> = p_start.iter_days().take_while(|d| *d < p_end).collect();
    let mut chosen: Vec<Slot> = Vec::new();
    let mut floating: Vec<NaiveTime> = Vec::new();

    let push = |chosen: &mut Vec<Slot>, slot: Slot| {
        if chosen.len() < need && !chosen.contains(&slot) {
            chosen.push(slot);
        }
    };

    for anchor in &spec.exact_times {
        match anchor.day {
            AnchorDay::Date(d) => {
                if days.contains(&d) {
                    push(&mut chosen, Slot::At(d.and_time(anchor.time)));
                }
            }
            AnchorDay::Weekday(w) => {
                for d in days.iter().filter(|d| d.weekday() == w) {
                    push(&mut chosen, Slot::At(d.and_time(anchor.time)));
                }
            }
            AnchorDay::Any if daily => push(&mut chosen, Slot::At(p_start.and_time(anchor.time))),
            AnchorDay::Any => floating.push(anchor.time),
        }
    }

    let pins_day = spec
        .exact_times
        .iter()
        .any(|a| daily || a.day != AnchorDay::Any);
    let day_slot = |k: usize, d: NaiveDate| match floating.get(k % floating.len().max(1)) {
        Some(t) => Slot::At(d.and_time(*t)),
        None => Slot::Day(d),
    };

    if !daily && !spec.selected_days.is_empty() {
        let used: Vec<NaiveDate> = chosen.iter().map(Slot::date).collect();
        let candidates = days
            .iter()
            .filter(|d| spec.selected_days.contains(&d.weekday()) && !used.contains(d));
        for (k, d) in candidates.enumerate() {
            push(&mut chosen, day_slot(k, *d));
        }
    } else if !pins_day {
        let remaining = need - chosen.len();
        if remaining > 0 && days.len() >= remaining {
            for i in 0..remaining {
                push(&mut chosen, day_slot(i, days[i * days.len() / remaining]));
            }
        } else if remaining > 0 {
            let from = start_of_day(p_start);
            let span = (start_of_day(p_end) - from).num_minutes();
            let remaining_i = remaining as i64;
            for i in 0..remaining_i {
                let a = from + Duration::minutes(i * span / remaining_i);
                let b = from + Duration::minutes((i + 1) * span / remaining_i);
                push(&mut chosen, Slot::Span(a, b));
            }
        }
    }

    Some(chosen)
}

/// Turn a slot into a constraint, or `None` if it falls outside `[now, window_end)`.
fn slot_constraint(
    slot: Slot,
    duration: i64,
    now: NaiveDateTime,
    window_end: NaiveDateTime,
    slack_minutes: u32,
) -> Option<Constraint> {
    let duration = Duration::minutes(duration);
    match slot {
        Slot::At(start) => (start >= now && start < window_end).then_some(Constraint::Fixed {
            start,
            slack_minutes,
        }),
        Slot::Day(d) => {
            let (from, to) = (start_of_day(d), end_of_day(d));
            (to > now && from < window_end).then(|| Constraint::Window {
                earliest: from.max(now),
                latest_start: to - duration,
                pinned_day: true,
            })
        }
        Slot::Span(from, to) => (to > now && from < window_end).then(|| Constraint::Window {
            earliest: from.max(now),
            latest_start: (to - duration).max(from),
            pinned_day: true,
        }),
    }
}
