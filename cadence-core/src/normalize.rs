//! Task normalizer: wire tasks -> typed tasks, failing fast on the first
//! semantically invalid one.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Weekday};

use crate::config::MAX_HORIZON_DAYS;
use crate::error::{EngineError, EngineResult};
use crate::task::{
    AnchorDay, ExactAnchor, HabitInput, HabitSpec, OnceInput, OnceSpec, Period, PeriodInput, Task,
    TaskInput, TaskKind,
};
use crate::time::{parse_date, parse_time, parse_weekday};

/// Upper bound on `times_per`; keeps a single period's expansion small.
pub const MAX_TIMES_PER: i64 = 1000;

/// Longest duration accepted, in minutes: the largest allowed horizon.
pub const MAX_DURATION_MINUTES: i64 = MAX_HORIZON_DAYS as i64 * 24 * 60;

/// Validate and type every task, keyed by name.
pub fn normalize(tasks: &[TaskInput]) -> EngineResult<BTreeMap<String, Task>> {
    let mut out = BTreeMap::new();
    for input in tasks {
        let task = normalize_task(input)?;
        if out.contains_key(&task.name) {
            return Err(EngineError::malformed(&task.name, "duplicate task name"));
        }
        out.insert(task.name.clone(), task);
    }
    Ok(out)
}

pub fn normalize_task(input: &TaskInput) -> EngineResult<Task> {
    let name = input.name().trim();
    if name.is_empty() {
        return Err(EngineError::malformed(input.name(), "name must be non-empty"));
    }
    match input {
        TaskInput::Once(t) => normalize_once(name, t),
        TaskInput::Habit(t) => normalize_habit(name, t),
    }
}

fn normalize_once(name: &str, t: &OnceInput) -> EngineResult<Task> {
    let duration = positive_duration(name, t.duration)?;
    let spec = OnceSpec {
        exact_time: opt_time(name, "exact_time", t.exact_time.as_deref())?,
        exact_date: opt_date(name, "exact_date", t.exact_date.as_deref())?,
        deadline: opt_date(name, "deadline", t.deadline.as_deref())?,
    };
    if let (Some(date), Some(deadline)) = (spec.exact_date, spec.deadline) {
        if date > deadline {
            return Err(EngineError::malformed(
                name,
                format!("exact_date {date} is after deadline {deadline}"),
            ));
        }
    }
    Ok(Task {
        name: name.to_string(),
        priority: t.priority,
        duration,
        kind: TaskKind::Once(spec),
    })
}

fn normalize_habit(name: &str, t: &HabitInput) -> EngineResult<Task> {
    let duration = positive_duration(name, t.duration)?;

    if t.times_per <= 0 {
        return Err(EngineError::malformed(
            name,
            format!("times_per must be positive, got {}", t.times_per),
        ));
    }
    if t.times_per > MAX_TIMES_PER {
        return Err(EngineError::malformed(
            name,
            format!("times_per must be at most {MAX_TIMES_PER}, got {}", t.times_per),
        ));
    }
    let times_per = t.times_per as u32;

    let period = match t.period {
        PeriodInput::Day => Period::Day,
        PeriodInput::Week => Period::Week,
        PeriodInput::Month => Period::Month,
        PeriodInput::Year => Period::Year,
        PeriodInput::CustomDays => match t.custom_days {
            Some(n) if n > i64::from(MAX_HORIZON_DAYS) => {
                return Err(EngineError::malformed(
                    name,
                    format!("custom_days must be at most {MAX_HORIZON_DAYS}, got {n}"),
                ));
            }
            Some(n) if n > 0 => Period::CustomDays(n as u32),
            Some(n) => {
                return Err(EngineError::malformed(
                    name,
                    format!("custom_days must be positive, got {n}"),
                ));
            }
            None => {
                return Err(EngineError::malformed(
                    name,
                    "custom_days is required when period is custom_days",
                ));
            }
        },
    };

    let mut exact_times = Vec::with_capacity(t.exact_times.len());
    for (i, et) in t.exact_times.iter().enumerate() {
        let time = parse_time(&et.time)
            .map_err(|e| EngineError::malformed(name, format!("exact_times[{i}]: {e}")))?;
        let day = if let Some(date) = opt_date(name, "exact_times.date", et.date.as_deref())? {
            AnchorDay::Date(date)
        } else if let Some(tag) = non_blank(et.weekday.as_deref()) {
            AnchorDay::Weekday(
                parse_weekday(tag)
                    .map_err(|e| EngineError::malformed(name, format!("exact_times[{i}]: {e}")))?,
            )
        } else {
            AnchorDay::Any
        };
        exact_times.push(ExactAnchor { time, day });
    }

    let mut selected_days: Vec<Weekday> = Vec::with_capacity(t.selected_days.len());
    for tag in &t.selected_days {
        let day = parse_weekday(tag).map_err(|e| EngineError::malformed(name, e))?;
        if !selected_days.contains(&day) {
            selected_days.push(day);
        }
    }
    selected_days.sort_by_key(|d| d.num_days_from_monday());

    Ok(Task {
        name: name.to_string(),
        priority: t.priority,
        duration,
        kind: TaskKind::Habit(HabitSpec {
            times_per,
            period,
            end_date: opt_date(name, "end_date", t.end_date.as_deref())?,
            exact_times,
            selected_days,
        }),
    })
}

fn positive_duration(name: &str, duration: i64) -> EngineResult<i64> {
    if duration <= 0 {
        return Err(EngineError::malformed(
            name,
            format!("duration must be positive, got {duration}"),
        ));
    }
    if duration > MAX_DURATION_MINUTES {
        return Err(EngineError::malformed(
            name,
            format!("duration must be at most {MAX_DURATION_MINUTES} minutes, got {duration}"),
        ));
    }
    Ok(duration)
}

// Blank strings count as absent; form-driven clients send "" for unset fields.
fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn opt_date(name: &str, field: &str, raw: Option<&str>) -> EngineResult<Option<NaiveDate>> {
    non_blank(raw)
        .map(|s| parse_date(s).map_err(|e| EngineError::malformed(name, format!("{field}: {e}"))))
        .transpose()
}

fn opt_time(name: &str, field: &str, raw: Option<&str>) -> EngineResult<Option<NaiveTime>> {
    non_blank(raw)
        .map(|s| parse_time(s).map_err(|e| EngineError::malformed(name, format!("{field}: {e}"))))
        .transpose()
}
