//! Task model for the planning engine.
//!
//! Two layers live here:
//! - `*Input` types are the wire shape of a task list. They are structurally
//!   checked by serde but carry raw strings for dates, times and weekdays.
//! - [`Task`] is the typed form produced by [`crate::normalize`]. Everything
//!   downstream of the normalizer only sees typed tasks.

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// A task list as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<TaskInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskInput {
    Once(OnceInput),
    Habit(HabitInput),
}

impl TaskInput {
    pub fn name(&self) -> &str {
        match self {
            TaskInput::Once(t) => &t.name,
            TaskInput::Habit(t) => &t.name,
        }
    }
}

impl From<OnceInput> for TaskInput {
    fn from(t: OnceInput) -> Self {
        TaskInput::Once(t)
    }
}

impl From<HabitInput> for TaskInput {
    fn from(t: HabitInput) -> Self {
        TaskInput::Habit(t)
    }
}

/// One-off task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnceInput {
    pub name: String,
    pub priority: i64,
    /// Minutes.
    pub duration: i64,
    /// "HH:MM"
    #[serde(default)]
    pub exact_time: Option<String>,
    /// "YYYY-MM-DD"
    #[serde(default)]
    pub exact_date: Option<String>,
    /// "YYYY-MM-DD"
    #[serde(default)]
    pub deadline: Option<String>,
}

impl OnceInput {
    pub fn new(name: impl Into<String>, priority: i64, duration: i64) -> Self {
        Self {
            name: name.into(),
            priority,
            duration,
            exact_time: None,
            exact_date: None,
            deadline: None,
        }
    }

    pub fn with_exact_time(mut self, time: impl Into<String>) -> Self {
        self.exact_time = Some(time.into());
        self
    }

    pub fn with_exact_date(mut self, date: impl Into<String>) -> Self {
        self.exact_date = Some(date.into());
        self
    }

    pub fn with_deadline(mut self, date: impl Into<String>) -> Self {
        self.deadline = Some(date.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodInput {
    Day,
    Week,
    Month,
    Year,
    CustomDays,
}

/// `{time, weekday?, date?}` anchor of a habit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactTimeInput {
    pub time: String,
    #[serde(default)]
    pub weekday: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// Recurring task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitInput {
    pub name: String,
    pub priority: i64,
    /// Minutes.
    pub duration: i64,
    /// Occurrences required per period.
    pub times_per: i64,
    pub period: PeriodInput,
    #[serde(default)]
    pub end_date: Option<String>,
    /// Block length when `period` is `custom_days`.
    #[serde(default)]
    pub custom_days: Option<i64>,
    #[serde(default)]
    pub exact_times: Vec<ExactTimeInput>,
    /// Weekday tags, e.g. `["mon", "wed"]`.
    #[serde(default)]
    pub selected_days: Vec<String>,
}

impl HabitInput {
    pub fn new(
        name: impl Into<String>,
        priority: i64,
        duration: i64,
        times_per: i64,
        period: PeriodInput,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            duration,
            times_per,
            period,
            end_date: None,
            custom_days: None,
            exact_times: Vec::new(),
            selected_days: Vec::new(),
        }
    }

    pub fn with_end_date(mut self, date: impl Into<String>) -> Self {
        self.end_date = Some(date.into());
        self
    }

    pub fn with_custom_days(mut self, days: i64) -> Self {
        self.custom_days = Some(days);
        self
    }

    pub fn with_selected_days(mut self, days: &[&str]) -> Self {
        self.selected_days = days.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_exact_time(
        mut self,
        time: impl Into<String>,
        weekday: Option<&str>,
        date: Option<&str>,
    ) -> Self {
        self.exact_times.push(ExactTimeInput {
            time: time.into(),
            weekday: weekday.map(str::to_string),
            date: date.map(str::to_string),
        });
        self
    }
}

/// Semantically validated task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub priority: i64,
    /// Minutes, always > 0.
    pub duration: i64,
    pub kind: TaskKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Once(OnceSpec),
    Habit(HabitSpec),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnceSpec {
    pub exact_time: Option<NaiveTime>,
    pub exact_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
    /// Blocks of N days counted from the planning start date.
    CustomDays(u32),
}

/// Which day(s) an exact-time anchor is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorDay {
    /// No restriction; the time floats onto whatever day is chosen.
    Any,
    Weekday(Weekday),
    Date(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactAnchor {
    pub time: NaiveTime,
    pub day: AnchorDay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitSpec {
    pub times_per: u32,
    pub period: Period,
    pub end_date: Option<NaiveDate>,
    pub exact_times: Vec<ExactAnchor>,
    /// Deduplicated, Mon→Sun.
    pub selected_days: Vec<Weekday>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_list_json_uses_type_tag() {
        let json = r#"{
            "tasks": [
                {"type": "once", "name": "A", "priority": 5, "duration": 60,
                 "exact_time": "09:00", "exact_date": "2025-03-01"},
                {"type": "habit", "name": "Gym", "priority": 3, "duration": 45,
                 "times_per": 2, "period": "week", "selected_days": ["mon", "wed"]},
                {"type": "habit", "name": "Water plants", "priority": 1, "duration": 10,
                 "times_per": 1, "period": "custom_days", "custom_days": 3,
                 "exact_times": [{"time": "08:00"}]}
            ]
        }"#;
        let list: TaskList = serde_json::from_str(json).unwrap();
        assert_eq!(list.tasks.len(), 3);
        assert_eq!(
            list.tasks[0],
            TaskInput::Once(
                OnceInput::new("A", 5, 60)
                    .with_exact_time("09:00")
                    .with_exact_date("2025-03-01")
            )
        );
        assert_eq!(
            list.tasks[1],
            TaskInput::Habit(
                HabitInput::new("Gym", 3, 45, 2, PeriodInput::Week)
                    .with_selected_days(&["mon", "wed"])
            )
        );
        match &list.tasks[2] {
            TaskInput::Habit(h) => {
                assert_eq!(h.period, PeriodInput::CustomDays);
                assert_eq!(h.custom_days, Some(3));
                assert_eq!(h.exact_times[0].weekday, None);
            }
            other => panic!("expected habit, got {other:?}"),
        }
    }

    #[test]
    fn unknown_task_type_is_rejected() {
        let json = r#"{"type": "chore", "name": "x", "priority": 1, "duration": 5}"#;
        assert!(serde_json::from_str::<TaskInput>(json).is_err());
    }
}
