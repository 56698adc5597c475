//! cadence-core: priority-driven scheduling engine for one-off tasks and habits

pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod normalize;
pub mod recurrence;
pub mod request;
pub mod schedule;
pub mod solver;
pub mod task;
pub mod time;

pub use config::{EngineConfig, WorkingHours};
pub use engine::{plan, Planner};
pub use error::{EngineError, EngineResult, FailureReason};
pub use normalize::normalize;
pub use schedule::{Schedule, ScheduleBuilder, ScheduleSummary, ScheduledOccurrence, Unplaceable};
pub use task::{
    ExactTimeInput, HabitInput, OnceInput, PeriodInput, Task, TaskInput, TaskKind, TaskList,
};
pub use time::{parse_local_datetime, Interval};
