//! Engine entry point.
//!
//! `plan` is a pure function of (tasks, now, config): every call builds its own
//! time grid and nothing survives between calls.

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, FailureReason};
use crate::grid::TimeGrid;
use crate::normalize::normalize;
use crate::recurrence::{expand, Shortfall};
use crate::request::PlacementRequest;
use crate::schedule::{Schedule, ScheduleBuilder};
use crate::solver::Solver;
use crate::task::{Task, TaskInput, TaskKind};
use crate::time::{is_supported, MAX_YEAR, MIN_YEAR};

#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: EngineConfig,
}

impl Planner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize, expand, solve, and assemble a schedule.
    ///
    /// Only malformed input or an invalid config fails the whole call; every
    /// other problem is reported per occurrence in [`Schedule::unplaceable`].
    pub fn plan(&self, tasks: &[TaskInput], now: NaiveDateTime) -> EngineResult<Schedule> {
        self.config.validate()?;
        if !is_supported(now.date()) {
            return Err(EngineError::InvalidConfig(format!(
                "now {now} is outside years {MIN_YEAR}..={MAX_YEAR}"
            )));
        }
        let typed = normalize(tasks)?;

        let grid = TimeGrid::new(now, &self.config);
        let mut builder = ScheduleBuilder::new();
        let requests = self.build_requests(typed.values(), now, grid.horizon_end(), &mut builder);
        debug!(requests = requests.len(), tasks = typed.len(), "expanded");

        let outcome = Solver::new(grid, requests)?.run()?;
        for (id, interval) in &outcome.placed {
            let req = request(&outcome.requests, *id)?;
            builder.place(req.task.clone(), req.occurrence, interval.start, interval.end);
        }
        for failure in &outcome.failed {
            let req = request(&outcome.requests, failure.request)?;
            builder.reject(
                req.task.clone(),
                req.occurrence,
                failure.reason,
                failure.detail.clone(),
            );
        }

        let schedule = builder.build();
        schedule.check_no_overlap()?;

        let summary = schedule.summary();
        info!(
            placed = summary.placed,
            unplaceable = summary.unplaceable,
            busy_minutes = summary.busy_minutes,
            idle_minutes = summary.idle_minutes,
            "plan complete"
        );
        Ok(schedule)
    }

    /// One request per once-task and per habit occurrence, numbered in order.
    fn build_requests<'a>(
        &self,
        tasks: impl Iterator<Item = &'a Task>,
        now: NaiveDateTime,
        horizon_end: NaiveDateTime,
        builder: &mut ScheduleBuilder,
    ) -> Vec<PlacementRequest> {
        let mut requests = Vec::new();
        for task in tasks {
            match &task.kind {
                TaskKind::Once(spec) => {
                    requests.push(PlacementRequest::for_once(requests.len(), task, spec, now));
                }
                TaskKind::Habit(spec) => {
                    let slack = self.config.anchor_slack_minutes;
                    let expansion = expand(task, spec, now, horizon_end, slack);
                    for mut req in expansion.requests {
                        req.id = requests.len();
                        requests.push(req);
                    }
                    for shortfall in &expansion.shortfalls {
                        builder.reject(
                            task.name.clone(),
                            Some(shortfall.occurrence),
                            FailureReason::Underspecified,
                            shortfall_detail(shortfall),
                        );
                    }
                }
            }
        }
        requests
    }
}

/// Convenience wrapper around [`Planner::plan`].
pub fn plan(
    tasks: &[TaskInput],
    now: NaiveDateTime,
    config: &EngineConfig,
) -> EngineResult<Schedule> {
    Planner::new(config.clone()).plan(tasks, now)
}

fn request(requests: &[PlacementRequest], id: usize) -> EngineResult<&PlacementRequest> {
    requests
        .get(id)
        .ok_or_else(|| EngineError::Internal(format!("solver reported unknown request {id}")))
}

fn shortfall_detail(s: &Shortfall) -> String {
    format!(
        "period starting {}: {} of {} anchors available",
        s.period_start, s.available, s.requested
    )
}
