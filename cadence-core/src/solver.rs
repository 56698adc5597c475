//! Constraint solver: assigns every placement request a slot on the time grid.
//!
//! Requests are processed in [`PlacementRequest::sort_key`] order. Fixed anchors
//! reserve their exact interval and may evict lower-or-equal priority occupants;
//! everything else is a first-fit scan. An evicted request is re-queued once,
//! right after its evictor, with the lost slot excluded. Losing a slot a second
//! time, or failing the retry, is terminal.

use std::collections::VecDeque;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::error::{EngineError, EngineResult, FailureReason};
use crate::grid::TimeGrid;
use crate::request::{Constraint, PlacementRequest, RequestId};
use crate::time::Interval;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub request: RequestId,
    pub reason: FailureReason,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub requests: Vec<PlacementRequest>,
    /// In start order.
    pub placed: Vec<(RequestId, Interval)>,
    /// In the order failures happened.
    pub failed: Vec<Failure>,
}

type Attempt = Result<(Interval, Vec<RequestId>), (FailureReason, String)>;

#[derive(Debug)]
pub struct Solver {
    grid: TimeGrid,
    requests: Vec<PlacementRequest>,
    displaced: Vec<bool>,
    failed: Vec<Failure>,
}

impl Solver {
    /// `requests[i].id` must equal `i`.
    pub fn new(grid: TimeGrid, requests: Vec<PlacementRequest>) -> EngineResult<Self> {
        if let Some((i, r)) = requests.iter().enumerate().find(|(i, r)| r.id != *i) {
            return Err(EngineError::Internal(format!(
                "request at position {i} carries id {}",
                r.id
            )));
        }
        let displaced = vec![false; requests.len()];
        Ok(Self {
            grid,
            requests,
            displaced,
            failed: Vec::new(),
        })
    }

    pub fn run(mut self) -> EngineResult<SolveOutcome> {
        let mut order: Vec<RequestId> = (0..self.requests.len()).collect();
        order.sort_by(|a, b| {
            self.requests[*a]
                .sort_key()
                .cmp(&self.requests[*b].sort_key())
        });

        for id in order {
            let mut queue = VecDeque::from([id]);
            while let Some(next) = queue.pop_front() {
                let requeued = self.place(next)?;
                queue.extend(requeued);
            }
        }

        let placed = self
            .grid
            .records()
            .map(|(interval, occ)| (occ.owner, interval))
            .collect();
        Ok(SolveOutcome {
            requests: self.requests,
            placed,
            failed: self.failed,
        })
    }

    /// Place one request; returns the evicted requests that get a second try.
    fn place(&mut self, id: RequestId) -> EngineResult<Vec<RequestId>> {
        let attempt = match self.requests[id].constraint.clone() {
            Constraint::Fixed {
                start,
                slack_minutes: 0,
            } => self.try_fixed(id, start),
            Constraint::Fixed {
                start,
                slack_minutes,
            } => self.try_slack(id, start, slack_minutes),
            Constraint::DayAt {
                time,
                first_day,
                last_day,
            } => self.try_day_at(id, time, first_day, last_day),
            Constraint::Window {
                earliest,
                latest_start,
                ..
            } => self.try_window(id, earliest, Some(latest_start)),
            Constraint::Open => {
                let now = self.grid.origin();
                self.try_window(id, now, None)
            }
        };

        match attempt {
            Ok((interval, evicted)) => self.commit(id, interval, evicted),
            Err((reason, detail)) => {
                let reason = if self.displaced[id] {
                    FailureReason::DisplacedNoAlternative
                } else {
                    reason
                };
                self.fail(id, reason, detail);
                Ok(Vec::new())
            }
        }
    }

    fn commit(
        &mut self,
        id: RequestId,
        interval: Interval,
        evicted: Vec<RequestId>,
    ) -> EngineResult<Vec<RequestId>> {
        let mut requeue = Vec::new();
        for victim in evicted {
            let lost = self.grid.release(victim).ok_or_else(|| {
                EngineError::Internal(format!("evicted request {victim} holds no slot"))
            })?;
            debug!(
                evictor = %self.requests[id].label(),
                evicted = %self.requests[victim].label(),
                start = %lost.start,
                "evicted lower-priority occupant"
            );
            if self.displaced[victim] {
                let detail = format!(
                    "displaced twice, last from {} by '{}'",
                    lost.start,
                    self.requests[id].label()
                );
                self.fail(victim, FailureReason::DisplacedNoAlternative, detail);
            } else {
                self.displaced[victim] = true;
                self.requests[victim].excluded.push(lost);
                requeue.push(victim);
            }
        }
        self.grid.reserve(interval, self.requests[id].priority, id)?;
        Ok(requeue)
    }

    fn fail(&mut self, id: RequestId, reason: FailureReason, detail: String) {
        debug!(request = %self.requests[id].label(), %reason, %detail, "unplaceable");
        self.failed.push(Failure {
            request: id,
            reason,
            detail,
        });
    }

    fn try_fixed(&self, id: RequestId, start: NaiveDateTime) -> Attempt {
        let req = &self.requests[id];
        let interval = Interval::with_minutes(start, req.duration);
        if interval.start < self.grid.origin() {
            return Err((
                FailureReason::NoFeasibleSlot,
                format!("anchor {start} is already in the past"),
            ));
        }
        if !self.grid.contains(&interval) {
            return Err((
                FailureReason::HorizonExhausted,
                format!("anchor {start} lies beyond the planning horizon"),
            ));
        }
        if req.is_excluded(&interval) {
            return Err((
                FailureReason::NoFeasibleSlot,
                format!("lost its only slot at {start}"),
            ));
        }

        let conflicts = self.grid.conflicts(&interval);
        if let Some((held, occ)) = conflicts.iter().find(|(_, occ)| occ.priority > req.priority) {
            return Err((
                FailureReason::SlotConflict,
                format!(
                    "{}..{} is held by higher-priority '{}' (priority {} > {})",
                    held.start,
                    held.end,
                    self.requests[occ.owner].label(),
                    occ.priority,
                    req.priority
                ),
            ));
        }
        Ok((interval, conflicts.iter().map(|(_, occ)| occ.owner).collect()))
    }

    fn try_slack(&self, id: RequestId, start: NaiveDateTime, slack_minutes: u32) -> Attempt {
        let req = &self.requests[id];
        let exact = Interval::with_minutes(start, req.duration);
        if self.grid.contains(&exact) && self.grid.is_free(&exact) && !req.is_excluded(&exact) {
            return Ok((exact, Vec::new()));
        }
        let latest = start + Duration::minutes(i64::from(slack_minutes));
        match self
            .grid
            .first_fit_anywhere(start, Some(latest), req.duration, &req.excluded)
        {
            Some(at) => Ok((Interval::with_minutes(at, req.duration), Vec::new())),
            None => Err((
                FailureReason::NoFeasibleSlot,
                format!("no free slot within {slack_minutes} minutes after {start}"),
            )),
        }
    }

    fn try_day_at(
        &self,
        id: RequestId,
        time: NaiveTime,
        first_day: NaiveDate,
        last_day: Option<NaiveDate>,
    ) -> Attempt {
        let req = &self.requests[id];
        let mut day = first_day;
        loop {
            if let Some(last) = last_day {
                if day > last {
                    return Err((
                        FailureReason::NoFeasibleSlot,
                        format!("no free {} slot on or before {last}", time.format("%H:%M")),
                    ));
                }
            }
            let interval = Interval::with_minutes(day.and_time(time), req.duration);
            if interval.end > self.grid.horizon_end() {
                let reason = if last_day.is_some() {
                    FailureReason::NoFeasibleSlot
                } else {
                    FailureReason::HorizonExhausted
                };
                return Err((
                    reason,
                    format!("no free {} slot before the horizon", time.format("%H:%M")),
                ));
            }
            if interval.start >= self.grid.origin()
                && self.grid.is_free(&interval)
                && !req.is_excluded(&interval)
            {
                return Ok((interval, Vec::new()));
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => {
                    return Err((
                        FailureReason::HorizonExhausted,
                        "ran out of calendar".to_string(),
                    ));
                }
            };
        }
    }

    /// Bounded windows scan slot-aligned starts; open requests pack flush
    /// from "now" so the horizon is usable to the minute.
    fn try_window(
        &self,
        id: RequestId,
        earliest: NaiveDateTime,
        latest_start: Option<NaiveDateTime>,
    ) -> Attempt {
        let req = &self.requests[id];
        let found = match latest_start {
            Some(_) => self
                .grid
                .first_fit(earliest, latest_start, req.duration, &req.excluded),
            None => self
                .grid
                .first_fit_packed(earliest, None, req.duration, &req.excluded),
        };
        match (found, latest_start) {
            (Some(at), _) => Ok((Interval::with_minutes(at, req.duration), Vec::new())),
            (None, Some(latest)) => Err((
                FailureReason::NoFeasibleSlot,
                format!(
                    "no free {}-minute slot starting between {earliest} and {latest}",
                    req.duration
                ),
            )),
            (None, None) => Err((
                FailureReason::HorizonExhausted,
                format!(
                    "no free {}-minute slot before the horizon ends at {}",
                    req.duration,
                    self.grid.horizon_end()
                ),
            )),
        }
    }
}
