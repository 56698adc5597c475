//! Time grid: the occupancy index for one planning run.
//!
//! Occupancy records are kept in a `BTreeMap` keyed by start time. Records never
//! overlap, so ends are ordered the same way as starts and every conflict lookup
//! is a single backwards range walk.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDateTime};

use crate::config::{EngineConfig, WorkingHours};
use crate::error::{EngineError, EngineResult};
use crate::request::RequestId;
use crate::time::{align_up, start_of_day, Interval};

/// Who holds a reserved interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    pub end: NaiveDateTime,
    pub priority: i64,
    pub owner: RequestId,
}

#[derive(Debug, Clone)]
pub struct TimeGrid {
    origin: NaiveDateTime,
    horizon_end: NaiveDateTime,
    slot_minutes: u32,
    working_hours: Option<WorkingHours>,
    records: BTreeMap<NaiveDateTime, Occupancy>,
    by_owner: HashMap<RequestId, NaiveDateTime>,
}

impl TimeGrid {
    pub fn new(origin: NaiveDateTime, config: &EngineConfig) -> Self {
        Self {
            origin,
            horizon_end: origin + Duration::days(i64::from(config.horizon_days)),
            slot_minutes: config.slot_minutes,
            working_hours: config.working_hours,
            records: BTreeMap::new(),
            by_owner: HashMap::new(),
        }
    }

    pub fn origin(&self) -> NaiveDateTime {
        self.origin
    }

    pub fn horizon_end(&self) -> NaiveDateTime {
        self.horizon_end
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `interval` lies inside `[origin, horizon_end]`.
    pub fn contains(&self, interval: &Interval) -> bool {
        interval.start >= self.origin && interval.end <= self.horizon_end
    }

    /// Records overlapping `interval`, in start order.
    pub fn conflicts(&self, interval: &Interval) -> Vec<(Interval, Occupancy)> {
        let mut out: Vec<(Interval, Occupancy)> = self
            .records
            .range(..interval.end)
            .rev()
            .take_while(|(_, occ)| occ.end > interval.start)
            .map(|(start, occ)| (Interval::new(*start, occ.end), *occ))
            .collect();
        out.reverse();
        out
    }

    pub fn is_free(&self, interval: &Interval) -> bool {
        self.last_conflict_end(interval).is_none()
    }

    pub fn reserve(
        &mut self,
        interval: Interval,
        priority: i64,
        owner: RequestId,
    ) -> EngineResult<()> {
        if interval.end <= interval.start {
            return Err(EngineError::Internal(format!(
                "empty interval {} for request {owner}",
                interval.start
            )));
        }
        if self.by_owner.contains_key(&owner) {
            return Err(EngineError::Internal(format!(
                "request {owner} already holds a slot"
            )));
        }
        if let Some((held, occ)) = self.conflicts(&interval).first() {
            return Err(EngineError::Internal(format!(
                "slot {}..{} for request {owner} overlaps {}..{} held by request {}",
                interval.start, interval.end, held.start, held.end, occ.owner
            )));
        }
        self.records.insert(
            interval.start,
            Occupancy {
                end: interval.end,
                priority,
                owner,
            },
        );
        self.by_owner.insert(owner, interval.start);
        Ok(())
    }

    /// Drop the slot held by `owner`, returning it.
    pub fn release(&mut self, owner: RequestId) -> Option<Interval> {
        let start = self.by_owner.remove(&owner)?;
        let occ = self.records.remove(&start)?;
        Some(Interval::new(start, occ.end))
    }

    pub fn slot_of(&self, owner: RequestId) -> Option<Interval> {
        let start = self.by_owner.get(&owner)?;
        let occ = self.records.get(start)?;
        Some(Interval::new(*start, occ.end))
    }

    pub fn records(&self) -> impl Iterator<Item = (Interval, &Occupancy)> + '_ {
        self.records
            .iter()
            .map(|(start, occ)| (Interval::new(*start, occ.end), occ))
    }

    /// Earliest slot-aligned start in `[earliest, latest_start]` where `minutes`
    /// fit without touching an occupied or excluded interval.
    ///
    /// Respects working hours and never runs past the horizon. When the aligned
    /// start overshoots `latest_start` the exact start is tried instead.
    pub fn first_fit(
        &self,
        earliest: NaiveDateTime,
        latest_start: Option<NaiveDateTime>,
        minutes: i64,
        excluded: &[Interval],
    ) -> Option<NaiveDateTime> {
        self.scan(earliest, latest_start, minutes, excluded, true, true)
    }

    /// Like [`TimeGrid::first_fit`] but without alignment: starts sit flush
    /// against `earliest` or the occupant before them.
    pub fn first_fit_packed(
        &self,
        earliest: NaiveDateTime,
        latest_start: Option<NaiveDateTime>,
        minutes: i64,
        excluded: &[Interval],
    ) -> Option<NaiveDateTime> {
        self.scan(earliest, latest_start, minutes, excluded, true, false)
    }

    /// Flush scan ignoring working hours, for anchored requests.
    pub fn first_fit_anywhere(
        &self,
        earliest: NaiveDateTime,
        latest_start: Option<NaiveDateTime>,
        minutes: i64,
        excluded: &[Interval],
    ) -> Option<NaiveDateTime> {
        self.scan(earliest, latest_start, minutes, excluded, false, false)
    }

    fn scan(
        &self,
        earliest: NaiveDateTime,
        latest_start: Option<NaiveDateTime>,
        minutes: i64,
        excluded: &[Interval],
        working_hours: bool,
        aligned: bool,
    ) -> Option<NaiveDateTime> {
        let duration = Duration::try_minutes(minutes)?;
        let horizon_latest = self.horizon_end.checked_sub_signed(duration)?;
        let latest = latest_start.map_or(horizon_latest, |l| l.min(horizon_latest));

        let mut from = earliest.max(self.origin);
        loop {
            let cursor = match self.next_start(from, duration, working_hours, aligned) {
                Some(c) if c <= latest => c,
                // an aligned start may overshoot a bound the exact start still meets
                _ if aligned => match self.next_start(from, duration, working_hours, false) {
                    Some(c) if c <= latest => c,
                    _ => return None,
                },
                _ => return None,
            };
            let candidate = Interval::new(cursor, cursor + duration);
            let blocked_until = self
                .last_conflict_end(&candidate)
                .into_iter()
                .chain(
                    excluded
                        .iter()
                        .filter(|x| x.overlaps(&candidate))
                        .map(|x| x.end),
                )
                .max();
            match blocked_until {
                Some(end) => from = end,
                None => return Some(cursor),
            }
        }
    }

    fn next_start(
        &self,
        from: NaiveDateTime,
        duration: Duration,
        working_hours: bool,
        aligned: bool,
    ) -> Option<NaiveDateTime> {
        let cursor = if aligned {
            align_up(from, self.slot_minutes)
        } else {
            from
        };
        if working_hours {
            self.fit_working_hours(cursor, duration, aligned)
        } else {
            Some(cursor)
        }
    }

    fn last_conflict_end(&self, interval: &Interval) -> Option<NaiveDateTime> {
        self.records
            .range(..interval.end)
            .next_back()
            .map(|(_, occ)| occ.end)
            .filter(|end| *end > interval.start)
    }

    /// Move `cursor` to the first start inside working hours where `duration` fits.
    fn fit_working_hours(
        &self,
        mut cursor: NaiveDateTime,
        duration: Duration,
        aligned: bool,
    ) -> Option<NaiveDateTime> {
        let Some(wh) = self.working_hours else {
            return Some(cursor);
        };
        loop {
            let day = cursor.date();
            let open = if aligned {
                align_up(day.and_time(wh.start), self.slot_minutes)
            } else {
                day.and_time(wh.start)
            };
            let close = day.and_time(wh.end);
            if open + duration > close {
                // never fits on any day
                return None;
            }
            if cursor < open {
                cursor = open;
            }
            if cursor + duration <= close {
                return Some(cursor);
            }
            cursor = start_of_day(day.succ_opt()?);
            if cursor >= self.horizon_end {
                return None;
            }
        }
    }
}
