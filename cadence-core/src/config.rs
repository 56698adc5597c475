//! Engine configuration.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Upper bound on `horizon_days`, keeps a single run bounded.
pub const MAX_HORIZON_DAYS: u32 = 3660;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How far past "now" the engine schedules.
    pub horizon_days: u32,
    /// Granularity of flexible placements, counted from midnight.
    pub slot_minutes: u32,
    /// Allowed drift after a recurring anchor. 0 pins anchors exactly.
    pub anchor_slack_minutes: u32,
    /// Daily window for flexible placements. Fixed anchors ignore it.
    pub working_hours: Option<WorkingHours>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizon_days: 365,
            slot_minutes: 5,
            anchor_slack_minutes: 0,
            working_hours: None,
        }
    }
}

impl EngineConfig {
    pub fn with_horizon_days(mut self, days: u32) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_slot_minutes(mut self, minutes: u32) -> Self {
        self.slot_minutes = minutes;
        self
    }

    pub fn with_anchor_slack(mut self, minutes: u32) -> Self {
        self.anchor_slack_minutes = minutes;
        self
    }

    pub fn with_working_hours(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.working_hours = Some(WorkingHours { start, end });
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.horizon_days == 0 || self.horizon_days > MAX_HORIZON_DAYS {
            return Err(EngineError::InvalidConfig(format!(
                "horizon_days must be in 1..={MAX_HORIZON_DAYS}, got {}",
                self.horizon_days
            )));
        }
        if self.slot_minutes == 0 || 1440 % self.slot_minutes != 0 {
            return Err(EngineError::InvalidConfig(format!(
                "slot_minutes must divide a day evenly, got {}",
                self.slot_minutes
            )));
        }
        if self.anchor_slack_minutes > 1440 {
            return Err(EngineError::InvalidConfig(format!(
                "anchor_slack_minutes must be at most 1440, got {}",
                self.anchor_slack_minutes
            )));
        }
        if let Some(wh) = self.working_hours {
            if wh.start >= wh.end {
                return Err(EngineError::InvalidConfig(format!(
                    "working_hours start {} must be before end {}",
                    wh.start.format("%H:%M"),
                    wh.end.format("%H:%M")
                )));
            }
        }
        Ok(())
    }
}

/// Daily `[start, end)` window, e.g. 08:00-22:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl WorkingHours {
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::time::{parse_time, TIME_FORMAT};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&t.format(TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(d)?;
        parse_time(&s).map_err(serde::de::Error::custom)
    }
}
