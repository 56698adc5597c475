//! Schedule builder: the engine's output and its renderings.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult, FailureReason};

const ICS_STAMP: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledOccurrence {
    pub task: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Set for habit occurrences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<u32>,
}

impl ScheduledOccurrence {
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn label(&self) -> String {
        match self.occurrence {
            Some(i) => format!("{}#{}", self.task, i),
            None => self.task.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unplaceable {
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurrence: Option<u32>,
    pub reason: FailureReason,
    pub detail: String,
}

impl Unplaceable {
    pub fn label(&self) -> String {
        match self.occurrence {
            Some(i) => format!("{}#{}", self.task, i),
            None => self.task.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub placed: Vec<ScheduledOccurrence>,
    pub unplaceable: Vec<Unplaceable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleSummary {
    pub placed: usize,
    pub unplaceable: usize,
    pub busy_minutes: i64,
    /// First start to last end.
    pub span: Option<(NaiveDateTime, NaiveDateTime)>,
    /// Gaps between placements inside `span`.
    pub idle_minutes: i64,
}

impl Schedule {
    pub fn is_complete(&self) -> bool {
        self.unplaceable.is_empty()
    }

    pub fn occurrences_of<'a>(
        &'a self,
        task: &'a str,
    ) -> impl Iterator<Item = &'a ScheduledOccurrence> + 'a {
        self.placed.iter().filter(move |p| p.task == task)
    }

    pub fn failures_of<'a>(&'a self, task: &'a str) -> impl Iterator<Item = &'a Unplaceable> + 'a {
        self.unplaceable.iter().filter(move |u| u.task == task)
    }

    /// Fails if any two placements overlap. `placed` must be in start order.
    pub fn check_no_overlap(&self) -> EngineResult<()> {
        for pair in self.placed.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(EngineError::Internal(format!(
                    "'{}' ({}..{}) overlaps '{}' ({}..{})",
                    pair[0].label(),
                    pair[0].start,
                    pair[0].end,
                    pair[1].label(),
                    pair[1].start,
                    pair[1].end
                )));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> ScheduleSummary {
        let busy_minutes: i64 = self.placed.iter().map(ScheduledOccurrence::minutes).sum();
        let span = match (self.placed.first(), self.placed.iter().map(|p| p.end).max()) {
            (Some(first), Some(last)) => Some((first.start, last)),
            _ => None,
        };
        let idle_minutes = span.map_or(0, |(a, b)| (b - a).num_minutes() - busy_minutes);
        ScheduleSummary {
            placed: self.placed.len(),
            unplaceable: self.unplaceable.len(),
            busy_minutes,
            span,
            idle_minutes,
        }
    }

    /// Minimal VCALENDAR with one VEVENT per placement.
    ///
    /// Times are floating local times (no `Z`, no TZID). UIDs derive from task,
    /// occurrence and start, so re-importing an unchanged plan updates in place.
    pub fn to_ics(&self) -> String {
        let mut s = String::new();
        s.push_str("BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:-//Cadence//EN\n");

        for p in &self.placed {
            let dtstart = p.start.format(ICS_STAMP);
            s.push_str("BEGIN:VEVENT\n");
            s.push_str(&format!(
                "UID:{}-{}-{}@cadence\n",
                uid_slug(&p.task),
                p.occurrence.map_or_else(|| "once".to_string(), |i| i.to_string()),
                dtstart
            ));
            s.push_str(&format!("DTSTART:{dtstart}\n"));
            s.push_str(&format!("DTEND:{}\n", p.end.format(ICS_STAMP)));
            s.push_str(&format!("SUMMARY:{}\n", escape_ics(&p.task)));
            if let Some(i) = p.occurrence {
                s.push_str(&format!("DESCRIPTION:Occurrence {i}\n"));
            }
            s.push_str("END:VEVENT\n");
        }

        s.push_str("END:VCALENDAR\n");
        s
    }
}

fn escape_ics(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

fn uid_slug(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// Accumulates placements and failures in any order.
#[derive(Debug, Default)]
pub struct ScheduleBuilder {
    placed: Vec<ScheduledOccurrence>,
    unplaceable: Vec<Unplaceable>,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(
        &mut self,
        task: impl Into<String>,
        occurrence: Option<u32>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> &mut Self {
        self.placed.push(ScheduledOccurrence {
            task: task.into(),
            start,
            end,
            occurrence,
        });
        self
    }

    pub fn reject(
        &mut self,
        task: impl Into<String>,
        occurrence: Option<u32>,
        reason: FailureReason,
        detail: impl Into<String>,
    ) -> &mut Self {
        self.unplaceable.push(Unplaceable {
            task: task.into(),
            occurrence,
            reason,
            detail: detail.into(),
        });
        self
    }

    /// Placements sorted by (start, task, occurrence), failures by (task, occurrence).
    pub fn build(self) -> Schedule {
        let Self {
            mut placed,
            mut unplaceable,
        } = self;
        placed.sort_by(|a, b| {
            (a.start, &a.task, a.occurrence).cmp(&(b.start, &b.task, b.occurrence))
        });
        unplaceable.sort_by(|a, b| (&a.task, a.occurrence).cmp(&(&b.task, b.occurrence)));
        Schedule { placed, unplaceable }
    }
}
