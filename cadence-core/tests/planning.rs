use std::collections::BTreeMap;

use cadence_core::normalize::normalize_task;
use cadence_core::recurrence::expand;
use cadence_core::{
    parse_local_datetime, EngineConfig, FailureReason, HabitInput, OnceInput, PeriodInput,
    Planner, Schedule, TaskInput, TaskKind, TaskList,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use proptest::prelude::*;

fn dt(s: &str) -> NaiveDateTime {
    parse_local_datetime(s).unwrap()
}

fn office_hours() -> EngineConfig {
    EngineConfig::default().with_working_hours(
        NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
    )
}

#[test]
fn fixed_conflict_goes_to_higher_priority() {
    let list: TaskList = serde_json::from_str(
        r#"{ "tasks": [
            { "type": "once", "name": "A", "priority": 5, "duration": 60,
              "exact_time": "09:00", "exact_date": "2025-03-01" },
            { "type": "once", "name": "B", "priority": 1, "duration": 60,
              "exact_time": "09:00", "exact_date": "2025-03-01" }
        ] }"#,
    )
    .unwrap();

    let s = Planner::default().plan(&list.tasks, dt("2025-03-01T00:00")).unwrap();
    assert_eq!(s.placed.len(), 1);
    assert_eq!(s.placed[0].task, "A");
    assert_eq!(s.placed[0].start, dt("2025-03-01T09:00"));
    assert_eq!(s.placed[0].end, dt("2025-03-01T10:00"));
    assert_eq!(s.unplaceable.len(), 1);
    assert_eq!(s.unplaceable[0].task, "B");
    assert_eq!(s.unplaceable[0].reason, FailureReason::SlotConflict);

    let json = serde_json::to_value(&s).unwrap();
    assert_eq!(json["unplaceable"][0]["reason"], "slot_conflict");
}

#[test]
fn twice_weekly_gym_over_two_weeks() {
    let gym = HabitInput::new("Gym", 3, 45, 2, PeriodInput::Week)
        .with_selected_days(&["mon", "wed"])
        .with_end_date("2025-03-16");
    let s = Planner::new(office_hours())
        .plan(&[gym.into()], dt("2025-03-03T00:00"))
        .unwrap();

    assert!(s.unplaceable.is_empty(), "{:?}", s.unplaceable);
    assert_eq!(s.placed.len(), 4);
    for p in &s.placed {
        assert_eq!(p.minutes(), 45);
        assert!(matches!(p.start.weekday(), Weekday::Mon | Weekday::Wed));
        assert_eq!(p.start.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }
    let occurrences: Vec<Option<u32>> = s.placed.iter().map(|p| p.occurrence).collect();
    assert_eq!(occurrences, vec![Some(0), Some(1), Some(2), Some(3)]);
}

#[test]
fn three_per_week_on_three_days_stops_at_end_date() {
    let end = NaiveDate::from_ymd_opt(2025, 3, 19).unwrap();
    let h = HabitInput::new("Stretch", 1, 20, 3, PeriodInput::Week)
        .with_selected_days(&["mon", "wed", "fri"])
        .with_end_date("2025-03-19");
    let s = Planner::default().plan(&[h.into()], dt("2025-03-03T00:00")).unwrap();

    assert!(s.unplaceable.is_empty());
    let mut per_week: BTreeMap<u32, usize> = BTreeMap::new();
    for p in &s.placed {
        assert!(p.start.date() <= end, "{} is after end_date", p.start);
        *per_week.entry(p.start.iso_week().week()).or_default() += 1;
    }
    assert_eq!(per_week[&10], 3);
    assert_eq!(per_week[&11], 3);
    // Fri 21st is past end_date
    assert_eq!(per_week[&12], 2);
}

#[test]
fn too_few_days_reports_each_missing_occurrence() {
    let h = HabitInput::new("Piano", 2, 30, 3, PeriodInput::Week)
        .with_selected_days(&["mon"])
        .with_end_date("2025-03-09");
    let s = Planner::default().plan(&[h.into()], dt("2025-03-03T00:00")).unwrap();

    assert_eq!(s.placed.len(), 1);
    let missing: Vec<(Option<u32>, FailureReason)> =
        s.unplaceable.iter().map(|u| (u.occurrence, u.reason)).collect();
    assert_eq!(
        missing,
        vec![
            (Some(1), FailureReason::Underspecified),
            (Some(2), FailureReason::Underspecified)
        ]
    );
}

#[test]
fn daily_exact_time_habit_skips_busy_day_only() {
    let standup = HabitInput::new("Standup", 1, 15, 1, PeriodInput::Day)
        .with_exact_time("09:30", None, None)
        .with_end_date("2025-03-05");
    let offsite = OnceInput::new("Offsite", 9, 480)
        .with_exact_date("2025-03-04")
        .with_exact_time("09:00");
    let s = Planner::default()
        .plan(&[standup.into(), offsite.into()], dt("2025-03-03T08:00"))
        .unwrap();

    let days: Vec<NaiveDate> = s.occurrences_of("Standup").map(|p| p.start.date()).collect();
    assert_eq!(
        days,
        vec![
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
        ]
    );
    let lost: Vec<_> = s.failures_of("Standup").collect();
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].reason, FailureReason::SlotConflict);
}

#[test]
fn deadline_work_lands_before_deadline_and_open_work_after() {
    let tasks: Vec<TaskInput> = vec![
        OnceInput::new("Someday", 9, 120).into(),
        OnceInput::new("Report", 1, 240).with_deadline("2025-03-03").into(),
    ];
    let s = Planner::new(office_hours())
        .plan(&tasks, dt("2025-03-03T08:00"))
        .unwrap();
    assert!(s.is_complete());
    let report = s.occurrences_of("Report").next().unwrap();
    assert_eq!(report.start, dt("2025-03-03T09:00"));
    let someday = s.occurrences_of("Someday").next().unwrap();
    assert_eq!(someday.start, dt("2025-03-03T13:00"));
}

#[test]
fn missed_deadline_is_no_feasible_slot() {
    let tasks: Vec<TaskInput> = vec![
        OnceInput::new("Block", 9, 8 * 60)
            .with_exact_date("2025-03-03")
            .with_exact_time("09:00")
            .into(),
        OnceInput::new("Late", 1, 60).with_deadline("2025-03-03").into(),
    ];
    let s = Planner::new(office_hours())
        .plan(&tasks, dt("2025-03-03T08:00"))
        .unwrap();
    let late: Vec<_> = s.failures_of("Late").collect();
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].reason, FailureReason::NoFeasibleSlot);
}

#[test]
fn anchor_slack_lets_habit_drift_past_a_meeting() {
    let walk = HabitInput::new("Walk", 1, 30, 1, PeriodInput::Day)
        .with_exact_time("12:00", None, None)
        .with_end_date("2025-03-03");
    let lunch = OnceInput::new("Lunch", 5, 30)
        .with_exact_date("2025-03-03")
        .with_exact_time("12:00");
    let cfg = EngineConfig::default().with_anchor_slack(60);
    let s = Planner::new(cfg)
        .plan(&[walk.into(), lunch.into()], dt("2025-03-03T08:00"))
        .unwrap();
    assert!(s.is_complete());
    let walk = s.occurrences_of("Walk").next().unwrap();
    assert_eq!(walk.start, dt("2025-03-03T12:30"));
}

fn once_strategy(i: usize) -> impl Strategy<Value = OnceInput> {
    (
        0i64..5,
        1i64..=180,
        proptest::option::of(0u32..7),
        proptest::option::of((6u32..20, 0u32..60)),
        proptest::option::of(0u32..5),
    )
        .prop_map(move |(priority, minutes, day, time, deadline_after)| {
            let mut t = OnceInput::new(format!("t{i}"), priority, minutes);
            if let Some(d) = day {
                t = t.with_exact_date(day_after_base(d).to_string());
            }
            if let Some((h, m)) = time {
                t = t.with_exact_time(format!("{h:02}:{m:02}"));
            }
            if let Some(extra) = deadline_after {
                t = t.with_deadline(day_after_base(day.unwrap_or(0) + extra).to_string());
            }
            t
        })
}

const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

fn day_after_base(days: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap() + chrono::Duration::days(i64::from(days))
}

fn period_strategy() -> impl Strategy<Value = PeriodInput> {
    prop_oneof![
        Just(PeriodInput::Day),
        Just(PeriodInput::Week),
        Just(PeriodInput::Month),
        Just(PeriodInput::Year),
        Just(PeriodInput::CustomDays),
    ]
}

fn habit_strategy(i: usize) -> impl Strategy<Value = HabitInput> {
    (
        (0i64..5, 1i64..=90, 1i64..=4),
        period_strategy(),
        2i64..=5,
        proptest::sample::subsequence(WEEKDAYS.to_vec(), 0..=3),
        proptest::collection::vec((6u32..20, 0u32..60, proptest::option::of(0usize..7)), 0..=2),
        proptest::option::of(0u32..10),
    )
        .prop_map(
            move |((priority, minutes, times_per), period, custom, days, times, end)| {
                let mut h = HabitInput::new(format!("t{i}"), priority, minutes, times_per, period)
                    .with_selected_days(&days);
                if period == PeriodInput::CustomDays {
                    h = h.with_custom_days(custom);
                }
                for (hour, minute, weekday) in times {
                    let weekday = weekday.map(|w| WEEKDAYS[w]);
                    h = h.with_exact_time(format!("{hour:02}:{minute:02}"), weekday, None);
                }
                if let Some(d) = end {
                    h = h.with_end_date(day_after_base(d).to_string());
                }
                h
            },
        )
}

fn task_list_strategy() -> impl Strategy<Value = Vec<TaskInput>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                prop_oneof![
                    2 => once_strategy(i).prop_map(TaskInput::from),
                    1 => habit_strategy(i).prop_map(TaskInput::from),
                ]
                .boxed()
            })
            .collect::<Vec<_>>()
    })
}

/// Occurrences a task must account for: one per once-task, one per expanded
/// anchor or shortfall for a habit.
fn expected_occurrences(t: &TaskInput, now: NaiveDateTime, horizon_days: i64) -> usize {
    let task = normalize_task(t).unwrap();
    match &task.kind {
        TaskKind::Once(_) => 1,
        TaskKind::Habit(spec) => {
            let horizon_end = now + chrono::Duration::days(horizon_days);
            let exp = expand(&task, spec, now, horizon_end, 0);
            exp.requests.len() + exp.shortfalls.len()
        }
    }
}

fn assert_no_overlap(s: &Schedule) {
    for pair in s.placed.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "{:?} overlaps {:?}",
            pair[0],
            pair[1]
        );
    }
}

proptest! {
    #[test]
    fn placements_never_overlap_and_nothing_is_dropped(tasks in task_list_strategy()) {
        let now = dt("2025-03-01T07:00");
        let planner = Planner::new(EngineConfig::default().with_horizon_days(10));
        let s = planner.plan(&tasks, now).unwrap();

        assert_no_overlap(&s);
        for t in &tasks {
            let expected = expected_occurrences(t, now, 10);
            let mut seen: Vec<Option<u32>> = s
                .occurrences_of(t.name())
                .map(|p| p.occurrence)
                .chain(s.failures_of(t.name()).map(|u| u.occurrence))
                .collect();
            prop_assert_eq!(seen.len(), expected, "task {} miscounted", t.name());
            if matches!(t, TaskInput::Habit(_)) {
                seen.sort();
                let numbered: Vec<Option<u32>> = (0..expected as u32).map(Some).collect();
                prop_assert_eq!(seen, numbered, "task {} occurrence numbering", t.name());
            }
        }
        for p in &s.placed {
            prop_assert!(p.start >= now);
        }
    }

    #[test]
    fn planning_is_idempotent(tasks in task_list_strategy()) {
        let now = dt("2025-03-01T07:00");
        let planner = Planner::new(office_hours().with_horizon_days(10));
        let first = planner.plan(&tasks, now).unwrap();
        let second = planner.plan(&tasks, now).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn open_tasks_within_horizon_never_exhaust_it(
        durations in proptest::collection::vec(1i64..=240, 1..20),
        fill in any::<bool>(),
    ) {
        let day = 24 * 60;
        let mut fitting = Vec::new();
        let mut total = 0;
        for d in durations {
            if total + d > day {
                break;
            }
            total += d;
            fitting.push(d);
        }
        if fill && total < day {
            fitting.push(day - total);
        }
        let tasks: Vec<TaskInput> = fitting
            .iter()
            .enumerate()
            .map(|(i, d)| OnceInput::new(format!("open{i}"), (i % 3) as i64, *d).into())
            .collect();
        let planner = Planner::new(EngineConfig::default().with_horizon_days(1));
        let s = planner.plan(&tasks, dt("2025-03-01T08:03")).unwrap();
        prop_assert!(s.is_complete(), "{:?}", s.unplaceable);
        prop_assert_eq!(s.summary().idle_minutes, 0);
        prop_assert_eq!(s.placed[0].start, dt("2025-03-01T08:03"));
    }
}
