use chrono::Weekday;
use petprogress_core::schedule::materialize::find_instance;
use petprogress_core::{
    materialize, AppState, ClockTime, DayKey, InstanceId, RecurrenceRule, TaskInstanceOverride,
    TaskItem, TaskOrigin, TaskSeries,
};

fn day(raw: &str) -> DayKey {
    DayKey::parse(raw).unwrap()
}

fn gym_series() -> TaskSeries {
    TaskSeries::new(
        "Gym",
        ClockTime::new(7, 0).unwrap(),
        RecurrenceRule::Weekly {
            weekdays: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
        },
    )
}

#[test]
fn deleted_monday_occurrence_never_appears() {
    let monday = day("2026-06-01");
    let mut state = AppState::default();
    let gym = gym_series();
    state
        .overrides
        .push(TaskInstanceOverride::deletion(gym.id, monday));
    state.series.push(gym.clone());

    let tasks = materialize(monday, &state);
    assert!(tasks
        .iter()
        .all(|task| task.origin != TaskOrigin::Series(gym.id)));

    let wednesday = materialize(day("2026-06-03"), &state);
    assert_eq!(wednesday.len(), 1);
    assert_eq!(wednesday[0].title, "Gym");
}

#[test]
fn weekly_series_skips_other_weekdays() {
    let mut state = AppState::default();
    state.series.push(gym_series());
    for (raw, expected) in [
        ("2026-06-01", 1),
        ("2026-06-02", 0),
        ("2026-06-03", 1),
        ("2026-06-04", 0),
        ("2026-06-05", 1),
        ("2026-06-06", 0),
        ("2026-06-07", 0),
    ] {
        assert_eq!(materialize(day(raw), &state).len(), expected, "{raw}");
    }
}

#[test]
fn monthly_rule_matches_the_exact_day_only() {
    let mut state = AppState::default();
    state.series.push(TaskSeries::new(
        "Rent",
        ClockTime::top_of_hour(9),
        RecurrenceRule::Monthly {
            days_of_month: vec![31],
        },
    ));
    assert_eq!(materialize(day("2026-05-31"), &state).len(), 1);
    assert!(materialize(day("2026-06-30"), &state).is_empty());
}

#[test]
fn reschedule_override_moves_the_occurrence_and_keeps_its_id() {
    let monday = day("2026-06-01");
    let mut state = AppState::default();
    let gym = gym_series();
    state.upsert_override(TaskInstanceOverride::reschedule(
        gym.id,
        monday,
        ClockTime::new(18, 30).unwrap(),
    ));
    state.series.push(gym.clone());

    let tasks = materialize(monday, &state);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].time, ClockTime::new(18, 30).unwrap());
    assert_eq!(tasks[0].instance_id, InstanceId::for_series(gym.id, monday));
}

#[test]
fn inactive_series_produce_nothing() {
    let mut state = AppState::default();
    let mut gym = gym_series();
    gym.is_active = false;
    state.series.push(gym);
    assert!(materialize(day("2026-06-01"), &state).is_empty());
}

#[test]
fn output_is_sorted_with_one_offs_first_on_ties() {
    let monday = day("2026-06-01");
    let mut state = AppState::default();
    state.series.push(gym_series());
    state
        .tasks
        .push(TaskItem::new("Coffee", ClockTime::new(7, 0).unwrap(), monday));
    state
        .tasks
        .push(TaskItem::new("Alarm", ClockTime::new(6, 15).unwrap(), monday));

    let titles: Vec<String> = materialize(monday, &state)
        .into_iter()
        .map(|task| task.title)
        .collect();
    assert_eq!(titles, vec!["Alarm", "Coffee", "Gym"]);
}

#[test]
fn materializing_is_pure() {
    let monday = day("2026-06-01");
    let mut state = AppState::default();
    state.series.push(gym_series());
    state
        .tasks
        .push(TaskItem::new("Read", ClockTime::top_of_hour(21), monday));
    let before = state.clone();

    let first = materialize(monday, &state);
    let second = materialize(monday, &state);
    assert_eq!(first, second);
    assert_eq!(state, before);
}

#[test]
fn completions_mark_series_occurrences() {
    let monday = day("2026-06-01");
    let mut state = AppState::default();
    let gym = gym_series();
    state.series.push(gym.clone());
    let instance_id = gym.instance_id(monday);
    assert!(state.mark_completed(monday, instance_id.clone()));

    let found = find_instance(monday, &state, &instance_id).unwrap();
    assert!(found.is_completed);
    // Wednesday's occurrence is a different instance.
    let wednesday = materialize(day("2026-06-03"), &state);
    assert!(!wednesday[0].is_completed);
}
