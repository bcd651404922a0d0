use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use petprogress_core::schedule::timeline::build_timeline;
use petprogress_core::{
    next_top_of_hour, AppState, ClockTime, DayKey, PetEvolutionEngine, RecurrenceRule, TaskSeries,
};

/// US Eastern rules for 2026 only: EDT from 03-08 07:00Z to 11-01 06:00Z.
#[derive(Debug, Clone, Copy)]
struct Eastern2026;

fn edt() -> FixedOffset {
    FixedOffset::west_opt(4 * 3600).unwrap()
}

fn est() -> FixedOffset {
    FixedOffset::west_opt(5 * 3600).unwrap()
}

fn naive(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

impl TimeZone for Eastern2026 {
    type Offset = FixedOffset;

    fn from_offset(_offset: &FixedOffset) -> Self {
        Eastern2026
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
        self.offset_from_local_datetime(&local.and_hms_opt(12, 0, 0).unwrap())
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
        let gap = naive(3, 8, 2)..naive(3, 8, 3);
        let overlap = naive(11, 1, 1)..naive(11, 1, 2);
        if gap.contains(local) {
            LocalResult::None
        } else if overlap.contains(local) {
            LocalResult::Ambiguous(edt(), est())
        } else if *local >= gap.end && *local < overlap.start {
            LocalResult::Single(edt())
        } else {
            LocalResult::Single(est())
        }
    }

    fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
        self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
    }

    fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
        if *utc >= naive(3, 8, 7) && *utc < naive(11, 1, 6) {
            edt()
        } else {
            est()
        }
    }
}

fn utc(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, hour, 0, 0).unwrap()
}

#[test]
fn spring_forward_skips_the_missing_hour() {
    let before_gap = Eastern2026.with_ymd_and_hms(2026, 3, 8, 1, 30, 0).unwrap();
    let next = next_top_of_hour(&before_gap);
    assert_eq!(next.hour(), 3);
    assert_eq!(next.offset(), &edt());
    assert_eq!(next.with_timezone(&Utc), utc(3, 8, 7));
}

#[test]
fn fall_back_yields_both_one_oclocks() {
    let midnight_half = Eastern2026.with_ymd_and_hms(2026, 11, 1, 0, 30, 0).unwrap();
    let first = next_top_of_hour(&midnight_half);
    assert_eq!((first.hour(), *first.offset()), (1, edt()));

    let daylight_half = Eastern2026
        .with_ymd_and_hms(2026, 11, 1, 1, 30, 0)
        .earliest()
        .unwrap();
    let second = next_top_of_hour(&daylight_half);
    assert_eq!((second.hour(), *second.offset()), (1, est()));
    assert_eq!(second.with_timezone(&Utc), utc(11, 1, 6));

    let standard_half = Eastern2026
        .with_ymd_and_hms(2026, 11, 1, 1, 30, 0)
        .latest()
        .unwrap();
    let third = next_top_of_hour(&standard_half);
    assert_eq!((third.hour(), *third.offset()), (2, est()));
}

#[test]
fn timeline_over_spring_forward_has_distinct_hourly_entries() {
    let now = Eastern2026.with_ymd_and_hms(2026, 3, 8, 0, 30, 0).unwrap();
    let timeline = build_timeline(&AppState::default(), &PetEvolutionEngine::default(), &now, 4);

    let hours: Vec<u32> = timeline
        .entries
        .iter()
        .map(|entry| entry.timestamp.hour())
        .collect();
    assert_eq!(hours, vec![1, 3, 4, 5]);

    let instants: Vec<DateTime<Utc>> = timeline
        .entries
        .iter()
        .map(|entry| entry.timestamp.with_timezone(&Utc))
        .collect();
    assert_eq!(
        instants,
        vec![utc(3, 8, 6), utc(3, 8, 7), utc(3, 8, 8), utc(3, 8, 9)]
    );
    assert!(instants[0] > now.with_timezone(&Utc));
}

#[test]
fn timeline_over_fall_back_repeats_the_wall_clock_hour() {
    let now = Eastern2026.with_ymd_and_hms(2026, 11, 1, 0, 30, 0).unwrap();
    let timeline = build_timeline(&AppState::default(), &PetEvolutionEngine::default(), &now, 3);

    let instants: Vec<DateTime<Utc>> = timeline
        .entries
        .iter()
        .map(|entry| entry.timestamp.with_timezone(&Utc))
        .collect();
    assert_eq!(instants, vec![utc(11, 1, 5), utc(11, 1, 6), utc(11, 1, 7)]);
    assert_eq!(timeline.refresh_after.with_timezone(&Utc), utc(11, 1, 7));
}

#[test]
fn windows_use_wall_clock_after_the_shift() {
    let mut state = AppState::default();
    state.set_grace_minutes(0);
    state.series.push(TaskSeries::new(
        "Stretch",
        ClockTime::top_of_hour(3),
        RecurrenceRule::Daily,
    ));

    let now = Eastern2026.with_ymd_and_hms(2026, 3, 8, 1, 10, 0).unwrap();
    let timeline = build_timeline(&state, &PetEvolutionEngine::default(), &now, 2);

    assert_eq!(timeline.entries[0].timestamp.hour(), 3);
    assert_eq!(timeline.entries[0].active.len(), 1);
    assert_eq!(
        timeline.entries[0].day_key,
        DayKey::parse("2026-03-08").unwrap()
    );
    assert!(timeline.entries[1].active.is_empty());
}
