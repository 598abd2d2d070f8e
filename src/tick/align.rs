//! Tick arithmetic.

use chrono::{
    DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, SubsecRound, TimeDelta, TimeZone, Utc,
};

use super::{Frequency, TickError};

/// Step one tick back from `t`.
///
/// Fixed frequencies subtract their duration. Month subtracts one calendar
/// month in `tz`, clamping the day to the end of shorter months.
pub fn previous_tick<Tz: TimeZone>(
    t: DateTime<Utc>,
    frequency: Frequency,
    tz: &Tz,
) -> Result<DateTime<Utc>, TickError> {
    match frequency.duration() {
        Some(step) => t
            .checked_sub_signed(step)
            .ok_or(TickError::OutOfRange { frequency, at: t }),
        None => shift_months(t, -1, frequency, tz),
    }
}

/// Step one tick forward from `t`.
pub fn next_tick<Tz: TimeZone>(
    t: DateTime<Utc>,
    frequency: Frequency,
    tz: &Tz,
) -> Result<DateTime<Utc>, TickError> {
    match frequency.duration() {
        Some(step) => t
            .checked_add_signed(step)
            .ok_or(TickError::OutOfRange { frequency, at: t }),
        None => shift_months(t, 1, frequency, tz),
    }
}

/// The most recent instant at or before `t` that lies on the grid of `frequency`.
pub fn last_whole_tick<Tz: TimeZone>(
    t: DateTime<Utc>,
    frequency: Frequency,
    tz: &Tz,
) -> Result<DateTime<Utc>, TickError> {
    let t = t.trunc_subsecs(0);
    match frequency.seconds() {
        Some(secs) => {
            let reference = week_reference(t, tz)?;
            let offset = (t - reference).num_seconds().rem_euclid(secs);
            Ok(t - TimeDelta::seconds(offset))
        }
        None => {
            let local = t.with_timezone(tz);
            let first = local
                .date_naive()
                .with_day(1)
                .ok_or(TickError::OutOfRange { frequency, at: t })?;
            local_midnight(first, tz)
        }
    }
}

/// Midnight of the most recent Sunday on or before `t`, in `tz`.
pub fn week_reference<Tz: TimeZone>(t: DateTime<Utc>, tz: &Tz) -> Result<DateTime<Utc>, TickError> {
    let local = t.with_timezone(tz).date_naive();
    let back = Days::new(u64::from(local.weekday().num_days_from_sunday()));
    let sunday = local.checked_sub_days(back).ok_or(TickError::OutOfRange {
        frequency: Frequency::Week,
        at: t,
    })?;
    local_midnight(sunday, tz)
}

/// Whether `t` lies exactly on the grid of `frequency`.
pub fn is_aligned<Tz: TimeZone>(
    t: DateTime<Utc>,
    frequency: Frequency,
    tz: &Tz,
) -> Result<bool, TickError> {
    Ok(last_whole_tick(t, frequency, tz)? == t)
}

/// The first aligned tick strictly after `t`.
///
/// Equal to `next_tick(last_whole_tick(t))` except where a fixed step would
/// run past the next Sunday midnight, which happens when the reference zone
/// changes offset during the week. That midnight is then the following tick.
pub fn following_tick<Tz: TimeZone>(
    t: DateTime<Utc>,
    frequency: Frequency,
    tz: &Tz,
) -> Result<DateTime<Utc>, TickError> {
    let base = last_whole_tick(t, frequency, tz)?;
    let next = next_tick(base, frequency, tz)?;
    if frequency.duration().is_none() {
        return Ok(next);
    }
    Ok(next.min(next_week_reference(base, tz)?))
}

/// Every aligned tick strictly after `start` and up to and including `finish`, ascending.
pub fn ticks_in<Tz: TimeZone>(
    start: DateTime<Utc>,
    finish: DateTime<Utc>,
    frequency: Frequency,
    tz: &Tz,
) -> Result<Vec<DateTime<Utc>>, TickError> {
    let mut ticks = Vec::new();
    if finish <= start {
        return Ok(ticks);
    }

    let mut tick = following_tick(start, frequency, tz)?;
    while tick <= finish {
        ticks.push(tick);
        tick = following_tick(tick, frequency, tz)?;
    }
    Ok(ticks)
}

fn next_week_reference<Tz: TimeZone>(t: DateTime<Utc>, tz: &Tz) -> Result<DateTime<Utc>, TickError> {
    let local = t.with_timezone(tz).date_naive();
    let ahead = Days::new(u64::from(7 - local.weekday().num_days_from_sunday()));
    let sunday = local.checked_add_days(ahead).ok_or(TickError::OutOfRange {
        frequency: Frequency::Week,
        at: t,
    })?;
    local_midnight(sunday, tz)
}

fn shift_months<Tz: TimeZone>(
    t: DateTime<Utc>,
    months: i32,
    frequency: Frequency,
    tz: &Tz,
) -> Result<DateTime<Utc>, TickError> {
    let local = t.with_timezone(tz);
    let step = Months::new(months.unsigned_abs());
    let shifted = if months >= 0 {
        local.checked_add_months(step)
    } else {
        local.checked_sub_months(step)
    };
    shifted
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(TickError::OutOfRange { frequency, at: t })
}

fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Result<DateTime<Utc>, TickError> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(TickError::UnresolvedLocalTime(naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn tz() -> FixedOffset {
        FixedOffset::east_opt(10 * 3600).unwrap()
    }

    /// Local wall-clock time in the test timezone as a UTC instant.
    fn at(s: &str) -> DateTime<Utc> {
        let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap();
        tz().from_local_datetime(&naive)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_previous_tick() {
        let cases = [
            ("2020-01-01T10:05", Frequency::OneMinute, "2020-01-01T10:04"),
            ("2020-01-01T10:07", Frequency::FiveMinutes, "2020-01-01T10:02"),
            ("2020-01-01T10:27", Frequency::FifteenMinutes, "2020-01-01T10:12"),
            ("2020-01-01T10:07", Frequency::ThirtyMinutes, "2020-01-01T09:37"),
            ("2020-01-01T10:12", Frequency::Hour, "2020-01-01T09:12"),
            ("2020-01-01T10:07", Frequency::ThreeHours, "2020-01-01T07:07"),
            ("2020-01-02T10:12", Frequency::TwelveHours, "2020-01-01T22:12"),
            ("2020-01-02T10:12", Frequency::Day, "2020-01-01T10:12"),
            ("2020-01-02T10:12", Frequency::Week, "2019-12-26T10:12"),
            ("2020-01-01T10:12", Frequency::Month, "2019-12-01T10:12"),
        ];
        for (t, f, expected) in cases {
            assert_eq!(previous_tick(at(t), f, &tz()).unwrap(), at(expected), "{f} from {t}");
        }
    }

    #[test]
    fn test_next_tick() {
        let cases = [
            ("2020-01-01T10:05", Frequency::OneMinute, "2020-01-01T10:06"),
            ("2020-01-01T10:07", Frequency::FiveMinutes, "2020-01-01T10:12"),
            ("2020-01-01T10:27", Frequency::FifteenMinutes, "2020-01-01T10:42"),
            ("2020-01-01T10:07", Frequency::ThirtyMinutes, "2020-01-01T10:37"),
            ("2020-01-01T10:12", Frequency::Hour, "2020-01-01T11:12"),
            ("2020-01-01T10:07", Frequency::ThreeHours, "2020-01-01T13:07"),
            ("2020-01-01T22:12", Frequency::TwelveHours, "2020-01-02T10:12"),
            ("2020-01-01T10:12", Frequency::Day, "2020-01-02T10:12"),
            ("2019-12-26T10:12", Frequency::Week, "2020-01-02T10:12"),
            ("2020-01-01T10:12", Frequency::Month, "2020-02-01T10:12"),
        ];
        for (t, f, expected) in cases {
            assert_eq!(next_tick(at(t), f, &tz()).unwrap(), at(expected), "{f} from {t}");
        }
    }

    #[test]
    fn test_month_steps_are_calendar_months() {
        // 31 days forward, then 29 (leap year February), never a fixed 30.
        assert_eq!(
            next_tick(at("2020-01-15T08:00"), Frequency::Month, &tz()).unwrap(),
            at("2020-02-15T08:00")
        );
        assert_eq!(
            next_tick(at("2020-02-15T08:00"), Frequency::Month, &tz()).unwrap(),
            at("2020-03-15T08:00")
        );
        // Month end clamps.
        assert_eq!(
            next_tick(at("2020-01-31T00:00"), Frequency::Month, &tz()).unwrap(),
            at("2020-02-29T00:00")
        );
        assert_eq!(
            previous_tick(at("2020-03-31T00:00"), Frequency::Month, &tz()).unwrap(),
            at("2020-02-29T00:00")
        );
    }

    #[test]
    fn test_last_whole_tick() {
        let cases = [
            ("2020-01-01T10:06", Frequency::OneMinute, "2020-01-01T10:06"),
            ("2020-01-01T10:07", Frequency::FiveMinutes, "2020-01-01T10:05"),
            ("2020-01-01T10:27", Frequency::FifteenMinutes, "2020-01-01T10:15"),
            ("2020-01-01T10:07", Frequency::ThirtyMinutes, "2020-01-01T10:00"),
            ("2020-01-01T10:55", Frequency::ThirtyMinutes, "2020-01-01T10:30"),
            ("2020-01-01T10:12", Frequency::Hour, "2020-01-01T10:00"),
            ("2020-01-01T10:07", Frequency::ThreeHours, "2020-01-01T09:00"),
            ("2020-01-02T10:12", Frequency::TwelveHours, "2020-01-02T00:00"),
            ("2020-01-02T23:12", Frequency::TwelveHours, "2020-01-02T12:00"),
            ("2020-01-02T10:12", Frequency::Day, "2020-01-02T00:00"),
            ("2020-01-02T10:12", Frequency::Week, "2019-12-29T00:00"),
            ("2020-01-04T10:12", Frequency::Week, "2019-12-29T00:00"),
            ("2020-01-16T10:12", Frequency::Month, "2020-01-01T00:00"),
        ];
        for (t, f, expected) in cases {
            assert_eq!(
                last_whole_tick(at(t), f, &tz()).unwrap(),
                at(expected),
                "{f} from {t}"
            );
        }
    }

    #[test]
    fn test_last_whole_tick_is_idempotent() {
        for f in Frequency::ALL {
            let tick = last_whole_tick(at("2021-07-14T17:43"), f, &tz()).unwrap();
            assert_eq!(last_whole_tick(tick, f, &tz()).unwrap(), tick, "{f}");
            assert!(is_aligned(tick, f, &tz()).unwrap());
        }
    }

    #[test]
    fn test_last_whole_tick_truncates_subseconds() {
        let t = at("2020-01-01T10:06") + TimeDelta::milliseconds(1_500);
        assert_eq!(
            last_whole_tick(t, Frequency::OneMinute, &tz()).unwrap(),
            at("2020-01-01T10:06")
        );
    }

    #[test]
    fn test_grid_synchrony() {
        let mut t = at("2020-01-01T00:00");
        let end = at("2020-01-08T00:00");
        while t < end {
            let hour = last_whole_tick(t, Frequency::Hour, &tz()).unwrap();
            for f in [
                Frequency::OneMinute,
                Frequency::FiveMinutes,
                Frequency::FifteenMinutes,
                Frequency::ThirtyMinutes,
            ] {
                assert!(is_aligned(hour, f, &tz()).unwrap(), "{hour} not on {f} grid");
            }
            let twelve = last_whole_tick(t, Frequency::TwelveHours, &tz()).unwrap();
            assert!(is_aligned(twelve, Frequency::Hour, &tz()).unwrap());
            assert!(is_aligned(twelve, Frequency::ThreeHours, &tz()).unwrap());
            t += TimeDelta::minutes(37);
        }
    }

    #[test]
    fn test_grid_follows_reference_timezone() {
        // 23:30 UTC is 09:30 the next morning at +10:00.
        let t = "2020-01-01T23:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            last_whole_tick(t, Frequency::Day, &tz()).unwrap(),
            at("2020-01-02T00:00")
        );
        assert_eq!(
            last_whole_tick(t, Frequency::Day, &Utc).unwrap(),
            "2020-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_week_reference_on_sunday() {
        assert_eq!(
            week_reference(at("2019-12-29T15:00"), &tz()).unwrap(),
            at("2019-12-29T00:00")
        );
        assert_eq!(
            week_reference(at("2020-01-04T23:59"), &tz()).unwrap(),
            at("2019-12-29T00:00")
        );
    }

    #[test]
    fn test_ticks_in() {
        let ticks = ticks_in(
            at("2020-01-01T00:20"),
            at("2020-01-01T01:15"),
            Frequency::FifteenMinutes,
            &tz(),
        )
        .unwrap();
        assert_eq!(
            ticks,
            vec![
                at("2020-01-01T00:30"),
                at("2020-01-01T00:45"),
                at("2020-01-01T01:00"),
                at("2020-01-01T01:15"),
            ]
        );

        let months = ticks_in(
            at("2020-01-01T00:00"),
            at("2020-04-01T00:00"),
            Frequency::Month,
            &tz(),
        )
        .unwrap();
        assert_eq!(
            months,
            vec![
                at("2020-02-01T00:00"),
                at("2020-03-01T00:00"),
                at("2020-04-01T00:00"),
            ]
        );
    }

    #[test]
    fn test_ticks_in_empty_window() {
        let t = at("2020-01-01T01:00");
        assert!(ticks_in(t, t, Frequency::Hour, &tz()).unwrap().is_empty());
        assert!(
            ticks_in(t, at("2020-01-01T01:59"), Frequency::Hour, &tz())
                .unwrap()
                .is_empty()
        );
    }

    // Australia/Melbourne leaves daylight saving on Sunday 2024-04-07 (+11 to
    // +10) and enters it on Sunday 2024-10-06 (+10 to +11).

    fn melbourne() -> crate::tick::ReferenceZone {
        chrono_tz::Australia::Melbourne.into()
    }

    fn z(s: &str) -> DateTime<Utc> {
        chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_week_reference_across_daylight_saving_end() {
        // Sunday midnight at +11, then the following Sunday midnight at +10.
        assert_eq!(
            week_reference(z("2024-04-10T00:00"), &melbourne()).unwrap(),
            z("2024-04-06T13:00")
        );
        assert_eq!(
            week_reference(z("2024-04-17T00:00"), &melbourne()).unwrap(),
            z("2024-04-13T14:00")
        );
    }

    #[test]
    fn test_day_grid_returns_to_local_midnight_after_offset_change() {
        // Within the week of the change the grid keeps its fixed step.
        assert_eq!(
            last_whole_tick(z("2024-04-09T05:00"), Frequency::Day, &melbourne()).unwrap(),
            z("2024-04-08T13:00")
        );
        // From the next Sunday on, ticks are local midnight at +10.
        assert_eq!(
            last_whole_tick(z("2024-04-16T05:00"), Frequency::Day, &melbourne()).unwrap(),
            z("2024-04-15T14:00")
        );
    }

    #[test]
    fn test_ticks_in_crosses_short_week() {
        // The week starting 2024-10-06 is 167 hours long; the last fixed step
        // would land past Sunday midnight, so Sunday midnight comes next.
        let ticks = ticks_in(
            z("2024-10-11T00:00"),
            z("2024-10-13T14:00"),
            Frequency::Day,
            &melbourne(),
        )
        .unwrap();
        assert_eq!(
            ticks,
            vec![z("2024-10-11T14:00"), z("2024-10-12T13:00"), z("2024-10-13T13:00")]
        );
        for tick in &ticks {
            assert!(is_aligned(*tick, Frequency::Day, &melbourne()).unwrap());
        }
    }

    #[test]
    fn test_month_ticks_follow_local_midnight() {
        let april =
            last_whole_tick(z("2024-04-20T00:00"), Frequency::Month, &melbourne()).unwrap();
        assert_eq!(april, z("2024-03-31T13:00"));
        assert_eq!(
            next_tick(april, Frequency::Month, &melbourne()).unwrap(),
            z("2024-04-30T14:00")
        );
        assert_eq!(
            following_tick(z("2024-04-20T00:00"), Frequency::Month, &melbourne()).unwrap(),
            z("2024-04-30T14:00")
        );
    }
}
