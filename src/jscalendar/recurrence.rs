/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Recurrence codec (spec.md §4.5): `RRULE` ↔ JSCalendar `recurrenceRule`.

use crate::common::Tz;
use crate::icalendar::{ByDay, ICalRecurrenceRule};
use crate::jscalendar::context::Context;
use crate::jscalendar::time::{
    parse_local_date_time_string, to_local_date_time_string, tz_datetime_to_utc, utc_to_tz_datetime,
};
use crate::jscalendar::types::{NDay, RecurrenceRule};

const WEEKDAYS: [(&str, &str); 7] = [
    ("MO", "monday"),
    ("TU", "tuesday"),
    ("WE", "wednesday"),
    ("TH", "thursday"),
    ("FR", "friday"),
    ("SA", "saturday"),
    ("SU", "sunday"),
];

fn ical_weekday_to_json(code: &str) -> String {
    WEEKDAYS
        .iter()
        .find(|(ical, _)| ical.eq_ignore_ascii_case(code))
        .map(|(_, j)| j.to_string())
        .unwrap_or_else(|| code.to_ascii_lowercase())
}

fn json_weekday_to_ical(day: &str) -> Option<&'static str> {
    WEEKDAYS
        .iter()
        .find(|(_, j)| j.eq_ignore_ascii_case(day))
        .map(|(ical, _)| *ical)
}

/// `start_tz` is the master's resolved start timezone (`None` if
/// floating); `until` is re-expressed in it per spec.md §4.5 (a
/// floating LocalDate, never `Z`-suffixed, regardless of how `UNTIL`
/// was tagged on the wire).
pub fn from_ical(rule: &ICalRecurrenceRule, start_tz: Option<Tz>) -> RecurrenceRule {
    let mut out = RecurrenceRule {
        frequency: rule.freq.to_ascii_lowercase(),
        ..Default::default()
    };
    if let Some(interval) = rule.interval.filter(|i| *i != 1) {
        out.interval = Some(interval);
    }
    out.rscale = rule.rscale.as_ref().map(|s| s.to_ascii_lowercase());
    out.skip = rule.skip.as_ref().map(|s| match s.as_str() {
        "BACKWARD" => "backward".to_string(),
        "FORWARD" => "forward".to_string(),
        other => other.to_ascii_lowercase(),
    });
    if let Some(wkst) = &rule.wkst {
        if !wkst.eq_ignore_ascii_case("MO") {
            out.first_day_of_week = Some(ical_weekday_to_json(wkst));
        }
    }
    if !rule.byday.is_empty() {
        out.by_day = Some(
            rule.byday
                .iter()
                .map(|d| NDay {
                    day: ical_weekday_to_json(&d.weekday),
                    nth_of_period: d.ordwk,
                })
                .collect(),
        );
    }
    if !rule.bymonth.is_empty() {
        out.by_month = Some(rule.bymonth.clone());
    }
    if !rule.bymonthday.is_empty() {
        out.by_date = Some(sorted(rule.bymonthday.iter().map(|v| *v as i32)));
    }
    if !rule.byyearday.is_empty() {
        out.by_year_day = Some(sorted(rule.byyearday.iter().map(|v| *v as i32)));
    }
    if !rule.byweekno.is_empty() {
        out.by_week_no = Some(sorted(rule.byweekno.iter().map(|v| *v as i32)));
    }
    if !rule.byhour.is_empty() {
        out.by_hour = Some(sorted(rule.byhour.iter().map(|v| *v as u32)));
    }
    if !rule.byminute.is_empty() {
        out.by_minute = Some(sorted(rule.byminute.iter().map(|v| *v as u32)));
    }
    if !rule.bysecond.is_empty() {
        out.by_second = Some(sorted(rule.bysecond.iter().map(|v| *v as u32)));
    }
    if !rule.bysetpos.is_empty() {
        out.by_set_position = Some(sorted(rule.bysetpos.iter().copied()));
    }
    out.count = rule.count;
    out.until = rule.until.map(|dt| {
        let local = if dt.is_utc { utc_to_tz_datetime(&dt, start_tz) } else { dt };
        to_local_date_time_string(&local)
    });
    out
}

/// Spec.md §4.5: `byX` arrays are "sorted ascending on output."
fn sorted<T: Ord>(values: impl Iterator<Item = T>) -> Vec<T> {
    let mut values: Vec<T> = values.collect();
    values.sort();
    values
}

struct Range {
    field: &'static str,
    lower: i32,
    upper: i32,
    allow_zero: bool,
}

const RANGES: &[Range] = &[
    Range { field: "byDate", lower: -31, upper: 31, allow_zero: false },
    Range { field: "byYearDay", lower: -366, upper: 366, allow_zero: false },
    Range { field: "byWeekNo", lower: -53, upper: 53, allow_zero: false },
    Range { field: "byHour", lower: 0, upper: 23, allow_zero: true },
    Range { field: "byMinute", lower: 0, upper: 59, allow_zero: true },
    Range { field: "bySecond", lower: 0, upper: 59, allow_zero: true },
    Range { field: "bySetPosition", lower: 0, upper: 59, allow_zero: true },
];

fn check_range(field: &'static str, values: &[i32], ctx: &mut Context) -> bool {
    let range = RANGES.iter().find(|r| r.field == field).unwrap();
    let mut ok = true;
    for (i, v) in values.iter().enumerate() {
        let in_range = *v >= range.lower && *v <= range.upper && (range.allow_zero || *v != 0);
        if !in_range {
            ctx.invalid(Some(&format!("{field}/{i}")));
            ok = false;
        }
    }
    ok
}

/// `count` and `until` in the input are mutually exclusive per the
/// invariant in spec.md §3; when both are present `until` wins and
/// `count` is flagged invalid. `start_tz` is the master's resolved start
/// timezone, used to convert the floating `until` LocalDate back to the
/// UTC `UNTIL` the wire format requires (spec.md §4.5).
pub fn to_ical(rule: &RecurrenceRule, start_tz: Option<Tz>, ctx: &mut Context) -> Option<ICalRecurrenceRule> {
    let mut out = ICalRecurrenceRule {
        freq: rule.frequency.to_ascii_uppercase(),
        interval: rule.interval,
        rscale: rule.rscale.clone(),
        ..Default::default()
    };
    if out.freq.is_empty() {
        ctx.invalid(Some("frequency"));
        return None;
    }
    out.skip = rule.skip.as_ref().map(|s| s.to_ascii_uppercase());
    out.wkst = rule
        .first_day_of_week
        .as_deref()
        .and_then(json_weekday_to_ical)
        .map(|s| s.to_string());

    if let Some(by_day) = &rule.by_day {
        out.byday = by_day
            .iter()
            .enumerate()
            .filter_map(|(i, nd)| match json_weekday_to_ical(&nd.day) {
                Some(code) => Some(ByDay {
                    weekday: code.to_string(),
                    ordwk: nd.nth_of_period,
                }),
                None => {
                    ctx.invalid(Some(&format!("byDay/{i}")));
                    None
                }
            })
            .collect();
    }
    if let Some(by_month) = &rule.by_month {
        out.bymonth = by_month.clone();
    }
    if let Some(values) = &rule.by_date {
        if check_range("byDate", values, ctx) {
            out.bymonthday = sorted(values.iter().map(|v| *v as i8));
        }
    }
    if let Some(values) = &rule.by_year_day {
        if check_range("byYearDay", values, ctx) {
            out.byyearday = sorted(values.iter().map(|v| *v as i16));
        }
    }
    if let Some(values) = &rule.by_week_no {
        if check_range("byWeekNo", values, ctx) {
            out.byweekno = sorted(values.iter().map(|v| *v as i8));
        }
    }
    if let Some(values) = &rule.by_hour {
        let signed: Vec<i32> = values.iter().map(|v| *v as i32).collect();
        if check_range("byHour", &signed, ctx) {
            out.byhour = sorted(values.iter().map(|v| *v as i8));
        }
    }
    if let Some(values) = &rule.by_minute {
        let signed: Vec<i32> = values.iter().map(|v| *v as i32).collect();
        if check_range("byMinute", &signed, ctx) {
            out.byminute = sorted(values.iter().map(|v| *v as i8));
        }
    }
    if let Some(values) = &rule.by_second {
        let signed: Vec<i32> = values.iter().map(|v| *v as i32).collect();
        if check_range("bySecond", &signed, ctx) {
            out.bysecond = sorted(values.iter().map(|v| *v as i8));
        }
    }
    if let Some(values) = &rule.by_set_position {
        if check_range("bySetPosition", values, ctx) {
            out.bysetpos = sorted(values.iter().copied());
        }
    }

    let until = rule
        .until
        .as_deref()
        .and_then(parse_local_date_time_string)
        .map(|local| tz_datetime_to_utc(&local, start_tz));
    if rule.until.is_some() && rule.count.is_some() {
        ctx.invalid(Some("count"));
        out.until = until;
    } else {
        out.until = until;
        out.count = rule.count;
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_weekly_interval() {
        let ical = ICalRecurrenceRule {
            freq: "WEEKLY".to_string(),
            interval: Some(2),
            ..Default::default()
        };
        let json = from_ical(&ical, None);
        assert_eq!(json.frequency, "weekly");
        assert_eq!(json.interval, Some(2));

        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let back = to_ical(&json, None, &mut ctx).unwrap();
        assert!(!ctx.has_errors());
        assert_eq!(back.freq, "WEEKLY");
        assert_eq!(back.interval, Some(2));
    }

    #[test]
    fn rejects_out_of_range_byhour() {
        let rule = RecurrenceRule {
            frequency: "daily".to_string(),
            by_hour: Some(vec![5, 30]),
            ..Default::default()
        };
        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let out = to_ical(&rule, None, &mut ctx).unwrap();
        assert_eq!(out.byhour, Vec::<i8>::new());
        assert_eq!(ctx.into_invalid_props(), vec!["byHour/1".to_string()]);
    }

    #[test]
    fn by_hour_is_sorted_ascending_on_output() {
        let rule = RecurrenceRule {
            frequency: "daily".to_string(),
            by_hour: Some(vec![18, 3, 9]),
            ..Default::default()
        };
        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let out = to_ical(&rule, None, &mut ctx).unwrap();
        assert_eq!(out.byhour, vec![3, 9, 18]);

        let json = from_ical(&out, None);
        assert_eq!(json.by_hour, Some(vec![3, 9, 18]));
    }

    #[test]
    fn count_and_until_mutually_exclusive_favors_until() {
        let rule = RecurrenceRule {
            frequency: "daily".to_string(),
            count: Some(5),
            until: Some("2021-01-01T00:00:00".to_string()),
            ..Default::default()
        };
        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let out = to_ical(&rule, None, &mut ctx).unwrap();
        assert!(out.until.is_some());
        assert!(out.count.is_none());
        assert_eq!(ctx.into_invalid_props(), vec!["count".to_string()]);
    }

    #[test]
    fn until_is_floating_local_date_not_utc_in_json() {
        // A floating (no-TZID) master: UNTIL stays floating both ways,
        // never gaining a `Z` suffix in the JSCalendar representation.
        let rule = RecurrenceRule {
            frequency: "daily".to_string(),
            until: Some("2021-06-01T00:00:00".to_string()),
            ..Default::default()
        };
        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let ical_rule = to_ical(&rule, None, &mut ctx).unwrap();
        assert!(!ctx.has_errors());
        let until = ical_rule.until.unwrap();
        assert!(!until.is_utc);

        let json = from_ical(&ical_rule, None);
        assert_eq!(json.until.as_deref(), Some("2021-06-01T00:00:00"));
    }

    #[test]
    fn until_round_trips_through_start_timezone() {
        use crate::common::timezone::ChronoTzResolver;
        use crate::common::TzResolver;

        let start_tz = ChronoTzResolver.resolve("America/New_York");
        let rule = RecurrenceRule {
            frequency: "daily".to_string(),
            until: Some("2021-06-01T09:00:00".to_string()),
            ..Default::default()
        };
        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let ical_rule = to_ical(&rule, start_tz, &mut ctx).unwrap();
        let until = ical_rule.until.unwrap();
        assert!(until.is_utc);
        // America/New_York is UTC-4 in June (EDT).
        assert_eq!(until.hour, 13);

        let json = from_ical(&ical_rule, start_tz);
        assert_eq!(json.until.as_deref(), Some("2021-06-01T09:00:00"));
    }
}
