/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Time codec (spec.md §4.2) and start/end/duration resolution (§4.3).

use crate::common::{Tz, TzResolver};
use crate::icalendar::{ICalDateTime, ICalDuration, ICalValue, ICalendarComponent, ICalendarProperty};
use crate::jscalendar::context::Context;
use crate::jscalendar::types::Event;
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

pub fn to_local_date_time_string(dt: &ICalDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
    )
}

pub fn to_utc_date_time_string(dt: &ICalDateTime) -> String {
    format!("{}Z", to_local_date_time_string(dt))
}

pub fn parse_local_date_time_string(s: &str) -> Option<ICalDateTime> {
    let (date, time) = s.split_once('T')?;
    let mut parts = date.split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    let mut tparts = time.split(':');
    let hour: u8 = tparts.next()?.parse().ok()?;
    let minute: u8 = tparts.next()?.parse().ok()?;
    let second: u8 = tparts.next()?.parse().ok()?;
    Some(ICalDateTime::date_time(year, month, day, hour, minute, second))
}

pub fn parse_utc_date_time_string(s: &str) -> Option<ICalDateTime> {
    let s = s.strip_suffix('Z')?;
    parse_local_date_time_string(s).map(|dt| dt.utc())
}

/// Resolves the governing timezone of an iCalendar date-time property:
/// its `TZID` parameter if present and recognized, a recovered
/// global-TZID fallback (stripping a leading `/`), UTC if the value
/// carries a trailing `Z`, or floating if none of the above apply. No
/// error is recorded for an unresolved `TZID` — it is a guessed
/// fallback, per spec.md §4.2.
pub fn resolve_property_tz<R: TzResolver>(prop: &ICalendarProperty, resolver: &R) -> Option<Tz> {
    if let Some(tzid) = prop.param("TZID") {
        if let Some(tz) = resolver.resolve(tzid) {
            return Some(tz);
        }
        let stripped = tzid.trim_start_matches('/');
        if stripped != tzid {
            if let Some(tz) = resolver.resolve(stripped) {
                return Some(tz);
            }
        }
        return None;
    }
    match &prop.value {
        ICalValue::DateTime(dt) if dt.is_utc => Some(Tz::Utc),
        _ => None,
    }
}

fn to_naive_datetime(dt: &ICalDateTime) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(dt.year, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)
}

fn from_naive_datetime(dt: NaiveDateTime, has_time: bool, is_utc: bool) -> ICalDateTime {
    ICalDateTime {
        year: dt.year(),
        month: dt.month() as u8,
        day: dt.day() as u8,
        hour: dt.hour() as u8,
        minute: dt.minute() as u8,
        second: dt.second() as u8,
        has_time,
        is_utc,
    }
}

/// Resolves an iCalendar date-time value plus its governing timezone
/// down to a UTC instant. Used by the alarm codec to diff an absolute
/// `TRIGGER` against the event's start/end (spec.md §4.9).
pub fn ical_datetime_to_utc(dt: &ICalDateTime, tz: Option<Tz>) -> Option<NaiveDateTime> {
    to_utc_naive(dt, tz)
}

fn to_utc_naive(dt: &ICalDateTime, tz: Option<Tz>) -> Option<NaiveDateTime> {
    let naive = to_naive_datetime(dt)?;
    match tz {
        Some(tz) => tz
            .chrono_tz()
            .from_local_datetime(&naive)
            .earliest()
            .map(|d| d.naive_utc()),
        None => Some(naive),
    }
}

/// Converts a local date-time in `from_tz` to its local representation in
/// `to_tz`, preserving the underlying instant. Used by the override codec
/// to re-express an `EXDATE` in the master's start-timezone when it
/// arrives tagged with a different one (spec.md §4.6).
pub fn convert_datetime_to_tz(dt: &ICalDateTime, from_tz: Option<Tz>, to_tz: Option<Tz>) -> Option<ICalDateTime> {
    match (from_tz, to_tz) {
        (Some(from), Some(to)) if from != to => {
            let naive = to_naive_datetime(dt)?;
            let instant = from.chrono_tz().from_local_datetime(&naive).earliest()?;
            let local = instant.with_timezone(&to.chrono_tz()).naive_local();
            Some(from_naive_datetime(local, dt.has_time, false))
        }
        _ => Some(*dt),
    }
}

/// Re-expresses a UTC instant (e.g. an RRULE `UNTIL`) as a local
/// date-time in `tz` — used on the ICAL→JSON direction to turn a
/// `Z`-suffixed `UNTIL` into the floating `recurrenceRule.until` LocalDate
/// string spec.md §4.5 requires. `tz = None` (a floating master start)
/// leaves the wall-clock value as-is, since there is no zone to convert
/// through.
pub fn utc_to_tz_datetime(dt: &ICalDateTime, tz: Option<Tz>) -> ICalDateTime {
    match tz {
        Some(tz) => {
            let Some(naive) = to_naive_datetime(dt) else {
                return *dt;
            };
            let instant = chrono::Utc.from_utc_datetime(&naive);
            let local = instant.with_timezone(&tz.chrono_tz()).naive_local();
            from_naive_datetime(local, true, false)
        }
        None => ICalDateTime { is_utc: false, ..*dt },
    }
}

/// Inverse of [`utc_to_tz_datetime`]: turns a local date-time in `tz`
/// (the master's start timezone) into its UTC representation, for
/// emitting a spec-conformant `UNTIL` on the ICAL boundary. `tz = None`
/// (floating) leaves the value floating rather than forcing a `Z`.
pub fn tz_datetime_to_utc(dt: &ICalDateTime, tz: Option<Tz>) -> ICalDateTime {
    match tz {
        Some(tz) => match to_naive_datetime(dt).and_then(|naive| tz.chrono_tz().from_local_datetime(&naive).earliest()) {
            Some(instant) => from_naive_datetime(instant.naive_utc(), true, true),
            None => *dt,
        },
        None => ICalDateTime { is_utc: false, ..*dt },
    }
}

/// Converts a local instant in `start_tz` plus a duration into the local
/// representation of the resulting instant in `end_tz`.
fn convert_across_tz(start: &ICalDateTime, start_tz: Tz, duration: &ICalDuration, end_tz: Tz) -> Option<ICalDateTime> {
    let naive = to_naive_datetime(start)?;
    let start_instant = start_tz.chrono_tz().from_local_datetime(&naive).earliest()?;
    let end_instant = start_instant + chrono::Duration::seconds(duration.total_seconds());
    let end_local = end_instant.with_timezone(&end_tz.chrono_tz()).naive_local();
    Some(from_naive_datetime(end_local, true, false))
}

/// `duration_from_ical` (spec.md §4.3 reverse direction): `DTEND − DTSTART`
/// if `DTEND` is present, else the VEVENT's `DURATION`, else `PT0S`.
pub fn duration_from_ical<R: TzResolver>(vevent: &ICalendarComponent, resolver: &R) -> ICalDuration {
    if let (Some(start_prop), Some(end_prop)) = (vevent.get("DTSTART"), vevent.get("DTEND")) {
        if let (ICalValue::DateTime(s), ICalValue::DateTime(e)) = (&start_prop.value, &end_prop.value) {
            let start_tz = resolve_property_tz(start_prop, resolver);
            let end_tz = resolve_property_tz(end_prop, resolver);
            if let (Some(s_utc), Some(e_utc)) = (to_utc_naive(s, start_tz), to_utc_naive(e, end_tz)) {
                return ICalDuration::from_seconds((e_utc - s_utc).num_seconds());
            }
        }
    }
    if let Some(ICalValue::Duration(d)) = vevent.get("DURATION").map(|p| &p.value) {
        return *d;
    }
    ICalDuration::default()
}

/// The plan produced by [`resolve_start_end`]: what to emit as
/// `DTSTART`/`DTEND`/`DURATION` on the constructed `VEVENT`.
pub struct StartEndPlan {
    pub start: ICalDateTime,
    pub start_tz: Option<Tz>,
    pub end: Option<ICalDateTime>,
    pub end_tz: Option<Tz>,
    pub end_location_id: Option<String>,
    pub duration: Option<ICalDuration>,
}

/// Implements the five-step algorithm of spec.md §4.3 for the JSON→ICAL
/// direction. Returns `None` (after recording invalid-props on `ctx`) if
/// the event's time fields don't satisfy the invariants.
pub fn resolve_start_end<R: TzResolver>(
    event: &Event,
    resolver: &R,
    ctx: &mut Context,
) -> Option<StartEndPlan> {
    let Some(start_str) = event.start.as_deref() else {
        ctx.invalid(Some("start"));
        return None;
    };
    let Some(mut start_dt) = parse_local_date_time_string(start_str) else {
        ctx.invalid(Some("start"));
        return None;
    };

    let start_tz = match &event.time_zone {
        None => None,
        Some(tzid) => match resolver.resolve(tzid) {
            Some(tz) => Some(tz),
            None => {
                ctx.invalid(Some("timeZone"));
                None
            }
        },
    };

    let mut end_tz = None;
    let mut end_location_id = None;
    if let Some(locations) = &event.locations {
        for (id, loc) in locations {
            if loc.rel.as_deref() != Some("end") {
                continue;
            }
            if let Some(tzid) = &loc.time_zone {
                match resolver.resolve(tzid) {
                    Some(tz) => {
                        end_tz = Some(tz);
                        end_location_id = Some(id.clone());
                    }
                    None => ctx.with_key("locations", id, |ctx| ctx.invalid(Some("timeZone"))),
                }
                break;
            }
        }
    }

    if start_tz.is_none() != end_tz.is_none() {
        ctx.invalid(Some("timeZone"));
        return None;
    }

    let duration = event
        .duration
        .as_deref()
        .and_then(ICalDuration::parse)
        .unwrap_or_default();

    if event.is_all_day {
        if start_tz.is_some() || end_tz.is_some() {
            ctx.invalid(Some("timeZone"));
            return None;
        }
        if !duration.is_whole_days() {
            ctx.invalid(Some("duration"));
            return None;
        }
        start_dt.has_time = false;
    }

    let end = match (start_tz, end_tz) {
        (Some(s_tz), Some(e_tz)) if s_tz != e_tz => convert_across_tz(&start_dt, s_tz, &duration, e_tz),
        _ => None,
    };

    let duration_field = if end.is_none() { Some(duration) } else { None };

    Some(StartEndPlan {
        start: start_dt,
        start_tz,
        end,
        end_tz,
        end_location_id,
        duration: duration_field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::timezone::ChronoTzResolver;

    #[test]
    fn local_string_round_trips() {
        let dt = ICalDateTime::date_time(2021, 3, 15, 9, 0, 0);
        let s = to_local_date_time_string(&dt);
        assert_eq!(s, "2021-03-15T09:00:00");
        assert_eq!(parse_local_date_time_string(&s), Some(dt));
    }

    #[test]
    fn utc_string_has_trailing_z() {
        let dt = ICalDateTime::date_time(2021, 1, 1, 10, 0, 0).utc();
        assert_eq!(to_utc_date_time_string(&dt), "2021-01-01T10:00:00Z");
        assert_eq!(parse_utc_date_time_string("2021-01-01T10:00:00Z"), Some(dt));
    }

    #[test]
    fn duration_from_dtend_minus_dtstart() {
        let mut vevent = ICalendarComponent::new(crate::icalendar::ComponentType::VEvent);
        vevent.push(ICalendarProperty::date_time(
            "DTSTART",
            ICalDateTime::date_time(2021, 1, 1, 9, 0, 0).utc(),
        ));
        vevent.push(ICalendarProperty::date_time(
            "DTEND",
            ICalDateTime::date_time(2021, 1, 1, 10, 30, 0).utc(),
        ));
        let dur = duration_from_ical(&vevent, &ChronoTzResolver);
        assert_eq!(dur.total_seconds(), 90 * 60);
    }

    #[test]
    fn all_day_resolution_requires_floating_and_whole_days() {
        let mut event = Event::new("u1");
        event.start = Some("2020-12-25T00:00:00".to_string());
        event.is_all_day = true;
        event.duration = Some("P1D".to_string());
        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let plan = resolve_start_end(&event, &ChronoTzResolver, &mut ctx).unwrap();
        assert!(!ctx.has_errors());
        assert!(!plan.start.has_time);
        assert!(plan.start_tz.is_none());
    }
}
