/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Serializes an [`ICalendar`] tree back to RFC 5545 text, with CRLF line
//! endings and 75-octet folding.

use super::types::*;
use std::fmt::Write as _;

const FOLD_WIDTH: usize = 75;

pub fn write(cal: &ICalendar) -> String {
    let mut out = String::new();
    for comp in &cal.components {
        write_component(&mut out, comp);
    }
    out
}

fn write_component(out: &mut String, comp: &ICalendarComponent) {
    fold_line(out, &format!("BEGIN:{}", comp.raw_name));
    for prop in &comp.properties {
        write_property(out, prop);
    }
    for child in &comp.components {
        write_component(out, child);
    }
    fold_line(out, &format!("END:{}", comp.raw_name));
}

fn write_property(out: &mut String, prop: &ICalendarProperty) {
    fold_line(out, &property_to_string(prop));
}

/// Renders a single property as an unfolded content line. Used both by
/// the writer and as the canonical serialization fed to [`JmapId::derive`]
/// when a property carries no `X-JMAP-ID` (spec.md §4.4).
///
/// [`JmapId::derive`]: crate::common::JmapId::derive
pub fn property_to_string(prop: &ICalendarProperty) -> String {
    let mut line = prop.name.clone();
    if needs_value_date(&prop.value) && prop.param("VALUE").is_none() {
        let _ = write!(line, ";VALUE=DATE");
    } else if needs_value_period(&prop.value) && prop.param("VALUE").is_none() {
        let _ = write!(line, ";VALUE=PERIOD");
    }
    for param in &prop.params {
        let _ = write!(line, ";{}={}", param.name, param.values.join(","));
    }
    line.push(':');
    line.push_str(&encode_value(&prop.value));
    line
}

/// `DATE`-valued date-time properties (e.g. an all-day `DTSTART`) need an
/// explicit `VALUE=DATE` parameter — otherwise a reader would default to
/// `DATE-TIME` per RFC 5545 §3.3.5.
fn needs_value_date(value: &ICalValue) -> bool {
    match value {
        ICalValue::DateTime(dt) => !dt.has_time,
        ICalValue::List(items) => !items.is_empty()
            && items
                .iter()
                .all(|v| matches!(v, ICalValue::DateTime(dt) if !dt.has_time)),
        _ => false,
    }
}

/// A `PERIOD`-valued `RDATE` (spec.md §4.6 step 1: a `PERIOD` RDATE maps
/// to `{duration: <iso>}` on the JSCalendar side) needs an explicit
/// `VALUE=PERIOD` parameter, same rationale as [`needs_value_date`].
fn needs_value_period(value: &ICalValue) -> bool {
    match value {
        ICalValue::Period(..) => true,
        ICalValue::List(items) => !items.is_empty() && items.iter().all(|v| matches!(v, ICalValue::Period(..))),
        _ => false,
    }
}

fn fold_line(out: &mut String, line: &str) {
    if line.len() <= FOLD_WIDTH {
        out.push_str(line);
        out.push_str("\r\n");
        return;
    }
    let bytes = line.as_bytes();
    let mut start = 0;
    let mut first = true;
    while start < bytes.len() {
        let width = if first { FOLD_WIDTH } else { FOLD_WIDTH - 1 };
        let mut end = (start + width).min(bytes.len());
        while end > start && !line.is_char_boundary(end) {
            end -= 1;
        }
        if !first {
            out.push(' ');
        }
        out.push_str(&line[start..end]);
        out.push_str("\r\n");
        start = end;
        first = false;
    }
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

fn encode_value(value: &ICalValue) -> String {
    match value {
        ICalValue::Text(s) => escape_text(s),
        ICalValue::Uri(s) => s.clone(),
        ICalValue::Int(n) => n.to_string(),
        ICalValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        ICalValue::Geo(lat, lon) => format!("{lat};{lon}"),
        ICalValue::DateTime(dt) => encode_date_time(dt),
        ICalValue::Duration(d) => d.to_ical_string(),
        ICalValue::Period(start, duration) => format!("{}/{}", encode_date_time(start), duration.to_ical_string()),
        ICalValue::RecurrenceRule(r) => encode_rrule(r),
        ICalValue::List(values) => values
            .iter()
            .map(encode_value)
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn encode_date_time(dt: &ICalDateTime) -> String {
    if !dt.has_time {
        format!("{:04}{:02}{:02}", dt.year, dt.month, dt.day)
    } else {
        format!(
            "{:04}{:02}{:02}T{:02}{:02}{:02}{}",
            dt.year,
            dt.month,
            dt.day,
            dt.hour,
            dt.minute,
            dt.second,
            if dt.is_utc { "Z" } else { "" }
        )
    }
}

fn encode_rrule(r: &ICalRecurrenceRule) -> String {
    let mut parts = Vec::new();
    if let Some(rscale) = &r.rscale {
        parts.push(format!("RSCALE={rscale}"));
    }
    parts.push(format!("FREQ={}", r.freq));
    if let Some(until) = &r.until {
        parts.push(format!("UNTIL={}", encode_date_time(until)));
    }
    if let Some(count) = r.count {
        parts.push(format!("COUNT={count}"));
    }
    if let Some(interval) = r.interval {
        if interval != 1 {
            parts.push(format!("INTERVAL={interval}"));
        }
    }
    if !r.bysecond.is_empty() {
        parts.push(format!("BYSECOND={}", sorted_join(&r.bysecond)));
    }
    if !r.byminute.is_empty() {
        parts.push(format!("BYMINUTE={}", sorted_join(&r.byminute)));
    }
    if !r.byhour.is_empty() {
        parts.push(format!("BYHOUR={}", sorted_join(&r.byhour)));
    }
    if !r.byday.is_empty() {
        let s = r
            .byday
            .iter()
            .map(|d| match d.ordwk {
                Some(n) => format!("{n}{}", d.weekday),
                None => d.weekday.clone(),
            })
            .collect::<Vec<_>>()
            .join(",");
        parts.push(format!("BYDAY={s}"));
    }
    if !r.bymonthday.is_empty() {
        parts.push(format!("BYMONTHDAY={}", sorted_join(&r.bymonthday)));
    }
    if !r.byyearday.is_empty() {
        parts.push(format!("BYYEARDAY={}", sorted_join(&r.byyearday)));
    }
    if !r.byweekno.is_empty() {
        parts.push(format!("BYWEEKNO={}", sorted_join(&r.byweekno)));
    }
    if !r.bymonth.is_empty() {
        parts.push(format!("BYMONTH={}", r.bymonth.join(",")));
    }
    if !r.bysetpos.is_empty() {
        parts.push(format!("BYSETPOS={}", sorted_join(&r.bysetpos)));
    }
    if let Some(wkst) = &r.wkst {
        if wkst != "MO" {
            parts.push(format!("WKST={wkst}"));
        }
    }
    if let Some(skip) = &r.skip {
        parts.push(format!("SKIP={skip}"));
    }
    parts.join(";")
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Per spec.md §4.5, `byDate`/`byYearDay`/`byWeekNo`/`byHour`/`byMinute`/
/// `bySecond`/`bySetPosition` are "sorted ascending on output" — enforced
/// here too, not just by the producing codec, so the written RRULE text
/// is sorted regardless of the order the caller built the rule in.
fn sorted_join<T: ToString + Ord + Clone>(values: &[T]) -> String {
    let mut sorted = values.to_vec();
    sorted.sort();
    join(&sorted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_simple_vevent() {
        let input = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:1\r\nDTSTART:20210101T100000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let cal = super::super::parser::parse(input).unwrap();
        let out = write(&cal);
        assert!(out.contains("UID:1"));
        assert!(out.contains("DTSTART:20210101T100000Z"));
    }
}
