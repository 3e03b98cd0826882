/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Line-unfolding tokenizer and tree builder for RFC 5545 content. Kept
//! minimal: this is the "assumed available" external collaborator from
//! spec.md §1, not the subject of the conversion semantics.

use super::types::*;

/// Un-folds CRLF/LF-terminated continuation lines (RFC 5545 §3.1: a line
/// starting with a space or tab is a continuation of the previous line).
pub fn unfold_lines(input: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in input.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if (raw.starts_with(' ') || raw.starts_with('\t')) && !lines.is_empty() {
            let last: &mut String = lines.last_mut().unwrap();
            last.push_str(&raw[1..]);
        } else if !raw.is_empty() {
            lines.push(raw.to_string());
        }
    }
    lines
}

struct ContentLine {
    name: String,
    params: Vec<Param>,
    value: String,
}

fn parse_content_line(line: &str) -> Option<ContentLine> {
    let sep = find_unquoted(line, b':')?;
    let (head, value) = (&line[..sep], &line[sep + 1..]);
    let mut parts = head.split(';');
    let name = parts.next()?.to_string();
    let mut params = Vec::new();
    for part in parts {
        let Some((pname, pvalue)) = part.split_once('=') else {
            continue;
        };
        let values: Vec<String> = split_unquoted(pvalue, b',')
            .into_iter()
            .map(|v| v.trim_matches('"').to_string())
            .collect();
        params.push(Param {
            name: pname.to_string(),
            values,
        });
    }
    Some(ContentLine {
        name,
        params,
        value: value.to_string(),
    })
}

fn find_unquoted(s: &str, needle: u8) -> Option<usize> {
    let mut in_quotes = false;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b if b == needle && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_unquoted(s: &str, needle: u8) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b if b == needle && !in_quotes => {
                out.push(s[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(s[start..].to_string());
    out
}

fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') | Some('N') => out.push('\n'),
                Some(',') => out.push(','),
                Some(';') => out.push(';'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parses a full `.ics` document into an [`ICalendar`] tree. Unknown
/// properties are kept as opaque `Text` values so writer round-trips can
/// still emit them; the JSCalendar import pipeline drops what it doesn't
/// recognize per spec.md §7.
pub fn parse(input: &str) -> Option<ICalendar> {
    let lines = unfold_lines(input);
    let mut stack: Vec<ICalendarComponent> = Vec::new();
    let mut root: Option<ICalendar> = None;

    for line in lines {
        let Some(cl) = parse_content_line(&line) else {
            continue;
        };
        if cl.name.eq_ignore_ascii_case("BEGIN") {
            let ctype = ComponentType::parse(&cl.value);
            let mut comp = ICalendarComponent::new(ctype);
            comp.raw_name = cl.value.to_ascii_uppercase();
            stack.push(comp);
        } else if cl.name.eq_ignore_ascii_case("END") {
            let Some(comp) = stack.pop() else { continue };
            if let Some(parent) = stack.last_mut() {
                parent.components.push(comp);
            } else {
                root.get_or_insert_with(ICalendar::default).components.push(comp);
            }
        } else {
            let value = decode_value(&cl.name, &cl.params, &cl.value);
            let prop = ICalendarProperty {
                name: cl.name.to_ascii_uppercase(),
                params: cl.params,
                value,
            };
            if let Some(comp) = stack.last_mut() {
                comp.push(prop);
            }
        }
    }

    root
}

fn is_value_param(params: &[Param], expected: &str) -> bool {
    params
        .iter()
        .any(|p| p.name.eq_ignore_ascii_case("VALUE") && p.values.first().is_some_and(|v| v.eq_ignore_ascii_case(expected)))
}

fn decode_value(name: &str, params: &[Param], raw: &str) -> ICalValue {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "DTSTART" | "DTEND" | "RECURRENCE-ID" | "CREATED" | "DTSTAMP" | "LAST-MODIFIED"
        | "ACKNOWLEDGED" => {
            if let Some(dt) = parse_date_time(raw) {
                ICalValue::DateTime(dt)
            } else {
                ICalValue::Text(raw.to_string())
            }
        }
        "RDATE" | "EXDATE" => {
            if is_value_param(params, "PERIOD") {
                ICalValue::List(raw.split(',').filter_map(parse_period).collect())
            } else {
                ICalValue::List(
                    raw.split(',')
                        .filter_map(parse_date_time)
                        .map(ICalValue::DateTime)
                        .collect(),
                )
            }
        }
        "DURATION" => ICalDuration::parse(raw)
            .map(ICalValue::Duration)
            .unwrap_or_else(|| ICalValue::Text(raw.to_string())),
        "RRULE" => parse_rrule(raw)
            .map(|r| ICalValue::RecurrenceRule(Box::new(r)))
            .unwrap_or_else(|| ICalValue::Text(raw.to_string())),
        "GEO" => {
            let mut it = raw.splitn(2, ';');
            match (it.next().and_then(|v| v.parse().ok()), it.next().and_then(|v| v.parse().ok())) {
                (Some(lat), Some(lon)) => ICalValue::Geo(lat, lon),
                _ => ICalValue::Text(raw.to_string()),
            }
        }
        "SEQUENCE" | "PRIORITY" | "PERCENT-COMPLETE" => raw
            .parse()
            .map(ICalValue::Int)
            .unwrap_or_else(|_| ICalValue::Text(raw.to_string())),
        "CATEGORIES" => ICalValue::List(
            split_unquoted(raw, b',')
                .into_iter()
                .map(|v| ICalValue::Text(unescape_text(&v)))
                .collect(),
        ),
        "URL" | "ATTACH" | "CONFERENCE" | "LINK" if raw.contains(':') || upper == "CONFERENCE" => {
            ICalValue::Uri(raw.to_string())
        }
        _ => ICalValue::Text(unescape_text(raw)),
    }
}

pub fn parse_date_time(raw: &str) -> Option<ICalDateTime> {
    let (raw, is_utc) = match raw.strip_suffix('Z') {
        Some(r) => (r, true),
        None => (raw, false),
    };
    let (date, time) = raw.split_once('T').unwrap_or((raw, ""));
    if date.len() != 8 {
        return None;
    }
    let year: i32 = date[0..4].parse().ok()?;
    let month: u8 = date[4..6].parse().ok()?;
    let day: u8 = date[6..8].parse().ok()?;
    if time.is_empty() {
        return Some(ICalDateTime::date(year, month, day));
    }
    if time.len() < 6 {
        return None;
    }
    let hour: u8 = time[0..2].parse().ok()?;
    let minute: u8 = time[2..4].parse().ok()?;
    let second: u8 = time[4..6].parse().ok()?;
    let mut dt = ICalDateTime::date_time(year, month, day, hour, minute, second);
    dt.is_utc = is_utc;
    Some(dt)
}

/// Parses one `PERIOD` value (RFC 5545 §3.3.9): `start/end` where `end`
/// is either an explicit duration already, or an explicit date-time
/// (converted to a duration relative to `start`, naively — `PERIOD`
/// values are always UTC or floating, never `TZID`-qualified, so no
/// timezone database lookup is needed here).
fn parse_period(raw: &str) -> Option<ICalValue> {
    let (start, end) = raw.split_once('/')?;
    let start = parse_date_time(start)?;
    if let Some(duration) = ICalDuration::parse(end) {
        return Some(ICalValue::Period(start, duration));
    }
    let end = parse_date_time(end)?;
    let start_naive = naive_datetime(&start)?;
    let end_naive = naive_datetime(&end)?;
    let duration = ICalDuration::from_seconds((end_naive - start_naive).num_seconds());
    Some(ICalValue::Period(start, duration))
}

fn naive_datetime(dt: &ICalDateTime) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDate::from_ymd_opt(dt.year, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)
}

fn parse_rrule(raw: &str) -> Option<ICalRecurrenceRule> {
    let mut rule = ICalRecurrenceRule::default();
    for part in raw.split(';') {
        let (key, value) = part.split_once('=')?;
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => rule.freq = value.to_ascii_uppercase(),
            "UNTIL" => rule.until = parse_date_time(value),
            "COUNT" => rule.count = value.parse().ok(),
            "INTERVAL" => rule.interval = value.parse().ok(),
            "BYSECOND" => rule.bysecond = value.split(',').filter_map(|v| v.parse().ok()).collect(),
            "BYMINUTE" => rule.byminute = value.split(',').filter_map(|v| v.parse().ok()).collect(),
            "BYHOUR" => rule.byhour = value.split(',').filter_map(|v| v.parse().ok()).collect(),
            "BYDAY" => {
                rule.byday = value
                    .split(',')
                    .filter_map(|v| parse_byday(v))
                    .collect();
            }
            "BYMONTHDAY" => {
                rule.bymonthday = value.split(',').filter_map(|v| v.parse().ok()).collect()
            }
            "BYYEARDAY" => {
                rule.byyearday = value.split(',').filter_map(|v| v.parse().ok()).collect()
            }
            "BYWEEKNO" => rule.byweekno = value.split(',').filter_map(|v| v.parse().ok()).collect(),
            "BYMONTH" => rule.bymonth = value.split(',').map(|v| v.to_string()).collect(),
            "BYSETPOS" => rule.bysetpos = value.split(',').filter_map(|v| v.parse().ok()).collect(),
            "WKST" => rule.wkst = Some(value.to_ascii_uppercase()),
            "RSCALE" => rule.rscale = Some(value.to_string()),
            "SKIP" => rule.skip = Some(value.to_ascii_uppercase()),
            _ => {}
        }
    }
    if rule.freq.is_empty() {
        None
    } else {
        Some(rule)
    }
}

fn parse_byday(v: &str) -> Option<ByDay> {
    let v = v.trim();
    let split_at = v
        .bytes()
        .position(|b| b.is_ascii_alphabetic())
        .unwrap_or(0);
    let (num, day) = v.split_at(split_at);
    let ordwk = if num.is_empty() { None } else { num.parse().ok() };
    if day.len() != 2 {
        return None;
    }
    Some(ByDay {
        weekday: day.to_ascii_uppercase(),
        ordwk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfolds_continuation_lines() {
        let input = "BEGIN:VEVENT\r\nSUMMARY:abc\r\n def\r\nEND:VEVENT\r\n";
        let lines = unfold_lines(input);
        assert_eq!(lines, vec!["BEGIN:VEVENT", "SUMMARY:abcdef", "END:VEVENT"]);
    }

    #[test]
    fn parses_simple_vevent() {
        let input = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:1\r\nDTSTART:20210101T100000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let cal = parse(input).unwrap();
        assert_eq!(cal.components.len(), 1);
        let vevent = &cal.components[0].components[0];
        assert_eq!(vevent.component_type, ComponentType::VEvent);
        assert!(vevent.get("UID").is_some());
    }
}
