/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! The iCalendar (RFC 5545) component/property/parameter tree. This is the
//! "low-level iCalendar tokenizer/emitter" spec.md §1 assumes is already
//! available; it is kept deliberately thin (only the components,
//! properties and value shapes the conversion core touches) since it is
//! not the subject of this crate, just a collaborator it ships bundled.

use std::fmt;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ICalendar {
    pub components: Vec<ICalendarComponent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    VCalendar,
    VEvent,
    VAlarm,
    Other,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::VCalendar => "VCALENDAR",
            ComponentType::VEvent => "VEVENT",
            ComponentType::VAlarm => "VALARM",
            ComponentType::Other => "VOTHER",
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "VCALENDAR" => ComponentType::VCalendar,
            "VEVENT" => ComponentType::VEvent,
            "VALARM" => ComponentType::VAlarm,
            _ => ComponentType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ICalendarComponent {
    pub component_type: ComponentType,
    /// Preserved verbatim for `ComponentType::Other`, so unrecognized
    /// sub-components round-trip through the writer untouched.
    pub raw_name: String,
    pub properties: Vec<ICalendarProperty>,
    pub components: Vec<ICalendarComponent>,
}

impl ICalendarComponent {
    pub fn new(component_type: ComponentType) -> Self {
        Self {
            raw_name: component_type.as_str().to_string(),
            component_type,
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ICalendarProperty> {
        self.properties.iter().find(|p| p.name_eq(name))
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ICalendarProperty> {
        self.properties.iter().filter(move |p| p.name_eq(name))
    }

    pub fn remove(&mut self, name: &str) {
        self.properties.retain(|p| !p.name_eq(name));
    }

    pub fn push(&mut self, prop: ICalendarProperty) {
        self.properties.push(prop);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ICalendarProperty {
    pub name: String,
    pub params: Vec<Param>,
    pub value: ICalValue,
}

impl ICalendarProperty {
    pub fn new(name: impl Into<String>, value: ICalValue) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            value,
        }
    }

    pub fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(Param::new(name, value));
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.values.first().map(|s| s.as_str()).unwrap_or(""))
    }

    pub fn param_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.params
            .iter()
            .filter(move |p| p.name.eq_ignore_ascii_case(name))
            .flat_map(|p| p.values.iter().map(|s| s.as_str()))
    }

    pub fn jmap_id(&self) -> Option<JmapIdRef<'_>> {
        self.param("X-JMAP-ID").map(JmapIdRef)
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ICalValue::Text(s) | ICalValue::Uri(s) => Some(s),
            _ => None,
        }
    }
}

/// Wrapper purely so callers don't confuse a raw `X-JMAP-ID` string with
/// an unrelated `&str`.
pub struct JmapIdRef<'a>(pub &'a str);

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub values: Vec<String>,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ICalValue {
    Text(String),
    Uri(String),
    Int(i64),
    Bool(bool),
    /// `lat;lon` pair, as found in the `GEO` property.
    Geo(f64, f64),
    DateTime(ICalDateTime),
    Duration(ICalDuration),
    /// An RFC 5545 `PERIOD` value (`VALUE=PERIOD` `RDATE`s): a start plus
    /// its duration, e.g. `19970101T180000Z/PT5H30M`.
    Period(ICalDateTime, ICalDuration),
    RecurrenceRule(Box<ICalRecurrenceRule>),
    /// Comma-separated multi-value properties (CATEGORIES, RDATE, EXDATE
    /// with multiple values on one line) decoded to their parts.
    List(Vec<ICalValue>),
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A date or date-time value as it appears on the wire: always a calendar
/// date, optionally a time-of-day, optionally a trailing `Z` (UTC).
/// The governing timezone (from a `TZID` parameter) lives on the
/// property, not here — `TZID` is a parameter, not part of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ICalDateTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub has_time: bool,
    pub is_utc: bool,
}

impl ICalDateTime {
    pub fn date(year: i32, month: u8, day: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour: 0,
            minute: 0,
            second: 0,
            has_time: false,
            is_utc: false,
        }
    }

    pub fn date_time(year: i32, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            has_time: true,
            is_utc: false,
        }
    }

    pub fn utc(mut self) -> Self {
        self.is_utc = true;
        self
    }
}

/// A signed ISO-8601-ish duration, matching RFC 5545's `dur-value` grammar
/// (weeks XOR day/time components).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ICalDuration {
    pub negative: bool,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl ICalDuration {
    pub fn from_seconds(total: i64) -> Self {
        let negative = total < 0;
        let mut secs = total.unsigned_abs();
        let days = secs / 86400;
        secs %= 86400;
        let hours = secs / 3600;
        secs %= 3600;
        let minutes = secs / 60;
        secs %= 60;
        Self {
            negative,
            weeks: 0,
            days,
            hours,
            minutes,
            seconds: secs,
        }
    }

    pub fn total_seconds(&self) -> i64 {
        let total = self.weeks as i64 * 604800
            + self.days as i64 * 86400
            + self.hours as i64 * 3600
            + self.minutes as i64 * 60
            + self.seconds as i64;
        if self.negative {
            -total
        } else {
            total
        }
    }

    pub fn is_whole_days(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    pub fn parse(s: &str) -> Option<Self> {
        let mut chars = s.as_bytes();
        let mut negative = false;
        if chars.first() == Some(&b'+') {
            chars = &chars[1..];
        } else if chars.first() == Some(&b'-') {
            negative = true;
            chars = &chars[1..];
        }
        if chars.first() != Some(&b'P') {
            return None;
        }
        chars = &chars[1..];
        let s = std::str::from_utf8(chars).ok()?;
        let mut dur = Self {
            negative,
            ..Default::default()
        };
        if let Some(rest) = s.strip_suffix('W') {
            dur.weeks = rest.parse().ok()?;
            return Some(dur);
        }
        let (date_part, time_part) = s.split_once('T').unwrap_or((s, ""));
        let mut num = String::new();
        for c in date_part.chars() {
            if c.is_ascii_digit() {
                num.push(c);
            } else if c == 'D' {
                dur.days = num.parse().ok()?;
                num.clear();
            } else {
                return None;
            }
        }
        for c in time_part.chars() {
            if c.is_ascii_digit() {
                num.push(c);
            } else if c == 'H' {
                dur.hours = num.parse().ok()?;
                num.clear();
            } else if c == 'M' {
                dur.minutes = num.parse().ok()?;
                num.clear();
            } else if c == 'S' {
                dur.seconds = num.parse().ok()?;
                num.clear();
            } else {
                return None;
            }
        }
        Some(dur)
    }

    pub fn to_ical_string(&self) -> String {
        let mut s = String::new();
        if self.negative {
            s.push('-');
        }
        s.push('P');
        if self.weeks > 0 && self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == 0
        {
            s.push_str(&format!("{}W", self.weeks));
            return s;
        }
        if self.days > 0 {
            s.push_str(&format!("{}D", self.days));
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            s.push('T');
            if self.hours > 0 {
                s.push_str(&format!("{}H", self.hours));
            }
            if self.minutes > 0 {
                s.push_str(&format!("{}M", self.minutes));
            }
            if self.seconds > 0 {
                s.push_str(&format!("{}S", self.seconds));
            }
        }
        if s == "P" {
            s.push_str("T0S");
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ICalRecurrenceRule {
    pub freq: String,
    pub until: Option<ICalDateTime>,
    pub count: Option<u32>,
    pub interval: Option<u32>,
    pub bysecond: Vec<i8>,
    pub byminute: Vec<i8>,
    pub byhour: Vec<i8>,
    pub byday: Vec<ByDay>,
    pub bymonthday: Vec<i8>,
    pub byyearday: Vec<i16>,
    pub byweekno: Vec<i8>,
    pub bymonth: Vec<String>,
    pub bysetpos: Vec<i32>,
    pub wkst: Option<String>,
    pub rscale: Option<String>,
    pub skip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByDay {
    pub weekday: String,
    pub ordwk: Option<i32>,
}
