/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! ICAL→JSON pipeline (spec.md §4.10): walks a `VEVENT` and its
//! `RECURRENCE-ID` siblings into a single JSCalendar event, fields in a
//! fixed order so `recurrenceOverrides` — which must diff against a
//! complete master — runs last.

use crate::common::TzResolver;
use crate::icalendar::{ICalValue, ICalendarComponent};
use crate::jscalendar::context::{Context, Mode};
use crate::jscalendar::types::{Event, RelatedTo};
use crate::jscalendar::{alarms, links, locations, overrides, participants, recurrence, time};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

fn keywords_from_prop(value: &ICalValue) -> BTreeMap<String, bool> {
    let mut set = BTreeMap::new();
    match value {
        ICalValue::Text(s) => {
            set.insert(s.clone(), true);
        }
        ICalValue::List(items) => {
            for item in items {
                if let ICalValue::Text(s) = item {
                    set.insert(s.clone(), true);
                }
            }
        }
        _ => {}
    }
    set
}

fn related_to_from_vevent(vevent: &ICalendarComponent) -> Option<BTreeMap<String, RelatedTo>> {
    let mut related = BTreeMap::new();
    for prop in vevent.get_all("RELATED-TO") {
        let Some(uid) = prop.as_text() else { continue };
        let mut relation = BTreeMap::new();
        for rel in prop.param_values("RELTYPE") {
            relation.insert(rel.to_ascii_lowercase(), true);
        }
        if relation.is_empty() {
            relation.insert("parent".to_string(), true);
        }
        related.insert(uid.to_string(), RelatedTo { relation });
    }
    if related.is_empty() { None } else { Some(related) }
}

/// Builds every field of an event except `recurrenceOverrides`, which
/// only the top-level [`from_ical`] entry point computes (it needs the
/// master's `RECURRENCE-ID` siblings, which a bare `VEVENT` doesn't
/// carry a pointer to).
fn convert_fields<R: TzResolver>(vevent: &ICalendarComponent, resolver: &R, ctx: &mut Context) -> Event {
    let uid = vevent.get("UID").and_then(|p| p.as_text()).unwrap_or_default();
    let mut event = Event::new(uid);

    if ctx.wants("prodId") {
        event.prod_id = vevent.get("X-JMAP-PRODID").and_then(|p| p.as_text()).map(str::to_string);
    }
    if ctx.wants("created") {
        event.created = vevent.get("CREATED").and_then(|p| match &p.value {
            ICalValue::DateTime(dt) if dt.is_utc => Some(time::to_utc_date_time_string(dt)),
            _ => None,
        });
    }
    if ctx.wants("updated") {
        event.updated = vevent
            .get("DTSTAMP")
            .or_else(|| vevent.get("LAST-MODIFIED"))
            .and_then(|p| match &p.value {
                ICalValue::DateTime(dt) if dt.is_utc => Some(time::to_utc_date_time_string(dt)),
                _ => None,
            });
    }
    if ctx.wants("sequence") {
        event.sequence = vevent.get("SEQUENCE").and_then(|p| match p.value {
            ICalValue::Int(n) if n >= 0 => Some(n as u32),
            _ => None,
        });
    }
    if ctx.wants("priority") {
        event.priority = vevent.get("PRIORITY").and_then(|p| match p.value {
            ICalValue::Int(n) if (0..=9).contains(&n) => Some(n as u8),
            _ => None,
        });
    }
    if ctx.wants("title") {
        event.title = vevent.get("SUMMARY").and_then(|p| p.as_text()).map(str::to_string);
    }
    if ctx.wants("description") {
        event.description = vevent.get("DESCRIPTION").and_then(|p| p.as_text()).map(str::to_string);
        if event.description.is_some() {
            event.description_content_type = Some("text/plain".to_string());
        }
    }
    if ctx.wants("method") {
        event.method = vevent.get("X-JMAP-METHOD").and_then(|p| p.as_text()).map(str::to_string);
    }
    if ctx.wants("color") {
        event.color = vevent.get("COLOR").and_then(|p| p.as_text()).map(str::to_string);
    }
    if ctx.wants("status") {
        event.status = vevent.get("STATUS").and_then(|p| p.as_text()).and_then(|s| {
            match s.to_ascii_uppercase().as_str() {
                "CONFIRMED" => Some(crate::jscalendar::types::EventStatus::Confirmed),
                "CANCELLED" => Some(crate::jscalendar::types::EventStatus::Cancelled),
                "TENTATIVE" => Some(crate::jscalendar::types::EventStatus::Tentative),
                _ => None,
            }
        });
    }
    if ctx.wants("freeBusyStatus") {
        event.free_busy_status = vevent.get("TRANSP").and_then(|p| p.as_text()).map(|s| {
            if s.eq_ignore_ascii_case("TRANSPARENT") {
                crate::jscalendar::types::FreeBusyStatus::Free
            } else {
                crate::jscalendar::types::FreeBusyStatus::Busy
            }
        });
    }
    if ctx.wants("privacy") {
        event.privacy = vevent.get("CLASS").and_then(|p| p.as_text()).and_then(|s| {
            match s.to_ascii_uppercase().as_str() {
                "PUBLIC" => Some(crate::jscalendar::types::Privacy::Public),
                "PRIVATE" => Some(crate::jscalendar::types::Privacy::Private),
                "CONFIDENTIAL" => Some(crate::jscalendar::types::Privacy::Secret),
                _ => None,
            }
        });
    }

    // Resolved unconditionally (not gated by `ctx.wants`): both the
    // `recurrenceRule`'s `until` and the override/alarm codecs need the
    // master's start timezone regardless of which fields the caller asked
    // the event itself to carry.
    let start_tz = vevent.get("DTSTART").and_then(|p| time::resolve_property_tz(p, resolver));
    ctx.set_start_tz(start_tz);

    if ctx.wants("start") || ctx.wants("timeZone") || ctx.wants("duration") || ctx.wants("isAllDay") {
        if let Some(dtstart) = vevent.get("DTSTART") {
            if let ICalValue::DateTime(dt) = &dtstart.value {
                event.is_all_day = !dt.has_time;
                event.start = Some(time::to_local_date_time_string(dt));
                event.time_zone = start_tz.map(|tz| tz.name().to_string());
                let duration = time::duration_from_ical(vevent, resolver);
                event.duration = Some(duration.to_ical_string());
            }
        }
    }

    if ctx.wants("recurrenceRule") {
        event.recurrence_rule = vevent.get("RRULE").and_then(|p| match &p.value {
            ICalValue::RecurrenceRule(rule) => Some(recurrence::from_ical(rule, start_tz)),
            _ => None,
        });
    }

    if ctx.wants("keywords") {
        event.keywords = vevent.get("CATEGORIES").map(|p| keywords_from_prop(&p.value)).filter(|s| !s.is_empty());
    }
    if ctx.wants("relatedTo") {
        event.related_to = related_to_from_vevent(vevent);
    }
    if ctx.wants("links") {
        event.links = links::from_ical(vevent);
    }
    if ctx.wants("locations") || ctx.wants("virtualLocations") {
        let (locations, virtual_locations) = locations::from_ical(vevent, resolver, start_tz);
        event.locations = locations;
        event.virtual_locations = virtual_locations;
    }
    if ctx.wants("participants") || ctx.wants("replyTo") {
        let result = participants::from_ical(vevent, ctx);
        event.participants = result.participants;
        event.reply_to = result.reply_to;
    }
    if ctx.wants("useDefaultAlerts") {
        event.use_default_alerts = vevent
            .get("X-JMAP-USEDEFAULTALERTS")
            .and_then(|p| p.as_text())
            .is_some_and(|s| s.eq_ignore_ascii_case("TRUE"));
    }
    if ctx.wants("alerts") {
        event.alerts = alarms::from_ical(vevent, resolver);
    }
    if ctx.wants("locale") {
        event.locale = vevent.get("X-JMAP-LOCALE").and_then(|p| p.as_text()).map(str::to_string);
    }

    event
}

/// Top-level entry point: converts `master` plus its `RECURRENCE-ID`
/// siblings into one complete JSCalendar event.
pub fn from_ical<R: TzResolver>(
    master: &ICalendarComponent,
    siblings: &[&ICalendarComponent],
    resolver: &R,
    want_props: Option<HashSet<String>>,
) -> (Event, Context) {
    let mut ctx = Context::new(Mode::IcalToJson).with_want_props(want_props);
    let mut event = convert_fields(master, resolver, &mut ctx);

    if ctx.wants("recurrenceOverrides") {
        let master_json: Value = ctx.without_filter(|ctx| {
            serde_json::to_value(convert_fields(master, resolver, ctx)).unwrap_or(Value::Null)
        });
        let start_tz = ctx.start_tz();
        event.recurrence_overrides = overrides::overrides_from_ical(
            master,
            siblings,
            &master_json,
            start_tz,
            resolver,
            |sibling, ctx| convert_fields(sibling, resolver, ctx),
        );
    }

    (event, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::timezone::ChronoTzResolver;
    use crate::icalendar::{ComponentType, ICalDateTime, ICalendarProperty};

    #[test]
    fn converts_all_day_event() {
        let mut vevent = ICalendarComponent::new(ComponentType::VEvent);
        vevent.push(ICalendarProperty::text("UID", "u1"));
        vevent.push(ICalendarProperty::text("SUMMARY", "Holiday"));
        vevent.push(ICalendarProperty::date_time(
            "DTSTART",
            ICalDateTime::date(2020, 12, 25),
        ));
        vevent.push(ICalendarProperty::duration(
            "DURATION",
            crate::icalendar::ICalDuration::parse("P1D").unwrap(),
        ));

        let (event, ctx) = from_ical(&vevent, &[], &ChronoTzResolver, None);
        assert!(!ctx.has_errors());
        assert!(event.is_all_day);
        assert_eq!(event.start.as_deref(), Some("2020-12-25T00:00:00"));
        assert_eq!(event.time_zone, None);
        assert_eq!(event.duration.as_deref(), Some("P1D"));
    }
}
