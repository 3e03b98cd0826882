/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! JSON→ICAL pipeline: assembles a complete `VEVENT` (master plus any
//! `RECURRENCE-ID` exception siblings) from a JSCalendar event, field by
//! field, deferring to each codec module for its slice of the tree.

use crate::common::{Tz, TzResolver};
use crate::icalendar::{ComponentType, ICalDateTime, ICalValue, ICalendarComponent, ICalendarProperty};
use crate::jscalendar::context::Context;
use crate::jscalendar::types::Event;
use crate::jscalendar::{alarms, links, locations, overrides, participants, recurrence, time};
use std::collections::HashSet;

/// Attaches the governing timezone to a `DTSTART`/`DTEND`-shaped property:
/// a trailing `Z` for UTC, a `TZID` parameter for a named zone, nothing
/// for a floating or all-day value.
fn dt_prop(name: &str, mut dt: ICalDateTime, tz: Option<Tz>) -> ICalendarProperty {
    let mut tzid_param = None;
    if dt.has_time {
        match tz {
            Some(Tz::Utc) => dt.is_utc = true,
            Some(Tz::Named(zone)) => tzid_param = Some(zone.name().to_string()),
            None => {}
        }
    }
    let prop = ICalendarProperty::date_time(name, dt);
    match tzid_param {
        Some(tzid) => prop.with_param("TZID", tzid),
        None => prop,
    }
}

fn free_busy_to_transp(status: crate::jscalendar::types::FreeBusyStatus) -> &'static str {
    use crate::jscalendar::types::FreeBusyStatus;
    match status {
        FreeBusyStatus::Free => "TRANSPARENT",
        FreeBusyStatus::Busy => "OPAQUE",
    }
}

fn privacy_to_class(privacy: crate::jscalendar::types::Privacy) -> &'static str {
    use crate::jscalendar::types::Privacy;
    match privacy {
        Privacy::Public => "PUBLIC",
        Privacy::Private => "PRIVATE",
        Privacy::Secret => "CONFIDENTIAL",
    }
}

fn status_to_str(status: crate::jscalendar::types::EventStatus) -> &'static str {
    use crate::jscalendar::types::EventStatus;
    match status {
        EventStatus::Confirmed => "CONFIRMED",
        EventStatus::Cancelled => "CANCELLED",
        EventStatus::Tentative => "TENTATIVE",
    }
}

/// Builds one `VEVENT` from `event`, without touching `recurrenceRule` or
/// `recurrenceOverrides` — those are the top-level [`to_ical`]'s job,
/// since only it has the master/exception relationship in view. Used
/// directly for the master and, recursively in exception mode, for each
/// override patch (see [`overrides::overrides_to_ical`]).
pub fn build_vevent<R: TzResolver>(
    event: &Event,
    resolver: &R,
    user_mailto: Option<&str>,
    ctx: &mut Context,
) -> Option<ICalendarComponent> {
    let mut vevent = ICalendarComponent::new(ComponentType::VEvent);

    if event.uid.is_empty() {
        ctx.invalid(Some("uid"));
        return None;
    }
    vevent.push(ICalendarProperty::text("UID", event.uid.clone()));

    if let Some(prod_id) = &event.prod_id {
        vevent.push(ICalendarProperty::text("X-JMAP-PRODID", prod_id.clone()));
    }
    if let Some(created) = &event.created {
        if let Some(dt) = time::parse_utc_date_time_string(created) {
            vevent.push(ICalendarProperty::date_time("CREATED", dt));
        } else {
            ctx.invalid(Some("created"));
        }
    }
    if let Some(updated) = &event.updated {
        if let Some(dt) = time::parse_utc_date_time_string(updated) {
            vevent.push(ICalendarProperty::date_time("DTSTAMP", dt));
        } else {
            ctx.invalid(Some("updated"));
        }
    }
    if let Some(sequence) = event.sequence {
        vevent.push(ICalendarProperty::int("SEQUENCE", sequence as i64));
    }
    if let Some(priority) = event.priority {
        vevent.push(ICalendarProperty::int("PRIORITY", priority as i64));
    }
    if let Some(title) = &event.title {
        vevent.push(ICalendarProperty::text("SUMMARY", title.clone()));
    }
    if let Some(description) = &event.description {
        vevent.push(ICalendarProperty::text("DESCRIPTION", description.clone()));
    }
    if let Some(method) = &event.method {
        vevent.push(ICalendarProperty::text("X-JMAP-METHOD", method.clone()));
    }
    if let Some(color) = &event.color {
        vevent.push(ICalendarProperty::text("COLOR", color.clone()));
    }
    if let Some(status) = event.status {
        vevent.push(ICalendarProperty::text("STATUS", status_to_str(status)));
    }
    if let Some(free_busy) = event.free_busy_status {
        vevent.push(ICalendarProperty::text(
            "TRANSP",
            free_busy_to_transp(free_busy),
        ));
    }
    if let Some(privacy) = event.privacy {
        vevent.push(ICalendarProperty::text("CLASS", privacy_to_class(privacy)));
    }

    let plan = time::resolve_start_end(event, resolver, ctx)?;
    vevent.push(dt_prop("DTSTART", plan.start, plan.start_tz));
    if let Some(end) = plan.end {
        let mut end_prop = dt_prop("DTEND", end, plan.end_tz);
        if let Some(id) = &plan.end_location_id {
            end_prop = end_prop.jmap_id(id);
        }
        vevent.push(end_prop);
    } else if let Some(duration) = plan.duration {
        vevent.push(ICalendarProperty::duration("DURATION", duration));
    }
    ctx.set_start_tz(plan.start_tz);
    ctx.set_end_tz(plan.end_tz);

    if let Some(keywords) = &event.keywords {
        for keyword in keywords.keys() {
            vevent.push(ICalendarProperty::text("CATEGORIES", keyword.clone()));
        }
    }
    if let Some(related_to) = &event.related_to {
        for (uid, relation) in related_to {
            let mut prop = ICalendarProperty::text("RELATED-TO", uid.clone());
            for rel in relation.relation.keys() {
                prop = prop.with_param("RELTYPE", rel.to_ascii_uppercase());
            }
            vevent.push(prop);
        }
    }

    for prop in links::to_ical(event.links.as_ref(), ctx) {
        vevent.push(prop);
    }

    let known_link_ids: HashSet<String> = event
        .links
        .as_ref()
        .map(|links| links.keys().cloned().collect())
        .unwrap_or_default();
    for prop in locations::to_ical(
        event.locations.as_ref(),
        event.virtual_locations.as_ref(),
        &known_link_ids,
        resolver,
        ctx,
    ) {
        vevent.push(prop);
    }

    if let Some(result) = participants::to_ical(event.participants.as_ref(), event.reply_to.as_ref(), ctx) {
        if let Some(organizer) = result.organizer {
            vevent.push(organizer);
        }
        for attendee in result.attendees {
            vevent.push(attendee);
        }
    }

    if event.use_default_alerts {
        vevent.push(ICalendarProperty::text("X-JMAP-USEDEFAULTALERTS", "TRUE"));
    }
    for alarm in alarms::to_ical(
        event.alerts.as_ref(),
        event.title.as_deref(),
        event.description.as_deref(),
        user_mailto,
    ) {
        vevent.components.push(alarm);
    }

    if let Some(locale) = &event.locale {
        vevent.push(ICalendarProperty::text("X-JMAP-LOCALE", locale.clone()));
    }

    Some(vevent)
}

/// Top-level entry point: builds the master `VEVENT` plus, if
/// `recurrenceRule`/`recurrenceOverrides` are present, its `RRULE` and
/// its `RECURRENCE-ID` exception siblings.
pub fn to_ical<R: TzResolver>(
    event: &Event,
    resolver: &R,
    user_mailto: Option<&str>,
    ctx: &mut Context,
) -> Option<Vec<ICalendarComponent>> {
    let mut master = build_vevent(event, resolver, user_mailto, ctx)?;

    if let Some(rule) = &event.recurrence_rule {
        if let Some(ical_rule) = recurrence::to_ical(rule, ctx.start_tz(), ctx) {
            master.push(ICalendarProperty::new(
                "RRULE",
                ICalValue::RecurrenceRule(Box::new(ical_rule)),
            ));
        }
    }

    let mut exceptions = Vec::new();
    if let Some(override_entries) = &event.recurrence_overrides {
        if !ctx.is_exception() {
            let mut clean_master = event.clone();
            clean_master.recurrence_rule = None;
            clean_master.recurrence_overrides = None;
            let master_json = serde_json::to_value(&clean_master).unwrap_or(serde_json::Value::Null);

            let result = overrides::overrides_to_ical(&master_json, override_entries, ctx, |exception_event, ctx| {
                build_vevent(exception_event, resolver, user_mailto, ctx)
            });
            for prop in result.master_extra_props {
                master.push(prop);
            }
            exceptions = result.exceptions;
        }
    }

    let mut out = Vec::with_capacity(1 + exceptions.len());
    out.push(master);
    out.extend(exceptions);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::timezone::ChronoTzResolver;
    use crate::jscalendar::context::Mode;

    #[test]
    fn builds_all_day_event_with_value_date() {
        let mut event = Event::new("u1");
        event.start = Some("2020-12-25T00:00:00".to_string());
        event.is_all_day = true;
        event.duration = Some("P1D".to_string());

        let mut ctx = Context::new(Mode::JsonToIcal);
        let components = to_ical(&event, &ChronoTzResolver, None, &mut ctx).unwrap();
        assert!(!ctx.has_errors());
        assert_eq!(components.len(), 1);
        let dtstart = components[0].get("DTSTART").unwrap();
        match &dtstart.value {
            ICalValue::DateTime(dt) => assert!(!dt.has_time),
            _ => panic!("expected date-time value"),
        }
        assert!(components[0].get("DTEND").is_none());
        assert!(components[0].get("DURATION").is_some());
    }

    #[test]
    fn missing_uid_is_flagged() {
        let mut event = Event::new("");
        event.start = Some("2020-12-25T00:00:00".to_string());
        event.is_all_day = true;
        event.duration = Some("P1D".to_string());

        let mut ctx = Context::new(Mode::JsonToIcal);
        let components = to_ical(&event, &ChronoTzResolver, None, &mut ctx);
        assert!(components.is_none());
        assert!(ctx.has_errors());
    }
}
