/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Alarm codec (spec.md §4.9): `VALARM` (+ its paired snooze) ↔ `alerts`.

use crate::common::{JmapId, Tz, TzResolver};
use crate::icalendar::writer::property_to_string;
use crate::icalendar::{ComponentType, ICalDuration, ICalValue, ICalendarComponent, ICalendarProperty};
use crate::jscalendar::time::{
    ical_datetime_to_utc, parse_utc_date_time_string, resolve_property_tz, to_utc_date_time_string,
};
use crate::jscalendar::types::{Alert, AlertAction, RelativeTo};
use ahash::AHashMap;
use std::collections::BTreeMap;

fn alarm_id(alarm: &ICalendarComponent) -> String {
    if let Some(uid) = alarm.get("UID").and_then(|p| p.as_text()) {
        return uid.to_string();
    }
    let seed = alarm
        .get("TRIGGER")
        .map(property_to_string)
        .unwrap_or_default();
    JmapId::derive(&seed).into_string()
}

fn compute_trigger(
    alarm: &ICalendarComponent,
    start_utc: Option<chrono::NaiveDateTime>,
    end_utc: Option<chrono::NaiveDateTime>,
) -> (Option<RelativeTo>, Option<String>) {
    let Some(trigger) = alarm.get("TRIGGER") else {
        return (None, None);
    };
    let related_end = trigger
        .param("RELATED")
        .is_some_and(|r| r.eq_ignore_ascii_case("END"));

    match &trigger.value {
        ICalValue::Duration(dur) => {
            let relative_to = match (dur.negative, related_end) {
                (true, false) => RelativeTo::BeforeStart,
                (false, false) => RelativeTo::AfterStart,
                (true, true) => RelativeTo::BeforeEnd,
                (false, true) => RelativeTo::AfterEnd,
            };
            let mut magnitude = *dur;
            magnitude.negative = false;
            (Some(relative_to), Some(magnitude.to_ical_string()))
        }
        ICalValue::DateTime(dt) => {
            let trigger_utc = ical_datetime_to_utc(dt, Some(Tz::Utc));
            let anchor = if related_end { end_utc } else { start_utc };
            let (Some(trigger_utc), Some(anchor)) = (trigger_utc, anchor) else {
                return (None, None);
            };
            let diff = (trigger_utc - anchor).num_seconds();
            let relative_to = match (diff < 0, related_end) {
                (true, false) => RelativeTo::BeforeStart,
                (false, false) => RelativeTo::AfterStart,
                (true, true) => RelativeTo::BeforeEnd,
                (false, true) => RelativeTo::AfterEnd,
            };
            (
                Some(relative_to),
                Some(ICalDuration::from_seconds(diff.abs()).to_ical_string()),
            )
        }
        _ => (None, None),
    }
}

pub fn from_ical<R: TzResolver>(vevent: &ICalendarComponent, resolver: &R) -> Option<BTreeMap<String, Alert>> {
    let start_utc = vevent.get("DTSTART").and_then(|p| match &p.value {
        ICalValue::DateTime(dt) => ical_datetime_to_utc(dt, resolve_property_tz(p, resolver)),
        _ => None,
    });
    let end_utc = vevent.get("DTEND").and_then(|p| match &p.value {
        ICalValue::DateTime(dt) => ical_datetime_to_utc(dt, resolve_property_tz(p, resolver)),
        _ => None,
    });

    let valarms: Vec<&ICalendarComponent> = vevent
        .components
        .iter()
        .filter(|c| c.component_type == ComponentType::VAlarm)
        .collect();

    let mut snoozes: AHashMap<String, &ICalendarComponent> = AHashMap::default();
    let mut primaries = Vec::new();
    for alarm in &valarms {
        let related = alarm.get("RELATED-TO");
        let is_snooze = related.is_some_and(|p| {
            p.param("RELTYPE").is_some_and(|r| r.eq_ignore_ascii_case("SNOOZE"))
        });
        if is_snooze {
            if let Some(target) = related.and_then(|p| p.as_text()) {
                snoozes.insert(target.to_string(), alarm);
            }
        } else {
            primaries.push(*alarm);
        }
    }

    let mut alerts = BTreeMap::new();
    for alarm in primaries {
        let action_str = alarm
            .get("ACTION")
            .and_then(|p| p.as_text())
            .unwrap_or("DISPLAY")
            .to_ascii_uppercase();
        if action_str == "NONE" {
            continue;
        }
        let action = if action_str == "EMAIL" { AlertAction::Email } else { AlertAction::Display };
        let id = alarm_id(alarm);
        let (relative_to, offset) = compute_trigger(alarm, start_utc, end_utc);
        let acknowledged = alarm.get("ACKNOWLEDGED").and_then(|p| match &p.value {
            ICalValue::DateTime(dt) if dt.is_utc => Some(to_utc_date_time_string(dt)),
            _ => None,
        });
        let snoozed = snoozes.get(&id).and_then(|snooze| snooze.get("TRIGGER")).and_then(|p| match &p.value {
            ICalValue::DateTime(dt) if dt.is_utc => Some(to_utc_date_time_string(dt)),
            _ => None,
        });

        alerts.insert(
            id,
            Alert {
                action,
                relative_to,
                offset,
                when: None,
                acknowledged,
                snoozed,
            },
        );
    }

    if alerts.is_empty() { None } else { Some(alerts) }
}

pub fn to_ical(
    alerts: Option<&BTreeMap<String, Alert>>,
    event_title: Option<&str>,
    event_description: Option<&str>,
    user_mailto: Option<&str>,
) -> Vec<ICalendarComponent> {
    let mut out = Vec::new();
    let Some(alerts) = alerts else { return out };

    for (id, alert) in alerts {
        let mut primary = ICalendarComponent::new(ComponentType::VAlarm);
        primary.push(ICalendarProperty::text("UID", id.clone()));
        let action_str = match alert.action {
            AlertAction::Display => "DISPLAY",
            AlertAction::Email => "EMAIL",
        };
        primary.push(ICalendarProperty::text("ACTION", action_str));

        let mut trigger_dur = alert
            .offset
            .as_deref()
            .and_then(ICalDuration::parse)
            .unwrap_or_default();
        let (related, negative) = match alert.relative_to {
            Some(RelativeTo::AfterStart) => ("START", false),
            Some(RelativeTo::BeforeEnd) => ("END", true),
            Some(RelativeTo::AfterEnd) => ("END", false),
            Some(RelativeTo::BeforeStart) | None => ("START", true),
        };
        trigger_dur.negative = negative;
        let mut trigger_prop = ICalendarProperty::duration("TRIGGER", trigger_dur);
        if related == "END" {
            trigger_prop = trigger_prop.with_param("RELATED", "END");
        }
        primary.push(trigger_prop);

        if let Some(ack) = &alert.acknowledged {
            if let Some(dt) = parse_utc_date_time_string(ack) {
                primary.push(ICalendarProperty::date_time("ACKNOWLEDGED", dt));
            }
        }

        if action_str == "EMAIL" {
            primary.push(ICalendarProperty::text(
                "SUMMARY",
                event_title.unwrap_or("Your event alert"),
            ));
            primary.push(ICalendarProperty::text("DESCRIPTION", event_description.unwrap_or("")));
            if let Some(mailto) = user_mailto {
                primary.push(ICalendarProperty::uri("ATTENDEE", mailto.to_string()));
            }
        }

        out.push(primary);

        if let Some(snoozed) = &alert.snoozed {
            if let Some(dt) = parse_utc_date_time_string(snoozed) {
                let mut snooze = ICalendarComponent::new(ComponentType::VAlarm);
                snooze.push(ICalendarProperty::text("ACTION", "DISPLAY"));
                snooze.push(ICalendarProperty::text("RELATED-TO", id.clone()).with_param("RELTYPE", "SNOOZE"));
                snooze.push(ICalendarProperty::date_time("TRIGGER", dt));
                out.push(snooze);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::timezone::ChronoTzResolver;
    use crate::icalendar::ICalDateTime;

    #[test]
    fn alert_with_snooze_round_trips_into_two_valarms() {
        let mut alerts = BTreeMap::new();
        alerts.insert(
            "a1".to_string(),
            Alert {
                action: AlertAction::Display,
                relative_to: Some(RelativeTo::BeforeStart),
                offset: Some("PT15M".to_string()),
                when: None,
                acknowledged: None,
                snoozed: Some("2021-01-01T10:00:00Z".to_string()),
            },
        );
        let valarms = to_ical(Some(&alerts), None, None, Some("mailto:user@example.com"));
        assert_eq!(valarms.len(), 2);
        let trigger = valarms[0].get("TRIGGER").unwrap();
        match &trigger.value {
            ICalValue::Duration(d) => {
                assert!(d.negative);
                assert_eq!(d.minutes, 15);
            }
            _ => panic!("expected duration trigger"),
        }
        let snooze_trigger = valarms[1].get("TRIGGER").unwrap();
        assert!(matches!(snooze_trigger.value, ICalValue::DateTime(_)));
    }

    #[test]
    fn action_none_is_dropped_on_read() {
        let mut vevent = ICalendarComponent::new(ComponentType::VEvent);
        vevent.push(ICalendarProperty::date_time(
            "DTSTART",
            ICalDateTime::date_time(2021, 1, 1, 9, 0, 0).utc(),
        ));
        let mut alarm = ICalendarComponent::new(ComponentType::VAlarm);
        alarm.push(ICalendarProperty::text("ACTION", "NONE"));
        vevent.components.push(alarm);
        let alerts = from_ical(&vevent, &ChronoTzResolver);
        assert!(alerts.is_none());
    }
}
