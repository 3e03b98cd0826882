/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Override codec (spec.md §4.6): `RDATE`/`EXDATE`/exception-`VEVENT`
//! (keyed by `RECURRENCE-ID`) ↔ `recurrenceOverrides`.

use crate::common::{Tz, TzResolver};
use crate::icalendar::{ICalDuration, ICalValue, ICalendarComponent, ICalendarProperty};
use crate::jscalendar::context::Context;
use crate::jscalendar::patch;
use crate::jscalendar::time::{
    convert_datetime_to_tz, parse_local_date_time_string, resolve_property_tz, to_local_date_time_string,
};
use crate::jscalendar::types::{Event, OverrideEntry};
use serde_json::Value;
use std::collections::BTreeMap;

/// Keys silently dropped from a patch, per spec.md §3: these only make
/// sense on the master and must never vary per-occurrence.
const FORBIDDEN_PATCH_KEYS: &[&str] = &[
    "uid",
    "relatedTo",
    "prodId",
    "isAllDay",
    "recurrenceRule",
    "recurrenceOverrides",
    "replyTo",
    "participantId",
];

fn flatten_dates(prop: &ICalendarProperty) -> Vec<crate::icalendar::ICalDateTime> {
    match &prop.value {
        ICalValue::DateTime(dt) => vec![*dt],
        ICalValue::List(items) => items
            .iter()
            .filter_map(|v| match v {
                ICalValue::DateTime(dt) => Some(*dt),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Like [`flatten_dates`], but for `RDATE`, which may carry `PERIOD`
/// values (spec.md §4.6 step 1): each entry is the occurrence start plus
/// its duration, when the value was a `PERIOD` rather than a bare date.
fn flatten_rdates(prop: &ICalendarProperty) -> Vec<(crate::icalendar::ICalDateTime, Option<ICalDuration>)> {
    match &prop.value {
        ICalValue::DateTime(dt) => vec![(*dt, None)],
        ICalValue::Period(dt, duration) => vec![(*dt, Some(*duration))],
        ICalValue::List(items) => items
            .iter()
            .filter_map(|v| match v {
                ICalValue::DateTime(dt) => Some((*dt, None)),
                ICalValue::Period(dt, duration) => Some((*dt, Some(*duration))),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// ICAL→JSON direction. `siblings` are every other `VEVENT` in the
/// calendar that shares the master's `UID` and carries a
/// `RECURRENCE-ID`. `master_json` is the already-built, complete master
/// event (built with the field filter disabled, per spec.md §4.10) —
/// exceptions are diffed against it.
pub fn overrides_from_ical<R: TzResolver>(
    master: &ICalendarComponent,
    siblings: &[&ICalendarComponent],
    master_json: &Value,
    start_tz: Option<Tz>,
    resolver: &R,
    mut convert_exception: impl FnMut(&ICalendarComponent, &mut Context) -> Event,
) -> Option<BTreeMap<String, OverrideEntry>> {
    let mut overrides = BTreeMap::new();

    for prop in master.get_all("RDATE") {
        let tz = resolve_property_tz(prop, resolver);
        for (dt, duration) in flatten_rdates(prop) {
            let local = convert_datetime_to_tz(&dt, tz, start_tz).unwrap_or(dt);
            let key = to_local_date_time_string(&local);
            let entry = match duration {
                Some(duration) => {
                    let mut fields = BTreeMap::new();
                    fields.insert("duration".to_string(), Value::String(duration.to_ical_string()));
                    OverrideEntry::Patch(fields)
                }
                None => OverrideEntry::Patch(BTreeMap::new()),
            };
            overrides.entry(key).or_insert(entry);
        }
    }

    for prop in master.get_all("EXDATE") {
        let tz = resolve_property_tz(prop, resolver);
        for dt in flatten_dates(prop) {
            let local = convert_datetime_to_tz(&dt, tz, start_tz).unwrap_or(dt);
            let key = to_local_date_time_string(&local);
            overrides.insert(key, OverrideEntry::Exclusion { excluded: true });
        }
    }

    for sibling in siblings {
        let Some(rid_prop) = sibling.get("RECURRENCE-ID") else { continue };
        let ICalValue::DateTime(rid_dt) = &rid_prop.value else { continue };
        let key = to_local_date_time_string(rid_dt);

        let mut ctx = Context::new(crate::jscalendar::context::Mode::IcalToJson);
        let previous_mode = ctx.enter_exception_mode();
        let mut exception = convert_exception(sibling, &mut ctx);
        ctx.restore_mode(previous_mode);

        exception.created = None;
        exception.updated = None;
        if exception.start.as_deref() == Some(key.as_str()) {
            exception.start = None;
        }

        let exception_json = serde_json::to_value(&exception).unwrap_or(Value::Null);
        let mut patch_map = patch::diff(master_json, &exception_json);
        for forbidden in FORBIDDEN_PATCH_KEYS.iter().copied() {
            patch_map.remove(&patch::pointer(&[forbidden]));
        }
        overrides.insert(key, OverrideEntry::Patch(patch_map.into_iter().collect()));
    }

    if overrides.is_empty() { None } else { Some(overrides) }
}

/// The extra master-level properties (`RDATE`/`EXDATE`) and the
/// constructed exception `VEVENT`s produced by [`overrides_to_ical`].
pub struct OverridesToIcal {
    pub master_extra_props: Vec<ICalendarProperty>,
    pub exceptions: Vec<ICalendarComponent>,
}

/// JSON→ICAL direction. `master_json` is the "clean" master (without
/// `recurrenceRule`/`recurrenceOverrides`) that patches apply against.
/// `convert_exception` builds a bare `VEVENT` (no `RECURRENCE-ID`) from
/// the patched event, recursively, in exception mode.
pub fn overrides_to_ical(
    master_json: &Value,
    overrides: &BTreeMap<String, OverrideEntry>,
    ctx: &mut Context,
    mut convert_exception: impl FnMut(&Event, &mut Context) -> Option<ICalendarComponent>,
) -> OverridesToIcal {
    let mut rdates = Vec::new();
    let mut rdate_periods = Vec::new();
    let mut exdates = Vec::new();
    let mut exceptions = Vec::new();

    for (key, entry) in overrides {
        let Some(local) = parse_local_date_time_string(key) else {
            ctx.with_key("recurrenceOverrides", key, |ctx| ctx.invalid(None));
            continue;
        };

        if let Some(rdate_duration) = entry.rdate_duration() {
            match rdate_duration {
                None => rdates.push(local),
                Some(duration) => match ICalDuration::parse(&duration) {
                    Some(duration) => rdate_periods.push((local, duration)),
                    None => ctx.with_key("recurrenceOverrides", key, |ctx| ctx.invalid(Some("duration"))),
                },
            }
            continue;
        }

        match entry {
            OverrideEntry::Exclusion { excluded: true } => exdates.push(local),
            OverrideEntry::Exclusion { excluded: false } => {}
            OverrideEntry::Patch(fields) => {
                let mut patch_map = serde_json::Map::new();
                for (pointer, value) in fields {
                    let is_forbidden = FORBIDDEN_PATCH_KEYS
                        .iter()
                        .copied()
                        .any(|k| pointer == &patch::pointer(&[k]));
                    if is_forbidden {
                        continue;
                    }
                    patch_map.insert(pointer.clone(), value.clone());
                }
                if !patch_map.contains_key("/start") {
                    patch_map.insert("/start".to_string(), Value::String(key.clone()));
                }

                let patched = patch::apply(master_json, &patch_map);
                let Ok(exception_event) = serde_json::from_value::<Event>(patched) else {
                    ctx.with_key("recurrenceOverrides", key, |ctx| ctx.invalid(None));
                    continue;
                };

                let previous_mode = ctx.enter_exception_mode();
                let built = convert_exception(&exception_event, ctx);
                ctx.restore_mode(previous_mode);

                if let Some(mut vevent) = built {
                    vevent.push(ICalendarProperty::date_time("RECURRENCE-ID", local));
                    exceptions.push(vevent);
                }
            }
        }
    }

    let mut master_extra_props = Vec::new();
    if !rdates.is_empty() {
        master_extra_props.push(ICalendarProperty::new(
            "RDATE",
            ICalValue::List(rdates.into_iter().map(ICalValue::DateTime).collect()),
        ));
    }
    if !rdate_periods.is_empty() {
        // A separate `RDATE` line: `PERIOD`-valued occurrences can't share
        // a content line with plain date-times (one `VALUE=` per line).
        master_extra_props.push(ICalendarProperty::new(
            "RDATE",
            ICalValue::List(
                rdate_periods
                    .into_iter()
                    .map(|(start, duration)| ICalValue::Period(start, duration))
                    .collect(),
            ),
        ));
    }
    if !exdates.is_empty() {
        master_extra_props.push(ICalendarProperty::new(
            "EXDATE",
            ICalValue::List(exdates.into_iter().map(ICalValue::DateTime).collect()),
        ));
    }

    OverridesToIcal { master_extra_props, exceptions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icalendar::{ComponentType, ICalDateTime};
    use serde_json::json;

    #[test]
    fn exdate_becomes_exclusion_entry() {
        let mut master = ICalendarComponent::new(ComponentType::VEvent);
        master.push(ICalendarProperty::date_time(
            "EXDATE",
            ICalDateTime::date_time(2021, 3, 15, 9, 0, 0),
        ));
        let master_json = json!({"@type": "jsevent", "uid": "u1", "timeZone": null});
        let overrides = overrides_from_ical(
            &master,
            &[],
            &master_json,
            None,
            &crate::common::timezone::ChronoTzResolver,
            |_, _| Event::new("u1"),
        )
        .unwrap();
        assert_eq!(
            overrides.get("2021-03-15T09:00:00"),
            Some(&OverrideEntry::Exclusion { excluded: true })
        );
    }

    #[test]
    fn period_rdate_becomes_duration_patch() {
        let mut master = ICalendarComponent::new(ComponentType::VEvent);
        master.push(ICalendarProperty::new(
            "RDATE",
            ICalValue::Period(
                ICalDateTime::date_time(2021, 3, 15, 9, 0, 0),
                ICalDuration::parse("PT5H30M").unwrap(),
            ),
        ));
        let master_json = json!({"@type": "jsevent", "uid": "u1", "timeZone": null});
        let overrides = overrides_from_ical(
            &master,
            &[],
            &master_json,
            None,
            &crate::common::timezone::ChronoTzResolver,
            |_, _| Event::new("u1"),
        )
        .unwrap();
        let entry = overrides.get("2021-03-15T09:00:00").unwrap();
        match entry {
            OverrideEntry::Patch(fields) => {
                assert_eq!(fields.get("duration"), Some(&Value::String("PT5H30M".to_string())));
            }
            _ => panic!("expected a Patch entry"),
        }
    }

    #[test]
    fn duration_patch_becomes_period_rdate() {
        let master_json = json!({"@type": "jsevent", "uid": "u1", "timeZone": null});
        let mut overrides = BTreeMap::new();
        let mut fields = BTreeMap::new();
        fields.insert("duration".to_string(), Value::String("PT5H30M".to_string()));
        overrides.insert("2021-03-15T09:00:00".to_string(), OverrideEntry::Patch(fields));

        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let result = overrides_to_ical(&master_json, &overrides, &mut ctx, |_, _| {
            panic!("a PERIOD RDATE must not produce an exception VEVENT")
        });
        assert!(result.exceptions.is_empty());
        assert_eq!(result.master_extra_props.len(), 1);
        let prop = &result.master_extra_props[0];
        assert_eq!(prop.name, "RDATE");
        match &prop.value {
            ICalValue::List(items) => match &items[0] {
                ICalValue::Period(start, duration) => {
                    assert_eq!(start.hour, 9);
                    assert_eq!(duration.to_ical_string(), "PT5H30M");
                }
                _ => panic!("expected a Period value"),
            },
            _ => panic!("expected a List value"),
        }
    }

    #[test]
    fn patch_only_contains_changed_title() {
        let master_json = json!({
            "@type": "jsevent",
            "uid": "u1",
            "timeZone": null,
            "title": "Weekly sync",
        });
        let mut overrides = BTreeMap::new();
        let mut fields = BTreeMap::new();
        fields.insert("/title".to_string(), json!("Weekly sync — cancelled"));
        overrides.insert("2021-03-15T09:00:00".to_string(), OverrideEntry::Patch(fields));

        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let result = overrides_to_ical(&master_json, &overrides, &mut ctx, |event, _ctx| {
            assert_eq!(event.title.as_deref(), Some("Weekly sync — cancelled"));
            let mut vevent = ICalendarComponent::new(ComponentType::VEvent);
            vevent.push(ICalendarProperty::text("SUMMARY", event.title.clone().unwrap()));
            Some(vevent)
        });
        assert_eq!(result.exceptions.len(), 1);
        assert!(result.exceptions[0].get("RECURRENCE-ID").is_some());
    }
}
