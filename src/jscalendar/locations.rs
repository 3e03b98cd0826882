/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Location codec (spec.md §4.7): `LOCATION`/`GEO`/`X-APPLE-STRUCTURED-LOCATION`/
//! `X-JMAP-LOCATION`/`CONFERENCE` ↔ `locations`/`virtualLocations`.

use crate::common::{JmapId, Tz, TzResolver};
use crate::icalendar::writer::property_to_string;
use crate::icalendar::{ICalValue, ICalendarComponent, ICalendarProperty};
use crate::jscalendar::context::Context;
use crate::jscalendar::types::{Location, VirtualLocation};
use std::collections::{BTreeMap, HashSet};

fn property_id(prop: &ICalendarProperty) -> String {
    if let Some(id) = prop.jmap_id() {
        if JmapId::is_valid(id.0) {
            return id.0.to_string();
        }
    }
    JmapId::derive(&property_to_string(prop)).into_string()
}

/// ICAL→JSON direction. `start_tz` is the already-resolved `DTSTART`
/// timezone, used to decide whether `DTEND` needs a synthesized
/// `rel: "end"` location (spec.md §4.3).
pub fn from_ical<R: TzResolver>(
    vevent: &ICalendarComponent,
    resolver: &R,
    start_tz: Option<Tz>,
) -> (Option<BTreeMap<String, Location>>, Option<BTreeMap<String, VirtualLocation>>) {
    let mut locations = BTreeMap::new();
    let mut primary = Location::default();
    let mut have_primary = false;
    let mut primary_id = None;

    if let Some(prop) = vevent.get("LOCATION") {
        have_primary = true;
        primary.name = prop.as_text().map(|s| s.to_string());
        if let Some(desc) = prop.param("X-JMAP-DESCRIPTION") {
            primary.description = Some(desc.to_string());
        }
        primary_id = Some(property_id(prop));
    }
    if let Some(prop) = vevent.get("GEO") {
        if let ICalValue::Geo(lat, lon) = &prop.value {
            primary.coordinates = Some(format!("geo:{lat},{lon}"));
            have_primary = true;
            primary_id.get_or_insert_with(|| property_id(prop));
        }
    }
    if let Some(prop) = vevent.get("X-APPLE-STRUCTURED-LOCATION") {
        if primary.coordinates.is_none() {
            if let Some(uri) = prop.as_text() {
                if let Some(geo) = uri.strip_prefix("geo:") {
                    primary.coordinates = Some(format!("geo:{geo}"));
                    have_primary = true;
                }
            }
            if let Some(title) = prop.param("X-TITLE") {
                primary.name.get_or_insert_with(|| title.to_string());
                have_primary = true;
            }
            primary_id.get_or_insert_with(|| property_id(prop));
        }
    }
    if have_primary {
        locations.insert(
            primary_id.unwrap_or_else(|| JmapId::derive("LOCATION").into_string()),
            primary,
        );
    }

    for prop in vevent.get_all("X-JMAP-LOCATION") {
        let id = property_id(prop);
        let mut loc = Location {
            name: prop.as_text().map(|s| s.to_string()),
            ..Default::default()
        };
        if let Some(desc) = prop.param("X-JMAP-DESCRIPTION") {
            loc.description = Some(desc.to_string());
        }
        if let Some(rel) = prop.param("X-JMAP-REL") {
            loc.rel = Some(rel.to_string());
        }
        if let Some(tzid) = prop.param("X-JMAP-TZID") {
            loc.time_zone = Some(tzid.to_string());
        }
        locations.insert(id, loc);
    }

    if let Some(dtend) = vevent.get("DTEND") {
        if let Some(end_tz) = crate::jscalendar::time::resolve_property_tz(dtend, resolver) {
            if Some(end_tz) != start_tz {
                let id = dtend
                    .jmap_id()
                    .map(|r| r.0.to_string())
                    .unwrap_or_else(|| property_id(dtend));
                locations.insert(
                    id,
                    Location {
                        rel: Some("end".to_string()),
                        time_zone: Some(end_tz.name().to_string()),
                        ..Default::default()
                    },
                );
            }
        }
    }

    let mut virtual_locations = BTreeMap::new();
    for prop in vevent.get_all("CONFERENCE") {
        let id = property_id(prop);
        virtual_locations.insert(
            id,
            VirtualLocation {
                uri: prop.as_text().unwrap_or_default().to_string(),
                name: prop.param("LABEL").map(|s| s.to_string()),
                description: prop.param("X-JMAP-DESCRIPTION").map(|s| s.to_string()),
                features: None,
            },
        );
    }

    (
        if locations.is_empty() { None } else { Some(locations) },
        if virtual_locations.is_empty() { None } else { Some(virtual_locations) },
    )
}

/// JSON→ICAL direction. The `rel: "end"` entry is never emitted here —
/// it is realized as `DTEND`'s `TZID` by the start/end/duration
/// resolution in `time.rs`.
pub fn to_ical<R: TzResolver>(
    locations: Option<&BTreeMap<String, Location>>,
    virtual_locations: Option<&BTreeMap<String, VirtualLocation>>,
    known_link_ids: &HashSet<String>,
    resolver: &R,
    ctx: &mut Context,
) -> Vec<ICalendarProperty> {
    let mut props = Vec::new();
    let mut emitted_primary = false;

    if let Some(locations) = locations {
        for (id, loc) in locations {
            if loc.rel.as_deref() == Some("end") {
                continue;
            }
            let valid = ctx.with_key("locations", id, |ctx| {
                let mut ok = true;
                if loc.is_empty_or_rel_only() {
                    ctx.invalid(None);
                    ok = false;
                }
                if let Some(tzid) = &loc.time_zone {
                    if resolver.resolve(tzid).is_none() {
                        ctx.invalid(Some("timeZone"));
                        ok = false;
                    }
                }
                if let Some(link_ids) = &loc.link_ids {
                    for link_id in link_ids.keys() {
                        if !known_link_ids.contains(link_id) {
                            ctx.invalid(Some("linkIds"));
                            ok = false;
                        }
                    }
                }
                ok
            });
            if !valid {
                continue;
            }

            if !emitted_primary {
                emitted_primary = true;
                if let Some(name) = &loc.name {
                    let mut prop = ICalendarProperty::text("LOCATION", name.clone()).jmap_id(id);
                    if let Some(desc) = &loc.description {
                        prop = prop.with_param("X-JMAP-DESCRIPTION", desc.clone());
                    }
                    props.push(prop);
                }
                if let Some((lat, lon)) = parse_geo(loc.coordinates.as_deref()) {
                    props.push(ICalendarProperty::new("GEO", ICalValue::Geo(lat, lon)).jmap_id(id));
                }
            } else {
                let mut prop =
                    ICalendarProperty::text("X-JMAP-LOCATION", loc.name.clone().unwrap_or_default())
                        .jmap_id(id);
                if let Some(desc) = &loc.description {
                    prop = prop.with_param("X-JMAP-DESCRIPTION", desc.clone());
                }
                if let Some(rel) = &loc.rel {
                    prop = prop.with_param("X-JMAP-REL", rel.clone());
                }
                if let Some(tz) = &loc.time_zone {
                    prop = prop.with_param("X-JMAP-TZID", tz.clone());
                }
                props.push(prop);
            }
        }
    }

    if let Some(virtual_locations) = virtual_locations {
        for (id, vloc) in virtual_locations {
            let mut prop = ICalendarProperty::uri("CONFERENCE", vloc.uri.clone()).jmap_id(id);
            if let Some(name) = &vloc.name {
                prop = prop.with_param("LABEL", name.clone());
            }
            if let Some(desc) = &vloc.description {
                prop = prop.with_param("X-JMAP-DESCRIPTION", desc.clone());
            }
            props.push(prop);
        }
    }

    props
}

fn parse_geo(coordinates: Option<&str>) -> Option<(f64, f64)> {
    let latlon = coordinates?.strip_prefix("geo:")?;
    let (lat, lon) = latlon.split_once(',')?;
    Some((lat.parse().ok()?, lon.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::timezone::ChronoTzResolver;
    use crate::icalendar::ComponentType;

    #[test]
    fn reads_location_and_geo_into_one_entry() {
        let mut vevent = ICalendarComponent::new(ComponentType::VEvent);
        vevent.push(ICalendarProperty::text("LOCATION", "HQ"));
        vevent.push(ICalendarProperty::new("GEO", ICalValue::Geo(1.0, 2.0)));
        let (locations, _) = from_ical(&vevent, &ChronoTzResolver, None);
        let locations = locations.unwrap();
        assert_eq!(locations.len(), 1);
        let loc = locations.values().next().unwrap();
        assert_eq!(loc.name.as_deref(), Some("HQ"));
        assert_eq!(loc.coordinates.as_deref(), Some("geo:1,2"));
    }

    #[test]
    fn rejects_empty_location() {
        let mut locations = BTreeMap::new();
        locations.insert("loc1".to_string(), Location::default());
        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let props = to_ical(Some(&locations), None, &HashSet::new(), &ChronoTzResolver, &mut ctx);
        assert!(props.is_empty());
        assert!(ctx.has_errors());
    }
}
