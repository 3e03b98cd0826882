/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Link codec (spec.md §4.8): `ATTACH`/`URL` ↔ `links`.

use crate::common::JmapId;
use crate::icalendar::writer::property_to_string;
use crate::icalendar::{ICalendarComponent, ICalendarProperty};
use crate::jscalendar::context::Context;
use crate::jscalendar::types::Link;
use std::collections::BTreeMap;

fn property_id(prop: &ICalendarProperty) -> String {
    if let Some(id) = prop.jmap_id() {
        if JmapId::is_valid(id.0) {
            return id.0.to_string();
        }
    }
    JmapId::derive(&property_to_string(prop)).into_string()
}

fn is_binary(prop: &ICalendarProperty) -> bool {
    prop.param("VALUE").is_some_and(|v| v.eq_ignore_ascii_case("BINARY"))
}

/// RFC 8288 `reg-rel-type` grammar: a lowercase letter followed by
/// lowercase letters, digits, `.` or `-`.
fn is_valid_rel(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

pub fn from_ical(vevent: &ICalendarComponent) -> Option<BTreeMap<String, Link>> {
    let mut links = BTreeMap::new();

    for prop in vevent.get_all("ATTACH") {
        if is_binary(prop) {
            continue;
        }
        let Some(href) = prop.as_text() else { continue };
        let id = property_id(prop);
        links.insert(
            id,
            Link {
                href: href.to_string(),
                content_type: prop.param("FMTTYPE").map(|s| s.to_string()),
                title: prop.param("X-JMAP-TITLE").map(|s| s.to_string()),
                size: prop.param("SIZE").and_then(|s| s.parse().ok()),
                cid: prop.param("X-JMAP-CID").map(|s| s.to_string()),
                display: prop.param("X-JMAP-DISPLAY").map(|s| s.to_string()),
                rel: Some(prop.param("X-JMAP-REL").unwrap_or("enclosure").to_string()),
            },
        );
    }

    if let Some(prop) = vevent.get("URL") {
        if let Some(href) = prop.as_text() {
            let id = property_id(prop);
            links.insert(
                id,
                Link {
                    href: href.to_string(),
                    rel: Some("describedby".to_string()),
                    ..Default::default()
                },
            );
        }
    }

    if links.is_empty() { None } else { Some(links) }
}

pub fn to_ical(links: Option<&BTreeMap<String, Link>>, ctx: &mut Context) -> Vec<ICalendarProperty> {
    let mut props = Vec::new();
    let Some(links) = links else { return props };

    for (id, link) in links {
        let valid = ctx.with_key("links", id, |ctx| {
            if let Some(rel) = &link.rel {
                if !is_valid_rel(rel) {
                    ctx.invalid(Some("rel"));
                    return false;
                }
            }
            true
        });
        if !valid {
            continue;
        }

        let is_bare_describedby = link.rel.as_deref() == Some("describedby")
            && link.content_type.is_none()
            && link.title.is_none()
            && link.size.is_none()
            && link.cid.is_none()
            && link.display.is_none();

        if is_bare_describedby {
            props.push(ICalendarProperty::uri("URL", link.href.clone()).jmap_id(id));
            continue;
        }

        let mut prop = ICalendarProperty::uri("ATTACH", link.href.clone()).jmap_id(id);
        if let Some(t) = &link.content_type {
            prop = prop.with_param("FMTTYPE", t.clone());
        }
        if let Some(t) = &link.title {
            prop = prop.with_param("X-JMAP-TITLE", t.clone());
        }
        if let Some(s) = link.size {
            prop = prop.with_param("SIZE", s.to_string());
        }
        if let Some(c) = &link.cid {
            prop = prop.with_param("X-JMAP-CID", c.clone());
        }
        if let Some(d) = &link.display {
            prop = prop.with_param("X-JMAP-DISPLAY", d.clone());
        }
        if let Some(r) = &link.rel {
            if r != "enclosure" {
                prop = prop.with_param("X-JMAP-REL", r.clone());
            }
        }
        props.push(prop);
    }

    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icalendar::ComponentType;

    #[test]
    fn url_property_becomes_describedby_link() {
        let mut vevent = ICalendarComponent::new(ComponentType::VEvent);
        vevent.push(ICalendarProperty::uri("URL", "https://example.com/info"));
        let links = from_ical(&vevent).unwrap();
        let link = links.values().next().unwrap();
        assert_eq!(link.rel.as_deref(), Some("describedby"));
    }

    #[test]
    fn bare_describedby_link_emits_url_not_attach() {
        let mut links = BTreeMap::new();
        links.insert(
            "l1".to_string(),
            Link {
                href: "https://example.com/info".to_string(),
                rel: Some("describedby".to_string()),
                ..Default::default()
            },
        );
        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let props = to_ical(Some(&links), &mut ctx);
        assert_eq!(props.len(), 1);
        assert_eq!(props[0].name, "URL");
    }

    #[test]
    fn invalid_rel_is_flagged() {
        let mut links = BTreeMap::new();
        links.insert(
            "l1".to_string(),
            Link {
                href: "https://example.com/file".to_string(),
                rel: Some("Not Valid!".to_string()),
                ..Default::default()
            },
        );
        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let props = to_ical(Some(&links), &mut ctx);
        assert!(props.is_empty());
        assert!(ctx.has_errors());
    }
}
