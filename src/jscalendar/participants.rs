/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Participant codec (spec.md §4.4): `ATTENDEE`/`ORGANIZER`/`DELEGATED-TO`
//! ↔ `participants`, `replyTo`.

use crate::common::JmapId;
use crate::icalendar::writer::property_to_string;
use crate::icalendar::{ICalendarComponent, ICalendarProperty};
use crate::jscalendar::context::Context;
use crate::jscalendar::types::{Participant, ParticipantAttendance, ParticipantKind, ParticipationStatus};
use ahash::AHashMap;
use std::collections::BTreeMap;

fn canonicalize_uri(uri: &str) -> String {
    match uri.find(':') {
        Some(idx) => format!("{}{}", uri[..=idx].to_ascii_lowercase(), &uri[idx + 1..]),
        None => uri.to_string(),
    }
}

fn property_id(prop: &ICalendarProperty) -> String {
    if let Some(id) = prop.jmap_id() {
        if JmapId::is_valid(id.0) {
            return id.0.to_string();
        }
    }
    JmapId::derive(&property_to_string(prop)).into_string()
}

fn build_send_to(prop: &ICalendarProperty, uri: &str) -> BTreeMap<String, String> {
    let mut send_to = BTreeMap::new();
    for v in prop.param_values("X-JMAP-RSVP-URI") {
        if let Some((method, addr)) = v.split_once(':') {
            send_to.insert(method.to_ascii_lowercase(), addr.to_string());
        }
    }
    if send_to.is_empty() {
        if uri.to_ascii_lowercase().starts_with("mailto:") {
            send_to.insert("imip".to_string(), uri.to_string());
        } else {
            send_to.insert("other".to_string(), uri.to_string());
        }
    }
    send_to
}

/// Picks the preferred URI from a `sendTo`-shaped map: `imip`, then
/// `other`, then whatever else is present. Resolves the "occasionally
/// reads from sendTo.imip for method other" inconsistency noted in
/// spec.md §9 by always applying this order regardless of which method
/// was originally queried.
fn pick_uri(send_to: &BTreeMap<String, String>) -> Option<&str> {
    send_to
        .get("imip")
        .or_else(|| send_to.get("other"))
        .or_else(|| send_to.values().next())
        .map(|s| s.as_str())
}

fn extract_email(prop: &ICalendarProperty, send_to: &BTreeMap<String, String>) -> Option<String> {
    if let Some(e) = prop.param("EMAIL") {
        return Some(e.to_string());
    }
    send_to
        .get("imip")
        .and_then(|v| v.strip_prefix("mailto:"))
        .map(|s| s.to_string())
}

fn kind_from_cutype(v: &str) -> ParticipantKind {
    match v.to_ascii_uppercase().as_str() {
        "INDIVIDUAL" => ParticipantKind::Individual,
        "GROUP" => ParticipantKind::Group,
        "RESOURCE" => ParticipantKind::Resource,
        "ROOM" => ParticipantKind::Location,
        _ => ParticipantKind::Unknown,
    }
}

fn cutype_from_kind(k: ParticipantKind) -> &'static str {
    match k {
        ParticipantKind::Individual => "INDIVIDUAL",
        ParticipantKind::Group => "GROUP",
        ParticipantKind::Resource => "RESOURCE",
        // Asymmetric with the read direction (ROOM -> location): preserved
        // per spec.md §9.
        ParticipantKind::Location => "ROOM",
        ParticipantKind::Unknown => "UNKNOWN",
    }
}

fn attendance_from_role(v: &str) -> ParticipantAttendance {
    match v.to_ascii_uppercase().as_str() {
        "OPT-PARTICIPANT" => ParticipantAttendance::Optional,
        "NON-PARTICIPANT" => ParticipantAttendance::None,
        _ => ParticipantAttendance::Required,
    }
}

fn partstat_from_str(v: &str) -> Option<ParticipationStatus> {
    match v.to_ascii_uppercase().as_str() {
        "ACCEPTED" => Some(ParticipationStatus::Accepted),
        "DECLINED" => Some(ParticipationStatus::Declined),
        "TENTATIVE" => Some(ParticipationStatus::Tentative),
        "NEEDS-ACTION" => Some(ParticipationStatus::NeedsAction),
        _ => None,
    }
}

fn partstat_to_str(p: ParticipationStatus) -> &'static str {
    match p {
        ParticipationStatus::Accepted => "ACCEPTED",
        ParticipationStatus::Declined => "DECLINED",
        ParticipationStatus::Tentative => "TENTATIVE",
        ParticipationStatus::NeedsAction => "NEEDS-ACTION",
    }
}

/// Walks a `PARTSTAT=DELEGATED` chain via `DELEGATED-TO`, inheriting the
/// delegate's status. Bounded at 64 steps and guarded by a visited set so
/// a cycle can never loop forever (spec.md §9 prefers the visited-set
/// over the bare depth bound).
fn resolve_participation_status(
    start_uri: &str,
    uri_to_prop: &AHashMap<String, &ICalendarProperty>,
) -> Option<ParticipationStatus> {
    let mut current = start_uri.to_string();
    let mut visited = std::collections::HashSet::new();
    for _ in 0..64 {
        if !visited.insert(current.clone()) {
            return None;
        }
        let prop = uri_to_prop.get(&current)?;
        let partstat = prop
            .param("PARTSTAT")
            .unwrap_or("NEEDS-ACTION")
            .to_ascii_uppercase();
        if partstat == "DELEGATED" {
            let next = prop.param_values("DELEGATED-TO").next()?;
            current = canonicalize_uri(next);
            continue;
        }
        return partstat_from_str(&partstat);
    }
    None
}

fn id_set_from_uris<'a>(
    values: impl Iterator<Item = &'a str>,
    uri_to_id: &AHashMap<String, String>,
) -> Option<BTreeMap<String, bool>> {
    let mut set = BTreeMap::new();
    for v in values {
        if let Some(id) = uri_to_id.get(&canonicalize_uri(v)) {
            set.insert(id.clone(), true);
        }
    }
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

/// `memberOf` is allowed to synthesize an id via SHA-1 when the
/// referenced URI isn't a known participant — this contradicts the
/// invariant that `memberOf` references participants, but is preserved
/// for compatibility per spec.md §9.
fn member_of_from_uris<'a>(
    values: impl Iterator<Item = &'a str>,
    uri_to_id: &AHashMap<String, String>,
) -> Option<BTreeMap<String, bool>> {
    let mut set = BTreeMap::new();
    for v in values {
        let canon = canonicalize_uri(v);
        let id = uri_to_id
            .get(&canon)
            .cloned()
            .unwrap_or_else(|| JmapId::derive(&canon).into_string());
        set.insert(id, true);
    }
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}

fn participant_from_prop(
    prop: &ICalendarProperty,
    uri: &str,
    uri_to_prop: &AHashMap<String, &ICalendarProperty>,
    uri_to_id: &AHashMap<String, String>,
) -> Participant {
    let send_to = build_send_to(prop, uri);
    let email = extract_email(prop, &send_to);
    let mut roles = BTreeMap::new();
    for r in prop.param_values("X-JMAP-ROLE") {
        roles.insert(r.to_ascii_lowercase(), true);
    }
    let role_param = prop.param("ROLE");
    if role_param.is_some_and(|r| r.eq_ignore_ascii_case("CHAIR")) {
        roles.insert("chair".to_string(), true);
    }

    let raw_partstat = prop.param("PARTSTAT").map(|v| v.to_ascii_uppercase());
    let participation_status = match raw_partstat.as_deref() {
        Some("DELEGATED") => resolve_participation_status(&canonicalize_uri(uri), uri_to_prop),
        Some(other) => partstat_from_str(other),
        None => Some(ParticipationStatus::NeedsAction),
    };

    Participant {
        send_to: Some(send_to),
        email,
        name: prop.param("CN").unwrap_or("").to_string(),
        kind: prop.param("CUTYPE").map(kind_from_cutype),
        attendance: prop
            .param("ROLE")
            .map(attendance_from_role)
            .unwrap_or(ParticipantAttendance::Required),
        roles,
        participation_status,
        expect_reply: prop.param("RSVP").is_some_and(|v| v.eq_ignore_ascii_case("TRUE")),
        delegated_to: id_set_from_uris(prop.param_values("DELEGATED-TO"), uri_to_id),
        delegated_from: id_set_from_uris(prop.param_values("DELEGATED-FROM"), uri_to_id),
        member_of: member_of_from_uris(prop.param_values("MEMBER"), uri_to_id),
        link_ids: {
            let mut set = BTreeMap::new();
            for v in prop.param_values("X-JMAP-LINKID") {
                set.insert(v.to_string(), true);
            }
            if set.is_empty() { None } else { Some(set) }
        },
        schedule_sequence: prop.param("X-JMAP-SEQUENCE").and_then(|v| v.parse().ok()),
        schedule_updated: prop
            .param("X-JMAP-DTSTAMP")
            .and_then(crate::icalendar::parser::parse_date_time)
            .filter(|dt| dt.is_utc)
            .map(|dt| crate::jscalendar::time::to_utc_date_time_string(&dt)),
        location_id: prop.param("X-JMAP-LOCATIONID").map(|v| v.to_string()),
    }
}

pub struct ParticipantsFromIcal {
    pub participants: Option<BTreeMap<String, Participant>>,
    pub reply_to: Option<BTreeMap<String, String>>,
}

pub fn from_ical(vevent: &ICalendarComponent, _ctx: &mut Context) -> ParticipantsFromIcal {
    let attendees: Vec<&ICalendarProperty> = vevent.get_all("ATTENDEE").collect();
    let organizer = vevent.get("ORGANIZER");

    let mut uri_to_prop: AHashMap<String, &ICalendarProperty> = AHashMap::default();
    let mut uri_to_id: AHashMap<String, String> = AHashMap::default();
    for prop in &attendees {
        let uri = prop.as_text().unwrap_or_default();
        let canon = canonicalize_uri(uri);
        uri_to_prop.insert(canon.clone(), prop);
        uri_to_id.insert(canon, property_id(prop));
    }

    let organizer_canon = organizer.map(|p| canonicalize_uri(p.as_text().unwrap_or_default()));

    let mut participants = BTreeMap::new();
    for prop in &attendees {
        let uri = prop.as_text().unwrap_or_default();
        let canon = canonicalize_uri(uri);
        let id = uri_to_id.get(&canon).cloned().unwrap_or_else(|| property_id(prop));
        let mut participant = participant_from_prop(prop, uri, &uri_to_prop, &uri_to_id);
        if organizer_canon.as_deref() == Some(canon.as_str()) {
            participant.roles.insert("owner".to_string(), true);
            participant.roles.insert("attendee".to_string(), true);
        }
        if participant.roles.is_empty() {
            participant.roles.insert("attendee".to_string(), true);
        }
        participants.insert(id, participant);
    }

    if let Some(org_prop) = organizer {
        let canon = organizer_canon.clone().unwrap_or_default();
        if !uri_to_prop.contains_key(&canon) {
            let id = property_id(org_prop);
            let mut participant =
                participant_from_prop(org_prop, org_prop.as_text().unwrap_or_default(), &uri_to_prop, &uri_to_id);
            participant.roles = BTreeMap::new();
            participant.roles.insert("owner".to_string(), true);
            participant.participation_status = None;
            participants.insert(id, participant);
        }
    }

    let reply_to = organizer.map(|prop| build_send_to(prop, prop.as_text().unwrap_or_default()));

    ParticipantsFromIcal {
        participants: if participants.is_empty() { None } else { Some(participants) },
        reply_to,
    }
}

fn participant_uri(p: &Participant) -> Option<String> {
    if let Some(send_to) = &p.send_to {
        if let Some(u) = pick_uri(send_to) {
            return Some(u.to_string());
        }
    }
    p.email.as_ref().map(|e| format!("mailto:{e}"))
}

const ORGANIZER_DEFAULT_ROLES: &[&str] = &["owner", "attendee"];

fn is_organizer_redundant(p: &Participant) -> bool {
    p.name.is_empty()
        && p.participation_status.is_none()
        && p.attendance == ParticipantAttendance::Required
        && !p.expect_reply
        && p.schedule_sequence.unwrap_or(0) == 0
        && p.delegated_to.is_none()
        && p.delegated_from.is_none()
        && p.member_of.is_none()
        && p.location_id.is_none()
        && p.roles.len() == ORGANIZER_DEFAULT_ROLES.len()
        && ORGANIZER_DEFAULT_ROLES.iter().all(|r| p.roles.contains_key(*r))
}

pub struct ParticipantsToIcal {
    pub organizer: Option<ICalendarProperty>,
    pub attendees: Vec<ICalendarProperty>,
}

/// JSON→ICAL direction: validates the `replyTo`/`participants`
/// co-presence invariant, then emits `ORGANIZER`/`ATTENDEE` properties,
/// eliding a single redundant `ATTENDEE` that merely restates the
/// organizer (spec.md §4.4).
pub fn to_ical(
    participants: Option<&BTreeMap<String, Participant>>,
    reply_to: Option<&BTreeMap<String, String>>,
    ctx: &mut Context,
) -> Option<ParticipantsToIcal> {
    if participants.is_some() != reply_to.is_some() {
        ctx.invalid(Some("replyTo"));
        ctx.invalid(Some("participants"));
        return None;
    }
    let Some(participants) = participants else {
        return Some(ParticipantsToIcal { organizer: None, attendees: Vec::new() });
    };
    let reply_to = reply_to.unwrap();

    let organizer_uri = pick_uri(reply_to).map(|s| s.to_string());
    let organizer_canon = organizer_uri.as_deref().map(canonicalize_uri);

    let organizer_prop = organizer_uri.as_ref().map(|uri| {
        let mut prop = ICalendarProperty::uri("ORGANIZER", uri.clone());
        for (method, addr) in reply_to {
            prop = prop.with_param("X-JMAP-RSVP-URI", format!("{method}:{addr}"));
        }
        if let Some(canon) = &organizer_canon {
            if let Some((_, p)) = participants.iter().find(|(_, p)| {
                participant_uri(p).map(|u| canonicalize_uri(&u)).as_deref() == Some(canon.as_str())
            }) {
                if !p.name.is_empty() {
                    prop = prop.with_param("CN", p.name.clone());
                }
            }
        }
        prop
    });

    let mut attendees = Vec::new();
    for (id, p) in participants {
        let Some(uri) = participant_uri(p) else {
            ctx.with_key("participants", id, |ctx| ctx.invalid(None));
            continue;
        };
        let canon = canonicalize_uri(&uri);
        if organizer_canon.as_deref() == Some(canon.as_str()) && is_organizer_redundant(p) {
            continue;
        }

        let mut prop = ICalendarProperty::uri("ATTENDEE", uri).jmap_id(id);
        if !p.name.is_empty() {
            prop = prop.with_param("CN", p.name.clone());
        }
        if let Some(email) = &p.email {
            prop = prop.with_param("EMAIL", email.clone());
        }
        if let Some(kind) = p.kind {
            prop = prop.with_param("CUTYPE", cutype_from_kind(kind));
        }
        let role = if p.roles.contains_key("chair") {
            "CHAIR"
        } else {
            match p.attendance {
                ParticipantAttendance::Optional => "OPT-PARTICIPANT",
                ParticipantAttendance::None => "NON-PARTICIPANT",
                ParticipantAttendance::Required => "REQ-PARTICIPANT",
            }
        };
        prop = prop.with_param("ROLE", role);
        for role_name in p.roles.keys() {
            prop = prop.with_param("X-JMAP-ROLE", role_name.clone());
        }
        if let Some(status) = p.participation_status {
            prop = prop.with_param("PARTSTAT", partstat_to_str(status));
        }
        if p.expect_reply {
            prop = prop.with_param("RSVP", "TRUE");
        }
        if let Some(delegated_to) = &p.delegated_to {
            for target_id in delegated_to.keys() {
                if let Some(target_uri) = participants.get(target_id).and_then(participant_uri) {
                    prop = prop.with_param("DELEGATED-TO", target_uri);
                }
            }
        }
        if let Some(delegated_from) = &p.delegated_from {
            for source_id in delegated_from.keys() {
                if let Some(source_uri) = participants.get(source_id).and_then(participant_uri) {
                    prop = prop.with_param("DELEGATED-FROM", source_uri);
                }
            }
        }
        if let Some(member_of) = &p.member_of {
            for member_id in member_of.keys() {
                if let Some(member_uri) = participants.get(member_id).and_then(participant_uri) {
                    prop = prop.with_param("MEMBER", member_uri);
                }
            }
        }
        if let Some(link_ids) = &p.link_ids {
            for link_id in link_ids.keys() {
                prop = prop.with_param("X-JMAP-LINKID", link_id.clone());
            }
        }
        if let Some(seq) = p.schedule_sequence.filter(|s| *s != 0) {
            prop = prop.with_param("X-JMAP-SEQUENCE", seq.to_string());
        }
        if let Some(updated) = &p.schedule_updated {
            if let Some(dt) = crate::jscalendar::time::parse_utc_date_time_string(updated) {
                prop = prop.with_param(
                    "X-JMAP-DTSTAMP",
                    format!(
                        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
                        dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
                    ),
                );
            }
        }
        if let Some(location_id) = &p.location_id {
            prop = prop.with_param("X-JMAP-LOCATIONID", location_id.clone());
        }
        attendees.push(prop);
    }

    Some(ParticipantsToIcal { organizer: organizer_prop, attendees })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icalendar::{ComponentType, ICalendarProperty};

    fn attendee(uri: &str) -> ICalendarProperty {
        ICalendarProperty::uri("ATTENDEE", uri)
    }

    #[test]
    fn delegation_chain_resolves_through_to_acceptance() {
        let mut vevent = ICalendarComponent::new(ComponentType::VEvent);
        vevent.push(
            attendee("mailto:a@example.com")
                .with_param("PARTSTAT", "DELEGATED")
                .with_param("DELEGATED-TO", "mailto:b@example.com"),
        );
        vevent.push(
            attendee("mailto:b@example.com")
                .with_param("PARTSTAT", "DELEGATED")
                .with_param("DELEGATED-TO", "mailto:c@example.com"),
        );
        vevent.push(attendee("mailto:c@example.com").with_param("PARTSTAT", "ACCEPTED"));

        let mut ctx = Context::new(crate::jscalendar::context::Mode::IcalToJson);
        let result = from_ical(&vevent, &mut ctx);
        let participants = result.participants.unwrap();
        assert_eq!(participants.len(), 3);
        for p in participants.values() {
            assert_eq!(p.participation_status, Some(ParticipationStatus::Accepted));
        }
    }

    #[test]
    fn organizer_only_participant_is_redundant() {
        let mut participants = BTreeMap::new();
        let mut send_to = BTreeMap::new();
        send_to.insert("imip".to_string(), "mailto:owner@example.com".to_string());
        participants.insert(
            "p1".to_string(),
            Participant {
                send_to: Some(send_to),
                roles: {
                    let mut r = BTreeMap::new();
                    r.insert("owner".to_string(), true);
                    r.insert("attendee".to_string(), true);
                    r
                },
                ..Default::default()
            },
        );
        let mut reply_to = BTreeMap::new();
        reply_to.insert("imip".to_string(), "mailto:owner@example.com".to_string());

        let mut ctx = Context::new(crate::jscalendar::context::Mode::JsonToIcal);
        let result = to_ical(Some(&participants), Some(&reply_to), &mut ctx).unwrap();
        assert!(result.organizer.is_some());
        assert!(result.attendees.is_empty());
    }
}
