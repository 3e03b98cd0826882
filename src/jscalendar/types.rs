/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! The JSCalendar `jsevent` data model (spec.md §3), expressed as plain
//! serde structs rather than a generic JSON-value AST: every field the
//! spec names gets a Rust type, and the free-form parts (keyword sets,
//! recurrence overrides, relatedTo) use ordered maps so round-trips are
//! deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "@type")]
    pub type_: String,
    pub uid: String,
    #[serde(rename = "prodId", skip_serializing_if = "Option::is_none")]
    pub prod_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        rename = "descriptionContentType",
        skip_serializing_if = "Option::is_none"
    )]
    pub description_content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(rename = "freeBusyStatus", skip_serializing_if = "Option::is_none")]
    pub free_busy_status: Option<FreeBusyStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<Privacy>,
    #[serde(rename = "isAllDay", default, skip_serializing_if = "is_false")]
    pub is_all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(rename = "timeZone")]
    pub time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(rename = "recurrenceRule", skip_serializing_if = "Option::is_none")]
    pub recurrence_rule: Option<RecurrenceRule>,
    #[serde(
        rename = "recurrenceOverrides",
        skip_serializing_if = "Option::is_none"
    )]
    pub recurrence_overrides: Option<BTreeMap<String, OverrideEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<BTreeMap<String, bool>>,
    #[serde(rename = "relatedTo", skip_serializing_if = "Option::is_none")]
    pub related_to: Option<BTreeMap<String, RelatedTo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<BTreeMap<String, Link>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<BTreeMap<String, Location>>,
    #[serde(rename = "virtualLocations", skip_serializing_if = "Option::is_none")]
    pub virtual_locations: Option<BTreeMap<String, VirtualLocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<BTreeMap<String, Participant>>,
    #[serde(rename = "replyTo", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<BTreeMap<String, String>>,
    #[serde(
        rename = "useDefaultAlerts",
        default,
        skip_serializing_if = "is_false"
    )]
    pub use_default_alerts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts: Option<BTreeMap<String, Alert>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Event {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            type_: "jsevent".to_string(),
            uid: uid.into(),
            prod_id: None,
            created: None,
            updated: None,
            sequence: None,
            priority: None,
            title: None,
            description: None,
            description_content_type: None,
            method: None,
            color: None,
            status: None,
            free_busy_status: None,
            privacy: None,
            is_all_day: false,
            start: None,
            time_zone: None,
            duration: None,
            recurrence_rule: None,
            recurrence_overrides: None,
            keywords: None,
            related_to: None,
            links: None,
            locations: None,
            virtual_locations: None,
            participants: None,
            reply_to: None,
            use_default_alerts: false,
            alerts: None,
            locale: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Cancelled,
    Tentative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreeBusyStatus {
    Free,
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Private,
    Secret,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedTo {
    pub relation: BTreeMap<String, bool>,
}

/// One recurrence-override entry: either an exclusion, a bare RDATE
/// (empty object), or a JSON-Pointer-keyed patch. Modeled as a tagged
/// variant (spec.md §9 "Tagged-variant recurrence-override value")
/// instead of a free-form object so validation is a pattern match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideEntry {
    Exclusion { excluded: bool },
    Patch(BTreeMap<String, serde_json::Value>),
}

impl OverrideEntry {
    pub fn is_excluded(&self) -> bool {
        matches!(self, OverrideEntry::Exclusion { excluded: true })
    }

    /// `Some(None)` for a bare RDATE (`{}`), `Some(Some(iso))` for a
    /// `PERIOD` RDATE (`{"duration": <iso>}`), `None` for anything else
    /// (an exclusion or a real recurrence-override patch). The bare key
    /// `"duration"` — no leading `/` — distinguishes this literal shape
    /// from a genuine JSON-Pointer patch field, which is always `/duration`
    /// (spec.md §4.6 step 1).
    pub fn rdate_duration(&self) -> Option<Option<String>> {
        match self {
            OverrideEntry::Patch(fields) if fields.is_empty() => Some(None),
            OverrideEntry::Patch(fields) if fields.len() == 1 => fields
                .get("duration")
                .and_then(|v| v.as_str())
                .map(|s| Some(s.to_string())),
            _ => None,
        }
    }

    pub fn as_patch(&self) -> Option<&BTreeMap<String, serde_json::Value>> {
        match self {
            OverrideEntry::Patch(fields) => Some(fields),
            OverrideEntry::Exclusion { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default = "default_rel", skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

fn default_rel() -> Option<String> {
    Some("enclosure".to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(rename = "linkIds", skip_serializing_if = "Option::is_none")]
    pub link_ids: Option<BTreeMap<String, bool>>,
}

impl Location {
    pub fn is_empty_or_rel_only(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.coordinates.is_none()
            && self.time_zone.is_none()
            && self.link_ids.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualLocation {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<BTreeMap<String, bool>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "sendTo", skip_serializing_if = "Option::is_none")]
    pub send_to: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ParticipantKind>,
    #[serde(default = "default_attendance")]
    pub attendance: ParticipantAttendance,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub roles: BTreeMap<String, bool>,
    #[serde(
        rename = "participationStatus",
        skip_serializing_if = "Option::is_none"
    )]
    pub participation_status: Option<ParticipationStatus>,
    #[serde(rename = "expectReply", default, skip_serializing_if = "is_false")]
    pub expect_reply: bool,
    #[serde(rename = "delegatedTo", skip_serializing_if = "Option::is_none")]
    pub delegated_to: Option<BTreeMap<String, bool>>,
    #[serde(rename = "delegatedFrom", skip_serializing_if = "Option::is_none")]
    pub delegated_from: Option<BTreeMap<String, bool>>,
    #[serde(rename = "memberOf", skip_serializing_if = "Option::is_none")]
    pub member_of: Option<BTreeMap<String, bool>>,
    #[serde(rename = "linkIds", skip_serializing_if = "Option::is_none")]
    pub link_ids: Option<BTreeMap<String, bool>>,
    #[serde(
        rename = "scheduleSequence",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub schedule_sequence: Option<u32>,
    #[serde(rename = "scheduleUpdated", skip_serializing_if = "Option::is_none")]
    pub schedule_updated: Option<String>,
    #[serde(rename = "locationId", skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

fn default_attendance() -> ParticipantAttendance {
    ParticipantAttendance::Required
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    Individual,
    Group,
    Resource,
    Location,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAttendance {
    Required,
    Optional,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParticipationStatus {
    Accepted,
    Declined,
    Tentative,
    NeedsAction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default = "default_action")]
    pub action: AlertAction,
    #[serde(rename = "relativeTo", skip_serializing_if = "Option::is_none")]
    pub relative_to: Option<RelativeTo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snoozed: Option<String>,
}

fn default_action() -> AlertAction {
    AlertAction::Display
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertAction {
    #[default]
    Display,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeTo {
    #[serde(rename = "before-start")]
    BeforeStart,
    #[serde(rename = "after-start")]
    AfterStart,
    #[serde(rename = "before-end")]
    BeforeEnd,
    #[serde(rename = "after-end")]
    AfterEnd,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rscale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,
    #[serde(rename = "firstDayOfWeek", skip_serializing_if = "Option::is_none")]
    pub first_day_of_week: Option<String>,
    #[serde(rename = "byDay", skip_serializing_if = "Option::is_none")]
    pub by_day: Option<Vec<NDay>>,
    #[serde(rename = "byMonth", skip_serializing_if = "Option::is_none")]
    pub by_month: Option<Vec<String>>,
    #[serde(rename = "byDate", skip_serializing_if = "Option::is_none")]
    pub by_date: Option<Vec<i32>>,
    #[serde(rename = "byYearDay", skip_serializing_if = "Option::is_none")]
    pub by_year_day: Option<Vec<i32>>,
    #[serde(rename = "byWeekNo", skip_serializing_if = "Option::is_none")]
    pub by_week_no: Option<Vec<i32>>,
    #[serde(rename = "byHour", skip_serializing_if = "Option::is_none")]
    pub by_hour: Option<Vec<u32>>,
    #[serde(rename = "byMinute", skip_serializing_if = "Option::is_none")]
    pub by_minute: Option<Vec<u32>>,
    #[serde(rename = "bySecond", skip_serializing_if = "Option::is_none")]
    pub by_second: Option<Vec<u32>>,
    #[serde(rename = "bySetPosition", skip_serializing_if = "Option::is_none")]
    pub by_set_position: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NDay {
    pub day: String,
    #[serde(rename = "nthOfPeriod", skip_serializing_if = "Option::is_none")]
    pub nth_of_period: Option<i32>,
}
