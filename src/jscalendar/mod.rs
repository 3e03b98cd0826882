/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! JSCalendar conversion core (spec.md §2, §6): [`JSCalendarConverter`] is
//! the single entry point for both directions, delegating field-by-field
//! to the codec modules below. It owns no state across calls — every
//! `to_jmap`/`to_ical` builds and tears down its own [`Context`], the same
//! way the teacher crate scopes its `jmap_ical_ctx` to one call.

pub mod alarms;
pub mod context;
pub mod export;
pub mod import;
pub mod links;
pub mod locations;
pub mod overrides;
pub mod participants;
pub mod patch;
pub mod recurrence;
pub mod time;
pub mod types;

pub use context::{Context, Mode};
pub use types::Event;

use crate::common::timezone::ChronoTzResolver;
use crate::common::TzResolver;
use crate::error::{Error, ErrorKind, Result};
use crate::icalendar::{ComponentType, ICalendar, ICalendarComponent, ICalendarProperty};
use std::collections::{HashMap, HashSet};

/// Runtime configuration for a [`JSCalendarConverter`] (spec.md §4.12):
/// generalizes the teacher's `opt: u32` bitflags parameter into a struct
/// of named fields.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Controls [`JSCalendarConverter::as_jevent_string`]'s formatting.
    pub pretty_json: bool,
    /// The configured calendar-user-address-set, used to pick the
    /// `ATTENDEE` address on an `EMAIL`-action alarm (spec.md §4.9).
    pub user_address_set: Vec<String>,
    /// Falls back to `mailto:<default_user_id>` when `user_address_set`
    /// is empty.
    pub default_user_id: Option<String>,
}

impl ConvertOptions {
    fn user_mailto(&self) -> Option<String> {
        self.user_address_set.first().cloned().or_else(|| {
            self.default_user_id
                .as_ref()
                .map(|id| format!("mailto:{id}"))
        })
    }
}

/// The single entry point for both conversion directions.
pub struct JSCalendarConverter<R: TzResolver = ChronoTzResolver> {
    options: ConvertOptions,
    resolver: R,
}

impl JSCalendarConverter<ChronoTzResolver> {
    pub fn new(options: ConvertOptions) -> Self {
        Self {
            options,
            resolver: ChronoTzResolver,
        }
    }
}

impl<R: TzResolver> JSCalendarConverter<R> {
    /// Same as [`Self::new`], but with a caller-supplied timezone
    /// resolver instead of the bundled `chrono-tz`-backed default.
    pub fn with_resolver(options: ConvertOptions, resolver: R) -> Self {
        Self { options, resolver }
    }

    fn want_props_set(want_props: Option<&[String]>) -> Option<HashSet<String>> {
        want_props.map(|props| props.iter().cloned().collect())
    }

    /// Groups a `VCALENDAR`'s `VEVENT`s by `UID`: each master (no
    /// `RECURRENCE-ID`) paired with the `RECURRENCE-ID` siblings sharing
    /// its `UID`.
    fn group_vevents<'a>(
        vevents: &[&'a ICalendarComponent],
    ) -> Vec<(&'a ICalendarComponent, Vec<&'a ICalendarComponent>)> {
        let mut masters: Vec<&ICalendarComponent> = Vec::new();
        let mut siblings_by_uid: HashMap<&str, Vec<&ICalendarComponent>> = HashMap::new();
        for vevent in vevents {
            let uid = vevent.get("UID").and_then(|p| p.as_text()).unwrap_or_default();
            if vevent.get("RECURRENCE-ID").is_some() {
                siblings_by_uid.entry(uid).or_default().push(*vevent);
            } else {
                masters.push(*vevent);
            }
        }
        masters
            .into_iter()
            .map(|master| {
                let uid = master.get("UID").and_then(|p| p.as_text()).unwrap_or_default();
                let siblings = siblings_by_uid.get(uid).cloned().unwrap_or_default();
                (master, siblings)
            })
            .collect()
    }

    /// Converts the first master `VEVENT` in `ical_tree`. Promotes the
    /// first `VEVENT` if none lack a `RECURRENCE-ID`.
    pub fn to_jmap(&self, ical_tree: &ICalendar, want_props: Option<&[String]>) -> (Option<Event>, Option<Error>) {
        let vevents = ical_tree.vevents();
        if vevents.is_empty() {
            return (None, None);
        }
        let groups = Self::group_vevents(&vevents);
        let (master, siblings) = groups
            .into_iter()
            .next()
            .unwrap_or_else(|| (vevents[0], Vec::new()));

        let (event, ctx) = import::from_ical(master, &siblings, &self.resolver, Self::want_props_set(want_props));
        if ctx.has_errors() {
            (Some(event), Some(Error::props(ctx.into_invalid_props())))
        } else {
            (Some(event), None)
        }
    }

    /// Converts every master `VEVENT` (one without a `RECURRENCE-ID`,
    /// its `RECURRENCE-ID` siblings folded into `recurrenceOverrides`).
    /// If none qualify as masters, the first `VEVENT` is promoted to
    /// one. Returns an empty list if `ical_tree` has no `VEVENT`s at all.
    pub fn to_jmap_all(&self, ical_tree: &ICalendar, want_props: Option<&[String]>) -> (Vec<Event>, Option<Error>) {
        let vevents = ical_tree.vevents();
        if vevents.is_empty() {
            return (Vec::new(), None);
        }
        let mut groups = Self::group_vevents(&vevents);
        if groups.is_empty() {
            groups.push((vevents[0], Vec::new()));
        }

        let mut events = Vec::with_capacity(groups.len());
        let mut invalid_props = Vec::new();
        for (master, siblings) in groups {
            let (event, ctx) =
                import::from_ical(master, &siblings, &self.resolver, Self::want_props_set(want_props));
            invalid_props.extend(ctx.into_invalid_props());
            events.push(event);
        }

        if invalid_props.is_empty() {
            (events, None)
        } else {
            (events, Some(Error::props(invalid_props)))
        }
    }

    /// Builds a fresh `VCALENDAR` (`VERSION:2.0`, `CALSCALE:GREGORIAN`)
    /// holding `event`'s master `VEVENT` plus any override exceptions.
    /// `event.uid` is required, else [`Error::missing_uid`].
    pub fn to_ical(&self, event: &Event) -> (Option<ICalendar>, Option<Error>) {
        if event.uid.is_empty() {
            return (None, Some(Error::missing_uid()));
        }

        let user_mailto = self.options.user_mailto();
        let mut ctx = Context::new(Mode::JsonToIcal);
        let Some(vevents) = export::to_ical(event, &self.resolver, user_mailto.as_deref(), &mut ctx) else {
            return (None, Some(Error::props(ctx.into_invalid_props())));
        };

        let mut vcalendar = ICalendarComponent::new(ComponentType::VCalendar);
        vcalendar.push(ICalendarProperty::text("VERSION", "2.0"));
        vcalendar.push(ICalendarProperty::text("CALSCALE", "GREGORIAN"));
        for vevent in vevents {
            vcalendar.components.push(vevent);
        }

        let ical_tree = ICalendar { components: vec![vcalendar] };
        if ctx.has_errors() {
            (Some(ical_tree), Some(Error::props(ctx.into_invalid_props())))
        } else {
            (Some(ical_tree), None)
        }
    }

    /// Convenience: converts the first master `VEVENT` and serializes it
    /// as JSON, pretty or compact per [`ConvertOptions::pretty_json`].
    /// Property-level errors are tolerated (the partial event is still
    /// serialized); only a missing event is fatal.
    pub fn as_jevent_string(&self, ical_tree: &ICalendar) -> Result<Vec<u8>> {
        let (event, error) = self.to_jmap(ical_tree, None);
        let Some(event) = event else {
            return Err(error.unwrap_or_else(|| Error::new(ErrorKind::Unknown)));
        };
        let json = if self.options.pretty_json {
            serde_json::to_vec_pretty(&event)
        } else {
            serde_json::to_vec(&event)
        };
        json.map_err(|_| Error::new(ErrorKind::Memory))
    }

    /// Inverse of [`Self::as_jevent_string`]: parses a `jsevent` JSON
    /// document and builds its `VCALENDAR` tree.
    pub fn from_jevent_string(&self, bytes: &[u8]) -> Result<ICalendar> {
        let event: Event = serde_json::from_slice(bytes).map_err(|_| Error::new(ErrorKind::Unknown))?;
        let (ical_tree, error) = self.to_ical(&event);
        match ical_tree {
            Some(tree) => Ok(tree),
            None => Err(error.unwrap_or_else(|| Error::new(ErrorKind::Unknown))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_calendar() -> ICalendar {
        ICalendar::parse(
            "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:e1\r\nSUMMARY:Standup\r\n\
             DTSTART:20210101T090000Z\r\nDURATION:PT30M\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
        )
        .unwrap()
    }

    #[test]
    fn to_jmap_then_to_ical_round_trips_uid_and_title() {
        let converter = JSCalendarConverter::new(ConvertOptions::default());
        let cal = sample_calendar();
        let (event, error) = converter.to_jmap(&cal, None);
        assert!(error.is_none());
        let event = event.unwrap();
        assert_eq!(event.uid, "e1");
        assert_eq!(event.title.as_deref(), Some("Standup"));

        let (ical_tree, error) = converter.to_ical(&event);
        assert!(error.is_none());
        let ical_tree = ical_tree.unwrap();
        let vevents = ical_tree.vevents();
        assert_eq!(vevents.len(), 1);
        assert_eq!(vevents[0].get("UID").and_then(|p| p.as_text()), Some("e1"));
    }

    #[test]
    fn to_ical_without_uid_is_a_catastrophic_error() {
        let converter = JSCalendarConverter::new(ConvertOptions::default());
        let event = Event::new("");
        let (ical_tree, error) = converter.to_ical(&event);
        assert!(ical_tree.is_none());
        assert_eq!(error.unwrap().kind, ErrorKind::Uid);
    }

    #[test]
    fn to_jmap_all_is_empty_for_calendar_without_vevents() {
        let converter = JSCalendarConverter::new(ConvertOptions::default());
        let cal = ICalendar::parse("BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n").unwrap();
        let (events, error) = converter.to_jmap_all(&cal, None);
        assert!(events.is_empty());
        assert!(error.is_none());
    }

    #[test]
    fn as_jevent_string_round_trips_through_from_jevent_string() {
        let converter = JSCalendarConverter::new(ConvertOptions::default());
        let cal = sample_calendar();
        let bytes = converter.as_jevent_string(&cal).unwrap();
        let ical_tree = converter.from_jevent_string(&bytes).unwrap();
        assert_eq!(ical_tree.vevents().len(), 1);
    }
}
