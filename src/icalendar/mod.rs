/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

pub mod builder;
pub mod parser;
pub mod types;
pub mod writer;

pub use types::*;

impl ICalendar {
    pub fn parse(input: &str) -> Option<Self> {
        parser::parse(input)
    }

    pub fn write(&self) -> String {
        writer::write(self)
    }

    /// The first top-level `VCALENDAR` component, if any.
    pub fn vcalendar(&self) -> Option<&ICalendarComponent> {
        self.components
            .iter()
            .find(|c| c.component_type == ComponentType::VCalendar)
    }

    pub fn vcalendar_mut(&mut self) -> Option<&mut ICalendarComponent> {
        self.components
            .iter_mut()
            .find(|c| c.component_type == ComponentType::VCalendar)
    }

    /// All `VEVENT` components across every `VCALENDAR` at the top level.
    pub fn vevents(&self) -> Vec<&ICalendarComponent> {
        self.components
            .iter()
            .flat_map(|c| c.components.iter())
            .filter(|c| c.component_type == ComponentType::VEvent)
            .collect()
    }
}
