/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Small convenience constructors used by the JSCalendar export pipeline
//! when assembling new iCalendar properties.

use super::types::*;

impl ICalendarProperty {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, ICalValue::Text(value.into()))
    }

    pub fn uri(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, ICalValue::Uri(value.into()))
    }

    pub fn int(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, ICalValue::Int(value))
    }

    pub fn date_time(name: impl Into<String>, dt: ICalDateTime) -> Self {
        Self::new(name, ICalValue::DateTime(dt))
    }

    pub fn duration(name: impl Into<String>, dur: ICalDuration) -> Self {
        Self::new(name, ICalValue::Duration(dur))
    }

    pub fn jmap_id(self, id: &str) -> Self {
        self.with_param("X-JMAP-ID", id)
    }
}
