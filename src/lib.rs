/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Bidirectional conversion between iCalendar (RFC 5545) `VEVENT`/`VCALENDAR`
//! trees and JSCalendar `jsevent` JSON objects.
//!
//! [`icalendar`] is the RFC 5545 component tree, tokenizer and writer.
//! [`jscalendar`] is the conversion core: [`jscalendar::JSCalendarConverter`]
//! is the entry point, wrapping the field-by-field codecs in
//! `jscalendar::{import, export, recurrence, participants, locations,
//! alarms, links, overrides}` plus the shared [`jscalendar::context::Context`].

pub mod common;
pub mod error;
pub mod icalendar;
pub mod jscalendar;

pub use error::{Error, ErrorKind, Result};
