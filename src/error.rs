/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Error channels. Two kinds per spec.md §7: recoverable property errors,
//! accumulated into [`Error::Props`] and surfaced once per conversion, and
//! catastrophic errors that abort the conversion immediately.
//!
//! Modeled as a plain enum, no `thiserror`: the teacher crate's own error
//! types (`ParseError`, `CalendarExpandError`) are hand-rolled the same
//! way.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Success,
    Callback,
    Memory,
    ICal,
    Props,
    Uid,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub invalid_props: Vec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            invalid_props: Vec::new(),
        }
    }

    pub fn props(mut invalid_props: Vec<String>) -> Self {
        invalid_props.sort();
        invalid_props.dedup();
        Self {
            kind: ErrorKind::Props,
            invalid_props,
        }
    }

    pub fn ical(reason: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ICal,
            invalid_props: vec![reason.into()],
        }
    }

    pub fn missing_uid() -> Self {
        Self::new(ErrorKind::Uid)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Success => write!(f, "success"),
            ErrorKind::Callback => write!(f, "callback aborted the conversion"),
            ErrorKind::Memory => write!(f, "out of memory"),
            ErrorKind::ICal => write!(
                f,
                "malformed iCalendar input: {}",
                self.invalid_props.join(", ")
            ),
            ErrorKind::Props => write!(
                f,
                "invalid properties: {}",
                self.invalid_props.join(", ")
            ),
            ErrorKind::Uid => write!(f, "event is missing a required uid"),
            ErrorKind::Unknown => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
