/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Timezone database lookup. Spec.md declares this an external
//! collaborator ("given a TZID string, returns an Olson zone or a UTC
//! singleton"); this module is the thin, swappable implementation of
//! that collaborator used by the bundled conversion pipelines, backed by
//! `chrono-tz` the same way the teacher crate resolves `TZID` parameters.

use std::str::FromStr;

/// A resolved timezone: either the UTC singleton or a named Olson zone.
/// `Option<Tz>` is used throughout the codecs to represent "floating"
/// (no timezone) as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tz {
    Utc,
    Named(chrono_tz::Tz),
}

impl Tz {
    pub fn chrono_tz(&self) -> chrono_tz::Tz {
        match self {
            Tz::Utc => chrono_tz::UTC,
            Tz::Named(tz) => *tz,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tz::Utc => "Etc/UTC",
            Tz::Named(tz) => tz.name(),
        }
    }
}

/// Resolves a `TZID` parameter value (an IANA/Olson name) to a [`Tz`].
pub trait TzResolver {
    fn resolve(&self, tzid: &str) -> Option<Tz>;
}

/// Default resolver backed by the `chrono-tz` Olson database.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChronoTzResolver;

impl TzResolver for ChronoTzResolver {
    fn resolve(&self, tzid: &str) -> Option<Tz> {
        if tzid.eq_ignore_ascii_case("UTC") || tzid.eq_ignore_ascii_case("Etc/UTC") {
            return Some(Tz::Utc);
        }
        chrono_tz::Tz::from_str(tzid).ok().map(Tz::Named)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_zone() {
        let resolver = ChronoTzResolver;
        assert!(matches!(
            resolver.resolve("America/New_York"),
            Some(Tz::Named(_))
        ));
        assert_eq!(resolver.resolve("UTC"), Some(Tz::Utc));
        assert_eq!(resolver.resolve("not/a-zone"), None);
    }
}
