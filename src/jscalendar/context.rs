/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! The conversion context shared by both pipelines (spec.md §2, §4.1):
//! the current JSON-Pointer path, the accumulated invalid-property set,
//! the caller's field filter, the active start/end timezones, and a
//! read/write/exception-build mode flag.
//!
//! The path stack is never exposed for manual push/pop; callers go
//! through [`Context::with_name`], [`Context::with_key`] or
//! [`Context::with_idx`], which always pop on the way out, balanced on
//! every exit path including early returns from the inner closure.

use crate::common::Tz;
use std::collections::BTreeSet;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    IcalToJson,
    JsonToIcal,
    /// A recursive conversion building a recurrence-override exception,
    /// where `uid`, `@type` and a few master-only fields are suppressed.
    Exception,
}

pub struct Context {
    path: Vec<String>,
    invalid_props: BTreeSet<String>,
    want_props: Option<HashSet<String>>,
    start_tz: Option<Tz>,
    end_tz: Option<Tz>,
    mode: Mode,
}

fn encode_segment(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

impl Context {
    pub fn new(mode: Mode) -> Self {
        Self {
            path: Vec::new(),
            invalid_props: BTreeSet::new(),
            want_props: None,
            start_tz: None,
            end_tz: None,
            mode,
        }
    }

    pub fn with_want_props(mut self, want_props: Option<HashSet<String>>) -> Self {
        self.want_props = want_props;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_exception(&self) -> bool {
        self.mode == Mode::Exception
    }

    pub fn enter_exception_mode(&mut self) -> Mode {
        std::mem::replace(&mut self.mode, Mode::Exception)
    }

    pub fn restore_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Whether `field` should be included in the output. `None` means no
    /// filter was requested (include everything).
    pub fn wants(&self, field: &str) -> bool {
        self.want_props
            .as_ref()
            .is_none_or(|set| set.contains(field))
    }

    /// Temporarily disables the field filter, as required when building
    /// the complete master needed to diff `recurrenceOverrides` against
    /// (spec.md §4.10), restoring it afterwards.
    pub fn without_filter<T>(&mut self, f: impl FnOnce(&mut Context) -> T) -> T {
        let saved = self.want_props.take();
        let result = f(self);
        self.want_props = saved;
        result
    }

    pub fn start_tz(&self) -> Option<Tz> {
        self.start_tz
    }

    pub fn end_tz(&self) -> Option<Tz> {
        self.end_tz
    }

    pub fn set_start_tz(&mut self, tz: Option<Tz>) {
        self.start_tz = tz;
    }

    pub fn set_end_tz(&mut self, tz: Option<Tz>) {
        self.end_tz = tz;
    }

    pub fn encode(&self) -> String {
        self.path.join("/")
    }

    /// Records the current path (optionally with `name` appended) as
    /// invalid. A given path is reported at most once, since the
    /// accumulator is a set.
    pub fn invalid(&mut self, name: Option<&str>) {
        let path = match name {
            Some(n) if !self.path.is_empty() => format!("{}/{}", self.encode(), encode_segment(n)),
            Some(n) => encode_segment(n),
            None => self.encode(),
        };
        self.invalid_props.insert(path);
    }

    pub fn has_errors(&self) -> bool {
        !self.invalid_props.is_empty()
    }

    pub fn into_invalid_props(self) -> Vec<String> {
        self.invalid_props.into_iter().collect()
    }

    pub fn invalid_props(&self) -> impl Iterator<Item = &str> {
        self.invalid_props.iter().map(|s| s.as_str())
    }

    pub fn with_name<T>(&mut self, name: &str, f: impl FnOnce(&mut Context) -> T) -> T {
        self.path.push(encode_segment(name));
        let result = f(self);
        self.path.pop();
        result
    }

    pub fn with_key<T>(&mut self, name: &str, key: &str, f: impl FnOnce(&mut Context) -> T) -> T {
        self.path.push(encode_segment(name));
        self.path.push(encode_segment(key));
        let result = f(self);
        self.path.pop();
        self.path.pop();
        result
    }

    pub fn with_idx<T>(&mut self, name: &str, idx: usize, f: impl FnOnce(&mut Context) -> T) -> T {
        self.path.push(encode_segment(name));
        self.path.push(idx.to_string());
        let result = f(self);
        self.path.pop();
        self.path.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_pointer_segments() {
        let mut ctx = Context::new(Mode::IcalToJson);
        ctx.with_key("participants", "a/b~c", |ctx| {
            assert_eq!(ctx.encode(), "participants/a~1b~0c");
        });
        assert_eq!(ctx.encode(), "");
    }

    #[test]
    fn path_balances_on_nested_scopes() {
        let mut ctx = Context::new(Mode::JsonToIcal);
        ctx.with_name("locations", |ctx| {
            ctx.with_idx("locations", 0, |ctx| {
                ctx.invalid(Some("timeZone"));
            });
        });
        assert_eq!(ctx.encode(), "");
        assert_eq!(
            ctx.into_invalid_props(),
            vec!["locations/locations/0/timeZone".to_string()]
        );
    }

    #[test]
    fn invalid_paths_dedupe() {
        let mut ctx = Context::new(Mode::JsonToIcal);
        ctx.invalid(Some("start"));
        ctx.invalid(Some("start"));
        assert_eq!(ctx.into_invalid_props(), vec!["start".to_string()]);
    }

    #[test]
    fn want_props_filters_when_set() {
        let mut set = HashSet::new();
        set.insert("title".to_string());
        let ctx = Context::new(Mode::IcalToJson).with_want_props(Some(set));
        assert!(ctx.wants("title"));
        assert!(!ctx.wants("description"));
    }
}
