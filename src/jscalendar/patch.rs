/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! A JSON-Pointer-keyed patch diff/apply helper (spec.md §1 "assumed
//! available" collaborator), scoped to exactly what the override codec
//! needs: object-shaped patches with add/replace/remove semantics over a
//! `serde_json::Value` tree. Not a general RFC 6902 engine — there is no
//! array-index manipulation, no `move`/`copy`/`test` ops, and a patch is
//! always a flat `path -> value` map rather than an ordered op list.

use serde_json::Value;

/// RFC 6901 JSON-Pointer escaping: `~` -> `~0`, `/` -> `~1`.
fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Builds a `/`-joined JSON Pointer from path segments, escaping each.
pub fn pointer(segments: &[&str]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        out.push_str(&escape_segment(seg));
    }
    out
}

fn split_pointer(path: &str) -> Vec<String> {
    path.split('/').skip(1).map(unescape_segment).collect()
}

/// Computes a minimal patch turning `base` into `target`, restricted to
/// object-shaped diffing: every key present in either object at every
/// nested level is compared, recursing into nested objects and treating
/// arrays/scalars as atomic (a changed array is a single `replace`, never
/// diffed element-by-element).
pub fn diff(base: &Value, target: &Value) -> serde_json::Map<String, Value> {
    let mut patch = serde_json::Map::new();
    diff_into(&mut patch, &[], base, target);
    patch
}

fn diff_into(patch: &mut serde_json::Map<String, Value>, path: &[&str], base: &Value, target: &Value) {
    match (base, target) {
        (Value::Object(b), Value::Object(t)) => {
            let mut keys: Vec<&String> = b.keys().chain(t.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let mut next_path: Vec<&str> = path.to_vec();
                next_path.push(key.as_str());
                match (b.get(key), t.get(key)) {
                    (Some(bv), Some(tv)) if bv == tv => {}
                    (Some(bv), Some(tv)) => diff_into(patch, &next_path, bv, tv),
                    (None, Some(tv)) => {
                        patch.insert(pointer(&next_path), tv.clone());
                    }
                    (Some(_), None) => {
                        patch.insert(pointer(&next_path), Value::Null);
                    }
                    (None, None) => unreachable!(),
                }
            }
        }
        (b, t) if b != t => {
            patch.insert(pointer(path), t.clone());
        }
        _ => {}
    }
}

/// Applies a JSON-Pointer-keyed patch to `base`, returning the patched
/// value. `null` at a path means *remove*; anything else means *set*
/// (creating intermediate objects as needed).
pub fn apply(base: &Value, patch: &serde_json::Map<String, Value>) -> Value {
    let mut out = base.clone();
    for (path, value) in patch {
        let segments = split_pointer(path);
        if segments.is_empty() {
            continue;
        }
        apply_one(&mut out, &segments, value);
    }
    out
}

fn apply_one(target: &mut Value, segments: &[String], value: &Value) {
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    let obj = target.as_object_mut().unwrap();

    if segments.len() == 1 {
        if value.is_null() {
            obj.remove(&segments[0]);
        } else {
            obj.insert(segments[0].clone(), value.clone());
        }
        return;
    }

    let entry = obj
        .entry(segments[0].clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    apply_one(entry, &segments[1..], value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_finds_changed_and_added_and_removed_keys() {
        let base = json!({"title": "Standup", "duration": "PT15M", "keep": 1});
        let target = json!({"title": "All Hands", "keep": 1, "location": "Room A"});
        let patch = diff(&base, &target);
        assert_eq!(patch.get("/title"), Some(&json!("All Hands")));
        assert_eq!(patch.get("/duration"), Some(&json!(null)));
        assert_eq!(patch.get("/location"), Some(&json!("Room A")));
        assert!(!patch.contains_key("/keep"));
    }

    #[test]
    fn diff_recurses_into_nested_objects() {
        let base = json!({"participants": {"p1": {"roles": {"attendee": true}}}});
        let target = json!({"participants": {"p1": {"roles": {"attendee": true, "chair": true}}}});
        let patch = diff(&base, &target);
        assert_eq!(
            patch.get("/participants/p1/roles/chair"),
            Some(&json!(true))
        );
    }

    #[test]
    fn apply_round_trips_against_diff() {
        let base = json!({"title": "Standup", "duration": "PT15M"});
        let target = json!({"title": "All Hands", "location": "Room A"});
        let patch = diff(&base, &target);
        let applied = apply(&base, &patch);
        assert_eq!(applied.get("title"), Some(&json!("All Hands")));
        assert_eq!(applied.get("location"), Some(&json!("Room A")));
        assert_eq!(applied.get("duration"), None);
    }

    #[test]
    fn pointer_escapes_tilde_and_slash() {
        assert_eq!(pointer(&["a/b", "c~d"]), "/a~1b/c~0d");
    }
}
