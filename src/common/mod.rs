/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Primitives shared between the iCalendar tree and the JSCalendar codecs:
//! the stable-id canonicalizer and the timezone resolver.

pub mod id;
pub mod timezone;

pub use id::JmapId;
pub use timezone::{Tz, TzResolver};
