//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Mapicore.
//
// Mapicore is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mapicore is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Mapicore. If not, see <http://www.gnu.org/licenses/>.

//! Conversions between Chrono times and FILETIME values, which count 100ns
//! intervals since 1601-01-01 UTC.

use chrono::prelude::*;

/// Seconds between 1601-01-01 and the Unix epoch.
const EPOCH_DELTA: i64 = 11_644_473_600;
const TICKS_PER_SEC: i64 = 10_000_000;

pub fn to_filetime(t: DateTime<Utc>) -> u64 {
    let secs = t.timestamp() + EPOCH_DELTA;
    if secs < 0 {
        return 0;
    }

    let ticks = secs as u64 * TICKS_PER_SEC as u64;
    ticks + u64::from(t.timestamp_subsec_nanos() / 100)
}

pub fn from_filetime(ft: u64) -> Option<DateTime<Utc>> {
    let ticks = ft as i64;
    if ticks < 0 {
        return None;
    }

    let secs = ticks / TICKS_PER_SEC - EPOCH_DELTA;
    let nanos = (ticks % TICKS_PER_SEC) as u32 * 100;
    Utc.timestamp_opt(secs, nanos).single()
}

pub fn now() -> u64 {
    to_filetime(Utc::now())
}
