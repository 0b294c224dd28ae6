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

//! 64-bit entry ids.
//!
//! An entry id packs a 16-bit replica id and a 48-bit global counter. In
//! the little-endian byte image of the `u64`, bytes 0..2 hold the replica id
//! (little-endian) and bytes 2..8 hold the counter (big-endian).

use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// The largest representable global counter.
pub const GC_MAX: u64 = (1 << 48) - 1;

/// The replica id of objects created locally.
pub const LOCAL_REPLID: u16 = 1;

pub fn make_eid(replid: u16, gc: u64) -> u64 {
    let mut buf = [0u8; 8];
    LittleEndian::write_u16(&mut buf[..2], replid);
    BigEndian::write_u48(&mut buf[2..], gc & GC_MAX);
    LittleEndian::read_u64(&buf)
}

pub fn make_local_eid(gc: u64) -> u64 {
    make_eid(LOCAL_REPLID, gc)
}

pub fn replid(eid: u64) -> u16 {
    eid as u16
}

pub fn gc_value(eid: u64) -> u64 {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, eid);
    BigEndian::read_u48(&buf[2..])
}

/// The 6-byte big-endian image of a global counter, as found in source keys
/// and change keys.
pub fn gc_bytes(gc: u64) -> [u8; 6] {
    let mut buf = [0u8; 6];
    BigEndian::write_u48(&mut buf, gc & GC_MAX);
    buf
}
