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

//! Id-sets: per-replica sets of global counters, and their GLOBSET wire
//! encoding.

use std::collections::BTreeMap;

use crate::mapi::eid;
use crate::mapi::model::Guid;
use crate::mapi::range_set::RangeSet;
use crate::support::error::Error;

const CMD_END: u8 = 0x00;
const CMD_BITMASK: u8 = 0x42;
const CMD_POP: u8 = 0x50;
const CMD_RANGE: u8 = 0x52;

/// A set of entry ids, grouped by replica.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdSet {
    repls: BTreeMap<u16, RangeSet>,
}

impl IdSet {
    pub fn new() -> Self {
        IdSet::default()
    }

    pub fn insert_eid(&mut self, eid: u64) {
        let gc = eid::gc_value(eid);
        self.insert_range(eid::replid(eid), gc, gc);
    }

    /// Insert the global counters `[lo, hi]` of replica `replid`.
    pub fn insert_range(&mut self, replid: u16, lo: u64, hi: u64) {
        self.repls.entry(replid).or_default().insert(lo, hi);
    }

    pub fn remove_eid(&mut self, eid: u64) -> bool {
        let replid = eid::replid(eid);
        let removed = match self.repls.get_mut(&replid) {
            Some(set) => set.remove(eid::gc_value(eid)),
            None => false,
        };

        if self.repls.get(&replid).map_or(false, RangeSet::is_empty) {
            self.repls.remove(&replid);
        }
        removed
    }

    /// Remove every id of `other` from this set, range by range.
    pub fn subtract(&mut self, other: &IdSet) {
        for (replid, set) in other.replicas() {
            if let Some(mine) = self.repls.get_mut(&replid) {
                mine.subtract(set);
            }
        }
        self.repls.retain(|_, set| !set.is_empty());
    }

    /// The number of ids in the set.
    pub fn len(&self) -> u64 {
        self.repls.values().map(RangeSet::len).sum()
    }

    pub fn contains_eid(&self, eid: u64) -> bool {
        self.repls
            .get(&eid::replid(eid))
            .map_or(false, |set| set.contains(eid::gc_value(eid)))
    }

    pub fn replica(&self, replid: u16) -> Option<&RangeSet> {
        self.repls.get(&replid)
    }

    pub fn replicas(&self) -> impl Iterator<Item = (u16, &RangeSet)> + '_ {
        self.repls.iter().map(|(&replid, set)| (replid, set))
    }

    /// Iterate over every entry id in the set.
    pub fn eids(&self) -> impl Iterator<Item = u64> + '_ {
        self.replicas().flat_map(|(replid, set)| {
            set.items().map(move |gc| eid::make_eid(replid, gc))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.repls.values().all(RangeSet::is_empty)
    }

    /// Serialise in replica-GUID form: for each replica, its 16-byte GUID
    /// followed by a GLOBSET.
    pub fn serialize(
        &self,
        guid_of: impl Fn(u16) -> Option<Guid>,
    ) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        for (replid, set) in self.replicas() {
            if set.is_empty() {
                continue;
            }

            let guid = guid_of(replid).ok_or(Error::InvalidParam)?;
            out.extend_from_slice(&guid.0);
            encode_globset(set, &mut out);
        }
        Ok(out)
    }

    /// Parse the replica-GUID form. Replicas whose GUID `replid_of` does
    /// not know are skipped.
    pub fn deserialize(
        mut bytes: &[u8],
        replid_of: impl Fn(&Guid) -> Option<u16>,
    ) -> Result<Self, Error> {
        let mut this = IdSet::new();
        while !bytes.is_empty() {
            let guid = Guid::from_slice(bytes)
                .ok_or(Error::BadState("truncated replica GUID"))?;
            bytes = &bytes[16..];
            let set = decode_globset(&mut bytes)?;
            if let Some(replid) = replid_of(&guid) {
                this.repls.entry(replid).or_default().union(&set);
            }
        }
        Ok(this)
    }
}

/// Append the GLOBSET encoding of `set`, including the terminating end
/// command.
pub fn encode_globset(set: &RangeSet, out: &mut Vec<u8>) {
    for (lo, hi) in set.ranges() {
        let lo = eid::gc_bytes(lo);
        let hi = eid::gc_bytes(hi);
        if lo == hi {
            out.push(6);
            out.extend_from_slice(&lo);
            continue;
        }

        let common = lo.iter().zip(&hi).take_while(|(a, b)| a == b).count();
        if common > 0 {
            out.push(common as u8);
            out.extend_from_slice(&lo[..common]);
        }
        out.push(CMD_RANGE);
        out.extend_from_slice(&lo[common..]);
        out.extend_from_slice(&hi[common..]);
        if common > 0 {
            out.push(CMD_POP);
        }
    }
    out.push(CMD_END);
}

fn take<'a>(bytes: &mut &'a [u8], n: usize) -> Result<&'a [u8], Error> {
    if bytes.len() < n {
        return Err(Error::BadState("truncated GLOBSET"));
    }

    let (head, tail) = bytes.split_at(n);
    *bytes = tail;
    Ok(head)
}

fn counter(prefix: &[u8], rest: &[u8]) -> u64 {
    prefix
        .iter()
        .chain(rest)
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Decode one GLOBSET from the front of `bytes`, consuming through its end
/// command.
pub fn decode_globset(bytes: &mut &[u8]) -> Result<RangeSet, Error> {
    let mut set = RangeSet::new();
    let mut stack: Vec<u8> = Vec::new();
    let mut push_sizes: Vec<usize> = Vec::new();

    loop {
        let cmd = take(bytes, 1)?[0];
        match cmd {
            CMD_END => break,
            1..=6 => {
                let n = usize::from(cmd);
                if stack.len() + n > 6 {
                    return Err(Error::BadState("GLOBSET push overflow"));
                }

                let data = take(bytes, n)?;
                if stack.len() + n == 6 {
                    let v = counter(&stack, data);
                    set.insert(v, v);
                } else {
                    stack.extend_from_slice(data);
                    push_sizes.push(n);
                }
            }
            CMD_POP => {
                let n = push_sizes
                    .pop()
                    .ok_or(Error::BadState("GLOBSET pop underflow"))?;
                stack.truncate(stack.len() - n);
            }
            CMD_RANGE => {
                let n = 6 - stack.len();
                let lo = counter(&stack, take(bytes, n)?);
                let hi = counter(&stack, take(bytes, n)?);
                if lo > hi {
                    return Err(Error::BadState("GLOBSET range inverted"));
                }
                set.insert(lo, hi);
            }
            CMD_BITMASK => {
                if 5 != stack.len() {
                    return Err(Error::BadState("GLOBSET bitmask misplaced"));
                }

                let args = take(bytes, 2)?;
                let start = counter(&stack, &args[..1]);
                set.insert_one(start);
                for bit in 0..8 {
                    if 0 != args[1] & (1 << bit) {
                        set.insert_one(start + bit + 1);
                    }
                }
            }
            _ => return Err(Error::BadState("unknown GLOBSET command")),
        }
    }

    Ok(set)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::mapi::xid;

    #[test]
    fn eid_membership() {
        let mut set = IdSet::new();
        set.insert_eid(eid::make_eid(1, 0x10));
        set.insert_eid(eid::make_eid(1, 0x11));
        set.insert_eid(eid::make_eid(5, 0x10));
        assert!(set.contains_eid(eid::make_eid(1, 0x11)));
        assert!(!set.contains_eid(eid::make_eid(2, 0x11)));
        assert_eq!(Some(&RangeSet::range(0x10, 0x11)), set.replica(1));

        assert!(set.remove_eid(eid::make_eid(5, 0x10)));
        assert!(set.replica(5).is_none());
        assert_eq!(
            vec![eid::make_eid(1, 0x10), eid::make_eid(1, 0x11)],
            set.eids().collect::<Vec<_>>()
        );
    }

    #[test]
    fn subtraction_is_per_replica() {
        let mut set = IdSet::new();
        set.insert_range(1, 1, 1 << 40);
        set.insert_range(2, 10, 20);
        set.insert_range(3, 7, 7);

        let mut other = IdSet::new();
        other.insert_range(1, 2, (1 << 40) - 1);
        other.insert_range(2, 1, 100);
        other.insert_range(4, 1, 100);
        set.subtract(&other);

        let mut expected = IdSet::new();
        expected.insert_range(1, 1, 1);
        expected.insert_range(1, 1 << 40, 1 << 40);
        expected.insert_range(3, 7, 7);
        assert_eq!(expected, set);
        assert!(set.replica(2).is_none());
        assert_eq!(3, set.len());
    }

    #[test]
    fn globset_encoding() {
        let mut set = RangeSet::new();
        set.insert(0x0102, 0x0102);
        set.insert(0x0200, 0x02FF);
        let mut out = Vec::new();
        encode_globset(&set, &mut out);
        assert_eq!(
            vec![
                6, 0, 0, 0, 0, 0x01, 0x02, // singleton
                5, 0, 0, 0, 0, 0x02, // push
                CMD_RANGE, 0x00, 0xFF, CMD_POP, CMD_END,
            ],
            out
        );

        let mut input = &out[..];
        assert_eq!(set, decode_globset(&mut input).unwrap());
        assert!(input.is_empty());
    }

    #[test]
    fn globset_bitmask() {
        let raw = [5, 0, 0, 0, 0, 0, CMD_BITMASK, 0x10, 0b0000_0101, CMD_END];
        let mut input = &raw[..];
        let set = decode_globset(&mut input).unwrap();
        assert_eq!(vec![0x10, 0x11, 0x13], set.items().collect::<Vec<_>>());
    }

    #[test]
    fn globset_rejects_garbage() {
        for raw in &[
            &[0x07u8][..],
            &[4, 0, 0, 0, 0, 4, 0, 0, 0, 0][..],
            &[CMD_POP][..],
            &[CMD_RANGE, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 1][..],
            &[CMD_BITMASK, 1, 1][..],
            &[6, 0, 0][..],
        ] {
            let mut input = *raw;
            assert_matches!(
                Err(Error::BadState(..)),
                decode_globset(&mut input)
            );
        }
    }

    #[test]
    fn unknown_replicas_are_skipped() {
        let store = xid::user_guid(3);
        let mut set = IdSet::new();
        set.insert_range(1, 4, 9);
        let bytes = set.serialize(|_| Some(store)).unwrap();

        let other = IdSet::deserialize(&bytes, |_| None).unwrap();
        assert!(other.is_empty());

        assert_matches!(Err(Error::InvalidParam), set.serialize(|_| None));
    }

    proptest! {
        #[test]
        fn idset_serialization_round_trip(
            ranges in prop::collection::vec(
                (1u16..4, 0u64..0x2_0000, 0u64..0x300), 0..8),
        ) {
            let mut set = IdSet::new();
            for &(replid, lo, extent) in &ranges {
                set.insert_range(replid, lo, lo + extent);
            }

            let bytes = set
                .serialize(|replid| Some(xid::user_guid(replid.into())))
                .unwrap();
            let parsed = IdSet::deserialize(&bytes, |guid| {
                Some(u16::from_le_bytes([guid.0[0], guid.0[1]]))
            })
            .unwrap();
            prop_assert_eq!(set, parsed);
        }
    }
}
