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

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Included, Unbounded};

/// A set of `u64` values stored as disjoint inclusive ranges.
///
/// After every mutation, no two ranges overlap or touch; ranges which would
/// touch are fused into one.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    parts: BTreeMap<u64, u64>,
}

impl RangeSet {
    /// Create a new, empty set.
    pub fn new() -> Self {
        RangeSet::default()
    }

    /// Create a set containing just a single, simple range.
    pub fn range(lo: u64, hi: u64) -> Self {
        let mut this = RangeSet::new();
        this.insert(lo, hi);
        this
    }

    /// Insert the inclusive range `[lo, hi]`.
    ///
    /// Ranges given backwards are normalised.
    pub fn insert(&mut self, lo: u64, hi: u64) {
        self.insert_raw(lo.min(hi), hi.max(lo));
    }

    pub fn insert_one(&mut self, v: u64) {
        self.insert_raw(v, v);
    }

    fn insert_raw(&mut self, lo: u64, mut hi: u64) {
        // Swallow every later range that overlaps or is right-adjacent.
        loop {
            let following = self
                .parts
                .range((Excluded(lo), Unbounded))
                .next()
                .map(|(&start, &end)| (start, end));

            match following {
                Some((start, end)) if start - 1 <= hi => {
                    hi = hi.max(end);
                    self.parts.remove(&start);
                }
                _ => break,
            }
        }

        let preceding = self
            .parts
            .range((Unbounded, Included(lo)))
            .next_back()
            .map(|(&start, &end)| (start, end));
        if let Some((start, end)) = preceding {
            if end.saturating_add(1) >= lo {
                self.parts.insert(start, hi.max(end));
                return;
            }
        }

        self.parts.insert(lo, hi);
    }

    /// Remove a single value, splitting the range holding it if necessary.
    ///
    /// Returns whether the value was present.
    pub fn remove(&mut self, v: u64) -> bool {
        let containing = self
            .parts
            .range(..=v)
            .next_back()
            .map(|(&start, &end)| (start, end))
            .filter(|&(_, end)| end >= v);
        let (start, end) = match containing {
            Some(r) => r,
            None => return false,
        };

        self.parts.remove(&start);
        if start < v {
            self.parts.insert(start, v - 1);
        }
        if v < end {
            self.parts.insert(v + 1, end);
        }
        true
    }

    /// Remove every value in the inclusive range `[lo, hi]`, trimming or
    /// splitting the ranges it touches.
    pub fn remove_range(&mut self, lo: u64, hi: u64) {
        let (lo, hi) = (lo.min(hi), hi.max(lo));
        let overlapping: Vec<(u64, u64)> = self
            .parts
            .range(..=hi)
            .rev()
            .take_while(|&(_, &end)| end >= lo)
            .map(|(&start, &end)| (start, end))
            .collect();

        for (start, end) in overlapping {
            self.parts.remove(&start);
            if start < lo {
                self.parts.insert(start, lo - 1);
            }
            if end > hi {
                self.parts.insert(hi + 1, end);
            }
        }
    }

    /// Remove every value of `other` from this set.
    pub fn subtract(&mut self, other: &RangeSet) {
        for (lo, hi) in other.ranges() {
            self.remove_range(lo, hi);
        }
    }

    /// Return whether the given value is present in this set.
    pub fn contains(&self, v: u64) -> bool {
        self.parts
            .range(..=v)
            .next_back()
            .filter(|&(_, &end)| end >= v)
            .is_some()
    }

    /// Iterate over the ranges in ascending order.
    pub fn ranges(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.parts.iter().map(|(&start, &end)| (start, end))
    }

    /// Iterate over every value in ascending order.
    pub fn items(&self) -> impl Iterator<Item = u64> + '_ {
        self.ranges().flat_map(|(start, end)| start..=end)
    }

    /// Add every value of `other` to this set.
    pub fn union(&mut self, other: &RangeSet) {
        for (lo, hi) in other.ranges() {
            self.insert_raw(lo, hi);
        }
    }

    pub fn range_count(&self) -> usize {
        self.parts.len()
    }

    /// Return the total number of values in the set.
    pub fn len(&self) -> u64 {
        self.ranges().map(|(start, end)| end - start + 1).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn max(&self) -> Option<u64> {
        self.parts.values().next_back().copied()
    }
}

impl fmt::Debug for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (ix, (start, end)) in self.ranges().enumerate() {
            let delim = if 0 == ix { "" } else { "," };
            if start == end {
                write!(f, "{}{}", delim, start)?;
            } else {
                write!(f, "{}{}:{}", delim, start, end)?;
            }
        }
        write!(f, "]")
    }
}
