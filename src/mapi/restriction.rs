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

use std::cmp::Ordering;

use super::model::{PropTag, PropValues, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl RelOp {
    fn test(self, ord: Ordering) -> bool {
        match self {
            RelOp::Lt => Ordering::Less == ord,
            RelOp::Le => Ordering::Greater != ord,
            RelOp::Gt => Ordering::Greater == ord,
            RelOp::Ge => Ordering::Less != ord,
            RelOp::Eq => Ordering::Equal == ord,
            RelOp::Ne => Ordering::Equal != ord,
        }
    }
}

/// A filter over the properties of a table row.
#[derive(Clone, Debug, PartialEq)]
pub enum Restriction {
    And(Vec<Restriction>),
    Or(Vec<Restriction>),
    Not(Box<Restriction>),
    Property {
        op: RelOp,
        tag: PropTag,
        value: Value,
    },
    Exist(PropTag),
}

impl Restriction {
    pub fn property(op: RelOp, tag: PropTag, value: Value) -> Self {
        Restriction::Property { op, tag, value }
    }

    /// Evaluate this restriction against `row`.
    ///
    /// A property comparison against an absent or incomparable value is
    /// false, whatever the operator.
    pub fn matches(&self, row: &PropValues) -> bool {
        match *self {
            Restriction::And(ref subs) => subs.iter().all(|r| r.matches(row)),
            Restriction::Or(ref subs) => subs.iter().any(|r| r.matches(row)),
            Restriction::Not(ref sub) => !sub.matches(row),
            Restriction::Property { op, tag, ref value } => row
                .get(tag)
                .and_then(|actual| actual.compare(value))
                .map_or(false, |ord| op.test(ord)),
            Restriction::Exist(tag) => row.contains(tag),
        }
    }
}
