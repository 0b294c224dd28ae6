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
use std::fmt;
use std::iter::FromIterator;

use crate::support::error::EcCode;

pub const PT_UNSPECIFIED: u16 = 0x0000;
pub const PT_NULL: u16 = 0x0001;
pub const PT_SHORT: u16 = 0x0002;
pub const PT_LONG: u16 = 0x0003;
pub const PT_DOUBLE: u16 = 0x0005;
pub const PT_ERROR: u16 = 0x000A;
pub const PT_BOOLEAN: u16 = 0x000B;
pub const PT_OBJECT: u16 = 0x000D;
pub const PT_I8: u16 = 0x0014;
pub const PT_STRING8: u16 = 0x001E;
pub const PT_UNICODE: u16 = 0x001F;
pub const PT_SYSTIME: u16 = 0x0040;
pub const PT_CLSID: u16 = 0x0048;
pub const PT_BINARY: u16 = 0x0102;
pub const PT_MV_LONG: u16 = 0x1003;
pub const PT_MV_UNICODE: u16 = 0x101F;
pub const PT_MV_BINARY: u16 = 0x1102;

/// A property tag: a 16-bit property id in the high half and a 16-bit type
/// in the low half.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropTag(pub u32);

impl PropTag {
    /// The first id of the named-property range.
    pub const NAMED_BASE: u16 = 0x8000;

    pub const fn new(id: u16, prop_type: u16) -> Self {
        PropTag(((id as u32) << 16) | prop_type as u32)
    }

    pub const fn id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn prop_type(self) -> u16 {
        self.0 as u16
    }

    pub const fn with_type(self, prop_type: u16) -> Self {
        PropTag::new(self.id(), prop_type)
    }

    pub const fn is_named(self) -> bool {
        self.id() >= PropTag::NAMED_BASE
    }
}

impl fmt::Debug for PropTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PropTag({:#010x})", self.0)
    }
}

impl fmt::Display for PropTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x}h", self.0)
    }
}

/// A GUID, held in its wire byte order (first three fields little-endian).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    pub const NIL: Self = Guid([0; 16]);

    pub const fn new(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        Guid([
            d1 as u8,
            (d1 >> 8) as u8,
            (d1 >> 16) as u8,
            (d1 >> 24) as u8,
            d2 as u8,
            (d2 >> 8) as u8,
            d3 as u8,
            (d3 >> 8) as u8,
            d4[0],
            d4[1],
            d4[2],
            d4[3],
            d4[4],
            d4[5],
            d4[6],
            d4[7],
        ])
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 16 {
            return None;
        }

        let mut this = Guid::NIL;
        this.0.copy_from_slice(&bytes[..16]);
        Some(this)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-\
             {:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[3],
            b[2],
            b[1],
            b[0],
            b[5],
            b[4],
            b[7],
            b[6],
            b[8],
            b[9],
            b[10],
            b[11],
            b[12],
            b[13],
            b[14],
            b[15],
        )
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}}}", self)
    }
}

const MAPI_D4: [u8; 8] = [0xC0, 0, 0, 0, 0, 0, 0, 0x46];

pub const PS_MAPI: Guid = Guid::new(0x0002_0328, 0, 0, MAPI_D4);
pub const PS_PUBLIC_STRINGS: Guid = Guid::new(0x0002_0329, 0, 0, MAPI_D4);
pub const PS_INTERNET_HEADERS: Guid = Guid::new(0x0002_0386, 0, 0, MAPI_D4);
pub const PSETID_APPOINTMENT: Guid = Guid::new(0x0006_2002, 0, 0, MAPI_D4);
pub const PSETID_TASK: Guid = Guid::new(0x0006_2003, 0, 0, MAPI_D4);
pub const PSETID_ADDRESS: Guid = Guid::new(0x0006_2004, 0, 0, MAPI_D4);
pub const PSETID_COMMON: Guid = Guid::new(0x0006_2008, 0, 0, MAPI_D4);

/// How a named property is identified within its namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NameKind {
    Lid(u32),
    Name(String),
    /// A kind byte this implementation does not understand. Such names never
    /// resolve.
    Unknown(u8),
}

/// The permanent identity of a named property.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyName {
    pub guid: Guid,
    pub kind: NameKind,
}

impl PropertyName {
    pub fn lid(guid: Guid, lid: u32) -> Self {
        PropertyName {
            guid,
            kind: NameKind::Lid(lid),
        }
    }

    pub fn name(guid: Guid, name: impl Into<String>) -> Self {
        PropertyName {
            guid,
            kind: NameKind::Name(name.into()),
        }
    }

    /// Return the case-insensitive canonical string form of this name, or
    /// `None` if the kind is not one that can be canonicalised.
    pub fn packed_key(&self) -> Option<String> {
        let packed = match self.kind {
            NameKind::Lid(lid) => format!("{}:lid:{}", self.guid, lid),
            NameKind::Name(ref name) => {
                format!("{}:name:{}", self.guid, name)
            }
            NameKind::Unknown(..) => return None,
        };
        Some(packed.to_lowercase())
    }
}

/// A property value.
///
/// `String8` holds text in whatever code page is associated with the
/// context it came from; `Unicode` is always UTF-8 in memory.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Short(i16),
    Long(u32),
    Double(f64),
    Boolean(bool),
    I8(u64),
    String8(Vec<u8>),
    Unicode(String),
    /// A FILETIME: 100ns intervals since 1601-01-01.
    SysTime(u64),
    Guid(Guid),
    Binary(Vec<u8>),
    MvLong(Vec<u32>),
    MvUnicode(Vec<String>),
    MvBinary(Vec<Vec<u8>>),
    Error(EcCode),
    /// A value whose concrete type travels with it, used to answer requests
    /// made with `PT_UNSPECIFIED`.
    Typed(u16, Box<Value>),
}

impl Value {
    /// The wire type code of this value.
    pub fn prop_type(&self) -> u16 {
        match *self {
            Value::Null => PT_NULL,
            Value::Short(..) => PT_SHORT,
            Value::Long(..) => PT_LONG,
            Value::Double(..) => PT_DOUBLE,
            Value::Boolean(..) => PT_BOOLEAN,
            Value::I8(..) => PT_I8,
            Value::String8(..) => PT_STRING8,
            Value::Unicode(..) => PT_UNICODE,
            Value::SysTime(..) => PT_SYSTIME,
            Value::Guid(..) => PT_CLSID,
            Value::Binary(..) => PT_BINARY,
            Value::MvLong(..) => PT_MV_LONG,
            Value::MvUnicode(..) => PT_MV_UNICODE,
            Value::MvBinary(..) => PT_MV_BINARY,
            Value::Error(..) => PT_ERROR,
            Value::Typed(..) => PT_UNSPECIFIED,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::Long(v) => Some(v),
            Value::Short(v) => Some(v as u32),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::I8(v) | Value::SysTime(v) => Some(v),
            Value::Long(v) => Some(v.into()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::Unicode(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match *self {
            Value::Binary(ref b) | Value::String8(ref b) => Some(b),
            _ => None,
        }
    }

    /// Compare two values of compatible types for restriction evaluation.
    ///
    /// Strings compare case-insensitively. Incomparable pairs yield `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (&Value::Boolean(a), &Value::Boolean(b)) => Some(a.cmp(&b)),
            (&Value::Double(a), &Value::Double(b)) => a.partial_cmp(&b),
            (&Value::Unicode(ref a), &Value::Unicode(ref b)) => {
                Some(a.to_lowercase().cmp(&b.to_lowercase()))
            }
            (&Value::String8(ref a), &Value::String8(ref b)) => Some(
                a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
            ),
            (&Value::Binary(ref a), &Value::Binary(ref b)) => Some(a.cmp(b)),
            (&Value::Guid(ref a), &Value::Guid(ref b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_u64(), b.as_u64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropVal {
    pub tag: PropTag,
    pub value: Value,
}

impl PropVal {
    pub fn new(tag: PropTag, value: Value) -> Self {
        PropVal { tag, value }
    }

    /// Build the placeholder sent in place of a value that could not be
    /// produced.
    pub fn error(tag: PropTag, code: EcCode) -> Self {
        PropVal {
            tag: tag.with_type(PT_ERROR),
            value: Value::Error(code),
        }
    }
}

/// An ordered list of property values, keyed by exact tag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropValues(Vec<PropVal>);

impl PropValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: PropTag) -> Option<&Value> {
        self.0.iter().find(|pv| pv.tag == tag).map(|pv| &pv.value)
    }

    pub fn get_u32(&self, tag: PropTag) -> Option<u32> {
        self.get(tag).and_then(Value::as_u32)
    }

    pub fn get_u64(&self, tag: PropTag) -> Option<u64> {
        self.get(tag).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, tag: PropTag) -> Option<bool> {
        self.get(tag).and_then(Value::as_bool)
    }

    pub fn get_bytes(&self, tag: PropTag) -> Option<&[u8]> {
        self.get(tag).and_then(Value::as_bytes)
    }

    pub fn get_str(&self, tag: PropTag) -> Option<&str> {
        self.get(tag).and_then(Value::as_str)
    }

    pub fn contains(&self, tag: PropTag) -> bool {
        self.0.iter().any(|pv| pv.tag == tag)
    }

    /// Set `tag` to `value`, replacing any existing value in place.
    pub fn set(&mut self, tag: PropTag, value: Value) {
        match self.0.iter_mut().find(|pv| pv.tag == tag) {
            Some(pv) => pv.value = value,
            None => self.0.push(PropVal::new(tag, value)),
        }
    }

    /// Remove `tag`, returning whether it was present.
    pub fn remove(&mut self, tag: PropTag) -> bool {
        let before = self.0.len();
        self.0.retain(|pv| pv.tag != tag);
        before != self.0.len()
    }

    pub fn push(&mut self, pv: PropVal) {
        self.0.push(pv);
    }

    pub fn extend(&mut self, other: PropValues) {
        self.0.extend(other.0);
    }

    pub fn tags(&self) -> Vec<PropTag> {
        self.0.iter().map(|pv| pv.tag).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropVal> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<PropVal> {
        self.0
    }
}

impl FromIterator<PropVal> for PropValues {
    fn from_iter<I: IntoIterator<Item = PropVal>>(it: I) -> Self {
        PropValues(it.into_iter().collect())
    }
}

impl IntoIterator for PropValues {
    type Item = PropVal;
    type IntoIter = std::vec::IntoIter<PropVal>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<PropVal>> for PropValues {
    fn from(v: Vec<PropVal>) -> Self {
        PropValues(v)
    }
}

/// A per-value failure within a batch property operation.
///
/// `index` refers to the position of the value in the caller's request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropProblem {
    pub index: u16,
    pub tag: PropTag,
    pub err: EcCode,
}

impl PropProblem {
    pub fn new(index: usize, tag: PropTag, err: EcCode) -> Self {
        PropProblem {
            index: index as u16,
            tag,
            err,
        }
    }
}

/// Rewrite the indices of `problems`, which refer to positions in a
/// filtered request, back to positions in the original request.
pub fn remap_problems(problems: &mut [PropProblem], original_indices: &[u16]) {
    for problem in problems {
        if let Some(&orig) = original_indices.get(usize::from(problem.index)) {
            problem.index = orig;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tag_parts() {
        let tag = PropTag(0x3001_001F);
        assert_eq!(0x3001, tag.id());
        assert_eq!(PT_UNICODE, tag.prop_type());
        assert_eq!(PropTag(0x3001_001E), tag.with_type(PT_STRING8));
        assert!(!tag.is_named());
        assert!(PropTag::new(0x8001, PT_LONG).is_named());
    }

    #[test]
    fn guid_display() {
        assert_eq!(
            "00020329-0000-0000-c000-000000000046",
            PS_PUBLIC_STRINGS.to_string()
        );
        assert_eq!(0x29, PS_PUBLIC_STRINGS.0[0]);
        assert_eq!(Some(PS_MAPI), Guid::from_slice(&PS_MAPI.0));
        assert_eq!(None, Guid::from_slice(&[1, 2, 3]));
    }

    #[test]
    fn packed_keys_are_case_insensitive() {
        let a = PropertyName::name(PS_PUBLIC_STRINGS, "Keywords");
        let b = PropertyName::name(PS_PUBLIC_STRINGS, "KEYWORDS");
        assert_eq!(a.packed_key(), b.packed_key());
        assert_eq!(
            Some("00062008-0000-0000-c000-000000000046:lid:34101".to_owned()),
            PropertyName::lid(PSETID_COMMON, 34101).packed_key()
        );
        assert_eq!(
            None,
            PropertyName {
                guid: PSETID_COMMON,
                kind: NameKind::Unknown(7),
            }
            .packed_key()
        );
    }

    #[test]
    fn prop_values_set_replaces() {
        let tag = PropTag::new(0x0E07, PT_LONG);
        let mut pv = PropValues::new();
        pv.set(tag, Value::Long(1));
        pv.set(tag, Value::Long(5));
        assert_eq!(1, pv.len());
        assert_eq!(Some(5), pv.get_u32(tag));
        assert!(pv.remove(tag));
        assert!(!pv.remove(tag));
    }

    #[test]
    fn problem_remapping() {
        let tag = PropTag::new(0x3001, PT_UNICODE);
        let mut problems = vec![
            PropProblem::new(0, tag, EcCode::ERROR),
            PropProblem::new(1, tag, EcCode::ERROR),
        ];
        remap_problems(&mut problems, &[2, 5]);
        assert_eq!(2, problems[0].index);
        assert_eq!(5, problems[1].index);
    }
}
