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

//! Plain property access on objects held in memory, such as open messages
//! and attachments.

use crate::mapi::model::*;
use crate::mapi::tags::PR_BODY_A;
use crate::support::charset;
use crate::support::error::Error;

/// Look up `tag` in `props`.
///
/// Text is converted between its 8-bit and Unicode forms with `cpid` as
/// needed, and `PT_UNSPECIFIED` requests are answered with whatever type is
/// held under the same id.
pub fn lookup(
    props: &PropValues,
    tag: PropTag,
    cpid: u32,
) -> Result<Option<PropVal>, Error> {
    if let Some(value) = props.get(tag) {
        return Ok(Some(PropVal::new(tag, value.clone())));
    }

    let value = match tag.prop_type() {
        PT_UNSPECIFIED => props
            .iter()
            .find(|pv| pv.tag.id() == tag.id())
            .map(|pv| {
                Value::Typed(pv.value.prop_type(), Box::new(pv.value.clone()))
            }),
        PT_STRING8 => props
            .get_str(tag.with_type(PT_UNICODE))
            .map(|text| charset::encode(cpid, text))
            .transpose()?
            .map(Value::String8),
        PT_UNICODE => match props.get(tag.with_type(PT_STRING8)) {
            Some(&Value::String8(ref bytes)) => {
                Some(Value::Unicode(charset::decode(cpid, bytes)?))
            }
            _ => None,
        },
        _ => None,
    };

    Ok(value.map(|value| PropVal::new(tag, value)))
}

/// Put `pv` into `props`, replacing both text forms of the same property.
///
/// 8-bit text other than `PR_BODY_A` is held as Unicode. A value whose type
/// does not match its tag is refused with `InvalidParam`.
pub fn store(
    props: &mut PropValues,
    pv: &PropVal,
    cpid: u32,
) -> Result<(), Error> {
    if pv.value.prop_type() != pv.tag.prop_type() {
        return Err(Error::InvalidParam);
    }

    match pv.value {
        Value::String8(ref bytes) if PR_BODY_A != pv.tag => {
            let text = charset::decode(cpid, bytes)?;
            props.remove(pv.tag);
            props.set(pv.tag.with_type(PT_UNICODE), Value::Unicode(text));
        }
        Value::String8(..) => {
            props.remove(pv.tag.with_type(PT_UNICODE));
            props.set(pv.tag, pv.value.clone());
        }
        Value::Unicode(..) => {
            props.remove(pv.tag.with_type(PT_STRING8));
            props.set(pv.tag, pv.value.clone());
        }
        _ => props.set(pv.tag, pv.value.clone()),
    }

    Ok(())
}

/// Remove every form of the property `tag` names, returning whether any
/// was present.
pub fn remove(props: &mut PropValues, tag: PropTag) -> bool {
    match tag.prop_type() {
        PT_STRING8 | PT_UNICODE | PT_UNSPECIFIED => {
            let ids: Vec<PropTag> = props
                .iter()
                .map(|pv| pv.tag)
                .filter(|t| t.id() == tag.id())
                .collect();
            ids.into_iter().fold(false, |any, t| props.remove(t) || any)
        }
        _ => props.remove(tag),
    }
}
