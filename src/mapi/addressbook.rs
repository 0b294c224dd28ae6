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

//! Legacy distinguished names and address book entry ids.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::mapi::model::Guid;

/// The provider UID of the Exchange address book.
pub const MUIDEMSAB: Guid = Guid([
    0xDC, 0xA7, 0x40, 0xC8, 0xC0, 0x42, 0x10, 0x1A, 0xB4, 0xB9, 0x08, 0x00,
    0x2B, 0x2F, 0xE1, 0x82,
]);

/// Display type of a mail user.
pub const DT_MAILUSER: u32 = 0;

const ADMIN_GROUP: &str = "Exchange Administrative Group (FYDIBOHF23SPDLT)";

/// The identifiers of a user known to the directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserIds {
    pub user_id: u32,
    pub domain_id: u32,
}

/// Build the legacy DN of `username`, which must be of the form
/// `local@domain`.
pub fn username_to_essdn(
    org_name: &str,
    username: &str,
    ids: UserIds,
) -> Option<String> {
    let at = username.find('@')?;
    let local = &username[..at];
    Some(format!(
        "/o={}/ou={}/cn=Recipients/cn={:08x}{:08x}-{}",
        org_name, ADMIN_GROUP, ids.domain_id, ids.user_id, local,
    ))
}

/// Extract the user and domain ids from a legacy DN built by
/// `username_to_essdn`, along with the local part.
pub fn essdn_to_ids<'a>(
    org_name: &str,
    essdn: &'a str,
) -> Option<(UserIds, &'a str)> {
    let prefix =
        format!("/o={}/ou={}/cn=Recipients/cn=", org_name, ADMIN_GROUP);
    match essdn.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(&prefix) => (),
        _ => return None,
    }

    let rest = &essdn[prefix.len()..];
    if rest.len() < 17
        || !rest.is_char_boundary(16)
        || b'-' != rest.as_bytes()[16]
    {
        return None;
    }

    let domain_id = u32::from_str_radix(&rest[..8], 16).ok()?;
    let user_id = u32::from_str_radix(&rest[8..16], 16).ok()?;
    Some((UserIds { user_id, domain_id }, &rest[17..]))
}

/// Build the permanent address book entry id for the object with the given
/// legacy DN.
pub fn ab_entryid(essdn: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(28 + essdn.len() + 1);
    // Writes to a Vec cannot fail
    let _ = out.write_u32::<LittleEndian>(0);
    out.extend_from_slice(&MUIDEMSAB.0);
    let _ = out.write_u32::<LittleEndian>(1);
    let _ = out.write_u32::<LittleEndian>(DT_MAILUSER);
    out.extend_from_slice(essdn.as_bytes());
    out.push(0);
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn essdn_round_trip() {
        let ids = UserIds {
            user_id: 0x2a,
            domain_id: 3,
        };
        let essdn = username_to_essdn("Acme", "joe@example.com", ids).unwrap();
        assert_eq!(
            "/o=Acme/ou=Exchange Administrative Group (FYDIBOHF23SPDLT)\
             /cn=Recipients/cn=000000030000002a-joe",
            essdn
        );
        assert_eq!(Some((ids, "joe")), essdn_to_ids("acme", &essdn));
        assert_eq!(None, essdn_to_ids("Other", &essdn));
        assert_eq!(None, username_to_essdn("Acme", "nodomain", ids));
    }

    #[test]
    fn entryid_layout() {
        let eid = ab_entryid("/o=x");
        assert_eq!(&[0, 0, 0, 0], &eid[..4]);
        assert_eq!(&MUIDEMSAB.0[..], &eid[4..20]);
        assert_eq!(&[1, 0, 0, 0, 0, 0, 0, 0], &eid[20..28]);
        assert_eq!(b"/o=x\0", &eid[28..]);
    }
}
