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

//! Change keys and predecessor change lists.

use crate::mapi::eid;
use crate::mapi::model::Guid;

/// Change numbers are allocated from this value upwards, so every change
/// key minted here has the top bit of its counter set.
pub const CHANGE_NUMBER_BEGIN: u64 = 1 << 47;

/// The fixed trailing 12 bytes of private store GUIDs.
pub const PRIVATE_STORE_SEGMENT: [u8; 12] = [
    0xFB, 0x0A, 0x09, 0x00, 0x91, 0x92, 0x49, 0x88, 0x6A, 0xA7, 0x38, 0xCE,
];
/// The fixed trailing 12 bytes of public store GUIDs.
pub const PUBLIC_STORE_SEGMENT: [u8; 12] = [
    0xFB, 0x0A, 0xF6, 0x7D, 0x91, 0x92, 0x49, 0x88, 0x6A, 0xA7, 0x38, 0xCE,
];

fn store_guid(id: u32, segment: &[u8; 12]) -> Guid {
    let mut guid = Guid::NIL;
    guid.0[..4].copy_from_slice(&id.to_le_bytes());
    guid.0[4..].copy_from_slice(segment);
    guid
}

/// The database GUID of a user's private store.
pub fn user_guid(account_id: u32) -> Guid {
    store_guid(account_id, &PRIVATE_STORE_SEGMENT)
}

/// The database GUID of a domain's public store.
pub fn domain_guid(domain_id: u32) -> Guid {
    store_guid(domain_id, &PUBLIC_STORE_SEGMENT)
}

/// A namespace GUID plus a local id of 1 to 8 bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Xid {
    pub guid: Guid,
    pub local_id: Vec<u8>,
}

impl Xid {
    pub fn new(guid: Guid, gc: u64) -> Self {
        Xid {
            guid,
            local_id: eid::gc_bytes(gc).to_vec(),
        }
    }

    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() <= 16 || bytes.len() > 24 {
            return None;
        }

        Some(Xid {
            guid: Guid::from_slice(bytes)?,
            local_id: bytes[16..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.local_id.len());
        out.extend_from_slice(&self.guid.0);
        out.extend_from_slice(&self.local_id);
        out
    }
}

/// Return whether `key` has an acceptable change key size.
pub fn change_key_size_ok(key: &[u8]) -> bool {
    key.len() >= 16 && key.len() <= 24
}

/// Return whether a change key minted for one of our own stores has a
/// counter in the change number space.
///
/// Keys of other shapes or from foreign namespaces are always accepted.
pub fn change_key_gc_ok(key: &[u8]) -> bool {
    if key.len() != 22 {
        return true;
    }

    let segment = &key[4..16];
    if segment != PRIVATE_STORE_SEGMENT && segment != PUBLIC_STORE_SEGMENT {
        return true;
    }

    0 != key[16] & 0x80
}

/// A predecessor change list: at most one XID per namespace, each the
/// newest change seen from that namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pcl(Vec<Xid>);

impl Pcl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the wire form: a sequence of (u8 size, XID) pairs.
    pub fn parse(mut bytes: &[u8]) -> Option<Self> {
        let mut this = Pcl::new();
        while let Some((&size, rest)) = bytes.split_first() {
            let size = usize::from(size);
            if rest.len() < size {
                return None;
            }

            this.merge(Xid::parse(&rest[..size])?);
            bytes = &rest[size..];
        }

        Some(this)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for xid in &self.0 {
            let bytes = xid.to_bytes();
            out.push(bytes.len() as u8);
            out.extend_from_slice(&bytes);
        }
        out
    }

    /// Add `xid`, keeping only the newer of it and any existing entry for
    /// the same namespace.
    pub fn merge(&mut self, xid: Xid) {
        match self.0.iter_mut().find(|x| x.guid == xid.guid) {
            Some(existing) => {
                if local_id_value(&xid.local_id)
                    > local_id_value(&existing.local_id)
                {
                    *existing = xid;
                }
            }
            None => self.0.push(xid),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn local_id_value(local_id: &[u8]) -> u64 {
    local_id.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
