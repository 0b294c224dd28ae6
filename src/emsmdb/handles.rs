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

//! The per-logon table of open objects.
//!
//! Every object is reached through a 32-bit handle and has a parent; the
//! logon itself is handle 0. Releasing a handle releases everything opened
//! from it.

use std::collections::BTreeMap;

use super::attachment::Attachment;
use super::ics::IcsDownload;
use super::message::Message;
use crate::support::error::Error;

/// The handle of the logon object.
pub const LOGON_HANDLE: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Folder {
    pub folder_id: u64,
}

/// A cursor over the attachments of an open message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentTable {
    /// Handle of the message whose attachments are listed.
    pub message: u32,
    pub position: usize,
}

#[derive(Debug)]
pub enum RopObject {
    Logon,
    Folder(Folder),
    Message(Box<Message>),
    Attachment(Box<Attachment>),
    AttachmentTable(AttachmentTable),
    IcsDownload(Box<IcsDownload>),
}

#[derive(Debug)]
struct Entry {
    parent: Option<u32>,
    object: RopObject,
}

#[derive(Debug)]
pub struct HandleTable {
    entries: BTreeMap<u32, Entry>,
    next_handle: u32,
    max_handles: usize,
}

macro_rules! boxed_accessor {
    ($name:ident, $name_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self, handle: u32) -> Result<&$ty, Error> {
            match *self.get(handle)? {
                RopObject::$variant(ref o) => Ok(&**o),
                _ => Err(Error::NotSupported),
            }
        }

        pub fn $name_mut(&mut self, handle: u32) -> Result<&mut $ty, Error> {
            match *self.get_mut(handle)? {
                RopObject::$variant(ref mut o) => Ok(&mut **o),
                _ => Err(Error::NotSupported),
            }
        }
    };
}

impl HandleTable {
    pub fn new(max_handles: u32) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            LOGON_HANDLE,
            Entry {
                parent: None,
                object: RopObject::Logon,
            },
        );

        HandleTable {
            entries,
            next_handle: LOGON_HANDLE + 1,
            max_handles: max_handles.max(1) as usize,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register `object` as a child of `parent`, returning its handle.
    pub fn insert(
        &mut self,
        parent: u32,
        object: RopObject,
    ) -> Result<u32, Error> {
        if !self.entries.contains_key(&parent) {
            return Err(Error::NullObject);
        }

        if self.entries.len() >= self.max_handles {
            return Err(Error::OutOfMemory);
        }

        let mut handle = self.next_handle;
        while self.entries.contains_key(&handle) {
            handle = handle.wrapping_add(1);
        }
        self.next_handle = handle.wrapping_add(1);

        self.entries.insert(
            handle,
            Entry {
                parent: Some(parent),
                object,
            },
        );
        Ok(handle)
    }

    pub fn get(&self, handle: u32) -> Result<&RopObject, Error> {
        self.entries
            .get(&handle)
            .map(|e| &e.object)
            .ok_or(Error::NullObject)
    }

    pub fn get_mut(&mut self, handle: u32) -> Result<&mut RopObject, Error> {
        self.entries
            .get_mut(&handle)
            .map(|e| &mut e.object)
            .ok_or(Error::NullObject)
    }

    pub fn parent(&self, handle: u32) -> Result<Option<u32>, Error> {
        self.entries
            .get(&handle)
            .map(|e| e.parent)
            .ok_or(Error::NullObject)
    }

    /// Release `handle` and every object below it. Releasing the logon
    /// handle clears everything but the logon.
    pub fn release(&mut self, handle: u32) -> Result<(), Error> {
        if !self.entries.contains_key(&handle) {
            return Err(Error::NullObject);
        }

        let mut doomed = vec![handle];
        let mut ix = 0;
        while ix < doomed.len() {
            let current = doomed[ix];
            doomed.extend(
                self.entries
                    .iter()
                    .filter(|&(_, e)| Some(current) == e.parent)
                    .map(|(&h, _)| h),
            );
            ix += 1;
        }

        for h in doomed {
            if LOGON_HANDLE != h {
                self.entries.remove(&h);
            }
        }
        Ok(())
    }

    pub fn folder(&self, handle: u32) -> Result<Folder, Error> {
        match *self.get(handle)? {
            RopObject::Folder(folder) => Ok(folder),
            _ => Err(Error::NotSupported),
        }
    }

    pub fn attachment_table_mut(
        &mut self,
        handle: u32,
    ) -> Result<&mut AttachmentTable, Error> {
        match *self.get_mut(handle)? {
            RopObject::AttachmentTable(ref mut table) => Ok(table),
            _ => Err(Error::NotSupported),
        }
    }

    boxed_accessor!(message, message_mut, Message, Message);
    boxed_accessor!(attachment, attachment_mut, Attachment, Attachment);
    boxed_accessor!(
        ics_download,
        ics_download_mut,
        IcsDownload,
        IcsDownload
    );
}

#[cfg(test)]
mod test {
    use super::*;

    fn folder(fid: u64) -> RopObject {
        RopObject::Folder(Folder { folder_id: fid })
    }

    #[test]
    fn kind_checked_access() {
        let mut table = HandleTable::new(16);
        let h = table.insert(LOGON_HANDLE, folder(5)).unwrap();
        assert_ne!(LOGON_HANDLE, h);
        assert_eq!(5, table.folder(h).unwrap().folder_id);
        assert_matches!(Err(Error::NotSupported), table.message(h));
        assert_matches!(
            Err(Error::NotSupported),
            table.folder(LOGON_HANDLE)
        );
        assert_matches!(Err(Error::NullObject), table.folder(h + 100));
        assert_matches!(
            Err(Error::NullObject),
            table.insert(h + 100, folder(6))
        );
    }

    #[test]
    fn release_cascades() {
        let mut table = HandleTable::new(16);
        let a = table.insert(LOGON_HANDLE, folder(1)).unwrap();
        let b = table.insert(a, folder(2)).unwrap();
        let c = table.insert(b, folder(3)).unwrap();
        let d = table.insert(LOGON_HANDLE, folder(4)).unwrap();
        assert_eq!(5, table.len());
        assert_eq!(Some(a), table.parent(b).unwrap());

        table.release(a).unwrap();
        assert_matches!(Err(Error::NullObject), table.get(a));
        assert_matches!(Err(Error::NullObject), table.get(b));
        assert_matches!(Err(Error::NullObject), table.get(c));
        assert!(table.get(d).is_ok());
        assert_matches!(Err(Error::NullObject), table.release(a));

        table.release(LOGON_HANDLE).unwrap();
        assert_eq!(1, table.len());
        assert!(table.get(LOGON_HANDLE).is_ok());
    }

    #[test]
    fn table_is_bounded() {
        let mut table = HandleTable::new(3);
        table.insert(LOGON_HANDLE, folder(1)).unwrap();
        let h = table.insert(LOGON_HANDLE, folder(2)).unwrap();
        assert_matches!(
            Err(Error::OutOfMemory),
            table.insert(LOGON_HANDLE, folder(3))
        );

        table.release(h).unwrap();
        let again = table.insert(LOGON_HANDLE, folder(3)).unwrap();
        assert_ne!(h, again);
    }
}
