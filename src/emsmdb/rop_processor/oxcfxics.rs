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

//! Incremental change synchronisation operations.

use log::warn;

use super::defs::*;
use crate::emsmdb::handles::RopObject;
use crate::emsmdb::ics::{
    Deletions, FolderChange, IcsDownload, MessageChange, ReadStates,
    SyncCounts, SyncFlags, SyncType,
};
use crate::mapi::restriction::Restriction;
use crate::store::FolderRights;
use crate::support::error::Error;

impl RopProcessor {
    /// Set up a download context for the folder open as `hin`.
    pub fn rop_syncconfigure(
        &mut self,
        hin: u32,
        sync_type: SyncType,
        flags: u16,
        restriction: Option<Restriction>,
    ) -> RopResult<u32> {
        self.syncconfigure(hin, sync_type, flags, restriction)
            .map_err(map_error!(self))
    }

    fn syncconfigure(
        &mut self,
        hin: u32,
        sync_type: SyncType,
        flags: u16,
        restriction: Option<Restriction>,
    ) -> Result<u32, Error> {
        let folder = self.handles.folder(hin)?;
        let flags = SyncFlags::from_bits_truncate(flags);

        if let Some(user) = self.logon.eff_user() {
            let rights = self
                .logon
                .store()
                .get_folder_perm(folder.folder_id, user)?;
            let needed = match sync_type {
                SyncType::Contents => {
                    FolderRights::READ_ANY | FolderRights::OWNER
                }
                SyncType::Hierarchy => {
                    FolderRights::VISIBLE
                        | FolderRights::READ_ANY
                        | FolderRights::OWNER
                }
            };
            if !rights.intersects(needed) {
                warn!(
                    "{} Refused synchronisation of folder {:#x}",
                    self.log_prefix, folder.folder_id
                );
                return Err(Error::AccessDenied);
            }
        }

        let ctx =
            IcsDownload::new(sync_type, folder.folder_id, flags, restriction);
        self.handles
            .insert(hin, RopObject::IcsDownload(Box::new(ctx)))
    }

    /// Install the state the client saved at the end of its last sync.
    pub fn rop_syncsetstate(&mut self, hin: u32, blob: &[u8]) -> RopResult<()> {
        let logon = &self.logon;
        self.handles
            .ics_download_mut(hin)
            .and_then(|ctx| ctx.set_state(logon, blob))
            .map_err(map_error!(self))
    }

    /// Compute what changed since the installed state.
    pub fn rop_syncmake(&mut self, hin: u32) -> RopResult<SyncCounts> {
        let logon = &self.logon;
        self.handles
            .ics_download_mut(hin)
            .and_then(|ctx| match ctx.sync_type() {
                SyncType::Contents => ctx.make_content(logon),
                SyncType::Hierarchy => ctx.make_hierarchy(logon),
            })
            .map_err(map_error!(self))
    }

    pub fn rop_syncmessagechange(
        &mut self,
        hin: u32,
    ) -> RopResult<MessageChange> {
        let logon = &self.logon;
        self.handles
            .ics_download_mut(hin)
            .and_then(|ctx| ctx.sync_message_change(logon))
            .and_then(|change| change.ok_or(Error::NotFound))
            .map_err(map_error!(self))
    }

    pub fn rop_syncfolderchange(
        &mut self,
        hin: u32,
    ) -> RopResult<FolderChange> {
        let logon = &self.logon;
        self.handles
            .ics_download_mut(hin)
            .and_then(|ctx| ctx.sync_folder_change(logon))
            .and_then(|change| change.ok_or(Error::NotFound))
            .map_err(map_error!(self))
    }

    pub fn rop_syncdeletions(&mut self, hin: u32) -> RopResult<Deletions> {
        self.handles
            .ics_download_mut(hin)
            .and_then(|ctx| ctx.sync_deletions().ok_or(Error::NotFound))
            .map_err(map_error!(self))
    }

    pub fn rop_syncreadstates(&mut self, hin: u32) -> RopResult<ReadStates> {
        self.handles
            .ics_download_mut(hin)
            .and_then(|ctx| ctx.sync_readstates().ok_or(Error::NotFound))
            .map_err(map_error!(self))
    }

    /// Serialise the state the client should keep for its next sync.
    pub fn rop_syncgetstate(&mut self, hin: u32) -> RopResult<Vec<u8>> {
        let logon = &self.logon;
        self.handles
            .ics_download(hin)
            .and_then(|ctx| ctx.get_state(logon))
            .map_err(map_error!(self))
    }
}
