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

//! Folder operations.

use log::warn;

use super::defs::*;
use crate::emsmdb::handles::{Folder, RopObject};
use crate::store::FolderRights;
use crate::support::error::Error;

impl RopProcessor {
    /// Open `folder_id` below the logon or folder open as `hin`.
    pub fn rop_openfolder(
        &mut self,
        hin: u32,
        folder_id: u64,
    ) -> RopResult<u32> {
        self.openfolder(hin, folder_id).map_err(map_error!(self))
    }

    fn openfolder(&mut self, hin: u32, folder_id: u64) -> Result<u32, Error> {
        match *self.handles.get(hin)? {
            RopObject::Logon | RopObject::Folder(..) => (),
            _ => return Err(Error::NotSupported),
        }

        let store = self.logon.store();
        if !store.check_folder_id(folder_id)? {
            return Err(Error::NotFound);
        }

        if let Some(user) = self.logon.eff_user() {
            let rights = store.get_folder_perm(folder_id, user)?;
            if !rights.intersects(
                FolderRights::VISIBLE
                    | FolderRights::READ_ANY
                    | FolderRights::OWNER,
            ) {
                warn!(
                    "{} Refused access to folder {:#x}",
                    self.log_prefix, folder_id
                );
                return Err(Error::AccessDenied);
            }
        }

        self.handles
            .insert(hin, RopObject::Folder(Folder { folder_id }))
    }
}
