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

//! Named property lookups on the logon.

use super::defs::*;
use crate::emsmdb::handles::RopObject;
use crate::mapi::model::*;
use crate::support::error::Error;

impl RopProcessor {
    fn check_logon(&self, hin: u32) -> Result<(), Error> {
        match *self.handles.get(hin)? {
            RopObject::Logon => Ok(()),
            _ => Err(Error::NotSupported),
        }
    }

    /// Map `names` onto property ids, creating ids for unknown names if
    /// `create` is set. Names that cannot be mapped get id 0.
    pub fn rop_getpropertyidsfromnames(
        &mut self,
        hin: u32,
        create: bool,
        names: &[PropertyName],
    ) -> RopResult<Vec<u16>> {
        self.check_logon(hin)
            .and_then(|()| self.logon.get_named_propids(create, names))
            .map_err(map_error!(self))
    }

    pub fn rop_getnamesfrompropertyids(
        &mut self,
        hin: u32,
        ids: &[u16],
    ) -> RopResult<Vec<Option<PropertyName>>> {
        self.check_logon(hin)
            .and_then(|()| self.logon.get_named_propnames(ids))
            .map_err(map_error!(self))
    }
}
