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

//! The object layer: logons, folders, messages and attachments reached
//! through handles, plus incremental change synchronisation.

pub mod attachment;
pub mod body;
pub mod calculated;
pub mod handles;
pub mod ics;
pub mod logon;
pub mod message;
pub mod name_cache;
pub mod read_flags;
pub mod rop_processor;
pub mod values;

#[cfg(test)]
pub mod test_prelude;
