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

//! Implements the remote operations (ROPs) on the object layer, independent
//! of how they are encoded on the wire.
//!
//! Like the message and ICS modules, this is split into several submodules
//! by protocol area, but is best thought of as one single module. Each
//! `rop_*` method resolves its input handles, runs the operation and turns
//! any failure into the result code sent to the client.

macro_rules! map_error {
    ($this:expr) => {{
        let log_prefix = &$this.log_prefix;
        move |e| catch_all_error_handling(log_prefix, e)
    }};
}

mod defs;
mod oxcfold;
mod oxcfxics;
mod oxcmsg;
mod oxcprpt;
mod oxcstor;

pub use self::defs::{
    EmbeddedMessage, MessageSummary, RecipientRow, RopProcessor, RopResult,
};
