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

use log::error;

use crate::emsmdb::handles::HandleTable;
use crate::emsmdb::logon::Logon;
use crate::emsmdb::message::Message;
use crate::mapi::model::*;
use crate::mapi::tags::*;
use crate::support::charset;
use crate::support::error::{EcCode, Error};
use crate::support::log_prefix::LogPrefix;

/// Code page value meaning "whatever the session uses".
pub(super) const CPID_SESSION: u32 = 0x0FFF;

/// Results are sent to the client as a bare result code on failure.
pub type RopResult<T> = Result<T, EcCode>;

/// Executes ROPs against one logon and the objects opened through it.
///
/// The logon is handle 0 of the handle table; every other object is
/// opened from it, directly or indirectly.
pub struct RopProcessor {
    pub(super) logon: Logon,
    pub(super) handles: HandleTable,
    pub(super) log_prefix: LogPrefix,
}

/// What the client is told about a message when it is opened.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageSummary {
    pub has_named_properties: bool,
    pub subject_prefix: Option<String>,
    pub normalized_subject: Option<String>,
    pub recipient_count: usize,
    pub recipient_columns: Vec<PropTag>,
    pub recipient_rows: Vec<PropValues>,
}

/// The result of opening the message embedded in an attachment.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddedMessage {
    pub handle: u32,
    pub message_id: u64,
    pub summary: MessageSummary,
}

/// One row of a recipient modification. A row without properties deletes
/// the recipient with that row id.
#[derive(Clone, Debug, PartialEq)]
pub struct RecipientRow {
    pub row_id: u32,
    pub props: Option<PropValues>,
}

impl RopProcessor {
    pub fn new(logon: Logon) -> Self {
        let max_handles = logon.services().config.limits.max_handles;
        let log_prefix = logon.log_prefix().clone();
        RopProcessor {
            logon,
            handles: HandleTable::new(max_handles),
            log_prefix,
        }
    }

    pub fn logon(&self) -> &Logon {
        &self.logon
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Close `handle` and everything opened from it.
    pub fn rop_release(&mut self, handle: u32) -> RopResult<()> {
        self.handles.release(handle).map_err(map_error!(self))
    }

    /// Resolve the code page a client asked for.
    pub(super) fn resolve_cpid(&self, cpid: u32) -> Result<u32, Error> {
        if CPID_SESSION == cpid {
            Ok(self.logon.session().cpid)
        } else if charset::is_known_cpid(cpid) {
            Ok(cpid)
        } else {
            Err(Error::UnknownCodepage(cpid))
        }
    }
}

/// Describe `message` the way the open operations report it.
pub(super) fn summarize(
    logon: &Logon,
    message: &Message,
) -> Result<MessageSummary, Error> {
    let props = message
        .get_properties(logon, &[PR_SUBJECT_PREFIX, PR_NORMALIZED_SUBJECT])?;
    let text = |tag| props.get_str(tag).map(str::to_owned);

    Ok(MessageSummary {
        has_named_properties: message
            .content()
            .props
            .iter()
            .any(|pv| pv.tag.is_named()),
        subject_prefix: text(PR_SUBJECT_PREFIX),
        normalized_subject: text(PR_NORMALIZED_SUBJECT),
        recipient_count: message.recipients().len(),
        recipient_columns: message.recipient_columns(),
        recipient_rows: message.recipients().to_vec(),
    })
}

/// Arrange `found` into one value per requested tag, in request order.
/// Tags with nothing found get a `NOT_FOUND` placeholder.
pub(super) fn fill_row(tags: &[PropTag], found: &PropValues) -> PropValues {
    tags.iter()
        .map(|&tag| {
            found
                .iter()
                .find(|pv| {
                    pv.tag == tag
                        || pv.tag == tag.with_type(PT_ERROR)
                        || (PT_UNSPECIFIED == tag.prop_type()
                            && pv.tag.id() == tag.id())
                })
                .cloned()
                .unwrap_or_else(|| PropVal::error(tag, EcCode::NOT_FOUND))
        })
        .collect()
}

pub(super) fn catch_all_error_handling(
    log_prefix: &LogPrefix,
    e: Error,
) -> EcCode {
    match e {
        Error::Store(..)
        | Error::Conversion(..)
        | Error::Io(..)
        | Error::Toml(..) => {
            error!("{} Unhandled internal error: {}", log_prefix, e);
        }
        _ => (),
    }

    EcCode::from(e)
}
