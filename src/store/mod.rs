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

//! The collaborators the object layer consumes: the backing property store,
//! the user directory, body format converters, and the receipt sender.
//!
//! Every call is synchronous and is not retried here. A failed call surfaces
//! as `Error::Store`, which reaches clients as `ecError`.

use std::sync::Arc;

use bitflags::bitflags;

use crate::mapi::addressbook::UserIds;
use crate::mapi::model::*;
use crate::mapi::restriction::Restriction;
use crate::support::body_convert;
use crate::support::error::Error;
use crate::support::system_config::SystemConfig;

#[cfg(test)]
pub mod memory;

bitflags! {
    /// Rights a user holds on a folder.
    pub struct FolderRights: u32 {
        const READ_ANY = 0x0001;
        const CREATE = 0x0002;
        const EDIT_OWNED = 0x0008;
        const DELETE_OWNED = 0x0010;
        const EDIT_ANY = 0x0020;
        const DELETE_ANY = 0x0040;
        const CREATE_SUBFOLDER = 0x0080;
        const OWNER = 0x0100;
        const CONTACT = 0x0200;
        const VISIBLE = 0x0400;
    }
}

/// The full content of a message: its own properties, recipient rows, and
/// attachments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageContent {
    pub props: PropValues,
    pub recipients: Vec<PropValues>,
    pub attachments: Vec<AttachmentContent>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttachmentContent {
    /// Includes `PR_ATTACH_NUM`.
    pub props: PropValues,
    pub embedded: Option<Box<MessageContent>>,
}

impl AttachmentContent {
    pub fn attach_num(&self) -> Option<u32> {
        self.props.get_u32(crate::mapi::tags::PR_ATTACH_NUM)
    }
}

/// One message of a folder as seen by content synchronisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncRow {
    pub message_id: u64,
    /// The change number of the latest modification, as an entry id.
    pub change_number: u64,
    /// The change number of the latest read state change, as an entry id.
    pub read_cn: u64,
    pub read: bool,
    pub associated: bool,
    /// Whether the message matches the synchronisation filter.
    pub in_scope: bool,
}

/// One subfolder as seen by hierarchy synchronisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FolderSyncRow {
    pub folder_id: u64,
    pub change_number: u64,
}

/// A client of the physical property store backing one logon.
///
/// `username` parameters select per-user state, such as read flags in
/// public folders; `None` means the store owner.
pub trait StoreClient: Send + Sync {
    fn get_store_properties(
        &self,
        cpid: u32,
        tags: &[PropTag],
    ) -> Result<PropValues, Error>;
    fn set_store_properties(
        &self,
        cpid: u32,
        values: &PropValues,
    ) -> Result<Vec<PropProblem>, Error>;
    fn remove_store_properties(&self, tags: &[PropTag]) -> Result<(), Error>;
    fn get_store_all_proptags(&self) -> Result<Vec<PropTag>, Error>;

    /// Map names to ids, one id per name in order. An id of 0 means the
    /// name is unknown and was not created.
    fn get_named_propids(
        &self,
        create: bool,
        names: &[PropertyName],
    ) -> Result<Vec<u16>, Error>;
    /// Map ids to names, one entry per id in order.
    fn get_named_propnames(
        &self,
        ids: &[u16],
    ) -> Result<Vec<Option<PropertyName>>, Error>;

    fn get_folder_perm(
        &self,
        folder_id: u64,
        username: &str,
    ) -> Result<FolderRights, Error>;
    fn check_folder_id(&self, folder_id: u64) -> Result<bool, Error>;
    fn get_folder_properties(
        &self,
        cpid: u32,
        folder_id: u64,
        tags: &[PropTag],
    ) -> Result<PropValues, Error>;
    fn get_folder_all_proptags(
        &self,
        folder_id: u64,
    ) -> Result<Vec<PropTag>, Error>;

    fn is_msg_present(
        &self,
        folder_id: u64,
        message_id: u64,
    ) -> Result<bool, Error>;
    fn is_msg_deleted(&self, message_id: u64) -> Result<bool, Error>;
    fn is_message_owner(
        &self,
        message_id: u64,
        username: &str,
    ) -> Result<bool, Error>;
    fn get_message_properties(
        &self,
        username: Option<&str>,
        cpid: u32,
        message_id: u64,
        tags: &[PropTag],
    ) -> Result<PropValues, Error>;
    fn set_message_properties(
        &self,
        username: Option<&str>,
        cpid: u32,
        message_id: u64,
        values: &PropValues,
    ) -> Result<Vec<PropProblem>, Error>;
    fn remove_message_property(
        &self,
        cpid: u32,
        message_id: u64,
        tag: PropTag,
    ) -> Result<(), Error>;
    /// Set the read state of a message, returning the read change number
    /// assigned to the change.
    fn set_message_read_state(
        &self,
        username: Option<&str>,
        message_id: u64,
        read: bool,
    ) -> Result<u64, Error>;
    fn mark_modified(&self, message_id: u64) -> Result<(), Error>;
    /// Load the envelope of a message, as used to build receipts.
    fn get_message_brief(
        &self,
        cpid: u32,
        message_id: u64,
    ) -> Result<Option<MessageContent>, Error>;
    fn read_message(
        &self,
        username: Option<&str>,
        cpid: u32,
        message_id: u64,
    ) -> Result<Option<MessageContent>, Error>;
    /// Store `content` in `folder_id`, replacing any message with the same
    /// `PR_MID`.
    fn write_message(
        &self,
        cpid: u32,
        folder_id: u64,
        content: &MessageContent,
    ) -> Result<(), Error>;
    fn allocate_message_id(&self, folder_id: u64) -> Result<u64, Error>;
    /// Allocate a change number, returned as a global counter.
    fn allocate_cn(&self) -> Result<u64, Error>;

    /// Load a content table, returning its id and row count.
    fn load_content_table(
        &self,
        cpid: u32,
        folder_id: u64,
        username: Option<&str>,
        restriction: Option<&Restriction>,
    ) -> Result<(u32, u32), Error>;
    fn query_table(
        &self,
        username: Option<&str>,
        cpid: u32,
        table_id: u32,
        tags: &[PropTag],
        start: u32,
        count: u32,
    ) -> Result<Vec<PropValues>, Error>;
    fn unload_table(&self, table_id: u32) -> Result<(), Error>;

    /// List every message of `folder_id` in change number order, marking
    /// those that match `restriction`.
    fn get_content_sync_rows(
        &self,
        folder_id: u64,
        username: Option<&str>,
        restriction: Option<&Restriction>,
    ) -> Result<Vec<SyncRow>, Error>;
    /// List every folder below `folder_id` in change number order.
    fn get_hierarchy_sync_rows(
        &self,
        folder_id: u64,
    ) -> Result<Vec<FolderSyncRow>, Error>;
}

/// Lookups against the user and domain directory.
pub trait Directory: Send + Sync {
    fn user_display_name(&self, username: &str)
        -> Result<Option<String>, Error>;
    fn user_ids(&self, username: &str) -> Result<Option<UserIds>, Error>;
}

/// Conversions between body formats.
///
/// The provided methods are the built-in conversions.
pub trait BodyConverter: Send + Sync {
    fn plain_to_html(&self, text: &str) -> Result<String, Error> {
        Ok(body_convert::plain_to_html(text))
    }

    fn html_to_plain(&self, html: &str) -> Result<String, Error> {
        body_convert::html_to_plain(html)
    }

    fn html_to_rtf(&self, html: &str, cpid: u32) -> Result<Vec<u8>, Error> {
        body_convert::html_to_rtf(html, cpid)
    }

    fn rtf_to_html(&self, rtf: &[u8]) -> Result<String, Error> {
        body_convert::rtf_to_html(rtf)
    }
}

/// The converter using only the built-in conversions.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinConverter;

impl BodyConverter for BuiltinConverter {}

/// Emits read receipts on behalf of a mailbox.
pub trait ReceiptNotifier: Send + Sync {
    fn notify_read(
        &self,
        account: &str,
        brief: &MessageContent,
    ) -> Result<(), Error>;
}

/// The shared, stateless collaborators available to every logon.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<SystemConfig>,
    pub directory: Arc<dyn Directory>,
    pub converter: Arc<dyn BodyConverter>,
    pub notifier: Arc<dyn ReceiptNotifier>,
}
