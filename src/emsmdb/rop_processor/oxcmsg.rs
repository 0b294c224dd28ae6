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

//! Message and attachment operations.

use log::{info, warn};

use super::defs::*;
use crate::emsmdb::attachment::Attachment;
use crate::emsmdb::handles::{AttachmentTable, RopObject};
use crate::emsmdb::message::{
    Message, MessageParent, OpenFlags, SaveFlags, TagAccess,
};
use crate::emsmdb::read_flags::{self, ReadFlags};
use crate::emsmdb::values;
use crate::mapi::model::*;
use crate::mapi::tags::*;
use crate::store::FolderRights;
use crate::support::error::{EcCode, Error};

/// Upper bound on recipient columns and rows in one modification.
const MAX_RECIPIENT_ITEMS: usize = 0x7FEF;

/// Columns which are carried in the fixed part of a recipient row and may
/// not be given as extra columns.
static FORBIDDEN_RECIPIENT_COLUMNS: &[PropTag] = &[
    PR_ADDRTYPE,
    PR_DISPLAY_NAME,
    PR_EMAIL_ADDRESS,
    PR_ENTRYID,
    PR_INSTANCE_KEY,
    PR_RECIPIENT_TYPE,
    PR_SEARCH_KEY,
    PR_SEND_RICH_INFO,
    PR_TRANSMITABLE_DISPLAY_NAME,
];

fn is_forbidden_recipient_column(tag: PropTag) -> bool {
    FORBIDDEN_RECIPIENT_COLUMNS
        .iter()
        .any(|forbidden| forbidden.id() == tag.id())
}

/// Downgrade a request for modification to read-only if the client allowed
/// it, or refuse it.
fn check_modify(
    open_flags: &mut OpenFlags,
    access: TagAccess,
) -> Result<(), Error> {
    if open_flags.contains(OpenFlags::MODIFY)
        && !access.contains(TagAccess::MODIFY)
    {
        if open_flags.contains(OpenFlags::BEST_ACCESS) {
            open_flags.remove(OpenFlags::BEST_ACCESS);
        } else {
            return Err(Error::AccessDenied);
        }
    }
    Ok(())
}

impl RopProcessor {
    fn check_folder_parent(&self, handle: u32) -> Result<(), Error> {
        match *self.handles.get(handle)? {
            RopObject::Logon | RopObject::Folder(..) => Ok(()),
            _ => Err(Error::NotSupported),
        }
    }

    /// Work out what the session user may do with an existing message.
    fn message_access(
        &self,
        folder_id: u64,
        message_id: u64,
    ) -> Result<TagAccess, Error> {
        let user = match self.logon.eff_user() {
            None => return Ok(TagAccess::all()),
            Some(user) => user,
        };

        let store = self.logon.store();
        let rights = store.get_folder_perm(folder_id, user)?;
        if !rights.intersects(
            FolderRights::READ_ANY
                | FolderRights::VISIBLE
                | FolderRights::OWNER,
        ) {
            warn!(
                "{} Refused access to message {:#x} in folder {:#x}",
                self.log_prefix, message_id, folder_id
            );
            return Err(Error::AccessDenied);
        }

        if rights.contains(FolderRights::OWNER) {
            return Ok(TagAccess::all());
        }

        let owner = store.is_message_owner(message_id, user)?;
        let mut access = TagAccess::empty();
        if owner || rights.contains(FolderRights::READ_ANY) {
            access |= TagAccess::READ;
        }
        if rights.contains(FolderRights::EDIT_ANY)
            || (owner && rights.contains(FolderRights::EDIT_OWNED))
        {
            access |= TagAccess::MODIFY;
        }
        if rights.contains(FolderRights::DELETE_ANY)
            || (owner && rights.contains(FolderRights::DELETE_OWNED))
        {
            access |= TagAccess::DELETE;
        }
        Ok(access)
    }

    /// What the session user may do with a message they create.
    fn creation_access(&self, folder_id: u64) -> Result<TagAccess, Error> {
        let user = match self.logon.eff_user() {
            None => return Ok(TagAccess::all()),
            Some(user) => user,
        };

        let rights = self.logon.store().get_folder_perm(folder_id, user)?;
        if !rights.intersects(FolderRights::OWNER | FolderRights::CREATE) {
            warn!(
                "{} Refused message creation in folder {:#x}",
                self.log_prefix, folder_id
            );
            return Err(Error::AccessDenied);
        }

        let mut access = TagAccess::MODIFY | TagAccess::READ;
        if rights.intersects(
            FolderRights::DELETE_OWNED
                | FolderRights::DELETE_ANY
                | FolderRights::OWNER,
        ) {
            access |= TagAccess::DELETE;
        }
        Ok(access)
    }

    fn check_quota(&self) -> Result<(), Error> {
        let props = self.logon.get_properties(&[
            PR_MESSAGE_SIZE_EXTENDED,
            PR_STORAGE_QUOTA_LIMIT,
            PR_ASSOC_CONTENT_COUNT,
            PR_CONTENT_COUNT,
        ])?;

        let size = props.get_u64(PR_MESSAGE_SIZE_EXTENDED).unwrap_or(0);
        if let Some(quota_kb) = props.get_u32(PR_STORAGE_QUOTA_LIMIT) {
            if size > u64::from(quota_kb).saturating_mul(1024) {
                warn!(
                    "{} Store size {} exceeds quota of {} KB",
                    self.log_prefix, size, quota_kb
                );
                return Err(Error::QuotaExceeded);
            }
        }

        let count = [PR_ASSOC_CONTENT_COUNT, PR_CONTENT_COUNT]
            .iter()
            .map(|&tag| u64::from(props.get_u32(tag).unwrap_or(0)))
            .sum::<u64>();
        let max = self.logon.services().config.limits.max_message_count;
        if count > u64::from(max) {
            warn!(
                "{} Store holds {} messages, more than the limit of {}",
                self.log_prefix, count, max
            );
            return Err(Error::QuotaExceeded);
        }

        Ok(())
    }

    pub fn rop_openmessage(
        &mut self,
        hin: u32,
        cpid: u32,
        folder_id: u64,
        open_flags: u8,
        message_id: u64,
    ) -> RopResult<(u32, MessageSummary)> {
        self.openmessage(hin, cpid, folder_id, open_flags, message_id)
            .map_err(map_error!(self))
    }

    fn openmessage(
        &mut self,
        hin: u32,
        cpid: u32,
        folder_id: u64,
        open_flags: u8,
        message_id: u64,
    ) -> Result<(u32, MessageSummary), Error> {
        let cpid = self.resolve_cpid(cpid)?;
        self.check_folder_parent(hin)?;
        let mut open_flags = OpenFlags::from_bits_truncate(open_flags);

        let store = self.logon.store();
        if !store.is_msg_present(folder_id, message_id)? {
            return Err(Error::NotFound);
        }
        if store.is_msg_deleted(message_id)?
            && !open_flags.contains(OpenFlags::OPEN_SOFT_DELETED)
        {
            return Err(Error::NotFound);
        }

        let folder_id = store
            .get_message_properties(None, cpid, message_id, &[PR_FOLDER_ID])?
            .get_u64(PR_FOLDER_ID)
            .ok_or(Error::NotFound)?;

        let access = self.message_access(folder_id, message_id)?;
        if !access.contains(TagAccess::READ) {
            return Err(Error::AccessDenied);
        }
        check_modify(&mut open_flags, access)?;

        let message = Message::open(
            &self.logon,
            folder_id,
            message_id,
            cpid,
            access,
            open_flags,
        )?;
        let summary = summarize(&self.logon, &message)?;
        let handle = self
            .handles
            .insert(hin, RopObject::Message(Box::new(message)))?;
        Ok((handle, summary))
    }

    /// Start a new message in `folder_id`, returning its handle.
    pub fn rop_createmessage(
        &mut self,
        hin: u32,
        cpid: u32,
        folder_id: u64,
        associated: bool,
    ) -> RopResult<u32> {
        self.createmessage(hin, cpid, folder_id, associated)
            .map_err(map_error!(self))
    }

    fn createmessage(
        &mut self,
        hin: u32,
        cpid: u32,
        folder_id: u64,
        associated: bool,
    ) -> Result<u32, Error> {
        let cpid = self.resolve_cpid(cpid)?;
        self.check_folder_parent(hin)?;
        let access = self.creation_access(folder_id)?;
        self.check_quota()?;

        let message_id = self.logon.store().allocate_message_id(folder_id)?;
        let message =
            Message::create(folder_id, message_id, cpid, associated, access);
        self.handles
            .insert(hin, RopObject::Message(Box::new(message)))
    }

    /// Commit the message open as `hin`, returning its id.
    pub fn rop_savechangesmessage(
        &mut self,
        hresponse: u32,
        hin: u32,
        save_flags: u8,
    ) -> RopResult<u64> {
        self.savechangesmessage(hresponse, hin, save_flags)
            .map_err(map_error!(self))
    }

    fn savechangesmessage(
        &mut self,
        hresponse: u32,
        hin: u32,
        save_flags: u8,
    ) -> Result<u64, Error> {
        self.handles.get(hresponse)?;
        let flags = SaveFlags::from_bits_truncate(save_flags & 0x07);

        let message = self.handles.message_mut(hin)?;
        flags.check(message.tag_access(), message.open_flags())?;
        if SaveFlags::FORCE_SAVE != flags {
            message.check_original_touched(&self.logon)?;
        }

        message.save(&self.logon)?;
        flags.apply(message.open_flags_mut());
        let message_id = message.message_id();

        if let MessageParent::Attachment(attachment) = message.parent() {
            let content = message.content().clone();
            self.handles
                .attachment_mut(attachment)?
                .set_embedded(content);
        }

        Ok(message_id)
    }

    pub fn rop_reloadcachedinformation(
        &mut self,
        hin: u32,
    ) -> RopResult<MessageSummary> {
        self.reloadcachedinformation(hin).map_err(map_error!(self))
    }

    fn reloadcachedinformation(
        &mut self,
        hin: u32,
    ) -> Result<MessageSummary, Error> {
        let message = self.handles.message_mut(hin)?;
        message.reload(&self.logon)?;
        summarize(&self.logon, message)
    }

    pub fn rop_modifyrecipients(
        &mut self,
        hin: u32,
        columns: &[PropTag],
        rows: Vec<RecipientRow>,
    ) -> RopResult<()> {
        self.modifyrecipients(hin, columns, rows)
            .map_err(map_error!(self))
    }

    fn modifyrecipients(
        &mut self,
        hin: u32,
        columns: &[PropTag],
        rows: Vec<RecipientRow>,
    ) -> Result<(), Error> {
        if columns.len() >= MAX_RECIPIENT_ITEMS
            || rows.len() >= MAX_RECIPIENT_ITEMS
        {
            return Err(Error::InvalidParam);
        }

        if columns.iter().copied().any(is_forbidden_recipient_column) {
            return Err(Error::InvalidParam);
        }

        self.handles.message_mut(hin)?.modify_recipients(
            rows.into_iter().map(|r| (r.row_id, r.props)).collect(),
        );
        Ok(())
    }

    /// Read the recipient rows from `row_id` on.
    pub fn rop_readrecipients(
        &mut self,
        hin: u32,
        row_id: u32,
    ) -> RopResult<Vec<PropValues>> {
        self.readrecipients(hin, row_id).map_err(map_error!(self))
    }

    fn readrecipients(
        &self,
        hin: u32,
        row_id: u32,
    ) -> Result<Vec<PropValues>, Error> {
        let rows = self.handles.message(hin)?.read_recipients(row_id);
        if rows.is_empty() {
            Err(Error::NotFound)
        } else {
            Ok(rows)
        }
    }

    pub fn rop_removeallrecipients(&mut self, hin: u32) -> RopResult<()> {
        self.handles
            .message_mut(hin)
            .map(Message::remove_all_recipients)
            .map_err(map_error!(self))
    }

    /// Update the status bits in `mask` of a message in the folder open as
    /// `hin`, returning the resulting status.
    pub fn rop_setmessagestatus(
        &mut self,
        hin: u32,
        message_id: u64,
        status: u32,
        mask: u32,
    ) -> RopResult<u32> {
        self.setmessagestatus(hin, message_id, status, mask)
            .map_err(map_error!(self))
    }

    fn setmessagestatus(
        &mut self,
        hin: u32,
        message_id: u64,
        status: u32,
        mask: u32,
    ) -> Result<u32, Error> {
        self.handles.folder(hin)?;
        let original = self.getmessagestatus(hin, message_id)?;

        let mut new_status = status & mask;
        if 0 != new_status & MSGSTATUS_IN_CONFLICT {
            return Err(Error::AccessDenied);
        }
        new_status |= original & !(mask & !new_status);

        let mut values = PropValues::new();
        values.set(PR_MSG_STATUS, Value::Long(new_status));
        let problems = self.logon.store().set_message_properties(
            None,
            self.logon.session().cpid,
            message_id,
            &values,
        )?;
        if let Some(problem) = problems.first() {
            return Err(Error::from(problem.err));
        }
        Ok(new_status)
    }

    pub fn rop_getmessagestatus(
        &mut self,
        hin: u32,
        message_id: u64,
    ) -> RopResult<u32> {
        self.getmessagestatus(hin, message_id)
            .map_err(map_error!(self))
    }

    fn getmessagestatus(
        &self,
        hin: u32,
        message_id: u64,
    ) -> Result<u32, Error> {
        self.handles.folder(hin)?;
        self.logon
            .store()
            .get_message_properties(
                None,
                self.logon.session().cpid,
                message_id,
                &[PR_MSG_STATUS],
            )?
            .get_u32(PR_MSG_STATUS)
            .ok_or(Error::NotFound)
    }

    /// Change the read state of messages in the folder open as `hin`,
    /// returning whether some could not be changed.
    pub fn rop_setreadflags(
        &mut self,
        hin: u32,
        flags: u8,
        message_ids: &[u64],
    ) -> RopResult<bool> {
        self.setreadflags(hin, flags, message_ids)
            .map_err(map_error!(self))
    }

    fn setreadflags(
        &mut self,
        hin: u32,
        flags: u8,
        message_ids: &[u64],
    ) -> Result<bool, Error> {
        let folder = self.handles.folder(hin)?;
        read_flags::set_read_flags(
            &self.logon,
            folder.folder_id,
            ReadFlags::from_wire(flags),
            message_ids,
        )
    }

    /// Change the read state of the open message `hin`. Returns `true` if
    /// the read state was left as it was.
    pub fn rop_setmessagereadflag(
        &mut self,
        hresponse: u32,
        hin: u32,
        flags: u8,
    ) -> RopResult<bool> {
        self.setmessagereadflag(hresponse, hin, flags)
            .map_err(map_error!(self))
    }

    fn setmessagereadflag(
        &mut self,
        hresponse: u32,
        hin: u32,
        flags: u8,
    ) -> Result<bool, Error> {
        self.handles.get(hresponse)?;
        let flags = ReadFlags::from_wire(flags);
        let message = self.handles.message_mut(hin)?;
        let read = !flags.marks_unread();

        let changed = if message.is_embedded() {
            match flags.bits() {
                0x00 | 0x01 | 0x04 | 0x05 => message.set_read(read),
                _ => false,
            }
        } else {
            let changed = read_flags::set_read_flag(
                &self.logon,
                message.message_id(),
                flags,
            )?;
            if changed {
                message.set_read(read);
            }
            changed
        };

        Ok(!changed)
    }

    pub fn rop_openattachment(
        &mut self,
        hin: u32,
        open_flags: u8,
        attach_num: u32,
    ) -> RopResult<u32> {
        self.openattachment(hin, open_flags, attach_num)
            .map_err(map_error!(self))
    }

    fn openattachment(
        &mut self,
        hin: u32,
        open_flags: u8,
        attach_num: u32,
    ) -> Result<u32, Error> {
        let message = self.handles.message(hin)?;
        let mut open_flags = OpenFlags::from_bits_truncate(open_flags);
        let access = message.tag_access();
        check_modify(&mut open_flags, access)?;

        let content = message
            .attachment(attach_num)
            .cloned()
            .ok_or(Error::NotFound)?;
        let attachment = Attachment::open(
            hin,
            content,
            message.cpid(),
            access,
            open_flags,
        )?;
        self.handles
            .insert(hin, RopObject::Attachment(Box::new(attachment)))
    }

    /// Add an attachment to the open message `hin`, returning its handle
    /// and number.
    pub fn rop_createattachment(&mut self, hin: u32) -> RopResult<(u32, u32)> {
        self.createattachment(hin).map_err(map_error!(self))
    }

    fn createattachment(&mut self, hin: u32) -> Result<(u32, u32), Error> {
        let ceiling = self.logon.services().config.limits.max_attachments;
        let message = self.handles.message_mut(hin)?;
        let access = message.tag_access();
        if !access.contains(TagAccess::MODIFY) {
            return Err(Error::AccessDenied);
        }

        let attach_num = message.allocate_attach_num(ceiling)?;
        let attachment =
            Attachment::create(hin, attach_num, message.cpid(), access);
        let handle = self
            .handles
            .insert(hin, RopObject::Attachment(Box::new(attachment)))?;
        Ok((handle, attach_num))
    }

    pub fn rop_deleteattachment(
        &mut self,
        hin: u32,
        attach_num: u32,
    ) -> RopResult<()> {
        self.deleteattachment(hin, attach_num)
            .map_err(map_error!(self))
    }

    fn deleteattachment(
        &mut self,
        hin: u32,
        attach_num: u32,
    ) -> Result<(), Error> {
        let message = self.handles.message_mut(hin)?;
        if !message.tag_access().contains(TagAccess::MODIFY) {
            return Err(Error::AccessDenied);
        }

        if message.delete_attachment(attach_num) {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    /// Put the attachment open as `hin` back into its message.
    pub fn rop_savechangesattachment(
        &mut self,
        hresponse: u32,
        hin: u32,
        save_flags: u8,
    ) -> RopResult<()> {
        self.savechangesattachment(hresponse, hin, save_flags)
            .map_err(map_error!(self))
    }

    fn savechangesattachment(
        &mut self,
        hresponse: u32,
        hin: u32,
        save_flags: u8,
    ) -> Result<(), Error> {
        match *self.handles.get(hresponse)? {
            RopObject::Message(..) => (),
            _ => return Err(Error::NotSupported),
        }

        let flags = SaveFlags::from_bits_truncate(save_flags & 0x07);
        let attachment = self.handles.attachment_mut(hin)?;
        flags.check(attachment.tag_access(), attachment.open_flags())?;
        let content = attachment.save();
        flags.apply(attachment.open_flags_mut());
        let message_handle = attachment.message_handle();

        self.handles
            .message_mut(message_handle)?
            .put_attachment(content);
        Ok(())
    }

    /// Open the message embedded in the attachment open as `hin`, creating
    /// it if asked to.
    pub fn rop_openembeddedmessage(
        &mut self,
        hin: u32,
        cpid: u32,
        open_flags: u8,
    ) -> RopResult<EmbeddedMessage> {
        self.openembeddedmessage(hin, cpid, open_flags)
            .map_err(map_error!(self))
    }

    fn openembeddedmessage(
        &mut self,
        hin: u32,
        cpid: u32,
        open_flags: u8,
    ) -> Result<EmbeddedMessage, Error> {
        let cpid = self.resolve_cpid(cpid)?;
        let open_flags = OpenFlags::from_bits_truncate(open_flags);

        let attachment = self.handles.attachment(hin)?;
        let access = attachment.tag_access();
        if open_flags.contains(OpenFlags::MODIFY)
            && !access.contains(TagAccess::MODIFY)
        {
            return Err(Error::AccessDenied);
        }

        let parent = self.handles.message(attachment.message_handle())?;
        let depth = parent.depth() + 1;
        if depth > self.logon.services().config.limits.max_embedded_depth {
            warn!(
                "{} Refused embedded message nested {} deep",
                self.log_prefix, depth
            );
            return Err(Error::TooComplex);
        }
        let folder_id = parent.folder_id();

        let (message, is_new) = match attachment.embedded().cloned() {
            Some(content) => {
                let message_id = match content.props.get_u64(PR_MID) {
                    Some(mid) => mid,
                    None => {
                        self.logon.store().allocate_message_id(folder_id)?
                    }
                };
                let message = Message::embedded(
                    hin,
                    folder_id,
                    message_id,
                    depth,
                    cpid,
                    access,
                    open_flags,
                    Some(content),
                );
                (message, false)
            }
            None => {
                if !open_flags.contains(OpenFlags::CREATE) {
                    return Err(Error::NotFound);
                }
                if !access.contains(TagAccess::MODIFY) {
                    return Err(Error::AccessDenied);
                }

                let message_id =
                    self.logon.store().allocate_message_id(folder_id)?;
                let message = Message::embedded(
                    hin,
                    folder_id,
                    message_id,
                    depth,
                    cpid,
                    access,
                    OpenFlags::MODIFY,
                    None,
                );
                (message, true)
            }
        };

        let summary = if is_new {
            MessageSummary::default()
        } else {
            summarize(&self.logon, &message)?
        };
        let message_id = message.message_id();
        let handle = self
            .handles
            .insert(hin, RopObject::Message(Box::new(message)))?;
        Ok(EmbeddedMessage {
            handle,
            message_id,
            summary,
        })
    }

    pub fn rop_getattachmenttable(&mut self, hin: u32) -> RopResult<u32> {
        self.getattachmenttable(hin).map_err(map_error!(self))
    }

    fn getattachmenttable(&mut self, hin: u32) -> Result<u32, Error> {
        self.handles.message(hin)?;
        self.handles.insert(
            hin,
            RopObject::AttachmentTable(AttachmentTable {
                message: hin,
                position: 0,
            }),
        )
    }

    /// Fetch up to `count` rows from the attachment table `hin`, advancing
    /// its cursor.
    pub fn rop_queryrows(
        &mut self,
        hin: u32,
        tags: &[PropTag],
        count: usize,
    ) -> RopResult<Vec<PropValues>> {
        self.queryrows(hin, tags, count).map_err(map_error!(self))
    }

    fn queryrows(
        &mut self,
        hin: u32,
        tags: &[PropTag],
        count: usize,
    ) -> Result<Vec<PropValues>, Error> {
        let table = *self.handles.attachment_table_mut(hin)?;
        let message = self.handles.message(table.message)?;
        let cpid = message.cpid();

        let mut rows = Vec::new();
        for attachment in message.attachments().iter().skip(table.position) {
            if rows.len() >= count {
                break;
            }

            let mut found = PropValues::new();
            for &tag in tags {
                if let Some(pv) = values::lookup(&attachment.props, tag, cpid)?
                {
                    found.push(pv);
                }
            }
            rows.push(fill_row(tags, &found));
        }

        self.handles.attachment_table_mut(hin)?.position += rows.len();
        Ok(rows)
    }

    pub fn rop_getvalidattachments(&mut self, hin: u32) -> RopResult<Vec<u32>> {
        info!(
            "{} Unsupported request for valid attachments of {}",
            self.log_prefix, hin
        );
        Err(EcCode::NOT_IMPLEMENTED)
    }
}
