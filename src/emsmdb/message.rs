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

//! Open messages.
//!
//! An open message holds a full copy of its content. Changes are made to
//! that copy and only reach the store when the message is saved. A message
//! embedded in an attachment is saved into the attachment instead, which in
//! turn is saved into its own message.

use bitflags::bitflags;
use log::warn;

use super::body::{self, BodyKind, BodySource};
use super::logon::Logon;
use super::values;
use crate::mapi::eid;
use crate::mapi::model::*;
use crate::mapi::tags::*;
use crate::mapi::xid::{Pcl, Xid};
use crate::store::{AttachmentContent, MessageContent};
use crate::support::error::{EcCode, Error};
use crate::support::filetime;

bitflags! {
    /// How the client asked for an object to be opened.
    pub struct OpenFlags: u8 {
        const MODIFY = 0x01;
        /// Create the object if it does not exist.
        const CREATE = 0x02;
        /// Open for modification if permitted, otherwise read-only.
        const BEST_ACCESS = 0x03;
        const OPEN_SOFT_DELETED = 0x04;
    }
}

bitflags! {
    /// What the client may do with an open object, fixed when it is opened.
    pub struct TagAccess: u32 {
        const MODIFY = 0x01;
        const READ = 0x02;
        const DELETE = 0x04;
    }
}

bitflags! {
    pub struct SaveFlags: u8 {
        const KEEP_OPEN_READ_ONLY = 0x01;
        const KEEP_OPEN_READ_WRITE = 0x02;
        const FORCE_SAVE = 0x04;
    }
}

impl SaveFlags {
    /// Check whether an object opened with `open_flags` and `tag_access`
    /// may be saved with these flags.
    pub fn check(
        self,
        tag_access: TagAccess,
        open_flags: OpenFlags,
    ) -> Result<(), Error> {
        if !tag_access.contains(TagAccess::MODIFY) {
            return Err(Error::AccessDenied);
        }

        if !open_flags.contains(OpenFlags::MODIFY)
            && SaveFlags::FORCE_SAVE != self
        {
            return Err(Error::AccessDenied);
        }

        Ok(())
    }

    /// Apply the change of open mode that accompanies a save.
    pub fn apply(self, open_flags: &mut OpenFlags) {
        if SaveFlags::KEEP_OPEN_READ_WRITE == self
            || SaveFlags::FORCE_SAVE == self
        {
            open_flags.insert(OpenFlags::MODIFY);
        } else if SaveFlags::KEEP_OPEN_READ_ONLY == self {
            open_flags.remove(OpenFlags::MODIFY);
        }
    }
}

/// Where a message lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageParent {
    Folder(u64),
    /// Embedded in the attachment open under this handle.
    Attachment(u32),
}

#[derive(Debug)]
pub struct Message {
    parent: MessageParent,
    folder_id: u64,
    message_id: u64,
    cpid: u32,
    tag_access: TagAccess,
    open_flags: OpenFlags,
    is_new: bool,
    /// How many attachments this message is nested within.
    depth: u32,
    /// The change number the message had when it was opened.
    original_cn: Option<u64>,
    content: MessageContent,
    next_attach_num: u32,
}

/// Initial content for a new message.
fn init_content(
    message_id: u64,
    cpid: u32,
    associated: bool,
) -> MessageContent {
    let now = filetime::now();
    let mut flags = MSGFLAG_UNSENT | MSGFLAG_UNMODIFIED;
    if associated {
        flags |= MSGFLAG_ASSOCIATED;
    }

    let mut props = PropValues::new();
    props.set(PR_MID, Value::I8(message_id));
    props.set(PR_MESSAGE_CLASS, Value::Unicode("IPM.Note".to_owned()));
    props.set(PR_MESSAGE_FLAGS, Value::Long(flags));
    props.set(PR_ASSOCIATED, Value::Boolean(associated));
    props.set(PR_CREATION_TIME, Value::SysTime(now));
    props.set(PR_LAST_MODIFICATION_TIME, Value::SysTime(now));
    props.set(PR_INTERNET_CPID, Value::Long(cpid));
    props.set(PR_READ, Value::Boolean(false));

    MessageContent {
        props,
        ..MessageContent::default()
    }
}

fn next_attach_num(content: &MessageContent) -> u32 {
    content
        .attachments
        .iter()
        .filter_map(AttachmentContent::attach_num)
        .max()
        .map_or(0, |n| n + 1)
}

/// Strip the subject prefix off the subject.
fn normalize_subject(props: &PropValues) -> Option<String> {
    let subject = props.get_str(PR_SUBJECT)?;
    let prefix = props.get_str(PR_SUBJECT_PREFIX).unwrap_or("");
    let normalized = if !prefix.is_empty() && subject.starts_with(prefix) {
        &subject[prefix.len()..]
    } else {
        subject
    };
    Some(normalized.trim_start().to_owned())
}

impl Message {
    /// Open an existing message in `folder_id`.
    pub fn open(
        logon: &Logon,
        folder_id: u64,
        message_id: u64,
        cpid: u32,
        tag_access: TagAccess,
        open_flags: OpenFlags,
    ) -> Result<Self, Error> {
        let content = logon
            .store()
            .read_message(logon.readstate_user(), cpid, message_id)?
            .ok_or(Error::NotFound)?;

        Ok(Message {
            parent: MessageParent::Folder(folder_id),
            folder_id,
            message_id,
            cpid,
            tag_access,
            open_flags,
            is_new: false,
            depth: 0,
            original_cn: content.props.get_u64(PR_CHANGE_NUMBER),
            next_attach_num: next_attach_num(&content),
            content,
        })
    }

    /// Start a new message in `folder_id` under an allocated `message_id`.
    pub fn create(
        folder_id: u64,
        message_id: u64,
        cpid: u32,
        associated: bool,
        tag_access: TagAccess,
    ) -> Self {
        Message {
            parent: MessageParent::Folder(folder_id),
            folder_id,
            message_id,
            cpid,
            tag_access,
            open_flags: OpenFlags::MODIFY,
            is_new: true,
            depth: 0,
            original_cn: None,
            content: init_content(message_id, cpid, associated),
            next_attach_num: 0,
        }
    }

    /// Open the message embedded in the attachment open as
    /// `attachment_handle`.
    ///
    /// `content` is `None` to create a new embedded message.
    #[allow(clippy::too_many_arguments)]
    pub fn embedded(
        attachment_handle: u32,
        folder_id: u64,
        message_id: u64,
        depth: u32,
        cpid: u32,
        tag_access: TagAccess,
        open_flags: OpenFlags,
        content: Option<MessageContent>,
    ) -> Self {
        let is_new = content.is_none();
        let mut content = content
            .unwrap_or_else(|| init_content(message_id, cpid, false));
        content.props.set(PR_MID, Value::I8(message_id));

        Message {
            parent: MessageParent::Attachment(attachment_handle),
            folder_id,
            message_id,
            cpid,
            tag_access,
            open_flags,
            is_new,
            depth,
            original_cn: None,
            next_attach_num: next_attach_num(&content),
            content,
        }
    }

    pub fn parent(&self) -> MessageParent {
        self.parent
    }

    pub fn is_embedded(&self) -> bool {
        match self.parent {
            MessageParent::Attachment(..) => true,
            MessageParent::Folder(..) => false,
        }
    }

    pub fn folder_id(&self) -> u64 {
        self.folder_id
    }

    pub fn message_id(&self) -> u64 {
        self.message_id
    }

    pub fn cpid(&self) -> u32 {
        self.cpid
    }

    pub fn tag_access(&self) -> TagAccess {
        self.tag_access
    }

    pub fn open_flags(&self) -> OpenFlags {
        self.open_flags
    }

    pub fn open_flags_mut(&mut self) -> &mut OpenFlags {
        &mut self.open_flags
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Replace the in-memory content with what the store now holds.
    pub fn reload(&mut self, logon: &Logon) -> Result<(), Error> {
        if self.is_new || self.is_embedded() {
            return Ok(());
        }

        let content = logon
            .store()
            .read_message(logon.readstate_user(), self.cpid, self.message_id)?
            .ok_or(Error::NotFound)?;
        self.original_cn = content.props.get_u64(PR_CHANGE_NUMBER);
        self.next_attach_num = next_attach_num(&content);
        self.content = content;
        Ok(())
    }

    fn message_flags(&self) -> u32 {
        let flags = self.content.props.get_u32(PR_MESSAGE_FLAGS).unwrap_or(0);
        if self.content.attachments.is_empty() {
            flags & !MSGFLAG_HASATTACH
        } else {
            flags | MSGFLAG_HASATTACH
        }
    }

    fn source_key(&self, logon: &Logon) -> Vec<u8> {
        Xid::new(logon.guid(), eid::gc_value(self.message_id)).to_bytes()
    }

    /// Properties derived from the state of the open object.
    fn computed(&self, logon: &Logon, tag: PropTag) -> Option<Value> {
        match tag {
            PR_ACCESS => Some(Value::Long(self.tag_access.bits())),
            PR_ACCESS_LEVEL => Some(Value::Long(
                self.open_flags.contains(OpenFlags::MODIFY) as u32,
            )),
            PR_OBJECT_TYPE => Some(Value::Long(MAPI_MESSAGE)),
            PR_HASATTACH => Some(Value::Boolean(
                !self.content.attachments.is_empty(),
            )),
            PR_MESSAGE_FLAGS => Some(Value::Long(self.message_flags())),
            PR_FOLDER_ID if !self.is_embedded() => {
                Some(Value::I8(self.folder_id))
            }
            PR_SOURCE_KEY
                if !self.is_embedded()
                    && !self.content.props.contains(PR_SOURCE_KEY) =>
            {
                Some(Value::Binary(self.source_key(logon)))
            }
            PR_NORMALIZED_SUBJECT
                if !self.content.props.contains(PR_NORMALIZED_SUBJECT) =>
            {
                normalize_subject(&self.content.props).map(Value::Unicode)
            }
            _ => None,
        }
    }

    /// Fetch the values of `tags`. Absent properties are omitted.
    pub fn get_properties(
        &self,
        logon: &Logon,
        tags: &[PropTag],
    ) -> Result<PropValues, Error> {
        let services = logon.services();
        let src = BodySource {
            props: &self.content.props,
            cpid: self.cpid,
            converter: &*services.converter,
        };

        let mut out = PropValues::new();
        for &tag in tags {
            let pv = if BodyKind::from_tag(tag).is_some() {
                body::get_body(&src, tag, services.config.body.autosynthesis)?
            } else if let Some(value) = self.computed(logon, tag) {
                Some(PropVal::new(tag, value))
            } else {
                values::lookup(&self.content.props, tag, self.cpid)?
            };

            if let Some(pv) = pv {
                out.push(pv);
            }
        }

        Ok(out)
    }

    pub fn get_all_proptags(&self) -> Vec<PropTag> {
        let mut tags = self.content.props.tags();
        let mut extra = vec![
            PR_ACCESS,
            PR_ACCESS_LEVEL,
            PR_OBJECT_TYPE,
            PR_HASATTACH,
            PR_MESSAGE_FLAGS,
        ];
        if !self.is_embedded() {
            extra.push(PR_SOURCE_KEY);
        }

        for tag in extra {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    fn is_readonly_prop(&self, tag: PropTag) -> bool {
        if PT_OBJECT == tag.prop_type() {
            return true;
        }

        match tag {
            PR_ACCESS
            | PR_ACCESS_LEVEL
            | PR_ASSOC_CONTENT_COUNT
            | PR_ATTACH_SIZE
            | PR_CONTENT_COUNT
            | PR_ENTRYID
            | PR_FOLDER_ID
            | PR_HASATTACH
            | PR_INTERNET_ARTICLE_NUMBER
            | PR_MESSAGE_SIZE
            | PR_MESSAGE_SIZE_EXTENDED
            | PR_MID
            | PR_MSG_STATUS
            | PR_OBJECT_TYPE
            | PR_PARENT_FOLDER_ID
            | PR_RECORD_KEY
            | PR_STORE_ENTRYID
            | PR_STORE_RECORD_KEY => true,
            PR_CHANGE_KEY
            | PR_CHANGE_NUMBER
            | PR_CREATION_TIME
            | PR_LAST_MODIFICATION_TIME
            | PR_PREDECESSOR_CHANGE_LIST
            | PR_SOURCE_KEY => !self.is_new,
            // Read state of stored messages changes through the read flag
            // operations.
            PR_READ => !self.is_embedded(),
            _ => false,
        }
    }

    /// Set properties on the in-memory copy, returning per-value problems.
    pub fn set_properties(
        &mut self,
        values: &PropValues,
    ) -> Result<Vec<PropProblem>, Error> {
        let mut problems = Vec::new();
        for (ix, pv) in values.iter().enumerate() {
            if self.is_readonly_prop(pv.tag) {
                problems.push(PropProblem::new(
                    ix,
                    pv.tag,
                    EcCode::ACCESS_DENIED,
                ));
                continue;
            }

            match values::store(&mut self.content.props, pv, self.cpid) {
                Ok(()) => (),
                Err(e @ Error::Store(..)) => return Err(e),
                Err(e) => {
                    problems.push(PropProblem::new(ix, pv.tag, (&e).into()))
                }
            }
        }

        Ok(problems)
    }

    pub fn remove_properties(&mut self, tags: &[PropTag]) -> Vec<PropProblem> {
        let mut problems = Vec::new();
        for (ix, &tag) in tags.iter().enumerate() {
            if self.is_readonly_prop(tag) {
                problems.push(PropProblem::new(ix, tag, EcCode::ACCESS_DENIED));
            } else {
                values::remove(&mut self.content.props, tag);
            }
        }
        problems
    }

    /// Update the in-memory read state, returning whether it changed.
    pub fn set_read(&mut self, read: bool) -> bool {
        let props = &mut self.content.props;
        let was_read = props.get_bool(PR_READ).unwrap_or(false);
        let flags = props.get_u32(PR_MESSAGE_FLAGS).unwrap_or(0);
        let flags = if read {
            flags | MSGFLAG_READ
        } else {
            flags & !MSGFLAG_READ
        };
        props.set(PR_READ, Value::Boolean(read));
        props.set(PR_MESSAGE_FLAGS, Value::Long(flags));
        was_read != read
    }

    pub fn recipients(&self) -> &[PropValues] {
        &self.content.recipients
    }

    /// The union of the columns of every recipient row, in order of first
    /// appearance.
    pub fn recipient_columns(&self) -> Vec<PropTag> {
        let mut columns = Vec::new();
        for row in &self.content.recipients {
            for tag in row.tags() {
                if !columns.contains(&tag) {
                    columns.push(tag);
                }
            }
        }
        columns
    }

    /// Return the recipient rows whose row id is at least `row_id`.
    pub fn read_recipients(&self, row_id: u32) -> Vec<PropValues> {
        self.content
            .recipients
            .iter()
            .filter(|r| r.get_u32(PR_ROWID).unwrap_or(0) >= row_id)
            .cloned()
            .collect()
    }

    pub fn remove_all_recipients(&mut self) {
        self.content.recipients.clear();
    }

    /// Replace or delete recipient rows by row id. A row given as `None` is
    /// deleted.
    pub fn modify_recipients(
        &mut self,
        rows: Vec<(u32, Option<PropValues>)>,
    ) {
        let recipients = &mut self.content.recipients;
        for (row_id, row) in rows {
            recipients.retain(|r| r.get_u32(PR_ROWID) != Some(row_id));
            if let Some(mut row) = row {
                row.set(PR_ROWID, Value::Long(row_id));
                recipients.push(row);
            }
        }
        recipients.sort_by_key(|r| r.get_u32(PR_ROWID).unwrap_or(0));
    }

    pub fn attachments(&self) -> &[AttachmentContent] {
        &self.content.attachments
    }

    pub fn attachment(&self, attach_num: u32) -> Option<&AttachmentContent> {
        self.content
            .attachments
            .iter()
            .find(|a| a.attach_num() == Some(attach_num))
    }

    /// Reserve the number of a new attachment, refusing once the message
    /// has `ceiling` attachments.
    pub fn allocate_attach_num(&mut self, ceiling: u32) -> Result<u32, Error> {
        if self.content.attachments.len() >= ceiling as usize {
            return Err(Error::MaxAttachmentExceeded);
        }

        let num = self.next_attach_num;
        self.next_attach_num += 1;
        Ok(num)
    }

    pub fn delete_attachment(&mut self, attach_num: u32) -> bool {
        let before = self.content.attachments.len();
        self.content
            .attachments
            .retain(|a| a.attach_num() != Some(attach_num));
        before != self.content.attachments.len()
    }

    /// Store `attachment`, replacing any with the same number.
    pub fn put_attachment(&mut self, attachment: AttachmentContent) {
        let num = attachment.attach_num();
        let attachments = &mut self.content.attachments;
        match attachments.iter_mut().find(|a| a.attach_num() == num) {
            Some(existing) => *existing = attachment,
            None => {
                attachments.push(attachment);
                attachments.sort_by_key(AttachmentContent::attach_num);
            }
        }
    }

    /// Fail with `ObjectModified` if the stored message has changed since
    /// it was opened.
    pub fn check_original_touched(&self, logon: &Logon) -> Result<(), Error> {
        if self.is_new || self.is_embedded() {
            return Ok(());
        }

        let current = logon
            .store()
            .get_message_properties(
                None,
                self.cpid,
                self.message_id,
                &[PR_CHANGE_NUMBER],
            )?
            .get_u64(PR_CHANGE_NUMBER);
        if current != self.original_cn {
            warn!(
                "{} Message {:#x} was changed since it was opened",
                logon.log_prefix(),
                self.message_id
            );
            return Err(Error::ObjectModified);
        }

        Ok(())
    }

    /// Commit the in-memory copy.
    ///
    /// Messages in folders are written to the store under a new change
    /// number. Embedded messages are only stamped; the caller copies the
    /// content into the owning attachment.
    pub fn save(&mut self, logon: &Logon) -> Result<(), Error> {
        let flags = self.message_flags();
        let mut content = self.content.clone();
        let props = &mut content.props;
        props.set(PR_LAST_MODIFICATION_TIME, Value::SysTime(filetime::now()));
        props.set(PR_MESSAGE_FLAGS, Value::Long(flags));

        if let MessageParent::Folder(folder_id) = self.parent {
            let cn = logon.store().allocate_cn()?;
            let xid = Xid::new(logon.guid(), cn);
            let mut pcl = props
                .get_bytes(PR_PREDECESSOR_CHANGE_LIST)
                .and_then(Pcl::parse)
                .unwrap_or_default();
            pcl.merge(xid.clone());

            let cn_eid = eid::make_local_eid(cn);
            props.set(PR_CHANGE_NUMBER, Value::I8(cn_eid));
            props.set(PR_CHANGE_KEY, Value::Binary(xid.to_bytes()));
            props.set(
                PR_PREDECESSOR_CHANGE_LIST,
                Value::Binary(pcl.serialize()),
            );
            if !props.contains(PR_SOURCE_KEY) {
                let source_key = Xid::new(
                    logon.guid(),
                    eid::gc_value(self.message_id),
                );
                props.set(PR_SOURCE_KEY, Value::Binary(source_key.to_bytes()));
            }

            logon
                .store()
                .write_message(self.cpid, folder_id, &content)?;
            self.original_cn = Some(cn_eid);
        }

        self.content = content;
        self.is_new = false;
        Ok(())
    }
}
