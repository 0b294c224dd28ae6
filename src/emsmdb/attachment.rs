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

//! Open attachments.
//!
//! Like messages, an attachment is edited as an in-memory copy. Saving it
//! puts the copy back into the open message that owns it.

use super::message::{OpenFlags, TagAccess};
use super::values;
use crate::mapi::model::*;
use crate::mapi::tags::*;
use crate::store::{AttachmentContent, MessageContent};
use crate::support::error::{EcCode, Error};

#[derive(Debug)]
pub struct Attachment {
    /// The handle of the open message this attachment belongs to.
    message_handle: u32,
    attach_num: u32,
    cpid: u32,
    tag_access: TagAccess,
    open_flags: OpenFlags,
    is_new: bool,
    content: AttachmentContent,
}

static COMPUTED_TAGS: &[PropTag] =
    &[PR_ACCESS, PR_ACCESS_LEVEL, PR_OBJECT_TYPE, PR_ATTACH_SIZE];

fn is_readonly_prop(tag: PropTag) -> bool {
    if PT_OBJECT == tag.prop_type() {
        return true;
    }

    match tag {
        PR_ACCESS | PR_ACCESS_LEVEL | PR_ATTACH_NUM | PR_ATTACH_SIZE
        | PR_OBJECT_TYPE | PR_RECORD_KEY => true,
        _ => false,
    }
}

fn content_size(content: &AttachmentContent) -> usize {
    let props = content.props.iter().map(|pv| match pv.value {
        Value::Binary(ref b) | Value::String8(ref b) => b.len(),
        Value::Unicode(ref s) => s.len(),
        _ => 8,
    });
    props.sum::<usize>() + content.embedded.as_ref().map_or(0, |m| {
        m.props.len() * 8
            + m.attachments.iter().map(content_size).sum::<usize>()
    })
}

impl Attachment {
    /// Open `content`, which belongs to the message open as
    /// `message_handle`.
    pub fn open(
        message_handle: u32,
        content: AttachmentContent,
        cpid: u32,
        tag_access: TagAccess,
        open_flags: OpenFlags,
    ) -> Result<Self, Error> {
        let attach_num = content.attach_num().ok_or(Error::NotFound)?;
        Ok(Attachment {
            message_handle,
            attach_num,
            cpid,
            tag_access,
            open_flags,
            is_new: false,
            content,
        })
    }

    /// Start a new attachment with an allocated `attach_num`.
    pub fn create(
        message_handle: u32,
        attach_num: u32,
        cpid: u32,
        tag_access: TagAccess,
    ) -> Self {
        let mut props = PropValues::new();
        props.set(PR_ATTACH_NUM, Value::Long(attach_num));
        props.set(PR_RENDERING_POSITION, Value::Long(0xFFFF_FFFF));

        Attachment {
            message_handle,
            attach_num,
            cpid,
            tag_access,
            open_flags: OpenFlags::MODIFY,
            is_new: true,
            content: AttachmentContent {
                props,
                embedded: None,
            },
        }
    }

    pub fn message_handle(&self) -> u32 {
        self.message_handle
    }

    pub fn attach_num(&self) -> u32 {
        self.attach_num
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

    pub fn content(&self) -> &AttachmentContent {
        &self.content
    }

    pub fn embedded(&self) -> Option<&MessageContent> {
        self.content.embedded.as_deref()
    }

    /// Replace the embedded message, turning this into an
    /// embedded-message attachment.
    pub fn set_embedded(&mut self, message: MessageContent) {
        self.content
            .props
            .set(PR_ATTACH_METHOD, Value::Long(ATTACH_EMBEDDED_MSG));
        self.content.props.remove(PR_ATTACH_DATA_BIN);
        self.content.embedded = Some(Box::new(message));
    }

    fn computed(&self, tag: PropTag) -> Option<Value> {
        match tag {
            PR_ACCESS => Some(Value::Long(self.tag_access.bits())),
            PR_ACCESS_LEVEL => Some(Value::Long(
                self.open_flags.contains(OpenFlags::MODIFY) as u32,
            )),
            PR_OBJECT_TYPE => Some(Value::Long(MAPI_ATTACH)),
            PR_ATTACH_NUM => Some(Value::Long(self.attach_num)),
            PR_ATTACH_SIZE => {
                Some(Value::Long(content_size(&self.content) as u32))
            }
            _ => None,
        }
    }

    pub fn get_properties(
        &self,
        tags: &[PropTag],
    ) -> Result<PropValues, Error> {
        let mut out = PropValues::new();
        for &tag in tags {
            let pv = match self.computed(tag) {
                Some(value) => Some(PropVal::new(tag, value)),
                None => values::lookup(&self.content.props, tag, self.cpid)?,
            };

            if let Some(pv) = pv {
                out.push(pv);
            }
        }
        Ok(out)
    }

    pub fn get_all_proptags(&self) -> Vec<PropTag> {
        let mut tags = self.content.props.tags();
        for &tag in COMPUTED_TAGS {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    pub fn set_properties(
        &mut self,
        values: &PropValues,
    ) -> Result<Vec<PropProblem>, Error> {
        let mut problems = Vec::new();
        for (ix, pv) in values.iter().enumerate() {
            if is_readonly_prop(pv.tag) {
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
            if is_readonly_prop(tag) {
                problems.push(PropProblem::new(ix, tag, EcCode::ACCESS_DENIED));
            } else {
                values::remove(&mut self.content.props, tag);
            }
        }
        problems
    }

    /// Mark the attachment saved, returning the content to put into the
    /// owning message.
    pub fn save(&mut self) -> AttachmentContent {
        self.is_new = false;
        self.content.clone()
    }
}
