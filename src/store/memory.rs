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

//! In-memory collaborators for tests.
//!
//! Every `StoreClient` call is recorded by name so tests can assert how many
//! round trips an operation made.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::*;
use crate::mapi::eid;
use crate::mapi::tags::*;
use crate::mapi::xid::CHANGE_NUMBER_BEGIN;
use crate::support::error::EcCode;

struct Folder {
    parent: u64,
    props: PropValues,
    change_number: u64,
}

struct StoredMessage {
    folder_id: u64,
    content: MessageContent,
    owner: String,
    deleted: bool,
    read_cn: u64,
}

#[derive(Default)]
struct Inner {
    calls: Vec<&'static str>,
    fail: Option<&'static str>,
    refused: Vec<PropTag>,
    store_props: PropValues,
    named: Vec<PropertyName>,
    folders: BTreeMap<u64, Folder>,
    messages: BTreeMap<u64, StoredMessage>,
    rights: HashMap<(u64, String), FolderRights>,
    tables: BTreeMap<u32, Vec<u64>>,
    next_table: u32,
    next_gc: u64,
    next_cn: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn mid_row(msg: &StoredMessage) -> PropValues {
    let mut row = msg.content.props.clone();
    row.set(PR_FOLDER_ID, Value::I8(msg.folder_id));
    row
}

fn pick(props: &PropValues, tags: &[PropTag]) -> PropValues {
    tags.iter()
        .filter_map(|&tag| {
            props.get(tag).map(|v| PropVal::new(tag, v.clone()))
        })
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        let this = MemoryStore::default();
        {
            let mut inner = this.lock();
            inner.next_gc = 0x10000;
            inner.next_cn = CHANGE_NUMBER_BEGIN;
            inner.next_table = 1;
        }
        this
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn call(&self, name: &'static str) -> Result<MutexGuard<'_, Inner>, Error> {
        let mut inner = self.lock();
        inner.calls.push(name);
        if Some(name) == inner.fail {
            return Err(Error::Store(format!("{} failed", name)));
        }
        Ok(inner)
    }

    /// Names of the calls made so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.lock().calls.iter().filter(|&&c| c == name).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make every subsequent call named `name` fail.
    pub fn fail_on(&self, name: &'static str) {
        self.lock().fail = Some(name);
    }

    /// Make `set_message_properties` report `tag` as access denied.
    pub fn refuse_tag(&self, tag: PropTag) {
        self.lock().refused.push(tag);
    }

    pub fn set_store_prop(&self, tag: PropTag, value: Value) {
        self.lock().store_props.set(tag, value);
    }

    pub fn store_prop(&self, tag: PropTag) -> Option<Value> {
        self.lock().store_props.get(tag).cloned()
    }

    pub fn add_folder(&self, folder_id: u64, parent: u64) {
        let mut inner = self.lock();
        let change_number = Self::next_cn_eid(&mut inner);
        let mut props = PropValues::new();
        props.set(PR_FOLDER_ID, Value::I8(folder_id));
        props.set(PR_PARENT_FOLDER_ID, Value::I8(parent));
        props.set(PR_CHANGE_NUMBER, Value::I8(change_number));
        inner.folders.insert(
            folder_id,
            Folder {
                parent,
                props,
                change_number,
            },
        );
    }

    pub fn grant(&self, folder_id: u64, user: &str, rights: FolderRights) {
        self.lock()
            .rights
            .insert((folder_id, user.to_owned()), rights);
    }

    fn next_cn_eid(inner: &mut Inner) -> u64 {
        let cn = inner.next_cn;
        inner.next_cn += 1;
        eid::make_local_eid(cn)
    }

    /// Add a message, assigning it an id and change number. Returns the
    /// message id.
    pub fn add_message(
        &self,
        folder_id: u64,
        mut content: MessageContent,
        owner: &str,
    ) -> u64 {
        let mut inner = self.lock();
        let mid = eid::make_local_eid(inner.next_gc);
        inner.next_gc += 1;
        let cn = Self::next_cn_eid(&mut inner);
        content.props.set(PR_MID, Value::I8(mid));
        content.props.set(PR_CHANGE_NUMBER, Value::I8(cn));
        inner.messages.insert(
            mid,
            StoredMessage {
                folder_id,
                content,
                owner: owner.to_owned(),
                deleted: false,
                read_cn: 0,
            },
        );
        mid
    }

    /// Record a modification of `message_id` under a fresh change number.
    pub fn touch_message(&self, message_id: u64) {
        let mut inner = self.lock();
        let cn = Self::next_cn_eid(&mut inner);
        if let Some(msg) = inner.messages.get_mut(&message_id) {
            msg.content.props.set(PR_CHANGE_NUMBER, Value::I8(cn));
        }
    }

    pub fn soft_delete(&self, message_id: u64) {
        if let Some(msg) = self.lock().messages.get_mut(&message_id) {
            msg.deleted = true;
        }
    }

    pub fn hard_delete(&self, message_id: u64) {
        self.lock().messages.remove(&message_id);
    }

    pub fn message(&self, message_id: u64) -> Option<MessageContent> {
        self.lock()
            .messages
            .get(&message_id)
            .map(|m| m.content.clone())
    }

    pub fn message_prop(&self, message_id: u64, tag: PropTag) -> Option<Value> {
        self.lock()
            .messages
            .get(&message_id)
            .and_then(|m| m.content.props.get(tag).cloned())
    }

    pub fn set_message_prop(&self, message_id: u64, tag: PropTag, v: Value) {
        if let Some(msg) = self.lock().messages.get_mut(&message_id) {
            msg.content.props.set(tag, v);
        }
    }

    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }
}

impl StoreClient for MemoryStore {
    fn get_store_properties(
        &self,
        _cpid: u32,
        tags: &[PropTag],
    ) -> Result<PropValues, Error> {
        let inner = self.call("get_store_properties")?;
        Ok(pick(&inner.store_props, tags))
    }

    fn set_store_properties(
        &self,
        _cpid: u32,
        values: &PropValues,
    ) -> Result<Vec<PropProblem>, Error> {
        let mut inner = self.call("set_store_properties")?;
        let mut problems = Vec::new();
        for (ix, pv) in values.iter().enumerate() {
            if PT_ERROR == pv.tag.prop_type() {
                problems.push(PropProblem::new(
                    ix,
                    pv.tag,
                    EcCode::INVALID_PARAM,
                ));
                continue;
            }
            inner.store_props.set(pv.tag, pv.value.clone());
        }
        Ok(problems)
    }

    fn remove_store_properties(&self, tags: &[PropTag]) -> Result<(), Error> {
        let mut inner = self.call("remove_store_properties")?;
        for &tag in tags {
            inner.store_props.remove(tag);
        }
        Ok(())
    }

    fn get_store_all_proptags(&self) -> Result<Vec<PropTag>, Error> {
        Ok(self.call("get_store_all_proptags")?.store_props.tags())
    }

    fn get_named_propids(
        &self,
        create: bool,
        names: &[PropertyName],
    ) -> Result<Vec<u16>, Error> {
        let mut inner = self.call("get_named_propids")?;
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let key = match name.packed_key() {
                Some(key) => key,
                None => {
                    ids.push(0);
                    continue;
                }
            };

            let existing = inner
                .named
                .iter()
                .position(|n| n.packed_key().as_ref() == Some(&key));
            let ix = match existing {
                Some(ix) => ix,
                None if create => {
                    inner.named.push(name.clone());
                    inner.named.len() - 1
                }
                None => {
                    ids.push(0);
                    continue;
                }
            };
            ids.push(PropTag::NAMED_BASE + 1 + ix as u16);
        }
        Ok(ids)
    }

    fn get_named_propnames(
        &self,
        ids: &[u16],
    ) -> Result<Vec<Option<PropertyName>>, Error> {
        let inner = self.call("get_named_propnames")?;
        Ok(ids
            .iter()
            .map(|&id| {
                let ix = id.checked_sub(PropTag::NAMED_BASE + 1)?;
                inner.named.get(usize::from(ix)).cloned()
            })
            .collect())
    }

    fn get_folder_perm(
        &self,
        folder_id: u64,
        username: &str,
    ) -> Result<FolderRights, Error> {
        let inner = self.call("get_folder_perm")?;
        Ok(inner
            .rights
            .get(&(folder_id, username.to_owned()))
            .copied()
            .unwrap_or_else(FolderRights::empty))
    }

    fn check_folder_id(&self, folder_id: u64) -> Result<bool, Error> {
        Ok(self.call("check_folder_id")?.folders.contains_key(&folder_id))
    }

    fn get_folder_properties(
        &self,
        _cpid: u32,
        folder_id: u64,
        tags: &[PropTag],
    ) -> Result<PropValues, Error> {
        let inner = self.call("get_folder_properties")?;
        Ok(inner
            .folders
            .get(&folder_id)
            .map(|f| pick(&f.props, tags))
            .unwrap_or_default())
    }

    fn get_folder_all_proptags(
        &self,
        folder_id: u64,
    ) -> Result<Vec<PropTag>, Error> {
        let inner = self.call("get_folder_all_proptags")?;
        Ok(inner
            .folders
            .get(&folder_id)
            .map(|f| f.props.tags())
            .unwrap_or_default())
    }

    fn is_msg_present(
        &self,
        folder_id: u64,
        message_id: u64,
    ) -> Result<bool, Error> {
        let inner = self.call("is_msg_present")?;
        Ok(inner
            .messages
            .get(&message_id)
            .map_or(false, |m| m.folder_id == folder_id))
    }

    fn is_msg_deleted(&self, message_id: u64) -> Result<bool, Error> {
        let inner = self.call("is_msg_deleted")?;
        Ok(inner.messages.get(&message_id).map_or(false, |m| m.deleted))
    }

    fn is_message_owner(
        &self,
        message_id: u64,
        username: &str,
    ) -> Result<bool, Error> {
        let inner = self.call("is_message_owner")?;
        Ok(inner
            .messages
            .get(&message_id)
            .map_or(false, |m| m.owner == username))
    }

    fn get_message_properties(
        &self,
        _username: Option<&str>,
        _cpid: u32,
        message_id: u64,
        tags: &[PropTag],
    ) -> Result<PropValues, Error> {
        let inner = self.call("get_message_properties")?;
        Ok(inner
            .messages
            .get(&message_id)
            .map(|m| pick(&mid_row(m), tags))
            .unwrap_or_default())
    }

    fn set_message_properties(
        &self,
        _username: Option<&str>,
        _cpid: u32,
        message_id: u64,
        values: &PropValues,
    ) -> Result<Vec<PropProblem>, Error> {
        let mut inner = self.call("set_message_properties")?;
        let refused = inner.refused.clone();
        let msg = inner
            .messages
            .get_mut(&message_id)
            .ok_or(Error::NotFound)?;
        let mut problems = Vec::new();
        for (ix, pv) in values.iter().enumerate() {
            if refused.contains(&pv.tag) {
                problems.push(PropProblem::new(
                    ix,
                    pv.tag,
                    EcCode::ACCESS_DENIED,
                ));
                continue;
            }
            msg.content.props.set(pv.tag, pv.value.clone());
        }
        Ok(problems)
    }

    fn remove_message_property(
        &self,
        _cpid: u32,
        message_id: u64,
        tag: PropTag,
    ) -> Result<(), Error> {
        let mut inner = self.call("remove_message_property")?;
        if let Some(msg) = inner.messages.get_mut(&message_id) {
            msg.content.props.remove(tag);
        }
        Ok(())
    }

    fn set_message_read_state(
        &self,
        _username: Option<&str>,
        message_id: u64,
        read: bool,
    ) -> Result<u64, Error> {
        let mut inner = self.call("set_message_read_state")?;
        let read_cn = Self::next_cn_eid(&mut inner);
        let msg = inner
            .messages
            .get_mut(&message_id)
            .ok_or(Error::NotFound)?;
        msg.read_cn = read_cn;
        msg.content.props.set(PR_READ, Value::Boolean(read));
        let flags = msg.content.props.get_u32(PR_MESSAGE_FLAGS).unwrap_or(0);
        let flags = if read {
            flags | MSGFLAG_READ
        } else {
            flags & !MSGFLAG_READ
        };
        msg.content.props.set(PR_MESSAGE_FLAGS, Value::Long(flags));
        Ok(read_cn)
    }

    fn mark_modified(&self, message_id: u64) -> Result<(), Error> {
        let mut inner = self.call("mark_modified")?;
        if let Some(msg) = inner.messages.get_mut(&message_id) {
            let flags =
                msg.content.props.get_u32(PR_MESSAGE_FLAGS).unwrap_or(0);
            msg.content.props.set(
                PR_MESSAGE_FLAGS,
                Value::Long(flags & !MSGFLAG_UNMODIFIED),
            );
        }
        Ok(())
    }

    fn get_message_brief(
        &self,
        _cpid: u32,
        message_id: u64,
    ) -> Result<Option<MessageContent>, Error> {
        let inner = self.call("get_message_brief")?;
        Ok(inner.messages.get(&message_id).map(|m| MessageContent {
            props: pick(
                &m.content.props,
                &[PR_MID, PR_SUBJECT, PR_MESSAGE_CLASS],
            ),
            recipients: m.content.recipients.clone(),
            attachments: vec![],
        }))
    }

    fn read_message(
        &self,
        _username: Option<&str>,
        _cpid: u32,
        message_id: u64,
    ) -> Result<Option<MessageContent>, Error> {
        let inner = self.call("read_message")?;
        Ok(inner.messages.get(&message_id).map(|m| m.content.clone()))
    }

    fn write_message(
        &self,
        _cpid: u32,
        folder_id: u64,
        content: &MessageContent,
    ) -> Result<(), Error> {
        let mut inner = self.call("write_message")?;
        let mid = content
            .props
            .get_u64(PR_MID)
            .ok_or_else(|| Error::Store("message without PR_MID".to_owned()))?;
        let (owner, read_cn) = inner
            .messages
            .get(&mid)
            .map(|m| (m.owner.clone(), m.read_cn))
            .unwrap_or_default();
        inner.messages.insert(
            mid,
            StoredMessage {
                folder_id,
                content: content.clone(),
                owner,
                deleted: false,
                read_cn,
            },
        );
        Ok(())
    }

    fn allocate_message_id(&self, _folder_id: u64) -> Result<u64, Error> {
        let mut inner = self.call("allocate_message_id")?;
        let mid = eid::make_local_eid(inner.next_gc);
        inner.next_gc += 1;
        Ok(mid)
    }

    fn allocate_cn(&self) -> Result<u64, Error> {
        let mut inner = self.call("allocate_cn")?;
        let cn = inner.next_cn;
        inner.next_cn += 1;
        Ok(cn)
    }

    fn load_content_table(
        &self,
        _cpid: u32,
        folder_id: u64,
        _username: Option<&str>,
        restriction: Option<&Restriction>,
    ) -> Result<(u32, u32), Error> {
        let mut inner = self.call("load_content_table")?;
        let rows: Vec<u64> = inner
            .messages
            .iter()
            .filter(|&(_, m)| {
                let assoc = m.content.props.get_bool(PR_ASSOCIATED);
                m.folder_id == folder_id
                    && !m.deleted
                    && !assoc.unwrap_or(false)
                    && restriction.map_or(true, |r| r.matches(&mid_row(m)))
            })
            .map(|(&mid, _)| mid)
            .collect();
        let table_id = inner.next_table;
        inner.next_table += 1;
        let count = rows.len() as u32;
        inner.tables.insert(table_id, rows);
        Ok((table_id, count))
    }

    fn query_table(
        &self,
        _username: Option<&str>,
        _cpid: u32,
        table_id: u32,
        tags: &[PropTag],
        start: u32,
        count: u32,
    ) -> Result<Vec<PropValues>, Error> {
        let inner = self.call("query_table")?;
        let rows = inner.tables.get(&table_id).ok_or(Error::NotFound)?;
        Ok(rows
            .iter()
            .skip(start as usize)
            .take(count as usize)
            .filter_map(|mid| inner.messages.get(mid))
            .map(|m| pick(&mid_row(m), tags))
            .collect())
    }

    fn unload_table(&self, table_id: u32) -> Result<(), Error> {
        self.call("unload_table")?.tables.remove(&table_id);
        Ok(())
    }

    fn get_content_sync_rows(
        &self,
        folder_id: u64,
        _username: Option<&str>,
        restriction: Option<&Restriction>,
    ) -> Result<Vec<SyncRow>, Error> {
        let inner = self.call("get_content_sync_rows")?;
        let mut rows: Vec<SyncRow> = inner
            .messages
            .iter()
            .filter(|&(_, m)| m.folder_id == folder_id && !m.deleted)
            .map(|(&mid, m)| {
                let props = &m.content.props;
                SyncRow {
                    message_id: mid,
                    change_number: props
                        .get_u64(PR_CHANGE_NUMBER)
                        .unwrap_or(0),
                    read_cn: m.read_cn,
                    read: props.get_bool(PR_READ).unwrap_or(false),
                    associated: props
                        .get_bool(PR_ASSOCIATED)
                        .unwrap_or(false),
                    in_scope: restriction
                        .map_or(true, |r| r.matches(&mid_row(m))),
                }
            })
            .collect();
        rows.sort_by_key(|r| eid::gc_value(r.change_number));
        Ok(rows)
    }

    fn get_hierarchy_sync_rows(
        &self,
        folder_id: u64,
    ) -> Result<Vec<FolderSyncRow>, Error> {
        let inner = self.call("get_hierarchy_sync_rows")?;
        let mut rows = Vec::new();
        let mut pending = vec![folder_id];
        while let Some(parent) = pending.pop() {
            for (&fid, folder) in &inner.folders {
                if folder.parent == parent && fid != parent {
                    pending.push(fid);
                    rows.push(FolderSyncRow {
                        folder_id: fid,
                        change_number: folder.change_number,
                    });
                }
            }
        }
        rows.sort_by_key(|r| eid::gc_value(r.change_number));
        Ok(rows)
    }
}

/// A directory holding a fixed set of users.
#[derive(Default)]
pub struct MemoryDirectory {
    users: HashMap<String, (String, UserIds)>,
    offline: AtomicBool,
}

impl MemoryDirectory {
    pub fn add_user(&mut self, username: &str, display: &str, ids: UserIds) {
        self.users
            .insert(username.to_lowercase(), (display.to_owned(), ids));
    }

    /// Make every later lookup fail.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), Error> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::Store("directory unavailable".to_owned()))
        } else {
            Ok(())
        }
    }
}

impl Directory for MemoryDirectory {
    fn user_display_name(
        &self,
        username: &str,
    ) -> Result<Option<String>, Error> {
        self.check_online()?;
        Ok(self
            .users
            .get(&username.to_lowercase())
            .map(|(display, _)| display.clone()))
    }

    fn user_ids(&self, username: &str) -> Result<Option<UserIds>, Error> {
        self.check_online()?;
        Ok(self.users.get(&username.to_lowercase()).map(|&(_, ids)| ids))
    }
}

/// Records the receipts it is asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Option<u64>)>>,
}

impl RecordingNotifier {
    /// The (account, message id) pairs of every receipt sent.
    pub fn sent(&self) -> Vec<(String, Option<u64>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl ReceiptNotifier for RecordingNotifier {
    fn notify_read(
        &self,
        account: &str,
        brief: &MessageContent,
    ) -> Result<(), Error> {
        self.sent
            .lock()
            .unwrap()
            .push((account.to_owned(), brief.props.get_u64(PR_MID)));
        Ok(())
    }
}
