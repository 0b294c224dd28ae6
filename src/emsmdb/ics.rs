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

//! Incremental change synchronisation: the download context.
//!
//! A download context is bound to one folder. The client hands over the
//! state it saved at the end of its last synchronisation; `make_content` or
//! `make_hierarchy` diff the folder against it, after which the client
//! drains the changes, deletions and read state flips one call at a time
//! and finally fetches the new state to keep for next time.

use std::convert::TryFrom;

use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

use super::logon::Logon;
use crate::mapi::eid::{self, LOCAL_REPLID};
use crate::mapi::idset::{decode_globset, IdSet};
use crate::mapi::model::*;
use crate::mapi::range_set::RangeSet;
use crate::mapi::restriction::Restriction;
use crate::mapi::tags::*;
use crate::store::MessageContent;
use crate::support::error::Error;

bitflags! {
    pub struct SyncFlags: u16 {
        const UNICODE = 0x01;
        const NO_DELETIONS = 0x02;
        const NO_SOFT_DELETIONS = 0x04;
        const READ_STATE = 0x08;
        const FAI = 0x10;
        const NORMAL = 0x20;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncType {
    Contents,
    Hierarchy,
}

static STATE_TAGS: &[PropTag] = &[
    META_TAG_IDSET_GIVEN,
    META_TAG_CNSET_SEEN,
    META_TAG_CNSET_SEEN_FAI,
    META_TAG_CNSET_READ,
];

/// What a client knows about a folder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IcsState {
    /// Ids of the messages or folders the client holds.
    pub given: IdSet,
    /// Change numbers the client has seen.
    pub seen: IdSet,
    /// Change numbers of associated messages the client has seen.
    pub seen_fai: IdSet,
    /// Read state change numbers the client has seen.
    pub read: IdSet,
}

/// Split a state blob into its (tag, payload) records.
pub fn state_records(
    mut bytes: &[u8],
) -> Result<Vec<(PropTag, &[u8])>, Error> {
    let mut records = Vec::new();
    while !bytes.is_empty() {
        if bytes.len() < 8 {
            return Err(Error::BadState("truncated record header"));
        }

        let tag = PropTag(LittleEndian::read_u32(&bytes[..4]));
        let len = LittleEndian::read_u32(&bytes[4..8]) as usize;
        bytes = &bytes[8..];
        if bytes.len() < len {
            return Err(Error::BadState("truncated record"));
        }

        records.push((tag, &bytes[..len]));
        bytes = &bytes[len..];
    }
    Ok(records)
}

/// Decode the (replica GUID, range set) pairs of one id-set payload without
/// mapping replicas to local ids.
pub fn describe_idset(
    mut bytes: &[u8],
) -> Result<Vec<(Guid, RangeSet)>, Error> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let guid = Guid::from_slice(bytes)
            .ok_or(Error::BadState("truncated replica GUID"))?;
        bytes = &bytes[16..];
        out.push((guid, decode_globset(&mut bytes)?));
    }
    Ok(out)
}

impl IcsState {
    /// Parse a state blob. Replicas other than `guid` are dropped.
    pub fn parse(bytes: &[u8], guid: Guid) -> Result<Self, Error> {
        let replid_of = |g: &Guid| {
            if *g == guid {
                Some(LOCAL_REPLID)
            } else {
                None
            }
        };

        let mut this = IcsState::default();
        for (tag, payload) in state_records(bytes)? {
            let set = match tag {
                META_TAG_IDSET_GIVEN => &mut this.given,
                META_TAG_CNSET_SEEN => &mut this.seen,
                META_TAG_CNSET_SEEN_FAI => &mut this.seen_fai,
                META_TAG_CNSET_READ => &mut this.read,
                _ => continue,
            };
            *set = IdSet::deserialize(payload, replid_of)?;
        }
        Ok(this)
    }

    pub fn serialize(&self, guid: Guid) -> Result<Vec<u8>, Error> {
        let guid_of = |replid: u16| {
            if LOCAL_REPLID == replid {
                Some(guid)
            } else {
                None
            }
        };

        let mut out = Vec::new();
        for &tag in STATE_TAGS {
            let set = match tag {
                META_TAG_IDSET_GIVEN => &self.given,
                META_TAG_CNSET_SEEN => &self.seen,
                META_TAG_CNSET_SEEN_FAI => &self.seen_fai,
                _ => &self.read,
            };
            let payload = set.serialize(guid_of)?;
            let len = u32::try_from(payload.len())
                .map_err(|_| Error::BadState("id-set too large"))?;

            let mut header = [0u8; 8];
            LittleEndian::write_u32(&mut header[..4], tag.0);
            LittleEndian::write_u32(&mut header[4..], len);
            out.extend_from_slice(&header);
            out.extend_from_slice(&payload);
        }
        Ok(out)
    }
}

/// One changed message, ready to send.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageChange {
    pub message_id: u64,
    pub associated: bool,
    pub content: MessageContent,
}

/// One changed folder, ready to send.
#[derive(Clone, Debug, PartialEq)]
pub struct FolderChange {
    pub folder_id: u64,
    pub props: PropValues,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deletions {
    /// Ids which no longer exist.
    pub deleted: IdSet,
    /// Ids which still exist but fell out of the restriction.
    pub nolonger: Vec<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadStates {
    pub read: Vec<u64>,
    pub unread: Vec<u64>,
}

/// How much a diff produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub changes: usize,
    pub fai_changes: usize,
    pub deletions: u64,
    pub read_changes: usize,
}

#[derive(Clone, Copy, Debug)]
struct Change {
    id: u64,
    change_number: u64,
    associated: bool,
}

#[derive(Debug, Default)]
struct Progress {
    changes: Vec<Change>,
    change_pos: usize,
    deletions: Option<Deletions>,
    read_states: Option<ReadStates>,
    read_cns: Vec<u64>,
    given_after: IdSet,
    last_cn: u64,
    last_read_cn: u64,
}

impl Progress {
    fn drained(&self) -> bool {
        self.change_pos >= self.changes.len()
            && self.deletions.is_none()
            && self.read_states.is_none()
    }
}

#[derive(Debug)]
enum Phase {
    Idle,
    Active(Progress),
    Done,
}

/// A download context bound to one folder.
#[derive(Debug)]
pub struct IcsDownload {
    sync_type: SyncType,
    folder_id: u64,
    flags: SyncFlags,
    restriction: Option<Restriction>,
    state: IcsState,
    phase: Phase,
}

impl IcsDownload {
    pub fn new(
        sync_type: SyncType,
        folder_id: u64,
        flags: SyncFlags,
        restriction: Option<Restriction>,
    ) -> Self {
        IcsDownload {
            sync_type,
            folder_id,
            flags,
            restriction,
            state: IcsState::default(),
            phase: Phase::Idle,
        }
    }

    pub fn sync_type(&self) -> SyncType {
        self.sync_type
    }

    pub fn folder_id(&self) -> u64 {
        self.folder_id
    }

    pub fn state(&self) -> &IcsState {
        &self.state
    }

    /// Whether the diff has been computed and fully delivered.
    pub fn is_done(&self) -> bool {
        match self.phase {
            Phase::Done => true,
            _ => false,
        }
    }

    /// Install the client's saved state. Only allowed before the diff is
    /// made.
    pub fn set_state(
        &mut self,
        logon: &Logon,
        blob: &[u8],
    ) -> Result<(), Error> {
        match self.phase {
            Phase::Idle => (),
            _ => return Err(Error::NotSupported),
        }

        self.state = IcsState::parse(blob, logon.guid())?;
        Ok(())
    }

    /// Diff the messages of the folder against the client state.
    pub fn make_content(
        &mut self,
        logon: &Logon,
    ) -> Result<SyncCounts, Error> {
        self.check_can_start(SyncType::Contents)?;

        let rows = logon.store().get_content_sync_rows(
            self.folder_id,
            logon.readstate_user(),
            self.restriction.as_ref(),
        )?;

        let want_normal = self.flags.contains(SyncFlags::NORMAL);
        let want_fai = self.flags.contains(SyncFlags::FAI);
        let mut progress = Progress::default();
        let mut nolonger = Vec::new();
        let mut read_states = ReadStates::default();

        for row in &rows {
            let wanted = if row.associated {
                want_fai
            } else {
                want_normal
            };
            if !wanted {
                // Outside the requested classes; whatever the client holds
                // of it stays as it is.
                if self.state.given.contains_eid(row.message_id) {
                    progress.given_after.insert_eid(row.message_id);
                }
                continue;
            }

            if !row.in_scope {
                if self.state.given.contains_eid(row.message_id) {
                    nolonger.push(row.message_id);
                }
                continue;
            }

            progress.given_after.insert_eid(row.message_id);
            progress.last_cn =
                progress.last_cn.max(eid::gc_value(row.change_number));

            let seen = if row.associated {
                &self.state.seen_fai
            } else {
                &self.state.seen
            };
            if 0 != row.read_cn && !row.associated {
                progress.last_read_cn =
                    progress.last_read_cn.max(eid::gc_value(row.read_cn));
            }

            let changed = !seen.contains_eid(row.change_number)
                || !self.state.given.contains_eid(row.message_id);
            if changed {
                progress.changes.push(Change {
                    id: row.message_id,
                    change_number: row.change_number,
                    associated: row.associated,
                });
                continue;
            }

            if 0 != row.read_cn
                && !row.associated
                && self.flags.contains(SyncFlags::READ_STATE)
                && !self.state.read.contains_eid(row.read_cn)
            {
                if row.read {
                    read_states.read.push(row.message_id);
                } else {
                    read_states.unread.push(row.message_id);
                }
                progress.read_cns.push(row.read_cn);
            }
        }

        let deleted = self.deleted_ids(&progress.given_after, &nolonger);
        let counts = SyncCounts {
            changes: progress
                .changes
                .iter()
                .filter(|c| !c.associated)
                .count(),
            fai_changes: progress
                .changes
                .iter()
                .filter(|c| c.associated)
                .count(),
            deletions: deleted.len() + nolonger.len() as u64,
            read_changes: read_states.read.len() + read_states.unread.len(),
        };

        if 0 != counts.deletions {
            progress.deletions = Some(Deletions { deleted, nolonger });
        }
        if 0 != counts.read_changes {
            progress.read_states = Some(read_states);
        }

        info!(
            "{} Content sync of {:#x}: {} changed, {} FAI changed, \
             {} deleted, {} read state changes",
            logon.log_prefix(),
            self.folder_id,
            counts.changes,
            counts.fai_changes,
            counts.deletions,
            counts.read_changes
        );

        self.start(progress);
        Ok(counts)
    }

    /// Diff the subfolders of the folder against the client state.
    pub fn make_hierarchy(
        &mut self,
        logon: &Logon,
    ) -> Result<SyncCounts, Error> {
        self.check_can_start(SyncType::Hierarchy)?;

        let rows = logon.store().get_hierarchy_sync_rows(self.folder_id)?;
        let mut progress = Progress::default();
        for row in &rows {
            progress.given_after.insert_eid(row.folder_id);
            progress.last_cn =
                progress.last_cn.max(eid::gc_value(row.change_number));
            if !self.state.seen.contains_eid(row.change_number)
                || !self.state.given.contains_eid(row.folder_id)
            {
                progress.changes.push(Change {
                    id: row.folder_id,
                    change_number: row.change_number,
                    associated: false,
                });
            }
        }

        let deleted = self.deleted_ids(&progress.given_after, &[]);
        let counts = SyncCounts {
            changes: progress.changes.len(),
            deletions: deleted.len(),
            ..SyncCounts::default()
        };
        if !deleted.is_empty() {
            progress.deletions = Some(Deletions {
                deleted,
                nolonger: Vec::new(),
            });
        }

        info!(
            "{} Hierarchy sync of {:#x}: {} changed, {} deleted",
            logon.log_prefix(),
            self.folder_id,
            counts.changes,
            counts.deletions
        );

        self.start(progress);
        Ok(counts)
    }

    fn check_can_start(&self, sync_type: SyncType) -> Result<(), Error> {
        match self.phase {
            Phase::Idle if sync_type == self.sync_type => Ok(()),
            _ => Err(Error::NotSupported),
        }
    }

    /// Ids the client holds which are neither `present` nor `nolonger`.
    ///
    /// The client state may hold arbitrarily wide ranges, so this works on
    /// whole ranges and never enumerates ids.
    fn deleted_ids(&self, present: &IdSet, nolonger: &[u64]) -> IdSet {
        if self.flags.contains(SyncFlags::NO_DELETIONS) {
            return IdSet::new();
        }

        let mut deleted = self.state.given.clone();
        deleted.subtract(present);
        for &id in nolonger {
            deleted.remove_eid(id);
        }
        deleted
    }

    fn start(&mut self, progress: Progress) {
        self.phase = Phase::Active(progress);
        self.finish_if_drained();
    }

    fn progress(&mut self) -> Option<&mut Progress> {
        match self.phase {
            Phase::Active(ref mut progress) => Some(progress),
            _ => None,
        }
    }

    /// Once everything was delivered, the client holds exactly what the
    /// folder held at diff time.
    fn finish_if_drained(&mut self) {
        let flags = self.flags;
        let sync_type = self.sync_type;
        let progress = match self.phase {
            Phase::Active(ref mut progress) if progress.drained() => {
                std::mem::take(progress)
            }
            _ => return,
        };

        self.state.given = progress.given_after;
        if progress.last_cn > 0 {
            if SyncType::Hierarchy == sync_type
                || flags.contains(SyncFlags::NORMAL)
            {
                self.state
                    .seen
                    .insert_range(LOCAL_REPLID, 1, progress.last_cn);
            }
            if SyncType::Contents == sync_type
                && flags.contains(SyncFlags::FAI)
            {
                self.state.seen_fai.insert_range(
                    LOCAL_REPLID,
                    1,
                    progress.last_cn,
                );
            }
        }
        if progress.last_read_cn > 0
            && flags.contains(SyncFlags::READ_STATE)
        {
            self.state
                .read
                .insert_range(LOCAL_REPLID, 1, progress.last_read_cn);
        }

        self.phase = Phase::Done;
    }

    fn next_change(&mut self) -> Option<Change> {
        let progress = self.progress()?;
        let change = progress.changes.get(progress.change_pos).copied()?;
        progress.change_pos += 1;
        Some(change)
    }

    fn note_delivered(&mut self, change: Change) {
        self.state.given.insert_eid(change.id);
        if change.associated {
            self.state.seen_fai.insert_eid(change.change_number);
        } else {
            self.state.seen.insert_eid(change.change_number);
        }
    }

    /// Deliver the next changed message, or `None` once there are no more.
    ///
    /// Messages which vanished since the diff are skipped.
    pub fn sync_message_change(
        &mut self,
        logon: &Logon,
    ) -> Result<Option<MessageChange>, Error> {
        if SyncType::Contents != self.sync_type {
            return Err(Error::NotSupported);
        }

        let result = loop {
            let change = match self.next_change() {
                Some(change) => change,
                None => break None,
            };

            let content = logon.store().read_message(
                logon.readstate_user(),
                logon.session().cpid,
                change.id,
            )?;
            match content {
                Some(content) => {
                    self.note_delivered(change);
                    break Some(MessageChange {
                        message_id: change.id,
                        associated: change.associated,
                        content,
                    });
                }
                None => debug!(
                    "{} Message {:#x} vanished during sync",
                    logon.log_prefix(),
                    change.id
                ),
            }
        };

        self.finish_if_drained();
        Ok(result)
    }

    /// Deliver the next changed folder, or `None` once there are no more.
    pub fn sync_folder_change(
        &mut self,
        logon: &Logon,
    ) -> Result<Option<FolderChange>, Error> {
        if SyncType::Hierarchy != self.sync_type {
            return Err(Error::NotSupported);
        }

        let result = loop {
            let change = match self.next_change() {
                Some(change) => change,
                None => break None,
            };

            let store = logon.store();
            if !store.check_folder_id(change.id)? {
                continue;
            }

            let tags = store.get_folder_all_proptags(change.id)?;
            let props = store.get_folder_properties(
                logon.session().cpid,
                change.id,
                &tags,
            )?;
            self.note_delivered(change);
            break Some(FolderChange {
                folder_id: change.id,
                props,
            });
        };

        self.finish_if_drained();
        Ok(result)
    }

    /// Deliver all deletions at once. `None` if there are none or they were
    /// already delivered.
    pub fn sync_deletions(&mut self) -> Option<Deletions> {
        let deletions = self.progress()?.deletions.take()?;
        self.state.given.subtract(&deletions.deleted);
        for &id in &deletions.nolonger {
            self.state.given.remove_eid(id);
        }
        self.finish_if_drained();
        Some(deletions)
    }

    /// Deliver all read state changes at once. `None` if there are none or
    /// they were already delivered.
    pub fn sync_readstates(&mut self) -> Option<ReadStates> {
        let progress = self.progress()?;
        let read_states = progress.read_states.take()?;
        let read_cns = std::mem::take(&mut progress.read_cns);
        for read_cn in read_cns {
            self.state.read.insert_eid(read_cn);
        }
        self.finish_if_drained();
        Some(read_states)
    }

    /// Serialise what the client holds as of now.
    pub fn get_state(&self, logon: &Logon) -> Result<Vec<u8>, Error> {
        self.state.serialize(logon.guid())
    }
}
