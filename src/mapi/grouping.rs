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

//! Property grouping for partial message change transmission.
//!
//! Each version of the grouping is identified by a group id. The set of
//! versions is process-wide, append-only, and the newest id can be read
//! without taking any lock.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam::sync::ShardedLock;
use lazy_static::lazy_static;

use super::model::*;
use super::tags::*;
use crate::support::error::Error;

/// The group id of the built-in grouping.
pub const BUILTIN_GROUP_ID: u32 = 1;

const PIDLID_REMINDER_TIME: u32 = 0x8502;
const PIDLID_REMINDER_SET: u32 = 0x8503;

#[derive(Clone, Debug, PartialEq)]
pub enum GroupMember {
    Tag(PropTag),
    Named { name: PropertyName, prop_type: u16 },
}

/// An unresolved grouping version, as published process-wide.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupDefinition {
    pub group_id: u32,
    pub groups: Vec<Vec<GroupMember>>,
}

/// A grouping version with named members mapped to one logon's ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyGroupInfo {
    pub group_id: u32,
    pub groups: Vec<Vec<PropTag>>,
}

impl PropertyGroupInfo {
    /// Return the index of the group containing `tag`, if any.
    pub fn group_of(&self, tag: PropTag) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(&tag))
    }
}

impl GroupDefinition {
    /// Map this definition onto a logon's property ids.
    ///
    /// `resolve` returns the id of a named property, or 0 if it cannot be
    /// mapped; such members are left out.
    pub fn resolve(
        &self,
        mut resolve: impl FnMut(&PropertyName) -> Result<u16, Error>,
    ) -> Result<PropertyGroupInfo, Error> {
        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut tags = Vec::with_capacity(group.len());
            for member in group {
                match *member {
                    GroupMember::Tag(tag) => tags.push(tag),
                    GroupMember::Named {
                        ref name,
                        prop_type,
                    } => {
                        let id = resolve(name)?;
                        if 0 != id {
                            tags.push(PropTag::new(id, prop_type));
                        }
                    }
                }
            }
            groups.push(tags);
        }

        Ok(PropertyGroupInfo {
            group_id: self.group_id,
            groups,
        })
    }

    fn builtin() -> Self {
        use self::GroupMember::Tag;

        GroupDefinition {
            group_id: BUILTIN_GROUP_ID,
            groups: vec![
                vec![
                    Tag(PR_BODY),
                    Tag(PR_BODY_A),
                    Tag(PR_HTML),
                    Tag(PR_RTF_COMPRESSED),
                ],
                vec![
                    Tag(PR_SUBJECT),
                    Tag(PR_MESSAGE_CLASS),
                    Tag(PR_DISPLAY_NAME),
                ],
                vec![Tag(PR_MESSAGE_FLAGS), Tag(PR_READ), Tag(PR_MSG_STATUS)],
                vec![
                    GroupMember::Named {
                        name: PropertyName::lid(
                            PSETID_COMMON,
                            PIDLID_REMINDER_SET,
                        ),
                        prop_type: PT_BOOLEAN,
                    },
                    GroupMember::Named {
                        name: PropertyName::lid(
                            PSETID_COMMON,
                            PIDLID_REMINDER_TIME,
                        ),
                        prop_type: PT_SYSTIME,
                    },
                ],
            ],
        }
    }
}

#[derive(Default)]
struct Registry {
    versions: BTreeMap<u32, Arc<GroupDefinition>>,
}

lazy_static! {
    static ref REGISTRY: ShardedLock<Registry> = {
        let mut registry = Registry::default();
        registry
            .versions
            .insert(BUILTIN_GROUP_ID, Arc::new(GroupDefinition::builtin()));
        ShardedLock::new(registry)
    };
}

static LAST_GROUP_ID: AtomicU32 = AtomicU32::new(BUILTIN_GROUP_ID);

/// Return the id of the newest grouping version.
pub fn last_group_id() -> u32 {
    LAST_GROUP_ID.load(Ordering::Acquire)
}

/// Look up a grouping version.
pub fn definition(group_id: u32) -> Option<Arc<GroupDefinition>> {
    let registry = match REGISTRY.read() {
        Ok(r) => r,
        Err(poisoned) => poisoned.into_inner(),
    };
    registry.versions.get(&group_id).cloned()
}

/// Publish a new grouping version, which becomes the newest.
///
/// Group ids must strictly increase.
pub fn publish(def: GroupDefinition) -> Result<u32, Error> {
    let mut registry = match REGISTRY.write() {
        Ok(r) => r,
        Err(poisoned) => poisoned.into_inner(),
    };

    let group_id = def.group_id;
    if group_id <= last_group_id() {
        return Err(Error::InvalidParam);
    }

    registry.versions.insert(group_id, Arc::new(def));
    LAST_GROUP_ID.store(group_id, Ordering::Release);
    Ok(group_id)
}
