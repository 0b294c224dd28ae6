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

//! The logon object: one open private mailbox or public store.

use std::sync::Arc;

use log::info;

use super::calculated::{self, Calculated};
use super::name_cache::NameCache;
use crate::mapi::grouping::{self, PropertyGroupInfo};
use crate::mapi::model::*;
use crate::mapi::tags::*;
use crate::mapi::xid;
use crate::store::{Services, StoreClient};
use crate::support::error::{EcCode, Error};
use crate::support::log_prefix::LogPrefix;

/// Logon flag marking a private mailbox rather than a public store.
pub const LOGON_FLAG_PRIVATE: u8 = 0x01;

/// How the client relates to the store it logged on to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogonMode {
    Owner,
    Delegate,
    Guest,
}

/// Facts about the protocol session a logon belongs to.
#[derive(Clone, Debug)]
pub struct SessionInfo {
    /// The authenticated user.
    pub username: String,
    pub cpid: u32,
    pub lcid_string: u32,
    pub lcid_sort: u32,
}

/// What is known about the store being logged on to.
#[derive(Clone, Debug)]
pub struct LogonInfo {
    pub logon_flags: u8,
    pub open_flags: u32,
    pub mode: LogonMode,
    pub account_id: u32,
    pub domain_id: u32,
    /// The mailbox address for private stores, or the domain for public
    /// ones.
    pub account: String,
    pub mailbox_guid: Guid,
}

pub struct Logon {
    pub logon_flags: u8,
    pub open_flags: u32,
    pub mode: LogonMode,
    pub account_id: u32,
    pub domain_id: u32,
    pub account: String,
    pub mailbox_guid: Guid,

    store: Arc<dyn StoreClient>,
    services: Services,
    session: Arc<SessionInfo>,
    log_prefix: LogPrefix,

    names: NameCache,
    last_group: Option<PropertyGroupInfo>,
    group_list: Vec<PropertyGroupInfo>,
}

fn is_readonly_prop(tag: PropTag) -> bool {
    if PT_OBJECT == tag.prop_type() {
        return true;
    }

    match tag {
        PR_ACCESS_LEVEL
        | PR_EMS_AB_DISPLAY_NAME_PRINTABLE
        | PR_EMS_AB_DISPLAY_NAME_PRINTABLE_A
        | PR_CODE_PAGE_ID
        | PR_CONTENT_COUNT
        | PR_DELETE_AFTER_SUBMIT
        | PR_DELETED_ASSOC_MESSAGE_SIZE
        | PR_DELETED_ASSOC_MESSAGE_SIZE_EXTENDED
        | PR_DELETED_ASSOC_MSG_COUNT
        | PR_DELETED_MESSAGE_SIZE
        | PR_DELETED_MESSAGE_SIZE_EXTENDED
        | PR_DELETED_MSG_COUNT
        | PR_DELETED_NORMAL_MESSAGE_SIZE
        | PR_DELETED_NORMAL_MESSAGE_SIZE_EXTENDED
        | PR_EMAIL_ADDRESS
        | PR_EMAIL_ADDRESS_A
        | PR_EXTENDED_RULE_SIZE_LIMIT
        | PR_INTERNET_ARTICLE_NUMBER
        | PR_LOCALE_ID
        | PR_MAX_SUBMIT_MESSAGE_SIZE
        | PR_MAILBOX_OWNER_ENTRYID
        | PR_MAILBOX_OWNER_NAME
        | PR_MAILBOX_OWNER_NAME_A
        | PR_MESSAGE_SIZE
        | PR_MESSAGE_SIZE_EXTENDED
        | PR_ASSOC_MESSAGE_SIZE
        | PR_ASSOC_MESSAGE_SIZE_EXTENDED
        | PR_NORMAL_MESSAGE_SIZE
        | PR_NORMAL_MESSAGE_SIZE_EXTENDED
        | PR_OBJECT_TYPE
        | PR_OOF_STATE
        | PR_PROHIBIT_RECEIVE_QUOTA
        | PR_PROHIBIT_SEND_QUOTA
        | PR_RECORD_KEY
        | PR_SEARCH_KEY
        | PR_SORT_LOCALE_ID
        | PR_STORAGE_QUOTA_LIMIT
        | PR_STORE_ENTRYID
        | PR_STORE_OFFLINE
        | PR_MDB_PROVIDER
        | PR_STORE_RECORD_KEY
        | PR_STORE_STATE
        | PR_STORE_SUPPORT_MASK
        | PR_TEST_LINE_SPEED
        | PR_USER_ENTRYID
        | PR_VALID_FOLDER_MASK
        | PR_HIERARCHY_SERVER => true,
        _ => false,
    }
}

/// Tags reported by every store even though they are not stored.
static SYNTHETIC_TAGS: &[PropTag] = &[
    PR_DELETED_ASSOC_MESSAGE_SIZE,
    PR_DELETED_ASSOC_MESSAGE_SIZE_EXTENDED,
    PR_DELETED_ASSOC_MSG_COUNT,
    PR_DELETED_MESSAGE_SIZE,
    PR_DELETED_MESSAGE_SIZE_EXTENDED,
    PR_DELETED_MSG_COUNT,
    PR_DELETED_NORMAL_MESSAGE_SIZE,
    PR_DELETED_NORMAL_MESSAGE_SIZE_EXTENDED,
    PR_EXTENDED_RULE_SIZE_LIMIT,
    PR_ASSOC_MESSAGE_SIZE,
    PR_MESSAGE_SIZE,
    PR_NORMAL_MESSAGE_SIZE,
    PR_USER_ENTRYID,
    PR_CONTENT_COUNT,
    PR_ASSOC_CONTENT_COUNT,
    PR_TEST_LINE_SPEED,
    PR_MAILBOX_OWNER_ENTRYID,
    PR_EMAIL_ADDRESS,
];

static PRIVATE_SYNTHETIC_TAGS: &[PropTag] = &[
    PR_MAILBOX_OWNER_NAME,
    PR_MAX_SUBMIT_MESSAGE_SIZE,
    PR_EMS_AB_DISPLAY_NAME_PRINTABLE,
];

impl Logon {
    pub fn new(
        info: LogonInfo,
        store: Arc<dyn StoreClient>,
        services: Services,
        session: Arc<SessionInfo>,
        log_prefix: LogPrefix,
    ) -> Self {
        let LogonInfo {
            logon_flags,
            open_flags,
            mode,
            account_id,
            domain_id,
            account,
            mailbox_guid,
        } = info;

        info!(
            "{} Logged on to {} store of {} as {:?}",
            log_prefix,
            if 0 != logon_flags & LOGON_FLAG_PRIVATE {
                "private"
            } else {
                "public"
            },
            account,
            mode
        );

        Logon {
            logon_flags,
            open_flags,
            mode,
            account_id,
            domain_id,
            account,
            mailbox_guid,
            store,
            services,
            session,
            log_prefix,
            names: NameCache::new(),
            last_group: None,
            group_list: Vec::new(),
        }
    }

    pub fn is_private(&self) -> bool {
        0 != self.logon_flags & LOGON_FLAG_PRIVATE
    }

    /// The replica GUID of this store, as used in change keys and source
    /// keys.
    pub fn guid(&self) -> Guid {
        if self.is_private() {
            xid::user_guid(self.account_id)
        } else {
            xid::domain_guid(self.domain_id)
        }
    }

    /// The user whose permissions apply, or `None` for the store owner.
    pub fn eff_user(&self) -> Option<&str> {
        match self.mode {
            LogonMode::Owner => None,
            _ => Some(&self.session.username),
        }
    }

    /// The user whose per-user read state applies. Private stores only have
    /// the owner's.
    pub fn readstate_user(&self) -> Option<&str> {
        if self.is_private() {
            None
        } else {
            Some(&self.session.username)
        }
    }

    pub fn store(&self) -> &dyn StoreClient {
        &*self.store
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    pub fn log_prefix(&self) -> &LogPrefix {
        &self.log_prefix
    }

    /// Fetch store properties, computing the ones that are not stored.
    ///
    /// Calculated values come first in the result, followed by whatever the
    /// store returned for the rest.
    pub fn get_properties(
        &self,
        tags: &[PropTag],
    ) -> Result<PropValues, Error> {
        let mut out = PropValues::new();
        let mut stored = Vec::new();

        for &tag in tags {
            // Never answered, whatever the store holds.
            if PR_HIERARCHY_SERVER.id() == tag.id() {
                out.push(PropVal::error(tag, EcCode::INVALID_PARAM));
                continue;
            }

            match calculated::compute(self, tag)? {
                Calculated::NotApplicable => stored.push(tag),
                Calculated::Found(value) => out.push(PropVal::new(tag, value)),
                Calculated::Missing => {
                    out.push(PropVal::error(tag, EcCode::ERROR))
                }
            }
        }

        if !stored.is_empty() {
            out.extend(
                self.store
                    .get_store_properties(self.session.cpid, &stored)?,
            );
        }

        Ok(out)
    }

    pub fn set_properties(
        &self,
        values: &PropValues,
    ) -> Result<Vec<PropProblem>, Error> {
        let mut problems = Vec::new();
        let mut writable = PropValues::new();
        let mut original_indices = Vec::new();

        for (ix, pv) in values.iter().enumerate() {
            if is_readonly_prop(pv.tag) {
                problems.push(PropProblem::new(
                    ix,
                    pv.tag,
                    EcCode::ACCESS_DENIED,
                ));
            } else {
                writable.push(pv.clone());
                original_indices.push(ix as u16);
            }
        }

        if writable.is_empty() {
            return Ok(problems);
        }

        let mut store_problems = self
            .store
            .set_store_properties(self.session.cpid, &writable)?;
        remap_problems(&mut store_problems, &original_indices);
        problems.extend(store_problems);
        problems.sort_by_key(|p| p.index);
        Ok(problems)
    }

    pub fn remove_properties(
        &self,
        tags: &[PropTag],
    ) -> Result<Vec<PropProblem>, Error> {
        let mut problems = Vec::new();
        let mut removable = Vec::new();

        for (ix, &tag) in tags.iter().enumerate() {
            if is_readonly_prop(tag) {
                problems.push(PropProblem::new(ix, tag, EcCode::ACCESS_DENIED));
            } else {
                removable.push(tag);
            }
        }

        if !removable.is_empty() {
            self.store.remove_store_properties(&removable)?;
        }

        Ok(problems)
    }

    /// List the tags of every property the store has, stored or not.
    pub fn get_all_proptags(&self) -> Result<Vec<PropTag>, Error> {
        let mut tags = self.store.get_store_all_proptags()?;
        let private = if self.is_private() {
            PRIVATE_SYNTHETIC_TAGS
        } else {
            &[]
        };

        for &tag in private.iter().chain(SYNTHETIC_TAGS) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Ok(tags)
    }

    pub fn get_named_propname(
        &mut self,
        id: u16,
    ) -> Result<Option<PropertyName>, Error> {
        self.names.get_named_propname(&*self.store, id)
    }

    pub fn get_named_propnames(
        &mut self,
        ids: &[u16],
    ) -> Result<Vec<Option<PropertyName>>, Error> {
        self.names.get_named_propnames(&*self.store, ids)
    }

    pub fn get_named_propid(
        &mut self,
        create: bool,
        name: &PropertyName,
    ) -> Result<u16, Error> {
        self.names.get_named_propid(&*self.store, create, name)
    }

    pub fn get_named_propids(
        &mut self,
        create: bool,
        names: &[PropertyName],
    ) -> Result<Vec<u16>, Error> {
        self.names.get_named_propids(&*self.store, create, names)
    }

    /// Map a named tag onto its name, for transmitting it to a peer that
    /// does not share this logon's ids.
    pub fn tag_to_name(
        &mut self,
        tag: PropTag,
    ) -> Result<Option<PropertyName>, Error> {
        if !tag.is_named() {
            return Ok(None);
        }
        self.get_named_propname(tag.id())
    }

    /// Return the grouping info for the newest grouping version, resolved
    /// against this logon's named property ids.
    pub fn get_last_property_groupinfo(
        &mut self,
    ) -> Result<Option<PropertyGroupInfo>, Error> {
        let last = grouping::last_group_id();
        if self.last_group.as_ref().map(|g| g.group_id) != Some(last) {
            self.last_group = self.resolve_groupinfo(last)?;
        }
        Ok(self.last_group.clone())
    }

    pub fn get_property_groupinfo(
        &mut self,
        group_id: u32,
    ) -> Result<Option<PropertyGroupInfo>, Error> {
        if group_id == grouping::last_group_id() {
            return self.get_last_property_groupinfo();
        }

        if let Some(info) =
            self.group_list.iter().find(|g| g.group_id == group_id)
        {
            return Ok(Some(info.clone()));
        }

        let info = self.resolve_groupinfo(group_id)?;
        if let Some(ref info) = info {
            self.group_list.push(info.clone());
        }
        Ok(info)
    }

    fn resolve_groupinfo(
        &mut self,
        group_id: u32,
    ) -> Result<Option<PropertyGroupInfo>, Error> {
        let def = match grouping::definition(group_id) {
            Some(def) => def,
            None => return Ok(None),
        };

        let store = &*self.store;
        let names = &mut self.names;
        def.resolve(|name| names.get_named_propid(store, true, name))
            .map(Some)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::emsmdb::test_prelude::*;
    use crate::mapi::grouping::{GroupDefinition, GroupMember};

    #[test]
    fn hierarchy_server_is_always_an_error() {
        let setup = Setup::private();
        setup.store.set_store_prop(
            PR_HIERARCHY_SERVER,
            Value::Unicode("hier.example.com".to_owned()),
        );
        let logon = setup.logon();

        let values = logon
            .get_properties(&[PR_HIERARCHY_SERVER, PR_DISPLAY_NAME])
            .unwrap();
        assert_eq!(
            Some(&Value::Error(EcCode::INVALID_PARAM)),
            values.get(PR_HIERARCHY_SERVER.with_type(PT_ERROR))
        );
    }

    #[test]
    fn calculated_and_stored_values_merge() {
        let setup = Setup::private();
        setup.store.set_store_prop(
            PR_DISPLAY_NAME,
            Value::Unicode("Mailbox".to_owned()),
        );
        let logon = setup.logon();
        setup.store.clear_calls();

        let values = logon
            .get_properties(&[
                PR_DISPLAY_NAME,
                PR_CODE_PAGE_ID,
                PR_MESSAGE_SIZE,
                PR_STORE_STATE,
            ])
            .unwrap();
        assert_eq!(Some("Mailbox"), values.get_str(PR_DISPLAY_NAME));
        assert_eq!(Some(1252), values.get_u32(PR_CODE_PAGE_ID));
        assert_eq!(
            Some(&Value::Error(EcCode::ERROR)),
            values.get(PR_MESSAGE_SIZE.with_type(PT_ERROR))
        );
        assert!(!values.contains(PR_STORE_STATE));
        // One read for the size counter, one for everything stored
        assert_eq!(2, setup.store.count("get_store_properties"));
    }

    #[test]
    fn set_rejects_readonly_tags_in_place() {
        let setup = Setup::private();
        let logon = setup.logon();

        let mut values = PropValues::new();
        values.push(PropVal::new(PR_MESSAGE_SIZE, Value::Long(5)));
        values.push(PropVal::new(
            PR_DISPLAY_NAME,
            Value::Unicode("New name".to_owned()),
        ));
        values.push(PropVal::new(
            PropTag::new(0x3700, PT_OBJECT),
            Value::Binary(vec![]),
        ));

        let problems = logon.set_properties(&values).unwrap();
        assert_eq!(
            vec![
                PropProblem::new(0, PR_MESSAGE_SIZE, EcCode::ACCESS_DENIED),
                PropProblem::new(
                    2,
                    PropTag::new(0x3700, PT_OBJECT),
                    EcCode::ACCESS_DENIED
                ),
            ],
            problems
        );
        assert_eq!(
            Some(Value::Unicode("New name".to_owned())),
            setup.store.store_prop(PR_DISPLAY_NAME)
        );
        assert_eq!(None, setup.store.store_prop(PR_MESSAGE_SIZE));
    }

    #[test]
    fn remove_of_only_readonly_tags_skips_store() {
        let setup = Setup::private();
        let logon = setup.logon();
        setup.store.clear_calls();

        let problems = logon
            .remove_properties(&[PR_USER_ENTRYID, PR_TEST_LINE_SPEED])
            .unwrap();
        assert_eq!(2, problems.len());
        assert_eq!(1, problems[1].index);
        assert!(setup.store.calls().is_empty());

        setup
            .store
            .set_store_prop(PR_DISPLAY_NAME, Value::Unicode("x".to_owned()));
        let problems = logon
            .remove_properties(&[PR_USER_ENTRYID, PR_DISPLAY_NAME])
            .unwrap();
        assert_eq!(1, problems.len());
        assert_eq!(vec!["remove_store_properties"], setup.store.calls());
        assert_eq!(None, setup.store.store_prop(PR_DISPLAY_NAME));
    }

    #[test]
    fn all_proptags_include_synthetic_tags_once() {
        let setup = Setup::private();
        setup.store.set_store_prop(PR_CONTENT_COUNT, Value::Long(3));
        setup.store.set_store_prop(
            PR_DISPLAY_NAME,
            Value::Unicode("Mailbox".to_owned()),
        );

        let tags = setup.logon().get_all_proptags().unwrap();
        assert_eq!(
            1,
            tags.iter().filter(|&&t| PR_CONTENT_COUNT == t).count()
        );
        assert!(tags.contains(&PR_DISPLAY_NAME));
        assert!(tags.contains(&PR_MAILBOX_OWNER_NAME));
        assert!(tags.contains(&PR_TEST_LINE_SPEED));

        let public = Setup::public().logon().get_all_proptags().unwrap();
        assert!(!public.contains(&PR_MAILBOX_OWNER_NAME));
        assert!(public.contains(&PR_EMAIL_ADDRESS));
    }

    #[test]
    fn identity_helpers() {
        let private = Setup::private().logon();
        assert!(private.is_private());
        assert_eq!(None, private.eff_user());
        assert_eq!(None, private.readstate_user());
        assert_eq!(xid::user_guid(2), private.guid());

        let public = Setup::public().logon();
        assert_eq!(Some(ACCOUNT), public.readstate_user());
        assert_eq!(xid::domain_guid(7), public.guid());

        let delegate = Setup::delegate().logon();
        assert_eq!(Some(DELEGATE), delegate.eff_user());
    }

    #[test]
    fn group_info_is_resolved_and_cached() {
        let setup = Setup::private();
        let mut logon = setup.logon();

        let last = logon.get_last_property_groupinfo().unwrap().unwrap();
        assert!(last.group_id >= grouping::BUILTIN_GROUP_ID);

        let builtin = logon
            .get_property_groupinfo(grouping::BUILTIN_GROUP_ID)
            .unwrap()
            .unwrap();
        assert_eq!(grouping::BUILTIN_GROUP_ID, builtin.group_id);
        assert_eq!(4, builtin.groups.len());
        let resolutions = setup.store.count("get_named_propids");

        let again = logon
            .get_property_groupinfo(grouping::BUILTIN_GROUP_ID)
            .unwrap()
            .unwrap();
        assert_eq!(builtin, again);
        assert_eq!(resolutions, setup.store.count("get_named_propids"));

        assert_eq!(None, logon.get_property_groupinfo(0xFFFF_FFF0).unwrap());
    }

    #[test]
    fn newer_group_version_replaces_last() {
        let setup = Setup::private();
        let mut logon = setup.logon();
        logon.get_last_property_groupinfo().unwrap();

        let published = grouping::publish(GroupDefinition {
            group_id: grouping::last_group_id() + 1,
            groups: vec![vec![GroupMember::Tag(PR_SUBJECT)]],
        });
        // Another test may have published a newer version concurrently
        if published.is_ok() {
            let info = logon.get_last_property_groupinfo().unwrap().unwrap();
            assert!(info.group_id >= published.unwrap());
        }
    }
}
