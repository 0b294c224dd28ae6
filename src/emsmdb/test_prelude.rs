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

//! Ready-made logons over in-memory collaborators.

use std::sync::Arc;

pub use crate::mapi::eid::make_local_eid;
pub use crate::store::memory::{
    MemoryDirectory, MemoryStore, RecordingNotifier,
};

use super::logon::*;
use super::rop_processor::RopProcessor;
use crate::mapi::addressbook::UserIds;
use crate::mapi::model::Guid;
use crate::store::{
    BuiltinConverter, Directory, MessageContent, ReceiptNotifier, Services,
    StoreClient,
};
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;

pub const ACCOUNT: &str = "joe@example.com";
pub const DELEGATE: &str = "sam@example.com";
pub const DOMAIN: &str = "example.com";
pub const DISPLAY_NAME: &str = "Joe User";

pub const MAILBOX_GUID: Guid = Guid::new(
    0x6a4c_1d2e,
    0x55f0,
    0x4b1a,
    [0x9e, 0x21, 0x03, 0x44, 0x7c, 0x10, 0xd2, 0x8b],
);

pub fn root_folder() -> u64 {
    make_local_eid(0x01)
}

pub fn inbox() -> u64 {
    make_local_eid(0x0D)
}

pub struct Setup {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: SystemConfig,
    pub directory: Arc<MemoryDirectory>,
    info: LogonInfo,
    username: String,
}

impl Setup {
    fn new(
        display_name: &str,
        logon_flags: u8,
        mode: LogonMode,
        account: &str,
        username: &str,
    ) -> Self {
        crate::init_test_log();

        let mut directory = MemoryDirectory::default();
        directory.add_user(
            ACCOUNT,
            display_name,
            UserIds {
                user_id: 2,
                domain_id: 7,
            },
        );
        directory.add_user(
            DELEGATE,
            "Sam Delegate",
            UserIds {
                user_id: 3,
                domain_id: 7,
            },
        );

        let store = Arc::new(MemoryStore::new());
        store.add_folder(root_folder(), 0);
        store.add_folder(inbox(), root_folder());

        Setup {
            store,
            notifier: Arc::new(RecordingNotifier::default()),
            config: SystemConfig::default(),
            directory: Arc::new(directory),
            info: LogonInfo {
                logon_flags,
                open_flags: 0,
                mode,
                account_id: 2,
                domain_id: 7,
                account: account.to_owned(),
                mailbox_guid: MAILBOX_GUID,
            },
            username: username.to_owned(),
        }
    }

    /// The owner logged on to their own mailbox.
    pub fn private() -> Self {
        Setup::with_display_name(DISPLAY_NAME)
    }

    pub fn with_display_name(display_name: &str) -> Self {
        Setup::new(
            display_name,
            LOGON_FLAG_PRIVATE,
            LogonMode::Owner,
            ACCOUNT,
            ACCOUNT,
        )
    }

    /// `DELEGATE` logged on to the mailbox of `ACCOUNT`.
    pub fn delegate() -> Self {
        Setup::new(
            DISPLAY_NAME,
            LOGON_FLAG_PRIVATE,
            LogonMode::Delegate,
            ACCOUNT,
            DELEGATE,
        )
    }

    /// `ACCOUNT` logged on to the public store of its domain.
    pub fn public() -> Self {
        Setup::new(DISPLAY_NAME, 0, LogonMode::Guest, DOMAIN, ACCOUNT)
    }

    pub fn logon(&self) -> Logon {
        let log_prefix = LogPrefix::new("emsmdb".to_owned());
        log_prefix.set_user(self.username.clone());

        let store: Arc<dyn StoreClient> = self.store.clone();
        let directory: Arc<dyn Directory> = self.directory.clone();
        let notifier: Arc<dyn ReceiptNotifier> = self.notifier.clone();

        Logon::new(
            self.info.clone(),
            store,
            Services {
                config: Arc::new(self.config.clone()),
                directory,
                converter: Arc::new(BuiltinConverter),
                notifier,
            },
            Arc::new(SessionInfo {
                username: self.username.clone(),
                cpid: 1252,
                lcid_string: 0x0409,
                lcid_sort: 0x0409,
            }),
            log_prefix,
        )
    }

    pub fn processor(&self) -> RopProcessor {
        RopProcessor::new(self.logon())
    }

    /// Add a message with `props` to `folder_id`, owned by `ACCOUNT`.
    pub fn add_message(
        &self,
        folder_id: u64,
        props: crate::mapi::model::PropValues,
    ) -> u64 {
        self.store.add_message(
            folder_id,
            MessageContent {
                props,
                ..MessageContent::default()
            },
            ACCOUNT,
        )
    }
}
