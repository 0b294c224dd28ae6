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

//! Read state changes and read receipts.

use bitflags::bitflags;
use log::{info, warn};

use super::logon::Logon;
use crate::mapi::model::*;
use crate::mapi::restriction::{RelOp, Restriction};
use crate::mapi::tags::*;
use crate::support::error::Error;

bitflags! {
    pub struct ReadFlags: u8 {
        const SUPPRESS_RECEIPT = 0x01;
        const CLEAR_READ_FLAG = 0x04;
        const GENERATE_RECEIPT_ONLY = 0x10;
        const CLEAR_NOTIFY_READ = 0x20;
        const CLEAR_NOTIFY_UNREAD = 0x40;
    }
}

/// Bits clients may send which carry no meaning here.
const IGNORED_BITS: u8 = 0x0A;

/// How many message ids are fetched per query when resolving a bulk read
/// state change.
const QUERY_BATCH: u32 = 256;

impl ReadFlags {
    pub fn from_wire(raw: u8) -> Self {
        ReadFlags::from_bits_truncate(raw & !IGNORED_BITS)
    }

    /// Whether these flags ask for messages to become unread.
    pub fn marks_unread(self) -> bool {
        self.contains(ReadFlags::CLEAR_READ_FLAG)
    }
}

/// Apply `flags` to the stored message `message_id`, returning whether its
/// read state changed.
pub fn set_read_flag(
    logon: &Logon,
    message_id: u64,
    flags: ReadFlags,
) -> Result<bool, Error> {
    let store = logon.store();
    let user = logon.readstate_user();
    let cpid = logon.session().cpid;
    let props = store.get_message_properties(
        user,
        cpid,
        message_id,
        &[
            PR_READ,
            PR_READ_RECEIPT_REQUESTED,
            PR_NON_RECEIPT_NOTIFICATION_REQUESTED,
        ],
    )?;
    let read = props.get_bool(PR_READ).unwrap_or(false);
    let receipt_requested =
        props.get_bool(PR_READ_RECEIPT_REQUESTED).unwrap_or(false);

    let mut changed = false;
    let mut notify = false;

    match flags.bits() {
        0x00 | 0x01 => {
            if !read {
                store.set_message_read_state(user, message_id, true)?;
                changed = true;
                notify = flags.is_empty() && receipt_requested;
            }
        }
        0x04 | 0x05 => {
            if read {
                store.set_message_read_state(user, message_id, false)?;
                changed = true;
            }
        }
        0x10 => notify = receipt_requested,
        0x20 | 0x40 | 0x60 => {
            if flags.contains(ReadFlags::CLEAR_NOTIFY_READ)
                && receipt_requested
            {
                store.remove_message_property(
                    cpid,
                    message_id,
                    PR_READ_RECEIPT_REQUESTED,
                )?;
            }
            if flags.contains(ReadFlags::CLEAR_NOTIFY_UNREAD)
                && props
                    .get_bool(PR_NON_RECEIPT_NOTIFICATION_REQUESTED)
                    .unwrap_or(false)
            {
                store.remove_message_property(
                    cpid,
                    message_id,
                    PR_NON_RECEIPT_NOTIFICATION_REQUESTED,
                )?;
            }
            store.mark_modified(message_id)?;
            return Ok(false);
        }
        _ => return Ok(false),
    }

    if notify {
        send_receipt(logon, message_id)?;
    }

    Ok(changed)
}

fn send_receipt(logon: &Logon, message_id: u64) -> Result<(), Error> {
    let store = logon.store();
    let cpid = logon.session().cpid;
    let brief = match store.get_message_brief(cpid, message_id)? {
        Some(brief) => brief,
        None => {
            warn!(
                "{} No envelope for message {:#x}, receipt not sent",
                logon.log_prefix(),
                message_id
            );
            return Ok(());
        }
    };

    logon.services().notifier.notify_read(&logon.account, &brief)?;
    info!(
        "{} Sent read receipt for message {:#x}",
        logon.log_prefix(),
        message_id
    );

    let mut cleared = PropValues::new();
    cleared.set(PR_READ_RECEIPT_REQUESTED, Value::Boolean(false));
    cleared.set(PR_NON_RECEIPT_NOTIFICATION_REQUESTED, Value::Boolean(false));
    // The receipt is out; failing to clear the requests only risks a
    // duplicate later.
    if let Err(e) = store.set_message_properties(
        logon.readstate_user(),
        cpid,
        message_id,
        &cleared,
    ) {
        warn!(
            "{} Failed to clear receipt requests on {:#x}: {}",
            logon.log_prefix(),
            message_id,
            e
        );
    }
    Ok(())
}

/// Find every message in `folder_id` whose read state `flags` would change.
fn messages_to_flip(
    logon: &Logon,
    folder_id: u64,
    flags: ReadFlags,
) -> Result<Vec<u64>, Error> {
    let store = logon.store();
    let user = logon.readstate_user();
    let cpid = logon.session().cpid;
    let op = if flags.marks_unread() {
        RelOp::Ne
    } else {
        RelOp::Eq
    };
    let restriction =
        Restriction::property(op, PR_READ, Value::Boolean(false));

    let (table_id, count) =
        store.load_content_table(cpid, folder_id, user, Some(&restriction))?;
    let mut ids = Vec::with_capacity(count as usize);
    let mut start = 0;
    let result = loop {
        if start >= count {
            break Ok(());
        }

        match store.query_table(
            user,
            cpid,
            table_id,
            &[PR_MID],
            start,
            QUERY_BATCH,
        ) {
            Ok(rows) => {
                if rows.is_empty() {
                    break Ok(());
                }
                start += rows.len() as u32;
                ids.extend(rows.iter().filter_map(|r| r.get_u64(PR_MID)));
            }
            Err(e) => break Err(e),
        }
    };
    store.unload_table(table_id)?;
    result.map(|()| ids)
}

/// Apply `flags` to `message_ids` in `folder_id`, or to every message whose
/// read state would change if `message_ids` is empty.
///
/// Returns whether any message could not be updated.
pub fn set_read_flags(
    logon: &Logon,
    folder_id: u64,
    flags: ReadFlags,
    message_ids: &[u64],
) -> Result<bool, Error> {
    let found;
    let message_ids = if message_ids.is_empty() {
        found = messages_to_flip(logon, folder_id, flags)?;
        &found[..]
    } else {
        message_ids
    };

    let mut partial = false;
    for &message_id in message_ids {
        if let Err(e) = set_read_flag(logon, message_id, flags) {
            warn!(
                "{} Failed to update read state of {:#x}: {}",
                logon.log_prefix(),
                message_id,
                e
            );
            partial = true;
        }
    }

    Ok(partial)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::emsmdb::test_prelude::*;

    fn message(setup: &Setup, read: bool, receipt: bool) -> u64 {
        let mut props = PropValues::new();
        props.set(PR_SUBJECT, Value::Unicode("Status".to_owned()));
        props.set(PR_READ, Value::Boolean(read));
        props.set(PR_READ_RECEIPT_REQUESTED, Value::Boolean(receipt));
        props.set(
            PR_NON_RECEIPT_NOTIFICATION_REQUESTED,
            Value::Boolean(receipt),
        );
        setup.add_message(inbox(), props)
    }

    #[test]
    fn default_on_read_message_is_no_change() {
        let setup = Setup::private();
        let logon = setup.logon();
        let mid = message(&setup, true, false);

        assert!(!set_read_flag(&logon, mid, ReadFlags::empty()).unwrap());
        assert!(setup.notifier.sent().is_empty());
        assert_eq!(0, setup.store.count("set_message_read_state"));
    }

    #[test]
    fn default_on_unread_message_sends_one_receipt() {
        let setup = Setup::private();
        let logon = setup.logon();
        let mid = message(&setup, false, true);

        assert!(set_read_flag(&logon, mid, ReadFlags::empty()).unwrap());
        assert_eq!(
            vec![(ACCOUNT.to_owned(), Some(mid))],
            setup.notifier.sent()
        );
        assert_eq!(
            Some(Value::Boolean(true)),
            setup.store.message_prop(mid, PR_READ)
        );
        assert_eq!(
            Some(Value::Boolean(false)),
            setup.store.message_prop(mid, PR_READ_RECEIPT_REQUESTED)
        );
        assert_eq!(
            Some(Value::Boolean(false)),
            setup
                .store
                .message_prop(mid, PR_NON_RECEIPT_NOTIFICATION_REQUESTED)
        );

        // Already read now, so nothing more is sent
        assert!(!set_read_flag(&logon, mid, ReadFlags::empty()).unwrap());
        assert_eq!(1, setup.notifier.sent().len());
    }

    #[test]
    fn receipt_request_clearing_is_best_effort() {
        let setup = Setup::private();
        let logon = setup.logon();
        let mid = message(&setup, false, true);

        setup.store.fail_on("set_message_properties");
        assert!(set_read_flag(&logon, mid, ReadFlags::empty()).unwrap());
        assert_eq!(1, setup.notifier.sent().len());
        assert_eq!(
            Some(Value::Boolean(true)),
            setup.store.message_prop(mid, PR_READ)
        );
        assert_eq!(
            Some(Value::Boolean(true)),
            setup.store.message_prop(mid, PR_READ_RECEIPT_REQUESTED)
        );

        let other = message(&setup, false, true);
        assert!(!set_read_flags(&logon, inbox(), ReadFlags::empty(), &[other])
            .unwrap());
        assert_eq!(2, setup.notifier.sent().len());
    }

    #[test]
    fn receipt_is_sent_as_the_store_account() {
        let setup = Setup::public();
        let logon = setup.logon();
        let mid = message(&setup, false, true);

        assert!(set_read_flag(&logon, mid, ReadFlags::empty()).unwrap());
        assert_eq!(
            vec![(DOMAIN.to_owned(), Some(mid))],
            setup.notifier.sent()
        );
    }

    #[test]
    fn suppressed_receipt() {
        let setup = Setup::private();
        let logon = setup.logon();
        let mid = message(&setup, false, true);

        assert!(set_read_flag(
            &logon,
            mid,
            ReadFlags::from_wire(0x01)
        )
        .unwrap());
        assert!(setup.notifier.sent().is_empty());
    }

    #[test]
    fn clear_read_flag() {
        let setup = Setup::private();
        let logon = setup.logon();
        let mid = message(&setup, true, false);

        assert!(set_read_flag(&logon, mid, ReadFlags::CLEAR_READ_FLAG)
            .unwrap());
        assert_eq!(
            Some(Value::Boolean(false)),
            setup.store.message_prop(mid, PR_READ)
        );
        assert!(!set_read_flag(&logon, mid, ReadFlags::CLEAR_READ_FLAG)
            .unwrap());
    }

    #[test]
    fn receipt_only() {
        let setup = Setup::private();
        let logon = setup.logon();
        let mid = message(&setup, true, true);

        let flags = ReadFlags::GENERATE_RECEIPT_ONLY;
        assert!(!set_read_flag(&logon, mid, flags).unwrap());
        assert_eq!(1, setup.notifier.sent().len());
        assert_eq!(0, setup.store.count("set_message_read_state"));
    }

    #[test]
    fn clear_notify_flags() {
        let setup = Setup::private();
        let logon = setup.logon();
        let mid = message(&setup, false, true);

        let flags = ReadFlags::from_wire(0x20 | 0x02);
        assert_eq!(ReadFlags::CLEAR_NOTIFY_READ, flags);
        assert!(!set_read_flag(&logon, mid, flags).unwrap());
        assert_eq!(
            None,
            setup.store.message_prop(mid, PR_READ_RECEIPT_REQUESTED)
        );
        assert_eq!(
            Some(Value::Boolean(true)),
            setup
                .store
                .message_prop(mid, PR_NON_RECEIPT_NOTIFICATION_REQUESTED)
        );
        assert_eq!(1, setup.store.count("mark_modified"));
        assert!(setup.notifier.sent().is_empty());
    }

    #[test]
    fn unknown_combination_is_ignored() {
        let setup = Setup::private();
        let logon = setup.logon();
        let mid = message(&setup, false, true);

        let flags = ReadFlags::CLEAR_READ_FLAG | ReadFlags::CLEAR_NOTIFY_READ;
        assert!(!set_read_flag(&logon, mid, flags).unwrap());
        assert_eq!(
            Some(Value::Boolean(false)),
            setup.store.message_prop(mid, PR_READ)
        );
    }

    #[test]
    fn bulk_without_ids_uses_restricted_table() {
        let setup = Setup::private();
        let logon = setup.logon();
        let unread = message(&setup, false, false);
        let read = message(&setup, true, false);

        let partial =
            set_read_flags(&logon, inbox(), ReadFlags::SUPPRESS_RECEIPT, &[])
                .unwrap();
        assert!(!partial);
        assert_eq!(1, setup.store.count("set_message_read_state"));
        assert_eq!(
            Some(Value::Boolean(true)),
            setup.store.message_prop(unread, PR_READ)
        );
        assert_eq!(1, setup.store.count("unload_table"));

        setup.store.clear_calls();
        set_read_flags(&logon, inbox(), ReadFlags::CLEAR_READ_FLAG, &[])
            .unwrap();
        assert_eq!(2, setup.store.count("set_message_read_state"));
        assert_eq!(
            Some(Value::Boolean(false)),
            setup.store.message_prop(read, PR_READ)
        );
    }

    #[test]
    fn bulk_failures_are_partial() {
        let setup = Setup::private();
        let logon = setup.logon();
        let mid = message(&setup, false, false);

        setup.store.fail_on("set_message_read_state");
        assert!(set_read_flags(
            &logon,
            inbox(),
            ReadFlags::SUPPRESS_RECEIPT,
            &[mid]
        )
        .unwrap());
    }
}
