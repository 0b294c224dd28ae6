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

//! Store properties computed on demand rather than kept in the store.

use log::warn;

use super::logon::Logon;
use crate::mapi::addressbook;
use crate::mapi::model::*;
use crate::mapi::tags::*;
use crate::support::charset;
use crate::support::error::Error;

/// Outcome of trying to compute a store property.
#[derive(Clone, Debug, PartialEq)]
pub enum Calculated {
    /// The tag is not computed; ask the store.
    NotApplicable,
    Found(Value),
    /// The tag is computed, but there is no value to report.
    Missing,
}

const TEST_LINE_SPEED_LEN: usize = 256;

fn clamp_to_i32(v: u64) -> u32 {
    v.min(i32::max_value() as u64) as u32
}

fn is_deleted_counter(tag: PropTag) -> bool {
    match tag {
        PR_DELETED_ASSOC_MESSAGE_SIZE
        | PR_DELETED_ASSOC_MESSAGE_SIZE_EXTENDED
        | PR_DELETED_ASSOC_MSG_COUNT
        | PR_DELETED_MESSAGE_SIZE
        | PR_DELETED_MESSAGE_SIZE_EXTENDED
        | PR_DELETED_MSG_COUNT
        | PR_DELETED_NORMAL_MESSAGE_SIZE
        | PR_DELETED_NORMAL_MESSAGE_SIZE_EXTENDED => true,
        _ => false,
    }
}

fn zero_of_type(tag: PropTag) -> Value {
    if PT_I8 == tag.prop_type() {
        Value::I8(0)
    } else {
        Value::Long(0)
    }
}

/// Return the portion of `account` before the `@`.
fn local_part(account: &str) -> &str {
    account.split('@').next().unwrap_or(account)
}

/// Return the portion of `account` after the `@`, or all of it if there is
/// none.
fn account_to_domain(account: &str) -> &str {
    match account.find('@') {
        Some(at) => &account[at + 1..],
        None => account,
    }
}

/// Compute `tag` for `logon`.
pub fn compute(logon: &Logon, tag: PropTag) -> Result<Calculated, Error> {
    use self::Calculated::*;

    if is_deleted_counter(tag) {
        return Ok(Found(zero_of_type(tag)));
    }

    let session = logon.session();
    let limits = &logon.services().config.limits;

    Ok(match tag {
        PR_MESSAGE_SIZE => size_counter(logon, PR_MESSAGE_SIZE_EXTENDED)?,
        PR_ASSOC_MESSAGE_SIZE => {
            size_counter(logon, PR_ASSOC_MESSAGE_SIZE_EXTENDED)?
        }
        PR_NORMAL_MESSAGE_SIZE => {
            size_counter(logon, PR_NORMAL_MESSAGE_SIZE_EXTENDED)?
        }

        PR_EMS_AB_DISPLAY_NAME_PRINTABLE
        | PR_EMS_AB_DISPLAY_NAME_PRINTABLE_A => {
            if !logon.is_private() {
                return Ok(NotApplicable);
            }

            match owner_display_name(logon) {
                None => NotApplicable,
                Some(name) => {
                    let printable = if name.is_ascii() {
                        name
                    } else {
                        local_part(&logon.account).to_owned()
                    };
                    ascii_value(tag, printable)
                }
            }
        }

        PR_MAILBOX_OWNER_NAME | PR_MAILBOX_OWNER_NAME_A => {
            if !logon.is_private() {
                return Ok(NotApplicable);
            }

            match owner_display_name(logon) {
                None => NotApplicable,
                Some(name) => {
                    let name = if name.is_empty() {
                        logon.account.clone()
                    } else {
                        name
                    };
                    if PT_STRING8 == tag.prop_type() {
                        Found(Value::String8(charset::encode(
                            session.cpid,
                            &name,
                        )?))
                    } else {
                        Found(Value::Unicode(name))
                    }
                }
            }
        }

        PR_CODE_PAGE_ID => Found(Value::Long(session.cpid)),
        PR_LOCALE_ID => Found(Value::Long(session.lcid_string)),
        PR_SORT_LOCALE_ID => Found(Value::Long(session.lcid_sort)),

        PR_EMAIL_ADDRESS | PR_EMAIL_ADDRESS_A => {
            match owner_essdn(logon) {
                None => NotApplicable,
                Some(essdn) => ascii_value(tag, essdn),
            }
        }

        PR_EXTENDED_RULE_SIZE_LIMIT => {
            Found(Value::Long(limits.max_extrule_len))
        }
        PR_MAX_SUBMIT_MESSAGE_SIZE => Found(Value::Long(limits.max_mail_len)),

        PR_MAILBOX_OWNER_ENTRYID => match owner_essdn(logon) {
            None => NotApplicable,
            Some(essdn) => {
                Found(Value::Binary(addressbook::ab_entryid(&essdn)))
            }
        },
        PR_USER_ENTRYID => match essdn_of(logon, &session.username) {
            None => NotApplicable,
            Some(essdn) => {
                Found(Value::Binary(addressbook::ab_entryid(&essdn)))
            }
        },

        PR_STORE_RECORD_KEY => {
            Found(Value::Binary(logon.mailbox_guid.0.to_vec()))
        }
        PR_TEST_LINE_SPEED => {
            Found(Value::Binary(vec![0u8; TEST_LINE_SPEED_LEN]))
        }

        _ => NotApplicable,
    })
}

/// Read an extended (64-bit) size counter and report it in 32 bits.
fn size_counter(
    logon: &Logon,
    extended: PropTag,
) -> Result<Calculated, Error> {
    let values = logon
        .store()
        .get_store_properties(logon.session().cpid, &[extended])?;
    Ok(match values.get_u64(extended) {
        Some(v) => Calculated::Found(Value::Long(clamp_to_i32(v))),
        None => Calculated::Missing,
    })
}

/// The display name of the store owner, if the directory knows it.
///
/// Lookup failures are logged and treated as an unknown owner, so the
/// caller reports whatever the store holds instead.
fn owner_display_name(logon: &Logon) -> Option<String> {
    match logon
        .services()
        .directory
        .user_display_name(&logon.account)
    {
        Ok(Some(name)) => Some(name),
        Ok(None) => {
            warn!(
                "{} No directory entry for store owner {}",
                logon.log_prefix(),
                logon.account
            );
            None
        }
        Err(e) => {
            warn!(
                "{} Failed to look up display name of {}: {}",
                logon.log_prefix(),
                logon.account,
                e
            );
            None
        }
    }
}

/// The legacy DN identifying the owner of the store: the account for
/// private stores, its domain for public ones.
fn owner_essdn(logon: &Logon) -> Option<String> {
    if logon.is_private() {
        essdn_of(logon, &logon.account)
    } else {
        essdn_of(logon, account_to_domain(&logon.account))
    }
}

fn essdn_of(logon: &Logon, username: &str) -> Option<String> {
    let ids = match logon.services().directory.user_ids(username) {
        Ok(ids) => ids?,
        Err(e) => {
            warn!(
                "{} Failed to look up ids of {}: {}",
                logon.log_prefix(),
                username,
                e
            );
            return None;
        }
    };

    addressbook::username_to_essdn(
        &logon.services().config.organization.org_name,
        username,
        ids,
    )
}

/// Report ASCII text as either an 8-bit or a Unicode string, following the
/// type of `tag`.
fn ascii_value(tag: PropTag, text: String) -> Calculated {
    if PT_STRING8 == tag.prop_type() {
        Calculated::Found(Value::String8(text.into_bytes()))
    } else {
        Calculated::Found(Value::Unicode(text))
    }
}
