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

use std::fmt::Write as _;

use super::main::DumpStateSubcommand;
use crate::emsmdb::ics::{describe_idset, state_records};
use crate::mapi::model::PropTag;
use crate::mapi::tags::*;
use crate::support::error::Error;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

pub(super) fn print_config(config: &SystemConfig) {
    match toml::to_string_pretty(config) {
        Ok(s) => print!("{}", s),
        Err(e) => {
            eprintln!("Failed to format configuration: {}", e);
            EX_SOFTWARE.exit()
        }
    }
}

pub(super) fn dump_state(cmd: DumpStateSubcommand) {
    let blob = match base64::decode(cmd.state.trim()) {
        Ok(blob) => blob,
        Err(e) => {
            eprintln!("State is not valid base64: {}", e);
            EX_DATAERR.exit()
        }
    };

    match format_state(&blob) {
        Ok(s) => print!("{}", s),
        Err(e) => {
            eprintln!("Bad state blob: {}", e);
            EX_DATAERR.exit()
        }
    }
}

fn record_name(tag: PropTag) -> Option<&'static str> {
    match tag {
        META_TAG_IDSET_GIVEN => Some("idset-given"),
        META_TAG_CNSET_SEEN => Some("cnset-seen"),
        META_TAG_CNSET_SEEN_FAI => Some("cnset-seen-fai"),
        META_TAG_CNSET_READ => Some("cnset-read"),
        _ => None,
    }
}

fn format_state(blob: &[u8]) -> Result<String, Error> {
    let mut out = String::new();
    for (tag, payload) in state_records(blob)? {
        let name = match record_name(tag) {
            Some(name) => name,
            None => {
                let _ = writeln!(
                    out,
                    "{}: unknown record, {} bytes",
                    tag,
                    payload.len()
                );
                continue;
            }
        };

        let _ = writeln!(out, "{} ({}):", name, tag);
        for (guid, set) in describe_idset(payload)? {
            let ranges = set
                .ranges()
                .map(|(lo, hi)| {
                    if lo == hi {
                        format!("{:#x}", lo)
                    } else {
                        format!("{:#x}-{:#x}", lo, hi)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "  {} [{} ids]: {}",
                guid,
                set.len(),
                ranges
            );
            if tag != META_TAG_IDSET_GIVEN {
                if let Some(max) = set.max() {
                    let _ = writeln!(out, "    last change number: {:#x}", max);
                }
            }
        }
    }

    Ok(out)
}
