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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The system-wide configuration for Mapicore.
///
/// This is stored in a file named `mapicore.toml` under the Mapicore system
/// root, which is typically `/usr/local/etc/mapicore` or `/etc/mapicore`.
/// Every section has usable defaults, so an empty file is valid.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Ceilings applied to clients.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Identity of the hosting organisation.
    #[serde(default)]
    pub organization: OrganizationConfig,

    /// Controls for body synthesis.
    #[serde(default)]
    pub body: BodyConfig,

    #[serde(default)]
    pub diagnostic: DiagnosticConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// The maximum number of messages (normal plus associated) a store may
    /// hold before message creation is refused.
    pub max_message_count: u32,
    /// The value reported as `PR_MAX_SUBMIT_MESSAGE_SIZE`, in bytes.
    pub max_mail_len: u32,
    /// The value reported as `PR_EXTENDED_RULE_SIZE_LIMIT`, in bytes.
    pub max_extrule_len: u32,
    /// The maximum number of attachments on one message.
    pub max_attachments: u32,
    /// How deeply messages may be embedded inside attachments.
    pub max_embedded_depth: u32,
    /// The maximum number of open objects per logon.
    pub max_handles: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_message_count: 1_000_000,
            max_mail_len: 64 * 1024 * 1024,
            max_extrule_len: 510 * 1024,
            max_attachments: 1024,
            max_embedded_depth: 16,
            max_handles: 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct OrganizationConfig {
    /// The organisation name embedded in legacy distinguished names.
    pub org_name: String,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        OrganizationConfig {
            org_name: "Mapicore".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// If true, body representations that are not physically stored are
    /// derived from the ones that are.
    ///
    /// When false, only stored representations are ever returned.
    pub autosynthesis: bool,
}

impl Default for BodyConfig {
    fn default() -> Self {
        BodyConfig {
            autosynthesis: true,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticConfig {
    /// If set, redirect standard error to this file on start-up.
    ///
    /// This is useful when running under inetd-style supervisors which
    /// discard standard error.
    pub stderr: Option<PathBuf>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: SystemConfig = toml::from_str("").unwrap();
        assert_eq!(1_000_000, config.limits.max_message_count);
        assert_eq!(64 * 1024 * 1024, config.limits.max_mail_len);
        assert!(config.body.autosynthesis);
        assert!(config.diagnostic.stderr.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: SystemConfig = toml::from_str(
            "[limits]\n\
             max_attachments = 8\n\
             [body]\n\
             autosynthesis = false\n\
             [organization]\n\
             org_name = \"Example Org\"\n",
        )
        .unwrap();
        assert_eq!(8, config.limits.max_attachments);
        assert_eq!(510 * 1024, config.limits.max_extrule_len);
        assert!(!config.body.autosynthesis);
        assert_eq!("Example Org", config.organization.org_name);
    }
}
