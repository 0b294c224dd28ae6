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

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::info;
use structopt::StructOpt;

use crate::support::diagnostic;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Load and validate the system configuration.
    ///
    /// Prints the effective limits, including the defaults filled in for
    /// anything the file leaves out.
    CheckConfig(CommonOptions),
    /// Decode a synchronisation state blob saved by a client.
    ///
    /// The blob is given in base64, as it is usually found in protocol
    /// traces. Each id-set is printed per replica as a list of global
    /// counter ranges, with the last change number for change number sets.
    DumpState(DumpStateSubcommand),
}

#[derive(StructOpt, Default)]
pub(super) struct CommonOptions {
    /// The directory containing `mapicore.toml` etc
    /// [default: /etc/mapicore or /usr/local/etc/mapicore]
    #[structopt(long, parse(from_os_str))]
    pub(super) root: Option<PathBuf>,
}

#[derive(StructOpt)]
pub(super) struct DumpStateSubcommand {
    /// The state blob, base64-encoded.
    pub(super) state: String,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    match cmd {
        Command::CheckConfig(common) => check_config(common),
        Command::DumpState(cmd) => super::inspect::dump_state(cmd),
    }
}

fn check_config(common: CommonOptions) {
    let root = common.root.unwrap_or_else(|| {
        if Path::new("/etc/mapicore/mapicore.toml").is_file() {
            "/etc/mapicore".to_owned().into()
        } else if Path::new("/usr/local/etc/mapicore/mapicore.toml").is_file()
        {
            "/usr/local/etc/mapicore".to_owned().into()
        } else {
            eprintln!(
                "Neither /etc/mapicore nor /usr/local/etc/mapicore looks\n\
                 like the Mapicore root; use --root=/path/to/mapicore if\n\
                 your installation is elsewhere."
            );
            EX_CONFIG.exit()
        }
    });

    let system_config = load_system_config(&root);

    if let Err(exit) =
        diagnostic::apply_diagnostics(&root, &system_config.diagnostic)
    {
        exit.exit();
    }

    init_logging(&root);
    info!("Loaded configuration from {}", root.display());
    super::inspect::print_config(&system_config);
}

fn load_system_config(root: &Path) -> SystemConfig {
    let system_config_path = root.join("mapicore.toml");
    let mut system_config_toml = Vec::new();
    if let Err(e) = fs::File::open(&system_config_path)
        .and_then(|mut f| f.read_to_end(&mut system_config_toml))
    {
        eprintln!("Error reading '{}': {}", system_config_path.display(), e);
        EX_CONFIG.exit();
    }

    match toml::from_slice(&system_config_toml) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Error in config file at '{}': {}",
                system_config_path.display(),
                e
            );
            EX_CONFIG.exit()
        }
    }
}

fn init_logging(root: &Path) {
    if Ok(true) == nix::unistd::isatty(2) {
        // Running interactively; ignore logging configuration and just write
        // to stderr.
        crate::init_simple_log();
        return;
    }

    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        log4rs::init_file(log_config_file, log4rs::file::Deserializers::new())
            .expect("Failed to initialise logging");
    } else {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_MAIL,
            hostname: None,
            process: env!("CARGO_PKG_NAME").to_owned(),
            pid: nix::unistd::getpid().as_raw(),
        };

        let logger =
            syslog::unix(formatter).expect("Failed to connect to syslog");
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|_| log::set_max_level(log::LevelFilter::Info))
            .expect("Failed to initialise logging");
    }
}
