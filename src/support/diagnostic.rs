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

use std::os::unix::io::RawFd;
use std::path::Path;

use log::error;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;

use super::sysexits::*;
use super::system_config::DiagnosticConfig;

const STDERR: RawFd = 2;

/// Apply the `[diagnostic]` section of the system configuration.
///
/// Relative paths are resolved against the system root.
pub fn apply_diagnostics(
    root: &Path,
    config: &DiagnosticConfig,
) -> Result<(), Sysexit> {
    match config.stderr {
        Some(ref path) => reopen_stderr(&root.join(path)),
        None => Ok(()),
    }
}

fn reopen_stderr(path: &Path) -> Result<(), Sysexit> {
    let fd = nix::fcntl::open(
        path,
        OFlag::O_APPEND | OFlag::O_WRONLY | OFlag::O_CREAT,
        Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP,
    )
    .map_err(|e| {
        error!("can't open stderr file {}: {}", path.display(), e);
        EX_CANTCREAT
    })?;

    let result = nix::unistd::dup2(fd, STDERR);
    let _ = nix::unistd::close(fd);
    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("can't redirect stderr to {}: {}", path.display(), e);
            Err(EX_OSERR)
        }
    }
}
