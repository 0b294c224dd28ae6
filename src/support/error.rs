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

use std::fmt;
use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Object not found")]
    NotFound,
    #[error("Access denied")]
    AccessDenied,
    #[error("Quota exceeded")]
    QuotaExceeded,
    #[error("Too many attachments on message")]
    MaxAttachmentExceeded,
    #[error("Operation not supported on this object")]
    NotSupported,
    #[error("Invalid parameter")]
    InvalidParam,
    #[error("Out of memory")]
    OutOfMemory,
    #[error("No such object handle")]
    NullObject,
    #[error("Object was modified since it was opened")]
    ObjectModified,
    #[error("Embedded message nesting too deep")]
    TooComplex,
    #[error("Unknown code page {0}")]
    UnknownCodepage(u32),
    #[error("Response buffer too small")]
    BufferTooSmall,
    #[error("Not implemented")]
    NotImplemented,
    #[error("Malformed synchronisation state: {0}")]
    BadState(&'static str),
    #[error("Backing store failure: {0}")]
    Store(String),
    #[error("Body conversion failed: {0}")]
    Conversion(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// The 32-bit result code carried in ROP responses.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EcCode(pub u32);

impl EcCode {
    pub const SUCCESS: Self = EcCode(0x0000_0000);
    pub const ERROR: Self = EcCode(0x8000_4005);
    pub const NOT_FOUND: Self = EcCode(0x8004_010F);
    pub const ACCESS_DENIED: Self = EcCode(0x8007_0005);
    pub const QUOTA_EXCEEDED: Self = EcCode(0x0000_04D9);
    pub const MAX_ATTACHMENT_EXCEEDED: Self = EcCode(0x0000_04DB);
    pub const NOT_SUPPORTED: Self = EcCode(0x8004_0102);
    pub const INVALID_PARAM: Self = EcCode(0x8007_0057);
    pub const SERVER_OOM: Self = EcCode(0x0000_03F0);
    pub const NULL_OBJECT: Self = EcCode(0x0000_04B9);
    pub const OBJECT_MODIFIED: Self = EcCode(0x8004_0109);
    pub const TOO_COMPLEX: Self = EcCode(0x8004_0117);
    pub const UNKNOWN_CPID: Self = EcCode(0x8004_011E);
    pub const BUFFER_TOO_SMALL: Self = EcCode(0x0000_047D);
    pub const NOT_IMPLEMENTED: Self = EcCode(0x8004_0FFF);

    pub fn is_success(self) -> bool {
        self == EcCode::SUCCESS
    }
}

impl fmt::Debug for EcCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EcCode({:#010x})", self.0)
    }
}

impl<'a> From<&'a Error> for EcCode {
    fn from(e: &'a Error) -> Self {
        match *e {
            Error::NotFound => EcCode::NOT_FOUND,
            Error::AccessDenied => EcCode::ACCESS_DENIED,
            Error::QuotaExceeded => EcCode::QUOTA_EXCEEDED,
            Error::MaxAttachmentExceeded => EcCode::MAX_ATTACHMENT_EXCEEDED,
            Error::NotSupported => EcCode::NOT_SUPPORTED,
            Error::InvalidParam | Error::BadState(..) => {
                EcCode::INVALID_PARAM
            }
            Error::OutOfMemory => EcCode::SERVER_OOM,
            Error::NullObject => EcCode::NULL_OBJECT,
            Error::ObjectModified => EcCode::OBJECT_MODIFIED,
            Error::TooComplex => EcCode::TOO_COMPLEX,
            Error::UnknownCodepage(..) => EcCode::UNKNOWN_CPID,
            Error::BufferTooSmall => EcCode::BUFFER_TOO_SMALL,
            Error::NotImplemented => EcCode::NOT_IMPLEMENTED,
            Error::Store(..)
            | Error::Conversion(..)
            | Error::Io(..)
            | Error::Toml(..) => EcCode::ERROR,
        }
    }
}

impl From<Error> for EcCode {
    fn from(e: Error) -> Self {
        EcCode::from(&e)
    }
}

/// Recover the error behind a per-property problem code.
impl From<EcCode> for Error {
    fn from(code: EcCode) -> Self {
        match code {
            EcCode::NOT_FOUND => Error::NotFound,
            EcCode::ACCESS_DENIED => Error::AccessDenied,
            EcCode::QUOTA_EXCEEDED => Error::QuotaExceeded,
            EcCode::NOT_SUPPORTED => Error::NotSupported,
            EcCode::INVALID_PARAM => Error::InvalidParam,
            EcCode::SERVER_OOM => Error::OutOfMemory,
            EcCode::OBJECT_MODIFIED => Error::ObjectModified,
            code => Error::Store(format!("{:?}", code)),
        }
    }
}
