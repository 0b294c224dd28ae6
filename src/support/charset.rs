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

//! Mapping between Windows code page ids and character encodings.

use std::borrow::Cow;

use encoding_rs::Encoding;

use super::error::Error;

pub const CP_UTF16LE: u32 = 1200;
pub const CP_UTF16BE: u32 = 1201;
pub const CP_WINDOWS_1252: u32 = 1252;
pub const CP_UTF8: u32 = 65001;

static CODEPAGES: &[(u32, &str)] = &[
    (866, "ibm866"),
    (874, "windows-874"),
    (932, "shift_jis"),
    (936, "gbk"),
    (949, "euc-kr"),
    (950, "big5"),
    (1250, "windows-1250"),
    (1251, "windows-1251"),
    (1252, "windows-1252"),
    (1253, "windows-1253"),
    (1254, "windows-1254"),
    (1255, "windows-1255"),
    (1256, "windows-1256"),
    (1257, "windows-1257"),
    (1258, "windows-1258"),
    (10000, "macintosh"),
    (20127, "us-ascii"),
    (20866, "koi8-r"),
    (21866, "koi8-u"),
    (28591, "iso-8859-1"),
    (28592, "iso-8859-2"),
    (28593, "iso-8859-3"),
    (28594, "iso-8859-4"),
    (28595, "iso-8859-5"),
    (28596, "iso-8859-6"),
    (28597, "iso-8859-7"),
    (28598, "iso-8859-8"),
    (28603, "iso-8859-13"),
    (28605, "iso-8859-15"),
    (50220, "iso-2022-jp"),
    (51932, "euc-jp"),
    (51949, "euc-kr"),
    (54936, "gb18030"),
    (CP_UTF8, "utf-8"),
];

/// Return whether text can be converted to and from `cpid`.
pub fn is_known_cpid(cpid: u32) -> bool {
    CP_UTF16LE == cpid || CP_UTF16BE == cpid || encoding(cpid).is_some()
}

fn encoding(cpid: u32) -> Option<&'static Encoding> {
    let (_, label) = CODEPAGES.iter().find(|&&(cp, _)| cp == cpid)?;
    Encoding::for_label_no_replacement(label.as_bytes())
}

/// Decode 8-bit text in code page `cpid`.
///
/// Malformed sequences become U+FFFD. Single and multi-byte text ends at
/// the first NUL.
pub fn decode(cpid: u32, bytes: &[u8]) -> Result<String, Error> {
    match cpid {
        CP_UTF16LE | CP_UTF16BE => {
            let units = bytes.chunks_exact(2).map(|c| {
                if CP_UTF16LE == cpid {
                    u16::from_le_bytes([c[0], c[1]])
                } else {
                    u16::from_be_bytes([c[0], c[1]])
                }
            });
            Ok(std::char::decode_utf16(units)
                .map(|r| r.unwrap_or(std::char::REPLACEMENT_CHARACTER))
                .collect())
        }
        _ => {
            let enc = encoding(cpid).ok_or(Error::UnknownCodepage(cpid))?;
            let (text, _) = enc.decode_without_bom_handling(strip_nul(bytes));
            Ok(text.into_owned())
        }
    }
}

/// Encode `text` into code page `cpid`.
///
/// Characters the code page cannot represent become numeric character
/// references.
pub fn encode(cpid: u32, text: &str) -> Result<Vec<u8>, Error> {
    match cpid {
        CP_UTF16LE => {
            Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect())
        }
        CP_UTF16BE => {
            Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect())
        }
        _ => {
            let enc = encoding(cpid).ok_or(Error::UnknownCodepage(cpid))?;
            let (bytes, _, _) = enc.encode(text);
            Ok(match bytes {
                Cow::Borrowed(b) => b.to_vec(),
                Cow::Owned(b) => b,
            })
        }
    }
}

fn strip_nul(bytes: &[u8]) -> &[u8] {
    match memchr::memchr(0, bytes) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}
