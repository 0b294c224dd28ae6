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

//! Compressed RTF, as stored in `PR_RTF_COMPRESSED`.
//!
//! The stream starts with a 16-byte header: compressed size (counting from
//! after the size field), raw size, a magic number selecting compressed
//! (`LZFu`) or stored (`MELA`) framing, and a CRC of the compressed data.

use byteorder::{ByteOrder, LittleEndian};

use super::error::Error;

const MAGIC_COMPRESSED: u32 = 0x7546_5A4C;
const MAGIC_UNCOMPRESSED: u32 = 0x414C_454D;
const HEADER_LEN: usize = 16;
const DICT_LEN: usize = 4096;

const PREBUF: &[u8] = b"{\\rtf1\\ansi\\mac\\deff0\\deftab720{\\fonttbl;}\
{\\f0\\fnil \\froman \\fswiss \\fmodern \\fscript \\fdecor MS Sans Serif\
SymbolArialTimes New RomanCourier{\\colortbl\\red0\\green0\\blue0\r\n\
\\par \\pard\\plain\\f0\\fs20\\b\\i\\u\\tab\\tx";

const fn make_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if 0 != c & 1 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = make_crc_table();

fn crc(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |crc, &b| {
        CRC_TABLE[((crc ^ u32::from(b)) & 0xFF) as usize] ^ (crc >> 8)
    })
}

fn corrupt(what: &str) -> Error {
    Error::Conversion(format!("compressed RTF: {}", what))
}

/// Return the uncompressed size recorded in the header.
pub fn uncompressed_size(data: &[u8]) -> Result<usize, Error> {
    if data.len() < HEADER_LEN {
        return Err(corrupt("truncated header"));
    }

    Ok(LittleEndian::read_u32(&data[4..8]) as usize)
}

/// Decompress a `PR_RTF_COMPRESSED` stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let raw_size = uncompressed_size(data)?;
    let comp_size = LittleEndian::read_u32(&data[0..4]) as usize;
    let magic = LittleEndian::read_u32(&data[8..12]);
    let expected_crc = LittleEndian::read_u32(&data[12..16]);

    let end = comp_size.checked_add(4).ok_or_else(|| corrupt("bad size"))?;
    if end < HEADER_LEN || end > data.len() {
        return Err(corrupt("size exceeds data"));
    }
    let body = &data[HEADER_LEN..end];

    match magic {
        MAGIC_UNCOMPRESSED => {
            if body.len() < raw_size {
                return Err(corrupt("stored data truncated"));
            }
            Ok(body[..raw_size].to_vec())
        }
        MAGIC_COMPRESSED => {
            if crc(body) != expected_crc {
                return Err(corrupt("CRC mismatch"));
            }
            lzfu_decode(body, raw_size)
        }
        _ => Err(corrupt("unknown framing")),
    }
}

fn lzfu_decode(body: &[u8], raw_size: usize) -> Result<Vec<u8>, Error> {
    let mut dict = [0u8; DICT_LEN];
    dict[..PREBUF.len()].copy_from_slice(PREBUF);
    let mut write_pos = PREBUF.len();
    let mut out = Vec::with_capacity(raw_size);
    let mut input = body.iter().copied();

    while let Some(control) = input.next() {
        for bit in 0..8 {
            if 0 == control & (1 << bit) {
                let b = match input.next() {
                    Some(b) => b,
                    None => return Ok(out),
                };
                out.push(b);
                dict[write_pos] = b;
                write_pos = (write_pos + 1) % DICT_LEN;
                continue;
            }

            let (hi, lo) = match (input.next(), input.next()) {
                (Some(hi), Some(lo)) => (hi, lo),
                _ => return Err(corrupt("truncated reference")),
            };
            let reference = (usize::from(hi) << 8) | usize::from(lo);
            let offset = reference >> 4;
            let len = (reference & 0xF) + 2;
            if offset == write_pos {
                return Ok(out);
            }

            for i in 0..len {
                let b = dict[(offset + i) % DICT_LEN];
                out.push(b);
                dict[write_pos] = b;
                write_pos = (write_pos + 1) % DICT_LEN;
            }
        }
    }

    Ok(out)
}

/// Produce a `PR_RTF_COMPRESSED` stream holding `rtf`, using the stored
/// (uncompressed) framing.
pub fn compress(rtf: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_LEN];
    LittleEndian::write_u32(&mut out[0..4], (rtf.len() + 12) as u32);
    LittleEndian::write_u32(&mut out[4..8], rtf.len() as u32);
    LittleEndian::write_u32(&mut out[8..12], MAGIC_UNCOMPRESSED);
    out.extend_from_slice(rtf);
    out
}
