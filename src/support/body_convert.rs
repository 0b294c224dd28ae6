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

//! Built-in conversions between plain text, HTML and RTF bodies.

use std::borrow::Cow;
use std::char;
use std::fmt::Write as _;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::charset;
use super::error::Error;

lazy_static! {
    static ref HIDDEN: Regex = Regex::new(concat!(
        r"(?is)<!--.*?-->",
        r"|<(script|style|head)\b.*?</(script|style|head)\s*>"
    ))
    .unwrap();
    static ref BREAK: Regex =
        Regex::new(r"(?i)<br\s*/?>|</(p|div|tr|li|h[1-6])\s*>").unwrap();
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref ENTITY: Regex =
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});")
            .unwrap();
    static ref BLANK_LINES: Regex = Regex::new(r"\n[ \t]*\n(\s*\n)+").unwrap();
}

/// Render plain text as a minimal HTML document.
pub fn plain_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    out.push_str("<html><body>\r\n");
    for (ix, line) in text.split('\n').enumerate() {
        if ix > 0 {
            out.push_str("<br>\r\n");
        }
        for ch in line.trim_end_matches('\r').chars() {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                ch => out.push(ch),
            }
        }
    }
    out.push_str("\r\n</body></html>\r\n");
    out
}

/// Extract the text of an HTML document.
pub fn html_to_plain(html: &str) -> Result<String, Error> {
    if html.trim().is_empty() {
        return Err(Error::Conversion("empty HTML document".to_owned()));
    }

    let text = HIDDEN.replace_all(html, "");
    let text = text.replace(['\r', '\n'], " ");
    let text = BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, "");
    let text = ENTITY.replace_all(&text, |c: &Captures| decode_entity(&c[1]));
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    Ok(text
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\r\n")
        .trim()
        .to_owned())
}

fn decode_entity(name: &str) -> Cow<'static, str> {
    let num = if let Some(hex) =
        name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok()
    } else {
        None
    };

    if let Some(num) = num {
        return Cow::Owned(
            char::from_u32(num)
                .unwrap_or(char::REPLACEMENT_CHARACTER)
                .to_string(),
        );
    }

    Cow::Borrowed(match name.to_ascii_lowercase().as_str() {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "euro" => "\u{20ac}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        _ => "\u{fffd}",
    })
}

/// Encapsulate an HTML document in RTF so that it can be recovered
/// verbatim.
pub fn html_to_rtf(html: &str, cpid: u32) -> Result<Vec<u8>, Error> {
    let cpid = if charset::is_known_cpid(cpid) && cpid != charset::CP_UTF8 {
        cpid
    } else {
        charset::CP_WINDOWS_1252
    };

    let mut out = String::with_capacity(html.len() + 128);
    let _ = write!(
        out,
        "{{\\rtf1\\ansi\\ansicpg{}\\fromhtml1 \\deff0\
         {{\\fonttbl{{\\f0\\fswiss Arial;}}}}\r\n{{\\*\\htmltag0 ",
        cpid,
    );
    for ch in html.chars() {
        match ch {
            '\\' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            '\r' => (),
            '\n' => out.push_str("\\par\r\n"),
            ch if ch.is_ascii() => out.push(ch),
            ch => {
                let mut units = [0u16; 2];
                for &unit in ch.encode_utf16(&mut units).iter() {
                    let _ = write!(out, "\\u{}?", unit as i16);
                }
            }
        }
    }
    out.push_str("}}\r\n");
    Ok(out.into_bytes())
}

/// Recover an HTML document from RTF.
///
/// HTML-encapsulating RTF is de-encapsulated; anything else has its text
/// extracted and wrapped in HTML.
pub fn rtf_to_html(rtf: &[u8]) -> Result<String, Error> {
    let doc = RtfReader::parse(rtf)?;
    if doc.from_html {
        Ok(doc.html)
    } else {
        Ok(plain_to_html(&doc.text))
    }
}

#[derive(Clone, Copy, Default)]
struct GroupState {
    skip: bool,
    htmltag: bool,
    htmlrtf: bool,
    uc: u32,
}

#[derive(Default)]
struct RtfReader {
    from_html: bool,
    cpid: u32,
    html: String,
    text: String,
    pending: Vec<u8>,
}

impl RtfReader {
    fn parse(rtf: &[u8]) -> Result<Self, Error> {
        if !rtf.starts_with(b"{\\rtf") {
            return Err(Error::Conversion("not an RTF document".to_owned()));
        }

        let mut this = RtfReader {
            cpid: charset::CP_WINDOWS_1252,
            ..RtfReader::default()
        };
        let mut stack = Vec::<GroupState>::new();
        let mut state = GroupState {
            uc: 1,
            ..GroupState::default()
        };
        let mut skip_fallback = 0u32;
        let mut ignorable_next = false;
        let mut i = 0;

        while i < rtf.len() {
            let b = rtf[i];
            i += 1;
            match b {
                b'{' => {
                    this.flush(state)?;
                    stack.push(state);
                    state.htmltag = false;
                }
                b'}' => {
                    this.flush(state)?;
                    state = stack.pop().unwrap_or(state);
                }
                b'\r' | b'\n' => (),
                b'\\' => {
                    let (word, param, next) = control(rtf, i);
                    i = next;
                    if word.is_empty() {
                        // Control symbol
                        let sym = rtf.get(i).copied().unwrap_or(b' ');
                        i += 1;
                        match sym {
                            b'\'' => {
                                let hex = rtf.get(i..i + 2).unwrap_or(b"3f");
                                i += 2;
                                let byte = std::str::from_utf8(hex)
                                    .ok()
                                    .and_then(|h| {
                                        u8::from_str_radix(h, 16).ok()
                                    })
                                    .unwrap_or(b'?');
                                if skip_fallback > 0 {
                                    skip_fallback -= 1;
                                } else {
                                    this.pending.push(byte);
                                }
                            }
                            b'*' => ignorable_next = true,
                            b'~' => this.push_char(state, ' ')?,
                            b'\r' | b'\n' => this.push_char(state, '\n')?,
                            b'\\' | b'{' | b'}' => {
                                this.push_char(state, char::from(sym))?
                            }
                            _ => (),
                        }
                        continue;
                    }

                    let ignorable =
                        std::mem::replace(&mut ignorable_next, false);
                    match word {
                        "fromhtml" => this.from_html = true,
                        "ansicpg" => {
                            if let Some(cp) = param {
                                this.cpid = cp as u32;
                            }
                        }
                        "htmltag" => {
                            this.flush(state)?;
                            state.htmltag = true;
                            state.skip = false;
                        }
                        "htmlrtf" => {
                            this.flush(state)?;
                            state.htmlrtf = param != Some(0);
                        }
                        "fonttbl" | "colortbl" | "stylesheet" | "info"
                        | "pict" | "header" | "footer" | "object" => {
                            state.skip = true
                        }
                        "uc" => state.uc = param.unwrap_or(1).max(0) as u32,
                        "u" => {
                            this.flush(state)?;
                            let unit = param.unwrap_or(0x3f) as i16 as u16;
                            let ch = char::decode_utf16(std::iter::once(unit))
                                .next()
                                .and_then(Result::ok)
                                .unwrap_or(char::REPLACEMENT_CHARACTER);
                            this.push_char(state, ch)?;
                            skip_fallback = state.uc;
                        }
                        "par" | "line" => this.push_char(state, '\n')?,
                        "tab" => this.push_char(state, '\t')?,
                        _ if ignorable && !state.htmltag => state.skip = true,
                        _ => (),
                    }
                }
                _ => {
                    if skip_fallback > 0 {
                        skip_fallback -= 1;
                    } else {
                        this.pending.push(b);
                    }
                }
            }
        }

        this.flush(state)?;
        Ok(this)
    }

    fn flush(&mut self, state: GroupState) -> Result<(), Error> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let text = charset::decode(self.cpid, &self.pending)?;
        self.pending.clear();
        for ch in text.chars() {
            self.push_char(state, ch)?;
        }
        Ok(())
    }

    fn push_char(&mut self, state: GroupState, ch: char) -> Result<(), Error> {
        if !self.pending.is_empty() {
            self.flush(state)?;
        }

        if state.htmltag {
            self.html.push(ch);
        } else if !state.skip && !state.htmlrtf {
            self.text.push(ch);
            self.html.push(ch);
        }
        Ok(())
    }
}

/// Parse a control word starting just after a backslash.
///
/// Returns the word (empty for a control symbol), its numeric parameter,
/// and the index after the word and its delimiter.
fn control(rtf: &[u8], start: usize) -> (&str, Option<i32>, usize) {
    let mut i = start;
    while i < rtf.len() && rtf[i].is_ascii_alphabetic() {
        i += 1;
    }
    // Only ASCII letters were consumed
    let word = std::str::from_utf8(&rtf[start..i]).unwrap_or("");
    if word.is_empty() {
        return (word, None, start);
    }

    let num_start = i;
    if i < rtf.len() && b'-' == rtf[i] {
        i += 1;
    }
    while i < rtf.len() && rtf[i].is_ascii_digit() {
        i += 1;
    }
    let param = std::str::from_utf8(&rtf[num_start..i])
        .ok()
        .and_then(|s| s.parse::<i32>().ok());

    if i < rtf.len() && b' ' == rtf[i] {
        i += 1;
    }
    (word, param, i)
}
