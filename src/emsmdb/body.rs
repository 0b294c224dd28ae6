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

//! Body synthesis.
//!
//! A message may physically store any subset of its plain text, HTML and
//! compressed RTF bodies. A request for one representation is answered by
//! walking an ordered list of strategies. Each strategy yields the value
//! (found), nothing because its source is absent (a soft miss, so the next
//! strategy runs), or an error, which aborts the whole lookup.
//!
//! Strategies that derive one format from another only run when body
//! autosynthesis is enabled.

use log::debug;

use crate::mapi::model::*;
use crate::mapi::tags::*;
use crate::store::BodyConverter;
use crate::support::charset;
use crate::support::error::Error;
use crate::support::rtfcp;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Plain8,
    PlainUnicode,
    PlainUnspecified,
    Html,
    HtmlUnspecified,
    RtfCompressed,
}

impl BodyKind {
    pub fn from_tag(tag: PropTag) -> Option<Self> {
        match tag {
            PR_BODY_A => Some(BodyKind::Plain8),
            PR_BODY => Some(BodyKind::PlainUnicode),
            PR_BODY_U => Some(BodyKind::PlainUnspecified),
            PR_HTML => Some(BodyKind::Html),
            PR_HTML_U => Some(BodyKind::HtmlUnspecified),
            PR_RTF_COMPRESSED => Some(BodyKind::RtfCompressed),
            _ => None,
        }
    }

    fn strategies(self) -> &'static [Strategy] {
        match self {
            BodyKind::Plain8 => PLAIN_8BIT,
            BodyKind::PlainUnicode => PLAIN_UNICODE,
            BodyKind::PlainUnspecified => PLAIN_UNSPECIFIED,
            BodyKind::Html | BodyKind::HtmlUnspecified => HTML,
            BodyKind::RtfCompressed => RTF_COMPRESSED,
        }
    }

    /// Whether the answer must carry the type actually produced.
    fn is_unspecified(self) -> bool {
        match self {
            BodyKind::PlainUnspecified | BodyKind::HtmlUnspecified => true,
            _ => false,
        }
    }
}

/// What a body is synthesised from.
pub struct BodySource<'a> {
    pub props: &'a PropValues,
    /// The code page of 8-bit text going in and out.
    pub cpid: u32,
    pub converter: &'a dyn BodyConverter,
}

struct Strategy {
    name: &'static str,
    synthesised: bool,
    run: fn(&BodySource<'_>) -> Result<Option<Value>, Error>,
}

static PLAIN_8BIT: &[Strategy] = &[
    Strategy {
        name: "stored 8-bit text",
        synthesised: false,
        run: plain8_stored,
    },
    Strategy {
        name: "stored Unicode text",
        synthesised: false,
        run: plain8_from_unicode,
    },
    Strategy {
        name: "text from HTML or RTF",
        synthesised: true,
        run: plain8_from_higher,
    },
];

static PLAIN_UNICODE: &[Strategy] = &[
    Strategy {
        name: "stored Unicode text",
        synthesised: false,
        run: unicode_stored,
    },
    Strategy {
        name: "stored 8-bit text",
        synthesised: false,
        run: unicode_from_8bit,
    },
    Strategy {
        name: "text from HTML or RTF",
        synthesised: true,
        run: unicode_from_higher,
    },
];

static PLAIN_UNSPECIFIED: &[Strategy] = &[
    Strategy {
        name: "stored Unicode text",
        synthesised: false,
        run: unicode_stored,
    },
    Strategy {
        name: "stored 8-bit text",
        synthesised: false,
        run: plain8_stored,
    },
    Strategy {
        name: "text from HTML or RTF",
        synthesised: true,
        run: unicode_from_higher,
    },
];

static HTML: &[Strategy] = &[
    Strategy {
        name: "stored HTML",
        synthesised: false,
        run: html_stored,
    },
    Strategy {
        name: "HTML from RTF",
        synthesised: true,
        run: html_from_rtf,
    },
    Strategy {
        name: "HTML from text",
        synthesised: true,
        run: html_from_plain,
    },
];

static RTF_COMPRESSED: &[Strategy] = &[
    Strategy {
        name: "stored RTF",
        synthesised: false,
        run: rtf_stored,
    },
    Strategy {
        name: "RTF from text",
        synthesised: true,
        run: rtf_from_plain,
    },
];

/// Produce the body representation `tag` asks for.
///
/// Returns `Ok(None)` if no strategy could produce it.
pub fn get_body(
    src: &BodySource<'_>,
    tag: PropTag,
    autosynthesis: bool,
) -> Result<Option<PropVal>, Error> {
    let kind = BodyKind::from_tag(tag).ok_or(Error::InvalidParam)?;

    for strategy in kind.strategies() {
        if strategy.synthesised && !autosynthesis {
            continue;
        }

        if let Some(value) = (strategy.run)(src)? {
            debug!("Answered {:?} with {}", kind, strategy.name);
            let value = if kind.is_unspecified() {
                Value::Typed(value.prop_type(), Box::new(value))
            } else {
                value
            };
            return Ok(Some(PropVal::new(tag, value)));
        }
    }

    Ok(None)
}

fn internet_cpid(src: &BodySource<'_>) -> u32 {
    src.props
        .get_u32(PR_INTERNET_CPID)
        .unwrap_or(charset::CP_UTF8)
}

fn stored_unicode(src: &BodySource<'_>) -> Option<String> {
    src.props.get_str(PR_BODY).map(str::to_owned)
}

fn stored_8bit(src: &BodySource<'_>) -> Option<Vec<u8>> {
    match src.props.get(PR_BODY_A) {
        Some(&Value::String8(ref text)) => Some(text.clone()),
        _ => None,
    }
}

fn stored_rtf(src: &BodySource<'_>) -> Result<Option<Vec<u8>>, Error> {
    src.props
        .get_bytes(PR_RTF_COMPRESSED)
        .map(rtfcp::decompress)
        .transpose()
}

fn html_from_higher(src: &BodySource<'_>) -> Result<Option<String>, Error> {
    match stored_rtf(src)? {
        Some(rtf) => Ok(Some(src.converter.rtf_to_html(&rtf)?)),
        None => Ok(None),
    }
}

/// Stored HTML, or HTML recovered from RTF, reduced to text.
fn text_from_higher(src: &BodySource<'_>) -> Result<Option<String>, Error> {
    let html = match src.props.get_bytes(PR_HTML) {
        Some(html) => Some(charset::decode(internet_cpid(src), html)?),
        None => html_from_higher(src)?,
    };

    html.map(|html| src.converter.html_to_plain(&html))
        .transpose()
}

fn html_from_lower(src: &BodySource<'_>) -> Result<Option<String>, Error> {
    let text = match stored_unicode(src) {
        Some(text) => Some(text),
        None => stored_8bit(src)
            .map(|text| charset::decode(src.cpid, &text))
            .transpose()?,
    };

    text.map(|text| src.converter.plain_to_html(&text))
        .transpose()
}

fn plain8_stored(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    Ok(stored_8bit(src).map(Value::String8))
}

fn plain8_from_unicode(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    stored_unicode(src)
        .map(|text| charset::encode(src.cpid, &text).map(Value::String8))
        .transpose()
}

fn plain8_from_higher(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    text_from_higher(src)?
        .map(|text| charset::encode(src.cpid, &text).map(Value::String8))
        .transpose()
}

fn unicode_stored(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    Ok(stored_unicode(src).map(Value::Unicode))
}

fn unicode_from_8bit(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    stored_8bit(src)
        .map(|text| charset::decode(src.cpid, &text).map(Value::Unicode))
        .transpose()
}

fn unicode_from_higher(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    Ok(text_from_higher(src)?.map(Value::Unicode))
}

fn html_stored(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    Ok(src.props.get_bytes(PR_HTML).map(|b| Value::Binary(b.to_vec())))
}

/// HTML recovered from RTF is always UTF-8, whatever the session code page.
fn html_from_rtf(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    Ok(html_from_higher(src)?.map(|html| Value::Binary(html.into_bytes())))
}

fn html_from_plain(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    html_from_lower(src)?
        .map(|html| charset::encode(src.cpid, &html).map(Value::Binary))
        .transpose()
}

fn rtf_stored(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    Ok(src
        .props
        .get_bytes(PR_RTF_COMPRESSED)
        .map(|b| Value::Binary(b.to_vec())))
}

fn rtf_from_plain(src: &BodySource<'_>) -> Result<Option<Value>, Error> {
    match html_from_lower(src)? {
        Some(html) => {
            let rtf = src.converter.html_to_rtf(&html, src.cpid)?;
            Ok(Some(Value::Binary(rtfcp::compress(&rtf))))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::BuiltinConverter;

    fn get(
        props: &PropValues,
        tag: PropTag,
        autosynthesis: bool,
    ) -> Result<Option<Value>, Error> {
        let src = BodySource {
            props,
            cpid: charset::CP_WINDOWS_1252,
            converter: &BuiltinConverter,
        };
        Ok(get_body(&src, tag, autosynthesis)?.map(|pv| pv.value))
    }

    fn with(tag: PropTag, value: Value) -> PropValues {
        let mut props = PropValues::new();
        props.set(tag, value);
        props
    }

    #[test]
    fn direct_hits() {
        let props = with(PR_BODY, Value::Unicode("Café".to_owned()));
        assert_eq!(
            Some(Value::Unicode("Café".to_owned())),
            get(&props, PR_BODY, false).unwrap()
        );
        assert_eq!(
            Some(Value::String8(vec![b'C', b'a', b'f', 0xE9])),
            get(&props, PR_BODY_A, false).unwrap()
        );

        let props = with(PR_BODY_A, Value::String8(vec![b'C', b'a', 0xE9]));
        assert_eq!(
            Some(Value::Unicode("Caé".to_owned())),
            get(&props, PR_BODY, false).unwrap()
        );
    }

    #[test]
    fn unspecified_requests_report_the_produced_type() {
        let props = with(PR_BODY_A, Value::String8(b"plain".to_vec()));
        assert_eq!(
            Some(Value::Typed(
                PT_STRING8,
                Box::new(Value::String8(b"plain".to_vec()))
            )),
            get(&props, PR_BODY_U, true).unwrap()
        );

        let props = with(PR_BODY, Value::Unicode("x < y".to_owned()));
        match get(&props, PR_HTML_U, true).unwrap() {
            Some(Value::Typed(PT_BINARY, html)) => match *html {
                Value::Binary(ref html) => {
                    let html = String::from_utf8_lossy(html);
                    assert!(html.contains("x &lt; y"), "{}", html);
                }
                ref other => panic!("Unexpected {:?}", other),
            },
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn synthesis_can_be_disabled() {
        let props = with(PR_BODY, Value::Unicode("hello".to_owned()));
        assert_eq!(None, get(&props, PR_HTML, false).unwrap());
        assert_eq!(None, get(&props, PR_RTF_COMPRESSED, false).unwrap());
        assert!(get(&props, PR_HTML, true).unwrap().is_some());

        let props = with(PR_HTML, Value::Binary(b"<p>hi</p>".to_vec()));
        assert_eq!(None, get(&props, PR_BODY, false).unwrap());
        assert_eq!(None, get(&props, PR_BODY_A, false).unwrap());
    }

    #[test]
    fn text_from_stored_html() {
        let props =
            with(PR_HTML, Value::Binary(b"<p>Hello <b>there</b></p>".to_vec()));
        match get(&props, PR_BODY, true).unwrap() {
            Some(Value::Unicode(text)) => {
                assert!(text.contains("Hello there"), "{:?}", text)
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn rtf_synthesis_round_trips_through_html() {
        let props = with(PR_BODY, Value::Unicode("Hello world".to_owned()));
        let rtf = match get(&props, PR_RTF_COMPRESSED, true).unwrap() {
            Some(Value::Binary(rtf)) => rtf,
            other => panic!("Unexpected {:?}", other),
        };

        let props = with(PR_RTF_COMPRESSED, Value::Binary(rtf));
        match get(&props, PR_BODY, true).unwrap() {
            Some(Value::Unicode(text)) => {
                assert!(text.contains("Hello world"), "{:?}", text)
            }
            other => panic!("Unexpected {:?}", other),
        }
        match get(&props, PR_HTML, true).unwrap() {
            Some(Value::Binary(html)) => {
                assert!(String::from_utf8_lossy(&html).contains("Hello world"))
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn html_from_rtf_is_utf8() {
        let text = "Привет, Zoë";
        let props = with(PR_BODY, Value::Unicode(text.to_owned()));
        let rtf = match get(&props, PR_RTF_COMPRESSED, true).unwrap() {
            Some(Value::Binary(rtf)) => rtf,
            other => panic!("Unexpected {:?}", other),
        };

        let props = with(PR_RTF_COMPRESSED, Value::Binary(rtf));
        match get(&props, PR_HTML, true).unwrap() {
            Some(Value::Binary(html)) => {
                let html = String::from_utf8(html).unwrap();
                assert!(html.contains(text), "{}", html);
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn corrupt_rtf_is_a_hard_failure() {
        let props = with(PR_RTF_COMPRESSED, Value::Binary(vec![1, 2, 3]));
        assert_matches!(Err(Error::Conversion(..)), get(&props, PR_BODY, true));
        // Without synthesis the RTF is never looked at
        assert_matches!(Ok(None), get(&props, PR_BODY, false));
    }

    #[test]
    fn nothing_stored() {
        let props = PropValues::new();
        for &tag in &[PR_BODY, PR_BODY_A, PR_BODY_U, PR_HTML, PR_HTML_U] {
            assert_eq!(None, get(&props, tag, true).unwrap());
        }
        assert_eq!(None, get(&props, PR_RTF_COMPRESSED, true).unwrap());
        assert_matches!(
            Err(Error::InvalidParam),
            get(&props, PR_SUBJECT, true)
        );
    }
}
