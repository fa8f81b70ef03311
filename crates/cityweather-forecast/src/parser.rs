//! Positional parser for the service's `ArrayOfString` payload.
//!
//! The response is a flat list of `<string>` elements with no field names.
//! We collect their text in document order and pick values by index using
//! [`FIELD_INDEX`].

use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ParseFailure;
use crate::types::{Forecast, RawResponse, FIELD_INDEX, NO_DATA};

const STRING_TAG: &[u8] = b"string";

/// Parse a raw service response into a [`Forecast`].
pub fn parse(raw: &RawResponse) -> Result<Forecast, ParseFailure> {
    let strings = extract_strings(raw.as_str())?;
    tracing::debug!(count = strings.len(), "Extracted <string> elements");
    map_fields(&strings)
}

/// Text content of every `<string>` element, in document order.
///
/// An element's text includes the text of any descendants. Namespace
/// prefixes are ignored.
pub fn extract_strings(xml: &str) -> Result<Vec<String>, ParseFailure> {
    let mut reader = Reader::from_str(xml);

    let mut strings: Vec<String> = Vec::new();
    // Indexes into `strings` for <string> elements that are still open.
    let mut open_strings: Vec<usize> = Vec::new();
    // Local names of all open elements, for well-formedness checks.
    let mut open_elements: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            ParseFailure::MalformedXml(format!(
                "{} at byte {}",
                e,
                reader.error_position()
            ))
        })?;

        match event {
            Event::Start(start) => {
                if open_elements.is_empty() {
                    if seen_root {
                        return Err(malformed("multiple root elements"));
                    }
                    seen_root = true;
                }
                let name = start.local_name().as_ref().to_vec();
                if name == STRING_TAG {
                    open_strings.push(strings.len());
                    strings.push(String::new());
                }
                open_elements.push(name);
            }
            Event::Empty(start) => {
                if open_elements.is_empty() {
                    if seen_root {
                        return Err(malformed("multiple root elements"));
                    }
                    seen_root = true;
                }
                if start.local_name().as_ref() == STRING_TAG {
                    strings.push(String::new());
                }
            }
            Event::End(end) => {
                let name = end.local_name().as_ref().to_vec();
                match open_elements.pop() {
                    Some(open) if open == name => {}
                    _ => return Err(malformed("unexpected closing tag")),
                }
                if name == STRING_TAG {
                    open_strings.pop();
                }
            }
            Event::Text(text) => {
                let content = std::str::from_utf8(&text)
                    .map_err(|_| malformed("text is not valid UTF-8"))?;
                let content = normalize_line_endings(content);
                push_text(&mut strings, &open_strings, &open_elements, &content)?;
            }
            Event::CData(cdata) => {
                if open_elements.is_empty() {
                    return Err(malformed("CDATA outside the root element"));
                }
                let content = std::str::from_utf8(&cdata)
                    .map_err(|_| malformed("CDATA is not valid UTF-8"))?;
                append(&mut strings, &open_strings, &normalize_line_endings(content));
            }
            Event::GeneralRef(reference) => {
                let name = std::str::from_utf8(&reference)
                    .map_err(|_| malformed("entity name is not valid UTF-8"))?;
                let resolved = resolve_entity(name)?;
                push_text(&mut strings, &open_strings, &open_elements, &resolved)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if !open_elements.is_empty() {
        return Err(malformed("unclosed element at end of document"));
    }
    if !seen_root {
        return Err(malformed("no root element"));
    }

    Ok(strings)
}

/// Map the ordered `<string>` values onto forecast fields.
pub fn map_fields(strings: &[String]) -> Result<Forecast, ParseFailure> {
    let got = strings.len();

    let need = FIELD_INDEX.mandatory_len();
    if got < need {
        return Err(ParseFailure::InsufficientFields { got, need });
    }

    let need = FIELD_INDEX.tomorrow_len();
    if got < need {
        return Err(ParseFailure::MissingForecastDay {
            day: "tomorrow",
            got,
            need,
        });
    }

    let pair = |(a, b): (usize, usize)| format!("{} {}", strings[a], strings[b]);

    let day_after_tomorrow = if got >= FIELD_INDEX.day_after_tomorrow_len() {
        pair(FIELD_INDEX.day_after_tomorrow)
    } else {
        tracing::debug!(got, "Response has no day-after-tomorrow entries");
        NO_DATA.to_string()
    };

    let forecast = Forecast {
        city: strings[FIELD_INDEX.city].clone(),
        updated_at: strings[FIELD_INDEX.updated_at].clone(),
        temperature: strings[FIELD_INDEX.temperature].clone(),
        condition: strings[FIELD_INDEX.condition].clone(),
        wind: strings[FIELD_INDEX.wind].clone(),
        icon_file_name: strings[FIELD_INDEX.icon_file_name].clone(),
        tomorrow: pair(FIELD_INDEX.tomorrow),
        day_after_tomorrow,
    };
    forecast.check_mandatory()?;
    Ok(forecast)
}

fn malformed(detail: &str) -> ParseFailure {
    ParseFailure::MalformedXml(detail.to_string())
}

fn push_text(
    strings: &mut [String],
    open_strings: &[usize],
    open_elements: &[Vec<u8>],
    content: &str,
) -> Result<(), ParseFailure> {
    if open_elements.is_empty() {
        if content.trim().is_empty() {
            return Ok(());
        }
        return Err(malformed("text outside the root element"));
    }
    append(strings, open_strings, content);
    Ok(())
}

fn append(strings: &mut [String], open_strings: &[usize], content: &str) {
    for &index in open_strings {
        strings[index].push_str(content);
    }
}

/// Literal `\r\n` and lone `\r` read as `\n`, as an XML processor reports
/// them. Character references such as `&#13;` are resolved separately and
/// keep their carriage return.
fn normalize_line_endings(content: &str) -> Cow<'_, str> {
    if !content.contains('\r') {
        return Cow::Borrowed(content);
    }
    Cow::Owned(content.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Character references and the five predefined entities. Entities declared
/// in an internal DTD subset are not expanded and fail as undeclared.
fn resolve_entity(name: &str) -> Result<String, ParseFailure> {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => code.parse::<u32>(),
        }
        .map_err(|_| malformed("invalid character reference"))?;

        return char::from_u32(value)
            .map(String::from)
            .ok_or_else(|| malformed("character reference out of range"));
    }

    quick_xml::escape::resolve_predefined_entity(name)
        .map(str::to_string)
        .ok_or_else(|| ParseFailure::MalformedXml(format!("undeclared entity &{};", name)))
}
