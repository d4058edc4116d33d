//! PIDF XML parsing
//!
//! Maps a `application/pidf+xml` NOTIFY body onto the snapshot model:
//!
//! - each `<tuple id="X">` becomes one device entry keyed by `X`, even
//!   when its `<status/>` is empty
//! - `<status><basic>` maps to the basic status; other `<status>`
//!   children become status extensions on the device
//! - `<contact priority="p">uri</contact>` maps priority and contact URI
//! - `<note>` elements become device or top-level notes depending on
//!   where they appear
//! - any unrecognized element is preserved as an opaque extension at the
//!   appropriate level rather than dropped
//!
//! Malformed XML is a hard parse error and never yields a partial
//! snapshot.

use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::presence::{BasicStatus, PresenceDeviceInfo, PresenceExtension, PresenceNote, PresenceSnapshot};

/// PIDF parse failure
///
/// The display text always contains the substring `"parsing error"`,
/// which callers record into the subscription error log.
#[derive(Error, Debug)]
pub enum PidfError {
    #[error("presence document parsing error: {0}")]
    Malformed(String),
    #[error("presence document parsing error: body is not valid UTF-8")]
    Encoding,
}

/// Where the cursor currently is in the document
#[derive(Debug, Clone, Copy, PartialEq)]
enum Ctx {
    Prolog,
    Presence,
    Tuple,
    Status,
}

/// Parse a PIDF body into a fresh [`PresenceSnapshot`]
pub fn parse(body: &[u8]) -> Result<PresenceSnapshot, PidfError> {
    let xml = std::str::from_utf8(body).map_err(|_| PidfError::Encoding)?;
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut snapshot = PresenceSnapshot::new();
    let mut ctx = Ctx::Prolog;
    let mut tuple: Option<PresenceDeviceInfo> = None;
    let mut document_closed = false;

    loop {
        match reader.read_event() {
            Err(e) => return Err(PidfError::Malformed(e.to_string())),
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::PI(_))
            | Ok(Event::DocType(_)) | Ok(Event::CData(_)) => {}
            Ok(Event::Text(_)) => {
                // Stray character data between elements is ignored.
            }
            Ok(Event::Start(e)) => {
                handle_element(&mut reader, &e, false, &mut ctx, &mut snapshot, &mut tuple)?;
            }
            Ok(Event::Empty(e)) => {
                handle_element(&mut reader, &e, true, &mut ctx, &mut snapshot, &mut tuple)?;
            }
            Ok(Event::End(e)) => match (ctx, e.name().as_ref()) {
                (Ctx::Status, b"status") => ctx = Ctx::Tuple,
                (Ctx::Tuple, b"tuple") => {
                    if let Some(device) = tuple.take() {
                        snapshot.devices.insert(device.tuple_id.clone(), device);
                    }
                    ctx = Ctx::Presence;
                }
                (Ctx::Presence, b"presence") => {
                    ctx = Ctx::Prolog;
                    document_closed = true;
                }
                (_, name) => {
                    return Err(PidfError::Malformed(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(name)
                    )));
                }
            },
            Ok(Event::Eof) => {
                if ctx != Ctx::Prolog || !document_closed {
                    return Err(PidfError::Malformed(
                        "unexpected end of document".to_string(),
                    ));
                }
                break;
            }
        }
    }

    Ok(snapshot)
}

fn handle_element<'a>(
    reader: &mut Reader<&'a [u8]>,
    element: &BytesStart<'a>,
    empty: bool,
    ctx: &mut Ctx,
    snapshot: &mut PresenceSnapshot,
    tuple: &mut Option<PresenceDeviceInfo>,
) -> Result<(), PidfError> {
    let name = element.name().as_ref().to_vec();

    match (*ctx, name.as_slice()) {
        (Ctx::Prolog, b"presence") => {
            if empty {
                // An empty <presence/> is a complete, deviceless document.
                return Ok(());
            }
            *ctx = Ctx::Presence;
        }
        (Ctx::Prolog, other) => {
            return Err(PidfError::Malformed(format!(
                "root element is <{}>, expected <presence>",
                String::from_utf8_lossy(other)
            )));
        }

        (Ctx::Presence, b"tuple") => {
            let id = attribute(element, b"id")?.ok_or_else(|| {
                PidfError::Malformed("tuple element without id attribute".to_string())
            })?;
            let device = PresenceDeviceInfo::new(id);
            if empty {
                snapshot.devices.insert(device.tuple_id.clone(), device);
            } else {
                *tuple = Some(device);
                *ctx = Ctx::Tuple;
            }
        }
        (Ctx::Presence, b"note") => {
            let note = read_note(reader, element, empty)?;
            snapshot.notes.push(note);
        }
        (Ctx::Presence, _) => {
            let extension = read_extension(reader, element, empty, &name)?;
            snapshot.extensions.push(extension);
        }

        (Ctx::Tuple, b"status") => {
            // An empty <status/> still leaves the device entry in place
            // with a null basic status.
            if !empty {
                *ctx = Ctx::Status;
            }
        }
        (Ctx::Tuple, b"contact") => {
            let device = tuple.as_mut().ok_or_else(|| {
                PidfError::Malformed("contact outside of tuple".to_string())
            })?;
            if let Some(priority) = attribute(element, b"priority")? {
                device.contact_priority = f64::from_str(&priority).map_err(|_| {
                    PidfError::Malformed(format!("invalid contact priority: {}", priority))
                })?;
            }
            if !empty {
                let uri = read_text(reader, element)?;
                if !uri.is_empty() {
                    device.contact = Some(uri);
                }
            }
        }
        (Ctx::Tuple, b"note") => {
            let note = read_note(reader, element, empty)?;
            if let Some(device) = tuple.as_mut() {
                device.notes.push(note);
            }
        }
        (Ctx::Tuple, b"timestamp") => {
            let text = if empty {
                String::new()
            } else {
                read_text(reader, element)?
            };
            if let Some(device) = tuple.as_mut() {
                // Unparseable timestamps are tolerated and left unset.
                device.timestamp = chrono::DateTime::parse_from_rfc3339(&text)
                    .ok()
                    .map(|t| t.with_timezone(&chrono::Utc));
            }
        }
        (Ctx::Tuple, _) => {
            let extension = read_extension(reader, element, empty, &name)?;
            if let Some(device) = tuple.as_mut() {
                device.extensions.push(extension);
            }
        }

        (Ctx::Status, b"basic") => {
            let text = if empty {
                String::new()
            } else {
                read_text(reader, element)?
            };
            let status = BasicStatus::from_str(&text)
                .map_err(|_| PidfError::Malformed(format!("invalid basic status: {}", text)))?;
            if let Some(device) = tuple.as_mut() {
                device.basic_status = Some(status);
            }
        }
        (Ctx::Status, _) => {
            let extension = read_extension(reader, element, empty, &name)?;
            if let Some(device) = tuple.as_mut() {
                device.extensions.push(extension);
            }
        }
    }

    Ok(())
}

/// Read an attribute value from an element
fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, PidfError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| PidfError::Malformed(e.to_string()))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| PidfError::Malformed(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Read the text content of the current element, consuming its end tag
fn read_text<'a>(
    reader: &mut Reader<&'a [u8]>,
    element: &BytesStart<'a>,
) -> Result<String, PidfError> {
    reader
        .read_text(element.name())
        .map(|text| text.trim().to_string())
        .map_err(|e| PidfError::Malformed(e.to_string()))
}

fn read_note<'a>(
    reader: &mut Reader<&'a [u8]>,
    element: &BytesStart<'a>,
    empty: bool,
) -> Result<PresenceNote, PidfError> {
    let lang = attribute(element, b"xml:lang")?;
    let value = if empty {
        String::new()
    } else {
        read_text(reader, element)?
    };
    Ok(PresenceNote::new(value, lang))
}

fn read_extension<'a>(
    reader: &mut Reader<&'a [u8]>,
    element: &BytesStart<'a>,
    empty: bool,
    name: &[u8],
) -> Result<PresenceExtension, PidfError> {
    let content = if empty {
        String::new()
    } else {
        read_text(reader, element)?
    };
    Ok(PresenceExtension::new(
        String::from_utf8_lossy(name).into_owned(),
        content,
    ))
}
