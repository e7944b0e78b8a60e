//! XMP rating inside the APP1 packet
//!
//! The rating is `xmp:Rating` on an `rdf:Description`, either as an attribute
//! or as a child element. Rewriting streams the packet through quick-xml and
//! only touches rating attributes/elements; everything else is copied as is.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::warn;

use super::CodecError;

/// APP1 signature of an XMP packet
pub const SIGNATURE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

const XMP_NS: &str = "http://ns.adobe.com/xap/1.0/";
const RDF_DESCRIPTION: &[u8] = b"rdf:Description";
const RDF_RDF: &[u8] = b"rdf:RDF";

fn is_rating(name: &[u8]) -> bool {
    name == b"xmp:Rating" || name == b"xap:Rating"
}

fn xml_error(e: impl std::fmt::Display) -> CodecError {
    CodecError::Xml(e.to_string())
}

/// Native rating, `None` when absent or rejected (negative).
fn parse_rating(raw: &[u8]) -> Option<u32> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(value) if value >= 0.0 => Some(value.round() as u32),
        Ok(_) => None,
        Err(_) => {
            warn!("Ignoring malformed xmp:Rating {text:?}");
            None
        }
    }
}

pub fn read_rating(packet: &[u8]) -> Result<Option<u32>, CodecError> {
    let text = std::str::from_utf8(packet).map_err(xml_error)?;
    let mut reader = Reader::from_str(text);
    let mut in_rating = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(ref e) | Event::Empty(ref e) if e.name().as_ref() == RDF_DESCRIPTION => {
                for attr in e.attributes().flatten() {
                    if is_rating(attr.key.as_ref()) {
                        return Ok(parse_rating(&attr.value));
                    }
                }
            }
            Event::Start(ref e) if is_rating(e.name().as_ref()) => in_rating = true,
            Event::Text(ref e) if in_rating => return Ok(parse_rating(e.as_ref())),
            Event::End(ref e) if is_rating(e.name().as_ref()) => in_rating = false,
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Copy of `e` without rating attributes, carrying `rating` if given.
fn rewrite_description(e: &BytesStart<'_>, rating: Option<u32>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut has_ns = false;
    for attr in e.attributes().flatten() {
        if is_rating(attr.key.as_ref()) {
            continue;
        }
        has_ns |= attr.key.as_ref() == b"xmlns:xmp";
        out.push_attribute(attr);
    }
    if let Some(rating) = rating {
        if !has_ns {
            out.push_attribute(("xmlns:xmp", XMP_NS));
        }
        out.push_attribute(("xmp:Rating", rating.to_string().as_str()));
    }
    out
}

/// Fresh packet holding only a rating
pub fn new_packet(rating: u32) -> Vec<u8> {
    format!(
        concat!(
            "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>",
            "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">",
            "<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">",
            "<rdf:Description rdf:about=\"\" xmlns:xmp=\"{ns}\" xmp:Rating=\"{rating}\"/>",
            "</rdf:RDF>",
            "</x:xmpmeta>",
            "<?xpacket end=\"w\"?>"
        ),
        ns = XMP_NS,
        rating = rating
    )
    .into_bytes()
}

/// Packet with its rating replaced by `rating` (or removed with `None`).
///
/// Returns `None` when there is no packet and nothing to store.
pub fn write_rating(packet: Option<&[u8]>, rating: Option<u32>) -> Result<Option<Vec<u8>>, CodecError> {
    let Some(packet) = packet else {
        return Ok(rating.map(new_packet));
    };

    let text = std::str::from_utf8(packet).map_err(xml_error)?;
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Vec::with_capacity(packet.len() + 64));
    let mut pending = rating;
    let mut skip_depth = 0usize;

    loop {
        let event = reader.read_event().map_err(xml_error)?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => return Err(CodecError::Xml("unclosed xmp:Rating".to_string())),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(ref e) if is_rating(e.name().as_ref()) => skip_depth = 1,
            Event::Empty(ref e) if is_rating(e.name().as_ref()) => {}
            Event::Start(ref e) if e.name().as_ref() == RDF_DESCRIPTION => {
                let out = rewrite_description(e, pending.take());
                writer.write_event(Event::Start(out)).map_err(xml_error)?;
            }
            Event::Empty(ref e) if e.name().as_ref() == RDF_DESCRIPTION => {
                let out = rewrite_description(e, pending.take());
                writer.write_event(Event::Empty(out)).map_err(xml_error)?;
            }
            Event::End(ref e) if e.name().as_ref() == RDF_RDF && pending.is_some() => {
                let description = BytesStart::new("rdf:Description").with_attributes([("rdf:about", "")]);
                let out = rewrite_description(&description, pending.take());
                writer.write_event(Event::Empty(out)).map_err(xml_error)?;
                writer.write_event(Event::End(e.clone())).map_err(xml_error)?;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(xml_error)?,
        }
    }

    if pending.is_some() {
        return Err(CodecError::Xml("XMP packet has no rdf:RDF element".to_string()));
    }
    Ok(Some(writer.into_inner()))
}
