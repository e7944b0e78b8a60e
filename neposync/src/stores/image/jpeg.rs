//! JPEG marker-segment container
//!
//! Only the header segments before the first SOS are decoded. Everything from
//! SOS on (entropy-coded data, later markers, EOI) is kept as an opaque tail
//! and written back byte for byte.

use super::CodecError;

pub const APP1: u8 = 0xE1;
pub const APP13: u8 = 0xED;

const SOI: [u8; 2] = [0xFF, 0xD8];
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

/// Largest payload a length-prefixed segment can hold
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub marker: u8,
    /// Payload without the length field
    pub data: Vec<u8>,
}

impl Segment {
    fn is_app(&self) -> bool {
        (0xE0..=0xEF).contains(&self.marker)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegFile {
    segments: Vec<Segment>,
    tail: Vec<u8>,
}

impl JpegFile {
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < 4 || bytes[..2] != SOI {
            return Err(CodecError::NotJpeg);
        }

        let mut segments = Vec::new();
        let mut pos = 2;
        loop {
            if pos >= bytes.len() {
                return Err(CodecError::Truncated);
            }
            if bytes[pos] != 0xFF {
                return Err(CodecError::BadMarker(pos));
            }
            let start = pos;
            // Fill bytes
            while pos < bytes.len() && bytes[pos] == 0xFF {
                pos += 1;
            }
            let Some(&marker) = bytes.get(pos) else {
                return Err(CodecError::Truncated);
            };
            pos += 1;

            match marker {
                SOS | EOI => {
                    return Ok(Self {
                        segments,
                        tail: bytes[start..].to_vec(),
                    });
                }
                0x00 | 0x01 | 0xD0..=0xD7 => return Err(CodecError::BadMarker(start)),
                _ => {
                    let length_bytes = bytes.get(pos..pos + 2).ok_or(CodecError::Truncated)?;
                    let length = usize::from(u16::from_be_bytes([length_bytes[0], length_bytes[1]]));
                    if length < 2 {
                        return Err(CodecError::BadMarker(start));
                    }
                    let data = bytes.get(pos + 2..pos + length).ok_or(CodecError::Truncated)?;
                    segments.push(Segment {
                        marker,
                        data: data.to_vec(),
                    });
                    pos += length;
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let header: usize = self.segments.iter().map(|s| s.data.len() + 4).sum();
        let mut out = Vec::with_capacity(2 + header + self.tail.len());
        out.extend_from_slice(&SOI);
        for segment in &self.segments {
            if segment.data.len() > MAX_SEGMENT_PAYLOAD {
                return Err(CodecError::SegmentTooLarge(segment.data.len()));
            }
            let length = (segment.data.len() + 2) as u16;
            out.extend_from_slice(&[0xFF, segment.marker]);
            out.extend_from_slice(&length.to_be_bytes());
            out.extend_from_slice(&segment.data);
        }
        out.extend_from_slice(&self.tail);
        Ok(out)
    }

    /// Payload after `signature` of the first `marker` segment starting with it
    pub fn app_payload(&self, marker: u8, signature: &[u8]) -> Option<&[u8]> {
        self.segments
            .iter()
            .find(|s| s.marker == marker && s.data.starts_with(signature))
            .map(|s| &s.data[signature.len()..])
    }

    /// Replace, insert or (with `None`) remove the `marker` segment identified
    /// by `signature`.
    ///
    /// New segments go after the leading run of APPn segments.
    pub fn set_app_payload(&mut self, marker: u8, signature: &[u8], payload: Option<Vec<u8>>) {
        let existing = self
            .segments
            .iter()
            .position(|s| s.marker == marker && s.data.starts_with(signature));

        match (existing, payload) {
            (Some(index), Some(payload)) => {
                self.segments[index].data = [signature, payload.as_slice()].concat();
            }
            (Some(index), None) => {
                self.segments.remove(index);
            }
            (None, Some(payload)) => {
                let index = self.segments.iter().take_while(|s| s.is_app()).count();
                self.segments.insert(
                    index,
                    Segment {
                        marker,
                        data: [signature, payload.as_slice()].concat(),
                    },
                );
            }
            (None, None) => {}
        }
    }

    #[cfg(test)]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}
