//! IPTC keywords inside the Photoshop APP13 segment
//!
//! APP13 holds a list of `8BIM` image resources; resource 0x0404 is an IPTC
//! IIM stream of datasets `0x1C record number length value`. Keywords are the
//! repeatable dataset 2:25. Every other resource and dataset is preserved.
//!
//! Text is UTF-8 when the envelope dataset 1:90 says `ESC % G` and Latin-1
//! otherwise, including when 1:90 is missing.

use neposync_common::TagSet;

use super::CodecError;

/// APP13 signature of a Photoshop image resource block
pub const SIGNATURE: &[u8] = b"Photoshop 3.0\0";

const RESOURCE_TYPE: &[u8; 4] = b"8BIM";
const IPTC_RESOURCE: u16 = 0x0404;
const TAG_MARKER: u8 = 0x1C;

const ENVELOPE: u8 = 1;
const APPLICATION: u8 = 2;
const CODED_CHARSET: u8 = 90;
const RECORD_VERSION: u8 = 0;
const KEYWORDS: u8 = 25;
/// ESC % G, UTF-8
const UTF8_CHARSET: &[u8] = b"\x1b%G";
/// Widest extended length field accepted (bytes)
const MAX_LENGTH_FIELD: usize = 4;
/// Binary application datasets: record version and rasterized caption
const BINARY_DATASETS: [u8; 2] = [RECORD_VERSION, 125];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Utf8,
    Latin1,
}

impl Charset {
    fn of(datasets: &[DataSet]) -> Self {
        match datasets.iter().find(|d| d.record == ENVELOPE && d.number == CODED_CHARSET) {
            Some(d) if d.value == UTF8_CHARSET => Charset::Utf8,
            _ => Charset::Latin1,
        }
    }

    fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }

    /// `None` when `text` has characters outside this charset
    fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Charset::Utf8 => Some(text.as_bytes().to_vec()),
            Charset::Latin1 => text.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Resource {
    id: u16,
    /// Pascal string bytes including the length byte, without padding
    name: Vec<u8>,
    data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DataSet {
    record: u8,
    number: u8,
    value: Vec<u8>,
}

fn read_u16(bytes: &[u8], pos: usize) -> Result<u16, CodecError> {
    let b = bytes.get(pos..pos + 2).ok_or(CodecError::Truncated)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], pos: usize) -> Result<u32, CodecError> {
    let b = bytes.get(pos..pos + 4).ok_or(CodecError::Truncated)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn parse_resources(payload: &[u8]) -> Result<Vec<Resource>, CodecError> {
    let mut resources = Vec::new();
    let mut pos = 0;
    // Trailing zero padding after the last resource is common
    while payload.get(pos..pos + 4) == Some(RESOURCE_TYPE.as_slice()) {
        let id = read_u16(payload, pos + 4)?;
        pos += 6;

        let name_len = usize::from(*payload.get(pos).ok_or(CodecError::Truncated)?);
        let name = payload.get(pos..pos + 1 + name_len).ok_or(CodecError::Truncated)?.to_vec();
        pos += (1 + name_len + 1) & !1;

        let size = read_u32(payload, pos)? as usize;
        pos += 4;
        let data = payload.get(pos..pos + size).ok_or(CodecError::Truncated)?.to_vec();
        pos += (size + 1) & !1;

        resources.push(Resource { id, name, data });
    }
    Ok(resources)
}

fn serialize_resources(resources: &[Resource]) -> Vec<u8> {
    let mut out = Vec::new();
    for resource in resources {
        out.extend_from_slice(RESOURCE_TYPE);
        out.extend_from_slice(&resource.id.to_be_bytes());
        out.extend_from_slice(&resource.name);
        if resource.name.len() % 2 == 1 {
            out.push(0);
        }
        out.extend_from_slice(&(resource.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&resource.data);
        if resource.data.len() % 2 == 1 {
            out.push(0);
        }
    }
    out
}

fn parse_datasets(data: &[u8]) -> Result<Vec<DataSet>, CodecError> {
    let mut datasets = Vec::new();
    let mut pos = 0;
    while data.get(pos) == Some(&TAG_MARKER) {
        let header = data.get(pos + 1..pos + 5).ok_or(CodecError::Truncated)?;
        let (record, number) = (header[0], header[1]);
        let mut len = usize::from(u16::from_be_bytes([header[2], header[3]]));
        pos += 5;

        // Extended dataset: low 15 bits give the size of the length field
        if len & 0x8000 != 0 {
            let width = len & 0x7FFF;
            if width > MAX_LENGTH_FIELD {
                return Err(CodecError::LengthField(width));
            }
            let field = data.get(pos..pos + width).ok_or(CodecError::Truncated)?;
            len = field.iter().fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
            pos += width;
        }

        let end = pos.checked_add(len).ok_or(CodecError::Truncated)?;
        let value = data.get(pos..end).ok_or(CodecError::Truncated)?.to_vec();
        pos = end;
        datasets.push(DataSet { record, number, value });
    }
    Ok(datasets)
}

fn serialize_datasets(datasets: &[DataSet]) -> Vec<u8> {
    let mut out = Vec::new();
    for dataset in datasets {
        out.extend_from_slice(&[TAG_MARKER, dataset.record, dataset.number]);
        if dataset.value.len() < 0x8000 {
            out.extend_from_slice(&(dataset.value.len() as u16).to_be_bytes());
        } else {
            out.extend_from_slice(&0x8004u16.to_be_bytes());
            out.extend_from_slice(&(dataset.value.len() as u32).to_be_bytes());
        }
        out.extend_from_slice(&dataset.value);
    }
    out
}

/// Keywords from an APP13 payload (signature stripped).
///
/// `None` when the payload carries no IPTC resource.
pub fn read_keywords(payload: &[u8]) -> Result<Option<TagSet>, CodecError> {
    let resources = parse_resources(payload)?;
    let Some(iptc) = resources.iter().find(|r| r.id == IPTC_RESOURCE) else {
        return Ok(None);
    };
    let datasets = parse_datasets(&iptc.data)?;
    let charset = Charset::of(&datasets);
    let keywords = datasets
        .iter()
        .filter(|d| d.record == APPLICATION && d.number == KEYWORDS)
        .map(|d| charset.decode(&d.value))
        .collect();
    Ok(Some(keywords))
}

/// APP13 payload (signature stripped) with its keywords replaced.
///
/// Creates the resource block, the IPTC resource and the envelope character
/// set as needed.
pub fn write_keywords(payload: Option<&[u8]>, keywords: &TagSet) -> Result<Vec<u8>, CodecError> {
    let mut resources = match payload {
        Some(payload) => parse_resources(payload)?,
        None => Vec::new(),
    };

    let index = match resources.iter().position(|r| r.id == IPTC_RESOURCE) {
        Some(index) => index,
        None => {
            resources.push(Resource {
                id: IPTC_RESOURCE,
                name: vec![0],
                data: Vec::new(),
            });
            resources.len() - 1
        }
    };

    let mut datasets = parse_datasets(&resources[index].data)?;
    let charset = keyword_charset(&mut datasets, keywords);

    if !datasets.iter().any(|d| d.record == APPLICATION && d.number == RECORD_VERSION) {
        let at = datasets.iter().take_while(|d| d.record < APPLICATION).count();
        datasets.insert(
            at,
            DataSet {
                record: APPLICATION,
                number: RECORD_VERSION,
                value: vec![0x00, 0x04],
            },
        );
    }

    // Keywords go where the old ones were, else in dataset number order
    let at = datasets
        .iter()
        .position(|d| d.record == APPLICATION && d.number == KEYWORDS)
        .unwrap_or_else(|| {
            datasets
                .iter()
                .take_while(|d| d.record < APPLICATION || (d.record == APPLICATION && d.number < KEYWORDS))
                .count()
        });
    datasets.retain(|d| !(d.record == APPLICATION && d.number == KEYWORDS));
    let new_keywords = keywords.iter().map(|k| DataSet {
        record: APPLICATION,
        number: KEYWORDS,
        // keyword_charset only picks Latin-1 when every keyword fits
        value: charset.encode(k).unwrap_or_default(),
    });
    let tail = datasets.split_off(at);
    datasets.extend(new_keywords);
    datasets.extend(tail);

    resources[index].data = serialize_datasets(&datasets);
    Ok(serialize_resources(&resources))
}

/// Charset to write `keywords` in, switching the block to UTF-8 if needed.
///
/// A Latin-1 block stays Latin-1 while the keywords fit. Otherwise its text
/// datasets are transcoded and 1:90 is set to UTF-8. A block without any
/// datasets starts out as UTF-8.
fn keyword_charset(datasets: &mut Vec<DataSet>, keywords: &TagSet) -> Charset {
    if datasets.is_empty() {
        set_utf8_marker(datasets);
        return Charset::Utf8;
    }
    let current = Charset::of(datasets);
    if current == Charset::Utf8 || keywords.iter().all(|k| current.encode(k).is_some()) {
        return current;
    }

    for dataset in datasets.iter_mut() {
        if dataset.record == APPLICATION && !BINARY_DATASETS.contains(&dataset.number) {
            dataset.value = current.decode(&dataset.value).into_bytes();
        }
    }
    set_utf8_marker(datasets);
    Charset::Utf8
}

fn set_utf8_marker(datasets: &mut Vec<DataSet>) {
    if let Some(marker) = datasets
        .iter_mut()
        .find(|d| d.record == ENVELOPE && d.number == CODED_CHARSET)
    {
        marker.value = UTF8_CHARSET.to_vec();
        return;
    }
    let at = datasets.iter().take_while(|d| d.record <= ENVELOPE).count();
    datasets.insert(
        at,
        DataSet {
            record: ENVELOPE,
            number: CODED_CHARSET,
            value: UTF8_CHARSET.to_vec(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(labels: &[&str]) -> TagSet {
        labels.iter().copied().collect()
    }

    #[test]
    fn fresh_block_round_trips_keywords() {
        let payload = write_keywords(None, &tags(&["sea", "beach"])).unwrap();
        assert_eq!(read_keywords(&payload).unwrap(), Some(tags(&["beach", "sea"])));
    }

    #[test]
    fn block_without_iptc_has_no_keywords() {
        let other = serialize_resources(&[Resource {
            id: 0x03ED,
            name: vec![0],
            data: vec![1, 2, 3],
        }]);
        assert_eq!(read_keywords(&other).unwrap(), None);
    }

    #[test]
    fn empty_keyword_list_is_present_but_empty() {
        let payload = write_keywords(None, &TagSet::new()).unwrap();
        assert_eq!(read_keywords(&payload).unwrap(), Some(TagSet::new()));
    }

    #[test]
    fn other_resources_and_datasets_survive() {
        let caption = DataSet {
            record: APPLICATION,
            number: 120,
            value: b"A day at the beach".to_vec(),
        };
        let byline = DataSet {
            record: APPLICATION,
            number: 80,
            value: b"Someone".to_vec(),
        };
        let old_keyword = DataSet {
            record: APPLICATION,
            number: KEYWORDS,
            value: b"old".to_vec(),
        };
        let resources = vec![
            Resource {
                id: 0x03ED,
                name: vec![3, b'a', b'b', b'c'],
                data: vec![9; 5],
            },
            Resource {
                id: IPTC_RESOURCE,
                name: vec![0],
                data: serialize_datasets(&[old_keyword, byline.clone(), caption.clone()]),
            },
        ];
        let payload = serialize_resources(&resources);

        let rewritten = write_keywords(Some(&payload), &tags(&["new", "newer"])).unwrap();
        assert_eq!(read_keywords(&rewritten).unwrap(), Some(tags(&["new", "newer"])));

        let parsed = parse_resources(&rewritten).unwrap();
        assert_eq!(parsed[0], resources[0]);
        let datasets = parse_datasets(&parsed[1].data).unwrap();
        assert!(datasets.contains(&byline));
        assert!(datasets.contains(&caption));
        let numbers: Vec<_> = datasets
            .iter()
            .filter(|d| d.record == APPLICATION)
            .map(|d| d.number)
            .collect();
        assert_eq!(numbers, vec![RECORD_VERSION, KEYWORDS, KEYWORDS, 80, 120]);
    }

    #[test]
    fn extended_length_datasets_are_read() {
        let mut data = vec![TAG_MARKER, APPLICATION, KEYWORDS, 0x80, 0x02, 0x00, 0x03];
        data.extend_from_slice(b"big");
        let datasets = parse_datasets(&data).unwrap();
        assert_eq!(datasets[0].value, b"big");
    }

    #[test]
    fn truncated_dataset_is_an_error() {
        let data = [TAG_MARKER, APPLICATION, KEYWORDS, 0x00, 0x09, b'x'];
        assert!(matches!(parse_datasets(&data), Err(CodecError::Truncated)));
    }

    #[test]
    fn keyword_whitespace_is_kept() {
        let payload = write_keywords(None, &tags(&["beach ", " sea"])).unwrap();
        assert_eq!(read_keywords(&payload).unwrap(), Some(tags(&["beach ", " sea"])));
    }

    fn latin1_block() -> (Vec<u8>, DataSet) {
        // "Café" and "Crème brûlée" in ISO 8859-1, no 1:90 dataset
        let caption = DataSet {
            record: APPLICATION,
            number: 120,
            value: b"Cr\xe8me br\xfbl\xe9e".to_vec(),
        };
        let keyword = DataSet {
            record: APPLICATION,
            number: KEYWORDS,
            value: b"Caf\xe9".to_vec(),
        };
        let payload = serialize_resources(&[Resource {
            id: IPTC_RESOURCE,
            name: vec![0],
            data: serialize_datasets(&[keyword, caption.clone()]),
        }]);
        (payload, caption)
    }

    #[test]
    fn block_without_charset_reads_as_latin1() {
        let (payload, _) = latin1_block();
        assert_eq!(read_keywords(&payload).unwrap(), Some(tags(&["Café"])));
    }

    #[test]
    fn latin1_block_stays_latin1_when_keywords_fit() {
        let (payload, caption) = latin1_block();
        let rewritten = write_keywords(Some(&payload), &tags(&["Café", "Noël"])).unwrap();
        assert_eq!(read_keywords(&rewritten).unwrap(), Some(tags(&["Café", "Noël"])));

        let datasets = parse_datasets(&parse_resources(&rewritten).unwrap()[0].data).unwrap();
        assert!(!datasets.iter().any(|d| d.record == ENVELOPE && d.number == CODED_CHARSET));
        assert!(datasets.contains(&caption));
        assert!(datasets.iter().any(|d| d.number == KEYWORDS && d.value == b"No\xebl"));
    }

    #[test]
    fn latin1_block_is_transcoded_for_wider_keywords() {
        let (payload, _) = latin1_block();
        let rewritten = write_keywords(Some(&payload), &tags(&["Café", "東京"])).unwrap();
        assert_eq!(read_keywords(&rewritten).unwrap(), Some(tags(&["Café", "東京"])));

        let datasets = parse_datasets(&parse_resources(&rewritten).unwrap()[0].data).unwrap();
        assert_eq!(Charset::of(&datasets), Charset::Utf8);
        let caption = datasets.iter().find(|d| d.number == 120).unwrap();
        assert_eq!(caption.value, "Crème brûlée".as_bytes());
    }

    #[test]
    fn oversized_length_field_is_rejected() {
        let mut data = vec![TAG_MARKER, APPLICATION, KEYWORDS, 0x80, 0x08];
        data.extend_from_slice(&[0xFF; 8]);
        assert!(matches!(parse_datasets(&data), Err(CodecError::LengthField(8))));
    }

    #[test]
    fn length_past_the_end_is_truncated() {
        let data = [TAG_MARKER, APPLICATION, KEYWORDS, 0x80, 0x04, 0xFF, 0xFF, 0xFF, 0xFF, b'x'];
        assert!(matches!(parse_datasets(&data), Err(CodecError::Truncated)));
    }
}
