//! IPTC IIM codec
//!
//! IIM metadata is a flat sequence of datasets, each introduced by a 0x1C
//! marker byte followed by record number, dataset number and a length field.
//! Lengths up to 32767 use the standard 2-byte form; larger values use the
//! extended form where the 2-byte field has its top bit set and its low bits
//! give the size of the real length field that follows.

use crate::core::error::{MetaError, MetaResult};
use std::io::Write;

/// Dataset marker byte
const IIM_MARKER: u8 = 0x1C;

/// Largest value length encodable in the standard 2-byte form
const STANDARD_LENGTH_MAX: usize = 0x7FFF;

/// One IIM dataset: record number, dataset number, raw value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IptcDataset {
    pub record: u8,
    pub tag: u8,
    pub value: Vec<u8>,
}

impl IptcDataset {
    pub fn new(record: u8, tag: u8, value: Vec<u8>) -> Self {
        Self { record, tag, value }
    }
}

/// IPTC metadata: an ordered list of IIM datasets.
///
/// Repeatable datasets are legal in IIM, so this is a list rather than a
/// map and insertion order is preserved through encode and decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IptcStore {
    datasets: Vec<IptcDataset>,
}

impl IptcStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn clear(&mut self) {
        self.datasets.clear();
    }

    pub fn push(&mut self, dataset: IptcDataset) {
        self.datasets.push(dataset);
    }

    pub fn datasets(&self) -> &[IptcDataset] {
        &self.datasets
    }

    /// First dataset with the given record and dataset number, if any.
    pub fn get(&self, record: u8, tag: u8) -> Option<&IptcDataset> {
        self.datasets
            .iter()
            .find(|d| d.record == record && d.tag == tag)
    }
}

/// Codec between IIM bytes and an [`IptcStore`].
pub struct IptcCodec;

impl IptcCodec {
    /// Decode an IIM byte sequence.
    ///
    /// Trailing NUL padding after the last dataset is tolerated; any other
    /// stray byte at a dataset boundary is a decode failure.
    pub fn decode(data: &[u8]) -> MetaResult<IptcStore> {
        let mut store = IptcStore::new();
        let mut at = 0usize;

        while at < data.len() {
            if data[at] != IIM_MARKER {
                if data[at..].iter().all(|&b| b == 0) {
                    break; // writers pad the block with NULs
                }
                return Err(MetaError::CorruptedMetadata);
            }
            if at + 5 > data.len() {
                return Err(MetaError::CorruptedMetadata);
            }
            let record = data[at + 1];
            let tag = data[at + 2];
            let length_field = u16::from_be_bytes([data[at + 3], data[at + 4]]) as usize;
            at += 5;

            let value_len = if length_field & 0x8000 != 0 {
                // Extended form: the low bits give the octet count of the
                // actual length field.
                let length_octets = length_field & 0x7FFF;
                if length_octets == 0 || length_octets > 4 || at + length_octets > data.len() {
                    return Err(MetaError::CorruptedMetadata);
                }
                let mut value_len = 0usize;
                for &b in &data[at..at + length_octets] {
                    value_len = (value_len << 8) | b as usize;
                }
                at += length_octets;
                value_len
            } else {
                length_field
            };

            let end = at
                .checked_add(value_len)
                .ok_or(MetaError::CorruptedMetadata)?;
            if end > data.len() {
                return Err(MetaError::CorruptedMetadata);
            }
            store.push(IptcDataset::new(record, tag, data[at..end].to_vec()));
            at = end;
        }
        Ok(store)
    }

    /// Encode a store as IIM bytes, shortest legal length form per dataset.
    pub fn encode(store: &IptcStore) -> Vec<u8> {
        let mut out = Vec::new();
        for dataset in store.datasets() {
            out.push(IIM_MARKER);
            out.push(dataset.record);
            out.push(dataset.tag);
            if dataset.value.len() <= STANDARD_LENGTH_MAX {
                out.extend_from_slice(&(dataset.value.len() as u16).to_be_bytes());
            } else {
                out.extend_from_slice(&0x8004u16.to_be_bytes());
                out.extend_from_slice(&(dataset.value.len() as u32).to_be_bytes());
            }
            out.extend_from_slice(&dataset.value);
        }
        out
    }
}

/// Print a human-readable tabulation of an IIM byte sequence.
pub fn print_iptc_structure<W: Write>(data: &[u8], out: &mut W, depth: usize) -> MetaResult<()> {
    let indent = "  ".repeat(depth);
    let store = match IptcCodec::decode(data) {
        Ok(store) => store,
        Err(_) => {
            writeln!(out, "{indent}(undecodable IPTC block)")?;
            return Ok(());
        }
    };
    writeln!(out, "{indent}record:dataset | length | value")?;
    for dataset in store.datasets() {
        let preview: String = dataset
            .value
            .iter()
            .take(32)
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        writeln!(
            out,
            "{indent}       {:3}:{:<3} | {:>6} | {}",
            dataset.record,
            dataset.tag,
            dataset.value.len(),
            preview,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> IptcStore {
        let mut store = IptcStore::new();
        store.push(IptcDataset::new(2, 5, b"object name".to_vec()));
        store.push(IptcDataset::new(2, 120, b"a caption".to_vec()));
        store.push(IptcDataset::new(2, 25, b"keyword-a".to_vec()));
        store.push(IptcDataset::new(2, 25, b"keyword-b".to_vec()));
        store
    }

    #[test]
    fn test_round_trip() {
        let store = sample_store();
        let bytes = IptcCodec::encode(&store);
        assert_eq!(IptcCodec::decode(&bytes).unwrap(), store);
    }

    #[test]
    fn test_extended_length_round_trip() {
        let mut store = IptcStore::new();
        store.push(IptcDataset::new(2, 120, vec![b'x'; STANDARD_LENGTH_MAX + 1]));
        let bytes = IptcCodec::encode(&store);
        // 0x8004 marker, then a 4-byte length.
        assert_eq!(&bytes[3..5], &[0x80, 0x04]);
        assert_eq!(IptcCodec::decode(&bytes).unwrap(), store);
    }

    #[test]
    fn test_trailing_padding_tolerated() {
        let mut bytes = IptcCodec::encode(&sample_store());
        bytes.extend_from_slice(&[0, 0, 0]);
        assert_eq!(IptcCodec::decode(&bytes).unwrap(), sample_store());
    }

    #[test]
    fn test_stray_byte_rejected() {
        let mut bytes = IptcCodec::encode(&sample_store());
        bytes.push(0x42);
        assert!(matches!(
            IptcCodec::decode(&bytes),
            Err(MetaError::CorruptedMetadata)
        ));
    }

    #[test]
    fn test_truncated_value_rejected() {
        // Declares 10 value bytes, provides 2.
        let bytes = [IIM_MARKER, 2, 5, 0x00, 0x0A, b'h', b'i'];
        assert!(matches!(
            IptcCodec::decode(&bytes),
            Err(MetaError::CorruptedMetadata)
        ));
    }

    #[test]
    fn test_repeated_datasets_preserved() {
        let store = sample_store();
        let decoded = IptcCodec::decode(&IptcCodec::encode(&store)).unwrap();
        let keywords: Vec<_> = decoded
            .datasets()
            .iter()
            .filter(|d| d.record == 2 && d.tag == 25)
            .collect();
        assert_eq!(keywords.len(), 2);
    }

    #[test]
    fn test_print_structure() {
        let bytes = IptcCodec::encode(&sample_store());
        let mut out = Vec::new();
        print_iptc_structure(&bytes, &mut out, 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("2:120"));
        assert!(text.contains("a caption"));
    }
}
