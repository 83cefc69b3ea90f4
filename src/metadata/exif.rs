//! TIFF-structured Exif codec
//!
//! Exif metadata is a TIFF stream: a byte-order header followed by linked
//! IFDs of 12-byte entries. This module provides the store and the codec
//! used by the JP2 dispatcher:
//! - values are kept as raw component bytes (no interpretation), normalized
//!   to big-endian component order so the store compares and re-encodes
//!   independently of the source byte order
//! - the decoder walks IFD0 and the Exif sub-IFD (tag 0x8769) with bounds
//!   checks on every entry and offset
//! - embedded XMP (tag 700) and IPTC NAA (tag 0x83BB) payloads are routed
//!   into the sibling stores

use crate::core::error::{MetaError, MetaResult};
use crate::metadata::iptc::{IptcCodec, IptcStore};
use crate::metadata::xmp::XmpStore;
use std::io::Write;

/// TIFF file header signatures
const TIFF_SIGNATURE_LE: &[u8] = &[0x49, 0x49, 0x2A, 0x00]; // II/42 (little-endian)
const TIFF_SIGNATURE_BE: &[u8] = &[0x4D, 0x4D, 0x00, 0x2A]; // MM/42 (big-endian)

/// Pointer from IFD0 to the Exif sub-IFD
const TAG_EXIF_IFD: u16 = 0x8769;
/// XMP packet carried inside a TIFF stream
const TAG_XMP: u16 = 700;
/// IPTC IIM block carried inside a TIFF stream
const TAG_IPTC_NAA: u16 = 0x83BB;

/// TIFF data types
const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;
const TYPE_UNDEFINED: u16 = 7;

/// Size of an IFD entry in bytes
const IFD_ENTRY_SIZE: usize = 12;

/// Byte order of a TIFF stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// A single IFD entry with its raw component data.
///
/// `value` always holds the components in big-endian order, regardless of
/// the byte order of the stream the entry was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifTag {
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    pub value: Vec<u8>,
}

impl ExifTag {
    /// An ASCII entry; the NUL terminator is appended if missing.
    pub fn ascii(tag: u16, text: &str) -> Self {
        let mut value = text.as_bytes().to_vec();
        if value.last() != Some(&0) {
            value.push(0);
        }
        Self {
            tag,
            field_type: TYPE_ASCII,
            count: value.len() as u32,
            value,
        }
    }

    /// A single SHORT entry.
    pub fn short(tag: u16, v: u16) -> Self {
        Self {
            tag,
            field_type: TYPE_SHORT,
            count: 1,
            value: v.to_be_bytes().to_vec(),
        }
    }

    /// A single LONG entry.
    pub fn long(tag: u16, v: u32) -> Self {
        Self {
            tag,
            field_type: TYPE_LONG,
            count: 1,
            value: v.to_be_bytes().to_vec(),
        }
    }

    /// An UNDEFINED entry holding opaque bytes.
    pub fn undefined(tag: u16, value: Vec<u8>) -> Self {
        Self {
            tag,
            field_type: TYPE_UNDEFINED,
            count: value.len() as u32,
            value,
        }
    }
}

/// Exif metadata: the entries of IFD0 and of the Exif sub-IFD.
///
/// Entries are kept sorted by tag, the order TIFF mandates on the wire, so
/// a store decoded from a file and the store decoded from its re-encoding
/// always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifStore {
    primary: Vec<ExifTag>,
    exif: Vec<ExifTag>,
}

impl ExifStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.exif.is_empty()
    }

    /// Total number of entries across both IFDs.
    pub fn len(&self) -> usize {
        self.primary.len() + self.exif.len()
    }

    pub fn clear(&mut self) {
        self.primary.clear();
        self.exif.clear();
    }

    /// Entries of IFD0, sorted by tag.
    pub fn primary(&self) -> &[ExifTag] {
        &self.primary
    }

    /// Entries of the Exif sub-IFD, sorted by tag.
    pub fn exif(&self) -> &[ExifTag] {
        &self.exif
    }

    /// Insert or replace an IFD0 entry.
    pub fn set_primary(&mut self, entry: ExifTag) {
        Self::insert_sorted(&mut self.primary, entry);
    }

    /// Insert or replace an Exif sub-IFD entry.
    pub fn set_exif(&mut self, entry: ExifTag) {
        Self::insert_sorted(&mut self.exif, entry);
    }

    pub fn get_primary(&self, tag: u16) -> Option<&ExifTag> {
        self.primary.iter().find(|e| e.tag == tag)
    }

    pub fn get_exif(&self, tag: u16) -> Option<&ExifTag> {
        self.exif.iter().find(|e| e.tag == tag)
    }

    fn insert_sorted(entries: &mut Vec<ExifTag>, entry: ExifTag) {
        match entries.binary_search_by_key(&entry.tag, |e| e.tag) {
            Ok(i) => entries[i] = entry,
            Err(i) => entries.insert(i, entry),
        }
    }
}

/// Codec between a TIFF byte stream and an [`ExifStore`].
pub struct TiffCodec;

impl TiffCodec {
    /// Decode a TIFF stream.
    ///
    /// Returns the detected byte order. Embedded XMP and IPTC payloads are
    /// routed into the sibling stores; a failure to decode those is logged
    /// and ignored, since the TIFF stream itself is still valid.
    pub fn decode(
        exif: &mut ExifStore,
        iptc: &mut IptcStore,
        xmp: &mut XmpStore,
        data: &[u8],
    ) -> MetaResult<ByteOrder> {
        if data.len() < 8 {
            return Err(MetaError::CorruptedMetadata);
        }
        let byte_order = if data[0..4] == *TIFF_SIGNATURE_LE {
            ByteOrder::Little
        } else if data[0..4] == *TIFF_SIGNATURE_BE {
            ByteOrder::Big
        } else {
            return Err(MetaError::CorruptedMetadata);
        };

        exif.clear();
        let ifd0_offset = read_u32(&data[4..8], byte_order) as usize;
        let mut exif_ifd_offset = None;

        for entry in walk_ifd(data, ifd0_offset, byte_order)? {
            match entry.tag {
                TAG_EXIF_IFD => {
                    if entry.count == 1 && entry.field_type == TYPE_LONG && entry.value.len() == 4 {
                        exif_ifd_offset = Some(read_u32(&entry.value, ByteOrder::Big) as usize);
                    }
                }
                TAG_XMP => {
                    if let Err(e) = xmp.set_packet_bytes(&entry.value) {
                        log::warn!("ignoring undecodable XMP packet in TIFF stream: {e}");
                    }
                }
                TAG_IPTC_NAA => match IptcCodec::decode(&entry.value) {
                    Ok(decoded) => *iptc = decoded,
                    Err(e) => log::warn!("ignoring undecodable IPTC block in TIFF stream: {e}"),
                },
                _ => exif.set_primary(entry),
            }
        }

        if let Some(offset) = exif_ifd_offset {
            for entry in walk_ifd(data, offset, byte_order)? {
                exif.set_exif(entry);
            }
        }

        Ok(byte_order)
    }

    /// Encode the store as a TIFF stream in the given byte order.
    ///
    /// Returns an empty vector for an empty store, which callers use to
    /// suppress the surrounding container box entirely.
    pub fn encode(byte_order: ByteOrder, exif: &ExifStore) -> MetaResult<Vec<u8>> {
        if exif.is_empty() {
            return Ok(Vec::new());
        }

        // IFD0 carries the caller's primary entries plus a pointer to the
        // Exif sub-IFD when one is needed. The pointer tag sorts into place
        // like any other entry.
        let mut ifd0: Vec<ExifTag> = exif.primary.clone();
        let has_sub_ifd = !exif.exif.is_empty();
        if has_sub_ifd {
            // Offset patched below, once the IFD0 layout is known.
            let pointer = ExifTag::long(TAG_EXIF_IFD, 0);
            match ifd0.binary_search_by_key(&TAG_EXIF_IFD, |e| e.tag) {
                Ok(i) => ifd0[i] = pointer,
                Err(i) => ifd0.insert(i, pointer),
            }
        }

        let ifd0_size = ifd_size(&ifd0)?;
        let ifd0_data_size = ifd_data_size(&ifd0)?;
        let header_size = 8u64;
        let sub_ifd_offset = header_size + ifd0_size + ifd0_data_size;

        if has_sub_ifd {
            let offset = u32::try_from(sub_ifd_offset).map_err(|_| MetaError::ImageTooLarge)?;
            let entry = ifd0
                .iter_mut()
                .find(|e| e.tag == TAG_EXIF_IFD)
                .ok_or(MetaError::CorruptedMetadata)?;
            entry.value = offset.to_be_bytes().to_vec();
        }

        let mut out = Vec::new();
        match byte_order {
            ByteOrder::Little => out.extend_from_slice(TIFF_SIGNATURE_LE),
            ByteOrder::Big => out.extend_from_slice(TIFF_SIGNATURE_BE),
        }
        out.write_all(&write_u32(8, byte_order))?;

        write_ifd(&mut out, &ifd0, header_size, byte_order)?;
        if has_sub_ifd {
            write_ifd(&mut out, &exif.exif, sub_ifd_offset, byte_order)?;
        }
        Ok(out)
    }
}

/// Parse the entries of one IFD, resolving offset values.
fn walk_ifd(data: &[u8], offset: usize, byte_order: ByteOrder) -> MetaResult<Vec<ExifTag>> {
    let count_end = offset.checked_add(2).ok_or(MetaError::CorruptedMetadata)?;
    if count_end > data.len() {
        return Err(MetaError::CorruptedMetadata);
    }
    let entry_count = read_u16(&data[offset..], byte_order) as usize;

    let entries_end = count_end
        .checked_add(entry_count * IFD_ENTRY_SIZE)
        .and_then(|e| e.checked_add(4)) // next-IFD offset
        .ok_or(MetaError::CorruptedMetadata)?;
    if entries_end > data.len() {
        return Err(MetaError::CorruptedMetadata);
    }

    let mut entries = Vec::with_capacity(entry_count);
    for i in 0..entry_count {
        let at = count_end + i * IFD_ENTRY_SIZE;
        let raw = &data[at..at + IFD_ENTRY_SIZE];
        let tag = read_u16(&raw[0..2], byte_order);
        let field_type = read_u16(&raw[2..4], byte_order);
        let count = read_u32(&raw[4..8], byte_order);

        let data_size = (count as usize)
            .checked_mul(type_size(field_type))
            .ok_or(MetaError::CorruptedMetadata)?;

        let raw_value = if data_size <= 4 {
            &raw[8..8 + data_size]
        } else {
            let value_offset = read_u32(&raw[8..12], byte_order) as usize;
            let end = value_offset
                .checked_add(data_size)
                .ok_or(MetaError::CorruptedMetadata)?;
            if end > data.len() {
                return Err(MetaError::CorruptedMetadata);
            }
            &data[value_offset..end]
        };

        entries.push(ExifTag {
            tag,
            field_type,
            count,
            value: to_canonical(raw_value, field_type, byte_order),
        });
    }
    Ok(entries)
}

/// Serialized size of an IFD: entry count, entries, next-IFD offset.
fn ifd_size(entries: &[ExifTag]) -> MetaResult<u64> {
    Ok(2 + entries.len() as u64 * IFD_ENTRY_SIZE as u64 + 4)
}

/// Total size of the out-of-line values of an IFD.
fn ifd_data_size(entries: &[ExifTag]) -> MetaResult<u64> {
    let mut size = 0u64;
    for entry in entries {
        if entry.value.len() > 4 {
            size = size
                .checked_add(entry.value.len() as u64)
                .ok_or(MetaError::ImageTooLarge)?;
        }
    }
    Ok(size)
}

/// Write one IFD plus its out-of-line value area at `ifd_offset`.
fn write_ifd(
    out: &mut Vec<u8>,
    entries: &[ExifTag],
    ifd_offset: u64,
    byte_order: ByteOrder,
) -> MetaResult<()> {
    out.write_all(&write_u16(entries.len() as u16, byte_order))?;

    let mut value_offset = ifd_offset + ifd_size(entries)?;
    let mut data_area = Vec::new();
    for entry in entries {
        out.write_all(&write_u16(entry.tag, byte_order))?;
        out.write_all(&write_u16(entry.field_type, byte_order))?;
        out.write_all(&write_u32(entry.count, byte_order))?;

        let wire = from_canonical(&entry.value, entry.field_type, byte_order);
        if wire.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..wire.len()].copy_from_slice(&wire);
            out.write_all(&inline)?;
        } else {
            let offset = u32::try_from(value_offset).map_err(|_| MetaError::ImageTooLarge)?;
            out.write_all(&write_u32(offset, byte_order))?;
            value_offset += wire.len() as u64;
            data_area.extend_from_slice(&wire);
        }
    }
    out.write_all(&write_u32(0, byte_order))?; // no next IFD
    out.write_all(&data_area)?;
    Ok(())
}

/// Print a human-readable tabulation of a TIFF stream.
///
/// Used by the recursive structure dump to re-enter the Exif payload of a
/// UUID box.
pub fn print_tiff_structure<W: Write>(data: &[u8], out: &mut W, depth: usize) -> MetaResult<()> {
    let indent = "  ".repeat(depth);
    if data.len() < 8 {
        writeln!(out, "{indent}(truncated TIFF stream)")?;
        return Ok(());
    }
    let byte_order = if data[0..4] == *TIFF_SIGNATURE_LE {
        ByteOrder::Little
    } else if data[0..4] == *TIFF_SIGNATURE_BE {
        ByteOrder::Big
    } else {
        writeln!(out, "{indent}(not a TIFF stream)")?;
        return Ok(());
    };
    let order_name = match byte_order {
        ByteOrder::Little => "II",
        ByteOrder::Big => "MM",
    };
    writeln!(out, "{indent}TIFF {order_name}")?;
    writeln!(out, "{indent}     tag |       type | count | value")?;

    let mut offset = read_u32(&data[4..8], byte_order) as usize;
    // IFD0, then at most one hop into the Exif sub-IFD. The hop bound also
    // stops pointer cycles in hostile input.
    for _ in 0..2 {
        let entries = walk_ifd(data, offset, byte_order)?;
        for entry in &entries {
            writeln!(
                out,
                "{indent}  0x{:04x} | {:>10} | {:>5} | {}",
                entry.tag,
                type_name(entry.field_type),
                entry.count,
                value_preview(entry),
            )?;
        }
        let sub = entries.iter().find(|e| e.tag == TAG_EXIF_IFD);
        match sub {
            Some(entry) if entry.value.len() == 4 => {
                offset = read_u32(&entry.value, ByteOrder::Big) as usize;
            }
            _ => break,
        }
    }
    Ok(())
}

fn value_preview(entry: &ExifTag) -> String {
    if entry.field_type == TYPE_ASCII {
        let text: String = entry
            .value
            .iter()
            .take(32)
            .take_while(|&&b| b != 0)
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        return text;
    }
    let hex: Vec<String> = entry.value.iter().take(16).map(|b| format!("{b:02x}")).collect();
    let mut preview = hex.join(" ");
    if entry.value.len() > 16 {
        preview.push_str(" ...");
    }
    preview
}

fn type_name(field_type: u16) -> &'static str {
    match field_type {
        TYPE_BYTE => "BYTE",
        TYPE_ASCII => "ASCII",
        TYPE_SHORT => "SHORT",
        TYPE_LONG => "LONG",
        TYPE_RATIONAL => "RATIONAL",
        6 => "SBYTE",
        TYPE_UNDEFINED => "UNDEFINED",
        8 => "SSHORT",
        9 => "SLONG",
        10 => "SRATIONAL",
        11 => "FLOAT",
        12 => "DOUBLE",
        _ => "UNKNOWN",
    }
}

/// Size in bytes of one component of a TIFF data type.
///
/// Unknown types are treated as byte-sized, which keeps the walker moving
/// over vendor extensions instead of failing the whole stream.
fn type_size(field_type: u16) -> usize {
    match field_type {
        TYPE_SHORT | 8 => 2,
        TYPE_LONG | 9 | 11 => 4,
        TYPE_RATIONAL | 10 | 12 => 8,
        _ => 1,
    }
}

/// Word size for byte-order normalization.
///
/// RATIONAL types are pairs of 32-bit words; DOUBLE is one 64-bit word.
fn swap_word_size(field_type: u16) -> usize {
    match field_type {
        TYPE_SHORT | 8 => 2,
        TYPE_LONG | 9 | 11 | TYPE_RATIONAL | 10 => 4,
        12 => 8,
        _ => 1,
    }
}

/// Normalize raw wire bytes to big-endian component order.
fn to_canonical(raw: &[u8], field_type: u16, byte_order: ByteOrder) -> Vec<u8> {
    swap_words(raw, field_type, byte_order)
}

/// Turn canonical big-endian component bytes back into wire order.
fn from_canonical(canonical: &[u8], field_type: u16, byte_order: ByteOrder) -> Vec<u8> {
    swap_words(canonical, field_type, byte_order)
}

fn swap_words(bytes: &[u8], field_type: u16, byte_order: ByteOrder) -> Vec<u8> {
    let word = swap_word_size(field_type);
    if byte_order == ByteOrder::Big || word == 1 {
        return bytes.to_vec();
    }
    let mut out = Vec::with_capacity(bytes.len());
    for chunk in bytes.chunks(word) {
        out.extend(chunk.iter().rev());
    }
    out
}

fn read_u16(bytes: &[u8], byte_order: ByteOrder) -> u16 {
    match byte_order {
        ByteOrder::Little => u16::from_le_bytes([bytes[0], bytes[1]]),
        ByteOrder::Big => u16::from_be_bytes([bytes[0], bytes[1]]),
    }
}

fn read_u32(bytes: &[u8], byte_order: ByteOrder) -> u32 {
    match byte_order {
        ByteOrder::Little => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        ByteOrder::Big => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

fn write_u16(value: u16, byte_order: ByteOrder) -> [u8; 2] {
    match byte_order {
        ByteOrder::Little => value.to_le_bytes(),
        ByteOrder::Big => value.to_be_bytes(),
    }
}

fn write_u32(value: u32, byte_order: ByteOrder) -> [u8; 4] {
    match byte_order {
        ByteOrder::Little => value.to_le_bytes(),
        ByteOrder::Big => value.to_be_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> ExifStore {
        let mut store = ExifStore::new();
        store.set_primary(ExifTag::ascii(0x010F, "jp2kit")); // Make
        store.set_primary(ExifTag::short(0x0112, 1)); // Orientation
        store.set_primary(ExifTag::long(0x0100, 640)); // ImageWidth
        store.set_exif(ExifTag::ascii(0x9003, "2024:01:01 00:00:00")); // DateTimeOriginal
        store
    }

    #[test]
    fn test_detects_byte_order() {
        let mut exif = ExifStore::new();
        let mut iptc = IptcStore::new();
        let mut xmp = XmpStore::new();

        let le = TiffCodec::encode(ByteOrder::Little, &sample_store()).unwrap();
        let bo = TiffCodec::decode(&mut exif, &mut iptc, &mut xmp, &le).unwrap();
        assert_eq!(bo, ByteOrder::Little);

        let be = TiffCodec::encode(ByteOrder::Big, &sample_store()).unwrap();
        let bo = TiffCodec::decode(&mut exif, &mut iptc, &mut xmp, &be).unwrap();
        assert_eq!(bo, ByteOrder::Big);
    }

    #[test]
    fn test_rejects_bad_header() {
        let mut exif = ExifStore::new();
        let mut iptc = IptcStore::new();
        let mut xmp = XmpStore::new();
        let result = TiffCodec::decode(&mut exif, &mut iptc, &mut xmp, b"PK\x03\x04....");
        assert!(matches!(result, Err(MetaError::CorruptedMetadata)));
    }

    #[test]
    fn test_round_trip_both_orders() {
        let store = sample_store();
        for byte_order in [ByteOrder::Little, ByteOrder::Big] {
            let bytes = TiffCodec::encode(byte_order, &store).unwrap();
            let mut decoded = ExifStore::new();
            let mut iptc = IptcStore::new();
            let mut xmp = XmpStore::new();
            TiffCodec::decode(&mut decoded, &mut iptc, &mut xmp, &bytes).unwrap();
            assert_eq!(decoded, store);
        }
    }

    #[test]
    fn test_empty_store_encodes_to_nothing() {
        let bytes = TiffCodec::encode(ByteOrder::Little, &ExifStore::new()).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_oversized_count_rejected() {
        // IFD with one entry whose count * type_size overflows the slice.
        let mut data = Vec::new();
        data.extend_from_slice(TIFF_SIGNATURE_LE);
        data.extend_from_slice(&8u32.to_le_bytes()); // IFD0 at 8
        data.extend_from_slice(&1u16.to_le_bytes()); // 1 entry
        data.extend_from_slice(&0x0100u16.to_le_bytes()); // tag
        data.extend_from_slice(&TYPE_LONG.to_le_bytes()); // type
        data.extend_from_slice(&0x4000_0000u32.to_le_bytes()); // count
        data.extend_from_slice(&26u32.to_le_bytes()); // offset
        data.extend_from_slice(&0u32.to_le_bytes()); // next IFD

        let mut exif = ExifStore::new();
        let mut iptc = IptcStore::new();
        let mut xmp = XmpStore::new();
        let result = TiffCodec::decode(&mut exif, &mut iptc, &mut xmp, &data);
        assert!(matches!(result, Err(MetaError::CorruptedMetadata)));
    }

    #[test]
    fn test_truncated_ifd_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(TIFF_SIGNATURE_BE);
        data.extend_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(&5u16.to_be_bytes()); // claims 5 entries, has none

        let mut exif = ExifStore::new();
        let mut iptc = IptcStore::new();
        let mut xmp = XmpStore::new();
        let result = TiffCodec::decode(&mut exif, &mut iptc, &mut xmp, &data);
        assert!(matches!(result, Err(MetaError::CorruptedMetadata)));
    }

    #[test]
    fn test_embedded_iptc_routed() {
        use crate::metadata::iptc::IptcDataset;

        let mut iptc_in = IptcStore::new();
        iptc_in.push(IptcDataset::new(2, 120, b"caption".to_vec()));
        let iptc_bytes = IptcCodec::encode(&iptc_in);

        let mut store = ExifStore::new();
        store.set_primary(ExifTag::undefined(TAG_IPTC_NAA, iptc_bytes));
        let bytes = TiffCodec::encode(ByteOrder::Little, &store).unwrap();

        let mut exif = ExifStore::new();
        let mut iptc = IptcStore::new();
        let mut xmp = XmpStore::new();
        TiffCodec::decode(&mut exif, &mut iptc, &mut xmp, &bytes).unwrap();
        assert_eq!(iptc, iptc_in);
        // The NAA entry itself must not surface as an Exif entry.
        assert!(exif.get_primary(TAG_IPTC_NAA).is_none());
    }

    #[test]
    fn test_print_structure_lists_tags() {
        let bytes = TiffCodec::encode(ByteOrder::Big, &sample_store()).unwrap();
        let mut out = Vec::new();
        print_tiff_structure(&bytes, &mut out, 1).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("TIFF MM"));
        assert!(text.contains("0x010f"));
        assert!(text.contains("jp2kit"));
        assert!(text.contains("0x9003"));
    }
}
