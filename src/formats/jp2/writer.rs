//! JP2 rewriting
//!
//! The write path streams the source file box by box into a fresh sink:
//! the JP2 Header box is re-encoded so its colour specification carries the
//! current ICC profile, fresh metadata UUID boxes follow it immediately,
//! old metadata UUID boxes are dropped, and every other box is copied
//! verbatim. The result is a complete rewrite, never an in-place patch.

use crate::core::error::{MetaError, MetaResult};
use crate::io::BoundedReader;
use crate::metadata::exif::TiffCodec;
use crate::metadata::iptc::IptcCodec;
use crate::metadata::xmp::XmpCodec;
use byteorder::{BigEndian, ByteOrder as _};
use std::io::{Read, Seek, Write};

use super::boxes::{
    self, BoxKind, HEADER_SIZE, JP2_SIGNATURE, TYPE_COLOR_SPEC, TYPE_HEADER, TYPE_UUID, UUID_EXIF,
    UUID_IPTC, UUID_XMP,
};
use super::{BoxBudget, Jp2Image};

/// Colour specification payload written when no ICC profile is held
/// (enumerated sRGB).
const DEFAULT_COLOR_SPEC: [u8; 15] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x05, 0x1c, 0x75, 0x75, 0x69, 0x64,
];

/// Stream `reader` to `sink`, replacing the JP2 Header and the metadata
/// UUID boxes.
pub(super) fn write_boxes<R: Read + Seek, W: Write>(
    image: &mut Jp2Image,
    reader: &mut BoundedReader<R>,
    sink: &mut W,
) -> MetaResult<()> {
    if !boxes::is_jp2(reader, true)? {
        return Err(MetaError::NotAnImage("JPEG-2000"));
    }
    put(sink, &JP2_SIGNATURE)?;

    let mut budget = BoxBudget::new();
    while let Some(decoded) = boxes::decode_box(reader)? {
        budget.charge()?;
        // The decode invariant has already proved the length fits in the
        // remaining file bytes, so this allocation is bounded.
        reader.seek_absolute(decoded.origin)?;
        let box_buf = reader.read_exact(decoded.header.length)?;
        let header_size = usize::from(decoded.header.header_size);

        match decoded.kind() {
            BoxKind::Header => {
                let rebuilt = encode_jp2_header(&box_buf[header_size..], image.icc_profile())?;
                put(sink, &rebuilt)?;
                // All updated metadata goes right after the JP2 Header, in
                // fixed order.
                emit_metadata_boxes(image, sink)?;
            }
            BoxKind::Uuid => {
                if box_buf.len() < header_size + 16 {
                    return Err(MetaError::CorruptedMetadata);
                }
                let uuid = &box_buf[header_size..header_size + 16];
                let is_metadata = uuid == UUID_EXIF.as_slice()
                    || uuid == UUID_IPTC.as_slice()
                    || uuid == UUID_XMP.as_slice();
                if !is_metadata {
                    // Unknown UUID boxes are preserved byte-exactly.
                    put(sink, &box_buf)?;
                }
            }
            _ => put(sink, &box_buf)?,
        }
    }
    Ok(())
}

/// Re-encode a JP2 Header superbox payload.
///
/// Sub-boxes before the first colour specification are copied verbatim;
/// that colour specification is replaced (or one is appended when none
/// exists) and everything after it is copied verbatim. The outer header is
/// rewritten with the new total length.
pub(super) fn encode_jp2_header(payload: &[u8], icc: Option<&[u8]>) -> MetaResult<Vec<u8>> {
    let mut rebuilt = Vec::with_capacity(payload.len() + icc.map_or(16, |p| p.len() + 16));
    let mut wrote_color = false;
    let mut at = 0usize;

    while at < payload.len() {
        let remaining = payload.len() - at;
        if remaining < HEADER_SIZE as usize {
            return Err(MetaError::CorruptedMetadata);
        }
        let sub_length = BigEndian::read_u32(&payload[at..at + 4]) as usize;
        let sub_type = BigEndian::read_u32(&payload[at + 4..at + 8]);
        if sub_length < HEADER_SIZE as usize || sub_length > remaining {
            return Err(MetaError::CorruptedMetadata);
        }

        if sub_type == TYPE_COLOR_SPEC && !wrote_color {
            wrote_color = true;
            write_color_spec(&mut rebuilt, icc)?;
        } else {
            rebuilt.extend_from_slice(&payload[at..at + sub_length]);
        }
        at += sub_length;
    }
    if !wrote_color {
        write_color_spec(&mut rebuilt, icc)?;
    }

    let total = HEADER_SIZE
        .checked_add(rebuilt.len() as u64)
        .ok_or(MetaError::ImageTooLarge)?;
    let mut out = Vec::with_capacity(rebuilt.len() + HEADER_SIZE as usize);
    out.extend_from_slice(&boxes::encode_header(total, TYPE_HEADER)?);
    out.extend_from_slice(&rebuilt);
    Ok(out)
}

/// Append a colour specification sub-box carrying `icc`, or the default
/// enumerated one.
fn write_color_spec(out: &mut Vec<u8>, icc: Option<&[u8]>) -> MetaResult<()> {
    match icc {
        None => {
            let length = HEADER_SIZE + DEFAULT_COLOR_SPEC.len() as u64;
            out.extend_from_slice(&boxes::encode_header(length, TYPE_COLOR_SPEC)?);
            out.extend_from_slice(&DEFAULT_COLOR_SPEC);
        }
        Some(profile) => {
            let length = (profile.len() as u64)
                .checked_add(HEADER_SIZE + 3)
                .ok_or(MetaError::ImageTooLarge)?;
            out.extend_from_slice(&boxes::encode_header(length, TYPE_COLOR_SPEC)?);
            out.extend_from_slice(&[0x02, 0x00, 0x00]);
            out.extend_from_slice(profile);
        }
    }
    Ok(())
}

/// Emit UUID boxes for all non-empty metadata, in the fixed order Exif,
/// IPTC, XMP.
fn emit_metadata_boxes<W: Write>(image: &mut Jp2Image, sink: &mut W) -> MetaResult<()> {
    if !image.exif.is_empty() {
        let tiff = TiffCodec::encode(image.byte_order, &image.exif)?;
        if !tiff.is_empty() {
            write_uuid_box(sink, &UUID_EXIF, &tiff)?;
        }
    }

    if !image.iptc.is_empty() {
        let iim = IptcCodec::encode(&image.iptc);
        if !iim.is_empty() {
            write_uuid_box(sink, &UUID_IPTC, &iim)?;
        }
    }

    if !image.write_xmp_from_packet {
        if image.xmp.is_empty() {
            image.xmp_packet.clear();
        } else {
            match XmpCodec::encode(&image.xmp) {
                Ok(packet) => image.xmp_packet = packet,
                Err(_) => image.diag.warn("failed to encode XMP metadata"),
            }
        }
    }
    if !image.xmp_packet.is_empty() {
        write_uuid_box(sink, &UUID_XMP, image.xmp_packet.as_bytes())?;
    }
    Ok(())
}

/// Emit one UUID box: header, 16-byte UUID, payload.
fn write_uuid_box<W: Write>(sink: &mut W, uuid: &[u8; 16], payload: &[u8]) -> MetaResult<()> {
    let length = (payload.len() as u64)
        .checked_add(HEADER_SIZE + 16)
        .ok_or(MetaError::ImageTooLarge)?;
    put(sink, &boxes::encode_header(length, TYPE_UUID)?)?;
    put(sink, uuid)?;
    put(sink, payload)
}

fn put<W: Write>(sink: &mut W, bytes: &[u8]) -> MetaResult<()> {
    sink.write_all(bytes)
        .map_err(|_| MetaError::ImageWriteFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The jp2h payload of the blank template: ihdr (22 bytes) + colr (15).
    fn blank_header_payload() -> Vec<u8> {
        boxes::JP2_BLANK[40..77].to_vec()
    }

    #[test]
    fn test_header_reencode_without_icc() {
        let rebuilt = encode_jp2_header(&blank_header_payload(), None).unwrap();
        // ihdr copied verbatim, colr replaced by the 23-byte default.
        assert_eq!(&rebuilt[4..8], b"jp2h");
        assert_eq!(BigEndian::read_u32(&rebuilt[0..4]) as usize, rebuilt.len());
        assert_eq!(&rebuilt[12..16], b"ihdr");
        let colr_at = 8 + 22;
        assert_eq!(&rebuilt[colr_at + 4..colr_at + 8], b"colr");
        assert_eq!(BigEndian::read_u32(&rebuilt[colr_at..colr_at + 4]), 23);
        assert_eq!(&rebuilt[colr_at + 8..], &DEFAULT_COLOR_SPEC);
    }

    #[test]
    fn test_header_reencode_with_icc() {
        let icc = vec![0xAAu8; 40];
        let rebuilt = encode_jp2_header(&blank_header_payload(), Some(&icc)).unwrap();
        let colr_at = 8 + 22;
        assert_eq!(&rebuilt[colr_at + 4..colr_at + 8], b"colr");
        assert_eq!(
            BigEndian::read_u32(&rebuilt[colr_at..colr_at + 4]) as usize,
            8 + 3 + icc.len()
        );
        assert_eq!(&rebuilt[colr_at + 8..colr_at + 11], &[0x02, 0x00, 0x00]);
        assert_eq!(&rebuilt[colr_at + 11..colr_at + 11 + 40], icc.as_slice());
    }

    #[test]
    fn test_header_reencode_appends_when_no_colr() {
        // Only the ihdr sub-box; a colour specification must be appended.
        let payload = boxes::JP2_BLANK[40..62].to_vec();
        let rebuilt = encode_jp2_header(&payload, None).unwrap();
        let colr_at = 8 + 22;
        assert_eq!(&rebuilt[colr_at + 4..colr_at + 8], b"colr");
        assert_eq!(rebuilt.len(), colr_at + 23);
    }

    #[test]
    fn test_header_reencode_rejects_zero_length_sub_box() {
        let mut payload = blank_header_payload();
        payload[0..4].copy_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            encode_jp2_header(&payload, None),
            Err(MetaError::CorruptedMetadata)
        ));
    }

    #[test]
    fn test_header_reencode_rejects_overlong_sub_box() {
        let mut payload = blank_header_payload();
        payload[0..4].copy_from_slice(&[0, 0, 1, 0]); // claims 256 bytes
        assert!(matches!(
            encode_jp2_header(&payload, None),
            Err(MetaError::CorruptedMetadata)
        ));
    }

    #[test]
    fn test_uuid_box_layout() {
        let mut sink = Vec::new();
        write_uuid_box(&mut sink, &UUID_XMP, b"<packet/>").unwrap();
        assert_eq!(
            BigEndian::read_u32(&sink[0..4]) as usize,
            8 + 16 + b"<packet/>".len()
        );
        assert_eq!(&sink[4..8], b"uuid");
        assert_eq!(&sink[8..24], UUID_XMP.as_slice());
        assert_eq!(&sink[24..], b"<packet/>");
    }
}
