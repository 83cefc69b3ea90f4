//! JP2 box primitives
//!
//! A JP2 file is a sequence of ISO-BMFF style boxes:
//! - 4-byte big-endian length (total, including the header)
//! - 4-byte type (FourCC)
//! - optional 8-byte extended length when the length field is 1
//! - payload
//!
//! A length field of 0 means the box extends to the end of the file. This
//! module decodes and encodes headers, knows the well-known box types and
//! metadata UUIDs, and validates the signature and File Type boxes.

use crate::core::error::{MetaError, MetaResult};
use crate::io::BoundedReader;
use byteorder::{BigEndian, ByteOrder as _};
use std::io::{Read, Seek};

/// Size of the short box header: 4-byte length + 4-byte type.
pub const HEADER_SIZE: u64 = 8;
/// Size of the extended (XLBox) header.
pub const HEADER_SIZE_LARGE: u64 = 16;

// JPEG-2000 box types
pub const TYPE_SIGNATURE: u32 = 0x6a50_2020; // 'jP  ', required first box
pub const TYPE_FILE_TYPE: u32 = 0x6674_7970; // 'ftyp', required second box
pub const TYPE_HEADER: u32 = 0x6a70_3268; // 'jp2h', superbox
pub const TYPE_IMAGE_HEADER: u32 = 0x6968_6472; // 'ihdr'
pub const TYPE_COLOR_SPEC: u32 = 0x636f_6c72; // 'colr'
pub const TYPE_UUID: u32 = 0x7575_6964; // 'uuid'
pub const TYPE_CODESTREAM: u32 = 0x6a70_3263; // 'jp2c'

/// UUID identifying an Exif (TIFF stream) payload.
pub const UUID_EXIF: [u8; 16] = *b"JpgTiffExif->JP2";
/// UUID identifying an IPTC IIM payload.
pub const UUID_IPTC: [u8; 16] = [
    0x33, 0xc7, 0xa4, 0xd2, 0xb8, 0x1d, 0x47, 0x23, 0xa0, 0xba, 0xf1, 0xa3, 0xe0, 0x97, 0xad, 0x38,
];
/// UUID identifying an XMP packet payload.
pub const UUID_XMP: [u8; 16] = [
    0xbe, 0x7a, 0xcf, 0xcb, 0x97, 0xa9, 0x42, 0xe8, 0x9c, 0x71, 0x99, 0x94, 0x91, 0xe3, 0xaf, 0xac,
];

/// The 12-byte JPEG 2000 Signature box, always the first bytes of a file.
pub const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0c, 0x6a, 0x50, 0x20, 0x20, 0x0d, 0x0a, 0x87, 0x0a,
];

/// Brand identifying baseline JP2 in the File Type box.
const BRAND_JP2: &[u8; 4] = b"jp2 ";

/// A complete minimal JP2 file: signature, File Type box, JP2 Header box
/// with image header and colour specification, and a 1x1 greyscale
/// codestream. Written by `create_empty` so that a subsequent metadata
/// write has a valid skeleton to operate on.
pub const JP2_BLANK: [u8; 220] = [
    0x00, 0x00, 0x00, 0x0c, 0x6a, 0x50, 0x20, 0x20, 0x0d, 0x0a, 0x87, 0x0a,
    0x00, 0x00, 0x00, 0x14, 0x66, 0x74, 0x79, 0x70, 0x6a, 0x70, 0x32, 0x20,
    0x00, 0x00, 0x00, 0x00, 0x6a, 0x70, 0x32, 0x20, 0x00, 0x00, 0x00, 0x2d,
    0x6a, 0x70, 0x32, 0x68, 0x00, 0x00, 0x00, 0x16, 0x69, 0x68, 0x64, 0x72,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x07, 0x07,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x0f, 0x63, 0x6f, 0x6c, 0x72, 0x01, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x00, 0x6a, 0x70, 0x32,
    0x63, 0xff, 0x4f, 0xff, 0x51, 0x00, 0x29, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x07, 0x01, 0x01, 0xff, 0x64,
    0x00, 0x06, 0x00, 0x01, 0x6a, 0x70, 0xff, 0x52, 0x00, 0x0c, 0x00, 0x00,
    0x00, 0x01, 0x00, 0x05, 0x04, 0x04, 0x00, 0x01, 0xff, 0x5c, 0x00, 0x13,
    0x40, 0x40, 0x48, 0x48, 0x50, 0x48, 0x48, 0x50, 0x48, 0x48, 0x50, 0x48,
    0x48, 0x50, 0x48, 0x48, 0x50, 0xff, 0x90, 0x00, 0x0a, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x2d, 0x00, 0x01, 0xff, 0x5d, 0x00, 0x14, 0x00, 0x40, 0x40,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0xff, 0x93, 0xcf, 0xb4, 0x04, 0x00, 0x80, 0x80, 0x80,
    0x80, 0x80, 0xff, 0xd9,
];

/// The recognized box types, tagged over the raw FourCC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    Signature,
    FileType,
    /// The `jp2h` superbox.
    Header,
    ImageHeader,
    ColorSpec,
    Uuid,
    CodestreamClose,
    Other(u32),
}

impl From<u32> for BoxKind {
    fn from(t: u32) -> Self {
        match t {
            TYPE_SIGNATURE => BoxKind::Signature,
            TYPE_FILE_TYPE => BoxKind::FileType,
            TYPE_HEADER => BoxKind::Header,
            TYPE_IMAGE_HEADER => BoxKind::ImageHeader,
            TYPE_COLOR_SPEC => BoxKind::ColorSpec,
            TYPE_UUID => BoxKind::Uuid,
            TYPE_CODESTREAM => BoxKind::CodestreamClose,
            other => BoxKind::Other(other),
        }
    }
}

impl From<BoxKind> for u32 {
    fn from(k: BoxKind) -> Self {
        match k {
            BoxKind::Signature => TYPE_SIGNATURE,
            BoxKind::FileType => TYPE_FILE_TYPE,
            BoxKind::Header => TYPE_HEADER,
            BoxKind::ImageHeader => TYPE_IMAGE_HEADER,
            BoxKind::ColorSpec => TYPE_COLOR_SPEC,
            BoxKind::Uuid => TYPE_UUID,
            BoxKind::CodestreamClose => TYPE_CODESTREAM,
            BoxKind::Other(t) => t,
        }
    }
}

/// Render a box type as its FourCC, with non-printable bytes as dots.
pub fn fourcc(box_type: u32) -> String {
    box_type
        .to_be_bytes()
        .iter()
        .map(|&b| if (0x20..=0x7e).contains(&b) { b as char } else { '.' })
        .collect()
}

/// A decoded box header with the wire sentinels already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    /// Total box size including the header.
    pub length: u64,
    /// Raw FourCC.
    pub box_type: u32,
    /// 8, or 16 when the XLBox extended length was present.
    pub header_size: u8,
}

impl BoxHeader {
    pub fn kind(&self) -> BoxKind {
        BoxKind::from(self.box_type)
    }

    /// Payload size; the decode invariant guarantees no underflow.
    pub fn payload_size(&self) -> u64 {
        self.length - u64::from(self.header_size)
    }
}

/// A decoded header together with where it was found.
#[derive(Debug, Clone, Copy)]
pub struct DecodedBox {
    pub header: BoxHeader,
    /// Position of the first header byte.
    pub origin: u64,
    /// The wire length field was 0 ("extends to end of file").
    pub to_eof: bool,
}

impl DecodedBox {
    pub fn kind(&self) -> BoxKind {
        self.header.kind()
    }

    /// Position one past the last byte of this box.
    pub fn end(&self) -> u64 {
        self.origin + self.header.length
    }

    /// Position of the first payload byte.
    pub fn payload_origin(&self) -> u64 {
        self.origin + u64::from(self.header.header_size)
    }
}

/// Decode the box header at the current position.
///
/// Returns `Ok(None)` on a clean end of stream at a box boundary. A partial
/// header, a resolved length smaller than the header, or a length reaching
/// past the stream end all fail.
pub fn decode_box<R: Read + Seek>(
    reader: &mut BoundedReader<R>,
) -> MetaResult<Option<DecodedBox>> {
    let origin = reader.position()?;
    if reader.remaining()? == 0 {
        return Ok(None);
    }

    let wire_length = reader.read_u32()?;
    let box_type = reader.read_u32()?;

    let (length, header_size, to_eof) = match wire_length {
        0 => (reader.size().saturating_sub(origin), 8u8, true),
        1 => (reader.read_u64()?, 16u8, false),
        n => (u64::from(n), 8u8, false),
    };

    if length < u64::from(header_size) || length > reader.size().saturating_sub(origin) {
        return Err(MetaError::CorruptedMetadata);
    }

    Ok(Some(DecodedBox {
        header: BoxHeader {
            length,
            box_type,
            header_size,
        },
        origin,
        to_eof,
    }))
}

/// Encode a short box header.
///
/// The rewriter only ever emits the 8-byte form; a length that would need
/// the XLBox form is refused.
pub fn encode_header(length: u64, box_type: u32) -> MetaResult<[u8; 8]> {
    let length = u32::try_from(length).map_err(|_| MetaError::ImageTooLarge)?;
    let mut out = [0u8; 8];
    BigEndian::write_u32(&mut out[0..4], length);
    BigEndian::write_u32(&mut out[4..8], box_type);
    Ok(out)
}

/// Check the stream for the JP2 signature.
///
/// The position is restored unless `advance` is set and the signature
/// matched.
pub fn is_jp2<R: Read + Seek>(reader: &mut BoundedReader<R>, advance: bool) -> MetaResult<bool> {
    let pos = reader.position()?;
    if reader.remaining()? < JP2_SIGNATURE.len() as u64 {
        return Ok(false);
    }
    let buf = reader.read_exact(JP2_SIGNATURE.len() as u64)?;
    let matched = buf == JP2_SIGNATURE;
    if !advance || !matched {
        reader.seek_absolute(pos)?;
    }
    Ok(matched)
}

/// Validate the payload of a File Type box.
///
/// The brand and minor version occupy 8 bytes; the rest is a list of 4-byte
/// compatibility entries. Either the brand or one compatibility entry must
/// be `jp2 `.
pub fn validate_file_type(payload: &[u8]) -> MetaResult<()> {
    if payload.len() < 8 || (payload.len() - 8) % 4 != 0 {
        return Err(MetaError::CorruptedMetadata);
    }
    if &payload[0..4] == BRAND_JP2 {
        return Ok(());
    }
    if payload[8..].chunks_exact(4).any(|c| c == BRAND_JP2) {
        return Ok(());
    }
    Err(MetaError::CorruptedMetadata)
}
