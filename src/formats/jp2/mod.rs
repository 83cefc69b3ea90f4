//! JPEG 2000 (JP2) container support
//!
//! A JP2 file is a box stream: the 12-byte Signature box, the File Type
//! box, then content boxes including the `jp2h` superbox (image header and
//! colour specification) and the codestream. Embedded metadata travels in
//! UUID boxes keyed by three well-known identifiers.
//!
//! [`Jp2Image`] is the entry point: it walks the box stream on read,
//! dispatching metadata payloads into its stores, and rewrites the stream
//! on write, replacing the JP2 Header box and the metadata UUID boxes while
//! preserving everything else bit-exactly.

use crate::core::diag::Diagnostics;
use crate::core::error::{MetaError, MetaResult};
use crate::formats::handler::ImageHandler;
use crate::formats::Image;
use crate::io::BoundedReader;
use crate::metadata::exif::{print_tiff_structure, ByteOrder, ExifStore, TiffCodec};
use crate::metadata::iptc::{print_iptc_structure, IptcCodec, IptcStore};
use crate::metadata::xmp::{XmpCodec, XmpStore};
use byteorder::{BigEndian, ByteOrder as _};
use std::io::{Read, Seek, Write};

pub mod boxes;
mod writer;

use boxes::{BoxKind, DecodedBox, HEADER_SIZE, JP2_BLANK, UUID_EXIF, UUID_IPTC, UUID_XMP};

/// Upper bound on the number of boxes processed in one walk, shared between
/// the top level and superbox recursion. Guards against pathological
/// streams made of millions of tiny boxes.
const MAX_BOXES: usize = 1000;

/// The `Exif\0\0` prefix some writers put before the TIFF stream inside the
/// Exif UUID box. JP2 does not call for it, but it is tolerated on read.
const EXIF_HEADER: [u8; 6] = [0x45, 0x78, 0x69, 0x66, 0x00, 0x00];

/// Compression type required by the Image Header box.
const COMPRESSION_JPEG2000: u8 = 7;

/// Stateless handler for JPEG 2000 detection and construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jp2Handler;

impl ImageHandler for Jp2Handler {
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> MetaResult<bool> {
        let mut bounded = BoundedReader::new(reader)?;
        boxes::is_jp2(&mut bounded, false)
    }

    fn new_image(&self) -> Image {
        Image::Jp2(Jp2Image::new())
    }

    fn mime_type(&self) -> &'static str {
        "image/jp2"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["jp2"]
    }
}

/// Modes for [`Jp2Image::print_structure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOption {
    /// Tabulate the top-level and `jp2h` sub-box structure.
    Basic,
    /// Like `Basic`, and re-enter Exif and IPTC payloads.
    Recursive,
    /// Write the captured ICC profile bytes and nothing else.
    IccProfile,
    /// Write the XMP packet bytes and nothing else.
    Xmp,
    /// Walk silently, validating the structure.
    IptcErase,
}

/// States of the top-level box walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    ExpectSignature,
    ExpectFileType,
    InContent,
}

/// Shared box-count ceiling for one walk.
struct BoxBudget {
    remaining: usize,
}

impl BoxBudget {
    fn new() -> Self {
        Self {
            remaining: MAX_BOXES,
        }
    }

    fn charge(&mut self) -> MetaResult<()> {
        if self.remaining == 0 {
            return Err(MetaError::CorruptedMetadata);
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// A JP2 image: metadata state plus the read and write operations.
///
/// The reader and sink are borrowed per call; the image itself only holds
/// the decoded metadata. Typical flow: `read_metadata`, mutate the stores,
/// `write_metadata` into a fresh sink.
pub struct Jp2Image {
    exif: ExifStore,
    iptc: IptcStore,
    xmp: XmpStore,
    xmp_packet: String,
    /// Write the raw packet verbatim instead of re-encoding the store.
    write_xmp_from_packet: bool,
    icc_profile: Option<Vec<u8>>,
    pixel_width: u32,
    pixel_height: u32,
    byte_order: ByteOrder,
    diag: Diagnostics,
    good: bool,
}

impl Default for Jp2Image {
    fn default() -> Self {
        Self::new()
    }
}

impl Jp2Image {
    /// Create an image with empty metadata state.
    pub fn new() -> Self {
        Self {
            exif: ExifStore::new(),
            iptc: IptcStore::new(),
            xmp: XmpStore::new(),
            xmp_packet: String::new(),
            write_xmp_from_packet: false,
            icc_profile: None,
            pixel_width: 0,
            pixel_height: 0,
            byte_order: ByteOrder::default(),
            diag: Diagnostics::new(),
            good: true,
        }
    }

    /// Write the blank JP2 template into `sink`.
    ///
    /// The template is a complete minimal file, so a subsequent
    /// `write_metadata` over it produces a valid image carrying the
    /// current metadata state.
    pub fn create_empty<W: Write>(sink: &mut W) -> MetaResult<()> {
        sink.write_all(&JP2_BLANK)
            .map_err(|_| MetaError::ImageWriteFailed)
    }

    pub fn mime_type(&self) -> &'static str {
        "image/jp2"
    }

    /// JP2 has no comment record.
    pub fn set_comment(&mut self, _comment: &str) -> MetaResult<()> {
        Err(MetaError::InvalidSettingForImage("JP2"))
    }

    /// Whether construction succeeded.
    pub fn good(&self) -> bool {
        self.good
    }

    pub fn exif(&self) -> &ExifStore {
        &self.exif
    }

    pub fn exif_mut(&mut self) -> &mut ExifStore {
        &mut self.exif
    }

    pub fn iptc(&self) -> &IptcStore {
        &self.iptc
    }

    pub fn iptc_mut(&mut self) -> &mut IptcStore {
        &mut self.iptc
    }

    pub fn xmp(&self) -> &XmpStore {
        &self.xmp
    }

    /// Mutable access to the structured XMP store.
    ///
    /// Taking it switches the write path to re-encode the store instead of
    /// passing a previously read packet through verbatim.
    pub fn xmp_mut(&mut self) -> &mut XmpStore {
        self.write_xmp_from_packet = false;
        &mut self.xmp
    }

    /// Replace the structured XMP store; the next write re-encodes it.
    pub fn set_xmp(&mut self, xmp: XmpStore) {
        self.xmp = xmp;
        self.write_xmp_from_packet = false;
    }

    pub fn xmp_packet(&self) -> &str {
        &self.xmp_packet
    }

    /// Set the raw XMP packet; the next write emits it verbatim.
    pub fn set_xmp_packet(&mut self, packet: impl Into<String>) {
        self.xmp_packet = packet.into();
        self.write_xmp_from_packet = true;
    }

    pub fn icc_profile(&self) -> Option<&[u8]> {
        self.icc_profile.as_deref()
    }

    pub fn set_icc_profile(&mut self, profile: Vec<u8>) {
        self.icc_profile = Some(profile);
    }

    pub fn clear_icc_profile(&mut self) {
        self.icc_profile = None;
    }

    pub fn pixel_width(&self) -> u32 {
        self.pixel_width
    }

    pub fn pixel_height(&self) -> u32 {
        self.pixel_height
    }

    /// Byte order detected by the last Exif decode.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Warnings recorded by the last operation.
    pub fn warnings(&self) -> &[String] {
        self.diag.warnings()
    }

    /// Read all metadata from a JP2 stream into this image's state.
    ///
    /// Structural corruption aborts with an error; codec-level decode
    /// failures clear the affected store and are recorded as warnings.
    pub fn read_metadata<R: Read + Seek>(&mut self, source: &mut R) -> MetaResult<()> {
        let mut reader = open_reader(source)?;
        if !boxes::is_jp2(&mut reader, false)? {
            return Err(MetaError::NotAnImage("JPEG-2000"));
        }

        self.reset_state();
        let mut budget = BoxBudget::new();
        let mut state = WalkState::ExpectSignature;

        while let Some(decoded) = boxes::decode_box(&mut reader)? {
            budget.charge()?;
            match state {
                WalkState::ExpectSignature => match decoded.kind() {
                    BoxKind::Signature => state = WalkState::ExpectFileType,
                    _ => return Err(MetaError::CorruptedMetadata),
                },
                WalkState::ExpectFileType => match decoded.kind() {
                    BoxKind::FileType => {
                        let payload = reader.read_exact(decoded.header.payload_size())?;
                        boxes::validate_file_type(&payload)?;
                        state = WalkState::InContent;
                    }
                    _ => return Err(MetaError::CorruptedMetadata),
                },
                WalkState::InContent => match decoded.kind() {
                    // Exactly one Signature and one File Type box are allowed.
                    BoxKind::Signature | BoxKind::FileType => {
                        return Err(MetaError::CorruptedMetadata)
                    }
                    BoxKind::Header => {
                        self.read_header_box(&mut reader, &decoded, &mut budget)?;
                    }
                    BoxKind::Uuid => self.read_uuid_box(&mut reader, &decoded)?,
                    _ => {} // skipped by length, the codestream included
                },
            }
            reader.seek_absolute(decoded.end())?;
        }
        Ok(())
    }

    /// Rewrite the stream in `source` to `sink` with the current metadata.
    ///
    /// This is always a complete rewrite: non-metadata boxes are copied
    /// bit-exactly and in order, the JP2 Header box is re-encoded to carry
    /// the current ICC profile, old metadata UUID boxes are dropped, and
    /// fresh ones are emitted right after the JP2 Header. On error the sink
    /// contents are unspecified and must be discarded.
    pub fn write_metadata<R: Read + Seek, W: Write>(
        &mut self,
        source: &mut R,
        sink: &mut W,
    ) -> MetaResult<()> {
        let mut reader = open_reader(source)?;
        writer::write_boxes(self, &mut reader, sink)
    }

    /// Walk the box structure, emitting a human-readable tabulation.
    ///
    /// `depth` indents the recursive sub-dumps.
    pub fn print_structure<R: Read + Seek, W: Write>(
        &mut self,
        source: &mut R,
        out: &mut W,
        option: PrintOption,
        depth: usize,
    ) -> MetaResult<()> {
        let mut reader = open_reader(source)?;
        if !boxes::is_jp2(&mut reader, false)? {
            return Err(MetaError::NotAnImage("JPEG-2000"));
        }

        let print = matches!(option, PrintOption::Basic | PrintOption::Recursive);

        if print {
            writeln!(out, "STRUCTURE OF JPEG2000 FILE")?;
            writeln!(out, " address |   length | box       | data")?;
        }

        let mut budget = BoxBudget::new();
        let mut signature_seen = false;

        while let Some(decoded) = boxes::decode_box(&mut reader)? {
            budget.charge()?;
            if print {
                write!(
                    out,
                    "{:8} | {:8} | {:<9} | ",
                    decoded.origin,
                    decoded.header.length,
                    boxes::fourcc(decoded.header.box_type)
                )?;
            }

            match decoded.kind() {
                BoxKind::CodestreamClose => {
                    if print {
                        writeln!(out)?;
                    }
                    break;
                }
                BoxKind::Signature => {
                    if signature_seen {
                        return Err(MetaError::CorruptedMetadata);
                    }
                    signature_seen = true;
                    if print {
                        writeln!(out)?;
                    }
                }
                BoxKind::FileType => {
                    let payload = reader.read_exact(decoded.header.payload_size())?;
                    boxes::validate_file_type(&payload)?;
                    if print {
                        writeln!(out)?;
                    }
                }
                BoxKind::Header => {
                    if print {
                        writeln!(out)?;
                    }
                    self.print_header_box(&mut reader, &decoded, out, option, &mut budget)?;
                }
                BoxKind::Uuid => {
                    self.print_uuid_box(&mut reader, &decoded, out, option, depth)?;
                }
                _ => {
                    if print {
                        writeln!(out)?;
                    }
                }
            }
            reader.seek_absolute(decoded.end())?;
        }
        Ok(())
    }

    fn reset_state(&mut self) {
        self.exif.clear();
        self.iptc.clear();
        self.xmp.clear();
        self.xmp_packet.clear();
        self.write_xmp_from_packet = false;
        self.icc_profile = None;
        self.pixel_width = 0;
        self.pixel_height = 0;
        self.byte_order = ByteOrder::default();
        self.diag.clear();
    }

    /// Walk the sub-boxes of the `jp2h` superbox.
    fn read_header_box<R: Read + Seek>(
        &mut self,
        reader: &mut BoundedReader<R>,
        superbox: &DecodedBox,
        budget: &mut BoxBudget,
    ) -> MetaResult<()> {
        let end = superbox.end();
        reader.seek_absolute(superbox.payload_origin())?;

        while reader.position()?.saturating_add(HEADER_SIZE) <= end {
            let Some(sub) = boxes::decode_box(reader)? else {
                break;
            };
            if sub.to_eof {
                break; // a zero wire length terminates the superbox scan
            }
            budget.charge()?;
            if sub.end() > end {
                return Err(MetaError::CorruptedMetadata);
            }
            match sub.kind() {
                BoxKind::ImageHeader => self.read_image_header(reader, &sub)?,
                BoxKind::ColorSpec => self.read_color_spec(reader, &sub)?,
                _ => {}
            }
            reader.seek_absolute(sub.end())?;
        }
        Ok(())
    }

    /// Extract pixel dimensions from the `ihdr` sub-box.
    ///
    /// The payload is fixed: height, width, component count, bits per
    /// component, compression type, colourspace-unknown flag, IPR flag.
    fn read_image_header<R: Read + Seek>(
        &mut self,
        reader: &mut BoundedReader<R>,
        sub: &DecodedBox,
    ) -> MetaResult<()> {
        if sub.header.length != 22 || sub.header.payload_size() != 14 {
            return Err(MetaError::CorruptedMetadata);
        }
        let payload = reader.read_exact(14)?;
        let height = BigEndian::read_u32(&payload[0..4]);
        let width = BigEndian::read_u32(&payload[4..8]);
        let compression = payload[11];
        if compression != COMPRESSION_JPEG2000 {
            return Err(MetaError::CorruptedMetadata);
        }
        self.pixel_height = height;
        self.pixel_width = width;
        Ok(())
    }

    /// Validate the `colr` sub-box and capture a restricted ICC profile.
    fn read_color_spec<R: Read + Seek>(
        &mut self,
        reader: &mut BoundedReader<R>,
        sub: &DecodedBox,
    ) -> MetaResult<()> {
        let payload_size = sub.header.payload_size();
        if payload_size < 3 {
            return Err(MetaError::CorruptedMetadata);
        }
        let payload = reader.read_exact(payload_size)?;

        match payload[0] {
            // Enumerated colourspace: only sRGB and greyscale are legal.
            1 => {
                if payload.len() < 7 {
                    return Err(MetaError::CorruptedMetadata);
                }
                let enum_cs = BigEndian::read_u32(&payload[3..7]);
                if enum_cs != 16 && enum_cs != 17 {
                    return Err(MetaError::CorruptedMetadata);
                }
            }
            // Restricted ICC profile: METH, PREC and APPROX bytes, then the
            // profile whose own first field is its length.
            2 => {
                if payload.len() < 7 {
                    return Err(MetaError::CorruptedMetadata);
                }
                let icc_length = u64::from(BigEndian::read_u32(&payload[3..7]));
                let needed = icc_length
                    .checked_add(3)
                    .ok_or(MetaError::CorruptedMetadata)?;
                if needed > payload_size {
                    return Err(MetaError::CorruptedMetadata);
                }
                let icc_length = icc_length as usize;
                self.icc_profile = Some(payload[3..3 + icc_length].to_vec());
            }
            // Other methods pass through uncaptured.
            _ => {}
        }
        Ok(())
    }

    /// Read a UUID box and dispatch its payload.
    fn read_uuid_box<R: Read + Seek>(
        &mut self,
        reader: &mut BoundedReader<R>,
        decoded: &DecodedBox,
    ) -> MetaResult<()> {
        if decoded.header.payload_size() < 16 {
            return Err(MetaError::CorruptedMetadata);
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&reader.read_exact(16)?);
        let payload = reader.read_exact(decoded.header.payload_size() - 16)?;
        self.dispatch_uuid(&uuid, payload);
        Ok(())
    }

    /// Route a UUID payload to the matching codec.
    ///
    /// Unknown UUIDs are ignored here; the rewriter preserves their boxes
    /// verbatim.
    fn dispatch_uuid(&mut self, uuid: &[u8; 16], payload: Vec<u8>) {
        if *uuid == UUID_EXIF {
            self.decode_exif_payload(&payload);
        } else if *uuid == UUID_IPTC {
            match IptcCodec::decode(&payload) {
                Ok(store) => self.iptc = store,
                Err(_) => {
                    self.diag.warn("failed to decode IPTC metadata");
                    self.iptc.clear();
                }
            }
        } else if *uuid == UUID_XMP {
            self.decode_xmp_payload(&payload);
        }
    }

    fn decode_exif_payload(&mut self, payload: &[u8]) {
        if payload.len() <= 8 {
            self.diag.warn("failed to decode Exif metadata");
            self.exif.clear();
            return;
        }

        // A conforming box starts with the TIFF byte-order marker; some
        // writers prepend the JPEG-style Exif header instead.
        let tiff_start = if payload[0] == payload[1] && (payload[0] == b'I' || payload[0] == b'M') {
            Some(0)
        } else if let Some(at) = find_subslice(payload, &EXIF_HEADER) {
            self.diag.warn("reading non-standard UUID-EXIF_bad box");
            Some(at + EXIF_HEADER.len())
        } else {
            None
        };
        // No TIFF stream anywhere in the payload: nothing to decode.
        let Some(at) = tiff_start else {
            return;
        };

        match TiffCodec::decode(&mut self.exif, &mut self.iptc, &mut self.xmp, &payload[at..]) {
            Ok(byte_order) => self.byte_order = byte_order,
            Err(_) => {
                self.diag.warn("failed to decode Exif metadata");
                self.exif.clear();
            }
        }
    }

    fn decode_xmp_payload(&mut self, payload: &[u8]) {
        let mut packet = String::from_utf8_lossy(payload).into_owned();
        // Some writers pad the front of the packet; everything before the
        // first '<' is dropped. A packet with no '<' at all is kept as is
        // and fails the decode below.
        if let Some(at) = packet.find('<') {
            if at > 0 {
                self.diag.warn(format!(
                    "removing {at} characters from the beginning of the XMP packet"
                ));
                packet.drain(..at);
            }
        }
        self.xmp_packet = packet;
        self.write_xmp_from_packet = true;

        if !self.xmp_packet.is_empty() {
            match XmpCodec::decode(&self.xmp_packet) {
                Ok(store) => self.xmp = store,
                Err(_) => self.diag.warn("failed to decode XMP metadata"),
            }
        }
    }

    /// Print the sub-boxes of a `jp2h` superbox, with the same validation
    /// as the read path.
    fn print_header_box<R: Read + Seek, W: Write>(
        &mut self,
        reader: &mut BoundedReader<R>,
        superbox: &DecodedBox,
        out: &mut W,
        option: PrintOption,
        budget: &mut BoxBudget,
    ) -> MetaResult<()> {
        let print = matches!(option, PrintOption::Basic | PrintOption::Recursive);
        let end = superbox.end();
        reader.seek_absolute(superbox.payload_origin())?;

        while reader.position()?.saturating_add(HEADER_SIZE) <= end {
            let Some(sub) = boxes::decode_box(reader)? else {
                break;
            };
            if sub.to_eof {
                break;
            }
            budget.charge()?;
            if sub.end() > end {
                return Err(MetaError::CorruptedMetadata);
            }

            let payload = reader.read_exact(sub.header.payload_size())?;
            if print {
                writeln!(
                    out,
                    "{:8} | {:8} |  sub:{} | {}",
                    sub.origin,
                    sub.header.length,
                    boxes::fourcc(sub.header.box_type),
                    binary_preview(&payload, 30)
                )?;
            }

            match sub.kind() {
                BoxKind::ImageHeader => {
                    if sub.header.length != 22 || payload.len() != 14 {
                        return Err(MetaError::CorruptedMetadata);
                    }
                    let compression = payload[11];
                    let unk_c = payload[12];
                    let ipr = payload[13];
                    if compression != COMPRESSION_JPEG2000 || unk_c > 1 || ipr > 1 {
                        return Err(MetaError::CorruptedMetadata);
                    }
                }
                BoxKind::ColorSpec => {
                    if payload.len() < 7 {
                        return Err(MetaError::CorruptedMetadata);
                    }
                    if payload[0] == 1 {
                        let enum_cs = BigEndian::read_u32(&payload[3..7]);
                        if enum_cs != 16 && enum_cs != 17 {
                            return Err(MetaError::CorruptedMetadata);
                        }
                    } else {
                        let icc_length = BigEndian::read_u32(&payload[3..7]) as usize;
                        if print {
                            writeln!(out, "{:8} | {:8} |   iccLength: {}", "", "", icc_length)?;
                        }
                        if icc_length.checked_add(3).map_or(true, |n| n > payload.len()) {
                            return Err(MetaError::CorruptedMetadata);
                        }
                        if option == PrintOption::IccProfile {
                            out.write_all(&payload[3..3 + icc_length])?;
                        }
                    }
                }
                _ => {}
            }
            reader.seek_absolute(sub.end())?;
        }
        Ok(())
    }

    /// Print a UUID box line, recursing into known payloads when asked.
    fn print_uuid_box<R: Read + Seek, W: Write>(
        &mut self,
        reader: &mut BoundedReader<R>,
        decoded: &DecodedBox,
        out: &mut W,
        option: PrintOption,
        depth: usize,
    ) -> MetaResult<()> {
        if decoded.header.payload_size() < 16 {
            return Err(MetaError::CorruptedMetadata);
        }
        let mut uuid = [0u8; 16];
        uuid.copy_from_slice(&reader.read_exact(16)?);
        let payload = reader.read_exact(decoded.header.payload_size() - 16)?;

        let print = matches!(option, PrintOption::Basic | PrintOption::Recursive);
        let label = if uuid == UUID_EXIF {
            "Exif: "
        } else if uuid == UUID_IPTC {
            "IPTC: "
        } else if uuid == UUID_XMP {
            "XMP : "
        } else {
            "????: "
        };
        if print {
            writeln!(out, "{}{}", label, binary_preview(&payload, 40))?;
        }

        if option == PrintOption::Recursive {
            if uuid == UUID_EXIF
                && payload.len() > 8
                && payload[0] == payload[1]
                && (payload[0] == b'I' || payload[0] == b'M')
            {
                print_tiff_structure(&payload, out, depth + 1)?;
            }
            if uuid == UUID_IPTC {
                print_iptc_structure(&payload, out, depth + 1)?;
            }
        }
        if option == PrintOption::Xmp && uuid == UUID_XMP {
            out.write_all(&payload)?;
        }
        Ok(())
    }
}

/// Wrap a source stream, mapping a probe failure to the open-failure kind.
fn open_reader<R: Read + Seek>(source: &mut R) -> MetaResult<BoundedReader<'_, R>> {
    BoundedReader::new(source).map_err(|e| match e {
        MetaError::Io(io) => MetaError::DataSourceOpenFailed(io.to_string()),
        other => other,
    })
}

/// First occurrence of `needle` in `haystack`.
fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Render up to `limit` payload bytes with non-printables as dots.
fn binary_preview(data: &[u8], limit: usize) -> String {
    data.iter()
        .take(limit)
        .map(|&b| if (0x20..=0x7e).contains(&b) { b as char } else { '.' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_mime_type() {
        assert_eq!(Jp2Image::new().mime_type(), "image/jp2");
    }

    #[test]
    fn test_set_comment_rejected() {
        let mut image = Jp2Image::new();
        assert!(matches!(
            image.set_comment("hello"),
            Err(MetaError::InvalidSettingForImage("JP2"))
        ));
    }

    #[test]
    fn test_create_empty_writes_template() {
        let mut sink = Cursor::new(Vec::new());
        Jp2Image::create_empty(&mut sink).unwrap();
        let bytes = sink.into_inner();
        assert_eq!(bytes.len(), 220);
        assert_eq!(bytes[0..12], boxes::JP2_SIGNATURE);
        assert_eq!(&bytes[218..], &[0xff, 0xd9]);
    }

    #[test]
    fn test_read_blank() {
        let mut source = Cursor::new(JP2_BLANK.to_vec());
        let mut image = Jp2Image::new();
        image.read_metadata(&mut source).unwrap();
        assert_eq!(image.pixel_width(), 1);
        assert_eq!(image.pixel_height(), 1);
        assert!(image.exif().is_empty());
        assert!(image.iptc().is_empty());
        assert!(image.xmp_packet().is_empty());
        assert!(image.icc_profile().is_none());
    }

    #[test]
    fn test_read_rejects_jpeg() {
        let mut source = Cursor::new(vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x00,
        ]);
        let mut image = Jp2Image::new();
        assert!(matches!(
            image.read_metadata(&mut source),
            Err(MetaError::NotAnImage("JPEG-2000"))
        ));
    }

    #[test]
    fn test_print_structure_basic() {
        let mut source = Cursor::new(JP2_BLANK.to_vec());
        let mut image = Jp2Image::new();
        let mut out = Vec::new();
        image
            .print_structure(&mut source, &mut out, PrintOption::Basic, 0)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("jP  "));
        assert!(text.contains("ftyp"));
        assert!(text.contains("sub:ihdr"));
        assert!(text.contains("sub:colr"));
        assert!(text.contains("jp2c"));
    }

    #[test]
    fn test_find_subslice() {
        assert_eq!(find_subslice(b"xxExif\0\0yy", &EXIF_HEADER), Some(2));
        assert_eq!(find_subslice(b"nothing here", &EXIF_HEADER), None);
    }
}
