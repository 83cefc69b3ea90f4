//! End-to-end tests over in-memory JP2 files
//!
//! All fixtures are synthesized from the blank template so the tests are
//! self-contained: boxes are spliced in at known offsets and the results
//! round-tripped through read and write.

use jp2kit::{
    ExifTag, IptcDataset, Jp2Image, MetaError, PrintOption, XmpValue,
};
use std::io::Cursor;

/// Offsets of the blank template: signature 0..12, ftyp 12..32,
/// jp2h 32..77, jp2c 77..220.
const BLANK_JP2H_START: usize = 32;
const BLANK_JP2C_START: usize = 77;

const XMP_UUID: [u8; 16] = [
    0xbe, 0x7a, 0xcf, 0xcb, 0x97, 0xa9, 0x42, 0xe8, 0x9c, 0x71, 0x99, 0x94, 0x91, 0xe3, 0xaf, 0xac,
];

const SAMPLE_PACKET: &str = "<?xpacket begin=\"\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\
<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\
<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\" \
xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\
<rdf:Description rdf:about=\"\"><dc:title>roundtrip</dc:title></rdf:Description>\
</rdf:RDF></x:xmpmeta><?xpacket end=\"w\"?>";

fn blank() -> Vec<u8> {
    let mut sink = Cursor::new(Vec::new());
    Jp2Image::create_empty(&mut sink).unwrap();
    sink.into_inner()
}

/// Assemble a UUID box.
fn uuid_box(uuid: &[u8; 16], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(8 + 16 + payload.len() as u32).to_be_bytes());
    out.extend_from_slice(b"uuid");
    out.extend_from_slice(uuid);
    out.extend_from_slice(payload);
    out
}

/// Splice a box into the blank template between the jp2h and jp2c boxes.
fn blank_with_box(boxed: &[u8]) -> Vec<u8> {
    let base = blank();
    let mut out = base[..BLANK_JP2C_START].to_vec();
    out.extend_from_slice(boxed);
    out.extend_from_slice(&base[BLANK_JP2C_START..]);
    out
}

fn read(bytes: &[u8]) -> Jp2Image {
    let mut image = Jp2Image::new();
    image.read_metadata(&mut Cursor::new(bytes.to_vec())).unwrap();
    image
}

fn write(image: &mut Jp2Image, source: &[u8]) -> Vec<u8> {
    let mut sink = Cursor::new(Vec::new());
    image
        .write_metadata(&mut Cursor::new(source.to_vec()), &mut sink)
        .unwrap();
    sink.into_inner()
}

/// Parse the top-level box list of a file as (offset, fourcc, length).
fn box_list(bytes: &[u8]) -> Vec<(usize, String, usize)> {
    let mut out = Vec::new();
    let mut at = 0usize;
    while at + 8 <= bytes.len() {
        let mut length =
            u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize;
        let fourcc = String::from_utf8_lossy(&bytes[at + 4..at + 8]).to_string();
        if length == 0 {
            length = bytes.len() - at;
        }
        out.push((at, fourcc, length));
        at += length;
    }
    out
}

#[test]
fn blank_file_creation() {
    let bytes = blank();
    assert_eq!(bytes.len(), 220);
    assert_eq!(
        &bytes[0..12],
        &[0x00, 0x00, 0x00, 0x0c, 0x6a, 0x50, 0x20, 0x20, 0x0d, 0x0a, 0x87, 0x0a]
    );
    // File Type box: length, 'ftyp', brand 'jp2 ', minor version, 'jp2 '.
    assert_eq!(
        &bytes[12..32],
        b"\x00\x00\x00\x14ftypjp2 \x00\x00\x00\x00jp2 "
    );
    assert_eq!(&bytes[218..220], &[0xFF, 0xD9]);
}

#[test]
fn signature_rejection() {
    let jfif = [
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x00,
    ];
    let mut image = Jp2Image::new();
    assert!(matches!(
        image.read_metadata(&mut Cursor::new(jfif.to_vec())),
        Err(MetaError::NotAnImage("JPEG-2000"))
    ));
}

#[test]
fn xlbox_codestream_accepted() {
    let base = blank();
    let mut bytes = base[..BLANK_JP2C_START].to_vec();
    // length = 1 selects the 8-byte extended length; 16 bytes total means
    // an empty payload after the large header.
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.extend_from_slice(b"jp2c");
    bytes.extend_from_slice(&16u64.to_be_bytes());

    let mut image = Jp2Image::new();
    image.read_metadata(&mut Cursor::new(bytes)).unwrap();
    assert!(image.exif().is_empty());
}

#[test]
fn xmp_round_trip_from_blank() {
    let mut image = Jp2Image::new();
    image.set_xmp_packet(SAMPLE_PACKET);
    let out = write(&mut image, &blank());

    // Exactly one UUID box, with the XMP UUID, immediately after jp2h.
    let uuid_boxes: Vec<_> = box_list(&out)
        .into_iter()
        .filter(|(_, fourcc, _)| fourcc == "uuid")
        .collect();
    assert_eq!(uuid_boxes.len(), 1);
    let (at, _, _) = uuid_boxes[0];
    assert_eq!(&out[at + 8..at + 24], &XMP_UUID);

    let boxes = box_list(&out);
    let jp2h_index = boxes.iter().position(|(_, f, _)| f == "jp2h").unwrap();
    assert_eq!(boxes[jp2h_index + 1].1, "uuid");

    let reread = read(&out);
    assert_eq!(reread.xmp_packet(), SAMPLE_PACKET);
    assert_eq!(
        reread.xmp().get("dc:title"),
        Some(&XmpValue::Text("roundtrip".to_string()))
    );
}

#[test]
fn oversized_icc_length_rejected() {
    let mut bytes = blank();
    // colr payload starts at 70: METH, PREC, APPROX, then for METH == 2 an
    // ICC profile whose first field is its length.
    bytes[70] = 2;
    bytes[73..77].copy_from_slice(&0x7FFF_FFFFu32.to_be_bytes());

    let mut image = Jp2Image::new();
    assert!(matches!(
        image.read_metadata(&mut Cursor::new(bytes)),
        Err(MetaError::CorruptedMetadata)
    ));
}

#[test]
fn unknown_uuid_preserved() {
    let foreign_uuid = [0x11u8; 16];
    let payload = [0xAB; 32];
    let boxed = uuid_box(&foreign_uuid, &payload);
    let input = blank_with_box(&boxed);

    let mut image = read(&input);
    let out = write(&mut image, &input);

    let found = out
        .windows(boxed.len())
        .any(|w| w == boxed.as_slice());
    assert!(found, "foreign UUID box must survive the rewrite verbatim");
}

#[test]
fn rewrite_without_metadata_only_normalizes_header() {
    let input = blank();
    let mut image = read(&input);
    let out = write(&mut image, &input);

    // Signature and File Type box are byte-identical.
    assert_eq!(&out[..BLANK_JP2H_START], &input[..BLANK_JP2H_START]);
    // The codestream tail is byte-identical.
    assert_eq!(&out[out.len() - 143..], &input[BLANK_JP2C_START..]);
    // The JP2 Header box was normalized: same sub-boxes, new colour spec.
    let boxes = box_list(&out);
    let (at, _, length) = boxes
        .iter()
        .find(|(_, f, _)| f == "jp2h")
        .cloned()
        .unwrap();
    assert_eq!(length, 8 + 22 + 23);
    assert_eq!(&out[at + 8 + 4..at + 8 + 8], b"ihdr");
    assert_eq!(&out[at + 8 + 22 + 4..at + 8 + 22 + 8], b"colr");
}

#[test]
fn write_is_idempotent() {
    let mut first = Jp2Image::new();
    first.set_xmp_packet(SAMPLE_PACKET);
    first
        .iptc_mut()
        .push(IptcDataset::new(2, 120, b"caption".to_vec()));
    first
        .exif_mut()
        .set_primary(ExifTag::ascii(0x010F, "jp2kit"));
    let pass1 = write(&mut first, &blank());

    let mut second = read(&pass1);
    let pass2 = write(&mut second, &pass1);
    assert_eq!(pass1, pass2);

    let mut third = read(&pass2);
    let pass3 = write(&mut third, &pass2);
    assert_eq!(pass2, pass3);
}

#[test]
fn stores_survive_round_trip() {
    let mut image = Jp2Image::new();
    image.exif_mut().set_primary(ExifTag::ascii(0x010F, "maker"));
    image.exif_mut().set_primary(ExifTag::short(0x0112, 6));
    image
        .exif_mut()
        .set_exif(ExifTag::ascii(0x9003, "2024:06:01 12:00:00"));
    image
        .iptc_mut()
        .push(IptcDataset::new(2, 5, b"object".to_vec()));
    image.set_xmp_packet(SAMPLE_PACKET);

    let out = write(&mut image, &blank());
    let reread = read(&out);

    assert_eq!(reread.exif(), image.exif());
    assert_eq!(reread.iptc(), image.iptc());
    assert_eq!(reread.xmp_packet(), image.xmp_packet());

    // A second cycle must not drift.
    let mut again = read(&out);
    let out2 = write(&mut again, &out);
    let reread2 = read(&out2);
    assert_eq!(reread2.exif(), reread.exif());
    assert_eq!(reread2.iptc(), reread.iptc());
    assert_eq!(reread2.xmp_packet(), reread.xmp_packet());
}

#[test]
fn icc_profile_round_trip() {
    let profile: Vec<u8> = {
        // An opaque profile whose first field is its own length.
        let mut p = (64u32).to_be_bytes().to_vec();
        p.extend(std::iter::repeat(0x5A).take(60));
        p
    };

    let mut image = read(&blank());
    image.set_icc_profile(profile.clone());
    let out = write(&mut image, &blank());

    let reread = read(&out);
    assert_eq!(reread.icc_profile(), Some(profile.as_slice()));
}

#[test]
fn exif_prefix_tolerated_and_not_propagated() {
    let mut donor = Jp2Image::new();
    donor.exif_mut().set_primary(ExifTag::ascii(0x010F, "maker"));
    let clean = write(&mut donor, &blank());
    let reread = read(&clean);

    // Locate the written Exif TIFF payload and re-wrap it behind the
    // non-standard Exif\0\0 prefix.
    let boxes = box_list(&clean);
    let (at, _, length) = boxes
        .iter()
        .find(|(_, f, _)| f == "uuid")
        .cloned()
        .unwrap();
    let tiff = &clean[at + 24..at + length];
    let mut prefixed_payload = b"Exif\x00\x00".to_vec();
    prefixed_payload.extend_from_slice(tiff);
    let prefixed =
        blank_with_box(&uuid_box(b"JpgTiffExif->JP2", &prefixed_payload));

    let mut image = read(&prefixed);
    assert_eq!(image.exif(), reread.exif());
    assert!(image
        .warnings()
        .iter()
        .any(|w| w.contains("non-standard")));

    // The rewrite emits a bare TIFF stream again.
    let out = write(&mut image, &prefixed);
    let out_boxes = box_list(&out);
    let (at2, _, _) = out_boxes
        .iter()
        .find(|(_, f, _)| f == "uuid")
        .cloned()
        .unwrap();
    assert_eq!(&out[at2 + 24..at2 + 26], b"II");
}

#[test]
fn xmp_leading_garbage_trimmed() {
    let mut payload = b"\x00\x00garbage".to_vec();
    payload.extend_from_slice(SAMPLE_PACKET.as_bytes());
    let input = blank_with_box(&uuid_box(&XMP_UUID, &payload));

    let image = read(&input);
    assert!(image.xmp_packet().starts_with("<?xpacket"));
    assert!(image
        .warnings()
        .iter()
        .any(|w| w.contains("beginning of the XMP packet")));
}

#[test]
fn xmp_payload_without_markup_warns_and_keeps_packet() {
    let garbage = b"no markup at all";
    let input = blank_with_box(&uuid_box(&XMP_UUID, garbage));

    let image = read(&input);
    // The packet is kept untouched; the decode attempt fails and warns.
    assert_eq!(image.xmp_packet().as_bytes(), garbage);
    assert!(image.xmp().is_empty());
    assert!(image
        .warnings()
        .iter()
        .any(|w| w.contains("failed to decode XMP metadata")));
}

#[test]
fn exif_payload_without_tiff_marker_is_ignored() {
    // Longer than 8 bytes, no byte-order marker, no Exif header anywhere:
    // there is nothing to decode, so nothing happens.
    let input = blank_with_box(&uuid_box(b"JpgTiffExif->JP2", b"ABCDEFGHIJKL"));

    let image = read(&input);
    assert!(image.exif().is_empty());
    assert!(image.warnings().is_empty());
}

#[test]
fn short_exif_payload_warns_and_clears() {
    let input = blank_with_box(&uuid_box(b"JpgTiffExif->JP2", b"\x01\x02\x03"));

    let image = read(&input);
    assert!(image.exif().is_empty());
    assert!(image
        .warnings()
        .iter()
        .any(|w| w.contains("failed to decode Exif metadata")));
}

#[test]
fn box_count_ceiling_enforced() {
    let base = blank();
    let mut bytes = base[..BLANK_JP2C_START].to_vec();
    for _ in 0..1001 {
        bytes.extend_from_slice(&8u32.to_be_bytes());
        bytes.extend_from_slice(b"free");
    }

    let mut image = Jp2Image::new();
    assert!(matches!(
        image.read_metadata(&mut Cursor::new(bytes)),
        Err(MetaError::CorruptedMetadata)
    ));
}

#[test]
fn image_header_bad_compression_rejected() {
    let mut bytes = blank();
    // ihdr payload starts at 48; the compression type byte is at offset 11.
    bytes[59] = 8;
    let mut image = Jp2Image::new();
    assert!(matches!(
        image.read_metadata(&mut Cursor::new(bytes)),
        Err(MetaError::CorruptedMetadata)
    ));
}

#[test]
fn color_spec_bad_enumeration_rejected() {
    let mut bytes = blank();
    // colr enumCS field; only 16 (sRGB) and 17 (greyscale) are accepted.
    bytes[73..77].copy_from_slice(&5u32.to_be_bytes());
    let mut image = Jp2Image::new();
    assert!(matches!(
        image.read_metadata(&mut Cursor::new(bytes)),
        Err(MetaError::CorruptedMetadata)
    ));
}

#[test]
fn truncated_box_length_rejected() {
    let mut bytes = blank();
    // Stretch the jp2h length beyond the end of the file.
    bytes[BLANK_JP2H_START..BLANK_JP2H_START + 4].copy_from_slice(&500u32.to_be_bytes());
    let mut image = Jp2Image::new();
    assert!(matches!(
        image.read_metadata(&mut Cursor::new(bytes)),
        Err(MetaError::CorruptedMetadata)
    ));
}

#[test]
fn top_level_box_lengths_cover_file() {
    let input = blank();
    let boxes = box_list(&input);
    let total: usize = boxes.iter().map(|(_, _, len)| len).sum();
    assert_eq!(total, input.len());
    let mut image = Jp2Image::new();
    image.read_metadata(&mut Cursor::new(input)).unwrap();
}

#[test]
fn print_structure_walks_and_labels() {
    let input = blank_with_box(&uuid_box(&XMP_UUID, SAMPLE_PACKET.as_bytes()));
    let mut image = Jp2Image::new();

    let mut out = Vec::new();
    image
        .print_structure(&mut Cursor::new(input.clone()), &mut out, PrintOption::Basic, 0)
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("jp2h"));
    assert!(text.contains("XMP : "));
    assert!(text.contains("jp2c"));

    // The XMP-only mode dumps the raw packet.
    let mut out = Vec::new();
    image
        .print_structure(&mut Cursor::new(input), &mut out, PrintOption::Xmp, 0)
        .unwrap();
    assert_eq!(out, SAMPLE_PACKET.as_bytes());
}

#[test]
fn setting_same_packet_twice_writes_identically() {
    let mut image = Jp2Image::new();
    image.set_xmp_packet(SAMPLE_PACKET);
    let out1 = write(&mut image, &blank());
    image.set_xmp_packet(SAMPLE_PACKET);
    let out2 = write(&mut image, &blank());
    assert_eq!(out1, out2);
}
