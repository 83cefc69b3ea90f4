//! Metadata dialects carried by JP2 UUID boxes
//!
//! Three dialects are understood: Exif (a TIFF stream), IPTC IIM (marker
//! datasets) and XMP (an RDF/XML packet). Each module pairs a store with
//! the codec the JP2 dispatcher invokes on raw box payloads.

pub mod exif;
pub mod iptc;
pub mod xmp;

pub use exif::{ByteOrder, ExifStore, ExifTag, TiffCodec};
pub use iptc::{IptcCodec, IptcDataset, IptcStore};
pub use xmp::{XmpCodec, XmpStore, XmpValue};
