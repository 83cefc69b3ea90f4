//! Read and rewrite embedded metadata in JPEG 2000 (JP2) containers.
//!
//! Three metadata dialects are understood: Exif (a TIFF stream), IPTC IIM
//! and XMP (an RDF/XML packet). They travel inside JP2 UUID boxes keyed by
//! well-known 16-byte identifiers. The crate walks the box stream with
//! every length validated against the file envelope, decodes the metadata
//! into plain stores, and can rewrite a file with updated metadata while
//! preserving all other boxes bit-exactly.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use jp2kit::{Jp2Image, XmpValue};
//!
//! # fn main() -> jp2kit::MetaResult<()> {
//! // Start from the blank template, attach an XMP property, rewrite.
//! let mut blank = Cursor::new(Vec::new());
//! Jp2Image::create_empty(&mut blank)?;
//!
//! let mut image = Jp2Image::new();
//! blank.set_position(0);
//! image.read_metadata(&mut blank)?;
//! image.xmp_mut().set("dc:title", XmpValue::Text("hello".into()));
//!
//! let mut out = Cursor::new(Vec::new());
//! blank.set_position(0);
//! image.write_metadata(&mut blank, &mut out)?;
//!
//! // The new file carries the XMP packet right after the JP2 Header box.
//! let mut check = Jp2Image::new();
//! out.set_position(0);
//! check.read_metadata(&mut out)?;
//! assert_eq!(check.xmp().get("dc:title"), image.xmp().get("dc:title"));
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod formats;
pub mod io;
pub mod metadata;

pub use crate::core::diag::Diagnostics;
pub use crate::core::error::{MetaError, MetaResult};
pub use crate::formats::{
    default_registry, Handler, HandlerRegistry, Image, ImageHandler, Jp2Handler, Jp2Image,
    PrintOption,
};
pub use crate::io::BoundedReader;
pub use crate::metadata::{
    ByteOrder, ExifStore, ExifTag, IptcCodec, IptcDataset, IptcStore, TiffCodec, XmpCodec,
    XmpStore, XmpValue,
};
