//! Image format support
//!
//! Each supported container format gets a handler (detection, image
//! construction) and an image type carrying the metadata operations. The
//! [`Image`] enum is the tagged variant over format kinds; JPEG 2000 is the
//! only member.

use crate::core::error::MetaResult;
use std::io::{Read, Seek, Write};

pub mod handler;
pub mod jp2;
pub mod registry;

pub use handler::ImageHandler;
pub use jp2::{Jp2Handler, Jp2Image, PrintOption};
pub use registry::{default_registry, Handler, HandlerRegistry};

/// An image of any supported format, dispatching the metadata operations.
pub enum Image {
    Jp2(Jp2Image),
}

impl Image {
    /// Read all metadata from `source` into the image state.
    pub fn read_metadata<R: Read + Seek>(&mut self, source: &mut R) -> MetaResult<()> {
        match self {
            Image::Jp2(image) => image.read_metadata(source),
        }
    }

    /// Rewrite `source` into `sink` with the current metadata state.
    pub fn write_metadata<R: Read + Seek, W: Write>(
        &mut self,
        source: &mut R,
        sink: &mut W,
    ) -> MetaResult<()> {
        match self {
            Image::Jp2(image) => image.write_metadata(source, sink),
        }
    }

    /// Emit a human-readable dump of the container structure.
    pub fn print_structure<R: Read + Seek, W: Write>(
        &mut self,
        source: &mut R,
        out: &mut W,
        option: PrintOption,
        depth: usize,
    ) -> MetaResult<()> {
        match self {
            Image::Jp2(image) => image.print_structure(source, out, option, depth),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Image::Jp2(image) => image.mime_type(),
        }
    }

    pub fn set_comment(&mut self, comment: &str) -> MetaResult<()> {
        match self {
            Image::Jp2(image) => image.set_comment(comment),
        }
    }

    pub fn good(&self) -> bool {
        match self {
            Image::Jp2(image) => image.good(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::jp2::boxes::JP2_BLANK;
    use std::io::Cursor;

    #[test]
    fn test_image_dispatch() {
        let handler = Jp2Handler;
        let mut image = handler.new_image();
        assert_eq!(image.mime_type(), "image/jp2");
        assert!(image.good());
        assert!(image.set_comment("nope").is_err());

        let mut source = Cursor::new(JP2_BLANK.to_vec());
        image.read_metadata(&mut source).unwrap();
    }
}
