//! Format handler trait
//!
//! Formats are modelled as a small capability seam instead of an
//! inheritance hierarchy: a handler can probe a stream and construct the
//! matching [`Image`](crate::formats::Image) variant, which then carries
//! the read/write/print operations.

use crate::core::error::MetaResult;
use crate::formats::Image;
use std::io::{Read, Seek};

/// Trait implemented by every format handler.
pub trait ImageHandler {
    /// Check if this handler understands the given stream.
    ///
    /// Peeks at the stream header and restores the position; the reader is
    /// not consumed.
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> MetaResult<bool>;

    /// Construct an empty image of this handler's format.
    fn new_image(&self) -> Image;

    /// MIME type of the handled format (e.g. "image/jp2").
    fn mime_type(&self) -> &'static str;

    /// File extensions this handler matches (e.g. &["jp2"]).
    fn extensions(&self) -> &'static [&'static str];
}
