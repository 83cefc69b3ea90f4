//! Format handler registry
//!
//! Handlers can be looked up by file extension or by content detection.
//! JPEG 2000 is the only format registered; the registry is the extension
//! point for others.

use crate::core::error::MetaResult;
use crate::formats::handler::ImageHandler;
use crate::formats::jp2::Jp2Handler;
use crate::formats::Image;
use std::io::{Read, Seek};

/// Enum of registered format handlers.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Handler {
    Jp2(Jp2Handler),
}

impl ImageHandler for Handler {
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> MetaResult<bool> {
        match self {
            Handler::Jp2(h) => h.can_handle(reader),
        }
    }

    fn new_image(&self) -> Image {
        match self {
            Handler::Jp2(h) => h.new_image(),
        }
    }

    fn mime_type(&self) -> &'static str {
        match self {
            Handler::Jp2(h) => h.mime_type(),
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Handler::Jp2(h) => h.extensions(),
        }
    }
}

/// Registry of format handlers.
pub struct HandlerRegistry {
    handlers: Vec<Handler>,
}

impl HandlerRegistry {
    /// Create a registry with the default handlers registered.
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: Vec::new(),
        };
        registry.register(Handler::Jp2(Jp2Handler));
        registry
    }

    pub fn register(&mut self, handler: Handler) {
        self.handlers.push(handler);
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Find a handler by file extension, case-insensitively.
    pub fn find_by_extension(&self, extension: &str) -> Option<&Handler> {
        let ext = extension.to_lowercase();
        self.handlers
            .iter()
            .find(|h| h.extensions().iter().any(|e| *e == ext))
    }

    /// Find a handler by probing the stream content.
    ///
    /// The stream position is restored regardless of the outcome.
    pub fn find_by_detection<R: Read + Seek>(&self, reader: &mut R) -> MetaResult<Option<&Handler>> {
        let saved = reader.stream_position()?;
        for handler in &self.handlers {
            reader.seek(std::io::SeekFrom::Start(saved))?;
            if handler.can_handle(reader)? {
                reader.seek(std::io::SeekFrom::Start(saved))?;
                return Ok(Some(handler));
            }
        }
        reader.seek(std::io::SeekFrom::Start(saved))?;
        Ok(None)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The registry with all built-in handlers.
pub fn default_registry() -> HandlerRegistry {
    HandlerRegistry::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::jp2::boxes::JP2_BLANK;
    use std::io::Cursor;

    #[test]
    fn test_find_by_extension() {
        let registry = HandlerRegistry::new();
        assert!(registry.find_by_extension("jp2").is_some());
        assert!(registry.find_by_extension("JP2").is_some());
        assert!(registry.find_by_extension("jpg").is_none());
    }

    #[test]
    fn test_find_by_detection_jp2() {
        let registry = HandlerRegistry::new();
        let mut reader = Cursor::new(JP2_BLANK.to_vec());
        let handler = registry.find_by_detection(&mut reader).unwrap();
        assert!(handler.is_some());
        assert_eq!(handler.unwrap().mime_type(), "image/jp2");
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_find_by_detection_rejects_jpeg() {
        let registry = HandlerRegistry::new();
        let mut reader = Cursor::new(vec![0xFF, 0xD8, 0xFF, 0xE0]);
        assert!(registry.find_by_detection(&mut reader).unwrap().is_none());
    }
}
