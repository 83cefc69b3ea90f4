//! Diagnostic sink for non-fatal conditions
//!
//! Codec decode failures and tolerated irregularities do not abort a read;
//! they are recorded here and mirrored to the `log` facade so embedders can
//! inspect them either way.

/// Collector for non-fatal warnings raised during read and write operations.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    /// Create an empty diagnostic sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and mirror it to `log::warn!`.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.warnings.push(message);
    }

    /// All warnings recorded so far, oldest first.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Discard all recorded warnings.
    pub fn clear(&mut self) {
        self.warnings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut diag = Diagnostics::new();
        diag.warn("first");
        diag.warn(format!("second {}", 2));
        assert_eq!(diag.warnings(), ["first", "second 2"]);

        diag.clear();
        assert!(diag.warnings().is_empty());
    }
}
