//! Parser configuration.
//!
//! [`ParseConfig`] carries the knobs a parse session honors. The defaults
//! reproduce the reference behavior exactly; the only optional behavior is
//! best-effort omitted-media inference, which ships disabled.
//!
//! # Example
//!
//! ```rust
//! use chatweave::config::ParseConfig;
//!
//! let config = ParseConfig::new().with_infer_omitted_media(true);
//! assert!(config.infer_omitted_media);
//! ```

use serde::{Deserialize, Serialize};

/// Number of leading records sampled when voting on date-field order.
pub const DATE_ORDER_SAMPLE: usize = 300;

/// Longest candidate sender name accepted by the classifier, in characters.
/// Longer candidates mean the `": "` came from the message body, not a name.
pub const MAX_SENDER_CHARS: usize = 80;

/// Configuration for a parse session.
///
/// # Example
///
/// ```rust
/// use chatweave::config::ParseConfig;
///
/// let config = ParseConfig::default();
/// assert!(!config.infer_omitted_media);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Attempt to map filename-less "omitted" placeholders onto unused media
    /// records by kind hint (default: false).
    ///
    /// Off by default: without a filename the mapping has no reliable
    /// correctness basis, so a wrong guess silently shows the wrong photo.
    pub infer_omitted_media: bool,
}

impl ParseConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables best-effort omitted-media inference.
    #[must_use]
    pub fn with_infer_omitted_media(mut self, enabled: bool) -> Self {
        self.infer_omitted_media = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keeps_inference_off() {
        let config = ParseConfig::default();
        assert!(!config.infer_omitted_media);
    }

    #[test]
    fn test_builder() {
        let config = ParseConfig::new().with_infer_omitted_media(true);
        assert!(config.infer_omitted_media);
    }
}
