//! Cache errors.

/// Failure converting a payload to or from its stored form.
///
/// Neither variant changes store state: an unencodable value is never
/// committed and a mismatched read leaves the slot as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The value could not be serialized.
    #[error("payload for '{key}' could not be encoded: {message}")]
    Encode {
        /// Metric key.
        key: String,
        /// Serializer message.
        message: String,
    },
    /// A stored payload does not decode as the requested type.
    #[error("payload for '{key}' does not match the requested type: {message}")]
    PayloadMismatch {
        /// Metric key.
        key: String,
        /// Deserializer message.
        message: String,
    },
}

impl CacheError {
    /// Key of the slot involved.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Encode { key, .. } | Self::PayloadMismatch { key, .. } => key,
        }
    }
}
