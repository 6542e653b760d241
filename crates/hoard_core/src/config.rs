//! Engine configuration.

use crate::codec::Encoding;

/// Configuration for opening an engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to hold an advisory lock on `<root>/LOCK` while open.
    ///
    /// The engine never coordinates between processes by itself; the lock
    /// only keeps a second engine from opening the same directory.
    pub use_lock: bool,

    /// Encoding of records on durable storage.
    pub encoding: Encoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            use_lock: false,
            encoding: Encoding::Json,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to hold the advisory directory lock.
    #[must_use]
    pub const fn use_lock(mut self, value: bool) -> Self {
        self.use_lock = value;
        self
    }

    /// Sets the record encoding.
    #[must_use]
    pub const fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.use_lock);
        assert_eq!(config.encoding, Encoding::Json);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .use_lock(true)
            .encoding(Encoding::Cbor);

        assert!(!config.create_if_missing);
        assert!(config.use_lock);
        assert_eq!(config.encoding, Encoding::Cbor);
    }
}
