//! Channel configuration.

/// Configuration for an [`EventChannel`](crate::EventChannel).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Whether `*` and `**` segments act as wildcards.
    pub wildcard: bool,
    /// Listener count per pattern above which a warning is logged (0 = unlimited).
    pub max_listeners: usize,
    /// Segment delimiter for hierarchical names.
    pub delimiter: char,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            wildcard: true,
            max_listeners: 0,
            delimiter: '.',
        }
    }
}

impl ChannelConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables wildcard matching.
    #[must_use]
    pub fn with_wildcard(mut self, enabled: bool) -> Self {
        self.wildcard = enabled;
        self
    }

    /// Sets the listener warning threshold.
    #[must_use]
    pub fn with_max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = max;
        self
    }

    /// Sets the segment delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}
