use crate::error::{Error, Result};

/// Configuration options for [`SegmentedLog`](crate::SegmentedLog).
///
/// # Examples
///
/// ```
/// use segmented_aof::LogOptions;
///
/// let options = LogOptions::default()
///     .segment_size_limit(4 * 1024 * 1024)
///     .retained_segment_count(5);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Maximum bytes a segment may hold before the next append rotates it
    pub segment_size_limit: u64,
    /// Maximum number of segment files kept on disk, active one included
    pub retained_segment_count: u64,
    /// If true, every append is fsynced before returning
    pub sync_on_append: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            segment_size_limit: 64 * 1024 * 1024, // 64 MB
            retained_segment_count: 10,
            sync_on_append: true,
        }
    }
}

impl LogOptions {
    /// Creates options with a custom segment size limit.
    ///
    /// ```
    /// use segmented_aof::LogOptions;
    ///
    /// let options = LogOptions::with_segment_size_limit(1024);
    /// assert_eq!(options.segment_size_limit, 1024);
    /// ```
    pub fn with_segment_size_limit(limit: u64) -> Self {
        Self {
            segment_size_limit: limit,
            ..Default::default()
        }
    }

    /// Creates options with a custom retained segment count.
    pub fn with_retained_segment_count(count: u64) -> Self {
        Self {
            retained_segment_count: count,
            ..Default::default()
        }
    }

    /// Sets the segment size limit (chainable).
    pub fn segment_size_limit(mut self, limit: u64) -> Self {
        self.segment_size_limit = limit;
        self
    }

    /// Sets the retained segment count (chainable).
    pub fn retained_segment_count(mut self, count: u64) -> Self {
        self.retained_segment_count = count;
        self
    }

    /// Sets whether each append is fsynced (chainable).
    pub fn sync_on_append(mut self, sync: bool) -> Self {
        self.sync_on_append = sync;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if:
    /// - `segment_size_limit` is zero
    /// - `retained_segment_count` is zero
    pub fn validate(&self) -> Result<()> {
        if self.segment_size_limit == 0 {
            return Err(Error::Config(
                "segment_size_limit must be greater than 0".to_string(),
            ));
        }
        if self.retained_segment_count == 0 {
            return Err(Error::Config(
                "retained_segment_count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(LogOptions::default().validate().is_ok());
    }

    #[test]
    fn zero_size_limit_rejected() {
        let err = LogOptions::with_segment_size_limit(0).validate().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("segment_size_limit")));
    }

    #[test]
    fn zero_retention_rejected() {
        let err = LogOptions::with_retained_segment_count(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("retained_segment_count")));
    }

    #[test]
    fn setters_chain() {
        let options = LogOptions::default()
            .segment_size_limit(100)
            .retained_segment_count(2)
            .sync_on_append(false);
        assert_eq!(options.segment_size_limit, 100);
        assert_eq!(options.retained_segment_count, 2);
        assert!(!options.sync_on_append);
    }
}
