use lake_io::DEFAULT_FOOTER_SIZE_HINT;

/// Default weighted capacity of the shared segment handle cache.
pub const DEFAULT_SEGMENT_CACHE_CAPACITY: u64 = 64 << 20;

/// Process-wide settings of the lake read path.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LakeConfig {
    /// Skip segment files that no longer exist instead of failing the load.
    ///
    /// Compaction and vacuum may delete files still listed by an older metadata snapshot.
    pub ignore_lost_segment: bool,
    /// Submit segment loads to the tablet manager's load pool.
    pub enable_load_segment_parallel: bool,
    /// Initial footer read size handed to the segment store.
    pub footer_size_hint: u64,
    /// Weighted capacity of the shared segment handle cache.
    pub segment_cache_capacity: u64,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            ignore_lost_segment: false,
            enable_load_segment_parallel: false,
            footer_size_hint: DEFAULT_FOOTER_SIZE_HINT,
            segment_cache_capacity: DEFAULT_SEGMENT_CACHE_CAPACITY,
        }
    }
}

impl LakeConfig {
    pub fn with_ignore_lost_segment(mut self, ignore_lost_segment: bool) -> Self {
        self.ignore_lost_segment = ignore_lost_segment;
        self
    }

    pub fn with_load_segment_parallel(mut self, enable: bool) -> Self {
        self.enable_load_segment_parallel = enable;
        self
    }

    pub fn with_footer_size_hint(mut self, footer_size_hint: u64) -> Self {
        self.footer_size_hint = footer_size_hint;
        self
    }

    pub fn with_segment_cache_capacity(mut self, capacity: u64) -> Self {
        self.segment_cache_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_strict_and_serial() {
        let config = LakeConfig::default();
        assert!(!config.ignore_lost_segment);
        assert!(!config.enable_load_segment_parallel);
        assert_eq!(config.footer_size_hint, 16 * 1024);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_config_keeps_defaults() {
        let config: LakeConfig =
            serde_json::from_str(r#"{"ignore_lost_segment": true}"#).unwrap();
        assert!(config.ignore_lost_segment);
        assert_eq!(config.segment_cache_capacity, DEFAULT_SEGMENT_CACHE_CAPACITY);
    }
}
