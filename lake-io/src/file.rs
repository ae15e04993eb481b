use bytes::Bytes;

/// Descriptor of a segment file as known from metadata.
///
/// Only the path is mandatory. A known size spares the reader a `HEAD` request, and an
/// encryption meta blob is forwarded untouched to the segment decoder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub path: String,
    pub size: Option<u64>,
    pub encryption_meta: Option<Bytes>,
}

impl FileInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_encryption_meta(mut self, meta: Bytes) -> Self {
        self.encryption_meta = Some(meta);
        self
    }

    /// The last path component, used as the segment name in log messages.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Options that govern how segment bytes are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LakeIoOptions {
    /// Whether fetched data pages should populate the local data cache.
    pub fill_data_cache: bool,
    /// Read buffer size in bytes. The segment reader picks its own when absent.
    pub buffer_size: Option<u64>,
}

impl Default for LakeIoOptions {
    fn default() -> Self {
        Self {
            fill_data_cache: true,
            buffer_size: None,
        }
    }
}

impl LakeIoOptions {
    pub fn with_fill_data_cache(mut self, fill_data_cache: bool) -> Self {
        self.fill_data_cache = fill_data_cache;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: u64) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_last_component() {
        let info = FileInfo::new("memory:///tablets/10/data/seg_1.dat").with_size(42);
        assert_eq!(info.file_name(), "seg_1.dat");
        assert_eq!(info.size, Some(42));
        assert_eq!(FileInfo::new("seg_2.dat").file_name(), "seg_2.dat");
    }

    #[test]
    fn io_options_default_to_caching() {
        let opts = LakeIoOptions::default();
        assert!(opts.fill_data_cache);
        assert!(!opts.with_fill_data_cache(false).fill_data_cache);
        assert_eq!(opts.buffer_size, None);
        assert_eq!(opts.with_buffer_size(1 << 20).buffer_size, Some(1 << 20));
    }
}
