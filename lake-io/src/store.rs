use std::fmt::{Display, Formatter};
use std::ops::Range;
use std::path::Path as FsPath;
use std::sync::Arc;
use std::{fmt, path};

use bytes::Bytes;
use dashmap::DashMap;
use lake_error::{LakeError, LakeResult, lake_err};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use url::{Position, Url};

use crate::FileInfo;

/// A handle to one storage backend, keyed by the scheme and authority of its URL.
///
/// Locations handed to a [`FileSystem`] are full URLs (or plain filesystem paths); the backend
/// addresses objects by the path component only.
#[derive(Debug, Clone)]
pub struct FileSystem {
    url: Url,
    store: Arc<dyn ObjectStore>,
}

pub type FileSystemRef = Arc<FileSystem>;

impl FileSystem {
    pub fn new(url: Url, store: Arc<dyn ObjectStore>) -> Self {
        Self { url, store }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    /// Translate a location into the object path understood by the backend.
    pub fn path_of(&self, location: &str) -> LakeResult<Path> {
        let url = parse_location(location)?;
        Path::from_url_path(url.path())
            .map_err(|err| LakeError::from(object_store::Error::from(err)))
    }

    /// Size of `file`, trusting the metadata when it carries one.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn size(&self, file: &FileInfo) -> LakeResult<u64> {
        if let Some(size) = file.size {
            return Ok(size);
        }
        let meta = self.store.head(&self.path_of(&file.path)?).await?;
        Ok(meta.size)
    }

    pub async fn read(&self, location: &str) -> LakeResult<Bytes> {
        let path = self.path_of(location)?;
        Ok(self.store.get(&path).await?.bytes().await?)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub async fn read_range(&self, location: &str, range: Range<u64>) -> LakeResult<Bytes> {
        let path = self.path_of(location)?;
        Ok(self.store.get_range(&path, range).await?)
    }

    pub async fn write(&self, location: &str, bytes: Bytes) -> LakeResult<()> {
        let path = self.path_of(location)?;
        self.store.put(&path, PutPayload::from(bytes)).await?;
        Ok(())
    }
}

impl Display for FileSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "file system at {}", self.url)
    }
}

/// Resolves locations to [`FileSystem`]s, creating each backend at most once.
///
/// Backends that cannot be built from a URL alone (or that tests want to share, like an
/// in-memory store) can be registered up front.
#[derive(Debug, Default)]
pub struct FileSystemRegistry {
    file_systems: DashMap<String, FileSystemRef>,
}

impl FileSystemRegistry {
    pub fn register(&self, url: &Url, store: Arc<dyn ObjectStore>) -> FileSystemRef {
        let fs = Arc::new(FileSystem::new(base_url(url), store));
        self.file_systems.insert(store_key(url), fs.clone());
        fs
    }

    pub fn resolve(&self, location: &str) -> LakeResult<FileSystemRef> {
        let url = parse_location(location)?;
        let key = store_key(&url);
        if let Some(fs) = self.file_systems.get(&key) {
            return Ok(fs.clone());
        }

        let (store, _) = object_store::parse_url(&url)?;
        log::debug!("Created object store for {key}");
        let fs = self
            .file_systems
            .entry(key)
            .or_insert_with(|| Arc::new(FileSystem::new(base_url(&url), Arc::from(store))))
            .clone();
        Ok(fs)
    }
}

/// Parse a location that is either a URL or a filesystem path.
pub fn parse_location(location: &str) -> LakeResult<Url> {
    match Url::parse(location) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let absolute = path::absolute(FsPath::new(location))?;
            Url::from_file_path(&absolute).map_err(|_| {
                lake_err!(InvalidArgument: "cannot express {} as a file URL", absolute.display())
            })
        }
        Err(err) => Err(err.into()),
    }
}

fn store_key(url: &Url) -> String {
    url[..Position::BeforePath].to_string()
}

fn base_url(url: &Url) -> Url {
    let mut base = url.clone();
    base.set_path("/");
    base.set_query(None);
    base.set_fragment(None);
    base
}
