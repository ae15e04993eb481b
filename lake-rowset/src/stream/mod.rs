//! Streams of [`RecordBatch`] chunks produced by segment readers.

mod adapter;
mod ext;
mod projection;
mod union;

use std::pin::Pin;

pub use adapter::*;
use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
pub use ext::*;
use futures::Stream;
use lake_error::LakeResult;
pub use projection::*;
pub use union::*;

/// A stream of chunks along with their schema.
///
/// Can be thought of as an async equivalent of Arrow's `RecordBatchReader`.
pub trait ChunkStream: Stream<Item = LakeResult<RecordBatch>> {
    fn schema(&self) -> &SchemaRef;
}

/// A [`ChunkStream`] that can be passed between threads.
pub type SendableChunkStream = Pin<Box<dyn ChunkStream + Send>>;

impl ChunkStream for SendableChunkStream {
    fn schema(&self) -> &SchemaRef {
        (**self).schema()
    }
}
