use std::future::Future;

use arrow_array::RecordBatch;
use arrow_select::concat::concat_batches;
use futures::TryStreamExt;
use lake_error::LakeResult;

use super::{ChunkStream, SendableChunkStream};

pub trait ChunkStreamExt: ChunkStream {
    /// Collect every chunk of the stream.
    fn collect_batches(self) -> impl Future<Output = LakeResult<Vec<RecordBatch>>>
    where
        Self: Sized,
    {
        self.try_collect()
    }

    /// Collect the stream into a single chunk.
    fn collect_batch(self) -> impl Future<Output = LakeResult<RecordBatch>>
    where
        Self: Sized,
    {
        async move {
            let schema = self.schema().clone();
            let batches: Vec<RecordBatch> = self.try_collect().await?;
            Ok(concat_batches(&schema, &batches)?)
        }
    }

    fn into_sendable(self) -> SendableChunkStream
    where
        Self: Sized + Send + 'static,
    {
        Box::pin(self)
    }
}

impl<S: ChunkStream> ChunkStreamExt for S {}
