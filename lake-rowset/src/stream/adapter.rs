use std::pin::Pin;
use std::task::{Context, Poll};

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use futures::{Stream, ready};
use lake_error::LakeResult;
use pin_project::pin_project;

use super::ChunkStream;

/// An adapter for a stream of chunks to implement a [`ChunkStream`].
#[pin_project]
pub struct ChunkStreamAdapter<S> {
    schema: SchemaRef,
    #[pin]
    inner: S,
}

impl<S> ChunkStreamAdapter<S> {
    pub fn new(schema: SchemaRef, inner: S) -> Self {
        Self { schema, inner }
    }
}

impl<S> ChunkStream for ChunkStreamAdapter<S>
where
    S: Stream<Item = LakeResult<RecordBatch>>,
{
    fn schema(&self) -> &SchemaRef {
        &self.schema
    }
}

impl<S> Stream for ChunkStreamAdapter<S>
where
    S: Stream<Item = LakeResult<RecordBatch>>,
{
    type Item = LakeResult<RecordBatch>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let chunk = ready!(this.inner.poll_next(cx));
        if let Some(Ok(chunk)) = chunk.as_ref() {
            debug_assert_eq!(chunk.schema().fields(), this.schema.fields());
        }

        Poll::Ready(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
