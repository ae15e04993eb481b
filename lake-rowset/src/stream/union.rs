use futures::{StreamExt, stream};
use lake_error::{LakeResult, lake_bail};

use super::{ChunkStream, ChunkStreamAdapter, ChunkStreamExt, SendableChunkStream};

/// Concatenate `streams`, draining each one before starting the next.
///
/// All streams must share a schema.
pub fn new_union_stream(streams: Vec<SendableChunkStream>) -> LakeResult<SendableChunkStream> {
    let Some(first) = streams.first() else {
        lake_bail!(InvalidArgument: "cannot union zero streams");
    };
    let schema = first.schema().clone();
    if let Some(other) = streams
        .iter()
        .find(|s| s.schema().fields() != schema.fields())
    {
        lake_bail!(
            InvalidArgument: "cannot union streams with different schemas: {} vs {}",
            schema,
            other.schema()
        );
    }
    Ok(ChunkStreamAdapter::new(schema, stream::iter(streams).flatten()).into_sendable())
}
