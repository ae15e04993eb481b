use arrow_array::{RecordBatch, RecordBatchOptions};
use arrow_schema::SchemaRef;
use futures::StreamExt;
use lake_error::{LakeResult, lake_err};

use super::{ChunkStreamAdapter, ChunkStreamExt, SendableChunkStream};
use crate::stream::ChunkStream;

/// Re-expose only the columns of `schema`, looked up by name in `inner`.
pub fn new_projection_stream(
    schema: SchemaRef,
    inner: SendableChunkStream,
) -> LakeResult<SendableChunkStream> {
    let indices = schema
        .fields()
        .iter()
        .map(|field| {
            inner.schema().index_of(field.name()).map_err(|_| {
                lake_err!(InvalidArgument: "projected column {} is not produced by the input", field.name())
            })
        })
        .collect::<LakeResult<Vec<_>>>()?;

    let output_schema = schema.clone();
    let projected = inner.map(move |chunk| {
        let chunk = chunk?;
        let columns = indices.iter().map(|i| chunk.column(*i).clone()).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(chunk.num_rows()));
        Ok(RecordBatch::try_new_with_options(
            output_schema.clone(),
            columns,
            &options,
        )?)
    });
    Ok(ChunkStreamAdapter::new(schema, projected).into_sendable())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::Int32Array;
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int32Type;
    use arrow_schema::{DataType, Field, Schema};
    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn projection_drops_extra_columns() {
        let full = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int32, false),
            Field::new("b", DataType::Int32, false),
            Field::new("c", DataType::Int32, false),
        ]));
        let batch = RecordBatch::try_new(
            full.clone(),
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(Int32Array::from(vec![3, 4])),
                Arc::new(Int32Array::from(vec![5, 6])),
            ],
        )
        .unwrap();
        let inner =
            ChunkStreamAdapter::new(full, stream::iter([LakeResult::Ok(batch)])).into_sendable();

        let wanted = Arc::new(Schema::new(vec![
            Field::new("b", DataType::Int32, false),
            Field::new("a", DataType::Int32, false),
        ]));
        let out = new_projection_stream(wanted.clone(), inner)
            .unwrap()
            .collect_batch()
            .await
            .unwrap();
        assert_eq!(out.schema(), wanted);
        assert_eq!(out.column(0).as_primitive::<Int32Type>().values().to_vec(), vec![3, 4]);
    }

    #[test]
    fn unknown_column_is_rejected() {
        let full = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, false)]));
        let inner = ChunkStreamAdapter::new(full, stream::empty::<LakeResult<RecordBatch>>())
            .into_sendable();
        let wanted = Arc::new(Schema::new(vec![Field::new("z", DataType::Int32, false)]));
        assert!(new_projection_stream(wanted, inner).is_err());
    }
}
