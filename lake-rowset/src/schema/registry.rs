use dashmap::DashMap;
use lake_error::LakeResult;

use super::{TabletSchema, TabletSchemaRef};
use crate::metadata::TabletSchemaPb;

/// Interns parsed schemas by schema id.
///
/// Schemas are immutable once assigned an id, so every rowset bound to the same id shares one
/// [`TabletSchemaRef`].
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: DashMap<i64, TabletSchemaRef>,
}

impl SchemaRegistry {
    pub fn get(&self, schema_id: i64) -> Option<TabletSchemaRef> {
        self.schemas.get(&schema_id).map(|s| s.clone())
    }

    pub fn get_or_insert(&self, pb: &TabletSchemaPb) -> LakeResult<TabletSchemaRef> {
        if let Some(schema) = self.get(pb.id) {
            return Ok(schema);
        }
        let parsed = TabletSchemaRef::new(TabletSchema::from_pb(pb)?);
        Ok(self.schemas.entry(pb.id).or_insert(parsed).clone())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::ColumnPb;

    #[test]
    fn same_id_is_shared() {
        let registry = SchemaRegistry::default();
        let pb = TabletSchemaPb {
            id: 3,
            column: vec![ColumnPb {
                name: "a".to_string(),
                r#type: "INT".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let first = registry.get_or_insert(&pb).unwrap();
        let second = registry.get_or_insert(&pb).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }
}
