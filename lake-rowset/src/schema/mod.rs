//! Tablet schemas and their Arrow projections.

mod augment;
mod registry;

use std::sync::Arc;

use arrow_schema::{DataType, Field, FieldRef, Schema, SchemaRef, TimeUnit};
pub use augment::*;
use lake_error::{LakeResult, lake_bail, lake_err};
pub use registry::*;

use crate::metadata::{ColumnPb, KeysTypePb, TabletSchemaPb};

/// Position of a column within its [`TabletSchema`].
pub type ColumnId = u32;

pub type TabletSchemaRef = Arc<TabletSchema>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeysType {
    Duplicate,
    Unique,
    Aggregate,
    Primary,
}

impl From<KeysTypePb> for KeysType {
    fn from(value: KeysTypePb) -> Self {
        match value {
            KeysTypePb::DupKeys => Self::Duplicate,
            KeysTypePb::UniqueKeys => Self::Unique,
            KeysTypePb::AggKeys => Self::Aggregate,
            KeysTypePb::PrimaryKeys => Self::Primary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabletColumn {
    unique_id: i32,
    name: String,
    data_type: DataType,
    is_key: bool,
    is_nullable: bool,
}

impl TabletColumn {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            unique_id: 0,
            name: name.into(),
            data_type,
            is_key: false,
            is_nullable: true,
        }
    }

    pub fn with_unique_id(mut self, unique_id: i32) -> Self {
        self.unique_id = unique_id;
        self
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn with_nullable(mut self, is_nullable: bool) -> Self {
        self.is_nullable = is_nullable;
        self
    }

    pub fn from_pb(pb: &ColumnPb) -> LakeResult<Self> {
        Ok(Self {
            unique_id: pb.unique_id,
            name: pb.name.clone(),
            data_type: parse_type_name(&pb.r#type)?,
            is_key: pb.is_key,
            is_nullable: pb.is_nullable,
        })
    }

    pub fn unique_id(&self) -> i32 {
        self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    pub fn to_field(&self) -> FieldRef {
        Arc::new(Field::new(
            self.name.clone(),
            self.data_type.clone(),
            self.is_nullable,
        ))
    }
}

/// The column layout a rowset was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabletSchema {
    id: i64,
    keys_type: KeysType,
    columns: Vec<TabletColumn>,
    num_short_key_columns: usize,
}

impl TabletSchema {
    pub fn new(id: i64, keys_type: KeysType, columns: Vec<TabletColumn>) -> Self {
        let num_short_key_columns = columns.iter().filter(|c| c.is_key).count();
        Self {
            id,
            keys_type,
            columns,
            num_short_key_columns,
        }
    }

    pub fn from_pb(pb: &TabletSchemaPb) -> LakeResult<Self> {
        let keys_type = KeysTypePb::try_from(pb.keys_type)
            .map_err(|_| lake_err!(Corruption: "schema {} has unknown keys type {}", pb.id, pb.keys_type))?;
        let columns = pb
            .column
            .iter()
            .map(TabletColumn::from_pb)
            .collect::<LakeResult<Vec<_>>>()
            .map_err(|e| e.with_context(format!("parsing schema {}", pb.id)))?;
        Ok(Self {
            id: pb.id,
            keys_type: keys_type.into(),
            columns,
            num_short_key_columns: usize::try_from(pb.num_short_key_columns).unwrap_or_default(),
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn keys_type(&self) -> KeysType {
        self.keys_type
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_short_key_columns(&self) -> usize {
        self.num_short_key_columns
    }

    pub fn columns(&self) -> &[TabletColumn] {
        &self.columns
    }

    pub fn column(&self, cid: ColumnId) -> LakeResult<&TabletColumn> {
        self.columns.get(cid as usize).ok_or_else(|| {
            lake_err!(InvalidArgument: "column id {} out of range for schema {}", cid, self.id)
        })
    }

    pub fn field_index(&self, name: &str) -> Option<ColumnId> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .and_then(|idx| ColumnId::try_from(idx).ok())
    }

    /// Arrow schema of every column, in schema order.
    pub fn to_arrow_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(TabletColumn::to_field)
                .collect::<Vec<_>>(),
        ))
    }

    /// Arrow schema of the named columns, in the given order.
    pub fn project(&self, names: &[&str]) -> LakeResult<SchemaRef> {
        let fields = names
            .iter()
            .map(|name| match self.field_index(name) {
                Some(cid) => self.column(cid).map(TabletColumn::to_field),
                None => Err(lake_err!(InvalidArgument: "schema {} has no column {}", self.id, name)),
            })
            .collect::<LakeResult<Vec<_>>>()?;
        Ok(Arc::new(Schema::new(fields)))
    }
}

/// Map a persisted column type name to its Arrow type.
///
/// Length or precision parameters, as in `VARCHAR(64)`, are ignored.
pub fn parse_type_name(type_name: &str) -> LakeResult<DataType> {
    let base = type_name
        .split_once('(')
        .map_or(type_name, |(base, _)| base)
        .trim()
        .to_ascii_uppercase();
    Ok(match base.as_str() {
        "BOOLEAN" => DataType::Boolean,
        "TINYINT" => DataType::Int8,
        "SMALLINT" => DataType::Int16,
        "INT" => DataType::Int32,
        "BIGINT" => DataType::Int64,
        "FLOAT" => DataType::Float32,
        "DOUBLE" => DataType::Float64,
        "VARCHAR" | "CHAR" | "STRING" => DataType::Utf8,
        "DATE" => DataType::Date32,
        "DATETIME" => DataType::Timestamp(TimeUnit::Microsecond, None),
        _ => lake_bail!(InvalidArgument: "unsupported column type {}", type_name),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("INT", DataType::Int32)]
    #[case("bigint", DataType::Int64)]
    #[case("VARCHAR(64)", DataType::Utf8)]
    #[case("DATETIME", DataType::Timestamp(TimeUnit::Microsecond, None))]
    fn type_names(#[case] name: &str, #[case] expected: DataType) {
        assert_eq!(parse_type_name(name).unwrap(), expected);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(parse_type_name("HLL").is_err());
    }

    #[test]
    fn schema_from_pb() {
        let pb = TabletSchemaPb {
            id: 7,
            keys_type: KeysTypePb::PrimaryKeys as i32,
            column: vec![
                ColumnPb {
                    unique_id: 1,
                    name: "k".to_string(),
                    r#type: "BIGINT".to_string(),
                    is_key: true,
                    is_nullable: false,
                },
                ColumnPb {
                    unique_id: 2,
                    name: "v".to_string(),
                    r#type: "VARCHAR(10)".to_string(),
                    is_key: false,
                    is_nullable: true,
                },
            ],
            num_short_key_columns: 1,
        };
        let schema = TabletSchema::from_pb(&pb).unwrap();
        assert_eq!(schema.keys_type(), KeysType::Primary);
        assert_eq!(schema.field_index("v"), Some(1));
        assert_eq!(schema.column(0).unwrap().name(), "k");
        assert!(schema.column(2).is_err());

        let projected = schema.project(&["v"]).unwrap();
        assert_eq!(projected.fields().len(), 1);
        assert_eq!(projected.field(0).data_type(), &DataType::Utf8);
        assert!(schema.project(&["missing"]).is_err());
    }
}
