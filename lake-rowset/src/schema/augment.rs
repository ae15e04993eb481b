use std::borrow::Cow;
use std::sync::Arc;

use arrow_schema::{FieldRef, Schema, SchemaRef};

/// Append every field of `extra` whose name is not yet part of `base`.
///
/// `base` is never modified. When nothing needs to be appended the result borrows `base`, so a
/// new schema is only materialized when a column is actually added.
pub fn augment_schema<'a>(
    base: &'a SchemaRef,
    extra: impl IntoIterator<Item = FieldRef>,
) -> Cow<'a, SchemaRef> {
    let mut augmented: Option<Vec<FieldRef>> = None;
    for field in extra {
        let present = match &augmented {
            Some(fields) => fields.iter().any(|f| f.name() == field.name()),
            None => base.field_with_name(field.name()).is_ok(),
        };
        if present {
            continue;
        }
        augmented
            .get_or_insert_with(|| base.fields().iter().cloned().collect())
            .push(field);
    }

    match augmented {
        None => Cow::Borrowed(base),
        Some(fields) => Cow::Owned(Arc::new(Schema::new_with_metadata(
            fields,
            base.metadata().clone(),
        ))),
    }
}
