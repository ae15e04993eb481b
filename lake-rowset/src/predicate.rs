//! Column predicates evaluated against chunks.
//!
//! Delete conditions are stored as conjunctions of column predicates. A rowset must hide every
//! row matching a delete registered after the rowset was written, so the conditions that apply
//! to one rowset form a disjunction of conjunctions.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use arrow_arith::boolean::{and, or};
use arrow_array::{Array, ArrayRef, BooleanArray, RecordBatch, Scalar};
use arrow_ord::cmp;
use arrow_select::filter::prep_null_mask_filter;
use lake_error::{LakeResult, lake_bail, lake_err};

use crate::schema::ColumnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        };
        f.write_str(op)
    }
}

/// `column op literal`, where `literal` is a single-element array of the column's type.
#[derive(Debug, Clone)]
pub struct ColumnPredicate {
    column_id: ColumnId,
    column_name: String,
    op: CompareOp,
    literal: ArrayRef,
}

impl ColumnPredicate {
    pub fn try_new(
        column_id: ColumnId,
        column_name: impl Into<String>,
        op: CompareOp,
        literal: ArrayRef,
    ) -> LakeResult<Self> {
        let column_name = column_name.into();
        if literal.len() != 1 {
            lake_bail!(
                InvalidArgument: "literal for predicate on {} must have exactly one element, got {}",
                column_name,
                literal.len()
            );
        }
        Ok(Self {
            column_id,
            column_name,
            op,
            literal,
        })
    }

    pub fn column_id(&self) -> ColumnId {
        self.column_id
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    /// Evaluate against `batch`, which must carry the predicate's column.
    ///
    /// Rows where the column is null do not match.
    pub fn evaluate(&self, batch: &RecordBatch) -> LakeResult<BooleanArray> {
        let column = batch.column_by_name(&self.column_name).ok_or_else(|| {
            lake_err!(InvalidArgument: "predicate column {} is missing from chunk", self.column_name)
        })?;
        let literal = Scalar::new(self.literal.clone());
        let result = match self.op {
            CompareOp::Eq => cmp::eq(column, &literal)?,
            CompareOp::NotEq => cmp::neq(column, &literal)?,
            CompareOp::Lt => cmp::lt(column, &literal)?,
            CompareOp::LtEq => cmp::lt_eq(column, &literal)?,
            CompareOp::Gt => cmp::gt(column, &literal)?,
            CompareOp::GtEq => cmp::gt_eq(column, &literal)?,
        };
        Ok(prep_null_mask_filter(&result))
    }
}

impl Display for ColumnPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} <literal>", self.column_name, self.op)
    }
}

/// A boolean combination of column predicates.
#[derive(Debug, Clone)]
pub enum PredicateTree {
    And(Vec<PredicateTree>),
    Or(Vec<PredicateTree>),
    Leaf(ColumnPredicate),
}

impl PredicateTree {
    pub fn column_ids(&self) -> BTreeSet<ColumnId> {
        let mut ids = BTreeSet::new();
        self.collect_column_ids(&mut ids);
        ids
    }

    fn collect_column_ids(&self, ids: &mut BTreeSet<ColumnId>) {
        match self {
            PredicateTree::And(children) | PredicateTree::Or(children) => {
                children.iter().for_each(|c| c.collect_column_ids(ids))
            }
            PredicateTree::Leaf(pred) => {
                ids.insert(pred.column_id);
            }
        }
    }

    /// Evaluate to a selection: `true` for every row the tree keeps.
    pub fn evaluate(&self, batch: &RecordBatch) -> LakeResult<BooleanArray> {
        match self {
            PredicateTree::And(children) => children.iter().try_fold(
                BooleanArray::from(vec![true; batch.num_rows()]),
                |acc, child| Ok(and(&acc, &child.evaluate(batch)?)?),
            ),
            PredicateTree::Or(children) => children.iter().try_fold(
                BooleanArray::from(vec![false; batch.num_rows()]),
                |acc, child| Ok(or(&acc, &child.evaluate(batch)?)?),
            ),
            PredicateTree::Leaf(pred) => pred.evaluate(batch),
        }
    }
}

/// A conjunction of column predicates.
#[derive(Debug, Clone, Default)]
pub struct ConjunctivePredicates(Vec<ColumnPredicate>);

impl ConjunctivePredicates {
    pub fn new(predicates: Vec<ColumnPredicate>) -> Self {
        Self(predicates)
    }

    pub fn predicates(&self) -> &[ColumnPredicate] {
        &self.0
    }

    pub fn evaluate(&self, batch: &RecordBatch) -> LakeResult<BooleanArray> {
        self.0.iter().try_fold(
            BooleanArray::from(vec![true; batch.num_rows()]),
            |acc, pred| Ok(and(&acc, &pred.evaluate(batch)?)?),
        )
    }
}

impl FromIterator<ColumnPredicate> for ConjunctivePredicates {
    fn from_iter<T: IntoIterator<Item = ColumnPredicate>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Delete conditions of a tablet, each registered at the rowset index it was issued after.
#[derive(Debug, Clone, Default)]
pub struct DeletePredicates {
    deletes: Vec<(usize, ConjunctivePredicates)>,
}

impl DeletePredicates {
    /// Register a delete issued once the rowsets before `rowset_index` were written.
    pub fn add(&mut self, rowset_index: usize, predicates: ConjunctivePredicates) {
        self.deletes.push((rowset_index, predicates));
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
    }

    /// The delete conditions that apply to the rowset at `rowset_index`.
    pub fn predicates_for(&self, rowset_index: usize) -> SegmentDeletePredicates {
        SegmentDeletePredicates(
            self.deletes
                .iter()
                .filter(|(index, _)| *index > rowset_index)
                .map(|(_, preds)| preds.clone())
                .collect(),
        )
    }
}

/// The delete conditions of one rowset: a row is deleted if any conjunction matches it.
#[derive(Debug, Clone, Default)]
pub struct SegmentDeletePredicates(Vec<ConjunctivePredicates>);

impl SegmentDeletePredicates {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn column_ids(&self) -> BTreeSet<ColumnId> {
        self.0
            .iter()
            .flat_map(|conj| conj.predicates().iter().map(ColumnPredicate::column_id))
            .collect()
    }

    /// Rows of `batch` hidden by a delete condition.
    pub fn evaluate(&self, batch: &RecordBatch) -> LakeResult<BooleanArray> {
        self.0.iter().try_fold(
            BooleanArray::from(vec![false; batch.num_rows()]),
            |acc, conj| Ok(or(&acc, &conj.evaluate(batch)?)?),
        )
    }
}
