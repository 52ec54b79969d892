//! Filter and query types for record lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentState, Record, RecordId};

/// Queryable record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Id,
    Kind,
    State,
    VersionOf,
    VersionIndex,
    Parent,
    Updated,
}

impl RecordField {
    /// Column name in the records table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Kind => "kind",
            Self::State => "state",
            Self::VersionOf => "version_of",
            Self::VersionIndex => "version_index",
            Self::Parent => "parent_id",
            Self::Updated => "updated",
        }
    }
}

/// Value a field is compared with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Id(RecordId),
    Int(i64),
    Text(String),
    State(ContentState),
    DateTime(DateTime<Utc>),
}

impl From<RecordId> for FieldValue {
    fn from(v: RecordId) -> Self {
        Self::Id(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<ContentState> for FieldValue {
    fn from(v: ContentState) -> Self {
        Self::State(v)
    }
}

/// Filter operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Equal to.
    Eq(FieldValue),
    /// Not equal to.
    Ne(FieldValue),
    /// Is null.
    IsNull,
    /// Is not null.
    IsNotNull,
}

/// A single filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Field to filter on.
    pub field: RecordField,
    /// Operator to apply.
    pub operator: FilterOperator,
}

/// Composite filter with AND/OR/NOT logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Single condition.
    Condition(FilterCondition),
    /// AND of multiple filters.
    And(Vec<Filter>),
    /// OR of multiple filters.
    Or(Vec<Filter>),
    /// NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an equality filter.
    pub fn eq(field: RecordField, value: impl Into<FieldValue>) -> Self {
        Filter::Condition(FilterCondition {
            field,
            operator: FilterOperator::Eq(value.into()),
        })
    }

    /// Create an inequality filter.
    pub fn ne(field: RecordField, value: impl Into<FieldValue>) -> Self {
        Filter::Condition(FilterCondition {
            field,
            operator: FilterOperator::Ne(value.into()),
        })
    }

    /// Create an is null filter.
    pub fn is_null(field: RecordField) -> Self {
        Filter::Condition(FilterCondition {
            field,
            operator: FilterOperator::IsNull,
        })
    }

    /// Create an is not null filter.
    pub fn is_not_null(field: RecordField) -> Self {
        Filter::Condition(FilterCondition {
            field,
            operator: FilterOperator::IsNotNull,
        })
    }

    /// Create an AND filter.
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    /// Create an OR filter.
    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Evaluate the filter against a record in memory.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Condition(c) => c.matches(record),
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Filter::Not(filter) => !filter.matches(record),
        }
    }
}

impl FilterCondition {
    fn field_value(&self, record: &Record) -> Option<FieldValue> {
        match self.field {
            RecordField::Id => record.id.map(FieldValue::Id),
            RecordField::Kind => Some(FieldValue::Text(record.kind.clone())),
            RecordField::State => Some(FieldValue::State(record.state)),
            RecordField::VersionOf => record.version_of.map(FieldValue::Id),
            RecordField::VersionIndex => Some(FieldValue::Int(record.version_index)),
            RecordField::Parent => record.parent.map(FieldValue::Id),
            RecordField::Updated => Some(FieldValue::DateTime(record.updated)),
        }
    }

    fn matches(&self, record: &Record) -> bool {
        let actual = self.field_value(record);
        match &self.operator {
            FilterOperator::Eq(expected) => actual.as_ref() == Some(expected),
            // SQL semantics: NULL is neither equal nor unequal to anything
            FilterOperator::Ne(expected) => actual.map_or(false, |v| &v != expected),
            FilterOperator::IsNull => actual.is_none(),
            FilterOperator::IsNotNull => actual.is_some(),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One ordering term of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderBy {
    /// Order by a field.
    Field {
        field: RecordField,
        direction: SortDirection,
    },
    /// Live records (no `version_of`) before snapshots.
    LiveFirst,
}

impl OrderBy {
    pub fn asc(field: RecordField) -> Self {
        OrderBy::Field {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: RecordField) -> Self {
        OrderBy::Field {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// A record query: filter, ordering and an optional result bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub filter: Option<Filter>,
    #[serde(default)]
    pub order: Vec<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

impl RecordQuery {
    /// Query selecting every record.
    pub fn all() -> Self {
        Self {
            filter: None,
            order: Vec::new(),
            max_results: None,
        }
    }

    /// Query selecting records that match `filter`.
    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::all()
        }
    }

    /// Append an ordering term.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    /// Bound the number of results.
    pub fn max_results(mut self, max: Option<usize>) -> Self {
        self.max_results = max;
        self
    }

    /// History of a master record: the record itself and every snapshot of
    /// it, newest first.
    pub fn versions_of(id: RecordId) -> Self {
        Self::filtered(Filter::or(vec![
            Filter::eq(RecordField::VersionOf, id),
            Filter::eq(RecordField::Id, id),
        ]))
        .order_by(OrderBy::desc(RecordField::VersionIndex))
        .order_by(OrderBy::LiveFirst)
        .order_by(OrderBy::desc(RecordField::Id))
    }
}

/// Trait for translating filters to backend-specific formats.
pub trait FilterTranslator {
    type Output;
    type Error;

    /// Translate a filter to the backend-specific format.
    fn translate(&self, filter: &Filter) -> Result<Self::Output, Self::Error>;
}
