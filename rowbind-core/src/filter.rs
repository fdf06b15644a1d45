use crate::Value;

/// Predicate applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality, `NULL` compiles to `IS NULL`.
    Eq(Value),
    /// Inequality, `NULL` compiles to `IS NOT NULL`.
    Ne(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    /// SQL `LIKE` pattern.
    Like(String),
    In(Vec<Value>),
    IsNull,
    IsNotNull,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// Structured description of a `WHERE` predicate (conjunction of column
/// conditions) with optional ordering and limit.
///
/// ```rust
/// use rowbind_core::{Filter, Order};
/// let filter = Filter::new()
///     .eq("lang", "en")
///     .gt("id", 10)
///     .order_by("id", Order::Desc)
///     .limit(5);
/// assert_eq!(filter.conditions.len(), 2);
/// // Equality maps convert directly
/// let filter: Filter = [("data", "hello")].into();
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Filter {
    pub conditions: Vec<(String, Condition)>,
    pub order: Vec<(String, Order)>,
    pub limit: Option<u32>,
}

impl Filter {
    /// Filter matching every row.
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn condition(mut self, column: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push((column.into(), condition));
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(column, Condition::Eq(value.into()))
    }

    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(column, Condition::Ne(value.into()))
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(column, Condition::Lt(value.into()))
    }

    pub fn le(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(column, Condition::Le(value.into()))
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(column, Condition::Gt(value.into()))
    }

    pub fn ge(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(column, Condition::Ge(value.into()))
    }

    pub fn like(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.condition(column, Condition::Like(pattern.into()))
    }

    pub fn is_in<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.condition(
            column,
            Condition::In(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.condition(column, Condition::IsNull)
    }

    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.condition(column, Condition::IsNotNull)
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Filter {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Filter::new(), |filter, (k, v)| filter.eq(k, v))
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Filter {
    fn from(value: [(K, V); N]) -> Self {
        value.into_iter().collect()
    }
}
