/// Query State and Fluent Clause Methods
///
/// [`QueryState`] is the per-statement accumulator. It is owned by exactly one
/// builder and taken out of it (leaving a fresh default behind) at the moment a
/// statement executes, so nothing accumulated for one statement can leak into
/// the next one, whether that statement succeeded or failed.
use crate::builder::clause::{
    Clause, Condition, Conjunction, Direction, Join, JoinTarget, JoinType, Limit, Operand, OrderBy,
    QueryOption,
};
use crate::core::Value;
use crate::output::ReturnFormat;
use indexmap::IndexMap;

/// SQLite upsert tail for INSERT statements.
#[derive(Debug, Clone, PartialEq)]
pub struct OnDuplicate {
    /// Conflict target, e.g. `id` or `email, tenant`
    pub target: String,
    /// Columns overwritten from the rejected row
    pub columns: Vec<String>,
}

/// Mutable per-statement accumulator.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    pub(crate) wheres: Vec<Condition>,
    pub(crate) havings: Vec<Condition>,
    pub(crate) joins: Vec<Join>,
    pub(crate) join_conditions: IndexMap<String, Vec<Condition>>,
    pub(crate) order_by: Vec<OrderBy>,
    pub(crate) group_by: Vec<String>,
    pub(crate) limit: Option<Limit>,
    pub(crate) options: Vec<QueryOption>,
    pub(crate) on_duplicate: Option<OnDuplicate>,
    pub(crate) format: ReturnFormat,
    pub(crate) map_key: Option<String>,
    pub(crate) with_total_count: bool,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no clause, option or output setting has been recorded.
    pub fn is_empty(&self) -> bool {
        self.wheres.is_empty()
            && self.havings.is_empty()
            && self.joins.is_empty()
            && self.join_conditions.is_empty()
            && self.order_by.is_empty()
            && self.group_by.is_empty()
            && self.limit.is_none()
            && self.options.is_empty()
            && self.on_duplicate.is_none()
            && self.format == ReturnFormat::Array
            && self.map_key.is_none()
            && !self.with_total_count
    }

    pub fn has_option(&self, option: QueryOption) -> bool {
        self.options.contains(&option)
    }

    /// Ordered snapshot of every clause, for the trace log.
    pub fn clauses(&self) -> Vec<Clause> {
        let mut clauses = Vec::new();
        clauses.extend(self.joins.iter().cloned().map(Clause::Join));
        clauses.extend(self.wheres.iter().cloned().map(Clause::Where));
        clauses.extend(self.group_by.iter().cloned().map(Clause::GroupBy));
        clauses.extend(self.havings.iter().cloned().map(Clause::Having));
        clauses.extend(self.order_by.iter().cloned().map(Clause::OrderBy));
        clauses
    }

    fn push_condition(
        list: &mut Vec<Condition>,
        field: &str,
        operator: &str,
        operand: Operand,
        conjunction: Conjunction,
    ) {
        // The first condition's connective comes from the WHERE/HAVING keyword.
        let conjunction = if list.is_empty() {
            None
        } else {
            Some(conjunction)
        };
        list.push(Condition {
            conjunction,
            field: field.to_string(),
            operator: operator.to_string(),
            operand,
        });
    }
}

/// Fluent clause accumulation shared by [`crate::Database`] and
/// [`crate::SubQuery`].
///
/// Every method appends to the builder's [`QueryState`] and returns the builder
/// for chaining.
pub trait ClauseBuilder {
    fn state_mut(&mut self) -> &mut QueryState;

    /// `AND field = ?`
    fn where_clause(&mut self, field: &str, value: impl Into<Operand>) -> &mut Self
    where
        Self: Sized,
    {
        self.where_op(field, "=", value)
    }

    /// `AND field <operator> ...`; operators IN, NOT IN, BETWEEN, NOT BETWEEN,
    /// EXISTS and NOT EXISTS get their dedicated rendering.
    fn where_op(&mut self, field: &str, operator: &str, value: impl Into<Operand>) -> &mut Self
    where
        Self: Sized,
    {
        let state = self.state_mut();
        QueryState::push_condition(&mut state.wheres, field, operator, value.into(), Conjunction::And);
        self
    }

    /// Adds a raw condition with no right-hand side, e.g. `"active = 1"`.
    fn where_raw(&mut self, expression: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.where_op(expression, "=", Operand::Omitted)
    }

    fn or_where(&mut self, field: &str, value: impl Into<Operand>) -> &mut Self
    where
        Self: Sized,
    {
        self.or_where_op(field, "=", value)
    }

    fn or_where_op(&mut self, field: &str, operator: &str, value: impl Into<Operand>) -> &mut Self
    where
        Self: Sized,
    {
        let state = self.state_mut();
        QueryState::push_condition(&mut state.wheres, field, operator, value.into(), Conjunction::Or);
        self
    }

    fn having(&mut self, field: &str, value: impl Into<Operand>) -> &mut Self
    where
        Self: Sized,
    {
        self.having_op(field, "=", value)
    }

    fn having_op(&mut self, field: &str, operator: &str, value: impl Into<Operand>) -> &mut Self
    where
        Self: Sized,
    {
        let state = self.state_mut();
        QueryState::push_condition(&mut state.havings, field, operator, value.into(), Conjunction::And);
        self
    }

    fn or_having(&mut self, field: &str, value: impl Into<Operand>) -> &mut Self
    where
        Self: Sized,
    {
        self.or_having_op(field, "=", value)
    }

    fn or_having_op(&mut self, field: &str, operator: &str, value: impl Into<Operand>) -> &mut Self
    where
        Self: Sized,
    {
        let state = self.state_mut();
        QueryState::push_condition(&mut state.havings, field, operator, value.into(), Conjunction::Or);
        self
    }

    /// Joins a table or sub-query. The condition is literal SQL and is the
    /// caller's responsibility; a condition containing `USING` is emitted
    /// without `ON`.
    fn join(
        &mut self,
        target: impl Into<JoinTarget>,
        condition: &str,
        join_type: JoinType,
    ) -> &mut Self
    where
        Self: Sized,
    {
        self.state_mut().joins.push(Join {
            join_type,
            target: target.into(),
            condition: condition.to_string(),
        });
        self
    }

    /// Appends `AND field <operator> ?` to the ON clause of the join on `table`.
    fn join_where(
        &mut self,
        table: &str,
        field: &str,
        operator: &str,
        value: impl Into<Operand>,
    ) -> &mut Self
    where
        Self: Sized,
    {
        self.push_join_condition(table, field, operator, value.into(), Conjunction::And)
    }

    fn join_or_where(
        &mut self,
        table: &str,
        field: &str,
        operator: &str,
        value: impl Into<Operand>,
    ) -> &mut Self
    where
        Self: Sized,
    {
        self.push_join_condition(table, field, operator, value.into(), Conjunction::Or)
    }

    #[doc(hidden)]
    fn push_join_condition(
        &mut self,
        table: &str,
        field: &str,
        operator: &str,
        operand: Operand,
        conjunction: Conjunction,
    ) -> &mut Self
    where
        Self: Sized,
    {
        self.state_mut()
            .join_conditions
            .entry(table.to_string())
            .or_default()
            .push(Condition {
                conjunction: Some(conjunction),
                field: field.to_string(),
                operator: operator.to_string(),
                operand,
            });
        self
    }

    /// Orders by `field`. Ordering by the same field twice keeps the first
    /// position and takes the latest direction.
    fn order_by(&mut self, field: &str, direction: Direction) -> &mut Self
    where
        Self: Sized,
    {
        self.order_by_values(field, direction, Vec::<Value>::new())
    }

    /// Orders rows whose `field` matches one of `values` first, in the given
    /// order, then everything else.
    fn order_by_values<V: Into<Value>>(
        &mut self,
        field: &str,
        direction: Direction,
        values: Vec<V>,
    ) -> &mut Self
    where
        Self: Sized,
    {
        let custom: Vec<Value> = values.into_iter().map(Into::into).collect();
        let orders = &mut self.state_mut().order_by;
        match orders.iter_mut().find(|o| o.field == field) {
            Some(existing) => {
                existing.direction = direction;
                existing.custom = custom;
            }
            None => orders.push(OrderBy {
                field: field.to_string(),
                direction,
                custom,
            }),
        }
        self
    }

    fn group_by(&mut self, field: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.state_mut().group_by.push(field.to_string());
        self
    }

    /// Limits the result to a count, or an `(offset, count)` pair.
    fn limit(&mut self, limit: impl Into<Limit>) -> &mut Self
    where
        Self: Sized,
    {
        self.state_mut().limit = Some(limit.into());
        self
    }

    fn set_query_option(&mut self, option: QueryOption) -> &mut Self
    where
        Self: Sized,
    {
        let options = &mut self.state_mut().options;
        if !options.contains(&option) {
            options.push(option);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Builder(QueryState);

    impl ClauseBuilder for Builder {
        fn state_mut(&mut self) -> &mut QueryState {
            &mut self.0
        }
    }

    #[test]
    fn test_first_conjunction_is_forced_empty() {
        let mut builder = Builder(QueryState::new());
        builder.or_where("a", 1).or_where("b", 2).where_clause("c", 3);

        let conjunctions: Vec<_> = builder.0.wheres.iter().map(|c| c.conjunction).collect();
        assert_eq!(
            conjunctions,
            vec![None, Some(Conjunction::Or), Some(Conjunction::And)]
        );
    }

    #[test]
    fn test_having_sequence_is_independent_of_where() {
        let mut builder = Builder(QueryState::new());
        builder.where_clause("a", 1).having("count(*)", 2);

        assert_eq!(builder.0.havings[0].conjunction, None);
    }

    #[test]
    fn test_order_by_same_field_overwrites_direction() {
        let mut builder = Builder(QueryState::new());
        builder
            .order_by("name", Direction::Asc)
            .order_by("id", Direction::Asc)
            .order_by("name", Direction::Desc);

        let orders = &builder.0.order_by;
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].field, "name");
        assert_eq!(orders[0].direction, Direction::Desc);
    }

    #[test]
    fn test_default_state_is_empty() {
        let mut builder = Builder(QueryState::new());
        assert!(builder.0.is_empty());

        builder.group_by("kind").limit(5u64);
        assert!(!builder.0.is_empty());
        assert_eq!(builder.0.clauses(), vec![Clause::GroupBy("kind".to_string())]);
    }
}
