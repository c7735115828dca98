//! Property-based tests for statement compilation
//!
//! These tests verify, for arbitrary chains of builder calls, that:
//! - The compiled text has exactly one `?` per bound parameter
//! - Parameters are bound in the order their conditions were added
//! - Nothing accumulated for one statement survives into the next

#[cfg(test)]
mod tests {
    use fluentdb::builder::count_placeholders;
    use fluentdb::{ClauseBuilder, Database, Operand, SubQuery, Value};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Cond {
        Eq(String, i64),
        Text(String, String),
        In(String, Vec<i64>),
        Between(String, i64, i64),
        IsNull(String),
        Flag(String),
    }

    impl Cond {
        /// Values this condition should contribute, in order.
        fn expected(&self) -> Vec<Value> {
            match self {
                Cond::Eq(_, v) => vec![Value::Integer(*v)],
                Cond::Text(_, s) => vec![Value::from(s.as_str())],
                Cond::In(_, vs) => vs.iter().map(|v| Value::Integer(*v)).collect(),
                Cond::Between(_, lo, hi) => vec![Value::Integer(*lo), Value::Integer(*hi)],
                Cond::IsNull(_) | Cond::Flag(_) => Vec::new(),
            }
        }

        fn apply(&self, q: &mut SubQuery, or: bool) {
            let (field, op, operand): (&str, &str, Operand) = match self {
                Cond::Eq(f, v) => (f.as_str(), "=", (*v).into()),
                Cond::Text(f, s) => (f.as_str(), "<>", s.as_str().into()),
                Cond::In(f, vs) => (f.as_str(), "IN", vs.clone().into()),
                Cond::Between(f, lo, hi) => (f.as_str(), "BETWEEN", (*lo, *hi).into()),
                Cond::IsNull(f) => (f.as_str(), "IS", Operand::Null),
                Cond::Flag(f) => (f.as_str(), "=", Operand::Omitted),
            };
            if or {
                q.or_where_op(field, op, operand);
            } else {
                q.where_op(field, op, operand);
            }
        }
    }

    fn arb_field() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,12}".prop_map(|s: String| s)
    }

    fn arb_cond() -> impl Strategy<Value = Cond> {
        prop_oneof![
            (arb_field(), any::<i64>()).prop_map(|(f, v)| Cond::Eq(f, v)),
            // Bound text may contain characters that matter to SQL
            (arb_field(), "[a-zA-Z0-9 '?]{0,12}").prop_map(|(f, s)| Cond::Text(f, s)),
            (arb_field(), prop::collection::vec(any::<i64>(), 1..6)).prop_map(|(f, vs)| Cond::In(f, vs)),
            (arb_field(), any::<i64>(), any::<i64>()).prop_map(|(f, lo, hi)| Cond::Between(f, lo, hi)),
            arb_field().prop_map(Cond::IsNull),
            arb_field().prop_map(Cond::Flag),
        ]
    }

    proptest! {
        #[test]
        fn prop_placeholders_match_parameters(
            conds in prop::collection::vec((arb_cond(), any::<bool>()), 0..12),
            havings in prop::collection::vec(any::<i64>(), 0..4),
        ) {
            let mut q = SubQuery::new(None);
            let mut expected = Vec::new();
            for (cond, or) in &conds {
                cond.apply(&mut q, *or);
                expected.extend(cond.expected());
            }
            for (i, v) in havings.iter().enumerate() {
                q.having_op(&format!("SUM(c{i})"), ">", *v);
                expected.push(Value::Integer(*v));
            }
            if !havings.is_empty() {
                q.group_by("c0");
            }

            let compiled = q.select("t", &[]).unwrap();
            prop_assert_eq!(count_placeholders(&compiled.sql), compiled.params.len());
            prop_assert_eq!(compiled.params.values(), expected);
            prop_assert_eq!(compiled.params.type_string().len(), compiled.params.len());
        }

        #[test]
        fn prop_where_keyword_emitted_once(
            conds in prop::collection::vec((arb_cond(), any::<bool>()), 1..8),
        ) {
            let mut q = SubQuery::new(None);
            for (cond, or) in &conds {
                cond.apply(&mut q, *or);
            }
            let sql = q.select("t", &[]).unwrap().sql;
            prop_assert_eq!(sql.matches(" WHERE ").count(), 1);
            prop_assert!(!sql.contains("WHERE AND") && !sql.contains("WHERE OR"));
        }

        #[test]
        fn prop_state_never_leaks(values in prop::collection::vec(any::<i64>(), 1..6)) {
            let mut db = Database::open_in_memory().unwrap();
            db.raw_query("CREATE TABLE t (a INTEGER)", &[]).unwrap();

            for v in &values {
                db.or_where("a", *v);
            }
            db.group_by("a").limit(3u64);
            db.select("t", &[]).unwrap();
            prop_assert!(db.pending().is_empty());

            db.select("t", &["a"]).unwrap();
            prop_assert_eq!(db.last_query(), "SELECT a FROM t");
        }
    }
}
