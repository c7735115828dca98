//! Snapshot tests for compiled statement text
//!
//! Each test builds a statement through the public API and pins the exact
//! SQL it compiles to, including section order and placeholder layout.

use fluentdb::builder::{compile, compile_with_limit, QueryState, Statement};
use fluentdb::{
    func, inc, not, now, values, ClauseBuilder, Direction, JoinType, Limit, QueryOption, SubQuery,
};

#[test]
fn test_select_sections_in_fixed_order() {
    let mut q = SubQuery::new(None);
    q.limit((20u64, 10u64))
        .order_by("u.created_at", Direction::Desc)
        .having_op("COUNT(o.id)", ">=", 3)
        .group_by("u.id")
        .or_where_op("u.role", "IN", ["admin", "owner"])
        .where_clause("u.active", true)
        .join("orders o", "o.user_id = u.id", JoinType::Left);

    let compiled = q.select("users u", &["u.id", "COUNT(o.id) AS orders"]).unwrap();
    insta::assert_snapshot!(
        compiled.sql,
        @"SELECT u.id, COUNT(o.id) AS orders FROM users u LEFT JOIN orders o ON o.user_id = u.id WHERE u.role IN (?, ?) AND u.active = ? GROUP BY u.id HAVING COUNT(o.id) >= ? ORDER BY u.created_at DESC LIMIT 20, 10"
    );
    assert_eq!(compiled.params.type_string(), "ssii");
}

#[test]
fn test_exists_and_subquery_operands() {
    let mut orders = SubQuery::new(None);
    orders.where_raw("o.user_id = u.id").where_op("o.total", ">", 100);
    let orders = orders.select("orders o", &["1"]).unwrap();

    let mut q = SubQuery::new(None);
    q.where_op("", "EXISTS", orders)
        .where_op("u.deleted_at", "IS", fluentdb::Operand::Null)
        .where_op("u.age", "NOT BETWEEN", (13, 17));

    let compiled = q.select("users u", &[]).unwrap();
    insta::assert_snapshot!(
        compiled.sql,
        @"SELECT * FROM users u WHERE EXISTS (SELECT 1 FROM orders o WHERE o.user_id = u.id AND o.total > ?) AND u.deleted_at IS NULL AND u.age NOT BETWEEN ? AND ?"
    );
    assert_eq!(compiled.params.len(), 3);
}

#[test]
fn test_join_on_aliased_subquery() {
    let mut totals = SubQuery::new(Some("t"));
    totals.group_by("user_id");
    let totals = totals.select("payments", &["user_id", "SUM(amount) AS paid"]).unwrap();

    let mut q = SubQuery::new(None);
    q.join(totals, "t.user_id = u.id", JoinType::Inner)
        .order_by("paid", Direction::Desc);

    let compiled = q.select("users u", &["u.name", "t.paid"]).unwrap();
    insta::assert_snapshot!(
        compiled.sql,
        @"SELECT u.name, t.paid FROM users u INNER JOIN (SELECT user_id, SUM(amount) AS paid FROM payments GROUP BY user_id) t ON t.user_id = u.id ORDER BY paid DESC"
    );
}

#[test]
fn test_insert_with_directives() {
    let data = values! {
        "name" => "Ann",
        "visits" => inc(1),
        "token" => func("hex(randomblob(?))", [16]),
        "archived" => not(None),
        "seen_at" => now(Some("+1h")).unwrap(),
        "note" => Option::<&str>::None,
    };
    let compiled = compile(
        &QueryState::new(),
        Statement::Insert {
            table: "users",
            data: &data,
            replace: true,
        },
        "",
    )
    .unwrap();

    insta::assert_snapshot!(
        compiled.sql,
        @"REPLACE INTO users (`name`, `visits`, `token`, `archived`, `seen_at`, `note`) VALUES (?, visits+1, hex(randomblob(?)), NOT archived, datetime('now', ?), ?)"
    );
    assert_eq!(compiled.params.type_string(), "siss");
}

#[test]
fn test_distinct_option() {
    let mut q = SubQuery::new(None);
    q.set_query_option(QueryOption::Distinct);
    let compiled = q.select("tags", &["name"]).unwrap();
    insta::assert_snapshot!(compiled.sql, @"SELECT DISTINCT name FROM tags");
}

#[test]
fn test_update_with_decrement_and_prefix() {
    let data = values! { "stock" => fluentdb::dec(2), "shop.updated" => 1 };
    let compiled = compile(
        &QueryState::new(),
        Statement::Update {
            table: "products",
            data: &data,
        },
        "inv_",
    )
    .unwrap();
    insta::assert_snapshot!(
        compiled.sql,
        @"UPDATE inv_products SET `stock` = stock-2, `shop`.`updated` = ?"
    );
}

#[test]
fn test_explicit_limit_overrides_accumulated_one() {
    let mut q = SubQuery::new(None);
    q.where_clause("kind", "book").limit(5u64);

    let state = q.state_mut().clone();
    let statement = Statement::Select {
        table: "items",
        columns: &["id"],
    };

    insta::assert_snapshot!(
        compile(&state, statement, "").unwrap().sql,
        @"SELECT id FROM items WHERE kind = ? LIMIT 5"
    );
    insta::assert_snapshot!(
        compile_with_limit(&state, statement, "", Some(Limit::range(40, 20))).unwrap().sql,
        @"SELECT id FROM items WHERE kind = ? LIMIT 40, 20"
    );
}
