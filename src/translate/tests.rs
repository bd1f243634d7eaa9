use serde_json::json;

use super::{prop, prop_of, value, OrderByTranslator, QueryExpr, SortDirection, WhereTranslator};
use crate::error::QueryError;
use crate::query::ResultShape;
use crate::term::{ComparisonOp, ConditionalTerm, Connector};

fn where_text(predicate: super::TypedExpr) -> (String, crate::query::ParameterSet) {
    let mut translator = WhereTranslator::new();
    let text = translator.translate(&predicate).unwrap();
    (text, translator.into_parameters())
}

#[test]
fn test_where_simple_comparison() {
    let (text, params) = where_text(prop("Age").ge(18i64));
    assert_eq!(text, "Age >= ?param0");
    assert_eq!(params.get("param0"), Some(&json!(18)));
}

#[test]
fn test_where_equality_against_true_collapses() {
    let (text, params) = where_text(prop("Flag").eq(true));
    assert_eq!(text, "Flag");
    assert!(params.is_empty());
}

#[test]
fn test_where_null_equality_uses_is() {
    let (text, params) = where_text(prop("Name").eq(value(serde_json::Value::Null)));
    assert_eq!(text, "Name IS ?param0");
    assert_eq!(params.get("param0"), Some(&serde_json::Value::Null));
}

#[test]
fn test_where_null_inequality_uses_is_not() {
    let (text, _) = where_text(prop("Name").ne(value(serde_json::Value::Null)));
    assert_eq!(text, "Name IS NOT ?param0");
}

#[test]
fn test_where_contains_wraps_pattern() {
    let (text, params) = where_text(prop("Name").contains("ab"));
    assert_eq!(text, "Name LIKE ?param0");
    assert_eq!(params.get("param0"), Some(&json!("%ab%")));
}

#[test]
fn test_where_starts_and_ends_with() {
    let (text, params) = where_text(prop("Name").starts_with("ab"));
    assert_eq!(text, "Name LIKE ?param0");
    assert_eq!(params.get("param0"), Some(&json!("ab%")));

    let (_, params) = where_text(prop("Name").ends_with("ab"));
    assert_eq!(params.get("param0"), Some(&json!("%ab")));
}

#[test]
fn test_where_pattern_must_be_string_constant() {
    let mut translator = WhereTranslator::new();
    assert!(matches!(
        translator.translate(&prop("Name").contains(prop("Other"))),
        Err(QueryError::NotSupported(_))
    ));
}

#[test]
fn test_where_parameters_in_encounter_order() {
    let (text, params) = where_text(prop("A").eq(1i64).and(prop("B").gt(2i64)));
    assert_eq!(text, "A = ?param0 AND B > ?param1");
    assert_eq!(params.get("param0"), Some(&json!(1)));
    assert_eq!(params.get("param1"), Some(&json!(2)));
}

#[test]
fn test_where_nested_connectives_are_grouped() {
    let predicate = prop("A").eq(1i64).or(prop("B").eq(2i64)).and(prop("C").eq(3i64));
    let (text, _) = where_text(predicate);
    assert_eq!(text, "(A = ?param0 OR B = ?param1) AND C = ?param2");
}

#[test]
fn test_where_owned_property() {
    let (text, _) = where_text(prop_of("t", "Age").lt(30i64));
    assert_eq!(text, "t.Age < ?param0");
}

#[test]
fn test_where_not_inverts_comparison() {
    let (text, _) = where_text(prop("Age").gt(21i64).not());
    assert_eq!(text, "Age <= ?param0");
}

#[test]
fn test_where_not_uses_de_morgan() {
    let predicate = prop("A").eq(1i64).and(prop("B").eq(2i64)).not();
    let (text, _) = where_text(predicate);
    assert_eq!(text, "(A <> ?param0) OR (B <> ?param1)");
}

#[test]
fn test_where_not_string_match_is_not_like() {
    let (text, params) = where_text(prop("Name").contains("ab").not());
    assert_eq!(text, "Name NOT LIKE ?param0");
    assert_eq!(params.get("param0"), Some(&json!("%ab%")));
}

#[test]
fn test_where_double_negation_cancels() {
    let (text, _) = where_text(prop("Age").gt(21i64).not().not());
    assert_eq!(text, "Age > ?param0");
}

#[test]
fn then_by_renders_before_order_by() {
    // Regression: chained sort keys render last-visited-first.
    let mut translator = OrderByTranslator::new();
    translator
        .order_by(&prop("a"), SortDirection::Ascending)
        .unwrap();
    translator
        .then_by(&prop("b"), SortDirection::Ascending)
        .unwrap();
    assert_eq!(translator.render(), "b ASC, a ASC");
}

#[test]
fn test_order_by_mixed_directions() {
    let mut translator = OrderByTranslator::new();
    translator
        .order_by(&prop("a"), SortDirection::Descending)
        .unwrap();
    translator
        .then_by(&prop("b"), SortDirection::Ascending)
        .unwrap();
    assert_eq!(translator.render(), "b ASC, a DESC");
}

#[test]
fn test_then_by_requires_order_by() {
    let mut translator = OrderByTranslator::new();
    assert!(matches!(
        translator.then_by(&prop("b"), SortDirection::Ascending),
        Err(QueryError::NotSupported(_))
    ));
}

#[test]
fn test_translate_filter_builds_where_clause() {
    let query = QueryExpr::from_entity("users")
        .filter(prop("Age").ge(18i64))
        .translate()
        .unwrap();

    let where_clause = query.where_clause.expect("where clause");
    assert_eq!(where_clause.len(), 1);
    assert_eq!(
        where_clause.items[0],
        ConditionalTerm::comparison(
            ConditionalTerm::column("Age"),
            ComparisonOp::GtEq,
            ConditionalTerm::variable("param0"),
        )
    );
    assert_eq!(where_clause.parameters.get("param0"), Some(&json!(18)));
}

#[test]
fn test_translate_multiple_filters_conjoin() {
    let query = QueryExpr::from_entity("users")
        .filter(prop("A").eq(1i64))
        .filter(prop("B").eq(2i64))
        .translate()
        .unwrap();

    let where_clause = query.where_clause.expect("where clause");
    assert_eq!(where_clause.len(), 2);
    assert_eq!(where_clause.connectors, vec![Connector::And]);
    assert_eq!(where_clause.parameters.len(), 2);
}

#[test]
fn test_translate_select_projection() {
    let query = QueryExpr::from_entity("users")
        .select([prop("Name"), prop_of("Address", "City")])
        .translate()
        .unwrap();

    assert_eq!(query.projection.len(), 2);
    assert_eq!(query.projection[0].to_string(), "Name");
    assert_eq!(query.projection[1].to_string(), "Address.City");
}

#[test]
fn test_translate_sort_is_rendered_reversed() {
    let query = QueryExpr::from_entity("users")
        .order_by(prop("a"))
        .then_by(prop("b"))
        .translate()
        .unwrap();

    assert_eq!(query.sort.entries.len(), 2);
    assert_eq!(query.sort.entries[0].name(), Some("b".to_string()));
    assert_eq!(query.sort.entries[1].name(), Some("a".to_string()));
    assert!(!query.sort.entries[0].reverse);
}

#[test]
fn test_translate_sort_desc_sets_reverse() {
    let query = QueryExpr::from_entity("users")
        .order_by_desc(prop("a"))
        .translate()
        .unwrap();

    assert_eq!(query.sort.entries.len(), 1);
    assert!(query.sort.entries[0].reverse);
}

#[test]
fn test_translate_skip_take() {
    let query = QueryExpr::from_entity("users")
        .skip(10u64)
        .take(5u64)
        .translate()
        .unwrap();

    assert_eq!(query.skip, Some(10));
    assert_eq!(query.take, Some(5));
}

#[test]
fn test_translate_group_by() {
    let query = QueryExpr::from_entity("orders")
        .group_by([prop("Region"), prop_of("o", "Year")])
        .translate()
        .unwrap();

    assert_eq!(query.group_by.entries.len(), 2);
    assert_eq!(
        query.group_by.entries[0].term,
        ConditionalTerm::column("Region")
    );
    assert_eq!(
        query.group_by.entries[1].term,
        ConditionalTerm::column_of("o", "Year")
    );
}

#[test]
fn test_translate_count_shape() {
    let query = QueryExpr::from_entity("users").count().translate().unwrap();
    assert_eq!(query.shape, ResultShape::Count);
}

#[test]
fn test_translate_first_is_take_one() {
    let query = QueryExpr::from_entity("users").first().translate().unwrap();
    assert_eq!(query.shape, ResultShape::First { use_default: false });
    assert_eq!(query.take, Some(1));

    let query = QueryExpr::from_entity("users")
        .first_or_default()
        .translate()
        .unwrap();
    assert_eq!(query.shape, ResultShape::First { use_default: true });
}

#[test]
fn test_translate_rejects_duplicate_terminal() {
    let result = QueryExpr::from_entity("users").count().first().translate();
    assert!(matches!(result, Err(QueryError::NotSupported(_))));
}

#[test]
fn test_translate_flag_collapse_end_to_end() {
    let query = QueryExpr::from_entity("users")
        .filter(prop("IsActive").eq(true))
        .translate()
        .unwrap();

    let where_clause = query.where_clause.expect("where clause");
    assert_eq!(
        where_clause.items[0],
        ConditionalTerm::Conditional(Box::new(crate::term::Conditional::new(
            Some(ConditionalTerm::column("IsActive")),
            None,
            None,
        )))
    );
}
