use serde_json::json;

use super::{binary, xml};
use crate::error::QueryError;
use crate::parser;
use crate::query::{JoinInfo, JoinType, ProjectionEntry, QueryInfo, ResultShape};
use crate::term::{
    CaseConditional, CaseWhenExpression, ComparisonOp, Conditional, ConditionalContainer,
    ConditionalTerm, Connector, FunctionCall, MinusTerm, Operator, QueryTerm, ValuesArray,
};

fn assert_round_trips(term: &ConditionalTerm) {
    let bytes = binary::to_bytes(term);
    assert_eq!(&binary::from_bytes(&bytes).unwrap(), term);

    let text = xml::to_xml(term).unwrap();
    assert_eq!(&xml::from_xml(&text).unwrap(), term, "document: {}", text);
}

#[test]
fn test_round_trip_column() {
    assert_round_trips(&ConditionalTerm::column("Name"));
    assert_round_trips(&ConditionalTerm::column_of("t", "Name"));
    assert_round_trips(&ConditionalTerm::Column(crate::term::Column {
        owner: Some("t".to_string()),
        name: None,
    }));
}

#[test]
fn test_round_trip_constant_and_variable() {
    assert_round_trips(&ConditionalTerm::constant("42"));
    assert_round_trips(&ConditionalTerm::constant("'quoted text'"));
    assert_round_trips(&ConditionalTerm::constant(""));
    assert_round_trips(&ConditionalTerm::variable("param0"));
}

#[test]
fn test_round_trip_operator() {
    for op in [
        ComparisonOp::Eq,
        ComparisonOp::NotEq,
        ComparisonOp::IsNot,
        ComparisonOp::NotIn,
        ComparisonOp::Between,
        ComparisonOp::Exists,
    ] {
        assert_round_trips(&ConditionalTerm::Operator(Operator { op }));
    }
}

#[test]
fn test_round_trip_conditional() {
    assert_round_trips(&ConditionalTerm::comparison(
        ConditionalTerm::column("A"),
        ComparisonOp::Eq,
        ConditionalTerm::constant("1"),
    ));
}

#[test]
fn test_round_trip_conditional_with_absent_children() {
    // A bare term wrap: left only.
    assert_round_trips(&ConditionalTerm::Conditional(Box::new(Conditional::new(
        Some(ConditionalTerm::column("Flag")),
        None,
        None,
    ))));
    // Unary EXISTS: right only.
    assert_round_trips(&ConditionalTerm::Conditional(Box::new(Conditional::new(
        None,
        Some(ComparisonOp::Exists),
        Some(ConditionalTerm::variable("sub")),
    ))));
    // Fully absent.
    assert_round_trips(&ConditionalTerm::Conditional(Box::new(Conditional::new(
        None, None, None,
    ))));
}

#[test]
fn test_round_trip_container_with_connectors_and_parameters() {
    let mut container = parser::parse("A = ?param0 OR B = ?param1").unwrap();
    container.parameters.push("param0", json!(1));
    container.parameters.push("param1", json!("two"));
    assert_round_trips(&ConditionalTerm::Container(container));
}

#[test]
fn test_round_trip_empty_container() {
    assert_round_trips(&ConditionalTerm::Container(ConditionalContainer::new()));
}

#[test]
fn test_round_trip_values_array() {
    assert_round_trips(&ConditionalTerm::ValuesArray(ValuesArray {
        values: vec![
            ConditionalTerm::constant("1"),
            ConditionalTerm::variable("x"),
            ConditionalTerm::column("C"),
        ],
    }));
    assert_round_trips(&ConditionalTerm::ValuesArray(ValuesArray::default()));
}

#[test]
fn test_round_trip_function_call_minus_formula() {
    assert_round_trips(&ConditionalTerm::FunctionCall(FunctionCall {
        name: "concat".to_string(),
        args: vec![
            ConditionalTerm::column("A"),
            ConditionalTerm::constant("'x'"),
        ],
    }));
    assert_round_trips(&ConditionalTerm::FunctionCall(FunctionCall {
        name: "now".to_string(),
        args: Vec::new(),
    }));
    assert_round_trips(&ConditionalTerm::Minus(MinusTerm {
        term: Box::new(ConditionalTerm::column("A")),
    }));
    assert_round_trips(&parser::parse_term("A + B * 2").unwrap());
}

#[test]
fn test_round_trip_case_preserves_arm_order() {
    let case = ConditionalTerm::Case(CaseConditional {
        whens: vec![
            CaseWhenExpression {
                expression: parser::parse_term("A = 1").unwrap(),
                result: ConditionalTerm::constant("'one'"),
            },
            CaseWhenExpression {
                expression: parser::parse_term("A = 2").unwrap(),
                result: ConditionalTerm::constant("'two'"),
            },
        ],
        default: Some(Box::new(ConditionalTerm::constant("'other'"))),
    });
    assert_round_trips(&case);

    // Order check beyond structural equality.
    let decoded = binary::from_bytes(&binary::to_bytes(&case)).unwrap();
    match decoded {
        ConditionalTerm::Case(c) => {
            assert_eq!(c.whens[0].result, ConditionalTerm::constant("'one'"));
            assert_eq!(c.whens[1].result, ConditionalTerm::constant("'two'"));
        }
        other => panic!("expected case, got {:?}", other),
    }
}

#[test]
fn test_round_trip_case_without_default() {
    assert_round_trips(&ConditionalTerm::Case(CaseConditional {
        whens: vec![CaseWhenExpression {
            expression: parser::parse_term("A > 0").unwrap(),
            result: ConditionalTerm::constant("1"),
        }],
        default: None,
    }));
}

fn sample_query() -> QueryInfo {
    let mut query = QueryInfo::new("users");
    query.projection.push(ProjectionEntry {
        owner: None,
        name: "Name".to_string(),
    });
    query.projection.push(ProjectionEntry {
        owner: Some("a".to_string()),
        name: "City".to_string(),
    });

    let mut where_clause = parser::parse("Age >= ?param0").unwrap();
    where_clause.parameters.push("param0", json!(18));
    query.where_clause = Some(where_clause);

    query.group_by.add(ConditionalTerm::column("Region"));
    query.sort.add(ConditionalTerm::column("Name"), false);
    query.sort.add(ConditionalTerm::column("Age"), true);

    query.joins.push(JoinInfo {
        left: "users".to_string(),
        right: "addresses".to_string(),
        conditional: parser::parse("users.AddressId = addresses.Id").unwrap(),
        kind: JoinType::Left,
    });

    query.skip = Some(10);
    query.take = Some(5);
    query.shape = ResultShape::First { use_default: true };
    query.unions.push(QueryInfo::new("archived_users"));
    query
}

#[test]
fn test_round_trip_query_binary() {
    let query = sample_query();
    let decoded = binary::query_from_bytes(&binary::query_to_bytes(&query)).unwrap();
    assert_eq!(decoded, query);
}

#[test]
fn test_round_trip_query_xml() {
    let query = sample_query();
    let text = xml::query_to_xml(&query).unwrap();
    let decoded = xml::query_from_xml(&text).unwrap();
    assert_eq!(decoded, query, "document: {}", text);
}

#[test]
fn test_round_trip_query_term() {
    assert_round_trips(&ConditionalTerm::Query(QueryTerm {
        query: Box::new(sample_query()),
    }));
}

#[test]
fn test_round_trip_or_connector_preserved() {
    let mut container = ConditionalContainer::new();
    container.add(Connector::And, ConditionalTerm::column("A"));
    container.add(Connector::Or, ConditionalTerm::column("B"));
    container.add(Connector::And, ConditionalTerm::column("C"));
    let term = ConditionalTerm::Container(container);

    let decoded = binary::from_bytes(&binary::to_bytes(&term)).unwrap();
    match &decoded {
        ConditionalTerm::Container(c) => {
            assert_eq!(c.connectors, vec![Connector::Or, Connector::And]);
        }
        other => panic!("expected container, got {:?}", other),
    }
    assert_round_trips(&term);
}

#[test]
fn test_unknown_tag_is_invalid_type_not_constant() {
    let err = xml::from_xml(r#"<Bogus name="A"/>"#).unwrap_err();
    assert!(matches!(err, QueryError::InvalidType(tag) if tag == "Bogus"));

    let err = xml::from_xml(r#"<Term type="Bogus"/>"#).unwrap_err();
    assert!(matches!(err, QueryError::InvalidType(_)));

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&5u32.to_le_bytes());
    bytes.extend_from_slice(b"Bogus");
    let err = binary::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, QueryError::InvalidType(tag) if tag == "Bogus"));
}

#[test]
fn test_xml_local_name_fallback() {
    let term = xml::from_xml(r#"<Column name="A"/>"#).unwrap();
    assert_eq!(term, ConditionalTerm::column("A"));
}

#[test]
fn test_xml_tag_qualifier_stripping() {
    let term = xml::from_xml(r#"<q:Column name="A"/>"#).unwrap();
    assert_eq!(term, ConditionalTerm::column("A"));

    let term = xml::from_xml(r#"<Term type="Some.Namespace.Constant" text="1"/>"#).unwrap();
    assert_eq!(term, ConditionalTerm::constant("1"));
}

#[test]
fn test_xml_empty_type_reads_as_error_at_root() {
    assert!(xml::from_xml(r#"<Term type="Empty"/>"#).is_err());
}

#[test]
fn test_xml_escaped_attribute_values() {
    assert_round_trips(&ConditionalTerm::constant("'a < b & \"c\"'"));
}

#[test]
fn test_binary_truncated_payload_is_wire_error() {
    let bytes = binary::to_bytes(&parser::parse_term("A = 1 AND B = 2").unwrap());
    let err = binary::from_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(matches!(err, QueryError::Wire(_)));
}

#[test]
fn test_binary_empty_root_is_error() {
    let err = binary::from_bytes(&0u32.to_le_bytes()).unwrap_err();
    assert!(matches!(err, QueryError::Wire(_)));
}

#[test]
fn test_binary_container_connector_mismatch_is_wire_error() {
    // Two items but no connector between them: the decoder must reject
    // the payload instead of producing a container that violates the
    // connector invariant.
    let tag = b"ConditionalContainer";
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(tag.len() as u32).to_le_bytes());
    bytes.extend_from_slice(tag);
    for name in ["A", "B"] {
        bytes.push(1);
        bytes.extend_from_slice(&binary::to_bytes(&ConditionalTerm::column(name)));
    }
    bytes.push(0); // end of items
    bytes.push(0); // no connectors
    bytes.push(0); // no parameters

    let err = binary::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, QueryError::Wire(_)), "got {:?}", err);
}

#[test]
fn test_binary_trailing_bytes_rejected() {
    let mut bytes = binary::to_bytes(&ConditionalTerm::column("A"));
    bytes.push(0xFF);
    assert!(binary::from_bytes(&bytes).is_err());
}
