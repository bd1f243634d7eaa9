//! Wire formats for [`crate::term::ConditionalTerm`] trees and
//! [`crate::query::QueryInfo`] payloads.
//!
//! Two independent encodings share one closed tag registry: the compact
//! binary format (`binary`) and the XML format (`xml`). Both uphold the
//! same round-trip invariant: decoding an encoded tree yields a
//! structurally equal tree, including absent optional children.
//!
//! Tag policy: the empty tag (or the literal `Empty`) means "no node" and
//! decodes to `None`; an unrecognized tag is an [`QueryError::InvalidType`]
//! error, never silently coerced to a default variant.

pub mod binary;
pub mod xml;
#[cfg(test)]
mod tests;

use crate::error::{QueryError, QueryResult};
use crate::query::ResultShape;

/// True when a tag denotes an absent node.
pub(crate) fn tag_is_empty(tag: &str) -> bool {
    tag.is_empty() || tag == "Empty"
}

/// Strip namespace (`:`) and dotted-qualifier prefixes from a tag before
/// registry comparison: `ns:Some.Path.Column` resolves to `Column`.
pub(crate) fn strip_tag_qualifiers(tag: &str) -> &str {
    let tag = match tag.rfind(':') {
        Some(idx) => &tag[idx + 1..],
        None => tag,
    };
    match tag.rfind('.') {
        Some(idx) => &tag[idx + 1..],
        None => tag,
    }
}

/// Check a decoded tag against the closed registry. Returns the canonical
/// tag or the invalid-type error; absence must be handled by the caller
/// before this point.
pub(crate) fn resolve_tag(tag: &str) -> QueryResult<&str> {
    match tag {
        "Column" | "Constant" | "Variable" | "Operator" | "Conditional"
        | "ConditionalContainer" | "ValuesArray" | "QueryTerm" | "FunctionCall" | "MinusTerm"
        | "Formula" | "Case" => Ok(tag),
        other => Err(QueryError::InvalidType(other.to_string())),
    }
}

pub(crate) fn shape_to_str(shape: ResultShape) -> &'static str {
    match shape {
        ResultShape::Rows => "Rows",
        ResultShape::Count => "Count",
        ResultShape::First { use_default: false } => "First",
        ResultShape::First { use_default: true } => "FirstOrDefault",
    }
}

pub(crate) fn shape_from_str(text: &str) -> QueryResult<ResultShape> {
    match text {
        "Rows" => Ok(ResultShape::Rows),
        "Count" => Ok(ResultShape::Count),
        "First" => Ok(ResultShape::First { use_default: false }),
        "FirstOrDefault" => Ok(ResultShape::First { use_default: true }),
        other => Err(QueryError::Wire(format!("unknown result shape: {}", other))),
    }
}
