//! Compact binary wire format.
//!
//! Every node is `[type tag][payload]`, where the tag is a u32-LE
//! length-prefixed UTF-8 string and a zero-length tag means "no node" at
//! that slot. Sequences write a `true` continuation byte before each
//! element and a final `false` sentinel. Strings inside payloads use the
//! same length-prefixed encoding; optional strings carry a presence byte.

use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::query::{
    GroupBy, JoinInfo, JoinType, ParameterSet, ProjectionEntry, QueryInfo, Sort,
};
use crate::term::{
    CaseConditional, CaseWhenExpression, Column, ComparisonOp, Conditional, ConditionalContainer,
    ConditionalTerm, Connector, Constant, Formula, FormulaOp, FunctionCall, MinusTerm, Operator,
    QueryTerm, ValuesArray, Variable,
};
use crate::wire::{resolve_tag, shape_from_str, shape_to_str, tag_is_empty};

/// Encode a term tree.
pub fn to_bytes(term: &ConditionalTerm) -> Vec<u8> {
    let mut buf = Vec::new();
    write_term(&mut buf, Some(term));
    buf
}

/// Decode a term tree. An empty root slot is an error here; optional
/// slots only occur inside nodes.
pub fn from_bytes(bytes: &[u8]) -> QueryResult<ConditionalTerm> {
    let mut reader = ByteReader::new(bytes);
    let term = read_term(&mut reader)?
        .ok_or_else(|| QueryError::Wire("empty root node".to_string()))?;
    reader.expect_end()?;
    Ok(term)
}

/// Encode a full query payload.
pub fn query_to_bytes(query: &QueryInfo) -> Vec<u8> {
    let mut buf = Vec::new();
    write_query(&mut buf, query);
    buf
}

/// Decode a full query payload.
pub fn query_from_bytes(bytes: &[u8]) -> QueryResult<QueryInfo> {
    let mut reader = ByteReader::new(bytes);
    let query = read_query(&mut reader)?;
    reader.expect_end()?;
    Ok(query)
}

// ---------------------------------------------------------------- writing

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(value as u8);
}

fn write_string(buf: &mut Vec<u8>, text: &str) {
    write_u32(buf, text.len() as u32);
    buf.extend_from_slice(text.as_bytes());
}

fn write_opt_string(buf: &mut Vec<u8>, text: Option<&str>) {
    match text {
        Some(text) => {
            write_bool(buf, true);
            write_string(buf, text);
        }
        None => write_bool(buf, false),
    }
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    write_string(buf, &value.to_string());
}

fn write_term(buf: &mut Vec<u8>, term: Option<&ConditionalTerm>) {
    let term = match term {
        Some(term) => term,
        None => {
            write_string(buf, "");
            return;
        }
    };

    write_string(buf, term.type_tag());

    match term {
        ConditionalTerm::Column(c) => {
            write_opt_string(buf, c.owner.as_deref());
            write_opt_string(buf, c.name.as_deref());
        }
        ConditionalTerm::Constant(c) => write_string(buf, &c.text),
        ConditionalTerm::Variable(v) => write_string(buf, &v.name),
        ConditionalTerm::Operator(o) => write_string(buf, o.op.as_str()),
        ConditionalTerm::Conditional(c) => {
            write_term(buf, c.left.as_deref());
            let op_term = c.op.clone().map(ConditionalTerm::Operator);
            write_term(buf, op_term.as_ref());
            write_term(buf, c.right.as_deref());
        }
        ConditionalTerm::Container(c) => write_container(buf, c),
        ConditionalTerm::ValuesArray(array) => {
            for value in &array.values {
                write_bool(buf, true);
                write_term(buf, Some(value));
            }
            write_bool(buf, false);
        }
        ConditionalTerm::Query(q) => write_query(buf, &q.query),
        ConditionalTerm::FunctionCall(call) => {
            write_string(buf, &call.name);
            for arg in &call.args {
                write_bool(buf, true);
                write_term(buf, Some(arg));
            }
            write_bool(buf, false);
        }
        ConditionalTerm::Minus(m) => write_term(buf, Some(&m.term)),
        ConditionalTerm::Formula(formula) => {
            write_term(buf, Some(&formula.left));
            write_string(buf, formula.op.as_str());
            write_term(buf, Some(&formula.right));
        }
        ConditionalTerm::Case(case) => {
            for when in &case.whens {
                write_bool(buf, true);
                write_term(buf, Some(&when.expression));
                write_term(buf, Some(&when.result));
            }
            write_bool(buf, false);
            write_term(buf, case.default.as_deref());
        }
    }
}

fn write_container(buf: &mut Vec<u8>, container: &ConditionalContainer) {
    for item in &container.items {
        write_bool(buf, true);
        write_term(buf, Some(item));
    }
    write_bool(buf, false);

    for connector in &container.connectors {
        write_bool(buf, true);
        buf.push(match connector {
            Connector::And => 0,
            Connector::Or => 1,
        });
    }
    write_bool(buf, false);

    write_parameters(buf, &container.parameters);
}

fn write_parameters(buf: &mut Vec<u8>, params: &ParameterSet) {
    for param in params.iter() {
        write_bool(buf, true);
        write_string(buf, &param.name);
        write_value(buf, &param.value);
    }
    write_bool(buf, false);
}

fn write_query(buf: &mut Vec<u8>, query: &QueryInfo) {
    write_string(buf, &query.entity);

    for entry in &query.projection {
        write_bool(buf, true);
        write_opt_string(buf, entry.owner.as_deref());
        write_string(buf, &entry.name);
    }
    write_bool(buf, false);

    match &query.where_clause {
        Some(container) => {
            write_string(buf, "ConditionalContainer");
            write_container(buf, container);
        }
        None => write_string(buf, ""),
    }

    for entry in &query.group_by.entries {
        write_bool(buf, true);
        write_term(buf, Some(&entry.term));
    }
    write_bool(buf, false);

    for entry in &query.sort.entries {
        write_bool(buf, true);
        write_term(buf, Some(&entry.term));
        write_bool(buf, entry.reverse);
    }
    write_bool(buf, false);

    for join in &query.joins {
        write_bool(buf, true);
        write_string(buf, &join.left);
        write_string(buf, &join.right);
        write_string(buf, join.kind.as_str());
        write_container(buf, &join.conditional);
    }
    write_bool(buf, false);

    match query.skip {
        Some(skip) => {
            write_bool(buf, true);
            write_u64(buf, skip);
        }
        None => write_bool(buf, false),
    }
    match query.take {
        Some(take) => {
            write_bool(buf, true);
            write_u64(buf, take);
        }
        None => write_bool(buf, false),
    }

    write_string(buf, shape_to_str(query.shape));

    for union in &query.unions {
        write_bool(buf, true);
        write_query(buf, union);
    }
    write_bool(buf, false);
}

// ---------------------------------------------------------------- reading

struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn take(&mut self, count: usize) -> QueryResult<&'a [u8]> {
        let end = self.position.checked_add(count).filter(|e| *e <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.position..end];
                self.position = end;
                Ok(slice)
            }
            None => Err(QueryError::Wire(format!(
                "unexpected end of input at byte {}",
                self.position
            ))),
        }
    }

    fn read_u32(&mut self) -> QueryResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> QueryResult<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    fn read_bool(&mut self) -> QueryResult<bool> {
        let position = self.position;
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(QueryError::Wire(format!(
                "invalid boolean {} at byte {}",
                other, position
            ))),
        }
    }

    fn read_string(&mut self) -> QueryResult<String> {
        let position = self.position;
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| QueryError::Wire(format!("invalid UTF-8 string at byte {}", position)))
    }

    fn read_opt_string(&mut self) -> QueryResult<Option<String>> {
        if self.read_bool()? {
            Ok(Some(self.read_string()?))
        } else {
            Ok(None)
        }
    }

    fn read_value(&mut self) -> QueryResult<Value> {
        let position = self.position;
        let text = self.read_string()?;
        serde_json::from_str(&text)
            .map_err(|e| QueryError::Wire(format!("invalid value at byte {}: {}", position, e)))
    }

    fn expect_end(&self) -> QueryResult<()> {
        if self.position == self.data.len() {
            Ok(())
        } else {
            Err(QueryError::Wire(format!(
                "trailing bytes after payload at byte {}",
                self.position
            )))
        }
    }
}

fn read_term(r: &mut ByteReader<'_>) -> QueryResult<Option<ConditionalTerm>> {
    let tag = r.read_string()?;
    if tag_is_empty(&tag) {
        return Ok(None);
    }

    let term = match resolve_tag(&tag)? {
        "Column" => ConditionalTerm::Column(Column {
            owner: r.read_opt_string()?,
            name: r.read_opt_string()?,
        }),
        "Constant" => ConditionalTerm::Constant(Constant {
            text: r.read_string()?,
        }),
        "Variable" => ConditionalTerm::Variable(Variable {
            name: r.read_string()?,
        }),
        "Operator" => ConditionalTerm::Operator(read_operator(r)?),
        "Conditional" => {
            let left = read_term(r)?;
            let op = match read_term(r)? {
                None => None,
                Some(ConditionalTerm::Operator(o)) => Some(o),
                Some(other) => {
                    return Err(QueryError::Wire(format!(
                        "expected operator in conditional, got {}",
                        other.type_tag()
                    )));
                }
            };
            let right = read_term(r)?;
            ConditionalTerm::Conditional(Box::new(Conditional {
                left: left.map(Box::new),
                op,
                right: right.map(Box::new),
            }))
        }
        "ConditionalContainer" => ConditionalTerm::Container(read_container(r)?),
        "ValuesArray" => {
            let mut values = Vec::new();
            while r.read_bool()? {
                values.push(read_slot(r)?);
            }
            ConditionalTerm::ValuesArray(ValuesArray { values })
        }
        "QueryTerm" => ConditionalTerm::Query(QueryTerm {
            query: Box::new(read_query(r)?),
        }),
        "FunctionCall" => {
            let name = r.read_string()?;
            let mut args = Vec::new();
            while r.read_bool()? {
                args.push(read_slot(r)?);
            }
            ConditionalTerm::FunctionCall(FunctionCall { name, args })
        }
        "MinusTerm" => ConditionalTerm::Minus(MinusTerm {
            term: Box::new(read_slot(r)?),
        }),
        "Formula" => {
            let left = read_slot(r)?;
            let op_text = r.read_string()?;
            let op = FormulaOp::parse(&op_text).ok_or_else(|| {
                QueryError::Wire(format!("unknown formula operator: {}", op_text))
            })?;
            let right = read_slot(r)?;
            ConditionalTerm::Formula(Box::new(Formula { left, op, right }))
        }
        "Case" => {
            let mut whens = Vec::new();
            while r.read_bool()? {
                let expression = read_slot(r)?;
                let result = read_slot(r)?;
                whens.push(CaseWhenExpression { expression, result });
            }
            let default = read_term(r)?.map(Box::new);
            ConditionalTerm::Case(CaseConditional { whens, default })
        }
        _ => unreachable!("resolve_tag covers the registry"),
    };

    Ok(Some(term))
}

/// Read a term slot that must be present.
fn read_slot(r: &mut ByteReader<'_>) -> QueryResult<ConditionalTerm> {
    read_term(r)?.ok_or_else(|| QueryError::Wire("missing required node".to_string()))
}

fn read_operator(r: &mut ByteReader<'_>) -> QueryResult<Operator> {
    let text = r.read_string()?;
    let op = ComparisonOp::parse(&text)
        .ok_or_else(|| QueryError::Wire(format!("unknown operator: {}", text)))?;
    Ok(Operator { op })
}

fn read_container(r: &mut ByteReader<'_>) -> QueryResult<ConditionalContainer> {
    let mut container = ConditionalContainer::new();

    while r.read_bool()? {
        container.items.push(read_slot(r)?);
    }

    while r.read_bool()? {
        let position = r.position;
        container.connectors.push(match r.take(1)?[0] {
            0 => Connector::And,
            1 => Connector::Or,
            other => {
                return Err(QueryError::Wire(format!(
                    "invalid connector {} at byte {}",
                    other, position
                )));
            }
        });
    }

    if container.connectors.len() != container.items.len().saturating_sub(1) {
        return Err(QueryError::Wire(format!(
            "container has {} items but {} connectors",
            container.items.len(),
            container.connectors.len()
        )));
    }

    container.parameters = read_parameters(r)?;
    Ok(container)
}

fn read_parameters(r: &mut ByteReader<'_>) -> QueryResult<ParameterSet> {
    let mut params = ParameterSet::new();
    while r.read_bool()? {
        let name = r.read_string()?;
        let value = r.read_value()?;
        params.push(name, value);
    }
    Ok(params)
}

fn read_query(r: &mut ByteReader<'_>) -> QueryResult<QueryInfo> {
    let mut query = QueryInfo::new(r.read_string()?);

    while r.read_bool()? {
        let owner = r.read_opt_string()?;
        let name = r.read_string()?;
        query.projection.push(ProjectionEntry { owner, name });
    }

    let where_tag = r.read_string()?;
    if !tag_is_empty(&where_tag) {
        if where_tag != "ConditionalContainer" {
            return Err(QueryError::Wire(format!(
                "expected container in where clause, got {}",
                where_tag
            )));
        }
        query.where_clause = Some(read_container(r)?);
    }

    let mut group_by = GroupBy::new();
    while r.read_bool()? {
        group_by.add(read_slot(r)?);
    }
    query.group_by = group_by;

    let mut sort = Sort::new();
    while r.read_bool()? {
        let term = read_slot(r)?;
        let reverse = r.read_bool()?;
        sort.add(term, reverse);
    }
    query.sort = sort;

    while r.read_bool()? {
        let left = r.read_string()?;
        let right = r.read_string()?;
        let kind_text = r.read_string()?;
        let kind = JoinType::parse(&kind_text)
            .ok_or_else(|| QueryError::Wire(format!("unknown join type: {}", kind_text)))?;
        let conditional = read_container(r)?;
        query.joins.push(JoinInfo {
            left,
            right,
            conditional,
            kind,
        });
    }

    if r.read_bool()? {
        query.skip = Some(r.read_u64()?);
    }
    if r.read_bool()? {
        query.take = Some(r.read_u64()?);
    }

    query.shape = shape_from_str(&r.read_string()?)?;

    while r.read_bool()? {
        query.unions.push(read_query(r)?);
    }

    Ok(query)
}
