//! XML wire format.
//!
//! Terms serialize as elements carrying their registry tag in a `type`
//! attribute; the read side prefers that attribute and falls back to the
//! element's local name, stripping namespace and dotted-qualifier
//! prefixes first. Absent optional children are written as `type="Empty"`
//! elements and decode to `None`.
//!
//! The quick-xml event API is confined to the two document functions at
//! the bottom; everything else works over a small element tree.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{QueryError, QueryResult};
use crate::query::{
    GroupBy, JoinInfo, JoinType, ParameterSet, ProjectionEntry, QueryInfo, Sort,
};
use crate::term::{
    CaseConditional, CaseWhenExpression, Column, ComparisonOp, Conditional, ConditionalContainer,
    ConditionalTerm, Connector, Constant, Formula, FormulaOp, FunctionCall, MinusTerm, Operator,
    QueryTerm, ValuesArray, Variable,
};
use crate::wire::{resolve_tag, shape_from_str, shape_to_str, strip_tag_qualifiers, tag_is_empty};

/// Encode a term tree as an XML document with a `Term` root element.
pub fn to_xml(term: &ConditionalTerm) -> QueryResult<String> {
    write_document(&term_node("Term", Some(term)))
}

/// Decode a term tree from XML. The root element must hold a node.
pub fn from_xml(xml: &str) -> QueryResult<ConditionalTerm> {
    let root = parse_document(xml)?;
    node_term(&root)?.ok_or_else(|| QueryError::Wire("empty root element".to_string()))
}

/// Encode a full query payload.
pub fn query_to_xml(query: &QueryInfo) -> QueryResult<String> {
    write_document(&query_node("Query", query))
}

/// Decode a full query payload.
pub fn query_from_xml(xml: &str) -> QueryResult<QueryInfo> {
    let root = parse_document(xml)?;
    node_query(&root)
}

// ----------------------------------------------------------- element tree

#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn new(name: impl Into<String>) -> Self {
        XmlNode {
            name: name.into(),
            ..Default::default()
        }
    }

    fn with_attr(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.attrs
            .push((name.to_string(), value.as_ref().to_string()));
        self
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn find(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn find_all(&self, name: &str) -> Vec<&XmlNode> {
        self.children.iter().filter(|c| c.name == name).collect()
    }
}

fn require_attr<'a>(node: &'a XmlNode, name: &str) -> QueryResult<&'a str> {
    node.attr(name).ok_or_else(|| {
        QueryError::Wire(format!(
            "element {} is missing the {} attribute",
            node.name, name
        ))
    })
}

// ---------------------------------------------------------------- writing

fn term_node(slot: &str, term: Option<&ConditionalTerm>) -> XmlNode {
    let term = match term {
        Some(term) => term,
        None => return XmlNode::new(slot).with_attr("type", "Empty"),
    };

    let mut node = XmlNode::new(slot).with_attr("type", term.type_tag());

    match term {
        ConditionalTerm::Column(c) => {
            if let Some(owner) = &c.owner {
                node = node.with_attr("owner", owner);
            }
            if let Some(name) = &c.name {
                node = node.with_attr("name", name);
            }
        }
        ConditionalTerm::Constant(c) => {
            node = node.with_attr("text", &c.text);
        }
        ConditionalTerm::Variable(v) => {
            node = node.with_attr("name", &v.name);
        }
        ConditionalTerm::Operator(o) => {
            node = node.with_attr("op", o.op.as_str());
        }
        ConditionalTerm::Conditional(c) => {
            node.children.push(term_node("Left", c.left.as_deref()));
            let op_term = c.op.clone().map(ConditionalTerm::Operator);
            node.children.push(term_node("Operator", op_term.as_ref()));
            node.children.push(term_node("Right", c.right.as_deref()));
        }
        ConditionalTerm::Container(c) => {
            push_container_children(&mut node, c);
        }
        ConditionalTerm::ValuesArray(array) => {
            for value in &array.values {
                node.children.push(term_node("Value", Some(value)));
            }
        }
        ConditionalTerm::Query(q) => {
            node.children.push(query_node("Query", &q.query));
        }
        ConditionalTerm::FunctionCall(call) => {
            node = node.with_attr("name", &call.name);
            for arg in &call.args {
                node.children.push(term_node("Argument", Some(arg)));
            }
        }
        ConditionalTerm::Minus(m) => {
            node.children.push(term_node("Term", Some(&m.term)));
        }
        ConditionalTerm::Formula(formula) => {
            node = node.with_attr("op", formula.op.as_str());
            node.children.push(term_node("Left", Some(&formula.left)));
            node.children.push(term_node("Right", Some(&formula.right)));
        }
        ConditionalTerm::Case(case) => {
            for when in &case.whens {
                let mut when_node = XmlNode::new("When");
                when_node
                    .children
                    .push(term_node("Expression", Some(&when.expression)));
                when_node
                    .children
                    .push(term_node("Result", Some(&when.result)));
                node.children.push(when_node);
            }
            node.children
                .push(term_node("Default", case.default.as_deref()));
        }
    }

    node
}

fn push_container_children(node: &mut XmlNode, container: &ConditionalContainer) {
    for (i, item) in container.items.iter().enumerate() {
        let mut item_node = term_node("Item", Some(item));
        if i > 0 {
            item_node = item_node.with_attr("connector", container.connectors[i - 1].as_str());
        }
        node.children.push(item_node);
    }
    for param in container.parameters.iter() {
        node.children.push(
            XmlNode::new("Parameter")
                .with_attr("name", &param.name)
                .with_attr("value", param.value.to_string()),
        );
    }
}

fn query_node(name: &str, query: &QueryInfo) -> XmlNode {
    let mut node = XmlNode::new(name)
        .with_attr("entity", &query.entity)
        .with_attr("shape", shape_to_str(query.shape));
    if let Some(skip) = query.skip {
        node = node.with_attr("skip", skip.to_string());
    }
    if let Some(take) = query.take {
        node = node.with_attr("take", take.to_string());
    }

    let mut projection = XmlNode::new("Projection");
    for entry in &query.projection {
        let mut column = XmlNode::new("Column").with_attr("name", &entry.name);
        if let Some(owner) = &entry.owner {
            column = column.with_attr("owner", owner);
        }
        projection.children.push(column);
    }
    node.children.push(projection);

    let where_node = match &query.where_clause {
        Some(container) => {
            let mut where_node =
                XmlNode::new("Where").with_attr("type", "ConditionalContainer");
            push_container_children(&mut where_node, container);
            where_node
        }
        None => XmlNode::new("Where").with_attr("type", "Empty"),
    };
    node.children.push(where_node);

    let mut group_by = XmlNode::new("GroupBy");
    for entry in &query.group_by.entries {
        group_by
            .children
            .push(term_node("GroupByColumn", Some(&entry.term)));
    }
    node.children.push(group_by);

    let mut sort = XmlNode::new("Sort");
    for entry in &query.sort.entries {
        sort.children.push(
            term_node("SortColumn", Some(&entry.term))
                .with_attr("reverse", if entry.reverse { "true" } else { "false" }),
        );
    }
    node.children.push(sort);

    let mut joins = XmlNode::new("Joins");
    for join in &query.joins {
        let mut join_node = XmlNode::new("Join")
            .with_attr("left", &join.left)
            .with_attr("right", &join.right)
            .with_attr("kind", join.kind.as_str());
        let mut on_node = XmlNode::new("On").with_attr("type", "ConditionalContainer");
        push_container_children(&mut on_node, &join.conditional);
        join_node.children.push(on_node);
        joins.children.push(join_node);
    }
    node.children.push(joins);

    let mut unions = XmlNode::new("Unions");
    for union in &query.unions {
        unions.children.push(query_node("Union", union));
    }
    node.children.push(unions);

    node
}

// ---------------------------------------------------------------- reading

fn node_term(node: &XmlNode) -> QueryResult<Option<ConditionalTerm>> {
    // The type attribute wins; the element's local name is the fallback.
    let raw_tag = node.attr("type").unwrap_or(&node.name);
    let tag = strip_tag_qualifiers(raw_tag);
    if tag_is_empty(tag) {
        return Ok(None);
    }

    let term = match resolve_tag(tag)? {
        "Column" => ConditionalTerm::Column(Column {
            owner: node.attr("owner").map(str::to_string),
            name: node.attr("name").map(str::to_string),
        }),
        "Constant" => ConditionalTerm::Constant(Constant {
            text: require_attr(node, "text")?.to_string(),
        }),
        "Variable" => ConditionalTerm::Variable(Variable {
            name: require_attr(node, "name")?.to_string(),
        }),
        "Operator" => ConditionalTerm::Operator(node_operator(node)?),
        "Conditional" => {
            let left = optional_slot(node, "Left")?;
            let op = match optional_slot(node, "Operator")? {
                None => None,
                Some(ConditionalTerm::Operator(o)) => Some(o),
                Some(other) => {
                    return Err(QueryError::Wire(format!(
                        "expected operator in conditional, got {}",
                        other.type_tag()
                    )));
                }
            };
            let right = optional_slot(node, "Right")?;
            ConditionalTerm::Conditional(Box::new(Conditional {
                left: left.map(Box::new),
                op,
                right: right.map(Box::new),
            }))
        }
        "ConditionalContainer" => ConditionalTerm::Container(node_container(node)?),
        "ValuesArray" => {
            let mut values = Vec::new();
            for child in node.find_all("Value") {
                values.push(required_term(child)?);
            }
            ConditionalTerm::ValuesArray(ValuesArray { values })
        }
        "QueryTerm" => {
            let query_child = node.find("Query").ok_or_else(|| {
                QueryError::Wire("query term is missing its Query child".to_string())
            })?;
            ConditionalTerm::Query(QueryTerm {
                query: Box::new(node_query(query_child)?),
            })
        }
        "FunctionCall" => {
            let name = require_attr(node, "name")?.to_string();
            let mut args = Vec::new();
            for child in node.find_all("Argument") {
                args.push(required_term(child)?);
            }
            ConditionalTerm::FunctionCall(FunctionCall { name, args })
        }
        "MinusTerm" => {
            let child = node.find("Term").ok_or_else(|| {
                QueryError::Wire("minus term is missing its Term child".to_string())
            })?;
            ConditionalTerm::Minus(MinusTerm {
                term: Box::new(required_term(child)?),
            })
        }
        "Formula" => {
            let op_text = require_attr(node, "op")?;
            let op = FormulaOp::parse(op_text).ok_or_else(|| {
                QueryError::Wire(format!("unknown formula operator: {}", op_text))
            })?;
            let left = required_slot(node, "Left")?;
            let right = required_slot(node, "Right")?;
            ConditionalTerm::Formula(Box::new(Formula { left, op, right }))
        }
        "Case" => {
            let mut whens = Vec::new();
            for when_node in node.find_all("When") {
                whens.push(CaseWhenExpression {
                    expression: required_slot(when_node, "Expression")?,
                    result: required_slot(when_node, "Result")?,
                });
            }
            let default = match node.find("Default") {
                Some(child) => node_term(child)?.map(Box::new),
                None => None,
            };
            ConditionalTerm::Case(CaseConditional { whens, default })
        }
        _ => unreachable!("resolve_tag covers the registry"),
    };

    Ok(Some(term))
}

/// A named child slot that may legitimately be absent or `Empty`.
fn optional_slot(node: &XmlNode, name: &str) -> QueryResult<Option<ConditionalTerm>> {
    match node.find(name) {
        Some(child) => node_term(child),
        None => Ok(None),
    }
}

/// A named child slot that must hold a node.
fn required_slot(node: &XmlNode, name: &str) -> QueryResult<ConditionalTerm> {
    optional_slot(node, name)?.ok_or_else(|| {
        QueryError::Wire(format!("element {} is missing its {} child", node.name, name))
    })
}

/// A child element that must itself decode to a node.
fn required_term(node: &XmlNode) -> QueryResult<ConditionalTerm> {
    node_term(node)?
        .ok_or_else(|| QueryError::Wire(format!("element {} holds no node", node.name)))
}

fn node_operator(node: &XmlNode) -> QueryResult<Operator> {
    let text = require_attr(node, "op")?;
    let op = ComparisonOp::parse(text)
        .ok_or_else(|| QueryError::Wire(format!("unknown operator: {}", text)))?;
    Ok(Operator { op })
}

fn node_container(node: &XmlNode) -> QueryResult<ConditionalContainer> {
    let mut container = ConditionalContainer::new();

    for (i, item_node) in node.find_all("Item").into_iter().enumerate() {
        let term = required_term(item_node)?;
        let connector = if i > 0 {
            let text = item_node.attr("connector").unwrap_or("AND");
            Connector::parse(text)
                .ok_or_else(|| QueryError::Wire(format!("unknown connector: {}", text)))?
        } else {
            Connector::And
        };
        container.add(connector, term);
    }

    container.parameters = node_parameters(node)?;
    Ok(container)
}

fn node_parameters(node: &XmlNode) -> QueryResult<ParameterSet> {
    let mut params = ParameterSet::new();
    for param_node in node.find_all("Parameter") {
        let name = require_attr(param_node, "name")?;
        let raw = require_attr(param_node, "value")?;
        let value = serde_json::from_str(raw).map_err(|e| {
            QueryError::Wire(format!("invalid parameter value for {}: {}", name, e))
        })?;
        params.push(name, value);
    }
    Ok(params)
}

fn node_query(node: &XmlNode) -> QueryResult<QueryInfo> {
    let mut query = QueryInfo::new(require_attr(node, "entity")?);

    if let Some(shape) = node.attr("shape") {
        query.shape = shape_from_str(shape)?;
    }
    if let Some(skip) = node.attr("skip") {
        query.skip = Some(parse_count(node, "skip", skip)?);
    }
    if let Some(take) = node.attr("take") {
        query.take = Some(parse_count(node, "take", take)?);
    }

    if let Some(projection) = node.find("Projection") {
        for column in projection.find_all("Column") {
            query.projection.push(ProjectionEntry {
                owner: column.attr("owner").map(str::to_string),
                name: require_attr(column, "name")?.to_string(),
            });
        }
    }

    if let Some(where_node) = node.find("Where") {
        query.where_clause = match node_term(where_node)? {
            None => None,
            Some(ConditionalTerm::Container(container)) => Some(container),
            Some(other) => {
                return Err(QueryError::Wire(format!(
                    "expected container in where clause, got {}",
                    other.type_tag()
                )));
            }
        };
    }

    if let Some(group_node) = node.find("GroupBy") {
        let mut group_by = GroupBy::new();
        for child in group_node.find_all("GroupByColumn") {
            group_by.add(required_term(child)?);
        }
        query.group_by = group_by;
    }

    if let Some(sort_node) = node.find("Sort") {
        let mut sort = Sort::new();
        for child in sort_node.find_all("SortColumn") {
            let term = required_term(child)?;
            let reverse = child.attr("reverse") == Some("true");
            sort.add(term, reverse);
        }
        query.sort = sort;
    }

    if let Some(joins_node) = node.find("Joins") {
        for join_node in joins_node.find_all("Join") {
            let kind_text = require_attr(join_node, "kind")?;
            let kind = JoinType::parse(kind_text)
                .ok_or_else(|| QueryError::Wire(format!("unknown join type: {}", kind_text)))?;
            let on_node = join_node.find("On").ok_or_else(|| {
                QueryError::Wire("join is missing its On child".to_string())
            })?;
            query.joins.push(JoinInfo {
                left: require_attr(join_node, "left")?.to_string(),
                right: require_attr(join_node, "right")?.to_string(),
                conditional: node_container(on_node)?,
                kind,
            });
        }
    }

    if let Some(unions_node) = node.find("Unions") {
        for union_node in unions_node.find_all("Union") {
            query.unions.push(node_query(union_node)?);
        }
    }

    Ok(query)
}

fn parse_count(node: &XmlNode, attr: &str, raw: &str) -> QueryResult<u64> {
    raw.parse::<u64>().map_err(|_| {
        QueryError::Wire(format!(
            "element {} has a non-numeric {} attribute: {}",
            node.name, attr, raw
        ))
    })
}

// ------------------------------------------------------------- documents

fn write_document(root: &XmlNode) -> QueryResult<String> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, root)?;
    String::from_utf8(writer.into_inner())
        .map_err(|_| QueryError::Wire("produced non-UTF-8 document".to_string()))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> QueryResult<()> {
    let mut start = BytesStart::new(node.name.as_str());
    for (name, value) in &node.attrs {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if node.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(|e| QueryError::Wire(e.to_string()))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| QueryError::Wire(e.to_string()))?;
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(|e| QueryError::Wire(e.to_string()))?;
    Ok(())
}

fn parse_document(xml: &str) -> QueryResult<XmlNode> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| QueryError::Wire(format!("malformed XML: {}", e)))?;
        match event {
            Event::Start(start) => stack.push(node_from_start(&start)?),
            Event::Empty(start) => {
                let node = node_from_start(&start)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| QueryError::Wire("unbalanced element".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Eof => break,
            // Text, comments, declarations carry no payload here.
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(QueryError::Wire("unclosed element".to_string()));
    }
    root.ok_or_else(|| QueryError::Wire("empty document".to_string()))
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> QueryResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        Ok(())
    } else if root.is_none() {
        *root = Some(node);
        Ok(())
    } else {
        Err(QueryError::Wire("multiple root elements".to_string()))
    }
}

fn node_from_start(start: &BytesStart<'_>) -> QueryResult<XmlNode> {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut node = XmlNode::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| QueryError::Wire(format!("malformed attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| QueryError::Wire(format!("malformed attribute value: {}", e)))?
            .to_string();
        node.attrs.push((key, value));
    }
    Ok(node)
}
