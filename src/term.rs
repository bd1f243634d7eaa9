//! The conditional expression AST.
//!
//! `ConditionalTerm` is a closed tagged union over every node kind the
//! parser, the typed translator, and the wire formats exchange. All nodes
//! are value-like trees: `Clone` is a deep copy of the whole subtree and
//! `PartialEq` is structural equality, which is what makes cached trees
//! safe to reuse across queries (clone first, then customize).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::{ParameterSet, QueryInfo};

/// The universal AST node for conditional expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionalTerm {
    Column(Column),
    Constant(Constant),
    Variable(Variable),
    Operator(Operator),
    Conditional(Box<Conditional>),
    Container(ConditionalContainer),
    ValuesArray(ValuesArray),
    Query(QueryTerm),
    FunctionCall(FunctionCall),
    Minus(MinusTerm),
    Formula(Box<Formula>),
    Case(CaseConditional),
}

impl ConditionalTerm {
    /// Stable type-tag string shared by all wire formats.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ConditionalTerm::Column(_) => "Column",
            ConditionalTerm::Constant(_) => "Constant",
            ConditionalTerm::Variable(_) => "Variable",
            ConditionalTerm::Operator(_) => "Operator",
            ConditionalTerm::Conditional(_) => "Conditional",
            ConditionalTerm::Container(_) => "ConditionalContainer",
            ConditionalTerm::ValuesArray(_) => "ValuesArray",
            ConditionalTerm::Query(_) => "QueryTerm",
            ConditionalTerm::FunctionCall(_) => "FunctionCall",
            ConditionalTerm::Minus(_) => "MinusTerm",
            ConditionalTerm::Formula(_) => "Formula",
            ConditionalTerm::Case(_) => "Case",
        }
    }

    pub fn column(name: impl Into<String>) -> Self {
        ConditionalTerm::Column(Column {
            owner: None,
            name: Some(name.into()),
        })
    }

    pub fn column_of(owner: impl Into<String>, name: impl Into<String>) -> Self {
        ConditionalTerm::Column(Column {
            owner: Some(owner.into()),
            name: Some(name.into()),
        })
    }

    pub fn constant(text: impl Into<String>) -> Self {
        ConditionalTerm::Constant(Constant { text: text.into() })
    }

    pub fn variable(name: impl Into<String>) -> Self {
        ConditionalTerm::Variable(Variable { name: name.into() })
    }

    pub fn comparison(left: ConditionalTerm, op: ComparisonOp, right: ConditionalTerm) -> Self {
        ConditionalTerm::Conditional(Box::new(Conditional {
            left: Some(Box::new(left)),
            op: Some(Operator { op }),
            right: Some(Box::new(right)),
        }))
    }
}

/// References a source field, optionally qualified by a table alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub owner: Option<String>,
    pub name: Option<String>,
}

impl Column {
    /// Parse a dotted `owner.name` expression with optional trailing
    /// whitespace. The split point is the last `.` before the final
    /// non-space run; input without an identifier yields `name = None`.
    pub fn parse(text: &str) -> Column {
        let trimmed = text.trim_end();
        match trimmed.rfind('.') {
            Some(idx) => {
                let owner = trimmed[..idx].trim();
                let name = trimmed[idx + 1..].trim_start();
                Column {
                    owner: if owner.is_empty() {
                        None
                    } else {
                        Some(owner.to_string())
                    },
                    name: if name.is_empty() {
                        None
                    } else {
                        Some(name.to_string())
                    },
                }
            }
            None => {
                let name = trimmed.trim_start();
                Column {
                    owner: None,
                    name: if name.is_empty() {
                        None
                    } else {
                        Some(name.to_string())
                    },
                }
            }
        }
    }
}

/// Literal value carried in its lexical form, not yet type-coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub text: String,
}

/// Named parameter placeholder (`?x` / `@x`), resolved at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
}

/// Comparison/keyword operator used as the glue in a `Conditional`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    Like,
    NotLike,
    Is,
    IsNot,
    In,
    NotIn,
    Between,
    Exists,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "<>",
            ComparisonOp::Gt => ">",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::Like => "LIKE",
            ComparisonOp::NotLike => "NOT LIKE",
            ComparisonOp::Is => "IS",
            ComparisonOp::IsNot => "IS NOT",
            ComparisonOp::In => "IN",
            ComparisonOp::NotIn => "NOT IN",
            ComparisonOp::Between => "BETWEEN",
            ComparisonOp::Exists => "EXISTS",
        }
    }

    /// Parse an operator from its textual form. `==` and `!=` normalize to
    /// `=` and `<>`; keyword operators are case-insensitive.
    pub fn parse(text: &str) -> Option<ComparisonOp> {
        match text.to_uppercase().as_str() {
            "=" | "==" => Some(ComparisonOp::Eq),
            "<>" | "!=" => Some(ComparisonOp::NotEq),
            ">" => Some(ComparisonOp::Gt),
            ">=" => Some(ComparisonOp::GtEq),
            "<" => Some(ComparisonOp::Lt),
            "<=" => Some(ComparisonOp::LtEq),
            "LIKE" => Some(ComparisonOp::Like),
            "NOT LIKE" => Some(ComparisonOp::NotLike),
            "IS" => Some(ComparisonOp::Is),
            "IS NOT" => Some(ComparisonOp::IsNot),
            "IN" => Some(ComparisonOp::In),
            "NOT IN" => Some(ComparisonOp::NotIn),
            "BETWEEN" => Some(ComparisonOp::Between),
            "EXISTS" => Some(ComparisonOp::Exists),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub op: ComparisonOp,
}

/// Binary comparison node. Every child is optional so trees with absent
/// children (a bare column reference, a unary EXISTS) round-trip intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub left: Option<Box<ConditionalTerm>>,
    pub op: Option<Operator>,
    pub right: Option<Box<ConditionalTerm>>,
}

impl Conditional {
    pub fn new(
        left: Option<ConditionalTerm>,
        op: Option<ComparisonOp>,
        right: Option<ConditionalTerm>,
    ) -> Self {
        Conditional {
            left: left.map(Box::new),
            op: op.map(|op| Operator { op }),
            right: right.map(Box::new),
        }
    }
}

/// Logical connective between container siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }

    pub fn parse(text: &str) -> Option<Connector> {
        match text.to_uppercase().as_str() {
            "AND" => Some(Connector::And),
            "OR" => Some(Connector::Or),
            _ => None,
        }
    }
}

/// Ordered sequence of conditionals joined by AND/OR. Doubles as the root
/// of a WHERE/HAVING/JOIN-ON clause and owns the clause's parameters.
///
/// Invariant: `connectors.len() == items.len().saturating_sub(1)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionalContainer {
    pub items: Vec<ConditionalTerm>,
    pub connectors: Vec<Connector>,
    pub parameters: ParameterSet,
}

impl ConditionalContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a term. The connector is ignored for the first item.
    pub fn add(&mut self, connector: Connector, term: ConditionalTerm) {
        if !self.items.is_empty() {
            self.connectors.push(connector);
        }
        self.items.push(term);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The sole item, when the container wraps exactly one conditional.
    pub fn single(&self) -> Option<&ConditionalTerm> {
        if self.items.len() == 1 {
            self.items.first()
        } else {
            None
        }
    }
}

/// Fixed-size ordered list of non-null terms, used for `IN (...)` and the
/// two bounds of `BETWEEN`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValuesArray {
    pub values: Vec<ConditionalTerm>,
}

/// Embeds a full nested query (sub-select) as a term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTerm {
    pub query: Box<QueryInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<ConditionalTerm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinusTerm {
    pub term: Box<ConditionalTerm>,
}

/// Arithmetic operator inside a `Formula`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormulaOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl FormulaOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaOp::Add => "+",
            FormulaOp::Sub => "-",
            FormulaOp::Mul => "*",
            FormulaOp::Div => "/",
            FormulaOp::Mod => "%",
        }
    }

    pub fn parse(text: &str) -> Option<FormulaOp> {
        match text {
            "+" => Some(FormulaOp::Add),
            "-" => Some(FormulaOp::Sub),
            "*" => Some(FormulaOp::Mul),
            "/" => Some(FormulaOp::Div),
            "%" => Some(FormulaOp::Mod),
            _ => None,
        }
    }
}

/// Arithmetic expression over two terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub left: ConditionalTerm,
    pub op: FormulaOp,
    pub right: ConditionalTerm,
}

/// One `WHEN expression THEN result` arm of a CASE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseWhenExpression {
    pub expression: ConditionalTerm,
    pub result: ConditionalTerm,
}

/// `CASE WHEN ... THEN ... [ELSE ...] END`. Arm order is evaluation order
/// and is preserved exactly by every serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseConditional {
    pub whens: Vec<CaseWhenExpression>,
    pub default: Option<Box<ConditionalTerm>>,
}

impl fmt::Display for ConditionalTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionalTerm::Column(c) => write!(f, "{}", c),
            ConditionalTerm::Constant(c) => write!(f, "{}", c.text),
            ConditionalTerm::Variable(v) => write!(f, "?{}", v.name),
            ConditionalTerm::Operator(o) => write!(f, "{}", o.op.as_str()),
            ConditionalTerm::Conditional(c) => write!(f, "{}", c),
            ConditionalTerm::Container(c) => write!(f, "({})", c),
            ConditionalTerm::ValuesArray(v) => {
                write!(f, "(")?;
                for (i, value) in v.values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
            ConditionalTerm::Query(q) => write!(f, "({})", q.query),
            ConditionalTerm::FunctionCall(c) => {
                write!(f, "{}(", c.name)?;
                for (i, arg) in c.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            ConditionalTerm::Minus(m) => write!(f, "-{}", m.term),
            ConditionalTerm::Formula(x) => {
                write!(f, "{} {} {}", x.left, x.op.as_str(), x.right)
            }
            ConditionalTerm::Case(c) => {
                write!(f, "CASE")?;
                for when in &c.whens {
                    write!(f, " WHEN {} THEN {}", when.expression, when.result)?;
                }
                if let Some(default) = &c.default {
                    write!(f, " ELSE {}", default)?;
                }
                write!(f, " END")
            }
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.owner, &self.name) {
            (Some(owner), Some(name)) => write!(f, "{}.{}", owner, name),
            (None, Some(name)) => write!(f, "{}", name),
            (Some(owner), None) => write!(f, "{}.", owner),
            (None, None) => Ok(()),
        }
    }
}

impl fmt::Display for Conditional {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // EXISTS renders unary: the left side is absent.
        if let Some(op) = &self.op {
            if op.op == ComparisonOp::Exists {
                return match &self.right {
                    Some(right) => write!(f, "EXISTS {}", right),
                    None => write!(f, "EXISTS"),
                };
            }
        }

        if let Some(left) = &self.left {
            write!(f, "{}", left)?;
        }
        if let Some(op) = &self.op {
            write!(f, " {}", op.op.as_str())?;
        }
        if let Some(right) = &self.right {
            write!(f, " {}", right)?;
        }
        Ok(())
    }
}

impl fmt::Display for ConditionalContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.connectors[i - 1].as_str())?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}
