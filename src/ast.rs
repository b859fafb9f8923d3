//! The AST data model: a tagged `Unit` node plus typed
//! views for string, number, JSON literal, operator, join, expression, node,
//! filter, projection and query. Every `Unit` is arena-allocated
//! (see [`crate::arena`]) and lives exactly as long as its owning
//! [`Session`](crate::session::Session).
//!
//! Links that are only known after construction (`next`, `subnext`, `join`,
//! `child`/`prev` sibling-ring pointers) are `Cell<Option<&'a Unit<'a>>>` so
//! reducers can attach them post-hoc; links fixed at construction time
//! (`Expr::left/op/right`, `Node::value`, `Filter::node`) are plain
//! references.

use std::cell::Cell;

bitflags::bitflags! {
    /// Flavour bits carried by a [`StringUnit`]. A single string can carry
    /// more than one flavour (e.g. a quoted projection alias).
    #[derive(Default)]
    pub struct StringFlavour: u8 {
        const QUOTED     = 0b0000_0001;
        const PLACEHOLDER = 0b0000_0010;
        const ANCHOR     = 0b0000_0100;
        const PROJFIELD  = 0b0000_1000;
        const PROJALIAS  = 0b0001_0000;
    }
}

/// A STRING unit: `value`, `flavour`, the `next` chain used to thread
/// sibling strings (projection paths), and `subnext` used to thread the
/// children of a `{a,b,c}` projection field block.
#[derive(Debug)]
pub struct StringUnit<'a> {
    pub value: &'a str,
    pub flavour: Cell<StringFlavour>,
    pub next: Cell<Option<&'a Unit<'a>>>,
    pub subnext: Cell<Option<&'a Unit<'a>>>,
}

/// An INTEGER unit: a signed 64-bit literal.
#[derive(Debug, Clone, Copy)]
pub struct IntegerUnit {
    pub value: i64,
}

/// A DOUBLE unit: an IEEE-754 binary64 literal.
#[derive(Debug, Clone, Copy)]
pub struct DoubleUnit {
    pub value: f64,
}

/// JBL-style JSON node type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Bool,
    I64,
    F64,
    Str,
    Array,
    Object,
}

/// A JSON unit: an embedded JBL-shaped node. `child`/`next`/`prev` form a
/// doubly linked, circular-at-the-head sibling ring within each parent
/// (invariant 2: `head.prev == tail`, `tail.next == None`). `key`/`klidx`
/// are set only when this node is a member of an OBJECT parent.
#[derive(Debug)]
pub struct JsonNode<'a> {
    pub jtype: JsonType,
    pub vbool: Cell<bool>,
    pub vi64: Cell<i64>,
    pub vf64: Cell<f64>,
    pub vstr: Cell<Option<&'a str>>,
    pub key: Cell<Option<&'a str>>,
    pub klidx: Cell<usize>,
    pub child: Cell<Option<&'a Unit<'a>>>,
    pub next: Cell<Option<&'a Unit<'a>>>,
    pub prev: Cell<Option<&'a Unit<'a>>>,
}

impl<'a> JsonNode<'a> {
    pub fn scalar(jtype: JsonType) -> Self {
        JsonNode {
            jtype,
            vbool: Cell::new(false),
            vi64: Cell::new(0),
            vf64: Cell::new(0.0),
            vstr: Cell::new(None),
            key: Cell::new(None),
            klidx: Cell::new(0),
            child: Cell::new(None),
            next: Cell::new(None),
            prev: Cell::new(None),
        }
    }
}

/// Comparison/membership operator code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Re,
    Like,
}

/// An OP unit: operator code plus a one-shot negate flag consumed from the
/// session at construction time.
#[derive(Debug, Clone, Copy)]
pub struct OpUnit {
    pub op: OpCode,
    pub negate: bool,
}

/// Boolean combinator code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinCode {
    And,
    Or,
}

/// A JOIN unit: combinator code plus a one-shot negate flag.
#[derive(Debug, Clone, Copy)]
pub struct JoinUnit {
    pub join: JoinCode,
    pub negate: bool,
}

/// An EXPR unit: `left OP right`, optionally joined to the previous sibling
/// expression in an `EXPR_CHAIN`, linked to the next expression via `next`.
#[derive(Debug)]
pub struct ExprUnit<'a> {
    pub left: &'a Unit<'a>,
    pub op: &'a Unit<'a>,
    pub right: &'a Unit<'a>,
    pub join: Cell<Option<&'a Unit<'a>>>,
    pub next: Cell<Option<&'a Unit<'a>>>,
}

/// Path-segment kind for a NODE unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Field,
    Any,
    Anys,
    Expr,
}

/// A NODE unit: one `/x`, `/*`, `/**`, or `/[…]` path segment.
#[derive(Debug)]
pub struct NodeUnit<'a> {
    pub ntype: NodeType,
    pub value: &'a Unit<'a>,
    pub next: Cell<Option<&'a Unit<'a>>>,
}

/// A FILTER unit: an optional `@anchor`, the head of a NODE path, an
/// optional join to the previous sibling filter, and `next`.
#[derive(Debug)]
pub struct FilterUnit<'a> {
    pub anchor: Cell<Option<&'a str>>,
    pub node: &'a Unit<'a>,
    pub join: Cell<Option<&'a Unit<'a>>>,
    pub next: Cell<Option<&'a Unit<'a>>>,
}

/// A PROJECTION unit: the head of a path-of-strings, an exclude flag, and
/// `next` threading sibling projections.
#[derive(Debug)]
pub struct ProjectionUnit<'a> {
    pub value: &'a Unit<'a>,
    pub exclude: Cell<bool>,
    pub next: Cell<Option<&'a Unit<'a>>>,
}

/// A QUERY unit: the head FILTER, an `apply` JSON literal XOR an
/// `apply_placeholder` name, and an optional PROJECTION.
#[derive(Debug)]
pub struct QueryUnit<'a> {
    pub filter: &'a Unit<'a>,
    pub apply: Cell<Option<&'a Unit<'a>>>,
    pub apply_placeholder: Cell<Option<&'a str>>,
    pub projection: Cell<Option<&'a Unit<'a>>>,
}

/// The tagged node union. Every variant holds only the fields it needs;
/// there is no field shared loosely across variants the way
/// a C union would allow; Rust's enum makes the "exactly one of these
/// shapes" invariant a type-system guarantee instead of a documentation
/// convention.
#[derive(Debug)]
pub enum Unit<'a> {
    String(StringUnit<'a>),
    Integer(IntegerUnit),
    Double(DoubleUnit),
    Json(JsonNode<'a>),
    Op(OpUnit),
    Join(JoinUnit),
    Expr(ExprUnit<'a>),
    Node(NodeUnit<'a>),
    Filter(FilterUnit<'a>),
    Projection(ProjectionUnit<'a>),
    Query(QueryUnit<'a>),
}

macro_rules! typed_view {
    ($as_ref:ident, $variant:ident, $ty:ty) => {
        pub fn $as_ref(&self) -> Option<&$ty> {
            match self {
                Unit::$variant(v) => Some(v),
                _ => None,
            }
        }
    };
}

impl<'a> Unit<'a> {
    typed_view!(as_string, String, StringUnit<'a>);
    typed_view!(as_integer, Integer, IntegerUnit);
    typed_view!(as_double, Double, DoubleUnit);
    typed_view!(as_json, Json, JsonNode<'a>);
    typed_view!(as_op, Op, OpUnit);
    typed_view!(as_join, Join, JoinUnit);
    typed_view!(as_expr, Expr, ExprUnit<'a>);
    typed_view!(as_node, Node, NodeUnit<'a>);
    typed_view!(as_filter, Filter, FilterUnit<'a>);
    typed_view!(as_projection, Projection, ProjectionUnit<'a>);
    typed_view!(as_query, Query, QueryUnit<'a>);

    pub fn tag(&self) -> &'static str {
        match self {
            Unit::String(_) => "STRING",
            Unit::Integer(_) => "INTEGER",
            Unit::Double(_) => "DOUBLE",
            Unit::Json(_) => "JSON",
            Unit::Op(_) => "OP",
            Unit::Join(_) => "JOIN",
            Unit::Expr(_) => "EXPR",
            Unit::Node(_) => "NODE",
            Unit::Filter(_) => "FILTER",
            Unit::Projection(_) => "PROJECTION",
            Unit::Query(_) => "QUERY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_flavour_bits_combine() {
        let f = StringFlavour::QUOTED | StringFlavour::PLACEHOLDER;
        assert!(f.contains(StringFlavour::QUOTED));
        assert!(f.contains(StringFlavour::PLACEHOLDER));
        assert!(!f.contains(StringFlavour::ANCHOR));
    }

    #[test]
    fn tag_reports_variant_name() {
        let u = Unit::Integer(IntegerUnit { value: 42 });
        assert_eq!(u.tag(), "INTEGER");
        assert!(u.as_integer().is_some());
        assert!(u.as_double().is_none());
    }
}
