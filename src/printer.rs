//! Deterministic AST -> text printer.
//!
//! `print_query` is a right-inverse of [`crate::parser::parse`] for the
//! subset of queries the printer itself produces: feeding printer output
//! back through the parser reconstructs a structurally identical AST. JSON
//! literal operands are rendered by delegating to a caller-supplied
//! [`JsonPrinter`], keeping the JBL binary/textual representation genuinely
//! external, as the crate's scope requires.

use crate::ast::{JoinCode, JsonNode, OpCode, StringFlavour, Unit};

/// Output sink, standing in for the reference implementation's
/// `emit_fn(data, size, ch, count)` callback pair.
pub trait EmitSink {
    fn write_str(&mut self, s: &str);

    fn write_char_n(&mut self, ch: char, count: usize) {
        for _ in 0..count {
            let mut buf = [0u8; 4];
            self.write_str(ch.encode_utf8(&mut buf));
        }
    }
}

/// Delegate for rendering a JSON literal operand or `apply` payload. Kept
/// external to this crate: JBL (de)serialization lives elsewhere.
pub trait JsonPrinter {
    fn print_json(&mut self, node: &JsonNode, sink: &mut dyn EmitSink);
}

/// A plain `String`-backed [`EmitSink`], convenient for tests and for
/// callers that just want owned text back.
#[derive(Debug, Default)]
pub struct StringSink {
    buf: String,
}

impl StringSink {
    pub fn new() -> Self {
        StringSink::default()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl EmitSink for StringSink {
    fn write_str(&mut self, s: &str) {
        self.buf.push_str(s);
    }
}

/// Print `query` (a QUERY unit) to `sink`, delegating JSON literals to
/// `json_printer`.
pub fn print_query<'a>(
    query: &'a Unit<'a>,
    sink: &mut dyn EmitSink,
    json_printer: &mut dyn JsonPrinter,
) {
    let q = query.as_query().expect("print_query expects a QUERY unit");
    print_filter_chain(q.filter, sink, json_printer);
    if let Some(apply) = q.apply.get() {
        sink.write_str(" | apply ");
        json_printer.print_json(apply.as_json().expect("apply payload is JSON"), sink);
    } else if let Some(name) = q.apply_placeholder.get() {
        sink.write_str(" | apply :");
        sink.write_str(name);
    }
    if let Some(projection) = q.projection.get() {
        print_projection_chain(projection, sink);
    }
}

fn print_filter_chain<'a>(head: &'a Unit<'a>, sink: &mut dyn EmitSink, jp: &mut dyn JsonPrinter) {
    let mut current = Some(head);
    let mut first = true;
    while let Some(unit) = current {
        let f = unit.as_filter().expect("filter chain link");
        if !first {
            sink.write_str("\n");
        }
        if let Some(join) = f.join.get() {
            print_join_prefix(join, sink);
        }
        if let Some(anchor) = f.anchor.get() {
            sink.write_str("@");
            sink.write_str(anchor);
        }
        print_node_chain(f.node, sink, jp);
        first = false;
        current = f.next.get();
    }
}

fn print_join_prefix<'a>(join: &'a Unit<'a>, sink: &mut dyn EmitSink) {
    let j = join.as_join().expect("join unit");
    if j.negate {
        sink.write_str("not ");
    }
    sink.write_str(match j.join {
        JoinCode::And => "and ",
        JoinCode::Or => "or ",
    });
}

fn print_node_chain<'a>(head: &'a Unit<'a>, sink: &mut dyn EmitSink, jp: &mut dyn JsonPrinter) {
    let mut current = Some(head);
    while let Some(unit) = current {
        let n = unit.as_node().expect("node chain link");
        sink.write_str("/");
        use crate::ast::NodeType;
        match n.ntype {
            NodeType::Field => sink.write_str(n.value.as_string().expect("field node value").value),
            NodeType::Any => sink.write_str("*"),
            NodeType::Anys => sink.write_str("**"),
            NodeType::Expr => {
                sink.write_str("[");
                print_expr_chain(n.value, sink, jp);
                sink.write_str("]");
            }
        }
        current = n.next.get();
    }
}

fn print_expr_chain<'a>(head: &'a Unit<'a>, sink: &mut dyn EmitSink, jp: &mut dyn JsonPrinter) {
    let mut current = Some(head);
    let mut first = true;
    while let Some(unit) = current {
        let e = unit.as_expr().expect("expr chain link");
        if !first {
            sink.write_str(" ");
        }
        if let Some(join) = e.join.get() {
            print_join_prefix(join, sink);
        }
        print_operand(e.left, sink, jp);
        sink.write_str(" ");
        print_op(e.op, sink);
        sink.write_str(" ");
        print_operand(e.right, sink, jp);
        first = false;
        current = e.next.get();
    }
}

fn print_op<'a>(op_unit: &'a Unit<'a>, sink: &mut dyn EmitSink) {
    let o = op_unit.as_op().expect("op unit");
    if o.negate && o.op == OpCode::Eq {
        sink.write_str("!=");
        return;
    }
    if o.negate {
        sink.write_str("not ");
    }
    sink.write_str(match o.op {
        OpCode::Eq => "=",
        OpCode::Gt => ">",
        OpCode::Gte => ">=",
        OpCode::Lt => "<",
        OpCode::Lte => "<=",
        OpCode::In => "in",
        OpCode::Re => "re",
        OpCode::Like => "like",
    });
}

fn print_operand<'a>(unit: &'a Unit<'a>, sink: &mut dyn EmitSink, jp: &mut dyn JsonPrinter) {
    match unit {
        Unit::String(s) => {
            let flavour = s.flavour.get();
            if flavour.contains(StringFlavour::PLACEHOLDER) {
                sink.write_str(":");
                sink.write_str(s.value);
            } else if flavour.contains(StringFlavour::QUOTED) {
                sink.write_str("\"");
                sink.write_str(&quote_escape(s.value));
                sink.write_str("\"");
            } else {
                sink.write_str(s.value);
            }
        }
        Unit::Json(node) => jp.print_json(node, sink),
        other => unreachable!("operand must be STRING or JSON, found {}", other.tag()),
    }
}

/// Minimal re-escaping for a quoted STRING operand: only the two
/// characters that would otherwise terminate or corrupt the literal.
/// `strcodec::unescape` accepts this output unchanged.
fn quote_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out
}

fn print_projection_chain<'a>(head: &'a Unit<'a>, sink: &mut dyn EmitSink) {
    sink.write_str(" | ");
    let mut current = Some(head);
    let mut first = true;
    while let Some(unit) = current {
        let p = unit.as_projection().expect("projection chain link");
        if !first {
            sink.write_str(if p.exclude.get() { " - " } else { " + " });
        }
        print_proj_path(p.value, sink);
        first = false;
        current = p.next.get();
    }
}

fn print_proj_path<'a>(head: &'a Unit<'a>, sink: &mut dyn EmitSink) {
    let mut current = Some(head);
    while let Some(unit) = current {
        let s = unit.as_string().expect("projpath segment");
        sink.write_str("/");
        if s.flavour.get().contains(StringFlavour::PROJFIELD) {
            sink.write_str("{");
            sink.write_str(s.value);
            let mut sub = s.subnext.get();
            while let Some(subunit) = sub {
                let ss = subunit.as_string().expect("projfield block member");
                sink.write_str(",");
                sink.write_str(ss.value);
                sub = ss.subnext.get();
            }
            sink.write_str("}");
        } else {
            sink.write_str(s.value);
        }
        current = s.next.get();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserLimits;
    use crate::parser;
    use crate::session::Session;

    struct NullJsonPrinter;
    impl JsonPrinter for NullJsonPrinter {
        fn print_json(&mut self, node: &JsonNode, sink: &mut dyn EmitSink) {
            use crate::ast::JsonType;
            match node.jtype {
                JsonType::I64 => sink.write_str(&node.vi64.get().to_string()),
                JsonType::F64 => sink.write_str(&node.vf64.get().to_string()),
                JsonType::Bool => sink.write_str(if node.vbool.get() { "true" } else { "false" }),
                JsonType::Null => sink.write_str("null"),
                JsonType::Str => {
                    sink.write_str("\"");
                    sink.write_str(node.vstr.get().unwrap_or(""));
                    sink.write_str("\"");
                }
                JsonType::Array | JsonType::Object => sink.write_str("{}"),
            }
        }
    }

    fn print(input: &str) -> String {
        let session = Session::new(input, ParserLimits::default());
        let query = parser::parse(&session).unwrap();
        let mut sink = StringSink::new();
        let mut jp = NullJsonPrinter;
        print_query(query, &mut sink, &mut jp);
        sink.into_string()
    }

    #[test]
    fn prints_simple_equality_filter() {
        assert_eq!(print("/foo/[bar = 42]"), "/foo/[bar = 42]");
    }

    #[test]
    fn prints_negated_eq_as_bang_equals() {
        assert_eq!(print("/foo/[bar not eq 1]"), "/foo/[bar != 1]");
    }

    #[test]
    fn bang_equals_round_trips_through_not_eq() {
        assert_eq!(print("/foo/[bar != 1]"), "/foo/[bar != 1]");
    }

    #[test]
    fn prints_negated_non_eq_with_not_prefix() {
        assert_eq!(print("/foo/[bar not gt 1]"), "/foo/[bar not > 1]");
    }

    #[test]
    fn prints_placeholder_operand() {
        assert_eq!(print("/foo/[bar = :baz]"), "/foo/[bar = :baz]");
    }

    #[test]
    fn prints_projection_with_exclude() {
        assert_eq!(
            print("/a/[x = 1] | /b/{c,d} - /e"),
            "/a/[x = 1] | /b/{c,d} - /e"
        );
    }

    #[test]
    fn round_trip_reparses_to_the_same_shape() {
        let input = "/a/[x = 1] and /b/[y > 2] | /c/{d,e} + /f";
        let printed = print(input);
        let session = Session::new(&printed, ParserLimits::default());
        let reparsed = parser::parse(&session).unwrap();
        let mut sink = StringSink::new();
        let mut jp = NullJsonPrinter;
        print_query(reparsed, &mut sink, &mut jp);
        assert_eq!(sink.into_string(), printed);
    }
}
