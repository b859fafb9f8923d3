//! The grammar driver: a hand-written recursive-descent recognizer
//! over the [`Lexer`] token stream. Every production builds its `Unit`
//! directly into the session's [`Arena`](crate::arena::Arena) and, where the
//! reference grammar pushes intermediate results onto a parser stack for a
//! later reducer to collect, this does the same against
//! [`Session::stack`]. `pop_expr_chain`, `pop_node_chain`,
//! `pop_filters_and_set_query`, `pop_projections`, `pop_joined_projections`
//! and `pop_projfields_chain` below are named after, and implement, exactly
//! those reducers. Each walks from the current stack top down to a sentinel
//! depth captured before its matching sequence of pushes began, which
//! stands in for the reference implementation's "until this specific unit"
//! pointer sentinel: a stack depth is simpler to carry through a
//! recursive-descent call tree than a unit identity and has the same
//! stopping behaviour.
//!
//! There is no error recovery: the first production that can't match
//! returns `Err` via [`Session::fatal`], which the top-level [`parse`]
//! propagates straight out with `?`.

use std::cell::Cell;

use crate::ast::{
    ExprUnit, FilterUnit, JoinCode, JoinUnit, JsonNode, JsonType, NodeType, NodeUnit, OpCode,
    OpUnit, ProjectionUnit, QueryUnit, StringFlavour, StringUnit, Unit,
};
use crate::error::JqlError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::session::Session;

/// Parse `session`'s input into a QUERY unit, recording it on the session
/// via [`Session::set_query`] and returning it.
pub fn parse<'a>(session: &'a Session<'a>) -> Result<&'a Unit<'a>, JqlError> {
    let mut lexer = Lexer::new(session);
    let current = lexer.next_token()?;
    let mut parser = Parser {
        session,
        lexer,
        current,
        json_depth: 0,
    };
    let query = parser.parse_query()?;
    parser.expect_eof()?;
    Ok(query)
}

struct Parser<'a> {
    session: &'a Session<'a>,
    lexer: Lexer<'a>,
    current: Token,
    /// Current JSON array/object nesting depth, guarded against
    /// `ParserLimits::max_recursion_depth` -- the only place this grammar
    /// can recurse arbitrarily deep on adversarial input.
    json_depth: u32,
}

impl<'a> Parser<'a> {
    fn bump(&mut self) -> Result<(), JqlError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn ident_is(&self, word: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Ident(s) if s == word)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), JqlError> {
        if std::mem::discriminant(&self.current.kind) == std::mem::discriminant(&kind) {
            self.bump()
        } else {
            Err(self.unexpected(&format!("expected {:?}", kind)))
        }
    }

    fn expect_eof(&mut self) -> Result<(), JqlError> {
        if matches!(self.current.kind, TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected("expected end of query"))
        }
    }

    fn unexpected(&self, msg: &str) -> JqlError {
        self.session.fatal(
            format!("{msg}, found {:?}", self.current.kind),
            self.current.start,
        )
    }

    fn arena(&self) -> &'a crate::arena::Arena<'a> {
        self.session.arena()
    }

    // ---- QUERY := FILTER (JOIN FILTER)* (APPLY|PROJ)* ----

    fn parse_query(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        let mark = self.session.stack().len();
        self.parse_filter()?;
        while let Some(join) = self.try_parse_join()? {
            self.session.stack().push_unit(join);
            self.parse_filter()?;
        }
        let query = self.pop_filters_and_set_query(mark)?;

        loop {
            if !matches!(self.current.kind, TokenKind::Pipe) {
                break;
            }
            self.bump()?;
            if self.ident_is("apply") {
                self.bump()?;
                self.parse_apply_clause(query)?;
            } else {
                let q = query.as_query().expect("query unit");
                if q.projection.get().is_some() {
                    return Err(self.unexpected("duplicate projection clause"));
                }
                let projection = self.parse_projection_clause()?;
                q.projection.set(Some(projection));
            }
        }
        Ok(query)
    }

    fn parse_apply_clause(&mut self, query: &'a Unit<'a>) -> Result<(), JqlError> {
        let q = query.as_query().expect("query unit");
        if q.apply.get().is_some() || q.apply_placeholder.get().is_some() {
            return Err(self.unexpected("duplicate apply clause"));
        }
        if let TokenKind::Placeholder(name) = self.current.kind.clone() {
            self.bump()?;
            self.session.note_placeholder();
            let interned = self.session.intern_placeholder(&name)?;
            q.apply_placeholder.set(Some(interned));
        } else {
            let json = self.parse_json_literal()?;
            q.apply.set(Some(json));
        }
        Ok(())
    }

    /// Reducer: pop FILTER/JOIN frames down to `until`, threading `next`
    /// between filters and attaching each JOIN to the filter it introduces,
    /// then wrap the result in a fresh QUERY unit (apply/projection slots
    /// empty, filled in by the caller) and record it on the session.
    fn pop_filters_and_set_query(&mut self, until: usize) -> Result<&'a Unit<'a>, JqlError> {
        let mut filter: Option<&'a Unit<'a>> = None;
        while self.session.stack().len() > until {
            let unit = self.session.stack().pop_unit()?;
            match unit {
                Unit::Filter(f) => {
                    if let Some(prev_head) = filter {
                        f.next.set(Some(prev_head));
                    }
                    filter = Some(unit);
                }
                Unit::Join(_) => match filter {
                    Some(head) => head.as_filter().unwrap().join.set(Some(unit)),
                    None => return Err(self.unexpected("join with no following filter")),
                },
                _ => return Err(self.unexpected("expected FILTER or JOIN on the parser stack")),
            }
        }
        let filter = filter.ok_or_else(|| self.unexpected("query has no filter"))?;
        let query = self.arena().alloc_unit(Unit::Query(QueryUnit {
            filter,
            apply: Cell::new(None),
            apply_placeholder: Cell::new(None),
            projection: Cell::new(None),
        }))?;
        self.session.set_query(query);
        Ok(query)
    }

    /// Parse an optional `not` followed by `and`/`or`, building a JOIN unit.
    /// Returns `Ok(None)` with nothing consumed when neither is present.
    /// A `not` not followed by `and`/`or` clears the one-shot negate flag
    /// before failing, so a malformed query reports `QUERY_PARSE` instead
    /// of tripping the dangling-negate assertion at session teardown.
    fn try_parse_join(&mut self) -> Result<Option<&'a Unit<'a>>, JqlError> {
        let saw_not = self.ident_is("not");
        if saw_not {
            self.bump()?;
            self.session.set_negate();
        }
        let code = if self.ident_is("and") {
            JoinCode::And
        } else if self.ident_is("or") {
            JoinCode::Or
        } else {
            if saw_not {
                self.session.take_negate();
                return Err(self.unexpected("expected 'and' or 'or' after 'not'"));
            }
            return Ok(None);
        };
        self.bump()?;
        let negate = self.session.take_negate();
        Ok(Some(
            self.arena().alloc_unit(Unit::Join(JoinUnit { join: code, negate }))?,
        ))
    }

    // ---- FILTER := '@' IDENT? NODE+ ----

    fn parse_filter(&mut self) -> Result<(), JqlError> {
        let anchor_name = if let TokenKind::Anchor(name) = self.current.kind.clone() {
            self.bump()?;
            Some(name)
        } else {
            None
        };
        let mark = self.session.stack().len();
        self.parse_node()?;
        while matches!(self.current.kind, TokenKind::Slash) {
            self.parse_node()?;
        }
        let node_head = self.pop_node_chain(mark)?;
        let anchor = match anchor_name {
            Some(n) => Some(self.arena().intern_str(&n)?),
            None => None,
        };
        let filter = self.arena().alloc_unit(Unit::Filter(FilterUnit {
            anchor: Cell::new(anchor),
            node: node_head,
            join: Cell::new(None),
            next: Cell::new(None),
        }))?;
        self.session.stack().push_unit(filter);
        Ok(())
    }

    /// Reducer: pop NODE frames down to `until`, threading `next` so the
    /// head is the first path segment written.
    fn pop_node_chain(&mut self, until: usize) -> Result<&'a Unit<'a>, JqlError> {
        let mut head: Option<&'a Unit<'a>> = None;
        while self.session.stack().len() > until {
            let unit = self.session.stack().pop_unit()?;
            match unit {
                Unit::Node(n) => {
                    if let Some(prev_head) = head {
                        n.next.set(Some(prev_head));
                    }
                    head = Some(unit);
                }
                _ => return Err(self.unexpected("expected NODE on the parser stack")),
            }
        }
        head.ok_or_else(|| self.unexpected("path has no segments"))
    }

    // ---- NODE := '/' (IDENT | '*' | '**' | '[' EXPR_CHAIN ']') ----

    fn parse_node(&mut self) -> Result<(), JqlError> {
        self.expect(TokenKind::Slash)?;
        match self.current.kind.clone() {
            TokenKind::LBracket => {
                self.bump()?;
                let value = self.parse_expr_chain()?;
                self.expect(TokenKind::RBracket)?;
                let node = self.arena().alloc_unit(Unit::Node(NodeUnit {
                    ntype: NodeType::Expr,
                    value,
                    next: Cell::new(None),
                }))?;
                self.session.stack().push_unit(node);
            }
            TokenKind::Ident(text) => {
                self.bump()?;
                // Classification is strict full-string equality, not a
                // length-bounded prefix match: a field literally named
                // "*x" is a FIELD node, not an ANY node with trailing junk.
                let ntype = match text.as_str() {
                    "*" => NodeType::Any,
                    "**" => NodeType::Anys,
                    _ => NodeType::Field,
                };
                let interned = self.arena().intern_str(&text)?;
                let value = self.arena().alloc_unit(Unit::String(StringUnit {
                    value: interned,
                    flavour: Cell::new(StringFlavour::empty()),
                    next: Cell::new(None),
                    subnext: Cell::new(None),
                }))?;
                let node = self.arena().alloc_unit(Unit::Node(NodeUnit {
                    ntype,
                    value,
                    next: Cell::new(None),
                }))?;
                self.session.stack().push_unit(node);
            }
            _ => return Err(self.unexpected("expected a field name, '*', '**' or '['")),
        }
        Ok(())
    }

    // ---- EXPR_CHAIN := EXPR (JOIN EXPR)* ----

    fn parse_expr_chain(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        let mark = self.session.stack().len();
        let first = self.parse_expr()?;
        self.session.stack().push_unit(first);
        while let Some(join) = self.try_parse_join()? {
            self.session.stack().push_unit(join);
            let expr = self.parse_expr()?;
            self.session.stack().push_unit(expr);
        }
        self.pop_expr_chain(mark)
    }

    /// Reducer: pop EXPR/JOIN frames down to `until`, threading `next`
    /// between expressions and attaching each JOIN to the expression it
    /// introduces.
    fn pop_expr_chain(&mut self, until: usize) -> Result<&'a Unit<'a>, JqlError> {
        let mut expr: Option<&'a Unit<'a>> = None;
        while self.session.stack().len() > until {
            let unit = self.session.stack().pop_unit()?;
            match unit {
                Unit::Expr(e) => {
                    if let Some(prev_head) = expr {
                        e.next.set(Some(prev_head));
                    }
                    expr = Some(unit);
                }
                Unit::Join(_) => match expr {
                    Some(head) => head.as_expr().unwrap().join.set(Some(unit)),
                    None => return Err(self.unexpected("join with no following expression")),
                },
                _ => return Err(self.unexpected("expected EXPR or JOIN on the parser stack")),
            }
        }
        expr.ok_or_else(|| self.unexpected("empty expression chain"))
    }

    // ---- EXPR := OPERAND OP OPERAND ----

    fn parse_expr(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        let left = self.parse_operand()?;
        let op = self.parse_op()?;
        let right = self.parse_operand()?;
        self.arena().alloc_unit(Unit::Expr(ExprUnit {
            left,
            op,
            right,
            join: Cell::new(None),
            next: Cell::new(None),
        }))
    }

    fn parse_op(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        if self.ident_is("not") {
            self.bump()?;
            self.session.set_negate();
        }
        if matches!(self.current.kind, TokenKind::NotEq) {
            self.bump()?;
            self.session.set_negate();
            let negate = self.session.take_negate();
            return self.arena().alloc_unit(Unit::Op(OpUnit { op: OpCode::Eq, negate }));
        }
        let op = match self.current.kind.clone() {
            TokenKind::Eq => Some(OpCode::Eq),
            TokenKind::Gt => Some(OpCode::Gt),
            TokenKind::Gte => Some(OpCode::Gte),
            TokenKind::Lt => Some(OpCode::Lt),
            TokenKind::Lte => Some(OpCode::Lte),
            TokenKind::Ident(ref word) => match word.as_str() {
                "eq" => Some(OpCode::Eq),
                "gt" => Some(OpCode::Gt),
                "gte" => Some(OpCode::Gte),
                "lt" => Some(OpCode::Lt),
                "lte" => Some(OpCode::Lte),
                "in" => Some(OpCode::In),
                "re" => Some(OpCode::Re),
                "like" => Some(OpCode::Like),
                _ => None,
            },
            _ => None,
        };
        let op = match op {
            Some(op) => {
                self.bump()?;
                op
            }
            None => {
                self.session.take_negate();
                return Err(self.unexpected("expected a comparison operator"));
            }
        };
        let negate = self.session.take_negate();
        self.arena().alloc_unit(Unit::Op(OpUnit { op, negate }))
    }

    // ---- OPERAND := IDENT | QUOTED | ':' IDENT | JSON_LITERAL ----

    fn parse_operand(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        match self.current.kind.clone() {
            TokenKind::Placeholder(name) => {
                self.bump()?;
                self.session.note_placeholder();
                let interned = self.session.intern_placeholder(&name)?;
                self.arena().alloc_unit(Unit::String(StringUnit {
                    value: interned,
                    flavour: Cell::new(StringFlavour::PLACEHOLDER),
                    next: Cell::new(None),
                    subnext: Cell::new(None),
                }))
            }
            TokenKind::Quoted(text) => {
                self.bump()?;
                let interned = self.arena().intern_str(&text)?;
                self.arena().alloc_unit(Unit::String(StringUnit {
                    value: interned,
                    flavour: Cell::new(StringFlavour::QUOTED),
                    next: Cell::new(None),
                    subnext: Cell::new(None),
                }))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" | "false" | "null" => self.parse_json_literal(),
                _ => {
                    self.bump()?;
                    let interned = self.arena().intern_str(&word)?;
                    self.arena().alloc_unit(Unit::String(StringUnit {
                        value: interned,
                        flavour: Cell::new(StringFlavour::empty()),
                        next: Cell::new(None),
                        subnext: Cell::new(None),
                    }))
                }
            },
            TokenKind::Number(_) | TokenKind::LBracket | TokenKind::LBrace => {
                self.parse_json_literal()
            }
            _ => Err(self.unexpected("expected an operand")),
        }
    }

    // ---- JSON_LITERAL ----

    fn parse_json_literal(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        match self.current.kind.clone() {
            TokenKind::Number(text) => {
                let offset = self.current.start;
                self.bump()?;
                self.build_json_number(&text, offset)
            }
            TokenKind::Quoted(text) => {
                self.bump()?;
                let interned = self.arena().intern_str(&text)?;
                let node = JsonNode::scalar(JsonType::Str);
                node.vstr.set(Some(interned));
                self.arena().alloc_unit(Unit::Json(node))
            }
            TokenKind::Ident(word) => {
                self.bump()?;
                match word.as_str() {
                    "true" => {
                        let node = JsonNode::scalar(JsonType::Bool);
                        node.vbool.set(true);
                        self.arena().alloc_unit(Unit::Json(node))
                    }
                    "false" => {
                        let node = JsonNode::scalar(JsonType::Bool);
                        node.vbool.set(false);
                        self.arena().alloc_unit(Unit::Json(node))
                    }
                    "null" => self.arena().alloc_unit(Unit::Json(JsonNode::scalar(JsonType::Null))),
                    _ => Err(self.unexpected("expected a JSON literal")),
                }
            }
            TokenKind::LBracket | TokenKind::LBrace => {
                if self.json_depth >= self.session.limits().max_recursion_depth {
                    return Err(self.unexpected("JSON literal nesting exceeds the recursion limit"));
                }
                self.json_depth += 1;
                let result = if matches!(self.current.kind, TokenKind::LBracket) {
                    self.parse_json_array()
                } else {
                    self.parse_json_object()
                };
                self.json_depth -= 1;
                result
            }
            _ => Err(self.unexpected("expected a JSON literal")),
        }
    }

    fn build_json_number(&mut self, text: &str, offset: usize) -> Result<&'a Unit<'a>, JqlError> {
        if text.contains('.') || text.contains('e') || text.contains('E') {
            let value: f64 = text
                .parse()
                .map_err(|_| self.session.fatal("invalid numeric literal", offset))?;
            let node = JsonNode::scalar(JsonType::F64);
            node.vf64.set(value);
            self.arena().alloc_unit(Unit::Json(node))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.session.fatal("invalid numeric literal", offset))?;
            let node = JsonNode::scalar(JsonType::I64);
            node.vi64.set(value);
            self.arena().alloc_unit(Unit::Json(node))
        }
    }

    fn parse_json_array(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        self.expect(TokenKind::LBracket)?;
        let mut items: Vec<&'a Unit<'a>> = Vec::new();
        if !matches!(self.current.kind, TokenKind::RBracket) {
            loop {
                items.push(self.parse_json_literal()?);
                if matches!(self.current.kind, TokenKind::Comma) {
                    self.bump()?;
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        let child = self.json_collect(items);
        let node = JsonNode::scalar(JsonType::Array);
        node.child.set(child);
        self.arena().alloc_unit(Unit::Json(node))
    }

    fn parse_json_object(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        self.expect(TokenKind::LBrace)?;
        let mut items: Vec<&'a Unit<'a>> = Vec::new();
        if !matches!(self.current.kind, TokenKind::RBrace) {
            loop {
                let key = match self.current.kind.clone() {
                    TokenKind::Quoted(s) => {
                        self.bump()?;
                        s
                    }
                    TokenKind::Ident(s) => {
                        self.bump()?;
                        s
                    }
                    _ => return Err(self.unexpected("expected an object key")),
                };
                self.expect(TokenKind::Colon)?;
                let value = self.parse_json_literal()?;
                let interned_key = self.arena().intern_str(&key)?;
                let vnode = value.as_json().expect("object values are JSON units");
                vnode.key.set(Some(interned_key));
                vnode.klidx.set(items.len());
                items.push(value);
                if matches!(self.current.kind, TokenKind::Comma) {
                    self.bump()?;
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        let child = self.json_collect(items);
        let node = JsonNode::scalar(JsonType::Object);
        node.child.set(child);
        self.arena().alloc_unit(Unit::Json(node))
    }

    /// Link `items` into the doubly-linked, circular-at-the-head sibling
    /// ring required by data-model invariant 2 (`head.prev == tail`,
    /// `tail.next == None`), returning the head.
    fn json_collect(&self, items: Vec<&'a Unit<'a>>) -> Option<&'a Unit<'a>> {
        let len = items.len();
        if len == 0 {
            return None;
        }
        for (i, item) in items.iter().enumerate() {
            let node = item.as_json().expect("json_collect only links JSON units");
            node.next.set(if i + 1 < len { Some(items[i + 1]) } else { None });
            node.prev.set(Some(if i == 0 { items[len - 1] } else { items[i - 1] }));
        }
        Some(items[0])
    }

    // ---- PROJ := '|' PROJPATH (('+'|'-') PROJPATH)* ----

    fn parse_projection_clause(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        let mark = self.session.stack().len();
        let first = self.parse_projpath()?;
        self.session.stack().push_unit(first);
        loop {
            let exclude = match self.current.kind {
                TokenKind::Plus => {
                    self.bump()?;
                    false
                }
                TokenKind::Minus => {
                    self.bump()?;
                    true
                }
                _ => break,
            };
            let proj = self.parse_projpath()?;
            proj.as_projection().expect("projection unit").exclude.set(exclude);
            self.session.stack().push_unit(proj);
        }
        self.pop_joined_projections(mark)
    }

    /// Reducer: pop PROJECTION frames down to `until`, threading `next`.
    fn pop_joined_projections(&mut self, until: usize) -> Result<&'a Unit<'a>, JqlError> {
        let mut head: Option<&'a Unit<'a>> = None;
        while self.session.stack().len() > until {
            let unit = self.session.stack().pop_unit()?;
            match unit {
                Unit::Projection(p) => {
                    if let Some(prev_head) = head {
                        p.next.set(Some(prev_head));
                    }
                    head = Some(unit);
                }
                _ => return Err(self.unexpected("expected PROJECTION on the parser stack")),
            }
        }
        head.ok_or_else(|| self.unexpected("empty projection clause"))
    }

    // ---- PROJPATH := '/' (IDENT | '{' IDENT (',' IDENT)* '}')+ ----

    fn parse_projpath(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        let mark = self.session.stack().len();
        loop {
            self.expect(TokenKind::Slash)?;
            match self.current.kind.clone() {
                TokenKind::Ident(name) => {
                    self.bump()?;
                    let interned = self.arena().intern_str(&name)?;
                    let s = self.arena().alloc_unit(Unit::String(StringUnit {
                        value: interned,
                        flavour: Cell::new(StringFlavour::empty()),
                        next: Cell::new(None),
                        subnext: Cell::new(None),
                    }))?;
                    self.session.stack().push_unit(s);
                }
                TokenKind::LBrace => {
                    let block = self.parse_projfields_block()?;
                    self.session.stack().push_unit(block);
                }
                _ => return Err(self.unexpected("expected a field name or '{' in a projection path")),
            }
            if !matches!(self.current.kind, TokenKind::Slash) {
                break;
            }
        }
        self.pop_projections(mark)
    }

    /// Reducer: pop STRING frames down to `until`, threading `next` between
    /// path segments, then wrap the result in a fresh PROJECTION unit.
    fn pop_projections(&mut self, until: usize) -> Result<&'a Unit<'a>, JqlError> {
        let mut head: Option<&'a Unit<'a>> = None;
        while self.session.stack().len() > until {
            let unit = self.session.stack().pop_unit()?;
            match unit {
                Unit::String(s) => {
                    if let Some(prev_head) = head {
                        s.next.set(Some(prev_head));
                    }
                    head = Some(unit);
                }
                _ => return Err(self.unexpected("expected STRING on the parser stack")),
            }
        }
        let value = head.ok_or_else(|| self.unexpected("empty projection path"))?;
        self.arena().alloc_unit(Unit::Projection(ProjectionUnit {
            value,
            exclude: Cell::new(false),
            next: Cell::new(None),
        }))
    }

    fn parse_projfields_block(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        self.expect(TokenKind::LBrace)?;
        let mark = self.session.stack().len();
        loop {
            let name = match self.current.kind.clone() {
                TokenKind::Ident(s) => {
                    self.bump()?;
                    s
                }
                TokenKind::Quoted(s) => {
                    self.bump()?;
                    s
                }
                _ => return Err(self.unexpected("expected a field name in a projection block")),
            };
            let interned = self.arena().intern_str(&name)?;
            let s = self.arena().alloc_unit(Unit::String(StringUnit {
                value: interned,
                flavour: Cell::new(StringFlavour::PROJFIELD),
                next: Cell::new(None),
                subnext: Cell::new(None),
            }))?;
            self.session.stack().push_unit(s);
            if matches!(self.current.kind, TokenKind::Comma) {
                self.bump()?;
                continue;
            }
            break;
        }
        self.expect(TokenKind::RBrace)?;
        self.pop_projfields_chain(mark)
    }

    /// Reducer: pop STRING frames down to `until`, threading `subnext`
    /// (not `next`) between the members of a `{a,b,c}` field block.
    fn pop_projfields_chain(&mut self, until: usize) -> Result<&'a Unit<'a>, JqlError> {
        let mut head: Option<&'a Unit<'a>> = None;
        while self.session.stack().len() > until {
            let unit = self.session.stack().pop_unit()?;
            match unit {
                Unit::String(s) => {
                    if let Some(prev_head) = head {
                        s.subnext.set(Some(prev_head));
                    }
                    head = Some(unit);
                }
                _ => return Err(self.unexpected("expected STRING on the parser stack")),
            }
        }
        head.ok_or_else(|| self.unexpected("empty field block"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{JoinCode, NodeType, OpCode};
    use crate::config::ParserLimits;

    fn parse_str<'a>(session: &'a Session<'a>) -> Result<&'a Unit<'a>, JqlError> {
        parse(session)
    }

    /// Walk a NODE chain's `next` links into a `Vec` of node types, for
    /// structural comparison without repeating `.next.get().unwrap()` per
    /// segment.
    fn node_type_chain<'a>(head: &'a Unit<'a>) -> Vec<NodeType> {
        itertools::unfold(Some(head), |cur| {
            let unit = (*cur)?;
            let n = unit.as_node().expect("node chain link");
            *cur = n.next.get();
            Some(n.ntype)
        })
        .collect()
    }

    #[test]
    fn multi_segment_path_chain_has_expected_node_types() {
        let session = Session::new("/a/*/[x = 1]/**", ParserLimits::default());
        let query = parse_str(&session).unwrap();
        let head = query.as_query().unwrap().filter.as_filter().unwrap().node;
        assert_eq!(
            node_type_chain(head),
            vec![NodeType::Field, NodeType::Any, NodeType::Expr, NodeType::Anys]
        );
    }

    #[test]
    fn simple_equality_filter() {
        let session = Session::new("/foo/[bar = 42]", ParserLimits::default());
        let query = parse_str(&session).unwrap();
        let q = query.as_query().unwrap();
        let filter = q.filter.as_filter().unwrap();
        assert!(filter.anchor.get().is_none());
        let node1 = filter.node.as_node().unwrap();
        assert_eq!(node1.ntype, NodeType::Field);
        assert_eq!(node1.value.as_string().unwrap().value, "foo");
        let node2 = node1.next.get().unwrap().as_node().unwrap();
        assert_eq!(node2.ntype, NodeType::Expr);
        let expr = node2.value.as_expr().unwrap();
        assert_eq!(expr.left.as_string().unwrap().value, "bar");
        assert_eq!(expr.op.as_op().unwrap().op, OpCode::Eq);
        assert_eq!(expr.right.as_json().unwrap().vi64.get(), 42);
    }

    #[test]
    fn bang_equals_parses_as_negated_eq() {
        let session = Session::new("/foo/[bar != 42]", ParserLimits::default());
        let query = parse_str(&session).unwrap();
        let node2 = query
            .as_query()
            .unwrap()
            .filter
            .as_filter()
            .unwrap()
            .node
            .as_node()
            .unwrap()
            .next
            .get()
            .unwrap()
            .as_node()
            .unwrap();
        let expr = node2.value.as_expr().unwrap();
        let op = expr.op.as_op().unwrap();
        assert_eq!(op.op, OpCode::Eq);
        assert!(op.negate);
    }

    #[test]
    fn placeholder_and_apply() {
        let session = Session::new(r#"/a/[x = :v] | apply {"y": 1}"#, ParserLimits::default());
        let query = parse_str(&session).unwrap();
        let q = query.as_query().unwrap();
        assert!(q.apply.get().is_some());
        assert_eq!(session.placeholder_count(), 1);
    }

    #[test]
    fn negated_join_between_filters() {
        let session = Session::new("/a/[x = 1] not or /b/[y = 2]", ParserLimits::default());
        let query = parse_str(&session).unwrap();
        let q = query.as_query().unwrap();
        let f1 = q.filter.as_filter().unwrap();
        let f2 = f1.next.get().unwrap().as_filter().unwrap();
        let join = f2.join.get().unwrap().as_join().unwrap();
        assert_eq!(join.join, JoinCode::Or);
        assert!(join.negate);
    }

    #[test]
    fn projection_with_field_block_and_exclude() {
        let session = Session::new("/a/[x = 1] | /b/{c,d} - /e", ParserLimits::default());
        let query = parse_str(&session).unwrap();
        let q = query.as_query().unwrap();
        let p1 = q.projection.get().unwrap().as_projection().unwrap();
        assert!(!p1.exclude.get());
        let block = p1.value.next.get().unwrap().as_string().unwrap();
        assert!(block.flavour.get().contains(StringFlavour::PROJFIELD));
        assert_eq!(block.value, "c");
        assert_eq!(block.subnext.get().unwrap().as_string().unwrap().value, "d");
        let p2 = p1.next.get().unwrap().as_projection().unwrap();
        assert!(p2.exclude.get());
    }

    #[test]
    fn star_and_double_star_are_exact_matches() {
        let session = Session::new("/*/**", ParserLimits::default());
        let query = parse_str(&session).unwrap();
        let q = query.as_query().unwrap();
        let n1 = q.filter.as_filter().unwrap().node.as_node().unwrap();
        assert_eq!(n1.ntype, NodeType::Any);
        let n2 = n1.next.get().unwrap().as_node().unwrap();
        assert_eq!(n2.ntype, NodeType::Anys);
    }

    #[test]
    fn anchor_is_attached_to_filter() {
        let session = Session::new("@doc/a/[x = 1]", ParserLimits::default());
        let query = parse_str(&session).unwrap();
        let filter = query.as_query().unwrap().filter.as_filter().unwrap();
        assert_eq!(filter.anchor.get(), Some("doc"));
    }

    #[test]
    fn dangling_not_is_a_query_parse_error() {
        let session = Session::new("/a/[x = 1] not", ParserLimits::default());
        let err = parse_str(&session).unwrap_err();
        assert_matches::assert_matches!(err, JqlError::QueryParse { .. });
        assert!(!session.negate_is_dangling());
    }

    #[test]
    fn reserved_word_as_field_name_must_be_quoted() {
        // unquoted "in" in node position is read as a FIELD, but used where
        // an operator is expected it fails to parse -- this is intentional,
        // matching the original grammar's lack of keyword/field
        // disambiguation.
        let session = Session::new(r#"/a/["in" = 1]"#, ParserLimits::default());
        let query = parse_str(&session).unwrap();
        let node = query
            .as_query()
            .unwrap()
            .filter
            .as_filter()
            .unwrap()
            .node
            .as_node()
            .unwrap()
            .next
            .get()
            .unwrap()
            .as_node()
            .unwrap();
        let expr = node.value.as_expr().unwrap();
        assert_eq!(expr.left.as_string().unwrap().value, "in");
    }

    #[test]
    fn json_literal_nesting_within_limit_succeeds() {
        let mut limits = ParserLimits::default();
        limits.max_recursion_depth = 3;
        let session = Session::new("/a/[x = [[[]]]]", limits);
        assert!(parse_str(&session).is_ok());
    }

    #[test]
    fn json_literal_nesting_past_limit_fails() {
        let mut limits = ParserLimits::default();
        limits.max_recursion_depth = 3;
        let session = Session::new("/a/[x = [[[[[]]]]]]", limits);
        assert!(parse_str(&session).is_err());
    }
}
