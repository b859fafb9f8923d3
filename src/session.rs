//! The parse/query session ("Aux" in the reference implementation).
//!
//! Owns the arena, the scratch diagnostic slot, the current AST root, the
//! placeholder counter, the one-shot negate flag, and the parser stack.
//! Created with the input text, destroyed (via `Drop`) once the caller is
//! done printing/executing the parsed query. Destruction releases the
//! arena unconditionally, invalidating the whole AST atomically, the same
//! "release everything on drop, regardless of exit path" pattern a database
//! handle would follow.

use std::cell::{Cell, RefCell};

use fnv::FnvHashMap;

use crate::arena::Arena;
use crate::ast::Unit;
use crate::config::ParserLimits;
use crate::error::{Diagnostic, JqlError};
use crate::stack::ParserStack;

pub struct Session<'a> {
    arena: Arena<'a>,
    input: String,
    limits: ParserLimits,
    /// Current line, used for diagnostic context; bumped by the lexer on
    /// each newline it consumes.
    line: Cell<u32>,
    /// At most one pending diagnostic, per the design.
    pending_error: RefCell<Option<Diagnostic>>,
    /// The finished query, set once by `pop_filters_and_set_query`.
    query: Cell<Option<&'a Unit<'a>>>,
    /// Number of STRING units carrying the PLACEHOLDER flavour seen so far.
    placeholder_count: Cell<u32>,
    /// One-shot flag consumed and cleared by the next OP/JOIN constructor.
    negate: Cell<bool>,
    stack: RefCell<ParserStack<'a>>,
    /// Distinct placeholder names seen so far, mapped to their single
    /// arena-backed copy: a query repeating `:min` several times interns
    /// the name once instead of once per occurrence.
    placeholder_names: RefCell<FnvHashMap<String, &'a str>>,
}

impl<'a> Session<'a> {
    pub fn new(input: &str, limits: ParserLimits) -> Session<'a> {
        log::trace!("session created, input len={}", input.len());
        Session {
            arena: Arena::new(limits.max_arena_bytes),
            input: input.to_string(),
            limits,
            line: Cell::new(1),
            pending_error: RefCell::new(None),
            query: Cell::new(None),
            placeholder_count: Cell::new(0),
            negate: Cell::new(false),
            stack: RefCell::new(ParserStack::new()),
            placeholder_names: RefCell::new(FnvHashMap::default()),
        }
    }

    pub fn arena(&'a self) -> &'a Arena<'a> {
        &self.arena
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn limits(&self) -> ParserLimits {
        self.limits
    }

    pub fn line(&self) -> u32 {
        self.line.get()
    }

    pub fn bump_line(&self) {
        self.line.set(self.line.get() + 1);
    }

    pub fn stack(&self) -> std::cell::RefMut<'_, ParserStack<'a>> {
        self.stack.borrow_mut()
    }

    pub fn query(&self) -> Option<&'a Unit<'a>> {
        self.query.get()
    }

    pub fn set_query(&self, query: &'a Unit<'a>) {
        self.query.set(Some(query));
    }

    pub fn placeholder_count(&self) -> u32 {
        self.placeholder_count.get()
    }

    pub fn note_placeholder(&self) {
        self.placeholder_count.set(self.placeholder_count.get() + 1);
    }

    /// Intern a placeholder name, returning the same arena-backed `&str`
    /// for every occurrence of a given name within this session.
    pub fn intern_placeholder(&'a self, name: &str) -> Result<&'a str, JqlError> {
        if let Some(existing) = self.placeholder_names.borrow().get(name) {
            return Ok(*existing);
        }
        let interned = self.arena.intern_str(name)?;
        self.placeholder_names.borrow_mut().insert(name.to_string(), interned);
        Ok(interned)
    }

    /// Consume and clear the one-shot negate flag. Called by the OP/JOIN
    /// constructors, never by anything else.
    pub fn take_negate(&self) -> bool {
        let v = self.negate.get();
        self.negate.set(false);
        v
    }

    pub fn set_negate(&self) {
        self.negate.set(true);
    }

    /// True if a negate was requested but never consumed by end-of-parse.
    /// Checked on session teardown as an assertion: a one-shot flag left
    /// set indicates a grammar action forgot to consume it.
    pub fn negate_is_dangling(&self) -> bool {
        self.negate.get()
    }

    pub fn pending_error(&self) -> Option<Diagnostic> {
        self.pending_error.borrow().clone()
    }

    pub fn set_pending_error(&self, diag: Diagnostic) {
        *self.pending_error.borrow_mut() = Some(diag);
    }

    pub fn make_diagnostic(&self, message: impl Into<String>, offset: usize) -> Diagnostic {
        Diagnostic::new(message, &self.input, offset, self.line.get())
    }

    /// Fail with `QUERY_PARSE`, recording a diagnostic built from the given
    /// message and offset. This is the Rust stand-in for the reference
    /// implementation's `longjmp`-based fatal escape: the `Result::Err`
    /// returned here propagates via `?` straight out of `parse`, and
    /// `Session::drop` still runs because the `Session` itself is never
    /// moved into the failing call.
    pub fn fatal(&self, message: impl Into<String>, offset: usize) -> JqlError {
        let diag = self.make_diagnostic(message, offset);
        self.set_pending_error(diag.clone());
        JqlError::query_parse(diag)
    }
}

impl<'a> Drop for Session<'a> {
    fn drop(&mut self) {
        debug_assert!(
            !self.negate_is_dangling(),
            "negate flag left set at session teardown: a grammar action failed to consume it"
        );
        log::trace!("session destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_count_starts_at_zero() {
        let session = Session::new("/foo", ParserLimits::default());
        assert_eq!(session.placeholder_count(), 0);
    }

    #[test]
    fn repeated_placeholder_names_share_one_interned_copy() {
        let session = Session::new("/foo", ParserLimits::default());
        let a = session.intern_placeholder("min").unwrap();
        let b = session.intern_placeholder("min").unwrap();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn negate_is_one_shot() {
        let session = Session::new("/foo", ParserLimits::default());
        session.set_negate();
        assert!(session.take_negate());
        assert!(!session.take_negate());
    }

    #[test]
    fn fatal_records_pending_diagnostic() {
        let session = Session::new("/foo bar", ParserLimits::default());
        let _ = session.fatal("unexpected token", 5);
        assert!(session.pending_error().is_some());
    }
}
