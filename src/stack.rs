//! The parser's LIFO frame stack.
//!
//! Built on `tinyvec`: frames live inline in a fixed-size array until that
//! fills, then spill to a heap-backed `Vec`, a bounded inline pool with
//! overflow spill, the same shape the reference implementation gets from its
//! `stackpool[N]` array plus `malloc`-on-overflow fallback. `TinyVec` gives
//! us that for free instead of hand-rolling the spill logic.

use tinyvec::TinyVec;

use crate::ast::Unit;
use crate::error::JqlError;

/// One frame: either a parsed `Unit` or a raw owned string (used for
/// strings that haven't yet been wrapped into a STRING unit, e.g. a bare
/// IDENT the caller hasn't decided the flavour of yet).
#[derive(Debug, Clone)]
pub enum Frame<'a> {
    Unit(&'a Unit<'a>),
    Str(String),
}

/// Number of frames held inline before `TinyVec` spills to the heap. Chosen
/// to cover the common case (a handful of path segments and expression
/// operands) without a heap allocation.
pub const INLINE_FRAMES: usize = 16;

/// The parser stack itself. A thin wrapper over `TinyVec` adding the typed
/// push/pop/peek operations the grammar driver's reducers need, including
/// walking from the top down to a sentinel frame.
#[derive(Debug, Default)]
pub struct ParserStack<'a> {
    frames: TinyVec<[Frame<'a>; INLINE_FRAMES]>,
}

impl<'a> ParserStack<'a> {
    pub fn new() -> Self {
        ParserStack {
            frames: TinyVec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push_unit(&mut self, unit: &'a Unit<'a>) {
        self.frames.push(Frame::Unit(unit));
    }

    pub fn push_str(&mut self, s: impl Into<String>) {
        self.frames.push(Frame::Str(s.into()));
    }

    /// Pop the top frame, failing with `QUERY_PARSE` if the stack is empty.
    pub fn pop(&mut self) -> Result<Frame<'a>, JqlError> {
        self.frames
            .pop()
            .ok_or(JqlError::InvalidArgs("unbalanced parser stack"))
    }

    /// Pop the top frame expecting a `Unit`; fails with `QUERY_PARSE` on a
    /// type mismatch or empty stack.
    pub fn pop_unit(&mut self) -> Result<&'a Unit<'a>, JqlError> {
        match self.pop()? {
            Frame::Unit(u) => Ok(u),
            Frame::Str(_) => Err(JqlError::InvalidArgs("expected unit frame, found string")),
        }
    }

    /// Pop the top frame expecting a raw string; fails with `QUERY_PARSE` on
    /// a type mismatch or empty stack.
    pub fn pop_str(&mut self) -> Result<String, JqlError> {
        match self.pop()? {
            Frame::Str(s) => Ok(s),
            Frame::Unit(_) => Err(JqlError::InvalidArgs("expected string frame, found unit")),
        }
    }

    /// Peek at the top frame without removing it.
    pub fn peek(&self) -> Option<&Frame<'a>> {
        self.frames.last()
    }

    /// Peek at the `Unit` on top of the stack, if that's what's there.
    pub fn peek_unit(&self) -> Option<&'a Unit<'a>> {
        match self.frames.last() {
            Some(Frame::Unit(u)) => Some(*u),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{IntegerUnit, Unit};

    #[test]
    fn push_pop_roundtrips() {
        let unit = Unit::Integer(IntegerUnit { value: 7 });
        let mut stack = ParserStack::new();
        stack.push_unit(&unit);
        let popped = stack.pop_unit().unwrap();
        assert_eq!(popped.as_integer().unwrap().value, 7);
    }

    #[test]
    fn type_mismatch_fails_with_invalid_args() {
        let mut stack = ParserStack::new();
        stack.push_str("hello");
        assert_matches::assert_matches!(stack.pop_unit(), Err(JqlError::InvalidArgs(_)));
    }

    #[test]
    fn spills_past_inline_capacity() {
        let units: Vec<Unit> = (0..INLINE_FRAMES * 2)
            .map(|i| Unit::Integer(IntegerUnit { value: i as i64 }))
            .collect();
        let mut stack = ParserStack::new();
        for u in &units {
            stack.push_unit(u);
        }
        assert_eq!(stack.len(), units.len());
        for i in (0..units.len()).rev() {
            assert_eq!(stack.pop_unit().unwrap().as_integer().unwrap().value, i as i64);
        }
    }

    #[test]
    fn empty_pop_fails() {
        let mut stack: ParserStack = ParserStack::new();
        assert!(stack.pop().is_err());
    }
}
