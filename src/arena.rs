//! Region allocator backing a parse/query session.
//!
//! Built on `typed_arena::Arena` for exactly this shape: allocate freely
//! for the life of one pass, free
//! everything in bulk when the owning value (here, a
//! [`Session`](crate::session::Session)) drops. `Unit` values are handed out
//! as `&'arena Unit<'arena>` references rather than indices, so the AST's
//! `next`/`prev`/`child` links are genuine Rust references (wrapped in
//! `Cell` where they must be set after construction) instead of a
//! hand-rolled index scheme. The invariant that every pointer field refers
//! to memory owned by the same session arena then holds by construction,
//! since `typed_arena::Arena` only ever returns references
//! scoped to its own lifetime.

use typed_arena::Arena as TypedArena;

use crate::ast::Unit;
use crate::error::JqlError;

/// Backs one parse/query session. `Unit` nodes and interned strings share
/// the same arena so that session destruction (`Drop`) frees both in one
/// shot.
pub struct Arena<'a> {
    units: TypedArena<Unit<'a>>,
    strings: TypedArena<u8>,
    max_bytes: Option<usize>,
    bytes_used: std::cell::Cell<usize>,
}

impl<'a> Arena<'a> {
    pub fn new(max_bytes: Option<usize>) -> Self {
        Arena {
            units: TypedArena::new(),
            strings: TypedArena::new(),
            max_bytes,
            bytes_used: std::cell::Cell::new(0),
        }
    }

    fn charge(&self, n: usize) -> Result<(), JqlError> {
        let used = self.bytes_used.get() + n;
        if let Some(max) = self.max_bytes {
            if used > max {
                return Err(JqlError::Alloc("arena byte budget exceeded"));
            }
        }
        self.bytes_used.set(used);
        Ok(())
    }

    /// Allocate one `Unit`, returning a reference valid for the arena's
    /// lifetime. This is `alloc` from the design.
    pub fn alloc_unit(&'a self, unit: Unit<'a>) -> Result<&'a Unit<'a>, JqlError> {
        self.charge(std::mem::size_of::<Unit<'a>>())?;
        Ok(self.units.alloc(unit))
    }

    /// Copy `text` into the arena and return a `'a`-scoped `&str`. This is
    /// `strdup` from the design.
    pub fn intern_str(&'a self, text: &str) -> Result<&'a str, JqlError> {
        self.charge(text.len())?;
        let slice = self.strings.alloc_extend(text.bytes());
        // Safety: `slice` was copied verbatim from a valid `&str`.
        Ok(std::str::from_utf8(slice).expect("interned bytes are valid utf-8 by construction"))
    }
}
