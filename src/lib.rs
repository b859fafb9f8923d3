//! `jqlite`: parser and document-scanning executor for an embedded JSON
//! query language.
//!
//! This crate implements the core of an embedded document-oriented
//! database query engine: the query language's abstract syntax, its
//! parser, an AST printer, and the document-scanning executor that drives
//! a key/value cursor over a collection. It does not implement a KV store,
//! JBL binary (de)serialization, secondary-index planning, or networking;
//! those are expressed as trait contracts ([`scan::KvCursor`],
//! [`printer::JsonPrinter`]) so the core can be built and tested on its
//! own.
//!
//! A parse/query session is [`session::Session`]: it owns the arena
//! backing one parsed query's AST, and everything allocated through it is
//! released in one shot when the session drops.
//!
//! ```
//! use jqlite::config::ParserLimits;
//! use jqlite::session::Session;
//! use jqlite::{parser, printer};
//!
//! struct NullJsonPrinter;
//! impl printer::JsonPrinter for NullJsonPrinter {
//!     fn print_json(&mut self, node: &jqlite::ast::JsonNode, sink: &mut dyn printer::EmitSink) {
//!         sink.write_str(&node.vi64.get().to_string());
//!     }
//! }
//!
//! let session = Session::new("/users/[age > 21]", ParserLimits::default());
//! let query = parser::parse(&session).unwrap();
//! let mut sink = printer::StringSink::new();
//! printer::print_query(query, &mut sink, &mut NullJsonPrinter);
//! assert_eq!(sink.into_string(), "/users/[age > 21]");
//! ```

pub mod arena;
pub mod ast;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod scan;
pub mod session;
pub mod stack;
pub mod strcodec;

pub use error::{Diagnostic, JqlError};
pub use session::Session;
