//! # Fun syntax tree and scoping
//!
//! The parser produces a [`node::Program`], the checker assigns
//! [`ty::Type`]s through a [`symbol_table::SymbolTable`], and the encoder
//! reuses the same table shape for storage addresses.

pub mod node;
pub mod symbol_table;
pub mod ty;
