//! The C interop runtime: header parsing, dynamic symbol resolution, and the
//! FFI call bridge (spec.md §4.4, §4.6–§4.8). `brisk-eval`'s `Importer`
//! (spec.md §4.5) is the only consumer of this crate's public surface;
//! nothing here knows about Brisk's AST or evaluator.

pub mod cstruct;
pub mod ffi_bridge;
pub mod header_parser;
pub mod loader;

pub use header_parser::{parse_header, FunctionDecl, MacroValue, ParsedHeader, StructDecl};
pub use loader::Loader;
