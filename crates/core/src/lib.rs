//! Brisk Core: value model, heap objects and environments shared by the
//! whole Brisk toolchain.
//!
//! Key design principles:
//! - `Value`: what a Brisk program talks about (Int, Bool, Obj, ...).
//! - `HeapObject`: the eight reference-counted heap-object kinds a `Value`
//!   can point at, always reached through `Rc<HeapObject>`.
//! - `Environment`: a singly-linked chain of `Table`s implementing lexical
//!   scoping; closures hold a strong reference to the scope they capture.
//!
//! # Modules
//!
//! - `memory_stats`: live-object counters and byte accounting, replacing
//!   the reference implementation's intrusive all-objects list.
//! - `interner`: canonicalizes strings so equal content shares one object.
//! - `table`: the open-addressed hash table backing `Value::Table` and
//!   every `Environment` scope.
//! - `value`: `Value`, `HeapObject` and the heap-object payload structs.
//! - `ctypes`: the C scalar/pointer type enumeration and FFI descriptors.
//! - `environment`: the scope chain.
//! - `ast`: the parsed program representation.

pub mod ast;
pub mod ctypes;
pub mod environment;
pub mod interner;
pub mod memory_stats;
pub mod table;
pub mod value;

pub use ast::*;
pub use ctypes::{CFunctionDescriptor, CStructDescriptor, CType, FieldDescriptor};
pub use environment::{DefineError, Environment, SetError};
pub use table::Table;
pub use value::{
    BriskStr, CStructObj, FunctionObj, HeapObject, NativeFn, NativeObj, PointerObj, Value,
};
