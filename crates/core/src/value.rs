//! The value model (spec.md §3, §4.1).
//!
//! `Value` is a tagged sum of five kinds. The fifth, `Obj`, is a strong
//! reference (`Rc`) to a `HeapObject` — an eight-variant enum whose
//! discriminant *is* the "kind tag" spec.md's Object Header describes.
//! Cloning a `Value::Obj` is `Rc::clone`, i.e. incref; the last clone
//! dropping runs `HeapObject`'s `Drop` impl, i.e. decref-to-zero release.
//! See SPEC_FULL.md §11 for the full rationale.

use crate::ctypes::CFunctionDescriptor;
use crate::environment::Environment;
use crate::interner;
use crate::memory_stats::{self, Kind as StatKind};
use crate::table::Table;
use std::cell::RefCell;
use std::rc::Rc;

/// An interned, immutable string (spec.md §3: "Length, 32-bit FNV-1a hash,
/// immutable inline character buffer").
#[derive(Debug)]
pub struct BriskStr {
    pub hash: u32,
    pub bytes: Box<str>,
}

impl BriskStr {
    pub fn as_str(&self) -> &str {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A resolved C pointer surfaced to the scripting level (spec.md §3).
#[derive(Debug)]
pub struct PointerObj {
    pub addr: usize,
    pub type_name: String,
}

/// A live instance of a C struct: its descriptor plus a zeroed, raw data
/// buffer sized by the descriptor (spec.md §4.8).
#[derive(Debug)]
pub struct CStructObj {
    pub descriptor: Rc<crate::ctypes::CStructDescriptor>,
    pub data: RefCell<Vec<u8>>,
}

/// Signature every Brisk-visible native (built-in) function conforms to.
/// Errors are plain strings here — `brisk-eval` wraps them into its richer
/// `BriskError` with source position once the call site is known.
pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

#[derive(Debug, Clone, Copy)]
pub struct NativeObj {
    pub name: &'static str,
    /// Declared arity; `-1` means variadic (spec.md §3).
    pub arity: i32,
    pub func: NativeFn,
}

/// A user-defined Brisk function: declared name (if any), arity, borrowed
/// parameter names, a shared reference to its body, and a strong reference
/// to the environment captured at creation (spec.md §3, §4.2).
#[derive(Debug)]
pub struct FunctionObj {
    pub name: Option<String>,
    pub params: Rc<[String]>,
    pub body: Rc<crate::ast::Block>,
    pub env: Rc<RefCell<Environment>>,
}

impl FunctionObj {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// The eight heap-object kinds (spec.md §3 table). Every `Value::Obj`
/// points at one of these through an `Rc`.
#[derive(Debug)]
pub enum HeapObject {
    Str(BriskStr),
    Array(RefCell<Vec<Value>>),
    Table(RefCell<Table>),
    Function(FunctionObj),
    Native(NativeObj),
    Pointer(PointerObj),
    CStruct(CStructObj),
    CFunction(CFunctionDescriptor),
}

impl HeapObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            HeapObject::Str(_) => "string",
            HeapObject::Array(_) => "array",
            HeapObject::Table(_) => "table",
            HeapObject::Function(_) => "function",
            HeapObject::Native(_) => "native",
            HeapObject::Pointer(_) => "pointer",
            HeapObject::CStruct(_) => "cstruct",
            HeapObject::CFunction(_) => "cfunction",
        }
    }

    fn stat_kind(&self) -> StatKind {
        match self {
            HeapObject::Str(_) => StatKind::Str,
            HeapObject::Array(_) => StatKind::Array,
            HeapObject::Table(_) => StatKind::Table,
            HeapObject::Function(_) => StatKind::Function,
            HeapObject::Native(_) => StatKind::Native,
            HeapObject::Pointer(_) => StatKind::Pointer,
            HeapObject::CStruct(_) => StatKind::CStruct,
            HeapObject::CFunction(_) => StatKind::CFunction,
        }
    }
}

impl Drop for HeapObject {
    fn drop(&mut self) {
        // Strings are accounted for by the interner (which is the only
        // place a new Str object is created); every other kind is charged
        // here and released here, on the Rc's real final drop.
        memory_stats::record_free(self.stat_kind());
    }
}

/// The five value kinds (spec.md §3).
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Obj(Rc<HeapObject>),
}

impl Value {
    /// Interns `s` and returns a `Value::Obj` wrapping the canonical string.
    pub fn str(s: &str) -> Value {
        Value::Obj(interner::intern(s))
    }

    pub fn array(items: Vec<Value>) -> Value {
        let obj = Rc::new(HeapObject::Array(RefCell::new(items)));
        memory_stats::record_alloc(StatKind::Array, std::mem::size_of::<Value>());
        Value::Obj(obj)
    }

    pub fn table(table: Table) -> Value {
        let obj = Rc::new(HeapObject::Table(RefCell::new(table)));
        memory_stats::record_alloc(StatKind::Table, std::mem::size_of::<Table>());
        Value::Obj(obj)
    }

    pub fn function(f: FunctionObj) -> Value {
        let obj = Rc::new(HeapObject::Function(f));
        memory_stats::record_alloc(StatKind::Function, std::mem::size_of::<FunctionObj>());
        Value::Obj(obj)
    }

    pub fn native(n: NativeObj) -> Value {
        let obj = Rc::new(HeapObject::Native(n));
        memory_stats::record_alloc(StatKind::Native, std::mem::size_of::<NativeObj>());
        Value::Obj(obj)
    }

    pub fn pointer(addr: usize, type_name: impl Into<String>) -> Value {
        let obj = Rc::new(HeapObject::Pointer(PointerObj {
            addr,
            type_name: type_name.into(),
        }));
        memory_stats::record_alloc(StatKind::Pointer, std::mem::size_of::<PointerObj>());
        Value::Obj(obj)
    }

    pub fn cstruct(descriptor: Rc<crate::ctypes::CStructDescriptor>) -> Value {
        let size = descriptor.size;
        let obj = Rc::new(HeapObject::CStruct(CStructObj {
            descriptor,
            data: RefCell::new(vec![0u8; size]),
        }));
        memory_stats::record_alloc(StatKind::CStruct, size);
        Value::Obj(obj)
    }

    pub fn cfunction(descriptor: CFunctionDescriptor) -> Value {
        let obj = Rc::new(HeapObject::CFunction(descriptor));
        memory_stats::record_alloc(
            StatKind::CFunction,
            std::mem::size_of::<CFunctionDescriptor>(),
        );
        Value::Obj(obj)
    }

    pub fn as_obj(&self) -> Option<&Rc<HeapObject>> {
        match self {
            Value::Obj(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Obj(o) => match o.as_ref() {
                HeapObject::Str(s) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&RefCell<Vec<Value>>> {
        match self {
            Value::Obj(o) => match o.as_ref() {
                HeapObject::Array(a) => Some(a),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&RefCell<Table>> {
        match self {
            Value::Obj(o) => match o.as_ref() {
                HeapObject::Table(t) => Some(t),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionObj> {
        match self {
            Value::Obj(o) => match o.as_ref() {
                HeapObject::Function(f) => Some(f),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&NativeObj> {
        match self {
            Value::Obj(o) => match o.as_ref() {
                HeapObject::Native(n) => Some(n),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_cfunction(&self) -> Option<&CFunctionDescriptor> {
        match self {
            Value::Obj(o) => match o.as_ref() {
                HeapObject::CFunction(f) => Some(f),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_cstruct(&self) -> Option<&CStructObj> {
        match self {
            Value::Obj(o) => match o.as_ref() {
                HeapObject::CStruct(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&PointerObj> {
        match self {
            Value::Obj(o) => match o.as_ref() {
                HeapObject::Pointer(p) => Some(p),
                _ => None,
            },
            _ => None,
        }
    }

    /// Kind name for `type_of` and diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Obj(o) => o.kind_name(),
        }
    }

    /// Truthiness (spec.md §4.1): `Nil`, `false`, numeric zero, and the
    /// empty string are falsy; every live object — including empty arrays
    /// and tables — is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Obj(o) => match o.as_ref() {
                HeapObject::Str(s) => !s.is_empty(),
                _ => true,
            },
        }
    }

    /// Structural equality (spec.md §4.1).
    pub fn value_equals(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (Obj(a), Obj(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                match (a.as_ref(), b.as_ref()) {
                    (HeapObject::Str(s1), HeapObject::Str(s2)) => {
                        s1.hash == s2.hash && s1.as_str() == s2.as_str()
                    }
                    // All other object equality is by identity, already
                    // checked above via Rc::ptr_eq.
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Render a value the way `print`/string-concatenation coercion does
    /// (spec.md §4.3.2's "value_to_string").
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float_g(*f),
            Value::Obj(o) => match o.as_ref() {
                HeapObject::Str(s) => s.as_str().to_string(),
                HeapObject::Array(a) => {
                    let items: Vec<String> =
                        a.borrow().iter().map(Value::to_display_string).collect();
                    format!("[{}]", items.join(", "))
                }
                HeapObject::Table(t) => {
                    let t = t.borrow();
                    let items: Vec<String> = t
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k, v.to_display_string()))
                        .collect();
                    format!("{{{}}}", items.join(", "))
                }
                HeapObject::Function(f) => match &f.name {
                    Some(n) => format!("<fn {}>", n),
                    None => "<fn>".to_string(),
                },
                HeapObject::Native(n) => format!("<native {}>", n.name),
                HeapObject::Pointer(p) => format!("<ptr {:#x} {}>", p.addr, p.type_name),
                HeapObject::CStruct(s) => format!("<cstruct {}>", s.descriptor.name),
                HeapObject::CFunction(f) => format!("<cfn {}>", f.symbol),
            },
        }
    }
}

/// `%g`-style formatting: integral floats print without a fractional part,
/// matching the §8 scenario 6 expectation that `sqrt(16.0)` prints `4`.
fn format_float_g(f: f64) -> String {
    if f.is_finite() && f == f.trunc() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        let s = format!("{}", f);
        s
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.value_equals(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_spec() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
        assert!(Value::table(Table::new()).is_truthy());
        assert!(Value::Int(-1).is_truthy());
    }

    #[test]
    fn numeric_equality_promotes_to_float() {
        assert!(Value::Int(4).value_equals(&Value::Float(4.0)));
        assert!(Value::Float(4.0).value_equals(&Value::Int(4)));
        assert!(!Value::Int(4).value_equals(&Value::Float(4.5)));
    }

    #[test]
    fn string_equality_falls_back_to_hash_and_bytes() {
        // Simulate a transient uninterned copy by hand-building a HeapObject
        // that never touched the interner table.
        let a = Value::str("abc");
        let b_obj = Rc::new(HeapObject::Str(BriskStr {
            hash: interner::fnv1a(b"abc"),
            bytes: "abc".into(),
        }));
        let b = Value::Obj(b_obj);
        assert!(a.value_equals(&b));
    }

    #[test]
    fn distinct_kinds_never_equal_except_numeric() {
        assert!(!Value::Nil.value_equals(&Value::Bool(false)));
        assert!(!Value::str("1").value_equals(&Value::Int(1)));
    }

    #[test]
    fn display_formats_floats_like_percent_g() {
        assert_eq!(Value::Float(4.0).to_display_string(), "4");
        assert_eq!(Value::Float(4.5).to_display_string(), "4.5");
    }
}
