//! The FFI call bridge (spec.md §4.6): turns a resolved `CFunctionDescriptor`
//! plus a slice of Brisk [`Value`]s into a live call through `libffi`, and
//! turns the raw return value back into a `Value`.
//!
//! `brisk-core::CFunctionDescriptor` deliberately carries no `libffi` state
//! (only a `prepared: Cell<bool>` flag) so that crate can stay free of the
//! dependency; the actual `middle::Cif` objects live here, in a thread-local
//! cache keyed by the descriptor's process-unique `id` plus the argument
//! count of the call shape that built it.

use brisk_core::{CFunctionDescriptor, CStructDescriptor, CType, Value};
use libffi::middle::{Arg, Cif, CodePtr, Type};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_void;
use tracing::{trace, warn};

fn ctype_to_ffi(ty: CType) -> Type {
    match ty {
        CType::Void => Type::void(),
        CType::SChar | CType::I8 => Type::i8(),
        CType::UChar | CType::U8 | CType::Bool => Type::u8(),
        CType::Short | CType::I16 => Type::i16(),
        CType::UShort | CType::U16 => Type::u16(),
        CType::Int | CType::I32 => Type::i32(),
        CType::UInt | CType::U32 => Type::u32(),
        CType::Long | CType::LongLong | CType::I64 => Type::i64(),
        CType::ULong | CType::ULongLong | CType::SizeT | CType::U64 => Type::u64(),
        CType::Float => Type::f32(),
        CType::Double => Type::f64(),
        CType::Pointer | CType::CString | CType::Struct => Type::pointer(),
    }
}

// Keyed by (descriptor id, total argument count for this call shape). A
// non-variadic descriptor only ever populates one entry (its declared arity);
// a variadic one needs a distinct `Cif` per distinct number of arguments a
// call site actually passes, since libffi's call interface is sized to an
// exact argument list rather than a fixed/variadic split (spec.md §4.6 step
// 1; SPEC_FULL.md §17 records fixed = declared parameter count, total = the
// actual call's argument count, as the accepted variadic scheme).
thread_local! {
    static CIF_CACHE: RefCell<HashMap<(u64, usize), Cif>> = RefCell::new(HashMap::new());
}

/// Lazily prepares the call interface for `descriptor` called with
/// `arg_types` (spec.md §4.6 step 1), caching it per argument-count shape.
fn prepare(descriptor: &CFunctionDescriptor, arg_types: &[CType]) -> Result<(), String> {
    let key = (descriptor.id, arg_types.len());
    if CIF_CACHE.with(|cache| cache.borrow().contains_key(&key)) {
        return Ok(());
    }
    let args: Vec<Type> = arg_types.iter().map(|t| ctype_to_ffi(*t)).collect();
    let ret = ctype_to_ffi(descriptor.return_type);
    let cif = if descriptor.variadic {
        Cif::new_variadic(args, descriptor.param_types.len(), ret)
    } else {
        Cif::new(args, ret)
    };
    CIF_CACHE.with(|cache| cache.borrow_mut().insert(key, cif));
    descriptor.prepared.set(true);
    trace!(symbol = %descriptor.symbol, arity = arg_types.len(), "prepared FFI call interface");
    Ok(())
}

fn infer_ctype(v: &Value) -> CType {
    match v {
        Value::Int(_) => CType::Int,
        Value::Float(_) => CType::Double,
        Value::Bool(_) => CType::Bool,
        _ if v.as_str().is_some() => CType::CString,
        _ if v.as_pointer().is_some() => CType::Pointer,
        _ if v.as_cstruct().is_some() => CType::Struct,
        _ => CType::Int,
    }
}

/// Owned storage for one marshaled argument. `libffi::middle::Arg` only
/// borrows a pointer to its backing value for the duration of the call, so
/// this has to outlive the `Cif::call` invocation (spec.md §4.6 step 5's
/// "valid only for the duration of the call").
enum ArgStorage {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Ptr(*mut c_void),
    #[allow(dead_code)]
    CStr(CString),
}

impl ArgStorage {
    fn as_arg(&self) -> Arg<'_> {
        match self {
            ArgStorage::I8(v) => Arg::new(v),
            ArgStorage::U8(v) => Arg::new(v),
            ArgStorage::I16(v) => Arg::new(v),
            ArgStorage::U16(v) => Arg::new(v),
            ArgStorage::I32(v) => Arg::new(v),
            ArgStorage::U32(v) => Arg::new(v),
            ArgStorage::I64(v) => Arg::new(v),
            ArgStorage::U64(v) => Arg::new(v),
            ArgStorage::F32(v) => Arg::new(v),
            ArgStorage::F64(v) => Arg::new(v),
            ArgStorage::Ptr(v) => Arg::new(v),
            ArgStorage::CStr(_) => unreachable!("char* storage is wrapped as Ptr before use"),
        }
    }
}

/// Writes `value` into C storage of kind `target` (spec.md §4.6 step 5).
/// Returns the owned storage plus, for `char*` arguments, the `CString` that
/// must stay alive until after the call.
fn marshal_to_c(value: &Value, target: CType) -> Result<(ArgStorage, Option<CString>), String> {
    let int_val = |n: i64| -> ArgStorage {
        match target.byte_size() {
            1 if target.is_signed() => ArgStorage::I8(n as i8),
            1 => ArgStorage::U8(n as u8),
            2 if target.is_signed() => ArgStorage::I16(n as i16),
            2 => ArgStorage::U16(n as u16),
            4 if target.is_signed() => ArgStorage::I32(n as i32),
            4 => ArgStorage::U32(n as u32),
            _ if target.is_signed() => ArgStorage::I64(n),
            _ => ArgStorage::U64(n as u64),
        }
    };

    match (value, target) {
        (Value::Int(n), CType::Bool) => Ok((ArgStorage::U8(if *n != 0 { 1 } else { 0 }), None)),
        (Value::Bool(b), CType::Bool) => Ok((ArgStorage::U8(if *b { 1 } else { 0 }), None)),
        (Value::Bool(b), t) if t.is_integer() => Ok((int_val(if *b { 1 } else { 0 }), None)),
        (Value::Int(n), t) if t.is_integer() => Ok((int_val(*n), None)),
        (Value::Int(n), t) if t.is_float() => Ok((float_val(target, *n as f64), None)),
        (Value::Float(f), t) if t.is_float() => Ok((float_val(target, *f), None)),
        (v, CType::CString) if v.as_str().is_some() => {
            let s = v.as_str().unwrap();
            let c = CString::new(s).map_err(|e| format!("string argument contains NUL: {e}"))?;
            let ptr = c.as_ptr() as *mut c_void;
            Ok((ArgStorage::Ptr(ptr), Some(c)))
        }
        (Value::Nil, t) if t.is_pointer_like() => Ok((ArgStorage::Ptr(std::ptr::null_mut()), None)),
        (v, t) if t.is_pointer_like() && v.as_pointer().is_some() => {
            Ok((ArgStorage::Ptr(v.as_pointer().unwrap().addr as *mut c_void), None))
        }
        (v, CType::Struct) if v.as_cstruct().is_some() => {
            let data = v.as_cstruct().unwrap().data.borrow();
            Ok((ArgStorage::Ptr(data.as_ptr() as *mut c_void), None))
        }
        (Value::Int(n), t) if t.is_pointer_like() => {
            Ok((ArgStorage::Ptr(*n as usize as *mut c_void), None))
        }
        _ => Err(format!(
            "cannot marshal a '{}' value to C type {target:?}",
            value.kind_name()
        )),
    }
}

fn float_val(target: CType, f: f64) -> ArgStorage {
    if target == CType::Float {
        ArgStorage::F32(f as f32)
    } else {
        ArgStorage::F64(f)
    }
}

/// Prepares (if needed) and runs `descriptor` with `args`, returning the
/// marshaled Brisk return value. Never panics: marshalling failures and FFI
/// preparation failures both surface as `Err`, which the evaluator turns
/// into an `FfiError` at the call site.
pub fn call(descriptor: &CFunctionDescriptor, args: &[Value]) -> Result<Value, String> {
    if !descriptor.variadic && args.len() != descriptor.param_types.len() {
        return Err(format!(
            "{}: expected {} argument(s), got {}",
            descriptor.symbol,
            descriptor.param_types.len(),
            args.len()
        ));
    }
    if descriptor.variadic && args.len() < descriptor.param_types.len() {
        return Err(format!(
            "{}: expected at least {} argument(s), got {}",
            descriptor.symbol,
            descriptor.param_types.len(),
            args.len()
        ));
    }

    let arg_types: Vec<CType> = (0..args.len())
        .map(|i| {
            descriptor
                .param_types
                .get(i)
                .copied()
                .unwrap_or_else(|| infer_ctype(&args[i]))
        })
        .collect();

    prepare(descriptor, &arg_types)?;

    let mut storage = Vec::with_capacity(args.len());
    let mut keep_alive = Vec::with_capacity(args.len());
    for (v, ty) in args.iter().zip(arg_types.iter()) {
        let (s, c) = marshal_to_c(v, *ty)?;
        storage.push(s);
        keep_alive.push(c);
    }
    let ffi_args: Vec<Arg> = storage.iter().map(ArgStorage::as_arg).collect();

    let code_ptr = CodePtr::from_ptr(descriptor.address as *const c_void);

    let key = (descriptor.id, arg_types.len());
    CIF_CACHE.with(|cache| -> Result<Value, String> {
        let cache = cache.borrow();
        let cif = cache
            .get(&key)
            .expect("prepare() populates the cache before call() reads it");
        unsafe { call_typed(cif, code_ptr, &ffi_args, descriptor.return_type) }
    })
}

/// Dispatches the actual `Cif::call` on the concrete Rust return type that
/// matches `ret`, then folds the raw result into a `Value` (spec.md §4.6
/// step 7).
unsafe fn call_typed(
    cif: &Cif,
    fun: CodePtr,
    args: &[Arg],
    ret: CType,
) -> Result<Value, String> {
    match ret {
        CType::Void => {
            cif.call::<()>(fun, args);
            Ok(Value::Nil)
        }
        CType::Bool => Ok(Value::Bool(cif.call::<u8>(fun, args) != 0)),
        CType::SChar | CType::I8 => Ok(Value::Int(cif.call::<i8>(fun, args) as i64)),
        CType::UChar | CType::U8 => Ok(Value::Int(cif.call::<u8>(fun, args) as i64)),
        CType::Short | CType::I16 => Ok(Value::Int(cif.call::<i16>(fun, args) as i64)),
        CType::UShort | CType::U16 => Ok(Value::Int(cif.call::<u16>(fun, args) as i64)),
        CType::Int | CType::I32 => Ok(Value::Int(cif.call::<i32>(fun, args) as i64)),
        CType::UInt | CType::U32 => Ok(Value::Int(cif.call::<u32>(fun, args) as i64)),
        CType::Long | CType::LongLong | CType::I64 => Ok(Value::Int(cif.call::<i64>(fun, args))),
        CType::ULong | CType::ULongLong | CType::SizeT | CType::U64 => {
            Ok(Value::Int(cif.call::<u64>(fun, args) as i64))
        }
        CType::Float => Ok(Value::Float(cif.call::<f32>(fun, args) as f64)),
        CType::Double => Ok(Value::Float(cif.call::<f64>(fun, args))),
        CType::CString => {
            let ptr = cif.call::<*mut c_void>(fun, args);
            if ptr.is_null() {
                Ok(Value::Nil)
            } else {
                let cstr = CStr::from_ptr(ptr as *const std::os::raw::c_char);
                Ok(Value::str(&cstr.to_string_lossy()))
            }
        }
        CType::Pointer | CType::Struct => {
            let ptr = cif.call::<*mut c_void>(fun, args);
            if ptr.is_null() {
                Ok(Value::Nil)
            } else {
                Ok(Value::pointer(ptr as usize, "void"))
            }
        }
    }
}

/// Reads the field at `offset` out of a struct's raw buffer, matching `ty`
/// (spec.md §4.8's `cstruct_get_field`).
pub fn read_struct_field(data: &[u8], offset: usize, ty: CType) -> Result<Value, String> {
    let size = ty.byte_size();
    if offset + size > data.len() {
        return Err(format!("field offset {offset} out of bounds for struct of size {}", data.len()));
    }
    let bytes = &data[offset..offset + size];
    let value = match ty {
        CType::Void => Value::Nil,
        CType::Bool => Value::Bool(bytes[0] != 0),
        t if t.is_integer() => Value::Int(read_int(bytes, t)),
        CType::Float => Value::Float(f32::from_ne_bytes(bytes.try_into().unwrap()) as f64),
        CType::Double => Value::Float(f64::from_ne_bytes(bytes.try_into().unwrap())),
        CType::CString | CType::Pointer | CType::Struct => {
            let addr = u64::from_ne_bytes(bytes.try_into().unwrap()) as usize;
            if addr == 0 {
                Value::Nil
            } else if ty == CType::CString {
                let cstr = unsafe { CStr::from_ptr(addr as *const std::os::raw::c_char) };
                Value::str(&cstr.to_string_lossy())
            } else {
                Value::pointer(addr, "void")
            }
        }
    };
    Ok(value)
}

fn read_int(bytes: &[u8], ty: CType) -> i64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    let raw = u64::from_ne_bytes(buf) as i64;
    if ty.is_signed() {
        match ty.byte_size() {
            1 => raw as i8 as i64,
            2 => raw as i16 as i64,
            4 => raw as i32 as i64,
            _ => raw,
        }
    } else {
        raw
    }
}

/// Writes `value` into a struct's raw buffer at `offset` (spec.md §4.8's
/// `cstruct_set_field`).
pub fn write_struct_field(
    data: &mut [u8],
    offset: usize,
    ty: CType,
    value: &Value,
) -> Result<(), String> {
    let size = ty.byte_size();
    if offset + size > data.len() {
        return Err(format!("field offset {offset} out of bounds for struct of size {}", data.len()));
    }
    let (storage, _keep_alive) = marshal_to_c(value, ty)?;
    let bytes: [u8; 8] = match storage {
        ArgStorage::I8(v) => {
            let mut b = [0u8; 8];
            b[0] = v as u8;
            b
        }
        ArgStorage::U8(v) => {
            let mut b = [0u8; 8];
            b[0] = v;
            b
        }
        ArgStorage::I16(v) => {
            let mut b = [0u8; 8];
            b[..2].copy_from_slice(&v.to_ne_bytes());
            b
        }
        ArgStorage::U16(v) => {
            let mut b = [0u8; 8];
            b[..2].copy_from_slice(&v.to_ne_bytes());
            b
        }
        ArgStorage::I32(v) => {
            let mut b = [0u8; 8];
            b[..4].copy_from_slice(&v.to_ne_bytes());
            b
        }
        ArgStorage::U32(v) => {
            let mut b = [0u8; 8];
            b[..4].copy_from_slice(&v.to_ne_bytes());
            b
        }
        ArgStorage::I64(v) => v.to_ne_bytes(),
        ArgStorage::U64(v) => v.to_ne_bytes(),
        ArgStorage::F32(v) => {
            let mut b = [0u8; 8];
            b[..4].copy_from_slice(&v.to_ne_bytes());
            b
        }
        ArgStorage::F64(v) => v.to_ne_bytes(),
        ArgStorage::Ptr(p) => (p as usize as u64).to_ne_bytes(),
        ArgStorage::CStr(_) => unreachable!(),
    };
    data[offset..offset + size].copy_from_slice(&bytes[..size]);
    Ok(())
}

/// Sanity-checks a struct descriptor before `cstruct_create` allocates its
/// backing buffer (spec.md §4.8).
pub fn check_descriptor(descriptor: &CStructDescriptor) -> Result<(), String> {
    if descriptor.size == 0 && !descriptor.fields.is_empty() {
        warn!(name = %descriptor.name, "struct has fields but computed zero size");
        return Err(format!("struct '{}' has an invalid layout", descriptor.name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use brisk_core::CFunctionDescriptor;

    fn resolve(symbol: &str) -> usize {
        let mut loader = crate::loader::Loader::new().unwrap();
        loader.resolve(symbol).unwrap()
    }

    #[test]
    fn calls_libc_strlen() {
        let descriptor = CFunctionDescriptor::new(
            "strlen".into(),
            CType::SizeT,
            vec![CType::CString],
            false,
            resolve("strlen"),
        );
        let result = call(&descriptor, &[Value::str("hello")]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn calls_libc_abs() {
        let descriptor = CFunctionDescriptor::new(
            "abs".into(),
            CType::Int,
            vec![CType::Int],
            false,
            resolve("abs"),
        );
        let result = call(&descriptor, &[Value::Int(-7)]).unwrap();
        assert_eq!(result, Value::Int(7));
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let descriptor = CFunctionDescriptor::new(
            "abs".into(),
            CType::Int,
            vec![CType::Int],
            false,
            resolve("abs"),
        );
        let err = call(&descriptor, &[]).unwrap_err();
        assert!(err.contains("expected"));
    }

    #[test]
    fn struct_field_roundtrip() {
        let mut buf = vec![0u8; 8];
        write_struct_field(&mut buf, 0, CType::Int, &Value::Int(42)).unwrap();
        let v = read_struct_field(&buf, 0, CType::Int).unwrap();
        assert_eq!(v, Value::Int(42));
    }
}
