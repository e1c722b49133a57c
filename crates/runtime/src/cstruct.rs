//! C struct field access (spec.md §4.8). The struct's layout lives in a
//! `CStructDescriptor` (brisk-core); this module is the thin read/write path
//! that locates a field by name and marshals through `ffi_bridge`.

use crate::ffi_bridge;
use brisk_core::{CStructDescriptor, Value};
use std::rc::Rc;

/// Allocates a zeroed instance of `descriptor` (spec.md §4.8's
/// `cstruct_create`). `Value::cstruct` already does the zeroing; this just
/// applies the layout sanity check first.
pub fn create(descriptor: Rc<CStructDescriptor>) -> Result<Value, String> {
    ffi_bridge::check_descriptor(&descriptor)?;
    Ok(Value::cstruct(descriptor))
}

/// `cstruct_get_field`: locate `field` by linear scan and marshal the bytes
/// at its offset back into a Brisk value.
pub fn get_field(value: &Value, field: &str) -> Result<Value, String> {
    let obj = value
        .as_cstruct()
        .ok_or_else(|| format!("cannot get a field of a '{}' value", value.kind_name()))?;
    let fd = obj
        .descriptor
        .field(field)
        .ok_or_else(|| format!("struct '{}' has no field '{field}'", obj.descriptor.name))?;
    let data = obj.data.borrow();
    ffi_bridge::read_struct_field(&data, fd.offset, fd.ty)
}

/// `cstruct_set_field`: locate `field` and marshal `new_value` into the
/// buffer at its offset.
pub fn set_field(value: &Value, field: &str, new_value: &Value) -> Result<(), String> {
    let obj = value
        .as_cstruct()
        .ok_or_else(|| format!("cannot set a field of a '{}' value", value.kind_name()))?;
    let fd = obj
        .descriptor
        .field(field)
        .ok_or_else(|| format!("struct '{}' has no field '{field}'", obj.descriptor.name))?;
    let (offset, ty) = (fd.offset, fd.ty);
    let mut data = obj.data.borrow_mut();
    ffi_bridge::write_struct_field(&mut data, offset, ty, new_value)
}

/// `&struct`: the raw data address as a `Pointer`, for C APIs expecting a
/// pointer-to-struct (spec.md §4.8).
pub fn address_of(value: &Value) -> Result<Value, String> {
    let obj = value
        .as_cstruct()
        .ok_or_else(|| format!("cannot take the address of a '{}' value", value.kind_name()))?;
    let addr = obj.data.borrow().as_ptr() as usize;
    Ok(Value::pointer(addr, obj.descriptor.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use brisk_core::CType;

    fn point_descriptor() -> Rc<CStructDescriptor> {
        Rc::new(CStructDescriptor::new(
            "Point".into(),
            vec![("x".into(), CType::Int), ("y".into(), CType::Int)],
        ))
    }

    #[test]
    fn get_and_set_roundtrip() {
        let v = create(point_descriptor()).unwrap();
        set_field(&v, "x", &Value::Int(3)).unwrap();
        set_field(&v, "y", &Value::Int(4)).unwrap();
        assert_eq!(get_field(&v, "x").unwrap(), Value::Int(3));
        assert_eq!(get_field(&v, "y").unwrap(), Value::Int(4));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let v = create(point_descriptor()).unwrap();
        let err = get_field(&v, "z").unwrap_err();
        assert!(err.contains("no field"));
    }

    #[test]
    fn address_of_returns_a_pointer() {
        let v = create(point_descriptor()).unwrap();
        let addr = address_of(&v).unwrap();
        assert!(addr.as_pointer().is_some());
    }
}
