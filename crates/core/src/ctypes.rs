//! The C type system (spec.md §4.4): the enumeration of C scalar/pointer
//! kinds Brisk can marshal across the FFI boundary, and the descriptor
//! shapes `brisk-runtime`'s header parser, dynamic loader and FFI bridge
//! populate and consume.
//!
//! This module is deliberately free of any FFI-library dependency (no
//! `libffi`, no `libloading`): it only describes *shapes*. `brisk-runtime`
//! is where a `CType` becomes a `libffi::middle::Type` and a
//! `CFunctionDescriptor` becomes a prepared call.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

/// A recognized C scalar, pointer, or opaque-struct kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CType {
    Void,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Bool,
    SizeT,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    /// Generic `void*`.
    Pointer,
    /// `char*`, elevated from `Pointer` by the header parser's type
    /// recognizer (spec.md §4.7).
    CString,
    /// An opaque struct, always marshaled as pointer-to-struct (spec.md §4.4).
    Struct,
}

impl CType {
    /// Byte size on the target (spec.md §4.4: "1/2/4/8 as appropriate;
    /// pointers 8; size_t 8 on the target").
    pub fn byte_size(self) -> usize {
        use CType::*;
        match self {
            Void => 0,
            SChar | UChar | I8 | U8 | Bool => 1,
            Short | UShort | I16 | U16 => 2,
            Int | UInt | Float | I32 | U32 => 4,
            Long | ULong | LongLong | ULongLong | Double | SizeT | I64 | U64 | Pointer
            | CString | Struct => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        use CType::*;
        matches!(
            self,
            SChar | UChar
                | Short
                | UShort
                | Int
                | UInt
                | Long
                | ULong
                | LongLong
                | ULongLong
                | SizeT
                | I8
                | U8
                | I16
                | U16
                | I32
                | U32
                | I64
                | U64
        )
    }

    pub fn is_signed(self) -> bool {
        use CType::*;
        matches!(
            self,
            SChar | Short | Int | Long | LongLong | I8 | I16 | I32 | I64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, CType::Float | CType::Double)
    }

    pub fn is_pointer_like(self) -> bool {
        matches!(self, CType::Pointer | CType::CString | CType::Struct)
    }

    /// Natural alignment, per §4.4's `finalize` rule: `min(size_of_field, 8)`.
    pub fn alignment(self) -> usize {
        self.byte_size().max(1).min(8)
    }
}

fn next_descriptor_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Runtime metadata describing a resolved C function (spec.md §4.4).
///
/// `id` is a process-unique handle `brisk-runtime` uses to key its prepared
/// call-interface cache (the `libffi::middle::Cif` lives there, not here,
/// since this crate does not depend on `libffi`).
#[derive(Debug)]
pub struct CFunctionDescriptor {
    pub id: u64,
    pub symbol: String,
    pub return_type: CType,
    pub param_types: Vec<CType>,
    pub variadic: bool,
    pub address: usize,
    pub prepared: Cell<bool>,
}

impl CFunctionDescriptor {
    pub fn new(
        symbol: String,
        return_type: CType,
        param_types: Vec<CType>,
        variadic: bool,
        address: usize,
    ) -> Self {
        CFunctionDescriptor {
            id: next_descriptor_id(),
            symbol,
            return_type,
            param_types,
            variadic,
            address,
            prepared: Cell::new(false),
        }
    }
}

/// A single field of a `CStructDescriptor`.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: CType,
    pub offset: usize,
    pub size: usize,
    pub nested: Option<std::rc::Rc<CStructDescriptor>>,
}

/// Layout of a C struct: field list in source order plus computed offsets,
/// total size and alignment (spec.md §4.4, §4.8).
#[derive(Debug)]
pub struct CStructDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub size: usize,
    pub align: usize,
}

impl CStructDescriptor {
    /// Build a descriptor from an ordered list of (name, type) pairs,
    /// computing offsets and total size by natural alignment: each field is
    /// aligned up to `min(size_of_field, 8)` before being placed, and the
    /// total size is rounded up to the struct's maximum field alignment.
    pub fn new(name: String, raw_fields: Vec<(String, CType)>) -> Self {
        let mut offset = 0usize;
        let mut max_align = 1usize;
        let mut fields = Vec::with_capacity(raw_fields.len());
        for (fname, ty) in raw_fields {
            let align = ty.alignment();
            max_align = max_align.max(align);
            let aligned_offset = align_up(offset, align);
            let size = ty.byte_size();
            fields.push(FieldDescriptor {
                name: fname,
                ty,
                offset: aligned_offset,
                size,
                nested: None,
            });
            offset = aligned_offset + size;
        }
        let size = align_up(offset, max_align);
        CStructDescriptor {
            name,
            fields,
            size,
            align: max_align,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    if align == 0 {
        return offset;
    }
    offset.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_layout_packs_and_aligns() {
        // struct { char a; int b; long c; }
        let d = CStructDescriptor::new(
            "S".into(),
            vec![
                ("a".into(), CType::SChar),
                ("b".into(), CType::Int),
                ("c".into(), CType::Long),
            ],
        );
        assert_eq!(d.field("a").unwrap().offset, 0);
        assert_eq!(d.field("b").unwrap().offset, 4); // aligned to 4
        assert_eq!(d.field("c").unwrap().offset, 8); // aligned to 8
        assert_eq!(d.size, 16);
        assert_eq!(d.align, 8);
    }

    #[test]
    fn byte_sizes_match_spec_table() {
        assert_eq!(CType::Int.byte_size(), 4);
        assert_eq!(CType::Long.byte_size(), 8);
        assert_eq!(CType::Pointer.byte_size(), 8);
        assert_eq!(CType::SizeT.byte_size(), 8);
        assert_eq!(CType::Bool.byte_size(), 1);
    }

    #[test]
    fn descriptor_ids_are_unique() {
        let a = CFunctionDescriptor::new("a".into(), CType::Void, vec![], false, 0);
        let b = CFunctionDescriptor::new("b".into(), CType::Void, vec![], false, 0);
        assert_ne!(a.id, b.id);
    }
}
