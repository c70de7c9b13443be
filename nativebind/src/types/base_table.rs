use std::collections::BTreeMap;

use super::{NativeType, TypeDescriptor};

/// The global primitive vocabulary. Every symbolic type name that is not
/// declared in a scope ends up being looked up here.
pub trait BaseTypes: Send + Sync {
    fn lookup(&self, name: &str) -> Option<TypeDescriptor>;
}

/// Base type table for the C ABI of the host
#[derive(Debug, Clone)]
pub struct NativeTypeTable {
    types: BTreeMap<String, NativeType>,
}

impl NativeTypeTable {
    pub fn new() -> Self {
        let size_t = NativeType::size_type(false);
        let ssize_t = NativeType::size_type(true);
        let builtin = [
            ("void", NativeType::Void),
            ("bool", NativeType::Bool),
            ("char", NativeType::I8),
            ("int8", NativeType::I8),
            ("uchar", NativeType::U8),
            ("uint8", NativeType::U8),
            ("short", NativeType::I16),
            ("int16", NativeType::I16),
            ("ushort", NativeType::U16),
            ("uint16", NativeType::U16),
            ("int", NativeType::I32),
            ("int32", NativeType::I32),
            ("uint", NativeType::U32),
            ("uint32", NativeType::U32),
            ("long_long", NativeType::I64),
            ("int64", NativeType::I64),
            ("ulong_long", NativeType::U64),
            ("uint64", NativeType::U64),
            ("long", NativeType::Long),
            ("ulong", NativeType::ULong),
            ("float", NativeType::F32),
            ("float32", NativeType::F32),
            ("double", NativeType::F64),
            ("float64", NativeType::F64),
            ("long_double", NativeType::LongDouble),
            ("pointer", NativeType::Pointer),
            ("string", NativeType::String),
            ("size_t", size_t),
            ("ssize_t", ssize_t),
            ("intptr_t", ssize_t),
            ("uintptr_t", size_t),
            ("buffer_in", NativeType::BufferIn),
            ("buffer_out", NativeType::BufferOut),
            ("buffer_inout", NativeType::BufferInOut),
            ("varargs", NativeType::Varargs),
        ];
        Self {
            types: builtin
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        }
    }

    /// Add (or replace) a name in the table
    pub fn with_type(mut self, name: impl Into<String>, ty: NativeType) -> Self {
        self.types.insert(name.into(), ty);
        self
    }

    pub fn get(&self, name: &str) -> Option<NativeType> {
        self.types.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

impl Default for NativeTypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseTypes for NativeTypeTable {
    fn lookup(&self, name: &str) -> Option<TypeDescriptor> {
        self.get(name).map(TypeDescriptor::Prim)
    }
}
