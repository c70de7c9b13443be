use crate::layout::StructClass;

use super::{NativeType, TypeDescriptor};

/// A type as written in a declaration, before resolution
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    /// Symbolic name, looked up in the scope then in the base table
    Named(String),
    /// Already resolved
    Descriptor(TypeDescriptor),
    /// A struct or union definition
    Struct(StructClass),
    /// The inner type, which must denote a struct or union, passed by value
    ByValue(Box<TypeRef>),
}

impl TypeRef {
    pub fn by_value(inner: impl Into<TypeRef>) -> Self {
        Self::ByValue(Box::new(inner.into()))
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<TypeDescriptor> for TypeRef {
    fn from(d: TypeDescriptor) -> Self {
        Self::Descriptor(d)
    }
}

impl From<NativeType> for TypeRef {
    fn from(p: NativeType) -> Self {
        Self::Descriptor(TypeDescriptor::Prim(p))
    }
}

impl From<StructClass> for TypeRef {
    fn from(s: StructClass) -> Self {
        Self::Struct(s)
    }
}

impl From<&StructClass> for TypeRef {
    fn from(s: &StructClass) -> Self {
        Self::Struct(s.clone())
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TypeRef::Named(n) => write!(f, "{}", n),
            TypeRef::Descriptor(d) => write!(f, "{}", d),
            TypeRef::Struct(s) => write!(f, "{} {}", s.kind(), s.name()),
            TypeRef::ByValue(t) => write!(f, "{} (by value)", t),
        }
    }
}
