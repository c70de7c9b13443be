use error_stack::{report, Result};

use crate::layout::StructClass;

use super::{BaseTypes, TypeDescriptor, TypeError, TypeRef, TypeRegistry};

/// Resolves symbolic types against a chain of scope registries and the base table
///
/// Lookup order for a name, first match wins:
/// 1. a struct/union definition, resolved to a pointer
/// 2. a typedef alias
/// 3. a named callback
///
/// Steps 1-3 are repeated for each registry, innermost scope first, before
/// falling back to the base table.
#[derive(Clone)]
pub struct Resolver<'a> {
    chain: Vec<&'a TypeRegistry>,
    base: &'a dyn BaseTypes,
}

impl<'a> Resolver<'a> {
    pub fn new(base: &'a dyn BaseTypes) -> Self {
        Self {
            chain: Vec::new(),
            base,
        }
    }

    /// Add a registry to the end of the chain. Registries added earlier shadow later ones.
    pub fn with_registry(mut self, registry: &'a TypeRegistry) -> Self {
        self.chain.push(registry);
        self
    }

    /// Resolve a type used as a parameter, return value, typedef or variable.
    /// Struct definitions resolve to a pointer.
    pub fn resolve(&self, ty: &TypeRef) -> Result<TypeDescriptor, TypeError> {
        match ty {
            TypeRef::Descriptor(d) => Ok(d.clone()),
            TypeRef::Struct(_) => Ok(TypeDescriptor::POINTER),
            TypeRef::ByValue(inner) => self.resolve_by_value(inner),
            TypeRef::Named(name) => self.resolve_name(name),
        }
    }

    /// Resolve a type used as a struct field. Struct definitions are embedded inline.
    pub fn resolve_inline(&self, ty: &TypeRef) -> Result<TypeDescriptor, TypeError> {
        match ty {
            TypeRef::Struct(s) => Ok(TypeDescriptor::Struct(s.clone())),
            TypeRef::Named(name) => match self.find_struct(name) {
                Some(s) => Ok(TypeDescriptor::Struct(s.clone())),
                None => self.resolve_name(name),
            },
            _ => self.resolve(ty),
        }
    }

    pub fn find_struct(&self, name: &str) -> Option<&'a StructClass> {
        self.chain.iter().find_map(|reg| reg.struct_class(name))
    }

    fn resolve_name(&self, name: &str) -> Result<TypeDescriptor, TypeError> {
        for (_depth, reg) in self.chain.iter().enumerate() {
            if reg.struct_class(name).is_some() {
                #[cfg(feature = "debug-resolve")]
                {
                    println!("resolve `{}`: struct in scope depth {}", name, _depth);
                }
                return Ok(TypeDescriptor::POINTER);
            }
            if let Some(ty) = reg.alias(name) {
                #[cfg(feature = "debug-resolve")]
                {
                    println!("resolve `{}`: alias in scope depth {} -> {}", name, _depth, ty);
                }
                return Ok(ty.clone());
            }
            if let Some(cb) = reg.callback(name) {
                #[cfg(feature = "debug-resolve")]
                {
                    println!("resolve `{}`: callback in scope depth {}", name, _depth);
                }
                return Ok(TypeDescriptor::Callback(cb.clone()));
            }
        }
        #[cfg(feature = "debug-resolve")]
        {
            println!("resolve `{}`: base table", name);
        }
        self.base
            .lookup(name)
            .ok_or_else(|| report!(TypeError::UnknownType(name.to_string())))
    }

    fn resolve_by_value(&self, inner: &TypeRef) -> Result<TypeDescriptor, TypeError> {
        let class = match inner {
            TypeRef::Struct(s) => Some(s.clone()),
            TypeRef::Named(name) => self.find_struct(name).cloned(),
            TypeRef::Descriptor(d) => d.as_struct().cloned(),
            TypeRef::ByValue(t) => return self.resolve_by_value(t),
        };
        match class {
            Some(s) => Ok(TypeDescriptor::ByValue(s)),
            None => Err(report!(TypeError::NotAStruct(inner.to_string()))),
        }
    }
}
