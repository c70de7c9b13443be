use std::sync::Arc;

use derivative::Derivative;
use error_stack::{report, Result, ResultExt};

use crate::layout::{LayoutSpec, StructClass};
use crate::library::{Address, LibrarySet, NativeLibrary};
use crate::memory::{MemoryError, StructRef, Value};
use crate::types::{Resolver, TypeDescriptor, TypeRef};

use super::AttachError;

/// Name of the single field of the struct wrapping a scalar variable
pub const GVAR_FIELD: &str = "gvar";

pub type Getter = Arc<dyn Fn() -> Result<Value, MemoryError> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&Value) -> Result<(), MemoryError> + Send + Sync>;

/// A native global variable to attach
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    /// Symbol in the library, defaults to `name`
    pub native_name: Option<String>,
    pub ty: TypeRef,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            native_name: None,
            ty: ty.into(),
        }
    }

    pub fn with_native_name(mut self, native_name: impl Into<String>) -> Self {
        self.native_name = Some(native_name.into());
        self
    }

    pub fn symbol(&self) -> &str {
        self.native_name.as_deref().unwrap_or(&self.name)
    }
}

/// A variable attached to a scope, accessed through its getter and setter
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct VariableBinding {
    name: String,
    symbol: String,
    address: Address,
    ty: TypeDescriptor,
    library: Arc<dyn NativeLibrary>,
    #[derivative(Debug = "ignore")]
    getter: Getter,
    #[derivative(Debug = "ignore")]
    setter: Option<Setter>,
}

impl VariableBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Type of the variable. A struct variable has its struct descriptor here.
    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn library(&self) -> &Arc<dyn NativeLibrary> {
        &self.library
    }

    pub fn get(&self) -> Result<Value, MemoryError> {
        (self.getter)()
    }

    /// Struct variables have no setter, their fields are set through the view
    pub fn set(&self, value: &Value) -> Result<(), MemoryError> {
        match &self.setter {
            Some(setter) => setter(value),
            None => Err(report!(MemoryError::Unsupported(self.ty.to_string())))
                .attach_printable_lazy(|| {
                    format!("`{}` is a struct, set its fields instead", self.name)
                }),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

/// Find the address of `decl` and build its accessors
///
/// Every library is searched in order and the first non-null address is used.
pub fn attach_variable(
    decl: &VariableDecl,
    resolver: &Resolver,
    libraries: &LibrarySet,
) -> Result<VariableBinding, AttachError> {
    let symbol = decl.symbol();
    let found = libraries.iter().find_map(|library| {
        log::debug!("Looking for variable `{}` in {}", symbol, library.display_name());
        match library.find_symbol(symbol) {
            Some(address) if !address.is_null() => Some((library.clone(), address)),
            _ => None,
        }
    });
    let (library, address) = found.ok_or_else(|| {
        report!(AttachError::NotFound {
            name: symbol.to_string(),
            libraries: libraries.names(),
        })
    })?;

    let struct_class = match &decl.ty {
        TypeRef::Struct(s) => Some(s.clone()),
        TypeRef::Named(name) => resolver.find_struct(name).cloned(),
        _ => None,
    };
    let binding = match struct_class {
        Some(class) => struct_variable(decl, class, address, library)?,
        None => scalar_variable(decl, resolver, address, library)?,
    };
    log::debug!("Attached variable `{}` at {}", decl.name, address);
    Ok(binding)
}

fn struct_variable(
    decl: &VariableDecl,
    class: StructClass,
    address: Address,
    library: Arc<dyn NativeLibrary>,
) -> Result<VariableBinding, AttachError> {
    let ty = TypeDescriptor::Struct(class.clone());
    // SAFETY: the address is an exported data symbol of a library that the
    // binding keeps loaded, declared to hold this struct
    let view = unsafe { StructRef::new(class, address) }
        .change_context_lazy(|| AttachError::Variable(decl.name.clone()))?;
    Ok(VariableBinding {
        name: decl.name.clone(),
        symbol: decl.symbol().to_string(),
        address,
        ty,
        library,
        getter: Arc::new(move || -> Result<Value, MemoryError> {
            Ok(Value::Struct(view.clone()))
        }),
        setter: None,
    })
}

fn scalar_variable(
    decl: &VariableDecl,
    resolver: &Resolver,
    address: Address,
    library: Arc<dyn NativeLibrary>,
) -> Result<VariableBinding, AttachError> {
    let ty = resolver
        .resolve(&decl.ty)
        .change_context_lazy(|| AttachError::Type(decl.name.clone()))?;
    let wrapper = StructClass::new_struct(decl.name.clone());
    wrapper
        .define(
            &LayoutSpec::new().field(GVAR_FIELD, TypeRef::Descriptor(ty.clone())),
            resolver,
        )
        .change_context_lazy(|| AttachError::Variable(decl.name.clone()))?;
    // SAFETY: see `struct_variable`
    let view = unsafe { StructRef::new(wrapper, address) }
        .change_context_lazy(|| AttachError::Variable(decl.name.clone()))?;
    let setter_view = view.clone();
    Ok(VariableBinding {
        name: decl.name.clone(),
        symbol: decl.symbol().to_string(),
        address,
        ty,
        library,
        getter: Arc::new(move || view.get(GVAR_FIELD)),
        setter: Some(Arc::new(move |value: &Value| {
            setter_view.set(GVAR_FIELD, value)
        })),
    })
}
