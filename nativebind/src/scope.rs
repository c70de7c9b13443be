use std::collections::BTreeMap;
use std::sync::Arc;

use derivative::Derivative;
use error_stack::{report, Result, ResultExt};

use crate::attach::{
    attach_function, attach_variable, AttachError, FunctionBinding, FunctionDecl, InvokerBuilder,
    VariableBinding, VariableDecl,
};
use crate::layout::{LayoutError, LayoutSpec, StructClass, StructLayout};
use crate::library::{
    resolve_libraries, Address, DlLoader, LibraryError, LibraryLoader, LibraryName, LibrarySet,
    Platform,
};
use crate::types::{
    BaseTypes, CallbackInfo, Convention, Enum, EnumItem, NativeTypeTable, Resolver, TypeDescriptor,
    TypeError, TypeRef, TypeRegistry,
};

/// Something attached to a scope under a name
#[derive(Debug, Clone)]
pub enum Binding {
    Function(Arc<FunctionBinding>),
    Variable(Arc<VariableBinding>),
}

/// The unit that declares bindings to native code
///
/// A scope owns a type registry, the set of libraries to search and the
/// bindings attached so far. Declarations take `&mut self`; once they are
/// done, [`Scope::freeze`] turns the scope into a shared, read-only value
/// that nested scopes can chain to.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Scope {
    name: String,
    parent: Option<Arc<Scope>>,
    registry: TypeRegistry,
    convention: Convention,
    libraries: Option<LibrarySet>,
    bindings: BTreeMap<String, Binding>,
    platform: Platform,
    #[derivative(Debug = "ignore")]
    base: Arc<dyn BaseTypes>,
    #[derivative(Debug = "ignore")]
    loader: Arc<dyn LibraryLoader>,
    #[derivative(Debug = "ignore")]
    invokers: Option<Arc<dyn InvokerBuilder>>,
}

impl Scope {
    /// A top-level scope using the host's native type table and dynamic linker
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            registry: TypeRegistry::new(),
            convention: Convention::Default,
            libraries: None,
            bindings: BTreeMap::new(),
            platform: Platform::current(),
            base: Arc::new(NativeTypeTable::new()),
            loader: Arc::new(DlLoader),
            invokers: None,
        }
    }

    /// A scope whose type lookups fall back to `parent` before the base table
    ///
    /// Collaborators and the calling convention are inherited. Libraries are not.
    pub fn nested(name: impl Into<String>, parent: Arc<Scope>) -> Self {
        Self {
            name: name.into(),
            registry: TypeRegistry::new(),
            convention: parent.convention,
            libraries: None,
            bindings: BTreeMap::new(),
            platform: parent.platform,
            base: parent.base.clone(),
            loader: parent.loader.clone(),
            invokers: parent.invokers.clone(),
            parent: Some(parent),
        }
    }

    pub fn with_base_types(mut self, base: Arc<dyn BaseTypes>) -> Self {
        self.base = base;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn LibraryLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_invoker_builder(mut self, invokers: Arc<dyn InvokerBuilder>) -> Self {
        self.invokers = Some(invokers);
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// End the declaration phase
    pub fn freeze(self) -> Arc<Self> {
        log::debug!(
            "Scope `{}` frozen with {} bindings",
            self.name,
            self.bindings.len()
        );
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn convention(&self) -> Convention {
        self.convention
    }

    /// Calling convention for functions and callbacks declared from now on
    pub fn set_convention(&mut self, convention: Convention) {
        self.convention = convention;
    }

    /// Resolver over this scope's registry, then each parent's, then the base table
    pub fn resolver(&self) -> Resolver<'_> {
        let mut resolver = Resolver::new(self.base.as_ref()).with_registry(&self.registry);
        let mut parent = self.parent.as_deref();
        while let Some(scope) = parent {
            resolver = resolver.with_registry(&scope.registry);
            parent = scope.parent.as_deref();
        }
        resolver
    }

    /////////////// Libraries ///////////////

    /// Open the libraries that functions and variables are searched in
    pub fn declare_libraries<N: Into<LibraryName>>(
        &mut self,
        names: impl IntoIterator<Item = N>,
    ) -> Result<&LibrarySet, LibraryError> {
        let names = names.into_iter().map(Into::into).collect::<Vec<_>>();
        let set = resolve_libraries(&names, self.loader.as_ref(), &self.platform)
            .attach_printable_lazy(|| format!("Declaring libraries of scope `{}`", self.name))?;
        log::info!("Scope `{}` uses {}", self.name, set.names().join(", "));
        Ok(self.libraries.insert(set))
    }

    pub fn libraries(&self) -> Result<&LibrarySet, LibraryError> {
        self.libraries
            .as_ref()
            .ok_or_else(|| report!(LibraryError::NotDeclared))
    }

    /////////////// Types ///////////////

    pub fn find_type(&self, ty: impl Into<TypeRef>) -> Result<TypeDescriptor, TypeError> {
        self.resolver().resolve(&ty.into())
    }

    /// Store the current resolution of `existing` under `alias`
    pub fn typedef(
        &mut self,
        existing: impl Into<TypeRef>,
        alias: impl Into<String>,
    ) -> Result<TypeDescriptor, TypeError> {
        let alias = alias.into();
        let ty = self
            .find_type(existing)
            .attach_printable_lazy(|| format!("While declaring typedef `{}`", alias))?;
        log::debug!("typedef {} {}", ty, alias);
        self.registry.insert_alias(alias, ty.clone());
        Ok(ty)
    }

    /// Declare an enumeration. A named one can be used as a type from now on.
    pub fn enumeration(
        &mut self,
        name: Option<&str>,
        items: impl IntoIterator<Item = EnumItem>,
    ) -> Arc<Enum> {
        let e = Arc::new(Enum::new(name.map(str::to_string), items));
        log::debug!(
            "enum {}: {} values",
            name.unwrap_or("(anonymous)"),
            e.enumerators().len()
        );
        self.registry.insert_enum(e.clone());
        e
    }

    pub fn enum_type(&self, name: &str) -> Option<Arc<Enum>> {
        self.registries().find_map(|r| r.find_enum(name).cloned())
    }

    pub fn enum_value(&self, symbol: &str) -> Option<i64> {
        self.registries().find_map(|r| r.enum_value(symbol))
    }

    /// Flat symbol to value map of this scope and its parents, inner scopes winning
    pub fn enum_values(&self) -> BTreeMap<String, i64> {
        let registries: Vec<_> = self.registries().collect();
        let mut values = BTreeMap::new();
        for registry in registries.into_iter().rev() {
            values.extend(registry.enum_values().iter().map(|(k, v)| (k.clone(), *v)));
        }
        values
    }

    /// Declare a callback signature with the current calling convention
    pub fn callback<P: Into<TypeRef>>(
        &mut self,
        name: Option<&str>,
        params: impl IntoIterator<Item = P>,
        ret: impl Into<TypeRef>,
    ) -> Result<TypeDescriptor, TypeError> {
        let info = {
            let resolver = self.resolver();
            let params = params
                .into_iter()
                .map(|p| resolver.resolve(&p.into()))
                .collect::<Result<Vec<_>, _>>()?;
            let ret = resolver.resolve(&ret.into())?;
            Arc::new(CallbackInfo {
                params,
                ret,
                convention: self.convention,
            })
        };
        if let Some(name) = name {
            log::debug!("callback {} = {}", name, info);
            self.registry.insert_callback(name, info.clone());
        }
        Ok(TypeDescriptor::Callback(info))
    }

    /////////////// Structs and unions ///////////////

    /// Declare a struct in this scope, or get the one already declared under `name`
    pub fn declare_struct(&mut self, name: &str) -> Result<StructClass, LayoutError> {
        self.declare_composite(name, false)
    }

    /// Declare a union in this scope, or get the one already declared under `name`
    pub fn declare_union(&mut self, name: &str) -> Result<StructClass, LayoutError> {
        self.declare_composite(name, true)
    }

    fn declare_composite(&mut self, name: &str, is_union: bool) -> Result<StructClass, LayoutError> {
        if let Some(existing) = self.registry.struct_class(name) {
            if existing.is_union() != is_union {
                return Err(report!(LayoutError::Argument(format!(
                    "`{}` is already declared as a {}",
                    name,
                    existing.kind()
                ))));
            }
            return Ok(existing.clone());
        }
        let class = if is_union {
            StructClass::new_union(name)
        } else {
            StructClass::new_struct(name)
        };
        log::debug!("Declared {} `{}`", class.kind(), name);
        self.registry.insert_struct(class.clone());
        Ok(class)
    }

    /// A struct or union visible from this scope
    pub fn struct_class(&self, name: &str) -> Option<StructClass> {
        self.resolver().find_struct(name).cloned()
    }

    /// Compute the layout of a struct or union declared in this scope
    ///
    /// Structs of parent scopes are visible as types but cannot be defined here.
    pub fn layout(
        &mut self,
        name: &str,
        spec: &LayoutSpec,
    ) -> Result<Arc<StructLayout>, LayoutError> {
        let class = self.own_struct(name)?;
        class.define(spec, &self.resolver())
    }

    /// Set the size floor of a struct or union declared in this scope
    pub fn set_size(&mut self, name: &str, size: usize) -> Result<(), LayoutError> {
        self.own_struct(name)?.set_size(size)
    }

    fn own_struct(&self, name: &str) -> Result<StructClass, LayoutError> {
        if let Some(class) = self.registry.struct_class(name) {
            return Ok(class.clone());
        }
        let err = report!(LayoutError::Argument(format!(
            "no struct or union `{}` in scope `{}`",
            name, self.name
        )));
        match self.struct_class(name) {
            Some(_) => Err(err.attach_printable("It is declared in a parent scope")),
            None => Err(err),
        }
    }

    /////////////// Bindings ///////////////

    /// Attach a native function under `decl.name`
    pub fn attach_function(&mut self, decl: FunctionDecl) -> Result<Arc<FunctionBinding>, AttachError> {
        let libraries = self
            .libraries()
            .change_context_lazy(|| AttachError::Function(decl.name.clone()))?;
        let invokers = self
            .invokers
            .as_deref()
            .ok_or_else(|| report!(AttachError::NoInvokerBuilder))?;
        let binding = attach_function(
            &decl,
            &self.resolver(),
            self.convention,
            libraries,
            invokers,
            &self.enum_values(),
        )
        .attach_printable_lazy(|| format!("In scope `{}`", self.name))?;
        let binding = Arc::new(binding);
        self.bindings
            .insert(decl.name, Binding::Function(binding.clone()));
        Ok(binding)
    }

    /// Attach a native global variable under `decl.name`, returning its address
    pub fn attach_variable(&mut self, decl: VariableDecl) -> Result<Address, AttachError> {
        let libraries = self
            .libraries()
            .change_context_lazy(|| AttachError::Variable(decl.name.clone()))?;
        let binding = attach_variable(&decl, &self.resolver(), libraries)
            .attach_printable_lazy(|| format!("In scope `{}`", self.name))?;
        let address = binding.address();
        self.bindings
            .insert(decl.name, Binding::Variable(Arc::new(binding)));
        Ok(address)
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn function(&self, name: &str) -> Option<&Arc<FunctionBinding>> {
        match self.bindings.get(name) {
            Some(Binding::Function(f)) => Some(f),
            _ => None,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Arc<VariableBinding>> {
        match self.bindings.get(name) {
            Some(Binding::Variable(v)) => Some(v),
            _ => None,
        }
    }

    fn registries(&self) -> impl Iterator<Item = &TypeRegistry> {
        std::iter::successors(Some(self), |s| s.parent.as_deref()).map(|s| &s.registry)
    }
}
