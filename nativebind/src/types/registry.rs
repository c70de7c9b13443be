use std::collections::BTreeMap;
use std::sync::Arc;

use derivative::Derivative;

use crate::layout::StructClass;

use super::{CallbackInfo, Enum, TypeDescriptor};

/// Types declared in one scope
///
/// Holds the scope-local vocabulary that shadows and extends the base type
/// table: typedef aliases, enumerations with their flat symbol map, named
/// callback signatures and the struct/union definitions of the scope.
#[derive(Debug, Derivative)]
#[derivative(Default(new = "true"))]
pub struct TypeRegistry {
    aliases: BTreeMap<String, TypeDescriptor>,
    enum_values: BTreeMap<String, i64>,
    enumerations: Vec<Arc<Enum>>,
    callbacks: BTreeMap<String, Arc<CallbackInfo>>,
    structs: BTreeMap<String, StructClass>,
}

impl TypeRegistry {
    #[inline]
    pub fn alias(&self, name: &str) -> Option<&TypeDescriptor> {
        self.aliases.get(name)
    }

    /// Replaces an existing alias of the same name
    #[inline]
    pub fn insert_alias(&mut self, name: impl Into<String>, ty: TypeDescriptor) {
        self.aliases.insert(name.into(), ty);
    }

    #[inline]
    pub fn callback(&self, name: &str) -> Option<&Arc<CallbackInfo>> {
        self.callbacks.get(name)
    }

    /// Named callbacks are usable as types, so they are aliased as well
    pub fn insert_callback(&mut self, name: impl Into<String>, cb: Arc<CallbackInfo>) {
        let name = name.into();
        self.aliases
            .insert(name.clone(), TypeDescriptor::Callback(Arc::clone(&cb)));
        self.callbacks.insert(name, cb);
    }

    /// Register an enumeration and merge its symbols into the flat value map.
    /// Symbols already defined by earlier enumerations are overwritten.
    pub fn insert_enum(&mut self, e: Arc<Enum>) {
        for (symbol, value) in e.enumerators() {
            self.enum_values.insert(symbol.clone(), *value);
        }
        if let Some(name) = e.name() {
            self.aliases.insert(name.to_string(), e.descriptor());
        }
        self.enumerations.push(e);
    }

    #[inline]
    pub fn enum_value(&self, symbol: &str) -> Option<i64> {
        self.enum_values.get(symbol).copied()
    }

    /// Find a named enumeration. The latest declaration wins.
    pub fn find_enum(&self, name: &str) -> Option<&Arc<Enum>> {
        self.enumerations
            .iter()
            .rev()
            .find(|e| e.name() == Some(name))
    }

    #[inline]
    pub fn struct_class(&self, name: &str) -> Option<&StructClass> {
        self.structs.get(name)
    }

    #[inline]
    pub fn insert_struct(&mut self, class: StructClass) {
        self.structs.insert(class.name().to_string(), class);
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn enum_values(&self) -> &BTreeMap<String, i64> {
        &self.enum_values
    }

    pub fn enumerations(&self) -> &[Arc<Enum>] {
        &self.enumerations
    }

    pub fn callbacks(&self) -> impl Iterator<Item = (&str, &Arc<CallbackInfo>)> {
        self.callbacks.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructClass> {
        self.structs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnumItem, NativeType};

    #[test]
    fn enum_symbols_last_write_wins() {
        let mut reg = TypeRegistry::new();
        reg.insert_enum(Arc::new(Enum::new(None, ["a", "b"].map(EnumItem::from))));
        reg.insert_enum(Arc::new(Enum::new(
            Some("other".to_string()),
            [EnumItem::from(("b", 10))],
        )));
        assert_eq!(reg.enum_value("a"), Some(0));
        assert_eq!(reg.enum_value("b"), Some(10));
        assert_eq!(reg.enumerations().len(), 2);
        assert_eq!(
            reg.alias("other"),
            Some(&TypeDescriptor::Prim(NativeType::I32))
        );
        assert!(reg.find_enum("other").is_some());
    }

    #[test]
    fn named_callback_is_also_alias() {
        let mut reg = TypeRegistry::new();
        let cb = Arc::new(CallbackInfo {
            params: vec![],
            ret: NativeType::Void.into(),
            convention: Default::default(),
        });
        reg.insert_callback("notify", Arc::clone(&cb));
        assert_eq!(reg.callback("notify"), Some(&cb));
        assert_eq!(reg.alias("notify"), Some(&TypeDescriptor::Callback(cb)));
    }
}
