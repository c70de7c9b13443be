use super::{NativeType, TypeDescriptor};

/// One entry of an enumeration declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumItem {
    /// Takes the next implicit value
    Symbol(String),
    /// Explicit value, implicit values continue from here
    Valued(String, i64),
}

impl From<&str> for EnumItem {
    fn from(s: &str) -> Self {
        Self::Symbol(s.to_string())
    }
}

impl From<(&str, i64)> for EnumItem {
    fn from((s, v): (&str, i64)) -> Self {
        Self::Valued(s.to_string(), v)
    }
}

/// A named or anonymous enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    name: Option<String>,
    native_type: NativeType,
    enumerators: Vec<(String, i64)>,
}

impl Enum {
    pub fn new(name: Option<String>, items: impl IntoIterator<Item = EnumItem>) -> Self {
        let mut next = 0i64;
        let mut enumerators = Vec::new();
        for item in items {
            let (symbol, value) = match item {
                EnumItem::Symbol(s) => (s, next),
                EnumItem::Valued(s, v) => (s, v),
            };
            next = value.wrapping_add(1);
            enumerators.push((symbol, value));
        }
        Self {
            name,
            native_type: NativeType::I32,
            enumerators,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Integer type the enumeration is stored as
    pub fn native_type(&self) -> NativeType {
        self.native_type
    }

    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::Prim(self.native_type)
    }

    /// (symbol, value) pairs in declaration order
    pub fn enumerators(&self) -> &[(String, i64)] {
        &self.enumerators
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.enumerators.iter().map(|(s, _)| s.as_str())
    }

    /// Value of a symbol. A symbol repeated in the same enumeration maps to its last value.
    pub fn find(&self, symbol: &str) -> Option<i64> {
        self.enumerators
            .iter()
            .rev()
            .find(|(s, _)| s == symbol)
            .map(|(_, v)| *v)
    }

    /// First symbol declared with the value
    pub fn symbol_of(&self, value: i64) -> Option<&str> {
        self.enumerators
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(s, _)| s.as_str())
    }
}
