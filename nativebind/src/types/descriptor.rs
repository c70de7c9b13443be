use std::str::FromStr;
use std::sync::Arc;

use crate::layout::StructClass;

use super::NativeType;

/// Calling convention used for functions and callbacks declared in a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Convention {
    #[default]
    Default,
    Stdcall,
}

impl FromStr for Convention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" | "cdecl" => Ok(Self::Default),
            "stdcall" => Ok(Self::Stdcall),
            _ => Err(format!("unknown calling convention `{}`", s)),
        }
    }
}

impl std::fmt::Display for Convention {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Convention::Default => write!(f, "default"),
            Convention::Stdcall => write!(f, "stdcall"),
        }
    }
}

/// A resolved native type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// Primitive or pointer
    Prim(NativeType),
    /// Struct or union embedded inline
    Struct(StructClass),
    /// Struct or union passed and returned by value
    ByValue(StructClass),
    /// Native function pointer with a known signature
    Callback(Arc<CallbackInfo>),
}

/// Signature of a function pointer that native code may call
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackInfo {
    pub params: Vec<TypeDescriptor>,
    pub ret: TypeDescriptor,
    pub convention: Convention,
}

impl TypeDescriptor {
    pub const POINTER: Self = Self::Prim(NativeType::Pointer);

    /// Size in bytes. A struct without a computed layout reports its size floor, or 0.
    pub fn size(&self) -> usize {
        match self {
            Self::Prim(p) => p.size(),
            Self::Struct(s) | Self::ByValue(s) => s.size(),
            Self::Callback(_) => NativeType::Pointer.size(),
        }
    }

    pub fn alignment(&self) -> usize {
        match self {
            Self::Prim(p) => p.alignment(),
            Self::Struct(s) | Self::ByValue(s) => s.alignment(),
            Self::Callback(_) => NativeType::Pointer.alignment(),
        }
    }

    pub fn as_prim(&self) -> Option<NativeType> {
        match self {
            Self::Prim(p) => Some(*p),
            _ => None,
        }
    }

    /// The composite this descriptor embeds, if any
    pub fn as_struct(&self) -> Option<&StructClass> {
        match self {
            Self::Struct(s) | Self::ByValue(s) => Some(s),
            _ => None,
        }
    }
}

impl From<NativeType> for TypeDescriptor {
    fn from(p: NativeType) -> Self {
        Self::Prim(p)
    }
}

impl std::fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TypeDescriptor::Prim(p) => write!(f, "{}", p),
            TypeDescriptor::Struct(s) => write!(f, "{} {}", s.kind(), s.name()),
            TypeDescriptor::ByValue(s) => write!(f, "{} {} (by value)", s.kind(), s.name()),
            TypeDescriptor::Callback(cb) => write!(f, "{}", cb),
        }
    }
}

impl std::fmt::Display for CallbackInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "callback(")?;
        let mut iter = self.params.iter();
        if let Some(t) = iter.next() {
            write!(f, "{}", t)?;
        }
        for t in iter {
            write!(f, ", {}", t)?;
        }
        write!(f, "): {}", self.ret)?;
        if self.convention != Convention::Default {
            write!(f, " [{}]", self.convention)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_is_pointer_sized() {
        let cb = TypeDescriptor::Callback(Arc::new(CallbackInfo {
            params: vec![NativeType::I32.into()],
            ret: NativeType::Void.into(),
            convention: Convention::Default,
        }));
        assert_eq!(cb.size(), NativeType::Pointer.size());
        assert_eq!(cb.to_string(), "callback(int32): void");
    }

    #[test]
    fn parse_convention() {
        assert_eq!("stdcall".parse::<Convention>(), Ok(Convention::Stdcall));
        assert_eq!("default".parse::<Convention>(), Ok(Convention::Default));
        assert!("fastcall".parse::<Convention>().is_err());
    }
}
