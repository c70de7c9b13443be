//! Reading and writing native values in memory

use std::ffi::{c_long, c_ulong};
use std::sync::Arc;

use error_stack::{report, Result, ResultExt};

use crate::layout::{FieldKind, StructClass, StructLayout};
use crate::library::Address;
use crate::types::{NativeType, TypeDescriptor};

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("No field `{0}`")]
    UnknownField(String),
    #[error("`{0}` has no layout")]
    Incomplete(String),
    #[error("Cannot access a value of type {0} in memory")]
    Unsupported(String),
    #[error("Cannot store {value} as {ty}")]
    TypeMismatch { value: String, ty: String },
}

/// A value crossing the native boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Pointer(Address),
    /// View of a struct living in native memory
    Struct(StructRef),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => Some(*v as i64),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Pointer(_) => "pointer",
            Value::Struct(_) => "struct",
            Value::Array(_) => "array",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Pointer(a) => write!(f, "{}", a),
            Value::Struct(s) => write!(f, "{} {} @ {}", s.class.kind(), s.class.name(), s.address),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Address> for Value {
    fn from(v: Address) -> Self {
        Value::Pointer(v)
    }
}

/// A struct or union at a fixed native address
///
/// Holds the layout it was created with, so field access does not change
/// if the class is inspected later.
#[derive(Debug, Clone, PartialEq)]
pub struct StructRef {
    class: StructClass,
    layout: Arc<StructLayout>,
    address: Address,
}

impl StructRef {
    /// View `address` as an instance of `class`
    ///
    /// # Safety
    /// `address` must point to memory that is valid for reads and writes of
    /// `class.size()` bytes for as long as the view or any copy of it is used.
    pub unsafe fn new(class: StructClass, address: Address) -> Result<Self, MemoryError> {
        let layout = class
            .layout()
            .ok_or_else(|| report!(MemoryError::Incomplete(class.name().to_string())))?;
        Ok(Self {
            class,
            layout,
            address,
        })
    }

    pub fn class(&self) -> &StructClass {
        &self.class
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn get(&self, field: &str) -> Result<Value, MemoryError> {
        let f = self
            .layout
            .field(field)
            .ok_or_else(|| report!(MemoryError::UnknownField(field.to_string())))?;
        let address = self.address.offset(f.offset);
        // SAFETY: the field lies within the struct, which the constructor guarantees is valid
        unsafe { read_field(&f.kind, address) }
            .attach_printable_lazy(|| format!("While reading field `{}`", field))
    }

    pub fn set(&self, field: &str, value: &Value) -> Result<(), MemoryError> {
        let f = self
            .layout
            .field(field)
            .ok_or_else(|| report!(MemoryError::UnknownField(field.to_string())))?;
        let address = self.address.offset(f.offset);
        // SAFETY: see `get`
        unsafe { write_field(&f.kind, address, value) }
            .attach_printable_lazy(|| format!("While writing field `{}`", field))
    }

    /// All fields in layout order
    pub fn values(&self) -> Result<Vec<(String, Value)>, MemoryError> {
        self.layout
            .fields()
            .iter()
            .map(|f| Ok((f.name.clone(), self.get(&f.name)?)))
            .collect()
    }
}

/// # Safety
/// `address` must be valid for reads of the field's size
pub unsafe fn read_field(kind: &FieldKind, address: Address) -> Result<Value, MemoryError> {
    match kind {
        FieldKind::Scalar(ty) => read_value(ty, address),
        FieldKind::Struct(class) => Ok(Value::Struct(StructRef::new(class.clone(), address)?)),
        FieldKind::Array { element, count } => {
            let stride = element.size();
            (0..*count)
                .map(|i| read_value(element, address.offset(i * stride)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
    }
}

/// # Safety
/// `address` must be valid for writes of the field's size
pub unsafe fn write_field(kind: &FieldKind, address: Address, value: &Value) -> Result<(), MemoryError> {
    match kind {
        FieldKind::Scalar(ty) => write_value(ty, address, value),
        FieldKind::Struct(class) => write_struct(class, address, value),
        FieldKind::Array { element, count } => {
            let values = match value {
                Value::Array(values) if values.len() <= *count => values,
                _ => return Err(mismatch(value, &format!("{}[{}]", element, count))),
            };
            let stride = element.size();
            for (i, v) in values.iter().enumerate() {
                write_value(element, address.offset(i * stride), v)?;
            }
            Ok(())
        }
    }
}

/// Read one value of type `ty`
///
/// # Safety
/// `address` must be valid for reads of `ty.size()` bytes
pub unsafe fn read_value(ty: &TypeDescriptor, address: Address) -> Result<Value, MemoryError> {
    let p = match ty {
        TypeDescriptor::Prim(p) => *p,
        TypeDescriptor::Struct(s) | TypeDescriptor::ByValue(s) => {
            return Ok(Value::Struct(StructRef::new(s.clone(), address)?))
        }
        TypeDescriptor::Callback(_) => NativeType::Pointer,
    };
    let value = match p {
        NativeType::Bool => Value::Bool(read::<u8>(address) != 0),
        NativeType::I8 => Value::Int(read::<i8>(address).into()),
        NativeType::U8 => Value::UInt(read::<u8>(address).into()),
        NativeType::I16 => Value::Int(read::<i16>(address).into()),
        NativeType::U16 => Value::UInt(read::<u16>(address).into()),
        NativeType::I32 => Value::Int(read::<i32>(address).into()),
        NativeType::U32 => Value::UInt(read::<u32>(address).into()),
        NativeType::I64 => Value::Int(read::<i64>(address)),
        NativeType::U64 => Value::UInt(read::<u64>(address)),
        NativeType::Long => Value::Int(read::<c_long>(address) as i64),
        NativeType::ULong => Value::UInt(read::<c_ulong>(address) as u64),
        NativeType::F32 => Value::Float(read::<f32>(address).into()),
        NativeType::F64 => Value::Float(read::<f64>(address)),
        NativeType::Pointer
        | NativeType::String
        | NativeType::BufferIn
        | NativeType::BufferOut
        | NativeType::BufferInOut => Value::Pointer(Address::from(read::<usize>(address))),
        NativeType::Void | NativeType::Varargs | NativeType::LongDouble => {
            return Err(report!(MemoryError::Unsupported(p.to_string())))
        }
    };
    Ok(value)
}

/// Write one value of type `ty`. Integers are truncated to the width of `ty`.
///
/// # Safety
/// `address` must be valid for writes of `ty.size()` bytes
pub unsafe fn write_value(
    ty: &TypeDescriptor,
    address: Address,
    value: &Value,
) -> Result<(), MemoryError> {
    let p = match ty {
        TypeDescriptor::Prim(p) => *p,
        TypeDescriptor::Struct(s) | TypeDescriptor::ByValue(s) => {
            return write_struct(s, address, value)
        }
        TypeDescriptor::Callback(_) => NativeType::Pointer,
    };
    if p.is_integer() || p == NativeType::Bool {
        let v = value
            .as_i64()
            .ok_or_else(|| mismatch(value, &p.to_string()))?;
        match p.size() {
            1 => write(address, v as u8),
            2 => write(address, v as u16),
            4 => write(address, v as u32),
            _ => write(address, v as u64),
        }
        return Ok(());
    }
    match (p, value) {
        (NativeType::F32, Value::Float(v)) => write(address, *v as f32),
        (NativeType::F64, Value::Float(v)) => write(address, *v),
        (NativeType::F32, Value::Int(v)) => write(address, *v as f32),
        (NativeType::F64, Value::Int(v)) => write(address, *v as f64),
        (q, Value::Pointer(a)) if q.is_pointer() => write(address, usize::from(*a)),
        (NativeType::Void | NativeType::Varargs | NativeType::LongDouble, _) => {
            return Err(report!(MemoryError::Unsupported(p.to_string())))
        }
        _ => return Err(mismatch(value, &p.to_string())),
    }
    Ok(())
}

unsafe fn write_struct(class: &StructClass, address: Address, value: &Value) -> Result<(), MemoryError> {
    let src = match value {
        Value::Struct(s) if &s.class == class => s,
        _ => return Err(mismatch(value, &format!("{} {}", class.kind(), class.name()))),
    };
    std::ptr::copy(
        src.address.as_ptr::<u8>() as *const u8,
        address.as_ptr::<u8>(),
        src.layout.size(),
    );
    Ok(())
}

fn mismatch(value: &Value, ty: &str) -> error_stack::Report<MemoryError> {
    report!(MemoryError::TypeMismatch {
        value: value.kind().to_string(),
        ty: ty.to_string(),
    })
}

#[inline]
unsafe fn read<T: Copy>(address: Address) -> T {
    std::ptr::read_unaligned(address.as_ptr::<T>())
}

#[inline]
unsafe fn write<T: Copy>(address: Address, value: T) {
    std::ptr::write_unaligned(address.as_ptr::<T>(), value)
}
