use std::ffi::{c_long, c_ulong, c_void};
use std::mem::{align_of, size_of};

/// Primitive native types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum NativeType {
    #[default]
    /// Empty, void
    Void,
    /// C `bool`
    Bool,
    /// Signed, 8-bit
    I8,
    /// Unsigned, 8-bit
    U8,
    /// Signed, 16-bit
    I16,
    /// Unsigned, 16-bit
    U16,
    /// Signed, 32-bit
    I32,
    /// Unsigned, 32-bit
    U32,
    /// Signed, 64-bit
    I64,
    /// Unsigned, 64-bit
    U64,
    /// C `long`, width depends on the platform
    Long,
    /// C `unsigned long`, width depends on the platform
    ULong,
    /// Floating point, 32-bit
    F32,
    /// Floating point, 64-bit
    F64,
    /// C `long double`
    LongDouble,
    /// Untyped pointer
    Pointer,
    /// Pointer to a NUL-terminated string
    String,
    /// Pointer to a buffer only read by native code
    BufferIn,
    /// Pointer to a buffer only written by native code
    BufferOut,
    /// Pointer to a buffer read and written by native code
    BufferInOut,
    /// Marker for variadic arguments
    Varargs,
}

/// (size, alignment) of `long double` on the host
const LONG_DOUBLE: (usize, usize) = if cfg!(windows)
    || cfg!(all(target_vendor = "apple", target_arch = "aarch64"))
{
    (8, 8)
} else if cfg!(target_arch = "x86") {
    (12, 4)
} else {
    (16, 16)
};

impl NativeType {
    /// Get the size of type in bytes. Void and varargs have no storage.
    pub fn size(&self) -> usize {
        match self {
            Self::Void | Self::Varargs => 0,
            Self::Bool => size_of::<bool>(),
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 => 8,
            Self::Long | Self::ULong => size_of::<c_long>(),
            Self::F64 => size_of::<f64>(),
            Self::LongDouble => LONG_DOUBLE.0,
            Self::Pointer | Self::String | Self::BufferIn | Self::BufferOut | Self::BufferInOut => {
                size_of::<*const c_void>()
            }
        }
    }

    /// Get the natural alignment of the type in bytes, at least 1
    pub fn alignment(&self) -> usize {
        match self {
            Self::Void | Self::Varargs => 1,
            Self::Bool => align_of::<bool>(),
            Self::I8 | Self::U8 => align_of::<i8>(),
            Self::I16 | Self::U16 => align_of::<i16>(),
            Self::I32 | Self::U32 => align_of::<i32>(),
            Self::I64 | Self::U64 => align_of::<i64>(),
            Self::Long => align_of::<c_long>(),
            Self::ULong => align_of::<c_ulong>(),
            Self::F32 => align_of::<f32>(),
            Self::F64 => align_of::<f64>(),
            Self::LongDouble => LONG_DOUBLE.1,
            Self::Pointer | Self::String | Self::BufferIn | Self::BufferOut | Self::BufferInOut => {
                align_of::<*const c_void>()
            }
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::U8
                | Self::I16
                | Self::U16
                | Self::I32
                | Self::U32
                | Self::I64
                | Self::U64
                | Self::Long
                | Self::ULong
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::Long
        )
    }

    /// Types that are passed as an address
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            Self::Pointer | Self::String | Self::BufferIn | Self::BufferOut | Self::BufferInOut
        )
    }

    /// The integer type with the same width as a native pointer
    pub fn size_type(signed: bool) -> Self {
        match (size_of::<usize>(), signed) {
            (8, true) => Self::I64,
            (8, false) => Self::U64,
            (_, true) => Self::I32,
            (_, false) => Self::U32,
        }
    }
}

impl std::fmt::Display for NativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NativeType::Void => write!(f, "void"),
            NativeType::Bool => write!(f, "bool"),
            NativeType::I8 => write!(f, "int8"),
            NativeType::U8 => write!(f, "uint8"),
            NativeType::I16 => write!(f, "int16"),
            NativeType::U16 => write!(f, "uint16"),
            NativeType::I32 => write!(f, "int32"),
            NativeType::U32 => write!(f, "uint32"),
            NativeType::I64 => write!(f, "int64"),
            NativeType::U64 => write!(f, "uint64"),
            NativeType::Long => write!(f, "long"),
            NativeType::ULong => write!(f, "ulong"),
            NativeType::F32 => write!(f, "float32"),
            NativeType::F64 => write!(f, "float64"),
            NativeType::LongDouble => write!(f, "long_double"),
            NativeType::Pointer => write!(f, "pointer"),
            NativeType::String => write!(f, "string"),
            NativeType::BufferIn => write!(f, "buffer_in"),
            NativeType::BufferOut => write!(f, "buffer_out"),
            NativeType::BufferInOut => write!(f, "buffer_inout"),
            NativeType::Varargs => write!(f, "varargs"),
        }
    }
}
