use crate::layout::StructClass;
use crate::types::{NativeType, TypeDescriptor, TypeRef};

/// Type of a field as declared
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A single value. Struct definitions are embedded inline.
    Type(TypeRef),
    /// Fixed-length array of `count` elements
    Array(TypeRef, usize),
}

macro_rules! field_type_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldType {
                fn from(ty: $t) -> Self {
                    Self::Type(ty.into())
                }
            }
        )*
    };
}

field_type_from!(&str, String, TypeRef, TypeDescriptor, NativeType, StructClass);

/// A declared field, optionally pinned to an offset
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub offset: Option<usize>,
}

/// Field specification of a struct or union
///
/// `Ordered` is a sequence of fields, each of which may carry an explicit
/// offset. `Keyed` maps names to types in declaration order and never
/// carries offsets.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutSpec {
    Ordered(Vec<FieldSpec>),
    Keyed(Vec<(String, FieldType)>),
}

impl LayoutSpec {
    /// An empty ordered specification
    pub fn new() -> Self {
        Self::Ordered(Vec::new())
    }

    pub fn keyed<N: Into<String>, T: Into<FieldType>>(
        fields: impl IntoIterator<Item = (N, T)>,
    ) -> Self {
        Self::Keyed(
            fields
                .into_iter()
                .map(|(n, t)| (n.into(), t.into()))
                .collect(),
        )
    }

    pub fn field(self, name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        self.push(name.into(), ty.into(), None)
    }

    pub fn field_at(
        self,
        name: impl Into<String>,
        ty: impl Into<FieldType>,
        offset: usize,
    ) -> Self {
        self.push(name.into(), ty.into(), Some(offset))
    }

    pub fn array(self, name: impl Into<String>, element: impl Into<TypeRef>, count: usize) -> Self {
        self.push(name.into(), FieldType::Array(element.into(), count), None)
    }

    fn push(self, name: String, ty: FieldType, offset: Option<usize>) -> Self {
        match self {
            Self::Ordered(mut fields) => {
                fields.push(FieldSpec { name, ty, offset });
                Self::Ordered(fields)
            }
            Self::Keyed(mut fields) => {
                // keyed layouts have no offsets, turn into ordered to keep the offset
                if offset.is_some() {
                    let mut fields: Vec<FieldSpec> = fields
                        .into_iter()
                        .map(|(name, ty)| FieldSpec {
                            name,
                            ty,
                            offset: None,
                        })
                        .collect();
                    fields.push(FieldSpec { name, ty, offset });
                    return Self::Ordered(fields);
                }
                fields.push((name, ty));
                Self::Keyed(fields)
            }
        }
    }

    /// Fields in declaration order
    pub fn fields(&self) -> Vec<FieldSpec> {
        match self {
            Self::Ordered(fields) => fields.clone(),
            Self::Keyed(fields) => fields
                .iter()
                .map(|(name, ty)| FieldSpec {
                    name: name.clone(),
                    ty: ty.clone(),
                    offset: None,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Ordered(fields) => fields.len(),
            Self::Keyed(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_order_and_offsets() {
        let spec = LayoutSpec::new()
            .field("a", "int32")
            .field_at("b", "int8", 6)
            .array("c", "uint8", 3);
        let fields = spec.fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].offset, Some(6));
        assert_eq!(fields[2].ty, FieldType::Array("uint8".into(), 3));
    }

    #[test]
    fn keyed_has_no_offsets() {
        let spec = LayoutSpec::keyed([("x", "int32"), ("y", "double")]);
        assert!(spec.fields().iter().all(|f| f.offset.is_none()));
        assert_eq!(spec.fields()[1].name, "y");
    }
}
