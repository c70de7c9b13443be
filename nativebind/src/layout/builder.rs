use error_stack::{report, Result, ResultExt};

use crate::types::TypeDescriptor;

use super::{LayoutError, StructClass};

/// What a field holds
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar(TypeDescriptor),
    /// Struct or union embedded inline
    Struct(StructClass),
    Array {
        element: TypeDescriptor,
        count: usize,
    },
}

/// A placed field
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub kind: FieldKind,
    pub offset: usize,
    pub size: usize,
    pub alignment: usize,
}

/// Computed memory layout of a struct or union
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    fields: Vec<StructField>,
    size: usize,
    alignment: usize,
    is_union: bool,
}

impl StructLayout {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn is_union(&self) -> bool {
        self.is_union
    }

    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn members(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn offsets(&self) -> Vec<(&str, usize)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.offset))
            .collect()
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.field(name).map(|f| f.offset)
    }
}

/// Places fields one at a time
///
/// Struct fields without an explicit offset go at the next offset that
/// satisfies their alignment. Explicit offsets are taken as given, even if
/// they overlap earlier fields. Union fields all go at offset 0.
#[derive(Debug)]
pub struct StructLayoutBuilder {
    is_union: bool,
    fields: Vec<StructField>,
    cursor: usize,
    extent: usize,
    alignment: usize,
    min_size: usize,
}

impl StructLayoutBuilder {
    pub fn new(is_union: bool) -> Self {
        Self {
            is_union,
            fields: Vec::new(),
            cursor: 0,
            extent: 0,
            alignment: 1,
            min_size: 0,
        }
    }

    /// The final size will be at least this
    pub fn set_min_size(&mut self, size: usize) {
        self.min_size = size;
    }

    /// Add a field of a resolved type. Struct descriptors are embedded inline.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        ty: TypeDescriptor,
        offset: Option<usize>,
    ) -> Result<(), LayoutError> {
        if let Some(s) = ty.as_struct() {
            return self.add_struct(name, s.clone(), offset);
        }
        let (size, alignment) = (ty.size(), ty.alignment());
        self.place(name.into(), FieldKind::Scalar(ty), size, alignment, offset)
    }

    /// Embed a struct or union, which must already have its layout
    pub fn add_struct(
        &mut self,
        name: impl Into<String>,
        class: StructClass,
        offset: Option<usize>,
    ) -> Result<(), LayoutError> {
        let name = name.into();
        let (size, alignment) = embedded_size(&class, &name)?;
        self.place(name, FieldKind::Struct(class), size, alignment, offset)
    }

    pub fn add_array(
        &mut self,
        name: impl Into<String>,
        element: TypeDescriptor,
        count: usize,
        offset: Option<usize>,
    ) -> Result<(), LayoutError> {
        let name = name.into();
        let (elem_size, alignment) = match element.as_struct() {
            Some(s) => embedded_size(s, &name)?,
            None => (element.size(), element.alignment()),
        };
        let size = elem_size
            .checked_mul(count)
            .ok_or_else(|| report!(LayoutError::Overflow(name.clone())))?;
        self.place(
            name,
            FieldKind::Array { element, count },
            size,
            alignment,
            offset,
        )
    }

    fn place(
        &mut self,
        name: String,
        kind: FieldKind,
        size: usize,
        alignment: usize,
        offset: Option<usize>,
    ) -> Result<(), LayoutError> {
        let alignment = alignment.max(1);
        let offset = match (self.is_union, offset) {
            (true, _) => 0,
            (false, Some(offset)) => offset,
            (false, None) => align_up(self.cursor, alignment)
                .ok_or_else(|| report!(LayoutError::Overflow(name.clone())))?,
        };
        let end = offset
            .checked_add(size)
            .ok_or_else(|| report!(LayoutError::Overflow(name.clone())))
            .attach_printable_lazy(|| format!("offset=0x{:x}, size=0x{:x}", offset, size))?;
        #[cfg(feature = "debug-layout")]
        {
            println!(
                "place `{}`: cursor=0x{:x}, offset=0x{:x}, size=0x{:x}, align={}",
                name, self.cursor, offset, size, alignment
            );
        }
        self.cursor = end;
        self.extent = self.extent.max(end);
        self.alignment = self.alignment.max(alignment);
        self.fields.push(StructField {
            name,
            kind,
            offset,
            size,
            alignment,
        });
        Ok(())
    }

    /// Fails if rounding the size up to the alignment overflows
    pub fn build(self) -> Result<StructLayout, LayoutError> {
        let size = align_up(self.extent.max(self.min_size), self.alignment).ok_or_else(|| {
            report!(LayoutError::Overflow(
                self.fields
                    .last()
                    .map(|f| f.name.clone())
                    .unwrap_or_default()
            ))
        })?;
        Ok(StructLayout {
            fields: self.fields,
            size,
            alignment: self.alignment,
            is_union: self.is_union,
        })
    }
}

fn embedded_size(class: &StructClass, field: &str) -> Result<(usize, usize), LayoutError> {
    match class.layout() {
        Some(layout) => Ok((layout.size(), layout.alignment())),
        None => Err(report!(LayoutError::Incomplete(class.name().to_string())))
            .attach_printable_lazy(|| format!("While placing field `{}`", field)),
    }
}

#[inline]
pub(crate) fn align_up(value: usize, alignment: usize) -> Option<usize> {
    value.div_ceil(alignment).checked_mul(alignment)
}
