use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use error_stack::{report, Result, ResultExt};

use crate::types::{Resolver, TypeDescriptor};

use super::{FieldType, LayoutError, LayoutSpec, StructLayout, StructLayoutBuilder};

/// A user-declared struct or union
///
/// Cloning gives another handle to the same definition. The layout is
/// computed at most once; before that, only a size floor may be set.
#[derive(Debug, Clone)]
pub struct StructClass(Arc<StructDef>);

#[derive(Debug)]
struct StructDef {
    name: String,
    is_union: bool,
    state: Mutex<LayoutState>,
}

#[derive(Debug, Clone)]
enum LayoutState {
    Unset,
    /// Minimum size from `set_size`
    SizeFloor(usize),
    Computed(Arc<StructLayout>),
}

impl StructClass {
    pub fn new_struct(name: impl Into<String>) -> Self {
        Self::new(name.into(), false)
    }

    pub fn new_union(name: impl Into<String>) -> Self {
        Self::new(name.into(), true)
    }

    fn new(name: String, is_union: bool) -> Self {
        Self(Arc::new(StructDef {
            name,
            is_union,
            state: Mutex::new(LayoutState::Unset),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_union(&self) -> bool {
        self.0.is_union
    }

    pub fn kind(&self) -> &'static str {
        if self.is_union() {
            "union"
        } else {
            "struct"
        }
    }

    fn state(&self) -> MutexGuard<'_, LayoutState> {
        // state is only ever replaced whole, a poisoned lock still holds a valid value
        self.0.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The computed layout, if `define` has succeeded
    pub fn layout(&self) -> Option<Arc<StructLayout>> {
        match &*self.state() {
            LayoutState::Computed(layout) => Some(layout.clone()),
            _ => None,
        }
    }

    pub fn has_layout(&self) -> bool {
        self.layout().is_some()
    }

    /// Set a minimum size. Only allowed once, and only before the layout is computed.
    pub fn set_size(&self, size: usize) -> Result<(), LayoutError> {
        let mut state = self.state();
        match &*state {
            LayoutState::Unset => {
                log::debug!("Size floor of {} `{}` set to {}", self.kind(), self.name(), size);
                *state = LayoutState::SizeFloor(size);
                Ok(())
            }
            _ => Err(report!(LayoutError::SizeAlreadySet))
                .attach_printable_lazy(|| format!("{} `{}`", self.kind(), self.name())),
        }
    }

    /// Compute the layout from a field specification
    ///
    /// Field types resolve with `resolver`, where struct definitions are
    /// embedded inline. Fails if the layout was already computed, leaving
    /// the existing layout in place.
    pub fn define(
        &self,
        spec: &LayoutSpec,
        resolver: &Resolver,
    ) -> Result<Arc<StructLayout>, LayoutError> {
        let min_size = match &*self.state() {
            LayoutState::Computed(_) => {
                return Err(report!(LayoutError::AlreadyComputed(self.name().to_string())))
            }
            LayoutState::SizeFloor(size) => *size,
            LayoutState::Unset => 0,
        };
        // the lock is not held while resolving, a field may refer to this class
        let layout = self
            .build_layout(spec, resolver, min_size)
            .attach_printable_lazy(|| format!("While defining {} `{}`", self.kind(), self.name()))?;
        let layout = Arc::new(layout);

        let mut state = self.state();
        match &*state {
            LayoutState::Computed(_) => {
                return Err(report!(LayoutError::AlreadyComputed(self.name().to_string())))
            }
            LayoutState::SizeFloor(size) if *size > min_size => {
                return Err(report!(LayoutError::SizeAlreadySet)).attach_printable(
                    "Size floor changed while the layout was being computed",
                )
            }
            _ => {}
        }
        log::debug!(
            "Defined {} `{}`: size={}, align={}, fields={}",
            self.kind(),
            self.name(),
            layout.size(),
            layout.alignment(),
            layout.fields().len()
        );
        *state = LayoutState::Computed(layout.clone());
        Ok(layout)
    }

    fn build_layout(
        &self,
        spec: &LayoutSpec,
        resolver: &Resolver,
        min_size: usize,
    ) -> Result<StructLayout, LayoutError> {
        let mut builder = StructLayoutBuilder::new(self.is_union());
        builder.set_min_size(min_size);
        let mut seen = BTreeSet::new();
        for field in spec.fields() {
            if !seen.insert(field.name.clone()) {
                return Err(report!(LayoutError::Argument(format!(
                    "duplicate field `{}`",
                    field.name
                ))));
            }
            match &field.ty {
                FieldType::Type(ty) => {
                    let desc = resolver
                        .resolve_inline(ty)
                        .change_context_lazy(|| LayoutError::FieldType(field.name.clone()))?;
                    builder.add_field(field.name, desc, field.offset)?;
                }
                FieldType::Array(ty, count) => {
                    let desc = resolver
                        .resolve_inline(ty)
                        .change_context_lazy(|| LayoutError::FieldType(field.name.clone()))?;
                    builder.add_array(field.name, desc, *count, field.offset)?;
                }
            }
        }
        builder.build()
    }

    /// Size in bytes: the layout size, else the size floor, else 0
    pub fn size(&self) -> usize {
        match &*self.state() {
            LayoutState::Computed(layout) => layout.size(),
            LayoutState::SizeFloor(size) => *size,
            LayoutState::Unset => 0,
        }
    }

    /// Alignment in bytes, 1 if there is no layout yet
    pub fn alignment(&self) -> usize {
        self.layout().map(|l| l.alignment()).unwrap_or(1)
    }

    pub fn members(&self) -> Vec<String> {
        self.layout()
            .map(|l| l.members().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn offsets(&self) -> Vec<(String, usize)> {
        self.layout()
            .map(|l| {
                l.offsets()
                    .into_iter()
                    .map(|(n, o)| (n.to_string(), o))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn offset_of(&self, field: &str) -> Option<usize> {
        self.layout().and_then(|l| l.offset_of(field))
    }

    /// Descriptor for passing this struct by value
    pub fn by_value(&self) -> TypeDescriptor {
        TypeDescriptor::ByValue(self.clone())
    }
}

impl PartialEq for StructClass {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for StructClass {}
