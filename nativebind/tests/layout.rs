//! Layout computation through a scope, and layout invariants for random field lists

use nativebind::layout::{FieldType, LayoutError, LayoutSpec};
use nativebind::types::{NativeType, TypeRef};
use nativebind::{DeclArg, Declaration, Scope};
use proptest::prelude::*;

#[test]
fn struct_with_padding() {
    let mut scope = Scope::new("test");
    scope.declare_struct("s").unwrap();
    let layout = scope
        .layout(
            "s",
            &LayoutSpec::new()
                .field("a", "int32")
                .field("b", "int8")
                .field("c", "int32"),
        )
        .unwrap();
    assert_eq!(layout.offsets(), vec![("a", 0), ("b", 4), ("c", 8)]);
    assert_eq!(layout.size(), 12);
    assert_eq!(layout.alignment(), 4);
}

#[test]
fn union_of_int_and_byte_array() {
    let mut scope = Scope::new("test");
    scope.declare_union("u").unwrap();
    let layout = scope
        .layout("u", &LayoutSpec::new().field("x", "int32").array("y", "int8", 6))
        .unwrap();
    assert_eq!(layout.offsets(), vec![("x", 0), ("y", 0)]);
    assert_eq!(layout.size(), 8);
    assert_eq!(layout.alignment(), 4);
}

#[test]
fn layout_is_computed_once() {
    let mut scope = Scope::new("test");
    let class = scope.declare_struct("s").unwrap();
    let first = scope
        .layout("s", &LayoutSpec::new().field("a", "int64"))
        .unwrap();
    let err = scope
        .layout("s", &LayoutSpec::new().field("a", "int8"))
        .unwrap_err();
    assert!(matches!(err.current_context(), LayoutError::AlreadyComputed(_)));
    let again = class.layout().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &again));
}

#[test]
fn keyed_and_ordered_agree() {
    let mut scope = Scope::new("test");
    scope.declare_struct("ordered").unwrap();
    scope.declare_struct("keyed").unwrap();
    let ordered = scope
        .layout(
            "ordered",
            &LayoutSpec::new()
                .field("tag", "uchar")
                .field("value", "double")
                .array("name", "char", 5),
        )
        .unwrap();
    let keyed = scope
        .layout(
            "keyed",
            &LayoutSpec::keyed([
                ("tag", FieldType::from("uchar")),
                ("value", FieldType::from("double")),
                ("name", FieldType::Array("char".into(), 5)),
            ]),
        )
        .unwrap();
    assert_eq!(ordered.offsets(), keyed.offsets());
    assert_eq!(ordered.size(), keyed.size());
    assert_eq!(keyed.size(), 24);
}

#[test]
fn nested_struct_and_struct_arrays() {
    let mut scope = Scope::new("test");
    scope.declare_struct("pair").unwrap();
    scope
        .layout("pair", &LayoutSpec::new().field("a", "short").field("b", "char"))
        .unwrap();
    scope.declare_struct("outer").unwrap();
    let layout = scope
        .layout(
            "outer",
            &LayoutSpec::new()
                .field("c", "char")
                .field("p", "pair")
                .array("ps", "pair", 3)
                .field("ptr", "pointer"),
        )
        .unwrap();
    // pair is 4 bytes aligned to 2
    assert_eq!(layout.offset_of("p"), Some(2));
    assert_eq!(layout.offset_of("ps"), Some(6));
    let ptr = NativeType::Pointer;
    let ptr_offset = (18usize).div_ceil(ptr.alignment()) * ptr.alignment();
    assert_eq!(layout.offset_of("ptr"), Some(ptr_offset));
    assert_eq!(layout.field("ptr").unwrap().size, ptr.size());
}

#[test]
fn size_floor_and_explicit_offsets() {
    let mut scope = Scope::new("test");
    scope.declare_struct("s").unwrap();
    scope.set_size("s", 32).unwrap();
    let layout = scope
        .layout(
            "s",
            &LayoutSpec::new()
                .field("a", "int32")
                .field_at("b", "int16", 2)
                .field_at("c", "int8", 20),
        )
        .unwrap();
    assert_eq!(layout.offsets(), vec![("a", 0), ("b", 2), ("c", 20)]);
    assert_eq!(layout.size(), 32);
}

#[test]
fn explicit_offset_far_past_the_cursor_grows_the_size() {
    let mut scope = Scope::new("test");
    scope.declare_struct("s").unwrap();
    let layout = scope
        .layout(
            "s",
            &LayoutSpec::new()
                .field("a", "int8")
                .field_at("b", "int64", 4096),
        )
        .unwrap();
    assert_eq!(layout.offset_of("b"), Some(4096));
    assert_eq!(layout.size(), 4104);
    assert_eq!(layout.alignment(), 8);
}

#[test]
fn huge_explicit_offset_is_an_overflow() {
    let mut scope = Scope::new("test");
    let class = scope.declare_struct("s").unwrap();
    let err = scope
        .layout("s", &LayoutSpec::new().field_at("a", "int32", usize::MAX - 1))
        .unwrap_err();
    assert!(matches!(err.current_context(), LayoutError::Overflow(n) if n == "a"));
    assert!(class.layout().is_none());
}

#[test]
fn huge_arrays_overflow_through_declarations() {
    let count = i64::MAX;
    let array = |n: &str| {
        vec![
            DeclArg::from(n),
            DeclArg::List(vec![DeclArg::from("uint8"), DeclArg::Int(count)]),
        ]
    };
    let fields = [array("a"), array("b"), array("c")].concat();
    let decl = Declaration::parse(
        "struct",
        &[DeclArg::from("s"), DeclArg::List(fields)],
    )
    .unwrap();
    let mut scope = Scope::new("test");
    let err = scope.declare(decl).unwrap_err();
    assert!(err.contains::<LayoutError>());
    let overflow = err
        .frames()
        .find_map(|f| f.downcast_ref::<LayoutError>())
        .unwrap();
    assert!(matches!(overflow, LayoutError::Overflow(n) if n == "c"));
    assert!(scope.struct_class("s").unwrap().layout().is_none());
}

#[test]
fn by_value_does_not_need_a_layout() {
    let mut scope = Scope::new("test");
    let class = scope.declare_struct("later").unwrap();
    let ty = scope.find_type(TypeRef::by_value("later")).unwrap();
    assert_eq!(ty, class.by_value());
    assert!(class.layout().is_none());
}

const PRIMITIVES: &[&str] = &[
    "char", "uchar", "short", "int", "long", "long_long", "float", "double", "pointer", "bool",
];

fn field_strategy() -> impl Strategy<Value = (usize, Option<usize>, Option<usize>)> {
    (
        0..PRIMITIVES.len(),
        proptest::option::weighted(0.2, 0usize..64),
        proptest::option::weighted(0.2, 1usize..8),
    )
}

fn build(is_union: bool, fields: &[(usize, Option<usize>, Option<usize>)]) -> nativebind::StructClass {
    let mut scope = Scope::new("prop");
    let class = if is_union {
        scope.declare_union("t").unwrap()
    } else {
        scope.declare_struct("t").unwrap()
    };
    let mut spec = LayoutSpec::new();
    for (i, (ty, offset, count)) in fields.iter().enumerate() {
        let name = format!("f{}", i);
        let ty = PRIMITIVES[*ty];
        spec = match (offset, count) {
            (_, Some(count)) => spec.array(name, ty, *count),
            (Some(offset), None) => spec.field_at(name, ty, *offset),
            (None, None) => spec.field(name, ty),
        };
    }
    scope.layout("t", &spec).unwrap();
    class
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_fields_fit_and_size_is_aligned(
        is_union in any::<bool>(),
        fields in proptest::collection::vec(field_strategy(), 0..12),
    ) {
        let class = build(is_union, &fields);
        let layout = class.layout().unwrap();
        prop_assert!(layout.alignment() >= 1);
        prop_assert_eq!(layout.size() % layout.alignment(), 0);
        let max_align = layout.fields().iter().map(|f| f.alignment).max().unwrap_or(1);
        prop_assert_eq!(layout.alignment(), max_align);
        for f in layout.fields() {
            prop_assert!(f.offset + f.size <= layout.size(), "{} overflows", f.name);
        }
    }

    #[test]
    fn prop_implicit_offsets_are_aligned(
        fields in proptest::collection::vec(field_strategy(), 1..12),
    ) {
        let class = build(false, &fields);
        let layout = class.layout().unwrap();
        for (f, (_, offset, count)) in layout.fields().iter().zip(&fields) {
            if offset.is_none() || count.is_some() {
                prop_assert_eq!(f.offset % f.alignment, 0);
            }
        }
    }

    #[test]
    fn prop_union_fields_start_at_zero(
        fields in proptest::collection::vec(field_strategy(), 1..12),
    ) {
        let class = build(true, &fields);
        let layout = class.layout().unwrap();
        prop_assert!(layout.fields().iter().all(|f| f.offset == 0));
        let largest = layout.fields().iter().map(|f| f.size).max().unwrap_or(0);
        prop_assert!(layout.size() >= largest);
        prop_assert!(layout.size() < largest + layout.alignment());
    }
}
