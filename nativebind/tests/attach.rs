mod support;

use nativebind::attach::{AttachError, InvokerError};
use nativebind::library::{Address, LibraryName};
use nativebind::{FunctionDecl, LayoutSpec, LibraryError, Value, VariableDecl};
use support::{scope, FakeInvokerBuilder, FakeLoader};

#[test]
fn function_is_bound_against_the_first_library_that_has_it() {
    let loader = FakeLoader::new()
        .with_library("L1", &[("compute", 0x1000)])
        .with_library("L2", &[("compute", 0x2000)]);
    let (mut scope, _, invokers) = scope(loader, FakeInvokerBuilder::new());
    scope.declare_libraries(["L1", "L2"]).unwrap();
    let f = scope
        .attach_function(FunctionDecl::new("compute", ["int", "pointer"], "int"))
        .unwrap();
    assert_eq!(f.library().display_name(), "L1");
    assert_eq!(f.address(), Address::from(0x1000));
    assert_eq!(invokers.consulted(), vec!["L1"]);
    assert!(scope.function("compute").is_some());
}

#[test]
fn later_library_is_used_when_earlier_lacks_the_symbol() {
    let loader = FakeLoader::new()
        .with_library("L1", &[])
        .with_library("L2", &[("compute", 0x2000)]);
    let (mut scope, _, invokers) = scope(loader, FakeInvokerBuilder::new());
    scope.declare_libraries(["L1", "L2"]).unwrap();
    let f = scope
        .attach_function(FunctionDecl::new("add", ["int", "int"], "int").with_native_name("compute"))
        .unwrap();
    assert_eq!(f.name(), "add");
    assert_eq!(f.symbol(), "compute");
    assert_eq!(f.library().display_name(), "L2");
    assert_eq!(invokers.consulted(), vec!["L1", "L2"]);
    assert_eq!(f.call(&[Value::Int(3), Value::Int(4)]).unwrap(), Value::Int(3));
    assert!(f.call(&[Value::Int(3)]).is_err());
}

#[test]
fn first_load_error_is_reported() {
    let loader = FakeLoader::new()
        .with_library("L1", &[])
        .with_library("L2", &[]);
    let (mut scope, _, _) = scope(loader, FakeInvokerBuilder::new());
    scope.declare_libraries(["L1", "L2"]).unwrap();
    let err = scope
        .attach_function(FunctionDecl::new("missing", Vec::<&str>::new(), "void"))
        .unwrap_err();
    assert!(matches!(err.current_context(), AttachError::Function(n) if n == "missing"));
    match err.downcast_ref::<InvokerError>() {
        Some(InvokerError::NotFound { library, .. }) => assert_eq!(library, "L1"),
        other => panic!("unexpected cause: {:?}", other),
    }
    assert!(scope.binding("missing").is_none());
}

#[test]
fn non_load_error_stops_the_search() {
    let loader = FakeLoader::new()
        .with_library("L1", &[("compute", 0x1000)])
        .with_library("L2", &[("compute", 0x2000)]);
    let (mut scope, _, invokers) = scope(loader, FakeInvokerBuilder::broken_in("L1"));
    scope.declare_libraries(["L1", "L2"]).unwrap();
    let err = scope
        .attach_function(FunctionDecl::new("compute", ["int"], "int"))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<InvokerError>(),
        Some(InvokerError::Other(_))
    ));
    assert_eq!(invokers.consulted(), vec!["L1"]);
}

#[test]
fn unknown_parameter_type() {
    let loader = FakeLoader::new().with_library("L1", &[("f", 0x10)]);
    let (mut scope, _, invokers) = scope(loader, FakeInvokerBuilder::new());
    scope.declare_libraries(["L1"]).unwrap();
    let err = scope
        .attach_function(FunctionDecl::new("f", ["no_such_type"], "void"))
        .unwrap_err();
    assert!(matches!(err.current_context(), AttachError::Type(_)));
    assert!(invokers.consulted().is_empty());
}

#[test]
fn attaching_without_libraries() {
    let (mut scope, _, _) = scope(FakeLoader::new(), FakeInvokerBuilder::new());
    let err = scope
        .attach_function(FunctionDecl::new("f", Vec::<&str>::new(), "void"))
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<LibraryError>().map(|e| e.to_string()),
        Some("no library specified".to_string())
    );
    let err = scope
        .attach_variable(VariableDecl::new("v", "int"))
        .unwrap_err();
    assert!(err.contains::<LibraryError>());
}

#[test]
fn scalar_variable_reads_and_writes_memory() {
    let mut storage = Box::new(41i32);
    let address = &mut *storage as *mut i32 as usize;
    let loader = FakeLoader::new()
        .with_library("L1", &[])
        .with_library("L2", &[("counter", address)]);
    let (mut scope, _, _) = scope(loader, FakeInvokerBuilder::new());
    scope.declare_libraries(["L1", "L2"]).unwrap();
    scope.typedef("int32", "count_t").unwrap();
    let found = scope
        .attach_variable(VariableDecl::new("count", "count_t").with_native_name("counter"))
        .unwrap();
    assert_eq!(found, Address::from(address));

    let var = scope.variable("count").unwrap().clone();
    assert!(var.is_writable());
    assert_eq!(var.get().unwrap(), Value::Int(41));
    var.set(&Value::Int(-5)).unwrap();
    assert_eq!(*storage, -5);
    assert_eq!(var.get().unwrap(), Value::Int(-5));
}

#[test]
fn struct_variable_is_a_view() {
    let mut storage = Box::new([0i32; 2]);
    let address = storage.as_mut_ptr() as usize;
    let loader = FakeLoader::new().with_process_symbols(&[("origin", address)]);
    let (mut scope, _, _) = scope(loader, FakeInvokerBuilder::new());
    scope
        .declare_libraries([LibraryName::CurrentProcess])
        .unwrap();
    scope.declare_struct("point").unwrap();
    scope
        .layout("point", &LayoutSpec::new().field("x", "int").field("y", "int"))
        .unwrap();
    scope
        .attach_variable(VariableDecl::new("origin", "point"))
        .unwrap();

    let var = scope.variable("origin").unwrap();
    assert!(!var.is_writable());
    assert!(var.set(&Value::Int(1)).is_err());
    let Value::Struct(view) = var.get().unwrap() else {
        panic!("not a struct view");
    };
    view.set("y", &Value::Int(9)).unwrap();
    assert_eq!(storage[1], 9);
    assert_eq!(view.get("x").unwrap(), Value::Int(0));
}

#[test]
fn variable_not_found_lists_every_library() {
    let loader = FakeLoader::new()
        .with_library("L1", &[])
        .with_library("L2", &[("other", 0x10)]);
    let (mut scope, _, _) = scope(loader, FakeInvokerBuilder::new());
    scope.declare_libraries(["L1", "L2"]).unwrap();
    let err = scope
        .attach_variable(VariableDecl::new("errno_value", "int"))
        .unwrap_err();
    match err.current_context() {
        AttachError::NotFound { name, libraries } => {
            assert_eq!(name, "errno_value");
            assert_eq!(libraries, &vec!["L1".to_string(), "L2".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn invoker_builder_sees_enums_of_parent_scopes() {
    let loader = FakeLoader::new().with_library("L1", &[("open_file", 0x1000)]);
    let (mut parent, _, invokers) = scope(loader, FakeInvokerBuilder::new());
    parent.enumeration(Some("mode"), ["read".into(), "write".into()]);
    let parent = parent.freeze();

    let mut child = nativebind::Scope::nested("child", parent);
    child.enumeration(None, [("write", 7).into(), "append".into()]);
    child.declare_libraries(["L1"]).unwrap();
    child
        .attach_function(FunctionDecl::new("open_file", ["pointer", "mode"], "int"))
        .unwrap();

    let enums = invokers.enums();
    assert_eq!(enums.get("read"), Some(&0));
    assert_eq!(enums.get("write"), Some(&7));
    assert_eq!(enums.get("append"), Some(&8));
    assert_eq!(child.enum_value("write"), Some(7));
}
