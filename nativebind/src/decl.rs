//! Declarations as loosely typed argument lists
//!
//! A declaration is a kind (`typedef`, `struct`, `function`, ...) and a list
//! of positional arguments. This is how declarations arrive from outside the
//! program, for example from a manifest file. Shapes are checked when
//! parsing, before anything is resolved.

use std::sync::Arc;

use error_stack::{report, Result, ResultExt};

use crate::attach::{FunctionBinding, FunctionDecl, VariableDecl};
use crate::layout::{FieldSpec, FieldType, LayoutSpec, StructClass};
use crate::library::{Address, LibraryName};
use crate::scope::Scope;
use crate::types::{Convention, Enum, EnumItem, TypeDescriptor, TypeRef};

/// Keyword for the hosting process in a library list
pub const CURRENT_PROCESS_KEYWORD: &str = "current_process";

#[derive(Debug, thiserror::Error)]
pub enum DeclError {
    #[error("Invalid declaration: {0}")]
    Argument(String),
    #[error("Failed to declare {0}")]
    Declaration(String),
}

/// One positional argument
#[derive(Debug, Clone, PartialEq)]
pub enum DeclArg {
    Symbol(String),
    Int(i64),
    List(Vec<DeclArg>),
    /// Key-value pairs in insertion order
    Map(Vec<(String, DeclArg)>),
}

impl DeclArg {
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            DeclArg::Symbol(s) => Some(s),
            _ => None,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            DeclArg::Symbol(_) => "a name",
            DeclArg::Int(_) => "an integer",
            DeclArg::List(_) => "a list",
            DeclArg::Map(_) => "a map",
        }
    }
}

impl From<&str> for DeclArg {
    fn from(s: &str) -> Self {
        DeclArg::Symbol(s.to_string())
    }
}

impl From<String> for DeclArg {
    fn from(s: String) -> Self {
        DeclArg::Symbol(s)
    }
}

impl From<i64> for DeclArg {
    fn from(v: i64) -> Self {
        DeclArg::Int(v)
    }
}

impl From<Vec<DeclArg>> for DeclArg {
    fn from(v: Vec<DeclArg>) -> Self {
        DeclArg::List(v)
    }
}

/// A parsed declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Libraries(Vec<LibraryName>),
    Convention(Convention),
    Typedef {
        existing: TypeRef,
        alias: String,
    },
    Enum {
        name: Option<String>,
        items: Vec<EnumItem>,
    },
    Callback {
        name: Option<String>,
        params: Vec<TypeRef>,
        ret: TypeRef,
    },
    Struct {
        name: String,
        layout: Option<LayoutSpec>,
    },
    Union {
        name: String,
        layout: Option<LayoutSpec>,
    },
    Size {
        name: String,
        size: usize,
    },
    Function(FunctionDecl),
    Variable(VariableDecl),
}

/// What a declaration produced
#[derive(Debug, Clone)]
pub enum Declared {
    Libraries(Vec<String>),
    Convention(Convention),
    Type(TypeDescriptor),
    Enum(Arc<Enum>),
    Struct(StructClass),
    Function(Arc<FunctionBinding>),
    Variable(Address),
}

impl Declaration {
    pub fn parse(kind: &str, args: &[DeclArg]) -> Result<Self, DeclError> {
        let decl = match kind {
            "library" => parse_libraries(args)?,
            "convention" => {
                check_arity(kind, args, 1, 1)?;
                let name = symbol(&args[0])?;
                let convention = name
                    .parse::<Convention>()
                    .map_err(|e| report!(DeclError::Argument(e)))?;
                Declaration::Convention(convention)
            }
            "typedef" => {
                check_arity(kind, args, 2, 2)?;
                Declaration::Typedef {
                    existing: type_ref(&args[0])?,
                    alias: symbol(&args[1])?.to_string(),
                }
            }
            "enum" => parse_enum(args)?,
            "callback" => {
                check_arity(kind, args, 2, 3)?;
                let (name, rest) = match args.len() {
                    3 => (Some(symbol(&args[0])?.to_string()), &args[1..]),
                    _ => (None, args),
                };
                Declaration::Callback {
                    name,
                    params: type_list(&rest[0])?,
                    ret: type_ref(&rest[1])?,
                }
            }
            "struct" | "union" => {
                check_arity(kind, args, 1, 2)?;
                let name = symbol(&args[0])?.to_string();
                let layout = args.get(1).map(parse_layout).transpose()?;
                if kind == "struct" {
                    Declaration::Struct { name, layout }
                } else {
                    Declaration::Union { name, layout }
                }
            }
            "size" => {
                check_arity(kind, args, 2, 2)?;
                Declaration::Size {
                    name: symbol(&args[0])?.to_string(),
                    size: non_negative(&args[1])?,
                }
            }
            "function" => {
                check_arity(kind, args, 3, 4)?;
                let name = symbol(&args[0])?;
                let (native, rest) = match args.len() {
                    4 => (Some(symbol(&args[1])?), &args[2..]),
                    _ => (None, &args[1..]),
                };
                let mut decl = FunctionDecl::new(name, type_list(&rest[0])?, type_ref(&rest[1])?);
                decl.native_name = native.map(str::to_string);
                Declaration::Function(decl)
            }
            "variable" => {
                check_arity(kind, args, 2, 3)?;
                let name = symbol(&args[0])?;
                let (native, ty) = match args.len() {
                    3 => (Some(symbol(&args[1])?), &args[2]),
                    _ => (None, &args[1]),
                };
                let mut decl = VariableDecl::new(name, type_ref(ty)?);
                decl.native_name = native.map(str::to_string);
                Declaration::Variable(decl)
            }
            _ => {
                return Err(report!(DeclError::Argument(format!(
                    "unknown declaration kind `{}`",
                    kind
                ))))
            }
        };
        Ok(decl)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Declaration::Libraries(_) => "library",
            Declaration::Convention(_) => "convention",
            Declaration::Typedef { .. } => "typedef",
            Declaration::Enum { .. } => "enum",
            Declaration::Callback { .. } => "callback",
            Declaration::Struct { .. } => "struct",
            Declaration::Union { .. } => "union",
            Declaration::Size { .. } => "size",
            Declaration::Function(_) => "function",
            Declaration::Variable(_) => "variable",
        }
    }

    /// Name the declaration introduces, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Libraries(_) | Declaration::Convention(_) => None,
            Declaration::Typedef { alias, .. } => Some(alias),
            Declaration::Enum { name, .. } | Declaration::Callback { name, .. } => name.as_deref(),
            Declaration::Struct { name, .. }
            | Declaration::Union { name, .. }
            | Declaration::Size { name, .. } => Some(name),
            Declaration::Function(f) => Some(&f.name),
            Declaration::Variable(v) => Some(&v.name),
        }
    }
}

impl Scope {
    /// Apply a parsed declaration to this scope
    pub fn declare(&mut self, decl: Declaration) -> Result<Declared, DeclError> {
        let what = match decl.name() {
            Some(name) => format!("{} `{}`", decl.kind(), name),
            None => decl.kind().to_string(),
        };
        let ctx = || DeclError::Declaration(what.clone());
        let declared = match decl {
            Declaration::Libraries(names) => {
                let set = self.declare_libraries(names).change_context_lazy(ctx)?;
                Declared::Libraries(set.names())
            }
            Declaration::Convention(convention) => {
                self.set_convention(convention);
                Declared::Convention(convention)
            }
            Declaration::Typedef { existing, alias } => {
                Declared::Type(self.typedef(existing, alias).change_context_lazy(ctx)?)
            }
            Declaration::Enum { name, items } => {
                Declared::Enum(self.enumeration(name.as_deref(), items))
            }
            Declaration::Callback { name, params, ret } => Declared::Type(
                self.callback(name.as_deref(), params, ret)
                    .change_context_lazy(ctx)?,
            ),
            Declaration::Struct { name, layout } => {
                let class = self.declare_struct(&name).change_context_lazy(ctx)?;
                self.define_declared(class, layout)
                    .change_context_lazy(ctx)?
            }
            Declaration::Union { name, layout } => {
                let class = self.declare_union(&name).change_context_lazy(ctx)?;
                self.define_declared(class, layout)
                    .change_context_lazy(ctx)?
            }
            Declaration::Size { name, size } => {
                let class = match self.registry().struct_class(&name) {
                    Some(class) => class.clone(),
                    None => self.declare_struct(&name).change_context_lazy(ctx)?,
                };
                class.set_size(size).change_context_lazy(ctx)?;
                Declared::Struct(class)
            }
            Declaration::Function(f) => {
                Declared::Function(self.attach_function(f).change_context_lazy(ctx)?)
            }
            Declaration::Variable(v) => {
                Declared::Variable(self.attach_variable(v).change_context_lazy(ctx)?)
            }
        };
        Ok(declared)
    }

    fn define_declared(
        &self,
        class: StructClass,
        layout: Option<LayoutSpec>,
    ) -> Result<Declared, crate::layout::LayoutError> {
        if let Some(layout) = layout {
            class.define(&layout, &self.resolver())?;
        }
        Ok(Declared::Struct(class))
    }
}

fn check_arity(kind: &str, args: &[DeclArg], min: usize, max: usize) -> Result<(), DeclError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(report!(DeclError::Argument(format!(
            "`{}` takes {} arguments, got {}",
            kind,
            expected,
            args.len()
        ))));
    }
    Ok(())
}

fn symbol(arg: &DeclArg) -> Result<&str, DeclError> {
    arg.as_symbol().ok_or_else(|| {
        report!(DeclError::Argument(format!(
            "expected a name, got {}",
            arg.describe()
        )))
    })
}

fn non_negative(arg: &DeclArg) -> Result<usize, DeclError> {
    match arg {
        DeclArg::Int(v) => usize::try_from(*v).map_err(|_| {
            report!(DeclError::Argument(format!(
                "expected a non-negative integer, got {}",
                v
            )))
        }),
        _ => Err(report!(DeclError::Argument(format!(
            "expected an integer, got {}",
            arg.describe()
        )))),
    }
}

/// A name, or `{by_value: name}`
fn type_ref(arg: &DeclArg) -> Result<TypeRef, DeclError> {
    match arg {
        DeclArg::Symbol(name) => Ok(TypeRef::Named(name.clone())),
        DeclArg::Map(entries) => match entries.as_slice() {
            [(key, DeclArg::Symbol(name))] if key == "by_value" => {
                Ok(TypeRef::by_value(name.as_str()))
            }
            _ => Err(report!(DeclError::Argument(
                "a type map must be `{by_value: name}`".to_string()
            ))),
        },
        _ => Err(report!(DeclError::Argument(format!(
            "expected a type, got {}",
            arg.describe()
        )))),
    }
}

fn type_list(arg: &DeclArg) -> Result<Vec<TypeRef>, DeclError> {
    match arg {
        DeclArg::List(items) => items.iter().map(type_ref).collect(),
        _ => Err(report!(DeclError::Argument(format!(
            "expected a list of types, got {}",
            arg.describe()
        )))),
    }
}

/// A type, or `[element, count]` for an array
fn field_type(arg: &DeclArg) -> Result<FieldType, DeclError> {
    match arg {
        DeclArg::List(items) => match items.as_slice() {
            [element, count] => Ok(FieldType::Array(type_ref(element)?, non_negative(count)?)),
            _ => Err(report!(DeclError::Argument(
                "an array field must be `[type, count]`".to_string()
            ))),
        },
        _ => Ok(FieldType::Type(type_ref(arg)?)),
    }
}

/// `[name, type, offset?, name, type, offset?, ...]` or `{name: type, ...}`
fn parse_layout(arg: &DeclArg) -> Result<LayoutSpec, DeclError> {
    match arg {
        DeclArg::List(items) => {
            let mut fields = Vec::new();
            let mut iter = items.iter().peekable();
            while let Some(name) = iter.next() {
                let name = symbol(name).attach_printable("In a layout field name position")?;
                let ty = iter.next().ok_or_else(|| {
                    report!(DeclError::Argument(format!("field `{}` has no type", name)))
                })?;
                let ty = field_type(ty)
                    .attach_printable_lazy(|| format!("In the type of field `{}`", name))?;
                let offset = match iter.peek() {
                    Some(DeclArg::Int(offset)) => {
                        let offset = DeclArg::Int(*offset);
                        iter.next();
                        Some(non_negative(&offset)?)
                    }
                    _ => None,
                };
                fields.push(FieldSpec {
                    name: name.to_string(),
                    ty,
                    offset,
                });
            }
            Ok(LayoutSpec::Ordered(fields))
        }
        DeclArg::Map(entries) => {
            let mut fields = Vec::with_capacity(entries.len());
            for (name, ty) in entries {
                if let DeclArg::Int(_) = ty {
                    return Err(report!(DeclError::Argument(format!(
                        "field `{}`: offsets are not allowed in a keyed layout",
                        name
                    ))));
                }
                let ty = field_type(ty)
                    .attach_printable_lazy(|| format!("In the type of field `{}`", name))?;
                fields.push((name.clone(), ty));
            }
            Ok(LayoutSpec::Keyed(fields))
        }
        _ => Err(report!(DeclError::Argument(format!(
            "expected a layout list or map, got {}",
            arg.describe()
        )))),
    }
}

/// `name, [items]`, `[items]` or `items...`
fn parse_enum(args: &[DeclArg]) -> Result<Declaration, DeclError> {
    let (name, items) = match args {
        [DeclArg::Symbol(name), DeclArg::List(items)] => (Some(name.clone()), items.as_slice()),
        [DeclArg::List(items)] => (None, items.as_slice()),
        _ => (None, args),
    };
    if items.is_empty() {
        return Err(report!(DeclError::Argument(
            "an enum needs at least one symbol".to_string()
        )));
    }
    let mut out = Vec::with_capacity(items.len());
    let mut iter = items.iter().peekable();
    while let Some(item) = iter.next() {
        let item = match item {
            DeclArg::Symbol(symbol) => match iter.peek() {
                Some(DeclArg::Int(value)) => {
                    let value = *value;
                    iter.next();
                    EnumItem::Valued(symbol.clone(), value)
                }
                _ => EnumItem::Symbol(symbol.clone()),
            },
            DeclArg::List(pair) => match pair.as_slice() {
                [DeclArg::Symbol(symbol), DeclArg::Int(value)] => {
                    EnumItem::Valued(symbol.clone(), *value)
                }
                _ => {
                    return Err(report!(DeclError::Argument(
                        "an enum value must be `[symbol, integer]`".to_string()
                    )))
                }
            },
            other => {
                return Err(report!(DeclError::Argument(format!(
                    "expected an enum symbol, got {}",
                    other.describe()
                ))))
            }
        };
        out.push(item);
    }
    Ok(Declaration::Enum { name, items: out })
}

fn parse_libraries(args: &[DeclArg]) -> Result<Declaration, DeclError> {
    if args.is_empty() {
        return Err(report!(DeclError::Argument(
            "`library` needs at least one library".to_string()
        )));
    }
    let names = args
        .iter()
        .map(|arg| match arg {
            DeclArg::Symbol(name) if name == CURRENT_PROCESS_KEYWORD => {
                Ok(LibraryName::CurrentProcess)
            }
            DeclArg::Symbol(name) => Ok(LibraryName::Name(name.clone())),
            DeclArg::List(alternatives) if alternatives.is_empty() => Err(report!(
                DeclError::Argument("empty list of alternative library names".to_string())
            )),
            DeclArg::List(alternatives) => alternatives
                .iter()
                .map(|a| symbol(a).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()
                .map(LibraryName::Alternatives),
            other => Err(report!(DeclError::Argument(format!(
                "expected a library name, got {}",
                other.describe()
            )))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Declaration::Libraries(names))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> DeclArg {
        DeclArg::Symbol(s.to_string())
    }

    fn list(items: Vec<DeclArg>) -> DeclArg {
        DeclArg::List(items)
    }

    #[test]
    fn enum_forms() {
        let bare = Declaration::parse("enum", &[sym("a"), sym("b"), sym("c")]).unwrap();
        let wrapped = Declaration::parse("enum", &[list(vec![sym("a"), sym("b"), sym("c")])]).unwrap();
        assert_eq!(bare, wrapped);
        let named = Declaration::parse("enum", &[sym("e"), list(vec![sym("a")])]).unwrap();
        assert_eq!(named.name(), Some("e"));
        let inline = Declaration::parse("enum", &[sym("a"), sym("b"), DeclArg::Int(5), sym("c")]).unwrap();
        let paired = Declaration::parse(
            "enum",
            &[list(vec![sym("a"), list(vec![sym("b"), DeclArg::Int(5)]), sym("c")])],
        )
        .unwrap();
        assert_eq!(inline, paired);
    }

    #[test]
    fn callback_arity() {
        assert!(Declaration::parse("callback", &[list(vec![])]).is_err());
        let err = Declaration::parse(
            "callback",
            &[sym("a"), list(vec![]), sym("void"), sym("extra")],
        )
        .unwrap_err();
        assert!(matches!(err.current_context(), DeclError::Argument(_)));
        let anon = Declaration::parse("callback", &[list(vec![sym("int")]), sym("void")]).unwrap();
        assert_eq!(anon.name(), None);
    }

    #[test]
    fn function_native_name() {
        let decl = Declaration::parse(
            "function",
            &[sym("pid"), sym("getpid"), list(vec![]), sym("int")],
        )
        .unwrap();
        match decl {
            Declaration::Function(f) => {
                assert_eq!(f.name, "pid");
                assert_eq!(f.symbol(), "getpid");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn positional_layout_with_offsets() {
        let decl = Declaration::parse(
            "struct",
            &[
                sym("s"),
                list(vec![
                    sym("a"),
                    sym("int"),
                    sym("b"),
                    sym("char"),
                    DeclArg::Int(8),
                    sym("c"),
                    list(vec![sym("uint8"), DeclArg::Int(3)]),
                ]),
            ],
        )
        .unwrap();
        let layout = match decl {
            Declaration::Struct { layout: Some(l), .. } => l,
            other => panic!("unexpected {:?}", other),
        };
        let fields = layout.fields();
        assert_eq!(fields[0].offset, None);
        assert_eq!(fields[1].offset, Some(8));
        assert_eq!(fields[2].ty, FieldType::Array("uint8".into(), 3));
    }

    #[test]
    fn malformed_layouts() {
        let dangling = Declaration::parse("struct", &[sym("s"), list(vec![sym("a")])]);
        assert!(dangling.is_err());
        let not_a_name = Declaration::parse(
            "struct",
            &[sym("s"), list(vec![DeclArg::Int(1), sym("int")])],
        );
        assert!(not_a_name.is_err());
        let keyed_offset = Declaration::parse(
            "union",
            &[sym("u"), DeclArg::Map(vec![("a".to_string(), DeclArg::Int(4))])],
        );
        assert!(keyed_offset.is_err());
    }

    #[test]
    fn libraries() {
        let decl = Declaration::parse(
            "library",
            &[sym("c"), list(vec![sym("m"), sym("libm.so.6")]), sym("current_process")],
        )
        .unwrap();
        assert_eq!(
            decl,
            Declaration::Libraries(vec![
                LibraryName::Name("c".to_string()),
                LibraryName::Alternatives(vec!["m".to_string(), "libm.so.6".to_string()]),
                LibraryName::CurrentProcess,
            ])
        );
        let err = Declaration::parse("library", &[sym("c"), list(vec![])]).unwrap_err();
        assert!(matches!(err.current_context(), DeclError::Argument(_)));
    }

    #[test]
    fn declare_into_scope() {
        let mut scope = Scope::new("test");
        let decls = [
            Declaration::parse("typedef", &[sym("uint32"), sym("pid_t")]).unwrap(),
            Declaration::parse("size", &[sym("opaque"), DeclArg::Int(64)]).unwrap(),
            Declaration::parse(
                "struct",
                &[sym("pair"), list(vec![sym("a"), sym("pid_t"), sym("b"), sym("double")])],
            )
            .unwrap(),
        ];
        for decl in decls {
            scope.declare(decl).unwrap();
        }
        assert_eq!(scope.struct_class("opaque").unwrap().size(), 64);
        assert_eq!(scope.struct_class("pair").unwrap().offset_of("b"), Some(8));

        let again = Declaration::parse("struct", &[sym("pair"), list(vec![sym("a"), sym("int")])]).unwrap();
        let err = scope.declare(again).unwrap_err();
        assert!(err.contains::<crate::layout::LayoutError>());
    }
}
