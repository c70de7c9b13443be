use std::io::Write;
use std::path::Path;

use error_stack::{Result, ResultExt};
use nativebind::layout::{FieldKind, StructLayout};
use nativebind::{Binding, Scope, StructClass};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to serialize report")]
    Serialize,
    #[error("Failed to write report")]
    Write,
}

/// Output format of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// JSON for `.json` files, YAML otherwise
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Everything a scope declared, flattened for serialization
#[derive(Debug, Default, Serialize)]
pub struct ScopeReport {
    pub scope: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub typedefs: Vec<TypedefReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<EnumReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub structs: Vec<StructReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub callbacks: Vec<TypedefReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableReport>,
}

#[derive(Debug, Serialize)]
pub struct TypedefReport {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Serialize)]
pub struct EnumReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub values: Vec<EnumeratorReport>,
}

#[derive(Debug, Serialize)]
pub struct EnumeratorReport {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Serialize)]
pub struct StructReport {
    pub name: String,
    pub kind: &'static str,
    pub size: usize,
    pub align: usize,
    /// `false` if only declared, or only given a size
    pub complete: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberReport>,
}

#[derive(Debug, Serialize)]
pub struct MemberReport {
    pub name: String,
    pub offset: usize,
    pub size: usize,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Serialize)]
pub struct FunctionReport {
    pub name: String,
    pub symbol: String,
    pub library: String,
    pub signature: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct VariableReport {
    pub name: String,
    pub symbol: String,
    pub library: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub address: String,
}

impl ScopeReport {
    pub fn new(scope: &Scope) -> Self {
        let registry = scope.registry();
        let mut report = Self {
            scope: scope.name().to_string(),
            libraries: scope.libraries().map(|l| l.names()).unwrap_or_default(),
            ..Default::default()
        };
        // named enums and callbacks are aliased too, they get their own sections
        report.typedefs = registry
            .aliases()
            .filter(|(name, _)| {
                registry.callback(name).is_none() && registry.find_enum(name).is_none()
            })
            .map(|(name, ty)| TypedefReport {
                name: name.to_string(),
                ty: ty.to_string(),
            })
            .collect();
        report.enums = registry
            .enumerations()
            .iter()
            .map(|e| EnumReport {
                name: e.name().map(str::to_string),
                values: e
                    .enumerators()
                    .iter()
                    .map(|(name, value)| EnumeratorReport {
                        name: name.clone(),
                        value: *value,
                    })
                    .collect(),
            })
            .collect();
        report.structs = registry.structs().map(struct_report).collect();
        report.callbacks = registry
            .callbacks()
            .map(|(name, cb)| TypedefReport {
                name: name.to_string(),
                ty: cb.to_string(),
            })
            .collect();
        for (name, binding) in scope.bindings() {
            match binding {
                Binding::Function(f) => report.functions.push(FunctionReport {
                    name: name.to_string(),
                    symbol: f.symbol().to_string(),
                    library: f.library().display_name(),
                    signature: f.signature().to_string(),
                    address: f.address().to_string(),
                }),
                Binding::Variable(v) => report.variables.push(VariableReport {
                    name: name.to_string(),
                    symbol: v.symbol().to_string(),
                    library: v.library().display_name(),
                    ty: v.ty().to_string(),
                    address: v.address().to_string(),
                }),
            }
        }
        report
    }

    pub fn render(&self, format: Format) -> Result<String, Error> {
        match format {
            Format::Yaml => serde_yaml::to_string(self).change_context(Error::Serialize),
            Format::Json => serde_json::to_string_pretty(self).change_context(Error::Serialize),
        }
    }

    /// Write to `path`, or to stdout if there is no path
    pub fn write(&self, path: Option<&Path>, format: Format) -> Result<(), Error> {
        let Some(path) = path else {
            return self.write_to(&mut std::io::stdout().lock(), format);
        };
        let content = self.render(format)?;
        common::ensure_parent_exists(path)
            .change_context(Error::Write)
            .attach_printable_lazy(|| format!("Path: {}", path.display()))?;
        std::fs::write(path, content)
            .change_context(Error::Write)
            .attach_printable_lazy(|| format!("Path: {}", path.display()))?;
        println!("Output written to {}", path.display());
        Ok(())
    }

    /// Write only the rendered report, so the output stays parseable
    pub fn write_to(&self, out: &mut impl Write, format: Format) -> Result<(), Error> {
        let mut content = self.render(format)?;
        if !content.ends_with('\n') {
            content.push('\n');
        }
        out.write_all(content.as_bytes())
            .change_context(Error::Write)?;
        out.flush().change_context(Error::Write)
    }
}

fn struct_report(class: &StructClass) -> StructReport {
    let layout = class.layout();
    StructReport {
        name: class.name().to_string(),
        kind: class.kind(),
        size: class.size(),
        align: class.alignment(),
        complete: layout.is_some(),
        members: layout.as_deref().map(member_reports).unwrap_or_default(),
    }
}

fn member_reports(layout: &StructLayout) -> Vec<MemberReport> {
    layout
        .fields()
        .iter()
        .map(|field| MemberReport {
            name: field.name.clone(),
            offset: field.offset,
            size: field.size,
            ty: match &field.kind {
                FieldKind::Scalar(ty) => ty.to_string(),
                FieldKind::Struct(class) => format!("{} {}", class.kind(), class.name()),
                FieldKind::Array { element, count } => format!("{}[{}]", element, count),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nativebind::LayoutSpec;

    fn sample_scope() -> Scope {
        let mut scope = Scope::new("sample");
        scope.typedef("uint32", "pid_t").unwrap();
        scope.enumeration(Some("color"), ["red".into(), ("blue", 5).into()]);
        scope.declare_struct("point").unwrap();
        scope
            .layout("point", &LayoutSpec::new().field("x", "int").field("y", "int"))
            .unwrap();
        scope.declare_union("opaque").unwrap();
        scope.set_size("opaque", 32).unwrap();
        scope
    }

    #[test]
    fn report_types() {
        let report = ScopeReport::new(&sample_scope());
        assert_eq!(report.scope, "sample");
        assert!(report.libraries.is_empty());
        assert_eq!(report.typedefs.len(), 1);
        assert_eq!(report.typedefs[0].name, "pid_t");
        assert_eq!(report.enums[0].values[1].value, 5);

        let point = report.structs.iter().find(|s| s.name == "point").unwrap();
        assert!(point.complete);
        assert_eq!(point.size, 8);
        assert_eq!(point.members[1].name, "y");
        assert_eq!(point.members[1].offset, 4);

        let opaque = report.structs.iter().find(|s| s.name == "opaque").unwrap();
        assert_eq!(opaque.kind, "union");
        assert!(!opaque.complete);
        assert_eq!(opaque.size, 32);
        assert!(opaque.members.is_empty());
    }

    #[test]
    fn serialize_both_formats() {
        let report = ScopeReport::new(&sample_scope());
        let yaml = report.render(Format::Yaml).unwrap();
        assert!(yaml.starts_with("scope: sample\n"));
        assert!(!yaml.contains("functions"));
        let json = report.render(Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["structs"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn stdout_output_parses_back() {
        let report = ScopeReport::new(&sample_scope());

        let mut out = Vec::new();
        report.write_to(&mut out, Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["scope"], "sample");
        assert_eq!(value["structs"].as_array().unwrap().len(), 2);

        let mut out = Vec::new();
        report.write_to(&mut out, Format::Yaml).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_slice(&out).unwrap();
        assert_eq!(value["typedefs"][0]["name"].as_str(), Some("pid_t"));
        assert_eq!(value["enums"][0]["values"][1]["value"].as_i64(), Some(5));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("out/layout.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("layout.yaml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("layout")), Format::Yaml);
    }
}
