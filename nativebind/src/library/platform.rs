use std::path::Path;

/// Naming conventions for native libraries on a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub lib_prefix: &'static str,
    pub lib_suffix: &'static str,
    /// What the name `c` maps to
    pub libc: &'static str,
    /// Whether `.so.N` counts as already having the suffix
    pub versioned_suffix: bool,
}

impl Platform {
    pub const LINUX: Self = Self {
        lib_prefix: "lib",
        lib_suffix: "so",
        libc: "libc.so.6",
        versioned_suffix: true,
    };
    pub const MACOS: Self = Self {
        lib_prefix: "lib",
        lib_suffix: "dylib",
        libc: "libc.dylib",
        versioned_suffix: false,
    };
    pub const WINDOWS: Self = Self {
        lib_prefix: "",
        lib_suffix: "dll",
        libc: "msvcrt.dll",
        versioned_suffix: false,
    };

    pub fn current() -> Self {
        if cfg!(windows) {
            Self::WINDOWS
        } else if cfg!(target_vendor = "apple") {
            Self::MACOS
        } else {
            Self::LINUX
        }
    }

    /// Decorate a bare library name with the platform prefix and suffix.
    /// Names with a directory component are returned unchanged.
    pub fn map_library_name(&self, name: &str) -> String {
        let name = if name == "c" { self.libc } else { name };
        let is_bare = Path::new(name).file_name().and_then(|f| f.to_str()) == Some(name);
        if !is_bare {
            return name.to_string();
        }
        let mut lib = String::with_capacity(name.len() + 8);
        if !name.starts_with(self.lib_prefix) {
            lib.push_str(self.lib_prefix);
        }
        lib.push_str(name);
        if !self.has_suffix(&lib) {
            lib.push('.');
            lib.push_str(self.lib_suffix);
        }
        lib
    }

    /// Expand alternative names of one logical library into the concrete
    /// names to try: each name as given, then decorated. Duplicates are
    /// removed, first occurrence kept.
    pub fn candidates<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            for candidate in [name.to_string(), self.map_library_name(name)] {
                if !out.contains(&candidate) {
                    out.push(candidate);
                }
            }
        }
        out
    }

    fn has_suffix(&self, lib: &str) -> bool {
        if self.versioned_suffix {
            let pat = format!(".{}", self.lib_suffix);
            return lib.match_indices(&pat).any(|(i, _)| {
                let rest = &lib[i + pat.len()..];
                let mut chars = rest.chars();
                match chars.next() {
                    None => true,
                    Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
                    _ => false,
                }
            });
        }
        lib.ends_with(&format!(".{}", self.lib_suffix))
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_names() {
        let p = Platform::LINUX;
        assert_eq!(p.map_library_name("m"), "libm.so");
        assert_eq!(p.map_library_name("libm"), "libm.so");
        assert_eq!(p.map_library_name("libm.so.6"), "libm.so.6");
        assert_eq!(p.map_library_name("libfoo.so"), "libfoo.so");
        assert_eq!(p.map_library_name("c"), "libc.so.6");
        assert_eq!(p.map_library_name("/usr/lib/libz.so.1"), "/usr/lib/libz.so.1");
        assert_eq!(p.map_library_name("./foo"), "./foo");
    }

    #[test]
    fn macos_names() {
        let p = Platform::MACOS;
        assert_eq!(p.map_library_name("z"), "libz.dylib");
        assert_eq!(p.map_library_name("libz.dylib"), "libz.dylib");
        assert_eq!(p.map_library_name("libz.so.1"), "libz.so.1.dylib");
    }

    #[test]
    fn windows_names() {
        let p = Platform::WINDOWS;
        assert_eq!(p.map_library_name("kernel32"), "kernel32.dll");
        assert_eq!(p.map_library_name("c"), "msvcrt.dll");
    }

    #[test]
    fn candidates_keep_order_without_duplicates() {
        let p = Platform::LINUX;
        assert_eq!(
            p.candidates(["m", "libm.so", "libm.so.6"]),
            vec!["m", "libm.so", "libm.so.6"]
        );
        assert_eq!(p.candidates(["libz.so.1"]), vec!["libz.so.1"]);
    }
}
