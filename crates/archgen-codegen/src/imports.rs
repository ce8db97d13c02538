//! Collision-safe import aliasing for generated files.
//!
//! Each generated file keeps one [`Imports`] table. Registering a path hands
//! back the identifier to use in generated text: the path's last segment,
//! or that segment with a numeric suffix when another path already took it.

use indexmap::IndexMap;

use archgen_core::code::TypeName;

#[derive(Debug, Clone, Default)]
pub struct Imports {
    /// Current package path; types from here are referenced unqualified.
    package: String,
    /// path -> alias, in registration order.
    aliases: IndexMap<String, String>,
}

impl Imports {
    pub fn new(package: &str) -> Self {
        Imports {
            package: package.to_string(),
            aliases: IndexMap::new(),
        }
    }

    /// Registers `path` and returns its alias. The same path always returns
    /// the same alias; distinct paths never share one.
    pub fn add(&mut self, path: &str) -> String {
        if let Some(alias) = self.aliases.get(path) {
            return alias.clone();
        }
        let base = last_segment(path);
        let mut alias = base.to_string();
        let mut n = 1;
        while self.is_taken(&alias) {
            alias = format!("{base}_{n}");
            n += 1;
        }
        self.aliases.insert(path.to_string(), alias.clone());
        alias
    }

    fn is_taken(&self, alias: &str) -> bool {
        self.aliases.values().any(|a| a == alias)
    }

    pub fn alias_of(&self, path: &str) -> Option<&str> {
        self.aliases.get(path).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Registers every module `ty` mentions and renders it with aliases.
    pub fn qualify(&mut self, ty: &TypeName) -> String {
        match ty {
            TypeName::Builtin { name } => name.clone(),
            TypeName::User { module, name } => {
                if *module == self.package {
                    name.clone()
                } else {
                    format!("{}::{}", self.add(module), name)
                }
            }
            TypeName::Vec { elem } => format!("Vec<{}>", self.qualify(elem)),
            TypeName::Option { elem } => format!("Option<{}>", self.qualify(elem)),
            TypeName::Arc { elem } => format!("std::sync::Arc<{}>", self.qualify(elem)),
            TypeName::Dyn { r#trait } => format!("dyn {}", self.qualify(r#trait)),
        }
    }

    /// `use` lines in registration order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, alias) in &self.aliases {
            if last_segment(path) == alias {
                out.push_str(&format!("use {path};\n"));
            } else {
                out.push_str(&format!("use {path} as {alias};\n"));
            }
        }
        out
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn same_path_returns_same_alias() {
        let mut imports = Imports::new("app::wiring");
        let a = imports.add("user_svc::api");
        let b = imports.add("user_svc::api");
        assert_eq!(a, "api");
        assert_eq!(a, b);
        assert_eq!(imports.render(), "use user_svc::api;\n");
    }

    #[test]
    fn colliding_short_names_get_suffixes() {
        let mut imports = Imports::new("app::wiring");
        let a = imports.add("user_svc::api");
        let b = imports.add("order_svc::api");
        let c = imports.add("cart_svc::api");
        assert_eq!(a, "api");
        assert_eq!(b, "api_1");
        assert_eq!(c, "api_2");
        assert_eq!(
            imports.render(),
            "use user_svc::api;\nuse order_svc::api as api_1;\nuse cart_svc::api as api_2;\n"
        );
    }

    #[test]
    fn suffixed_alias_does_not_steal_a_real_segment() {
        let mut imports = Imports::new("app");
        assert_eq!(imports.add("a::api"), "api");
        assert_eq!(imports.add("b::api_1"), "api_1");
        assert_eq!(imports.add("c::api"), "api_2");
    }

    #[test]
    fn qualify_renders_nested_types() {
        let mut imports = Imports::new("app::wiring");
        let ty = TypeName::arc(TypeName::dyn_trait(TypeName::user(
            "user_svc::api",
            "UserService",
        )));
        assert_eq!(
            imports.qualify(&ty),
            "std::sync::Arc<dyn api::UserService>"
        );
        assert_eq!(imports.alias_of("user_svc::api"), Some("api"));
    }

    #[test]
    fn types_in_current_package_are_unqualified() {
        let mut imports = Imports::new("app::wiring");
        let ty = TypeName::vec(TypeName::user("app::wiring", "Local"));
        assert_eq!(imports.qualify(&ty), "Vec<Local>");
        assert!(imports.is_empty());
    }

    proptest! {
        #[test]
        fn aliases_are_unique_per_path(
            paths in proptest::collection::vec(("[a-c]", "[x-z]"), 1..20)
        ) {
            let mut imports = Imports::new("app");
            let mut seen: IndexMap<String, String> = IndexMap::new();
            for (krate, module) in &paths {
                let path = format!("{krate}::{module}");
                let alias = imports.add(&path);
                if let Some(prev) = seen.get(&path) {
                    prop_assert_eq!(prev, &alias);
                } else {
                    prop_assert!(!seen.values().any(|a| a == &alias));
                    seen.insert(path, alias);
                }
            }
        }
    }
}
