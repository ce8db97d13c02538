//! Typed descriptions of generated source: types, functions, constructors,
//! service interfaces.
//!
//! Plugins describe what they need in these terms; rendering to text happens
//! in the codegen crate, which keeps generation a pure function of these
//! values.

use serde::{Deserialize, Serialize};

/// A type referenced from generated code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeName {
    /// A type that needs no import: `i64`, `String`, `bool`, `()`.
    Builtin { name: String },
    /// A named type declared in a module, e.g. `user_svc::model` + `User`.
    User { module: String, name: String },
    Vec { elem: Box<TypeName> },
    Option { elem: Box<TypeName> },
    Arc { elem: Box<TypeName> },
    /// A trait object, `dyn Trait`.
    Dyn { r#trait: Box<TypeName> },
}

impl TypeName {
    pub fn builtin(name: &str) -> Self {
        TypeName::Builtin {
            name: name.to_string(),
        }
    }

    pub fn user(module: &str, name: &str) -> Self {
        TypeName::User {
            module: module.to_string(),
            name: name.to_string(),
        }
    }

    pub fn vec(elem: TypeName) -> Self {
        TypeName::Vec {
            elem: Box::new(elem),
        }
    }

    pub fn option(elem: TypeName) -> Self {
        TypeName::Option {
            elem: Box::new(elem),
        }
    }

    pub fn arc(elem: TypeName) -> Self {
        TypeName::Arc {
            elem: Box::new(elem),
        }
    }

    pub fn dyn_trait(r#trait: TypeName) -> Self {
        TypeName::Dyn {
            r#trait: Box::new(r#trait),
        }
    }

    /// Module paths of every user type mentioned, outermost first, deduplicated.
    pub fn modules(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_modules(&mut out);
        out
    }

    fn collect_modules<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TypeName::Builtin { .. } => {}
            TypeName::User { module, .. } => {
                if !out.contains(&module.as_str()) {
                    out.push(module);
                }
            }
            TypeName::Vec { elem } | TypeName::Option { elem } | TypeName::Arc { elem } => {
                elem.collect_modules(out)
            }
            TypeName::Dyn { r#trait } => r#trait.collect_modules(out),
        }
    }

    /// The crate a user type lives in: the first path segment of its module.
    pub fn crate_root(&self) -> Option<&str> {
        match self {
            TypeName::User { module, .. } => module.split("::").next(),
            _ => None,
        }
    }
}

/// A named, typed value: a function argument or a struct field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: TypeName,
}

impl Variable {
    pub fn new(name: &str, ty: TypeName) -> Self {
        Variable {
            name: name.to_string(),
            ty,
        }
    }
}

/// A function or method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    pub arguments: Vec<Variable>,
    /// `None` means `()`.
    pub returns: Option<TypeName>,
    #[serde(default)]
    pub is_async: bool,
}

impl Func {
    pub fn new(name: &str, arguments: Vec<Variable>, returns: Option<TypeName>) -> Self {
        Func {
            name: name.to_string(),
            arguments,
            returns,
            is_async: false,
        }
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }
}

/// A free function that builds an instance.
///
/// Generated build functions call `module::func.name(args...)`, passing one
/// container lookup per IR argument node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructor {
    /// Module path the constructor lives in, e.g. `user_svc::handler`.
    pub module: String,
    pub func: Func,
    /// Whether the constructor returns `Result<_, _>`.
    #[serde(default)]
    pub fallible: bool,
    /// Whether the built value is a long-running task.
    #[serde(default)]
    pub runnable: bool,
}

/// The set of methods a service exposes, as a named trait in some module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInterface {
    pub name: String,
    pub module: String,
    pub methods: Vec<Func>,
}

impl ServiceInterface {
    pub fn new(module: &str, name: &str, methods: Vec<Func>) -> Self {
        ServiceInterface {
            name: name.to_string(),
            module: module.to_string(),
            methods,
        }
    }

    /// The trait as a user type.
    pub fn user_type(&self) -> TypeName {
        TypeName::user(&self.module, &self.name)
    }

    /// `Arc<dyn Trait>`, the shape service instances are stored in.
    pub fn handle_type(&self) -> TypeName {
        TypeName::arc(TypeName::dyn_trait(self.user_type()))
    }

    /// Copies this interface under a new name and module, keeping its methods.
    pub fn copy_as(&self, name: &str, module: &str) -> ServiceInterface {
        ServiceInterface {
            name: name.to_string(),
            module: module.to_string(),
            methods: self.methods.clone(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&Func> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn has_async_methods(&self) -> bool {
        self.methods.iter().any(|m| m.is_async)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modules_are_collected_through_wrappers() {
        let ty = TypeName::vec(TypeName::option(TypeName::arc(TypeName::dyn_trait(
            TypeName::user("user_svc::api", "UserService"),
        ))));
        assert_eq!(ty.modules(), vec!["user_svc::api"]);
        assert!(TypeName::builtin("i64").modules().is_empty());
    }

    #[test]
    fn crate_root_is_first_segment() {
        let ty = TypeName::user("user_svc::api", "UserService");
        assert_eq!(ty.crate_root(), Some("user_svc"));
        assert_eq!(TypeName::builtin("String").crate_root(), None);
    }

    #[test]
    fn copy_as_keeps_methods() {
        let iface = ServiceInterface::new(
            "user_svc::api",
            "UserService",
            vec![Func::new(
                "get_user",
                vec![Variable::new("id", TypeName::builtin("u64"))],
                Some(TypeName::builtin("String")),
            )],
        );
        let copy = iface.copy_as("UserService_Wrapper", "archgen_app::wrappers");
        assert_eq!(copy.name, "UserService_Wrapper");
        assert_eq!(copy.module, "archgen_app::wrappers");
        assert_eq!(copy.methods, iface.methods);
        assert!(copy.method("get_user").is_some());
    }

    #[test]
    fn type_name_serializes_with_kind_tag() {
        let ty = TypeName::user("m", "T");
        let json = serde_json::to_value(&ty).unwrap();
        assert_eq!(json["kind"], "user");
        assert_eq!(json["module"], "m");
    }
}
