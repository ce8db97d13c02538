//! Pure text rendering of generated Rust sources.
//!
//! Nothing here touches the filesystem; scopes decide where the text goes.
//! Identical inputs render identical text, which keeps the output digest
//! stable.

use std::collections::HashSet;

use archgen_core::code::{Constructor, Func, ServiceInterface};
use archgen_core::names;

use crate::imports::Imports;

const HEADER: &str = "// @generated by archgen. Do not edit.\n";

/// Joins a file header, the `use` block and the body.
pub fn file(imports: &Imports, body: &str) -> String {
    let mut out = String::from(HEADER);
    if !imports.is_empty() {
        out.push('\n');
        out.push_str(&imports.render());
    }
    out.push('\n');
    out.push_str(body);
    out
}

fn signature(method: &Func, imports: &mut Imports) -> String {
    let args: Vec<String> = method
        .arguments
        .iter()
        .map(|a| format!(", {}: {}", a.name, imports.qualify(&a.ty)))
        .collect();
    let ret = match &method.returns {
        Some(ty) => format!(" -> {}", imports.qualify(ty)),
        None => String::new(),
    };
    let asyncness = if method.is_async { "async " } else { "" };
    format!("{asyncness}fn {}(&self{}){ret}", method.name, args.concat())
}

/// A service interface as an object-safe trait.
pub fn interface_trait(iface: &ServiceInterface, imports: &mut Imports) -> String {
    let mut out = String::new();
    if iface.has_async_methods() {
        out.push_str("#[async_trait::async_trait]\n");
    }
    out.push_str("#[allow(non_camel_case_types)]\n");
    out.push_str(&format!("pub trait {}: Send + Sync {{\n", iface.name));
    for method in &iface.methods {
        out.push_str(&format!("    {};\n", signature(method, imports)));
    }
    out.push_str("}\n");
    out
}

/// A struct holding the wrapped service handle.
pub fn wrapper_struct(name: &str, wrapped: &ServiceInterface, imports: &mut Imports) -> String {
    let handle = imports.qualify(&wrapped.handle_type());
    format!(
        "#[allow(non_camel_case_types)]\n\
         pub struct {name} {{\n    pub(crate) inner: {handle},\n}}\n"
    )
}

/// Implements `derived` for the wrapper struct by delegating every method to
/// the wrapped handle, logging each call; plus the constructor `ctor`.
pub fn wrapper_impl(
    struct_ty: &str,
    derived: &ServiceInterface,
    wrapped: &ServiceInterface,
    ctor: &str,
    imports: &mut Imports,
) -> String {
    let trait_ty = imports.qualify(&derived.user_type());
    let wrapped_trait = imports.qualify(&wrapped.user_type());
    let wrapped_handle = imports.qualify(&wrapped.handle_type());
    let derived_handle = imports.qualify(&derived.handle_type());

    let mut out = String::new();
    out.push_str(&format!(
        "pub fn {ctor}(inner: {wrapped_handle}) -> {derived_handle} {{\n    \
         std::sync::Arc::new({struct_ty} {{ inner }})\n}}\n\n"
    ));
    if derived.has_async_methods() {
        out.push_str("#[async_trait::async_trait]\n");
    }
    out.push_str(&format!("impl {trait_ty} for {struct_ty} {{\n"));
    for (i, method) in derived.methods.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let args: Vec<&str> = method.arguments.iter().map(|a| a.name.as_str()).collect();
        let call_args: String = args.iter().map(|a| format!(", {a}")).collect();
        let awaiting = if method.is_async { ".await" } else { "" };
        out.push_str(&format!("    {} {{\n", signature(method, imports)));
        out.push_str(&format!(
            "        tracing::debug!(service = \"{}\", method = \"{}\", \"call\");\n",
            wrapped.name, method.name
        ));
        out.push_str(&format!(
            "        {wrapped_trait}::{}(&*self.inner{call_args}){awaiting}\n",
            method.name
        ));
        out.push_str("    }\n");
    }
    out.push_str("}\n");
    out
}

/// One constructor argument: the instance fetched and the type it is fetched as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub instance: String,
    pub ty: String,
}

/// Build function body calling `call` with one container lookup per binding.
pub fn constructor_body(call: &str, ctor: &Constructor, bindings: &[Binding]) -> String {
    let mut out = String::new();
    for (i, b) in bindings.iter().enumerate() {
        out.push_str(&format!(
            "    let a{i} = ctr.get_as::<{}>({:?})?;\n",
            b.ty, b.instance
        ));
    }
    let args: Vec<String> = (0..bindings.len()).map(|i| format!("(*a{i}).clone()")).collect();
    let fallible = if ctor.fallible { "?" } else { "" };
    out.push_str(&format!(
        "    let value = {call}({}){fallible};\n",
        args.join(", ")
    ));
    if ctor.runnable {
        out.push_str("    Ok(archgen_runtime::Instance::runnable(value))\n");
    } else {
        out.push_str("    Ok(archgen_runtime::Instance::new(value))\n");
    }
    out
}

/// Build function body returning a string value.
pub fn string_value_body(value: &str) -> String {
    format!("    Ok(archgen_runtime::Instance::new(String::from({value:?})))\n")
}

/// A declared instance ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared<'a> {
    pub name: &'a str,
    pub body: &'a str,
}

/// A namespace file: one build function per declaration and a `define`
/// function registering them all, in the given order.
pub fn namespace_file(imports: &Imports, declarations: &[Declared<'_>]) -> String {
    let mut taken = HashSet::new();
    let mut body = String::new();
    let mut registrations = String::new();

    for decl in declarations {
        let base = format!("build_{}", names::snake_name(decl.name));
        let mut fn_name = base.clone();
        let mut n = 1;
        while !taken.insert(fn_name.clone()) {
            fn_name = format!("{base}_{n}");
            n += 1;
        }
        body.push_str(&format!(
            "fn {fn_name}(\n    ctr: &archgen_runtime::Container,\n) \
             -> Result<archgen_runtime::Instance, archgen_runtime::BoxError> {{\n{}}}\n\n",
            decl.body
        ));
        registrations.push_str(&format!("    graph.define({:?}, {fn_name});\n", decl.name));
    }

    body.push_str("pub fn define(graph: &mut archgen_runtime::Graph) {\n");
    body.push_str(&registrations);
    body.push_str("}\n");
    file(imports, &body)
}

/// `src/main.rs` of a generated process.
pub fn process_entry(namespace_path: &str, roots: &[String]) -> String {
    let mut out = String::from(HEADER);
    out.push_str(&format!(
        "\n#[tokio::main]\n\
         async fn main() -> Result<(), archgen_runtime::BoxError> {{\n    \
         tracing_subscriber::fmt::init();\n\n    \
         let mut graph = archgen_runtime::Graph::new();\n    \
         {namespace_path}::define(&mut graph);\n    \
         let container = graph.build()?;\n\n    \
         let signal = container.clone();\n    \
         tokio::spawn(async move {{\n        \
         if tokio::signal::ctrl_c().await.is_ok() {{\n            \
         tracing::info!(\"interrupted, cancelling\");\n            \
         signal.cancel();\n        \
         }}\n    \
         }});\n\n"
    ));
    for root in roots {
        out.push_str(&format!("    container.get({root:?})?;\n"));
    }
    out.push_str(
        "\n    let report = container.wait().await;\n    \
         tracing::info!(\n        \
         completed = report.completed.len(),\n        \
         failed = report.failed.len(),\n        \
         \"all tasks exited\"\n    \
         );\n    \
         if report.failed.is_empty() {\n        \
         Ok(())\n    \
         } else {\n        \
         Err(format!(\"{} task(s) failed\", report.failed.len()).into())\n    \
         }\n\
         }\n",
    );
    out
}

/// `mod.rs` of a package: one `pub mod` per file.
pub fn package_index(files: &[String]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for f in files {
        out.push_str(&format!("pub mod {f};\n"));
    }
    out
}

/// `src/lib.rs` of a generated module: one `pub mod` per package.
pub fn crate_root(packages: &[String]) -> String {
    package_index(packages)
}
