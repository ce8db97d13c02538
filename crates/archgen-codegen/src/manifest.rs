//! Cargo manifests for generated modules and the workspace root.
//!
//! A [`Manifest`] is the dependency table of one generated module. Requiring
//! the same dependency at the same version twice is a no-op; requiring it at
//! a different version (or once by version and once by path) is a
//! [`BuildError::VersionConflict`].

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use archgen_core::error::BuildError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSection {
    pub name: String,
    pub version: String,
    pub edition: String,
}

/// One entry of a `[dependencies]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Dependency {
    pub fn version(version: &str) -> Self {
        Dependency {
            version: Some(version.to_string()),
            ..Default::default()
        }
    }

    pub fn path(path: &str) -> Self {
        Dependency {
            path: Some(path.to_string()),
            ..Default::default()
        }
    }

    /// Human-readable source: `1.0` or `path ../x`.
    pub fn describe(&self) -> String {
        match (&self.version, &self.path) {
            (_, Some(path)) => format!("path {path}"),
            (Some(version), None) => version.clone(),
            (None, None) => "*".to_string(),
        }
    }
}

/// A generated module's `Cargo.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub package: PackageSection,
    #[serde(default)]
    pub dependencies: IndexMap<String, Dependency>,
}

impl Manifest {
    pub fn new(name: &str, version: &str, edition: &str) -> Self {
        Manifest {
            package: PackageSection {
                name: name.to_string(),
                version: version.to_string(),
                edition: edition.to_string(),
            },
            dependencies: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Adds a versioned dependency. Returns `true` if it was new.
    pub fn require(&mut self, dependency: &str, version: &str) -> Result<bool, BuildError> {
        self.merge(dependency, Dependency::version(version))
    }

    /// Adds a versioned dependency with features; features are unioned when
    /// the same version is required again.
    pub fn require_features(
        &mut self,
        dependency: &str,
        version: &str,
        features: &[&str],
    ) -> Result<bool, BuildError> {
        let added = self.require(dependency, version)?;
        if let Some(entry) = self.dependencies.get_mut(dependency) {
            for feature in features {
                if !entry.features.iter().any(|f| f == feature) {
                    entry.features.push(feature.to_string());
                }
            }
        }
        Ok(added)
    }

    /// Adds a path dependency. Returns `true` if it was new.
    pub fn require_path(&mut self, dependency: &str, path: &str) -> Result<bool, BuildError> {
        self.merge(dependency, Dependency::path(path))
    }

    fn merge(&mut self, name: &str, requested: Dependency) -> Result<bool, BuildError> {
        match self.dependencies.get(name) {
            Some(existing)
                if existing.version == requested.version && existing.path == requested.path =>
            {
                Ok(false)
            }
            Some(existing) => Err(BuildError::VersionConflict {
                module: self.package.name.clone(),
                dependency: name.to_string(),
                existing: existing.describe(),
                requested: requested.describe(),
            }),
            None => {
                self.dependencies.insert(name.to_string(), requested);
                Ok(true)
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// Reads `(name, version)` from an existing crate's `Cargo.toml`.
///
/// The version falls back to `0.0.0` when absent or inherited from a
/// workspace.
pub fn read_package(dir: &Path) -> Result<(String, String), BuildError> {
    let path = dir.join("Cargo.toml");
    let text = std::fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
    let value: toml::Value = toml::from_str(&text).map_err(|e| BuildError::InvalidDirectory {
        path: path.clone(),
        reason: format!("unparseable manifest: {e}"),
    })?;
    let package = value.get("package").ok_or_else(|| BuildError::InvalidDirectory {
        path: path.clone(),
        reason: "manifest has no [package] section".to_string(),
    })?;
    let name = package
        .get("name")
        .and_then(toml::Value::as_str)
        .ok_or_else(|| BuildError::InvalidDirectory {
            path: path.clone(),
            reason: "package has no name".to_string(),
        })?;
    let version = package
        .get("version")
        .and_then(toml::Value::as_str)
        .unwrap_or("0.0.0");
    Ok((name.to_string(), version.to_string()))
}

#[derive(Debug, Serialize)]
struct WorkspaceSection<'a> {
    members: &'a [String],
    resolver: &'a str,
}

#[derive(Debug, Serialize)]
struct WorkspaceManifest<'a> {
    workspace: WorkspaceSection<'a>,
}

/// Renders the root `Cargo.toml` listing every module directory.
pub fn workspace_toml(members: &[String]) -> Result<String, toml::ser::Error> {
    toml::to_string(&WorkspaceManifest {
        workspace: WorkspaceSection {
            members,
            resolver: "2",
        },
    })
}
