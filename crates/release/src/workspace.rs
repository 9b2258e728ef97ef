//! Cargo workspace scanning.
//!
//! Discovers the releasable packages of a Cargo workspace and the
//! dependency edges between them.

use crate::cascade::DependencyGraph;
use crate::error::{Error, Result};
use crate::package::Package;
use crate::version::Version;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Tables whose edges order releases. Dev-dependencies are left out: Cargo
/// allows dev-only cycles and they never reach a published manifest.
const DEPENDENCY_TABLES: &[&str] = &["dependencies", "build-dependencies"];

/// Packages and dependency graph of a workspace.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    /// Workspace root directory.
    pub root: PathBuf,
    /// Member packages, sorted by name.
    pub packages: Vec<Package>,
    /// Dependencies between member packages.
    pub graph: DependencyGraph,
}

impl Workspace {
    /// Scan the Cargo workspace rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if a manifest cannot be read or parsed, or the
    /// workspace has no members.
    pub fn scan(root: &Path) -> Result<Self> {
        let root_manifest = read_manifest(&root.join("Cargo.toml"))?;
        let mut member_dirs = discover_members(root, &root_manifest)?;
        if root_manifest.get("package").is_some() {
            member_dirs.insert(0, root.to_path_buf());
        }

        let mut manifests: BTreeMap<String, (PathBuf, toml::Value)> = BTreeMap::new();
        for dir in member_dirs {
            let manifest_path = dir.join("Cargo.toml");
            if !manifest_path.exists() {
                trace!(path = %dir.display(), "Skipping member without Cargo.toml");
                continue;
            }
            let manifest = if dir == root {
                root_manifest.clone()
            } else {
                read_manifest(&manifest_path)?
            };
            let Some(name) = manifest
                .get("package")
                .and_then(|p| p.get("name"))
                .and_then(|n| n.as_str())
            else {
                continue;
            };
            if is_unpublishable(&manifest) {
                debug!(package = name, "Skipping package with publish = false");
                continue;
            }
            manifests.insert(name.to_string(), (dir, manifest));
        }

        if manifests.is_empty() {
            return Err(Error::manifest(
                "No releasable packages found in workspace",
                Some(root.join("Cargo.toml")),
            ));
        }

        let names: BTreeSet<&str> = manifests.keys().map(String::as_str).collect();
        let workspace_deps = root_manifest
            .get("workspace")
            .and_then(|w| w.get("dependencies"))
            .and_then(toml::Value::as_table);
        let mut graph = DependencyGraph::new();
        let mut packages = Vec::with_capacity(manifests.len());
        for (name, (dir, manifest)) in &manifests {
            graph.add_package(name.clone());
            for dependency in member_dependencies(manifest, &names, workspace_deps) {
                graph.add_dependency(name.clone(), dependency);
            }
            packages.push(Package::new(name.clone(), dir.clone()));
        }

        debug!(
            root = %root.display(),
            packages = packages.len(),
            edges = graph.edge_count(),
            "Scanned workspace"
        );
        Ok(Self {
            root: root.to_path_buf(),
            packages,
            graph,
        })
    }

    /// Look up a package by name.
    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }
}

/// Version declared by the manifest in `package_dir`.
///
/// `version.workspace = true` resolves to `[workspace.package].version` of the
/// manifest at `root`.
///
/// # Errors
///
/// Returns an error if a manifest cannot be read or declares no valid version.
pub fn manifest_version(root: &Path, package_dir: &Path) -> Result<Version> {
    let manifest_path = package_dir.join("Cargo.toml");
    let manifest = read_manifest(&manifest_path)?;
    let declared = manifest.get("package").and_then(|p| p.get("version"));
    let inherited = declared
        .and_then(|v| v.get("workspace"))
        .and_then(toml::Value::as_bool)
        == Some(true);

    let (version, source) = if inherited {
        let root_path = root.join("Cargo.toml");
        let root_manifest = read_manifest(&root_path)?;
        let version = root_manifest
            .get("workspace")
            .and_then(|w| w.get("package"))
            .and_then(|p| p.get("version"))
            .and_then(toml::Value::as_str)
            .map(str::to_string);
        (version, root_path)
    } else {
        (
            declared.and_then(toml::Value::as_str).map(str::to_string),
            manifest_path,
        )
    };

    let version = version
        .ok_or_else(|| Error::manifest("Package declares no version", Some(source.clone())))?;
    version.parse().map_err(|e| {
        Error::manifest(
            format!("Invalid version '{version}': {e}"),
            Some(source),
        )
    })
}

fn read_manifest(path: &Path) -> Result<toml::Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::manifest(
            format!("Failed to read {}: {e}", path.display()),
            Some(path.to_path_buf()),
        )
    })?;
    toml::from_str(&content).map_err(|e| {
        Error::manifest(
            format!("Failed to parse {}: {e}", path.display()),
            Some(path.to_path_buf()),
        )
    })
}

fn string_array<'a>(value: Option<&'a toml::Value>) -> impl Iterator<Item = &'a str> {
    value
        .and_then(toml::Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(toml::Value::as_str)
}

/// Expand `[workspace].members`, honoring `[workspace].exclude`.
fn discover_members(root: &Path, manifest: &toml::Value) -> Result<Vec<PathBuf>> {
    let workspace = manifest.get("workspace");
    let excluded: BTreeSet<PathBuf> = string_array(workspace.and_then(|w| w.get("exclude")))
        .map(|e| root.join(e))
        .collect();

    let mut paths = Vec::new();
    for pattern in string_array(workspace.and_then(|w| w.get("members"))) {
        if pattern.contains(['*', '?', '[']) {
            let full_pattern = root.join(pattern);
            let pattern_str = full_pattern.to_str().ok_or_else(|| {
                Error::manifest(
                    format!(
                        "Workspace member glob pattern contains invalid UTF-8: {}",
                        full_pattern.display()
                    ),
                    Some(full_pattern.clone()),
                )
            })?;
            let matches = glob::glob(pattern_str).map_err(|e| {
                Error::manifest(
                    format!("Invalid glob pattern: {e}"),
                    Some(full_pattern.clone()),
                )
            })?;
            let mut matched: Vec<PathBuf> = matches.flatten().filter(|p| p.is_dir()).collect();
            matched.sort();
            paths.extend(matched);
        } else {
            paths.push(root.join(pattern));
        }
    }
    paths.retain(|p| !excluded.contains(p));
    paths.dedup();
    Ok(paths)
}

fn is_unpublishable(manifest: &toml::Value) -> bool {
    manifest
        .get("package")
        .and_then(|p| p.get("publish"))
        .is_some_and(|p| p.as_bool() == Some(false) || p.as_array().is_some_and(Vec::is_empty))
}

/// Workspace members a manifest depends on through local (`path`) dependencies.
///
/// `workspace = true` entries are resolved against `[workspace.dependencies]`.
/// Registry dependencies never produce an edge, even when they share a
/// member's name.
fn member_dependencies(
    manifest: &toml::Value,
    members: &BTreeSet<&str>,
    workspace_deps: Option<&toml::Table>,
) -> BTreeSet<String> {
    let mut tables: Vec<&toml::Value> = DEPENDENCY_TABLES
        .iter()
        .filter_map(|t| manifest.get(*t))
        .collect();
    // [target.'cfg(..)'.dependencies]
    if let Some(targets) = manifest.get("target").and_then(toml::Value::as_table) {
        for target in targets.values() {
            tables.extend(DEPENDENCY_TABLES.iter().filter_map(|t| target.get(*t)));
        }
    }

    tables
        .into_iter()
        .filter_map(toml::Value::as_table)
        .flat_map(|table| table.iter())
        .filter_map(|(key, spec)| local_package_name(key, spec, workspace_deps))
        .filter(|name| members.contains(name.as_str()))
        .collect()
}

/// Package name of a dependency entry when it points at a local path.
fn local_package_name(
    key: &str,
    spec: &toml::Value,
    workspace_deps: Option<&toml::Table>,
) -> Option<String> {
    let inherited = spec.get("workspace").and_then(toml::Value::as_bool) == Some(true);
    let resolved = if inherited {
        workspace_deps?.get(key)?
    } else {
        spec
    };
    resolved.get("path")?;
    let name = resolved
        .get("package")
        .or_else(|| spec.get("package"))
        .and_then(toml::Value::as_str)
        .unwrap_or(key);
    Some(name.to_string())
}
