use super::{failure_reason, render_template, shell};
use async_trait::async_trait;
use monorel_release::{Package, Version, manifest_version};
use monorel_workflow::{Error, PublishOptions, Publisher, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Publishes by running the configured `publish.command` template.
///
/// Placeholders: `{name}`, `{version}`, `{path}` (repository-relative),
/// `{dist_tag}` and `{registry}` (empty when unset).
///
/// With the manifest check on, a package is only published when its
/// `Cargo.toml` already declares the planned version.
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    template: String,
    root: PathBuf,
    paths: HashMap<String, PathBuf>,
    check_manifest: bool,
}

impl CommandPublisher {
    pub fn new(
        template: impl Into<String>,
        root: impl Into<PathBuf>,
        packages: &[Package],
    ) -> Self {
        let root = root.into();
        let paths = packages
            .iter()
            .map(|p| {
                let relative = p.path.strip_prefix(&root).unwrap_or(&p.path);
                let relative = if relative.as_os_str().is_empty() {
                    Path::new(".")
                } else {
                    relative
                };
                (p.name.clone(), relative.to_path_buf())
            })
            .collect();
        Self {
            template: template.into(),
            root,
            paths,
            check_manifest: true,
        }
    }

    pub const fn with_manifest_check(mut self, enabled: bool) -> Self {
        self.check_manifest = enabled;
        self
    }

    fn path(&self, package: &str) -> Result<&PathBuf> {
        self.paths
            .get(package)
            .ok_or_else(|| Error::publish(package, "package is not part of the workspace"))
    }

    fn verify_manifest(&self, package: &str, version: &Version) -> Result<()> {
        let dir = self.root.join(self.path(package)?);
        let declared = manifest_version(&self.root, &dir)
            .map_err(|e| Error::publish(package, e.to_string()))?;
        if declared != *version {
            return Err(Error::publish(
                package,
                format!(
                    "Cargo.toml declares {declared} but the plan releases {version}; \
                     set the manifest version first or disable publish.check_manifest_version"
                ),
            ));
        }
        Ok(())
    }

    fn command(
        &self,
        package: &str,
        version: &Version,
        options: &PublishOptions,
    ) -> Result<String> {
        let path = self.path(package)?;
        let version = version.to_string();
        let path = path.to_string_lossy();
        Ok(render_template(
            &self.template,
            &[
                ("name", package),
                ("version", &version),
                ("path", &path),
                ("dist_tag", options.dist_tag.as_deref().unwrap_or("")),
                ("registry", options.registry.as_deref().unwrap_or("")),
            ],
        ))
    }
}

#[async_trait]
impl Publisher for CommandPublisher {
    async fn publish(
        &self,
        package: &str,
        version: &Version,
        options: &PublishOptions,
    ) -> Result<()> {
        if self.check_manifest {
            self.verify_manifest(package, version)?;
        }
        let command = self.command(package, version, options)?;
        debug!(package, %version, %command, "Publishing");
        let output = shell(&command, &self.root)
            .await
            .map_err(|e| Error::publish(package, format!("failed to run '{command}': {e}")))?;
        if !output.status.success() {
            return Err(Error::publish(package, failure_reason(&output)));
        }
        info!(package, %version, dist_tag = ?options.dist_tag, "Published");
        Ok(())
    }
}
