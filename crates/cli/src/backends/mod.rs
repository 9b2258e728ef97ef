//! Command-driven implementations of the workflow collaborators.

mod host;
mod preflight;
mod publisher;

pub use host::GhReleaseHost;
pub use preflight::GitPreflight;
pub use publisher::CommandPublisher;

use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::trace;

/// Run `command` through `sh -c` in `dir`.
async fn shell(command: &str, dir: &Path) -> std::io::Result<Output> {
    trace!(command, dir = %dir.display(), "Running shell command");
    Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .output()
        .await
}

/// Last non-empty stderr line, or the exit status.
fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map_or_else(|| format!("exited with {}", output.status), str::to_string)
}

/// Substitute `{key}` placeholders in `template`.
///
/// Unknown placeholders are left untouched.
fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_template() {
        let rendered = render_template(
            "npm publish {path} --tag {dist_tag} {unknown}",
            &[("path", "packages/core"), ("dist_tag", "next")],
        );
        assert_eq!(rendered, "npm publish packages/core --tag next {unknown}");
    }

    #[test]
    fn test_render_repeated_placeholder() {
        let rendered = render_template("{name}-{name}", &[("name", "core")]);
        assert_eq!(rendered, "core-core");
    }

    #[tokio::test]
    async fn test_shell_runs_in_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker"), "x").unwrap();
        let output = shell("ls", temp.path()).await.unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("marker"));
    }

    #[tokio::test]
    async fn test_failure_reason_uses_last_stderr_line() {
        let temp = TempDir::new().unwrap();
        let output = shell("echo first >&2; echo second >&2; exit 3", temp.path())
            .await
            .unwrap();
        assert!(!output.status.success());
        assert_eq!(failure_reason(&output), "second");

        let silent = shell("exit 4", temp.path()).await.unwrap();
        assert!(failure_reason(&silent).contains('4'));
    }
}
