//! Python execution and package installation.

use std::path::Path;
use std::time::Duration;

use super::process::run_program;

const RUN_TIMEOUT: Duration = Duration::from_secs(60);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Write `code` to a fresh script in the workspace and run it with python3.
pub async fn run_code(code: &str, workspace: &Path) -> anyhow::Result<String> {
    tokio::fs::create_dir_all(workspace).await?;
    let name = format!("script_{}.py", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let script = workspace.join(&name);
    tokio::fs::write(&script, code).await?;

    let result = run_program("python3", &[name.as_str()], workspace, RUN_TIMEOUT).await;
    if let Err(e) = tokio::fs::remove_file(&script).await {
        tracing::debug!("Could not remove {:?}: {}", script, e);
    }
    Ok(result?.render())
}

/// Package names: letters, digits and the few characters pip specifiers use.
fn valid_package(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.[],<>=!~".contains(c))
}

/// `python3 -m pip install <packages..>`.
pub async fn install_dependency(packages: &[String], workspace: &Path) -> anyhow::Result<String> {
    if packages.is_empty() {
        anyhow::bail!("No packages given");
    }
    if let Some(bad) = packages.iter().find(|p| !valid_package(p)) {
        anyhow::bail!("Invalid package name '{}'", bad);
    }
    tokio::fs::create_dir_all(workspace).await?;

    let mut args = vec!["-m", "pip", "install", "--quiet"];
    args.extend(packages.iter().map(String::as_str));
    let out = run_program("python3", &args, workspace, INSTALL_TIMEOUT).await?;
    if out.success() {
        Ok(format!("Installed: {}", packages.join(", ")))
    } else {
        Ok(out.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_names_are_validated() {
        assert!(valid_package("pandas"));
        assert!(valid_package("numpy>=1.26"));
        assert!(valid_package("uvicorn[standard]"));
        assert!(!valid_package(""));
        assert!(!valid_package("--index-url=http://evil"));
        assert!(!valid_package("pandas; rm -rf /"));
    }

    #[tokio::test]
    async fn install_rejects_bad_names_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let err = install_dependency(&["ok".into(), "a b".into()], dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid package name 'a b'"));

        assert!(install_dependency(&[], dir.path()).await.is_err());
    }
}
