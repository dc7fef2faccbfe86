//! Page fetching and file downloads.

use std::path::Path;
use std::time::Duration;

use crate::util::truncate_with_marker;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// HTML beyond this is cut before it reaches the model.
const MAX_PAGE_BYTES: usize = 200_000;

/// GET `url` and return its body. No JavaScript is executed.
pub async fn render_page(http: &reqwest::Client, url: &str) -> anyhow::Result<String> {
    tracing::info!("Fetching page {}", url);
    let response = http.get(url).timeout(FETCH_TIMEOUT).send().await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        anyhow::bail!("HTTP {} fetching {}: {}", status, url, truncate_with_marker(&text, 500, "..."));
    }
    Ok(truncate_with_marker(&text, MAX_PAGE_BYTES, "...[TRUNCATED]"))
}

/// Last path segment of `url`, or a generated name.
fn file_name_for(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("download_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]))
}

/// Save `url` into the workspace and report where it went.
pub async fn download_file(
    http: &reqwest::Client,
    url: &str,
    filename: Option<&str>,
    workspace: &Path,
) -> anyhow::Result<String> {
    let name = filename
        .map(str::to_string)
        .unwrap_or_else(|| file_name_for(url));
    // Keep downloads inside the workspace.
    let name = Path::new(&name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("Invalid filename '{}'", name))?;

    tracing::info!("Downloading {} as {}", url, name);
    let response = http.get(url).timeout(DOWNLOAD_TIMEOUT).send().await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("HTTP {} downloading {}", status, url);
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let bytes = response.bytes().await?;

    tokio::fs::create_dir_all(workspace).await?;
    let path = workspace.join(&name);
    tokio::fs::write(&path, &bytes).await?;

    Ok(format!(
        "Saved {} bytes ({}) to {}",
        bytes.len(),
        content_type,
        path.display()
    ))
}
