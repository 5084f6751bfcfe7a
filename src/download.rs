//! Fetches the source document into the corpus directory.

use crate::error::{EvalError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Download `url` to `data_dir/file_name`, creating the directory if needed.
///
/// An existing file is kept unless `force` is set.
pub async fn download_source(
    url: &str,
    data_dir: &Path,
    file_name: &str,
    force: bool,
) -> Result<PathBuf> {
    let output_path = data_dir.join(file_name);

    if output_path.is_file() && !force {
        info!(
            "Source already present at {}, skipping download",
            output_path.display()
        );
        return Ok(output_path);
    }

    fs::create_dir_all(data_dir).map_err(|e| EvalError::io(data_dir, e))?;

    info!("Downloading {} to {}", url, output_path.display());
    let response = reqwest::get(url).await?;

    if !response.status().is_success() {
        return Err(EvalError::Http(format!(
            "Failed to download {}: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response.bytes().await?;
    fs::write(&output_path, &bytes).map_err(|e| EvalError::io(&output_path, e))?;

    info!(
        "Downloaded {:.1} KB to {}",
        bytes.len() as f64 / 1024.0,
        output_path.display()
    );
    Ok(output_path)
}
