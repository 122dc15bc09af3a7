// Whole-document JSON persistence for the team store.
//
// Every save rewrites the full document: it is written to a sibling
// temporary file first and then renamed over the original, so readers of the
// file never see a partial write.

use std::path::{Path, PathBuf};

use super::error::StoreError;
use super::model::StoreData;

/// Load the store document, creating an empty one if the file is missing.
/// An unparsable document is replaced by an empty one.
pub async fn load(path: &Path) -> Result<StoreData, StoreError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No store at {}, creating an empty one", path.display());
            let data = StoreData::default();
            save(path, &data).await?;
            return Ok(data);
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&raw) {
        Ok(data) => Ok(data),
        Err(e) => {
            tracing::warn!(
                "Store at {} is not valid JSON ({e}), starting from an empty store",
                path.display()
            );
            let data = StoreData::default();
            save(path, &data).await?;
            Ok(data)
        }
    }
}

/// Persist the full document.
pub async fn save(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(data)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "store.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
