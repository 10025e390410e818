use crate::error::StoreError;
use std::path::Path;

/// Writes `content` next to `path` and renames it into place so readers never
/// observe a partially written file.
pub async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let write_err = |message: String| StoreError::Write {
        path: path.to_path_buf(),
        message,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| write_err(format!("create parent {}: {e}", parent.display())))?;
    }

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, content)
        .await
        .map_err(|e| write_err(format!("write temp file {}: {e}", temp_path.display())))?;

    if let Err(rename_error) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(write_err(format!("rename temp file: {rename_error}")));
    }

    Ok(())
}
