use std::path::Path;

/// Replace `path` in one step: write a sibling temp file, then rename it over the target.
///
/// Readers see either the old or the new content, never a partial write. Permissions of an
/// existing target carry over to the replacement.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, contents).await?;
    let replaced = replace_with(&tmp, path).await;
    if replaced.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    replaced
}

async fn replace_with(tmp: &Path, path: &Path) -> std::io::Result<()> {
    if let Ok(meta) = tokio::fs::metadata(path).await {
        tokio::fs::set_permissions(tmp, meta.permissions()).await?;
    }
    tokio::fs::rename(tmp, path).await
}
