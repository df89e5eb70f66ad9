//! Finished models in the output folder and their source images

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Extensions tried when looking for a model's source image
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "JPG", "PNG"];

/// One model in the gallery
#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    /// File stem, also the export/delete id
    pub id: String,
    pub model_path: PathBuf,
    /// Model size in bytes
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Source image in the input folder, when it still exists
    pub image_path: Option<PathBuf>,
}

/// True when `id` names a single file stem and cannot leave its folder
pub fn is_plain_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && Path::new(id).components().count() == 1
}

fn source_image(input_folder: &Path, id: &str) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| input_folder.join(format!("{}.{}", id, ext)))
        .find(|path| path.is_file())
}

/// List models with extension `ply_extension`, newest first by modification time.
///
/// A missing output folder is an empty gallery.
pub fn list_models(output_folder: &Path, input_folder: &Path, ply_extension: &str) -> Result<Vec<ModelEntry>> {
    let entries = match fs::read_dir(output_folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut models = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ply_extension) {
            continue;
        }
        let metadata = fs::metadata(&path)?;
        if !metadata.is_file() {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };

        models.push(ModelEntry {
            image_path: source_image(input_folder, &id),
            id,
            model_path: path,
            size: metadata.len(),
            modified: metadata.modified()?.into(),
        });
    }

    models.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id)));
    Ok(models)
}

fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Delete a model and every matching source image; returns the removed paths.
///
/// Fails with `ModelNotFound` for ids that are not plain stems or when nothing
/// matched.
pub fn delete_model(
    output_folder: &Path,
    input_folder: &Path,
    ply_extension: &str,
    id: &str,
) -> Result<Vec<PathBuf>> {
    if !is_plain_id(id) {
        return Err(Error::ModelNotFound(id.to_string()));
    }

    let mut removed = Vec::new();
    let model = output_folder.join(format!("{}.{}", id, ply_extension));
    if remove_if_present(&model)? {
        removed.push(model);
    }
    for ext in IMAGE_EXTENSIONS {
        let image = input_folder.join(format!("{}.{}", id, ext));
        if remove_if_present(&image)? {
            removed.push(image);
        }
    }

    if removed.is_empty() {
        return Err(Error::ModelNotFound(id.to_string()));
    }
    tracing::info!("Deleted {} ({} files)", id, removed.len());
    Ok(removed)
}
