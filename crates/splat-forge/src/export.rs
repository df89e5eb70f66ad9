//! Export of finished models as `.splat` buffers and self-contained HTML

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::path::Path;

use crate::codec::{encode, read_ply_file};
use crate::error::Result;

/// Read a reconstruction `.ply` and encode it.
///
/// Malformed files fail before anything is encoded.
pub fn encode_ply_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let ply_size = fs::metadata(path)?.len();
    let points = read_ply_file(path)?;
    let splat = encode(&points);

    let saved = if ply_size > 0 {
        100 - (splat.len() as u64 * 100 / ply_size).min(100)
    } else {
        0
    };
    tracing::info!(
        "Encoded {}: {} points, PLY {:.1}MB -> splat {:.1}MB ({}% smaller)",
        path.display(),
        points.len(),
        ply_size as f64 / 1024.0 / 1024.0,
        splat.len() as f64 / 1024.0 / 1024.0,
        saved
    );

    Ok(splat)
}

/// Viewer template and the two scripts it loads
#[derive(Debug, Clone, Copy)]
pub struct ShareAssets<'a> {
    /// HTML with `{{MODEL_DATA}}`, `{{MODEL_NAME}}`, `{{THREE_DATA_URL}}`
    /// and `{{SPLATS_DATA_URL}}` placeholders
    pub template: &'a str,
    pub three_js: &'a [u8],
    pub splats_js: &'a [u8],
}

fn script_data_url(source: &[u8]) -> String {
    format!("data:text/javascript;base64,{}", STANDARD.encode(source))
}

/// Fill the viewer template so the page works offline
pub fn render_share_document(model_name: &str, splat: &[u8], assets: &ShareAssets<'_>) -> String {
    let html = assets
        .template
        .replace("{{MODEL_DATA}}", &STANDARD.encode(splat))
        .replace("{{MODEL_NAME}}", model_name)
        .replace("{{THREE_DATA_URL}}", &script_data_url(assets.three_js))
        .replace("{{SPLATS_DATA_URL}}", &script_data_url(assets.splats_js));

    tracing::info!(
        "Share document for {}: {:.1}MB",
        model_name,
        html.len() as f64 / 1024.0 / 1024.0
    );
    html
}

/// Download name for a share document
pub fn share_filename(model_id: &str) -> String {
    format!("{}_share.html", model_id)
}
