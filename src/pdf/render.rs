//! Page rasterizing via poppler's `pdftoppm`

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::error::{PdfError, PdfResult};
use super::types::ImageFormat;

/// Resolution that corresponds to a scale of 1.0 (PDF user space units per inch)
pub const BASE_DPI: f32 = 72.0;

/// Accepted scale range
pub const MIN_SCALE: f32 = 0.1;
pub const MAX_SCALE: f32 = 10.0;

/// Rendering capability
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render `page_number` (1-based) of `source` and return the written file.
    ///
    /// The file is `target_stem` with the format's extension appended.
    async fn render(
        &self,
        source: &Path,
        page_number: u32,
        format: ImageFormat,
        scale: f32,
        target_stem: &Path,
    ) -> PdfResult<PathBuf>;
}

/// `PageRasterizer` that spawns one `pdftoppm` process per page
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: String,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check if the executable can be started
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-v")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok()
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

/// Rendering resolution for a linear scale factor
pub fn scale_to_dpi(scale: f32) -> u32 {
    (BASE_DPI * scale.clamp(MIN_SCALE, MAX_SCALE)).round() as u32
}

fn format_flag(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "-png",
        ImageFormat::Jpeg => "-jpeg",
        ImageFormat::Tiff => "-tiff",
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn render(
        &self,
        source: &Path,
        page_number: u32,
        format: ImageFormat,
        scale: f32,
        target_stem: &Path,
    ) -> PdfResult<PathBuf> {
        let page = page_number.to_string();
        let dpi = scale_to_dpi(scale).to_string();

        let output = Command::new(&self.program)
            .arg("-f")
            .arg(&page)
            .arg("-l")
            .arg(&page)
            .arg("-r")
            .arg(&dpi)
            .arg(format_flag(format))
            .arg("-singlefile")
            .arg(source)
            .arg(target_stem)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                PdfError::RenderError(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PdfError::RenderError(format!(
                "{} failed on page {}: {}",
                self.program,
                page_number,
                stderr.trim()
            )));
        }

        let written = with_extension(target_stem, format);
        if !tokio::fs::try_exists(&written).await.unwrap_or(false) {
            return Err(PdfError::RenderError(format!(
                "{} produced no output for page {}",
                self.program, page_number
            )));
        }

        tracing::debug!(
            page = page_number,
            dpi = %dpi,
            format = %format,
            path = %written.display(),
            "Rendered page"
        );

        Ok(written)
    }
}

/// `target_stem` plus the extension the rasterizer appends for `format`
pub fn with_extension(target_stem: &Path, format: ImageFormat) -> PathBuf {
    let mut name = target_stem.as_os_str().to_owned();
    name.push(".");
    name.push(format.extension());
    PathBuf::from(name)
}
