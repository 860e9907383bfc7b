//! Page rasterisation: render every page of a document to a JPEG file.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks for the whole render. `tokio::task::spawn_blocking` moves
//! that work off the async worker threads so polling and subprocess waits in
//! other runs keep making progress.
//!
//! ## Output layout
//!
//! The output directory is cleared before writing, then filled with
//! `page-1.jpg … page-N.jpg`. pdfium needs a file path, so the input bytes are
//! staged as a temporary file inside the same directory; the staging file is
//! removed before returning on every path.

use crate::config::PipelineConfig;
use crate::error::Pdf2VideoError;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use pdfium_render::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Pages written by a rasteriser, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterizedPages {
    pub count: usize,
    /// `paths[i]` is the image of page `i + 1`.
    pub paths: Vec<PathBuf>,
}

/// Turns document bytes into one image file per page.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render every page into `out_dir`, replacing anything already there.
    async fn rasterize(
        &self,
        document: &[u8],
        out_dir: &Path,
    ) -> Result<RasterizedPages, Pdf2VideoError>;
}

/// File name of the image for 1-indexed page `page_num`.
pub fn page_image_name(page_num: usize) -> String {
    format!("page-{page_num}.jpg")
}

/// Bind pdfium from `PDFIUM_LIB_PATH` (file or directory) or the system library.
pub(crate) fn bind_pdfium() -> Result<Pdfium, Pdf2VideoError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(p) => {
            let p = PathBuf::from(p);
            let lib = if p.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&p)
            } else {
                p
            };
            Pdfium::bind_to_library(&lib)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Pdf2VideoError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// pdfium-backed [`PageRasterizer`].
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    pub dpi: u32,
    /// Upper bound on either side of a rendered page.
    pub max_rendered_pixels: u32,
    pub jpeg_quality: u8,
}

impl PdfiumRasterizer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        document: &[u8],
        out_dir: &Path,
    ) -> Result<RasterizedPages, Pdf2VideoError> {
        reset_dir(out_dir).await?;

        let mut staged = tempfile::Builder::new()
            .prefix("input-")
            .suffix(".pdf")
            .tempfile_in(out_dir)
            .map_err(|e| Pdf2VideoError::workspace(out_dir, e))?;
        staged
            .write_all(document)
            .map_err(|e| Pdf2VideoError::workspace(staged.path(), e))?;

        let staged_path = staged.path().to_path_buf();
        let dir = out_dir.to_path_buf();
        let dpi = self.dpi;
        let max_pixels = self.max_rendered_pixels;
        let quality = self.jpeg_quality;

        let result = tokio::task::spawn_blocking(move || {
            render_pages_blocking(&staged_path, &dir, dpi, max_pixels, quality)
        })
        .await
        .map_err(|e| Pdf2VideoError::Internal(format!("Render task panicked: {}", e)));

        // Staging copy goes away whether or not rendering worked.
        if let Err(e) = staged.close() {
            debug!("Failed to remove staged input: {}", e);
        }

        result?
    }
}

/// Remove and recreate `dir`.
async fn reset_dir(dir: &Path) -> Result<(), Pdf2VideoError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(Pdf2VideoError::workspace(dir, e)),
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Pdf2VideoError::workspace(dir, e))
}

fn render_pages_blocking(
    pdf_path: &Path,
    out_dir: &Path,
    dpi: u32,
    max_pixels: u32,
    quality: u8,
) -> Result<RasterizedPages, Pdf2VideoError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| Pdf2VideoError::UnsupportedDocument {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(Pdf2VideoError::EmptyDocument);
    }
    info!("PDF loaded: {} pages", total_pages);

    // PDF user space is 72 units per inch.
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut paths = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Pdf2VideoError::UnsupportedDocument {
                detail: format!("page {page_num} could not be rendered: {e:?}"),
            }
        })?;
        let rgb = bitmap.as_image().into_rgb8();
        debug!("Rendered page {} → {}x{} px", page_num, rgb.width(), rgb.height());

        let path = out_dir.join(page_image_name(page_num));
        let file = std::fs::File::create(&path).map_err(|e| Pdf2VideoError::workspace(&path, e))?;
        let mut writer = std::io::BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, quality)
            .encode_image(&rgb)
            .map_err(|e| Pdf2VideoError::Internal(format!("JPEG encoding failed: {e}")))?;
        writer
            .flush()
            .map_err(|e| Pdf2VideoError::workspace(&path, e))?;

        paths.push(path);
    }

    Ok(RasterizedPages {
        count: paths.len(),
        paths,
    })
}
