//! Page splitting: turn a [`SourceDocument`] into ordered [`PageUnit`]s.
//!
//! A PDF becomes one PNG per physical page. Anything else (a single image,
//! a CSV export, plain text) is one unit holding the whole document.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and CPU-heavy rendering.
//! Running it on a Tokio worker would stall every other page task, so the
//! whole load-and-render step moves to the blocking pool.
//!
//! ## Why cap pixels, not DPI?
//!
//! Statement pages range from receipts to ledger-size landscape sheets.
//! `max_rendered_pixels` caps the longest edge regardless of physical size,
//! which keeps memory bounded and matches what vision models read best.

use crate::config::ExtractionConfig;
use crate::document::{MediaType, PageUnit, SourceDocument};
use crate::error::DocExtractError;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Split a document into page units in page order.
pub async fn split_document(
    doc: &SourceDocument,
    config: &ExtractionConfig,
) -> Result<Vec<PageUnit>, DocExtractError> {
    if doc.media_type != MediaType::Pdf {
        debug!("'{}' is {}, using a single page unit", doc.name, doc.media_type);
        return Ok(vec![PageUnit::new(0, doc.bytes.clone(), doc.media_type)]);
    }

    let name = doc.name.clone();
    let bytes = doc.bytes.clone();
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let lib_path = config.pdfium_lib_path.clone();

    tokio::task::spawn_blocking(move || {
        render_pdf_blocking(&name, &bytes, max_pixels, password.as_deref(), lib_path.as_deref())
    })
    .await
    .map_err(|e| DocExtractError::Internal(format!("Render task panicked: {}", e)))?
}

/// Bind pdfium from an explicit location, `PDFIUM_LIB_PATH`, or the system.
///
/// A directory is searched for the platform's library file name; a file
/// path is bound as-is.
fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, DocExtractError> {
    let explicit = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("PDFIUM_LIB_PATH").ok().map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => {
            let library = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", library.display());
            Pdfium::bind_to_library(&library)
        }
        None => Pdfium::bind_to_system_library(),
    };

    bindings
        .map(Pdfium::new)
        .map_err(|e| DocExtractError::PdfiumBindingFailed(e.to_string()))
}

fn render_pdf_blocking(
    name: &str,
    bytes: &[u8],
    max_pixels: u32,
    password: Option<&str>,
    lib_path: Option<&Path>,
) -> Result<Vec<PageUnit>, DocExtractError> {
    let pdfium = bind_pdfium(lib_path)?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| classify_load_error(name, password.is_some(), &format!("{:?}", e)))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(DocExtractError::EmptyDocument {
            name: name.to_string(),
        });
    }
    info!("PDF '{}' loaded: {} pages", name, total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut units = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        let page = pages
            .get(idx as u16)
            .map_err(|e| DocExtractError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            DocExtractError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        let png = encode_png(&image).map_err(|e| DocExtractError::RasterisationFailed {
            page: idx + 1,
            detail: e.to_string(),
        })?;
        units.push(PageUnit::new(idx, png, MediaType::Png));
    }

    Ok(units)
}

/// Map a pdfium load failure onto the document error it represents.
fn classify_load_error(name: &str, had_password: bool, detail: &str) -> DocExtractError {
    if detail.to_ascii_lowercase().contains("password") {
        if had_password {
            DocExtractError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            DocExtractError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        DocExtractError::DocumentFormat {
            name: name.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Encode a rendered page losslessly; JPEG artefacts on small print hurt OCR.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
