//! First-page rasterization using PDFium

use crate::error::{Error, Result};
use image::RgbImage;
use pdfium_render::prelude::*;

/// Default render resolution for print covers
pub const DEFAULT_DPI: f32 = 300.0;

/// PDF user space unit: 1 point = 1/72 inch
const POINTS_PER_INCH: f32 = 72.0;

const MM_PER_INCH: f32 = 25.4;

/// Options for rendering the first page
#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Render resolution in dots per inch
    pub dpi: f32,
    /// Password for encrypted PDFs
    pub password: Option<String>,
    /// Refuse renders whose pixel area would exceed this
    pub max_pixels: u64,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            password: None,
            max_pixels: 200_000_000,
        }
    }
}

/// An RGB bitmap of a rendered page.
///
/// Immutable once produced. The splitter only reads from it.
#[derive(Debug, Clone)]
pub struct PageRaster {
    image: RgbImage,
    dpi: f32,
}

impl PageRaster {
    /// Wrap an existing RGB image, e.g. one decoded from a PNG.
    pub fn from_image(image: RgbImage, dpi: f32) -> Self {
        Self { image, dpi }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dpi(&self) -> f32 {
        self.dpi
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Physical page size (width, height) in millimeters implied by the DPI
    pub fn page_size_mm(&self) -> (f32, f32) {
        let px_to_mm = MM_PER_INCH / self.dpi;
        (
            self.width() as f32 * px_to_mm,
            self.height() as f32 * px_to_mm,
        )
    }
}

/// Bind to PDFium (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

fn map_load_error(err: PdfiumError) -> Error {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            Error::PasswordRequired
        }
        _ => Error::InvalidDocument {
            reason: format!("{}", err),
        },
    }
}

/// Render page 1 of a PDF at 300 DPI
pub fn rasterize_first_page(data: &[u8]) -> Result<PageRaster> {
    rasterize_first_page_with(data, &RasterOptions::default())
}

/// Render page 1 of a PDF with explicit options
pub fn rasterize_first_page_with(data: &[u8], options: &RasterOptions) -> Result<PageRaster> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidDocument {
            reason: "Missing %PDF header".to_string(),
        });
    }

    if !options.dpi.is_finite() || options.dpi <= 0.0 {
        return Err(Error::InvalidParameter {
            reason: format!("dpi must be positive, got {}", options.dpi),
        });
    }

    let pdfium = create_pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(data, options.password.as_deref())
        .map_err(map_load_error)?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(Error::EmptyDocument);
    }

    let page = pages.get(0).map_err(|e| Error::Pdfium {
        reason: format!("Failed to get page 1: {}", e),
    })?;

    let scale = options.dpi / POINTS_PER_INCH;
    let expected_width = (page.width().value * scale).round() as u64;
    let expected_height = (page.height().value * scale).round() as u64;
    let pixel_area = expected_width * expected_height;
    if pixel_area > options.max_pixels {
        return Err(Error::ImageDimensionExceeded {
            detail: format!(
                "pixel area {}x{} = {} exceeds maximum {} pixels",
                expected_width, expected_height, pixel_area, options.max_pixels
            ),
        });
    }

    tracing::debug!(
        dpi = options.dpi,
        width_pt = page.width().value,
        height_pt = page.height().value,
        "rendering first page"
    );

    let config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to render page 1: {}", e),
        })?;

    // PDFium hands back BGRA; the panels are plain RGB.
    let image = bitmap.as_image().to_rgb8();

    Ok(PageRaster::from_image(image, options.dpi))
}
