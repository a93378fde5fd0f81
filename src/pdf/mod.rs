//! PDF processing layer
//!
//! This module renders the cover spread to a bitmap using PDFium.

mod rasterizer;

pub use rasterizer::{
    rasterize_first_page, rasterize_first_page_with, PageRaster, RasterOptions, DEFAULT_DPI,
};
