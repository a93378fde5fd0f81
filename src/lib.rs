//! PDF Cover Splitter Library
//!
//! Splits a spread-layout print cover PDF into one image per physical panel:
//! - [`pdf::rasterize_first_page`]: render page 1 to an RGB bitmap at 300 DPI
//! - [`cover::split_panels`]: crop the bitmap into back flap, back cover,
//!   spine, front cover and front flap, discarding the bleed
//! - [`cover::encode_panels`] / [`cover::zip_bytes`]: PNG and ZIP output
//!
//! The same operations are served as MCP tools (`split_cover`,
//! `preview_layout`) by [`server::CoverServer`].

pub mod cover;
pub mod error;
pub mod pdf;
pub mod server;
pub mod source;

pub use cover::{
    compute_layout, split_panels, split_panels_with, CropRect, LayoutOptions, PanelImage,
    PanelKind, PanelLayout, PanelSpec, SplitCover,
};
pub use error::{Error, Result};
pub use pdf::{rasterize_first_page, rasterize_first_page_with, PageRaster, RasterOptions};
pub use server::{
    run_server, run_server_with_config, run_server_with_dirs, CoverServer, PdfSource,
    ServerConfig,
};
