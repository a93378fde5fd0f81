//! Panel splitting for spread-layout book covers
//!
//! [`compute_layout`] maps declared millimeter sizes onto pixel crop
//! rectangles, [`split_panels`] cuts a [`PageRaster`](crate::pdf::PageRaster)
//! along them, and the `export` functions turn the result into PNG files or a
//! ZIP archive.

mod export;
mod geometry;
mod splitter;

pub use export::{
    encode_panels, encode_png, write_to_dir, write_zip, zip_bytes, EncodedPanel,
    DEFAULT_ARCHIVE_NAME,
};
pub use geometry::{
    compute_layout, Alignment, CropRect, FinalEdge, LayoutOptions, LayoutWarning, PanelKind,
    PanelLayout, PanelSpec, PlacedPanel, ScaleBasis,
};
pub use splitter::{crop, split_panels, split_panels_with, PanelImage, SplitCover};
