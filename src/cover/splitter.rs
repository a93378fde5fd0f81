//! Cropping a rendered spread into its panels

use super::geometry::{compute_layout, CropRect, LayoutOptions, PanelKind, PanelLayout, PanelSpec};
use crate::error::{Error, Result};
use crate::pdf::PageRaster;
use image::RgbImage;

/// Pixels of one panel
#[derive(Debug, Clone, PartialEq)]
pub struct PanelImage {
    pub kind: PanelKind,
    /// Where the panel was cut from the page raster
    pub rect: CropRect,
    pub image: RgbImage,
}

impl PanelImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// All panels cut from one cover
#[derive(Debug, Clone)]
pub struct SplitCover {
    pub back_flap: Option<PanelImage>,
    pub back: PanelImage,
    pub spine: PanelImage,
    pub front: PanelImage,
    pub front_flap: Option<PanelImage>,
    pub layout: PanelLayout,
}

impl SplitCover {
    /// Present panels, left to right
    pub fn panels(&self) -> impl Iterator<Item = &PanelImage> {
        self.back_flap
            .iter()
            .chain([&self.back, &self.spine, &self.front])
            .chain(self.front_flap.iter())
    }

    pub fn panel(&self, kind: PanelKind) -> Option<&PanelImage> {
        self.panels().find(|p| p.kind == kind)
    }

    /// 3 without flaps, 5 with
    pub fn panel_count(&self) -> usize {
        self.panels().count()
    }
}

/// Copy `rect` out of the raster. Out-of-bounds rectangles are an error, never clamped.
pub fn crop(raster: &PageRaster, rect: CropRect) -> Result<RgbImage> {
    if rect.left > rect.right
        || rect.top > rect.bottom
        || rect.right > raster.width()
        || rect.bottom > raster.height()
    {
        return Err(Error::GeometryMismatch {
            detail: format!(
                "crop ({}, {})..({}, {}) is outside the {}x{} page",
                rect.left,
                rect.top,
                rect.right,
                rect.bottom,
                raster.width(),
                raster.height()
            ),
        });
    }

    Ok(image::imageops::crop_imm(
        raster.image(),
        rect.left,
        rect.top,
        rect.width(),
        rect.height(),
    )
    .to_image())
}

/// Split a rendered cover with the default layout strategy
pub fn split_panels(raster: &PageRaster, spec: &PanelSpec) -> Result<SplitCover> {
    split_panels_with(raster, spec, &LayoutOptions::default())
}

/// Split a rendered cover with an explicit layout strategy.
///
/// Either every present panel is produced or an error is returned.
pub fn split_panels_with(
    raster: &PageRaster,
    spec: &PanelSpec,
    options: &LayoutOptions,
) -> Result<SplitCover> {
    let layout = compute_layout(raster.width(), raster.height(), spec, options)?;

    let mut back_flap = None;
    let mut back = None;
    let mut spine = None;
    let mut front = None;
    let mut front_flap = None;

    for placed in layout.panels() {
        let panel = PanelImage {
            kind: placed.kind,
            rect: placed.rect,
            image: crop(raster, placed.rect)?,
        };
        let slot = match placed.kind {
            PanelKind::BackFlap => &mut back_flap,
            PanelKind::Back => &mut back,
            PanelKind::Spine => &mut spine,
            PanelKind::Front => &mut front,
            PanelKind::FrontFlap => &mut front_flap,
        };
        *slot = Some(panel);
    }

    let missing = |kind: PanelKind| Error::GeometryMismatch {
        detail: format!("{} could not be placed on the page", kind),
    };

    let split = SplitCover {
        back_flap,
        back: back.ok_or_else(|| missing(PanelKind::Back))?,
        spine: spine.ok_or_else(|| missing(PanelKind::Spine))?,
        front: front.ok_or_else(|| missing(PanelKind::Front))?,
        front_flap,
        layout,
    };

    tracing::info!(
        panels = split.panel_count(),
        width = raster.width(),
        height = raster.height(),
        scale = split.layout.scale,
        "split cover into panels"
    );

    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use pretty_assertions::assert_eq;

    /// A raster whose pixel at (x, y) encodes its own coordinates
    fn coordinate_raster(width: u32, height: u32) -> PageRaster {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x / 256) as u8) ^ ((y / 256) as u8)])
        });
        PageRaster::from_image(image, 300.0)
    }

    #[test]
    fn test_three_panels_without_flaps() {
        let raster = coordinate_raster(1000, 1400);
        let spec = PanelSpec::new(60.0, 200.0, 20.0);
        let split = split_panels(&raster, &spec).unwrap();

        assert_eq!(split.panel_count(), 3);
        assert!(split.back_flap.is_none());
        assert!(split.front_flap.is_none());
        assert_eq!(split.back.width(), 420);
        assert_eq!(split.spine.width(), 140);
        assert_eq!(split.front.width(), 420);
        assert!(split.panels().all(|p| p.height() == 1400));
    }

    #[test]
    fn test_five_panels_with_flaps() {
        let raster = coordinate_raster(2460, 2060);
        let spec = PanelSpec::new(60.0, 200.0, 20.0)
            .with_flaps(50.0)
            .with_bleed(3.0);
        let split = split_panels(&raster, &spec).unwrap();

        assert_eq!(split.panel_count(), 5);
        let kinds: Vec<PanelKind> = split.panels().map(|p| p.kind).collect();
        assert_eq!(kinds, PanelKind::ALL.to_vec());

        let flap = split.back_flap.as_ref().unwrap();
        assert_eq!(flap.width(), 500);
        assert_eq!(split.front_flap.as_ref().unwrap().width(), 500);
        assert!(split.panels().all(|p| p.height() == 2000));
    }

    #[test]
    fn test_panel_pixels_come_from_their_rect() {
        let raster = coordinate_raster(1000, 1400);
        let spec = PanelSpec::new(60.0, 200.0, 20.0);
        let split = split_panels(&raster, &spec).unwrap();

        // spine spans x = 430..570
        let spine = &split.spine;
        assert_eq!(spine.rect.left, 430);
        assert_eq!(spine.image.get_pixel(0, 0), raster.image().get_pixel(430, 0));
        assert_eq!(
            spine.image.get_pixel(139, 1399),
            raster.image().get_pixel(569, 1399)
        );
    }

    #[test]
    fn test_rects_do_not_overlap() {
        let raster = coordinate_raster(3201, 1364);
        let spec = PanelSpec::new(152.0, 225.0, 20.0)
            .with_flaps(100.0)
            .with_bleed(3.0);
        let split = split_panels(&raster, &spec).unwrap();

        let rects: Vec<CropRect> = split.panels().map(|p| p.rect).collect();
        for pair in rects.windows(2) {
            assert!(pair[0].right <= pair[1].left);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let raster = coordinate_raster(2460, 2060);
        let spec = PanelSpec::new(60.0, 200.0, 20.0)
            .with_flaps(50.0)
            .with_bleed(3.0);
        let first = split_panels(&raster, &spec).unwrap();
        let second = split_panels(&raster, &spec).unwrap();

        for (a, b) in first.panels().zip(second.panels()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_mismatched_dimensions_fail_without_output() {
        let raster = coordinate_raster(1000, 1400);
        let spec = PanelSpec::new(200.0, 200.0, 100.0);
        let result = split_panels(&raster, &spec);
        assert!(matches!(result, Err(Error::GeometryMismatch { .. })));
    }

    #[test]
    fn test_invalid_spec() {
        let raster = coordinate_raster(1000, 1400);
        let spec = PanelSpec::new(0.0, 200.0, 0.0);
        let result = split_panels(&raster, &spec);
        assert!(matches!(result, Err(Error::InvalidSpec { .. })));
    }

    #[test]
    fn test_crop_out_of_bounds_is_not_clamped() {
        let raster = coordinate_raster(100, 100);
        let rect = CropRect {
            left: 50,
            top: 0,
            right: 120,
            bottom: 100,
        };
        assert!(matches!(
            crop(&raster, rect),
            Err(Error::GeometryMismatch { .. })
        ));
    }

    #[test]
    fn test_panel_lookup() {
        let raster = coordinate_raster(1000, 1400);
        let spec = PanelSpec::new(60.0, 200.0, 20.0);
        let split = split_panels(&raster, &spec).unwrap();

        assert!(split.panel(PanelKind::Spine).is_some());
        assert!(split.panel(PanelKind::FrontFlap).is_none());
    }
}
