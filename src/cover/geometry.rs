//! Millimeter-to-pixel panel geometry for spread covers
//!
//! A spread cover is laid out left to right as
//! `[back flap][back cover][spine][front cover][front flap]`, surrounded by a
//! uniform bleed. Everything here is pure arithmetic on the declared sizes and
//! the raster dimensions; no pixels are touched.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Declared physical geometry of a cover, in millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelSpec {
    /// Width of one cover panel (front and back are the same)
    pub panel_width_mm: f64,
    /// Trimmed book height
    pub height_mm: f64,
    /// Spine width (book thickness)
    pub spine_width_mm: f64,
    /// Flap width, 0 when the cover has no flaps
    pub flap_width_mm: f64,
    /// Bleed on each of the four sides
    pub bleed_mm: f64,
}

impl PanelSpec {
    pub fn new(panel_width_mm: f64, height_mm: f64, spine_width_mm: f64) -> Self {
        Self {
            panel_width_mm,
            height_mm,
            spine_width_mm,
            flap_width_mm: 0.0,
            bleed_mm: 0.0,
        }
    }

    pub fn with_flaps(mut self, flap_width_mm: f64) -> Self {
        self.flap_width_mm = flap_width_mm;
        self
    }

    pub fn with_bleed(mut self, bleed_mm: f64) -> Self {
        self.bleed_mm = bleed_mm;
        self
    }

    pub fn has_flaps(&self) -> bool {
        self.flap_width_mm > 0.0
    }

    /// Trimmed spread width: both covers, the spine and any flaps
    pub fn content_width_mm(&self) -> f64 {
        2.0 * self.flap_width_mm + 2.0 * self.panel_width_mm + self.spine_width_mm
    }

    /// Check that every dimension is finite and in range.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("panel width", self.panel_width_mm),
            ("height", self.height_mm),
            ("spine width", self.spine_width_mm),
        ];
        for (name, value) in required {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidSpec {
                    reason: format!("{} must be greater than 0 mm, got {}", name, value),
                });
            }
        }

        let optional = [("flap width", self.flap_width_mm), ("bleed", self.bleed_mm)];
        for (name, value) in optional {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidSpec {
                    reason: format!("{} must be 0 mm or more, got {}", name, value),
                });
            }
        }

        Ok(())
    }
}

/// Which raster axis fixes the millimeter-to-pixel scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleBasis {
    /// `height_px / (height_mm + 2 * bleed_mm)`
    #[default]
    Height,
    /// `width_px / (content_width_mm + 2 * bleed_mm)`
    Width,
}

/// Horizontal placement of the content band inside the raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Equal margins left and right
    #[default]
    Center,
    /// Content starts right after the left bleed
    Left,
}

/// Where the right edge of the front flap is placed.
///
/// `Raster` is the conventional placement for print covers: the front flap
/// runs to the page edge and takes up whatever width is left over.
/// `Content` is the strict variant and the default, so leftover width shows
/// up in [`PanelLayout::final_edge_slack_px`] and the margin warnings
/// instead of inside the last panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalEdge {
    /// End of the computed content band
    #[default]
    Content,
    /// Right edge of the raster, absorbing any leftover width
    Raster,
}

macro_rules! impl_mode_str {
    ($ty:ty, $what:literal, { $($name:literal => $variant:path),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    other => Err(Error::InvalidSpec {
                        reason: format!(
                            concat!("unknown ", $what, " \"{}\" (expected one of: {})"),
                            other,
                            [$($name),+].join(", ")
                        ),
                    }),
                }
            }
        }

        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $name,)+
                }
            }
        }
    };
}

impl_mode_str!(ScaleBasis, "scale basis", {
    "height" => ScaleBasis::Height,
    "width" => ScaleBasis::Width,
});

impl_mode_str!(Alignment, "alignment", {
    "center" => Alignment::Center,
    "left" => Alignment::Left,
});

impl_mode_str!(FinalEdge, "final edge", {
    "content" => FinalEdge::Content,
    "raster" => FinalEdge::Raster,
});

/// Layout strategy knobs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    pub scale_basis: ScaleBasis,
    pub alignment: Alignment,
    pub final_edge: FinalEdge,
    /// Allowed difference between the observed side margin and the bleed
    /// before a warning is attached
    pub margin_tolerance_mm: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            scale_basis: ScaleBasis::default(),
            alignment: Alignment::default(),
            final_edge: FinalEdge::default(),
            margin_tolerance_mm: 2.0,
        }
    }
}

/// One physical region of the cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PanelKind {
    BackFlap,
    Back,
    Spine,
    Front,
    FrontFlap,
}

impl PanelKind {
    /// All panels in left-to-right order
    pub const ALL: [PanelKind; 5] = [
        PanelKind::BackFlap,
        PanelKind::Back,
        PanelKind::Spine,
        PanelKind::Front,
        PanelKind::FrontFlap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PanelKind::BackFlap => "back_flap",
            PanelKind::Back => "back_cover",
            PanelKind::Spine => "spine",
            PanelKind::Front => "front_cover",
            PanelKind::FrontFlap => "front_flap",
        }
    }

    /// Member name used for PNG output
    pub fn file_name(&self) -> &'static str {
        match self {
            PanelKind::BackFlap => "back_flap.png",
            PanelKind::Back => "back_cover.png",
            PanelKind::Spine => "spine.png",
            PanelKind::Front => "front_cover.png",
            PanelKind::FrontFlap => "front_flap.png",
        }
    }

    pub fn is_flap(&self) -> bool {
        matches!(self, PanelKind::BackFlap | PanelKind::FrontFlap)
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Axis-aligned pixel rectangle, right/bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// A crop rectangle tagged with the panel it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedPanel {
    pub kind: PanelKind,
    pub rect: CropRect,
}

/// Non-fatal disagreement between the declared sizes and the raster
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutWarning {
    /// A side margin differs from the declared bleed by more than the tolerance
    MarginMismatch {
        side: &'static str,
        expected_px: f64,
        actual_px: f64,
    },
}

impl fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutWarning::MarginMismatch {
                side,
                expected_px,
                actual_px,
            } => write!(
                f,
                "{} margin is {:.1}px but the declared bleed is {:.1}px; \
                 the declared sizes may not match the PDF",
                side, actual_px, expected_px
            ),
        }
    }
}

/// The computed decomposition of one raster
#[derive(Debug, Clone, PartialEq)]
pub struct PanelLayout {
    pub raster_width: u32,
    pub raster_height: u32,
    /// Pixels per millimeter
    pub scale: f64,
    pub bleed_px: f64,
    /// Left edge of the content band before rounding
    pub x0: f64,
    pub content_width_px: f64,
    /// How far the final right edge sits past the nominal content end
    pub final_edge_slack_px: i64,
    panels: Vec<PlacedPanel>,
    pub warnings: Vec<LayoutWarning>,
}

impl PanelLayout {
    /// Present panels, left to right
    pub fn panels(&self) -> &[PlacedPanel] {
        &self.panels
    }

    pub fn rect(&self, kind: PanelKind) -> Option<CropRect> {
        self.panels.iter().find(|p| p.kind == kind).map(|p| p.rect)
    }

    pub fn has_flaps(&self) -> bool {
        self.panels.iter().any(|p| p.kind.is_flap())
    }

    /// Vertical extent shared by every panel
    pub fn band_height(&self) -> u32 {
        self.panels.first().map(|p| p.rect.height()).unwrap_or(0)
    }
}

fn mismatch(detail: String) -> Error {
    Error::GeometryMismatch { detail }
}

/// Compute the crop rectangles for a raster of `width_px` x `height_px`.
pub fn compute_layout(
    width_px: u32,
    height_px: u32,
    spec: &PanelSpec,
    options: &LayoutOptions,
) -> Result<PanelLayout> {
    spec.validate()?;
    if !options.margin_tolerance_mm.is_finite() || options.margin_tolerance_mm < 0.0 {
        return Err(Error::InvalidSpec {
            reason: format!(
                "margin tolerance must be 0 mm or more, got {}",
                options.margin_tolerance_mm
            ),
        });
    }
    if width_px == 0 || height_px == 0 {
        return Err(mismatch(format!(
            "page rendered to an empty {}x{} bitmap",
            width_px, height_px
        )));
    }

    let w = width_px as f64;
    let h = height_px as f64;

    let scale = match options.scale_basis {
        ScaleBasis::Height => h / (spec.height_mm + 2.0 * spec.bleed_mm),
        ScaleBasis::Width => w / (spec.content_width_mm() + 2.0 * spec.bleed_mm),
    };

    let flap_px = spec.flap_width_mm * scale;
    let cover_px = spec.panel_width_mm * scale;
    let spine_px = spec.spine_width_mm * scale;
    let bleed_px = spec.bleed_mm * scale;
    let content_width_px = spec.content_width_mm() * scale;

    let x0 = match options.alignment {
        Alignment::Center => (w - content_width_px) / 2.0,
        Alignment::Left => bleed_px,
    };

    tracing::debug!(
        scale,
        x0,
        content_width_px,
        bleed_px,
        basis = options.scale_basis.as_str(),
        "computed cover scale"
    );

    let top = bleed_px.round() as i64;
    let bottom = (h - bleed_px).round() as i64;
    if bottom <= top {
        return Err(mismatch(format!(
            "bleed of {:.1}px leaves no usable height in a {}px tall page",
            bleed_px, height_px
        )));
    }
    if top < 0 || bottom > height_px as i64 {
        return Err(mismatch(format!(
            "vertical band {}..{} lies outside the {}px tall page",
            top, bottom, height_px
        )));
    }

    let widths = [flap_px, cover_px, spine_px, cover_px, flap_px];
    let mut edges = [0.0f64; 6];
    edges[0] = x0;
    for (i, width) in widths.iter().enumerate() {
        edges[i + 1] = edges[i] + width;
    }
    let rounded: Vec<i64> = edges.iter().map(|e| e.round() as i64).collect();

    let content_right = rounded[5];
    if rounded[0] < 0 || content_right > width_px as i64 {
        return Err(mismatch(format!(
            "content band spans {}..{}px but the page is {}px wide \
             ({:.1} mm declared at {:.2} px/mm)",
            rounded[0],
            content_right,
            width_px,
            spec.content_width_mm(),
            scale
        )));
    }

    let final_right = match options.final_edge {
        FinalEdge::Content => content_right,
        FinalEdge::Raster => width_px as i64,
    };

    let mut panels = Vec::with_capacity(PanelKind::ALL.len());
    for (i, kind) in PanelKind::ALL.iter().copied().enumerate() {
        if kind.is_flap() && !spec.has_flaps() {
            continue;
        }

        let left = rounded[i];
        let right = if kind == PanelKind::FrontFlap {
            final_right
        } else {
            rounded[i + 1]
        };

        let rect = CropRect {
            left: left as u32,
            top: top as u32,
            right: right as u32,
            bottom: bottom as u32,
        };

        // Flaps come in pairs; a declared flap that rounds away is an error
        if rect.width() == 0 {
            return Err(mismatch(format!(
                "{} is narrower than one pixel at {:.3} px/mm",
                kind, scale
            )));
        }

        panels.push(PlacedPanel { kind, rect });
    }

    let tolerance_px = options.margin_tolerance_mm * scale;
    let mut warnings = Vec::new();
    let margins = [("left", edges[0]), ("right", w - edges[5])];
    for (side, actual_px) in margins {
        if (actual_px - bleed_px).abs() > tolerance_px {
            tracing::warn!(
                side,
                actual_px,
                expected_px = bleed_px,
                "side margin does not match declared bleed"
            );
            warnings.push(LayoutWarning::MarginMismatch {
                side,
                expected_px: bleed_px,
                actual_px,
            });
        }
    }

    Ok(PanelLayout {
        raster_width: width_px,
        raster_height: height_px,
        scale,
        bleed_px,
        x0,
        content_width_px,
        final_edge_slack_px: final_right - content_right,
        panels,
        warnings,
    })
}
