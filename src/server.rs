//! MCP Server implementation using rmcp

use crate::cover::{
    encode_panels, split_panels_with, write_to_dir, zip_bytes, Alignment, FinalEdge,
    LayoutOptions, PanelLayout, PanelSpec, PlacedPanel, ScaleBasis, DEFAULT_ARCHIVE_NAME,
};
use crate::error::Error;
use crate::pdf::{rasterize_first_page_with, PageRaster, RasterOptions, DEFAULT_DPI};
use crate::source::{resolve_base64, resolve_path, resolve_url, ResolvedPdf};
use anyhow::Result;
use base64::Engine;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MISMATCH_HINT: &str = "The declared sizes may not add up to the PDF's proportions. \
     Check the panel, spine and flap widths, the height and the bleed, then try again.";

/// Where to read the cover PDF from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the cover PDF
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
    /// URL to download the PDF from
    Url {
        /// URL of the cover PDF
        url: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\" or \"url\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )));
        };

        let string_field = |key: &str| -> std::result::Result<Option<String>, D::Error> {
            match obj.get(key) {
                None => Ok(None),
                Some(v) => v
                    .as_str()
                    .map(|s| Some(s.to_string()))
                    .ok_or_else(|| {
                        serde::de::Error::custom(format!("\"{}\" must be a string", key))
                    }),
            }
        };

        if let Some(path) = string_field("path")? {
            return Ok(PdfSource::Path { path });
        }
        if let Some(base64) = string_field("base64")? {
            return Ok(PdfSource::Base64 { base64 });
        }
        if let Some(url) = string_field("url")? {
            return Ok(PdfSource::Url { url });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"base64\" or \"url\", but got keys: {:?}",
            keys
        )))
    }
}

/// Security and resource configuration for the cover splitter server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories input and output paths must stay within (empty = unrestricted)
    pub resource_dirs: Vec<String>,
    /// Allow URLs that resolve to private/reserved IPs (default: false)
    pub allow_private_urls: bool,
    /// Maximum download size in bytes for URL sources (default: 100MB)
    pub max_download_bytes: u64,
    /// Render resolution used when a request does not set one (default: 300)
    pub dpi: f32,
    /// Highest resolution a request may ask for (default: 1200)
    pub max_dpi: f32,
    /// Maximum total pixel area of the rendered page (default: 200_000_000)
    pub max_raster_pixels: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            allow_private_urls: false,
            max_download_bytes: 100 * 1024 * 1024, // 100MB
            dpi: DEFAULT_DPI,
            max_dpi: 1200.0,
            max_raster_pixels: 200_000_000,
        }
    }
}

/// Cover splitter MCP server
#[derive(Clone)]
pub struct CoverServer {
    tool_router: ToolRouter<Self>,
    config: Arc<ServerConfig>,
}

// ============================================================================
// Shared request/response types
// ============================================================================

/// Declared physical cover geometry and layout strategy
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CoverGeometryParams {
    /// Width of one cover panel in mm (front and back are the same size)
    pub panel_width_mm: f64,
    /// Trimmed book height in mm
    pub height_mm: f64,
    /// Spine width in mm
    pub spine_width_mm: f64,
    /// Flap width in mm, 0 for covers without flaps
    #[serde(default)]
    pub flap_width_mm: f64,
    /// Bleed on each side in mm
    #[serde(default)]
    pub bleed_mm: f64,
    /// Axis used to derive px/mm: "height" (default) or "width"
    #[serde(default)]
    pub scale_basis: Option<String>,
    /// Content placement: "center" (default) or "left"
    #[serde(default)]
    pub alignment: Option<String>,
    /// Right edge of the front flap: "content" (default) or "raster"
    #[serde(default)]
    pub final_edge: Option<String>,
    /// Margin difference in mm that triggers a warning (default: 2)
    #[serde(default)]
    pub margin_tolerance_mm: Option<f64>,
}

impl CoverGeometryParams {
    pub fn spec(&self) -> PanelSpec {
        PanelSpec::new(self.panel_width_mm, self.height_mm, self.spine_width_mm)
            .with_flaps(self.flap_width_mm)
            .with_bleed(self.bleed_mm)
    }

    pub fn layout_options(&self) -> crate::error::Result<LayoutOptions> {
        let defaults = LayoutOptions::default();
        Ok(LayoutOptions {
            scale_basis: parse_or::<ScaleBasis>(&self.scale_basis, defaults.scale_basis)?,
            alignment: parse_or::<Alignment>(&self.alignment, defaults.alignment)?,
            final_edge: parse_or::<FinalEdge>(&self.final_edge, defaults.final_edge)?,
            margin_tolerance_mm: self
                .margin_tolerance_mm
                .unwrap_or(defaults.margin_tolerance_mm),
        })
    }
}

fn parse_or<T>(value: &Option<String>, default: T) -> crate::error::Result<T>
where
    T: std::str::FromStr<Err = Error>,
{
    value.as_deref().map_or(Ok(default), str::parse)
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct RasterInfo {
    /// Rendered width in pixels
    pub width: u32,
    /// Rendered height in pixels
    pub height: u32,
    pub dpi: f32,
    /// Page width in mm implied by the DPI
    pub width_mm: f32,
    /// Page height in mm implied by the DPI
    pub height_mm: f32,
}

impl From<&PageRaster> for RasterInfo {
    fn from(raster: &PageRaster) -> Self {
        let (width_mm, height_mm) = raster.page_size_mm();
        Self {
            width: raster.width(),
            height: raster.height(),
            dpi: raster.dpi(),
            width_mm,
            height_mm,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PanelInfo {
    /// Panel name (back_flap, back_cover, spine, front_cover, front_flap)
    pub name: String,
    /// Member name used in the archive / output directory
    pub file_name: String,
    /// Crop rectangle in page pixels: [left, top, right, bottom]
    pub rect: [u32; 4],
    pub width: u32,
    pub height: u32,
    /// Base64 encoded PNG (only with include_images)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_base64: Option<String>,
    /// Written file path (only with output_dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<&PlacedPanel> for PanelInfo {
    fn from(placed: &PlacedPanel) -> Self {
        let rect = placed.rect;
        Self {
            name: placed.kind.name().to_string(),
            file_name: placed.kind.file_name().to_string(),
            rect: [rect.left, rect.top, rect.right, rect.bottom],
            width: rect.width(),
            height: rect.height(),
            data_base64: None,
            path: None,
        }
    }
}

fn layout_warnings(layout: &PanelLayout) -> Vec<String> {
    layout.warnings.iter().map(ToString::to_string).collect()
}

fn hint_for(err: &Error) -> Option<String> {
    err.is_user_correctable().then(|| MISMATCH_HINT.to_string())
}

// ============================================================================
// Request/Response types for split_cover
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SplitCoverParams {
    /// Spread cover PDF to split
    pub source: PdfSource,
    #[serde(flatten)]
    pub geometry: CoverGeometryParams,
    /// Render resolution (default: 300)
    #[serde(default)]
    pub dpi: Option<f32>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
    /// Directory to write one PNG per panel into
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Path of a ZIP archive to write all panels into (e.g. "out/split_covers.zip")
    #[serde(default)]
    pub output_zip: Option<String>,
    /// Include base64 encoded PNGs in the response
    #[serde(default)]
    pub include_images: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SplitCoverResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raster: Option<RasterInfo>,
    /// Pixels per millimeter used for the split
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_px_per_mm: Option<f64>,
    /// Panels left to right
    pub panels: Vec<PanelInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

// ============================================================================
// Request/Response types for preview_layout
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PreviewLayoutParams {
    /// Spread cover PDF to measure
    pub source: PdfSource,
    #[serde(flatten)]
    pub geometry: CoverGeometryParams,
    /// Render resolution (default: 300)
    #[serde(default)]
    pub dpi: Option<f32>,
    /// Password for encrypted PDFs
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PreviewLayoutResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raster: Option<RasterInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_px_per_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bleed_px: Option<f64>,
    /// Width of the content band (covers, spine, flaps) in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_width_px: Option<f64>,
    pub panels: Vec<PanelInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl CoverServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new CoverServer with specified resource directories
    pub fn with_resource_dirs(dirs: Vec<String>) -> Self {
        Self::with_config(ServerConfig {
            resource_dirs: dirs,
            ..ServerConfig::default()
        })
    }

    /// Create a new CoverServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Split a spread cover PDF into panel images
    #[tool(
        description = "Split a single-page spread cover PDF (back flap, back cover, spine, front cover, front flap, left to right) into one PNG per panel, removing the bleed.

Dimensions are in millimeters: panel_width_mm (one cover), height_mm, spine_width_mm, flap_width_mm (0 = no flaps), bleed_mm.
Options:
- scale_basis: \"height\" (default, px/mm from height + 2*bleed) or \"width\"
- alignment: \"center\" (default) or \"left\"
- final_edge: \"content\" (default) or \"raster\" (front flap extends to the page edge)
- output_dir: write back_cover.png, spine.png, front_cover.png (+ back_flap.png, front_flap.png)
- output_zip: write the same files into a ZIP archive
- include_images: return base64 PNGs in the response

Source format: one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"} or {\"base64\": \"...\"}"
    )]
    async fn split_cover(&self, Parameters(params): Parameters<SplitCoverParams>) -> String {
        let result = self
            .process_split_cover(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "split_cover failed");
                SplitCoverResult {
                    source: Self::source_name(&params.source),
                    raster: None,
                    scale_px_per_mm: None,
                    panels: vec![],
                    zip_path: None,
                    warnings: vec![],
                    hint: hint_for(&e),
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }

    /// Compute panel crop rectangles without producing images
    #[tool(
        description = "Dry run of split_cover: renders the first page, reports its size in pixels and millimeters, and returns the crop rectangle of every panel plus any margin warnings. Use it to check that the declared dimensions match the PDF before splitting.

Takes the same dimension and layout options as split_cover.

Source format: one of {\"path\": \"/absolute/path.pdf\"}, {\"url\": \"https://...\"} or {\"base64\": \"...\"}"
    )]
    async fn preview_layout(&self, Parameters(params): Parameters<PreviewLayoutParams>) -> String {
        let result = self
            .process_preview_layout(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "preview_layout failed");
                PreviewLayoutResult {
                    source: Self::source_name(&params.source),
                    raster: None,
                    scale_px_per_mm: None,
                    bleed_px: None,
                    content_width_px: None,
                    panels: vec![],
                    warnings: vec![],
                    hint: hint_for(&e),
                    error: Some(e.client_message()),
                }
            });

        let response = serde_json::json!({ "results": [result] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }
}

impl CoverServer {
    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
            PdfSource::Url { url } => url.clone(),
        }
    }

    async fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<ResolvedPdf> {
        match source {
            PdfSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                resolve_path(path)
            }
            PdfSource::Base64 { base64 } => resolve_base64(base64),
            PdfSource::Url { url } => {
                resolve_url(
                    url,
                    self.config.allow_private_urls,
                    self.config.max_download_bytes,
                )
                .await
            }
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let denied = || Error::PathAccessDenied {
            path: path.to_string(),
        };
        let canonical = std::fs::canonicalize(path).map_err(|_| denied())?;

        if self.is_within_resource_dirs(&canonical) {
            Ok(canonical)
        } else {
            Err(denied())
        }
    }

    /// Validate that an output path is within allowed resource directories.
    /// Only the parent is canonicalized since the target may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let denied = || Error::PathAccessDenied {
            path: path.to_string(),
        };
        let path_obj = Path::new(path);
        let parent = path_obj
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let file_name = path_obj.file_name().ok_or_else(denied)?;

        let canonical_parent = std::fs::canonicalize(parent).map_err(|_| denied())?;
        let canonical_target = canonical_parent.join(file_name);

        if self.is_within_resource_dirs(&canonical_target) {
            Ok(canonical_target)
        } else {
            Err(denied())
        }
    }

    fn is_within_resource_dirs(&self, canonical: &Path) -> bool {
        self.config.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|canonical_dir| canonical.starts_with(canonical_dir))
                .unwrap_or(false)
        })
    }

    fn raster_options(
        &self,
        dpi: Option<f32>,
        password: &Option<String>,
    ) -> crate::error::Result<RasterOptions> {
        let dpi = dpi.unwrap_or(self.config.dpi);
        if !dpi.is_finite() || dpi <= 0.0 {
            return Err(Error::InvalidParameter {
                reason: format!("dpi must be a positive number, got {}", dpi),
            });
        }
        if dpi > self.config.max_dpi {
            return Err(Error::ImageDimensionExceeded {
                detail: format!("dpi {} is above the limit of {}", dpi, self.config.max_dpi),
            });
        }

        Ok(RasterOptions {
            dpi,
            password: password.clone(),
            max_pixels: self.config.max_raster_pixels,
        })
    }

    pub async fn process_split_cover(
        &self,
        params: &SplitCoverParams,
    ) -> crate::error::Result<SplitCoverResult> {
        let spec = params.geometry.spec();
        spec.validate()?;
        let layout_options = params.geometry.layout_options()?;
        let raster_options = self.raster_options(params.dpi, &params.password)?;

        let output_dir = params
            .output_dir
            .as_deref()
            .map(|dir| self.validate_output_path_access(dir))
            .transpose()?;
        let output_zip = params
            .output_zip
            .as_deref()
            .map(|path| self.validate_output_path_access(path))
            .transpose()?;
        let needs_png = params.include_images || output_dir.is_some() || output_zip.is_some();

        let resolved = self.resolve_source(&params.source).await?;
        let source_name = resolved.source_name;
        let data = resolved.data;

        let (raster_info, split, encoded) = tokio::task::spawn_blocking(move || {
            let raster = rasterize_first_page_with(&data, &raster_options)?;
            let split = split_panels_with(&raster, &spec, &layout_options)?;
            let encoded = if needs_png {
                encode_panels(&split)?
            } else {
                Vec::new()
            };
            Ok::<_, Error>((RasterInfo::from(&raster), split, encoded))
        })
        .await
        .map_err(|e| Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        let written = match &output_dir {
            Some(dir) => write_to_dir(&encoded, dir)?,
            None => Vec::new(),
        };

        let zip_path = match &output_zip {
            Some(path) => {
                let target = if path.is_dir() {
                    path.join(DEFAULT_ARCHIVE_NAME)
                } else {
                    path.clone()
                };
                if let Some(parent) = target.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::write(&target, zip_bytes(&encoded)?)?;
                Some(target.display().to_string())
            }
            None => None,
        };

        let engine = base64::engine::general_purpose::STANDARD;
        let panels = split
            .layout
            .panels()
            .iter()
            .map(|placed| {
                let mut info = PanelInfo::from(placed);
                let encoded_panel = encoded.iter().find(|e| e.kind == placed.kind);
                if params.include_images {
                    info.data_base64 = encoded_panel.map(|e| engine.encode(&e.png));
                }
                info.path = written
                    .iter()
                    .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(placed.kind.file_name()))
                    .map(|p| p.display().to_string());
                info
            })
            .collect();

        Ok(SplitCoverResult {
            source: source_name,
            raster: Some(raster_info),
            scale_px_per_mm: Some(split.layout.scale),
            panels,
            zip_path,
            warnings: layout_warnings(&split.layout),
            error: None,
            hint: None,
        })
    }

    pub async fn process_preview_layout(
        &self,
        params: &PreviewLayoutParams,
    ) -> crate::error::Result<PreviewLayoutResult> {
        let spec = params.geometry.spec();
        spec.validate()?;
        let layout_options = params.geometry.layout_options()?;
        let raster_options = self.raster_options(params.dpi, &params.password)?;

        let resolved = self.resolve_source(&params.source).await?;
        let source_name = resolved.source_name;
        let data = resolved.data;

        let (raster_info, layout) = tokio::task::spawn_blocking(move || {
            let raster = rasterize_first_page_with(&data, &raster_options)?;
            let layout = crate::cover::compute_layout(
                raster.width(),
                raster.height(),
                &spec,
                &layout_options,
            )?;
            Ok::<_, Error>((RasterInfo::from(&raster), layout))
        })
        .await
        .map_err(|e| Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })??;

        Ok(PreviewLayoutResult {
            source: source_name,
            raster: Some(raster_info),
            scale_px_per_mm: Some(layout.scale),
            bleed_px: Some(layout.bleed_px),
            content_width_px: Some(layout.content_width_px),
            panels: layout.panels().iter().map(PanelInfo::from).collect(),
            warnings: layout_warnings(&layout),
            error: None,
            hint: None,
        })
    }
}

impl Default for CoverServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for CoverServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Cover splitter: cuts a spread-layout book cover PDF into back flap, back cover, \
                 spine, front cover and front flap images. Run preview_layout first to check \
                 the declared millimeter sizes against the PDF, then split_cover."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server without resource directories
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with specified resource directories
pub async fn run_server_with_dirs(resource_dirs: Vec<String>) -> Result<()> {
    run_server_with_config(ServerConfig {
        resource_dirs,
        ..ServerConfig::default()
    })
    .await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = CoverServer::with_config(config);

    tracing::info!("Cover splitter server ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
