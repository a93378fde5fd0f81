//! PNG encoding and packaging of split panels

use super::geometry::PanelKind;
use super::splitter::SplitCover;
use crate::error::Result;
use image::{ImageFormat, RgbImage};
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Default file name for the packaged panels
pub const DEFAULT_ARCHIVE_NAME: &str = "split_covers.zip";

/// Order members are written to archives and directories
const ARCHIVE_ORDER: [PanelKind; 5] = [
    PanelKind::Front,
    PanelKind::Spine,
    PanelKind::Back,
    PanelKind::BackFlap,
    PanelKind::FrontFlap,
];

/// A panel encoded as PNG
#[derive(Debug, Clone)]
pub struct EncodedPanel {
    pub kind: PanelKind,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl EncodedPanel {
    pub fn file_name(&self) -> &'static str {
        self.kind.file_name()
    }
}

/// Encode an RGB image as 8-bit PNG
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}

/// Encode every present panel, in archive order
pub fn encode_panels(split: &SplitCover) -> Result<Vec<EncodedPanel>> {
    ARCHIVE_ORDER
        .iter()
        .filter_map(|kind| split.panel(*kind))
        .map(|panel| {
            Ok(EncodedPanel {
                kind: panel.kind,
                width: panel.width(),
                height: panel.height(),
                png: encode_png(&panel.image)?,
            })
        })
        .collect()
}

/// Write encoded panels into a ZIP archive using their fixed member names
pub fn write_zip<W: Write + Seek>(panels: &[EncodedPanel], writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    // PNG data is already compressed
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for panel in panels {
        zip.start_file(panel.file_name(), options)?;
        zip.write_all(&panel.png)?;
    }

    Ok(zip.finish()?)
}

/// Package encoded panels into an in-memory ZIP archive
pub fn zip_bytes(panels: &[EncodedPanel]) -> Result<Vec<u8>> {
    let cursor = write_zip(panels, Cursor::new(Vec::new()))?;
    Ok(cursor.into_inner())
}

/// Write each panel as `<dir>/<member name>`, creating `dir` if needed
pub fn write_to_dir(panels: &[EncodedPanel], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(panels.len());
    for panel in panels {
        let path = dir.join(panel.file_name());
        std::fs::write(&path, &panel.png)?;
        written.push(path);
    }

    tracing::debug!(dir = %dir.display(), files = written.len(), "wrote panel images");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cover::{split_panels, PanelSpec};
    use crate::pdf::PageRaster;
    use image::Rgb;
    use pretty_assertions::assert_eq;
    use std::io::Read;

    fn split(with_flaps: bool) -> SplitCover {
        let image = RgbImage::from_pixel(246, 206, Rgb([200, 40, 10]));
        let raster = PageRaster::from_image(image, 300.0);
        let mut spec = PanelSpec::new(60.0, 200.0, 20.0).with_bleed(3.0);
        if with_flaps {
            spec = spec.with_flaps(50.0);
        } else {
            // keep the content band centered in the same page
            spec.spine_width_mm = 120.0;
        }
        split_panels(&raster, &spec).unwrap()
    }

    fn member_names(archive: Vec<u8>) -> Vec<String> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_zip_members_without_flaps() {
        let panels = encode_panels(&split(false)).unwrap();
        let names = member_names(zip_bytes(&panels).unwrap());
        assert_eq!(names, vec!["front_cover.png", "spine.png", "back_cover.png"]);
    }

    #[test]
    fn test_zip_members_with_flaps() {
        let panels = encode_panels(&split(true)).unwrap();
        let names = member_names(zip_bytes(&panels).unwrap());
        assert_eq!(
            names,
            vec![
                "front_cover.png",
                "spine.png",
                "back_cover.png",
                "back_flap.png",
                "front_flap.png"
            ]
        );
    }

    #[test]
    fn test_png_is_lossless_rgb8() {
        let split = split(true);
        let png = encode_png(&split.spine.image).unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();

        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!(decoded.to_rgb8(), split.spine.image);
    }

    #[test]
    fn test_zip_member_content_is_png() {
        let panels = encode_panels(&split(false)).unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(zip_bytes(&panels).unwrap())).unwrap();
        let mut member = zip.by_name("spine.png").unwrap();
        let mut data = Vec::new();
        member.read_to_end(&mut data).unwrap();
        assert_eq!(&data[1..4], b"PNG");
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("covers");
        let panels = encode_panels(&split(true)).unwrap();
        let written = write_to_dir(&panels, &out).unwrap();

        assert_eq!(written.len(), 5);
        assert!(out.join("front_flap.png").exists());
        assert!(out.join("back_cover.png").exists());
    }
}
