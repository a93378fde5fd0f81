//! Error types for the cover splitter

use thiserror::Error;

/// Result type alias for the cover splitter
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cover splitter
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Stream could not be parsed as a PDF document
    #[error("Invalid PDF document: {reason}")]
    InvalidDocument { reason: String },

    /// Document parsed but has no pages
    #[error("PDF document has no pages")]
    EmptyDocument,

    /// PDF is password protected and no (or a wrong) password was provided
    #[error("PDF is password protected")]
    PasswordRequired,

    /// Declared panel dimensions are unusable
    #[error("Invalid panel dimensions: {reason}")]
    InvalidSpec { reason: String },

    /// A derived crop rectangle lies outside the rendered page
    #[error("Panel geometry does not fit the page: {detail}")]
    GeometryMismatch { detail: String },

    /// Source resolution error
    #[error("Failed to resolve source: {reason}")]
    SourceResolution { reason: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium binding or rendering error
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// PNG encoding error
    #[error("Image encoding failed: {0}")]
    ImageEncode(#[from] image::ImageError),

    /// ZIP packaging error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// SSRF blocked (URL resolves to private/reserved IP)
    #[error("SSRF blocked: {url}")]
    SsrfBlocked { url: String },

    /// Download too large
    #[error("Download too large: {size} bytes (max: {max_size} bytes)")]
    DownloadTooLarge { size: u64, max_size: u64 },

    /// A request parameter outside the panel geometry is unusable
    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    /// Render would exceed configured limits
    #[error("Image dimension exceeded: {detail}")]
    ImageDimensionExceeded { detail: String },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, file sizes) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidDocument { .. } => "Invalid PDF document".to_string(),
            Error::EmptyDocument => "PDF document has no pages".to_string(),
            Error::PasswordRequired => "PDF is password protected".to_string(),
            Error::InvalidSpec { reason } => format!("Invalid panel dimensions: {}", reason),
            Error::InvalidParameter { reason } => format!("Invalid parameter: {}", reason),
            Error::GeometryMismatch { detail } => {
                format!("Panel geometry does not fit the page: {}", detail)
            }
            Error::SourceResolution { .. } => "Failed to resolve PDF source".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::HttpRequest(_) => "HTTP request failed".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF rendering error".to_string(),
            Error::ImageEncode(_) => "Image encoding error".to_string(),
            Error::Archive(_) => "Archive error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::SsrfBlocked { .. } => "URL not allowed".to_string(),
            Error::DownloadTooLarge { max_size, .. } => {
                format!("Download exceeds maximum size of {} bytes", max_size)
            }
            Error::ImageDimensionExceeded { detail } => {
                format!("Image dimension exceeded: {}", detail)
            }
        }
    }

    /// Whether the caller can fix this by adjusting dimensions or bleed and retrying.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            Error::InvalidSpec { .. } | Error::GeometryMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_internal_details() {
        let err = Error::PdfNotFound {
            path: "/secret/location/cover.pdf".to_string(),
        };
        assert!(!err.client_message().contains("/secret"));

        let err = Error::Pdfium {
            reason: "FPDF_LoadLibrary failed at /opt/pdfium/lib".to_string(),
        };
        assert_eq!(err.client_message(), "PDF rendering error");
    }

    #[test]
    fn test_client_message_keeps_geometry_detail() {
        let err = Error::GeometryMismatch {
            detail: "content band is 1200px wide but the page is 1000px".to_string(),
        };
        assert!(err.client_message().contains("1200px"));
    }

    #[test]
    fn test_client_message_invalid_parameter() {
        let err = Error::InvalidParameter {
            reason: "dpi must be positive, got 0".to_string(),
        };
        assert_eq!(
            err.client_message(),
            "Invalid parameter: dpi must be positive, got 0"
        );
        assert!(!err.is_user_correctable());
    }

    #[test]
    fn test_user_correctable() {
        assert!(Error::InvalidSpec {
            reason: "height".to_string()
        }
        .is_user_correctable());
        assert!(Error::GeometryMismatch {
            detail: "x".to_string()
        }
        .is_user_correctable());
        assert!(!Error::EmptyDocument.is_user_correctable());
        assert!(!Error::InvalidDocument {
            reason: "x".to_string()
        }
        .is_user_correctable());
    }
}
