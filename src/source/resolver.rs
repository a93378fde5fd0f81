//! Source resolution for cover PDFs

use crate::error::{Error, Result};
use base64::Engine;
use futures_util::StreamExt;
use std::net::IpAddr;
use std::path::Path;

/// Raw PDF bytes plus a display name for logs and responses
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
}

fn check_pdf_header(data: &[u8], origin: &str) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidDocument {
            reason: format!("{} is not a PDF file", origin),
        });
    }
    Ok(())
}

/// Read a PDF from disk
pub fn resolve_path<P: AsRef<Path>>(path: P) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read(path)?;
    check_pdf_header(&data, "File")?;

    Ok(ResolvedPdf {
        data,
        source_name: path.display().to_string(),
    })
}

/// Decode an inline base64 PDF
pub fn resolve_base64(base64_data: &str) -> Result<ResolvedPdf> {
    let data = base64::engine::general_purpose::STANDARD.decode(base64_data.trim())?;
    check_pdf_header(&data, "Decoded data")?;

    Ok(ResolvedPdf {
        data,
        source_name: "<base64>".to_string(),
    })
}

/// Check if an IP address is private/reserved (loopback, link-local, private ranges, etc.)
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // CGNAT 100.64/10
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local, fe80::/10 link-local
                || (first & 0xFE00) == 0xFC00
                || (first & 0xFFC0) == 0xFE80
        }
    }
}

/// Refuse URLs whose host resolves to a private or reserved address
async fn check_ssrf(url_str: &str) -> Result<()> {
    let parsed = url::Url::parse(url_str).map_err(|e| Error::SourceResolution {
        reason: format!("Invalid URL: {}", e),
    })?;

    let host = parsed.host_str().ok_or_else(|| Error::SourceResolution {
        reason: "URL has no host".to_string(),
    })?;
    let port = parsed.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::SourceResolution {
            reason: format!("DNS resolution failed for {}: {}", host, e),
        })?;

    for addr in addrs {
        if is_private_ip(&addr.ip()) {
            return Err(Error::SsrfBlocked {
                url: url_str.to_string(),
            });
        }
    }

    Ok(())
}

/// Download a PDF with SSRF protection and a size cap enforced while streaming
pub async fn resolve_url(
    url: &str,
    allow_private_urls: bool,
    max_download_bytes: u64,
) -> Result<ResolvedPdf> {
    if !allow_private_urls {
        check_ssrf(url).await?;
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?;

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(Error::SourceResolution {
            reason: format!("HTTP request failed with status: {}", response.status()),
        });
    }

    let too_large = |size: u64| Error::DownloadTooLarge {
        size,
        max_size: max_download_bytes,
    };

    if let Some(content_length) = response.content_length() {
        if content_length > max_download_bytes {
            return Err(too_large(content_length));
        }
    }

    let mut data = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
        if data.len() as u64 > max_download_bytes {
            return Err(too_large(data.len() as u64));
        }
    }

    check_pdf_header(&data, "Downloaded data")?;
    tracing::debug!(url, bytes = data.len(), "downloaded cover PDF");

    Ok(ResolvedPdf {
        data,
        source_name: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_resolve_base64_not_pdf() {
        let result = resolve_base64("SGVsbG8gV29ybGQ="); // "Hello World"
        assert!(matches!(result, Err(Error::InvalidDocument { .. })));
    }

    #[test]
    fn test_resolve_base64_invalid_base64() {
        let result = resolve_base64("not valid base64!!!");
        assert!(matches!(result, Err(Error::Base64Decode(_))));
    }

    #[test]
    fn test_resolve_base64_pdf_header() {
        let resolved = resolve_base64("JVBERi0xLjQ=").unwrap(); // "%PDF-1.4"
        assert_eq!(resolved.data, b"%PDF-1.4");
        assert_eq!(resolved.source_name, "<base64>");
    }

    #[test]
    fn test_resolve_path_not_found() {
        let result = resolve_path("/nonexistent/path/cover.pdf");
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[test]
    fn test_resolve_path_not_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.pdf");
        std::fs::write(&path, b"PK\x03\x04 not a pdf").unwrap();

        let result = resolve_path(&path);
        assert!(matches!(result, Err(Error::InvalidDocument { .. })));
    }

    #[rstest]
    #[case("127.0.0.1")]
    #[case("10.0.0.1")]
    #[case("172.16.0.1")]
    #[case("192.168.1.1")]
    #[case("169.254.169.254")]
    #[case("100.64.0.1")]
    #[case("0.0.0.0")]
    #[case("255.255.255.255")]
    #[case("::1")]
    #[case("::")]
    #[case("fd00::1")]
    #[case("fe80::1")]
    fn test_is_private_ip(#[case] ip: &str) {
        assert!(is_private_ip(&ip.parse().unwrap()));
    }

    #[rstest]
    #[case("8.8.8.8")]
    #[case("1.1.1.1")]
    #[case("100.128.0.1")]
    #[case("2001:db8::1")]
    #[case("2607:f8b0:4004:800::200e")]
    fn test_is_public_ip(#[case] ip: &str) {
        assert!(!is_private_ip(&ip.parse().unwrap()));
    }

    #[tokio::test]
    async fn test_resolve_url_blocks_loopback() {
        let result = resolve_url("http://127.0.0.1:9/cover.pdf", false, 1024).await;
        assert!(matches!(result, Err(Error::SsrfBlocked { .. })));
    }
}
