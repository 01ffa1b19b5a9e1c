/// Image transcoding for the asset route
use crate::error::{ApiError, ApiResult};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

pub const WEBP_MIME: &str = "image/webp";

/// Whether `bytes` decode as a raster image we can re-encode
pub fn is_image(bytes: &[u8]) -> bool {
    matches!(
        image::guess_format(bytes),
        Ok(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP)
    )
}

/// MIME type sniffed from the leading bytes of an upload
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Some("image/png"),
        Ok(ImageFormat::Jpeg) => Some("image/jpeg"),
        Ok(ImageFormat::Gif) => Some("image/gif"),
        Ok(ImageFormat::WebP) => Some(WEBP_MIME),
        _ if is_mp4(bytes) => Some("video/mp4"),
        _ => None,
    }
}

/// ISO base media file with an MP4-family brand
fn is_mp4(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    let brand = &bytes[8..12];
    matches!(
        brand,
        b"isom" | b"iso2" | b"mp41" | b"mp42" | b"avc1" | b"dash" | b"M4V " | b"mmp4" | b"MSNV"
    )
}

fn encode_webp(bytes: &[u8]) -> ApiResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| ApiError::Upstream(format!("Failed to decode image: {}", e)))?;
    // The WebP encoder only takes 8-bit RGB(A)
    let decoded = DynamicImage::ImageRgba8(decoded.to_rgba8());

    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, ImageFormat::WebP)
        .map_err(|e| ApiError::Upstream(format!("Failed to encode WebP: {}", e)))?;

    Ok(out.into_inner())
}

/// Re-encode an image as (lossless) WebP off the async runtime
pub async fn to_webp(bytes: Vec<u8>) -> ApiResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || encode_webp(&bytes))
        .await
        .map_err(|e| ApiError::Internal(format!("Transcode task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(4, 4, Rgb([200u8, 10, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(&png_bytes()), Some("image/png"));

        let mut mp4 = vec![0, 0, 0, 0x20];
        mp4.extend_from_slice(b"ftypisom");
        mp4.extend_from_slice(&[0; 16]);
        assert_eq!(sniff_mime(&mp4), Some("video/mp4"));

        assert_eq!(sniff_mime(b"plain text"), None);
    }

    #[tokio::test]
    async fn test_png_to_webp() {
        let webp = to_webp(png_bytes()).await.unwrap();
        assert_eq!(&webp[0..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
    }

    #[tokio::test]
    async fn test_garbage_is_upstream_error() {
        let err = to_webp(b"definitely not an image".to_vec()).await.unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }
}
