use std::io::Cursor;

use base64::{engine::general_purpose, Engine};
use image::{
    codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage,
    ImageFormat,
};

use app_error::{AppError, Result};

/// Largest accepted upload in bytes.
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
/// Longest edge of a stored photo in pixels.
pub const MAX_PHOTO_EDGE: u32 = 1024;
/// Quality used when re-encoding a photo as JPEG.
pub const JPEG_QUALITY: u8 = 80;
/// Default thumbnail box.
pub const THUMBNAIL_WIDTH: u32 = 200;
pub const THUMBNAIL_HEIGHT: u32 = 300;

/// Encode raw image bytes as a data URI.
pub fn encode_data_uri(bytes: &[u8], mime: &str) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Split a data URI into its MIME type and decoded payload.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:").ok_or(AppError::Parse)?;
    let (mime, payload) =
        rest.split_once(";base64,").ok_or(AppError::Parse)?;
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| AppError::Parse)?;
    Ok((mime.to_owned(), bytes))
}

/// Check an upload before it is accepted as the user photo. All violations
/// are collected into one error.
pub fn validate_photo(mime: &str, size: usize) -> Result<()> {
    let mut errors = Vec::new();

    if !mime.starts_with("image/") {
        errors.push("File must be an image".to_owned());
    }
    if size > MAX_PHOTO_BYTES {
        errors.push("Image must be less than 10MB".to_owned());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Image(errors.join(", ")))
    }
}

/// Decode an uploaded photo, scale it down to fit the storage-friendly
/// bounds and re-encode it as a JPEG data URI.
pub fn compress_photo(bytes: &[u8]) -> Result<String> {
    let img = image::load_from_memory(bytes)
        .map_err(|err| AppError::Image(err.to_string()))?;

    let img = if img.width().max(img.height()) > MAX_PHOTO_EDGE {
        img.resize(MAX_PHOTO_EDGE, MAX_PHOTO_EDGE, FilterType::Triangle)
    } else {
        img
    };

    // JPEG has no alpha channel
    let img = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|err| AppError::Image(err.to_string()))?;

    Ok(encode_data_uri(buf.get_ref(), "image/jpeg"))
}

/// Validate and compress an upload, the full photo intake path.
pub fn prepare_photo(bytes: &[u8], mime: &str) -> Result<String> {
    validate_photo(mime, bytes.len())?;
    compress_photo(bytes)
}

/// Cover-scale and center-crop a composite into the requested box,
/// re-encoded as a lossless WebP data URI.
pub fn generate_thumbnail(
    uri: &str,
    width: u32,
    height: u32,
) -> Result<String> {
    let (_, bytes) = decode_data_uri(uri)?;
    let img = image::load_from_memory(&bytes)
        .map_err(|err| AppError::Image(err.to_string()))?;

    let thumb = img.resize_to_fill(width, height, FilterType::Triangle);
    let mut buf = Cursor::new(Vec::new());
    thumb
        .write_to(&mut buf, ImageFormat::WebP)
        .map_err(|err| AppError::Image(err.to_string()))?;

    Ok(encode_data_uri(buf.get_ref(), "image/webp"))
}
