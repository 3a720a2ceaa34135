use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use fileforge_common::error::{ForgeError, Result};
use image::{DynamicImage, ImageFormat, codecs::jpeg::JpegEncoder};
use serde::Deserialize;

/// An uploaded image carried inline as base64 (optionally a `data:` URL).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: String,
}

impl ImageInput {
    pub fn precheck(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.data.trim().is_empty() {
            return Err("data is required".to_string());
        }
        Ok(())
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_payload(&self.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
    Webp,
    Bmp,
    Gif,
    Tiff,
}

impl TargetFormat {
    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Webp => ImageFormat::WebP,
            Self::Bmp => ImageFormat::Bmp,
            Self::Gif => ImageFormat::Gif,
            Self::Tiff => ImageFormat::Tiff,
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::WebP => Some(Self::Webp),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.image_format().to_mime_type()
    }
}

pub fn decode_payload(data: &str) -> Result<Vec<u8>> {
    let data = data.trim();
    let encoded = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    BASE64_STANDARD
        .decode(encoded)
        .map_err(|err| ForgeError::WorkFailed(format!("payload is not valid base64: {err}")))
}

pub fn load_image(bytes: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>)> {
    let format = image::guess_format(bytes).ok();
    let image = image::load_from_memory(bytes)
        .map_err(|err| ForgeError::WorkFailed(format!("unsupported or corrupt image: {err}")))?;
    Ok((image, format))
}

/// Encodes `image`, converting pixel layout where the target codec requires it.
pub fn encode_image(image: &DynamicImage, target: TargetFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let encoded = match target {
        TargetFormat::Jpeg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut buffer, jpeg_quality).encode_image(&rgb)
        }
        TargetFormat::Webp | TargetFormat::Gif => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut buffer, target.image_format())
        }
        TargetFormat::Bmp | TargetFormat::Png | TargetFormat::Tiff => {
            image.write_to(&mut buffer, target.image_format())
        }
    };
    encoded.map_err(|err| {
        ForgeError::WorkFailed(format!("failed to encode {}: {err}", target.extension()))
    })?;
    Ok(buffer.into_inner())
}

/// Runs CPU-bound image work off the async executor.
pub async fn blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| ForgeError::WorkFailed(format!("image task aborted: {err}")))?
}
