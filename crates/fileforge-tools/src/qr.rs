use std::io::Cursor;

use async_trait::async_trait;
use fileforge_common::{
    error::{ForgeError, Result},
    types::Utility,
};
use fileforge_jobs::{WorkContext, WorkFunction, WorkOutput};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode, render::svg};
use serde::Deserialize;

use crate::media::blocking;

pub const MIN_SIZE: u32 = 64;
pub const MAX_SIZE: u32 = 2048;
/// Byte-mode capacity of a version 40 symbol at level L.
pub const MAX_CONTENT_BYTES: usize = 2953;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

impl ErrorCorrection {
    fn level(self) -> EcLevel {
        match self {
            Self::L => EcLevel::L,
            Self::M => EcLevel::M,
            Self::Q => EcLevel::Q,
            Self::H => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrFormat {
    #[default]
    Png,
    Svg,
}

impl QrFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QrConfig {
    pub size: u32,
    pub error_correction: ErrorCorrection,
    pub format: QrFormat,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            size: 512,
            error_correction: ErrorCorrection::default(),
            format: QrFormat::default(),
        }
    }
}

impl QrConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&self.size) {
            return Err(ForgeError::InvalidConfig(format!(
                "qr size must be between {MIN_SIZE} and {MAX_SIZE} pixels"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrInput {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub content: String,
}

pub fn render_qr(content: &str, config: &QrConfig) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(content.as_bytes(), config.error_correction.level())
        .map_err(|err| ForgeError::WorkFailed(format!("cannot encode qr code: {err}")))?;

    match config.format {
        QrFormat::Svg => Ok(code
            .render::<svg::Color>()
            .min_dimensions(config.size, config.size)
            .build()
            .into_bytes()),
        QrFormat::Png => {
            let image = code
                .render::<Luma<u8>>()
                .min_dimensions(config.size, config.size)
                .build();
            let mut buffer = Cursor::new(Vec::new());
            DynamicImage::ImageLuma8(image)
                .write_to(&mut buffer, ImageFormat::Png)
                .map_err(|err| ForgeError::WorkFailed(format!("failed to encode png: {err}")))?;
            Ok(buffer.into_inner())
        }
    }
}

#[derive(Debug, Default)]
pub struct QrGenerator;

#[async_trait]
impl WorkFunction for QrGenerator {
    type Input = QrInput;
    type Config = QrConfig;

    fn utility(&self) -> Utility {
        Utility::Qr
    }

    fn validate_config(&self, config: &QrConfig) -> Result<()> {
        config.validate()
    }

    fn identity(&self, index: usize, input: &QrInput) -> String {
        match input.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => format!("qr-{}", index + 1),
        }
    }

    fn precheck(&self, input: &QrInput) -> std::result::Result<(), String> {
        if input.content.is_empty() {
            return Err("content is empty".to_string());
        }
        if input.content.len() > MAX_CONTENT_BYTES {
            return Err(format!(
                "content is {} bytes, more than a qr code can hold ({MAX_CONTENT_BYTES})",
                input.content.len()
            ));
        }
        Ok(())
    }

    async fn run(&self, ctx: &WorkContext, input: &QrInput, config: &QrConfig) -> Result<WorkOutput> {
        let content = input.content.clone();
        let render_config = config.clone();
        let bytes = blocking(move || render_qr(&content, &render_config)).await?;

        let name = format!("{}.{}", self.identity(ctx.index, input), config.format.extension());
        let artifact = ctx
            .write_artifact(&name, config.format.content_type(), &bytes)
            .await?;
        Ok(WorkOutput::with_artifact(
            format!("encoded {} bytes", input.content.len()),
            artifact,
        ))
    }
}
