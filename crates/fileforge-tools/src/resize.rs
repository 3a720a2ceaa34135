use async_trait::async_trait;
use fileforge_common::{
    error::{ForgeError, Result},
    types::Utility,
};
use fileforge_jobs::{WorkContext, WorkFunction, WorkOutput};
use image::imageops::FilterType;
use serde::Deserialize;

use crate::media::{ImageInput, TargetFormat, blocking, encode_image, load_image};

pub const MAX_DIMENSION: u32 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl ResizeFilter {
    fn filter_type(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResizeConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub keep_aspect: bool,
    pub filter: ResizeFilter,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            keep_aspect: true,
            filter: ResizeFilter::default(),
        }
    }
}

impl ResizeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width.is_none() && self.height.is_none() {
            return Err(ForgeError::InvalidConfig(
                "at least one of width or height is required".to_string(),
            ));
        }
        for (field, value) in [("width", self.width), ("height", self.height)] {
            if let Some(value) = value
                && !(1..=MAX_DIMENSION).contains(&value)
            {
                return Err(ForgeError::InvalidConfig(format!(
                    "{field} must be between 1 and {MAX_DIMENSION}"
                )));
            }
        }
        Ok(())
    }

    /// Output size for a source of `width` x `height`.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scaled = |num: u32, den: u32, base: u32| -> u32 {
            let value = (base as u64 * num as u64 + den as u64 / 2) / den.max(1) as u64;
            value.clamp(1, MAX_DIMENSION as u64) as u32
        };
        match (self.width, self.height) {
            (Some(w), Some(h)) if !self.keep_aspect => (w, h),
            (Some(w), Some(h)) => {
                // fit inside the box
                if (w as u64) * (height as u64) <= (h as u64) * (width as u64) {
                    (w, scaled(w, width, height))
                } else {
                    (scaled(h, height, width), h)
                }
            }
            (Some(w), None) if self.keep_aspect => (w, scaled(w, width, height)),
            (None, Some(h)) if self.keep_aspect => (scaled(h, height, width), h),
            (Some(w), None) => (w, height),
            (None, Some(h)) => (width, h),
            (None, None) => (width, height),
        }
    }
}

#[derive(Debug, Default)]
pub struct ImageResizer;

#[async_trait]
impl WorkFunction for ImageResizer {
    type Input = ImageInput;
    type Config = ResizeConfig;

    fn utility(&self) -> Utility {
        Utility::Resize
    }

    fn validate_config(&self, config: &ResizeConfig) -> Result<()> {
        config.validate()
    }

    fn identity(&self, index: usize, input: &ImageInput) -> String {
        match input.name.trim() {
            "" => format!("image-{}", index + 1),
            name => name.to_string(),
        }
    }

    fn precheck(&self, input: &ImageInput) -> std::result::Result<(), String> {
        input.precheck()
    }

    async fn run(
        &self,
        ctx: &WorkContext,
        input: &ImageInput,
        config: &ResizeConfig,
    ) -> Result<WorkOutput> {
        let bytes = input.decode()?;
        let settings = config.clone();
        let (resized, format, from, to) = blocking(move || {
            let (image, source) = load_image(&bytes)?;
            let format = source
                .and_then(TargetFormat::from_image_format)
                .unwrap_or(TargetFormat::Png);
            let from = (image.width(), image.height());
            let (width, height) = settings.target_dimensions(from.0, from.1);
            let resized = image.resize_exact(width, height, settings.filter.filter_type());
            let encoded = encode_image(&resized, format, crate::convert::DEFAULT_QUALITY)?;
            Ok((encoded, format, from, (width, height)))
        })
        .await?;

        let artifact = ctx
            .write_artifact(input.name.trim(), format.mime_type(), &resized)
            .await?;
        Ok(WorkOutput::with_artifact(
            format!("resized {}x{} to {}x{}", from.0, from.1, to.0, to.1),
            artifact,
        ))
    }
}
