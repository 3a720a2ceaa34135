use async_trait::async_trait;
use fileforge_common::{
    error::{ForgeError, Result},
    names::{split_extension, with_extension},
    types::Utility,
};
use fileforge_jobs::{WorkContext, WorkFunction, WorkOutput};
use serde::Deserialize;

use crate::media::{ImageInput, TargetFormat, blocking, encode_image, load_image};

pub const DEFAULT_QUALITY: u8 = 85;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertConfig {
    pub target: TargetFormat,
    /// JPEG quality; ignored by lossless targets.
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

impl ConvertConfig {
    pub fn new(target: TargetFormat) -> Self {
        Self {
            target,
            quality: DEFAULT_QUALITY,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(ForgeError::InvalidConfig(
                "quality must be between 1 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FormatConverter;

#[async_trait]
impl WorkFunction for FormatConverter {
    type Input = ImageInput;
    type Config = ConvertConfig;

    fn utility(&self) -> Utility {
        Utility::Convert
    }

    fn validate_config(&self, config: &ConvertConfig) -> Result<()> {
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
        config: &ConvertConfig,
    ) -> Result<WorkOutput> {
        let bytes = input.decode()?;
        let target = config.target;
        let quality = config.quality;
        let (converted, source) = blocking(move || {
            let (image, source) = load_image(&bytes)?;
            Ok((encode_image(&image, target, quality)?, source))
        })
        .await?;

        let name = with_extension(input.name.trim(), target.extension());
        let artifact = ctx
            .write_artifact(&name, target.mime_type(), &converted)
            .await?;
        let from = source
            .and_then(TargetFormat::from_image_format)
            .map(|format| format.extension())
            .or_else(|| split_extension(input.name.trim()).1)
            .unwrap_or("image");
        Ok(WorkOutput::with_artifact(
            format!("converted {from} to {}", target.extension()),
            artifact,
        ))
    }
}
