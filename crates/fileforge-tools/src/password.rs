use async_trait::async_trait;
use fileforge_common::{
    error::{ForgeError, Result},
    types::Utility,
};
use fileforge_jobs::{WorkContext, WorkFunction, WorkOutput};
use rand::seq::{IndexedRandom, SliceRandom};
use serde::Deserialize;

pub const MIN_LENGTH: usize = 4;
pub const MAX_LENGTH: usize = 256;

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()-_=+[]{};:,.<>?/";
const AMBIGUOUS: &str = "Il1O0o";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordConfig {
    pub length: usize,
    pub lowercase: bool,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
    pub exclude_ambiguous: bool,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            length: 16,
            lowercase: true,
            uppercase: true,
            digits: true,
            symbols: true,
            exclude_ambiguous: false,
        }
    }
}

impl PasswordConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&self.length) {
            return Err(ForgeError::InvalidConfig(format!(
                "password length must be between {MIN_LENGTH} and {MAX_LENGTH}"
            )));
        }
        let classes = self.classes();
        if classes.is_empty() {
            return Err(ForgeError::InvalidConfig(
                "at least one character class must be enabled".to_string(),
            ));
        }
        if classes.len() > self.length {
            return Err(ForgeError::InvalidConfig(format!(
                "password length {} cannot hold one character from each of {} classes",
                self.length,
                classes.len()
            )));
        }
        Ok(())
    }

    fn classes(&self) -> Vec<Vec<char>> {
        [
            (self.lowercase, LOWERCASE),
            (self.uppercase, UPPERCASE),
            (self.digits, DIGITS),
            (self.symbols, SYMBOLS),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, set)| {
            set.chars()
                .filter(|ch| !self.exclude_ambiguous || !AMBIGUOUS.contains(*ch))
                .collect::<Vec<char>>()
        })
        .filter(|set| !set.is_empty())
        .collect()
    }
}

/// One character from every enabled class, the rest from the union, shuffled.
pub fn generate_password(config: &PasswordConfig) -> Result<String> {
    config.validate()?;
    let classes = config.classes();
    let pool: Vec<char> = classes.concat();
    let mut rng = rand::rng();

    let mut chars: Vec<char> = Vec::with_capacity(config.length);
    for class in &classes {
        if let Some(ch) = class.choose(&mut rng) {
            chars.push(*ch);
        }
    }
    while chars.len() < config.length {
        let ch = pool
            .choose(&mut rng)
            .ok_or_else(|| ForgeError::InternalError("empty password alphabet".to_string()))?;
        chars.push(*ch);
    }
    chars.shuffle(&mut rng);
    Ok(chars.into_iter().collect())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordInput {
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Default)]
pub struct PasswordGenerator;

#[async_trait]
impl WorkFunction for PasswordGenerator {
    type Input = PasswordInput;
    type Config = PasswordConfig;

    fn utility(&self) -> Utility {
        Utility::Password
    }

    fn validate_config(&self, config: &PasswordConfig) -> Result<()> {
        config.validate()
    }

    fn identity(&self, index: usize, input: &PasswordInput) -> String {
        match input.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => format!("password-{}", index + 1),
        }
    }

    fn precheck(&self, input: &PasswordInput) -> std::result::Result<(), String> {
        match input.label.as_deref() {
            Some(label) if label.trim().is_empty() => Err("label must not be blank".to_string()),
            _ => Ok(()),
        }
    }

    async fn run(
        &self,
        ctx: &WorkContext,
        input: &PasswordInput,
        config: &PasswordConfig,
    ) -> Result<WorkOutput> {
        let password = generate_password(config)?;
        let name = self.identity(ctx.index, input);
        let artifact = ctx
            .write_artifact(
                &format!("{name}.txt"),
                "text/plain; charset=utf-8",
                format!("{password}\n").as_bytes(),
            )
            .await?;
        Ok(WorkOutput::with_artifact(
            format!("generated {}-character password", config.length),
            artifact,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;

    #[test]
    fn includes_every_enabled_class() {
        let config = PasswordConfig {
            length: 8,
            ..PasswordConfig::default()
        };
        for _ in 0..200 {
            let password = generate_password(&config).unwrap();
            assert_eq!(password.chars().count(), 8);
            assert!(password.chars().any(|ch| ch.is_ascii_lowercase()));
            assert!(password.chars().any(|ch| ch.is_ascii_uppercase()));
            assert!(password.chars().any(|ch| ch.is_ascii_digit()));
            assert!(password.chars().any(|ch| SYMBOLS.contains(ch)));
        }
    }

    #[test]
    fn ambiguous_characters_can_be_excluded() {
        let config = PasswordConfig {
            length: 256,
            symbols: false,
            exclude_ambiguous: true,
            ..PasswordConfig::default()
        };
        let password = generate_password(&config).unwrap();
        assert!(!password.chars().any(|ch| AMBIGUOUS.contains(ch)));
    }

    #[test]
    fn rejects_bad_configs() {
        let too_short = PasswordConfig {
            length: 3,
            ..PasswordConfig::default()
        };
        let no_classes = PasswordConfig {
            lowercase: false,
            uppercase: false,
            digits: false,
            symbols: false,
            ..PasswordConfig::default()
        };
        let crowded = PasswordConfig {
            length: 4,
            ..PasswordConfig::default()
        };
        assert!(too_short.validate().is_err());
        assert!(no_classes.validate().is_err());
        assert!(crowded.validate().is_ok());
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: PasswordConfig = serde_json::from_str(r#"{"length": 24}"#).unwrap();
        assert_eq!(config.length, 24);
        assert!(config.lowercase && config.uppercase && config.digits && config.symbols);
    }

    #[tokio::test]
    async fn writes_labelled_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let input = PasswordInput {
            label: Some("alice".to_string()),
        };
        let output = PasswordGenerator
            .run(&context(&dir), &input, &PasswordConfig::default())
            .await
            .unwrap();
        let artifact = output.artifact.unwrap();
        assert_eq!(artifact.file_name, "alice.txt");
        let body = tokio::fs::read_to_string(&artifact.path).await.unwrap();
        assert_eq!(body.trim_end().chars().count(), 16);
    }

    #[test]
    fn blank_label_is_skipped() {
        let blank = PasswordInput {
            label: Some("   ".to_string()),
        };
        assert!(PasswordGenerator.precheck(&blank).is_err());
        assert!(PasswordGenerator.precheck(&PasswordInput::default()).is_ok());
        assert_eq!(PasswordGenerator.identity(2, &PasswordInput::default()), "password-3");
    }
}
