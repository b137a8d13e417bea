//! Configuration file loading and command line overrides.

use std::path::Path;

use gazetteer_feature_models::GazetteerConfig;

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config file path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`GazetteerConfig`].
    #[error("Invalid config {path}: {source}")]
    Toml {
        /// Config file path.
        path: String,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// Parses a configuration from TOML text. Missing sections and fields
/// keep their defaults.
///
/// # Errors
///
/// * If the text is not valid TOML or a field has the wrong type
pub fn parse(text: &str) -> Result<GazetteerConfig, toml::de::Error> {
    toml::from_str(text)
}

/// Loads the configuration file, or the defaults when no file is given.
///
/// # Errors
///
/// * If the file cannot be read
/// * If the file is not a valid configuration
pub fn load(path: Option<&Path>) -> Result<GazetteerConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(GazetteerConfig::default());
    };

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse(&text).map_err(|source| ConfigError::Toml {
        path: path.display().to_string(),
        source,
    })?;
    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Join options given on the command line. Each one, when present, wins
/// over the file.
#[derive(Debug, Default)]
pub struct JoinOverrides {
    /// `--out`.
    pub out: Option<String>,
    /// `--boundary`, repeatable.
    pub boundaries: Vec<String>,
    /// `--threads`.
    pub threads: Option<usize>,
}

impl JoinOverrides {
    /// Applies the overrides to `config`.
    pub fn apply(self, config: &mut GazetteerConfig) {
        if self.out.is_some() {
            config.join.out_dir = self.out;
        }
        if !self.boundaries.is_empty() {
            config.join.necessary_boundaries = self.boundaries;
        }
        if self.threads.is_some() {
            config.join.threads = self.threads;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = parse(
            r#"
            [stripe]
            dx = 0.5

            [join]
            street_buffer_m = 100.0
            necessary_boundaries = ["62422"]
            "#,
        )
        .unwrap();

        assert!((config.stripe.dx - 0.5).abs() < 1e-12);
        assert_eq!(config.stripe.workers, 4);
        assert!((config.join.street_buffer_m - 100.0).abs() < 1e-12);
        assert!((config.join.poi_buffer_m - 100.0).abs() < 1e-12);
        assert_eq!(config.join.necessary_boundaries, vec!["62422"]);
        assert_eq!(config.join.common_boundaries_file, "common.gjson");
    }

    #[test]
    fn wrong_type_is_rejected() {
        assert!(parse("[stripe]\ndx = \"wide\"\n").is_err());
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let path = std::env::temp_dir().join("gazetteer_missing_config.toml");
        let error = load(Some(&path)).unwrap_err();
        assert!(error.to_string().contains("gazetteer_missing_config.toml"));
    }

    #[test]
    fn command_line_wins_over_file() {
        let mut config = parse("[join]\nthreads = 2\nnecessary_boundaries = [\"1\"]\n").unwrap();
        JoinOverrides {
            out: Some("/tmp/joined".to_string()),
            boundaries: vec!["7".to_string(), "8".to_string()],
            threads: None,
        }
        .apply(&mut config);

        assert_eq!(config.join.threads, Some(2));
        assert_eq!(config.join.necessary_boundaries, vec!["7", "8"]);
        assert_eq!(config.join.out_dir.as_deref(), Some("/tmp/joined"));
    }
}
