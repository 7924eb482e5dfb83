//! `meshdesk.toml` loading. Every field is optional; CLI flags override.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use meshdesk_core::summarize::DEFAULT_THRESHOLD_BYTES;
use meshdesk_core::types::EntityType;
use meshdesk_graph::ControllerOptions;
use meshdesk_graph::controller::DEFAULT_SETTLE_DELAY_MS;
use meshdesk_projection::ProjectionOptions;

use crate::cli::RendererKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Serialized size above which projected values are summarized.
    pub summary_threshold_bytes: usize,
    pub search_timeout_ms: u64,
    /// Delay between a graph layout run and the fit-to-viewport.
    pub settle_delay_ms: u64,
    /// Types projected when a command is given none.
    pub entity_types: Vec<EntityType>,
    pub renderer: RendererKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            summary_threshold_bytes: DEFAULT_THRESHOLD_BYTES,
            search_timeout_ms: 5_000,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            entity_types: EntityType::EXPLORER_DEFAULT.to_vec(),
            renderer: RendererKind::Cytoscape,
        }
    }
}

impl Config {
    /// Load `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn projection_options(&self) -> ProjectionOptions {
        ProjectionOptions {
            threshold_bytes: self.summary_threshold_bytes,
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            settle_delay_ms: self.settle_delay_ms,
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    /// `requested` parsed as entity types, or the configured defaults when
    /// empty.
    pub fn resolve_types(&self, requested: &[String]) -> anyhow::Result<Vec<EntityType>> {
        if requested.is_empty() {
            return Ok(self.entity_types.clone());
        }
        requested
            .iter()
            .map(|s| s.parse::<EntityType>().map_err(anyhow::Error::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.summary_threshold_bytes, 1_000);
        assert_eq!(config.search_timeout(), Duration::from_secs(5));
        assert_eq!(config.entity_types.len(), 8);
        assert_eq!(config.renderer, RendererKind::Cytoscape);
    }

    #[test]
    fn partial_file_overrides_named_fields() {
        let config = Config::parse(
            r#"
            summary_threshold_bytes = 4096
            entity_types = ["users", "values"]
            renderer = "force-graph"
            "#,
        )
        .unwrap();
        assert_eq!(config.projection_options().threshold_bytes, 4096);
        assert_eq!(config.entity_types, vec![EntityType::Users, EntityType::Values]);
        assert_eq!(config.renderer, RendererKind::ForceGraph);
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
    }

    #[test]
    fn unknown_keys_and_types_are_rejected() {
        assert!(Config::parse("threshold = 3").is_err());
        assert!(Config::parse(r#"entity_types = ["widgets"]"#).is_err());
    }

    #[test]
    fn load_reads_file_and_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meshdesk.toml");
        std::fs::write(&path, "search_timeout_ms = 250\n").unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().search_timeout_ms, 250);

        let missing = dir.path().join("absent.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }

    #[test]
    fn resolve_types_prefers_request() {
        let config = Config::default();
        assert_eq!(config.resolve_types(&[]).unwrap(), config.entity_types);
        assert_eq!(
            config.resolve_types(&["Cards".into()]).unwrap(),
            vec![EntityType::Cards]
        );
        assert!(config.resolve_types(&["widgets".into()]).is_err());
    }
}
