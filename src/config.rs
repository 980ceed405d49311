use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_BACKEND: &str = "LUMEN_BACKEND";
pub const ENV_GRAIN_SEED: &str = "LUMEN_GRAIN_SEED";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// GPU when a device can be created, CPU otherwise.
    #[default]
    Auto,
    Cpu,
    Gpu,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "cpu" => Ok(BackendKind::Cpu),
            "gpu" => Ok(BackendKind::Gpu),
            other => Err(format!("unknown backend '{other}' (expected auto, cpu or gpu)")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendKind::Auto => "auto",
            BackendKind::Cpu => "cpu",
            BackendKind::Gpu => "gpu",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub backend: BackendKind,
    /// Fixed grain seed. When unset the source fingerprint seeds the noise.
    pub grain_seed: Option<u64>,
    pub max_texture_dimension: u32,
    pub max_pixels: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            grain_seed: None,
            max_texture_dimension: 8192,
            max_pixels: 150_000_000, // ~150 MP guardrail
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `LUMEN_BACKEND` / `LUMEN_GRAIN_SEED`.
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::default().with_overrides(env::var(ENV_BACKEND).ok(), env::var(ENV_GRAIN_SEED).ok())
    }

    fn with_overrides(mut self, backend: Option<String>, seed: Option<String>) -> Self {
        if let Some(raw) = backend {
            match raw.parse() {
                Ok(kind) => self.backend = kind,
                Err(e) => warn!("ignoring {ENV_BACKEND}: {e}"),
            }
        }
        if let Some(raw) = seed {
            match raw.trim().parse() {
                Ok(seed) => self.grain_seed = Some(seed),
                Err(e) => warn!("ignoring {ENV_GRAIN_SEED}={raw}: {e}"),
            }
        }
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_grain_seed(mut self, seed: u64) -> Self {
        self.grain_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("GPU".parse::<BackendKind>(), Ok(BackendKind::Gpu));
        assert_eq!(" cpu ".parse::<BackendKind>(), Ok(BackendKind::Cpu));
        assert!("metal".parse::<BackendKind>().is_err());
    }

    #[test]
    fn overrides_apply_and_bad_values_are_ignored() {
        let cfg = EngineConfig::default()
            .with_overrides(Some("cpu".into()), Some("42".into()));
        assert_eq!(cfg.backend, BackendKind::Cpu);
        assert_eq!(cfg.grain_seed, Some(42));

        let cfg = EngineConfig::default()
            .with_overrides(Some("vulkan".into()), Some("-1".into()));
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"backend": "gpu", "grainSeed": 7}"#).unwrap();
        assert_eq!(cfg.backend, BackendKind::Gpu);
        assert_eq!(cfg.grain_seed, Some(7));
        assert_eq!(cfg.max_texture_dimension, 8192);
    }
}
