use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/Engine.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads engine configuration by layering defaults, the TOML file at `path`, and
    /// `REGIME_`-prefixed environment variables. A missing file is not an error;
    /// defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the result fails validation.
    pub fn load_from(path: &str) -> Result<EngineConfig> {
        let config: EngineConfig = Self::figment(path, None)
            .extract()
            .with_context(|| format!("Failed to load configuration from {path}"))?;

        config.validate()?;
        Ok(config)
    }

    /// Like [`ConfigLoader::load_from`], with a profile overlay read from next to the
    /// base file (`config/Engine.toml` + `paper` reads `config/Engine.paper.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be parsed or the result fails validation.
    pub fn load_with_profile(path: &str, profile: &str) -> Result<EngineConfig> {
        let config: EngineConfig = Self::figment(path, Some(profile))
            .extract()
            .with_context(|| format!("Failed to load configuration profile {profile} from {path}"))?;

        config.validate()?;
        Ok(config)
    }

    fn figment(path: &str, profile: Option<&str>) -> Figment {
        let mut figment =
            Figment::from(Serialized::defaults(EngineConfig::default())).merge(Toml::file(path));
        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(profile_path(path, profile)));
        }
        figment.merge(Env::prefixed("REGIME_").split("__"))
    }
}

fn profile_path(path: &str, profile: &str) -> PathBuf {
    Path::new(path).with_extension(format!("{profile}.toml"))
}
