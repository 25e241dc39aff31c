use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use confique::Config as _;

use crate::prelude::*;


/// The locations where Ladle will look for a configuration file. The first
/// existing file in this list is used.
const DEFAULT_PATHS: &[&str] = &[
    "config.toml",
    "/etc/ladle/config.toml",
];

const LADLE_CONFIG_PATH_ENV: &str = "LADLE_CONFIG_PATH";


/// Configuration for Ladle.
///
/// All relative paths are relative to the location of this configuration
/// file. Every value can also be set via the environment variable given in
/// its description; environment variables take precedence over the file.
#[derive(Debug, confique::Config)]
pub(crate) struct Config {
    #[config(nested)]
    pub(crate) db: crate::db::DbConfig,

    #[config(nested)]
    pub(crate) http: crate::http::HttpConfig,

    #[config(nested)]
    pub(crate) log: crate::logger::LogConfig,
}

impl Config {
    /// Tries to find a config file by checking `LADLE_CONFIG_PATH` and a list
    /// of default locations. The first file found is loaded via
    /// [`Self::load_from`]. If no file exists, the configuration is built
    /// from environment variables and defaults alone. Returns the loaded
    /// config and the path it was loaded from, if any.
    pub(crate) fn from_env_or_default_locations() -> Result<(Self, Option<PathBuf>)> {
        let path = if let Some(path) = std::env::var_os(LADLE_CONFIG_PATH_ENV) {
            Some(PathBuf::from(path))
        } else {
            DEFAULT_PATHS.iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
        };

        match path {
            Some(path) => {
                let config = Self::load_from(&path)
                    .context(format!("failed to load config from '{}'", path.display()))?;
                Ok((config, Some(path)))
            }
            None => {
                let config = Self::builder()
                    .env()
                    .load()
                    .context("failed to load configuration from environment")?;
                Ok((config, None))
            }
        }
    }

    /// Loads the configuration from a specific TOML file (still letting
    /// environment variables take precedence).
    pub(crate) fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::builder()
            .env()
            .file(path)
            .load()
            .context(format!("failed to read config file '{}'", path.display()))?;

        config.fix_paths(path)?;

        Ok(config)
    }

    /// Goes through all paths in the configuration and changes relative paths
    /// to be absolute based on the path of the configuration file itself.
    fn fix_paths(&mut self, config_path: &Path) -> Result<()> {
        let absolute_config_path = config_path.canonicalize()
            .context("failed to canonicalize config path")?;
        let base = absolute_config_path.parent()
            .expect("config file path has no parent");

        if let Some(p) = &mut self.log.file {
            if p.is_relative() {
                *p = base.join(&p);
            }
        }

        Ok(())
    }
}

/// Writes the generated TOML config template file to the given destination or
/// stdout.
pub(crate) fn write_template(path: Option<&PathBuf>) -> Result<()> {
    use confique::toml::FormatOptions;

    info!(
        "Writing configuration template to '{}'",
        path.map(|p| p.display().to_string()).unwrap_or("<stdout>".into()),
    );

    let mut options = FormatOptions::default();
    options.general.nested_field_gap = 2;
    let template = confique::toml::template::<Config>(options);
    match path {
        Some(path) => fs::write(path, template)?,
        None => io::stdout().write_all(template.as_bytes())?,
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn template_mentions_all_sections() {
        let template = confique::toml::template::<Config>(Default::default());

        for section in ["[db]", "[http]", "[log]"] {
            assert!(template.contains(section), "template misses section {section}");
        }

        // A couple of defaults that must show up.
        assert!(template.contains("8000"));
        assert!(template.contains("5432"));
    }
}
