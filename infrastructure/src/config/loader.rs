//! Layered configuration loading: built-in defaults, overridden by a global
//! XDG config file, overridden by a project-level `conductor.toml` /
//! `.conductor.toml`, overridden by an explicit `--config` path. Built with
//! `figment`, the same layering approach as the teacher's `ConfigLoader`.

use super::file_config::FileConfig;
use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration, merging (lowest to highest precedence):
    /// built-in defaults, global XDG config, project config, explicit path.
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global) = Self::global_config_path() {
            if global.exists() {
                figment = figment.merge(Toml::file(global));
            }
        }

        if let Some(project) = Self::project_config_path() {
            figment = figment.merge(Toml::file(project));
        }

        if let Some(explicit) = config_path {
            figment = figment.merge(Toml::file(explicit).nested());
        }

        figment.extract().map_err(Box::new)
    }

    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("conductor").join("config.toml"))
    }

    /// First of `conductor.toml` / `.conductor.toml` found in the current
    /// directory; the two are not merged together, first found wins.
    pub fn project_config_path() -> Option<PathBuf> {
        for name in ["conductor.toml", ".conductor.toml"] {
            let candidate = Path::new(name);
            if candidate.exists() {
                return Some(candidate.to_path_buf());
            }
        }
        None
    }

    /// Debug helper: print which config sources were actually found.
    pub fn print_config_sources() {
        let global = Self::global_config_path();
        let global_found = global.as_ref().is_some_and(|p| p.exists());
        println!(
            "[{}] global: {}",
            if global_found { "FOUND" } else { "     " },
            global.map(|p| p.display().to_string()).unwrap_or_default()
        );

        let project = Self::project_config_path();
        println!(
            "[{}] project: {}",
            if project.is_some() { "FOUND" } else { "     " },
            project.map(|p| p.display().to_string()).unwrap_or_default()
        );
    }
}
