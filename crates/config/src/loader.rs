use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::BotlineConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["botline.toml", "botline.yaml", "botline.yml", "botline.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<BotlineConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./botline.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/botline/botline.{toml,yaml,yml,json}` (user-global)
///
/// Returns `BotlineConfig::default()` if no config file is found.
pub fn discover_and_load() -> BotlineConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    BotlineConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/botline/
    if let Some(dirs) = directories::ProjectDirs::from("", "", "botline") {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    directories::ProjectDirs::from("", "", "botline")
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
        .join("botline.toml")
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<BotlineConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botline.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9191\nbind = \"0.0.0.0\"\n\n[[endpoints]]\nid = \"primary\"\nchat_id = 42\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 9191);
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.endpoints[0].id, "primary");
    }

    #[test]
    fn load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botline.yaml");
        std::fs::write(&path, "relay:\n  short_timeout_secs: 10\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.relay.short_timeout_secs, 10);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.relay.total_timeout_secs, 40);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botline.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(load_config(&path).is_err());
    }
}
