use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::BpiConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["bpi.toml", "bpi.yaml", "bpi.yml", "bpi.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<BpiConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./bpi.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/bpi/bpi.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `BpiConfig::default()` if no file is found or it fails to
/// parse.
pub fn discover_and_load() -> BpiConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                BpiConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            BpiConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

fn find_config_file() -> Option<PathBuf> {
    find_config_in(Path::new(".")).or_else(|| config_dir().and_then(|dir| find_config_in(&dir)))
}

/// First standard config file inside `dir`.
pub(crate) fn find_config_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/bpi/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "bpi").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<BpiConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

// ── Environment overrides ───────────────────────────────────────────────────

/// Apply the deployment environment variables on top of `config`.
///
/// Values that fail to parse are logged and ignored.
pub fn apply_env_overrides(config: &mut BpiConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

pub(crate) fn apply_env_overrides_with(
    config: &mut BpiConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let env = EnvReader { lookup };

    env.parse("PORT", &mut config.server.port);

    if let Some(host) = env.string("CAI_HOST") {
        config.nlu.host = host;
    }
    env.parse("CAI_PORT", &mut config.nlu.port);
    if let Some(token) = env.string("CAI_TOKEN") {
        config.nlu.token = Some(Secret::new(token));
    }
    env.flag("GRPC_SECURE", &mut config.nlu.secure);
    if let Some(user) = env.string("USER_NAME") {
        config.nlu.user = Some(user);
    }
    if let Some(pass) = env.string("USER_PASS") {
        config.nlu.password = Some(Secret::new(pass));
    }

    env.parse("SENTENCE_TRUNCATION", &mut config.session.sentence_truncation);
    env.parse(
        "SESSION_TIMEOUT_MINUTES",
        &mut config.session.session_timeout_minutes,
    );

    env.flag("QA_ACTIVE", &mut config.qa.active);
    if let Some(host) = env.string("QA_HOST") {
        config.qa.host = host;
    }
    env.parse("QA_PORT", &mut config.qa.port);
    if let Some(lang) = env.string("QA_LANG") {
        config.qa.language = lang;
    }
    env.parse("QA_MAX_ANSWERS", &mut config.qa.max_answers);
    env.parse("QA_THRESHOLD_READER", &mut config.qa.threshold_reader);
    env.parse("QA_THRESHOLD_RETRIEVER", &mut config.qa.threshold_retriever);
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str, target: &mut T) {
        let Some(raw) = self.string(name) else {
            return;
        };
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(variable = name, value = %raw, "ignoring unparsable environment override"),
        }
    }

    fn flag(&self, name: &str, target: &mut bool) {
        let Some(raw) = self.string(name) else {
            return;
        };
        match parse_bool(&raw) {
            Some(value) => *target = value,
            None => warn!(variable = name, value = %raw, "ignoring non-boolean environment override"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, secrecy::ExposeSecret, std::collections::HashMap};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn overrides_apply_on_top_of_file() {
        let mut cfg = BpiConfig::default();
        apply_env_overrides_with(
            &mut cfg,
            env(&[
                ("PORT", "6000"),
                ("CAI_HOST", "nlu"),
                ("CAI_PORT", "7000"),
                ("CAI_TOKEN", "secret"),
                ("SENTENCE_TRUNCATION", "20"),
                ("QA_ACTIVE", "True"),
                ("QA_THRESHOLD_READER", "0.25"),
            ]),
        );
        assert_eq!(cfg.server.port, 6000);
        assert_eq!(cfg.nlu.base_url(), "http://nlu:7000");
        assert_eq!(cfg.nlu.token.as_ref().unwrap().expose_secret(), "secret");
        assert_eq!(cfg.session.sentence_truncation, 20);
        assert!(cfg.qa.active);
        assert!((cfg.qa.threshold_reader - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn unparsable_override_keeps_value() {
        let mut cfg = BpiConfig::default();
        apply_env_overrides_with(&mut cfg, env(&[("PORT", "not-a-port"), ("QA_ACTIVE", "maybe")]));
        assert_eq!(cfg.server.port, 50051);
        assert!(!cfg.qa.active);
    }

    #[test]
    fn empty_override_is_ignored() {
        let mut cfg = BpiConfig::default();
        apply_env_overrides_with(&mut cfg, env(&[("CAI_HOST", "  ")]));
        assert_eq!(cfg.nlu.host, "localhost");
    }

    #[rstest]
    #[case("true", Some(true))]
    #[case("1", Some(true))]
    #[case("YES", Some(true))]
    #[case("False", Some(false))]
    #[case("off", Some(false))]
    #[case("maybe", None)]
    fn bool_parsing(#[case] raw: &str, #[case] expected: Option<bool>) {
        assert_eq!(parse_bool(raw), expected);
    }

    #[rstest]
    #[case("bpi.toml", "[server]\nport = 6001\n")]
    #[case("bpi.yaml", "server:\n  port: 6001\n")]
    #[case("bpi.json", r#"{"server": {"port": 6001}}"#)]
    fn loads_each_format(#[case] file: &str, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(file);
        std::fs::write(&path, body).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 6001);
        assert_eq!(cfg.server.workers, 10);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bpi.ini");
        std::fs::write(&path, "port=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn find_config_prefers_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bpi.json"), "{}").unwrap();
        std::fs::write(dir.path().join("bpi.toml"), "").unwrap();
        let found = find_config_in(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "bpi.toml");
    }

    #[test]
    fn find_config_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_config_in(dir.path()).is_none());
    }
}
