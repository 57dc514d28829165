use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const BASE_URL: &str = "http://my.smart-j.ru";
const DEFAULT_CONFIG_FILE: &str = "collector.toml";
const ENV_PREFIX: &str = "COLLECTOR";

/// One schedule page on the source site. Its database id is its 1-based
/// position in [`Settings::modules`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleSource {
    pub name: String,
    pub url: String,
}

/// Keys missing from every source keep their [`Default`] value.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub login: String,
    pub password: String,
    pub db_path: PathBuf,
    pub request_timeout_secs: u64,
    /// Pause between consecutive module fetches.
    pub request_delay_ms: u64,
    pub headers: BTreeMap<String, String>,
    pub modules: Vec<ModuleSource>,
    pub seed_cities: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let module = |name: &str, path: &str| ModuleSource {
            name: name.to_string(),
            url: format!("{BASE_URL}/r1869~plan/kt-plan-report/{path}/"),
        };

        let headers = [
            (
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
            ),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
            ("Accept-Language", "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
            ("Upgrade-Insecure-Requests", "1"),
            ("Cache-Control", "max-age=0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let seed_cities = [
            "Биробиджан",
            "Брянск",
            "Витебск",
            "Екатеринбург",
            "Минск",
            "Москва ОРТ",
            "Новосибирск",
            "Пермь",
            "Ростов",
            "Самара",
            "Томск",
            "Челябинск",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Settings {
            base_url: BASE_URL.to_string(),
            login: String::new(),
            password: String::new(),
            db_path: PathBuf::from("data/lessons.sqlite"),
            request_timeout_secs: 15,
            request_delay_ms: 2000,
            headers,
            modules: vec![
                module("Matata", "l:33"),
                module("Kids", "l:55"),
                module("JUnior", "l:56"),
            ],
            seed_cities,
        }
    }
}

impl Settings {
    /// Layer an optional TOML file and `COLLECTOR__*` environment variables
    /// over the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let settings = config::Config::builder()
            .add_source(config::File::from(file).required(path.is_some()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {:?}", file))?;

        settings
            .try_deserialize()
            .context("failed to deserialise Settings")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn has_credentials(&self) -> bool {
        !self.login.trim().is_empty()
    }
}
