use crate::{Error, Result};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::PathBuf;

static CONFIG: OnceCell<Config> = OnceCell::new();

const ENV_PREFIX: &str = "DAILY_WORD";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub words: WordsConfig,
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordsConfig {
    /// 存放 `sol<N>.dat` 和 `val<N>.dat` 的目录
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// 未配置则不启用远端镜像
    pub redis_url: Option<String>,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl Config {
    /// 默认值，其次可选的 `config.*` 文件，最后 `DAILY_WORD__*` 环境变量
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    pub fn load_from(file: &str) -> Result<Self> {
        let config = Self::defaults()?
            .add_source(config::File::with_name(file).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        config
            .try_deserialize::<Config>()
            .map_err(|e| Error::Config(e.to_string()))
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        config::Config::builder()
            .set_default("words.dir", "data")
            .and_then(|b| b.set_default("storage.data_dir", ".daily-word"))
            .and_then(|b| b.set_default("remote.key_prefix", "daily_word"))
            .and_then(|b| b.set_default("log.level", "info"))
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// 初始化全局配置，重复调用会失败
    pub fn init() -> Result<()> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| Error::Config("配置已经初始化".to_string()))
    }

    /// 获取全局配置，`init` 之前为 `None`
    pub fn get() -> Option<&'static Config> {
        CONFIG.get()
    }

    pub fn log_filter(&self) -> String {
        format!("daily_word={}", self.log.level)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            words: WordsConfig {
                dir: PathBuf::from("data"),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from(".daily-word"),
            },
            remote: RemoteConfig {
                redis_url: None,
                key_prefix: "daily_word".to_string(),
            },
            log: LogConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from("no-such-daily-word-config").unwrap();
        assert_eq!(config.words.dir, PathBuf::from("data"));
        assert_eq!(config.storage.data_dir, PathBuf::from(".daily-word"));
        assert_eq!(config.remote.key_prefix, "daily_word");
        assert!(config.remote.redis_url.is_none());
        assert_eq!(config.log_filter(), "daily_word=info");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir =
            std::env::temp_dir().join(format!("daily-word-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("settings.toml");
        std::fs::write(
            &file,
            "[remote]\nredis_url = \"redis://127.0.0.1/\"\n\n[log]\nlevel = \"debug\"\n",
        )
        .unwrap();

        let config = Config::load_from(file.to_str().unwrap()).unwrap();
        assert_eq!(config.remote.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.log_filter(), "daily_word=debug");
        assert_eq!(config.words.dir, PathBuf::from("data"));

        std::fs::remove_dir_all(dir).unwrap();
    }
}
