use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "DXFDIM_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub measure: MeasureConfig,
    #[serde(default)]
    pub organizer: OrganizerConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFDIM_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_in(cwd)
    }

    /// 在指定目录下寻找 `config/default.toml`，缺失时返回默认配置。
    pub fn discover_in(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let default_path = root.as_ref().join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，`level` 接受 `EnvFilter` 指令语法。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 宽高取整规则。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingRule {
    #[default]
    HalfEven,
    HalfAway,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeasureConfig {
    #[serde(default = "MeasureConfig::default_circle_segments")]
    pub circle_segments: usize,
    #[serde(default = "MeasureConfig::default_curve_samples")]
    pub curve_samples: usize,
    #[serde(default)]
    pub rounding: RoundingRule,
}

impl MeasureConfig {
    fn default_circle_segments() -> usize {
        36
    }

    fn default_curve_samples() -> usize {
        50
    }
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            circle_segments: Self::default_circle_segments(),
            curve_samples: Self::default_curve_samples(),
            rounding: RoundingRule::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrganizerConfig {
    /// 输出目录；相对路径基于输入目录解析。
    #[serde(default = "OrganizerConfig::default_output_dir")]
    pub output_dir: PathBuf,
    /// 参与整理的文件扩展名（不含点，大小写不敏感）。
    #[serde(default = "OrganizerConfig::default_extension")]
    pub extension: String,
}

impl OrganizerConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from("dxfs")
    }

    fn default_extension() -> String {
        "dxf".to_string()
    }
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            output_dir: Self::default_output_dir(),
            extension: Self::default_extension(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cfg = AppConfig::discover_in(dir.path()).expect("discover should succeed");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.measure.circle_segments, 36);
        assert_eq!(cfg.measure.curve_samples, 50);
        assert_eq!(cfg.measure.rounding, RoundingRule::HalfEven);
        assert_eq!(cfg.organizer.output_dir, PathBuf::from("dxfs"));
        assert_eq!(cfg.organizer.extension, "dxf");
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug,dxfdim_io=warn"

            [measure]
            circle_segments = 72
            rounding = "half_away"

            [organizer]
            output_dir = "../sorted"
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug,dxfdim_io=warn");
        assert_eq!(cfg.measure.circle_segments, 72);
        assert_eq!(cfg.measure.curve_samples, 50);
        assert_eq!(cfg.measure.rounding, RoundingRule::HalfAway);
        assert_eq!(cfg.organizer.output_dir, PathBuf::from("../sorted"));
        assert_eq!(cfg.organizer.extension, "dxf");
    }

    #[test]
    fn discover_reads_config_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_dir = dir.path().join("config");
        fs::create_dir(&config_dir).expect("create config dir");
        fs::write(
            config_dir.join("default.toml"),
            "[measure]\ncurve_samples = 120\n",
        )
        .expect("write config");

        let cfg = AppConfig::discover_in(dir.path()).expect("discover config");
        assert_eq!(cfg.measure.curve_samples, 120);
        assert_eq!(cfg.logging, LoggingConfig::default());
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[measure]\nrounding = \"sideways\"").unwrap();

        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = AppConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
