use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use dxfdim_config::{AppConfig, ConfigError, RoundingRule};
use dxfdim_engine::{MeasureOptions, NormalizeOptions, RoundingMode};
use dxfdim_io::DxfFacade;

mod cli;
mod naming;
mod organizer;

use cli::{Cli, OutputFormat};
use organizer::{BatchSummary, Organizer, OrganizerOptions};

fn main() -> ExitCode {
    let cli = cli::parse();

    let (config, config_error) = match load_configuration(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    init_logging(&config);
    if let Some(err) = config_error {
        match &err {
            ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
            }
            ConfigError::Context { .. } => {
                warn!(error = %err, "加载配置失败，使用内建默认值");
            }
        }
    }

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "整理失败");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    let input_dir = match &cli.input_dir {
        Some(path) => path.clone(),
        None => default_input_dir()?,
    };
    let options = organizer_options(cli, config);
    info!(input = %input_dir.display(), "启动 dxfdim");

    let organizer = Organizer::new(DxfFacade::new(), options).context("测量参数无效")?;
    let summary = organizer
        .run(&input_dir)
        .with_context(|| format!("无法整理目录 {}", input_dir.display()))?;
    print_summary(&summary, cli.format)
}

/// 命令行参数优先于配置文件。
fn organizer_options(cli: &Cli, config: &AppConfig) -> OrganizerOptions {
    let rounding = cli
        .rounding
        .map(RoundingRule::from)
        .unwrap_or(config.measure.rounding);
    OrganizerOptions {
        output_dir: cli
            .output
            .clone()
            .unwrap_or_else(|| config.organizer.output_dir.clone()),
        extension: config.organizer.extension.clone(),
        measure: MeasureOptions {
            normalize: NormalizeOptions {
                circle_segments: config.measure.circle_segments,
                curve_samples: config.measure.curve_samples,
            },
            rounding: rounding_mode(rounding),
        },
    }
}

fn rounding_mode(rule: RoundingRule) -> RoundingMode {
    match rule {
        RoundingRule::HalfEven => RoundingMode::HalfToEven,
        RoundingRule::HalfAway => RoundingMode::HalfAwayFromZero,
    }
}

/// 可执行文件所在目录；取不到时退回当前工作目录。
fn default_input_dir() -> Result<PathBuf> {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    match exe_dir {
        Some(dir) => Ok(dir),
        None => env::current_dir().context("获取当前工作目录失败"),
    }
}

fn print_summary(summary: &BatchSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{summary}"),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(summary).context("序列化汇总失败")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn load_configuration(override_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::try_parse_from(["dxfdim", "--output", "out", "--rounding", "half-away"])
            .unwrap();
        let options = organizer_options(&cli, &AppConfig::default());
        assert_eq!(options.output_dir, PathBuf::from("out"));
        assert_eq!(options.measure.rounding, RoundingMode::HalfAwayFromZero);
        assert_eq!(options.extension, "dxf");
    }

    #[test]
    fn config_values_are_used_without_flags() {
        let cli = Cli::try_parse_from(["dxfdim"]).unwrap();
        let mut config = AppConfig::default();
        config.measure.circle_segments = 72;
        config.measure.rounding = RoundingRule::HalfAway;
        config.organizer.output_dir = PathBuf::from("sorted");

        let options = organizer_options(&cli, &config);

        assert_eq!(options.output_dir, PathBuf::from("sorted"));
        assert_eq!(options.measure.normalize.circle_segments, 72);
        assert_eq!(options.measure.normalize.curve_samples, 50);
        assert_eq!(options.measure.rounding, RoundingMode::HalfAwayFromZero);
    }
}
