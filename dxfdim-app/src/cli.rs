use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dxfdim_config::RoundingRule;

/// 测量目录中的 DXF 图纸，并按 `名称_宽x高.dxf` 复制到输出目录。
#[derive(Debug, Parser)]
#[command(name = "dxfdim", version, about, long_about = None)]
pub struct Cli {
    /// 输入目录，缺省为可执行文件所在目录
    pub input_dir: Option<PathBuf>,

    /// 输出目录，相对路径基于输入目录
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 宽高取整规则
    #[arg(long, value_enum)]
    pub rounding: Option<RoundingArg>,

    /// 汇总输出格式
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoundingArg {
    HalfEven,
    HalfAway,
}

impl From<RoundingArg> for RoundingRule {
    fn from(value: RoundingArg) -> Self {
        match value {
            RoundingArg::HalfEven => RoundingRule::HalfEven,
            RoundingArg::HalfAway => RoundingRule::HalfAway,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn parse() -> Cli {
    Cli::parse()
}
