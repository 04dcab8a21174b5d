use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use dxfdim_engine::{EngineError, MeasureOptions, Measurement, measure_with};
use dxfdim_io::DocumentLoader;

use crate::naming::dimensioned_name;

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("invalid measure options: {0}")]
    InvalidOptions(#[from] EngineError),
    #[error("input path {0:?} is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to read input directory {path:?}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to create output directory {path:?}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to copy {from:?} to {to:?}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizerOptions {
    /// 相对路径基于输入目录解析。
    pub output_dir: PathBuf,
    /// 不含点的扩展名，大小写不敏感。
    pub extension: String,
    pub measure: MeasureOptions,
}

impl Default for OrganizerOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("dxfs"),
            extension: "dxf".to_string(),
            measure: MeasureOptions::default(),
        }
    }
}

/// 单个文件的处理结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Renamed {
        source: PathBuf,
        target: PathBuf,
        width: i64,
        height: i64,
        /// 近似失败、未计入尺寸的曲线数量。
        skipped_curves: usize,
    },
    Skipped {
        source: PathBuf,
        reason: String,
    },
    Failed {
        source: PathBuf,
        reason: String,
    },
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Renamed {
                source,
                target,
                skipped_curves,
                ..
            } => {
                write!(f, "renamed: {} -> {}", file_label(source), file_label(target))?;
                if *skipped_curves > 0 {
                    write!(f, " ({skipped_curves} curve(s) not measured)")?;
                }
                Ok(())
            }
            FileOutcome::Skipped { source, reason } => {
                write!(f, "skipped: {} ({reason})", file_label(source))
            }
            FileOutcome::Failed { source, reason } => {
                write!(f, "failed: {} ({reason})", file_label(source))
            }
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn renamed(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Renamed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Failed { .. }))
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|outcome| predicate(outcome)).count()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "no DXF files found in {}", self.input_dir.display());
        }
        for outcome in &self.outcomes {
            writeln!(f, "{outcome}")?;
        }
        writeln!(
            f,
            "{} file(s): {} renamed, {} skipped, {} failed",
            self.outcomes.len(),
            self.renamed(),
            self.skipped(),
            self.failed()
        )
    }
}

/// 批量测量目录中的 DXF 文件，并以带尺寸的文件名复制到输出目录。
pub struct Organizer<L: DocumentLoader> {
    loader: L,
    options: OrganizerOptions,
}

impl<L: DocumentLoader> Organizer<L> {
    pub fn new(loader: L, options: OrganizerOptions) -> Result<Self, OrganizeError> {
        options.measure.validate()?;
        Ok(Self { loader, options })
    }

    pub fn output_dir_for(&self, input_dir: &Path) -> PathBuf {
        if self.options.output_dir.is_absolute() {
            self.options.output_dir.clone()
        } else {
            input_dir.join(&self.options.output_dir)
        }
    }

    /// 列出输入目录下（不递归）扩展名匹配的文件，按文件名排序。
    pub fn discover(&self, input_dir: &Path) -> Result<Vec<PathBuf>, OrganizeError> {
        if !input_dir.is_dir() {
            return Err(OrganizeError::NotADirectory(input_dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(input_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| OrganizeError::ReadInput {
                path: input_dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && self.has_expected_extension(path) {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }

    pub fn run(&self, input_dir: &Path) -> Result<BatchSummary, OrganizeError> {
        let files = self.discover(input_dir)?;
        let output_dir = self.output_dir_for(input_dir);

        if files.is_empty() {
            warn!(input = %input_dir.display(), "输入目录中没有 DXF 文件");
            return Ok(BatchSummary {
                input_dir: input_dir.to_path_buf(),
                output_dir,
                outcomes: Vec::new(),
            });
        }

        fs::create_dir_all(&output_dir).map_err(|source| OrganizeError::CreateOutput {
            path: output_dir.clone(),
            source,
        })?;
        info!(
            input = %input_dir.display(),
            output = %output_dir.display(),
            count = files.len(),
            "开始整理 DXF 文件"
        );

        let outcomes = files
            .iter()
            .map(|path| self.process_file(path, &output_dir))
            .collect();
        let summary = BatchSummary {
            input_dir: input_dir.to_path_buf(),
            output_dir,
            outcomes,
        };
        info!(
            renamed = summary.renamed(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "整理完成"
        );
        Ok(summary)
    }

    /// 处理单个文件；任何错误都被记录在结果中，不会中断批处理。
    pub fn process_file(&self, path: &Path, output_dir: &Path) -> FileOutcome {
        let source = path.to_path_buf();
        let mut document = match self.loader.load(path) {
            Ok(document) => document,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "读取 DXF 失败");
                return FileOutcome::Failed {
                    source,
                    reason: err.to_string(),
                };
            }
        };

        let report = match measure_with(&mut document, &self.options.measure) {
            Ok(report) => report,
            Err(err) => {
                return FileOutcome::Failed {
                    source,
                    reason: err.to_string(),
                };
            }
        };
        let skipped_curves = report.normalize.skipped.len();

        let dimensions = match report.measurement {
            Measurement::Dimensions(dimensions) => dimensions,
            Measurement::NoGeometry => {
                warn!(path = %path.display(), skipped_curves, "没有可测量的几何，跳过");
                let reason = if skipped_curves > 0 {
                    format!("no measurable geometry, {skipped_curves} curve(s) could not be approximated")
                } else {
                    "no measurable geometry".to_string()
                };
                return FileOutcome::Skipped { source, reason };
            }
        };

        let target = output_dir.join(dimensioned_name(path, dimensions));
        match copy_file(path, &target) {
            Ok(()) => {
                debug!(
                    source = %path.display(),
                    target = %target.display(),
                    %dimensions,
                    "已复制"
                );
                FileOutcome::Renamed {
                    source,
                    target,
                    width: dimensions.width,
                    height: dimensions.height,
                    skipped_curves,
                }
            }
            Err(err) => {
                warn!(error = %err, "复制文件失败");
                FileOutcome::Failed {
                    source,
                    reason: err.to_string(),
                }
            }
        }
    }

    fn has_expected_extension(&self, path: &Path) -> bool {
        let expected = self.options.extension.trim_start_matches('.');
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(expected))
    }
}

/// 同名目标文件会被覆盖。
fn copy_file(from: &Path, to: &Path) -> Result<(), OrganizeError> {
    fs::copy(from, to).map_err(|source| OrganizeError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(())
}
