use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use super::config::Preferences;
use super::formats::derive_output_path;

/// 转换前的参数检查错误，每一项都对应一个需要用户修正的字段
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Error: the pandoc path is not set")]
    ConverterPathEmpty,
    #[error("Error: the specified pandoc executable was not found")]
    ConverterNotFound,
    #[error("Error: no input file selected")]
    InputPathEmpty,
    #[error("Error: the specified input file was not found")]
    InputNotFound,
    #[error("Error: no input format selected")]
    InputFormatMissing,
    #[error("Error: no output format selected")]
    OutputFormatMissing,
}

/// 一次转换的参数快照，创建后不可修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    converter_path: PathBuf,
    input_path: PathBuf,
    input_format: String,
    output_format: String,
    output_path: PathBuf,
}

impl ConversionJob {
    /// 按顺序检查所有前置条件并生成任务
    ///
    /// # Panics
    ///
    /// 输出格式不在扩展名表中时 panic：格式列表与扩展名表必须保持一致。
    pub fn prepare(prefs: &Preferences, input_path: Option<&Path>) -> Result<Self, ConfigurationError> {
        if prefs.converter_path.is_empty() {
            return Err(ConfigurationError::ConverterPathEmpty);
        }
        let converter_path = PathBuf::from(&prefs.converter_path);
        if !converter_path.exists() {
            return Err(ConfigurationError::ConverterNotFound);
        }

        let input_path = match input_path {
            Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
            _ => return Err(ConfigurationError::InputPathEmpty),
        };
        if !input_path.exists() {
            return Err(ConfigurationError::InputNotFound);
        }

        if prefs.input_format.is_empty() {
            return Err(ConfigurationError::InputFormatMissing);
        }
        if prefs.output_format.is_empty() {
            return Err(ConfigurationError::OutputFormatMissing);
        }

        let Some(output_path) = derive_output_path(&input_path, &prefs.output_format) else {
            panic!("output format `{}` has no registered extension", prefs.output_format);
        };

        Ok(Self {
            converter_path,
            input_path,
            input_format: prefs.input_format.clone(),
            output_format: prefs.output_format.clone(),
            output_path,
        })
    }

    pub fn converter_path(&self) -> &Path {
        &self.converter_path
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn input_format(&self) -> &str {
        &self.input_format
    }

    pub fn output_format(&self) -> &str {
        &self.output_format
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// 传给转换器的参数：-f <输入格式> -t <输出格式> -o <输出文件> <输入文件>
    pub fn arguments(&self) -> Vec<OsString> {
        vec![
            "-f".into(),
            self.input_format.clone().into(),
            "-t".into(),
            self.output_format.clone().into(),
            "-o".into(),
            self.output_path.clone().into_os_string(),
            self.input_path.clone().into_os_string(),
        ]
    }
}

/// 转换结果，由后台线程产生，界面线程只消费一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    Success { output_path: PathBuf },
    /// 转换器以非零状态退出；被信号终止时 exit_code 为 None
    ProcessFailure { exit_code: Option<i32>, message: String },
    Timeout { after: Duration },
    LaunchError { message: String },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success { .. })
    }
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionResult::Success { output_path } => {
                write!(f, "Conversion finished: {}", output_path.display())
            }
            ConversionResult::ProcessFailure { message, .. } => {
                write!(f, "Conversion error: {}", message)
            }
            ConversionResult::Timeout { after } => {
                write!(f, "Error: conversion timed out and was stopped ({} s)", after.as_secs())
            }
            ConversionResult::LaunchError { message } => {
                write!(f, "Error: could not start pandoc: {}", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        prefs: Preferences,
        input: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let converter = dir.path().join("pandoc");
        let input = dir.path().join("report.docx");
        fs::write(&converter, "").unwrap();
        fs::write(&input, "").unwrap();
        let prefs = Preferences {
            converter_path: converter.to_string_lossy().into_owned(),
            input_format: "docx".to_string(),
            output_format: "markdown".to_string(),
        };
        Fixture { _dir: dir, prefs, input }
    }

    #[test]
    fn valid_selection_produces_job() {
        let fx = fixture();
        let job = ConversionJob::prepare(&fx.prefs, Some(fx.input.as_path())).unwrap();
        assert_eq!(job.output_path(), fx.input.with_extension("md"));
        assert_eq!(job.input_format(), "docx");
        assert_eq!(job.output_format(), "markdown");
    }

    #[test]
    fn each_precondition_has_its_own_error() {
        let fx = fixture();

        let mut prefs = fx.prefs.clone();
        prefs.converter_path.clear();
        assert_eq!(
            ConversionJob::prepare(&prefs, Some(fx.input.as_path())),
            Err(ConfigurationError::ConverterPathEmpty)
        );

        // 只有空白的路径视为不存在，而不是未设置
        let mut prefs = fx.prefs.clone();
        prefs.converter_path = "   ".to_string();
        assert_eq!(
            ConversionJob::prepare(&prefs, Some(fx.input.as_path())),
            Err(ConfigurationError::ConverterNotFound)
        );

        let mut prefs = fx.prefs.clone();
        prefs.converter_path = "/definitely/not/here/pandoc".to_string();
        assert_eq!(
            ConversionJob::prepare(&prefs, Some(fx.input.as_path())),
            Err(ConfigurationError::ConverterNotFound)
        );

        assert_eq!(
            ConversionJob::prepare(&fx.prefs, None),
            Err(ConfigurationError::InputPathEmpty)
        );
        assert_eq!(
            ConversionJob::prepare(&fx.prefs, Some(Path::new(""))),
            Err(ConfigurationError::InputPathEmpty)
        );

        let missing = fx.input.with_file_name("missing.docx");
        assert_eq!(
            ConversionJob::prepare(&fx.prefs, Some(missing.as_path())),
            Err(ConfigurationError::InputNotFound)
        );

        let mut prefs = fx.prefs.clone();
        prefs.input_format.clear();
        assert_eq!(
            ConversionJob::prepare(&prefs, Some(fx.input.as_path())),
            Err(ConfigurationError::InputFormatMissing)
        );

        let mut prefs = fx.prefs.clone();
        prefs.output_format.clear();
        assert_eq!(
            ConversionJob::prepare(&prefs, Some(fx.input.as_path())),
            Err(ConfigurationError::OutputFormatMissing)
        );
    }

    #[test]
    fn messages_are_distinct() {
        let all = [
            ConfigurationError::ConverterPathEmpty,
            ConfigurationError::ConverterNotFound,
            ConfigurationError::InputPathEmpty,
            ConfigurationError::InputNotFound,
            ConfigurationError::InputFormatMissing,
            ConfigurationError::OutputFormatMissing,
        ];
        let mut messages: Vec<String> = all.iter().map(|e| e.to_string()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), all.len());
    }

    #[test]
    fn arguments_follow_pandoc_order() {
        let fx = fixture();
        let job = ConversionJob::prepare(&fx.prefs, Some(fx.input.as_path())).unwrap();
        let args = job.arguments();
        assert_eq!(args[..5], ["-f", "docx", "-t", "markdown", "-o"].map(OsString::from));
        assert_eq!(args[5], fx.input.with_extension("md").into_os_string());
        assert_eq!(args[6], fx.input.clone().into_os_string());
    }

    #[test]
    #[should_panic(expected = "has no registered extension")]
    fn unknown_output_format_is_an_internal_error() {
        let fx = fixture();
        let mut prefs = fx.prefs.clone();
        prefs.output_format = "csv".to_string();
        let _ = ConversionJob::prepare(&prefs, Some(fx.input.as_path()));
    }
}
