pub mod pandoc;

pub use pandoc::PandocRunner;

use std::time::Duration;

use crate::models::{ConversionJob, ConversionResult};

/// 执行一次转换的后端
///
/// 实现不得 panic 或返回错误，所有失败都表示为 `ConversionResult`。
pub trait Invoker: Send + Sync {
    fn convert(&self, job: &ConversionJob, timeout: Duration) -> ConversionResult;
}
