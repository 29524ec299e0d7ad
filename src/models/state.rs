use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use threadpool::ThreadPool;

use super::config::{Preferences, SettingsStore};
use super::formats::{is_input_format, is_output_format};
use super::job::{ConversionJob, ConversionResult};
use crate::converters::Invoker;

/// pandoc 的默认超时时间（5 分钟）
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const MAX_LOGS: usize = 500;
const IDLE_STATUS: &str = "Ready";
const BUSY_STATUS: &str = "Converting...";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Phase {
    Idle,
    Busy,
}

/// 状态文本的类别，界面据此选择颜色
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

/// 关闭窗口请求的处理结果
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ShutdownDecision {
    Proceed,
    NeedsConfirmation,
}

/// 后台线程投递结果后调用，用于唤醒界面
pub type RepaintHook = Arc<dyn Fn() + Send + Sync>;

/// 会话状态：当前选择、状态文本和正在进行的任务
///
/// 所有修改都发生在界面线程上，后台线程只通过通道回传结果。
pub struct Session {
    prefs: Preferences,
    input_file: Option<PathBuf>,
    status: String,
    status_level: StatusLevel,
    phase: Phase,
    logs: Vec<String>,
    last_output: Option<PathBuf>,
    started_at: Option<Instant>,
    timeout: Duration,
    shut_down: bool,
    store: SettingsStore,
    invoker: Arc<dyn Invoker>,
    worker: ThreadPool,
    tx: Sender<ConversionResult>,
    rx: Receiver<ConversionResult>,
    repaint: Option<RepaintHook>,
}

impl Session {
    pub fn new(store: SettingsStore, invoker: Arc<dyn Invoker>) -> Self {
        let (tx, rx) = channel();
        let prefs = store.load();

        let mut session = Self {
            prefs,
            input_file: None,
            status: IDLE_STATUS.to_string(),
            status_level: StatusLevel::Info,
            phase: Phase::Idle,
            logs: Vec::new(),
            last_output: None,
            started_at: None,
            timeout: DEFAULT_TIMEOUT,
            shut_down: false,
            store,
            invoker,
            // 同一时间只允许一个转换任务
            worker: ThreadPool::with_name("conversion".to_string(), 1),
            tx,
            rx,
            repaint: None,
        };
        session.add_log(&format!("Settings file: {}", session.store.path().display()));
        session
    }

    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_repaint_hook(&mut self, hook: RepaintHook) {
        self.repaint = Some(hook);
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn input_file(&self) -> Option<&Path> {
        self.input_file.as_deref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn status_level(&self) -> StatusLevel {
        self.status_level
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Busy
    }

    /// 转换按钮是否可用
    pub fn can_convert(&self) -> bool {
        !self.is_busy()
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// 最近一次成功转换的输出文件
    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    pub fn set_converter_path(&mut self, path: impl Into<String>) {
        self.prefs.converter_path = path.into();
    }

    pub fn set_input_file(&mut self, path: PathBuf) {
        self.add_log(&format!("Input file: {}", path.display()));
        self.input_file = Some(path);
    }

    pub fn set_input_format(&mut self, format: &str) {
        if format.is_empty() || is_input_format(format) {
            self.prefs.input_format = format.to_string();
        } else {
            log::warn!("ignoring unsupported input format {:?}", format);
        }
    }

    pub fn set_output_format(&mut self, format: &str) {
        if format.is_empty() || is_output_format(format) {
            self.prefs.output_format = format.to_string();
        } else {
            log::warn!("ignoring unsupported output format {:?}", format);
        }
    }

    /// 检查参数并在后台启动转换
    ///
    /// 已有任务在运行或参数检查失败时返回 false，后者会更新状态文本。
    pub fn start_conversion(&mut self) -> bool {
        if self.is_busy() {
            log::debug!("conversion already running, ignoring request");
            return false;
        }

        let job = match ConversionJob::prepare(&self.prefs, self.input_file.as_deref()) {
            Ok(job) => job,
            Err(e) => {
                self.status = e.to_string();
                self.status_level = StatusLevel::Error;
                self.add_log(&e.to_string());
                return false;
            }
        };

        self.phase = Phase::Busy;
        self.status = BUSY_STATUS.to_string();
        self.status_level = StatusLevel::Info;
        self.started_at = Some(Instant::now());
        self.last_output = None;
        self.add_log(&format!(
            "Converting {} ({} -> {})",
            job.input_path().display(),
            job.input_format(),
            job.output_format()
        ));

        let tx = self.tx.clone();
        let invoker = Arc::clone(&self.invoker);
        let repaint = self.repaint.clone();
        let timeout = self.timeout;

        self.worker.execute(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| invoker.convert(&job, timeout)))
                .unwrap_or_else(|payload| ConversionResult::LaunchError {
                    message: panic_message(&*payload),
                });
            // 界面可能已经关闭，发送失败可以忽略
            let _ = tx.send(result);
            if let Some(repaint) = repaint {
                repaint();
            }
        });

        true
    }

    /// 在界面线程上应用后台线程的结果，每帧调用一次
    pub fn process_conversion_results(&mut self) -> bool {
        let Ok(result) = self.rx.try_recv() else {
            return false;
        };

        let elapsed = self.started_at.take().map(|t| t.elapsed()).unwrap_or_default();
        self.phase = Phase::Idle;
        self.status = result.to_string();
        self.status_level = if result.is_success() {
            StatusLevel::Success
        } else {
            StatusLevel::Error
        };

        match &result {
            ConversionResult::Success { output_path } => {
                log::info!("conversion finished in {:.1}s: {}", elapsed.as_secs_f64(), output_path.display());
                self.last_output = Some(output_path.clone());
            }
            other => log::warn!("conversion failed: {:?}", other),
        }
        self.add_log(&format!("{} ({:.1} s)", self.status, elapsed.as_secs_f64()));
        true
    }

    /// 处理关闭请求：空闲时可以直接关闭，转换中需要用户确认
    pub fn request_shutdown(&self) -> ShutdownDecision {
        if self.is_busy() {
            ShutdownDecision::NeedsConfirmation
        } else {
            ShutdownDecision::Proceed
        }
    }

    /// 保存设置；正在运行的任务不会被取消
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if self.is_busy() {
            log::warn!("exiting while a conversion is still running");
        }
        match self.store.save(&self.prefs) {
            Ok(()) => log::info!("settings saved to {}", self.store.path().display()),
            Err(e) => {
                log::warn!("failed to save settings: {}", e);
                self.add_log(&format!("Failed to save settings: {}", e));
            }
        }
    }

    /// 在状态栏显示错误并写入日志
    pub fn report_error(&mut self, message: &str) {
        log::warn!("{}", message);
        self.status = message.to_string();
        self.status_level = StatusLevel::Error;
        self.add_log(message);
    }

    pub fn add_log(&mut self, message: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
        self.logs.push(format!("[{}] {}", timestamp, message));

        // 限制日志数量，防止内存占用过大
        if self.logs.len() > MAX_LOGS {
            self.logs.remove(0);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("internal error: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("internal error: {}", s)
    } else {
        "internal error".to_string()
    }
}
