use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::Invoker;
use crate::models::{ConversionJob, ConversionResult};

/// 检查子进程是否结束的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// stderr 为空时显示的信息
const UNKNOWN_ERROR: &str = "an unknown error occurred";

/// 以子进程方式运行 pandoc
#[derive(Debug, Default, Clone, Copy)]
pub struct PandocRunner;

impl PandocRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Invoker for PandocRunner {
    fn convert(&self, job: &ConversionJob, timeout: Duration) -> ConversionResult {
        log::info!(
            "running {} {:?}",
            job.converter_path().display(),
            job.arguments()
        );

        let mut child = match Command::new(job.converter_path())
            .args(job.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::error!("failed to spawn {}: {}", job.converter_path().display(), e);
                return ConversionResult::LaunchError { message: e.to_string() };
            }
        };

        // 在单独的线程中读取输出，避免管道写满导致子进程阻塞
        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());

        // 超时从启动开始计算，也包括等待输出管道关闭的时间
        let deadline = Instant::now() + timeout;

        let status = match wait_until(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                log::warn!("conversion exceeded {:?}, process killed", timeout);
                // 读取线程在管道关闭后自行结束，不再等待
                return ConversionResult::Timeout { after: timeout };
            }
            Err(e) => {
                log::error!("failed to wait for converter: {}", e);
                stop(&mut child);
                return ConversionResult::LaunchError { message: e.to_string() };
            }
        };

        // 子进程启动的其他进程可能仍持有管道
        let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline)) else {
            log::warn!("converter output still open after {:?}, giving up", timeout);
            return ConversionResult::Timeout { after: timeout };
        };
        if !stdout.trim().is_empty() {
            log::debug!("converter stdout: {}", stdout.trim());
        }

        if status.success() {
            ConversionResult::Success { output_path: job.output_path().to_path_buf() }
        } else {
            let message = match stderr.trim() {
                "" => UNKNOWN_ERROR.to_string(),
                text => text.to_string(),
            };
            ConversionResult::ProcessFailure { exit_code: status.code(), message }
        }
    }
}

/// 等待子进程结束；超过截止时间则杀死并回收进程，返回 Ok(None)
fn wait_until(child: &mut Child, deadline: Instant) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            stop(child);
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// 杀死并回收子进程
fn stop(child: &mut Child) {
    // 进程可能恰好在此刻退出，kill 失败可以忽略
    let _ = child.kill();
    if let Err(e) = child.wait() {
        log::warn!("failed to reap converter process: {}", e);
    }
}

fn capture<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// 在截止时间前取回输出；管道仍未关闭时返回 None
fn collect(rx: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(rx) = rx else {
        return Some(String::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
    }
}
