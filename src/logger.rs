use std::cell::{Cell, RefCell};

use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt};

/// 初始化日志系统
///
/// 支持通过 RUST_LOG 环境变量控制日志级别
/// 默认级别: info
///
/// 示例:
/// - RUST_LOG=debug cargo run
/// - RUST_LOG=trace cargo run
pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    tracing::debug!("Logger initialized");
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// 顺序化的运行日志
///
/// `begin_buffering`/`end_buffering` 之间的普通日志会进入队列，
/// 在 `end_buffering` 时按原始顺序一次性输出。结果行（`result`）
/// 永远立即输出，保证每个请求的结果行先于其诊断细节出现。
pub struct RunLogger {
    verbose: bool,
    buffering: Cell<bool>,
    queue: RefCell<Vec<String>>,
    // 测试用：捕获所有输出而不是打印
    capture: RefCell<Option<Vec<String>>>,
}

impl RunLogger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            buffering: Cell::new(false),
            queue: RefCell::new(Vec::new()),
            capture: RefCell::new(None),
        }
    }

    /// 创建一个捕获模式的日志器，所有输出进入内部缓冲（单元测试用）
    pub fn captured(verbose: bool) -> Self {
        let logger = Self::new(verbose);
        *logger.capture.borrow_mut() = Some(Vec::new());
        logger
    }

    /// 取出捕获的输出行（捕获模式下）
    pub fn take_output(&self) -> Vec<String> {
        self.capture
            .borrow_mut()
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// 进入缓冲范围
    pub fn begin_buffering(&self) {
        self.buffering.set(true);
    }

    /// 离开缓冲范围并按序刷出队列
    pub fn end_buffering(&self) {
        self.buffering.set(false);
        for line in self.queue.borrow_mut().drain(..) {
            self.write(line);
        }
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        if self.verbose {
            self.log(Level::Debug, message.as_ref());
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message.as_ref());
    }

    /// 结果行，绕过缓冲立即输出
    pub fn result(&self, ok: bool, message: impl AsRef<str>) {
        let symbol = if ok {
            "✓".green().to_string()
        } else {
            "✗".red().to_string()
        };
        self.write(format!(" {} {}", symbol, message.as_ref()));
    }

    fn log(&self, level: Level, message: &str) {
        // 细节行缩进四个空格
        let rendered = match level {
            Level::Debug => format!("    {}", message.dimmed()),
            Level::Info => format!("    {}", message),
            Level::Warn => format!("    {}", message.yellow()),
            Level::Error => format!("    {}", message.red()),
        };

        if self.buffering.get() {
            self.queue.borrow_mut().push(rendered);
        } else {
            self.write(rendered);
        }
    }

    fn write(&self, line: String) {
        if let Some(captured) = self.capture.borrow_mut().as_mut() {
            captured.push(line);
        } else {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_outside_scope() {
        let logger = RunLogger::captured(false);
        logger.info("one");
        logger.info("two");
        let output = logger.take_output();
        assert_eq!(output.len(), 2);
        assert!(output[0].contains("one"));
        assert!(output[1].contains("two"));
    }

    #[test]
    fn test_buffered_lines_flush_in_order() {
        let logger = RunLogger::captured(false);
        logger.begin_buffering();
        logger.info("detail-1");
        logger.warn("detail-2");
        assert!(logger.take_output().is_empty());

        logger.end_buffering();
        let output = logger.take_output();
        assert_eq!(output.len(), 2);
        assert!(output[0].contains("detail-1"));
        assert!(output[1].contains("detail-2"));
    }

    #[test]
    fn test_result_bypasses_buffering() {
        let logger = RunLogger::captured(false);
        logger.begin_buffering();
        logger.info("detail");
        logger.result(true, "outcome");
        logger.end_buffering();

        let output = logger.take_output();
        // 结果行先出现，细节随后按序刷出
        assert_eq!(output.len(), 2);
        assert!(output[0].contains("outcome"));
        assert!(output[1].contains("detail"));
    }

    #[test]
    fn test_debug_suppressed_without_verbose() {
        let logger = RunLogger::captured(false);
        logger.debug("hidden");
        assert!(logger.take_output().is_empty());

        let verbose = RunLogger::captured(true);
        verbose.debug("visible");
        assert_eq!(verbose.take_output().len(), 1);
    }
}
