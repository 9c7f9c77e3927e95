use std::rc::Rc;

use crate::http::WireResponse;
use crate::logger::RunLogger;
use crate::script::ScriptHost;
use crate::spec::Outcome;
use crate::variable::AppVars;

/// 单个请求的执行结果
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// 响应状态码，从未发出时为 0
    pub status: u16,

    /// 传输失败类别名，与有效状态码互斥
    pub failure: Option<String>,

    /// 响应 headers
    pub headers: Vec<(String, String)>,

    /// 响应体字节数
    pub size: usize,

    /// 耗时，整毫秒
    pub elapsed_ms: u64,

    /// 尽力而为的 JSON 解析结果
    pub json: Option<serde_json::Value>,

    /// 分类结论
    pub ok: bool,

    /// 驱动分类的观察值（状态码或失败类别）
    pub outcome: Outcome,
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            status: 0,
            failure: None,
            headers: Vec::new(),
            size: 0,
            elapsed_ms: 0,
            json: None,
            ok: false,
            outcome: Outcome::Status(0),
        }
    }
}

impl ExecutionResult {
    pub fn from_response(response: &WireResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            size: response.body.len(),
            elapsed_ms: response.elapsed.as_millis() as u64,
            ..Default::default()
        }
    }

    pub fn from_fault(kind: &str) -> Self {
        Self {
            failure: Some(kind.to_string()),
            ..Default::default()
        }
    }

    /// 当前观察值：失败类别优先于状态码
    pub fn observed(&self) -> Outcome {
        match &self.failure {
            Some(kind) => Outcome::Fault(kind.clone()),
            None => Outcome::Status(self.status),
        }
    }

    /// 按期望集合分类
    ///
    /// 声明了 `expected_status` 时，成功当且仅当观察值在集合内；
    /// 未声明时，成功当且仅当没有传输失败。
    pub fn classify(&mut self, expected: Option<&[Outcome]>) {
        let observed = self.observed();
        self.ok = match expected {
            Some(set) => set.contains(&observed),
            None => self.failure.is_none(),
        };
        self.outcome = observed;
    }
}

/// 整个运行过程的请求/测试统计
#[derive(Debug, Clone, Default)]
pub struct RunTotals {
    pub requests_total: usize,
    pub requests_ok: usize,
    pub requests_failed: usize,
    pub tests_total: usize,
    pub tests_ok: usize,
    pub tests_failed: usize,
}

impl RunTotals {
    pub fn record_request(&mut self, ok: bool) {
        self.requests_total += 1;
        if ok {
            self.requests_ok += 1;
        } else {
            self.requests_failed += 1;
        }
    }

    pub fn record_test(&mut self, ok: bool) {
        self.tests_total += 1;
        if ok {
            self.tests_ok += 1;
        } else {
            self.tests_failed += 1;
        }
    }
}

/// 一次运行的共享上下文
///
/// 变量、日志、统计和脚本宿主都显式地从这里传递，
/// 不依赖任何进程级单例。
pub struct RunContext {
    pub vars: AppVars,
    pub logger: Rc<RunLogger>,
    pub totals: RunTotals,
    pub script_host: ScriptHost,
}

impl RunContext {
    pub fn new(vars: AppVars, verbose: bool) -> Self {
        Self::with_logger(vars, Rc::new(RunLogger::new(verbose)))
    }

    /// 使用外部给定的日志器（测试里用捕获模式的）
    pub fn with_logger(vars: AppVars, logger: Rc<RunLogger>) -> Self {
        let script_host = ScriptHost::new(logger.clone());
        Self {
            vars,
            logger,
            totals: RunTotals::default(),
            script_host,
        }
    }
}
