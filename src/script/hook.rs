use std::collections::HashMap;

use crate::runner::ExecutionResult;
use crate::spec::{HttpBody, RequestSpec};
use crate::variable::AppVars;

/// 编译后的钩子单元
///
/// 包含 prelude + 用户片段编译出的 AST，以及按源码顺序
/// 注册的测试用例列表。
#[derive(Debug, Clone)]
pub struct HookUnit {
    pub(crate) ast: rhai::AST,
    pub(crate) tests: Vec<TestCase>,
}

/// 片段里通过 `//@test_case("...")` 标记注册的测试用例
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// 标记里声明的测试名
    pub name: String,
    /// 被标记的函数名，无参调用
    pub fn_name: String,
}

/// 钩子可见的请求视图，pre 钩子的改动会写回请求
#[derive(Debug, Clone, Default)]
pub struct RequestView {
    pub name: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body_text: Option<String>,
}

impl RequestView {
    pub fn from_spec(spec: &RequestSpec) -> Self {
        Self {
            name: spec.name.clone(),
            url: spec.url.clone(),
            method: spec.method.to_string(),
            headers: spec.headers.clone(),
            body_text: match &spec.body {
                Some(HttpBody::Text(text)) => Some(text.clone()),
                _ => None,
            },
        }
    }

    /// 把钩子的改动写回请求描述，header 键重新归一化
    pub fn apply_to(self, spec: &mut RequestSpec) {
        spec.name = self.name;
        spec.url = self.url;

        spec.headers.clear();
        for (key, value) in self.headers {
            spec.insert_header(&key, value);
        }

        if let Some(text) = self.body_text {
            spec.body = Some(HttpBody::Text(text));
        }
    }
}

/// 钩子可见的响应视图（仅 post 钩子）
#[derive(Debug, Clone, Default)]
pub struct ResponseView {
    pub status: i64,
    pub failure: Option<String>,
    pub headers: Vec<(String, String)>,
    pub size: i64,
    pub elapsed_ms: i64,
    pub json: Option<serde_json::Value>,
}

impl ResponseView {
    pub fn from_result(result: &ExecutionResult) -> Self {
        Self {
            status: result.status as i64,
            failure: result.failure.clone(),
            headers: result.headers.clone(),
            size: result.size as i64,
            elapsed_ms: result.elapsed_ms as i64,
            json: result.json.clone(),
        }
    }

    pub fn apply_to(self, result: &mut ExecutionResult) {
        result.status = self.status.clamp(0, u16::MAX as i64) as u16;
        result.failure = self.failure;
        result.json = self.json;
    }
}

/// 一次钩子执行的绑定状态
///
/// 脚本只能通过 ScriptHost 注册的函数接触这里的数据，
/// 这个结构就是钩子的全部能力边界。
#[derive(Debug, Clone, Default)]
pub struct HookState {
    pub req: RequestView,
    pub res: Option<ResponseView>,
    pub vars: HashMap<String, String>,
}

impl HookState {
    /// pre-request 钩子的状态：请求 + 变量，无响应
    pub fn before_dispatch(spec: &RequestSpec, vars: &AppVars) -> Self {
        Self {
            req: RequestView::from_spec(spec),
            res: None,
            vars: vars.snapshot(),
        }
    }

    /// post-request 钩子的状态：请求 + 响应 + 变量
    pub fn after_dispatch(spec: &RequestSpec, result: &ExecutionResult, vars: &AppVars) -> Self {
        Self {
            req: RequestView::from_spec(spec),
            res: Some(ResponseView::from_result(result)),
            vars: vars.snapshot(),
        }
    }
}
