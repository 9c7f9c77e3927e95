use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::http::{Transport, TransportFault, WireRequest, WireResponse};
use crate::runner::types::{ExecutionResult, RunContext};
use crate::script::{HookState, HookUnit};
use crate::spec::{AuthScheme, RequestSpec, SpecLoader};

/// 未显式声明 User-Agent 时使用的默认值
pub const USER_AGENT: &str = concat!("rapitest/", env!("CARGO_PKG_VERSION"));

/// 一个待执行的请求文件：路径 + 原始文本
///
/// 原始文本在入列时读取一次，之后每次执行都用当时的变量状态
/// 重新加载，这样前序钩子写入的变量能影响后续请求。
#[derive(Debug, Clone)]
pub struct SpecSource {
    pub path: PathBuf,
    pub source: String,
}

/// 顺序执行器
///
/// 按入列顺序逐个执行请求文件，维护跨请求的会话连接。
/// 传输层通过 `Transport` 注入，测试里用桩实现替换。
pub struct Runner<T: Transport> {
    transport: T,
    specs: Vec<SpecSource>,
}

impl<T: Transport> Runner<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            specs: Vec::new(),
        }
    }

    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)?;
        self.add_source(path.to_path_buf(), source);
        Ok(())
    }

    pub fn add_source(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) {
        self.specs.push(SpecSource {
            path: path.into(),
            source: source.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// 执行全部入列的请求
    ///
    /// 单个请求的解析失败或传输失败只记为该请求失败，
    /// 不会中断整个运行。
    pub async fn run(&self, ctx: &mut RunContext) {
        let mut session: Option<T::Conn> = None;
        for spec in &self.specs {
            self.execute(spec, ctx, &mut session).await;
        }
    }

    async fn execute(&self, source: &SpecSource, ctx: &mut RunContext, session: &mut Option<T::Conn>) {
        ctx.logger.begin_buffering();

        let mut spec = match SpecLoader::load(
            &source.path,
            &source.source,
            &ctx.vars,
            &ctx.script_host,
            &ctx.logger,
        ) {
            Ok(spec) => spec,
            Err(err) => {
                ctx.totals.record_request(false);
                ctx.logger
                    .result(false, format!("{} [{}]", source.path.display(), err));
                ctx.logger.end_buffering();
                return;
            }
        };

        if spec.header("User-Agent").is_none() {
            spec.insert_header("User-Agent", USER_AGENT);
        }

        // pre-request 钩子：文件先于内联，改动写回请求与变量
        for unit in self.gather_hooks(&spec, true, ctx) {
            let state = HookState::before_dispatch(&spec, &ctx.vars);
            let state = ctx.script_host.run_hook(&unit, state, &mut ctx.totals);
            let HookState { req, vars, .. } = state;
            ctx.vars.extend(vars);
            req.apply_to(&mut spec);
        }

        let request = build_wire_request(&spec, ctx);
        let sent = self.dispatch(&spec, &request, session).await;

        let mut result = match sent {
            Ok(response) => {
                let mut result = ExecutionResult::from_response(&response);
                if !response.body.is_empty() {
                    match serde_json::from_slice(&response.body) {
                        Ok(json) => result.json = Some(json),
                        Err(err) => {
                            ctx.logger.debug("Couldn't parse the response as JSON");
                            tracing::trace!("JSON parse error: {}", err);
                        }
                    }
                }
                result
            }
            Err(fault) => {
                ctx.logger.warn(format!("Request failed: {}", fault));
                ExecutionResult::from_fault(fault.kind())
            }
        };

        result.classify(spec.expected.as_deref());
        ctx.totals.record_request(result.ok);
        ctx.logger
            .result(result.ok, format!("{} [{}]", spec.name, result.outcome));
        ctx.logger.end_buffering();

        // post-request 钩子：能看到响应，请求侧的改动不再生效
        for unit in self.gather_hooks(&spec, false, ctx) {
            let state = HookState::after_dispatch(&spec, &result, &ctx.vars);
            let state = ctx.script_host.run_hook(&unit, state, &mut ctx.totals);
            let HookState { res, vars, .. } = state;
            ctx.vars.extend(vars);
            if let Some(res) = res {
                res.apply_to(&mut result);
            }
        }
    }

    /// 收集某个阶段要执行的钩子单元
    ///
    /// 外部脚本文件相对请求文件所在目录解析，读取或编译失败
    /// 仅告警并跳过该文件。
    fn gather_hooks(&self, spec: &RequestSpec, pre: bool, ctx: &RunContext) -> Vec<HookUnit> {
        let (file, inline, label) = if pre {
            (&spec.pre_script_file, &spec.pre_script, "pre-request-file")
        } else {
            (&spec.post_script_file, &spec.post_script, "post-request-file")
        };

        let mut units = Vec::new();

        if let Some(file) = file {
            let resolved = if file.is_absolute() {
                file.clone()
            } else {
                spec.path
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .join(file)
            };
            match std::fs::read_to_string(&resolved) {
                Ok(script) => match ctx.script_host.compile(label, &script) {
                    Ok(unit) => units.push(unit),
                    Err(err) => ctx.logger.warn(format!("{}", err)),
                },
                Err(err) => ctx.logger.warn(format!(
                    "Couldn't read script file \"{}\": {}",
                    resolved.display(),
                    err
                )),
            }
        }

        if let Some(unit) = inline {
            units.push(unit.clone());
        }

        units
    }

    /// 发出请求，处理会话复用
    ///
    /// `session = true` 的请求懒建连接并留给后续请求复用；
    /// `session = false` 的请求先丢弃现有会话，再用一次性连接发送。
    async fn dispatch(
        &self,
        spec: &RequestSpec,
        request: &WireRequest,
        session: &mut Option<T::Conn>,
    ) -> std::result::Result<WireResponse, TransportFault> {
        if spec.session {
            match session {
                Some(conn) => self.transport.send(conn, request).await,
                None => {
                    let conn = self.transport.connect(spec.max_redirects)?;
                    let sent = self.transport.send(&conn, request).await;
                    *session = Some(conn);
                    sent
                }
            }
        } else {
            *session = None;
            let conn = self.transport.connect(spec.max_redirects)?;
            self.transport.send(&conn, request).await
        }
    }
}

fn build_wire_request(spec: &RequestSpec, ctx: &RunContext) -> WireRequest {
    let auth = match &spec.auth {
        Some(AuthScheme::Digest { .. }) => {
            ctx.logger
                .warn("Digest authentication is not supported yet, sending without credentials");
            None
        }
        other => other.clone(),
    };

    WireRequest {
        method: spec.method,
        url: spec.url.clone(),
        headers: spec.headers.clone(),
        body: spec.body.clone(),
        timeout: spec.timeout,
        auth,
    }
}
