use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

use regex::Regex;
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Scope};

use crate::logger::RunLogger;
use crate::runner::RunTotals;
use crate::script::hook::{HookState, HookUnit, TestCase};
use crate::spec::{SpecError, SpecResult};

/// 每个片段前固定拼接的 rhai 前导代码
///
/// 行数必须与 PRELUDE_LINES 保持一致：运行期故障行号
/// 减去这个偏移量得到用户片段内的 1-based 行号。
const PRELUDE: &str = "\
fn check(cond, message) {
    if !cond { throw message; }
}
fn check_eq(actual, expected) {
    if actual != expected { throw `expected ${expected}, got ${actual}`; }
}
";
const PRELUDE_LINES: usize = 6;

/// 脚本宿主
///
/// 持有一个 rhai 引擎，注册的宿主函数就是钩子的全部能力面：
/// 请求读写（`req_url`/`set_req_url`/`req_method`/`req_header`/
/// `set_req_header`/`req_body`/`set_req_body`/`req_name`/`set_req_name`）、
/// 响应读写（`res_status`/`res_fault`/`res_header`/`res_size`/
/// `res_time_ms`/`res_json`/`set_res_status`，仅 post 钩子有效）、
/// 变量（`var`/`set_var`）和日志（`log`/`warn`/`print`）。
pub struct ScriptHost {
    engine: Engine,
    state: Rc<RefCell<HookState>>,
    logger: Rc<RunLogger>,
}

impl ScriptHost {
    pub fn new(logger: Rc<RunLogger>) -> Self {
        let mut engine = Engine::new();
        let state: Rc<RefCell<HookState>> = Rc::new(RefCell::new(HookState::default()));

        let lg = logger.clone();
        engine.on_print(move |text| lg.info(text));
        let lg = logger.clone();
        engine.on_debug(move |text, _, _| lg.debug(text));

        let lg = logger.clone();
        engine.register_fn("log", move |message: &str| lg.info(message));
        let lg = logger.clone();
        engine.register_fn("warn", move |message: &str| lg.warn(message));

        // --- 请求 ---
        let st = state.clone();
        engine.register_fn("req_name", move || st.borrow().req.name.clone());
        let st = state.clone();
        engine.register_fn("set_req_name", move |name: &str| {
            st.borrow_mut().req.name = name.to_string();
        });
        let st = state.clone();
        engine.register_fn("req_url", move || st.borrow().req.url.clone());
        let st = state.clone();
        engine.register_fn("set_req_url", move |url: &str| {
            st.borrow_mut().req.url = url.to_string();
        });
        let st = state.clone();
        engine.register_fn("req_method", move || st.borrow().req.method.clone());
        let st = state.clone();
        engine.register_fn("req_header", move |name: &str| -> String {
            st.borrow()
                .req
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
                .unwrap_or_default()
        });
        let st = state.clone();
        engine.register_fn("set_req_header", move |name: &str, value: &str| {
            let mut state = st.borrow_mut();
            match state
                .req
                .headers
                .iter_mut()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
            {
                Some(entry) => entry.1 = value.to_string(),
                None => state.req.headers.push((name.to_string(), value.to_string())),
            }
        });
        let st = state.clone();
        engine.register_fn("req_body", move || -> String {
            st.borrow().req.body_text.clone().unwrap_or_default()
        });
        let st = state.clone();
        engine.register_fn("set_req_body", move |text: &str| {
            st.borrow_mut().req.body_text = Some(text.to_string());
        });

        // --- 响应，仅 post 钩子可用 ---
        let st = state.clone();
        engine.register_fn("res_status", move || -> Result<i64, Box<EvalAltResult>> {
            match &st.borrow().res {
                Some(res) => Ok(res.status),
                None => Err("no response available in a pre-request hook".into()),
            }
        });
        let st = state.clone();
        engine.register_fn("res_fault", move || -> Result<String, Box<EvalAltResult>> {
            match &st.borrow().res {
                Some(res) => Ok(res.failure.clone().unwrap_or_default()),
                None => Err("no response available in a pre-request hook".into()),
            }
        });
        let st = state.clone();
        engine.register_fn(
            "res_header",
            move |name: &str| -> Result<String, Box<EvalAltResult>> {
                match &st.borrow().res {
                    Some(res) => Ok(res
                        .headers
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(name))
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()),
                    None => Err("no response available in a pre-request hook".into()),
                }
            },
        );
        let st = state.clone();
        engine.register_fn("res_size", move || -> Result<i64, Box<EvalAltResult>> {
            match &st.borrow().res {
                Some(res) => Ok(res.size),
                None => Err("no response available in a pre-request hook".into()),
            }
        });
        let st = state.clone();
        engine.register_fn("res_time_ms", move || -> Result<i64, Box<EvalAltResult>> {
            match &st.borrow().res {
                Some(res) => Ok(res.elapsed_ms),
                None => Err("no response available in a pre-request hook".into()),
            }
        });
        let st = state.clone();
        engine.register_fn("res_json", move || -> Result<Dynamic, Box<EvalAltResult>> {
            match &st.borrow().res {
                Some(res) => match &res.json {
                    Some(json) => rhai::serde::to_dynamic(json.clone()),
                    None => Ok(Dynamic::UNIT),
                },
                None => Err("no response available in a pre-request hook".into()),
            }
        });
        let st = state.clone();
        engine.register_fn(
            "set_res_status",
            move |status: i64| -> Result<(), Box<EvalAltResult>> {
                match &mut st.borrow_mut().res {
                    Some(res) => {
                        res.status = status;
                        Ok(())
                    }
                    None => Err("no response available in a pre-request hook".into()),
                }
            },
        );

        // --- 变量 ---
        let st = state.clone();
        engine.register_fn("var", move |name: &str| -> String {
            st.borrow().vars.get(name).cloned().unwrap_or_default()
        });
        let st = state.clone();
        engine.register_fn("set_var", move |name: &str, value: Dynamic| {
            // 与环境文件加载一致：布尔值归一化为 "true"/"false"
            let normalized = if value.is::<bool>() {
                if value.as_bool().unwrap_or(false) {
                    "true".to_string()
                } else {
                    "false".to_string()
                }
            } else {
                value.to_string()
            };
            st.borrow_mut().vars.insert(name.to_string(), normalized);
        });

        Self {
            engine,
            state,
            logger,
        }
    }

    /// 编译一个钩子片段
    ///
    /// 拼接 prelude 后编译为 AST，并静态扫描测试用例标记。
    pub fn compile(&self, script_name: &str, source: &str) -> SpecResult<HookUnit> {
        let wrapped = format!("{}{}", PRELUDE, source);
        let ast = self.engine.compile(&wrapped).map_err(|err| {
            let rhai::ParseError(err_type, position) = err;
            let line = position.line().map(|l| l.saturating_sub(PRELUDE_LINES).max(1));
            SpecError::Script {
                script: script_name.to_string(),
                message: match line {
                    Some(line) => format!("{} at line {}", err_type, line),
                    None => err_type.to_string(),
                },
            }
        })?;

        Ok(HookUnit {
            ast,
            tests: scan_test_cases(source),
        })
    }

    /// 执行一个钩子单元
    ///
    /// 片段主体和每个测试用例各自故障隔离：运行期故障被拦截、
    /// 折算为片段内行号并记为失败，永远不会向调用方传播。
    /// 测试用例在主体之后按注册顺序无参调用，结果计入 Tests 统计。
    pub fn run_hook(&self, unit: &HookUnit, state: HookState, totals: &mut RunTotals) -> HookState {
        *self.state.borrow_mut() = state;

        let mut scope = Scope::new();
        if let Err(err) = self.engine.run_ast_with_scope(&mut scope, &unit.ast) {
            self.logger.result(
                false,
                format!(
                    "Hook failed with \"{}\"{}: {}",
                    fault_kind(&err),
                    fault_line_suffix(&err),
                    fault_message(&err)
                ),
            );
        }

        for test in &unit.tests {
            // 只调用函数本身，主体语句不再重跑
            let options = CallFnOptions::new().eval_ast(false).rewind_scope(false);
            match self.engine.call_fn_with_options::<Dynamic>(
                options,
                &mut scope,
                &unit.ast,
                &test.fn_name,
                (),
            ) {
                Ok(_) => {
                    totals.record_test(true);
                    self.logger.result(
                        true,
                        format!("Test case \"{}\" in function {}", test.name, test.fn_name),
                    );
                }
                Err(err) => {
                    totals.record_test(false);
                    self.logger.result(
                        false,
                        format!("Test case \"{}\" in function {}", test.name, test.fn_name),
                    );
                    self.logger.warn(format!(
                        "Failed with \"{}\"{}: {}",
                        fault_kind(&err),
                        fault_line_suffix(&err),
                        fault_message(&err)
                    ));
                }
            }
        }

        std::mem::take(&mut *self.state.borrow_mut())
    }
}

/// 扫描片段源码，收集测试用例标记
///
/// `//@test_case("name")` 标记其后的下一个 `fn` 定义，
/// 注册顺序即源码顺序。
fn scan_test_cases(source: &str) -> Vec<TestCase> {
    static MARKER_REGEX: OnceLock<Regex> = OnceLock::new();
    static FN_REGEX: OnceLock<Regex> = OnceLock::new();
    let marker =
        MARKER_REGEX.get_or_init(|| Regex::new(r#"^//@test_case\(\s*"([^"]*)"\s*\)"#).unwrap());
    let fn_def = FN_REGEX.get_or_init(|| Regex::new(r"^fn\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

    let mut tests = Vec::new();
    let mut pending: Option<String> = None;

    for line in source.lines() {
        let line = line.trim_start();
        if let Some(caps) = marker.captures(line) {
            pending = Some(caps[1].to_string());
            continue;
        }
        if let Some(caps) = fn_def.captures(line) {
            if let Some(name) = pending.take() {
                tests.push(TestCase {
                    name,
                    fn_name: caps[1].to_string(),
                });
            }
        }
    }

    tests
}

/// 运行期故障的类别名
fn fault_kind(err: &EvalAltResult) -> &'static str {
    match err {
        EvalAltResult::ErrorRuntime(..) => "RuntimeError",
        EvalAltResult::ErrorFunctionNotFound(..) => "FunctionNotFound",
        EvalAltResult::ErrorVariableNotFound(..) => "VariableNotFound",
        EvalAltResult::ErrorArithmetic(..) => "ArithmeticError",
        EvalAltResult::ErrorArrayBounds(..) => "IndexOutOfBounds",
        EvalAltResult::ErrorInFunctionCall(..) => "RuntimeError",
        _ => "ScriptError",
    }
}

/// 折算为用户片段内的 1-based 行号
fn user_line(err: &EvalAltResult) -> Option<usize> {
    err.position()
        .line()
        .map(|line| line.saturating_sub(PRELUDE_LINES).max(1))
}

fn fault_line_suffix(err: &EvalAltResult) -> String {
    match user_line(err) {
        Some(line) => format!(" at line {}", line),
        None => String::new(),
    }
}

fn fault_message(err: &EvalAltResult) -> String {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => value.to_string(),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => fault_message(inner),
        other => other.to_string(),
    }
}
