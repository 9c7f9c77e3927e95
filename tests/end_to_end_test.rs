use std::rc::Rc;
use std::time::Duration;

use rapitest::http::ReqwestTransport;
use rapitest::logger::RunLogger;
use rapitest::runner::{RunContext, Runner, SummaryReporter};
use rapitest::variable::AppVars;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn captured_context(vars: AppVars) -> (Rc<RunLogger>, RunContext) {
    let logger = Rc::new(RunLogger::captured(false));
    let ctx = RunContext::with_logger(vars, logger.clone());
    (logger, ctx)
}

/// 测试最小请求文件的完整执行流程
#[tokio::test]
async fn test_get_request_end_to_end() {
    // 启动模拟服务器
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "users": [{"id": 1, "name": "Alice"}]
        })))
        .mount(&mock_server)
        .await;

    let source = format!(
        r#"
[request]
method = "GET"
url = "{}/api/users"
expected_status = [200]

[headers]
accept = "application/json"
"#,
        mock_server.uri()
    );

    let mut runner = Runner::new(ReqwestTransport);
    runner.add_source("users.toml", source);

    let (logger, mut ctx) = captured_context(AppVars::new());
    runner.run(&mut ctx).await;
    SummaryReporter::print(&ctx.totals, &ctx.logger);

    assert_eq!(ctx.totals.requests_total, 1);
    assert_eq!(ctx.totals.requests_ok, 1);

    let output = logger.take_output().join("\n");
    assert!(output.contains("users.toml [200]"));
    assert!(output.contains("total: 1, ok: 1, failed: 0"));
}

/// 测试文本 body 与 post 钩子里的 JSON 断言
#[tokio::test]
async fn test_post_with_body_and_response_checks() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(header("Content-Type", "application/json"))
        .and(body_string(r#"{"user":"alice"}"#))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(serde_json::json!({"token": "abc123"})),
        )
        .mount(&mock_server)
        .await;

    let source = format!(
        r#"
[request]
method = "POST"
url = "{}/api/login"
expected_status = [201]

[headers]
"content-type" = "application/json"

[body]
type = "text"
text = '{{"user":"alice"}}'

[scripts]
post-request = '''
//@test_case("token is returned")
fn token_present() {{
    let payload = res_json();
    check_eq(payload.token, "abc123");
}}

//@test_case("response is small")
fn small_body() {{
    check(res_size() < 1024, "payload too large");
}}
'''
"#,
        mock_server.uri()
    );

    let mut runner = Runner::new(ReqwestTransport);
    runner.add_source("login.toml", source);

    let (logger, mut ctx) = captured_context(AppVars::new());
    runner.run(&mut ctx).await;

    assert_eq!(ctx.totals.requests_ok, 1);
    assert_eq!(ctx.totals.tests_total, 2);
    assert_eq!(ctx.totals.tests_ok, 2);

    let output = logger.take_output().join("\n");
    assert!(output.contains("Test case \"token is returned\" in function token_present"));
}

/// 测试 multipart 表单上传（字面数据 + 真实文件）
#[tokio::test]
async fn test_multipart_upload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(temp_dir.path().join("payload.txt"), b"file contents").unwrap();

    let source = format!(
        r#"
[request]
method = "POST"
url = "{}/api/upload"
expected_status = [200]

[body]
type = "multipart"

[multipart.meta]
name = "description"
data = "a small file"

[multipart.file]
name = "upload"
filename = "payload.txt"
"#,
        mock_server.uri()
    );

    // 相对 filename 以请求文件所在目录为基准
    let spec_path = temp_dir.path().join("upload.toml");
    std::fs::write(&spec_path, &source).unwrap();

    let mut runner = Runner::new(ReqwestTransport);
    runner.add_file(&spec_path).unwrap();

    let (_logger, mut ctx) = captured_context(AppVars::new());
    runner.run(&mut ctx).await;

    assert_eq!(ctx.totals.requests_ok, 1);
}

/// 测试请求超时折算为可被期望的 Timeout 故障
#[tokio::test]
async fn test_timeout_fault_can_be_expected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let source = format!(
        r#"
[request]
method = "GET"
url = "{}/api/slow"
timeout = 100
expected_status = ["Timeout"]
"#,
        mock_server.uri()
    );

    let mut runner = Runner::new(ReqwestTransport);
    runner.add_source("slow.toml", source);

    let (logger, mut ctx) = captured_context(AppVars::new());
    runner.run(&mut ctx).await;

    assert_eq!(ctx.totals.requests_ok, 1);
    let output = logger.take_output().join("\n");
    assert!(output.contains("slow.toml [Timeout]"));
}

/// 测试会话复用走的是同一个客户端
#[tokio::test]
async fn test_session_requests_against_real_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let source = format!(
        r#"
[request]
method = "GET"
url = "{}/api/ping"
session = true
expected_status = [204]
"#,
        mock_server.uri()
    );

    let mut runner = Runner::new(ReqwestTransport);
    runner.add_source("ping1.toml", source.clone());
    runner.add_source("ping2.toml", source);

    let (_logger, mut ctx) = captured_context(AppVars::new());
    runner.run(&mut ctx).await;

    assert_eq!(ctx.totals.requests_total, 2);
    assert_eq!(ctx.totals.requests_ok, 2);
}

/// 测试 basic 认证凭据上线
#[tokio::test]
async fn test_basic_auth_header_sent() {
    let mock_server = MockServer::start().await;

    // "user:pass" 的 base64
    Mock::given(method("GET"))
        .and(path("/api/private"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let source = format!(
        r#"
[request]
method = "GET"
url = "{}/api/private"
expected_status = [200]

[auth.basic]
username = "user"
password = "pass"
"#,
        mock_server.uri()
    );

    let mut runner = Runner::new(ReqwestTransport);
    runner.add_source("private.toml", source);

    let (_logger, mut ctx) = captured_context(AppVars::new());
    runner.run(&mut ctx).await;

    assert_eq!(ctx.totals.requests_ok, 1);
}
