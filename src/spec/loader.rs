use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logger::RunLogger;
use crate::script::ScriptHost;
use crate::spec::types::{
    AuthScheme, HttpBody, Method, MultipartField, Outcome, RequestSpec, SpecError, SpecResult,
    normalize_header_name,
};
use crate::variable::{AppVars, VariableResolver};

/// 请求文件加载器
///
/// 把一份请求文档变成校验过的 `RequestSpec`。变量替换发生在
/// 结构化解析之前，作用于整个原始文本，所以每次执行前都要
/// 用当前的变量状态重新加载。
pub struct SpecLoader;

impl SpecLoader {
    pub fn load(
        path: &Path,
        source: &str,
        vars: &AppVars,
        host: &ScriptHost,
        logger: &RunLogger,
    ) -> SpecResult<RequestSpec> {
        logger.debug(format!("Parsing {}", path.display()));

        let substituted = VariableResolver::substitute(source, vars);
        let data: toml::Table = toml::from_str(&substituted)?;

        // request 表是强制的
        let request = data
            .get("request")
            .and_then(|v| v.as_table())
            .ok_or(SpecError::MissingTable("request"))?;

        let method: Method = request
            .get("method")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SpecError::MissingField {
                table: "request".to_string(),
                field: "method",
            })?
            .parse()?;
        logger.debug(format!("request.method = \"{}\"", method));

        let mut spec = RequestSpec::new(path.to_path_buf(), method);

        match request.get("url").and_then(|v| v.as_str()) {
            Some(url) => {
                spec.url = url.to_string();
                logger.debug(format!("request.url = \"{}\"", spec.url));
            }
            None => logger.warn("URL is missing in the \"request\" table, using empty one"),
        }

        match request.get("timeout") {
            Some(value) => {
                let ms = value
                    .as_float()
                    .or_else(|| value.as_integer().map(|i| i as f64));
                match ms {
                    Some(ms) if ms >= 0.0 => {
                        spec.timeout = Some(Duration::from_secs_f64(ms / 1000.0));
                        logger.debug(format!("request.timeout = {}ms", ms));
                    }
                    _ => logger.warn("\"timeout\" should be a number of milliseconds, ignoring"),
                }
            }
            None => logger.debug(
                "timeout is missing in the \"request\" table, transport default will be used",
            ),
        }

        match request.get("max_redirects") {
            Some(value) => match value.as_integer() {
                Some(limit) if (0..=u32::MAX as i64).contains(&limit) => {
                    spec.max_redirects = Some(limit as u32);
                    logger.debug(format!("request.max_redirects = {}", limit));
                }
                _ => logger.warn(
                    "\"max_redirects\" should be a non-negative integer, ignoring",
                ),
            },
            None => logger.debug(
                "max_redirects is not set in the \"request\" table, transport default will be used",
            ),
        }

        spec.session = request
            .get("session")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        logger.debug(format!("request.session = {}", spec.session));

        if let Some(value) = request.get("expected_status") {
            match value.as_array() {
                Some(items) => {
                    let mut expected = Vec::new();
                    for item in items {
                        match item {
                            toml::Value::Integer(code)
                                if (0..=u16::MAX as i64).contains(code) =>
                            {
                                expected.push(Outcome::Status(*code as u16));
                            }
                            toml::Value::String(kind) => {
                                expected.push(Outcome::Fault(kind.clone()));
                            }
                            other => logger.warn(format!(
                                "ignoring invalid \"expected_status\" entry: {}",
                                other
                            )),
                        }
                    }
                    spec.expected = Some(expected);
                }
                None => logger.warn("\"expected_status\" should be an array, ignoring"),
            }
        }

        if let Some(auth) = data.get("auth").and_then(|v| v.as_table()) {
            spec.auth = parse_auth(auth, logger);
        }

        if let Some(headers) = data.get("headers").and_then(|v| v.as_table()) {
            for (name, value) in headers {
                let value = value_to_string(value);
                logger.debug(format!(
                    "header: \"{}\" = \"{}\"",
                    normalize_header_name(name),
                    value
                ));
                spec.insert_header(name, value);
            }
        }

        if let Some(body) = data.get("body").and_then(|v| v.as_table()) {
            let body_type = body
                .get("type")
                .and_then(|v| v.as_str())
                .ok_or_else(|| SpecError::MissingField {
                    table: "body".to_string(),
                    field: "type",
                })?;
            logger.debug(format!("body.type = \"{}\"", body_type));

            match body_type.to_lowercase().as_str() {
                "text" => {
                    let text = match body.get("text").and_then(|v| v.as_str()) {
                        Some(text) => text.to_string(),
                        None => {
                            logger.warn(
                                "\"text\" is missing in the \"body\" table, although \"type\" is set to \"text\"",
                            );
                            String::new()
                        }
                    };
                    spec.body = Some(HttpBody::Text(text));
                }
                "multipart" => {
                    spec.body = Some(HttpBody::Multipart(collect_multipart(
                        &data, path, logger,
                    )?));
                }
                other => return Err(SpecError::InvalidBodyType(other.to_string())),
            }
        }

        if let Some(scripts) = data.get("scripts").and_then(|v| v.as_table()) {
            if let Some(script) = scripts.get("pre-request").and_then(|v| v.as_str()) {
                spec.pre_script = Some(host.compile("pre-request", script)?);
            }
            if let Some(file) = scripts.get("pre-request-file").and_then(|v| v.as_str()) {
                spec.pre_script_file = Some(PathBuf::from(file));
            }
            if let Some(script) = scripts.get("post-request").and_then(|v| v.as_str()) {
                spec.post_script = Some(host.compile("post-request", script)?);
            }
            if let Some(file) = scripts.get("post-request-file").and_then(|v| v.as_str()) {
                spec.post_script_file = Some(PathBuf::from(file));
            }
        }

        Ok(spec)
    }
}

fn value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

/// 解析 auth 表
///
/// `basic`/`digest` 子表都要求同时给出 `username` 和 `password`，
/// 缺一个就警告并忽略；其他认证方式不支持。
fn parse_auth(auth: &toml::Table, logger: &RunLogger) -> Option<AuthScheme> {
    for (kind, table) in auth {
        let Some(table) = table.as_table() else {
            logger.warn(format!("unsupported auth kind \"{}\", ignoring", kind));
            continue;
        };

        let credentials = (
            table.get("username").and_then(|v| v.as_str()),
            table.get("password").and_then(|v| v.as_str()),
        );

        match (kind.as_str(), credentials) {
            ("basic", (Some(username), Some(password))) => {
                return Some(AuthScheme::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                });
            }
            ("digest", (Some(username), Some(password))) => {
                return Some(AuthScheme::Digest {
                    username: username.to_string(),
                    password: password.to_string(),
                });
            }
            ("basic", _) | ("digest", _) => {
                logger.warn(format!(
                    "\"{}\" auth requires both \"username\" and \"password\", ignoring",
                    kind
                ));
            }
            _ => logger.warn(format!("unsupported auth kind \"{}\", ignoring", kind)),
        }
    }
    None
}

/// 收集 multipart 字段
///
/// 取所有键里含有 "multipart" 的顶层表，`[multipart.a]` 这类
/// 点号小节展开成 "multipart.a"，按展开后的键名字典序排列，
/// 字段顺序与声明顺序无关。
fn collect_multipart(
    data: &toml::Table,
    path: &Path,
    logger: &RunLogger,
) -> SpecResult<Vec<MultipartField>> {
    let mut sections: Vec<(String, &toml::Table)> = Vec::new();

    for (key, value) in data {
        if !key.contains("multipart") {
            continue;
        }
        let Some(table) = value.as_table() else {
            continue;
        };

        let is_container =
            !table.is_empty() && table.values().all(|v| v.as_table().is_some());
        if is_container {
            for (sub_key, sub_value) in table {
                if let Some(sub_table) = sub_value.as_table() {
                    sections.push((format!("{}.{}", key, sub_key), sub_table));
                }
            }
        } else {
            sections.push((key.clone(), table));
        }
    }

    sections.sort_by(|(a, _), (b, _)| a.cmp(b));

    let spec_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut fields = Vec::new();

    for (key, section) in sections {
        let name = section
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SpecError::MissingField {
                table: key.clone(),
                field: "name",
            })?
            .to_string();

        let data = section
            .get("data")
            .and_then(|v| v.as_str())
            .map(String::from);
        let file_name = section
            .get("filename")
            .and_then(|v| v.as_str())
            .map(PathBuf::from);

        if data.is_none() && file_name.is_none() {
            logger.warn(format!(
                "neither \"data\" nor \"filename\" are specified in section \"{}\", skipping",
                key
            ));
            continue;
        }

        // 只有 filename 的字段指向真实文件，相对路径按请求文件所在目录解析
        let file_name = match file_name {
            Some(file) if data.is_none() && !file.is_absolute() => {
                let joined = spec_dir.join(file);
                Some(std::path::absolute(&joined).unwrap_or(joined))
            }
            other => other,
        };

        fields.push(MultipartField {
            name,
            file_name,
            data,
        });
    }

    Ok(fields)
}
