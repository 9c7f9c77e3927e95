use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::script::HookUnit;

/// 支持的 HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Options,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl FromStr for Method {
    type Err = SpecError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "OPTIONS" => Ok(Method::Options),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(SpecError::InvalidMethod(s.to_string())),
        }
    }
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 请求认证方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic { username: String, password: String },
    Digest { username: String, password: String },
}

/// Multipart 表单字段
///
/// `filename` 和 `data` 至少要有一个。只有 `filename` 时表示
/// 要上传的真实文件，加载时已解析为绝对路径。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartField {
    pub name: String,
    pub file_name: Option<PathBuf>,
    pub data: Option<String>,
}

/// 请求体，text 与 multipart 二选一
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Text(String),
    Multipart(Vec<MultipartField>),
}

/// 期望结果：状态码或传输失败类别名
///
/// `expected_status` 声明后，成功与否完全由观察值是否在集合内决定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Status(u16),
    Fault(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Status(code) => write!(f, "{}", code),
            Outcome::Fault(kind) => f.write_str(kind),
        }
    }
}

/// 解析并校验后的请求描述
///
/// 每次执行前都会从原始文本和当前变量状态重新构建，
/// 替换结果永远反映最新的变量值。
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// 请求名称，默认为文件路径
    pub name: String,

    /// 请求文件路径
    pub path: PathBuf,

    /// 请求 URL，可以为空
    pub url: String,

    pub method: Method,

    /// 请求超时。文件中以毫秒声明，内部存为 Duration
    pub timeout: Option<Duration>,

    /// 最大重定向次数，None 表示使用传输层默认值
    pub max_redirects: Option<u32>,

    /// 是否复用共享连接上下文
    pub session: bool,

    pub auth: Option<AuthScheme>,

    /// Headers，键已归一化为 Train-Case，保持声明顺序
    pub headers: Vec<(String, String)>,

    pub body: Option<HttpBody>,

    /// 期望的状态码/失败类别集合
    pub expected: Option<Vec<Outcome>>,

    pub pre_script: Option<HookUnit>,
    pub post_script: Option<HookUnit>,

    /// 脚本文件引用，执行阶段才读取和编译
    pub pre_script_file: Option<PathBuf>,
    pub post_script_file: Option<PathBuf>,
}

impl RequestSpec {
    pub fn new(path: PathBuf, method: Method) -> Self {
        Self {
            name: path.display().to_string(),
            path,
            url: String::new(),
            method,
            timeout: None,
            max_redirects: None,
            session: false,
            auth: None,
            headers: Vec::new(),
            body: None,
            expected: None,
            pre_script: None,
            post_script: None,
            pre_script_file: None,
            post_script_file: None,
        }
    }

    /// 插入 header，键归一化为 Train-Case
    ///
    /// 归一化后重复的键按声明顺序覆盖旧值。
    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        let normalized = normalize_header_name(name);
        let value = value.into();
        if let Some(entry) = self.headers.iter_mut().find(|(k, _)| *k == normalized) {
            entry.1 = value;
        } else {
            self.headers.push((normalized, value));
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let normalized = normalize_header_name(name);
        self.headers
            .iter()
            .find(|(k, _)| *k == normalized)
            .map(|(_, v)| v.as_str())
    }
}

/// Header 名归一化为 Train-Case
///
/// 按 `-` 切分，每段首字母大写其余小写，再用 `-` 连接。
/// Header 本身大小写不敏感，但习惯上都写成这种形式。
pub fn normalize_header_name(name: &str) -> String {
    name.split('-')
        .map(|token| {
            let mut chars = token.chars();
            match chars.next() {
                Some(first) => {
                    let mut token = first.to_uppercase().collect::<String>();
                    token.push_str(&chars.as_str().to_lowercase());
                    token
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// 请求文件解析错误
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("\"{0}\" table is missing")]
    MissingTable(&'static str),

    #[error("\"{field}\" is missing in the \"{table}\" table")]
    MissingField {
        table: String,
        field: &'static str,
    },

    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("Invalid body type '{0}', expected \"text\" or \"multipart\"")]
    InvalidBodyType(String),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Script error in \"{script}\": {message}")]
    Script { script: String, message: String },
}

/// 解析结果类型别名
pub type SpecResult<T> = Result<T, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("POST".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("Delete".parse::<Method>().unwrap(), Method::Delete);
        assert!("FETCH".parse::<Method>().is_err());
    }

    #[test]
    fn test_normalize_header_name() {
        assert_eq!(normalize_header_name("content-type"), "Content-Type");
        assert_eq!(normalize_header_name("X-CUSTOM-HEADER"), "X-Custom-Header");
        assert_eq!(normalize_header_name("accept"), "Accept");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for name in ["content-type", "X-Trace-ID", "authorization", "A-b-C"] {
            let once = normalize_header_name(name);
            assert_eq!(normalize_header_name(&once), once);
        }
    }

    #[test]
    fn test_insert_header_overwrites_normalized_duplicate() {
        let mut spec = RequestSpec::new(PathBuf::from("test.toml"), Method::Get);
        spec.insert_header("content-type", "text/plain");
        spec.insert_header("Content-Type", "application/json");

        assert_eq!(spec.headers.len(), 1);
        assert_eq!(spec.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::Status(200).to_string(), "200");
        assert_eq!(Outcome::Fault("Timeout".to_string()).to_string(), "Timeout");
    }
}
