use std::time::Duration;

use crate::spec::{AuthScheme, HttpBody, Method};

/// 即将上线的请求
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<HttpBody>,
    pub timeout: Option<Duration>,
    pub auth: Option<AuthScheme>,
}

/// 传输层返回的原始响应
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

/// 分类后的传输失败
///
/// 类别名可以出现在 `expected_status` 集合里，代替状态码参与分类。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFault {
    #[error("request timed out")]
    Timeout,

    #[error("connection error")]
    ConnectionError,

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request error: {0}")]
    RequestError(String),
}

impl TransportFault {
    /// 分类名，用于结果记录与期望匹配
    pub fn kind(&self) -> &'static str {
        match self {
            TransportFault::Timeout => "Timeout",
            TransportFault::ConnectionError => "ConnectionError",
            TransportFault::TooManyRedirects => "TooManyRedirects",
            TransportFault::InvalidUrl(_) => "InvalidUrl",
            TransportFault::RequestError(_) => "RequestError",
        }
    }
}

impl From<reqwest::Error> for TransportFault {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportFault::Timeout
        } else if err.is_redirect() {
            TransportFault::TooManyRedirects
        } else if err.is_connect() {
            TransportFault::ConnectionError
        } else {
            TransportFault::RequestError(err.to_string())
        }
    }
}

/// HTTP 传输协作方
///
/// `Conn` 是可复用的连接上下文：会话请求之间共享同一个实例，
/// 非会话请求每次新建并用完即弃。
pub trait Transport {
    type Conn;

    /// 建立一个连接上下文，重定向上限在这里固定下来
    fn connect(&self, max_redirects: Option<u32>) -> Result<Self::Conn, TransportFault>;

    /// 通过给定的连接上下文发出请求
    fn send(
        &self,
        conn: &Self::Conn,
        request: &WireRequest,
    ) -> impl Future<Output = Result<WireResponse, TransportFault>>;
}
