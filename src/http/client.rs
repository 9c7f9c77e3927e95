use std::time::Instant;

use reqwest::multipart::{Form, Part};

use crate::http::types::{Transport, TransportFault, WireRequest, WireResponse};
use crate::spec::{AuthScheme, HttpBody, Method, MultipartField};

/// reqwest 的默认重定向上限
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// 基于 reqwest 的传输实现
///
/// 连接上下文就是一个 `reqwest::Client`（内部连接池）。
/// 重定向上限是客户端级别的，在 `connect` 时固定；
/// 超时是请求级别的，逐请求设置。
#[derive(Debug, Default, Clone)]
pub struct ReqwestTransport;

impl Transport for ReqwestTransport {
    type Conn = reqwest::Client;

    fn connect(&self, max_redirects: Option<u32>) -> Result<Self::Conn, TransportFault> {
        let limit = max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS) as usize;
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(limit))
            .build()
            .map_err(TransportFault::from)
    }

    async fn send(
        &self,
        client: &Self::Conn,
        request: &WireRequest,
    ) -> Result<WireResponse, TransportFault> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|err| TransportFault::InvalidUrl(err.to_string()))?;

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut req = client.request(method, url);

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        if let Some(AuthScheme::Basic { username, password }) = &request.auth {
            req = req.basic_auth(username, Some(password));
        }

        match &request.body {
            Some(HttpBody::Text(text)) => req = req.body(text.clone()),
            Some(HttpBody::Multipart(fields)) => req = req.multipart(build_form(fields)?),
            None => {}
        }

        let start = Instant::now();
        let response = req.send().await?;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<invalid utf-8>").to_string(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(status, size = body.len(), "request completed");

        Ok(WireResponse {
            status,
            headers,
            body,
            elapsed,
        })
    }
}

/// 把 multipart 字段集组装成 reqwest 表单
///
/// 只有 `filename` 的字段读取文件内容上传，文件名取 basename；
/// `data` + `filename` 的字段上传内联数据并带上文件名。
fn build_form(fields: &[MultipartField]) -> Result<Form, TransportFault> {
    let mut form = Form::new();

    for field in fields {
        let part = match (&field.data, &field.file_name) {
            (Some(data), None) => Part::text(data.clone()),
            (None, Some(path)) => {
                let bytes = std::fs::read(path).map_err(|err| {
                    TransportFault::RequestError(format!(
                        "cannot read \"{}\": {}",
                        path.display(),
                        err
                    ))
                })?;
                Part::bytes(bytes).file_name(file_basename(path))
            }
            (Some(data), Some(path)) => Part::text(data.clone()).file_name(file_basename(path)),
            // 加载阶段已经对空字段发过警告
            (None, None) => continue,
        };
        form = form.part(field.name.clone(), part);
    }

    Ok(form)
}

fn file_basename(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
