//! 请求文档解析
//!
//! 一个请求文件是一份 TOML 文档，描述一次 HTTP 请求以及它的
//! 期望结果和钩子脚本。加载流程先做变量替换再解析结构。

mod loader;
mod types;

pub use loader::SpecLoader;
pub use types::{
    AuthScheme, HttpBody, Method, MultipartField, Outcome, RequestSpec, SpecError, SpecResult,
    normalize_header_name,
};
