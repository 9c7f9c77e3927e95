//! rapitest - 声明式 HTTP 请求执行器
//!
//! 请求用 TOML 文档描述，支持变量替换、前后钩子脚本和
//! 期望结果断言，按顺序执行并汇总通过/失败统计。

pub mod cli;
pub mod error;
pub mod http;
pub mod logger;
pub mod runner;
pub mod script;
pub mod spec;
pub mod variable;

pub use error::{RapitestError, Result};
