//! 顺序执行引擎
//!
//! 按入列顺序执行请求文件，串联变量状态、会话连接和统计。

mod executor;
mod reporter;
mod types;

pub use executor::{Runner, SpecSource, USER_AGENT};
pub use reporter::SummaryReporter;
pub use types::{ExecutionResult, RunContext, RunTotals};
