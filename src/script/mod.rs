pub mod hook;
pub mod host;

pub use hook::{HookState, HookUnit, RequestView, ResponseView, TestCase};
pub use host::ScriptHost;
