use std::collections::HashMap;
use std::path::Path;

use crate::Result;

/// 变量存储，保存所有可用变量
///
/// 扁平的 name -> value 映射。布尔值在插入时归一化为字符串
/// `"true"`/`"false"`，数字转为十进制字符串。
#[derive(Debug, Clone, Default)]
pub struct AppVars {
    variables: HashMap<String, String>,
}

impl AppVars {
    /// 创建新的空变量存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 从环境文件加载（扁平的 `key = value` TOML 表）
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let table: toml::Table = toml::from_str(&content)?;

        let mut vars = Self::new();
        for (key, value) in &table {
            vars.set_toml(key.clone(), value);
        }

        tracing::debug!(
            "Loaded {} variables from {}",
            vars.len(),
            path.as_ref().display()
        );
        Ok(vars)
    }

    /// 插入变量
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// 插入 TOML 值，按类型归一化为字符串
    pub fn set_toml(&mut self, key: impl Into<String>, value: &toml::Value) {
        let normalized = match value {
            toml::Value::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            other => other.to_string(),
        };
        self.variables.insert(key.into(), normalized);
    }

    /// 获取变量值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(|s| s.as_str())
    }

    /// 复制一份当前的变量表（脚本钩子用）
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.variables.clone()
    }

    /// 批量合并变量
    pub fn extend(&mut self, vars: HashMap<String, String>) {
        self.variables.extend(vars);
    }

    /// 变量数量
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_set_get() {
        let mut vars = AppVars::new();
        assert!(vars.is_empty());

        vars.set("key", "value");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("key"), Some("value"));
        assert_eq!(vars.get("missing"), None);
    }

    #[test]
    fn test_boolean_normalized_on_insertion() {
        let mut vars = AppVars::new();
        vars.set_toml("enabled", &toml::Value::Boolean(true));
        vars.set_toml("disabled", &toml::Value::Boolean(false));

        assert_eq!(vars.get("enabled"), Some("true"));
        assert_eq!(vars.get("disabled"), Some("false"));
    }

    #[test]
    fn test_numbers_stringified() {
        let mut vars = AppVars::new();
        vars.set_toml("port", &toml::Value::Integer(8080));
        assert_eq!(vars.get("port"), Some("8080"));
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://localhost:8080\"").unwrap();
        writeln!(file, "secure = true").unwrap();
        file.flush().unwrap();

        let vars = AppVars::from_file(file.path()).unwrap();
        assert_eq!(vars.get("base_url"), Some("http://localhost:8080"));
        assert_eq!(vars.get("secure"), Some("true"));
    }
}
