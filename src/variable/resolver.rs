use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::variable::store::AppVars;

/// 变量替换器
pub struct VariableResolver;

impl VariableResolver {
    /// 替换文本中的所有 {{variable}} 占位符
    ///
    /// 单次非递归扫描：替换出来的值不会被再次扫描。
    /// 未定义的变量保持原样，`{{{{` 转义为字面的 `{{`。
    pub fn substitute(text: &str, vars: &AppVars) -> String {
        static VAR_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = VAR_REGEX.get_or_init(|| {
            Regex::new(r"\{\{(?:(\{\{)|([_a-zA-Z][_a-zA-Z0-9]*)\}\})").unwrap()
        });

        re.replace_all(text, |caps: &Captures| {
            if caps.get(1).is_some() {
                // 转义的双花括号
                "{{".to_string()
            } else {
                let var_name = &caps[2];
                vars.get(var_name)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            }
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_simple() {
        let mut vars = AppVars::new();
        vars.set("base_url", "http://localhost:8080");
        vars.set("name", "x");

        assert_eq!(VariableResolver::substitute("{{name}}", &vars), "x");
        assert_eq!(
            VariableResolver::substitute("{{base_url}}/api/users", &vars),
            "http://localhost:8080/api/users"
        );
    }

    #[test]
    fn test_substitute_multiple() {
        let mut vars = AppVars::new();
        vars.set("host", "example.com");
        vars.set("port", "8080");

        let output = VariableResolver::substitute("https://{{host}}:{{port}}/api", &vars);
        assert_eq!(output, "https://example.com:8080/api");
    }

    #[test]
    fn test_substitute_missing_variable() {
        let vars = AppVars::new();

        // 未找到的变量保持原样
        let output = VariableResolver::substitute("{{missing}}/path", &vars);
        assert_eq!(output, "{{missing}}/path");
    }

    #[test]
    fn test_escaped_braces() {
        let mut vars = AppVars::new();
        vars.set("name", "x");

        assert_eq!(VariableResolver::substitute("{{{{name}}", &vars), "{{name}}");
        assert_eq!(VariableResolver::substitute("a{{{{b", &vars), "a{{b");
    }

    #[test]
    fn test_single_pass_no_rescan() {
        let mut vars = AppVars::new();
        vars.set("outer", "{{inner}}");
        vars.set("inner", "nope");

        // 替换出来的值不会被再次替换
        assert_eq!(VariableResolver::substitute("{{outer}}", &vars), "{{inner}}");
    }

    #[test]
    fn test_boolean_value_substitutes_as_literal() {
        let mut vars = AppVars::new();
        vars.set_toml("flag", &toml::Value::Boolean(true));

        assert_eq!(
            VariableResolver::substitute("session = {{flag}}", &vars),
            "session = true"
        );
    }

    #[test]
    fn test_placeholder_inside_quoted_literal() {
        let mut vars = AppVars::new();
        vars.set("token", "abc123");

        // 替换发生在结构化解析之前，引号内同样生效
        let output = VariableResolver::substitute("url = \"https://x/{{token}}\"", &vars);
        assert_eq!(output, "url = \"https://x/abc123\"");
    }
}
