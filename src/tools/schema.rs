//! 工具参数 JSON Schema 生成（schemars）
//!
//! 有类型参数的工具用 `#[derive(JsonSchema, Deserialize)]` 声明参数结构，再由 schema_of 生成 schema。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 生成类型 T 的 JSON Schema
pub fn schema_of<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

/// 解析工具参数；null 视为空对象，失败时给出可回填给模型的错误描述
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, String> {
    let args = if args.is_null() {
        serde_json::json!({})
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| format!("invalid arguments for '{tool}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Debug, JsonSchema, Deserialize)]
    struct AddOneArgs {
        /// 被加数
        n: i64,
    }

    #[test]
    fn test_schema_lists_properties() {
        let s = schema_of::<AddOneArgs>();
        assert!(s["properties"]["n"].is_object());
        assert_eq!(s["required"][0], "n");
    }

    #[test]
    fn test_parse_args_reports_tool_name() {
        let err = parse_args::<AddOneArgs>("add_one", serde_json::json!({"n": "x"})).unwrap_err();
        assert!(err.contains("add_one"));
        let ok: AddOneArgs = parse_args("add_one", serde_json::json!({"n": 42})).unwrap();
        assert_eq!(ok.n, 42);
    }
}
