//! 工具参数 JSON Schema 生成（schemars）
//!
//! 每个工具的参数结构 derive JsonSchema，声明给模型的 schema 与反序列化用的是同一个类型。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 返回 T 的 JSON Schema；生成失败时退回空对象 schema
pub fn schema_value<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    serde_json::to_value(&schema).unwrap_or_else(|_| {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Args {
        /// 文件名
        filename: String,
        note: Option<String>,
    }

    #[test]
    fn test_required_fields() {
        let schema = schema_value::<Args>();
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "filename"));
        assert!(!required.iter().any(|v| v == "note"));
    }
}
