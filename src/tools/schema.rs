//! 工具调用 JSON Schema 生成（schemars）
//!
//! 将 TOOL_CALL 行的合法 JSON 结构写进 system prompt，减少 LLM 输出格式错误。

use std::collections::BTreeMap;

use schemars::{schema_for, JsonSchema};

/// TOOL_CALL: 之后的 JSON 结构（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 工具名，如 get_weather、search_accommodations
    pub tool: String,
    /// 工具参数，值均为字符串（location、check_in、check_out、travelers）
    pub parameters: BTreeMap<String, String>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_names_both_fields() {
        let schema = tool_call_schema_json();
        assert!(schema.contains("\"tool\""));
        assert!(schema.contains("\"parameters\""));
    }
}
