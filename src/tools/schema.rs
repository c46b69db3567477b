//! 工具参数 JSON Schema 生成（schemars 自动生成，转成函数调用可接受的形式）
//!
//! schemars 对 Option 字段生成 `"type": ["string", "null"]`，部分 OpenAI 兼容端点（Gemini）不接受
//! 类型数组，这里统一收敛为单一类型；顶层的 `$schema` / `title` 也一并去掉。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 参数结构体 T 的 JSON Schema（object）
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| empty_object_schema());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
    }
    collapse_nullable(&mut value);
    value
}

pub fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

fn collapse_nullable(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::Array(types)) = obj.get("type") {
                let non_null: Vec<Value> = types.iter().filter(|t| *t != "null").cloned().collect();
                if non_null.len() == 1 {
                    obj.insert("type".to_string(), non_null[0].clone());
                }
            }
            for v in obj.values_mut() {
                collapse_nullable(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(collapse_nullable),
        _ => {}
    }
}
