//! 响应体JSON辅助函数
//!
//! 服务的响应结构不固定，这里只做防御性的字段查找，字段缺失时返回 `None`。

use crate::error::Result;
use serde_json::{Map, Value};

const TASK_ID_KEYS: [&str; 4] = ["id", "task_id", "tid", "uuid"];

/// 将响应体解析为JSON对象
pub fn parse_object(body: &[u8]) -> Result<Map<String, Value>> {
    let map: Map<String, Value> = serde_json::from_slice(body)?;
    Ok(map)
}

/// 读取 `message` 字段
pub fn message(value: &Value) -> Option<&str> {
    value.get("message").and_then(Value::as_str)
}

/// 读取 `status_code` 字段，兼容数字和数字字符串
pub fn status_code(value: &Value) -> Option<u16> {
    match value.get("status_code")? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// 读取 `id` 字段：优先非空字符串，其次任意非空标量
pub fn extract_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
        other => Some(other.to_string()),
    }
}

/// 从创建任务的响应中提取任务ID
///
/// 依次尝试顶层 `task_id`、`task.{id,task_id,tid,uuid}`、`task.task.{…}`。
pub fn extract_task_id(value: &Value) -> Option<String> {
    if let Some(id) = non_blank_str(value, "task_id") {
        return Some(id);
    }
    let task = value.get("task")?;
    first_non_blank(task, &TASK_ID_KEYS)
        .or_else(|| task.get("task").and_then(|inner| first_non_blank(inner, &TASK_ID_KEYS)))
}

fn first_non_blank(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_blank_str(value, key))
}

fn non_blank_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
