//! get_time 工具：返回当前时间（可选固定时区偏移与 strftime 格式）

use std::fmt::Write;

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::tools::schema::{parse_args, schema_of};
use crate::tools::Tool;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct TimeArgs {
    /// 相对 UTC 的小时偏移，如 8 表示 UTC+8
    #[serde(default)]
    pub utc_offset_hours: Option<i32>,
    /// strftime 格式，缺省为 RFC 3339
    #[serde(default)]
    pub format: Option<String>,
}

pub struct TimeTool;

#[async_trait]
impl Tool for TimeTool {
    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time."
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<TimeArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: TimeArgs = parse_args(self.name(), args)?;
        let hours = args.utc_offset_hours.unwrap_or(0);
        let offset = hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| format!("utc_offset_hours out of range: {hours}"))?;
        let now = Utc::now().with_timezone(&offset);
        match args.format {
            Some(fmt) => {
                let mut out = String::new();
                write!(out, "{}", now.format(&fmt)).map_err(|_| format!("invalid time format: {fmt}"))?;
                Ok(out)
            }
            None => Ok(now.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_is_rfc3339() {
        let out = TimeTool.execute(Value::Null).await.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&out).is_ok());
    }

    #[tokio::test]
    async fn test_offset_and_format() {
        let out = TimeTool
            .execute(serde_json::json!({"utc_offset_hours": 8, "format": "%z"}))
            .await
            .unwrap();
        assert_eq!(out, "+0800");
    }

    #[tokio::test]
    async fn test_bad_offset_is_error() {
        assert!(TimeTool
            .execute(serde_json::json!({"utc_offset_hours": 99}))
            .await
            .is_err());
    }
}
