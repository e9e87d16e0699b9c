//! Response body classification.
//!
//! The center API wraps results as `{code|status, msg, data}`, while some
//! endpoints (and error pages) return a bare body. A body is classified once,
//! by looking at its top-level keys, and both shapes decode the same way.

use crate::api::error::extract_error_message;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Keys whose presence marks a body as an envelope.
const ENVELOPE_KEYS: [&str; 4] = ["code", "status", "msg", "data"];

/// The `{code|status, msg, data}` wrapper.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub code: i64,
    pub status: i64,
    pub msg: String,
    /// `None` when absent or literally `null`.
    pub data: Option<Value>,
}

/// A response body, resolved to exactly one shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Envelope(Envelope),
    Bare {
        /// Parsed JSON, if the body was JSON at all.
        value: Option<Value>,
        /// Raw body text.
        text: String,
    },
}

impl Payload {
    #[must_use]
    pub fn parse(body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).into_owned();
        if text.trim().is_empty() {
            return Self::Bare { value: None, text };
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) if ENVELOPE_KEYS.iter().any(|k| map.contains_key(*k)) => {
                Self::Envelope(Envelope::from_map(map))
            }
            Ok(value) => Self::Bare {
                value: Some(value),
                text,
            },
            Err(_) => Self::Bare { value: None, text },
        }
    }

    #[must_use]
    pub fn is_envelope(&self) -> bool {
        matches!(self, Self::Envelope(_))
    }

    /// Business code: `code`, falling back to `status` when `code` is zero.
    /// Bare bodies have no business code.
    #[must_use]
    pub fn business_code(&self) -> i64 {
        match self {
            Self::Envelope(env) if env.code != 0 => env.code,
            Self::Envelope(env) => env.status,
            Self::Bare { .. } => 0,
        }
    }

    /// Best-effort human message for error reporting.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Envelope(env) => env.msg.clone(),
            Self::Bare {
                value: Some(value),
                text,
            } => extract_error_message(value).unwrap_or_else(|| text.trim().to_string()),
            Self::Bare { value: None, text } => text.trim().to_string(),
        }
    }

    /// Decode the result payload. `Ok(None)` means the response carried no data.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Option<T>, serde_json::Error> {
        match self {
            Self::Envelope(env) => env.data.map(serde_json::from_value).transpose(),
            Self::Bare {
                value: Some(value), ..
            } => serde_json::from_value(value).map(Some),
            Self::Bare { value: None, text } if text.trim().is_empty() => Ok(None),
            // Not JSON: let serde describe why.
            Self::Bare { value: None, text } => serde_json::from_str(&text).map(Some),
        }
    }
}

impl Envelope {
    fn from_map(mut map: Map<String, Value>) -> Self {
        let data = match map.remove("data") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        };
        Self {
            code: map.get("code").map_or(0, as_code),
            status: map.get("status").map_or(0, as_code),
            msg: map
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            data,
        }
    }
}

/// Codes are numbers, occasionally sent as numeric strings.
fn as_code(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Version {
        version: String,
    }

    #[test]
    fn test_envelope_detected_by_any_key() {
        for body in [
            r#"{"code":200}"#,
            r#"{"status":200}"#,
            r#"{"msg":"ok"}"#,
            r#"{"data":{"version":"1"}}"#,
        ] {
            assert!(Payload::parse(body.as_bytes()).is_envelope(), "{body}");
        }
        assert!(!Payload::parse(br#"{"version":"1"}"#).is_envelope());
        assert!(!Payload::parse(br#"[1,2,3]"#).is_envelope());
    }

    #[test]
    fn test_envelope_decodes_data() {
        let payload = Payload::parse(br#"{"code":200,"msg":"ok","data":{"version":"0.3.1"}}"#);
        let decoded: Option<Version> = payload.decode().unwrap();
        assert_eq!(
            decoded,
            Some(Version {
                version: "0.3.1".into()
            })
        );
    }

    #[test]
    fn test_bare_body_decodes_whole() {
        let payload = Payload::parse(br#"{"version":"0.3.1"}"#);
        let decoded: Option<Version> = payload.decode().unwrap();
        assert_eq!(decoded.unwrap().version, "0.3.1");
    }

    #[test]
    fn test_null_or_missing_data_is_no_data() {
        let payload = Payload::parse(br#"{"code":200,"data":null}"#);
        assert_eq!(payload.decode::<Version>().unwrap(), None);

        let payload = Payload::parse(br#"{"code":200,"msg":"ok"}"#);
        assert_eq!(payload.decode::<Version>().unwrap(), None);

        let payload = Payload::parse(b"   ");
        assert_eq!(payload.decode::<Version>().unwrap(), None);
    }

    #[test]
    fn test_business_code_falls_back_to_status() {
        assert_eq!(Payload::parse(br#"{"code":0,"status":403}"#).business_code(), 403);
        assert_eq!(Payload::parse(br#"{"code":500,"status":200}"#).business_code(), 500);
        assert_eq!(Payload::parse(br#"{"code":"401"}"#).business_code(), 401);
        assert_eq!(Payload::parse(br#"{"version":"1"}"#).business_code(), 0);
    }

    #[test]
    fn test_bare_message_extraction() {
        assert_eq!(
            Payload::parse(br#"{"message":"rate limited"}"#).message(),
            "rate limited"
        );
        assert_eq!(
            Payload::parse(br#"{"error":"boom"}"#).message(),
            "boom"
        );
        assert_eq!(
            Payload::parse(b"<html>502 Bad Gateway</html>\n").message(),
            "<html>502 Bad Gateway</html>"
        );
    }

    #[test]
    fn test_non_json_body_fails_to_decode() {
        let payload = Payload::parse(b"not json");
        assert!(payload.decode::<Version>().is_err());
    }
}
