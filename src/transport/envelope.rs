//! Response envelope normalization.
//!
//! The OA services do not agree on a success envelope: some send
//! `{success: true}`, some `{code: 200|0|2001}`, some `{status: 200}`, login
//! sometimes returns the token bare, and the external platform endpoints return
//! plain JSON arrays. Everything is folded into one [`Outcome`] here so the rest
//! of the crate never inspects raw bodies.

use reqwest::StatusCode;
use serde_json::Value;

/// Codes accepted as success when an envelope carries `code`
pub const SUCCESS_CODES: [i64; 3] = [0, 200, 2001];

/// Which success indicator a body carries. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{"success": bool, ...}`
    Flagged(bool),
    /// `{"code": n, ...}`
    Coded(i64),
    /// `{"status": n, ...}`
    Status(i64),
    /// No indicator but a token is present
    Token,
    /// No indicator at all: arrays, scalars, plain objects
    Bare,
}

impl Envelope {
    pub fn classify(body: &Value) -> Self {
        let Some(obj) = body.as_object() else {
            return Envelope::Bare;
        };

        if let Some(flag) = obj.get("success").and_then(Value::as_bool) {
            return Envelope::Flagged(flag);
        }
        if let Some(code) = obj.get("code").and_then(Value::as_i64) {
            return Envelope::Coded(code);
        }
        if let Some(status) = obj.get("status").and_then(Value::as_i64) {
            return Envelope::Status(status);
        }
        if find_token(body).is_some() {
            return Envelope::Token;
        }
        Envelope::Bare
    }

    /// Verdict of the body alone, `None` when the body has no opinion
    fn verdict(&self) -> Option<bool> {
        match *self {
            Envelope::Flagged(flag) => Some(flag),
            Envelope::Coded(code) => Some(SUCCESS_CODES.contains(&code)),
            Envelope::Status(status) => Some(status == 200),
            Envelope::Token => Some(true),
            Envelope::Bare => None,
        }
    }

    fn has_indicator(&self) -> bool {
        matches!(
            self,
            Envelope::Flagged(_) | Envelope::Coded(_) | Envelope::Status(_)
        )
    }
}

/// Canonical view of any response
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: StatusCode,
    pub ok: bool,
    pub token: Option<String>,
    pub data: Value,
    pub message: Option<String>,
}

impl Outcome {
    /// Non-2xx always fails. On 2xx an explicit indicator decides, and a body
    /// without one counts as success.
    pub fn decode(status: StatusCode, body: Value) -> Self {
        let envelope = Envelope::classify(&body);
        let ok = status.is_success() && envelope.verdict().unwrap_or(true);

        let token = find_token(&body);
        let message = find_message(&body);

        let data = if envelope.has_indicator() {
            match body {
                Value::Object(mut obj) => match obj.remove("data") {
                    Some(data) if !data.is_null() => data,
                    _ => Value::Object(obj),
                },
                other => other,
            }
        } else {
            body
        };

        Self {
            status,
            ok,
            token,
            data,
            message,
        }
    }

    /// Server message or the given fallback
    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `token`/`accessToken` at the root or under `data`
pub fn find_token(body: &Value) -> Option<String> {
    let lookup = |v: &Value| non_empty_str(v.get("token")).or_else(|| non_empty_str(v.get("accessToken")));

    body.get("data")
        .and_then(|data| if data.is_object() { lookup(data) } else { None })
        .or_else(|| lookup(body))
}

/// `message` or `msg`
pub fn find_message(body: &Value) -> Option<String> {
    non_empty_str(body.get("message")).or_else(|| non_empty_str(body.get("msg")))
}
