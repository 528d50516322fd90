//! Request / response objects exchanged over the TCP stream.

use serde::{Deserialize, Serialize};

/// One client request, e.g. `{"actionName":"login","param":"medion"}`.
///
/// Missing fields decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Request {
    pub action_name: String,
    pub param: String,
}

impl Request {
    pub fn new(action_name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            param: param.into(),
        }
    }

    /// Decode one request line (the trailing newline may be included).
    pub fn from_line(line: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(line)
    }
}

/// One server response, e.g. `{"ok":true,"body":""}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub body: String,
}

impl Response {
    /// Encode as a newline-terminated JSON line.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}
