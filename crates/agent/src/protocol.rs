//! Line-delimited JSON protocol between the host and the agent.
//!
//! The host writes one event per line on stdin:
//!
//! ```text
//! {"event":"install"}
//! {"event":"activate"}
//! {"event":"fetch","url":"/dashboard","mode":"navigate"}
//! {"event":"status"}
//! ```
//!
//! and reads exactly one reply per event on stdout, tagged by `reply`.
//! Fetch URLs may be relative; they resolve against the application origin.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use docscan_core::{Headers, Method, RequestMode, Response, ResponseType};

use crate::agent::{ActivateReport, FetchDecision, InstallReport, ServedFrom};
use crate::error::ErrorReply;
use crate::lifecycle::RegistrationState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum HostEvent {
    Install,
    Activate,
    Fetch(FetchParams),
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchParams {
    pub url: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub mode: RequestMode,
    #[serde(default)]
    pub headers: Headers,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reply", rename_all = "lowercase")]
pub enum HostReply {
    Installed {
        install: InstallReport,
        /// Present when the install skipped waiting and activated at once.
        #[serde(skip_serializing_if = "Option::is_none")]
        activate: Option<ActivateReport>,
    },
    Activated(ActivateReport),
    Fetch(FetchReply),
    Status(StatusReply),
    Error(ErrorReply),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum FetchReply {
    Bypass,
    Respond { source: ServedFrom, response: ResponseBody },
}

impl From<FetchDecision> for FetchReply {
    fn from(decision: FetchDecision) -> Self {
        match decision {
            FetchDecision::Bypass => FetchReply::Bypass,
            FetchDecision::Respond(served) => {
                FetchReply::Respond { source: served.source, response: ResponseBody::from(served.response) }
            }
        }
    }
}

/// How `ResponseBody::body` carries the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    Utf8,
    Base64,
}

/// A response as written on the wire. Bodies that are valid UTF-8 are sent
/// as text; anything else is base64 (standard alphabet, padded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseBody {
    pub status: u16,
    pub status_text: String,
    #[serde(rename = "type")]
    pub kind: ResponseType,
    pub headers: Headers,
    pub body_encoding: BodyEncoding,
    pub body: String,
}

impl From<Response> for ResponseBody {
    fn from(response: Response) -> Self {
        let (body_encoding, body) = match std::str::from_utf8(&response.body) {
            Ok(text) => (BodyEncoding::Utf8, text.to_string()),
            Err(_) => (BodyEncoding::Base64, BASE64.encode(&response.body)),
        };
        Self {
            status: response.status,
            status_text: response.status_text,
            kind: response.kind,
            headers: response.headers,
            body_encoding,
            body,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReply {
    pub generation: String,
    pub state: RegistrationState,
    pub generations: Vec<String>,
}
