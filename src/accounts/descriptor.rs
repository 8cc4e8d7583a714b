//! Tagged union over the descriptor shapes found in account documents.
//!
//! Accounts arrive either as structured objects (sing-box outbounds, Xray
//! outbounds, Clash proxies, decoded vmess payloads) or as bare connection
//! URLs. Field lookups here are shape-level only; validation and the ordered
//! resolution rules live in [`super::extractor`].

use base64::{engine::general_purpose, Engine as _};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Host-like keys, most specific first. vmess payloads use `add` for the
/// address and `host` for the HTTP Host header, so `host` comes last.
const HOST_KEYS: &[&str] = &["server", "address", "add", "host"];

const PORT_KEYS: &[&str] = &["server_port", "port"];

const TAG_KEYS: &[&str] = &["tag", "name", "ps", "remarks"];

const PROTOCOL_KEYS: &[&str] = &["type", "protocol"];

const TRANSPORT_PATHS: &[&[&str]] = &[
    &["transport", "type"],
    &["streamSettings", "network"],
    &["network"],
    &["net"],
];

const PATH_PATHS: &[&[&str]] = &[
    &["transport", "path"],
    &["ws-opts", "path"],
    &["streamSettings", "wsSettings", "path"],
    &["wsSettings", "path"],
    &["path"],
];

/// One candidate element of an account document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Descriptor<'a> {
    /// A structured object that may carry server/port fields.
    Object(&'a Map<String, Value>),
    /// A string containing a `scheme://` connection URL.
    Url(&'a str),
    /// Anything else; `kind` names the shape for error reporting.
    Unrecognized { kind: &'static str },
}

impl<'a> Descriptor<'a> {
    /// Classify a JSON element.
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            Value::String(text) => Self::from_line(text),
            Value::Array(_) => Self::Unrecognized { kind: "nested array" },
            Value::Number(_) => Self::Unrecognized { kind: "number" },
            Value::Bool(_) => Self::Unrecognized { kind: "boolean" },
            Value::Null => Self::Unrecognized { kind: "null" },
        }
    }

    /// Classify one line of a plain-text document or one string element.
    pub fn from_line(text: &'a str) -> Self {
        let trimmed = text.trim();
        if trimmed.contains("://") {
            Self::Url(trimmed)
        } else {
            Self::Unrecognized {
                kind: "string without scheme",
            }
        }
    }
}

// ── Object field lookups ─────────────────────────────────────────────

fn non_empty(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn nested_str<'m>(map: &'m Map<String, Value>, path: &[&str]) -> Option<&'m str> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(*first)?;
    for key in rest {
        current = current.get(*key)?;
    }
    non_empty(current)
}

pub(crate) fn first_str<'m>(map: &'m Map<String, Value>, keys: &[&str]) -> Option<&'m str> {
    keys.iter().find_map(|key| map.get(*key).and_then(non_empty))
}

fn direct_endpoint(map: &Map<String, Value>) -> Option<(&str, &Value)> {
    let host = first_str(map, HOST_KEYS)?;
    let port = PORT_KEYS.iter().find_map(|key| map.get(*key))?;
    Some((host, port))
}

/// Host and raw port value of an object descriptor, if both are present.
///
/// Falls back to Xray's `settings.vnext[0]` / `settings.servers[0]` layout.
pub(crate) fn object_endpoint(map: &Map<String, Value>) -> Option<(&str, &Value)> {
    direct_endpoint(map).or_else(|| {
        let settings = map.get("settings")?.as_object()?;
        ["vnext", "servers"].iter().find_map(|key| {
            settings
                .get(*key)?
                .as_array()?
                .first()?
                .as_object()
                .and_then(direct_endpoint)
        })
    })
}

pub(crate) fn object_tag(map: &Map<String, Value>) -> Option<&str> {
    first_str(map, TAG_KEYS)
}

pub(crate) fn object_protocol(map: &Map<String, Value>) -> Option<&str> {
    first_str(map, PROTOCOL_KEYS)
}

pub(crate) fn object_transport(map: &Map<String, Value>) -> Option<String> {
    TRANSPORT_PATHS
        .iter()
        .find_map(|path| nested_str(map, path))
        .map(str::to_ascii_lowercase)
}

pub(crate) fn object_path(map: &Map<String, Value>) -> Option<String> {
    PATH_PATHS
        .iter()
        .find_map(|path| nested_str(map, path))
        .map(ToString::to_string)
}

/// Parse a port that may be a JSON number or a numeric string.
///
/// Returns the textual form on failure so callers can report it.
pub(crate) fn parse_port(value: &Value) -> Result<u16, String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    text.parse::<u16>().ok().filter(|port| *port != 0).ok_or(text)
}

// ── URL descriptors ──────────────────────────────────────────────────

fn url_regex() -> &'static Regex {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE.get_or_init(|| {
        Regex::new(
            r"([A-Za-z][A-Za-z0-9+.\-]*)://(?:([^@/?#\s]*)@)?(\[[0-9A-Fa-f:.]+\]|[^:/?#@\s\[\]]+)(?::([^/?#\s]*))?",
        )
        .expect("url regex")
    })
}

/// A connection URL split into the parts extraction cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedUrl {
    pub scheme: String,
    pub host: String,
    pub port: Option<String>,
    pub query: Vec<(String, String)>,
    pub fragment: Option<String>,
    /// Everything after `scheme://`, used by scheme-specific decoders.
    pub body: String,
}

impl ParsedUrl {
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

fn percent_decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| text.to_string())
}

/// Locate a `scheme://host[:port]` pattern inside `text`.
pub(crate) fn parse_url(text: &str) -> Option<ParsedUrl> {
    let caps = url_regex().captures(text)?;
    let whole = caps.get(0)?;
    let scheme = caps.get(1)?.as_str().to_ascii_lowercase();
    let host = caps
        .get(3)?
        .as_str()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = caps.get(4).map(|m| m.as_str().to_string());

    let body_start = caps.get(1)?.end() + "://".len();
    let body = text[body_start..].to_string();

    let tail = &text[whole.end()..];
    let (before_fragment, fragment) = match tail.split_once('#') {
        Some((head, frag)) => (head, Some(percent_decode(frag.trim())).filter(|f| !f.is_empty())),
        None => (tail, None),
    };
    let query = before_fragment
        .split_once('?')
        .map(|(_, q)| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (percent_decode(k), percent_decode(v)),
                    None => (percent_decode(pair), String::new()),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ParsedUrl {
        scheme,
        host,
        port,
        query,
        fragment,
        body,
    })
}

/// Decode base64 in any of the common alphabets, padded or not.
pub(crate) fn decode_base64_lenient(input: &str) -> Option<Vec<u8>> {
    use general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(&cleaned).ok())
}

/// Decode a `vmess://<base64 JSON>` body into its JSON object.
pub(crate) fn decode_vmess(body: &str) -> Option<Map<String, Value>> {
    let payload = body.split(['#', '?']).next()?;
    let bytes = decode_base64_lenient(payload)?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Decode a legacy `ss://<base64(method:password@host:port)>#tag` body into
/// the equivalent plain URL.
pub(crate) fn decode_legacy_shadowsocks(body: &str) -> Option<String> {
    let (payload, fragment) = match body.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (body, None),
    };
    if payload.contains('@') {
        return None;
    }
    let decoded = String::from_utf8(decode_base64_lenient(payload)?).ok()?;
    if !decoded.contains('@') {
        return None;
    }
    Some(match fragment {
        Some(frag) => format!("ss://{decoded}#{frag}"),
        None => format!("ss://{decoded}"),
    })
}
