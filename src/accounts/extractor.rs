//! Account extraction: parsed document → ordered canonical accounts.
//!
//! Candidate elements are discovered in document order and resolved by an
//! ordered rule list (structured object, URL with port, URL without port).
//! A malformed element yields an [`ExtractionError`] and never aborts the
//! rest of the document.

use serde_json::{Map, Value};

use super::descriptor::{
    decode_legacy_shadowsocks, decode_vmess, object_endpoint, object_path, object_protocol,
    object_tag, object_transport, parse_port, parse_url, Descriptor, ParsedUrl,
};
use super::Account;

/// Keys whose list values hold account descriptors.
const ACCOUNT_LIST_KEYS: &[&str] = &[
    "accounts", "outbounds", "proxies", "servers", "nodes", "configs", "vpn", "items",
];

/// Outbound types that only route traffic and have no endpoint to test.
const ROUTING_TYPES: &[&str] = &[
    "selector", "urltest", "direct", "block", "dns", "freedom", "blackhole",
];

/// Port assumed for `scheme://host` descriptors without an explicit port.
pub const DEFAULT_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("element {index}: unrecognized descriptor shape ({reason})")]
    UnrecognizedShape { index: usize, reason: String },

    #[error("element {index}: invalid endpoint {host}:{port}")]
    InvalidEndpoint {
        index: usize,
        host: String,
        port: String,
    },
}

impl ExtractionError {
    /// Position of the offending element among the document's candidates.
    pub fn index(&self) -> usize {
        match self {
            Self::UnrecognizedShape { index, .. } | Self::InvalidEndpoint { index, .. } => *index,
        }
    }
}

/// Accounts and per-element errors from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub accounts: Vec<Account>,
    pub errors: Vec<ExtractionError>,
}

/// Extract accounts from a parsed document.
///
/// Pure and deterministic: the same document always yields the same
/// accounts in the same (document) order.
pub fn extract(document: &Value) -> Extraction {
    let mut candidates = Vec::new();
    collect_candidates(document, &mut candidates);

    let mut extraction = Extraction::default();
    for (index, descriptor) in candidates.into_iter().enumerate() {
        let ordinal = extraction.accounts.len() + 1;
        match resolve(index, descriptor, ordinal) {
            Ok(Some(account)) => extraction.accounts.push(account),
            Ok(None) => {}
            Err(err) => extraction.errors.push(err),
        }
    }
    extraction
}

fn is_account_list_key(key: &str) -> bool {
    ACCOUNT_LIST_KEYS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(key))
}

fn collect_candidates<'a>(value: &'a Value, out: &mut Vec<Descriptor<'a>>) {
    match value {
        Value::Array(items) => out.extend(items.iter().map(Descriptor::classify)),
        Value::String(text) => out.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(Descriptor::from_line),
        ),
        Value::Object(map) => {
            if object_endpoint(map).is_some() {
                out.push(Descriptor::Object(map));
                return;
            }
            let mut found_list = false;
            for (key, child) in map {
                if let Value::Array(items) = child {
                    if is_account_list_key(key) {
                        found_list = true;
                        out.extend(items.iter().map(Descriptor::classify));
                    }
                }
            }
            if !found_list {
                for child in map.values().filter(|child| child.is_object()) {
                    collect_candidates(child, out);
                }
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn placeholder_tag(ordinal: usize) -> String {
    format!("Account-{ordinal}")
}

fn resolve(
    index: usize,
    descriptor: Descriptor<'_>,
    ordinal: usize,
) -> Result<Option<Account>, ExtractionError> {
    match descriptor {
        Descriptor::Object(map) => {
            let is_routing = object_protocol(map)
                .map(str::to_ascii_lowercase)
                .is_some_and(|kind| ROUTING_TYPES.contains(&kind.as_str()));
            if is_routing {
                return Ok(None);
            }
            resolve_object(index, map, None, Value::Object(map.clone()), ordinal).map(Some)
        }
        Descriptor::Url(text) => resolve_url(index, text, ordinal).map(Some),
        Descriptor::Unrecognized { kind } => Err(ExtractionError::UnrecognizedShape {
            index,
            reason: kind.to_string(),
        }),
    }
}

fn resolve_object(
    index: usize,
    map: &Map<String, Value>,
    protocol_hint: Option<&str>,
    raw: Value,
    ordinal: usize,
) -> Result<Account, ExtractionError> {
    let Some((host, port_value)) = object_endpoint(map) else {
        return Err(ExtractionError::UnrecognizedShape {
            index,
            reason: "object without server/port fields".into(),
        });
    };
    let port = parse_port(port_value).map_err(|port| ExtractionError::InvalidEndpoint {
        index,
        host: host.to_string(),
        port,
    })?;
    let protocol = protocol_hint
        .or_else(|| object_protocol(map))
        .map_or_else(|| "unknown".to_string(), str::to_ascii_lowercase);

    Ok(Account {
        tag: object_tag(map).map_or_else(|| placeholder_tag(ordinal), ToString::to_string),
        protocol,
        host: host.to_string(),
        port,
        transport: object_transport(map),
        path: object_path(map),
        raw,
    })
}

fn resolve_url(index: usize, text: &str, ordinal: usize) -> Result<Account, ExtractionError> {
    let raw = Value::String(text.to_string());
    let Some(parsed) = parse_url(text) else {
        return Err(ExtractionError::UnrecognizedShape {
            index,
            reason: "no scheme://host pattern".into(),
        });
    };

    match parsed.scheme.as_str() {
        "vmess" if !parsed.body.contains('@') => match decode_vmess(&parsed.body) {
            Some(map) => resolve_object(index, &map, Some("vmess"), raw, ordinal),
            None => Err(ExtractionError::UnrecognizedShape {
                index,
                reason: "undecodable vmess payload".into(),
            }),
        },
        "ss" => match decode_legacy_shadowsocks(&parsed.body).and_then(|url| parse_url(&url)) {
            Some(expanded) => account_from_url(index, &expanded, raw, ordinal),
            None => account_from_url(index, &parsed, raw, ordinal),
        },
        _ => account_from_url(index, &parsed, raw, ordinal),
    }
}

fn account_from_url(
    index: usize,
    parsed: &ParsedUrl,
    raw: Value,
    ordinal: usize,
) -> Result<Account, ExtractionError> {
    let port = match &parsed.port {
        // Anything after the colon must be a port; no default for a malformed one.
        Some(text) => Some(text.as_str())
            .filter(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|t| t.parse::<u16>().ok())
            .filter(|port| *port != 0)
            .ok_or_else(|| ExtractionError::InvalidEndpoint {
                index,
                host: parsed.host.clone(),
                port: text.clone(),
            })?,
        None => DEFAULT_PORT,
    };

    Ok(Account {
        tag: parsed
            .fragment
            .clone()
            .unwrap_or_else(|| placeholder_tag(ordinal)),
        protocol: parsed.scheme.clone(),
        host: parsed.host.clone(),
        port,
        transport: parsed
            .query_param("type")
            .or_else(|| parsed.query_param("net"))
            .map(str::to_ascii_lowercase),
        path: parsed.query_param("path").map(ToString::to_string),
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;

    #[test]
    fn object_with_server_and_port() {
        let doc = json!({"accounts": [{"tag": "a1", "server": "10.0.0.1", "port": 443}]});
        let extraction = extract(&doc);
        assert!(extraction.errors.is_empty());
        assert_eq!(extraction.accounts.len(), 1);
        let account = &extraction.accounts[0];
        assert_eq!(account.tag, "a1");
        assert_eq!(account.host, "10.0.0.1");
        assert_eq!(account.port, 443);
        assert_eq!(account.raw, json!({"tag": "a1", "server": "10.0.0.1", "port": 443}));
    }

    #[test]
    fn url_list_with_explicit_port() {
        let doc = json!(["vless://user@example.com:8443?x=y"]);
        let extraction = extract(&doc);
        assert_eq!(extraction.accounts.len(), 1);
        let account = &extraction.accounts[0];
        assert_eq!(account.host, "example.com");
        assert_eq!(account.port, 8443);
        assert_eq!(account.protocol, "vless");
        assert_eq!(account.raw, json!("vless://user@example.com:8443?x=y"));
    }

    #[test]
    fn url_without_port_defaults_to_443() {
        let extraction = extract(&json!(["trojan://pw@t.example.com#edge"]));
        assert_eq!(extraction.accounts[0].port, DEFAULT_PORT);
        assert_eq!(extraction.accounts[0].tag, "edge");
    }

    #[test]
    fn unmatched_descriptor_is_reported_and_excluded() {
        let doc = json!([
            "vless://u@a.example.com:443",
            "not a descriptor",
            {"name": "no endpoint"},
            7,
            "trojan://p@b.example.com:443"
        ]);
        let extraction = extract(&doc);
        let hosts: Vec<&str> = extraction.accounts.iter().map(|a| a.host.as_str()).collect();
        assert_eq!(hosts, vec!["a.example.com", "b.example.com"]);
        let indices: Vec<usize> = extraction.errors.iter().map(ExtractionError::index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(matches!(
            extraction.errors[0],
            ExtractionError::UnrecognizedShape { .. }
        ));
    }

    #[test]
    fn invalid_port_is_an_endpoint_error() {
        let doc = json!([
            {"server": "a.example.com", "port": 0},
            "vless://u@b.example.com:99999",
            "vless://u@c.example.com:abc",
            "trojan://pw@d.example.com:443abc?type=ws#x"
        ]);
        let extraction = extract(&doc);
        assert!(extraction.accounts.is_empty());
        assert_eq!(
            extraction.errors,
            vec![
                ExtractionError::InvalidEndpoint {
                    index: 0,
                    host: "a.example.com".into(),
                    port: "0".into()
                },
                ExtractionError::InvalidEndpoint {
                    index: 1,
                    host: "b.example.com".into(),
                    port: "99999".into()
                },
                ExtractionError::InvalidEndpoint {
                    index: 2,
                    host: "c.example.com".into(),
                    port: "abc".into()
                },
                ExtractionError::InvalidEndpoint {
                    index: 3,
                    host: "d.example.com".into(),
                    port: "443abc".into()
                },
            ]
        );
    }

    #[test]
    fn singbox_template_skips_routing_outbounds() {
        let doc = json!({
            "log": {"level": "info"},
            "outbounds": [
                {"type": "selector", "tag": "proxy", "outbounds": ["v1"]},
                {"type": "vless", "tag": "v1", "server": "v.example.com", "server_port": 443,
                 "transport": {"type": "ws", "path": "/vless"}},
                {"type": "direct", "tag": "direct"},
                {"type": "trojan", "tag": "t1", "server": "t.example.com", "server_port": "8443"}
            ]
        });
        let extraction = extract(&doc);
        assert!(extraction.errors.is_empty());
        let tags: Vec<&str> = extraction.accounts.iter().map(|a| a.tag.as_str()).collect();
        assert_eq!(tags, vec!["v1", "t1"]);
        assert_eq!(extraction.accounts[0].transport.as_deref(), Some("ws"));
        assert_eq!(extraction.accounts[0].path.as_deref(), Some("/vless"));
        assert_eq!(extraction.accounts[1].port, 8443);
    }

    #[test]
    fn nested_lists_are_found_under_unknown_keys() {
        let doc = json!({"data": {"proxies": [{"name": "c1", "type": "ss", "server": "s.example.com", "port": 8388}]}});
        let extraction = extract(&doc);
        assert_eq!(extraction.accounts.len(), 1);
        assert_eq!(extraction.accounts[0].protocol, "ss");
    }

    #[test]
    fn missing_tags_get_positional_placeholders() {
        let doc = json!([
            "vless://u@a.example.com:443",
            "garbage",
            {"server": "b.example.com", "port": 443}
        ]);
        let extraction = extract(&doc);
        let tags: Vec<&str> = extraction.accounts.iter().map(|a| a.tag.as_str()).collect();
        assert_eq!(tags, vec!["Account-1", "Account-2"]);
        assert_eq!(extraction.accounts[1].protocol, "unknown");
    }

    #[test]
    fn vmess_base64_link_is_decoded() {
        let payload = STANDARD.encode(
            r#"{"v":"2","ps":"vm-sg","add":"v.example.com","port":"2096","type":"none","net":"ws","host":"cdn.example.com"}"#,
        );
        let extraction = extract(&json!([format!("vmess://{payload}")]));
        assert!(extraction.errors.is_empty());
        let account = &extraction.accounts[0];
        assert_eq!(account.protocol, "vmess");
        assert_eq!(account.tag, "vm-sg");
        assert_eq!(account.host, "v.example.com");
        assert_eq!(account.port, 2096);
        assert_eq!(account.transport.as_deref(), Some("ws"));
    }

    #[test]
    fn undecodable_vmess_is_rejected() {
        let extraction = extract(&json!(["vmess://%%%not-base64%%%"]));
        assert!(extraction.accounts.is_empty());
        assert_eq!(extraction.errors.len(), 1);
    }

    #[test]
    fn legacy_shadowsocks_link_is_decoded() {
        let payload = STANDARD.encode("chacha20-ietf-poly1305:pw@ss.example.com:8388");
        let extraction = extract(&json!([format!("ss://{payload}#old-ss")]));
        let account = &extraction.accounts[0];
        assert_eq!(account.host, "ss.example.com");
        assert_eq!(account.port, 8388);
        assert_eq!(account.tag, "old-ss");
    }

    #[test]
    fn plain_text_document_is_split_into_lines() {
        let doc = Value::String(
            "# subscription\nvless://u@a.example.com:443\n\n  trojan://p@b.example.com:8443  \n".into(),
        );
        let extraction = extract(&doc);
        assert_eq!(extraction.accounts.len(), 2);
        assert_eq!(extraction.accounts[1].port, 8443);
    }

    #[test]
    fn extraction_is_deterministic() {
        let doc = json!({
            "outbounds": [
                {"type": "vmess", "tag": "z", "server": "z.example.com", "server_port": 443},
                {"type": "vless", "tag": "a", "server": "a.example.com", "server_port": 443},
                "trojan://p@m.example.com:443#m",
                {"type": "bogus"}
            ]
        });
        assert_eq!(extract(&doc), extract(&doc));
        let tags: Vec<String> = extract(&doc).accounts.into_iter().map(|a| a.tag).collect();
        assert_eq!(tags, vec!["z", "a", "m"]);
    }

    #[test]
    fn scalar_document_has_no_candidates() {
        assert_eq!(extract(&json!(42)), Extraction::default());
    }
}
