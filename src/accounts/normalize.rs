//! Post-extraction normalization.

use super::Account;

/// Transports that carry an HTTP request path.
const PATH_TRANSPORTS: &[&str] = &["ws", "websocket", "httpupgrade"];

/// Give every WebSocket-style account a request path, defaulting to `/`.
///
/// Idempotent: accounts that already have a path, or that use another
/// transport, pass through unchanged.
pub fn ensure_ws_path(accounts: Vec<Account>) -> Vec<Account> {
    accounts
        .into_iter()
        .map(|mut account| {
            let needs_path = account
                .transport
                .as_deref()
                .is_some_and(|transport| PATH_TRANSPORTS.contains(&transport));
            if needs_path && account.path.as_deref().map_or(true, str::is_empty) {
                account.path = Some("/".to_string());
            }
            account
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(transport: Option<&str>, path: Option<&str>) -> Account {
        Account {
            tag: "n".into(),
            protocol: "vless".into(),
            host: "a.example.com".into(),
            port: 443,
            transport: transport.map(Into::into),
            path: path.map(Into::into),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn ws_without_path_gets_root() {
        let out = ensure_ws_path(vec![account(Some("ws"), None), account(Some("httpupgrade"), Some(""))]);
        assert_eq!(out[0].path.as_deref(), Some("/"));
        assert_eq!(out[1].path.as_deref(), Some("/"));
    }

    #[test]
    fn existing_path_and_other_transports_untouched() {
        let input = vec![
            account(Some("ws"), Some("/custom")),
            account(Some("grpc"), None),
            account(None, None),
        ];
        assert_eq!(ensure_ws_path(input.clone()), input);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = ensure_ws_path(vec![account(Some("websocket"), None), account(Some("tcp"), None)]);
        assert_eq!(ensure_ws_path(once.clone()), once);
    }
}
