//! Session handshake helpers.

/// Query parameter carrying the session identifier in the `endpoint` event.
pub const SESSION_ID_PARAM: &str = "sessionId";

/// Extracts the session token from `endpoint` event data.
///
/// The data is a path fragment such as `/message?sessionId=abc123`. The token
/// runs until the next `&`, whitespace or the end of the data.
///
/// ```
/// use tunnelmcp_http::extract_session_id;
///
/// assert_eq!(extract_session_id("/message?sessionId=abc&x=1"), Some("abc"));
/// assert_eq!(extract_session_id("/message"), None);
/// ```
pub fn extract_session_id(data: &str) -> Option<&str> {
    let key = format!("{SESSION_ID_PARAM}=");
    let start = data.find(&key)? + key.len();
    let rest = &data[start..];
    let end = rest
        .find(|c: char| c == '&' || c.is_whitespace())
        .unwrap_or(rest.len());
    let token = &rest[..end];
    (!token.is_empty()).then_some(token)
}

/// Path used to POST messages for `session_id`.
pub(crate) fn message_endpoint(message_path: &str, session_id: &str) -> String {
    let separator = if message_path.contains('?') { '&' } else { '?' };
    format!("{message_path}{separator}{SESSION_ID_PARAM}={session_id}")
}
