//! Status line validation.
//!
//! Only a fixed 13-byte prefix of the response is interpreted:
//!
//! ```text
//!  0        9  12
//!  HTTP/1.1 200_
//!  ^^^^^^^^^      version, case-insensitive, HTTP/1.0 or HTTP/1.1
//!           ^^^   status code
//!              ^  separator, must be a space
//! ```
//!
//! Header bodies are never inspected here; the terminator scanner skips them.

use super::STATUS_PREFIX_LEN;
use crate::error::ProtocolError;

const ACCEPTED_VERSIONS: [&[u8]; 2] = [b"HTTP/1.1 ", b"HTTP/1.0 "];
const CODE_RANGE: std::ops::Range<usize> = 9..12;
const SEPARATOR_INDEX: usize = 12;

/// Check that `bytes` starts with an HTTP/1.x `200` status line prefix.
///
/// Anything shorter than [`STATUS_PREFIX_LEN`] is malformed. A well-formed
/// line with another code yields [`ProtocolError::Status`].
pub fn validate_status_line(bytes: &[u8]) -> Result<(), ProtocolError> {
    let Some(prefix) = bytes.get(..STATUS_PREFIX_LEN) else {
        return Err(malformed(bytes));
    };

    let version_ok = ACCEPTED_VERSIONS
        .iter()
        .any(|v| prefix[..v.len()].eq_ignore_ascii_case(v));
    if !version_ok || prefix[SEPARATOR_INDEX] != b' ' {
        return Err(malformed(prefix));
    }

    let code = &prefix[CODE_RANGE];
    if code == b"200" {
        return Ok(());
    }

    match parse_code(code) {
        Some(status) => Err(ProtocolError::Status(status)),
        None => Err(malformed(prefix)),
    }
}

fn parse_code(digits: &[u8]) -> Option<u16> {
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn malformed(bytes: &[u8]) -> ProtocolError {
    ProtocolError::MalformedStatusLine(bytes.escape_ascii().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http11_and_http10() {
        assert!(validate_status_line(b"HTTP/1.1 200 ").is_ok());
        assert!(validate_status_line(b"HTTP/1.0 200 ").is_ok());
        assert!(validate_status_line(b"HTTP/1.1 200 Connection established").is_ok());
    }

    #[test]
    fn test_version_is_case_insensitive() {
        assert!(validate_status_line(b"http/1.1 200 ").is_ok());
        assert!(validate_status_line(b"Http/1.0 200 ").is_ok());
    }

    #[test]
    fn test_rejects_other_status_with_code() {
        assert_eq!(
            validate_status_line(b"HTTP/1.1 404 "),
            Err(ProtocolError::Status(404))
        );
        assert_eq!(
            validate_status_line(b"HTTP/1.1 407 Proxy Authentication Required"),
            Err(ProtocolError::Status(407))
        );
        assert_eq!(
            validate_status_line(b"HTTP/1.0 502 "),
            Err(ProtocolError::Status(502))
        );
    }

    #[test]
    fn test_rejects_missing_separator() {
        assert!(matches!(
            validate_status_line(b"http/1.1 200"),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
        assert!(matches!(
            validate_status_line(b"HTTP/1.1 2000"),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
        assert!(matches!(
            validate_status_line(b"HTTP/1.1 200\r\n"),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
    }

    #[test]
    fn test_rejects_other_versions() {
        assert!(matches!(
            validate_status_line(b"HTTP/2.0 200 "),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
        assert!(matches!(
            validate_status_line(b"SSH-2.0-OpenSSH_9.6"),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
    }

    #[test]
    fn test_rejects_non_digit_code() {
        assert!(matches!(
            validate_status_line(b"HTTP/1.1 2x0 "),
            Err(ProtocolError::MalformedStatusLine(_))
        ));
    }

    #[test]
    fn test_malformed_detail_is_escaped() {
        let err = validate_status_line(b"HTTP/1.1\r\n\r\n\0\0\0").unwrap_err();
        match err {
            ProtocolError::MalformedStatusLine(detail) => {
                assert!(detail.contains("\\r\\n"));
                assert!(!detail.contains('\r'));
            }
            ProtocolError::Status(_) => panic!("Expected malformed status line"),
        }
    }
}
