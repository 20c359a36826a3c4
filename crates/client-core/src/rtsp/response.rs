//! Control response parsing

use crate::error::{ClientError, ClientResult};

use super::RTSP_VERSION;

/// Status code of a successful response
pub const STATUS_OK: u16 = 200;

/// A parsed control response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspResponse {
    pub status_code: u16,
    pub reason_phrase: String,

    /// Header lines in arrival order, names as sent
    pub headers: Vec<(String, String)>,
}

impl RtspResponse {
    /// Parse a complete response message
    ///
    /// Reads the status line and the header block up to the first blank
    /// line. Anything after the blank line is ignored.
    pub fn parse(data: &[u8]) -> ClientResult<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| ClientError::malformed_response(format!("not valid UTF-8: {}", e)))?;

        let mut lines = text.lines();
        let status_line = lines
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or_else(|| ClientError::malformed_response("empty response"))?;

        let mut parts = status_line.splitn(3, ' ');
        let (version, code, reason) = match (parts.next(), parts.next(), parts.next()) {
            (Some(version), Some(code), Some(reason)) => (version, code, reason),
            _ => {
                return Err(ClientError::malformed_response(format!(
                    "bad status line '{}'",
                    status_line
                )))
            }
        };

        if version != RTSP_VERSION {
            return Err(ClientError::malformed_response(format!(
                "expected {}, got '{}'",
                RTSP_VERSION, version
            )));
        }

        let status_code = code
            .parse::<u16>()
            .map_err(|_| ClientError::malformed_response(format!("bad status code '{}'", code)))?;

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                ClientError::malformed_response(format!("bad header line '{}'", line))
            })?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let response = Self {
            status_code,
            reason_phrase: reason.trim().to_string(),
            headers,
        };

        // Reject a garbled CSeq up front
        response.cseq()?;

        Ok(response)
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// First header with the given name, compared case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Echoed sequence number, if the server sent one
    pub fn cseq(&self) -> ClientResult<Option<u32>> {
        self.header("CSeq")
            .map(|value| {
                value
                    .parse::<u32>()
                    .map_err(|_| ClientError::malformed_response(format!("bad CSeq '{}'", value)))
            })
            .transpose()
    }

    /// Session identifier, without any `;timeout=` style parameters
    pub fn session_id(&self) -> Option<&str> {
        self.header("Session")
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success() {
        let response =
            RtspResponse::parse(b"RTSP/1.0 200 OK\r\nCSeq: 3\r\nSession: 123456\r\n\r\n").unwrap();

        assert!(response.is_success());
        assert_eq!(response.reason_phrase, "OK");
        assert_eq!(response.cseq().unwrap(), Some(3));
        assert_eq!(response.session_id(), Some("123456"));
    }

    #[test]
    fn test_headers_are_case_insensitive_and_session_params_dropped() {
        let response = RtspResponse::parse(
            b"RTSP/1.0 200 OK\r\ncseq: 4\r\nsession: abc123;timeout=60\r\n\r\n",
        )
        .unwrap();

        assert_eq!(response.cseq().unwrap(), Some(4));
        assert_eq!(response.session_id(), Some("abc123"));
    }

    #[test]
    fn test_parse_rejection_keeps_reason_phrase() {
        let response =
            RtspResponse::parse(b"RTSP/1.0 454 Session Not Found\r\nCSeq: 2\r\n\r\n").unwrap();

        assert!(!response.is_success());
        assert_eq!(response.status_code, 454);
        assert_eq!(response.reason_phrase, "Session Not Found");
        assert_eq!(response.session_id(), None);
    }

    #[test]
    fn test_malformed_responses() {
        let cases: [&[u8]; 6] = [
            b"",
            b"HTTP/1.1 200 OK\r\n\r\n",
            b"RTSP/1.0 abc OK\r\n\r\n",
            b"RTSP/1.0 200\r\n\r\n",
            b"RTSP/1.0 200 OK\r\nno colon here\r\n\r\n",
            b"RTSP/1.0 200 OK\r\nCSeq: one\r\n\r\n",
        ];

        for case in cases {
            assert!(
                matches!(
                    RtspResponse::parse(case),
                    Err(ClientError::MalformedResponse { .. })
                ),
                "accepted {:?}",
                String::from_utf8_lossy(case)
            );
        }
    }
}
