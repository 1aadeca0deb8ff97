//! stdio message framing. Newline-delimited JSON is the default; messages
//! prefixed with a `Content-Length` header are also accepted and answered in
//! the same framing.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("stdio transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid Content-Length header: {0}")]
    InvalidHeader(String),
    #[error("Unexpected EOF while reading MCP message")]
    UnexpectedEof,
    #[error("Failed to serialize JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Line,
    ContentLength,
}

/// One inbound message. A body that is not valid JSON is still a frame so
/// the server can answer with a parse error and keep reading.
#[derive(Debug)]
pub struct Frame {
    pub framing: Framing,
    pub body: Result<Value, serde_json::Error>,
}

pub async fn read_message<R>(reader: &mut R) -> Result<Option<Frame>, TransportError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(raw_len) = content_length_value(trimmed) {
            let length = raw_len
                .parse::<usize>()
                .map_err(|_| TransportError::InvalidHeader(raw_len.to_string()))?;
            skip_remaining_headers(reader).await?;
            let mut payload = vec![0_u8; length];
            reader.read_exact(&mut payload).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    TransportError::UnexpectedEof
                } else {
                    TransportError::Io(e)
                }
            })?;
            return Ok(Some(Frame {
                framing: Framing::ContentLength,
                body: serde_json::from_slice(&payload),
            }));
        }

        return Ok(Some(Frame {
            framing: Framing::Line,
            body: serde_json::from_str(trimmed),
        }));
    }
}

pub async fn write_message<W>(
    writer: &mut W,
    value: &Value,
    framing: Framing,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value)?;
    match framing {
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

fn content_length_value(line: &str) -> Option<&str> {
    let (name, value) = line.split_once(':')?;
    name.trim()
        .eq_ignore_ascii_case("content-length")
        .then(|| value.trim())
}

async fn skip_remaining_headers<R>(reader: &mut R) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(TransportError::UnexpectedEof);
        }
        if line.trim().is_empty() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::BufReader;

    use super::*;

    #[tokio::test]
    async fn reads_newline_delimited_messages_and_skips_blank_lines() {
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\n{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n";
        let mut reader = BufReader::new(&input[..]);

        let first = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(first.framing, Framing::Line);
        assert_eq!(first.body.unwrap()["method"], json!("ping"));

        let second = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(second.body.unwrap()["method"], json!("notifications/initialized"));

        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_content_length_framed_messages() {
        let body = r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#;
        let input = format!(
            "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n{body}",
            body.len()
        );
        let mut reader = BufReader::new(input.as_bytes());

        let frame = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(frame.framing, Framing::ContentLength);
        assert_eq!(frame.body.unwrap()["id"], json!(7));
    }

    #[tokio::test]
    async fn malformed_json_is_surfaced_as_a_frame() {
        let mut reader = BufReader::new(&b"{not json\n"[..]);
        let frame = read_message(&mut reader).await.unwrap().unwrap();
        assert!(frame.body.is_err());
    }

    #[tokio::test]
    async fn truncated_content_length_payload_is_an_error() {
        let mut reader = BufReader::new(&b"Content-Length: 50\r\n\r\n{}"[..]);
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedEof));
    }

    #[tokio::test]
    async fn writes_in_the_requested_framing() {
        let value = json!({ "jsonrpc": "2.0", "id": 1, "result": {} });

        let mut line = Vec::new();
        write_message(&mut line, &value, Framing::Line).await.unwrap();
        let line = String::from_utf8(line).unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(serde_json::from_str::<Value>(line.trim_end()).unwrap(), value);

        let mut framed = Vec::new();
        write_message(&mut framed, &value, Framing::ContentLength)
            .await
            .unwrap();
        let framed = String::from_utf8(framed).unwrap();
        let (headers, body) = framed.split_once("\r\n\r\n").unwrap();
        assert!(headers.starts_with(&format!("Content-Length: {}", body.len())));
        assert_eq!(serde_json::from_str::<Value>(body).unwrap(), value);
    }
}
