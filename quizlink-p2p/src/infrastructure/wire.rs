use crate::error::{Result, TransportError};
use quizlink_core::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame; a full question set is a few KB
pub const MAX_FRAME_LEN: usize = 256 * 1024;

/// Write one length-prefixed frame: 4-byte big-endian length, then the
/// serialized message.
///
/// Raw stream sockets are not self-framing, so every message crosses the
/// wire inside exactly one frame.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(TransportError::Protocol(format!(
            "outbound frame of {} bytes exceeds limit",
            payload.len()
        )));
    }

    writer
        .write_all(&(payload.len() as u32).to_be_bytes())
        .await
        .map_err(|e| TransportError::Disconnected(e.to_string()))?;
    writer
        .write_all(&payload)
        .await
        .map_err(|e| TransportError::Disconnected(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::Disconnected(e.to_string()))?;
    Ok(())
}

/// Read one frame.
///
/// `Protocol` errors mean the payload was unreadable but the stream is
/// still aligned on a frame boundary, so the caller may discard and keep
/// reading. Any other error means the connection is gone.
pub async fn read_frame<R>(reader: &mut R) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| TransportError::Disconnected(e.to_string()))?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        // Framing integrity is lost at this point; treat as fatal
        return Err(TransportError::Disconnected(format!(
            "inbound frame of {len} bytes exceeds limit"
        )));
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| TransportError::Disconnected(e.to_string()))?;

    serde_json::from_slice(&payload)
        .map_err(|e| TransportError::Protocol(format!("undecodable payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizlink_core::{GamePayload, PlayerAnswer};

    #[tokio::test]
    async fn test_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        let msg = Message::Game(GamePayload::AnswerSubmitted(PlayerAnswer {
            question_index: 2,
            selected_option: 4,
            is_correct: true,
        }));
        write_frame(&mut a, &msg).await.unwrap();

        let back = read_frame(&mut b).await.unwrap();
        assert_eq!(msg, back);
    }

    #[tokio::test]
    async fn test_frames_stay_aligned() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        write_frame(&mut a, &Message::name_request()).await.unwrap();
        write_frame(&mut a, &Message::Game(GamePayload::GameOver))
            .await
            .unwrap();

        assert_eq!(read_frame(&mut b).await.unwrap(), Message::name_request());
        assert_eq!(
            read_frame(&mut b).await.unwrap(),
            Message::Game(GamePayload::GameOver)
        );
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_protocol_error() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        let junk = br#"{"type":"NoSuchThing"}"#;
        a.write_all(&(junk.len() as u32).to_be_bytes()).await.unwrap();
        a.write_all(junk).await.unwrap();

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));

        // The stream is still usable after the bad frame
        write_frame(&mut a, &Message::Game(GamePayload::GameOver))
            .await
            .unwrap();
        assert_eq!(
            read_frame(&mut b).await.unwrap(),
            Message::Game(GamePayload::GameOver)
        );
    }

    #[tokio::test]
    async fn test_truncated_stream_is_disconnect() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        a.write_all(&8u32.to_be_bytes()).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::Disconnected(_)));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_fatal() {
        let (mut a, mut b) = tokio::io::duplex(64);

        let bogus_len = (MAX_FRAME_LEN as u32) + 1;
        a.write_all(&bogus_len.to_be_bytes()).await.unwrap();

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::Disconnected(_)));
    }
}
