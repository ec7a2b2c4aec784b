//! Frame format for the TCP characteristic transport.
//!
//! Every message is `op: u8`, `len: u16` (big-endian), then `len` payload
//! bytes. Opcodes below `0x80` come from the peer; the rest from the bridge.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use nus_bridge::identity::{RX_CHARACTERISTIC_UUID, TX_CHARACTERISTIC_UUID, UART_SERVICE_UUID};
use nus_bridge::{Outbound, PeerEvent};

pub const OP_WRITE: u8 = 0x01;
pub const OP_START_NOTIFY: u8 = 0x02;
pub const OP_STOP_NOTIFY: u8 = 0x03;
pub const OP_READ: u8 = 0x04;

pub const OP_HELLO: u8 = 0x80;
pub const OP_NOTIFY: u8 = 0x81;
pub const OP_READ_RESPONSE: u8 = 0x84;

pub const HEADER_LEN: usize = 3;

/// Largest payload accepted from a peer (the ATT attribute value limit).
pub const MAX_PAYLOAD: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unknown opcode {0:#04x}")]
    UnknownOp(u8),

    #[error("payload of {0} bytes exceeds {MAX_PAYLOAD}")]
    Oversize(usize),

    #[error("failed to encode hello: {0}")]
    Hello(#[from] serde_json::Error),
}

/// Identity sent to each peer on connect, standing in for an advertisement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub name: String,
    pub service: String,
    pub tx: String,
    pub rx: String,
    pub max_chunk: usize,
}

impl Hello {
    pub fn new(name: &str, max_chunk: usize) -> Self {
        Self {
            name: name.to_string(),
            service: UART_SERVICE_UUID.to_string(),
            tx: TX_CHARACTERISTIC_UUID.to_string(),
            rx: RX_CHARACTERISTIC_UUID.to_string(),
            max_chunk,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let json = serde_json::to_vec(self)?;
        if json.len() > MAX_PAYLOAD {
            return Err(WireError::Oversize(json.len()));
        }
        Ok(encode(OP_HELLO, &json))
    }
}

/// Encode one frame.
///
/// # Panics
///
/// Panics if `payload` does not fit the 16-bit length field.
pub fn encode(op: u8, payload: &[u8]) -> Vec<u8> {
    let len = u16::try_from(payload.len()).expect("payload exceeds frame length field");
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(op);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

pub fn encode_outbound(message: &Outbound) -> Vec<u8> {
    match message {
        Outbound::Notify(frame) => encode(OP_NOTIFY, frame),
        Outbound::ReadResponse(value) => encode(OP_READ_RESPONSE, value),
    }
}

/// Validate a header, returning the opcode and payload length.
pub fn parse_header(header: [u8; HEADER_LEN]) -> Result<(u8, usize), WireError> {
    let op = header[0];
    let len = usize::from(u16::from_be_bytes([header[1], header[2]]));
    if !matches!(op, OP_WRITE | OP_START_NOTIFY | OP_STOP_NOTIFY | OP_READ) {
        return Err(WireError::UnknownOp(op));
    }
    if len > MAX_PAYLOAD {
        return Err(WireError::Oversize(len));
    }
    Ok((op, len))
}

/// Turn a peer frame into a bridge event. Payloads on control opcodes are ignored.
pub fn decode_event(op: u8, payload: Vec<u8>) -> Result<PeerEvent, WireError> {
    match op {
        OP_WRITE => Ok(PeerEvent::Write(payload)),
        OP_START_NOTIFY => Ok(PeerEvent::Subscribe),
        OP_STOP_NOTIFY => Ok(PeerEvent::Unsubscribe),
        OP_READ => Ok(PeerEvent::Read),
        other => Err(WireError::UnknownOp(other)),
    }
}

/// Read the next peer event. `Ok(None)` on a clean end of stream.
pub async fn read_event<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<PeerEvent>, WireError> {
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let (op, len) = parse_header(header)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    decode_event(op, payload).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        assert_eq!(encode(OP_NOTIFY, b"hi"), vec![0x81, 0x00, 0x02, b'h', b'i']);
        assert_eq!(encode(OP_WRITE, b""), vec![0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_outbound() {
        let notify = encode_outbound(&Outbound::Notify(b"$ ".to_vec()));
        assert_eq!(notify, vec![OP_NOTIFY, 0, 2, b'$', b' ']);

        let read = encode_outbound(&Outbound::ReadResponse(Vec::new()));
        assert_eq!(read, vec![OP_READ_RESPONSE, 0, 0]);
    }

    #[test]
    fn test_parse_header_rejects_unknown_op() {
        assert!(matches!(
            parse_header([0x7f, 0, 0]),
            Err(WireError::UnknownOp(0x7f))
        ));
        // Bridge-side opcodes are not valid from a peer.
        assert!(matches!(
            parse_header([OP_NOTIFY, 0, 1]),
            Err(WireError::UnknownOp(OP_NOTIFY))
        ));
    }

    #[test]
    fn test_parse_header_rejects_oversize() {
        let len = (MAX_PAYLOAD as u16 + 1).to_be_bytes();
        assert!(matches!(
            parse_header([OP_WRITE, len[0], len[1]]),
            Err(WireError::Oversize(513))
        ));

        let len = (MAX_PAYLOAD as u16).to_be_bytes();
        assert_eq!(parse_header([OP_WRITE, len[0], len[1]]).unwrap(), (OP_WRITE, 512));
    }

    #[test]
    fn test_decode_each_opcode() {
        assert_eq!(
            decode_event(OP_WRITE, b"ls\n".to_vec()).unwrap(),
            PeerEvent::Write(b"ls\n".to_vec())
        );
        assert_eq!(decode_event(OP_START_NOTIFY, Vec::new()).unwrap(), PeerEvent::Subscribe);
        assert_eq!(decode_event(OP_STOP_NOTIFY, vec![1]).unwrap(), PeerEvent::Unsubscribe);
        assert_eq!(decode_event(OP_READ, Vec::new()).unwrap(), PeerEvent::Read);
    }

    #[test]
    fn test_hello_carries_identity() {
        let frame = Hello::new("RPi-BLE-UART", 180).encode().unwrap();
        assert_eq!(frame[0], OP_HELLO);

        let hello: Hello = serde_json::from_slice(&frame[HEADER_LEN..]).unwrap();
        assert_eq!(hello.name, "RPi-BLE-UART");
        assert_eq!(hello.service, UART_SERVICE_UUID);
        assert_eq!(hello.tx, TX_CHARACTERISTIC_UUID);
        assert_eq!(hello.rx, RX_CHARACTERISTIC_UUID);
        assert_eq!(hello.max_chunk, 180);
    }

    #[tokio::test]
    async fn test_read_event_stream() {
        let mut bytes = encode(OP_START_NOTIFY, b"");
        bytes.extend(encode(OP_WRITE, b"pwd\n"));
        bytes.extend(encode(OP_READ, b""));
        let mut reader = &bytes[..];

        assert_eq!(read_event(&mut reader).await.unwrap(), Some(PeerEvent::Subscribe));
        assert_eq!(
            read_event(&mut reader).await.unwrap(),
            Some(PeerEvent::Write(b"pwd\n".to_vec()))
        );
        assert_eq!(read_event(&mut reader).await.unwrap(), Some(PeerEvent::Read));
        assert_eq!(read_event(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_event_truncated_payload() {
        let bytes = [OP_WRITE, 0, 5, b'a'];
        let mut reader = &bytes[..];
        assert!(matches!(read_event(&mut reader).await, Err(WireError::Io(_))));
    }
}
