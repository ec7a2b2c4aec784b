//! TCP stand-in for the notify/write characteristic pair.
//!
//! One peer is served at a time. Its frames become [`PeerEvent`]s for the
//! bridge, and the bridge's outbound frames are written back to it. When the
//! peer goes away the bridge sees an unsubscribe, the same as a central
//! dropping off a GATT server.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use nus_bridge::{PeerEvent, Registration, Transport, TransportEnd, TransportError, TransportLink};

use crate::config::BridgeConfig;
use crate::wire::{self, Hello, WireError};

pub struct TcpTransport {
    listen: String,
    fallback_listen: String,
    queue_depth: usize,
    hello: Hello,
    local_addr: Option<SocketAddr>,
}

impl TcpTransport {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            listen: config.listen.clone(),
            fallback_listen: config.fallback_listen.clone(),
            queue_depth: config.queue_depth,
            hello: Hello::new(&config.local_name, config.max_chunk),
            local_addr: None,
        }
    }

    /// Address actually bound by the last successful registration.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Transport for TcpTransport {
    fn register(&mut self, registration: Registration) -> Result<TransportLink, TransportError> {
        let addr = match registration {
            Registration::Primary => self.listen.clone(),
            Registration::Fallback => self.fallback_listen.clone(),
        };

        if tokio::runtime::Handle::try_current().is_err() {
            return Err(TransportError::Unavailable("no async runtime".into()));
        }

        let listener = bind(&addr)?;
        let local = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr: addr.clone(), source })?;
        log::info!("listening for peers on {local} ({registration})");

        let (link, end) = TransportLink::channel(self.queue_depth);
        tokio::spawn(accept_loop(listener, end, self.hello.clone()));
        self.local_addr = Some(local);
        Ok(link)
    }
}

fn bind(addr: &str) -> Result<TcpListener, TransportError> {
    let to_err = |source| TransportError::Bind {
        addr: addr.to_string(),
        source,
    };
    let std_listener = std::net::TcpListener::bind(addr).map_err(to_err)?;
    std_listener.set_nonblocking(true).map_err(to_err)?;
    TcpListener::from_std(std_listener).map_err(to_err)
}

async fn accept_loop(listener: TcpListener, mut end: TransportEnd, hello: Hello) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("accept failed: {e}");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        log::info!("peer connected: {addr}");
        // Anything still queued was meant for the previous peer.
        while end.outbound.try_recv().is_ok() {}

        match serve_peer(stream, &mut end, &hello).await {
            Ok(()) => log::info!("peer disconnected: {addr}"),
            Err(e) => log::info!("peer dropped: {addr}: {e}"),
        }

        if end.events.send(PeerEvent::Unsubscribe).await.is_err() {
            log::debug!("bridge gone, closing transport");
            return;
        }
    }
}

/// Serve one peer until either side hangs up.
async fn serve_peer(
    stream: TcpStream,
    end: &mut TransportEnd,
    hello: &Hello,
) -> Result<(), WireError> {
    stream.set_nodelay(true)?;
    let (read_half, mut write_half) = stream.into_split();
    write_half.write_all(&hello.encode()?).await?;

    // Reads run on their own task so a partially read frame is never lost
    // when an outbound frame is ready first.
    let mut reader = tokio::spawn(read_peer(read_half, end.events.clone()));

    let result = loop {
        tokio::select! {
            done = &mut reader => {
                break done.map_err(std::io::Error::from).map_err(WireError::from).and_then(|r| r);
            }
            message = end.outbound.recv() => match message {
                Some(message) => {
                    if let Err(e) = write_half.write_all(&wire::encode_outbound(&message)).await {
                        break Err(e.into());
                    }
                }
                None => break Ok(()),
            },
        }
    };

    reader.abort();
    result
}

async fn read_peer(
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<PeerEvent>,
) -> Result<(), WireError> {
    while let Some(event) = wire::read_event(&mut reader).await? {
        log::trace!("peer event: {event:?}");
        if events.send(event).await.is_err() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{encode, HEADER_LEN, OP_HELLO, OP_NOTIFY, OP_READ_RESPONSE};
    use nus_bridge::{register_with_fallback, NotifySink};
    use tokio::io::AsyncReadExt;

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            listen: "127.0.0.1:0".to_string(),
            ..BridgeConfig::default()
        }
    }

    async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let mut header = [0u8; HEADER_LEN];
        stream.read_exact(&mut header).await.unwrap();
        let len = usize::from(u16::from_be_bytes([header[1], header[2]]));
        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).await.unwrap();
        (header[0], payload)
    }

    async fn connect(transport: &TcpTransport) -> TcpStream {
        let mut stream = TcpStream::connect(transport.local_addr().unwrap()).await.unwrap();
        let (op, payload) = read_frame(&mut stream).await;
        assert_eq!(op, OP_HELLO);
        let hello: Hello = serde_json::from_slice(&payload).unwrap();
        assert_eq!(hello.max_chunk, 180);
        stream
    }

    #[tokio::test]
    async fn test_primary_registration() {
        let mut transport = TcpTransport::new(&test_config());
        let (_link, used) = register_with_fallback(&mut transport).unwrap();
        assert_eq!(used, Registration::Primary);
        assert!(transport.local_addr().is_some());
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_is_taken() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = BridgeConfig {
            listen: taken.local_addr().unwrap().to_string(),
            fallback_listen: "127.0.0.1:0".to_string(),
            ..BridgeConfig::default()
        };

        let mut transport = TcpTransport::new(&config);
        let (_link, used) = register_with_fallback(&mut transport).unwrap();
        assert_eq!(used, Registration::Fallback);
        assert_ne!(transport.local_addr(), Some(taken.local_addr().unwrap()));
    }

    #[tokio::test]
    async fn test_both_addresses_taken_is_fatal() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let config = BridgeConfig {
            listen: addr.clone(),
            fallback_listen: addr,
            ..BridgeConfig::default()
        };

        let mut transport = TcpTransport::new(&config);
        assert!(register_with_fallback(&mut transport).is_err());
    }

    #[test]
    fn test_register_needs_runtime() {
        let mut transport = TcpTransport::new(&test_config());
        assert!(matches!(
            transport.register(Registration::Primary),
            Err(TransportError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_peer_round_trip() {
        let mut transport = TcpTransport::new(&test_config());
        let mut link = transport.register(Registration::Primary).unwrap();
        let mut peer = connect(&transport).await;

        peer.write_all(&encode(wire::OP_START_NOTIFY, b"")).await.unwrap();
        peer.write_all(&encode(wire::OP_WRITE, b"ls\n")).await.unwrap();
        peer.write_all(&encode(wire::OP_READ, b"")).await.unwrap();

        assert_eq!(link.events.recv().await, Some(PeerEvent::Subscribe));
        assert_eq!(link.events.recv().await, Some(PeerEvent::Write(b"ls\n".to_vec())));
        assert_eq!(link.events.recv().await, Some(PeerEvent::Read));

        link.sink.notify(b"file.txt\r\n");
        link.sink.read_response(b"file.txt\r\n");

        assert_eq!(read_frame(&mut peer).await, (OP_NOTIFY, b"file.txt\r\n".to_vec()));
        assert_eq!(
            read_frame(&mut peer).await,
            (OP_READ_RESPONSE, b"file.txt\r\n".to_vec())
        );
    }

    #[tokio::test]
    async fn test_disconnect_unsubscribes() {
        let mut transport = TcpTransport::new(&test_config());
        let mut link = transport.register(Registration::Primary).unwrap();

        let mut peer = connect(&transport).await;
        peer.write_all(&encode(wire::OP_START_NOTIFY, b"")).await.unwrap();
        assert_eq!(link.events.recv().await, Some(PeerEvent::Subscribe));

        drop(peer);
        assert_eq!(link.events.recv().await, Some(PeerEvent::Unsubscribe));

        // The next peer is served.
        let mut peer = connect(&transport).await;
        peer.write_all(&encode(wire::OP_WRITE, b"pwd\n")).await.unwrap();
        assert_eq!(link.events.recv().await, Some(PeerEvent::Write(b"pwd\n".to_vec())));
    }

    #[tokio::test]
    async fn test_bad_frame_drops_peer() {
        let mut transport = TcpTransport::new(&test_config());
        let mut link = transport.register(Registration::Primary).unwrap();

        let mut peer = connect(&transport).await;
        peer.write_all(&[0x7f, 0, 0]).await.unwrap();

        assert_eq!(link.events.recv().await, Some(PeerEvent::Unsubscribe));
    }
}
