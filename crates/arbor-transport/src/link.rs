//! Framed link halves and connection handshakes
//!
//! A link is one TCP stream split into owned halves. The reader half is
//! handed to a per-link reader task; the writer half is registered with the
//! dispatcher, which is the only task that encodes outbound frames.

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::debug;

use arbor_core::{PeerContact, PeerId};

use crate::error::WireError;
use crate::frame::{read_frame, write_frame};

/// Read half of a framed link.
pub struct FramedReader<R = OwnedReadHalf> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    /// Wrap a raw read half.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next framed record.
    pub async fn read<T: DeserializeOwned>(&mut self) -> Result<T, WireError> {
        read_frame(&mut self.inner).await
    }
}

/// Write half of a framed link.
pub struct FramedWriter<W = OwnedWriteHalf> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FramedWriter<W> {
    /// Wrap a raw write half.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write one framed record.
    pub async fn write<T: Serialize>(&mut self, value: &T) -> Result<(), WireError> {
        write_frame(&mut self.inner, value).await
    }
}

/// Split an established stream into framed halves.
pub fn split(stream: TcpStream) -> (FramedReader, FramedWriter) {
    let (reader, writer) = stream.into_split();
    (FramedReader::new(reader), FramedWriter::new(writer))
}

/// Dial a peer's accept socket and introduce ourselves.
///
/// The first frame on a dialed peer link is the dialer's bare ID; the
/// acceptor registers the neighbor from it.
pub async fn dial_peer(
    address: &str,
    local_id: &PeerId,
) -> Result<(FramedReader, FramedWriter), WireError> {
    let stream = TcpStream::connect(address)
        .await
        .map_err(|e| WireError::ConnectFailed {
            address: address.to_string(),
            source: e,
        })?;

    let (reader, mut writer) = split(stream);
    writer.write(local_id).await?;

    debug!(address, "Dialed neighbor");
    Ok((reader, writer))
}

/// Complete the accept-side handshake by reading the dialer's bare ID.
pub async fn accept_peer(
    stream: TcpStream,
) -> Result<(PeerId, FramedReader, FramedWriter), WireError> {
    let (mut reader, writer) = split(stream);
    let id: PeerId = reader.read().await?;

    debug!(peer = %id, "Accepted neighbor");
    Ok((id, reader, writer))
}

/// Dial the coordinator and register.
///
/// The first frame on the coordinator link is the peer's contact record;
/// every later frame in either direction is a message envelope.
pub async fn dial_coordinator(
    address: &str,
    contact: &PeerContact,
) -> Result<(FramedReader, FramedWriter), WireError> {
    let stream = TcpStream::connect(address)
        .await
        .map_err(|e| WireError::ConnectFailed {
            address: address.to_string(),
            source: e,
        })?;

    let (reader, mut writer) = split(stream);
    writer.write(contact).await?;

    debug!(address, peer = %contact.id, "Registered with coordinator");
    Ok((reader, writer))
}

#[cfg(test)]
mod tests {
    use arbor_core::{Command, Message, Payload};
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn test_duplex_frames_roundtrip() {
        let (near, far) = tokio::io::duplex(1024);
        let mut writer = FramedWriter::new(near);
        let mut reader = FramedReader::new(far);

        let msg = Message::new(
            PeerId::new("a"),
            PeerId::new("b"),
            Command::Label,
            Payload::Level(7),
        );
        writer.write(&msg).await.unwrap();

        let decoded: Message = reader.read().await.unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_peer_handshake_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let dialer_id = PeerId::new("dialer");

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            accept_peer(stream).await.unwrap()
        });

        let (_reader, mut writer) = dial_peer(&address, &dialer_id).await.unwrap();
        let (remote_id, mut remote_reader, _remote_writer) = accept.await.unwrap();
        assert_eq!(remote_id, dialer_id);

        // Envelopes flow after the hello frame.
        let msg = Message::plain(dialer_id.clone(), PeerId::new("acceptor"), Command::Keepon);
        writer.write(&msg).await.unwrap();
        let decoded: Message = remote_reader.read().await.unwrap();
        assert_eq!(decoded, msg);
    }

    #[tokio::test]
    async fn test_coordinator_handshake_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut reader, _writer) = split(stream);
            reader.read::<PeerContact>().await.unwrap()
        });

        let contact = PeerContact::new(PeerId::new("p1"), "127.0.0.1:9999");
        let _link = dial_coordinator(&address, &contact).await.unwrap();

        let registered = accept.await.unwrap();
        assert_eq!(registered, contact);
    }

    #[tokio::test]
    async fn test_dial_unreachable_address_fails() {
        // Port 1 on localhost is essentially never listening.
        let result = dial_peer("127.0.0.1:1", &PeerId::new("x")).await;
        assert!(matches!(result, Err(WireError::ConnectFailed { .. })));
    }
}
