use axum::extract::ws::{Message as WsMessage, Utf8Bytes, WebSocket};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ConnectionError;
use crate::room::LiveRoom;

/// Pending outbound messages per connection before `send` blocks.
pub const OUTBOUND_CAPACITY: usize = 256;

/// One websocket participant of a room.
///
/// Cloning is cheap; all clones feed the same outbound queue.
#[derive(Clone, Debug)]
pub struct Connection {
    id: Arc<str>,
    outbound: mpsc::Sender<Bytes>,
}

impl Connection {
    /// Create a connection and the receiving end of its outbound queue.
    pub fn new(id: impl Into<Arc<str>>) -> (Self, mpsc::Receiver<Bytes>) {
        let (outbound, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Self { id: id.into(), outbound }, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn id_arc(&self) -> Arc<str> {
        Arc::clone(&self.id)
    }

    /// Queue a message for this connection, waiting while the queue is full.
    pub async fn send(&self, message: impl Into<Bytes>) -> Result<(), ConnectionError> {
        self.outbound.send(message.into()).await.map_err(|_| ConnectionError::Closed)
    }

    /// Whether both handles refer to the same underlying connection.
    pub fn same_connection(&self, other: &Connection) -> bool {
        self.outbound.same_channel(&other.outbound)
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// UTF-8 payloads go out as text frames, anything else as binary.
fn frame(payload: Bytes) -> WsMessage {
    match Utf8Bytes::try_from(payload.clone()) {
        Ok(text) => WsMessage::Text(text),
        Err(_) => WsMessage::Binary(payload),
    }
}

/// Drain the outbound queue into the socket, in order, until the queue is
/// closed or a write fails.
pub(crate) async fn write_pump<S>(mut outbound: mpsc::Receiver<Bytes>, mut sink: S) -> Result<(), ConnectionError>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(payload) = outbound.recv().await {
        if let Err(err) = sink.send(frame(payload)).await {
            return Err(ConnectionError::Transport(err.to_string()));
        }
    }
    let _ = sink.close().await;
    Ok(())
}

/// Hand every inbound frame to the room, one at a time, until the peer
/// closes or the socket fails.
pub(crate) async fn read_pump<St, E>(mut stream: St, connection: &Connection, live: &LiveRoom) -> Result<(), ConnectionError>
where
    St: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: fmt::Display,
{
    while let Some(frame) = stream.next().await {
        let payload = match frame {
            Ok(WsMessage::Text(text)) => Bytes::from(text),
            Ok(WsMessage::Binary(data)) => data,
            Ok(WsMessage::Close(_)) => return Ok(()),
            Ok(_) => continue,
            Err(err) => return Err(ConnectionError::Transport(err.to_string())),
        };
        if live.message(connection.clone(), payload).await.is_err() {
            return Err(ConnectionError::Closed);
        }
    }
    Ok(())
}

/// Run an upgraded websocket as connection `id` of `live`.
pub(crate) async fn serve(socket: WebSocket, id: String, live: LiveRoom) {
    let (sink, stream) = socket.split();
    run(sink, stream, id, live).await
}

/// Register the connection, run both pumps until either one stops, then
/// unregister it.
///
/// Whichever pump stops first drops the other, which releases both halves
/// of the socket.
pub(crate) async fn run<Si, St, E>(sink: Si, stream: St, id: impl Into<Arc<str>>, live: LiveRoom)
where
    Si: Sink<WsMessage> + Unpin + Send + 'static,
    Si::Error: fmt::Display,
    St: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: fmt::Display,
{
    let (connection, outbound) = Connection::new(id);
    let room_id = live.room().id().clone();
    let mut writer = tokio::spawn(write_pump(outbound, sink));

    if live.connect(connection.clone()).await.is_err() {
        writer.abort();
        return;
    }
    debug!(room = %room_id, connection = connection.id(), "connection open");

    let outcome = tokio::select! {
        read = read_pump(stream, &connection, &live) => {
            writer.abort();
            read
        }
        written = &mut writer => match written {
            Ok(result) => result,
            Err(join) => Err(ConnectionError::Transport(join.to_string())),
        },
    };

    match outcome {
        Ok(()) | Err(ConnectionError::Closed) => {}
        Err(error) => {
            warn!(room = %room_id, connection = connection.id(), "connection failed: {error}");
            let _ = live.fault(connection.clone(), error).await;
        }
    }
    let _ = live.disconnect(connection.clone()).await;
    debug!(room = %room_id, connection = connection.id(), "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Service;
    use crate::testing::Recorder;
    use futures::channel::mpsc::unbounded;
    use std::time::Duration;

    #[tokio::test]
    async fn writer_flushes_in_order_with_frame_kinds() {
        let (connection, outbound) = Connection::new("a");
        let (sink, mut written) = unbounded::<WsMessage>();

        connection.send("one").await.unwrap();
        connection.send(vec![0xff, 0x00]).await.unwrap();
        connection.send("three").await.unwrap();
        drop(connection);

        write_pump(outbound, sink).await.unwrap();
        assert_eq!(written.next().await, Some(WsMessage::Text("one".into())));
        assert_eq!(written.next().await, Some(WsMessage::Binary(Bytes::from_static(&[0xff, 0x00]))));
        assert_eq!(written.next().await, Some(WsMessage::Text("three".into())));
    }

    #[test]
    fn text_frames_share_the_payload_buffer() {
        let payload = Bytes::from("shared buffer".to_string());
        let WsMessage::Text(text) = frame(payload.clone()) else {
            panic!("expected a text frame");
        };
        assert_eq!(Bytes::from(text).as_ptr(), payload.as_ptr());
    }

    #[tokio::test]
    async fn writer_stops_on_first_failure() {
        let (connection, outbound) = Connection::new("a");
        let (sink, written) = unbounded::<WsMessage>();
        drop(written);

        connection.send("lost").await.unwrap();
        let result = write_pump(outbound, sink).await;
        assert!(matches!(result, Err(ConnectionError::Transport(_))));
    }

    #[tokio::test]
    async fn send_blocks_when_queue_is_full() {
        let (connection, mut outbound) = Connection::new("slow");
        for i in 0..OUTBOUND_CAPACITY {
            connection.send(i.to_string()).await.unwrap();
        }

        let blocked = tokio::time::timeout(Duration::from_millis(20), connection.send("overflow")).await;
        assert!(blocked.is_err());

        outbound.recv().await.unwrap();
        connection.send("fits").await.unwrap();
    }

    #[tokio::test]
    async fn send_to_closed_connection_fails() {
        let (connection, outbound) = Connection::new("gone");
        drop(outbound);
        assert!(connection.is_closed());
        assert_eq!(connection.send("x").await, Err(ConnectionError::Closed));
    }

    #[tokio::test]
    async fn run_delivers_frames_then_closes() {
        let recorder = Recorder::default();
        let service = recorder.service("rec");
        let live = service.room("rec", "r").await.unwrap();

        let (sink, _written) = unbounded::<WsMessage>();
        let (inbound, stream) = unbounded::<Result<WsMessage, String>>();
        inbound.unbounded_send(Ok(WsMessage::Text("hi".into()))).unwrap();
        inbound.unbounded_send(Ok(WsMessage::Binary(Bytes::from_static(b"raw")))).unwrap();
        drop(inbound);

        run(sink, stream, "a", live.clone()).await;

        assert_eq!(recorder.events(), vec!["start rec/r", "connect a", "message a hi", "message a raw", "close a"]);
        assert!(live.room().is_empty());
    }

    #[tokio::test]
    async fn transport_fault_fires_on_error_before_close() {
        let recorder = Recorder::default();
        let service = recorder.service("rec");
        let live = service.room("rec", "r").await.unwrap();

        let (sink, _written) = unbounded::<WsMessage>();
        let (inbound, stream) = unbounded::<Result<WsMessage, String>>();
        inbound.unbounded_send(Err("boom".to_string())).unwrap();

        run(sink, stream, "a", live.clone()).await;

        assert_eq!(
            recorder.events(),
            vec!["start rec/r", "connect a", "error a transport failed: boom", "close a"]
        );
    }

    #[tokio::test]
    async fn close_frame_ends_the_reader() {
        let recorder = Recorder::default();
        let service = recorder.service("rec");
        let live = service.room("rec", "r").await.unwrap();

        let (sink, _written) = unbounded::<WsMessage>();
        let (inbound, stream) = unbounded::<Result<WsMessage, String>>();
        inbound.unbounded_send(Ok(WsMessage::Close(None))).unwrap();
        inbound.unbounded_send(Ok(WsMessage::Text("after close".into()))).unwrap();

        run(sink, stream, "a", live).await;

        assert_eq!(recorder.events(), vec!["start rec/r", "connect a", "close a"]);
    }
}
