use crate::error::TransportError;
use crate::infrastructure::transport::TransportEvent;
use crate::infrastructure::wire;
use quizlink_core::Message;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Outbound queue depth per connection
pub(crate) const SEND_QUEUE_DEPTH: usize = 64;

/// A framed bidirectional connection: one reader task pushing decoded
/// messages into the transport's event channel, one writer task draining
/// an outbound queue.
///
/// The reader is the single source of `Disconnected`: it fires exactly once
/// when the stream dies. Explicit shutdown cancels both tasks without
/// emitting anything.
pub struct Connection {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    closed_rx: watch::Receiver<bool>,
}

impl Connection {
    /// Spawn with an internally created outbound queue.
    pub fn spawn(
        stream: TcpStream,
        events: mpsc::Sender<TransportEvent>,
    ) -> (Self, mpsc::Sender<Message>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(SEND_QUEUE_DEPTH);
        (Self::attach(stream, events, outbound_rx), outbound_tx)
    }

    /// Spawn over a caller-provided outbound queue.
    ///
    /// Lets the caller publish the sender (and the `Connected` event)
    /// before the reader starts, so no inbound message can ever precede
    /// `Connected` on the event channel.
    pub fn attach(
        stream: TcpStream,
        events: mpsc::Sender<TransportEvent>,
        outbound_rx: mpsc::Receiver<Message>,
    ) -> Self {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        let (closed_tx, closed_rx) = watch::channel(false);

        let reader = tokio::spawn(read_loop(read_half, events, closed_tx));
        let writer = tokio::spawn(write_loop(write_half, outbound_rx));

        Connection {
            reader,
            writer,
            closed_rx,
        }
    }

    /// Resolve once the reader has terminated (stream closed or failed)
    pub async fn closed(&mut self) {
        while !*self.closed_rx.borrow() {
            if self.closed_rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Cancel both tasks, closing the underlying socket and unblocking any
    /// pending read. Safe to call repeatedly.
    pub fn shutdown(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn read_loop(
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    events: mpsc::Sender<TransportEvent>,
    closed_tx: watch::Sender<bool>,
) {
    loop {
        match wire::read_frame(&mut read_half).await {
            Ok(message) => {
                if events.send(TransportEvent::Message(message)).await.is_err() {
                    break;
                }
            }
            Err(TransportError::Protocol(reason)) => {
                // Malformed payload: log, discard, keep the connection
                tracing::warn!(%reason, "discarding malformed frame");
            }
            Err(err) => {
                let _ = events
                    .send(TransportEvent::Disconnected(err.to_string()))
                    .await;
                break;
            }
        }
    }
    let _ = closed_tx.send(true);
}

async fn write_loop(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<Message>,
) {
    while let Some(message) = outbound_rx.recv().await {
        if let Err(err) = wire::write_frame(&mut write_half, &message).await {
            // The reader observes the dead stream and reports it
            tracing::warn!(error = %err, "write failed, stopping writer");
            break;
        }
    }
}
