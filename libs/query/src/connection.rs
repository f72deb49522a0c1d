//! Async TCP connection to a query interface.
//!
//! A background reader task splits incoming lines into responses (routed to
//! the command currently waiting) and notifications (routed to an unbounded
//! channel, so a slow notification consumer never stalls responses).

use std::sync::Mutex as StdMutex;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::codec::{parse_records, parse_status, Command, Notification, Record};
use crate::error::QueryError;

/// Number of greeting lines the server sends after accepting a connection.
const BANNER_LINES: usize = 2;

type Response = Result<Vec<Record>, QueryError>;

struct Inner {
    writer: OwnedWriteHalf,
    responses: mpsc::Receiver<Response>,
}

/// A connection to a query interface.
///
/// Commands are serialized: only one is outstanding at a time. A command
/// future must not be dropped between sending and receiving, or its response
/// is handed to the next caller.
pub struct Connection {
    inner: Mutex<Inner>,
    notifications: StdMutex<Option<mpsc::UnboundedReceiver<Notification>>>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Connect and consume the greeting banner.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, QueryError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        for _ in 0..BANNER_LINES {
            match read_line(&mut reader).await? {
                Some(line) => trace!(line = %line.trim(), "Query banner"),
                None => return Err(QueryError::Closed),
            }
        }

        let (response_tx, responses) = mpsc::channel(1);
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(reader, response_tx, notify_tx));

        debug!("Query connection established");

        Ok(Self {
            inner: Mutex::new(Inner { writer, responses }),
            notifications: StdMutex::new(Some(notify_rx)),
            reader,
        })
    }

    /// Send a command and wait for its response records.
    pub async fn execute(&self, command: &Command) -> Result<Vec<Record>, QueryError> {
        let mut inner = self.inner.lock().await;

        let mut line = command.encode();
        trace!(command = %command.name(), "Sending query command");
        line.push('\n');
        inner.writer.write_all(line.as_bytes()).await?;
        inner.writer.flush().await?;

        inner.responses.recv().await.ok_or(QueryError::Closed)?
    }

    /// Take the notification stream. Only the first caller gets it.
    pub fn take_notifications(&self) -> Option<mpsc::UnboundedReceiver<Notification>> {
        match self.notifications.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Read one `\n`-terminated line. Bytes that are not valid UTF-8 are
/// replaced rather than failing the read. `None` at end of stream.
async fn read_line(reader: &mut BufReader<OwnedReadHalf>) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }

    match String::from_utf8(buf) {
        Ok(line) => Ok(Some(line)),
        Err(e) => {
            let line = String::from_utf8_lossy(e.as_bytes()).into_owned();
            warn!(line = %line.trim(), "Query line is not valid UTF-8");
            Ok(Some(line))
        }
    }
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    responses: mpsc::Sender<Response>,
    notifications: mpsc::UnboundedSender<Notification>,
) {
    let mut data: Option<String> = None;

    loop {
        let raw = match read_line(&mut reader).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Query connection closed by server");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Query connection read failed");
                break;
            }
        };

        // The server terminates lines with "\n\r"
        let line = raw.trim_matches(|c| c == '\r' || c == '\n');
        if line.is_empty() {
            continue;
        }

        if let Some(notification) = Notification::parse(line) {
            trace!(event = %notification.event, "Query notification");
            // Receiver may be gone if nobody subscribed
            let _ = notifications.send(notification);
            continue;
        }

        let response = match parse_status(line) {
            Some(Ok(status)) if status.is_ok() => {
                Ok(data.take().map(|d| parse_records(&d)).unwrap_or_default())
            }
            Some(Ok(status)) => {
                data = None;
                Err(QueryError::Server {
                    id: status.id,
                    message: status.message,
                })
            }
            Some(Err(e)) => {
                data = None;
                Err(e)
            }
            None => {
                if data.is_some() {
                    warn!("Query response had more than one data line");
                }
                data = Some(line.to_string());
                continue;
            }
        };

        if responses.send(response).await.is_err() {
            break;
        }
    }
}
