use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Absorbs one readable stream line by line on a dedicated task, so the
/// owner can poll for output without ever blocking on pipe I/O. The reader
/// task is the channel's only producer; the owner is its only consumer.
pub struct StreamDrain {
    reader: JoinHandle<()>,
    lines: mpsc::UnboundedReceiver<String>,
}

impl StreamDrain {
    pub fn new<R>(stream: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        // consumer went away; stop absorbing
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        log::warn!(target: "pinhole", "Error draining stream: {err:?}");
                        break;
                    }
                }
            }
        });

        Self {
            reader,
            lines: line_rx,
        }
    }

    /// True once the reader task has terminated and every buffered line has
    /// been taken.
    pub fn is_drained_and_closed(&self) -> bool {
        self.reader.is_finished() && self.lines.is_empty()
    }

    /// Everything buffered so far, without waiting for more.
    pub fn take_available(&mut self) -> impl Iterator<Item = String> + '_ {
        std::iter::from_fn(|| self.lines.try_recv().ok())
    }
}
