//! Control mode client
//!
//! Owns both halves of the control mode byte stream. Commands are written
//! one per line; tmux answers each with exactly one `%begin` ... `%end`
//! (or `%error`) block, strictly in the order the commands were written.
//! Notifications arrive between blocks.
//!
//! Reply correlation is FIFO: the writer lock is held while a command is
//! both enqueued and written, so queue order always equals wire order. A
//! caller that gives up mid-write leaves the queue matching what actually
//! reached the wire (see [`PendingWrite`]).
//! Incoming bytes are processed one line at a time under the protocol lock,
//! so no two lines are ever handled concurrently.

use crate::error::{Result, TmuxError};
use crate::queue::CommandQueue;
use crate::scanner::Scanner;
use crate::tmux::commands::{Size, TmuxCommand};
use crate::tmux::layout::parse_window_layout;
use crate::tmux::listing;
use crate::tmux::notification::{Notification, strip_control_mode_prefix};
use crate::tmux::types::{Pane, PaneId, Window, WindowId};
use par_tmux_config::TmuxConfig;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

/// Callback receiving unescaped `%output` bytes for one pane.
///
/// Called with the protocol lock held; it must not call back into the client.
pub type OutputReceiver = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Notifications forwarded to the subscriber, in line order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TmuxEvent {
    WindowAdd { window_id: WindowId },
    WindowPaneChanged { window_id: WindowId, pane_id: PaneId },
    SessionWindowChanged { window_id: WindowId },
    LayoutChange,
    /// The stream reached EOF or failed; no further replies will arrive
    Disconnected,
}

/// `Ok(lines)` for `%end`, `Err(lines)` for `%error`
type Reply = std::result::Result<Vec<String>, Vec<String>>;

struct PendingCommand {
    command: String,
    sender: oneshot::Sender<Reply>,
}

#[derive(Debug)]
enum BlockState {
    Idle,
    InBlock { lines: Vec<String> },
}

struct Protocol {
    state: BlockState,
    /// Bytes of the current incomplete line
    line_buffer: Vec<u8>,
    pending: CommandQueue<PendingCommand>,
    receivers: HashMap<PaneId, OutputReceiver>,
    /// Tail of a command line whose write was cancelled part way
    unsent: Vec<u8>,
    connected: bool,
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One command line being written while the writer lock is held.
///
/// If the caller's future is dropped before the line is fully written, the
/// queue is put back in step with the wire: a command none of whose bytes
/// went out is withdrawn, and the unwritten tail of a partly written line is
/// kept in `Protocol::unsent` so the next command completes it first.
struct PendingWrite<'a> {
    protocol: &'a Mutex<Protocol>,
    /// Leftover bytes from an earlier cancelled write, then this command
    line: Vec<u8>,
    /// Offset in `line` where this command's own bytes begin
    command_start: usize,
    written: usize,
    done: bool,
}

impl PendingWrite<'_> {
    async fn write_to(&mut self, writer: &mut BoxedWriter) -> std::io::Result<()> {
        while self.written < self.line.len() {
            let n = writer.write(&self.line[self.written..]).await?;
            if n == 0 {
                return Err(std::io::ErrorKind::WriteZero.into());
            }
            self.written += n;
        }
        writer.flush().await
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut protocol = self.protocol.lock();
        if self.written <= self.command_start {
            protocol.pending.take_newest();
            protocol.unsent = self.line[self.written..self.command_start].to_vec();
            crate::debug_log!("TMUX", "Command cancelled before it was written");
        } else {
            protocol.unsent = self.line[self.written..].to_vec();
            crate::debug_log!(
                "TMUX",
                "Command cancelled mid-write, {} bytes left for the next write",
                protocol.unsent.len()
            );
        }
    }
}

/// Client side of tmux control mode.
pub struct TmuxCtrl {
    writer: tokio::sync::Mutex<BoxedWriter>,
    protocol: Mutex<Protocol>,
    events: mpsc::UnboundedSender<TmuxEvent>,
    command_timeout: Option<Duration>,
}

impl TmuxCtrl {
    /// Create a client writing commands to `writer`.
    ///
    /// Incoming bytes are supplied through [`feed`](Self::feed) or
    /// [`run`](Self::run). Notifications are delivered on the returned channel.
    pub fn new<W>(writer: W, config: &TmuxConfig) -> (Self, mpsc::UnboundedReceiver<TmuxEvent>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (events, rx) = mpsc::unbounded_channel();
        let ctrl = Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            protocol: Mutex::new(Protocol {
                state: BlockState::Idle,
                line_buffer: Vec::new(),
                pending: CommandQueue::new(config.command_queue_capacity),
                receivers: HashMap::new(),
                unsent: Vec::new(),
                connected: true,
            }),
            events,
            command_timeout: config.command_timeout(),
        };
        (ctrl, rx)
    }

    pub fn is_connected(&self) -> bool {
        self.protocol.lock().connected
    }

    /// Number of commands still waiting for their reply block.
    pub fn pending_commands(&self) -> usize {
        self.protocol.lock().pending.len()
    }

    // =========================================================================
    // Incoming data
    // =========================================================================

    /// Read `reader` to EOF, feeding every chunk to the state machine.
    ///
    /// On EOF or a read error the client is marked disconnected and all
    /// pending commands fail with [`TmuxError::Disconnected`].
    pub async fn run<R>(&self, mut reader: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; 8192];
        let result = loop {
            match reader.read(&mut buf).await {
                Ok(0) => break Ok(()),
                Ok(n) => self.feed(&buf[..n]),
                Err(e) => {
                    crate::debug_error!("TMUX", "Control mode read failed: {}", e);
                    break Err(TmuxError::Io(e));
                }
            }
        };
        self.disconnect();
        result
    }

    /// Process a chunk of bytes. A trailing partial line is kept until the
    /// next chunk completes it.
    pub fn feed(&self, data: &[u8]) {
        let mut protocol = self.protocol.lock();
        protocol.line_buffer.extend_from_slice(data);

        while let Some(end) = protocol.line_buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = protocol.line_buffer.drain(..=end).collect();
            let raw = &raw[..raw.len() - 1];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            self.process_line(&mut protocol, raw);
        }
    }

    /// Handle one line without its terminator. Reply lines are text;
    /// `%output` payloads stay raw bytes until unescaped.
    fn process_line(&self, protocol: &mut Protocol, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        crate::debug_trace!("TMUX", "<< {}", line);

        if let BlockState::InBlock { lines } = &mut protocol.state
            && !raw.starts_with(b"%end")
            && !raw.starts_with(b"%error")
        {
            lines.push(line.into_owned());
            return;
        }

        let mut scanner = Scanner::new(&line);
        let Ok(word) = scanner.read_word() else {
            return;
        };
        let command = strip_control_mode_prefix(word);

        match (&mut protocol.state, command) {
            (BlockState::Idle, "%begin") => {
                protocol.state = BlockState::InBlock { lines: Vec::new() };
            }
            (BlockState::InBlock { lines }, "%end" | "%error") => {
                let lines = std::mem::take(lines);
                protocol.state = BlockState::Idle;
                let success = command == "%end";
                match protocol.pending.get() {
                    Some(pending) => {
                        crate::debug_log!(
                            "TMUX",
                            "{} '{}' ({} lines)",
                            command,
                            pending.command,
                            lines.len()
                        );
                        let reply = if success { Ok(lines) } else { Err(lines) };
                        if pending.sender.send(reply).is_err() {
                            crate::debug_log!(
                                "TMUX",
                                "Reply to '{}' arrived after its caller gave up",
                                pending.command
                            );
                        }
                    }
                    None => {
                        crate::debug_error!(
                            "TMUX",
                            "Discarding {} block with no pending command: {:?}",
                            command,
                            lines
                        );
                    }
                }
            }
            (BlockState::InBlock { lines }, _) => {
                // Starts with %end/%error but is a different word
                lines.push(line.to_string());
            }
            (BlockState::Idle, _) => match Notification::parse_bytes(raw) {
                Ok(notification) => self.dispatch(protocol, notification),
                Err(e) => {
                    crate::debug_error!("TMUX", "Failed to parse notification {:?}: {}", line, e);
                }
            },
        }
    }

    fn dispatch(&self, protocol: &Protocol, notification: Notification) {
        let event = match notification {
            Notification::Output { pane_id, data } => {
                match protocol.receivers.get(&pane_id) {
                    Some(receiver) => receiver(&data),
                    None => crate::debug_trace!("TMUX", "No output receiver for %{}", pane_id),
                }
                return;
            }
            Notification::Ignored(command) => {
                crate::debug_trace!("TMUX", "Ignoring {}", command);
                return;
            }
            Notification::WindowAdd { window_id } => TmuxEvent::WindowAdd { window_id },
            Notification::WindowPaneChanged { window_id, pane_id } => {
                TmuxEvent::WindowPaneChanged { window_id, pane_id }
            }
            Notification::SessionWindowChanged { window_id } => {
                TmuxEvent::SessionWindowChanged { window_id }
            }
            Notification::LayoutChange => TmuxEvent::LayoutChange,
        };
        // The subscriber may have gone away; notifications are best effort
        let _ = self.events.send(event);
    }

    /// Mark the stream closed and fail every pending command.
    fn disconnect(&self) {
        let mut protocol = self.protocol.lock();
        if !protocol.connected {
            return;
        }
        protocol.connected = false;
        protocol.state = BlockState::Idle;
        let failed = protocol.pending.drain().count();
        drop(protocol);

        crate::debug_info!(
            "TMUX",
            "Control mode disconnected, {} pending commands failed",
            failed
        );
        let _ = self.events.send(TmuxEvent::Disconnected);
    }

    // =========================================================================
    // Output receivers
    // =========================================================================

    /// Route `%output` for `pane_id` to `receiver`, replacing any previous one.
    pub fn register_output_receiver(
        &self,
        pane_id: PaneId,
        receiver: impl Fn(&[u8]) + Send + Sync + 'static,
    ) {
        self.protocol
            .lock()
            .receivers
            .insert(pane_id, Arc::new(receiver));
    }

    pub fn unregister_output_receiver(&self, pane_id: PaneId) {
        self.protocol.lock().receivers.remove(&pane_id);
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Send a raw command and wait for its reply lines.
    pub async fn command(&self, command: &str) -> Result<Vec<String>> {
        let (sender, receiver) = oneshot::channel();

        {
            let mut writer = self.writer.lock().await;
            let mut line = {
                let mut protocol = self.protocol.lock();
                if !protocol.connected {
                    return Err(TmuxError::Disconnected);
                }
                if let Err(e) = protocol.pending.put(PendingCommand {
                    command: command.to_string(),
                    sender,
                }) {
                    crate::debug_error!("TMUX", "Cannot send '{}': {}", command, e);
                    return Err(e);
                }
                std::mem::take(&mut protocol.unsent)
            };

            crate::debug_log!("TMUX", ">> {}", command);
            let command_start = line.len();
            line.extend_from_slice(command.as_bytes());
            line.push(b'\n');

            let mut write = PendingWrite {
                protocol: &self.protocol,
                line,
                command_start,
                written: 0,
                done: false,
            };
            let result = write.write_to(&mut *writer).await;
            write.done = true;
            if let Err(e) = result {
                // The queued entry can never be answered; the stream is unusable
                crate::debug_error!("TMUX", "Failed to write '{}': {}", command, e);
                drop(write);
                drop(writer);
                self.disconnect();
                return Err(TmuxError::Io(e));
            }
        }

        let reply = match self.command_timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(reply) => reply,
                Err(_) => {
                    crate::debug_error!("TMUX", "'{}' timed out", command);
                    return Err(TmuxError::Timeout {
                        command: command.to_string(),
                        timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            },
            None => receiver.await,
        };

        match reply {
            Ok(Ok(lines)) => Ok(lines),
            Ok(Err(lines)) => {
                crate::debug_error!("TMUX", "'{}' failed: {:?}", command, lines);
                Err(TmuxError::Command {
                    command: command.to_string(),
                    lines,
                })
            }
            Err(_) => Err(TmuxError::Disconnected),
        }
    }

    async fn execute(&self, command: TmuxCommand) -> Result<Vec<String>> {
        self.command(command.as_str()).await
    }

    /// Type `text` into a pane verbatim.
    pub async fn send_literal(&self, pane_id: PaneId, text: &str) -> Result<()> {
        self.execute(TmuxCommand::send_literal(pane_id, text))
            .await
            .map(drop)
    }

    /// Send key names such as `Enter` or `C-c` to a pane.
    pub async fn send_special(&self, pane_id: PaneId, keys: &str) -> Result<()> {
        self.execute(TmuxCommand::send_keys(pane_id, keys))
            .await
            .map(drop)
    }

    pub async fn select_pane(&self, pane_id: PaneId) -> Result<()> {
        self.execute(TmuxCommand::select_pane(pane_id)).await.map(drop)
    }

    pub async fn select_window(&self, window_id: WindowId) -> Result<()> {
        self.execute(TmuxCommand::select_window(window_id))
            .await
            .map(drop)
    }

    pub async fn resize_window(&self, size: Size) -> Result<()> {
        self.execute(TmuxCommand::resize_window(size)).await.map(drop)
    }

    pub async fn resize_pane(&self, pane_id: PaneId, size: Size) -> Result<()> {
        self.execute(TmuxCommand::resize_pane(pane_id, size))
            .await
            .map(drop)
    }

    pub async fn refresh_client_size(&self, size: Size) -> Result<()> {
        self.execute(TmuxCommand::refresh_client_size(size))
            .await
            .map(drop)
    }

    /// Size of the current window.
    pub async fn window_size(&self) -> Result<Size> {
        let command = TmuxCommand::window_size();
        let lines = self.execute(command.clone()).await?;
        listing::parse_window_size(&lines).ok_or_else(|| TmuxError::UnexpectedReply {
            command: command.as_str().to_string(),
            reason: format!("expected '<rows> <cols>', got {:?}", lines.first()),
        })
    }

    /// Every pane in the session, keyed by id. Malformed lines are dropped.
    pub async fn list_panes(&self) -> Result<BTreeMap<PaneId, Pane>> {
        let lines = self.execute(TmuxCommand::list_panes()).await?;
        Ok(listing::parse_pane_listing(&lines))
    }

    /// Every window in the session with its layout resolved against `panes`.
    pub async fn list_windows(&self, panes: &BTreeMap<PaneId, Pane>) -> Result<Vec<Window>> {
        let lines = self.execute(TmuxCommand::list_windows()).await?;
        listing::parse_window_listing(&lines)
            .into_iter()
            .map(|line| -> Result<Window> {
                let root = parse_window_layout(&line.layout, panes)?;
                Ok(Window {
                    id: line.id,
                    cols: line.cols,
                    rows: line.rows,
                    name: line.name,
                    active: line.active,
                    root,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;

    fn client() -> (
        Arc<TmuxCtrl>,
        mpsc::UnboundedReceiver<TmuxEvent>,
        tokio::io::BufReader<tokio::io::DuplexStream>,
    ) {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (ctrl, events) = TmuxCtrl::new(ours, &TmuxConfig::default());
        (Arc::new(ctrl), events, tokio::io::BufReader::new(theirs))
    }

    async fn next_command(wire: &mut tokio::io::BufReader<tokio::io::DuplexStream>) -> String {
        let mut line = String::new();
        wire.read_line(&mut line).await.unwrap();
        line.trim_end().to_string()
    }

    #[tokio::test]
    async fn test_begin_end_resolves_pending() {
        let (ctrl, _events, mut wire) = client();
        let task = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.command("display-message -p hello").await }
        });
        assert_eq!(next_command(&mut wire).await, "display-message -p hello");

        ctrl.feed(b"%begin 1 1 0\r\nhello\r\n%end 1 1 0\r\n");
        assert_eq!(task.await.unwrap().unwrap(), vec!["hello".to_string()]);
        assert_eq!(ctrl.pending_commands(), 0);
    }

    #[test]
    fn test_unmatched_end_is_dropped() {
        let (ctrl, _events, _wire) = client();
        ctrl.feed(b"%begin 1 1 0\nstray\n%end 1 1 0\n");
        assert!(matches!(ctrl.protocol.lock().state, BlockState::Idle));
    }

    #[test]
    fn test_block_lines_are_not_notifications() {
        let (ctrl, mut events, _wire) = client();
        ctrl.feed(b"%begin 1 1 0\n%layout-change @1 x\n%end 1 1 0\n%layout-change @1 y\n");
        assert_eq!(events.try_recv().unwrap(), TmuxEvent::LayoutChange);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_output_routed_to_receiver() {
        let (ctrl, _events, _wire) = client();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        ctrl.register_output_receiver(3, move |data| sink.lock().extend_from_slice(data));

        ctrl.feed(b"%output %3 a\\062b\n%output %4 ignored\n");
        assert_eq!(seen.lock().as_slice(), b"a2b");

        ctrl.unregister_output_receiver(3);
        ctrl.feed(b"%output %3 more\n");
        assert_eq!(seen.lock().as_slice(), b"a2b");
    }

    #[test]
    fn test_malformed_notification_does_not_stop_stream() {
        let (ctrl, mut events, _wire) = client();
        ctrl.feed(b"%window-pane-changed @x\n\n%window-add @4\n");
        assert_eq!(
            events.try_recv().unwrap(),
            TmuxEvent::WindowAdd { window_id: 4 }
        );
    }

    /// A client whose pipe holds only a few bytes, so writes stall until read.
    fn narrow_client() -> (Arc<TmuxCtrl>, tokio::io::BufReader<tokio::io::DuplexStream>) {
        let (ours, theirs) = tokio::io::duplex(8);
        let (ctrl, _events) = TmuxCtrl::new(ours, &TmuxConfig::default());
        (Arc::new(ctrl), tokio::io::BufReader::new(theirs))
    }

    async fn abandon(ctrl: &TmuxCtrl, command: &str) {
        let cut_short =
            tokio::time::timeout(Duration::from_millis(20), ctrl.command(command)).await;
        assert!(cut_short.is_err(), "'{command}' was not cut short");
    }

    #[tokio::test]
    async fn test_write_cancelled_midway_is_finished_by_next_command() {
        let (ctrl, mut wire) = narrow_client();
        abandon(&ctrl, "display-message -p first").await;
        // Part of the line reached tmux, so a reply will come for it
        assert_eq!(ctrl.pending_commands(), 1);

        let second = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.command("display-message -p second").await }
        });
        assert_eq!(next_command(&mut wire).await, "display-message -p first");
        assert_eq!(next_command(&mut wire).await, "display-message -p second");

        ctrl.feed(b"%begin 1 1 0\nfirst\n%end 1 1 0\n%begin 1 2 0\nsecond\n%end 1 2 0\n");
        assert_eq!(second.await.unwrap().unwrap(), vec!["second".to_string()]);
        assert_eq!(ctrl.pending_commands(), 0);
    }

    #[tokio::test]
    async fn test_command_cancelled_before_writing_is_withdrawn() {
        let (ctrl, mut wire) = narrow_client();
        abandon(&ctrl, "display-message -p first").await;
        // Stalls behind the unfinished first line without writing its own bytes
        abandon(&ctrl, "display-message -p never").await;
        assert_eq!(ctrl.pending_commands(), 1);

        let third = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.command("display-message -p third").await }
        });
        assert_eq!(next_command(&mut wire).await, "display-message -p first");
        assert_eq!(next_command(&mut wire).await, "display-message -p third");

        ctrl.feed(b"%begin 1 1 0\nfirst\n%end 1 1 0\n%begin 1 2 0\nthird\n%end 1 2 0\n");
        assert_eq!(third.await.unwrap().unwrap(), vec!["third".to_string()]);
    }

    #[tokio::test]
    async fn test_run_eof_fails_pending() {
        let (ctrl, mut events, mut wire) = client();
        let task = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.command("list-panes").await }
        });
        next_command(&mut wire).await;

        ctrl.run(tokio::io::empty()).await.unwrap();
        assert!(matches!(
            task.await.unwrap(),
            Err(TmuxError::Disconnected)
        ));
        assert!(!ctrl.is_connected());
        assert_eq!(events.recv().await, Some(TmuxEvent::Disconnected));
        assert!(matches!(
            ctrl.command("list-panes").await,
            Err(TmuxError::Disconnected)
        ));
    }
}
