//! Shared integration test helpers for par-tmux.
//!
//! [`FakeTmux`] plays the tmux side of a control mode connection: it reads
//! each command the client writes, records it, and feeds back a reply block
//! chosen by a responder closure.
//!
//! ```ignore
//! mod common;
//! use common::{FakeTmux, Reply};
//! ```

#![allow(dead_code)]

use par_tmux::config::TmuxConfig;
use par_tmux::tmux::{TmuxCtrl, TmuxEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

/// What the fake server does with one command
pub enum Reply {
    End(Vec<String>),
    Error(Vec<String>),
    /// Never answer
    Silent,
}

impl Reply {
    pub fn empty() -> Self {
        Reply::End(Vec::new())
    }

    pub fn lines(lines: &[&str]) -> Self {
        Reply::End(lines.iter().map(|l| l.to_string()).collect())
    }
}

pub struct FakeTmux {
    pub ctrl: Arc<TmuxCtrl>,
    pub events: mpsc::UnboundedReceiver<TmuxEvent>,
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl FakeTmux {
    /// Start a client and a server task answering with `respond`.
    pub fn spawn<F>(config: &TmuxConfig, respond: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + 'static,
    {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let (ctrl, events) = TmuxCtrl::new(ours, config);
        let ctrl = Arc::new(ctrl);
        let commands = Arc::new(Mutex::new(Vec::new()));

        let server_ctrl = Arc::clone(&ctrl);
        let server_commands = Arc::clone(&commands);
        tokio::spawn(async move {
            let mut wire = tokio::io::BufReader::new(theirs);
            let mut serial = 0u64;
            loop {
                let mut line = String::new();
                match wire.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let command = line.trim_end().to_string();
                server_commands.lock().push(command.clone());

                serial += 1;
                let (lines, terminator) = match respond(&command) {
                    Reply::End(lines) => (lines, "%end"),
                    Reply::Error(lines) => (lines, "%error"),
                    Reply::Silent => continue,
                };
                let mut block = format!("%begin 1700000000 {serial} 1\n");
                for l in lines {
                    block.push_str(&l);
                    block.push('\n');
                }
                block.push_str(&format!("{terminator} 1700000000 {serial} 1\n"));
                server_ctrl.feed(block.as_bytes());
            }
        });

        Self {
            ctrl,
            events,
            commands,
        }
    }

    /// Hand the notification stream to an event loop.
    pub fn take_events(&mut self) -> mpsc::UnboundedReceiver<TmuxEvent> {
        let (_closed, empty) = mpsc::unbounded_channel();
        std::mem::replace(&mut self.events, empty)
    }

    /// Commands received so far, in order.
    pub fn received(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    /// Wait until a command starting with `prefix` has been received.
    pub async fn wait_for_command(&self, prefix: &str) {
        for _ in 0..200 {
            if self.commands.lock().iter().any(|c| c.starts_with(prefix)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("command '{prefix}' never arrived; got {:?}", self.received());
    }
}

/// Config with a short resize settle delay so tests run quickly.
pub fn fast_config() -> TmuxConfig {
    TmuxConfig {
        resize_settle_ms: 100,
        ..TmuxConfig::default()
    }
}
