//! Line-oriented console front end
//!
//! Stdin is read on a plain thread so a blocked read never holds up runtime shutdown. Lines
//! reach the session through an unbounded channel and are picked up once per peer-loop
//! iteration. `/quit` requests a shutdown, `/who` lists the members seen so far.

use std::io::{BufRead, Write};
use std::sync::Arc;

use lanchat_core::core_chat::{ChatFrontend, SessionObserver};
use lanchat_core::shutdown::{ShutdownCoordinator, ShutdownReason};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const QUIT_COMMAND: &str = "/quit";
pub const WHO_COMMAND: &str = "/who";

/// Forward stdin lines to the session; end of input or `/quit` shuts the session down
/// Commands match with surrounding whitespace ignored
fn is_command(line: &str, command: &str) -> bool {
    line.trim() == command
}

pub fn spawn_stdin_reader(shutdown: Arc<ShutdownCoordinator>) -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let runtime = Handle::current();

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            };

            if is_command(&line, QUIT_COMMAND) {
                break;
            }
            if tx.send(line).is_err() {
                return;
            }
        }

        debug!("console input finished");
        runtime.block_on(shutdown.shutdown(ShutdownReason::UserQuit));
    });

    rx
}

pub struct ConsoleFrontend<W: Write> {
    input: mpsc::UnboundedReceiver<String>,
    out: W,
    members: Vec<String>,
}

impl<W: Write> ConsoleFrontend<W> {
    pub fn new(input: mpsc::UnboundedReceiver<String>, out: W) -> Self {
        Self {
            input,
            out,
            members: Vec::new(),
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn notice(&mut self, text: &str) {
        self.line(format_args!("* {}", text));
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{}", args).and_then(|_| self.out.flush()) {
            warn!(error = %e, "console write failed");
        }
    }

    fn print_members(&mut self) {
        let list = self.members.join(", ");
        let count = self.members.len();
        self.line(format_args!("* {} online: {}", count, list));
    }
}

impl<W: Write> SessionObserver for ConsoleFrontend<W> {
    fn on_member_joined(&mut self, name: &str) {
        self.members.push(name.to_string());
        self.line(format_args!("* {} joined", name));
    }

    fn on_member_left(&mut self, name: &str) {
        if let Some(pos) = self.members.iter().position(|m| m == name) {
            self.members.remove(pos);
        }
        self.line(format_args!("* {} left", name));
    }

    fn on_message(&mut self, sender: &str, text: &str) {
        self.line(format_args!("<{}> {}", sender, text));
    }

    fn on_peer_gone(&mut self) {
        self.members.clear();
    }
}

impl<W: Write> ChatFrontend for ConsoleFrontend<W> {
    fn take_pending_outbound_text(&mut self) -> Option<String> {
        loop {
            let line = self.input.try_recv().ok()?;
            if is_command(&line, WHO_COMMAND) {
                self.print_members();
                continue;
            }
            let text = line.trim_end();
            if text.trim_start().is_empty() {
                continue;
            }
            return Some(text.to_string());
        }
    }
}
