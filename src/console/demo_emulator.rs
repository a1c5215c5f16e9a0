//! In-memory pseudo-shell used when no container tool is available.
//!
//! The emulator speaks the same event contract as a real shell but interprets nothing:
//! Enter prints a canned response and a fresh prompt, backspace is echoed as an erase
//! sequence and printable characters are echoed back. Escape sequences such as arrow keys
//! are swallowed whole.

use log::{debug, warn};
use std::time::Duration;

use crate::console::backend::{BackendEvent, EventSender, ShellBackend};
use crate::session_management::SessionMode;

const BACKSPACE_ERASE: &str = "\x08 \x08";

/// Where the scanner is inside a terminal escape sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Escape {
    None,
    /// Just saw ESC.
    Start,
    /// Inside a CSI (`ESC [`) or SS3 (`ESC O`) sequence, waiting for the final byte.
    Sequence,
}

pub struct DemoEmulator {
    target: String,
    events: EventSender,
    line: String,
}

impl DemoEmulator {
    /// Creates the emulator and immediately emits the welcome banner and first prompt.
    pub fn new(target: &str, events: EventSender) -> Self {
        let emulator = Self {
            target: target.to_string(),
            events,
            line: String::new(),
        };
        emulator.emit(format!(
            "\r\n\x1b[32mDemo Mode - Connected to container: {}\x1b[0m\r\n\
             \x1b[33mNote: This is a demo environment. LXC commands are simulated.\x1b[0m\r\n{}",
            emulator.target,
            emulator.prompt()
        ));
        emulator
    }

    pub fn prompt(&self) -> String {
        format!("user@{}:~$ ", self.target)
    }

    fn emit(&self, text: String) {
        if text.is_empty() {
            return;
        }
        if let Err(e) = self.events.try_send(BackendEvent::Output(text)) {
            warn!("[demo:{}] dropping output: {}", self.target, e);
        }
    }
}

impl ShellBackend for DemoEmulator {
    fn mode(&self) -> SessionMode {
        SessionMode::Demo
    }

    fn write(&mut self, data: &str) {
        // Each frame is scanned on its own: CR LF collapses only within one frame.
        let mut echo = String::new();
        let mut last_was_cr = false;
        let mut escape = Escape::None;

        for c in data.chars() {
            match escape {
                Escape::Start => {
                    escape = if c == '[' || c == 'O' {
                        Escape::Sequence
                    } else {
                        Escape::None
                    };
                    continue;
                }
                Escape::Sequence => {
                    if ('@'..='~').contains(&c) {
                        escape = Escape::None;
                    }
                    continue;
                }
                Escape::None => {}
            }

            match c {
                '\x1b' => escape = Escape::Start,
                '\n' if last_was_cr => {}
                '\r' | '\n' => {
                    debug!("[demo:{}] command: {:?}", self.target, self.line);
                    self.line.clear();
                    echo.push_str("\r\nDemo command executed\r\n");
                    echo.push_str(&self.prompt());
                }
                '\u{7f}' | '\u{8}' => {
                    self.line.pop();
                    echo.push_str(BACKSPACE_ERASE);
                }
                c if !c.is_control() => {
                    self.line.push(c);
                    echo.push(c);
                }
                _ => {}
            }
            last_was_cr = c == '\r';
        }

        self.emit(echo);
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        debug!("[demo:{}] ignoring resize to {}x{}", self.target, cols, rows);
    }

    fn startup_timeout(&self) -> Option<Duration> {
        None
    }

    fn terminate(&mut self) {
        debug!("[demo:{}] emulator released", self.target);
    }
}
