//! Terminal input and output while the player runs.
//!
//! The terminal is put in raw mode so single key presses arrive without Enter. Raw
//! mode also turns off output post-processing, so anything written while it is on
//! must end lines with `\r\n`; [`CrlfWriter`] does that for log output.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Pause,
    Resume,
    TogglePause,
    Quit,
}

/// Map a key press to a player command.
pub fn map_key(key: &KeyEvent) -> Option<InputEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(InputEvent::Quit);
    }
    match key.code {
        KeyCode::Char('p') => Some(InputEvent::Pause),
        KeyCode::Char('r') => Some(InputEvent::Resume),
        KeyCode::Char(' ') => Some(InputEvent::TogglePause),
        KeyCode::Char('q') | KeyCode::Esc => Some(InputEvent::Quit),
        _ => None,
    }
}

/// Wait up to `timeout` for a terminal event and map it.
pub fn poll_input(timeout: Duration) -> Result<Option<InputEvent>> {
    if !event::poll(timeout).context("[Input] poll terminal events")? {
        return Ok(None);
    }
    match event::read().context("[Input] read terminal event")? {
        CEvent::Key(k) => Ok(map_key(&k)),
        _ => Ok(None),
    }
}

/// Keeps the terminal in raw mode until dropped.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        enable_raw_mode().context("[Input] enable raw mode")?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        disable_raw_mode().ok();
    }
}

/// Rewrites `\n` as `\r\n`.
pub struct CrlfWriter<W>(pub W);

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for (i, line) in buf.split(|&b| b == b'\n').enumerate() {
            if i > 0 {
                self.0.write_all(b"\r\n")?;
            }
            self.0.write_all(line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// One-line "now playing" notice, e.g. `Now playing [2/5]: b.flac (3:07)`.
pub fn announce(
    out: &mut impl Write,
    number: usize,
    total: usize,
    title: &str,
    duration_ms: Option<u64>,
) -> io::Result<()> {
    write!(out, "Now playing [{number}/{total}]: {title}")?;
    if let Some(ms) = duration_ms {
        let secs = ms / 1000;
        write!(out, " ({}:{:02})", secs / 60, secs % 60)?;
    }
    write!(out, "\r\n")?;
    out.flush()
}

pub fn print_keys(out: &mut impl Write) -> io::Result<()> {
    write!(out, "Keys: p pause, r resume, space toggle, q quit\r\n")?;
    out.flush()
}
