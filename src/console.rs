//! Console access for the emulated machine.
//!
//! The LC-3 talks to its terminal two ways: through the memory-mapped
//! keyboard registers (polled, non-blocking) and through the character
//! trap routines (blocking). Both go through the [`Console`] trait so the
//! CPU core never touches the real terminal directly and tests can run
//! against a scripted console.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

/// Character-level console capability used by the CPU.
pub trait Console {
    /// Non-blocking check for pending keyboard input.
    fn poll_available(&mut self) -> io::Result<bool>;

    /// Blocking read of one character. Does not echo.
    fn read_char(&mut self) -> io::Result<u8>;

    /// Write one character to the display.
    fn write_char(&mut self, ch: u8) -> io::Result<()>;

    /// Flush buffered display output.
    fn flush(&mut self) -> io::Result<()>;

    /// Write every byte of `s` to the display.
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        for ch in s.bytes() {
            self.write_char(ch)?;
        }
        Ok(())
    }
}

/// Puts the terminal into raw mode and guarantees it is restored when
/// dropped, so a fatal CPU error or a normal HALT both leave the shell
/// usable.
struct RawModeGuard;

impl RawModeGuard {
    fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// The real terminal, in raw mode for the lifetime of the value.
///
/// Keyboard input comes from crossterm events; Ctrl-C is not delivered as
/// a signal in raw mode, so it is intercepted here, the terminal restored,
/// and the process terminated.
pub struct RawConsole {
    _guard: RawModeGuard,
    out: io::Stdout,
    /// A key consumed while polling, waiting to be read.
    pending: Option<u8>,
}

impl RawConsole {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            _guard: RawModeGuard::new()?,
            out: io::stdout(),
            pending: None,
        })
    }

    /// Map a key event to the byte the machine sees, if any.
    fn key_byte(key: KeyEvent) -> Option<u8> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char('c') = key.code {
                // Interrupt: restore the terminal before dying, since
                // process::exit will not run the guard's drop.
                let _ = terminal::disable_raw_mode();
                std::process::exit(130);
            }
        }
        match key.code {
            KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
            KeyCode::Enter => Some(b'\n'),
            KeyCode::Tab => Some(b'\t'),
            KeyCode::Backspace => Some(0x08),
            KeyCode::Esc => Some(0x1b),
            _ => None,
        }
    }
}

impl Console for RawConsole {
    fn poll_available(&mut self) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        // Drain non-key events (resize etc.) so they can never make the
        // status register lie about a pending character.
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if let Some(ch) = Self::key_byte(key) {
                    self.pending = Some(ch);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn read_char(&mut self) -> io::Result<u8> {
        if let Some(ch) = self.pending.take() {
            return Ok(ch);
        }
        loop {
            if let Event::Key(key) = event::read()? {
                if let Some(ch) = Self::key_byte(key) {
                    return Ok(ch);
                }
            }
        }
    }

    fn write_char(&mut self, ch: u8) -> io::Result<()> {
        // Raw mode disables output post-processing, so newline needs an
        // explicit carriage return.
        if ch == b'\n' {
            self.out.write_all(b"\r\n")
        } else {
            self.out.write_all(&[ch])
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Deterministic console for tests: input comes from a pre-loaded script,
/// output accumulates in a buffer.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a console with `input` queued as pending keystrokes.
    pub fn with_input(input: &str) -> Self {
        Self {
            input: input.bytes().collect(),
            output: Vec::new(),
        }
    }

    /// Everything the machine has written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output interpreted as UTF-8, replacing invalid bytes.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl Console for ScriptedConsole {
    fn poll_available(&mut self) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }

    fn read_char(&mut self) -> io::Result<u8> {
        self.input.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "scripted input exhausted")
        })
    }

    fn write_char(&mut self, ch: u8) -> io::Result<()> {
        self.output.push(ch);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_input_order() {
        let mut con = ScriptedConsole::with_input("ab");
        assert!(con.poll_available().unwrap());
        assert_eq!(con.read_char().unwrap(), b'a');
        assert_eq!(con.read_char().unwrap(), b'b');
        assert!(!con.poll_available().unwrap());
        assert!(con.read_char().is_err());
    }

    #[test]
    fn test_scripted_output_accumulates() {
        let mut con = ScriptedConsole::new();
        con.write_str("HI").unwrap();
        con.write_char(b'\n').unwrap();
        assert_eq!(con.output(), b"HI\n");
        assert_eq!(con.output_string(), "HI\n");
    }
}
