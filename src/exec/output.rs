// src/exec/output.rs

//! Shared, lock-protected writer for child output.
//!
//! Every reader task funnels its lines through one [`OutputMux`]. The lock is
//! held for exactly one rendered line, so lines from different processes may
//! interleave with each other but never inside a line.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use owo_colors::{AnsiColors, OwoColorize, Style};

/// Slot markers. Index 0 means "no colour" and is what a single-process run
/// uses; larger slots wrap around.
const PALETTE: [Option<AnsiColors>; 16] = [
    None,
    Some(AnsiColors::Blue),
    Some(AnsiColors::Cyan),
    Some(AnsiColors::Green),
    Some(AnsiColors::BrightBlack),
    Some(AnsiColors::BrightBlue),
    Some(AnsiColors::BrightCyan),
    Some(AnsiColors::BrightGreen),
    Some(AnsiColors::BrightMagenta),
    Some(AnsiColors::BrightRed),
    Some(AnsiColors::BrightWhite),
    Some(AnsiColors::BrightYellow),
    Some(AnsiColors::Magenta),
    Some(AnsiColors::Red),
    Some(AnsiColors::White),
    Some(AnsiColors::Yellow),
];

pub const PALETTE_SIZE: usize = PALETTE.len();

type Sink = Box<dyn Write + Send>;

#[derive(Clone)]
pub struct OutputMux {
    sink: Arc<Mutex<Sink>>,
    colored: bool,
}

impl fmt::Debug for OutputMux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputMux")
            .field("colored", &self.colored)
            .finish_non_exhaustive()
    }
}

impl OutputMux {
    pub fn new<W>(sink: W, colored: bool) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            sink: Arc::new(Mutex::new(Box::new(sink))),
            colored,
        }
    }

    /// Multiplexer writing to the process's stdout.
    pub fn stdout(colored: bool) -> Self {
        Self::new(io::stdout(), colored)
    }

    /// Write one line, optionally prefixed with `pid: `.
    ///
    /// `line` is written as given, including its trailing newline if it has
    /// one.
    pub fn emit(&self, slot: usize, line: &str, pid_prefix: Option<u32>) -> io::Result<()> {
        let rendered = self.render(slot, line, pid_prefix);

        let mut sink = self
            .sink
            .lock()
            .map_err(|_| io::Error::other("output sink lock poisoned"))?;
        sink.write_all(rendered.as_bytes())?;
        sink.flush()
    }

    fn render(&self, slot: usize, line: &str, pid_prefix: Option<u32>) -> String {
        let color = if self.colored { marker_for(slot) } else { None };
        let (body, newline) = split_newline(line);

        let mut out = String::with_capacity(line.len() + 24);
        if let Some(pid) = pid_prefix {
            match color {
                Some(c) => out.push_str(&format!("{}: ", pid.style(Style::new().color(c).bold()))),
                None => out.push_str(&format!("{pid}: ")),
            }
        }
        match color {
            Some(c) if !body.is_empty() => out.push_str(&body.color(c).to_string()),
            _ => out.push_str(body),
        }
        out.push_str(newline);
        out
    }
}

/// Colour assigned to `slot`, cycling through the palette.
pub fn marker_for(slot: usize) -> Option<AnsiColors> {
    PALETTE[slot % PALETTE_SIZE]
}

fn split_newline(line: &str) -> (&str, &str) {
    match line.strip_suffix('\n') {
        Some(body) => (body, &line[body.len()..]),
        None => (line, ""),
    }
}
