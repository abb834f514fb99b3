//! User-facing progress lines.
//!
//! Diagnostics go through `tracing`; this is the human transcript of a run.
//! Lines go to stdout unless the run report owns stdout (`--json`).
use std::fmt::Display;
use std::io::{self, Write};

const GREEN: &str = "\x1b[0;32m";
const RED: &str = "\x1b[0;31m";
const YELLOW: &str = "\x1b[1;33m";
const BLUE: &str = "\x1b[0;34m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Step,
    Success,
    Error,
    Warning,
}

impl Level {
    fn marker(self) -> &'static str {
        match self {
            Level::Step => "▶",
            Level::Success => "✅",
            Level::Error => "❌",
            Level::Warning => "⚠️",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Level::Step => BLUE,
            Level::Success => GREEN,
            Level::Error => RED,
            Level::Warning => YELLOW,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Console {
    color: bool,
    to_stderr: bool,
}

impl Console {
    pub fn new(color: bool, to_stderr: bool) -> Self {
        Self { color, to_stderr }
    }

    pub fn step(&self, message: impl Display) {
        self.emit(&format_line(Level::Step, &message.to_string(), self.color));
    }

    pub fn success(&self, message: impl Display) {
        self.emit(&format_line(Level::Success, &message.to_string(), self.color));
    }

    pub fn error(&self, message: impl Display) {
        self.emit(&format_line(Level::Error, &message.to_string(), self.color));
    }

    pub fn warning(&self, message: impl Display) {
        self.emit(&format_line(Level::Warning, &message.to_string(), self.color));
    }

    /// Green line with no status marker.
    pub fn highlight(&self, message: impl Display) {
        self.emit(&self.highlight_line(&message.to_string()));
    }

    fn highlight_line(&self, message: &str) -> String {
        self.paint(GREEN, message)
    }

    pub fn line(&self, message: impl Display) {
        self.emit(&message.to_string());
    }

    /// Indented detail under the previous line.
    pub fn detail(&self, message: impl Display) {
        self.emit(&format!("  {message}"));
    }

    pub fn blank(&self) {
        self.emit("");
    }

    pub fn banner(&self, title: &str, success: bool) {
        let color = if success { GREEN } else { YELLOW };
        let rule = "================================";
        for line in [rule, title, rule] {
            self.emit(&self.paint(color, line));
        }
    }

    /// Question without a trailing newline; the answer is typed on the same line.
    pub fn prompt(&self, question: &str) {
        if self.to_stderr {
            eprint!("{question}");
            let _ = io::stderr().flush();
        } else {
            print!("{question}");
            let _ = io::stdout().flush();
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn emit(&self, line: &str) {
        if self.to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

pub fn format_line(level: Level, message: &str, color: bool) -> String {
    if color {
        format!("{}{}{} {}", level.color(), level.marker(), RESET, message)
    } else {
        format!("{} {}", level.marker(), message)
    }
}

/// Colour is on unless disabled by flag, `NO_COLOR`, or `TERM=dumb`.
pub fn color_enabled(no_color_flag: bool, env: &dyn Fn(&str) -> Option<String>) -> bool {
    if no_color_flag || env("NO_COLOR").is_some_and(|value| !value.is_empty()) {
        return false;
    }
    env("TERM").as_deref() != Some("dumb")
}
