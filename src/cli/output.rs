use console::style;
use serde::Serialize;

use crate::error::{PopgateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Styled key/value output for terminals.
    #[default]
    Human,
    /// Unstyled `key: value` lines.
    Plain,
    /// Pretty-printed JSON on stdout.
    Json,
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| PopgateError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
    styled: bool,
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
            styled: true,
        }
    }

    #[must_use]
    pub const fn plain() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
            styled: false,
        }
    }

    #[must_use]
    pub const fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Plain => Self::plain(),
            OutputFormat::Human | OutputFormat::Json => Self::new(),
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        if self.styled {
            self.lines.push(style(text).bold().to_string());
            self.lines.push(String::new());
        }
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        if self.styled {
            self.lines.push(style(text).bold().to_string());
            self.lines.push("-".repeat(text.len().max(3)));
        } else {
            self.lines.push(format!("[{text}]"));
        }
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        if self.styled {
            let padded = format!("{key:width$}", width = self.key_width);
            self.lines.push(format!("{} {value}", style(padded).dim()));
        } else {
            self.lines.push(format!("{key}: {value}"));
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}
