//! AT-command parsing for the RFCOMM control channel (spec §4.9.1,
//! component C9's front end).
//!
//! HFP/HSP run a restricted dialect of the Hayes AT command set over
//! RFCOMM: commands are always prefixed `AT`, and carry one of three
//! shapes (`TEST`, `SET`, `GET`) depending on what follows `=`/`?`.

use thiserror::Error;

/// Longest value `AtCommand::parse` will accept after `=`, matching
/// spec.md §3's "bounded to 63 bytes" invariant.
pub const MAX_VALUE_LEN: usize = 63;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AtError {
    #[error("command does not start with AT")]
    MissingPrefix,
    #[error("command has neither '=' nor '?'")]
    NoTypeMarker,
    #[error("command name is empty")]
    EmptyCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtType {
    Set,
    Get,
    Test,
}

/// A parsed AT command: `AT<name><type-marker>[value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    pub kind: AtType,
    pub name: String,
    pub value: String,
}

impl AtCommand {
    /// Parse one line of input per spec.md §4.9.1:
    ///
    /// 1. Trim leading/trailing whitespace.
    /// 2. Require the case-insensitive `AT` prefix.
    /// 3. Locate `=`:
    ///    - followed immediately by `?` -> TEST, name = text between
    ///      `AT` and `=`, value empty.
    ///    - otherwise -> SET, value = text after `=` (truncated to
    ///      [`MAX_VALUE_LEN`] bytes).
    /// 4. If no `=`, locate `?` -> GET, name = text between `AT` and
    ///    `?`.
    /// 5. If neither `=` nor `?` is present, reject.
    pub fn parse(input: &str) -> Result<Self, AtError> {
        let trimmed = input.trim();
        if trimmed.len() < 2 || !trimmed[..2].eq_ignore_ascii_case("AT") {
            return Err(AtError::MissingPrefix);
        }
        let rest = &trimmed[2..];

        if let Some(eq_pos) = rest.find('=') {
            let name = rest[..eq_pos].to_string();
            if name.is_empty() {
                return Err(AtError::EmptyCommand);
            }
            let after_eq = &rest[eq_pos + 1..];
            if after_eq.trim_start().starts_with('?') {
                return Ok(Self {
                    kind: AtType::Test,
                    name,
                    value: String::new(),
                });
            }
            let mut value = after_eq.to_string();
            value.truncate(MAX_VALUE_LEN);
            return Ok(Self {
                kind: AtType::Set,
                name,
                value,
            });
        }

        if let Some(q_pos) = rest.find('?') {
            let name = rest[..q_pos].to_string();
            if name.is_empty() {
                return Err(AtError::EmptyCommand);
            }
            return Ok(Self {
                kind: AtType::Get,
                name,
                value: String::new(),
            });
        }

        Err(AtError::NoTypeMarker)
    }

    /// Frame a solicited command the AG sends to the HF, per spec.md §4.9:
    /// `<text>\r`.
    pub fn frame_request(text: &str) -> String {
        format!("{text}\r")
    }

    /// Frame an unsolicited/solicited response the AG sends back, per
    /// spec.md §4.9: `\r\n<text>\r\n`.
    pub fn frame_response(text: &str) -> String {
        format!("\r\n{text}\r\n")
    }
}
