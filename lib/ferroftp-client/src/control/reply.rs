/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use crate::error::FtpReplyFormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpReplyClass {
    /// 1yz
    Preliminary,
    /// 2yz
    Complete,
    /// 3yz
    Intermediate,
    /// 4yz
    TransientError,
    /// 5yz
    PermanentError,
}

impl FtpReplyClass {
    pub fn from_code(code: u16) -> Option<Self> {
        match code / 100 {
            1 => Some(FtpReplyClass::Preliminary),
            2 => Some(FtpReplyClass::Complete),
            3 => Some(FtpReplyClass::Intermediate),
            4 => Some(FtpReplyClass::TransientError),
            5 => Some(FtpReplyClass::PermanentError),
            _ => None,
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            FtpReplyClass::TransientError | FtpReplyClass::PermanentError
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpReply {
    code: u16,
    class: FtpReplyClass,
    lines: Vec<String>,
}

impl FtpReply {
    #[inline]
    pub fn code(&self) -> u16 {
        self.code
    }

    #[inline]
    pub fn class(&self) -> FtpReplyClass {
        self.class
    }

    #[inline]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The text of the first (or only) line, without the reply code.
    pub fn first_line(&self) -> &str {
        self.lines.first().map(|s| s.as_str()).unwrap_or_default()
    }

    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    #[inline]
    pub fn is_multi_line(&self) -> bool {
        self.lines.len() > 1
    }
}

#[derive(Debug)]
pub enum FtpPartialReply {
    Pending,
    Complete(FtpReply),
}

struct FtpMultiLineState {
    code: u16,
    lines: Vec<String>,
}

/// Accumulates control channel lines into complete replies.
///
/// Line terminators are stripped before parsing, so both raw `\r\n`
/// terminated lines and already trimmed lines can be fed in.
pub struct FtpReplyParser {
    max_lines: usize,
    multi_line: Option<FtpMultiLineState>,
}

macro_rules! char_to_u16 {
    ($c:expr) => {
        ($c - b'0') as u16
    };
}

fn strip_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_code(line: &[u8]) -> Option<u16> {
    if line.len() < 3 || !line[..3].iter().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(char_to_u16!(line[0]) * 100 + char_to_u16!(line[1]) * 10 + char_to_u16!(line[2]))
}

fn to_message(msg: &[u8]) -> Result<String, FtpReplyFormatError> {
    let msg = std::str::from_utf8(msg).map_err(|_| FtpReplyFormatError::LineIsNotUtf8)?;
    // do not trim whitespace at beginning
    Ok(msg.trim_end().to_string())
}

impl FtpReplyParser {
    pub fn new(max_lines: usize) -> Self {
        FtpReplyParser {
            max_lines,
            multi_line: None,
        }
    }

    /// Returns true if a multi-line reply has been opened but not terminated.
    #[inline]
    pub fn in_multi_line(&self) -> bool {
        self.multi_line.is_some()
    }

    pub fn feed_line(&mut self, line: &[u8]) -> Result<FtpPartialReply, FtpReplyFormatError> {
        let line = strip_line_end(line);
        match self.multi_line.take() {
            Some(state) => self.feed_extra_line(state, line),
            None => self.feed_first_line(line),
        }
    }

    fn feed_first_line(&mut self, line: &[u8]) -> Result<FtpPartialReply, FtpReplyFormatError> {
        let code = parse_code(line).ok_or(FtpReplyFormatError::InvalidLineFormat)?;
        let class =
            FtpReplyClass::from_code(code).ok_or(FtpReplyFormatError::InvalidReplyCode(code))?;

        match line.get(3) {
            None => Ok(FtpPartialReply::Complete(FtpReply {
                code,
                class,
                lines: vec![String::new()],
            })),
            Some(b' ') => Ok(FtpPartialReply::Complete(FtpReply {
                code,
                class,
                lines: vec![to_message(&line[4..])?],
            })),
            Some(b'-') => {
                let mut lines = Vec::with_capacity(4);
                lines.push(to_message(&line[4..])?);
                self.multi_line = Some(FtpMultiLineState { code, lines });
                Ok(FtpPartialReply::Pending)
            }
            Some(_) => Err(FtpReplyFormatError::InvalidLineFormat),
        }
    }

    fn feed_extra_line(
        &mut self,
        mut state: FtpMultiLineState,
        line: &[u8],
    ) -> Result<FtpPartialReply, FtpReplyFormatError> {
        if state.lines.len() >= self.max_lines {
            return Err(FtpReplyFormatError::TooManyLines);
        }

        // a bare code does not terminate, it is kept as text
        let prefixed = parse_code(line).and_then(|code| match line.get(3) {
            Some(b' ') => Some((code, b' ')),
            Some(b'-') => Some((code, b'-')),
            _ => None,
        });
        match prefixed {
            Some((code, _)) if code != state.code => {
                Err(FtpReplyFormatError::CodeMismatch(state.code, code))
            }
            Some((_, b' ')) => {
                state.lines.push(to_message(line.get(4..).unwrap_or_default())?);
                let class = FtpReplyClass::from_code(state.code)
                    .ok_or(FtpReplyFormatError::InvalidReplyCode(state.code))?;
                Ok(FtpPartialReply::Complete(FtpReply {
                    code: state.code,
                    class,
                    lines: state.lines,
                }))
            }
            Some(_) => {
                state.lines.push(to_message(&line[4..])?);
                self.multi_line = Some(state);
                Ok(FtpPartialReply::Pending)
            }
            None => {
                // free text lines are allowed inside multi-line replies
                state.lines.push(to_message(line)?);
                self.multi_line = Some(state);
                Ok(FtpPartialReply::Pending)
            }
        }
    }
}
