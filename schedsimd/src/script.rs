//! # Control Scripts
//!
//! Line-based command scripts for unattended runs and demos.
//!
//! ## Format
//!
//! One command per line, using the syntax of [`CommandParser`]. Blank lines
//! are skipped and `#` starts a comment, at the start of a line or after a
//! command.
//!
//! ## Example
//!
//! ```text
//! # Round robin on four cores, then switch to SJF
//! spawn 6
//! start RR
//! wait 500ms
//! algorithm SJF     # takes effect at the next dispatch
//! wait 500ms
//! stats
//! stop
//! ```

use crate::commands::{CommandError, CommandParser, ControlCommand};
use std::collections::VecDeque;
use thiserror::Error;

/// Script error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Parse error at line {line}: {source}")]
    ParseError { line: usize, source: CommandError },

    #[error("Empty script")]
    EmptyScript,
}

/// A parsed control script
#[derive(Debug, Clone, Default)]
pub struct ControlScript {
    commands: VecDeque<ControlCommand>,
}

impl ControlScript {
    /// Parses a script from text
    pub fn from_text(text: &str) -> Result<Self, ScriptError> {
        let mut commands = VecDeque::new();

        for (line_num, line) in text.lines().enumerate() {
            let line = match line.find('#') {
                Some(index) => &line[..index],
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let command = CommandParser::parse(line).map_err(|source| ScriptError::ParseError {
                line: line_num + 1,
                source,
            })?;
            commands.push_back(command);
        }

        if commands.is_empty() {
            return Err(ScriptError::EmptyScript);
        }

        Ok(Self { commands })
    }

    /// Returns the next command, if any
    pub fn next_command(&mut self) -> Option<ControlCommand> {
        self.commands.pop_front()
    }

    /// Returns true if the script has more commands
    pub fn has_more(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Returns the number of remaining commands
    pub fn remaining(&self) -> usize {
        self.commands.len()
    }
}
