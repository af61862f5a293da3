//! # Control Commands
//!
//! The command surface a front-end uses to drive a simulation.
//!
//! ## Command Set
//!
//! - `start [algorithm]` - Start the multi-core scheduler
//! - `stop` - Stop the multi-core scheduler and clear its run
//! - `algorithm <name>` - Switch the live scheduling algorithm
//! - `spawn [count]` - Add random NEW processes
//! - `block <pid>` - Move a process to BLOCKED
//! - `rtos start|stop|reset` - Control the real-time engine
//! - `interrupt <id>` - Raise a hardware interrupt (RTOS only)
//! - `wait <duration>` - Let the simulation run (`100ms`, `2s`)
//! - `snapshot` - Emit the registry as JSON
//! - `stats` - Emit aggregate statistics
//! - `quit` - Stop everything and exit

use thiserror::Error;

/// Command error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid delay format: {0}")]
    InvalidDelay(String),
}

/// Real-time engine actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtosAction {
    Start,
    Stop,
    Reset,
}

/// Control commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Start the multi-core scheduler, optionally naming the algorithm
    Start { algorithm: Option<String> },

    /// Stop the multi-core scheduler
    Stop,

    /// Switch the live algorithm; unknown names fall back to FCFS
    Algorithm { name: String },

    /// Spawn random processes
    Spawn { count: usize },

    /// Block a process
    Block { pid: u32 },

    /// Real-time engine control
    Rtos(RtosAction),

    /// Raise an interrupt
    Interrupt { id: u32 },

    /// Let the simulation run for a while
    Wait { millis: u64 },

    /// Emit a snapshot
    Snapshot,

    /// Emit statistics
    Stats,

    /// Stop everything
    Quit,
}

/// Control command parser
pub struct CommandParser;

impl CommandParser {
    /// Parses a command string
    pub fn parse(input: &str) -> Result<ControlCommand, CommandError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(CommandError::InvalidCommand("Empty command".to_string()));
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();
        let args = &parts[1..];

        match cmd.as_str() {
            "start" => Ok(ControlCommand::Start {
                algorithm: args.first().map(|s| s.to_string()),
            }),
            "stop" => Ok(ControlCommand::Stop),
            "algorithm" | "algo" => {
                let name = args
                    .first()
                    .ok_or_else(|| CommandError::MissingArgument("algorithm name".to_string()))?;
                Ok(ControlCommand::Algorithm {
                    name: name.to_string(),
                })
            }
            "spawn" => {
                let count = match args.first() {
                    Some(arg) => Self::parse_number(arg)?,
                    None => 1,
                };
                Ok(ControlCommand::Spawn { count })
            }
            "block" => Ok(ControlCommand::Block {
                pid: Self::parse_id(args, "process ID")?,
            }),
            "rtos" => Self::parse_rtos(args),
            "interrupt" | "irq" => Ok(ControlCommand::Interrupt {
                id: Self::parse_id(args, "interrupt ID")?,
            }),
            "wait" => {
                if args.is_empty() {
                    return Err(CommandError::MissingArgument("duration".to_string()));
                }
                Ok(ControlCommand::Wait {
                    millis: Self::parse_duration(&args.join(""))?,
                })
            }
            "snapshot" => Ok(ControlCommand::Snapshot),
            "stats" => Ok(ControlCommand::Stats),
            "quit" | "exit" => Ok(ControlCommand::Quit),
            _ => Err(CommandError::UnknownCommand(cmd)),
        }
    }

    fn parse_rtos(args: &[&str]) -> Result<ControlCommand, CommandError> {
        let Some(action) = args.first() else {
            return Err(CommandError::MissingArgument(
                "RTOS action (start, stop, reset)".to_string(),
            ));
        };

        let action = match action.to_lowercase().as_str() {
            "start" => RtosAction::Start,
            "stop" | "pause" => RtosAction::Stop,
            "reset" => RtosAction::Reset,
            other => {
                return Err(CommandError::InvalidCommand(format!(
                    "Unknown RTOS action: {}",
                    other
                )))
            }
        };
        Ok(ControlCommand::Rtos(action))
    }

    /// Accepts `7` or `P7`
    fn parse_id(args: &[&str], what: &str) -> Result<u32, CommandError> {
        let arg = args
            .first()
            .ok_or_else(|| CommandError::MissingArgument(what.to_string()))?;
        let digits = arg
            .strip_prefix('P')
            .or_else(|| arg.strip_prefix('p'))
            .unwrap_or(arg);
        Self::parse_number(digits)
    }

    fn parse_number<T: std::str::FromStr>(s: &str) -> Result<T, CommandError> {
        s.parse::<T>()
            .map_err(|_| CommandError::InvalidNumber(s.to_string()))
    }

    /// Parses a duration string (e.g., "100ms", "1s")
    pub fn parse_duration(s: &str) -> Result<u64, CommandError> {
        let s = s.trim().to_lowercase();

        if let Some(ms_str) = s.strip_suffix("ms") {
            ms_str
                .trim()
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidDelay(s.to_string()))
        } else if let Some(s_str) = s.strip_suffix('s') {
            s_str
                .trim()
                .parse::<u64>()
                .map(|s| s * 1000)
                .map_err(|_| CommandError::InvalidDelay(s.to_string()))
        } else {
            Err(CommandError::InvalidDelay(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_without_algorithm() {
        let cmd = CommandParser::parse("start").unwrap();
        assert_eq!(cmd, ControlCommand::Start { algorithm: None });
    }

    #[test]
    fn test_parse_start_with_algorithm() {
        let cmd = CommandParser::parse("start RR").unwrap();
        assert_eq!(
            cmd,
            ControlCommand::Start {
                algorithm: Some("RR".to_string())
            }
        );
    }

    #[test]
    fn test_parse_algorithm_keeps_unknown_names() {
        let cmd = CommandParser::parse("algo lottery").unwrap();
        assert_eq!(
            cmd,
            ControlCommand::Algorithm {
                name: "lottery".to_string()
            }
        );
    }

    #[test]
    fn test_parse_algorithm_missing_name() {
        let result = CommandParser::parse("algorithm");
        assert!(matches!(result, Err(CommandError::MissingArgument(_))));
    }

    #[test]
    fn test_parse_spawn() {
        assert_eq!(
            CommandParser::parse("spawn").unwrap(),
            ControlCommand::Spawn { count: 1 }
        );
        assert_eq!(
            CommandParser::parse("spawn 4").unwrap(),
            ControlCommand::Spawn { count: 4 }
        );
        assert!(matches!(
            CommandParser::parse("spawn many"),
            Err(CommandError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_parse_block_accepts_prefixed_pid() {
        assert_eq!(
            CommandParser::parse("block P3").unwrap(),
            ControlCommand::Block { pid: 3 }
        );
        assert_eq!(
            CommandParser::parse("block 3").unwrap(),
            ControlCommand::Block { pid: 3 }
        );
    }

    #[test]
    fn test_parse_rtos_actions() {
        assert_eq!(
            CommandParser::parse("rtos start").unwrap(),
            ControlCommand::Rtos(RtosAction::Start)
        );
        assert_eq!(
            CommandParser::parse("rtos pause").unwrap(),
            ControlCommand::Rtos(RtosAction::Stop)
        );
        assert_eq!(
            CommandParser::parse("rtos reset").unwrap(),
            ControlCommand::Rtos(RtosAction::Reset)
        );
        assert!(matches!(
            CommandParser::parse("rtos"),
            Err(CommandError::MissingArgument(_))
        ));
        assert!(matches!(
            CommandParser::parse("rtos explode"),
            Err(CommandError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_parse_interrupt() {
        assert_eq!(
            CommandParser::parse("irq 99").unwrap(),
            ControlCommand::Interrupt { id: 99 }
        );
        assert!(matches!(
            CommandParser::parse("interrupt"),
            Err(CommandError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_parse_wait() {
        assert_eq!(
            CommandParser::parse("wait 250ms").unwrap(),
            ControlCommand::Wait { millis: 250 }
        );
        assert_eq!(
            CommandParser::parse("wait 2 s").unwrap(),
            ControlCommand::Wait { millis: 2000 }
        );
        assert!(matches!(
            CommandParser::parse("wait soon"),
            Err(CommandError::InvalidDelay(_))
        ));
    }

    #[test]
    fn test_parse_quit() {
        assert_eq!(CommandParser::parse("quit").unwrap(), ControlCommand::Quit);
        assert_eq!(CommandParser::parse("exit").unwrap(), ControlCommand::Quit);
    }

    #[test]
    fn test_parse_empty_command() {
        let result = CommandParser::parse("");
        assert!(matches!(result, Err(CommandError::InvalidCommand(_))));
    }

    #[test]
    fn test_parse_unknown_command() {
        let result = CommandParser::parse("reboot");
        assert!(matches!(result, Err(CommandError::UnknownCommand(_))));
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(CommandParser::parse("STOP").unwrap(), ControlCommand::Stop);
        assert_eq!(
            CommandParser::parse("Snapshot").unwrap(),
            ControlCommand::Snapshot
        );
        assert_eq!(
            CommandParser::parse("RTOS Start").unwrap(),
            ControlCommand::Rtos(RtosAction::Start)
        );
    }

    #[test]
    fn test_parse_whitespace_handling() {
        assert_eq!(
            CommandParser::parse("  spawn   2  ").unwrap(),
            ControlCommand::Spawn { count: 2 }
        );
        assert_eq!(
            CommandParser::parse("\tstats\t").unwrap(),
            ControlCommand::Stats
        );
    }
}
