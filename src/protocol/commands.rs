//! Module `commands`
//!
//! Defines the FTP command set understood by the control channel and the
//! line parser that produces it.

use std::fmt;

/// Represents an FTP command parsed from the client input.
///
/// Arguments are optional at parse time; handlers answer `501` when a
/// required one is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(Option<String>),
    Pass(Option<String>),
    Quit,
    Pwd,
    Cwd(Option<String>),
    List(Vec<String>),
    Noop,
    Syst,
    Feat,
    Type(Option<String>),
    Mode(Option<String>),
    Unknown(String),
}

/// Represents the outcome status of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Parses one command line into a `Command`.
///
/// The verb is matched case-insensitively and exactly; remaining
/// whitespace-separated tokens are positional arguments. Returns `None` for a
/// line without tokens.
pub fn parse_command(raw: &str) -> Option<Command> {
    let mut tokens = raw.split_whitespace();
    let verb = tokens.next()?.to_ascii_uppercase();
    let mut args: Vec<String> = tokens.map(str::to_string).collect();
    let first = if args.is_empty() {
        None
    } else {
        Some(args.remove(0))
    };

    let command = match verb.as_str() {
        "USER" => Command::User(first),
        "PASS" => Command::Pass(first),
        "QUIT" => Command::Quit,
        "PWD" => Command::Pwd,
        "CWD" => Command::Cwd(first),
        "LIST" => Command::List(first.into_iter().chain(args).collect()),
        "NOOP" => Command::Noop,
        "SYST" => Command::Syst,
        "FEAT" => Command::Feat,
        "TYPE" => Command::Type(first),
        "MODE" => Command::Mode(first),
        _ => Command::Unknown(verb),
    };
    Some(command)
}

impl Command {
    /// Verb as it appears on the wire
    pub fn verb(&self) -> &str {
        match self {
            Command::User(_) => "USER",
            Command::Pass(_) => "PASS",
            Command::Quit => "QUIT",
            Command::Pwd => "PWD",
            Command::Cwd(_) => "CWD",
            Command::List(_) => "LIST",
            Command::Noop => "NOOP",
            Command::Syst => "SYST",
            Command::Feat => "FEAT",
            Command::Type(_) => "TYPE",
            Command::Mode(_) => "MODE",
            Command::Unknown(verb) => verb,
        }
    }
}

/// Log-safe rendering: passwords are never printed.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass(Some(_)) => write!(f, "PASS ****"),
            Command::User(Some(arg))
            | Command::Cwd(Some(arg))
            | Command::Type(Some(arg))
            | Command::Mode(Some(arg)) => write!(f, "{} {}", self.verb(), arg),
            Command::List(args) if !args.is_empty() => {
                write!(f, "LIST {}", args.join(" "))
            }
            _ => f.write_str(self.verb()),
        }
    }
}
