//! Line commands read from stdin while the daemon runs

use std::str::FromStr;
use thiserror::Error;
use wisafe_core::Command;
use wisafe_entities::Button;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Press(Button),
    Send(Command),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown console command '{0}', try 'help'")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error(transparent)]
    BadCommand(#[from] wisafe_core::UnknownCommand),
}

pub const HELP: &str = "\
press <button>   press a bridge button (test_co, test_smoke, test_all, silence_co,
                 silence_smoke, get_pairing, start_pairing)
send <command>   write a command code or name, e.g. 3~ or emergency_smoke
status           print the current bridge snapshot
quit             stop the bridge and exit";

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let argument = words.next();

        match verb {
            "press" => Ok(Self::Press(
                argument.ok_or(ConsoleError::MissingArgument("press"))?.parse()?,
            )),
            "send" => Ok(Self::Send(
                argument.ok_or(ConsoleError::MissingArgument("send"))?.parse()?,
            )),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ConsoleError::Unknown(other.to_string())),
        }
    }
}
