//! Outbound command codes
//!
//! Each bridge action is a fixed two-character ASCII code written raw to the
//! serial line. There is no framing and no acknowledgement.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    TestCo,
    TestSmoke,
    TestAll,
    EmergencyCo,
    EmergencySmoke,
    SilenceCo,
    SilenceSmoke,
    GetPairing,
    StartPairing,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown bridge command '{0}'")]
pub struct UnknownCommand(pub String);

impl Command {
    pub const ALL: [Command; 9] = [
        Command::TestCo,
        Command::TestSmoke,
        Command::TestAll,
        Command::EmergencyCo,
        Command::EmergencySmoke,
        Command::SilenceCo,
        Command::SilenceSmoke,
        Command::GetPairing,
        Command::StartPairing,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Command::TestCo => "1~",
            Command::TestSmoke => "2~",
            Command::TestAll => "3~",
            Command::EmergencyCo => "4~",
            Command::EmergencySmoke => "5~",
            Command::SilenceCo => "6~",
            Command::SilenceSmoke => "7~",
            Command::GetPairing => "8~",
            Command::StartPairing => "9~",
        }
    }

    /// Snake-case name used on the command line and in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::TestCo => "test_co",
            Command::TestSmoke => "test_smoke",
            Command::TestAll => "test_all",
            Command::EmergencyCo => "emergency_co",
            Command::EmergencySmoke => "emergency_smoke",
            Command::SilenceCo => "silence_co",
            Command::SilenceSmoke => "silence_smoke",
            Command::GetPairing => "get_pairing",
            Command::StartPairing => "start_pairing",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.code().as_bytes()
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Accepts either the raw code (`2~`) or the name (`test_smoke`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
            .or_else(|| Self::ALL.into_iter().find(|c| c.name() == s))
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}
