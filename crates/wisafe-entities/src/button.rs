//! Command buttons on the bridge device

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use wisafe_core::{Command, UnknownCommand, STATUS_UNKNOWN};

use crate::description::{EntityCategory, EntityDescription, Platform, RenderedEntity};
use crate::device_info::DeviceInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    TestCo,
    TestSmoke,
    TestAll,
    SilenceCo,
    SilenceSmoke,
    GetPairing,
    StartPairing,
}

impl Button {
    pub const ALL: [Button; 7] = [
        Button::TestCo,
        Button::TestSmoke,
        Button::TestAll,
        Button::SilenceCo,
        Button::SilenceSmoke,
        Button::GetPairing,
        Button::StartPairing,
    ];

    pub fn command(&self) -> Command {
        match self {
            Button::TestCo => Command::TestCo,
            Button::TestSmoke => Command::TestSmoke,
            Button::TestAll => Command::TestAll,
            Button::SilenceCo => Command::SilenceCo,
            Button::SilenceSmoke => Command::SilenceSmoke,
            Button::GetPairing => Command::GetPairing,
            Button::StartPairing => Command::StartPairing,
        }
    }

    /// Also the unique id and the console name
    pub fn key(&self) -> &'static str {
        self.command().name()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Button::TestCo => "Test CO Alarms",
            Button::TestSmoke => "Test Smoke Alarms",
            Button::TestAll => "Test All Alarms",
            Button::SilenceCo => "Silence CO Alarms",
            Button::SilenceSmoke => "Silence Smoke Alarms",
            Button::GetPairing => "Check Pairing Status",
            Button::StartPairing => "Start Pairing Mode",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Button::TestCo => "mdi:molecule-co",
            Button::TestSmoke => "mdi:fire",
            Button::TestAll => "mdi:shield-check",
            Button::SilenceCo | Button::SilenceSmoke => "mdi:volume-off",
            Button::GetPairing => "mdi:link-variant",
            Button::StartPairing => "mdi:link-plus",
        }
    }

    pub fn entity_category(&self) -> Option<EntityCategory> {
        match self {
            Button::TestCo | Button::TestSmoke | Button::TestAll => {
                Some(EntityCategory::Diagnostic)
            }
            Button::GetPairing | Button::StartPairing => Some(EntityCategory::Config),
            Button::SilenceCo | Button::SilenceSmoke => None,
        }
    }

    pub fn description(&self) -> EntityDescription {
        let description =
            EntityDescription::new(Platform::Button, self.key(), self.name(), DeviceInfo::bridge());
        match self.entity_category() {
            Some(category) => description.category(category),
            None => description,
        }
    }

    /// State is the time of the last press
    pub fn render(&self, last_pressed: Option<DateTime<Utc>>) -> RenderedEntity {
        let state = last_pressed
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| STATUS_UNKNOWN.to_string());
        self.description().with_state(state).icon(self.icon())
    }
}

impl FromStr for Button {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.key() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
