//! Built-in command ids and the command-name table.
//!
//! Command ids 0x00-0xEA are reserved for the built-in table.
//! Ids 0xEB-0xFD are handed out to application-defined names.
//! 0xFF is never assigned and marks an invalid id on the wire.

use std::collections::BTreeMap;

use tracing::debug;

/// Discovery and other protocol housekeeping.
pub const SYSTEM_COMMAND: u8 = 0x00;

/// First id handed out by [`CommandTable::define`].
pub const USER_COMMAND_START: u8 = 0xEB;

/// Last id handed out by [`CommandTable::define`].
pub const USER_COMMAND_END: u8 = 0xFD;

/// Reserved id meaning "no such command".
pub const INVALID_COMMAND: u8 = 0xFF;

/// Built-in command names and ids.
pub const BUILTIN_COMMANDS: &[(&str, u8)] = &[
    ("SystemCommand", SYSTEM_COMMAND),
    ("Power", 0x01),
    ("Reboot", 0x02),
    ("Reset", 0x03),
    ("Setting", 0x04),
    ("Action", 0x05),
    ("Battery", 0x06),
    ("Brightness", 0x10),
    ("RGBColor", 0x11),
    ("RGBWColor", 0x12),
    ("AnimationMode", 0x13),
    ("AnimationSpeed", 0x14),
    ("WiFiCredentials", 0x25),
    ("APCredentials", 0x26),
    ("IPAddress", 0x27),
    ("AudioPlay", 0x35),
    ("AudioStop", 0x36),
    ("Volume", 0x37),
    ("AudioList", 0x38),
    ("Sensors", 0x70),
    ("SDSpace", 0x91),
    ("FileList", 0x92),
    ("Macro", 0xC8),
];

/// Returns the built-in name for a command id.
pub fn command_name(id: u8) -> Option<&'static str> {
    BUILTIN_COMMANDS
        .iter()
        .find(|(_, builtin)| *builtin == id)
        .map(|(name, _)| *name)
}

/// Returns true if the id is in the application-defined range.
pub fn is_user_command(id: u8) -> bool {
    (USER_COMMAND_START..=USER_COMMAND_END).contains(&id)
}

/// Name ↔ id mapping: the built-in table plus application-defined names.
#[derive(Debug, Clone)]
pub struct CommandTable {
    user_by_name: BTreeMap<String, u8>,
    user_by_id: BTreeMap<u8, String>,
    next_user_id: u8,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self {
            user_by_name: BTreeMap::new(),
            user_by_id: BTreeMap::new(),
            next_user_id: USER_COMMAND_START,
        }
    }
}

impl CommandTable {
    /// A table containing only the built-in commands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a name (built-in first, then application-defined).
    pub fn id_for_name(&self, name: &str) -> Option<u8> {
        BUILTIN_COMMANDS
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, id)| *id)
            .or_else(|| self.user_by_name.get(name).copied())
    }

    /// Resolve an id to its name.
    pub fn name_for_id(&self, id: u8) -> Option<&str> {
        command_name(id).or_else(|| self.user_by_id.get(&id).map(String::as_str))
    }

    /// Define an application command name.
    ///
    /// Returns the existing id if the name is already known, a freshly
    /// allocated id otherwise, or `None` once the user range is exhausted.
    pub fn define(&mut self, name: &str) -> Option<u8> {
        if let Some(existing) = self.id_for_name(name) {
            return Some(existing);
        }
        if self.next_user_id > USER_COMMAND_END {
            debug!(name, "user command space exhausted");
            return None;
        }
        let id = self.next_user_id;
        self.next_user_id += 1;
        self.user_by_name.insert(name.to_string(), id);
        self.user_by_id.insert(id, name.to_string());
        debug!(name, id, "defined user command");
        Some(id)
    }

    /// Every known (name, id) pair, built-ins first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> + '_ {
        BUILTIN_COMMANDS
            .iter()
            .map(|(name, id)| (*name, *id))
            .chain(self.user_by_id.iter().map(|(id, name)| (name.as_str(), *id)))
    }

    /// Number of application-defined names.
    pub fn user_count(&self) -> usize {
        self.user_by_id.len()
    }
}
