/*!

Connection settings.

Settings can be built in code or parsed from a string-keyed
configuration map, the same way keyring stores take their
configuration. Recognized keys:

- `encryption`: `dh` (the default) or `plain`
- `bus`: `session` (the default) or `system`
- `timeout-ms`: the per-call timeout in milliseconds (default 25000)
- `window-id`: the window id handed to prompts (default empty)

*/

use std::collections::HashMap;
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::session::EncryptionType;

/// Which message bus hosts the secret service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusKind {
    #[default]
    Session,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub encryption: EncryptionType,
    pub bus: BusKind,
    pub timeout: Duration,
    pub window_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            encryption: EncryptionType::Dh,
            bus: BusKind::Session,
            timeout: Duration::from_millis(25_000),
            window_id: String::new(),
        }
    }
}

impl Settings {
    pub fn new(encryption: EncryptionType) -> Self {
        Self {
            encryption,
            ..Default::default()
        }
    }

    /// Parse settings from a configuration map.
    ///
    /// Keys not listed in the module docs are rejected, as are
    /// malformed values.
    pub fn from_config(config: &HashMap<&str, &str>) -> Result<Self> {
        let mut settings = Self::default();
        for (key, value) in config {
            match *key {
                "encryption" => {
                    settings.encryption = match value.to_ascii_lowercase().as_str() {
                        "dh" => EncryptionType::Dh,
                        "plain" => EncryptionType::Plain,
                        _ => return Err(invalid(key, "must be 'dh' or 'plain'")),
                    }
                }
                "bus" => {
                    settings.bus = match value.to_ascii_lowercase().as_str() {
                        "session" => BusKind::Session,
                        "system" => BusKind::System,
                        _ => return Err(invalid(key, "must be 'session' or 'system'")),
                    }
                }
                "timeout-ms" => {
                    let ms: u64 = value
                        .parse()
                        .map_err(|_| invalid(key, "must be a number of milliseconds"))?;
                    if ms == 0 {
                        return Err(invalid(key, "must be positive"));
                    }
                    settings.timeout = Duration::from_millis(ms);
                }
                "window-id" => settings.window_id = value.to_string(),
                _ => return Err(invalid(key, "is not a known setting")),
            }
        }
        Ok(settings)
    }
}

fn invalid(key: &str, reason: &str) -> Error {
    Error::Invalid(key.to_string(), reason.to_string())
}
