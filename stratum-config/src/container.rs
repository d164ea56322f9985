use std::path::PathBuf;

use crate::utils::Millis;

pub const DEFAULT_IDENTITY_PROPERTY: &str = "ro.container.id";
pub const DEFAULT_PROPERTY_FILE: &str = "/default.prop";
pub const DEFAULT_ACTIVE_PATH: &str = "/proc/container/active";
pub const DEFAULT_FOCUS_EVENT: &str = "ACTIVE_CONTAINER_CHANGED";
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 500;

#[derive(knuffel::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Container {
    #[knuffel(child, unwrap(argument), default = String::from(DEFAULT_IDENTITY_PROPERTY))]
    pub identity_property: String,
    #[knuffel(child, unwrap(argument), default = PathBuf::from(DEFAULT_PROPERTY_FILE))]
    pub property_file: PathBuf,
    #[knuffel(child, unwrap(argument), default = PathBuf::from(DEFAULT_ACTIVE_PATH))]
    pub active_path: PathBuf,
    #[knuffel(child, unwrap(argument), default = String::from(DEFAULT_FOCUS_EVENT))]
    pub focus_event: String,
    #[knuffel(child, unwrap(argument), default = Millis(DEFAULT_POLL_INTERVAL_MS))]
    pub poll_interval_ms: Millis,
}

impl Default for Container {
    fn default() -> Self {
        Self {
            identity_property: String::from(DEFAULT_IDENTITY_PROPERTY),
            property_file: PathBuf::from(DEFAULT_PROPERTY_FILE),
            active_path: PathBuf::from(DEFAULT_ACTIVE_PATH),
            focus_event: String::from(DEFAULT_FOCUS_EVENT),
            poll_interval_ms: Millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}
