//! Container identity and the external sources describing containers.
//!
//! Two read-only channels describe containers from the outside:
//!
//! * a property store holding the id of the container this process belongs to, read once;
//! * an "active container" file holding the id of the container owning the display right now.
//!
//! Both degrade to container 0 when they cannot be read.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead as _, BufReader};
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// Identifier of a container sharing the display.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContainerId(pub i32);

impl ContainerId {
    /// Value reported when the active container cannot be determined.
    pub const NONE: Self = Self(0);

    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ContainerId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Read-only string property store.
pub trait PropertySource: Send + Sync {
    /// Returns the value of the property, if set.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns the property parsed as an integer, or `default` if unset or unparsable.
    fn get_int(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }
}

impl PropertySource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Property store backed by a `build.prop`-style file of `key=value` lines.
///
/// The file is read on every lookup. Blank lines and lines starting with `#` are skipped, and
/// later definitions override earlier ones.
#[derive(Debug, Clone)]
pub struct PropertyFile {
    path: PathBuf,
}

impl PropertyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn find_property<'a>(contents: &'a str, key: &str) -> Option<&'a str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
        .last()
}

impl PropertySource for PropertyFile {
    fn get(&self, key: &str) -> Option<String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                debug!("error reading properties from {:?}: {err}", self.path);
                return None;
            }
        };

        find_property(&contents, key).map(String::from)
    }
}

/// Id of the container this process belongs to.
///
/// Resolved from the property store the first time it is needed, then fixed for the lifetime of
/// the value. Concurrent first accesses all observe the same id.
pub struct ContainerIdentity {
    key: String,
    source: Box<dyn PropertySource>,
    id: OnceLock<ContainerId>,
}

impl ContainerIdentity {
    pub fn new(key: impl Into<String>, source: impl PropertySource + 'static) -> Self {
        Self {
            key: key.into(),
            source: Box::new(source),
            id: OnceLock::new(),
        }
    }

    /// Creates an identity that is already resolved to `id`.
    pub fn fixed(id: ContainerId) -> Self {
        Self {
            key: String::new(),
            source: Box::new(HashMap::new()),
            id: OnceLock::from(id),
        }
    }

    pub fn get(&self) -> ContainerId {
        *self.id.get_or_init(|| {
            let id = ContainerId(self.source.get_int(&self.key, 0));
            debug!("resolved container identity from {:?}: {id}", self.key);
            id
        })
    }
}

impl fmt::Debug for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerIdentity")
            .field("key", &self.key)
            .field("id", &self.id.get())
            .finish_non_exhaustive()
    }
}

/// Channel reporting which container is active right now.
pub trait ActiveContainerSource: Send + Sync {
    /// Reads the first line of the channel, without the line terminator.
    ///
    /// Returns `Ok(None)` if the channel is empty.
    fn read_line(&self) -> io::Result<Option<String>>;

    /// Returns the active container, or [`ContainerId::NONE`] if it cannot be determined.
    fn current(&self) -> ContainerId {
        match self.read_line() {
            Ok(Some(line)) => match line.parse() {
                Ok(id) => id,
                Err(err) => {
                    debug!("error parsing active container {line:?}: {err}");
                    ContainerId::NONE
                }
            },
            Ok(None) => ContainerId::NONE,
            Err(err) => {
                debug!("error reading active container: {err}");
                ContainerId::NONE
            }
        }
    }
}

/// Active container channel backed by a single-line file, like `/proc/container/active`.
#[derive(Debug, Clone)]
pub struct ActiveContainerFile {
    path: PathBuf,
}

impl ActiveContainerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActiveContainerSource for ActiveContainerFile {
    fn read_line(&self) -> io::Result<Option<String>> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(len);
        Ok(Some(line))
    }
}
