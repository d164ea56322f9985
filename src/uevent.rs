//! Kernel uevent messages.
//!
//! A uevent datagram is a sequence of NUL-terminated fields. The first field is a header of the
//! form `ACTION@DEVPATH`, the rest are `KEY=VALUE` pairs.

use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UEvent {
    header: Option<(String, String)>,
    env: HashMap<String, String>,
}

impl UEvent {
    /// Parses a raw uevent datagram.
    ///
    /// Parsing is lenient: invalid UTF-8 is replaced, and fields that are neither a header nor a
    /// `KEY=VALUE` pair are skipped.
    pub fn parse(raw: &[u8]) -> Self {
        let mut event = Self::default();

        let mut fields = raw
            .split(|b| *b == 0)
            .filter(|field| !field.is_empty())
            .map(String::from_utf8_lossy)
            .peekable();

        if let Some(first) = fields.peek() {
            if !first.contains('=') {
                if let Some((action, devpath)) = first.split_once('@') {
                    event.header = Some((action.to_owned(), devpath.to_owned()));
                }
                fields.next();
            }
        }

        for field in fields {
            match field.split_once('=') {
                Some((key, value)) => {
                    event.env.insert(key.to_owned(), value.to_owned());
                }
                None => trace!("skipping uevent field without a value: {field:?}"),
            }
        }

        event
    }

    /// Returns the action from the header, or from the `ACTION` key if there is no header.
    pub fn action(&self) -> Option<&str> {
        match &self.header {
            Some((action, _)) => Some(action),
            None => self.get("ACTION"),
        }
    }

    /// Returns the device path from the header, or from the `DEVPATH` key if there is no header.
    pub fn devpath(&self) -> Option<&str> {
        match &self.header {
            Some((_, devpath)) => Some(devpath),
            None => self.get("DEVPATH"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.env.len()
    }

    pub fn is_empty(&self) -> bool {
        self.env.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kernel_event() {
        let event = UEvent::parse(
            b"change@/devices/virtual/misc/container\0\
              ACTION=change\0\
              DEVPATH=/devices/virtual/misc/container\0\
              SUBSYSTEM=misc\0\
              ACTIVE_CONTAINER_CHANGED=1\0",
        );

        assert_eq!(event.action(), Some("change"));
        assert_eq!(event.devpath(), Some("/devices/virtual/misc/container"));
        assert_eq!(event.get("SUBSYSTEM"), Some("misc"));
        assert_eq!(event.get("ACTIVE_CONTAINER_CHANGED"), Some("1"));
        assert_eq!(event.get("MISSING"), None);
        assert_eq!(event.len(), 4);
    }

    #[test]
    fn parse_without_header() {
        let event = UEvent::parse(b"ACTION=add\0DEVPATH=/x\0KEY=a=b\0");
        assert_eq!(event.action(), Some("add"));
        assert_eq!(event.devpath(), Some("/x"));
        assert_eq!(event.get("KEY"), Some("a=b"));
    }

    #[test]
    fn parse_garbage() {
        assert!(UEvent::parse(b"").is_empty());
        assert!(UEvent::parse(b"\0\0\0").is_empty());

        let event = UEvent::parse(b"header-without-at\0junk\0K=\0\xff=v\0");
        assert_eq!(event.action(), None);
        assert_eq!(event.get("K"), Some(""));
        assert_eq!(event.get("\u{fffd}"), Some("v"));
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn empty_value_is_kept() {
        let event = UEvent::parse(b"change@/x\0ACTIVE_CONTAINER_CHANGED=\0");
        assert_eq!(event.get("ACTIVE_CONTAINER_CHANGED"), Some(""));
    }
}
