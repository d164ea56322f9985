#[macro_use]
extern crate tracing;

use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use miette::{Context as _, IntoDiagnostic as _};

pub mod container;
pub mod debug;
pub mod stacking;
pub mod utils;

pub use crate::container::Container;
pub use crate::debug::DebugConfig;
pub use crate::stacking::Stacking;
pub use crate::utils::Millis;

#[derive(knuffel::Decode, Debug, PartialEq)]
pub struct Config {
    #[knuffel(child, default)]
    pub container: Container,
    #[knuffel(child, default)]
    pub stacking: Stacking,
    #[knuffel(child, default)]
    pub debug: DebugConfig,
}

impl Config {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let contents = fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("error reading {path:?}"))?;

        let config = Self::parse(
            path.file_name()
                .and_then(OsStr::to_str)
                .unwrap_or("config.kdl"),
            &contents,
        )
        .context("error parsing")?;
        debug!("loaded config from {path:?}");
        Ok(config)
    }

    pub fn parse(filename: &str, text: &str) -> Result<Self, knuffel::Error> {
        let _span = tracy_client::span!("Config::parse");
        knuffel::parse(filename, text)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::parse(
            "default-config.kdl",
            include_str!("../../resources/default-config.kdl"),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_debug_snapshot;
    use pretty_assertions::assert_eq;

    use super::*;

    #[track_caller]
    fn do_parse(text: &str) -> Config {
        Config::parse("test.kdl", text)
            .map_err(miette::Report::new)
            .unwrap()
    }

    #[test]
    fn can_create_default_config() {
        let _ = Config::default();
    }

    #[test]
    fn default_config_matches_empty_config() {
        assert_eq!(Config::default(), do_parse(""));
    }

    #[test]
    fn empty_sections_use_defaults() {
        let parsed = do_parse(
            r#"
            container {}
            stacking {}
            debug {}
            "#,
        );
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn parse() {
        let parsed = do_parse(
            r##"
            container {
                identity-property "persist.container.id"
                property-file "/vendor/build.prop"
                active-path "/run/container/active"
                focus-event "CONTAINER_SWITCHED"
                poll-interval-ms 250
            }

            stacking {
                container-span 1000
                focus-bonus 0x100000
            }

            debug {
                trace-surfaces
            }
            "##,
        );

        assert_debug_snapshot!(parsed, @r#"
        Config {
            container: Container {
                identity_property: "persist.container.id",
                property_file: "/vendor/build.prop",
                active_path: "/run/container/active",
                focus_event: "CONTAINER_SWITCHED",
                poll_interval_ms: Millis(
                    250,
                ),
            },
            stacking: Stacking {
                container_span: 1000,
                focus_bonus: 1048576,
            },
            debug: DebugConfig {
                trace_surfaces: true,
            },
        }
        "#);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let res = Config::parse(
            "test.kdl",
            r#"
            container {
                poll-interval-ms 0
            }
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn string_span_is_rejected() {
        let res = Config::parse(
            "test.kdl",
            r#"
            stacking {
                container-span "big"
            }
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/stratum/config.kdl")).unwrap_err();
        assert!(err.to_string().starts_with("error reading"));
    }
}
