use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// What the send queue does after a write failed,
/// or when it was asked to drain without a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DrainPolicy {
    /// The queue stays stalled until its output buffer is emptied.
    #[default]
    Stall,

    /// The queue resumes draining on the next send,
    /// and when a connection is established.
    Resume,
}

/// The configuration used when running an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many pending writes the send queue holds at most.
    /// Newer writes beyond this are dropped.
    pub queue_cap: usize,

    /// Passed to the transport on open.
    /// Lets the host put the port to sleep while the application is paused.
    pub sleep_on_pause: bool,

    /// See [`DrainPolicy`].
    pub drain_policy: DrainPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_cap: 100,
            sleep_on_pause: false,
            drain_policy: DrainPolicy::default(),
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        let config = Self::ron().from_str::<Config>(input)?;
        config.validate()?;

        Ok(config)
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            queue_cap: 256,
            sleep_on_pause: true,
            drain_policy: DrainPolicy::Resume,
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .unwrap_or_else(|e| format!("/* could not serialize configuration: {e} */"))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let s = std::fs::read_to_string(p)?;

        Self::deserialize(&s)
    }

    /// Check the values make sense together.
    pub fn validate(&self) -> Result<(), Error> {
        if self.queue_cap == 0 {
            return Err(Error::BadConfig(
                "The queue cap must be at least 1, otherwise nothing can ever be sent.".into(),
            ));
        }

        Ok(())
    }
}
