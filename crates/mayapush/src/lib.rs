//! mayapush: reload a native Maya plugin from the editor and run follow-up
//! Python in Maya's command port.

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod payload;
pub mod platform;
pub mod settings;
pub mod target;

pub use channel::{Channel, ChannelConfig, Endpoint, Reporter, StderrReporter};
pub use dispatcher::{Action, Dispatcher, build_test_command, build_unload_command};
pub use error::{ConfigError, Error, Result, TransmissionError};
pub use payload::Payload;
pub use platform::Platform;
pub use settings::{Overrides, Settings, SettingsProvider};
pub use target::Target;
