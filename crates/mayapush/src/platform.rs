//! Host platform detection and per-platform path conventions.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Platform family a plugin binary is built for.
///
/// The lowercase name doubles as the key into the `file_endings` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
}

impl Platform {
    /// Map an OS identifier (`std::env::consts::OS` style, or a `sys.platform`
    /// string such as `linux2` or `win32`) to a platform family.
    pub fn from_os(os: &str) -> Result<Self, Error> {
        let os = os.to_ascii_lowercase();
        if os.contains("linux") {
            Ok(Self::Linux)
        } else if os.contains("windows") || os.starts_with("win") {
            Ok(Self::Windows)
        } else {
            Err(Error::UnsupportedPlatform(os))
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }

    pub fn separator(self) -> char {
        match self {
            Self::Linux => '/',
            Self::Windows => '\\',
        }
    }

    pub fn is_separator(self, c: char) -> bool {
        match self {
            Self::Linux => c == '/',
            // Editors on Windows hand out either form.
            Self::Windows => c == '\\' || c == '/',
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
