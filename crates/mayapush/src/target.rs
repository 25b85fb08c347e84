//! Mapping an edited source file to the plugin binary it builds.
//!
//! Convention: a plugin's sources live in a directory named after the plugin,
//! and the build drops the binary next to them.
//!
//! - linux: `<dir>/<name>.<ext>`
//! - windows: `<dir>\<platform>\Debug\<name>.<ext>`

use std::path::Path;

use crate::error::ConfigError;
use crate::platform::Platform;
use crate::settings::{self, PluginSettings, SettingsProvider};

/// A resolved, loadable plugin binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub platform: Platform,
    /// Plugin source directory (parent of the active file).
    pub dir: String,
    /// Path of the built binary. Existence is not checked; Maya reports it.
    pub path: String,
    pub settings: PluginSettings,
}

impl Target {
    pub fn resolve(
        active_file: &str,
        platform: Platform,
        settings: &dyn SettingsProvider,
    ) -> Result<Self, ConfigError> {
        let (dir, name) = split_plugin_dir(active_file, platform)
            .ok_or_else(|| ConfigError::NoPluginName(active_file.to_string()))?;

        let plugin = settings::plugin(settings, name)?;
        let ext = settings::file_ending(settings, platform)?;

        let sep = platform.separator();
        let path = match platform {
            Platform::Linux => format!("{dir}{sep}{name}.{ext}"),
            Platform::Windows => {
                let build = plugin.platform.as_deref().ok_or_else(|| {
                    ConfigError::MissingSetting(format!("plugins.{name}.platform"))
                })?;
                format!("{dir}{sep}{build}{sep}Debug{sep}{name}.{ext}")
            }
        };

        tracing::debug!(plugin = %name, %platform, path = %path, "Resolved plugin binary");

        Ok(Self {
            name: name.to_string(),
            platform,
            dir: dir.to_string(),
            path,
            settings: plugin,
        })
    }

    /// Follow-up code: `code` (lines joined in order), then the contents of
    /// `file` if one is configured.
    ///
    /// File contents start on a fresh line: the command before them is a
    /// `;`-joined simple statement line, and a `def` or `class` cannot follow a `;`.
    pub fn code(&self) -> Result<String, ConfigError> {
        let mut code = self.settings.code.concat();
        if let Some(file) = &self.settings.file {
            let path = Path::new(&self.dir).join(file);
            let extra = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Read { path, source })?;
            code.push('\n');
            code.push_str(&extra);
        }
        Ok(code)
    }
}

/// Split an active file path into its directory and that directory's name.
fn split_plugin_dir(active_file: &str, platform: Platform) -> Option<(&str, &str)> {
    let dir_end = active_file.rfind(|c| platform.is_separator(c))?;
    let dir = active_file[..dir_end].trim_end_matches(|c| platform.is_separator(c));
    let name_start = dir
        .rfind(|c| platform.is_separator(c))
        .map_or(0, |i| i + 1);
    let name = &dir[name_start..];
    // A bare drive such as `C:` is not a plugin name.
    if name.is_empty() || name.ends_with(':') {
        return None;
    }
    Some((dir, name))
}
