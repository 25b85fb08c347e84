//! Turns "test/unload the plugin I'm editing" into a Maya Python command.

use std::borrow::Cow;
use std::path::Path;

use crate::channel::{Channel, Endpoint, Reporter};
use crate::error::{ConfigError, Result};
use crate::payload::{Payload, py_double_quoted};
use crate::platform::Platform;
use crate::settings::{self, SettingsProvider};
use crate::target::Target;

const MAYA_IMPORT: &str = "from maya import cmds, mel;";

/// User-triggered action on the active file's plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Unload, reload and run the configured follow-up code.
    Test,
    /// Unload only, so the binary can be rebuilt.
    Unload,
}

/// Builds commands against a settings snapshot. Holds no state of its own;
/// construct one per invocation.
pub struct Dispatcher<'a> {
    settings: &'a dyn SettingsProvider,
    os: Cow<'a, str>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(settings: &'a dyn SettingsProvider) -> Self {
        Self {
            settings,
            os: Cow::Borrowed(std::env::consts::OS),
        }
    }

    /// Resolve paths as if running on `os` instead of the current system.
    pub fn with_os(mut self, os: impl Into<Cow<'a, str>>) -> Self {
        self.os = os.into();
        self
    }

    pub fn resolve(&self, active_file: &Path) -> Result<Target> {
        let platform = Platform::from_os(&self.os)?;
        let active_file = active_file
            .to_str()
            .ok_or_else(|| ConfigError::NonUtf8Path(active_file.to_path_buf()))?;
        Ok(Target::resolve(active_file, platform, self.settings)?)
    }

    pub fn build(&self, action: Action, active_file: &Path) -> Result<String> {
        match action {
            Action::Test => self.build_test_command(active_file),
            Action::Unload => self.build_unload_command(active_file),
        }
    }

    /// `unloadPlugin`, `loadPlugin`, then the plugin's follow-up code.
    pub fn build_test_command(&self, active_file: &Path) -> Result<String> {
        let target = self.resolve(active_file)?;
        let code = target.code()?;
        Ok(format!(
            "{MAYA_IMPORT}{unload}cmds.loadPlugin({path});{code}",
            unload = unload_clause(&target.name),
            path = py_double_quoted(&target.path),
        ))
    }

    pub fn build_unload_command(&self, active_file: &Path) -> Result<String> {
        let target = self.resolve(active_file)?;
        Ok(format!("{MAYA_IMPORT}{}", unload_clause(&target.name)))
    }

    /// Wrap the command for `action` in a [`Payload`] using the configured
    /// namespace key. Fails before any connection is attempted.
    pub fn payload(&self, action: Action, active_file: &Path) -> Result<Payload> {
        let command = self.build(action, active_file)?;
        let key = settings::namespace_key(self.settings)?;
        Ok(Payload::new(command).with_namespace_key(key))
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        Ok(Endpoint::from_settings(self.settings)?)
    }

    /// Build the command for `action` and send it to Maya.
    pub fn dispatch<R: Reporter>(
        &self,
        action: Action,
        active_file: &Path,
        reporter: R,
    ) -> Result<()> {
        let payload = self.payload(action, active_file)?;
        let channel = Channel::new(self.endpoint()?, reporter);
        channel.send(&payload)?;
        tracing::info!(?action, endpoint = %channel.endpoint(), "Command sent to Maya");
        Ok(())
    }
}

fn unload_clause(name: &str) -> String {
    format!("cmds.unloadPlugin({}, f=True);", py_double_quoted(name))
}

pub fn build_test_command(active_file: &Path, settings: &dyn SettingsProvider) -> Result<String> {
    Dispatcher::new(settings).build_test_command(active_file)
}

pub fn build_unload_command(
    active_file: &Path,
    settings: &dyn SettingsProvider,
) -> Result<String> {
    Dispatcher::new(settings).build_unload_command(active_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::settings::Settings;
    use serde_json::json;
    use std::net::TcpListener;

    struct Unreachable;

    impl Reporter for Unreachable {
        fn error_message(&self, message: &str) {
            panic!("no transmission should be attempted: {message}");
        }
    }

    fn settings() -> Settings {
        Settings::from_value(json!({
            "host": "127.0.0.1",
            "port": 7002,
            "file_endings": {"linux": "so", "windows": "mll"},
            "plugins": {
                "MyPlugin": {"platform": "x64", "code": "cmds.select('a')"},
                "Lines": {"platform": "Win32", "code": ["a();", "b();"]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_command_linux() {
        let settings = settings();
        let command = Dispatcher::new(&settings)
            .with_os("linux")
            .build_test_command(Path::new("/proj/MyPlugin/src.py"))
            .unwrap();
        assert_eq!(
            command,
            "from maya import cmds, mel;\
             cmds.unloadPlugin(\"MyPlugin\", f=True);\
             cmds.loadPlugin(\"/proj/MyPlugin/MyPlugin.so\");\
             cmds.select('a')"
        );
    }

    #[test]
    fn test_command_windows() {
        let settings = settings();
        let command = Dispatcher::new(&settings)
            .with_os("windows")
            .build_test_command(Path::new(r"C:\proj\MyPlugin\plugin.cpp"))
            .unwrap();
        insta::assert_snapshot!(command, @r#"from maya import cmds, mel;cmds.unloadPlugin("MyPlugin", f=True);cmds.loadPlugin("C:\\proj\\MyPlugin\\x64\\Debug\\MyPlugin.mll");cmds.select('a')"#);
    }

    #[test]
    fn clauses_in_order_on_both_platforms() {
        let settings = settings();
        for (os, file) in [
            ("linux", "/proj/Lines/src.py"),
            ("windows", r"C:\proj\Lines\src.cpp"),
        ] {
            let command = Dispatcher::new(&settings)
                .with_os(os)
                .build_test_command(Path::new(file))
                .unwrap();
            assert_eq!(command.matches("cmds.unloadPlugin(").count(), 1, "{os}");
            assert_eq!(command.matches("cmds.loadPlugin(").count(), 1, "{os}");

            let unload = command.find("cmds.unloadPlugin(").unwrap();
            let load = command.find("cmds.loadPlugin(").unwrap();
            assert!(unload < load, "{os}");
            assert!(command.ends_with(");a();b();"), "{os}: {command}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn code_file_starts_on_its_own_line() {
        let dir = tempfile::tempdir().unwrap();
        let plugin_dir = dir.path().join("Scene");
        std::fs::create_dir(&plugin_dir).unwrap();
        std::fs::write(
            plugin_dir.join("scene.py"),
            "def setup():\n    return 1\nsetup()\n",
        )
        .unwrap();

        let settings = Settings::from_value(json!({
            "file_endings": {"linux": "so"},
            "plugins": {
                "Scene": {"code": "cmds.select('a')", "file": "scene.py"},
                "Bare": {"file": "../Scene/scene.py"}
            }
        }))
        .unwrap();
        let dispatcher = Dispatcher::new(&settings).with_os("linux");

        let command = dispatcher
            .build_test_command(&plugin_dir.join("src.cpp"))
            .unwrap();
        assert!(
            command.ends_with("cmds.select('a')\ndef setup():\n    return 1\nsetup()\n"),
            "{command}"
        );

        let bare_dir = dir.path().join("Bare");
        std::fs::create_dir(&bare_dir).unwrap();
        let command = dispatcher
            .build_test_command(&bare_dir.join("src.cpp"))
            .unwrap();
        assert!(
            command.contains("/Bare/Bare.so\");\ndef setup():\n"),
            "{command}"
        );
    }

    #[test]
    fn unload_command_only_unloads() {
        let settings = settings();
        let command = Dispatcher::new(&settings)
            .with_os("linux")
            .build(Action::Unload, Path::new("/proj/MyPlugin/src.py"))
            .unwrap();
        assert_eq!(
            command,
            "from maya import cmds, mel;cmds.unloadPlugin(\"MyPlugin\", f=True);"
        );
        assert!(!command.contains("loadPlugin(\"/"));
        assert!(!command.contains("select"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn free_functions_use_current_os() {
        let settings = settings();
        let file = Path::new("/proj/MyPlugin/src.py");
        assert_eq!(
            build_unload_command(file, &settings).unwrap(),
            "from maya import cmds, mel;cmds.unloadPlugin(\"MyPlugin\", f=True);"
        );
        assert!(
            build_test_command(file, &settings)
                .unwrap()
                .contains("cmds.loadPlugin(\"/proj/MyPlugin/MyPlugin.so\");")
        );
    }

    #[test]
    fn unknown_target_fails_before_connecting() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();

        let settings = settings();
        let layered = crate::settings::Overrides::new(&settings).set("port", port);
        let err = Dispatcher::new(&layered)
            .with_os("linux")
            .dispatch(Action::Test, Path::new("/proj/Unknown/src.py"), Unreachable)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Config(ConfigError::UnknownTarget(ref name)) if name == "Unknown"
        ));
        assert!(listener.accept().is_err(), "a connection was opened");
    }

    #[test]
    fn unsupported_platform_fails_before_connecting() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();

        let settings = settings();
        let layered = crate::settings::Overrides::new(&settings).set("port", port);
        for action in [Action::Test, Action::Unload] {
            let err = Dispatcher::new(&layered)
                .with_os("macos")
                .dispatch(action, Path::new("/proj/MyPlugin/src.py"), Unreachable)
                .unwrap_err();
            assert!(matches!(err, Error::UnsupportedPlatform(ref os) if os == "macos"));
        }
        assert!(listener.accept().is_err(), "a connection was opened");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_path_is_named_as_such() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let settings = settings();
        let file = Path::new(OsStr::from_bytes(b"/proj/MyPlugin/src\xff.py"));
        let err = Dispatcher::new(&settings)
            .with_os("linux")
            .build_test_command(file)
            .unwrap_err();
        assert!(
            matches!(err, Error::Config(ConfigError::NonUtf8Path(ref p)) if p == file),
            "{err}"
        );
        assert!(err.to_string().starts_with("path is not valid UTF-8: /proj/MyPlugin/src"));
    }

    #[test]
    fn payload_uses_configured_namespace() {
        let settings = settings();
        let layered = crate::settings::Overrides::new(&settings).set("namespace_key", "_dev_ns");
        let payload = Dispatcher::new(&layered)
            .with_os("linux")
            .payload(Action::Unload, Path::new("/proj/MyPlugin/src.py"))
            .unwrap();
        assert!(payload.render().contains("__main__.__dict__.get('_dev_ns')"));
        assert_eq!(
            payload.command(),
            "from maya import cmds, mel;cmds.unloadPlugin(\"MyPlugin\", f=True);"
        );
    }
}
