//! Wire payload for Maya's Python command port.
//!
//! The command travels as a Python string literal inside a small wrapper that
//! `exec`s it in a namespace kept alive in `__main__` between sends, so names
//! defined by one command are visible to the next. Exceptions are printed in
//! Maya's script editor and never reach us.

use std::fmt::Write as _;

use crate::settings::DEFAULT_NAMESPACE_KEY;

/// A command wrapped for remote execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    namespace_key: String,
    file_marker: String,
    command: String,
}

impl Payload {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            namespace_key: DEFAULT_NAMESPACE_KEY.to_string(),
            file_marker: String::new(),
            command: command.into(),
        }
    }

    pub fn with_namespace_key(mut self, key: impl Into<String>) -> Self {
        self.namespace_key = key.into();
        self
    }

    /// Value assigned to `__file__` inside the remote namespace.
    pub fn with_file_marker(mut self, marker: impl Into<String>) -> Self {
        self.file_marker = marker.into();
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn render(&self) -> String {
        let key = py_literal(&self.namespace_key);
        format!(
            "import traceback\n\
             import __main__\n\
             \n\
             namespace = __main__.__dict__.get({key})\n\
             if not namespace:\n\
             \x20   namespace = __main__.__dict__.copy()\n\
             \x20   __main__.__dict__[{key}] = namespace\n\
             \n\
             namespace['__file__'] = {marker}\n\
             \n\
             try:\n\
             \x20   exec({command}, namespace, namespace)\n\
             except:\n\
             \x20   traceback.print_exc()\n",
            marker = py_literal(&self.file_marker),
            command = py_literal(&self.command),
        )
    }
}

/// Python `repr()`-style literal: single quotes unless the text contains a
/// single quote and no double quote.
pub fn py_literal(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    quoted(text, quote)
}

/// Double-quoted Python literal, for arguments spliced into generated code.
pub fn py_double_quoted(text: &str) -> String {
    quoted(text, '"')
}

fn quoted(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let code = c as u32;
                if code <= 0xff {
                    let _ = write!(out, "\\x{code:02x}");
                } else {
                    let _ = write!(out, "\\u{code:04x}");
                }
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
