//! One-shot delivery of a payload to Maya's command port.
//!
//! Each send opens a fresh TCP connection, writes the rendered payload as a
//! single UTF-8 buffer, waits briefly so Maya starts reading, and closes.
//! Nothing is read back: output and tracebacks only show up in Maya.
//!
//! A failed send is reported once through the [`Reporter`] and then returned
//! to the caller. There are no retries.

use std::fmt;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::error::{ConfigError, TransmissionError};
use crate::payload::Payload;
use crate::settings::{self, SettingsProvider};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Characters of the command echoed to the log before sending.
const LOG_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn from_settings(settings: &dyn SettingsProvider) -> Result<Self, ConfigError> {
        Ok(Self::new(settings::host(settings)?, settings::port(settings)?))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Surfaces delivery failures to the user.
pub trait Reporter {
    fn error_message(&self, message: &str);
}

impl<R: Reporter + ?Sized> Reporter for &R {
    fn error_message(&self, message: &str) {
        (**self).error_message(message)
    }
}

/// Prints failures on stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn error_message(&self, message: &str) {
        eprintln!("{message}");
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub connect_timeout: Duration,
    /// Pause between writing and closing.
    pub grace_period: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            grace_period: GRACE_PERIOD,
        }
    }
}

pub struct Channel<R> {
    endpoint: Endpoint,
    config: ChannelConfig,
    reporter: R,
}

impl<R: Reporter> Channel<R> {
    pub fn new(endpoint: Endpoint, reporter: R) -> Self {
        Self::with_config(endpoint, ChannelConfig::default(), reporter)
    }

    pub fn with_config(endpoint: Endpoint, config: ChannelConfig, reporter: R) -> Self {
        Self {
            endpoint,
            config,
            reporter,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Deliver `payload`. Connecting and writing are each bounded by the
    /// connect timeout, followed by the grace period.
    pub fn send(&self, payload: &Payload) -> Result<(), TransmissionError> {
        self.log_command(payload);
        let buf = payload.render();
        let result = self.transmit(buf.as_bytes());
        self.finish(result, buf.len())
    }

    /// Async counterpart of [`Channel::send`] for callers on a tokio runtime.
    pub async fn send_async(&self, payload: &Payload) -> Result<(), TransmissionError> {
        self.log_command(payload);
        let buf = payload.render();
        let result = self.transmit_async(buf.as_bytes()).await;
        self.finish(result, buf.len())
    }

    fn transmit(&self, buf: &[u8]) -> io::Result<()> {
        let mut stream = self.connect()?;
        stream.set_write_timeout(Some(self.config.connect_timeout))?;
        tracing::trace!(endpoint = %self.endpoint, "Connected");

        stream.write_all(buf)?;
        stream.flush()?;
        std::thread::sleep(self.config.grace_period);
        Ok(())
        // `stream` closes on drop, on this and every error path.
    }

    /// Try each resolved address in turn, like a telnet client would.
    ///
    /// Every address gets the full connect timeout, so a host resolving to N
    /// unreachable addresses blocks for up to N times that.
    fn connect(&self) -> io::Result<TcpStream> {
        let addrs = (self.endpoint.host.as_str(), self.endpoint.port).to_socket_addrs()?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.config.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::trace!(%addr, error = %e, "Connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| self.unresolved()))
    }

    async fn transmit_async(&self, buf: &[u8]) -> io::Result<()> {
        let mut stream = self.connect_async().await?;
        tracing::trace!(endpoint = %self.endpoint, "Connected");

        let write = async {
            stream.write_all(buf).await?;
            stream.flush().await
        };
        tokio::time::timeout(self.config.connect_timeout, write)
            .await
            .map_err(|_| timed_out("write timed out"))??;
        tokio::time::sleep(self.config.grace_period).await;
        Ok(())
    }

    /// Same per-address policy as [`Channel::connect`].
    async fn connect_async(&self) -> io::Result<tokio::net::TcpStream> {
        let addrs =
            tokio::net::lookup_host((self.endpoint.host.as_str(), self.endpoint.port)).await?;
        let mut last_err = None;
        for addr in addrs {
            let attempt = tokio::net::TcpStream::connect(addr);
            let err = match tokio::time::timeout(self.config.connect_timeout, attempt).await {
                Ok(Ok(stream)) => return Ok(stream),
                Ok(Err(e)) => e,
                Err(_) => timed_out("connection timed out"),
            };
            tracing::trace!(%addr, error = %err, "Connect attempt failed");
            last_err = Some(err);
        }
        Err(last_err.unwrap_or_else(|| self.unresolved()))
    }

    fn unresolved(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} did not resolve to any address", self.endpoint.host),
        )
    }

    fn log_command(&self, payload: &Payload) {
        let command = payload.command();
        let preview: String = command.chars().take(LOG_PREVIEW_CHARS).collect();
        tracing::debug!(
            endpoint = %self.endpoint,
            command_len = command.len(),
            "Sending python: {preview:?}"
        );
    }

    fn finish(&self, result: io::Result<()>, len: usize) -> Result<(), TransmissionError> {
        match result {
            Ok(()) => {
                tracing::debug!(endpoint = %self.endpoint, bytes = len, "Payload sent");
                Ok(())
            }
            Err(source) => {
                let err =
                    TransmissionError::new(self.endpoint.host.clone(), self.endpoint.port, source);
                tracing::error!(
                    endpoint = %self.endpoint,
                    timed_out = err.is_timeout(),
                    error = %err.source,
                    "Send failed"
                );
                self.reporter.error_message(&err.to_string());
                Err(err)
            }
        }
    }
}

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, what)
}
