//! Privileged shell operations

use apkinst_errors::PlatformError;
use async_trait::async_trait;
use std::borrow::Cow;
use std::path::Path;
use tokio::io::AsyncRead;

use crate::core::{CommandResult, PlatformContext};

/// Byte stream fed into (or read out of) a privileged subprocess
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// Exit status and combined stdout/stderr lines of one shell command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub lines: Vec<String>,
}

impl ShellOutput {
    #[must_use]
    pub fn new(exit_code: i32, lines: Vec<String>) -> Self {
        Self { exit_code, lines }
    }

    /// Successful output with the given lines
    #[must_use]
    pub fn ok<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exit_code: 0,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Output lines joined with newlines
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl CommandResult for ShellOutput {
    fn exit_code(&self) -> i32 {
        self.exit_code
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Root shell used for everything the unprivileged process cannot do
///
/// Commands sent through [`run`](PrivilegedShell::run) execute one at a time
/// in a single long-lived shell. Streaming goes through dedicated
/// subprocesses so large payloads never pass through the command channel.
#[async_trait]
pub trait PrivilegedShell: Send + Sync {
    /// Run a script and capture its exit status and output lines
    async fn run(&self, ctx: &PlatformContext, script: &str) -> Result<ShellOutput, PlatformError>;

    /// Run `command` with `len` bytes from `input` on its stdin
    ///
    /// The subprocess is killed if the stream cannot be delivered in full.
    async fn pipe_to(
        &self,
        ctx: &PlatformContext,
        command: &str,
        input: ByteSource,
        len: u64,
    ) -> Result<ShellOutput, PlatformError>;

    /// Open a file the unprivileged process cannot read
    async fn open_read(&self, ctx: &PlatformContext, path: &Path) -> Result<ByteSource, PlatformError>;

    /// Tear the shell down; a no-op if it never started
    async fn close(&self, ctx: &PlatformContext) -> Result<(), PlatformError>;
}

/// Quote an argument for `sh`, leaving plain words untouched
#[must_use]
pub fn quote(arg: &str) -> Cow<'_, str> {
    // `~` only expands at the start of a word
    let plain = !arg.is_empty()
        && !arg.starts_with('~')
        && arg.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '/' | '.' | '_' | '-' | ':' | '=' | '+' | ',' | '@' | '~')
        });
    if plain {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_not_quoted() {
        assert_eq!(quote("/data/adb/Vanced/base.apk"), "/data/adb/Vanced/base.apk");
        assert_eq!(quote("u:object_r:apk_data_file:s0"), "u:object_r:apk_data_file:s0");
    }

    #[test]
    fn spaces_and_quotes_are_escaped() {
        assert_eq!(quote("my file.apk"), "'my file.apk'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn app_storage_paths_stay_plain() {
        assert_eq!(
            quote("/data/app/~~Xa1==/com.example-Yb2==/base.apk"),
            "/data/app/~~Xa1==/com.example-Yb2==/base.apk"
        );
        assert_eq!(quote("~/base.apk"), "'~/base.apk'");
    }

    #[test]
    fn glob_characters_are_quoted() {
        assert_eq!(quote("*youtube*"), "'*youtube*'");
    }
}
