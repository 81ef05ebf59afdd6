//! Package file enumeration
//!
//! Directories handed over by other apps are often unreadable to the
//! installer process. In that case the listing comes from `ls -l` run in the
//! privileged shell and every entry is read back through it as well.

use apkinst_errors::InstallError;
use apkinst_events::{AppEvent, EventEmitter, InstallEvent};
use apkinst_platform::{quote, ByteSource, Platform, PlatformContext};
use apkinst_types::{FileEntry, FileSource};
use std::path::Path;

/// Enumerates candidate package files of a directory
#[derive(Clone, Debug)]
pub struct FileInventory {
    platform: Platform,
}

impl FileInventory {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// List the regular files of `directory`, sorted by name
    ///
    /// # Errors
    ///
    /// Returns `InventoryUnavailable` only when both the direct listing and
    /// the privileged `ls -l` fallback fail.
    pub async fn list(
        &self,
        ctx: &PlatformContext,
        directory: &Path,
    ) -> Result<Vec<FileEntry>, InstallError> {
        let (entries, privileged) = match list_direct(directory).await {
            Ok(entries) => (entries, false),
            Err(direct_err) => {
                tracing::debug!(
                    directory = %directory.display(),
                    error = %direct_err,
                    "direct listing failed, asking the privileged shell"
                );
                (self.list_privileged(ctx, directory, &direct_err).await?, true)
            }
        };

        ctx.emit(AppEvent::Install(InstallEvent::InventoryListed {
            directory: directory.to_path_buf(),
            entries: entries.len(),
            total_bytes: entries.iter().map(FileEntry::size_bytes).sum(),
            privileged,
        }));

        Ok(entries)
    }

    async fn list_privileged(
        &self,
        ctx: &PlatformContext,
        directory: &Path,
        direct_err: &std::io::Error,
    ) -> Result<Vec<FileEntry>, InstallError> {
        let unavailable = |message: String| InstallError::InventoryUnavailable {
            path: directory.display().to_string(),
            message: format!("{direct_err}; {message}"),
        };

        let script = format!("ls -l {}", quote(&directory.to_string_lossy()));
        let output = self
            .platform
            .shell()
            .run(ctx, &script)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !output.is_success() {
            return Err(unavailable(format!(
                "ls exited with {}: {}",
                output.exit_code,
                output.text()
            )));
        }

        Ok(parse_long_listing(directory, &output.lines))
    }
}

async fn list_direct(directory: &Path) -> std::io::Result<Vec<FileEntry>> {
    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(directory).await?;

    while let Some(entry) = dir.next_entry().await? {
        let path = entry.path();
        let Ok(metadata) = tokio::fs::metadata(&path).await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(FileEntry::new(name, metadata.len(), FileSource::Direct(path)));
    }

    entries.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(entries)
}

/// Parse `ls -l` output into privileged inventory entries
///
/// Column layout differs between toolbox, toybox and busybox, so only two
/// things are relied on: the size is the fifth field and the file name
/// follows the first `HH:MM` token after it.
pub fn parse_long_listing<S: AsRef<str>>(directory: &Path, lines: &[S]) -> Vec<FileEntry> {
    let mut entries: Vec<FileEntry> = lines
        .iter()
        .filter_map(|line| parse_listing_line(line.as_ref()))
        .map(|(name, size)| {
            let path = directory.join(&name);
            FileEntry::new(name, size, FileSource::Privileged(path))
        })
        .collect();

    entries.sort_by(|a, b| a.name().cmp(b.name()));
    entries
}

fn parse_listing_line(line: &str) -> Option<(String, u64)> {
    let tokens = tokenize(line);
    // at least four whitespace runs
    if tokens.len() < 5 {
        return None;
    }

    let (_, permissions) = tokens[0];
    if permissions.starts_with(['d', 'l']) {
        return None;
    }

    let size = tokens[4].1.parse::<u64>().ok()?;

    let (offset, time) = tokens[5..].iter().find(|(_, token)| is_clock(token))?;
    let name = line[offset + time.len()..].trim_start();
    if name.is_empty() {
        return None;
    }

    Some((name.to_string(), size))
}

/// Whitespace-separated tokens with their byte offsets
fn tokenize(line: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (idx, c) in line.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                tokens.push((s, &line[s..idx]));
                start = None;
            }
            (false, None) => start = Some(idx),
            _ => {}
        }
    }
    if let Some(s) = start {
        tokens.push((s, &line[s..]));
    }

    tokens
}

fn is_clock(token: &str) -> bool {
    let Some((hours, minutes)) = token.split_once(':') else {
        return false;
    };
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return false;
    }
    matches!((hours.parse::<u8>(), minutes.parse::<u8>()), (Ok(h), Ok(m)) if h < 24 && m < 60)
}

/// Open the bytes behind an inventory entry
pub(crate) async fn open_entry(
    platform: &Platform,
    ctx: &PlatformContext,
    entry: &FileEntry,
) -> Result<ByteSource, String> {
    match entry.source() {
        FileSource::Direct(path) => tokio::fs::File::open(path)
            .await
            .map(|file| Box::new(file) as ByteSource)
            .map_err(|e| format!("{}: {e}", path.display())),
        FileSource::Privileged(path) => platform
            .shell()
            .open_read(ctx, path)
            .await
            .map_err(|e| e.to_string()),
    }
}
