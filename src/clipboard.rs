//! Clipboard access
//!
//! The controller only sees the [`Clipboard`] trait; [`SystemClipboard`]
//! is the arboard-backed implementation used by the app.

use anyhow::{Result, Context};
use arboard::Clipboard as Arboard;
#[cfg(target_os = "linux")]
use arboard::SetExtLinux;
#[cfg(target_os = "linux")]
use std::io::Write;
#[cfg(target_os = "linux")]
use std::process::{Command, ExitStatus, Stdio};
#[cfg(target_os = "linux")]
use std::thread::JoinHandle;

/// Platform clipboard capability
pub trait Clipboard: Send + Sync {
    fn get_text(&self) -> Result<String>;

    fn set_text(&self, text: &str) -> Result<()>;
}

/// Cross-platform system clipboard
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    /// Check if clipboard access is available
    pub fn is_available() -> bool {
        Arboard::new().is_ok()
    }

    /// Set the clipboard text, waiting for a clipboard manager to take
    /// ownership so the content outlives this process
    #[cfg(target_os = "linux")]
    fn set_text_blocking(text: &str) -> Result<()> {
        let mut clipboard = Arboard::new()
            .context("Failed to access clipboard")?;
        clipboard.set()
            .wait()
            .text(text.to_string())
            .context("Failed to set clipboard text")
    }

    /// Hand the text to xclip/xsel so the caller does not block until the
    /// selection is read
    #[cfg(target_os = "linux")]
    fn set_text_background(text: &str) -> Result<()> {
        let helpers: [(&str, &[&str]); 2] = [
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
        ];

        for (program, args) in helpers {
            if Self::pipe_to_helper(program, args, text)?.is_some() {
                return Ok(());
            }
        }

        // Last resort: blocks until the clipboard is read
        Self::set_text_blocking(text)
    }

    /// Write `text` to a helper's stdin. Returns `None` if the helper could
    /// not be started, otherwise the thread that reaps it once it exits.
    #[cfg(target_os = "linux")]
    fn pipe_to_helper(
        program: &str,
        args: &[&str],
        text: &str,
    ) -> Result<Option<JoinHandle<std::io::Result<ExitStatus>>>> {
        let Ok(mut child) = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            return Ok(None);
        };

        // Dropping stdin closes the pipe so the helper sees EOF
        let written = child
            .stdin
            .take()
            .map_or(Ok(()), |mut stdin| stdin.write_all(text.as_bytes()));

        // xclip stays alive while it owns the selection
        let reaper = std::thread::spawn(move || child.wait());
        written.with_context(|| format!("Failed to write to {}", program))?;
        Ok(Some(reaper))
    }
}

impl Clipboard for SystemClipboard {
    fn get_text(&self) -> Result<String> {
        let mut clipboard = Arboard::new()
            .context("Failed to access clipboard")?;
        clipboard.get_text()
            .context("Failed to get clipboard text")
    }

    #[cfg(target_os = "linux")]
    fn set_text(&self, text: &str) -> Result<()> {
        Self::set_text_background(text)
    }

    #[cfg(not(target_os = "linux"))]
    fn set_text(&self, text: &str) -> Result<()> {
        let mut clipboard = Arboard::new()
            .context("Failed to access clipboard")?;
        clipboard.set_text(text)
            .context("Failed to set clipboard text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipboard_available() {
        // Headless environments have no clipboard; this only checks it doesn't panic
        let _ = SystemClipboard::is_available();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_helper_process_is_reaped() {
        let reaper = SystemClipboard::pipe_to_helper("cat", &[], "hello")
            .unwrap()
            .expect("cat should start");
        let status = reaper.join().unwrap().unwrap();
        assert!(status.success());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_missing_helper_is_skipped() {
        let helper = SystemClipboard::pipe_to_helper("contentizer-no-such-helper", &[], "hello").unwrap();
        assert!(helper.is_none());
    }
}
