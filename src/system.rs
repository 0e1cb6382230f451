//! Desktop actions: browser, web search and power off

use std::process::{Command, Stdio};

use crate::{Error, Result};

/// Page opened by the "browser" command
pub const DEFAULT_HOME_URL: &str = "https://google.com";

/// Search endpoint; the urlencoded query is appended
pub const DEFAULT_SEARCH_URL: &str = "https://www.google.com/search?q=";

/// System operations the assistant issues
pub trait SystemDomain: Send + Sync {
    /// # Errors
    ///
    /// Returns error if no browser could be launched
    fn open_browser(&self) -> Result<()>;

    /// # Errors
    ///
    /// Returns error if no browser could be launched
    fn search(&self, query: &str) -> Result<()>;

    /// Power the machine off
    ///
    /// # Errors
    ///
    /// Returns error if the shutdown command failed
    fn shutdown(&self) -> Result<()>;
}

/// [`SystemDomain`] backed by the desktop's URL opener and `shutdown`
#[derive(Debug, Clone)]
pub struct Desktop {
    home_url: String,
    search_url: String,
    allow_shutdown: bool,
}

impl Default for Desktop {
    fn default() -> Self {
        Self::new(DEFAULT_HOME_URL, DEFAULT_SEARCH_URL, false)
    }
}

impl Desktop {
    #[must_use]
    pub fn new(home_url: impl Into<String>, search_url: impl Into<String>, allow_shutdown: bool) -> Self {
        Self {
            home_url: home_url.into(),
            search_url: search_url.into(),
            allow_shutdown,
        }
    }

    /// URL opened for a search query
    #[must_use]
    pub fn search_link(&self, query: &str) -> String {
        format!("{}{}", self.search_url, urlencoding::encode(query.trim()))
    }

    fn open_url(url: &str) -> Result<()> {
        let mut command = opener_command(url);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let status = command
            .status()
            .map_err(|e| Error::System(format!("failed to launch browser: {e}")))?;
        if !status.success() {
            let code = status.code().unwrap_or(-1);
            return Err(Error::System(format!("browser opener exited with code {code}")));
        }
        tracing::info!(url, "opened in browser");
        Ok(())
    }
}

impl SystemDomain for Desktop {
    fn open_browser(&self) -> Result<()> {
        Self::open_url(&self.home_url)
    }

    fn search(&self, query: &str) -> Result<()> {
        Self::open_url(&self.search_link(query))
    }

    fn shutdown(&self) -> Result<()> {
        if !self.allow_shutdown {
            tracing::warn!("shutdown requested but disabled in config");
            return Ok(());
        }

        tracing::warn!("shutting the machine down");
        let output = shutdown_command()
            .output()
            .map_err(|e| Error::System(format!("failed to run shutdown: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::System(format!("shutdown failed: {stderr}")));
        }
        Ok(())
    }
}

#[cfg(target_os = "windows")]
fn opener_command(url: &str) -> Command {
    let mut c = Command::new("cmd");
    c.args(["/C", "start", "", url]);
    c
}

#[cfg(target_os = "macos")]
fn opener_command(url: &str) -> Command {
    let mut c = Command::new("open");
    c.arg(url);
    c
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn opener_command(url: &str) -> Command {
    let mut c = Command::new("xdg-open");
    c.arg(url);
    c
}

#[cfg(target_os = "windows")]
fn shutdown_command() -> Command {
    let mut c = Command::new("shutdown");
    c.args(["/s", "/t", "5"]);
    c
}

#[cfg(not(target_os = "windows"))]
fn shutdown_command() -> Command {
    let mut c = Command::new("shutdown");
    c.args(["-h", "now"]);
    c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_link_encodes_query() {
        let desktop = Desktop::default();
        assert_eq!(
            desktop.search_link(" погода завтра "),
            "https://www.google.com/search?q=%D0%BF%D0%BE%D0%B3%D0%BE%D0%B4%D0%B0%20%D0%B7%D0%B0%D0%B2%D1%82%D1%80%D0%B0"
        );
    }

    #[test]
    fn test_shutdown_disabled_is_noop() {
        let desktop = Desktop::default();
        assert!(desktop.shutdown().is_ok());
    }
}
