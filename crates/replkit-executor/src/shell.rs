//! Shell selection and resolution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Shells a command may run under.
///
/// Every command runs in a fresh, non-interactive shell instance via
/// `<shell> -c <command>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    #[default]
    Bash,
    Sh,
    Zsh,
}

impl Shell {
    /// The program name looked up on PATH.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Sh => "sh",
            Self::Zsh => "zsh",
        }
    }

    /// Resolve the shell to an absolute path.
    pub async fn resolve(self) -> Option<PathBuf> {
        which_async(self.program()).await
    }
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program())
    }
}

/// Default working directory for commands: the user's home directory.
#[must_use]
pub fn default_working_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// PATH lookup on the blocking pool.
pub(crate) async fn which_async(executable: &str) -> Option<PathBuf> {
    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()
        .and_then(Result::ok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sh_resolves_on_unix() {
        let path = Shell::Sh.resolve().await.expect("sh should exist");
        assert!(path.is_absolute());
    }

    #[tokio::test]
    async fn unknown_executable_does_not_resolve() {
        assert!(which_async("definitely-not-a-real-binary-7f3a").await.is_none());
    }

    #[test]
    fn shell_names_match_wire_values() {
        assert_eq!(serde_json::to_value(Shell::Bash).unwrap(), "bash");
        assert_eq!(
            serde_json::from_value::<Shell>(serde_json::json!("zsh")).unwrap(),
            Shell::Zsh
        );
    }
}
