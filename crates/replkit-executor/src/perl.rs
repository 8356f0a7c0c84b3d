//! Perl-based file rewriting.
//!
//! Avoids shell-escaping hazards by writing the substitution script to a
//! temporary file and feeding the target file on stdin. The original file
//! is only touched after the script succeeds with non-empty output.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::process::Command;

use replkit_core::CommandOutput;

use crate::command::ExecError;
use crate::shell::which_async;

/// Boilerplate wrapped around the user substitution. The file content is
/// available in `$content`; trailing horizontal whitespace is stripped
/// from the result.
const SCRIPT_TEMPLATE: &str = r#"#!/usr/bin/env perl
use strict;
use warnings;
no warnings 'uninitialized';
use utf8;
binmode(STDIN, ':utf8');
binmode(STDOUT, ':utf8');
local $/;
my $content = <>;

{script}

$content =~ s/[ \t]+$//mg;

print $content;
"#;

/// A file-rewrite request.
#[derive(Debug, Clone)]
pub struct PerlRewrite {
    /// File to modify in place.
    pub file_path: PathBuf,
    /// Perl substitution commands, without boilerplate.
    pub script: String,
}

impl PerlRewrite {
    /// Create a rewrite request.
    #[must_use]
    pub fn new<P: Into<PathBuf>, S: Into<String>>(file_path: P, script: S) -> Self {
        Self {
            file_path: file_path.into(),
            script: script.into(),
        }
    }
}

/// Apply a Perl substitution script to a file.
///
/// On success the file is rewritten and the output reports
/// "File modified successfully". Script failures and empty output are
/// reported through the output's `stderr`/`exit_code` and leave the file
/// untouched. Perl's "Wide character" warnings are tolerated.
///
/// # Errors
/// `Configuration` when the target file does not exist or `perl` cannot
/// be resolved; `Spawn`/`Io` for process-level failures.
pub async fn rewrite_file(request: PerlRewrite) -> Result<CommandOutput, ExecError> {
    if tokio::fs::metadata(&request.file_path).await.is_err() {
        return Err(ExecError::Configuration(format!(
            "file does not exist: {}",
            request.file_path.display()
        )));
    }

    let perl = which_async("perl")
        .await
        .ok_or_else(|| ExecError::Configuration("perl not found".to_string()))?;

    let dir = tempfile::tempdir()?;
    let script_path = dir.path().join("modify.pl");
    tokio::fs::write(
        &script_path,
        SCRIPT_TEMPLATE.replace("{script}", &request.script),
    )
    .await?;

    let started = Instant::now();
    let output = run_script(&perl, &script_path, &request.file_path).await?;
    let elapsed = started.elapsed();

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let wide_only = !stderr.is_empty() && stderr.contains("Wide character");

    if output.status.success() || wide_only {
        let modified = String::from_utf8_lossy(&output.stdout).into_owned();
        if modified.is_empty() {
            return Ok(CommandOutput {
                stdout: String::new(),
                stderr: "perl script produced empty output".to_string(),
                exit_code: 1,
                elapsed,
            });
        }
        tokio::fs::write(&request.file_path, modified).await?;
        Ok(CommandOutput {
            stdout: "File modified successfully".to_string(),
            stderr: String::new(),
            exit_code: 0,
            elapsed,
        })
    } else {
        Ok(CommandOutput {
            stdout: String::new(),
            stderr,
            exit_code: output.status.code().unwrap_or(1),
            elapsed,
        })
    }
}

async fn run_script(
    perl: &Path,
    script_path: &Path,
    file_path: &Path,
) -> Result<std::process::Output, ExecError> {
    let input = std::fs::File::open(file_path)?;
    Command::new(perl)
        .arg(script_path)
        .stdin(std::process::Stdio::from(input))
        .output()
        .await
        .map_err(ExecError::Spawn)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn substitution_rewrites_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hello old world").unwrap();
        file.flush().unwrap();

        let output = rewrite_file(PerlRewrite::new(
            file.path(),
            "$content =~ s/old/new/g;",
        ))
        .await
        .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, "File modified successfully");
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "hello new world\n");
    }

    #[tokio::test]
    async fn failing_script_leaves_the_file_untouched() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "original").unwrap();
        file.flush().unwrap();

        let output = rewrite_file(PerlRewrite::new(file.path(), "die 'boom';"))
            .await
            .unwrap();

        assert_ne!(output.exit_code, 0);
        assert!(output.stderr.contains("boom"));
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "original\n");
    }

    #[tokio::test]
    async fn missing_file_is_a_configuration_error() {
        let err = rewrite_file(PerlRewrite::new("/nonexistent/replkit.txt", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Configuration(_)));
    }
}
