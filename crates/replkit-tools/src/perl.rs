//! The `perl` file-rewrite tool.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use replkit_core::{Tool, ToolError, ToolReply};
use replkit_executor::{ExecError, PerlRewrite, rewrite_file};

use crate::render::Sections;

/// Modify files using Perl's text processing.
#[derive(Default)]
pub struct PerlTool;

#[derive(Deserialize)]
struct PerlArgs {
    file_path: String,
    perl_script: String,
}

impl PerlTool {
    /// Create the tool.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for PerlTool {
    fn name(&self) -> &'static str {
        "perl"
    }

    fn description(&self) -> &'static str {
        "Modify files using Perl's text processing capabilities.\n\n\
         Strict mode, warnings and UTF-8 handling are added automatically. \
         The input file content is available in the $content variable; write \
         substitutions against it and the modified content is written back.\n\n\
         Example patterns:\n\
         - Simple replace: $content =~ s/old/new/g;\n\
         - Multi-line replace: $content =~ s/old chunk.*?next chunk/new/s;\n\
         - Between markers: $content =~ s/(?<=after).*?(?=before)/new/s;"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to modify"
                },
                "perl_script": {
                    "type": "string",
                    "description": "Perl substitution commands to apply (without boilerplate)"
                }
            },
            "required": ["file_path", "perl_script"]
        })
    }

    async fn invoke(&self, args: Value) -> Result<ToolReply, ToolError> {
        let args: PerlArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let output = rewrite_file(PerlRewrite::new(args.file_path, args.perl_script))
            .await
            .map_err(|err| match err {
                ExecError::Configuration(msg) => ToolError::Configuration(msg),
                other => ToolError::Execution(other.to_string()),
            })?;

        let mut sections = Sections::new();
        sections.push_elapsed(output.elapsed);
        sections.push_block("Standard Output", &output.stdout);
        sections.push_block("Standard Error", &output.stderr);
        if output.exit_code != 0 {
            sections.push(format!("Return Value:\n{}", output.exit_code));
        }
        Ok(ToolReply::text(sections.finish()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn rewrite_reports_success() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alpha beta").unwrap();
        file.flush().unwrap();

        let tool = PerlTool::new();
        let reply = tool
            .invoke(serde_json::json!({
                "file_path": file.path().to_string_lossy(),
                "perl_script": "$content =~ s/beta/gamma/;"
            }))
            .await
            .unwrap();

        assert!(reply.text.contains("File modified successfully"));
        assert_eq!(
            std::fs::read_to_string(file.path()).unwrap(),
            "alpha gamma\n"
        );
    }

    #[tokio::test]
    async fn missing_file_is_a_configuration_error() {
        let tool = PerlTool::new();
        let err = tool
            .invoke(serde_json::json!({
                "file_path": "/nonexistent/replkit.txt",
                "perl_script": ""
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Configuration(_)));
    }
}
