use thiserror::Error;

use super::Tool;

/// Longest stderr excerpt kept in a `NonZeroExit` error.
const STDERR_TAIL_CHARS: usize = 2000;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: Tool, secs: u64 },

    #[error("{tool} not found (looked for '{program}')")]
    NotFound { tool: Tool, program: String },

    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: Tool,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: Tool,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {}: {stderr}", describe_code(*.code))]
    NonZeroExit {
        tool: Tool,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (killed by signal)".to_string(),
    }
}

impl ToolError {
    /// Builds a `NonZeroExit`, keeping only the tail of a long stderr.
    pub fn non_zero_exit(tool: Tool, code: Option<i32>, stderr: &str) -> Self {
        let trimmed = stderr.trim();
        let char_count = trimmed.chars().count();
        let tail = if char_count > STDERR_TAIL_CHARS {
            trimmed
                .chars()
                .skip(char_count - STDERR_TAIL_CHARS)
                .collect()
        } else {
            trimmed.to_string()
        };
        ToolError::NonZeroExit {
            tool,
            code,
            stderr: if tail.is_empty() {
                "no error output".to_string()
            } else {
                tail
            },
        }
    }
}
