//! Error types for the taskloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all taskloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Oracle errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Command session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Step loop errors ---
    #[error("Cannot run agent from state: {0}")]
    InvalidState(crate::agent::AgentState),

    #[error("Tool calls required but none provided")]
    ToolCallRequired,

    #[error("Agent run timed out after {timeout:?}")]
    Timeout { timeout: std::time::Duration },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Plan(#[from] PlanError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Editor(#[from] EditorError),

    #[error("Cannot combine tool results: `{0}` is set on both sides")]
    CannotCombine(&'static str),
}

/// Errors raised by a persistent command session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Session has not started.")]
    NotStarted,

    #[error("bash has exited with returncode {code}")]
    Exited { code: i32 },

    #[error("timed out: bash has not returned in {timeout_secs} seconds and must be restarted")]
    TimedOut { timeout_secs: f64 },

    #[error("Session I/O failed: {0}")]
    Io(String),
}

/// What the owner of a session should do after a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDisposition {
    /// Report the error; the session can keep serving commands.
    Recoverable,
    /// The session is unusable and has to be discarded and recreated.
    MustRestart,
}

impl SessionError {
    pub fn disposition(&self) -> SessionDisposition {
        match self {
            SessionError::NotStarted => SessionDisposition::Recoverable,
            SessionError::Exited { .. } | SessionError::TimedOut { .. } | SessionError::Io(_) => {
                SessionDisposition::MustRestart
            }
        }
    }
}

/// Errors raised by plan commands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Parameter `{param}` is required for command: {command}")]
    MissingParameter {
        param: &'static str,
        command: &'static str,
    },

    #[error("Parameter `steps` must be a non-empty list of strings for command: {0}")]
    InvalidSteps(&'static str),

    #[error("A plan with ID '{0}' already exists. Use 'update' to modify existing plans.")]
    AlreadyExists(String),

    #[error("No plan found with ID: {0}")]
    NotFound(String),

    #[error("No active plan. Please specify a plan_id or set an active plan.")]
    NoActivePlan,

    #[error("Invalid step_index: {index}. Valid indices range from 0 to {last}.")]
    InvalidStepIndex { index: i64, last: i64 },

    #[error(
        "Invalid step_status: {0}. Valid statuses are: not_started, in_progress, completed, blocked"
    )]
    InvalidStepStatus(String),

    #[error(
        "Unrecognized command: {0}. Allowed commands are: create, update, list, get, set_active, mark_step, delete"
    )]
    UnknownCommand(String),
}

/// Errors raised by the file editor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error(
        "The path {path} is not an absolute path, it should start with `/`. Maybe you meant {suggestion}?"
    )]
    NotAbsolute { path: String, suggestion: String },

    #[error("The path {0} does not exist. Please provide a valid path.")]
    NotFound(String),

    #[error("File already exists at: {0}. Cannot overwrite files using command `create`.")]
    AlreadyExists(String),

    #[error(
        "The path {0} is a directory and only the `view` command can be used on directories"
    )]
    IsDirectory(String),

    #[error("The `view_range` parameter is not allowed when `path` points to a directory.")]
    ViewRangeOnDirectory,

    #[error("Invalid `view_range`: {0}")]
    InvalidViewRange(String),

    #[error("Parameter `{param}` is required for command: {command}")]
    MissingParameter {
        param: &'static str,
        command: &'static str,
    },

    #[error("No replacement was performed, old_str `{old_str}` did not appear verbatim in {path}.")]
    NoMatch { old_str: String, path: String },

    #[error(
        "No replacement was performed. Multiple occurrences of old_str `{old_str}` in lines {lines:?}. Please ensure it is unique"
    )]
    MultipleMatches { old_str: String, lines: Vec<usize> },

    #[error(
        "Invalid `insert_line` parameter: {line}. It should be within the range of lines of the file: [0, {max}]"
    )]
    InvalidInsertLine { line: i64, max: usize },

    #[error("No edit history found for {0}.")]
    NoHistory(String),

    #[error("Ran into {reason} while trying to {action} {path}")]
    Io {
        action: &'static str,
        path: String,
        reason: String,
    },

    #[error(
        "Unrecognized command {0}. The allowed commands for the str_replace_editor tool are: view, create, str_replace, insert, undo_edit"
    )]
    UnknownCommand(String),
}
