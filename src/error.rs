//! # Error Handling
//!
//! This module defines the centralized error type for `stitch`. It uses
//! `thiserror` to build a single `Error` enum covering every failure the
//! composition engine can report, grouped the same way the engine thinks
//! about them:
//!
//! - **Parse errors**: malformed links, refs, regexes, globs, and structured
//!   files. These always carry the offending raw input.
//! - **Resolution errors**: registry or redirect lookup failures and targets
//!   that cannot be located.
//! - **Conflict errors**: option values that disagree across sources,
//!   duplicate assigns, duplicate declarations, and duplicate result writes.
//! - **Validation errors**: invalid identifiers, choice violations, empty
//!   required values, and type mismatches (including during config merge).
//! - **Collision errors**: two distinct source files claiming one output
//!   target.
//!
//! Errors are wrapped with contextual key/value pairs as they travel up
//! through the loader (see [`ResultExt::with_context`]), so the final message
//! shows the full chain from the project that failed down to the root cause.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for stitch operations
#[derive(Error, Debug)]
pub enum Error {
    /// A project link could not be parsed.
    #[error("Invalid link '{raw}': {message}")]
    LinkParse { raw: String, message: String },

    /// A git ref inside a link could not be parsed.
    #[error("Invalid ref '{raw}': {message}")]
    RefParse { raw: String, message: String },

    /// A project, registry, or option name does not match the required pattern.
    #[error("Invalid {kind} name '{name}': must match {pattern}")]
    InvalidName {
        kind: &'static str,
        name: String,
        pattern: &'static str,
    },

    /// No registry rule matched a registry link.
    #[error("Registry not found for link '{raw}': no rule named '{name}' matched")]
    RegistryNotFound { raw: String, name: String },

    /// A link was parsed but could not be resolved to a location.
    #[error("Failed to resolve link '{raw}': {message}")]
    Resolve { raw: String, message: String },

    /// A structured file (or project declaration) does not exist.
    #[error("Not found: {what} in {}", dir.display())]
    NotFound { what: String, dir: PathBuf },

    /// A structured file exists but could not be parsed.
    #[error("Failed to parse {}: {message}", path.display())]
    StructuredParse { path: PathBuf, message: String },

    /// A project declaration or profile has an invalid shape.
    #[error("Invalid settings in {}: {message}{}", path.display(), hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    SettingParse {
        path: PathBuf,
        message: String,
        /// Optional hint for how to fix the declaration
        hint: Option<String>,
    },

    /// A command-line override could not be parsed.
    #[error("Invalid {flag} value '{value}': {message}")]
    InvalidOverride {
        flag: &'static str,
        value: String,
        message: String,
    },

    /// Two sources produced different values for one option.
    #[error("Option conflict for {project}.{option}: {first_source} value {first_value} != {second_source} value {second_value}")]
    OptionConflict {
        project: String,
        option: String,
        first_source: String,
        first_value: String,
        second_source: String,
        second_value: String,
    },

    /// An exported value has a type that does not fit the declaration.
    #[error("Export '{key}' has type {actual}, but {project}.{option} is declared as {expected}")]
    ExportTypeConflict {
        key: String,
        project: String,
        option: String,
        expected: String,
        actual: String,
    },

    /// Two assigns target the same project option.
    #[error("Duplicate assign to {project}.{option}: already assigned by {first}, assigned again by {second}")]
    DuplicateAssign {
        project: String,
        option: String,
        first: String,
        second: String,
    },

    /// A name is declared twice within one namespace.
    #[error("Duplicate {kind} '{name}' in project {project}")]
    DuplicateDeclaration {
        kind: &'static str,
        name: String,
        project: String,
    },

    /// A result was recorded twice for one project option.
    #[error("Result for {project}.{option} is already recorded")]
    DuplicateResult { project: String, option: String },

    /// A required option ended up without a value.
    #[error("Option value empty: {project}.{option} has no export, assign, compute or default value")]
    OptionEmpty { project: String, option: String },

    /// A value is not one of the declared choices.
    #[error("Invalid value {value} for {project}.{option}: expected one of [{choices}]")]
    InvalidChoice {
        project: String,
        option: String,
        value: String,
        choices: String,
    },

    /// A value could not be cast to the declared option type.
    #[error("Type mismatch: cannot use {value} as {expected}")]
    TypeMismatch { expected: String, value: String },

    /// The config merge met incompatible value shapes at one key.
    #[error("Config merge error in {file} at '{key}': {message}")]
    MergeType {
        file: String,
        key: String,
        message: String,
    },

    /// Two different source files map to the same output target.
    #[error("Target collision at '{target}': {} and {} both produce it", first.display(), second.display())]
    TargetCollision {
        target: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// An expression or template failed to evaluate.
    #[error("Template error in '{source_text}': {message}")]
    Template { source_text: String, message: String },

    /// An error occurred while cloning a Git repository.
    #[error("Git clone error for {url}@{r#ref}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    GitClone {
        url: String,
        r#ref: String,
        message: String,
        /// Optional hint for how to resolve the clone issue
        hint: Option<String>,
    },

    /// An error occurred while executing a Git command.
    #[error("Git command failed for {url}: {command} - {stderr}")]
    GitCommand {
        command: String,
        url: String,
        stderr: String,
    },

    /// The executor could not be selected or launched.
    #[error("Executor error: {executor} - {message}")]
    Executor { executor: String, message: String },

    /// An error wrapped with the context it travelled through.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A directory walk failed.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    /// Wrap this error with a context description.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error of a context chain.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Key/value pairs describing where an error happened.
///
/// Rendered as `key=value, key=value` in front of the wrapped error.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pairs: Vec<(&'static str, String)>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.pairs.push((key, value.to_string()));
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .pairs
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        write!(f, "{}", rendered.join(", "))
    }
}

/// Extension trait for attaching an [`ErrorContext`] to a result.
pub trait ResultExt<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> ErrorContext;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> ErrorContext,
    {
        self.map_err(|err| err.context(f().to_string()))
    }
}
