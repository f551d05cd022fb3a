//! Error handling for islet
//!
//! This module provides the error taxonomy of the rendering engine and user-friendly
//! error reporting for the CLI. The error system follows two principles:
//! 1. **Strongly-typed errors** so the router can map failures to responses
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Authoring defects**: [`IsletError::ComponentNotFound`], [`IsletError::Parse`],
//!   [`IsletError::TemplateMissing`], [`IsletError::Compile`]
//! - **Execution failures**: [`IsletError::CompileExecution`] (a generated module failed
//!   while being loaded) and [`IsletError::RenderExecution`] (a render function failed)
//! - **Collaborators**: [`IsletError::MissingParameter`] from the query builder
//! - **Input and environment**: [`IsletError::InvalidComponentId`], [`IsletError::Config`],
//!   [`IsletError::Io`]
//!
//! None of these are retried anywhere in the crate: each one describes a static defect in
//! component sources, request input or configuration.
//!
//! # Examples
//!
//! ```rust,no_run
//! use islet::core::{IsletError, user_friendly_error};
//!
//! let error = IsletError::TemplateMissing {
//!     id: "pages/index".to_string(),
//! };
//! assert_eq!(error.status_code(), 500);
//!
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::compiler::Diagnostic;

/// The main error type for islet operations.
///
/// Every variant that concerns a component carries the component id so the
/// router can report which unit of the page failed.
#[derive(Error, Debug)]
pub enum IsletError {
    /// A component location resolved to a file that does not exist.
    #[error("Component '{id}' not found at {}", path.display())]
    ComponentNotFound {
        /// Component id that was requested
        id: String,
        /// Location the id resolved to
        path: PathBuf,
    },

    /// The module parser rejected the component source.
    #[error("Failed to parse component '{id}': {}", summarize(diagnostics))]
    Parse {
        /// Component id
        id: String,
        /// Parser diagnostics
        diagnostics: Vec<Diagnostic>,
    },

    /// The component has no `<template>` section.
    #[error("Component '{id}' has no <template> section")]
    TemplateMissing {
        /// Component id
        id: String,
    },

    /// The template or script compiler reported error diagnostics.
    #[error("Failed to compile {stage} of component '{id}': {}", summarize(diagnostics))]
    Compile {
        /// Component id
        id: String,
        /// Which compiler failed ("template" or "script")
        stage: String,
        /// Compiler diagnostics
        diagnostics: Vec<Diagnostic>,
    },

    /// A generated module failed during module-level evaluation.
    #[error("Generated module for '{id}' failed to load: {reason}")]
    CompileExecution {
        /// Component id the module was generated for
        id: String,
        /// Failure reported by the module host
        reason: String,
    },

    /// A render function failed while producing HTML.
    #[error("Rendering component '{id}' failed: {reason}")]
    RenderExecution {
        /// Component id whose render function failed
        id: String,
        /// Failure reported by the render function
        reason: String,
    },

    /// The query builder found a placeholder with no bound value.
    #[error("Missing value for query parameter ':{name}'")]
    MissingParameter {
        /// Placeholder name without the leading colon
        name: String,
        /// The SQL text containing the placeholder
        sql: String,
    },

    /// A component id from outside the engine failed validation.
    #[error("Invalid component id '{id}': {reason}")]
    InvalidComponentId {
        /// The rejected id
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IsletError {
    /// HTTP status the router should answer with for this error.
    ///
    /// Missing components are 404, rejected input is 400, everything else is an
    /// authoring or server defect reported as 500.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ComponentNotFound { .. } => 404,
            Self::InvalidComponentId { .. } => 400,
            _ => 500,
        }
    }

    /// Component id the error concerns, if any.
    #[must_use]
    pub fn component_id(&self) -> Option<&str> {
        match self {
            Self::ComponentNotFound { id, .. }
            | Self::Parse { id, .. }
            | Self::TemplateMissing { id }
            | Self::Compile { id, .. }
            | Self::CompileExecution { id, .. }
            | Self::RenderExecution { id, .. }
            | Self::InvalidComponentId { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Diagnostics attached to parse and compile errors.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Parse { diagnostics, .. } | Self::Compile { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    match diagnostics {
        [] => "unknown error".to_string(),
        [single] => single.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// Wraps an [`IsletError`] with an optional suggestion and details, shown
/// by the CLI in color.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: IsletError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from an [`IsletError`].
    #[must_use]
    pub const fn new(error: IsletError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        for diagnostic in self.error.diagnostics().iter().skip(1) {
            eprintln!("  {} {}", "-".red(), diagnostic);
        }

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Walks the error chain looking for an [`IsletError`]; errors from other sources
/// are wrapped as configuration or IO errors with the full chain as details.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(islet_error) = cause.downcast_ref::<IsletError>() {
            return create_error_context(clone_for_display(islet_error));
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        return ErrorContext::new(IsletError::Io(std::io::Error::new(
            io_error.kind(),
            io_error.to_string(),
        )))
        .with_details(format!("{error:#}"));
    }

    ErrorContext::new(IsletError::Config {
        message: error.to_string(),
    })
    .with_details(format!("{error:#}"))
}

fn create_error_context(error: IsletError) -> ErrorContext {
    match &error {
        IsletError::ComponentNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Check the component id; run 'islet list' to see available components"),
        IsletError::Parse { .. } => ErrorContext::new(error).with_suggestion(
            "Each component may contain one <template>, one <script> or <script setup>, and any number of <style> blocks",
        ),
        IsletError::TemplateMissing { .. } => ErrorContext::new(error)
            .with_suggestion("Add a <template>...</template> block to the component"),
        IsletError::Compile { .. } => ErrorContext::new(error)
            .with_details("The template or script compiler rejected the component source"),
        IsletError::CompileExecution { .. } => ErrorContext::new(error)
            .with_details("The module generated from the component could not be evaluated"),
        IsletError::RenderExecution { .. } => ErrorContext::new(error).with_suggestion(
            "Check that every variable used by the template is assigned by the request logic or returned by setup",
        ),
        IsletError::MissingParameter { .. } => ErrorContext::new(error)
            .with_suggestion("Bind a value for every :name placeholder before building the query"),
        IsletError::InvalidComponentId { .. } => ErrorContext::new(error).with_details(
            "Component ids are root-relative paths without extension, e.g. 'pages/index'",
        ),
        IsletError::Config { .. } => ErrorContext::new(error)
            .with_suggestion("Check islet.toml or the --config/--root flags"),
        IsletError::Io(_) => ErrorContext::new(error),
    }
}

/// `IsletError` holds non-clonable sources, so rebuild an equivalent value for display.
fn clone_for_display(error: &IsletError) -> IsletError {
    match error {
        IsletError::ComponentNotFound { id, path } => IsletError::ComponentNotFound {
            id: id.clone(),
            path: path.clone(),
        },
        IsletError::Parse { id, diagnostics } => IsletError::Parse {
            id: id.clone(),
            diagnostics: diagnostics.clone(),
        },
        IsletError::TemplateMissing { id } => IsletError::TemplateMissing { id: id.clone() },
        IsletError::Compile {
            id,
            stage,
            diagnostics,
        } => IsletError::Compile {
            id: id.clone(),
            stage: stage.clone(),
            diagnostics: diagnostics.clone(),
        },
        IsletError::CompileExecution { id, reason } => IsletError::CompileExecution {
            id: id.clone(),
            reason: reason.clone(),
        },
        IsletError::RenderExecution { id, reason } => IsletError::RenderExecution {
            id: id.clone(),
            reason: reason.clone(),
        },
        IsletError::MissingParameter { name, sql } => IsletError::MissingParameter {
            name: name.clone(),
            sql: sql.clone(),
        },
        IsletError::InvalidComponentId { id, reason } => IsletError::InvalidComponentId {
            id: id.clone(),
            reason: reason.clone(),
        },
        IsletError::Config { message } => IsletError::Config {
            message: message.clone(),
        },
        IsletError::Io(e) => IsletError::Io(std::io::Error::new(e.kind(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::DiagnosticLevel;
    use anyhow::Context;

    #[test]
    fn test_status_codes() {
        let not_found = IsletError::ComponentNotFound {
            id: "pages/missing".to_string(),
            path: PathBuf::from("pages/missing.vue"),
        };
        assert_eq!(not_found.status_code(), 404);

        let invalid = IsletError::InvalidComponentId {
            id: "../etc".to_string(),
            reason: "path traversal".to_string(),
        };
        assert_eq!(invalid.status_code(), 400);

        let render = IsletError::RenderExecution {
            id: "pages/index".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(render.status_code(), 500);
    }

    #[test]
    fn test_compile_error_message_summarizes_diagnostics() {
        let error = IsletError::Compile {
            id: "components/card".to_string(),
            stage: "template".to_string(),
            diagnostics: vec![
                Diagnostic::error("element <div> is missing a closing tag"),
                Diagnostic::new(DiagnosticLevel::Error, "stray </span>"),
            ],
        };

        let message = error.to_string();
        assert!(message.contains("components/card"));
        assert!(message.contains("element <div> is missing a closing tag"));
        assert!(message.contains("and 1 more"));
        assert_eq!(error.component_id(), Some("components/card"));
    }

    #[test]
    fn test_user_friendly_error_finds_wrapped_islet_error() {
        let result: Result<(), IsletError> = Err(IsletError::TemplateMissing {
            id: "pages/about".to_string(),
        });
        let wrapped = result.context("Failed to render page").unwrap_err();

        let ctx = user_friendly_error(wrapped);
        assert!(matches!(ctx.error, IsletError::TemplateMissing { .. }));
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_user_friendly_error_wraps_foreign_errors() {
        let ctx = user_friendly_error(anyhow::anyhow!("something odd"));
        assert!(matches!(ctx.error, IsletError::Config { .. }));
        assert!(format!("{ctx}").contains("something odd"));
    }
}
