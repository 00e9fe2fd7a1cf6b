//! Error types and reporting

use crate::ast::{LineIndex, Span};
use crate::interp::RuntimeError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, WmsError>;

/// Any failure a host can get back from this crate
#[derive(Debug, Error)]
pub enum WmsError {
    #[error("Lexer error at {line}:{column}: {message}")]
    Lexer {
        message: String,
        span: Span,
        line: u32,
        column: u32,
    },

    #[error("Syntax error at {line}:{column}: {message}")]
    Syntax {
        message: String,
        span: Span,
        line: u32,
        column: u32,
    },

    #[error("{0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

impl WmsError {
    pub fn lexer(message: impl Into<String>, span: Span, index: &LineIndex) -> Self {
        let (line, column) = index.line_col(span.start);
        Self::Lexer {
            message: message.into(),
            span,
            line,
            column,
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span, index: &LineIndex) -> Self {
        let (line, column) = index.line_col(span.start);
        Self::Syntax {
            message: message.into(),
            span,
            line,
            column,
        }
    }

    /// 1-based line the error points at, if any
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Lexer { line, .. } | Self::Syntax { line, .. } => Some(*line),
            Self::Runtime(e) => e.line,
            Self::Io(_) | Self::Config(_) => None,
        }
    }

    /// (line, column) for front-end errors
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            Self::Lexer { line, column, .. } | Self::Syntax { line, column, .. } => {
                Some((*line, *column))
            }
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Lexer { message, .. } | Self::Syntax { message, .. } => message.clone(),
            Self::Runtime(e) => e.message.clone(),
            Self::Io(e) => e.to_string(),
            Self::Config(e) => e.to_string(),
        }
    }

    fn span(&self, index: &LineIndex) -> Option<Span> {
        match self {
            Self::Lexer { span, .. } | Self::Syntax { span, .. } => Some(*span),
            Self::Runtime(e) => e.line.and_then(|line| index.line_span(line)),
            Self::Io(_) | Self::Config(_) => None,
        }
    }
}

/// Report error with ariadne
pub fn report_error(filename: &str, source: &str, error: &WmsError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        WmsError::Lexer { .. } => "Lexer",
        WmsError::Syntax { .. } => "Syntax",
        WmsError::Runtime(_) => "Runtime",
        WmsError::Io(_) => "IO",
        WmsError::Config(_) => "Config",
    };

    let index = LineIndex::new(source);
    let report = if let Some(span) = error.span(&index) {
        Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {}", error.message()))
            .finish()
    };

    if report.eprint((filename, Source::from(source))).is_err() {
        eprintln!("{kind} error: {}", error.message());
    }
}
