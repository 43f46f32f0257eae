use crate::span::Span;
use crate::ty::Signature;
use miette::Diagnostic;
use std::fmt;
use std::path::PathBuf;
use std::result;
use thiserror::Error;

/// Coarse classification of [`Error`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Parse,
    UnresolvedSymbol,
    Eval,
    SymbolRegistry,
    InvalidDescriptor,
    MethodNotFound,
    SignatureMismatch,
    Redirection,
    PanicRecovered,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Io => "IOError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::UnresolvedSymbol => "UnresolvedSymbolError",
            ErrorKind::Eval => "EvalError",
            ErrorKind::SymbolRegistry => "SymbolRegistryError",
            ErrorKind::InvalidDescriptor => "InvalidDescriptorError",
            ErrorKind::MethodNotFound => "MethodNotFoundError",
            ErrorKind::SignatureMismatch => "SignatureMismatchError",
            ErrorKind::Redirection => "RedirectionError",
            ErrorKind::PanicRecovered => "PanicRecoveredError",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("cannot read script {}: {source}", .path.display())]
    #[diagnostic(code(hotfix::io), help("check that the script path exists and is readable"))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {origin} at {span}: {message}")]
    #[diagnostic(code(hotfix::parse))]
    Parse {
        origin: String,
        message: String,
        span: Span,
    },

    #[error("unresolved symbol `{name}`{}", at(.span))]
    #[diagnostic(
        code(hotfix::unresolved_symbol),
        help("the name is not declared in the script and no registered package exports it")
    )]
    UnresolvedSymbol { name: String, span: Option<Span> },

    #[error("evaluation failed{}: {message}", at(.span))]
    #[diagnostic(code(hotfix::eval))]
    Eval { message: String, span: Option<Span> },

    #[error("invalid symbol set: {0}")]
    #[diagnostic(code(hotfix::symbol_registry))]
    SymbolRegistry(String),

    #[error("invalid patch descriptor: {0}")]
    #[diagnostic(
        code(hotfix::invalid_descriptor),
        help("the expression must evaluate to `hotfix::FuncPatch {{ target, method, replacement }}`")
    )]
    InvalidDescriptor(String),

    #[error("type `{owner}` has no method `{method}`")]
    #[diagnostic(code(hotfix::method_not_found))]
    MethodNotFound {
        owner: String,
        method: String,
        #[help]
        available: Option<String>,
    },

    #[error("signature mismatch for `{target}`: expected `{expected}`, found `{found}`")]
    #[diagnostic(code(hotfix::signature_mismatch))]
    SignatureMismatch {
        target: String,
        expected: Signature,
        found: String,
    },

    #[error("redirection failed: {0}")]
    #[diagnostic(code(hotfix::redirection))]
    Redirection(String),

    #[error("panic recovered: {message}")]
    #[diagnostic(code(hotfix::panic_recovered))]
    PanicRecovered { message: String, trace: String },
}

fn at(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(" at {span}"),
        None => String::new(),
    }
}

impl Error {
    pub fn eval(message: impl Into<String>) -> Self {
        Error::Eval {
            message: message.into(),
            span: None,
        }
    }

    pub fn eval_at(message: impl Into<String>, span: Span) -> Self {
        Error::Eval {
            message: message.into(),
            span: Some(span),
        }
    }

    pub fn unresolved(name: impl Into<String>, span: Option<Span>) -> Self {
        Error::UnresolvedSymbol {
            name: name.into(),
            span,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io { .. } => ErrorKind::Io,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::UnresolvedSymbol { .. } => ErrorKind::UnresolvedSymbol,
            Error::Eval { .. } => ErrorKind::Eval,
            Error::SymbolRegistry(_) => ErrorKind::SymbolRegistry,
            Error::InvalidDescriptor(_) => ErrorKind::InvalidDescriptor,
            Error::MethodNotFound { .. } => ErrorKind::MethodNotFound,
            Error::SignatureMismatch { .. } => ErrorKind::SignatureMismatch,
            Error::Redirection(_) => ErrorKind::Redirection,
            Error::PanicRecovered { .. } => ErrorKind::PanicRecovered,
        }
    }

    /// Attach `span` to evaluation and resolution errors that do not carry one yet.
    pub fn with_span(self, span: Span) -> Self {
        match self {
            Error::Eval {
                message,
                span: None,
            } => Error::Eval {
                message,
                span: Some(span),
            },
            Error::UnresolvedSymbol { name, span: None } => Error::UnresolvedSymbol {
                name,
                span: Some(span),
            },
            other => other,
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

// Host native functions may bubble up arbitrary errors through eyre
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::eval(format!("{err:#}"))
    }
}
