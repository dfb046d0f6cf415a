//! Error types for attrconf
//!
//! Errors are structured: a kind, the config key the error concerns,
//! an optional cause and an actionable help message.

use std::fmt;

/// Result type alias for attrconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for attrconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Key in the config where the error occurred (e.g., "model.lr")
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The null sentinel was used as a key
    InvalidKey,
    /// A placeholder refers to the key that owns it
    SelfReference,
    /// Placeholders form a cycle
    CircularReference {
        /// The keys along the cycle, first key repeated at the end
        chain: Vec<String>,
    },
    /// A placeholder names a key that does not exist
    MissingReference {
        /// The name that could not be found
        name: String,
    },
    /// Plain read of a key that does not exist
    KeyNotFound,
    /// A value could not be coerced to its declared type
    TypeMismatch,
    /// A variable cell rejected a value
    Validation,
    /// Opt-in expression evaluation failed
    Eval,
    /// Text could not be parsed (YAML/JSON input, annotation text)
    Parse,
    /// Nesting deeper than the configured recursion guard
    DepthExceeded,
    /// Internal error (bug in attrconf)
    Internal,
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            help: None,
            cause: None,
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            help: Some(format!("'{}' marks an absent value and cannot be a key", key)),
            path: Some(key),
            ..Self::new(ErrorKind::InvalidKey)
        }
    }

    /// Create a self reference error
    pub fn self_reference(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            cause: Some(format!("Cannot interpolate {} to itself", key)),
            help: Some("Reference a different key or use a literal value".into()),
            path: Some(key),
            ..Self::new(ErrorKind::SelfReference)
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(chain: Vec<String>) -> Self {
        let chain_str = chain.join("->");
        Self {
            path: chain.first().cloned(),
            help: Some("Break the circular dependency by removing one of the references".into()),
            cause: Some(format!("Chain: {}", chain_str)),
            ..Self::new(ErrorKind::CircularReference { chain })
        }
    }

    /// Create a missing reference error
    ///
    /// `referrer` is the key holding the placeholder, `scope` a rendering of
    /// the mapping the name was looked up in.
    pub fn missing_reference(
        name: impl Into<String>,
        referrer: Option<String>,
        scope: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            path: referrer,
            help: Some(format!(
                "Check that '{}' exists in the configuration",
                name
            )),
            cause: Some(format!("{} is not found in {}", name, scope.into())),
            ..Self::new(ErrorKind::MissingReference { name })
        }
    }

    /// Create a key not found error
    pub fn key_not_found(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            help: Some(format!("Check that '{}' exists in the configuration", key)),
            path: Some(key),
            ..Self::new(ErrorKind::KeyNotFound)
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self {
            help: Some(format!(
                "Ensure the value can be converted to {}",
                expected.into()
            )),
            cause: Some(format!("Got: {}", got.into())),
            ..Self::new(ErrorKind::TypeMismatch)
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            help: Some("Assign a value accepted by the variable's constraints".into()),
            ..Self::new(ErrorKind::Validation)
        }
    }

    /// Create an evaluation error
    pub fn eval(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            cause: Some(format!("{} (in {:?})", message.into(), expression.into())),
            help: Some("Disable unsafe_eval or fix the expression".into()),
            ..Self::new(ErrorKind::Eval)
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Parse)
        }
    }

    /// Create a depth exceeded error
    pub fn depth_exceeded(limit: usize) -> Self {
        Self {
            cause: Some(format!("Nesting exceeds {} levels", limit)),
            help: Some("Flatten the configuration or raise ConfigOptions::max_depth".into()),
            ..Self::new(ErrorKind::DepthExceeded)
        }
    }

    /// Create an internal error (bug in attrconf)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            help: Some("This is likely a bug in attrconf. Please report it.".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Internal)
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::InvalidKey => write!(f, "Invalid key")?,
            ErrorKind::SelfReference => write!(f, "Self reference detected")?,
            ErrorKind::CircularReference { .. } => write!(f, "Circular reference detected")?,
            ErrorKind::MissingReference { name } => {
                write!(f, "Referenced key not found: {}", name)?
            }
            ErrorKind::KeyNotFound => write!(f, "Key not found")?,
            ErrorKind::TypeMismatch => write!(f, "Type mismatch")?,
            ErrorKind::Validation => write!(f, "Validation error")?,
            ErrorKind::Eval => write!(f, "Evaluation error")?,
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::DepthExceeded => write!(f, "Maximum nesting depth exceeded")?,
            ErrorKind::Internal => write!(f, "Internal error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
