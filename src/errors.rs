use std::fmt;
use std::num::TryFromIntError;

use log::error;
use snafu::Snafu;

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

pub use crate::parsing::Error as ParsingError;

/// Error types
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid input"))]
    InvalidInput,
    #[snafu(display("invalid key length"))]
    InvalidKeyLength,
    #[snafu(display("cfb: invalid key iv length"))]
    CfbInvalidKeyIvLength,
    #[snafu(display("missing key"))]
    MissingKey,
    #[snafu(display("Not yet implemented: {message}"))]
    Unimplemented { message: String },
    /// Signals packet versions and parameters we don't support, but can safely ignore
    #[snafu(display("Unsupported: {message}"))]
    Unsupported { message: String },
    #[snafu(display("{message}"))]
    Message { message: String },
    /// Session key decoding failed. Deliberately carries no detail.
    #[snafu(display("decryption failed"))]
    DecryptionFailed,
    #[snafu(display("Modification Detection Code error"))]
    MdcError,
    #[snafu(display("quick check bytes mismatch"))]
    QuickCheck,
    #[snafu(display("invalid passphrase"))]
    InvalidPassphrase,
    #[snafu(display("invalid signature"))]
    InvalidSignature,
    #[snafu(display("signature creation out of order: expected {expected}, in {actual}"))]
    CreateState {
        expected: &'static str,
        actual: &'static str,
    },
    #[snafu(transparent)]
    IO { source: std::io::Error },
    #[snafu(transparent)]
    RSAError { source: rsa::errors::Error },
    #[snafu(transparent)]
    SignatureError { source: signature::Error },
    #[snafu(transparent)]
    Regex { source: regex::Error },
    #[snafu(transparent)]
    Utf8Error { source: std::str::Utf8Error },
    #[snafu(transparent)]
    TryFromInt { source: TryFromIntError },
    #[snafu(transparent)]
    PacketParsing { source: ParsingError },
}

impl Error {
    /// The [`ErrorStack`] classification of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Unsupported { .. } | Error::Unimplemented { .. } => {
                ErrorCode::UnsupportedAlgorithm
            }
            Error::PacketParsing { .. } | Error::Utf8Error { .. } | Error::TryFromInt { .. } => {
                ErrorCode::BadFormat
            }
            Error::IO { .. } => ErrorCode::Stream,
            Error::InvalidSignature | Error::SignatureError { .. } => ErrorCode::Validation,
            _ => ErrorCode::General,
        }
    }
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::CfbInvalidKeyIvLength
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::Message { message: err }
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::Message {
            message: err.to_string(),
        }
    }
}

#[macro_export]
macro_rules! unimplemented_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unimplemented { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unimplemented { message: format!($fmt, $($arg)+)})
    };
}

#[macro_export]
macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string()})
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

#[macro_export]
macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Message { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Message { message: format!($fmt, $($arg)+) })
    };
}

#[macro_export]
macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::Message { message: $e.to_string() }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::Message { message: format!($fmt, $($arg)+) }
    };
}

#[macro_export(local_inner_macros)]
macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            bail!($e);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            bail!($fmt, $($arg)+);
        }
    };
}

#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#, left_val, right_val)
                }
            }
        }
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    $crate::bail!(r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`: {}"#, left_val, right_val,
                           format_args!($($arg)+))
                }
            }
        }
    });
}

/// Pushes a record onto an [`ErrorStack`], capturing the call site.
#[macro_export]
macro_rules! push_error {
    ($stack:expr, $code:expr, $e:expr) => {
        $stack.push($code, None, file!(), line!(), $e.to_string())
    };
    ($stack:expr, $code:expr, $fmt:expr, $($arg:tt)+) => {
        $stack.push($code, None, file!(), line!(), format!($fmt, $($arg)+))
    };
}

/// Classification of records on the [`ErrorStack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorCode {
    #[display("general error")]
    General,
    #[display("out of memory")]
    OutOfMemory,
    #[display("bad format")]
    BadFormat,
    #[display("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[display("unexpected signature")]
    UnexpectedSignature,
    #[display("packet stream error")]
    Stream,
    #[display("key validation")]
    Validation,
}

/// A single recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub code: ErrorCode,
    pub errno: Option<i32>,
    pub file: &'static str,
    pub line: u32,
    pub message: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}: {}", self.file, self.line, self.code, self.message)?;
        if let Some(errno) = self.errno {
            write!(f, " (errno {errno})")?;
        }
        Ok(())
    }
}

/// Accumulates failures during parsing and validation without aborting.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorStack {
    records: Vec<ErrorRecord>,
}

impl ErrorStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        code: ErrorCode,
        errno: Option<i32>,
        file: &'static str,
        line: u32,
        message: String,
    ) {
        self.records.push(ErrorRecord {
            code,
            errno,
            file,
            line,
            message,
        });
    }

    /// Emits every record through the logger, oldest first.
    pub fn print_all(&self) {
        for record in &self.records {
            error!("{}", record);
        }
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.records.iter().any(|r| r.code == code)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter()
    }

    /// Moves all records of `other` onto this stack.
    pub fn append(&mut self, other: &mut ErrorStack) {
        self.records.append(&mut other.records);
    }
}
