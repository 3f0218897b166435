/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::fmt::Display;
use std::io::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
/// Well-defined errors for bad things that are expected to happen while decoding an image
pub enum ExitCode {
    /// Assertion failure, which probably indicates a bug in the library or a panicking sink.
    AssertionFailure = 1,

    /// The input ended before a required marker, segment or entropy coded bit was read.
    TruncatedInput = 3,

    /// The JPEG is valid but uses something outside of what this decoder handles
    /// (progressive, arithmetic coding, unsupported subsampling or component count).
    UnsupportedFormat = 4,

    /// The JPEG is structurally invalid: bad segment, bad zero run, restart marker
    /// mismatch or a Huffman table that overflows its code space.
    MalformedStream = 5,

    /// A Huffman code was read that doesn't match any code of length 16 or less.
    MalformedHuffmanCode = 6,

    /// An error was returned by an IO operation, for example if the byte source
    /// passed in returned an error.
    OsError = 33,

    /// An error occurred while sending a message to the pipeline worker.
    ChannelFailure = 103,

    /// Caller passed in invalid parameters or called an operation in the wrong state
    InvalidParameter = 1006,

    /// The file to be read was not found (only used by utility exe)
    FileNotFound = 1007,

    /// the table arena is too small for the tables in the image
    OutOfMemory = 2000,
}

impl Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ExitCode {
    /// Converts the error code into an integer for use as a process exit code.
    pub fn as_integer_error_code(self) -> i32 {
        self as i32
    }
}

/// Since errors are rare and stop everything, we want them to be as lightweight as possible.
#[derive(Debug, Clone)]
struct DecodeErrorInternal {
    exit_code: ExitCode,
    message: String,
}

/// Standard error returned by the decoder
#[derive(Debug, Clone)]
pub struct DecodeError {
    i: Box<DecodeErrorInternal>,
}

pub type Result<T> = std::result::Result<T, DecodeError>;

impl Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{0}: {1}", self.i.exit_code, self.i.message)
    }
}

impl DecodeError {
    /// Creates a new DecodeError with the specified exit code and message.
    pub fn new(exit_code: ExitCode, message: impl AsRef<str>) -> DecodeError {
        DecodeError {
            i: Box::new(DecodeErrorInternal {
                exit_code,
                message: message.as_ref().to_owned(),
            }),
        }
    }

    /// Returns the numeric exit code of the error to clasify the error
    pub fn exit_code(&self) -> ExitCode {
        self.i.exit_code
    }

    /// Returns the message of the error, which is a human-readable description of the error.
    pub fn message(&self) -> &str {
        &self.i.message
    }

    /// Adds context to the error by appending the current location in the code. This
    /// allows for building a callstack of where the error occurred.
    #[cold]
    #[inline(never)]
    #[track_caller]
    pub fn add_context(&mut self) {
        self.i
            .message
            .push_str(&format!("\n at {}", std::panic::Location::caller()));
    }
}

#[cold]
#[track_caller]
pub fn err_exit_code<T>(error_code: ExitCode, message: impl AsRef<str>) -> Result<T> {
    let mut e = DecodeError::new(error_code, message.as_ref());
    e.add_context();
    return Err(e);
}

pub trait AddContext<T> {
    #[track_caller]
    fn context(self) -> Result<T>;
}

impl<T, E: Into<DecodeError>> AddContext<T> for core::result::Result<T, E> {
    #[track_caller]
    fn context(self) -> Result<T> {
        match self {
            Ok(x) => Ok(x),
            Err(e) => {
                let mut e = e.into();
                e.add_context();
                Err(e)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

fn get_io_error_exit_code(e: &std::io::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::UnexpectedEof => ExitCode::TruncatedInput,
        ErrorKind::NotFound => ExitCode::FileNotFound,
        _ => ExitCode::OsError,
    }
}

impl<T> From<std::sync::mpsc::SendError<T>> for DecodeError {
    #[track_caller]
    fn from(e: std::sync::mpsc::SendError<T>) -> Self {
        let mut e = DecodeError::new(ExitCode::ChannelFailure, e.to_string());
        e.add_context();
        e
    }
}

impl From<std::sync::mpsc::RecvError> for DecodeError {
    #[track_caller]
    fn from(e: std::sync::mpsc::RecvError) -> Self {
        let mut e = DecodeError::new(ExitCode::ChannelFailure, e.to_string());
        e.add_context();
        e
    }
}

/// translates std::io::Error into DecodeError
impl From<std::io::Error> for DecodeError {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        match e.downcast::<DecodeError>() {
            Ok(de) => {
                return de;
            }
            Err(e) => {
                let mut e = DecodeError::new(get_io_error_exit_code(&e), e.to_string());
                e.add_context();
                e
            }
        }
    }
}

/// translates DecodeError into std::io::Error, which involves putting into a Box and using Other
impl From<DecodeError> for std::io::Error {
    fn from(e: DecodeError) -> Self {
        return std::io::Error::new(std::io::ErrorKind::Other, e);
    }
}

#[test]
fn test_error_translation() {
    // test wrapping inside an io error
    fn my_std_error() -> core::result::Result<(), std::io::Error> {
        Err(DecodeError::new(ExitCode::InvalidParameter, "test error").into())
    }

    let e: DecodeError = my_std_error().unwrap_err().into();
    assert_eq!(e.exit_code(), ExitCode::InvalidParameter);
    assert_eq!(e.message(), "test error");

    // a short read becomes a truncated input, anything else an OsError
    let e: DecodeError = std::io::Error::new(ErrorKind::UnexpectedEof, "eof").into();
    assert_eq!(e.exit_code(), ExitCode::TruncatedInput);

    let e: DecodeError = std::io::Error::new(ErrorKind::PermissionDenied, "denied").into();
    assert_eq!(e.exit_code(), ExitCode::OsError);
}

#[test]
fn test_context_appends_location() {
    fn fails() -> Result<()> {
        err_exit_code(ExitCode::MalformedStream, "bad")
    }

    let e = fails().context().unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::MalformedStream);
    assert!(e.message().starts_with("bad\n at "));
    assert_eq!(e.message().matches("\n at ").count(), 2);
}
