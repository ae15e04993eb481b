#![deny(missing_docs)]

//! This crate defines error & result types for the lake read path.
//! It also contains a variety of useful macros for error handling.

mod ext;

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::{fmt, io};

pub use ext::*;

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Alias of [`Backtrace`] under a name that thiserror does not treat as a
/// backtrace source (its `provide` support requires nightly).
type CapturedBacktrace = Backtrace;

/// The top-level error type for the lake read path.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum LakeError {
    /// Persisted metadata is internally inconsistent.
    #[error("Corruption: {0}\nBacktrace:\n{1}")]
    Corruption(ErrString, CapturedBacktrace),
    /// A file or record does not exist.
    #[error("Not found: {0}\nBacktrace:\n{1}")]
    NotFound(ErrString, CapturedBacktrace),
    /// A reader has no rows to produce.
    ///
    /// This is a normal signal rather than a failure, so no backtrace is captured.
    #[error("End of file: {0}")]
    EndOfFile(ErrString),
    /// The calling context exceeded a resource allowance, e.g. its memory limit.
    #[error("Resource exhausted: {0}\nBacktrace:\n{1}")]
    ResourceExhausted(ErrString, CapturedBacktrace),
    /// An invalid argument was provided.
    #[error("Invalid argument: {0}\nBacktrace:\n{1}")]
    InvalidArgument(ErrString, CapturedBacktrace),
    /// Any other failure.
    #[error("{0}\nBacktrace:\n{1}")]
    Generic(ErrString, CapturedBacktrace),
    /// A wrapper for other errors, carrying additional context.
    #[error("{0}: {1}")]
    Context(ErrString, Box<LakeError>),
    /// A wrapper for errors from the Arrow library.
    #[error(transparent)]
    ArrowError(#[from] arrow_schema::ArrowError),
    /// A wrapper for IO errors.
    #[error(transparent)]
    IOError(#[from] io::Error),
    /// A wrapper for URL parsing errors.
    #[error(transparent)]
    UrlError(#[from] url::ParseError),
    /// A wrapper for errors from the protobuf decoder.
    #[cfg(feature = "prost")]
    #[error(transparent)]
    ProstDecodeError(#[from] prost::DecodeError),
    /// A wrapper for errors from the object store.
    #[cfg(feature = "object_store")]
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
    /// A wrapper for errors joining Tokio tasks.
    #[cfg(feature = "tokio")]
    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),
}

impl LakeError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        LakeError::Context(msg.into(), Box::new(self))
    }

    /// Strips every [`LakeError::Context`] layer, returning the root cause.
    pub fn root_cause(&self) -> &LakeError {
        match self {
            LakeError::Context(_, inner) => inner.root_cause(),
            other => other,
        }
    }

    /// Whether the root cause is a missing file or record.
    ///
    /// Backend errors that report a missing object are classified as not-found as well.
    pub fn is_not_found(&self) -> bool {
        match self.root_cause() {
            LakeError::NotFound(..) => true,
            LakeError::IOError(err) => err.kind() == io::ErrorKind::NotFound,
            #[cfg(feature = "object_store")]
            LakeError::ObjectStore(object_store::Error::NotFound { .. }) => true,
            _ => false,
        }
    }

    /// Whether the root cause is an end-of-file signal.
    pub fn is_end_of_file(&self) -> bool {
        matches!(self.root_cause(), LakeError::EndOfFile(_))
    }

    /// Whether the root cause is metadata corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(self.root_cause(), LakeError::Corruption(..))
    }

    /// Whether the root cause is an exhausted resource allowance.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self.root_cause(), LakeError::ResourceExhausted(..))
    }
}

impl Debug for LakeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A type alias for Results that return [`LakeError`]s as their error type.
pub type LakeResult<T> = Result<T, LakeError>;

/// A trait for unwrapping a result or panicking with a message when an invariant is known to
/// hold.
pub trait LakeExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer
    /// error).
    fn lake_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> LakeExpect for Result<T, E>
where
    E: Into<LakeError>,
{
    type Output = T;

    #[inline(always)]
    fn lake_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| crate::lake_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> LakeExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn lake_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = LakeError::Generic(msg.to_string().into(), Backtrace::capture());
            crate::lake_panic!(err)
        })
    }
}

/// A convenient macro for creating a [`LakeError`].
#[macro_export]
macro_rules! lake_err {
    (EndOfFile: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        $crate::__private::must_use(
            $crate::LakeError::EndOfFile(format!($fmt, $($arg),*).into())
        )
    }};
    (Context: $msg:literal, $err:expr) => {{
        $crate::__private::must_use(
            $crate::LakeError::Context($msg.into(), Box::new($err))
        )
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::LakeError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::lake_err!(Generic: $fmt, $($arg),*)
    };
}

/// A convenient macro for returning a [`LakeError`].
#[macro_export]
macro_rules! lake_bail {
    ($($tt:tt)+) => {
        return Err($crate::lake_err!($($tt)+))
    };
}

/// A convenient macro for panicking with a [`LakeError`] in the presence of a programmer error
/// (e.g., an invariant has been violated).
#[macro_export]
macro_rules! lake_panic {
    (Context: $msg:literal, $err:expr) => {{
        $crate::lake_panic!($crate::lake_err!(Context: $msg, $err))
    }};
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::lake_panic!($crate::lake_err!($variant: $fmt, $($arg),*))
    };
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::lake_panic!($crate::lake_err!($fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::LakeError = $err;
        panic!("{}", err.with_context(format!($fmt, $($arg),*)))
    }};
    ($err:expr) => {{
        let err: $crate::LakeError = $err;
        panic!("{}", err)
    }};
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[must_use]
    pub const fn must_use(x: crate::LakeError) -> crate::LakeError {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_transparent_for_classification() {
        let err = lake_err!(NotFound: "segment {} missing", "seg_2").with_context("loading");
        assert!(err.is_not_found());
        assert!(!err.is_corruption());
        assert!(err.to_string().starts_with("loading: Not found: segment seg_2 missing"));
    }

    #[test]
    fn io_not_found_is_not_found() {
        let err = LakeError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.is_not_found());
        let err = LakeError::from(io::Error::other("boom"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn end_of_file_has_no_backtrace() {
        let err = lake_err!(EndOfFile: "no rows in {}", 3);
        assert!(err.is_end_of_file());
        assert_eq!(err.to_string(), "End of file: no rows in 3");
    }

    #[test]
    fn bail_returns_typed_error() {
        fn check(index: usize) -> LakeResult<()> {
            if index > 0 {
                lake_bail!(Corruption: "index:{} out of range", index);
            }
            Ok(())
        }
        assert!(check(0).is_ok());
        assert!(check(1).unwrap_err().is_corruption());
    }

    #[test]
    fn expect_passes_values_through() {
        let value: LakeResult<u32> = Ok(3);
        assert_eq!(value.lake_expect("value must be present"), 3);
        assert_eq!(Some("seg_1").lake_expect("segment must be present"), "seg_1");
    }

    #[test]
    #[should_panic(expected = "segment index must be in range")]
    fn expect_panics_with_context() {
        let missing: Option<u32> = None;
        missing.lake_expect("segment index must be in range");
    }

    #[test]
    #[should_panic(expected = "schema 7 not found")]
    fn panic_macro_formats() {
        lake_panic!("schema {} not found", 7);
    }
}
