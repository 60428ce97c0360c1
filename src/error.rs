use std::fmt;

/// The closed result-code enumeration from the public interface, folded into
/// a single error type. `Success` has no variant here — a successful
/// operation is `Ok`, never `Err(Error::Success)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
	AtEnd,
	DoesNotExist,
	AlreadyExists,
	InvalidArgs,
	InvalidOperation,
	InvalidFile,
	BadSeek,
	OutOfMemory,
	Busy,
	Timeout,
	NotImplemented,
	Error,
}

/// The crate's only error type. Every public operation returns
/// `Result<T, Error>`; there are no panics or exceptions on any resolution
/// path that a caller can reach with bad input.
#[derive(Debug)]
pub enum Error {
	/// A read resolution exhausted every candidate without success, or a
	/// lookup inside a resolved backend found nothing at the tail path.
	DoesNotExist,
	/// `mount` was asked to register a virtual prefix that is already taken,
	/// or a backend refused to create something that already exists.
	AlreadyExists,
	/// A path, flag combination, or mount registration was malformed.
	InvalidArgs(&'static str),
	/// The operation makes no sense for this backend or handle (e.g.
	/// duplicating a write-mode native file handle).
	InvalidOperation(&'static str),
	/// An archive's bytes did not match its format (bad magic, truncated
	/// table of contents, corrupt central directory).
	InvalidFile(&'static str),
	/// A seek target was negative or past the end of the stream.
	BadSeek,
	/// An allocation failed.
	OutOfMemory,
	/// The backend reported a transient unavailability.
	Busy,
	/// The backend reported that an operation timed out.
	Timeout,
	/// The backend does not implement this operation; a null slot in the
	/// vtable sense.
	NotImplemented,
	/// `..` navigation would have escaped the root under
	/// `no-above-root-navigation`.
	AboveRoot,
	/// Wraps an I/O error surfaced by a backend or stream.
	Io(std::io::Error),
	/// Any other backend-reported failure that doesn't fit a more specific
	/// variant above.
	Other(String),
}

impl Error {
	#[must_use]
	pub fn code(&self) -> ResultCode {
		match self {
			Self::DoesNotExist | Self::AboveRoot => ResultCode::DoesNotExist,
			Self::AlreadyExists => ResultCode::AlreadyExists,
			Self::InvalidArgs(_) => ResultCode::InvalidArgs,
			Self::InvalidOperation(_) => ResultCode::InvalidOperation,
			Self::InvalidFile(_) => ResultCode::InvalidFile,
			Self::BadSeek => ResultCode::BadSeek,
			Self::OutOfMemory => ResultCode::OutOfMemory,
			Self::Busy => ResultCode::Busy,
			Self::Timeout => ResultCode::Timeout,
			Self::NotImplemented => ResultCode::NotImplemented,
			Self::Io(_) | Self::Other(_) => ResultCode::Error,
		}
	}

	/// `true` for the one error that read-resolution is allowed to treat as
	/// "try the next candidate" (`spec.md` §7, rule 1).
	#[must_use]
	pub fn is_does_not_exist(&self) -> bool {
		matches!(self, Self::DoesNotExist | Self::AboveRoot)
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Io(err) => Some(err),
			_ => None,
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::DoesNotExist => write!(f, "no entry found by the given path"),
			Self::AlreadyExists => write!(f, "an entry already exists at the given path"),
			Self::InvalidArgs(msg) => write!(f, "invalid arguments: {msg}"),
			Self::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
			Self::InvalidFile(msg) => write!(f, "malformed archive: {msg}"),
			Self::BadSeek => write!(f, "seek target is out of range"),
			Self::OutOfMemory => write!(f, "allocation failed"),
			Self::Busy => write!(f, "backend reported busy"),
			Self::Timeout => write!(f, "backend reported a timeout"),
			Self::NotImplemented => write!(f, "operation not implemented by this backend"),
			Self::AboveRoot => write!(f, "path navigates above its root"),
			Self::Io(err) => write!(f, "I/O error: {err}"),
			Self::Other(msg) => write!(f, "{msg}"),
		}
	}
}

impl From<std::io::Error> for Error {
	fn from(value: std::io::Error) -> Self {
		Self::Io(value)
	}
}
