pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Network error: {message}")]
	Network { message: String },
	#[error("Timed out: {message}")]
	Timeout { message: String },
	#[error("Generation failed: {message}")]
	Generation { message: String },
	#[error("Store error: {message}")]
	Store { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
}
impl Error {
	/// Folds transport and timeout failures of one generation into [`Error::Generation`], keeping
	/// the cause in the message. Other kinds pass through.
	pub fn into_generation(self) -> Self {
		match self {
			err @ (Self::Network { .. } | Self::Timeout { .. }) =>
				Self::Generation { message: err.to_string() },
			err => err,
		}
	}
}

impl From<vox_storage::Error> for Error {
	fn from(err: vox_storage::Error) -> Self {
		Self::Store { message: err.to_string() }
	}
}

impl From<vox_providers::Error> for Error {
	fn from(err: vox_providers::Error) -> Self {
		match err {
			vox_providers::Error::Reqwest(inner) if inner.is_timeout() =>
				Self::Timeout { message: inner.to_string() },
			vox_providers::Error::Reqwest(inner) => Self::Network { message: inner.to_string() },
			err @ vox_providers::Error::Timeout { .. } => Self::Timeout { message: err.to_string() },
			err => Self::Generation { message: err.to_string() },
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Store { message: format!("Stored value is malformed: {err}") }
	}
}
