#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Wrong value type at key {key}.")]
	WrongType { key: String },
	#[error("Store backend error: {0}")]
	Backend(String),
}
