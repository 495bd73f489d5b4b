use core::error::Error;

/// API errors
#[derive(Debug, derive_more::Display)]
pub enum ApiError {
    #[display("Server error: {message}")]
    ServerError { message: String },
    #[display("Invalid TLS configuration: {message}")]
    TlsConfig { message: String },
}

impl Error for ApiError {}
