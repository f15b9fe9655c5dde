//! EC2 provider error types.

use thiserror::Error;

/// Errors surfaced by the cloud provider API.
///
/// The service/client split mirrors the provider SDK: `Service` is the
/// remote side rejecting the call (capacity, auth, bad parameter),
/// `Client` is a local or transport failure before a response arrived.
#[derive(Debug, Error)]
pub enum Ec2Error {
    #[error("EC2 service error {code}: {message}")]
    Service { code: String, message: String },

    #[error("EC2 client error: {0}")]
    Client(String),
}

impl Ec2Error {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type Ec2Result<T> = Result<T, Ec2Error>;
