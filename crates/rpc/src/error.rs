/// Failure to establish a channel to a service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid service endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: tonic::codegen::http::uri::InvalidUri,
    },
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: tonic::transport::Error,
    },
}
