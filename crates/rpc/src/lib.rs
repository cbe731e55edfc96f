//! gRPC clients for the Scout, Golem and Marker automation services.
//!
//! Transport failures during connect surface as [`ClientError`]; once a
//! client is connected, per-call failures (including `tonic::Status`) are
//! folded into [`ServiceResult`] so the caller handles one shape.

pub mod proto {
    pub mod scout {
        tonic::include_proto!("synapse.scout");
    }
    pub mod golem {
        tonic::include_proto!("synapse.golem");
    }
    pub mod marker {
        tonic::include_proto!("synapse.marker");
    }
}

mod error;
mod golem;
mod marker;
mod result;
mod scout;

pub use error::ClientError;
pub use golem::{GolemClient, TestGenSummary, TestRunSummary};
pub use marker::{AnalyzeSummary, MarkerClient, MarkerRunSummary, PreviewSummary, RollbackSummary};
pub use proto::marker::{ElementPreview, FileAnalysis, FilePreview, MarkerProgressUpdate};
pub use result::ServiceResult;
pub use scout::{ScenarioSummary, ScoutClient};

use tonic::transport::Channel;

pub(crate) async fn connect_channel(endpoint: &str) -> Result<Channel, ClientError> {
    Channel::from_shared(endpoint.to_string())
        .map_err(|source| ClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        })?
        .connect()
        .await
        .map_err(|source| ClientError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })
}
