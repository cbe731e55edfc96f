use std::collections::HashMap;

use tonic::transport::Channel;

use crate::proto::marker::marker_service_client::MarkerServiceClient;
use crate::proto::marker::{
    AnalyzeRequest, AnalyzeResponse, FileAnalysis, FilePreview, MarkerProgressUpdate,
    PreviewRequest, PreviewResponse, RollbackRequest, RollbackResponse, RunMarkerRequest,
    RunMarkerResponse,
};
use crate::result::status_error;
use crate::{ClientError, ServiceResult};

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRunSummary {
    pub files_processed: u32,
    pub ids_added: u32,
    pub duplicate_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewSummary {
    pub files_found: u32,
    pub potential_ids: u32,
    pub previews: Vec<FilePreview>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollbackSummary {
    pub files_restored: u32,
    pub restored_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeSummary {
    pub total_files: u32,
    pub files: Vec<FileAnalysis>,
    pub file_types: HashMap<String, u32>,
}

/// Client for the Marker test-id injector.
pub struct MarkerClient {
    inner: MarkerServiceClient<Channel>,
}

impl MarkerClient {
    pub async fn connect(endpoint: &str) -> Result<Self, ClientError> {
        let channel = crate::connect_channel(endpoint).await?;
        tracing::debug!(endpoint, "connected to Marker");
        Ok(Self {
            inner: MarkerServiceClient::new(channel),
        })
    }

    pub async fn run_marker(
        &mut self,
        project_path: &str,
        dry_run: bool,
        file_filter: &str,
        target_elements: &[String],
    ) -> ServiceResult<MarkerRunSummary> {
        let request = RunMarkerRequest {
            project_path: project_path.to_string(),
            dry_run,
            file_filter: file_filter.to_string(),
            target_elements: target_elements.to_vec(),
        };
        match self.inner.run_marker(request).await {
            Ok(response) => run_result(response.into_inner()),
            Err(status) => ServiceResult::failure(status_error(&status)),
        }
    }

    /// Same as [`run_marker`](Self::run_marker) but consumes the server's
    /// per-file progress stream. Updates go to `on_progress` when given,
    /// otherwise to the log.
    pub async fn run_marker_stream(
        &mut self,
        project_path: &str,
        dry_run: bool,
        file_filter: &str,
        mut on_progress: Option<&mut dyn FnMut(&MarkerProgressUpdate)>,
    ) -> ServiceResult<()> {
        let request = RunMarkerRequest {
            project_path: project_path.to_string(),
            dry_run,
            file_filter: file_filter.to_string(),
            target_elements: Vec::new(),
        };
        let mut stream = match self.inner.run_marker_stream(request).await {
            Ok(response) => response.into_inner(),
            Err(status) => return ServiceResult::failure(status_error(&status)),
        };
        loop {
            match stream.message().await {
                Ok(Some(update)) => {
                    if let Some(callback) = on_progress.as_mut() {
                        callback(&update);
                    } else {
                        tracing::info!(
                            "{:>3.0}% {}: {}",
                            update.progress_percent,
                            update.file_path,
                            update.status
                        );
                    }
                }
                Ok(None) => return ServiceResult::ok(()),
                Err(status) => return ServiceResult::failure(status_error(&status)),
            }
        }
    }

    pub async fn preview_changes(
        &mut self,
        project_path: &str,
        file_filter: &str,
    ) -> ServiceResult<PreviewSummary> {
        let request = PreviewRequest {
            project_path: project_path.to_string(),
            file_filter: file_filter.to_string(),
        };
        match self.inner.preview_changes(request).await {
            Ok(response) => preview_result(response.into_inner()),
            Err(status) => ServiceResult::failure(status_error(&status)),
        }
    }

    pub async fn rollback(&mut self, project_path: &str) -> ServiceResult<RollbackSummary> {
        let request = RollbackRequest {
            project_path: project_path.to_string(),
        };
        match self.inner.rollback(request).await {
            Ok(response) => rollback_result(response.into_inner()),
            Err(status) => ServiceResult::failure(status_error(&status)),
        }
    }

    pub async fn analyze_project(&mut self, project_path: &str) -> ServiceResult<AnalyzeSummary> {
        let request = AnalyzeRequest {
            project_path: project_path.to_string(),
        };
        match self.inner.analyze_project(request).await {
            Ok(response) => analyze_result(response.into_inner()),
            Err(status) => ServiceResult::failure(status_error(&status)),
        }
    }
}

fn run_result(response: RunMarkerResponse) -> ServiceResult<MarkerRunSummary> {
    if response.success {
        ServiceResult::ok(MarkerRunSummary {
            files_processed: response.files_processed,
            ids_added: response.ids_added,
            duplicate_ids: response.duplicate_ids,
        })
    } else {
        ServiceResult::failure(response.error_message)
    }
}

fn preview_result(response: PreviewResponse) -> ServiceResult<PreviewSummary> {
    if response.success {
        ServiceResult::ok(PreviewSummary {
            files_found: response.files_found,
            potential_ids: response.potential_ids,
            previews: response.previews,
        })
    } else {
        ServiceResult::failure(response.error_message)
    }
}

fn rollback_result(response: RollbackResponse) -> ServiceResult<RollbackSummary> {
    if response.success {
        ServiceResult::ok(RollbackSummary {
            files_restored: response.files_restored,
            restored_files: response.restored_files,
        })
    } else {
        ServiceResult::failure(response.error_message)
    }
}

fn analyze_result(response: AnalyzeResponse) -> ServiceResult<AnalyzeSummary> {
    if response.success {
        ServiceResult::ok(AnalyzeSummary {
            total_files: response.total_files,
            files: response.files,
            file_types: response.file_types,
        })
    } else {
        ServiceResult::failure(response.error_message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_response_maps_to_summary() {
        let result = run_result(RunMarkerResponse {
            success: true,
            files_processed: 9,
            ids_added: 31,
            duplicate_ids: vec!["login-btn".to_string()],
            error_message: String::new(),
        });
        let summary = result.data.unwrap();
        assert_eq!(summary.files_processed, 9);
        assert_eq!(summary.duplicate_ids, vec!["login-btn"]);
    }

    #[test]
    fn failed_run_surfaces_service_error() {
        let result = run_result(RunMarkerResponse {
            success: false,
            error_message: "path does not exist".to_string(),
            ..Default::default()
        });
        assert!(!result.success);
        assert_eq!(result.error_message(), "path does not exist");
    }

    #[test]
    fn preview_response_keeps_per_file_details() {
        let result = preview_result(PreviewResponse {
            success: true,
            files_found: 2,
            potential_ids: 5,
            previews: vec![FilePreview {
                file_path: "src/Login.tsx".to_string(),
                potential_ids: 3,
                elements: Vec::new(),
            }],
            error_message: String::new(),
        });
        let summary = result.data.unwrap();
        assert_eq!(summary.files_found, 2);
        assert_eq!(summary.previews[0].file_path, "src/Login.tsx");
    }

    #[test]
    fn analyze_response_carries_file_type_histogram() {
        let mut file_types = HashMap::new();
        file_types.insert("tsx".to_string(), 4u32);
        let result = analyze_result(AnalyzeResponse {
            success: true,
            total_files: 4,
            files: Vec::new(),
            file_types,
            error_message: String::new(),
        });
        let summary = result.data.unwrap();
        assert_eq!(summary.file_types.get("tsx"), Some(&4));
    }
}
