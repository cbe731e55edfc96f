use tonic::transport::Channel;

use crate::proto::golem::golem_service_client::GolemServiceClient;
use crate::proto::golem::{
    GenerateTestsRequest, GenerateTestsResponse, RunTestsRequest, RunTestsResponse,
};
use crate::result::status_error;
use crate::{ClientError, ServiceResult};

#[derive(Debug, Clone, PartialEq)]
pub struct TestGenSummary {
    pub output_dir: String,
    pub files_count: u32,
    pub tests_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestRunSummary {
    pub tests_run: u32,
    pub tests_passed: u32,
    pub tests_failed: u32,
    pub output: String,
}

/// Client for the Golem test generator and runner.
pub struct GolemClient {
    inner: GolemServiceClient<Channel>,
}

impl GolemClient {
    pub async fn connect(endpoint: &str) -> Result<Self, ClientError> {
        let channel = crate::connect_channel(endpoint).await?;
        tracing::debug!(endpoint, "connected to Golem");
        Ok(Self {
            inner: GolemServiceClient::new(channel),
        })
    }

    pub async fn generate_tests(
        &mut self,
        scenarios_path: &str,
        framework: &str,
        language: &str,
        base_url: &str,
    ) -> ServiceResult<TestGenSummary> {
        let request = GenerateTestsRequest {
            scenarios_path: scenarios_path.to_string(),
            framework: framework.to_string(),
            language: language.to_string(),
            base_url: base_url.to_string(),
        };
        match self.inner.generate_tests(request).await {
            Ok(response) => generate_result(response.into_inner()),
            Err(status) => ServiceResult::failure(status_error(&status)),
        }
    }

    pub async fn run_tests(
        &mut self,
        test_dir: &str,
        base_url: &str,
        headed: bool,
        browser: &str,
    ) -> ServiceResult<TestRunSummary> {
        let request = RunTestsRequest {
            test_dir: test_dir.to_string(),
            base_url: base_url.to_string(),
            headed,
            browser: browser.to_string(),
        };
        match self.inner.run_tests(request).await {
            Ok(response) => run_result(response.into_inner()),
            Err(status) => ServiceResult::failure(status_error(&status)),
        }
    }
}

fn generate_result(response: GenerateTestsResponse) -> ServiceResult<TestGenSummary> {
    if response.success {
        ServiceResult::ok(TestGenSummary {
            output_dir: response.output_dir,
            files_count: response.files_count,
            tests_count: response.tests_count,
        })
    } else {
        ServiceResult::failure(response.error)
    }
}

fn run_result(response: RunTestsResponse) -> ServiceResult<TestRunSummary> {
    if response.success {
        ServiceResult::ok(TestRunSummary {
            tests_run: response.tests_run,
            tests_passed: response.tests_passed,
            tests_failed: response.tests_failed,
            output: response.output,
        })
    } else {
        ServiceResult::failure(response.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_response_maps_to_summary() {
        let result = generate_result(GenerateTestsResponse {
            success: true,
            output_dir: "tests/generated".to_string(),
            files_count: 3,
            tests_count: 17,
            error: String::new(),
        });
        let summary = result.data.unwrap();
        assert_eq!(summary.output_dir, "tests/generated");
        assert_eq!(summary.tests_count, 17);
    }

    #[test]
    fn run_response_keeps_counts_even_with_failures_reported() {
        // A completed run with failing tests is still success=true at the
        // transport level; the counts tell the rest.
        let result = run_result(RunTestsResponse {
            success: true,
            tests_run: 10,
            tests_passed: 8,
            tests_failed: 2,
            output: "2 failed".to_string(),
            error: String::new(),
        });
        let summary = result.data.unwrap();
        assert_eq!(summary.tests_failed, 2);
    }

    #[test]
    fn failed_run_surfaces_service_error() {
        let result = run_result(RunTestsResponse {
            success: false,
            error: "browser not installed".to_string(),
            ..Default::default()
        });
        assert_eq!(result.error_message(), "browser not installed");
    }
}
