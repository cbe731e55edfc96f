use tonic::transport::Channel;

use crate::proto::scout::scout_service_client::ScoutServiceClient;
use crate::proto::scout::{GenerateScenariosRequest, GenerateScenariosResponse};
use crate::result::status_error;
use crate::{ClientError, ServiceResult};

/// Scout's report on a scenario-generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSummary {
    pub output_path: String,
    pub scenarios_count: u32,
    pub components_count: u32,
}

/// Client for the Scout scenario generator.
pub struct ScoutClient {
    inner: ScoutServiceClient<Channel>,
}

impl ScoutClient {
    pub async fn connect(endpoint: &str) -> Result<Self, ClientError> {
        let channel = crate::connect_channel(endpoint).await?;
        tracing::debug!(endpoint, "connected to Scout");
        Ok(Self {
            inner: ScoutServiceClient::new(channel),
        })
    }

    pub async fn generate_scenarios(
        &mut self,
        project_path: &str,
        user: &str,
        role: &str,
    ) -> ServiceResult<ScenarioSummary> {
        let request = GenerateScenariosRequest {
            project_path: project_path.to_string(),
            user: user.to_string(),
            role: role.to_string(),
        };
        match self.inner.generate_scenarios(request).await {
            Ok(response) => scenario_result(response.into_inner()),
            Err(status) => ServiceResult::failure(status_error(&status)),
        }
    }
}

fn scenario_result(response: GenerateScenariosResponse) -> ServiceResult<ScenarioSummary> {
    if response.success {
        ServiceResult::ok(ScenarioSummary {
            output_path: response.output_path,
            scenarios_count: response.scenarios_count,
            components_count: response.components_count,
        })
    } else {
        ServiceResult::failure(response.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response_maps_to_summary() {
        let result = scenario_result(GenerateScenariosResponse {
            success: true,
            output_path: "out/scenarios.json".to_string(),
            scenarios_count: 12,
            components_count: 4,
            error: String::new(),
        });
        let summary = result.data.unwrap();
        assert_eq!(summary.output_path, "out/scenarios.json");
        assert_eq!(summary.scenarios_count, 12);
        assert_eq!(summary.components_count, 4);
    }

    #[test]
    fn failed_response_keeps_service_error() {
        let result = scenario_result(GenerateScenariosResponse {
            success: false,
            error: "project not found".to_string(),
            ..Default::default()
        });
        assert!(!result.success);
        assert_eq!(result.error_message(), "project not found");
    }
}
