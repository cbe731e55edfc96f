/// Outcome of a single service call.
///
/// `success == true` implies `data` is populated; a failed call carries an
/// error string instead, whether the failure came from the service response
/// or from the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ServiceResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}

pub(crate) fn status_error(status: &tonic::Status) -> String {
    format!("gRPC error: {:?} - {}", status.code(), status.message())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_populates_data() {
        let result = ServiceResult::ok(7u32);
        assert!(result.success);
        assert_eq!(result.data, Some(7));
        assert!(result.error.is_none());
    }

    #[test]
    fn failure_carries_the_message() {
        let result: ServiceResult<u32> = ServiceResult::failure("boom");
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error_message(), "boom");
    }

    #[test]
    fn status_error_includes_code_and_detail() {
        let status = tonic::Status::unavailable("service down");
        let message = status_error(&status);
        assert_eq!(message, "gRPC error: Unavailable - service down");
    }
}
