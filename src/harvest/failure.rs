use std::fmt;

/// The pipeline step an item failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    Enumeration,
    Collection,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Enumeration => write!(f, "sensor enumeration"),
            FailureStage::Collection => write!(f, "measurement collection"),
        }
    }
}

/// One item that contributed nothing because its fetch failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub stage: FailureStage,
    pub location_id: i64,
    pub searched_locality: String,
    /// Set for collection failures.
    pub sensor_id: Option<i64>,
    /// Rendered error chain.
    pub message: String,
}

impl Failure {
    pub(crate) fn new(
        stage: FailureStage,
        location_id: i64,
        searched_locality: &str,
        sensor_id: Option<i64>,
        error: &dyn std::error::Error,
    ) -> Self {
        Failure {
            stage,
            location_id,
            searched_locality: searched_locality.to_string(),
            sensor_id,
            message: error_chain(error),
        }
    }
}

/// `error: cause: cause ...`
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::error::{BackendError, TransportError};

    #[test]
    fn message_includes_causes() {
        let error = TransportError::Exhausted {
            url: "https://api.test/v3/locations/2/sensors".to_string(),
            attempts: 3,
            source: BackendError::Timeout("https://api.test/v3/locations/2/sensors".to_string()),
        };
        let failure = Failure::new(FailureStage::Enumeration, 2, "JUNJI", None, &error);

        assert_eq!(
            failure.message,
            "Giving up on https://api.test/v3/locations/2/sensors after 3 attempts: \
             Request to https://api.test/v3/locations/2/sensors timed out"
        );
        assert_eq!(failure.stage.to_string(), "sensor enumeration");
    }
}
