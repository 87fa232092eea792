//! ELBv2 implementation of `TargetHealthApi`

use crate::controller::target_health::{ApiError, HealthState, TargetHealthApi};
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_elasticloadbalancingv2::types::TargetDescription;
use aws_sdk_elasticloadbalancingv2::Client;
use std::net::Ipv4Addr;

/// Error codes AWS uses for throttling
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
    "RequestLimitExceeded",
    "BandwidthLimitExceeded",
    "LimitExceededException",
    "RequestThrottled",
    "SlowDown",
    "PriorRequestNotComplete",
    "EC2ThrottledException",
];

/// Decide whether a service error is worth retrying
///
/// `code` is the AWS error code, `status` the HTTP status if a response
/// was received.
pub fn is_transient_service_error(code: Option<&str>, status: Option<u16>) -> bool {
    if code.is_some_and(|c| THROTTLING_CODES.contains(&c)) {
        return true;
    }
    status.is_some_and(|s| (500..600).contains(&s))
}

/// The target this task is registered as: its IP address and container port
pub fn target_description(address: Ipv4Addr, port: u16) -> TargetDescription {
    TargetDescription::builder()
        .id(address.to_string())
        .port(i32::from(port))
        .build()
}

/// Target health backed by `DescribeTargetHealth`
pub struct ElbTargetHealthApi {
    client: Client,
}

impl ElbTargetHealthApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TargetHealthApi for ElbTargetHealthApi {
    async fn describe_health(
        &self,
        target_group_arn: &str,
        address: Ipv4Addr,
        port: u16,
    ) -> Result<Option<HealthState>, ApiError> {
        let output = self
            .client
            .describe_target_health()
            .target_group_arn(target_group_arn)
            .targets(target_description(address, port))
            .send()
            .await
            .map_err(|err| {
                let message = DisplayErrorContext(&err).to_string();
                match &err {
                    SdkError::TimeoutError(_)
                    | SdkError::DispatchFailure(_)
                    | SdkError::ResponseError(_) => ApiError::Transient(message),
                    SdkError::ServiceError(_) => {
                        let status = err.raw_response().map(|r| r.status().as_u16());
                        if is_transient_service_error(err.code(), status) {
                            ApiError::Transient(message)
                        } else {
                            ApiError::Permanent(message)
                        }
                    }
                    _ => ApiError::Permanent(message),
                }
            })?;

        let state = output
            .target_health_descriptions()
            .first()
            .and_then(|d| d.target_health())
            .map(|h| {
                h.state()
                    .map(|s| HealthState::parse(s.as_str()))
                    .unwrap_or(HealthState::Unknown)
            });

        Ok(state)
    }
}
