use crate::endpoint::Endpoint;
use crate::result::ProbeResult;
use async_trait::async_trait;

/// Network collaborator that performs the actual probe for an endpoint.
///
/// One implementation exists per endpoint type (HTTP, DNS, TCP, gRPC
/// health, SFTP, ICMP, ...); the core never dials anything itself. An
/// implementation fills in the [`ProbeResult`] fields that the placeholder
/// resolver consumes (status, body, rcode, durations, ...) and records
/// connection problems through [`ProbeResult::add_error`] rather than
/// failing the call.
#[async_trait]
pub trait ProbeClient: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeResult;
}
