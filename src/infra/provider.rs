use crate::domain::{Allocation, AllocationSummary, Job, JobSummary, Node};
use thiserror::Error;

/// Failures talking to the cluster API; shown to the user as connection errors.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    #[error("not connected to a cluster")]
    NotConnected,

    #[error("invalid cluster address {address:?}: {message}")]
    InvalidAddress { address: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// The slice of the cluster API the navigator consumes.
pub trait ResourceProvider {
    fn connect(&mut self, address: &str) -> Result<(), ProviderError>;

    /// Address of the active connection, if any.
    fn address(&self) -> Option<&str>;

    fn list_job_summaries(&self) -> Result<Vec<JobSummary>, ProviderError>;

    fn describe_job(&self, id: &str) -> Result<Job, ProviderError>;

    fn list_allocations(&self) -> Result<Vec<AllocationSummary>, ProviderError>;

    fn describe_allocation(&self, id: &str) -> Result<Allocation, ProviderError>;

    fn describe_node(&self, id: &str) -> Result<Node, ProviderError>;

    fn garbage_collect(&self) -> Result<(), ProviderError>;
}

/// Connects unless the provider already points at `address`.
pub fn ensure_connected<P: ResourceProvider + ?Sized>(
    provider: &mut P,
    address: &str,
) -> Result<(), ProviderError> {
    if provider.address() == Some(address) {
        return Ok(());
    }
    provider.connect(address)
}
