use crate::domain::{
    Allocation, AllocationSummary, Job, JobSummary, NetworkResource, Node, Port, Task, TaskGroup,
};
use crate::infra::{ProviderError, ResourceProvider};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_NOMAD_ADDRESS: &str = "http://localhost:4646";
pub const NODE_IP_ATTRIBUTE: &str = "unique.network.ip-address";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Blocking HTTP client for the Nomad API.
#[derive(Clone)]
pub struct NomadClient {
    agent: ureq::Agent,
    address: Option<String>,
    token: Option<String>,
}

impl NomadClient {
    pub fn new(token: Option<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            agent: config.into(),
            address: None,
            token: token.filter(|token| !token.trim().is_empty()),
        }
    }

    /// Client authenticated with `NOMAD_TOKEN` when it is set.
    pub fn from_env() -> Self {
        Self::new(std::env::var("NOMAD_TOKEN").ok())
    }

    fn endpoint(&self, path: &str) -> Result<String, ProviderError> {
        let Some(address) = &self.address else {
            return Err(ProviderError::NotConnected);
        };
        Ok(format!("{address}{path}"))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let mut request = self.agent.get(&url);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        let mut response = request.call().map_err(|error| ProviderError::Request {
            url: url.clone(),
            message: error.to_string(),
        })?;
        response
            .body_mut()
            .read_json::<T>()
            .map_err(|error| ProviderError::Decode {
                url,
                message: error.to_string(),
            })
    }
}

impl ResourceProvider for NomadClient {
    fn connect(&mut self, address: &str) -> Result<(), ProviderError> {
        let normalized = normalize_address(address)?;
        info!(address = %normalized, "connecting");
        self.address = Some(normalized);
        Ok(())
    }

    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    fn list_job_summaries(&self) -> Result<Vec<JobSummary>, ProviderError> {
        let stubs: Vec<JobStubWire> = self.get_json("/v1/jobs")?;
        Ok(stubs.into_iter().map(JobSummary::from).collect())
    }

    fn describe_job(&self, id: &str) -> Result<Job, ProviderError> {
        let job: JobWire = self.get_json(&format!("/v1/job/{}", encode_segment(id)))?;
        Ok(job.into())
    }

    fn list_allocations(&self) -> Result<Vec<AllocationSummary>, ProviderError> {
        let stubs: Vec<AllocationStubWire> = self.get_json("/v1/allocations")?;
        Ok(stubs.into_iter().map(AllocationSummary::from).collect())
    }

    fn describe_allocation(&self, id: &str) -> Result<Allocation, ProviderError> {
        let alloc: AllocationWire =
            self.get_json(&format!("/v1/allocation/{}", encode_segment(id)))?;
        Ok(alloc.into())
    }

    fn describe_node(&self, id: &str) -> Result<Node, ProviderError> {
        let node: NodeWire = self.get_json(&format!("/v1/node/{}", encode_segment(id)))?;
        Ok(node.into())
    }

    fn garbage_collect(&self) -> Result<(), ProviderError> {
        let url = self.endpoint("/v1/system/gc")?;
        info!(%url, "PUT");
        let mut request = self.agent.put(&url);
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        request
            .send_empty()
            .map_err(|error| ProviderError::Request {
                url,
                message: error.to_string(),
            })?;
        Ok(())
    }
}

pub fn normalize_address(address: &str) -> Result<String, ProviderError> {
    let trimmed = address.trim();
    let parsed = url::Url::parse(trimmed).map_err(|error| ProviderError::InvalidAddress {
        address: address.to_string(),
        message: error.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProviderError::InvalidAddress {
            address: address.to_string(),
            message: format!("unsupported scheme {:?}", parsed.scheme()),
        });
    }
    if parsed.host_str().is_none() {
        return Err(ProviderError::InvalidAddress {
            address: address.to_string(),
            message: "missing host".to_string(),
        });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn display_config_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct JobStubWire {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
}

impl From<JobStubWire> for JobSummary {
    fn from(stub: JobStubWire) -> Self {
        Self {
            id: stub.id,
            name: stub.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobWire {
    #[serde(rename = "ID", default, deserialize_with = "null_as_default")]
    id: String,
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(rename = "TaskGroups", default, deserialize_with = "null_as_default")]
    task_groups: Vec<TaskGroupWire>,
}

impl From<JobWire> for Job {
    fn from(job: JobWire) -> Self {
        Self {
            id: job.id,
            name: job.name,
            task_groups: job.task_groups.into_iter().map(TaskGroup::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskGroupWire {
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(rename = "Count", default, deserialize_with = "null_as_default")]
    count: u32,
    #[serde(rename = "Tasks", default, deserialize_with = "null_as_default")]
    tasks: Vec<TaskWire>,
}

impl From<TaskGroupWire> for TaskGroup {
    fn from(group: TaskGroupWire) -> Self {
        Self {
            name: group.name,
            count: group.count,
            tasks: group.tasks.into_iter().map(Task::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskWire {
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(rename = "Driver", default, deserialize_with = "null_as_default")]
    driver: String,
    #[serde(rename = "Config", default, deserialize_with = "null_as_default")]
    config: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "Env", default, deserialize_with = "null_as_default")]
    env: BTreeMap<String, String>,
    #[serde(rename = "Services", default, deserialize_with = "null_as_default")]
    services: Vec<ServiceWire>,
}

impl From<TaskWire> for Task {
    fn from(task: TaskWire) -> Self {
        Self {
            name: task.name,
            driver: task.driver,
            config: task
                .config
                .into_iter()
                .map(|(key, value)| (key, display_config_value(value)))
                .collect(),
            env: task.env,
            services: task.services.into_iter().map(|service| service.name).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceWire {
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct AllocationStubWire {
    #[serde(rename = "ID")]
    id: String,
}

impl From<AllocationStubWire> for AllocationSummary {
    fn from(stub: AllocationStubWire) -> Self {
        Self { id: stub.id }
    }
}

#[derive(Debug, Deserialize)]
struct AllocationWire {
    #[serde(rename = "ID", default, deserialize_with = "null_as_default")]
    id: String,
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(rename = "JobID", default, deserialize_with = "null_as_default")]
    job_id: String,
    #[serde(rename = "TaskGroup", default, deserialize_with = "null_as_default")]
    task_group: String,
    #[serde(rename = "ClientStatus", default, deserialize_with = "null_as_default")]
    client_status: String,
    #[serde(rename = "NodeID", default, deserialize_with = "null_as_default")]
    node_id: String,
    #[serde(rename = "TaskResources", default, deserialize_with = "null_as_default")]
    task_resources: BTreeMap<String, TaskResourcesWire>,
}

impl From<AllocationWire> for Allocation {
    fn from(alloc: AllocationWire) -> Self {
        Self {
            id: alloc.id,
            name: alloc.name,
            job_id: alloc.job_id,
            task_group: alloc.task_group,
            client_status: alloc.client_status,
            node_id: alloc.node_id,
            task_resources: alloc
                .task_resources
                .into_iter()
                .map(|(task, resources)| {
                    let networks = resources
                        .networks
                        .into_iter()
                        .map(NetworkResource::from)
                        .collect();
                    (task, networks)
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TaskResourcesWire {
    #[serde(rename = "Networks", default, deserialize_with = "null_as_default")]
    networks: Vec<NetworkWire>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkWire {
    #[serde(rename = "ReservedPorts", default, deserialize_with = "null_as_default")]
    reserved_ports: Vec<PortWire>,
    #[serde(rename = "DynamicPorts", default, deserialize_with = "null_as_default")]
    dynamic_ports: Vec<PortWire>,
}

impl From<NetworkWire> for NetworkResource {
    fn from(network: NetworkWire) -> Self {
        Self {
            reserved_ports: network.reserved_ports.into_iter().map(Port::from).collect(),
            dynamic_ports: network.dynamic_ports.into_iter().map(Port::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PortWire {
    #[serde(rename = "Label", default, deserialize_with = "null_as_default")]
    label: String,
    #[serde(rename = "Value", default, deserialize_with = "null_as_default")]
    value: u16,
}

impl From<PortWire> for Port {
    fn from(port: PortWire) -> Self {
        Self {
            label: port.label,
            value: port.value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NodeWire {
    #[serde(rename = "ID", default, deserialize_with = "null_as_default")]
    id: String,
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(rename = "Attributes", default, deserialize_with = "null_as_default")]
    attributes: BTreeMap<String, String>,
}

impl From<NodeWire> for Node {
    fn from(mut node: NodeWire) -> Self {
        Self {
            id: node.id,
            name: node.name,
            ip: node.attributes.remove(NODE_IP_ATTRIBUTE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_job_with_null_collections() {
        let raw = r#"{
            "ID": "site",
            "Name": "site",
            "TaskGroups": [{
                "Name": "web",
                "Count": 3,
                "Tasks": [{
                    "Name": "nginx",
                    "Driver": "docker",
                    "Config": {"image": "nginx:1.27", "ports": ["http"], "privileged": false},
                    "Env": null,
                    "Services": [{"Name": "site-web"}]
                }]
            }]
        }"#;
        let job: Job = serde_json::from_str::<JobWire>(raw).expect("decode").into();
        assert_eq!(job.name, "site");
        let group = &job.task_groups[0];
        assert_eq!(group.count, 3);
        let task = &group.tasks[0];
        assert!(task.env.is_empty());
        assert_eq!(task.config.get("image").map(String::as_str), Some("nginx:1.27"));
        assert_eq!(task.config.get("ports").map(String::as_str), Some(r#"["http"]"#));
        assert_eq!(task.config.get("privileged").map(String::as_str), Some("false"));
        assert_eq!(task.services, vec!["site-web".to_string()]);
    }

    #[test]
    fn decodes_allocation_ports_and_node_ip() {
        let raw = r#"{
            "ID": "a-1",
            "Name": "site.web[0]",
            "JobID": "site",
            "TaskGroup": "web",
            "ClientStatus": "running",
            "NodeID": "n-1",
            "TaskResources": {
                "nginx": {"Networks": [{
                    "ReservedPorts": null,
                    "DynamicPorts": [{"Label": "http", "Value": 23456}]
                }]}
            }
        }"#;
        let alloc: Allocation = serde_json::from_str::<AllocationWire>(raw)
            .expect("decode")
            .into();
        assert!(alloc.is_running());
        let networks = alloc.networks_for("nginx");
        assert_eq!(networks.len(), 1);
        assert!(networks[0].reserved_ports.is_empty());
        assert_eq!(networks[0].dynamic_ports[0].value, 23456);

        let node: Node = serde_json::from_str::<NodeWire>(
            r#"{"ID": "n-1", "Name": "worker-1", "Attributes": {"unique.network.ip-address": "10.0.0.9"}}"#,
        )
        .expect("decode")
        .into();
        assert_eq!(node.ip.as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn normalizes_and_validates_addresses() {
        assert_eq!(
            normalize_address(" http://nomad.local:4646/ ").expect("valid"),
            "http://nomad.local:4646"
        );
        assert!(matches!(
            normalize_address("nomad.local:4646"),
            Err(ProviderError::InvalidAddress { .. })
        ));
        assert!(matches!(
            normalize_address("ftp://nomad.local"),
            Err(ProviderError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn requests_fail_before_connect() {
        let client = NomadClient::new(None);
        assert_eq!(client.list_job_summaries(), Err(ProviderError::NotConnected));
        assert_eq!(client.garbage_collect(), Err(ProviderError::NotConnected));
    }

    #[test]
    fn path_segments_are_encoded() {
        assert_eq!(encode_segment("my job/1"), "my%20job%2F1");
    }
}
