use std::collections::BTreeMap;

pub const CLIENT_STATUS_RUNNING: &str = "running";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum HierarchyLevel {
    Cluster,
    Job,
    TaskGroup,
    Allocation,
    Task,
}

impl HierarchyLevel {
    pub const ALL: [HierarchyLevel; 5] = [
        Self::Cluster,
        Self::Job,
        Self::TaskGroup,
        Self::Allocation,
        Self::Task,
    ];

    pub const DEPTH: usize = Self::ALL.len();

    /// Fixed panel slot of this level in the panel row.
    pub fn index(self) -> usize {
        match self {
            Self::Cluster => 0,
            Self::Job => 1,
            Self::TaskGroup => 2,
            Self::Allocation => 3,
            Self::Task => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Cluster => "Clusters",
            Self::Job => "Jobs",
            Self::TaskGroup => "Task Groups",
            Self::Allocation => "Allocations",
            Self::Task => "Tasks",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Job => "job",
            Self::TaskGroup => "task group",
            Self::Allocation => "allocation",
            Self::Task => "task",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Environment {
    pub name: String,
    pub address: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobSummary {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub task_groups: Vec<TaskGroup>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskGroup {
    pub name: String,
    pub count: u32,
    pub tasks: Vec<Task>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Task {
    pub name: String,
    pub driver: String,
    /// Driver config values, already rendered for display.
    pub config: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub services: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AllocationSummary {
    pub id: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Allocation {
    pub id: String,
    pub name: String,
    pub job_id: String,
    pub task_group: String,
    pub client_status: String,
    pub node_id: String,
    pub task_resources: BTreeMap<String, Vec<NetworkResource>>,
}

impl Allocation {
    pub fn is_running(&self) -> bool {
        self.client_status == CLIENT_STATUS_RUNNING
    }

    pub fn networks_for(&self, task_name: &str) -> &[NetworkResource] {
        self.task_resources
            .get(task_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NetworkResource {
    pub reserved_ports: Vec<Port>,
    pub dynamic_ports: Vec<Port>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Port {
    pub label: String,
    pub value: u16,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub ip: Option<String>,
}
