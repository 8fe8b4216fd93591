use crate::domain::{
    Allocation, Environment, HierarchyLevel, Job, Node, Task, TaskDetail, TaskGroup,
    project_task_detail,
};
use crate::infra::{ProviderError, ResourceProvider, ensure_connected};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HierarchyError {
    #[error("no {} at index {index} ({len} available)", .level.noun())]
    OutOfRange {
        level: HierarchyLevel,
        index: usize,
        len: usize,
    },
}

/// Selected index and most recently fetched children for every level.
///
/// Task groups and tasks are read out of the selected job's definition, so
/// only jobs and allocations are stored.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NavigationState {
    pub environments: Vec<Environment>,
    pub jobs: Vec<Job>,
    pub allocations: Vec<Allocation>,
    selections: [usize; HierarchyLevel::DEPTH],
}

impl NavigationState {
    pub fn new(environments: Vec<Environment>) -> Self {
        Self {
            environments,
            ..Self::default()
        }
    }

    pub fn selection(&self, level: HierarchyLevel) -> usize {
        self.selections[level.index()]
    }

    pub fn select(&mut self, level: HierarchyLevel, index: usize) {
        self.selections[level.index()] = index;
    }

    pub fn reset_selection(&mut self, level: HierarchyLevel) {
        self.select(level, 0);
    }

    /// Number of entries listed in `level`'s panel under the current parent selections.
    pub fn child_count(&self, level: HierarchyLevel) -> usize {
        match level {
            HierarchyLevel::Cluster => self.environments.len(),
            HierarchyLevel::Job => self.jobs.len(),
            HierarchyLevel::TaskGroup => self
                .current_job()
                .map(|job| job.task_groups.len())
                .unwrap_or(0),
            HierarchyLevel::Allocation => self.allocations.len(),
            HierarchyLevel::Task => self
                .current_task_group()
                .map(|group| group.tasks.len())
                .unwrap_or(0),
        }
    }

    pub fn has_valid_selection(&self, level: HierarchyLevel) -> bool {
        self.selection(level) < self.child_count(level)
    }

    /// Pulls `level`'s selection back inside its collection.
    pub fn clamp_selection(&mut self, level: HierarchyLevel) {
        let count = self.child_count(level);
        let clamped = self.selection(level).min(count.saturating_sub(1));
        self.select(level, clamped);
    }

    /// Drops the collection owned by `level`, used when its panel closes.
    pub fn clear_children(&mut self, level: HierarchyLevel) {
        match level {
            HierarchyLevel::Job => self.jobs.clear(),
            HierarchyLevel::Allocation => self.allocations.clear(),
            HierarchyLevel::Cluster | HierarchyLevel::TaskGroup | HierarchyLevel::Task => {}
        }
    }

    pub fn current_environment(&self) -> Result<&Environment, HierarchyError> {
        pick(&self.environments, HierarchyLevel::Cluster, self)
    }

    pub fn current_job(&self) -> Result<&Job, HierarchyError> {
        pick(&self.jobs, HierarchyLevel::Job, self)
    }

    pub fn current_task_group(&self) -> Result<&TaskGroup, HierarchyError> {
        pick(&self.current_job()?.task_groups, HierarchyLevel::TaskGroup, self)
    }

    pub fn current_allocation(&self) -> Result<&Allocation, HierarchyError> {
        pick(&self.allocations, HierarchyLevel::Allocation, self)
    }

    pub fn current_task(&self) -> Result<&Task, HierarchyError> {
        pick(&self.current_task_group()?.tasks, HierarchyLevel::Task, self)
    }

    /// Display rows for `level`'s panel.
    pub fn panel_rows(&self, level: HierarchyLevel) -> Vec<String> {
        match level {
            HierarchyLevel::Cluster => self
                .environments
                .iter()
                .map(|env| env.name.clone())
                .collect(),
            HierarchyLevel::Job => self
                .jobs
                .iter()
                .map(|job| format!("{} ({})", job.name, job.id))
                .collect(),
            HierarchyLevel::TaskGroup => self
                .current_job()
                .map(|job| {
                    job.task_groups
                        .iter()
                        .map(|group| format!("{} ({})", group.name, group.count))
                        .collect()
                })
                .unwrap_or_default(),
            HierarchyLevel::Allocation => self
                .allocations
                .iter()
                .map(|alloc| alloc.name.clone())
                .collect(),
            HierarchyLevel::Task => self
                .current_task_group()
                .map(|group| {
                    group
                        .tasks
                        .iter()
                        .map(|task| format!("{} ({})", task.name, task.driver))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn pick<'a, T>(
    items: &'a [T],
    level: HierarchyLevel,
    state: &NavigationState,
) -> Result<&'a T, HierarchyError> {
    let index = state.selection(level);
    items.get(index).ok_or(HierarchyError::OutOfRange {
        level,
        index,
        len: items.len(),
    })
}

/// Lists every job and describes each one, in provider order.
pub fn fetch_jobs<P: ResourceProvider + ?Sized>(provider: &P) -> Result<Vec<Job>, ProviderError> {
    let summaries = provider.list_job_summaries()?;
    let mut jobs = Vec::with_capacity(summaries.len());
    for summary in &summaries {
        jobs.push(provider.describe_job(&summary.id)?);
    }
    debug!(count = jobs.len(), "fetched jobs");
    Ok(jobs)
}

/// Running allocations of one task group, sorted by name.
pub fn fetch_allocations<P: ResourceProvider + ?Sized>(
    provider: &P,
    job_id: &str,
    task_group: &str,
) -> Result<Vec<Allocation>, ProviderError> {
    let summaries = provider.list_allocations()?;
    let mut allocations = Vec::with_capacity(summaries.len());
    for summary in &summaries {
        allocations.push(provider.describe_allocation(&summary.id)?);
    }
    let selected = select_running_allocations(allocations, job_id, task_group);
    debug!(count = selected.len(), task_group, "fetched allocations");
    Ok(selected)
}

/// Keeps running allocations of `task_group` (and of `job_id` when it is not
/// empty), stable-sorted ascending by name.
pub fn select_running_allocations(
    allocations: Vec<Allocation>,
    job_id: &str,
    task_group: &str,
) -> Vec<Allocation> {
    let mut selected = allocations
        .into_iter()
        .filter(|alloc| alloc.task_group == task_group)
        .filter(|alloc| job_id.is_empty() || alloc.job_id == job_id)
        .filter(Allocation::is_running)
        .collect::<Vec<_>>();
    selected.sort_by(|a, b| a.name.cmp(&b.name));
    selected
}

pub fn fetch_node<P: ResourceProvider + ?Sized>(
    provider: &P,
    allocation: &Allocation,
) -> Result<Node, ProviderError> {
    provider.describe_node(&allocation.node_id)
}

pub fn fetch_task_detail<P: ResourceProvider + ?Sized>(
    provider: &P,
    task: &Task,
    allocation: &Allocation,
) -> Result<TaskDetail, ProviderError> {
    let node = fetch_node(provider, allocation)?;
    Ok(project_task_detail(task, allocation, &node))
}

/// Result of replaying the open panels against fresh provider data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Replayed {
    pub state: NavigationState,
    /// How many of the replayed panels still have a valid parent selection.
    pub depth: usize,
    pub detail: Option<TaskDetail>,
}

/// Re-runs the entry logic of each open level in hierarchy order.
///
/// Selections are clamped into the refreshed collections. The first level whose
/// parent selection no longer resolves ends the replay; it and everything deeper
/// is reported as closed through `depth`.
pub fn replay<P: ResourceProvider + ?Sized>(
    provider: &mut P,
    state: &NavigationState,
    open: &[HierarchyLevel],
    detail_open: bool,
) -> Result<Replayed, ProviderError> {
    let mut next = state.clone();
    let mut depth = 0usize;

    for &level in open {
        if let Some(parent) = level.previous() {
            if !next.has_valid_selection(parent) {
                break;
            }
        }

        match level {
            HierarchyLevel::Cluster | HierarchyLevel::TaskGroup | HierarchyLevel::Task => {}
            HierarchyLevel::Job => {
                let address = parent_environment_address(&next)?;
                ensure_connected(provider, &address)?;
                next.jobs = fetch_jobs(&*provider)?;
            }
            HierarchyLevel::Allocation => {
                let (job_id, group_name) = parent_task_group_key(&next)?;
                next.allocations = fetch_allocations(&*provider, &job_id, &group_name)?;
            }
        }

        next.clamp_selection(level);
        depth += 1;
    }

    for level in HierarchyLevel::ALL.iter().skip(depth) {
        next.reset_selection(*level);
    }

    let detail = if detail_open && depth == HierarchyLevel::DEPTH {
        match (next.current_task(), next.current_allocation()) {
            (Ok(task), Ok(allocation)) => Some(fetch_task_detail(&*provider, task, allocation)?),
            _ => None,
        }
    } else {
        None
    };

    info!(depth, detail = detail.is_some(), "replayed panels");
    Ok(Replayed {
        state: next,
        depth,
        detail,
    })
}

fn parent_environment_address(state: &NavigationState) -> Result<String, ProviderError> {
    state
        .current_environment()
        .map(|env| env.address.clone())
        .map_err(|_| ProviderError::NotConnected)
}

fn parent_task_group_key(state: &NavigationState) -> Result<(String, String), ProviderError> {
    let job = state.current_job().map_err(|_| ProviderError::NotConnected)?;
    let group = state
        .current_task_group()
        .map_err(|_| ProviderError::NotConnected)?;
    Ok((job.id.clone(), group.name.clone()))
}

#[cfg(test)]
pub(crate) mod fake {
    use crate::domain::{Allocation, AllocationSummary, Job, JobSummary, Node};
    use crate::infra::{ProviderError, ResourceProvider};
    use std::cell::{Cell, RefCell};

    /// In-memory provider with call counters and switchable failures.
    #[derive(Debug, Default)]
    pub struct FakeProvider {
        pub jobs: Vec<Job>,
        pub allocations: Vec<Allocation>,
        pub nodes: Vec<Node>,
        pub address: Option<String>,
        pub fail_jobs: bool,
        pub fail_allocations: bool,
        pub fail_nodes: bool,
        pub fail_gc: bool,
        pub connects: RefCell<Vec<String>>,
        pub job_lists: Cell<usize>,
        pub allocation_lists: Cell<usize>,
        pub gc_calls: Cell<usize>,
    }

    fn unavailable(what: &str) -> ProviderError {
        ProviderError::Request {
            url: format!("http://fake/{what}"),
            message: "connection refused".to_string(),
        }
    }

    impl ResourceProvider for FakeProvider {
        fn connect(&mut self, address: &str) -> Result<(), ProviderError> {
            self.connects.borrow_mut().push(address.to_string());
            self.address = Some(address.to_string());
            Ok(())
        }

        fn address(&self) -> Option<&str> {
            self.address.as_deref()
        }

        fn list_job_summaries(&self) -> Result<Vec<JobSummary>, ProviderError> {
            self.job_lists.set(self.job_lists.get() + 1);
            if self.fail_jobs {
                return Err(unavailable("jobs"));
            }
            Ok(self
                .jobs
                .iter()
                .map(|job| JobSummary {
                    id: job.id.clone(),
                    name: job.name.clone(),
                })
                .collect())
        }

        fn describe_job(&self, id: &str) -> Result<Job, ProviderError> {
            self.jobs
                .iter()
                .find(|job| job.id == id)
                .cloned()
                .ok_or_else(|| unavailable("job"))
        }

        fn list_allocations(&self) -> Result<Vec<AllocationSummary>, ProviderError> {
            self.allocation_lists.set(self.allocation_lists.get() + 1);
            if self.fail_allocations {
                return Err(unavailable("allocations"));
            }
            Ok(self
                .allocations
                .iter()
                .map(|alloc| AllocationSummary {
                    id: alloc.id.clone(),
                })
                .collect())
        }

        fn describe_allocation(&self, id: &str) -> Result<Allocation, ProviderError> {
            self.allocations
                .iter()
                .find(|alloc| alloc.id == id)
                .cloned()
                .ok_or_else(|| unavailable("allocation"))
        }

        fn describe_node(&self, id: &str) -> Result<Node, ProviderError> {
            if self.fail_nodes {
                return Err(unavailable("node"));
            }
            self.nodes
                .iter()
                .find(|node| node.id == id)
                .cloned()
                .ok_or_else(|| unavailable("node"))
        }

        fn garbage_collect(&self) -> Result<(), ProviderError> {
            self.gc_calls.set(self.gc_calls.get() + 1);
            if self.fail_gc {
                return Err(unavailable("gc"));
            }
            Ok(())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeProvider;
    use super::fixtures::*;
    use super::*;

    fn names(allocations: &[Allocation]) -> Vec<&str> {
        allocations.iter().map(|alloc| alloc.name.as_str()).collect()
    }

    #[test]
    fn allocations_are_running_only_matching_and_sorted() {
        let provider = FakeProvider {
            allocations: vec![
                allocation("1", "b", "site", "web", "running"),
                allocation("2", "a", "site", "web", "running"),
                allocation("3", "c", "site", "web", "pending"),
                allocation("4", "0", "site", "db", "running"),
            ],
            ..FakeProvider::default()
        };

        let result = fetch_allocations(&provider, "site", "web").expect("fetch");
        assert_eq!(names(&result), vec!["a", "b"]);
    }

    #[test]
    fn allocation_sort_is_stable_and_case_sensitive() {
        let allocations = vec![
            allocation("1", "b", "", "web", "running"),
            allocation("2", "B", "", "web", "running"),
            allocation("3", "b", "", "web", "running"),
        ];
        let selected = select_running_allocations(allocations, "", "web");
        assert_eq!(names(&selected), vec!["B", "b", "b"]);
        assert_eq!(selected[1].id, "1");
        assert_eq!(selected[2].id, "3");
    }

    #[test]
    fn allocations_of_other_jobs_with_same_group_are_skipped() {
        let allocations = vec![
            allocation("1", "site.web[0]", "site", "web", "running"),
            allocation("2", "blog.web[0]", "blog", "web", "running"),
        ];
        let selected = select_running_allocations(allocations, "site", "web");
        assert_eq!(names(&selected), vec!["site.web[0]"]);
    }

    #[test]
    fn jobs_keep_provider_order() {
        let provider = FakeProvider {
            jobs: vec![job("zeta", &[]), job("alpha", &[])],
            ..FakeProvider::default()
        };
        let jobs = fetch_jobs(&provider).expect("fetch");
        let ids = jobs.iter().map(|job| job.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["zeta", "alpha"]);
    }

    #[test]
    fn current_accessors_report_out_of_range() {
        let mut state = NavigationState::new(environments());
        assert_eq!(
            state.current_job(),
            Err(HierarchyError::OutOfRange {
                level: HierarchyLevel::Job,
                index: 0,
                len: 0,
            })
        );

        state.jobs = vec![job("site", &[("web", &["nginx"])])];
        state.select(HierarchyLevel::TaskGroup, 3);
        assert_eq!(
            state.current_task_group(),
            Err(HierarchyError::OutOfRange {
                level: HierarchyLevel::TaskGroup,
                index: 3,
                len: 1,
            })
        );
        assert!(state.current_task().is_err());

        state.reset_selection(HierarchyLevel::TaskGroup);
        assert_eq!(state.current_task().map(|task| task.name.as_str()), Ok("nginx"));
    }

    #[test]
    fn out_of_range_message_names_the_level() {
        let error = HierarchyError::OutOfRange {
            level: HierarchyLevel::Allocation,
            index: 4,
            len: 2,
        };
        assert_eq!(error.to_string(), "no allocation at index 4 (2 available)");
    }

    #[test]
    fn child_counts_follow_parent_selection() {
        let mut state = NavigationState::new(environments());
        state.jobs = vec![
            job("site", &[("web", &["nginx", "sidecar"])]),
            job("blog", &[("web", &["ghost"]), ("db", &["mysql"])]),
        ];
        assert_eq!(state.child_count(HierarchyLevel::TaskGroup), 1);
        assert_eq!(state.child_count(HierarchyLevel::Task), 2);

        state.select(HierarchyLevel::Job, 1);
        assert_eq!(state.child_count(HierarchyLevel::TaskGroup), 2);
        assert_eq!(state.child_count(HierarchyLevel::Task), 1);

        state.select(HierarchyLevel::Job, 9);
        assert_eq!(state.child_count(HierarchyLevel::TaskGroup), 0);
        assert_eq!(state.child_count(HierarchyLevel::Task), 0);
    }

    #[test]
    fn replay_refetches_and_clamps_selections() {
        let mut provider = FakeProvider {
            jobs: vec![job("site", &[("web", &["nginx"])])],
            allocations: vec![allocation("1", "site.web[0]", "site", "web", "running")],
            nodes: vec![node()],
            ..FakeProvider::default()
        };
        let mut state = NavigationState::new(environments());
        state.jobs = vec![job("site", &[("web", &["nginx"])])];
        state.allocations = vec![
            allocation("1", "site.web[0]", "site", "web", "running"),
            allocation("2", "site.web[1]", "site", "web", "running"),
        ];
        state.select(HierarchyLevel::Allocation, 1);

        let replayed = replay(&mut provider, &state, &HierarchyLevel::ALL, true).expect("replay");
        assert_eq!(replayed.depth, HierarchyLevel::DEPTH);
        assert_eq!(replayed.state.allocations.len(), 1);
        assert_eq!(replayed.state.selection(HierarchyLevel::Allocation), 0);
        assert_eq!(provider.job_lists.get(), 1);
        assert_eq!(provider.allocation_lists.get(), 1);
        let detail = replayed.detail.expect("detail");
        assert_eq!(detail.node_ip, "10.0.0.5");
    }

    #[test]
    fn replay_stops_where_parent_disappeared() {
        let mut provider = FakeProvider {
            jobs: vec![job("site", &[])],
            ..FakeProvider::default()
        };
        let mut state = NavigationState::new(environments());
        state.jobs = vec![job("site", &[("web", &["nginx"])])];

        let open = [
            HierarchyLevel::Cluster,
            HierarchyLevel::Job,
            HierarchyLevel::TaskGroup,
            HierarchyLevel::Allocation,
        ];
        let replayed = replay(&mut provider, &state, &open, false).expect("replay");
        assert_eq!(replayed.depth, 3);
        assert_eq!(provider.allocation_lists.get(), 0);
        assert_eq!(replayed.detail, None);
    }

    #[test]
    fn replay_propagates_provider_failures() {
        let mut provider = FakeProvider {
            fail_jobs: true,
            ..FakeProvider::default()
        };
        let state = NavigationState::new(environments());
        let open = [HierarchyLevel::Cluster, HierarchyLevel::Job];
        assert!(replay(&mut provider, &state, &open, false).is_err());
    }
}
