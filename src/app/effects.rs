use crate::app::hierarchy::{fetch_allocations, fetch_jobs, fetch_task_detail, replay};
use crate::app::{AppCommand, AppEvent, AppModel, Effect, LoadResult, update};
use crate::infra::{ResourceProvider, ensure_connected};
use tracing::{info, warn};

/// Runs one effect against the cluster and reports the outcome as an event.
pub fn execute<P: ResourceProvider + ?Sized>(provider: &mut P, effect: Effect) -> AppEvent {
    let result = match effect {
        Effect::LoadJobs { environment } => {
            info!(cluster = %environment.name, address = %environment.address, "loading jobs");
            provider
                .connect(&environment.address)
                .and_then(|()| fetch_jobs(&*provider))
                .map(|jobs| LoadResult::Jobs {
                    cluster: environment.name,
                    jobs,
                })
                .unwrap_or_else(|error| failed("Loading jobs", error))
        }
        Effect::LoadAllocations { job_id, task_group } => {
            info!(%job_id, %task_group, "loading allocations");
            fetch_allocations(&*provider, &job_id, &task_group)
                .map(LoadResult::Allocations)
                .unwrap_or_else(|error| failed("Loading allocations", error))
        }
        Effect::LoadDetail { task, allocation } => {
            info!(task = %task.name, allocation = %allocation.id, "loading task detail");
            fetch_task_detail(&*provider, &task, &allocation)
                .map(LoadResult::Detail)
                .unwrap_or_else(|error| failed("Loading task detail", error))
        }
        Effect::Refresh {
            state,
            open,
            detail_open,
        } => replay(provider, &state, &open, detail_open)
            .map(LoadResult::Refreshed)
            .unwrap_or_else(|error| failed("Refresh", error)),
        Effect::GarbageCollect { environment } => {
            info!(cluster = %environment.name, "triggering garbage collection");
            ensure_connected(provider, &environment.address)
                .and_then(|()| provider.garbage_collect())
                .map(|()| LoadResult::GarbageCollected {
                    cluster: environment.name,
                })
                .unwrap_or_else(|error| failed("Garbage collection", error))
        }
    };
    AppEvent::Loaded(result)
}

fn failed(action: &'static str, error: crate::infra::ProviderError) -> LoadResult {
    warn!(action, %error, "cluster request failed");
    LoadResult::Failed { action, error }
}

/// Feeds `event` through `update`, executing any effects it requests until the
/// model settles. Returns `true` when the user asked to quit.
pub fn dispatch<P: ResourceProvider + ?Sized>(
    model: AppModel,
    event: AppEvent,
    provider: &mut P,
) -> (AppModel, bool) {
    let mut model = model;
    let mut event = event;
    loop {
        let (next, command) = update(model, event);
        model = next;
        match command {
            AppCommand::None => return (model, false),
            AppCommand::Quit => return (model, true),
            AppCommand::Run(effect) => event = execute(provider, effect),
        }
    }
}
