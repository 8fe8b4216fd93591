mod cursor;
mod effects;
mod hierarchy;

use crate::domain::{
    Allocation, Bounds, DETAIL_MARGIN, Environment, HierarchyLevel, Job, PANEL_SLOTS, Task,
    TaskDetail, compute_bounds,
};
use crate::infra::ProviderError;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use thiserror::Error;

pub use cursor::Cursor;
pub use effects::dispatch;
pub use hierarchy::*;

#[cfg(test)]
pub(crate) use hierarchy::{fake, fixtures};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One open hierarchy panel. Panels sit in fixed slots ordered by level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Panel {
    pub level: HierarchyLevel,
    pub cursor: Cursor,
}

impl Panel {
    pub fn new(level: HierarchyLevel) -> Self {
        Self {
            level,
            cursor: Cursor::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PopupKind {
    Info,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Popup {
    pub kind: PopupKind,
    pub title: String,
    pub message: String,
}

impl Popup {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: PopupKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: PopupKind::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// What receives keyboard input right now.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Focus {
    Panel(HierarchyLevel),
    Detail,
    Popup,
}

#[derive(Clone, Debug)]
pub struct AppModel {
    pub nav: NavigationState,
    /// Open panels, Clusters first. The last one has focus unless the detail
    /// view or a popup is shown.
    pub panels: Vec<Panel>,
    pub detail: Option<TaskDetail>,
    pub popup: Option<Popup>,
    /// Cluster whose jobs are currently listed.
    pub active_cluster: Option<String>,
    pub terminal_size: (u16, u16),
    pub notice: Option<String>,
}

impl AppModel {
    pub fn new(environments: Vec<Environment>) -> Self {
        Self {
            nav: NavigationState::new(environments),
            panels: vec![Panel::new(HierarchyLevel::Cluster)],
            detail: None,
            popup: None,
            active_cluster: None,
            terminal_size: (0, 0),
            notice: None,
        }
    }

    pub fn with_terminal_size(mut self, width: u16, height: u16) -> Self {
        self.terminal_size = (width, height);
        self
    }

    pub fn focus(&self) -> Focus {
        if self.popup.is_some() {
            return Focus::Popup;
        }
        if self.detail.is_some() {
            return Focus::Detail;
        }
        Focus::Panel(self.top_level())
    }

    pub fn top_level(&self) -> HierarchyLevel {
        self.panels
            .last()
            .map(|panel| panel.level)
            .unwrap_or(HierarchyLevel::Cluster)
    }

    pub fn open_levels(&self) -> Vec<HierarchyLevel> {
        self.panels.iter().map(|panel| panel.level).collect()
    }
}

/// Screen region of `level`'s panel for a terminal of `size`.
pub fn panel_bounds(size: (u16, u16), level: HierarchyLevel) -> Bounds {
    let (width, height) = size;
    compute_bounds(width, height, level.index() as u16, PANEL_SLOTS, 0)
}

/// Screen region of the task detail view.
pub fn detail_bounds(size: (u16, u16)) -> Bounds {
    let (width, height) = size;
    compute_bounds(width, height, 0, 1, DETAIL_MARGIN)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    MoveUp,
    MoveDown,
    DrillIn,
    DrillOut,
    Refresh,
    GarbageCollect,
    Dismiss,
    Quit,
}

/// Key bindings per focus target.
pub fn action_for_key(focus: Focus, key: KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return Some(Action::Quit),
        KeyCode::F(12) | KeyCode::Char('q') => return Some(Action::Quit),
        _ => {}
    }

    match focus {
        Focus::Popup => match key.code {
            KeyCode::Enter | KeyCode::Esc => Some(Action::Dismiss),
            _ => None,
        },
        Focus::Detail => match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Left | KeyCode::Backspace => {
                Some(Action::DrillOut)
            }
            KeyCode::F(5) | KeyCode::Char('r') => Some(Action::Refresh),
            KeyCode::Char('g' | 'G') => Some(Action::GarbageCollect),
            _ => None,
        },
        Focus::Panel(_) => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(Action::MoveUp),
            KeyCode::Down | KeyCode::Char('j') => Some(Action::MoveDown),
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => Some(Action::DrillIn),
            KeyCode::Left | KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') => {
                Some(Action::DrillOut)
            }
            KeyCode::F(5) | KeyCode::Char('r') => Some(Action::Refresh),
            KeyCode::Char('g' | 'G') => Some(Action::GarbageCollect),
            _ => None,
        },
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize(u16, u16),
    Loaded(LoadResult),
}

/// Outcome of an [`Effect`] executed against the cluster.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadResult {
    Jobs {
        cluster: String,
        jobs: Vec<Job>,
    },
    Allocations(Vec<Allocation>),
    Detail(TaskDetail),
    Refreshed(Replayed),
    GarbageCollected {
        cluster: String,
    },
    Failed {
        action: &'static str,
        error: ProviderError,
    },
}

/// Provider work requested by `update`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Effect {
    LoadJobs {
        environment: Environment,
    },
    LoadAllocations {
        job_id: String,
        task_group: String,
    },
    LoadDetail {
        task: Task,
        allocation: Allocation,
    },
    Refresh {
        state: NavigationState,
        open: Vec<HierarchyLevel>,
        detail_open: bool,
    },
    GarbageCollect {
        environment: Environment,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppCommand {
    None,
    Quit,
    Run(Effect),
}

pub fn update(model: AppModel, event: AppEvent) -> (AppModel, AppCommand) {
    match event {
        AppEvent::Key(key) => update_on_key(model, key),
        AppEvent::Resize(width, height) => (update_on_resize(model, width, height), AppCommand::None),
        AppEvent::Loaded(result) => (update_on_loaded(model, result), AppCommand::None),
    }
}

fn update_on_key(model: AppModel, key: KeyEvent) -> (AppModel, AppCommand) {
    let mut model = model;
    model.notice = None;

    let Some(action) = action_for_key(model.focus(), key) else {
        return (model, AppCommand::None);
    };

    match action {
        Action::Quit => (model, AppCommand::Quit),
        Action::Dismiss => {
            model.popup = None;
            (model, AppCommand::None)
        }
        Action::MoveUp => (move_cursor(model, false), AppCommand::None),
        Action::MoveDown => (move_cursor(model, true), AppCommand::None),
        Action::DrillIn => drill_in(model),
        Action::DrillOut => (drill_out(model), AppCommand::None),
        Action::Refresh => {
            let effect = Effect::Refresh {
                state: model.nav.clone(),
                open: model.open_levels(),
                detail_open: model.detail.is_some(),
            };
            (model, AppCommand::Run(effect))
        }
        Action::GarbageCollect => match model.nav.current_environment() {
            Ok(environment) => {
                let effect = Effect::GarbageCollect {
                    environment: environment.clone(),
                };
                (model, AppCommand::Run(effect))
            }
            Err(_) => (model, AppCommand::None),
        },
    }
}

fn move_cursor(model: AppModel, down: bool) -> AppModel {
    let mut model = model;
    let size = model.terminal_size;
    let Some(panel) = model.panels.last_mut() else {
        return model;
    };
    let level = panel.level;
    let moved = if down {
        let rows = panel_bounds(size, level).visible_rows();
        panel.cursor.move_down(model.nav.child_count(level), rows)
    } else {
        panel.cursor.move_up()
    };
    if let Some(y) = moved {
        model.nav.select(level, y);
    }
    model
}

fn drill_in(model: AppModel) -> (AppModel, AppCommand) {
    let level = model.top_level();
    if !model.nav.has_valid_selection(level) {
        return (model, AppCommand::None);
    }

    let effect = match level {
        HierarchyLevel::Cluster => match model.nav.current_environment() {
            Ok(environment) => Effect::LoadJobs {
                environment: environment.clone(),
            },
            Err(_) => return (model, AppCommand::None),
        },
        HierarchyLevel::Job | HierarchyLevel::Allocation => {
            // Task groups and tasks come from data already loaded for the parent.
            let model = match level.next() {
                Some(child) => open_panel(model, child),
                None => model,
            };
            return (model, AppCommand::None);
        }
        HierarchyLevel::TaskGroup => match (model.nav.current_job(), model.nav.current_task_group()) {
            (Ok(job), Ok(group)) => Effect::LoadAllocations {
                job_id: job.id.clone(),
                task_group: group.name.clone(),
            },
            _ => return (model, AppCommand::None),
        },
        HierarchyLevel::Task => match (model.nav.current_task(), model.nav.current_allocation()) {
            (Ok(task), Ok(allocation)) => Effect::LoadDetail {
                task: task.clone(),
                allocation: allocation.clone(),
            },
            _ => return (model, AppCommand::None),
        },
    };
    (model, AppCommand::Run(effect))
}

/// Opens `level`'s panel on top of its parent with the cursor on the first row.
fn open_panel(model: AppModel, level: HierarchyLevel) -> AppModel {
    let mut model = model;
    model.detail = None;
    model.panels.truncate(level.index());
    model.nav.reset_selection(level);
    model.panels.push(Panel::new(level));
    model
}

fn drill_out(model: AppModel) -> AppModel {
    let mut model = model;
    if model.detail.take().is_some() {
        return model;
    }

    let level = model.top_level();
    if level == HierarchyLevel::Cluster {
        return model;
    }
    model.panels.pop();
    model.nav.reset_selection(level);
    model.nav.clear_children(level);
    if level == HierarchyLevel::Job {
        model.active_cluster = None;
    }
    model
}

fn update_on_resize(model: AppModel, width: u16, height: u16) -> AppModel {
    let mut model = model.with_terminal_size(width, height);
    let size = model.terminal_size;
    for panel in &mut model.panels {
        let rows = panel_bounds(size, panel.level).visible_rows();
        let y = panel.cursor.y;
        panel.cursor.place(y, rows);
    }
    model
}

fn update_on_loaded(model: AppModel, result: LoadResult) -> AppModel {
    let mut model = model;
    match result {
        LoadResult::Jobs { cluster, jobs } => {
            model.nav.jobs = jobs;
            model.active_cluster = Some(cluster);
            open_panel(model, HierarchyLevel::Job)
        }
        LoadResult::Allocations(allocations) => {
            model.nav.allocations = allocations;
            open_panel(model, HierarchyLevel::Allocation)
        }
        LoadResult::Detail(detail) => {
            model.detail = Some(detail);
            model
        }
        LoadResult::Refreshed(replayed) => apply_replay(model, replayed),
        LoadResult::GarbageCollected { cluster } => {
            model.popup = Some(Popup::info(
                "Garbage Collection",
                format!("Garbage collection triggered on {cluster}."),
            ));
            model
        }
        LoadResult::Failed { action, error } => {
            model.popup = Some(Popup::error("Error", format!("{action} failed: {error}")));
            model
        }
    }
}

fn apply_replay(model: AppModel, replayed: Replayed) -> AppModel {
    let mut model = model;
    let closed = model.panels.len().saturating_sub(replayed.depth);
    let detail_was_open = model.detail.is_some();

    model.nav = replayed.state;
    model.panels.truncate(replayed.depth.max(1));
    model.detail = replayed.detail;

    let size = model.terminal_size;
    for panel in &mut model.panels {
        let rows = panel_bounds(size, panel.level).visible_rows();
        panel.cursor.place(model.nav.selection(panel.level), rows);
    }
    if !model
        .panels
        .iter()
        .any(|panel| panel.level == HierarchyLevel::Job)
    {
        model.active_cluster = None;
    }

    model.notice = if closed > 0 || (detail_was_open && model.detail.is_none()) {
        Some("Refreshed; selections that disappeared were closed.".to_string())
    } else {
        Some("Refreshed.".to_string())
    };
    model
}
