use crate::app::{NavigationState, fetch_allocations, fetch_jobs, fetch_task_detail};
use crate::domain::{
    FormatError, HierarchyLevel, format_task_detail, render_task_detail,
};
use crate::infra::{ProviderError, ResourceProvider, default_environment, default_nomad_address};
use std::io::{self, Write};
use thiserror::Error;
use tracing::info;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Ui,
    Command(CliCommand),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    ListJobs { address: String },
    Job(JobQuery),
}

/// Path down the hierarchy named on the command line. Each missing step
/// turns into a listing of the candidates at that step.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct JobQuery {
    pub address: String,
    pub job: String,
    pub task_group: Option<String>,
    pub allocation: Option<usize>,
    pub task: Option<String>,
    pub display_format: Option<String>,
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: -{0}")]
    MissingFlagValue(String),

    #[error("invalid value for -{flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

#[derive(Debug, Default)]
struct Flags {
    help: bool,
    version: bool,
    ui: bool,
    list_jobs: bool,
    nomad_address: Option<String>,
    job: Option<String>,
    task_group: Option<String>,
    allocation: Option<usize>,
    task: Option<String>,
    display_format: Option<String>,
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    let flags = parse_flags(args)?;

    if flags.help {
        return Ok(CliInvocation::PrintHelp);
    }
    if flags.version {
        return Ok(CliInvocation::PrintVersion);
    }
    if flags.ui {
        return Ok(CliInvocation::Ui);
    }

    let address = flags
        .nomad_address
        .clone()
        .unwrap_or_else(default_nomad_address);
    if flags.list_jobs {
        return Ok(CliInvocation::Command(CliCommand::ListJobs { address }));
    }
    match flags.job {
        Some(job) if !job.is_empty() => Ok(CliInvocation::Command(CliCommand::Job(JobQuery {
            address,
            job,
            task_group: flags.task_group,
            allocation: flags.allocation,
            task: flags.task,
            display_format: flags.display_format,
        }))),
        _ => Ok(CliInvocation::PrintHelp),
    }
}

fn parse_flags(args: &[String]) -> Result<Flags, CliParseError> {
    let mut flags = Flags::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        let Some(stripped) = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-')) else {
            return Err(CliParseError::UnexpectedArgument(arg.to_string()));
        };
        if stripped.is_empty() {
            return Err(CliParseError::UnexpectedArgument(arg.to_string()));
        }
        let (name, inline) = match stripped.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (stripped, None),
        };

        match name {
            "help" | "h" => flags.help = parse_bool_flag(name, inline)?,
            "version" => flags.version = parse_bool_flag(name, inline)?,
            "ui" => flags.ui = parse_bool_flag(name, inline)?,
            "list-jobs" => flags.list_jobs = parse_bool_flag(name, inline)?,
            "nomad-address" => flags.nomad_address = Some(flag_value(name, inline, &mut iter)?),
            "job" => flags.job = Some(flag_value(name, inline, &mut iter)?),
            "task-group" => flags.task_group = Some(flag_value(name, inline, &mut iter)?),
            "task" => flags.task = Some(flag_value(name, inline, &mut iter)?),
            "display-format" => {
                flags.display_format = Some(flag_value(name, inline, &mut iter)?);
            }
            "allocation" => {
                let value = flag_value(name, inline, &mut iter)?;
                flags.allocation = Some(parse_usize_flag(name, &value)?);
            }
            _ => return Err(CliParseError::UnknownFlag(arg.to_string())),
        }
    }

    Ok(flags)
}

fn flag_value<'a>(
    name: &str,
    inline: Option<String>,
    rest: &mut impl Iterator<Item = &'a String>,
) -> Result<String, CliParseError> {
    match inline {
        Some(value) => Ok(value),
        None => rest
            .next()
            .cloned()
            .ok_or_else(|| CliParseError::MissingFlagValue(name.to_string())),
    }
}

fn parse_bool_flag(name: &str, inline: Option<String>) -> Result<bool, CliParseError> {
    match inline.as_deref() {
        None | Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(CliParseError::InvalidFlagValue {
            flag: name.to_string(),
            value: other.to_string(),
        }),
    }
}

fn parse_usize_flag(flag: &str, value: &str) -> Result<usize, CliParseError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| CliParseError::InvalidFlagValue {
            flag: flag.to_string(),
            value: value.to_string(),
        })
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("{} {requested} not found. Available {}:\n{}", .level.noun(), .level.title().to_lowercase(), .available.join("\n"))]
    NotFound {
        level: HierarchyLevel,
        requested: String,
        available: Vec<String>,
    },
}

/// Runs a one-shot command against a freshly connected provider.
pub fn run<P: ResourceProvider + ?Sized>(
    command: CliCommand,
    provider: &mut P,
    out: &mut impl Write,
) -> Result<(), CliRunError> {
    match command {
        CliCommand::ListJobs { address } => {
            provider.connect(&address)?;
            for job in fetch_jobs(&*provider)? {
                if !write_line(out, &format!("* {}", job.name))? {
                    break;
                }
            }
            Ok(())
        }
        CliCommand::Job(query) => run_job_query(query, provider, out),
    }
}

fn run_job_query<P: ResourceProvider + ?Sized>(
    query: JobQuery,
    provider: &mut P,
    out: &mut impl Write,
) -> Result<(), CliRunError> {
    provider.connect(&query.address)?;
    info!(address = %query.address, job = %query.job, "running one-shot query");

    let mut nav = NavigationState::new(vec![default_environment(query.address.clone())]);
    nav.jobs = fetch_jobs(&*provider)?;
    select_by_name(&mut nav, HierarchyLevel::Job, &query.job)?;

    let Some(task_group) = query.task_group.as_deref() else {
        return write_rows(out, &nav, HierarchyLevel::TaskGroup);
    };
    select_by_name(&mut nav, HierarchyLevel::TaskGroup, task_group)?;

    let (job_id, group_name) = match (nav.current_job(), nav.current_task_group()) {
        (Ok(job), Ok(group)) => (job.id.clone(), group.name.clone()),
        _ => return Ok(()),
    };
    nav.allocations = fetch_allocations(&*provider, &job_id, &group_name)?;

    let Some(index) = query.allocation else {
        return write_rows(out, &nav, HierarchyLevel::Allocation);
    };
    if index >= nav.allocations.len() {
        return Err(not_found(&nav, HierarchyLevel::Allocation, index.to_string()));
    }
    nav.select(HierarchyLevel::Allocation, index);

    let Some(task_name) = query.task.as_deref() else {
        return write_rows(out, &nav, HierarchyLevel::Task);
    };
    select_by_name(&mut nav, HierarchyLevel::Task, task_name)?;

    let detail = match (nav.current_task(), nav.current_allocation()) {
        (Ok(task), Ok(allocation)) => fetch_task_detail(&*provider, task, allocation)?,
        _ => return Ok(()),
    };
    let text = match query.display_format.as_deref() {
        Some(template) => format_task_detail(template, &detail)?,
        None => render_task_detail(&detail),
    };
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}

/// Selects the first entry of `level` whose name equals `name`.
fn select_by_name(
    nav: &mut NavigationState,
    level: HierarchyLevel,
    name: &str,
) -> Result<(), CliRunError> {
    let position = match level {
        HierarchyLevel::Job => nav.jobs.iter().position(|job| job.name == name),
        HierarchyLevel::TaskGroup => nav
            .current_job()
            .ok()
            .and_then(|job| job.task_groups.iter().position(|group| group.name == name)),
        HierarchyLevel::Task => nav
            .current_task_group()
            .ok()
            .and_then(|group| group.tasks.iter().position(|task| task.name == name)),
        HierarchyLevel::Cluster | HierarchyLevel::Allocation => None,
    };
    match position {
        Some(index) => {
            nav.select(level, index);
            Ok(())
        }
        None => Err(not_found(nav, level, name.to_string())),
    }
}

fn not_found(nav: &NavigationState, level: HierarchyLevel, requested: String) -> CliRunError {
    CliRunError::NotFound {
        level,
        requested,
        available: listing(nav, level),
    }
}

/// One-shot listing lines: `(index) name` for allocations, `* name` otherwise.
fn listing(nav: &NavigationState, level: HierarchyLevel) -> Vec<String> {
    match level {
        HierarchyLevel::Allocation => nav
            .allocations
            .iter()
            .enumerate()
            .map(|(index, alloc)| format!("({index}) {}", alloc.name))
            .collect(),
        HierarchyLevel::Job => nav.jobs.iter().map(|job| format!("* {}", job.name)).collect(),
        HierarchyLevel::TaskGroup => nav
            .current_job()
            .map(|job| {
                job.task_groups
                    .iter()
                    .map(|group| format!("* {}", group.name))
                    .collect()
            })
            .unwrap_or_default(),
        HierarchyLevel::Task => nav
            .current_task_group()
            .map(|group| {
                group
                    .tasks
                    .iter()
                    .map(|task| format!("* {}", task.name))
                    .collect()
            })
            .unwrap_or_default(),
        HierarchyLevel::Cluster => nav
            .environments
            .iter()
            .map(|env| format!("* {}", env.name))
            .collect(),
    }
}

fn write_rows(
    out: &mut impl Write,
    nav: &NavigationState,
    level: HierarchyLevel,
) -> Result<(), CliRunError> {
    for line in listing(nav, level) {
        if !write_line(out, &line)? {
            break;
        }
    }
    Ok(())
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}

pub fn help_text() -> String {
    let program = env!("CARGO_PKG_NAME");
    format!(
        "usage: {program} [options]

  -ui                       browse clusters interactively
  -list-jobs                list jobs
  -nomad-address ADDR       cluster address for one-shot commands
                            (default: $NOMAD_ADDR or http://localhost:4646)
  -job NAME                 job to inspect; lists its task groups
  -task-group NAME          task group to inspect; lists running allocations
  -allocation N             allocation index to inspect; lists its tasks
  -task NAME                task to print
  -display-format TEMPLATE  task template, e.g. '{{node_ip}}:{{port:http}}'
  -version                  print version
  -help, -h                 show this help

Clusters for -ui are read from ./.trek.rc or ~/.trek.rc.
Set TREK_LOG=<file> to write logs (filtered by RUST_LOG).
"
    )
}
