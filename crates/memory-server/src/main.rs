//! `memory-bank`: a JSON-RPC stdio server and a local CLI front end over
//! the same `memory-core` engine.
//!
//! Exit codes: `0` success, `1` user error (bad flags/missing args),
//! `2` core error (validation/not-found/conflict/store), `3`
//! external-dependency error (embedding/vector-index unreachable after
//! startup fallback logic also failed).

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use memory_core::config::Config;
use memory_core::domain::TaskPriority;
use memory_core::error::ServiceError;
use memory_core::service::{
    CreateMemoryInput, CreateProjectInput, CreateTaskInput, InitializeProjectInput,
    LogProgressInput, SearchInput, UpdateMemoryInput, UpdateProjectInput, UpdateTaskInput,
};
use memory_core::store::MemoryFilter;
use memory_core::wiring::Dependencies;
use memory_server::dto::{
    parse_memory_type, parse_progress_type, parse_task_priority, parse_task_status, MemoryDto,
    ProjectDto, SearchResultDto, SessionDto, TaskDto, TaskStatisticsDto,
};

#[derive(Parser)]
#[command(name = "memory-bank", version, about = "Semantic memory store for developer knowledge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the JSON-RPC loop over stdio (one request per line on stdin).
    Serve,

    #[command(subcommand)]
    Memory(MemoryCommand),
    #[command(subcommand)]
    Project(ProjectCommand),
    #[command(subcommand)]
    Session(SessionCommand),
    #[command(subcommand)]
    Task(TaskCommand),
}

#[derive(Subcommand)]
enum MemoryCommand {
    Create {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long = "type")]
        memory_type: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "")]
        context: String,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    Get {
        id: String,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        context: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },
    Delete {
        id: String,
    },
    List {
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long = "type")]
        memory_type: Option<String>,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    Search {
        query: String,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0.0)]
        threshold: f32,
    },
    FindSimilar {
        id: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Suggest {
        partial: String,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Archive {
        id: String,
    },
    Unarchive {
        id: String,
    },
    Cleanup {
        #[arg(long)]
        project_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProjectCommand {
    Init {
        path: String,
        #[arg(long)]
        description: Option<String>,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        path: String,
        #[arg(long)]
        description: Option<String>,
    },
    Get {
        id: String,
    },
    GetByPath {
        path: String,
    },
    List,
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    Start {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        task_description: String,
    },
    Log {
        id: String,
        #[arg(long = "type")]
        progress_type: String,
        #[arg(long)]
        message: String,
    },
    Complete {
        id: String,
        #[arg(long)]
        outcome: Option<String>,
    },
    Abort {
        id: String,
        #[arg(long)]
        outcome: Option<String>,
    },
    Get {
        id: String,
    },
    GetActive {
        #[arg(long)]
        project_id: String,
    },
    List {
        #[arg(long)]
        project_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    Create {
        #[arg(long)]
        project_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
    },
    Get {
        id: String,
    },
    Update {
        id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    Delete {
        id: String,
    },
    List {
        #[arg(long)]
        project_id: String,
    },
    Stats {
        #[arg(long)]
        project_id: String,
    },
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap prints its own usage/help text; a parse failure is a
            // user error (bad flags/missing args) by the core's taxonomy.
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env().and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };

    let services = match Dependencies::bootstrap(&config).await {
        Ok(deps) => deps.into_services(),
        Err(e) => {
            eprintln!("startup failed: {e}");
            return ExitCode::from(3);
        }
    };

    if let Command::Serve = &cli.command {
        return match memory_server::rpc::serve_stdio(services).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("rpc loop failed: {e}");
                ExitCode::from(2)
            }
        };
    }

    match run_command(cli.command, &services).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error [{}]: {e}", e.code());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run_command(
    command: Command,
    services: &memory_core::wiring::Services,
) -> Result<(), ServiceError> {
    match command {
        Command::Serve => unreachable!("handled before dispatch"),
        Command::Memory(cmd) => run_memory_command(cmd, services).await,
        Command::Project(cmd) => run_project_command(cmd, services).await,
        Command::Session(cmd) => run_session_command(cmd, services).await,
        Command::Task(cmd) => run_task_command(cmd, services).await,
    }
}

fn memory_type_or_validation(s: &str) -> Result<memory_core::domain::MemoryType, ServiceError> {
    parse_memory_type(s).ok_or_else(|| ServiceError::Validation(format!("unknown memory type '{s}'")))
}

async fn run_memory_command(
    cmd: MemoryCommand,
    services: &memory_core::wiring::Services,
) -> Result<(), ServiceError> {
    match cmd {
        MemoryCommand::Create {
            project_id,
            session_id,
            memory_type,
            title,
            content,
            context,
            tags,
        } => {
            let memory = services
                .memory
                .create(CreateMemoryInput {
                    project_id,
                    session_id,
                    memory_type: memory_type_or_validation(&memory_type)?,
                    title,
                    content,
                    context,
                    tags,
                })
                .await?;
            print_json(&MemoryDto::from(memory));
        }
        MemoryCommand::Get { id } => {
            let memory = services.memory.get(&id).await?;
            print_json(&MemoryDto::from(memory));
        }
        MemoryCommand::Update {
            id,
            title,
            content,
            context,
            tags,
        } => {
            let memory = services
                .memory
                .update(
                    &id,
                    UpdateMemoryInput {
                        title,
                        content,
                        context,
                        tags,
                    },
                )
                .await?;
            print_json(&MemoryDto::from(memory));
        }
        MemoryCommand::Delete { id } => {
            services.memory.delete(&id).await?;
        }
        MemoryCommand::List {
            project_id,
            memory_type,
            tags,
        } => {
            let memories = services
                .memory
                .list(MemoryFilter {
                    project_id,
                    memory_type,
                    tags,
                    ..Default::default()
                })
                .await?;
            let dtos: Vec<MemoryDto> = memories.into_iter().map(Into::into).collect();
            print_json(&dtos);
        }
        MemoryCommand::Search {
            query,
            project_id,
            limit,
            threshold,
        } => {
            let results = services
                .memory
                .search(SearchInput {
                    query,
                    project_id,
                    memory_type: None,
                    tags: Vec::new(),
                    limit,
                    threshold,
                    time_filter: None,
                    include_archived: false,
                })
                .await?;
            let dtos: Vec<SearchResultDto> = results.into_iter().map(Into::into).collect();
            print_json(&dtos);
        }
        MemoryCommand::FindSimilar { id, limit } => {
            let results = services.memory.find_similar(&id, limit).await?;
            let dtos: Vec<SearchResultDto> = results.into_iter().map(Into::into).collect();
            print_json(&dtos);
        }
        MemoryCommand::Suggest {
            partial,
            project_id,
            limit,
        } => {
            let suggestions = services
                .memory
                .suggest(project_id.as_deref(), &partial, limit)
                .await?;
            print_json(&suggestions.into_iter().map(memory_server::dto::SuggestionDto::from).collect::<Vec<_>>());
        }
        MemoryCommand::Archive { id } => {
            let memory = services.memory.archive(&id).await?;
            print_json(&MemoryDto::from(memory));
        }
        MemoryCommand::Unarchive { id } => {
            let memory = services.memory.unarchive(&id).await?;
            print_json(&MemoryDto::from(memory));
        }
        MemoryCommand::Cleanup { project_id } => {
            let report = services.memory.cleanup(project_id.as_deref()).await?;
            print_json(&memory_server::dto::CleanupReportDto::from(report));
        }
    }
    Ok(())
}

async fn run_project_command(
    cmd: ProjectCommand,
    services: &memory_core::wiring::Services,
) -> Result<(), ServiceError> {
    match cmd {
        ProjectCommand::Init { path, description } => {
            let project = services
                .project
                .initialize(
                    &path,
                    InitializeProjectInput {
                        description,
                        language: None,
                        framework: None,
                    },
                )
                .await?;
            print_json(&ProjectDto::from(project));
        }
        ProjectCommand::Create {
            name,
            path,
            description,
        } => {
            let project = services
                .project
                .create(CreateProjectInput {
                    name,
                    path,
                    description,
                    language: None,
                    framework: None,
                })
                .await?;
            print_json(&ProjectDto::from(project));
        }
        ProjectCommand::Get { id } => {
            let project = services.project.get(&id).await?;
            print_json(&ProjectDto::from(project));
        }
        ProjectCommand::GetByPath { path } => {
            let project = services.project.get_by_path(&path).await?;
            print_json(&ProjectDto::from(project));
        }
        ProjectCommand::List => {
            let projects = services.project.list().await?;
            let dtos: Vec<ProjectDto> = projects.into_iter().map(Into::into).collect();
            print_json(&dtos);
        }
        ProjectCommand::Update {
            id,
            name,
            description,
        } => {
            let project = services
                .project
                .update(
                    &id,
                    UpdateProjectInput {
                        name,
                        description,
                        language: None,
                        framework: None,
                    },
                )
                .await?;
            print_json(&ProjectDto::from(project));
        }
        ProjectCommand::Delete { id } => {
            services
                .project
                .delete(&id, &services.memory, &services.session)
                .await?;
        }
    }
    Ok(())
}

async fn run_session_command(
    cmd: SessionCommand,
    services: &memory_core::wiring::Services,
) -> Result<(), ServiceError> {
    match cmd {
        SessionCommand::Start {
            project_id,
            task_description,
        } => {
            let session = services
                .session
                .start_session(&project_id, task_description, Vec::new())
                .await?;
            print_json(&SessionDto::from(session));
        }
        SessionCommand::Log {
            id,
            progress_type,
            message,
        } => {
            let progress_type = parse_progress_type(&progress_type).ok_or_else(|| {
                ServiceError::Validation(format!("unknown progress type '{progress_type}'"))
            })?;
            let session = services
                .session
                .log_progress(&id, LogProgressInput { progress_type, message })
                .await?;
            print_json(&SessionDto::from(session));
        }
        SessionCommand::Complete { id, outcome } => {
            let session = services.session.complete_session(&id, outcome, None).await?;
            print_json(&SessionDto::from(session));
        }
        SessionCommand::Abort { id, outcome } => {
            let session = services.session.abort_session(&id, outcome).await?;
            print_json(&SessionDto::from(session));
        }
        SessionCommand::Get { id } => {
            let session = services.session.get(&id).await?;
            print_json(&SessionDto::from(session));
        }
        SessionCommand::GetActive { project_id } => {
            let session = services.session.get_active(&project_id).await?;
            print_json(&session.map(SessionDto::from));
        }
        SessionCommand::List { project_id } => {
            let sessions = services
                .session
                .list(memory_core::store::SessionFilter {
                    project_id,
                    status: None,
                })
                .await?;
            let dtos: Vec<SessionDto> = sessions.into_iter().map(Into::into).collect();
            print_json(&dtos);
        }
    }
    Ok(())
}

async fn run_task_command(
    cmd: TaskCommand,
    services: &memory_core::wiring::Services,
) -> Result<(), ServiceError> {
    match cmd {
        TaskCommand::Create {
            project_id,
            title,
            description,
            priority,
            assignee,
        } => {
            let priority = priority
                .as_deref()
                .map(|s| {
                    parse_task_priority(s)
                        .ok_or_else(|| ServiceError::Validation(format!("unknown priority '{s}'")))
                })
                .transpose()?
                .unwrap_or(TaskPriority::Medium);
            let task = services
                .task
                .create(CreateTaskInput {
                    project_id,
                    title,
                    description,
                    tags: Vec::new(),
                    priority,
                    assignee,
                    due_date: None,
                    estimated_hours: None,
                })
                .await?;
            print_json(&TaskDto::from(task));
        }
        TaskCommand::Get { id } => {
            let task = services.task.get(&id).await?;
            print_json(&TaskDto::from(task));
        }
        TaskCommand::Update { id, status, priority } => {
            let status = status
                .as_deref()
                .map(|s| {
                    parse_task_status(s)
                        .ok_or_else(|| ServiceError::Validation(format!("unknown status '{s}'")))
                })
                .transpose()?;
            let priority = priority
                .as_deref()
                .map(|s| {
                    parse_task_priority(s)
                        .ok_or_else(|| ServiceError::Validation(format!("unknown priority '{s}'")))
                })
                .transpose()?;
            let task = services
                .task
                .update(
                    &id,
                    UpdateTaskInput {
                        title: None,
                        description: None,
                        tags: None,
                        status,
                        priority,
                        assignee: None,
                        due_date: None,
                        estimated_hours: None,
                        actual_hours: None,
                    },
                )
                .await?;
            print_json(&TaskDto::from(task));
        }
        TaskCommand::Delete { id } => {
            services.task.delete(&id).await?;
        }
        TaskCommand::List { project_id } => {
            let tasks = services.task.list(&project_id).await?;
            let dtos: Vec<TaskDto> = tasks.into_iter().map(Into::into).collect();
            print_json(&dtos);
        }
        TaskCommand::Stats { project_id } => {
            let stats = services.task.statistics(&project_id).await?;
            print_json(&TaskStatisticsDto::from(stats));
        }
    }
    Ok(())
}
