use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use time::Date;
use tracing_subscriber::EnvFilter;

use renoplan::controller::Dashboard;
use renoplan::core::db::{PhotoSlot, UpdateProjectSettings};
use renoplan::domain::normalize::{DATE_FORMAT, MoveDirection, TaskForm, TaskPatchForm};
use renoplan::domain::scope::ScopeType;
use renoplan::domain::task::Task;
use renoplan::{LocalIdentity, ProjectController, ProjectDb};

#[derive(Parser)]
#[command(name = "renoplan")]
#[command(about = "Track a home renovation project stored in a single portable file")]
struct Cli {
    /// Path to the project file (created on first use)
    #[arg(value_name = "PROJECT_FILE")]
    project_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show project settings
    Info,
    /// Update project settings
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        home_type: Option<String>,
        /// Planning mode: macro or detailed
        #[arg(long)]
        mode: Option<String>,
        /// Start date (YYYY-MM-DD, empty string clears)
        #[arg(long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD, empty string clears)
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        budget_expected: Option<f64>,
        #[arg(long)]
        budget_real: Option<f64>,
    },
    /// Project-wide progress, points, deadline and budget indicators
    Dashboard,
    /// Show or change the working scope
    Scope {
        #[command(subcommand)]
        command: ScopeCommand,
    },
    /// Areas (rooms)
    Area {
        #[command(subcommand)]
        command: AreaCommand,
    },
    /// Sub-areas within an area
    Sub {
        #[command(subcommand)]
        command: SubCommand,
    },
    /// Corners within a sub-area
    Corner {
        #[command(subcommand)]
        command: CornerCommand,
    },
    /// Tasks in the current scope
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
}

#[derive(Subcommand)]
enum ScopeCommand {
    /// Print the current selection
    Show,
    /// Work at the area level
    Area { id: i64 },
    /// Work at the sub-area level
    Sub { id: i64 },
    /// Work at the corner level
    Corner { id: i64 },
    /// Switch granularity without picking a node
    Level { level: ScopeLevelArg },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeLevelArg {
    Area,
    Sub,
    Corner,
}

impl From<ScopeLevelArg> for ScopeType {
    fn from(level: ScopeLevelArg) -> Self {
        match level {
            ScopeLevelArg::Area => ScopeType::Area,
            ScopeLevelArg::Sub => ScopeType::SubArea,
            ScopeLevelArg::Corner => ScopeType::Corner,
        }
    }
}

#[derive(Subcommand)]
enum AreaCommand {
    Add {
        name: String,
        /// Room kind, e.g. kitchen, bathroom
        #[arg(long, default_value = "room")]
        kind: String,
        /// Cover photo to copy into the project file
        #[arg(long)]
        cover: Option<PathBuf>,
    },
    Ls,
    Rename { id: i64, name: String },
    Rm { id: i64 },
}

#[derive(Subcommand)]
enum SubCommand {
    Add {
        area_id: i64,
        name: String,
        #[arg(long)]
        desc: Option<String>,
    },
    Ls { area_id: i64 },
    Rename { id: i64, name: String },
    Rm { id: i64 },
}

#[derive(Subcommand)]
enum CornerCommand {
    Add {
        sub_area_id: i64,
        name: String,
        #[arg(long)]
        desc: Option<String>,
    },
    Ls { sub_area_id: i64 },
    Rename { id: i64, name: String },
    Rm { id: i64 },
}

#[derive(Subcommand)]
enum TaskCommand {
    Add {
        title: String,
        #[arg(long)]
        desc: Option<String>,
        /// Free-form category, e.g. paint, plumbing
        #[arg(long = "type")]
        task_type: Option<String>,
        /// todo (default), doing or done; synonyms accepted
        #[arg(long)]
        status: Option<String>,
        /// light, medium (default) or heavy; synonyms accepted
        #[arg(long)]
        weight: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        cost: Option<f64>,
    },
    Ls,
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long = "type")]
        task_type: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        weight: Option<String>,
        /// Due date (YYYY-MM-DD, empty string clears)
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        cost_expected: Option<f64>,
        #[arg(long)]
        cost_real: Option<f64>,
    },
    /// Move one step forward on the board (todo -> doing -> done)
    Move {
        id: i64,
        /// Move backward instead
        #[arg(long)]
        back: bool,
    },
    /// Attach a before or after photo
    Photo {
        id: i64,
        slot: SlotArg,
        path: PathBuf,
    },
    Rm { id: i64 },
}

#[derive(Clone, Copy, ValueEnum)]
enum SlotArg {
    Before,
    After,
}

impl From<SlotArg> for PhotoSlot {
    fn from(slot: SlotArg) -> Self {
        match slot {
            SlotArg::Before => PhotoSlot::Before,
            SlotArg::After => PhotoSlot::After,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose {
        "renoplan=debug"
    } else {
        "renoplan=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let db = ProjectDb::new(&args.project_file).await?;
    let identity = LocalIdentity::from_env();
    let mut controller = ProjectController::load(db.clone(), identity, db.clone()).await?;

    run_command(&mut controller, args.command).await?;

    db.save_project().await?;
    Ok(())
}

async fn run_command(
    controller: &mut ProjectController<ProjectDb, LocalIdentity, ProjectDb>,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Info => {
            let p = controller.project();
            println!("{} ({})", p.name, p.id);
            println!("home type: {}, mode: {}", p.home_type, p.mode);
            match (p.start_date, p.end_date) {
                (Some(start), Some(end)) => println!("schedule: {start} to {end}"),
                (Some(start), None) => println!("schedule: starts {start}"),
                (None, Some(end)) => println!("schedule: ends {end}"),
                (None, None) => println!("schedule: not set"),
            }
            println!(
                "budget: expected {:.2}, real {:.2}",
                p.budget_expected, p.budget_real
            );
        }
        Command::Set {
            name,
            home_type,
            mode,
            start,
            end,
            budget_expected,
            budget_real,
        } => {
            let settings = UpdateProjectSettings {
                name,
                home_type,
                mode,
                start_date: start.map(|s| parse_date_arg(&s)).transpose()?,
                end_date: end.map(|s| parse_date_arg(&s)).transpose()?,
                budget_expected,
                budget_real,
            };
            let project = controller.update_settings(settings).await?;
            println!("updated '{}'", project.name);
        }
        Command::Dashboard => print_dashboard(&controller.dashboard()),
        Command::Scope { command } => match command {
            ScopeCommand::Show => {
                let label = controller.scope().label(controller.hierarchy());
                println!("{label}");
            }
            ScopeCommand::Area { id } => {
                controller.select_area(id).await?;
                println!("{}", controller.scope().label(controller.hierarchy()));
            }
            ScopeCommand::Sub { id } => {
                controller.select_sub_area(id).await?;
                println!("{}", controller.scope().label(controller.hierarchy()));
            }
            ScopeCommand::Corner { id } => {
                controller.select_corner(id).await?;
                println!("{}", controller.scope().label(controller.hierarchy()));
            }
            ScopeCommand::Level { level } => {
                controller.set_scope_level(level.into()).await?;
                println!("{}", controller.scope().label(controller.hierarchy()));
            }
        },
        Command::Area { command } => match command {
            AreaCommand::Add { name, kind, cover } => {
                let area = controller.create_area(&name, &kind, cover).await?;
                println!("added area {} '{}'", area.id, area.name);
            }
            AreaCommand::Ls => {
                for area in controller.hierarchy().areas() {
                    println!("{:>4}  {} ({})", area.id, area.name, area.kind);
                }
            }
            AreaCommand::Rename { id, name } => {
                controller.rename_area(id, &name).await?;
                println!("renamed area {id}");
            }
            AreaCommand::Rm { id } => {
                controller.delete_area(id).await?;
                println!("removed area {id} and everything under it");
            }
        },
        Command::Sub { command } => match command {
            SubCommand::Add { area_id, name, desc } => {
                let sub = controller.create_sub_area(area_id, &name, desc).await?;
                println!("added sub-area {} '{}'", sub.id, sub.name);
            }
            SubCommand::Ls { area_id } => {
                for sub in controller.hierarchy().sub_areas_of(area_id) {
                    println!("{:>4}  {}", sub.id, sub.name);
                }
            }
            SubCommand::Rename { id, name } => {
                controller.rename_sub_area(id, &name).await?;
                println!("renamed sub-area {id}");
            }
            SubCommand::Rm { id } => {
                controller.delete_sub_area(id).await?;
                println!("removed sub-area {id} and its corners");
            }
        },
        Command::Corner { command } => match command {
            CornerCommand::Add {
                sub_area_id,
                name,
                desc,
            } => {
                let corner = controller.create_corner(sub_area_id, &name, desc).await?;
                println!("added corner {} '{}'", corner.id, corner.name);
            }
            CornerCommand::Ls { sub_area_id } => {
                for corner in controller.hierarchy().corners_of(sub_area_id) {
                    println!("{:>4}  {}", corner.id, corner.name);
                }
            }
            CornerCommand::Rename { id, name } => {
                controller.rename_corner(id, &name).await?;
                println!("renamed corner {id}");
            }
            CornerCommand::Rm { id } => {
                controller.delete_corner(id).await?;
                println!("removed corner {id}");
            }
        },
        Command::Task { command } => match command {
            TaskCommand::Add {
                title,
                desc,
                task_type,
                status,
                weight,
                due,
                cost,
            } => {
                let form = TaskForm {
                    title,
                    description: desc,
                    task_type,
                    status,
                    weight,
                    due_date: due,
                    cost_expected: cost,
                };
                let task = controller.create_task(&form).await?;
                println!("added task {} '{}'", task.id, task.title);
            }
            TaskCommand::Ls => {
                let tasks = controller.scoped_tasks();
                if tasks.is_empty() {
                    println!("no tasks in {}", controller.scope().label(controller.hierarchy()));
                }
                for task in tasks {
                    print_task(task);
                }
            }
            TaskCommand::Edit {
                id,
                title,
                desc,
                task_type,
                status,
                weight,
                due,
                cost_expected,
                cost_real,
            } => {
                let form = TaskPatchForm {
                    title,
                    description: desc,
                    task_type,
                    status,
                    weight,
                    due_date: due,
                    cost_expected,
                    cost_real,
                };
                let task = controller.edit_task(id, &form).await?;
                print_task(&task);
            }
            TaskCommand::Move { id, back } => {
                let direction = if back {
                    MoveDirection::Back
                } else {
                    MoveDirection::Forward
                };
                match controller.move_task(id, direction).await? {
                    Some(task) => print_task(&task),
                    None => println!("task {id} is already at the edge of the board"),
                }
            }
            TaskCommand::Photo { id, slot, path } => {
                let task = controller.attach_photo(id, slot.into(), path).await?;
                print_task(&task);
            }
            TaskCommand::Rm { id } => {
                controller.delete_task(id).await?;
                println!("removed task {id}");
            }
        },
    }
    Ok(())
}

fn parse_date_arg(raw: &str) -> anyhow::Result<Option<Date>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Date::parse(trimmed, DATE_FORMAT)
        .map(Some)
        .map_err(|_| anyhow::anyhow!("invalid date '{trimmed}' (expected YYYY-MM-DD)"))
}

fn print_dashboard(dashboard: &Dashboard) {
    println!("scope: {}", dashboard.scope_label);
    println!("tasks: {}", dashboard.task_count);
    println!(
        "progress: {:.1}% (total weight {})",
        dashboard.progress.percent, dashboard.progress.total_weight
    );
    println!("points: {}", dashboard.points);
    println!(
        "overdue: {}, due past project end: {}",
        dashboard.deadlines.overdue_count, dashboard.deadlines.beyond_end_count
    );
    let over = if dashboard.budget.is_over_budget {
        " (over budget)"
    } else {
        ""
    };
    println!(
        "costs: expected {:.2}, real {:.2}{over}",
        dashboard.budget.sum_expected, dashboard.budget.sum_real
    );
}

fn print_task(task: &Task) {
    let photos = match (task.has_photo_before, task.has_photo_after) {
        (true, true) => "b/a",
        (true, false) => "b/-",
        (false, true) => "-/a",
        (false, false) => "-/-",
    };
    let due = task
        .due_date
        .map_or_else(|| "no due date".to_string(), |d| d.to_string());
    println!(
        "{:>4}  [{:<5}] [{:<6}] {}  photos {}  due {}",
        task.id,
        task.status.as_str(),
        task.weight.as_str(),
        task.title,
        photos,
        due
    );
}
