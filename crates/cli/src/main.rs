//! Thicket CLI - a nested issue tracker with explicit ordering.

use anyhow::Result;
use clap::{Parser, Subcommand};
use thicket_core::{
    Difficulty, Effort, Importance, Issue, IssueId, IssuePatch, Kind, Patch, Status, Urgency,
};
use thicket_engine::{ForestIndex, MutationCoordinator, NewIssue};
use thicket_storage::{JsonStorage, Storage};
use tracing::Level;

#[derive(Parser)]
#[command(name = "thicket")]
#[command(about = "Nested issue tracker with explicit ordering", long_about = None)]
struct Cli {
    /// Project to operate on
    #[arg(long, global = true, default_value = "inbox")]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project
    NewProject {
        /// Project name
        name: String,
    },
    /// List projects
    Projects,
    /// Add a new issue
    Add {
        /// Issue title
        title: String,
        /// Parent issue ID
        #[arg(long)]
        parent: Option<String>,
        /// Create with an explicit position, after this ordered sibling
        #[arg(long)]
        after: Option<String>,
        /// Create with an explicit position, before this ordered sibling
        #[arg(long)]
        before: Option<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Kind (idea|chore|feature|defect)
        #[arg(long)]
        kind: Option<String>,
        /// Importance (low|medium|high)
        #[arg(long)]
        importance: Option<String>,
        /// Urgency (low|medium|high)
        #[arg(long)]
        urgency: Option<String>,
        /// Difficulty (easy|medium|hard)
        #[arg(long)]
        difficulty: Option<String>,
        /// Effort (minutes|hours|days|weeks)
        #[arg(long)]
        effort: Option<String>,
    },
    /// List the issue tree
    List,
    /// Show issue details
    Show {
        /// Issue ID
        id: String,
    },
    /// Edit issue fields (pass `none` to clear an attribute)
    Set {
        /// Issue ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
        /// Kind (idea|chore|feature|defect|none)
        #[arg(long)]
        kind: Option<String>,
        /// Importance (low|medium|high|none)
        #[arg(long)]
        importance: Option<String>,
        /// Urgency (low|medium|high|none)
        #[arg(long)]
        urgency: Option<String>,
        /// Difficulty (easy|medium|hard|none)
        #[arg(long)]
        difficulty: Option<String>,
        /// Effort (minutes|hours|days|weeks|none)
        #[arg(long)]
        effort: Option<String>,
    },
    /// Resolve an issue
    Resolve {
        /// Issue ID
        id: String,
    },
    /// Reopen a resolved issue
    Reopen {
        /// Issue ID
        id: String,
    },
    /// Start working on an issue
    Start {
        /// Issue ID
        id: String,
    },
    /// Move an ordered issue up among its siblings
    Up {
        /// Issue ID
        id: String,
    },
    /// Move an ordered issue down among its siblings
    Down {
        /// Issue ID
        id: String,
    },
    /// Give an issue an explicit position (at the tail)
    Order {
        /// Issue ID
        id: String,
    },
    /// Return an issue to rank-derived positioning
    Unorder {
        /// Issue ID
        id: String,
    },
    /// Move an issue under a new parent
    Move {
        /// Issue ID
        id: String,
        /// New parent issue ID
        #[arg(long)]
        parent: String,
    },
    /// Detach an issue from its parent, making it root-level
    Detach {
        /// Issue ID
        id: String,
    },
    /// Delete an issue and its whole subtree
    Rm {
        /// Issue ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::WARN)
        .init();

    let cli = Cli::parse();

    let storage_path = std::path::PathBuf::from(".thicket");
    let mut storage = JsonStorage::new(&storage_path).await?;

    match cli.command {
        Commands::NewProject { name } => {
            let project = storage.create_project(&name).await?;
            println!("Created project: {} - {}", project.id, project.name);
            return Ok(());
        }
        Commands::Projects => {
            let projects = storage.list_projects().await?;
            println!("Projects ({})", projects.len());
            for project in projects {
                println!("  {} | {}", project.id, project.name);
            }
            return Ok(());
        }
        command => {
            let project = open_project(&mut storage, &cli.project).await?;
            let mut coord = MutationCoordinator::open(storage, project).await?;
            run(&mut coord, command).await?;
        }
    }

    Ok(())
}

async fn run(coord: &mut MutationCoordinator<JsonStorage>, command: Commands) -> Result<()> {
    match command {
        Commands::NewProject { .. } | Commands::Projects => unreachable!("handled in main"),
        Commands::Add {
            title,
            parent,
            after,
            before,
            notes,
            kind,
            importance,
            urgency,
            difficulty,
            effort,
        } => {
            let spec = NewIssue {
                title,
                notes: notes.unwrap_or_default(),
                parent: parent.as_deref().map(parse_id).transpose()?,
                kind: kind.as_deref().map(parse_kind).transpose()?,
                importance: importance.as_deref().map(parse_importance).transpose()?,
                urgency: urgency.as_deref().map(parse_urgency).transpose()?,
                difficulty: difficulty.as_deref().map(parse_difficulty).transpose()?,
                effort: effort.as_deref().map(parse_effort).transpose()?,
            };
            let issue = if after.is_some() || before.is_some() {
                let after = after.as_deref().map(parse_id).transpose()?;
                let before = before.as_deref().map(parse_id).transpose()?;
                coord.insert_ordered(spec, after, before).await?
            } else {
                coord.create_issue(spec).await?
            };
            println!("Added issue: {} - {}", issue.id, issue.title);
        }
        Commands::List => {
            println!("Issues ({})", coord.index().len());
            print_tree(coord.index(), None, 1);
        }
        Commands::Show { id } => {
            let id = parse_id(&id)?;
            let Some(issue) = coord.index().get(id) else {
                println!("Issue not found");
                return Ok(());
            };
            println!("Issue: {}", issue.id);
            println!("  Title: {}", issue.title);
            if !issue.notes.is_empty() {
                println!("  Notes: {}", issue.notes);
            }
            println!("  Status: {}", format_status(issue.status));
            println!("  Rank: {}", issue.rank());
            println!(
                "  Position: {}",
                if issue.ordered { "ordered" } else { "by rank" }
            );
            if let Some(parent) = issue.parent {
                println!("  Parent: {parent}");
            }
            if !issue.children.is_empty() {
                println!("  Children: {}", issue.children.len());
            }
            println!("  Created: {}", issue.created_at);
            println!("  Updated: {}", issue.updated_at);
        }
        Commands::Set {
            id,
            title,
            notes,
            kind,
            importance,
            urgency,
            difficulty,
            effort,
        } => {
            let id = parse_id(&id)?;
            let patch = IssuePatch {
                title,
                notes,
                kind: parse_patch(kind.as_deref(), parse_kind)?,
                importance: parse_patch(importance.as_deref(), parse_importance)?,
                urgency: parse_patch(urgency.as_deref(), parse_urgency)?,
                difficulty: parse_patch(difficulty.as_deref(), parse_difficulty)?,
                effort: parse_patch(effort.as_deref(), parse_effort)?,
            };
            let issue = coord.update_issue(id, patch).await?;
            println!("Updated issue: {} (rank {})", issue.id, issue.rank());
        }
        Commands::Resolve { id } => {
            coord.resolve(parse_id(&id)?).await?;
            println!("Resolved");
        }
        Commands::Reopen { id } => {
            coord.reopen(parse_id(&id)?).await?;
            println!("Reopened");
        }
        Commands::Start { id } => {
            coord.set_in_progress(parse_id(&id)?).await?;
            println!("Started");
        }
        Commands::Up { id } => {
            coord.move_up(parse_id(&id)?).await?;
            println!("Moved up");
        }
        Commands::Down { id } => {
            coord.move_down(parse_id(&id)?).await?;
            println!("Moved down");
        }
        Commands::Order { id } => {
            coord.convert_to_ordered(parse_id(&id)?).await?;
            println!("Ordered");
        }
        Commands::Unorder { id } => {
            coord.convert_to_unordered(parse_id(&id)?).await?;
            println!("Unordered");
        }
        Commands::Move { id, parent } => {
            coord
                .reparent(parse_id(&id)?, Some(parse_id(&parent)?))
                .await?;
            println!("Moved");
        }
        Commands::Detach { id } => {
            coord.remove_from_parent(parse_id(&id)?).await?;
            println!("Detached");
        }
        Commands::Rm { id } => {
            coord.delete(parse_id(&id)?).await?;
            println!("Deleted");
        }
    }
    Ok(())
}

/// Find a project by name, creating the default scope on first use.
async fn open_project(storage: &mut JsonStorage, name: &str) -> Result<thicket_core::ProjectId> {
    let projects = storage.list_projects().await?;
    if let Some(project) = projects.iter().find(|p| p.name == name) {
        return Ok(project.id);
    }
    if name == "inbox" {
        let project = storage.create_project(name).await?;
        return Ok(project.id);
    }
    anyhow::bail!("No such project: {name} (create it with `thicket new-project {name}`)");
}

/// Print one sibling level: the ordered partition first, in chain order,
/// then the unordered partition by rank.
fn print_tree(index: &ForestIndex, parent: Option<IssueId>, depth: usize) {
    let indent = "  ".repeat(depth);
    for issue in index.ordered_children(parent) {
        println!("{indent}{}", format_line(issue, true));
        print_tree(index, Some(issue.id), depth + 1);
    }
    for issue in index.unordered_children(parent) {
        println!("{indent}{}", format_line(issue, false));
        print_tree(index, Some(issue.id), depth + 1);
    }
}

fn format_line(issue: &Issue, pinned: bool) -> String {
    format!(
        "{} {} | {} | {} - {}",
        if pinned { "#" } else { "·" },
        issue.id,
        format_status(issue.status),
        issue.rank(),
        issue.title,
    )
}

fn parse_id(s: &str) -> Result<IssueId> {
    s.parse().map_err(|_| anyhow::anyhow!("Invalid issue ID"))
}

/// Turn an optional flag value into a field edit; `none` clears the field.
fn parse_patch<T>(value: Option<&str>, parse: fn(&str) -> Result<T>) -> Result<Patch<T>> {
    match value {
        None => Ok(Patch::Keep),
        Some("none") => Ok(Patch::Clear),
        Some(s) => Ok(Patch::Set(parse(s)?)),
    }
}

fn parse_kind(s: &str) -> Result<Kind> {
    match s.to_lowercase().as_str() {
        "idea" => Ok(Kind::Idea),
        "chore" => Ok(Kind::Chore),
        "feature" => Ok(Kind::Feature),
        "defect" => Ok(Kind::Defect),
        _ => anyhow::bail!("Unknown kind: {s}"),
    }
}

fn parse_importance(s: &str) -> Result<Importance> {
    match s.to_lowercase().as_str() {
        "low" => Ok(Importance::Low),
        "medium" => Ok(Importance::Medium),
        "high" => Ok(Importance::High),
        _ => anyhow::bail!("Unknown importance: {s}"),
    }
}

fn parse_urgency(s: &str) -> Result<Urgency> {
    match s.to_lowercase().as_str() {
        "low" => Ok(Urgency::Low),
        "medium" => Ok(Urgency::Medium),
        "high" => Ok(Urgency::High),
        _ => anyhow::bail!("Unknown urgency: {s}"),
    }
}

fn parse_difficulty(s: &str) -> Result<Difficulty> {
    match s.to_lowercase().as_str() {
        "easy" => Ok(Difficulty::Easy),
        "medium" => Ok(Difficulty::Medium),
        "hard" => Ok(Difficulty::Hard),
        _ => anyhow::bail!("Unknown difficulty: {s}"),
    }
}

fn parse_effort(s: &str) -> Result<Effort> {
    match s.to_lowercase().as_str() {
        "minutes" => Ok(Effort::Minutes),
        "hours" => Ok(Effort::Hours),
        "days" => Ok(Effort::Days),
        "weeks" => Ok(Effort::Weeks),
        _ => anyhow::bail!("Unknown effort: {s}"),
    }
}

fn format_status(status: Status) -> &'static str {
    match status {
        Status::Open => "OPEN",
        Status::InProgress => "IN PROGRESS",
        Status::Resolved => "RESOLVED",
        Status::Abandoned => "ABANDONED",
        Status::WontFix => "WONT FIX",
    }
}
