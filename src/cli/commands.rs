//! Command dispatch: resolves settings and role, then calls the hierarchy service.

use std::io;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{Forest, NodeId, Role};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::traits::{FileSystem, RealFileSystem};
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        Cli::command()
            .print_help()
            .map_err(|e| InfraError::io("print help", e))?;
        return Ok(());
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => config_command(cli, command),
        _ => {
            let settings = load_settings(cli)?;
            let role = cli.role.unwrap_or(settings.role);
            debug!("role: {}, store: {}", role, settings.store_path.display());
            let container = ServiceContainer::new(settings)?;
            dispatch(&container, command, role)
        }
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(store) = &cli.store {
        settings.store_path = store.clone();
    }
    Ok(settings)
}

fn dispatch(container: &ServiceContainer, command: &Commands, role: Role) -> CliResult<()> {
    match command {
        Commands::Tree => cmd_tree(container, role),
        Commands::Show { id } => cmd_show(container, *id, role),
        Commands::Path { id } => cmd_path(container, *id, role),
        Commands::Search { query } => cmd_search(container, query, role),
        Commands::Create { name, parent } => cmd_create(container, name, *parent, role),
        Commands::Rename { id, name } => cmd_rename(container, *id, name, role),
        Commands::Delete { id } => cmd_delete(container, *id, role),
        Commands::Move { id, parent, root } => {
            let new_parent = if *root { None } else { *parent };
            cmd_move(container, *id, new_parent, role)
        }
        Commands::Policy => cmd_policy(container),
        Commands::Info => cmd_info(container, role),
        Commands::Config { .. } | Commands::Completion { .. } => Err(CliError::Usage(
            "command does not operate on the taxonomy".to_string(),
        )),
    }
}

fn print_forest(forest: &Forest) {
    if forest.is_empty() {
        output::warning("taxonomy is empty");
        return;
    }
    for tree in forest.render() {
        output::info(tree.trim_end());
    }
}

#[instrument(skip(container))]
fn cmd_tree(container: &ServiceContainer, role: Role) -> CliResult<()> {
    let forest = container.hierarchy().get_tree(role)?;
    print_forest(&forest);
    Ok(())
}

#[instrument(skip(container))]
fn cmd_show(container: &ServiceContainer, id: NodeId, role: Role) -> CliResult<()> {
    let service = container.hierarchy();
    let node = service.get_node(id, role)?;
    let path = service.get_path(id, role)?;
    let forest = service.get_tree(role)?;
    let children = forest.find(id).map_or(0, |n| n.children.len());

    output::header(&node.name);
    output::field("id", &node.id);
    match node.parent_id {
        Some(parent) => output::field("parent", &parent),
        None => output::field("parent", "(root)"),
    }
    output::field("path", &output::breadcrumb(&path));
    output::field("children", &children);
    Ok(())
}

#[instrument(skip(container))]
fn cmd_path(container: &ServiceContainer, id: NodeId, role: Role) -> CliResult<()> {
    let path = container.hierarchy().get_path(id, role)?;
    if path.is_empty() {
        output::warning(&format!("node {id} is not in the taxonomy"));
        return Ok(());
    }
    output::info(&output::breadcrumb(&path));
    Ok(())
}

#[instrument(skip(container))]
fn cmd_search(container: &ServiceContainer, query: &str, role: Role) -> CliResult<()> {
    let hits = container.hierarchy().search(query, role)?;
    if hits.is_empty() {
        output::warning(&format!("no nodes match '{query}'"));
        return Ok(());
    }
    for hit in hits {
        output::info(&format!("#{:<5} {}", hit.node.id, output::breadcrumb(&hit.path)));
    }
    Ok(())
}

#[instrument(skip(container))]
fn cmd_create(
    container: &ServiceContainer,
    name: &str,
    parent: Option<NodeId>,
    role: Role,
) -> CliResult<()> {
    let (node, forest) = container.hierarchy().create_node(name, parent, role)?;
    output::success(&format!("created {node}"));
    print_forest(&forest);
    Ok(())
}

#[instrument(skip(container))]
fn cmd_rename(container: &ServiceContainer, id: NodeId, name: &str, role: Role) -> CliResult<()> {
    let forest = container.hierarchy().rename(id, name, role)?;
    output::success(&format!("renamed node {id}"));
    print_forest(&forest);
    Ok(())
}

#[instrument(skip(container))]
fn cmd_delete(container: &ServiceContainer, id: NodeId, role: Role) -> CliResult<()> {
    let outcome = container.hierarchy().delete(id, role)?;
    output::success(&format!("deleted {} node(s)", outcome.removed.len()));
    for removed in &outcome.removed {
        output::removed(&format!("#{removed}"));
    }
    print_forest(&outcome.forest);
    Ok(())
}

#[instrument(skip(container))]
fn cmd_move(
    container: &ServiceContainer,
    id: NodeId,
    new_parent: Option<NodeId>,
    role: Role,
) -> CliResult<()> {
    let forest = container.hierarchy().move_node(id, new_parent, role)?;
    match new_parent {
        Some(parent) => output::success(&format!("moved node {id} under {parent}")),
        None => output::success(&format!("node {id} is now a root")),
    }
    print_forest(&forest);
    Ok(())
}

fn cmd_policy(container: &ServiceContainer) -> CliResult<()> {
    let settings = &container.settings;
    let table = settings.permission_policy()?.table();
    output::header(&format!(
        "{:<8} {}",
        "action",
        Role::ALL
            .iter()
            .map(|r| format!("{:<13}", r.as_str()))
            .collect::<String>()
    ));
    for (action, granted) in table {
        let row: String = Role::ALL
            .iter()
            .map(|role| {
                let cell = if granted.contains(role) { "yes" } else { "no" };
                format!("{cell:<13}")
            })
            .collect();
        output::info(&format!("{:<8} {}", action.as_str(), row));
    }
    if !settings.policy.is_empty() {
        output::detail("(includes [policy] overrides from config)");
    }
    Ok(())
}

fn cmd_info(container: &ServiceContainer, role: Role) -> CliResult<()> {
    let settings = &container.settings;
    output::header("taxonomy");
    output::field("version", env!("CARGO_PKG_VERSION"));
    output::field("role", &role);
    output::field("store", &settings.store_path.display());
    if !container.fs.exists(&settings.store_path) {
        output::detail("(store document not created yet)");
    }
    let forest = container.hierarchy().get_tree(role)?;
    output::field("nodes", &forest.len());
    output::field("roots", &forest.roots().len());
    output::field("leaves", &forest.iter().filter(|n| n.is_leaf()).count());
    output::field("depth", &forest.depth());
    Ok(())
}

fn config_command(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
            Ok(())
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::field("global", &path.display()),
                None => output::field("global", "(no config directory on this platform)"),
            }
            if let Some(path) = &cli.config {
                output::field("explicit", &path.display());
            }
            Ok(())
        }
        ConfigCommands::Init { force } => {
            let target: PathBuf = match &cli.config {
                Some(path) => path.clone(),
                None => global_config_path().ok_or_else(|| {
                    CliError::Usage("no config directory; pass --config <path>".to_string())
                })?,
            };
            let fs = RealFileSystem;
            if fs.exists(&target) && !force {
                return Err(CliError::Usage(format!(
                    "{} exists, use --force to overwrite",
                    target.display()
                )));
            }
            fs.ensure_parent(&target)
                .map_err(|e| InfraError::io(format!("create parent of {}", target.display()), e))?;
            fs.write(&target, &Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", target.display()), e))?;
            output::success(&format!("wrote {}", target.display()));
            Ok(())
        }
    }
}
