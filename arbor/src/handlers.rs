use anyhow::{Context, Result, anyhow, bail};
use arbor_core::tree::{self, TreeFormat};
use arbor_core::{IndexError, SiteMap, StructureIndex, StructureNode};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug};

pub const DEFAULT_DB_DIR: &str = "~/.config/arbor/";
pub const DB_FILE_NAME: &str = "arbor.db";

pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Database file inside `dir`, with a leading `~` expanded.
pub fn resolve_db_path(dir: &str) -> PathBuf {
    let expanded = shellexpand::tilde(dir);
    Path::new(expanded.as_ref()).join(DB_FILE_NAME)
}

fn value<T: Clone + Send + Sync + 'static>(args: &ArgMatches, id: &str) -> Result<T> {
    args.get_one::<T>(id)
        .cloned()
        .with_context(|| format!("--{} is required", id))
}

fn db_path(args: &ArgMatches) -> Result<PathBuf> {
    Ok(resolve_db_path(&value::<String>(args, "db")?))
}

/// Opens the database selected by `--db`, refusing to create a new one.
pub fn open_existing(args: &ArgMatches) -> Result<StructureIndex> {
    let path = db_path(args)?;
    if !path.exists() {
        bail!(
            "No database at {}. Run `arbor init` first.",
            path.display()
        );
    }
    debug!("Opening {}", path.display());
    StructureIndex::open(&path).with_context(|| format!("Failed to open {}", path.display()))
}

/// Removes a database file and its WAL sidecar files.
pub fn remove_database(path: &Path) -> Result<()> {
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    for suffix in ["-wal", "-shm"] {
        let mut sidecar = path.as_os_str().to_owned();
        sidecar.push(suffix);
        let sidecar = PathBuf::from(sidecar);
        if sidecar.exists() {
            fs::remove_file(&sidecar)
                .with_context(|| format!("Failed to remove {}", sidecar.display()))?;
        }
    }
    Ok(())
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_node(node: &StructureNode) {
    println!(
        "{} {} {}",
        format!("#{}", node.id).cyan().bold(),
        node.method.bright_white().bold(),
        node.name.bright_white()
    );
    let history = node
        .history_id
        .map(|h| h.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "    {} {}  {} {}  {} {}  {} {}",
        "session".blue(),
        node.session_id,
        "parent".blue(),
        node.parent_id,
        "history".blue(),
        history,
        "hash".blue(),
        node.name_hash
    );
    println!("    {} {}", "url".blue(), node.url);
}

fn print_nodes(nodes: &[StructureNode], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(nodes)?);
    } else {
        for node in nodes {
            print_node(node);
        }
    }
    Ok(())
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    let dir = match args.get_one::<String>("PATH") {
        Some(path) => path.clone(),
        None => value::<String>(args, "db")?,
    };
    let force = args.get_flag("force");
    let db_path = resolve_db_path(&dir);
    let db_dir = db_path
        .parent()
        .context("Invalid database path")?
        .to_path_buf();

    print_divider();
    println!("{}", "  ARBOR INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    println!("{} Creating directory structure...", "→".blue());
    fs::create_dir_all(&db_dir)
        .with_context(|| format!("Failed to create {}", db_dir.display()))?;
    println!(
        "  {} {}",
        "✓".green(),
        db_dir.display().to_string().bright_white()
    );

    if db_path.exists() {
        if force {
            println!(
                "{} Deleting existing database (force mode)",
                "→".yellow().bold()
            );
            remove_database(&db_path)?;
            println!("{} Existing database removed", "✓".green().bold());
        } else {
            println!(
                "{} Keeping existing database, checking schema",
                "→".blue()
            );
        }
    }

    let index = StructureIndex::open(&db_path)
        .with_context(|| format!("Failed to initialize {}", db_path.display()))?;
    index.close()?;

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

pub fn handle_node_insert(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let method = value::<String>(args, "method")?.to_ascii_uppercase();

    let node = index.insert(
        value(args, "session")?,
        value(args, "parent")?,
        args.get_one::<i32>("history").copied(),
        &value::<String>(args, "name")?,
        &value::<String>(args, "url")?,
        &method,
    )?;

    if args.get_flag("json") {
        print_nodes(std::slice::from_ref(&node), true)?;
    } else {
        println!("{} Inserted node", "✓".green().bold());
        print_node(&node);
    }
    Ok(())
}

pub fn handle_node_read(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let session_id: i64 = value(args, "session")?;
    let node_id: i64 = value(args, "id")?;

    match index.read(session_id, node_id)? {
        Some(node) => print_nodes(&[node], args.get_flag("json"))?,
        None => println!(
            "{} No node {} in session {}",
            "→".yellow(),
            node_id,
            session_id
        ),
    }
    Ok(())
}

pub fn handle_node_find(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let session_id: i64 = value(args, "session")?;
    let name = value::<String>(args, "name")?;
    let method = value::<String>(args, "method")?.to_ascii_uppercase();

    match index.find(session_id, &name, &method)? {
        Some(node) => print_nodes(&[node], args.get_flag("json"))?,
        None => println!(
            "{} No {} {} in session {}",
            "→".yellow(),
            method,
            name,
            session_id
        ),
    }
    Ok(())
}

pub fn handle_node_children(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let children = index.get_children(value(args, "session")?, value(args, "parent")?)?;

    if children.is_empty() && !args.get_flag("json") {
        println!("{} No child nodes", "→".yellow());
        return Ok(());
    }
    print_nodes(&children, args.get_flag("json"))
}

pub fn handle_node_count(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let count = index.get_child_count(value(args, "session")?, value(args, "parent")?)?;
    println!("{}", count);
    Ok(())
}

pub fn handle_node_delete(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let session_id: i64 = value(args, "session")?;
    let node_id: i64 = value(args, "id")?;

    if args.get_flag("subtree") {
        let removed = index.delete_subtree(session_id, node_id)?;
        println!("{} Removed {} node(s)", "✓".green().bold(), removed);
        return Ok(());
    }

    let removed = index.delete_leaf(session_id, node_id).map_err(|e| match e {
        IndexError::HasChildren { .. } => {
            anyhow!("{} (use --subtree to delete it with its descendants)", e)
        }
        other => other.into(),
    })?;

    if removed {
        println!("{} Removed node {}", "✓".green().bold(), node_id);
    } else {
        println!(
            "{} No node {} in session {}",
            "→".yellow(),
            node_id,
            session_id
        );
    }
    Ok(())
}

pub fn handle_map_add(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let map = SiteMap::new(&index, value(args, "session")?);

    let node = map.add_request(
        args.get_one::<i32>("history").copied(),
        &value::<String>(args, "url")?,
        &value::<String>(args, "method")?,
    )?;

    println!(
        "{} Recorded request in session {}",
        "✓".green().bold(),
        map.session_id()
    );
    print_node(&node);
    Ok(())
}

pub fn handle_map_tree(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let session_id: i64 = value(args, "session")?;
    let format = value::<String>(args, "format")?;
    let format = TreeFormat::from_str(&format)
        .with_context(|| format!("Unknown format '{}'", format))?;

    let entries = tree::build(&index, session_id)?;
    match format {
        TreeFormat::Text => {
            println!(
                "{}",
                format!("Session {} ({} nodes)", session_id, entries.len())
                    .bright_white()
                    .bold()
            );
            print!("{}", tree::render_text(&entries));
        }
        TreeFormat::Json => println!("{}", tree::render_json(&entries)?),
    }
    Ok(())
}

pub fn handle_session_stats(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let session_id: i64 = value(args, "session")?;

    let total = index.session_node_count(session_id)?;
    let top_level = index.get_child_count(session_id, arbor_core::ROOT_PARENT)?;
    println!(
        "{} Session {}: {} node(s), {} top-level",
        "ℹ".blue(),
        session_id,
        total.to_string().cyan(),
        top_level.to_string().cyan()
    );
    Ok(())
}

pub fn handle_session_drop(args: &ArgMatches) -> Result<()> {
    let index = open_existing(args)?;
    let session_id: i64 = value(args, "session")?;

    let removed = index.delete_session(session_id)?;
    println!(
        "{} Removed {} node(s) from session {}",
        "✓".green().bold(),
        removed,
        session_id
    );
    Ok(())
}

/// Runs the subcommand selected in `matches`. Nothing to do without one.
pub fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        None => Ok(()),
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("node", primary_command)) => match primary_command.subcommand() {
            Some(("insert", secondary_command)) => handle_node_insert(secondary_command),
            Some(("read", secondary_command)) => handle_node_read(secondary_command),
            Some(("find", secondary_command)) => handle_node_find(secondary_command),
            Some(("children", secondary_command)) => handle_node_children(secondary_command),
            Some(("count", secondary_command)) => handle_node_count(secondary_command),
            Some(("delete", secondary_command)) => handle_node_delete(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("map", primary_command)) => match primary_command.subcommand() {
            Some(("add", secondary_command)) => handle_map_add(secondary_command),
            Some(("tree", secondary_command)) => handle_map_tree(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("session", primary_command)) => match primary_command.subcommand() {
            Some(("stats", secondary_command)) => handle_session_stats(secondary_command),
            Some(("drop", secondary_command)) => handle_session_drop(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
