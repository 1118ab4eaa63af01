//! pipeconfd - operator CLI for the pipeline configuration core
//!
//! ## Commands
//!
//! - `init`: create or reset the configuration history repository
//! - `checkin`: record a new revision of the primary configuration
//! - `show` / `log` / `diff`: inspect history
//! - `merge`: three-way merge a stale edit with the latest revision
//! - `validate`: merge with partial configs and run all consistency checks
//! - `gc` / `status`: repository maintenance and health

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pipeconf_core::telemetry::{init_tracing, json_from_env};
use pipeconf_core::{
    obs, validate_dependencies, CachedPartials, ConfigLoader, JsonConfigParser, PartialConfig,
};
use pipeconf_store::{
    ConfigRevision, ConfigStore, GcHealth, SharedConfigStore, StoreSettings, CURRENT,
};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "pipeconfd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Versioned pipeline configuration with merge and validation", long_about = None)]
struct Cli {
    /// Configuration history repository
    #[arg(long, global = true, env = "PIPECONF_REPO_DIR", default_value = "config.git")]
    repo_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines and JSON command output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the history repository, or reset it to the main line
    Init,

    /// Check in a new revision of the primary configuration
    Checkin {
        /// File holding the configuration text
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long, default_value = "anonymous")]
        author: String,

        #[arg(short, long, default_value = "")]
        comment: String,

        #[arg(long, default_value = "1")]
        schema_version: String,

        /// Content hash to record (computed from the file if omitted)
        #[arg(long)]
        md5: Option<String>,
    },

    /// Show a revision by content hash, or `current`
    Show {
        #[arg(default_value = CURRENT)]
        key: String,

        /// Print metadata only
        #[arg(long)]
        metadata: bool,
    },

    /// Show revision history, newest first
    Log {
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Diff two revisions by content hash
    Diff { newer: String, older: String },

    /// Merge an edit based on an older revision with the latest revision
    Merge {
        /// File holding the edited configuration text
        #[arg(short, long)]
        file: PathBuf,

        /// Content hash of the revision the edit started from
        #[arg(short, long)]
        base: String,

        #[arg(short, long, default_value = "anonymous")]
        author: String,

        #[arg(long, default_value = "1")]
        schema_version: String,

        /// Check in the merged result
        #[arg(long)]
        checkin: bool,
    },

    /// Merge partial configs into a configuration and validate it
    Validate {
        /// Primary configuration file (default: current revision)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Partial config files (JSON), repeatable
        #[arg(short, long)]
        partial: Vec<PathBuf>,
    },

    /// Compact loose objects in the history repository
    Gc {
        /// Run even when periodic GC is disabled
        #[arg(long)]
        force: bool,
    },

    /// Show repository status and health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json || json_from_env(), level);

    let json = cli.json;
    let dir = cli.repo_dir.as_path();
    match cli.command {
        Commands::Init => cmd_init(dir).await,
        Commands::Checkin {
            file,
            author,
            comment,
            schema_version,
            md5,
        } => {
            let store = open_store(dir).await?;
            cmd_checkin(&store, &file, &author, &comment, &schema_version, md5, json).await
        }
        Commands::Show { key, metadata } => {
            cmd_show(&open_store(dir).await?, &key, metadata, json).await
        }
        Commands::Log { count, offset } => {
            cmd_log(&open_store(dir).await?, count, offset, json).await
        }
        Commands::Diff { newer, older } => cmd_diff(&open_store(dir).await?, &newer, &older).await,
        Commands::Merge {
            file,
            base,
            author,
            schema_version,
            checkin,
        } => {
            let store = open_store(dir).await?;
            cmd_merge(&store, &file, &base, &author, &schema_version, checkin).await
        }
        Commands::Validate { config, partial } => {
            cmd_validate(dir, config.as_deref(), &partial, json).await
        }
        Commands::Gc { force } => cmd_gc(&open_store(dir).await?, force, json).await,
        Commands::Status => cmd_status(&open_store(dir).await?, json).await,
    }
}

async fn open_store(dir: &Path) -> Result<SharedConfigStore> {
    let store = SharedConfigStore::new(ConfigStore::open(dir, StoreSettings::from_env()));
    store
        .initialize()
        .await
        .with_context(|| format!("Failed to open config history at {}", dir.display()))?;
    Ok(store)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Partial config files carry their origin; entities are re-tagged with it.
fn read_partial(path: &Path) -> Result<PartialConfig> {
    let mut partial: PartialConfig = serde_json::from_str(&read_text(path)?)
        .with_context(|| format!("Invalid partial config {}", path.display()))?;
    partial.tag_entities();
    Ok(partial)
}

async fn cmd_init(dir: &Path) -> Result<()> {
    let store = open_store(dir).await?;
    let commits = store.commit_count().await?;
    println!("Initialized config history at {}", dir.display());
    println!("Revisions: {commits}");
    Ok(())
}

async fn cmd_checkin(
    store: &SharedConfigStore,
    file: &Path,
    author: &str,
    comment: &str,
    schema_version: &str,
    md5: Option<String>,
    json: bool,
) -> Result<()> {
    let content = read_text(file)?;
    let revision = match md5 {
        Some(md5) => ConfigRevision::new(content, md5, author, schema_version),
        None => ConfigRevision::from_content(content, author, schema_version),
    }
    .with_comment(comment);
    let md5 = revision.md5.clone();

    let commit = store.checkin(revision).await?;
    obs::emit_revision_checked_in(&md5, commit.as_deref(), author);

    if json {
        return print_json(&serde_json::json!({ "md5": md5, "commit": commit }));
    }
    match commit {
        Some(sha) => println!("Checked in {md5} as {sha}"),
        None => println!("Unchanged: {md5} is already the current revision"),
    }
    Ok(())
}

async fn cmd_show(store: &SharedConfigStore, key: &str, metadata: bool, json: bool) -> Result<()> {
    let Some(mut revision) = store.get_revision(key).await? else {
        println!("No revisions checked in yet");
        return Ok(());
    };
    if metadata {
        revision.content = None;
    }
    if json {
        return print_json(&revision);
    }
    println!("revision {}", revision.md5);
    if let Some(sha) = &revision.commit_sha {
        println!("commit   {sha}");
    }
    println!("Author:  {}", revision.username);
    println!("Date:    {}", revision.time.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Schema:  {}", revision.schema_version);
    if !revision.comment.is_empty() {
        println!("\n    {}", revision.comment);
    }
    if let Some(content) = &revision.content {
        println!("\n{content}");
    }
    Ok(())
}

async fn cmd_log(store: &SharedConfigStore, count: usize, offset: usize, json: bool) -> Result<()> {
    let commits = store.get_commits(count, offset).await?;
    if json {
        return print_json(&commits);
    }
    if commits.is_empty() {
        println!("No revisions found");
        return Ok(());
    }
    for revision in commits {
        println!("revision {}", revision.md5);
        println!("commit   {}", revision.commit_sha.as_deref().unwrap_or("-"));
        println!("Author:  {}", revision.username);
        println!("Date:    {}", revision.time.format("%Y-%m-%d %H:%M:%S UTC"));
        println!();
        if !revision.comment.is_empty() {
            println!("    {}", revision.comment);
            println!();
        }
    }
    Ok(())
}

async fn cmd_diff(store: &SharedConfigStore, newer: &str, older: &str) -> Result<()> {
    let diff = store.config_changes_for(newer, older).await?;
    if diff.is_empty() {
        println!("No changes between {older} and {newer}");
    } else {
        print!("{diff}");
    }
    Ok(())
}

async fn cmd_merge(
    store: &SharedConfigStore,
    file: &Path,
    base: &str,
    author: &str,
    schema_version: &str,
    checkin: bool,
) -> Result<()> {
    let candidate = ConfigRevision::from_content(read_text(file)?, author, schema_version);
    let merged = match store.merge_with_latest(candidate, base).await {
        Ok(merged) => merged,
        Err(e) if e.is_merge_conflict() => {
            obs::emit_merge_conflict(base);
            bail!("{e}");
        }
        Err(e) => return Err(e).context("Merge failed"),
    };

    if checkin {
        let revision = ConfigRevision::from_content(merged.clone(), author, schema_version)
            .with_comment(format!("Merged edit based on {base}"));
        let md5 = revision.md5.clone();
        let commit = store.checkin(revision).await?;
        obs::emit_revision_checked_in(&md5, commit.as_deref(), author);
        info!(md5 = %md5, "merged revision checked in");
    }
    print!("{merged}");
    Ok(())
}

#[derive(Serialize)]
struct ValidateOutput<'a> {
    valid: bool,
    used: pipeconf_core::PartialSet,
    pipelines: usize,
    order: Vec<String>,
    errors: &'a [pipeconf_core::ValidationError],
}

async fn cmd_validate(
    dir: &Path,
    config: Option<&Path>,
    partials: &[PathBuf],
    json: bool,
) -> Result<()> {
    let content = match config {
        Some(path) => read_text(path)?,
        None => {
            let store = open_store(dir).await?;
            let Some(current) = store.get_revision(CURRENT).await? else {
                bail!("No revisions checked in yet; pass --config");
            };
            current.content.unwrap_or_default()
        }
    };

    let mut cache = CachedPartials::new();
    for path in partials {
        cache.add_or_update(read_partial(path)?);
    }

    let loader = ConfigLoader::new(JsonConfigParser::new());
    let loaded = loader
        .load(&mut cache, &content)
        .context("Configuration rejected")?;
    let order = if loaded.is_valid() {
        validate_dependencies(&loaded.config)?
    } else {
        Vec::new()
    };

    if json {
        print_json(&ValidateOutput {
            valid: loaded.is_valid(),
            used: loaded.used,
            pipelines: loaded.config.pipeline_count(),
            order,
            errors: loaded.report.errors(),
        })?;
    } else if loaded.is_valid() {
        println!(
            "Configuration is valid: {} pipelines",
            loaded.config.pipeline_count()
        );
        println!("Order: {}", order.join(" -> "));
    } else {
        print!("{}", loaded.report.render_summary());
    }

    if !loaded.is_valid() {
        bail!("{} validation error(s)", loaded.report.len());
    }
    Ok(())
}

async fn cmd_gc(store: &SharedConfigStore, force: bool, json: bool) -> Result<()> {
    let mut settings = StoreSettings::from_env();
    if force {
        settings = settings.with_periodic_gc(true);
    }
    let threshold = settings.loose_object_warning_threshold;
    let ran = store.garbage_collect_with(settings).await?;
    let loose = store.loose_object_count().await?;
    obs::emit_gc_completed(ran, loose);
    let health = GcHealth::assess(loose, threshold);

    if json {
        return print_json(&serde_json::json!({ "ran": ran, "loose_objects": loose, "health": health }));
    }
    if ran {
        println!("GC complete: {loose} loose objects remain");
    } else {
        println!("Periodic GC is disabled; use --force or set PIPECONF_CONFIG_REPO_PERIODIC_GC=true");
    }
    if let Some(message) = health.message() {
        println!("{message}");
    }
    Ok(())
}

async fn cmd_status(store: &SharedConfigStore, json: bool) -> Result<()> {
    let current = store.get_revision(CURRENT).await?;
    let commits = store.commit_count().await?;
    let branches = store.branches().await?;
    let loose = store.loose_object_count().await?;
    let threshold = StoreSettings::from_env().loose_object_warning_threshold;
    let health = GcHealth::assess(loose, threshold);

    if json {
        return print_json(&serde_json::json!({
            "current": current.as_ref().map(|r| &r.md5),
            "commits": commits,
            "branches": branches,
            "loose_objects": loose,
            "health": health,
        }));
    }
    match &current {
        Some(rev) => println!("Current revision: {} by {}", rev.md5, rev.username),
        None => println!("Current revision: none"),
    }
    println!("Revisions:        {commits}");
    println!("Branches:         {}", branches.join(", "));
    println!("Loose objects:    {loose} (threshold {threshold})");
    if let Some(message) = health.message() {
        println!("{message}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn validate_accepts_repeated_partials() {
        let cli = Cli::try_parse_from([
            "pipeconfd",
            "validate",
            "--config",
            "main.json",
            "--partial",
            "a.json",
            "--partial",
            "b.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Validate { config, partial } => {
                assert_eq!(config, Some(PathBuf::from("main.json")));
                assert_eq!(partial.len(), 2);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn show_defaults_to_current() {
        let cli = Cli::try_parse_from(["pipeconfd", "--repo-dir", "/tmp/x", "show"]).unwrap();
        assert_eq!(cli.repo_dir, PathBuf::from("/tmp/x"));
        match cli.command {
            Commands::Show { key, metadata } => {
                assert_eq!(key, CURRENT);
                assert!(!metadata);
            }
            _ => panic!("expected show"),
        }
    }

    #[test]
    fn partial_file_entities_take_file_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(
            &path,
            r#"{"origin":{"type":"repo","repo_id":"r1","material_fingerprint":"fp","revision":"9"},
                "groups":[{"name":"g","pipelines":[{"name":"p"}]}]}"#,
        )
        .unwrap();
        let partial = read_partial(&path).unwrap();
        assert_eq!(
            partial.pipelines().next().unwrap().origin.repo_id(),
            Some("r1")
        );
    }
}
