mod terminal;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use pmwe_core::config::{config_path, load_profiles};
use pmwe_core::sync::list_profiles;
use pmwe_core::{
    LocalCache, Orchestrator, PageReference, PmWikiClient, PmWikiTransport, ServerProfile,
    SyncCommand, SyncOutcome, SyncReport, resolve_profile,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::terminal::{TerminalUser, run_command};

const PASSWORD_ENV_VAR: &str = "PMWE_PASSWORD";

#[derive(Debug, Parser)]
#[command(
    name = "pmwe",
    version,
    about = "Pull, edit, push and delete PmWiki pages from the command line"
)]
struct Cli {
    #[arg(short = 's', long, value_name = "NAME", help = "Profile to use")]
    server: Option<String>,
    #[arg(short = 'a', long, value_name = "NAME", help = "Override the configured author")]
    author: Option<String>,
    #[arg(short = 'b', long, help = "After edit or push, open the page in the configured browser")]
    browse: bool,
    #[arg(short = 'k', long, help = "Retain a local copy of the page source")]
    keep: bool,
    #[arg(short = 'n', long, help = "Explicitly use no password when authenticating")]
    nopass: bool,
    #[arg(short = 'y', long, help = "Delete without the typed confirmation")]
    yes: bool,
    #[arg(long, value_name = "PATH", help = "Profile configuration file")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Directory for cached page sources")]
    cache_dir: Option<PathBuf>,
    #[arg(long, help = "Print the command report as JSON")]
    json: bool,
    #[arg(short = 'q', long, help = "Only print warnings and errors")]
    quiet: bool,
    #[arg(value_enum, value_name = "COMMAND")]
    command: CommandName,
    #[arg(value_name = "PAGE", help = "Page to work with (a local file for push)")]
    page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CommandName {
    /// Send a local file to the server
    Push,
    /// Retrieve a page into a local file
    Pull,
    /// Pull, open in the configured editor, and push the changes
    Edit,
    /// Delete the page on the server after confirmation
    Delete,
    /// Show all configured profiles
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    dotenvy::dotenv().ok();

    let config_path = config_path(cli.config.as_deref())
        .context("could not determine the configuration directory; pass --config")?;
    let profiles = load_profiles(&config_path)?;

    if cli.command == CommandName::List {
        let names = list_profiles(&profiles);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&names)?);
        } else {
            println!("Configured profiles:");
            println!();
            for name in names {
                println!("{name}");
            }
        }
        return Ok(());
    }

    let profile = apply_overrides(resolve_profile(&profiles, cli.server.as_deref())?, &cli);
    let (command, raw_page) = sync_command(&cli)?;
    let page = PageReference::parse(&profile, &raw_page)?;

    // Lazily required settings are checked before any network activity.
    let editor = match command {
        SyncCommand::Edit => Some(profile.require_editor()?.to_string()),
        _ => None,
    };
    let browser = if cli.browse {
        Some(profile.require_browser()?.to_string())
    } else {
        None
    };

    let cache_dir = match &cli.cache_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("failed to read current directory")?,
    };
    let transport = PmWikiTransport::new(
        PmWikiClient::from_env()?,
        &profile,
        LocalCache::new(cache_dir),
    );
    let mut orchestrator =
        Orchestrator::new(&profile, transport, TerminalUser::new(editor, cli.yes));
    let report = orchestrator.run(&page, &command)?;
    print_report(&report, cli.json)?;

    if let Some(browser) = browser
        && should_browse(&command, report.outcome)
    {
        open_in_browser(&browser, &page.resolved_url)?;
    }
    Ok(())
}

/// Browse only after an edit or push ran to completion.
fn should_browse(command: &SyncCommand, outcome: SyncOutcome) -> bool {
    !matches!(command, SyncCommand::Delete) && matches!(outcome, SyncOutcome::Pushed(_))
}

fn open_in_browser(browser: &str, url: &str) -> Result<()> {
    run_command(browser, url).with_context(|| format!("failed to open {url} in the browser"))
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn apply_overrides(mut profile: ServerProfile, cli: &Cli) -> ServerProfile {
    if let Some(author) = cli.author.as_deref().map(str::trim)
        && !author.is_empty()
    {
        profile.author = author.to_string();
    }
    if cli.keep {
        profile.keep_local_copy = true;
    }
    if cli.nopass {
        profile.password = None;
    } else if profile.password.is_none()
        && let Ok(password) = env::var(PASSWORD_ENV_VAR)
        && !password.is_empty()
    {
        profile.password = Some(password);
    }
    profile
}

/// Map the command name onto a sync command and the raw page string to parse.
fn sync_command(cli: &Cli) -> Result<(SyncCommand, String)> {
    let page = cli.page.clone().unwrap_or_default();
    let command = match cli.command {
        CommandName::Pull => SyncCommand::Pull,
        CommandName::Edit => SyncCommand::Edit,
        CommandName::Delete => SyncCommand::Delete,
        CommandName::Push => {
            if page.trim().is_empty() {
                bail!("push requires a local file to read from");
            }
            let file = PathBuf::from(page.trim());
            let name = page_name_from_file(&file);
            return Ok((SyncCommand::Push { file }, name));
        }
        CommandName::List => bail!("list does not operate on a page"),
    };
    Ok((command, page))
}

fn page_name_from_file(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    info!("{}: {}", report.page, report.outcome.message());
    println!("command: {}", report.command);
    println!("profile: {}", report.profile);
    println!("page: {}", report.page);
    println!("url: {}", report.url);
    println!("outcome: {}", report.outcome.message());
    if let Some(cache_file) = &report.cache_file {
        println!("saved_to: {cache_file}");
    }
    println!("requests: {}", report.request_count);
    Ok(())
}
