use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use flickr_sync::config::Config;
use flickr_sync::exif::ExifTool;
use flickr_sync::flickr::FlickrClient;
use flickr_sync::flickr::auth::{self, Authorizer};
use flickr_sync::pipeline::{Reconciler, SyncReport};

#[derive(Parser, Debug)]
#[command(
    name = "flickr-sync",
    version,
    about = "Reconcile a Flickr photoset with a local folder of images: titles, descriptions, GPS and keywords"
)]
struct Cli {
    /// Flickr photoset (album) id
    #[arg(value_name = "PHOTOSET_ID", required_unless_present_any = ["init", "auth"])]
    photoset_id: Option<String>,

    /// Local folder holding the original files
    #[arg(value_name = "FOLDER", required_unless_present_any = ["init", "auth"])]
    folder: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Authorize this tool for write access and store the OAuth token in the config file
    #[arg(long, conflicts_with = "init")]
    auth: bool,

    /// Log planned changes without writing files or pushing tags
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    // Credentials: .env, then the process environment, over the config file
    if let Err(e) = dotenv::dotenv() {
        log::debug!("No .env file loaded: {e}");
    }

    if cli.auth {
        return authorize(&cli).await;
    }

    let (Some(photoset_id), Some(folder)) = (cli.photoset_id.as_deref(), cli.folder.as_deref()) else {
        anyhow::bail!("A photoset id and a folder are required. Use --help for usage.");
    };

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env();
    if cli.dry_run {
        config.output.dry_run = true;
    }
    config.validate()?;

    if config.output.dry_run {
        log::info!("DRY RUN: no files will be modified and no tags pushed");
    }

    let client = FlickrClient::new(&config.flickr, config.sync.call_delay())?;
    let tool = ExifTool::new(config.output.exiftool.clone());

    let report = Reconciler::new(&client, &tool, &config)
        .run(photoset_id, folder)
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

/// Out-of-band OAuth flow. Only the token fields are written back, so
/// credentials supplied through the environment never land in the file.
async fn authorize(cli: &Cli) -> Result<()> {
    let mut stored = Config::load(cli.config.as_deref())?;
    let mut effective = stored.clone();
    effective.apply_env();

    let authorizer = Authorizer::new(&effective.flickr.api_key, &effective.flickr.api_secret)?;
    let request = authorizer.request_token().await?;

    println!("Open this URL, allow write access, then paste the verifier code:");
    println!();
    println!("  {}", auth::authorize_url(&request, auth::WRITE_PERMS));
    println!();
    print!("Verifier code: ");
    std::io::stdout().flush()?;

    let mut verifier = String::new();
    std::io::stdin().lock().read_line(&mut verifier)?;
    if verifier.trim().is_empty() {
        anyhow::bail!("No verifier code entered");
    }

    let access = authorizer.access_token(&request, &verifier).await?;
    log::info!("Authorized as {} ({})", access.username, access.user_nsid);

    stored.flickr.oauth_token = access.token;
    stored.flickr.oauth_token_secret = access.secret;
    if stored.flickr.user_id.is_empty() && effective.flickr.user_id.is_empty() {
        stored.flickr.user_id = access.user_nsid;
    }
    stored.save(cli.config.as_deref())?;
    println!("OAuth token stored. FLICKR_OAUTH_TOKEN in the environment still takes precedence.");
    Ok(())
}

// ANSI color codes
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

fn print_summary(report: &SyncReport) {
    println!();
    let title = report.photoset_title.as_deref().unwrap_or("(untitled)");
    println!("{BOLD}Photoset:{RESET} {} {DIM}({}){RESET}", title, report.photoset_id);
    println!("{DIM}{}{RESET}", "═".repeat(72));

    let counts = [
        ("Local files", report.local_files),
        ("Remote photos", report.remote_seen),
        ("Matched", report.matched),
        ("Unmatched", report.unmatched),
        ("Skipped", report.skipped_remote),
        ("Files written", report.files_written),
        ("Files unchanged", report.files_unchanged),
        ("Write failures", report.write_failures),
        ("Keyword pushes", report.tags_pushed),
        ("Push failures", report.push_failures),
        ("Unclaimed local", report.unclaimed_local),
    ];
    for (label, count) in counts {
        print_row(label, &count.to_string());
    }
    if report.listing_incomplete {
        println!("  {YELLOW}listing stopped early; re-run to pick up the remaining pages{RESET}");
    }
    println!();

    let anomalous: Vec<_> = report.matches.iter().filter(|m| m.is_anomalous()).collect();
    if !anomalous.is_empty() {
        println!("  {BOLD}Check these (more than two files matched){RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        for result in anomalous {
            let files: Vec<String> = result.paths.iter().map(|p| p.display().to_string()).collect();
            print_row(&result.remote_id, &files.join(" "));
        }
        println!();
    }

    let unmatched: Vec<&str> = report
        .matches
        .iter()
        .filter(|m| !m.is_matched())
        .map(|m| m.remote_id.as_str())
        .collect();
    if !unmatched.is_empty() {
        println!("  {BOLD}Unmatched photos{RESET}");
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        print_row("ids", &unmatched.join(" "));
        println!();
    }
}

/// Print a single row in the summary table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
