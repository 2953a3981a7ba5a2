//! ytuploader - Batch Video Uploader
//!
//! Command line front end: resolves companions, runs batch and quick uploads,
//! and maintains already uploaded items.

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, LevelFilter};

use ytuploader::assets::{group_by_title, AssetBrowser, Confirm};
use ytuploader::auth::OAuthTokenProvider;
use ytuploader::batch::BatchScheduler;
use ytuploader::companion::{CompanionProcessor, EnrichmentSupervisor};
use ytuploader::config::{
    AppPaths, APP_VERSION, DEFAULT_ASSET_PAGE_SIZE, DEFAULT_PREFIX_LEN, DEFAULT_QUICK_CATEGORY,
    DEFAULT_QUICK_LANGUAGE,
};
use ytuploader::file_matcher::FileMatcher;
use ytuploader::logging::{setup_logging, shutdown_logging};
use ytuploader::media_tool::{FfmpegTool, MediaToolkit};
use ytuploader::metadata::PrivacyStatus;
use ytuploader::preferences::{Favorites, ProfilePreferences, SourceMap};
use ytuploader::profiles::ProfileCatalog;
use ytuploader::quick_upload::{QuickEvent, QuickOptions, QuickUploader};
use ytuploader::remote::{AuthProvider, MetadataUpdate, RemoteMediaService};
use ytuploader::uploader::{UploadEvent, UploadOrchestrator};
use ytuploader::workspace::Workspace;
use ytuploader::youtube::YouTubeService;

/// Time allowed for background subtitle extraction and thumbnail capture
const ENRICHMENT_WAIT: Duration = Duration::from_secs(120);

#[derive(Parser)]
#[command(name = "ytuploader", version = APP_VERSION, about = "Batch video uploader with companion-file matching")]
struct Cli {
    /// Log to stderr (honours RUST_LOG) instead of the log file
    #[arg(long, global = true)]
    log_stderr: bool,
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Characters of the file name used for prefix matching (10-15)
    #[arg(long, global = true, default_value_t = DEFAULT_PREFIX_LEN)]
    prefix_len: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show companions, metadata state and eligible profiles of videos
    Scan {
        /// Video files or folders (scanned recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Also run strict prefix matching and report ambiguities
        #[arg(long)]
        strict: bool,
    },
    /// Upload videos with their metadata documents to the selected profiles
    Upload {
        /// Video files or folders (scanned recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Profiles to use instead of the stored or default selection
        #[arg(short, long = "profile")]
        profiles: Vec<String>,
        /// Replace the media of an existing upload with the same title
        #[arg(long)]
        replace_if_exists: bool,
        /// Skip subtitle extraction and thumbnail capture
        #[arg(long)]
        no_enrich: bool,
    },
    /// Upload videos without a metadata document
    Quick {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, value_enum, default_value = "unlisted")]
        privacy: Privacy,
        #[arg(long, default_value = DEFAULT_QUICK_CATEGORY)]
        category: String,
        #[arg(long, default_value = DEFAULT_QUICK_LANGUAGE)]
        language: String,
        /// Title for a single video instead of its file name
        #[arg(long)]
        title: Option<String>,
        /// Do not look for subtitle and thumbnail files
        #[arg(long)]
        no_companions: bool,
        /// Do not capture a thumbnail frame
        #[arg(long)]
        no_thumbnail: bool,
    },
    /// Maintain uploaded items
    Assets {
        #[command(subcommand)]
        action: AssetCommands,
    },
    /// Manage favorite directories
    Favorites {
        #[command(subcommand)]
        action: FavoriteCommands,
    },
}

#[derive(Subcommand)]
enum AssetCommands {
    /// List recent uploads
    List {
        #[arg(long, default_value_t = DEFAULT_ASSET_PAGE_SIZE)]
        max: u32,
        /// Group visibility variants of the same title
        #[arg(long)]
        grouped: bool,
    },
    /// Edit metadata of one item
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Comma separated
        #[arg(long)]
        tags: Option<String>,
        #[arg(long, value_enum)]
        privacy: Option<Privacy>,
        /// RFC 3339 timestamp, or an empty string to clear
        #[arg(long)]
        publish_at: Option<String>,
    },
    /// Set a flag on every given item
    SetFlag {
        #[arg(value_enum)]
        flag: Flag,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Replace the thumbnail of an item
    Thumbnail { id: String, image: PathBuf },
    /// Replace the video file of an item, keeping id and metadata
    ReplaceVideo { id: String, video: PathBuf },
    /// Delete items after two confirmations
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum FavoriteCommands {
    List,
    /// Add or update a favorite by label
    Add { label: String, path: PathBuf },
    Remove { label: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Privacy {
    Public,
    Unlisted,
    Private,
}

impl From<Privacy> for PrivacyStatus {
    fn from(value: Privacy) -> Self {
        match value {
            Privacy::Public => PrivacyStatus::Public,
            Privacy::Unlisted => PrivacyStatus::Unlisted,
            Privacy::Private => PrivacyStatus::Private,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Flag {
    MadeForKids,
    Embeddable,
}

/// Two-step confirmation on stdin
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Initialize logging to the log file or stderr
fn initialize_logging(cli: &Cli) {
    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if cli.log_stderr {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str())).init();
        return;
    }
    match setup_logging(level) {
        Ok(path) => info!("Logging to {}", path.display()),
        Err(e) => eprintln!("Failed to initialize logging: {}", e),
    }
}

fn remote_services(paths: &AppPaths) -> Result<(Arc<dyn AuthProvider>, Arc<dyn RemoteMediaService>), Box<dyn Error>> {
    let auth = OAuthTokenProvider::new(&paths.client_secrets, &paths.token);
    auth.check_prerequisites()?;
    Ok((Arc::new(auth), Arc::new(YouTubeService::new()?)))
}

fn orchestrator(paths: &AppPaths) -> Result<Arc<UploadOrchestrator>, Box<dyn Error>> {
    let (auth, service) = remote_services(paths)?;
    Ok(Arc::new(
        UploadOrchestrator::new(auth, service).with_source_map(SourceMap::new(&paths.source_map)),
    ))
}

fn asset_browser(paths: &AppPaths) -> Result<AssetBrowser, Box<dyn Error>> {
    let (auth, service) = remote_services(paths)?;
    Ok(AssetBrowser::new(auth, service).with_source_map(SourceMap::new(&paths.source_map)))
}

fn media_processor() -> Option<Arc<CompanionProcessor>> {
    FfmpegTool::detect_optional().map(|tool| {
        let tool: Arc<dyn MediaToolkit> = Arc::new(tool);
        Arc::new(CompanionProcessor::new(tool))
    })
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
        bar.set_style(style);
    }
    bar
}

/// Add files directly and folders through a background scan
fn load_videos(workspace: &mut Workspace, inputs: &[PathBuf]) {
    for input in inputs {
        if input.is_dir() {
            if let Err(e) = workspace.scan_folder(input) {
                eprintln!("{}: {}", input.display(), e);
                continue;
            }
            workspace.wait_idle(ENRICHMENT_WAIT);
        } else if let Err(e) = workspace.add_video(input) {
            eprintln!("{}: {}", input.display(), e);
        }
    }
}

fn run_scan(prefix_len: usize, paths: &AppPaths, inputs: &[PathBuf], strict: bool) -> Result<(), Box<dyn Error>> {
    let catalog = Arc::new(ProfileCatalog::load(&paths.profiles)?);
    let matcher = FileMatcher::new(prefix_len);
    let mut workspace =
        Workspace::new(catalog, ProfilePreferences::load(&paths.profile_prefs)).with_matcher(matcher.clone());
    load_videos(&mut workspace, inputs);

    for video in workspace.videos() {
        println!("{}", video.video_path.display());
        let show = |label: &str, path: &Option<PathBuf>| match path {
            Some(p) => println!("  {:<10} {}", label, p.display()),
            None => println!("  {:<10} -", label),
        };
        show("metadata", &video.json_path);
        show("subtitle", &video.srt_path);
        show("thumbnail", &video.thumbnail_path);
        show("softsubs", &video.softsubs_path);
        show("hardsubs", &video.hardsubs_path);
        if let Some(e) = &video.metadata_error {
            println!("  metadata incomplete: {}", e);
        }
        for profile in workspace.catalog().iter() {
            let mark = match video.selected_profiles.get(&profile.name) {
                Some(true) => "[x]",
                _ if profile.can_select(video) => "[ ]",
                _ => " - ",
            };
            println!("  {} {}", mark, profile.name);
        }
        if strict {
            match matcher.match_strict(&video.video_path) {
                Ok(found) => println!("  strict: srt={:?} json={:?}", found.srt_path, found.json_path),
                Err(e) => println!("  strict: {}", e),
            }
        }
    }
    Ok(())
}

fn run_upload(
    prefix_len: usize,
    paths: &AppPaths,
    inputs: &[PathBuf],
    profiles: &[String],
    replace_if_exists: bool,
    no_enrich: bool,
) -> Result<(), Box<dyn Error>> {
    let catalog = Arc::new(ProfileCatalog::load(&paths.profiles)?);
    for name in profiles {
        catalog.require(name)?;
    }
    let scheduler = Arc::new(BatchScheduler::new(orchestrator(paths)?));

    let mut workspace = Workspace::new(catalog.clone(), ProfilePreferences::load(&paths.profile_prefs))
        .with_matcher(FileMatcher::new(prefix_len))
        .with_scheduler(scheduler);
    if !no_enrich {
        if let Some(processor) = media_processor() {
            workspace = workspace.with_enrichment(EnrichmentSupervisor::new(processor));
        }
    }

    load_videos(&mut workspace, inputs);
    if !workspace.wait_idle(ENRICHMENT_WAIT) {
        eprintln!("Companion processing is still running; continuing without it");
    }

    if !profiles.is_empty() {
        for index in 0..workspace.videos().len() {
            for profile in catalog.names() {
                let wanted = profiles.contains(&profile);
                if let Err(e) = workspace.toggle_profile(index, &profile, wanted) {
                    let name = workspace
                        .video(index)
                        .map(|v| v.video_path.display().to_string())
                        .unwrap_or_default();
                    eprintln!("{}: {}", name, e);
                }
            }
        }
    }

    let total = workspace.start_batch(replace_if_exists)?;
    let bar = progress_bar(total as u64);
    while workspace.is_batch_running() {
        workspace.wait_idle(Duration::from_millis(200));
        if let Some(progress) = workspace.progress() {
            bar.set_position(progress.completed as u64);
        }
        bar.set_message(workspace.status().to_string());
    }
    bar.finish_and_clear();

    for video in workspace.videos() {
        if video.status_trail.is_empty() {
            continue;
        }
        println!("{}", video.video_path.display());
        for line in &video.status_trail {
            println!("  {}", line);
        }
    }
    if let Some(summary) = workspace.last_summary() {
        print!("{}", summary);
        if summary.failure_count > 0 {
            return Err(format!("{} upload(s) failed", summary.failure_count).into());
        }
    }
    Ok(())
}

fn run_quick(paths: &AppPaths, inputs: &[PathBuf], options: QuickOptions) -> Result<(), Box<dyn Error>> {
    let processor = if options.generate_thumbnail { media_processor() } else { None };
    let uploader = QuickUploader::new(orchestrator(paths)?, processor);

    let (items, rejected) = uploader.prepare(inputs, &options);
    for (path, reason) in &rejected {
        eprintln!("{}: {}", path.display(), reason);
    }

    let bar = progress_bar(100);
    let summary = uploader.run(&items, &options, &mut |event| match event {
        QuickEvent::Started { index, total, video_path } => {
            bar.set_position(0);
            bar.set_message(format!("{}/{} {}", index, total, video_path.display()));
        }
        QuickEvent::Upload {
            event: UploadEvent::UploadProgress(fraction),
            ..
        } => bar.set_position((fraction * 100.0) as u64),
        QuickEvent::Upload { event, .. } if event.is_warning() => {
            bar.println(format!("warning: {:?}", event));
        }
        QuickEvent::Finished { video_path, outcome } => match outcome {
            Ok(result) => bar.println(format!("{}\n", result)),
            Err(e) => bar.println(format!("{}: {}", video_path.display(), e)),
        },
        _ => {}
    });
    bar.finish_and_clear();

    println!("{} uploaded, {} failed", summary.successes.len(), summary.failures.len());
    if summary.failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} upload(s) failed", summary.failures.len()).into())
    }
}

fn run_assets(paths: &AppPaths, action: AssetCommands) -> Result<(), Box<dyn Error>> {
    let browser = asset_browser(paths)?;
    match action {
        AssetCommands::List { max, grouped } => {
            let items = browser.fetch_recent(Some(max))?;
            if grouped {
                for group in group_by_title(items) {
                    let Some(primary) = group.primary() else { continue };
                    println!("{}", primary.title);
                    for item in &group.items {
                        let privacy = item.privacy_status.map(|p| p.as_str()).unwrap_or("?");
                        println!("  {} {:<9} {}", item.id, privacy, item.watch_url());
                    }
                }
            } else {
                for item in &items {
                    let detail = browser.detail(item);
                    println!("{}  {}", item.id, item.title);
                    println!(
                        "  {} | views {} | kids {:?} | embeddable {:?}",
                        item.privacy_status.map(|p| p.as_str()).unwrap_or("?"),
                        item.view_count,
                        item.made_for_kids,
                        item.embeddable
                    );
                    println!("  {}", detail.studio_url);
                    if let Some(folder) = detail.source_folder {
                        println!("  source: {}", folder.display());
                    }
                }
            }
        }
        AssetCommands::Edit {
            id,
            title,
            description,
            tags,
            privacy,
            publish_at,
        } => {
            let update = MetadataUpdate {
                title,
                description,
                tags: tags.map(|t| t.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()),
                privacy_status: privacy.map(PrivacyStatus::from),
                publish_at: publish_at.map(|p| Some(p).filter(|p| !p.trim().is_empty())),
                ..Default::default()
            };
            browser.update_metadata(&id, &update)?;
            println!("Updated {}", id);
        }
        AssetCommands::SetFlag { flag, value, ids } => {
            let count = match flag {
                Flag::MadeForKids => browser.set_made_for_kids(&ids, value)?,
                Flag::Embeddable => browser.set_embeddable(&ids, value)?,
            };
            println!("Updated {} item(s)", count);
        }
        AssetCommands::Thumbnail { id, image } => {
            browser.replace_thumbnail(&id, &image)?;
            println!("Thumbnail of {} replaced", id);
        }
        AssetCommands::ReplaceVideo { id, video } => {
            let bar = progress_bar(100);
            browser.replace_video(&id, &video, &mut |fraction: f64| bar.set_position((fraction * 100.0) as u64))?;
            bar.finish_and_clear();
            println!("Video of {} replaced", id);
        }
        AssetCommands::Delete { ids } => {
            let count = browser.delete(&ids, &mut StdinConfirm)?;
            println!("Deleted {} item(s)", count);
        }
    }
    Ok(())
}

fn run_favorites(paths: &AppPaths, action: FavoriteCommands) -> Result<(), Box<dyn Error>> {
    let favorites = Favorites::new(&paths.favorites);
    match action {
        FavoriteCommands::List => {
            for favorite in favorites.load_or_default() {
                println!("{:<16} {}", favorite.label, favorite.path);
            }
        }
        FavoriteCommands::Add { label, path } => {
            if !path.is_dir() {
                return Err(format!("Not a directory: {}", path.display()).into());
            }
            favorites.add(&label, &path.to_string_lossy())?;
        }
        FavoriteCommands::Remove { label } => favorites.remove(&label)?,
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let paths = AppPaths::resolve()?;
    info!("Starting ytuploader {}", APP_VERSION);

    let prefix_len = cli.prefix_len;
    match cli.command {
        Commands::Scan { paths: inputs, strict } => run_scan(prefix_len, &paths, &inputs, strict),
        Commands::Upload {
            paths: inputs,
            profiles,
            replace_if_exists,
            no_enrich,
        } => run_upload(prefix_len, &paths, &inputs, &profiles, replace_if_exists, no_enrich),
        Commands::Quick {
            paths: inputs,
            privacy,
            category,
            language,
            title,
            no_companions,
            no_thumbnail,
        } => {
            let options = QuickOptions {
                privacy: privacy.into(),
                category_id: category,
                language,
                custom_title: title,
                find_companions: !no_companions,
                generate_thumbnail: !no_thumbnail,
            };
            run_quick(&paths, &inputs, options)
        }
        Commands::Assets { action } => run_assets(&paths, action),
        Commands::Favorites { action } => run_favorites(&paths, action),
    }
}

fn main() {
    let cli = Cli::parse();
    initialize_logging(&cli);

    let result = run(cli);
    if let Err(e) = &result {
        error!("{}", e);
        eprintln!("Error: {}", e);
    }
    shutdown_logging();
    if result.is_err() {
        std::process::exit(1);
    }
}
