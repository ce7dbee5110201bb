use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use listicle_studio::draft::{DraftState, ImageRatio};
use listicle_studio::settings::{
    mask_secret, NewWebsite, Settings, GEMINI_KEY_PREF, IDEOGRAM_KEY_PREF,
};
use listicle_studio::storage::{Database, DatabaseError};
use listicle_studio::studio::{StatusTone, Studio, StudioError};
use listicle_studio::util::format_slug;
use listicle_studio::{http, preview, Config};

/// Get the default config directory path (~/.config/listicle-studio/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("listicle-studio"))
}

/// Write `content` to `dst` via a temp file and rename, so an interrupted
/// export never leaves a half-written image behind.
fn atomic_write(dst: &Path, content: &[u8]) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};
    // Unpredictable temp name: nothing can be planted there ahead of time
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions or disk space",
                temp_path.display()
            )
        })?;

    temp_file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to write to temporary file '{}': disk may be full",
            temp_path.display()
        )
    })?;

    temp_file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to sync '{}' to disk", temp_path.display())
    })?;
    drop(temp_file);

    #[cfg(windows)]
    if dst.exists() {
        std::fs::remove_file(dst).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!("Failed to replace existing '{}'", dst.display())
        })?;
    }

    std::fs::rename(&temp_path, dst).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}': check permissions",
            temp_path.display(),
            dst.display()
        )
    })?;

    Ok(())
}

/// Read one line from stdin, for secrets that should stay out of shell history.
fn read_secret_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}

#[derive(Parser, Debug)]
#[command(
    name = "listicle",
    version,
    about = "Draft home-decor listicles with Gemini and Ideogram, then push them to WordPress"
)]
struct Args {
    /// Directory holding config.toml and studio.db
    #[arg(long, value_name = "DIR", global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new article and all of its images
    Generate {
        /// Article title (longer than 4 characters)
        title: String,
    },
    /// Print the current draft
    Show,
    /// Regenerate one listicle image
    Regenerate {
        /// Item number, starting at 1
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        number: u32,
    },
    /// Regenerate the featured image
    RegenerateFeatured,
    /// Choose the aspect ratio used the next time an image is regenerated
    Ratio {
        /// Item number, starting at 1
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        number: u32,
        /// One of 4:3, 1:1, 3:4
        ratio: ImageRatio,
    },
    /// Write the featured and listicle images to a directory
    ExportImages {
        dir: PathBuf,
    },
    /// Create a WordPress draft from the current article
    Publish {
        /// Saved website name or id
        site: String,
        /// Open the created post in the browser
        #[arg(long)]
        open: bool,
    },
    /// Discard the current draft
    Reset,
    /// Manage API keys
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Manage WordPress websites
    #[command(subcommand)]
    Sites(SitesCommand),
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Show which keys are configured (masked)
    Show,
    /// Store the Gemini API key (read from stdin when omitted, empty clears)
    SetGeminiKey { key: Option<String> },
    /// Store the Ideogram API key (read from stdin when omitted, empty clears)
    SetIdeogramKey { key: Option<String> },
}

#[derive(Subcommand, Debug)]
enum SitesCommand {
    /// List saved websites
    List,
    /// Save a website (the application password is read from stdin when omitted)
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        application_password: Option<String>,
    },
    /// Remove a website by name or id
    Remove { site: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for previews
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        eprintln!("Created config directory: {}", config_dir.display());
    }

    // The directory holds API keys: user-only access on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;

    let db_path = config_dir.join("studio.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    match args.command {
        Command::Settings(command) => run_settings(command, &config, &db).await,
        Command::Sites(command) => run_sites(command, &config, &db).await,
        Command::Show => {
            let state = db.load_workspace().await?.unwrap_or_default();
            print!("{}", preview::render(&state));
            Ok(())
        }
        Command::ExportImages { dir } => {
            let state = db.load_workspace().await?.unwrap_or_default();
            export_images(&state, &dir)
        }
        Command::Generate { title } => run_studio(StudioOp::Generate(title), &config, &db).await,
        Command::Regenerate { number } => {
            run_studio(StudioOp::Regenerate(number as usize - 1), &config, &db).await
        }
        Command::RegenerateFeatured => run_studio(StudioOp::RegenerateFeatured, &config, &db).await,
        Command::Ratio { number, ratio } => {
            run_studio(StudioOp::Ratio(number as usize - 1, ratio), &config, &db).await
        }
        Command::Publish { site, open } => {
            run_studio(StudioOp::Publish { site, open }, &config, &db).await
        }
        Command::Reset => run_studio(StudioOp::Reset, &config, &db).await,
    }
}

/// One studio operation; image indexes are zero-based.
enum StudioOp {
    Generate(String),
    Regenerate(usize),
    RegenerateFeatured,
    Ratio(usize, ImageRatio),
    Publish { site: String, open: bool },
    Reset,
}

/// Load the workspace, run one studio operation, save, and report.
async fn run_studio(op: StudioOp, config: &Config, db: &Database) -> Result<()> {
    let settings = Settings::load(config, db).await?;
    let http =
        http::build_client(config.request_timeout()).context("Failed to build HTTP client")?;
    let state = db.load_workspace().await?.unwrap_or_default();
    let mut studio = Studio::new(config, http, settings).with_state(state);

    let mut published_link = None;
    let result: Result<(), StudioError> = match op {
        StudioOp::Generate(title) => studio.generate(&title).await,
        StudioOp::Regenerate(index) => studio.regenerate_image(index).await,
        StudioOp::RegenerateFeatured => studio.regenerate_featured().await,
        StudioOp::Ratio(index, ratio) => studio.set_ratio(index, ratio),
        StudioOp::Publish { site, open } => studio.publish(&site).await.map(|post| {
            println!("Post {}: {}", post.id, post.link);
            if open {
                published_link = Some(post.link);
            }
        }),
        StudioOp::Reset => {
            studio.reset();
            println!("Draft discarded.");
            Ok(())
        }
    };

    if let Some(status) = studio.status() {
        let marker = match status.tone {
            StatusTone::Neutral => "",
            StatusTone::Success => "✓ ",
            StatusTone::Error => "✗ ",
        };
        println!("{marker}{}", status.message);
    }

    if studio.state() == &DraftState::default() {
        db.clear_workspace().await?;
    } else {
        db.save_workspace(studio.state())
            .await
            .context("Failed to save workspace")?;
    }

    if let Some(link) = published_link {
        if let Err(e) = open::that(&link) {
            tracing::warn!(error = %e, link = %link, "Failed to open browser");
            eprintln!("Could not open browser: {e}");
        }
    }

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn export_images(state: &DraftState, dir: &Path) -> Result<()> {
    let Some(article) = &state.article else {
        anyhow::bail!("No draft yet. Run `listicle generate <TITLE>` first.");
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create '{}'", dir.display()))?;

    let mut written = 0;
    if let Some(featured) = &state.featured_image {
        let image = featured.decode().context("Featured image is unreadable")?;
        let path = dir.join(format!("featured.{}", image.extension()));
        atomic_write(&path, &image.bytes)?;
        written += 1;
    }

    for (index, item) in article.listicle.iter().enumerate() {
        let Some(generated) = state.listicle_images.get(&index) else {
            eprintln!("Image #{} is missing, skipping", index + 1);
            continue;
        };
        let image = generated
            .decode()
            .with_context(|| format!("Image #{} is unreadable", index + 1))?;
        let path = dir.join(format!(
            "{:02}-{}.{}",
            index + 1,
            format_slug(&item.title),
            image.extension()
        ));
        atomic_write(&path, &image.bytes)?;
        written += 1;
    }

    tracing::info!(dir = %dir.display(), count = written, "Exported images");
    println!("Wrote {} images to {}", written, dir.display());
    Ok(())
}

async fn run_settings(command: SettingsCommand, config: &Config, db: &Database) -> Result<()> {
    let (pref, label, key) = match command {
        SettingsCommand::Show => {
            let settings = Settings::load(config, db).await?;
            let show = |key: Option<&SecretString>| match key {
                Some(key) => mask_secret(key),
                None => "(not set)".to_string(),
            };
            println!("Gemini API key:   {}", show(settings.gemini_api_key.as_ref()));
            println!("Ideogram API key: {}", show(settings.ideogram_api_key.as_ref()));
            println!("Websites:         {}", settings.websites.len());
            return Ok(());
        }
        SettingsCommand::SetGeminiKey { key } => (GEMINI_KEY_PREF, "Gemini", key),
        SettingsCommand::SetIdeogramKey { key } => (IDEOGRAM_KEY_PREF, "Ideogram", key),
    };

    let key = match key {
        Some(key) => key.trim().to_string(),
        None => read_secret_line(&format!("{label} API key"))?,
    };
    if key.is_empty() {
        db.delete_setting(pref).await?;
        println!("{label} API key cleared.");
    } else {
        db.set_setting(pref, &key).await?;
        println!("{label} API key saved.");
    }
    Ok(())
}

async fn run_sites(command: SitesCommand, config: &Config, db: &Database) -> Result<()> {
    match command {
        SitesCommand::List => {
            let sites = db.list_websites().await?;
            if sites.is_empty() {
                println!("No websites saved. Add one with `listicle sites add`.");
            }
            for site in sites {
                println!("{}  {}  {}  ({})", site.id, site.name, site.url, site.username);
            }
        }
        SitesCommand::Add {
            name,
            url,
            username,
            application_password,
        } => {
            let password = match application_password {
                Some(password) => password,
                None => read_secret_line("Application password")?,
            };
            let site = NewWebsite {
                name,
                url,
                username,
                application_password: SecretString::from(password),
            }
            .into_credential()?;
            db.add_website(&site).await?;
            println!("Saved {} ({})", site.name, site.id);
        }
        SitesCommand::Remove { site } => {
            let settings = Settings::load(config, db).await?;
            let Some(found) = settings.find_website(&site) else {
                anyhow::bail!("No saved website named '{}'.", site.trim());
            };
            db.remove_website(&found.id).await?;
            println!("Removed {}", found.name);
        }
    }
    Ok(())
}
