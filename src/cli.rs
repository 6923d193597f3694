use crate::api::{ComparisonReport, CompressionApi, HttpCompressionApi, ServiceInfo};
use crate::config::{self, CompressioConfig};
use crate::context::AppContext;
use crate::controller::Controller;
use crate::i18n::Language;
use crate::notify::NotificationLevel;
use crate::render::format_file_size;
use crate::user::{self, UserSummary};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// A failure the user has already been notified about
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AlreadyReported(pub String);

/// Print a command failure unless it was already shown as a notification.
/// Returns whether anything was printed.
pub fn report_error(err: &anyhow::Error) -> bool {
    if err.is::<AlreadyReported>() {
        return false;
    }
    eprintln!("Error: {:#}", err);
    true
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Compress files with the Compressio service", long_about = None)]
pub struct Cli {
    /// API key sent as X-API-Key on every request.
    #[clap(long, env = "COMPRESSIO_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base address of the compression API.
    #[clap(long, env = "COMPRESSIO_SERVER_URL", global = true)]
    pub server_url: Option<String>,

    /// Directory downloads are saved into.
    #[clap(long, env = "COMPRESSIO_DOWNLOAD_DIR", global = true)]
    pub download_dir: Option<String>,

    /// Show debug logging on the console.
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload files and let the service pick a compression method.
    Compress {
        /// Files to compress; each is processed independently.
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Download a compressed artifact, or the original upload.
    Download {
        /// File id issued by the service.
        file_id: String,
        /// Fetch the original file instead of the compressed one.
        #[clap(long)]
        original: bool,
        /// Save into this directory instead of the configured one.
        #[clap(long)]
        out: Option<String>,
        /// Open the file once saved.
        #[clap(long)]
        open: bool,
    },
    /// Show or edit the recent compressions.
    History {
        #[clap(subcommand)]
        cmd: Option<HistoryCommand>,
    },
    /// Show comparison statistics for a stored file.
    Compare {
        /// File id issued by the service.
        file_id: String,
    },
    /// Show the service's version and limits.
    Info,
    /// List the compression methods the service offers.
    Methods,
    /// Check that the service is reachable.
    Health,
    /// Show or change configuration.
    Config {
        #[clap(subcommand)]
        cmd: ConfigCommand,
    },
    /// Show or set the display language (en, id).
    Lang { code: Option<String> },
    /// Remember the signed-in user; removes the anonymous limit.
    Login {
        #[clap(long)]
        name: Option<String>,
        #[clap(long)]
        email: Option<String>,
        #[clap(long)]
        photo: Option<String>,
    },
    /// Forget the signed-in user.
    Logout,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Print the history table.
    List,
    /// Delete the entry with this timestamp.
    Remove { timestamp: String },
    /// Delete every entry.
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration.
    Show,
    /// Set a key (apiKey, serverUrl, downloadDir, anonymousLimit, connectTimeoutSecs).
    Set { key: String, value: String },
}

impl Cli {
    fn effective_config(&self) -> anyhow::Result<CompressioConfig> {
        let file_config = config::load_config().context("Failed to load configuration")?;
        Ok(file_config.with_overrides(
            self.api_key.clone(),
            self.server_url.clone(),
            self.download_dir.clone(),
        ))
    }
}

/// Run a parsed command line
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.effective_config()?;
    debug!(server = %config.server_url(), "Loaded configuration");

    match cli.cmd {
        Command::Config { cmd } => run_config(cmd, config),
        Command::Compress { files } => {
            let ctx = Arc::new(AppContext::from_config(config)?);
            let controller = Controller::new(ctx.clone());
            controller.drop_files(&files)?;
            // Rejected files were reported one by one
            let messages = ctx.language.messages();
            if !controller.can_submit() {
                return Err(AlreadyReported(messages.invalid_file_type.to_string()).into());
            }

            let outcomes = controller
                .submit()
                .await
                .map_err(|e| AlreadyReported(e.user_message()))?;
            print!("{}", controller.history_table());

            let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
            if succeeded == 0 {
                return Err(AlreadyReported(messages.compression_failed.to_string()).into());
            }
            Ok(())
        }
        Command::Download {
            file_id,
            original,
            out,
            open,
        } => {
            let config = match out {
                Some(dir) => config.with_overrides(None, None, Some(dir)),
                None => config,
            };
            let ctx = Arc::new(AppContext::from_config(config)?);
            let path = download(ctx, &file_id, original).await?;
            println!("{}", path.display());
            if open {
                open::that(&path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
            }
            Ok(())
        }
        Command::History { cmd } => {
            let ctx = Arc::new(AppContext::from_config(config)?);
            let controller = Controller::new(ctx.clone());
            match cmd.unwrap_or(HistoryCommand::List) {
                HistoryCommand::List => print!("{}", controller.history_table()),
                HistoryCommand::Remove { timestamp } => {
                    if controller.delete(&timestamp)? == 0 {
                        bail!("No history entry with timestamp {}", timestamp);
                    }
                    print!("{}", controller.history_table());
                }
                HistoryCommand::Clear => controller.clear_history()?,
            }
            Ok(())
        }
        Command::Compare { file_id } => {
            let api = HttpCompressionApi::from_config(&config)?;
            let report = api.compare(&file_id).await?;
            print!("{}", render_comparison(&report));
            Ok(())
        }
        Command::Info => {
            let api = HttpCompressionApi::from_config(&config)?;
            let info = api.info().await?;
            print!("{}", render_info(&info));
            Ok(())
        }
        Command::Methods => {
            let api = HttpCompressionApi::from_config(&config)?;
            for method in api.compression_methods().await? {
                println!(
                    "{:<16} {:<26} {}",
                    method.value,
                    method.name,
                    method.description.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Health => {
            let api = HttpCompressionApi::from_config(&config)?;
            let health = api.health().await?;
            println!(
                "{}: {} {}",
                api.server_url(),
                health.status,
                health.message.unwrap_or_default()
            );
            Ok(())
        }
        Command::Lang { code } => {
            let ctx = AppContext::from_config(config)?;
            match code {
                Some(code) => {
                    let language = Language::parse(&code)?;
                    language.save(&ctx.store)?;
                    println!("{}", language.code());
                }
                None => println!("{}", ctx.language.code()),
            }
            Ok(())
        }
        Command::Login { name, email, photo } => {
            let ctx = AppContext::from_config(config)?;
            if name.is_none() && email.is_none() {
                bail!("Provide --name or --email");
            }
            let summary = UserSummary {
                display_name: name,
                email,
                photo_url: photo,
            };
            user::sign_in(&ctx.store, &summary)?;
            ctx.notifier
                .notify(NotificationLevel::Success, ctx.language.messages().login_success);
            Ok(())
        }
        Command::Logout => {
            let ctx = AppContext::from_config(config)?;
            user::sign_out(&ctx.store)?;
            ctx.notifier
                .notify(NotificationLevel::Success, ctx.language.messages().logout_success);
            Ok(())
        }
    }
}

/// Download through the controller; failures were already notified
pub async fn download<A: CompressionApi>(
    ctx: Arc<AppContext<A>>,
    file_id: &str,
    original: bool,
) -> anyhow::Result<PathBuf> {
    Controller::new(ctx)
        .download(file_id, original)
        .await
        .map_err(|e| AlreadyReported(e.user_message()).into())
}

fn render_comparison(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let mut line = |label: &str, value: String| {
        out.push_str(&format!("{:<20} {}\n", label, value));
    };
    line("File", report.original_filename.clone().unwrap_or_default());
    line("Compressed file", report.compressed_filename.clone().unwrap_or_default());
    line("Method", report.compression_method.clone().unwrap_or_default());
    line(
        "Original size",
        report.size_before.map(format_file_size).unwrap_or_default(),
    );
    line(
        "Compressed size",
        report.size_after.map(format_file_size).unwrap_or_default(),
    );
    line(
        "Ratio",
        report.ratio.map(|r| format!("{:.1}%", r)).unwrap_or_default(),
    );
    if let Some(ms) = report.decompression_time_ms {
        line("Decompression", format!("{:.1} ms", ms));
    }
    if let Some(summary) = &report.diff_summary {
        line("Difference", summary.clone());
    }
    out
}

fn render_info(info: &ServiceInfo) -> String {
    let mut out = format!(
        "{} {}\n",
        info.app_name.as_deref().unwrap_or("Compressio"),
        info.version.as_deref().unwrap_or("")
    );
    if let Some(description) = &info.description {
        out.push_str(&format!("{}\n", description));
    }
    if let Some(mb) = info.max_upload_size_mb {
        out.push_str(&format!("Max upload: {} MB\n", mb));
    }
    if let Some(hours) = info.file_lifespan_hours {
        out.push_str(&format!("Files kept for: {} h\n", hours));
    }
    out
}

fn run_config(cmd: ConfigCommand, effective: CompressioConfig) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show => {
            println!("serverUrl:   {}", effective.server_url());
            println!("apiKey:      {}", mask_key(effective.api_key()));
            println!("downloadDir: {}", effective.download_dir().display());
            match effective.anonymous_limit {
                Some(limit) => println!("anonymousLimit: {}", limit),
                None => println!("anonymousLimit: unlimited"),
            }
            if let Some(secs) = effective.connect_timeout_secs {
                println!("connectTimeoutSecs: {}", secs);
            }
        }
        ConfigCommand::Set { key, value } => {
            // Only the file values are persisted, never the overrides
            let mut stored = config::load_config()?;
            stored.set(&key, &value)?;
            config::save_config(&stored)?;
            println!("{} updated", key);
        }
    }
    Ok(())
}

fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    if key.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}
