//! Contentizer - Text Optimizer
//!
//! Rewrites text for a chosen category and style through an
//! OpenAI-compatible API, from a desktop dashboard or the command line.

use std::sync::Arc;
use anyhow::{Result, Context};
use clap::{Parser, Subcommand};
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use contentizer::{
    AppSettings,
    Clipboard,
    LocalBackend,
    ProviderMode,
    SessionController,
    SystemClipboard,
    dashboard::Dashboard,
};

#[derive(Parser)]
#[command(name = "contentizer")]
#[command(author = "Contentizer Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rewrite text with category and style presets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the dashboard GUI
    Dashboard,

    /// Optimize text (reads the clipboard when TEXT is omitted)
    Optimize {
        /// Text to optimize
        text: Option<String>,

        /// Category preset (defaults to the first one)
        #[arg(short, long)]
        category: Option<String>,

        /// Style preset (defaults to the first one)
        #[arg(short, long)]
        style: Option<String>,

        /// Extra instructions for the rewrite
        #[arg(short, long)]
        extra: Option<String>,

        /// Copy the result to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// List category and style presets
    Presets,

    /// Show recent optimizations
    History,

    /// Delete all history entries
    ClearHistory,

    /// Show or change provider settings
    Settings {
        /// API key source: "env" or "keychain"
        #[arg(long)]
        mode: Option<ProviderMode>,

        /// Base URL of an OpenAI-compatible API (empty to reset)
        #[arg(long)]
        base_url: Option<String>,

        /// Model override (empty to reset)
        #[arg(long)]
        model: Option<String>,
    },

    /// Save an API key for the "keychain" provider mode
    SetKey {
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let _subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Dashboard) | None => run_dashboard()?,
        Some(Commands::Optimize { text, category, style, extra, copy }) => {
            optimize(text, category, style, extra, copy).await?
        }
        Some(Commands::Presets) => list_presets().await?,
        Some(Commands::History) => show_history().await?,
        Some(Commands::ClearHistory) => clear_history().await?,
        Some(Commands::Settings { mode, base_url, model }) => settings(mode, base_url, model).await?,
        Some(Commands::SetKey { key }) => set_key(&key).await?,
    }

    Ok(())
}

fn controller() -> Result<Arc<SessionController>> {
    let backend = LocalBackend::from_platform()
        .context("Failed to initialize local backend")?;
    Ok(Arc::new(SessionController::new(
        Arc::new(backend),
        Arc::new(SystemClipboard),
        Handle::current(),
    )))
}

/// Run the dashboard GUI
fn run_dashboard() -> Result<()> {
    info!("Starting Contentizer dashboard...");

    Dashboard::run(controller()?, Handle::current())
        .map_err(|e| anyhow::anyhow!("Dashboard error: {}", e))?;

    Ok(())
}

/// Optimize text once and print the result
async fn optimize(
    text: Option<String>,
    category: Option<String>,
    style: Option<String>,
    extra: Option<String>,
    copy: bool,
) -> Result<()> {
    let input = match text {
        Some(text) => text,
        None => SystemClipboard.get_text()?,
    };

    let controller = controller()?;
    controller.load_presets().await?;
    controller.load_api_key_state().await?;

    if !controller.snapshot().is_api_key_ready {
        anyhow::bail!("API key not set. Set CONTENTIZER_API_KEY or run `contentizer set-key <KEY>`.");
    }

    if let Some(category) = category {
        controller.select_category(category);
    }
    if let Some(style) = style {
        controller.select_style(style);
    }
    if let Some(extra) = extra {
        controller.edit_extra_instructions(extra);
    }

    let state = controller.snapshot();
    info!("Optimizing as {} / {}", state.category, state.style);

    let result = controller.optimize(&input).await?;
    println!("{}", result);

    if copy {
        if controller.copy() {
            eprintln!("✨ Copied to clipboard");
        } else {
            eprintln!("Clipboard unavailable, result not copied");
        }
        controller.shutdown();
    }

    Ok(())
}

/// List presets
async fn list_presets() -> Result<()> {
    let controller = controller()?;
    controller.load_presets().await?;

    if let Some(presets) = controller.snapshot().presets {
        println!("Categories:");
        for category in &presets.categories {
            println!("  {}", category);
        }
        println!("\nStyles:");
        for style in &presets.styles {
            println!("  {}", style);
        }
    }

    Ok(())
}

/// Show history entries
async fn show_history() -> Result<()> {
    let controller = controller()?;
    controller.load_history().await?;

    let history = controller.snapshot().history;
    if history.is_empty() {
        println!("(no history yet)");
        return Ok(());
    }

    for item in &history {
        println!("🕐 {}  {} · {}", item.formatted_time(), item.category, item.style);
        println!("   {}", item.original_preview);
        println!("   → {}", item.optimized_preview);
        println!();
    }

    Ok(())
}

/// Clear history
async fn clear_history() -> Result<()> {
    let controller = controller()?;
    controller.clear_history().await?;
    println!("History cleared.");
    Ok(())
}

/// Show settings, applying any changes first
async fn settings(
    mode: Option<ProviderMode>,
    base_url: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let controller = controller()?;
    controller.load_settings().await?;

    if mode.is_some() || base_url.is_some() || model.is_some() {
        let current = controller.snapshot().settings.unwrap_or_default();
        controller.edit_settings(AppSettings {
            provider_mode: mode.unwrap_or(current.provider_mode),
            api_base_url: base_url.or(current.api_base_url),
            model: model.or(current.model),
        });
        controller.save_settings().await?;
        println!("Settings saved.");
    } else {
        controller.load_api_key_state().await?;
    }

    let state = controller.snapshot();
    let settings = state.settings.unwrap_or_default();
    println!("API key mode: {}", settings.provider_mode);
    println!("API base URL: {}", settings.api_base_url.as_deref().unwrap_or("(default)"));
    println!("Model:        {}", settings.model.as_deref().unwrap_or("(default)"));
    println!("API key:      {}", if state.is_api_key_ready { "available" } else { "missing" });

    Ok(())
}

/// Save an API key
async fn set_key(key: &str) -> Result<()> {
    let controller = controller()?;
    controller.save_api_key(key).await?;
    println!("API key saved.");
    Ok(())
}
