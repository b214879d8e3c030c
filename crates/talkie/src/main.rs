mod ptt; // Push-to-talk plugin owned by the host

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;
use talkie_core::kernel::constants;
use talkie_core::kernel::error::{Error, Result};
use talkie_core::plugin_system::feature::Feature;
use talkie_core::plugin_system::manager::{ManagerSettings, PluginManager};
use talkie_core::plugin_system::resolver::FlexibleFeatureResolver;
use talkie_core::plugin_system::executor::TokioExecutor;
use talkie_core::plugin_system::traits::Plugin;
use talkie_core::storage::PluginConfigScope;
use talkie_core::{AppContext, ConfigLoader};

// --- Import Plugins for Static Registration ---
use core_logging::LoggingPlugin;
use talkie_audio::AudioPlugin;
use talkie_session::SessionPlugin;
use talkie_transport::{BluetoothPlugin, Transport, WifiDirectPlugin};
// --- End Plugin Imports ---

/// Samples per frame of silence sent by `run` (10 ms at 16 kHz, fits a 512 byte radio frame).
const FRAME_SAMPLES: usize = 160;

/// Talkie: push-to-talk over nearby links
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Simple ping command for testing
    #[arg(long)]
    ping: bool,

    /// Configuration directory
    #[arg(long, value_name = "DIR", default_value = "config")]
    config: PathBuf,

    /// Announce on this transport and prefer it when several are available
    #[arg(long, value_name = "NAME")]
    transport: Option<String>,

    /// Run post-initialization in the background
    #[arg(long)]
    background: bool,

    /// Fail when plugin initialization converges slowly
    #[arg(long)]
    strict_init: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wire every plugin and send a few frames
    Run {
        /// Number of frames to transmit
        #[arg(long, default_value_t = 3)]
        frames: u32,
    },
    /// Inspect plugins
    Plugins {
        #[command(subcommand)]
        command: PluginCommand,
    },
}

#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// List registered plugins
    List {},
    /// Show how every declared dependency would be resolved
    Plan {},
    /// Show configuration files and the options each plugin understands
    Config {
        /// Write every plugin's options as its defaults, keeping existing default files
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Handle simple ping command
    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    println!("{} v{}: push-to-talk over nearby links", constants::APP_NAME, constants::APP_VERSION);
    println!("Initializing application...");

    let result = run(args).await;
    println!("Shutting down application...");
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let ptt = ptt::shared(args.transport.is_some());
    let plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(LoggingPlugin::new()) as Arc<dyn Plugin>,
        Arc::new(BluetoothPlugin::new()) as Arc<dyn Plugin>,
        Arc::new(WifiDirectPlugin::new()) as Arc<dyn Plugin>,
        Arc::new(AudioPlugin::new()) as Arc<dyn Plugin>,
        Arc::new(SessionPlugin::new()) as Arc<dyn Plugin>,
        ptt.clone() as Arc<dyn Plugin>,
    ];

    let loader = ConfigLoader::new(&args.config);
    let names: Vec<&str> = plugins.iter().map(|plugin| plugin.name()).collect();
    let context = Arc::new(AppContext::load(&loader, names)?);

    let mut settings = ManagerSettings::from_config(context.config())?;
    settings.do_after_initialize_on_background |= args.background;
    settings.detect_slow_init_process |= args.strict_init;

    let mut resolver = FlexibleFeatureResolver::new();
    if let Some(name) = &args.transport {
        resolver = resolver.prefer_supplier(<dyn Transport as Feature>::KEY, name.clone());
    }
    let mut manager = PluginManager::new().with_resolver(resolver).with_settings(settings);
    if let Some(executor) = TokioExecutor::current() {
        manager = manager.with_executor(executor);
    }

    // --- Statically Register Plugins ---
    println!("Registering static plugins...");
    for plugin in plugins {
        println!("  - Registered: {}", plugin.name());
        manager.register_plugin(plugin);
    }

    // --- Command Handling ---
    match args.command {
        Some(Commands::Plugins { command: PluginCommand::List {} }) => {
            println!("Listing registered plugins:");
            for plugin in manager.plugins() {
                println!("  - Name: {}", plugin.name());
            }
            Ok(())
        }
        Some(Commands::Plugins { command: PluginCommand::Plan {} }) => {
            let plan = manager.plan();
            println!("Wiring plan:");
            for line in plan.to_string().lines() {
                println!("  {}", line);
            }
            if plan.is_satisfiable() {
                Ok(())
            } else {
                Err(Error::Other(format!(
                    "{} unresolvable dependencies",
                    plan.problems().count()
                )))
            }
        }
        Some(Commands::Plugins { command: PluginCommand::Config { save } }) => {
            show_config(&manager, &loader, context, save)
        }
        Some(Commands::Run { frames }) => talk(&mut manager, context, &ptt, frames).await,
        None => talk(&mut manager, context, &ptt, 3).await,
    }
}

fn show_config(manager: &PluginManager, loader: &ConfigLoader, context: Arc<AppContext>, save: bool) -> Result<()> {
    let existing = loader.list_plugin_configs(PluginConfigScope::Default)?;
    for (label, scope) in [("Default", PluginConfigScope::Default), ("User", PluginConfigScope::User)] {
        let names = loader.list_plugin_configs(scope)?;
        let listed = if names.is_empty() { String::from("none") } else { names.join(", ") };
        println!("{} configuration files: {}", label, listed);
    }

    println!("Plugin options:");
    for plugin in manager.plugins() {
        plugin.attach_context(Arc::clone(&context));
        let options = plugin.customization_options();
        if options.is_empty() {
            continue;
        }
        println!("  - {}: {}", plugin.name(), options.keys().join(", "));
        if !save {
            continue;
        }
        if existing.iter().any(|name| name == plugin.name()) {
            println!("    kept existing defaults");
        } else {
            let path = loader.save_plugin_config(plugin.name(), &options, PluginConfigScope::Default)?;
            println!("    saved {}", path.display());
        }
    }
    Ok(())
}

async fn talk(
    manager: &mut PluginManager,
    context: Arc<AppContext>,
    ptt: &ptt::PushToTalkPlugin,
    frames: u32,
) -> Result<()> {
    println!("Configuring plugins...");
    manager.configure(context)?;
    if let Some(handle) = manager.take_post_init_handle() {
        info!("Waiting for background post-initialization");
        handle.finished().await;
    }
    println!("All plugins initialized.");
    if let Some(link) = ptt.announced_on() {
        println!("Announced on {}", link);
    }

    let deliveries = ptt
        .talk(frames, FRAME_SAMPLES)
        .map_err(|e| Error::Other(format!("Transmission failed: {}", e)))?;
    for delivery in &deliveries {
        info!("Frame delivered on [{}]", delivery.delivered.join(", "));
    }
    println!("Transmitted {} frame(s)", deliveries.len());
    Ok(())
}
