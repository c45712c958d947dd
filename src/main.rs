//! droidpack - Expo project to Android APK
//!
//! Installs dependencies, runs the EAS build locally or in the cloud, and
//! converts app bundles into a universal APK.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use droidpack::commands::{error_category, BuildCommand};
use droidpack_build_engine::ModeFlags;
use droidpack_core::{APP_NAME, VERSION};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "droidpack", version)]
#[command(about = "Build an installable Android APK from an Expo project")]
struct Cli {
    /// EAS build profile (default: `default_profile` from droidpack.toml, else "preview")
    #[arg(short, long)]
    profile: Option<String>,

    /// Skip dependency installation; node_modules must already exist
    #[arg(short = 's', long = "no-install", visible_alias = "skip-deps")]
    no_install: bool,

    /// Build on the EAS cloud service
    #[arg(short, long)]
    cloud: bool,

    /// Build on this machine (not supported on Windows)
    #[arg(short, long)]
    local: bool,

    /// Build an app bundle remotely, then convert it to a universal APK
    #[arg(short, long = "aab-to-apk")]
    aab_to_apk: bool,

    /// Convert an existing .aab file to a universal APK
    #[arg(long = "convert-aab", value_name = "PATH")]
    convert_aab: Option<PathBuf>,

    /// Log external command lines and other details
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_command(self, project_path: PathBuf) -> BuildCommand {
        BuildCommand {
            project_path,
            profile: self.profile,
            flags: ModeFlags {
                cloud: self.cloud,
                local: self.local,
                aab_to_apk: self.aab_to_apk,
                convert_aab: self.convert_aab,
            },
            skip_install: self.no_install,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("{} v{}", APP_NAME, VERSION);

    let project_path = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("[io] Could not determine the current directory: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let command = cli.into_command(project_path);
    debug!("{:?}", command);

    // Dropping the build future on Ctrl-C kills the running child and runs
    // any pending scratch cleanup
    let result = tokio::select! {
        result = command.execute() => result,
        _ = tokio::signal::ctrl_c() => {
            error!("[interrupted] Build interrupted");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[{}] {:#}", error_category(&e), e);
            ExitCode::FAILURE
        }
    }
}
