use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chart-inject")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inject standard policy blocks into Helm charts")]
#[command(long_about = "Applies a catalog of operational policy fragments (tolerations, affinity, priority classes, environment injection) to a Helm chart's values file and workload templates without disturbing formatting, then checks that every rendered image exists.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inject policy blocks into a chart's values file and templates
    Inject {
        /// Path to the chart directory
        #[arg(value_name = "CHART_DIR")]
        path: PathBuf,

        /// Injection block catalog
        #[arg(short, long, value_name = "FILE", default_value = "inject-blocks.yaml")]
        blocks: PathBuf,

        /// Also apply the critical DaemonSet pod blocks
        #[arg(long)]
        critical_ds: bool,

        /// Also apply the control-plane pod blocks
        #[arg(long)]
        control_plane: bool,

        /// Show what would change without writing files
        #[arg(long)]
        dry_run: bool,

        /// Do not render the chart and check its images
        #[arg(long)]
        skip_image_check: bool,

        /// Registry username for image checks
        #[arg(long, env = "CHART_INJECT_REGISTRY_USERNAME", value_name = "USER")]
        registry_username: Option<String>,

        /// Registry password for image checks
        #[arg(
            long,
            env = "CHART_INJECT_REGISTRY_PASSWORD",
            value_name = "PASSWORD",
            hide_env_values = true
        )]
        registry_password: Option<String>,

        /// Output the run report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List value references and workload kinds found in a chart
    Scan {
        /// Path to the chart directory
        #[arg(value_name = "CHART_DIR")]
        path: PathBuf,

        /// Output scan results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Check that every image of a rendered manifest exists
    CheckImages {
        /// Rendered manifest file (e.g. `helm template` output)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Output results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Restore values.yaml from its backup
    Restore {
        /// Path to the chart directory
        #[arg(value_name = "CHART_DIR")]
        path: PathBuf,
    },
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
