use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rbdedup_protocol::OutputMode;
use std::env;
use std::io;
use std::path::PathBuf;

mod dedupe;

const NOISE_CONFIG_ENV: &str = "RBDEDUP_NOISE_CONFIG";

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "rbdedup")]
#[command(about = "Find and remove duplicate RoleBindings and ClusterRoleBindings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    cluster: ClusterArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Args, Clone, Default)]
struct ClusterArgs {
    /// Path to a kubeconfig file (default: inferred from KUBECONFIG / ~/.kube/config)
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report duplicate bindings and delete all but the first of each group
    #[command(alias = "deduperbs")]
    Dedupe(DedupeArgs),
}

#[derive(Args)]
struct DedupeArgs {
    /// Read RoleBindings from a JSON list file instead of the cluster
    #[arg(long)]
    input_file_rbs: Option<PathBuf>,

    /// Read ClusterRoleBindings from a JSON list file instead of the cluster
    #[arg(long)]
    input_file_crbs: Option<PathBuf>,

    /// Report only, never delete
    #[arg(long)]
    dry_run: bool,

    /// What to print: dupes|totals|all
    #[arg(long, value_enum, default_value_t = OutputFormat::Dupes)]
    output: OutputFormat,

    /// JSON or TOML file overriding the noise patterns (env: RBDEDUP_NOISE_CONFIG)
    #[arg(long)]
    noise_config: Option<PathBuf>,

    /// Additional noise substring, applied to both kinds (repeatable)
    #[arg(long = "noise-pattern", value_name = "SUBSTR")]
    noise_patterns: Vec<String>,

    /// Start from an empty noise set instead of the membership-controller suffixes
    #[arg(long)]
    no_default_noise: bool,

    /// Fail a channel on the first malformed or unsupported item instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Keep deleting other groups after a failed delete
    #[arg(long)]
    keep_going: bool,

    /// Page size for cluster listings
    #[arg(long, default_value_t = rbdedup_source::DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Cluster request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Do not verify the API server certificate
    #[arg(long)]
    insecure_skip_tls_verify: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Dupes,
    Totals,
    All,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Dupes => Self::Dupes,
            OutputFormat::Totals => Self::Totals,
            OutputFormat::All => Self::All,
        }
    }
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Commands::Dedupe(mut args) => {
            if args.noise_config.is_none() {
                args.noise_config = env::var_os(NOISE_CONFIG_ENV)
                    .filter(|value| !value.is_empty())
                    .map(PathBuf::from);
            }
            dedupe::run(args, cli.cluster).await?;
        }
    }

    Ok(())
}
