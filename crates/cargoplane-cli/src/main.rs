//! CargoPlane CLI
//!
//! The `cargoplane` command renders and submits containerized jobs.
//!
//! ## Commands
//!
//! - `render`: Print the `docker run` command line for a job
//! - `validate`: Check a job and list its warnings
//! - `submit`: Submit a job through the sky CLI (or record it with `--dry-run`)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cargoplane_core::fakes::RecordingLauncher;
use cargoplane_core::obs::JobSpan;
use cargoplane_core::{
    init_tracing, load_job_spec, ContainerMount, JobSpec, JobSubmitter, LogFormat,
};
use clap::{Parser, Subcommand};
use sky_launcher::{SkyConfig, SkyLauncher, ENV_SKY_BIN, ENV_SKY_TIMEOUT_SECS};
use tracing::{debug, info, Level};

#[derive(Parser)]
#[command(name = "cargoplane")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Render and submit containerized jobs to cloud instances", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the rendered `docker run` command
    Render {
        #[command(flatten)]
        job: JobArgs,

        /// Also print the command digest
        #[arg(long)]
        digest: bool,
    },

    /// Validate a job and print its warnings
    Validate {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Submit a job to the cluster launcher
    Submit {
        #[command(flatten)]
        job: JobArgs,

        /// Record the launcher calls and print the task instead of launching
        #[arg(long)]
        dry_run: bool,

        /// sky binary to invoke
        #[arg(long, env = ENV_SKY_BIN, default_value = "sky")]
        sky_bin: String,

        /// Per-command timeout in seconds (0 = none)
        #[arg(long, env = ENV_SKY_TIMEOUT_SECS, default_value_t = 0)]
        timeout_secs: u64,
    },
}

const INLINE_FIELDS: [&str; 10] = [
    "image",
    "entrypoint",
    "docker_flags",
    "mounts",
    "cleanup",
    "setup",
    "name",
    "on_demand",
    "keep_running",
    "args",
];

/// A job, from a JSON/YAML file or from inline options.
#[derive(clap::Args, Debug)]
struct JobArgs {
    /// Job file (.json, .yaml or .yml)
    #[arg(long, conflicts_with_all = INLINE_FIELDS)]
    job: Option<PathBuf>,

    /// Container image
    #[arg(long, required_unless_present = "job")]
    image: Option<String>,

    /// Entrypoint override (a single token)
    #[arg(long)]
    entrypoint: Option<String>,

    /// Extra `docker run` flag, repeatable
    #[arg(long = "docker-flag", allow_hyphen_values = true)]
    docker_flags: Vec<String>,

    /// Host-to-container bind, repeatable
    #[arg(short = 'm', long = "mount", value_name = "HOST:CONTAINER")]
    mounts: Vec<ContainerMount>,

    /// Command to run after the container exits successfully
    #[arg(long)]
    cleanup: Option<String>,

    /// Setup script run on the instance before the job
    #[arg(long)]
    setup: Option<String>,

    /// Job / cluster name
    #[arg(long)]
    name: Option<String>,

    /// Use on-demand capacity instead of spot
    #[arg(long)]
    on_demand: bool,

    /// Leave the on-demand cluster running after the job
    #[arg(long, requires = "on_demand")]
    keep_running: bool,

    /// Arguments passed to the container
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl JobArgs {
    fn to_spec(&self) -> Result<JobSpec> {
        if let Some(path) = &self.job {
            return load_job_spec(path)
                .with_context(|| format!("Failed to load job file {}", path.display()));
        }

        let image = self
            .image
            .clone()
            .context("either --job or --image is required")?;
        let mut builder = JobSpec::builder(image).use_spot(!self.on_demand);
        if let Some(name) = &self.name {
            builder = builder.name(name);
        }
        if let Some(entrypoint) = &self.entrypoint {
            builder = builder.entrypoint(entrypoint);
        }
        for flag in &self.docker_flags {
            builder = builder.docker_flag(flag);
        }
        for mount in &self.mounts {
            builder = builder.container_mount(&mount.host, &mount.container);
        }
        if let Some(cleanup) = &self.cleanup {
            builder = builder.cleanup(cleanup.as_str());
        }
        if let Some(setup) = &self.setup {
            builder = builder.setup(setup);
        }
        if self.keep_running {
            builder = builder.auto_teardown(false);
        }
        if !self.args.is_empty() {
            builder = builder.args(self.args.clone());
        }
        builder.build().context("Invalid job")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(format, level);

    match cli.command {
        Commands::Render { job, digest } => cmd_render(&job.to_spec()?, digest),
        Commands::Validate { job } => cmd_validate(&job.to_spec()?),
        Commands::Submit {
            job,
            dry_run,
            sky_bin,
            timeout_secs,
        } => {
            let spec = job.to_spec()?;
            if dry_run {
                cmd_submit_dry_run(&spec).await
            } else {
                let config = SkyConfig::default()
                    .with_binary(sky_bin)
                    .with_timeout_secs(timeout_secs);
                cmd_submit(&spec, config).await
            }
        }
    }
}

fn cmd_render(spec: &JobSpec, digest: bool) -> Result<()> {
    let command = spec.render().context("Failed to render job")?;
    let _span = JobSpan::enter(
        spec.name().unwrap_or("unnamed"),
        &command.short_digest(),
    );
    debug!(image = %spec.image(), "rendered job");
    println!("{command}");
    if digest {
        println!("sha256:{}", command.digest());
    }
    Ok(())
}

fn cmd_validate(spec: &JobSpec) -> Result<()> {
    let warnings = spec.validate().context("Invalid job")?;
    if warnings.is_empty() {
        println!("✓ job is valid");
    } else {
        println!("✓ job is valid with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  ⚠ {warning}");
        }
    }
    Ok(())
}

async fn cmd_submit(spec: &JobSpec, config: SkyConfig) -> Result<()> {
    let submitter = JobSubmitter::new(Arc::new(SkyLauncher::new(config)));
    let handle = submitter
        .submit(spec)
        .await
        .context("Failed to submit job")?;

    info!(launch_id = %handle.launch_id, "job submitted");
    println!("{}", serde_json::to_string_pretty(&handle)?);
    Ok(())
}

async fn cmd_submit_dry_run(spec: &JobSpec) -> Result<()> {
    let launcher = RecordingLauncher::new();
    let handle = cargoplane_core::submit(&launcher, spec)
        .await
        .context("Dry run failed")?;

    let task = launcher
        .launched_task()
        .context("dry run recorded no launch")?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "path": handle.path,
            "task": task,
        }))?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cargoplane_core::{Args, LaunchPath};

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(argv).unwrap()
    }

    fn job_args(cli: Cli) -> JobArgs {
        match cli.command {
            Commands::Render { job, .. } | Commands::Validate { job } => job,
            Commands::Submit { job, .. } => job,
        }
    }

    #[test]
    fn test_inline_job_renders() {
        let cli = parse(&[
            "cargoplane",
            "render",
            "--image",
            "trainer",
            "--docker-flag",
            "--rm",
            "-m",
            "/data:/mnt/data",
            "--entrypoint",
            "python",
            "--",
            "train.py",
            "--epochs",
            "3",
        ]);
        let spec = job_args(cli).to_spec().unwrap();
        assert_eq!(
            spec.render().unwrap().as_str(),
            "docker run --rm -v /data:/mnt/data --entrypoint python trainer train.py --epochs 3"
        );
    }

    #[test]
    fn test_on_demand_keep_running() {
        let cli = parse(&[
            "cargoplane",
            "submit",
            "--image",
            "img",
            "--on-demand",
            "--keep-running",
        ]);
        let spec = job_args(cli).to_spec().unwrap();
        assert!(!spec.use_spot());
        assert!(!spec.auto_teardown());
    }

    #[test]
    fn test_keep_running_requires_on_demand() {
        let result =
            Cli::try_parse_from(["cargoplane", "submit", "--image", "img", "--keep-running"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_job_file_conflicts_with_inline_options() {
        let result =
            Cli::try_parse_from(["cargoplane", "render", "--job", "job.yaml", "--image", "img"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_image_or_job_required() {
        assert!(Cli::try_parse_from(["cargoplane", "render"]).is_err());
    }

    #[test]
    fn test_bad_mount_rejected_at_parse() {
        let result =
            Cli::try_parse_from(["cargoplane", "render", "--image", "img", "-m", "relative"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_submit_reads_sky_settings() {
        let cli = parse(&[
            "cargoplane",
            "submit",
            "--image",
            "img",
            "--sky-bin",
            "/opt/sky",
            "--timeout-secs",
            "30",
            "--dry-run",
        ]);
        match cli.command {
            Commands::Submit {
                dry_run,
                sky_bin,
                timeout_secs,
                ..
            } => {
                assert!(dry_run);
                assert_eq!(sky_bin, "/opt/sky");
                assert_eq!(timeout_secs, 30);
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn test_job_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.yaml");
        std::fs::write(
            &path,
            "image: trainer\nargs: [\"--epochs\", \"3\"]\nuse_spot: false\ndown: false\n",
        )
        .unwrap();

        let cli = parse(&["cargoplane", "validate", "--job", path.to_str().unwrap()]);
        let spec = job_args(cli).to_spec().unwrap();
        assert_eq!(spec.args(), &Args::from(vec!["--epochs", "3"]));
        assert!(!spec.auto_teardown());
    }

    #[tokio::test]
    async fn test_dry_run_records_launch() {
        let spec = JobSpec::builder("img").use_spot(false).build().unwrap();
        let launcher = RecordingLauncher::new();
        let handle = cargoplane_core::submit(&launcher, &spec).await.unwrap();

        assert_eq!(
            handle.path,
            LaunchPath::Standard {
                auto_teardown: true
            }
        );
        assert_eq!(launcher.launched_task().unwrap().run, "docker run img");
        cmd_submit_dry_run(&spec).await.unwrap();
    }
}
