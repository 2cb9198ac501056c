//! Binary entry point for the skybench CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use shell_escape::unix::escape;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use skybench::{
    DiskSpec, MachineSpec, OpenStackCloud, OpenStackConfig, RunError, RunOrchestrator, SshConfig,
    SshExecutor,
};

mod cli;

use cli::{Cli, RunCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cloud error: {0}")]
    Cloud(String),
    #[error("remote command terminated without an exit status")]
    MissingExitCode,
    #[error("run failed: {0}")]
    Run(#[from] RunError),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Run(command) => run_command(command).await,
    }
}

async fn run_command(args: RunCommand) -> Result<i32, CliError> {
    let config =
        OpenStackConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let ssh_config =
        SshConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;

    let cloud = OpenStackCloud::new(config).map_err(|err| CliError::Cloud(err.to_string()))?;
    let executor =
        SshExecutor::with_process_runner(ssh_config).map_err(|err| CliError::Config(err.to_string()))?;

    let mut spec = MachineSpec::builder().build();
    spec.machine_type = args.machine_type;
    spec.image = args.image;
    spec.zone = args.zone;
    spec.apply_defaults(cloud.config());

    let scratch = args.scratch_mount.map(|mount| {
        let size = args
            .scratch_size_gb
            .unwrap_or(cloud.config().volume_size_gb);
        DiskSpec::new(size, mount)
    });

    validate_command_args(&args.command)?;
    let remote_command = render_remote_command(&args.command);

    let orchestrator = RunOrchestrator::new(cloud, executor);
    let output = orchestrator
        .execute(spec, scratch.as_ref(), &remote_command)
        .await?;

    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes()).ok();
    let mut stderr = io::stderr();
    stderr.write_all(output.stderr.as_bytes()).ok();

    output.exit_code.ok_or(CliError::MissingExitCode)
}

fn render_remote_command(args: &[String]) -> String {
    let mut result = String::new();
    let mut first = true;

    for arg in args {
        if first {
            first = false;
        } else {
            result.push(' ');
        }

        let escaped = escape(arg.as_str().into());
        result.push_str(escaped.as_ref());
    }

    result
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\n' | '\r' | '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
