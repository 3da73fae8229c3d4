// Copyright 2018 Peter Williams <peter@newton.cx>
// Licensed under the MIT License.

//! The main CLI driver logic.

extern crate failure;
extern crate htcondor;
#[macro_use] extern crate structopt;
extern crate termcolor;
#[macro_use] extern crate tracing;
extern crate tracing_subscriber;

use failure::Error;
use htcondor::JobError;
use std::io;
use std::path::PathBuf;
use std::process;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[macro_use] mod colorio;
mod interactive;
mod submit;
mod util;

use colorio::ColorIo;


/// The environment variable controlling diagnostic output.
const LOG_ENV_VAR: &str = "CONDORSUB_LOG";


#[derive(Debug, StructOpt)]
#[structopt(name = "condorsub", about = "HTCondor job submission helper.")]
struct CondorSubCli {
    #[structopt(long = "config", value_name = "PATH", parse(from_os_str))]
    /// Path to a config YAML file (default: ~/.config/condorsub/config.yaml).
    config: Option<PathBuf>,

    #[structopt(subcommand)]
    command: CondorSubCommand,
}

#[derive(Debug, StructOpt)]
enum CondorSubCommand {
    #[structopt(name = "submit")]
    /// Submit a non-interactive batch job
    Submit(submit::SubmitCommand),

    #[structopt(name = "interactive")]
    /// Start an interactive condor shell
    Interactive(interactive::InteractiveCommand),
}

impl CondorSubCli {
    fn cli(self, cio: &mut ColorIo) -> Result<i32, Error> {
        match self.command {
            CondorSubCommand::Submit(cmd) => cmd.cli(cio, self.config),
            CondorSubCommand::Interactive(cmd) => cmd.cli(cio, self.config),
        }
    }
}


fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}


fn main() {
    init_logging();

    let program = CondorSubCli::from_args();
    debug!("command line: {:?}", program);

    let mut cio = ColorIo::new();

    process::exit(match program.cli(&mut cio) {
        Ok(code) => code,

        Err(e) => {
            // A failing condor_submit decides our exit code.
            let code = match e.downcast_ref::<JobError>() {
                Some(&JobError::SchedulerFailed { code, .. }) => code,
                _ => 1,
            };

            cio.print_error(&e);
            code
        },
    });
}
