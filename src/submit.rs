// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Submit a batch job.

Everything after `--` is the command to run. It's executed from the
current directory on whichever machine HTCondor picks.

*/

use colorio::ColorIo;
use failure::Error;
use htcondor::driver::{self, Mode, Outcome};
use std::env;
use std::path::PathBuf;
use structopt::StructOpt;
use util::{self, JobFlags};


#[derive(Debug, StructOpt)]
pub struct SubmitCommand {
    #[structopt(flatten)]
    flags: JobFlags,

    #[structopt(name = "COMMAND", last = true)]
    /// The command to run, after a `--` separator.
    command: Vec<String>,
}

impl SubmitCommand {
    pub fn cli(self, cio: &mut ColorIo, config: Option<PathBuf>) -> Result<i32, Error> {
        let opts = self.flags.into_options(config);
        let repo_dir = env::current_dir()?;
        let job = driver::prepare(Mode::Batch, &self.command, &opts, &repo_dir)?;

        cio.print_field("Repo dir", job.repo_dir.display());
        cio.print_field("Run dir", job.run_dir.display());
        cio.print_field("Stdout", job.stdout_path().display());
        cio.print_field("Stderr", job.stderr_path().display());
        cio.print_field("Log", job.log_path().display());
        cio.print_field("Reproduce", job.scheduler_argv().join(" "));

        if util::execute(cio, &job)? == Outcome::Submitted {
            cprintln!(cio, green, "Submitted {}.", job.jobname);
        }

        Ok(0)
    }
}
