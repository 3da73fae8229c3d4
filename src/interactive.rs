// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Start an interactive shell under HTCondor.
 */

use colorio::ColorIo;
use failure::Error;
use htcondor::driver::{self, Mode, Outcome};
use std::env;
use std::path::PathBuf;
use structopt::StructOpt;
use util::{self, JobFlags};


#[derive(Debug, StructOpt)]
pub struct InteractiveCommand {
    #[structopt(flatten)]
    flags: JobFlags,
}

impl InteractiveCommand {
    pub fn cli(self, cio: &mut ColorIo, config: Option<PathBuf>) -> Result<i32, Error> {
        let opts = self.flags.into_options(config);
        let repo_dir = env::current_dir()?;
        let job = driver::prepare(Mode::Interactive, &[], &opts, &repo_dir)?;

        cio.print_field("Run dir", job.run_dir.display());

        if util::execute(cio, &job)? == Outcome::Submitted {
            cprintln!(cio, pl, "");
            cprint!(cio, green, "Interactive session ended.");
            cprintln!(cio, pl, " Run dir: {}", job.run_dir.display());
        }

        Ok(0)
    }
}
