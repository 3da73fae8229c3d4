// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Options and output shared by the subcommands.

 */

use colorio::ColorIo;
use failure::Error;
use htcondor::driver::Outcome;
use htcondor::{JobOptions, PreparedJob};
use std::path::PathBuf;
use structopt::StructOpt;


/// Flags accepted by both `submit` and `interactive`.
#[derive(Debug, StructOpt)]
pub struct JobFlags {
    #[structopt(long = "scratch", value_name = "PATH")]
    /// Scratch directory for run dirs (default: ~/condor-scratch).
    scratch: Option<String>,

    #[structopt(long = "jobname", value_name = "NAME")]
    /// Job name (default: repo dir name, or "interactive").
    jobname: Option<String>,

    #[structopt(long = "gpus", value_name = "N", default_value = "1")]
    /// Number of GPUs to request; 0 for a CPU-only job.
    gpus: u32,

    #[structopt(long = "cpus", value_name = "N")]
    /// Number of CPUs (default: gpus * cpus_per_gpu, or cpus_cpu_only).
    cpus: Option<u32>,

    #[structopt(long = "mem", value_name = "MEM")]
    /// Memory request, passed verbatim (e.g. 32G, 12000MB).
    mem: Option<String>,

    #[structopt(long = "disk", value_name = "DISK")]
    /// Disk request, passed verbatim.
    disk: Option<String>,

    #[structopt(long = "tag", value_name = "TAG")]
    /// Free-form label recorded in the run metadata.
    tag: Option<String>,

    #[structopt(long = "project", value_name = "NAME")]
    /// Optional grouping folder inside the runs subdirectory.
    project: Option<String>,

    #[structopt(long = "runs-subdir", value_name = "NAME")]
    /// Subdirectory under scratch for all runs (default: condor-runs).
    runs_subdir: Option<String>,

    #[structopt(long = "conda-env", value_name = "ENVNAME")]
    /// Conda environment to activate.
    conda_env: Option<String>,

    #[structopt(long = "conda-base", value_name = "PATH")]
    /// Conda installation base path.
    conda_base: Option<String>,

    #[structopt(long = "pin-submit-host", conflicts_with = "no-pin-submit-host")]
    /// Pin the job to the submit host.
    pin_submit_host: bool,

    #[structopt(name = "no-pin-submit-host", long = "no-pin-submit-host")]
    /// Allow scheduling on any eligible host.
    no_pin_submit_host: bool,

    #[structopt(long = "dry-run")]
    /// Generate files but do not call condor_submit.
    dry_run: bool,
}

impl JobFlags {
    pub fn into_options(self, config: Option<PathBuf>) -> JobOptions {
        let pin_submit_host = if self.pin_submit_host {
            Some(true)
        } else if self.no_pin_submit_host {
            Some(false)
        } else {
            None
        };

        JobOptions {
            gpus: self.gpus,
            cpus: self.cpus,
            mem: self.mem,
            disk: self.disk,
            jobname: self.jobname,
            scratch: self.scratch,
            runs_subdir: self.runs_subdir,
            project: self.project,
            tag: self.tag,
            conda_env: self.conda_env,
            conda_base: self.conda_base,
            config,
            pin_submit_host,
            dry_run: self.dry_run,
        }
    }
}


/// Run the scheduler for a prepared job, or say what we would have run.
pub fn execute(cio: &mut ColorIo, job: &PreparedJob) -> Result<Outcome, Error> {
    let outcome = job.execute()?;

    if outcome == Outcome::DryRun {
        cprintln!(cio, pl, "");
        cprint!(cio, yellow, "[dry-run]");
        cprintln!(cio, pl, " would run: {}", job.scheduler_argv().join(" "));
    }

    Ok(outcome)
}
