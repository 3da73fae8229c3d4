// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Drive a submission from options to `condor_submit`.

[`prepare`] does everything that touches the filesystem: it resolves the
configuration, allocates and creates the run directory, and writes the
wrapper script, submit description and metadata record. The returned
[`PreparedJob`] can then be [executed](struct.PreparedJob.html#method.execute),
which runs the scheduler unless this is a dry run. Dry runs therefore leave
behind exactly the same files as real ones.

*/

use arguments;
use config::{self, Config, Overrides, DEFAULT_GPUS};
use errors::JobError;
use failure::{Error, ResultExt};
use host;
use meta::RunRecord;
use rundir::{self, RunDirRequest};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use submitfile::{self, SubmitFile, WrapperScript};


/// The command run for interactive sessions.
pub const INTERACTIVE_COMMAND: &[&str] = &["/bin/bash", "-i"];

/// Job name used for interactive sessions unless one is given.
pub const INTERACTIVE_JOBNAME: &str = "interactive";


/// How the job is handed to HTCondor.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Queue the job and return immediately.
    Batch,

    /// Attach the terminal to a shell running under HTCondor.
    Interactive,
}

impl Mode {
    fn default_jobname(self, repo_dir: &Path) -> String {
        match self {
            Mode::Batch => repo_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "job".to_owned()),
            Mode::Interactive => INTERACTIVE_JOBNAME.to_owned(),
        }
    }
}


/// Everything a caller can say about one submission.
///
/// These are the per-invocation overrides: any field left unset is filled
/// in from the config file or the built-in defaults. The type is
/// serializable so that it can be embedded in other programs' settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct JobOptions {
    pub gpus: u32,
    pub cpus: Option<u32>,
    pub mem: Option<String>,
    pub disk: Option<String>,
    pub jobname: Option<String>,
    pub scratch: Option<String>,
    pub runs_subdir: Option<String>,
    pub project: Option<String>,
    pub tag: Option<String>,
    pub conda_env: Option<String>,
    pub conda_base: Option<String>,
    pub config: Option<PathBuf>,
    pub pin_submit_host: Option<bool>,
    pub dry_run: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        JobOptions {
            gpus: DEFAULT_GPUS,
            cpus: None,
            mem: None,
            disk: None,
            jobname: None,
            scratch: None,
            runs_subdir: None,
            project: None,
            tag: None,
            conda_env: None,
            conda_base: None,
            config: None,
            pin_submit_host: None,
            dry_run: false,
        }
    }
}

impl JobOptions {
    /// The subset of these options that overrides configuration values.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            gpus: Some(self.gpus),
            cpus: self.cpus,
            mem: self.mem.clone(),
            disk: self.disk.clone(),
            conda_env: self.conda_env.clone(),
            conda_base: self.conda_base.clone(),
            pin_submit_host: self.pin_submit_host,
        }
    }
}


/// A job whose run directory is fully populated.
#[derive(Clone, Debug)]
pub struct PreparedJob {
    pub mode: Mode,
    pub jobname: String,
    pub repo_dir: PathBuf,
    pub run_dir: PathBuf,
    pub submit_file: PathBuf,
    pub wrapper_script: PathBuf,
    pub meta_file: PathBuf,
    pub command: Vec<String>,

    /// The scheduler's submission program.
    pub submit_bin: String,

    /// If true, [`execute`](#method.execute) won't run the scheduler.
    pub dry_run: bool,
}

/// What [`PreparedJob::execute`] did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The scheduler accepted the job, or the interactive session ended
    /// cleanly.
    Submitted,

    /// Nothing was run.
    DryRun,
}

impl PreparedJob {
    pub fn stdout_path(&self) -> PathBuf {
        self.run_dir.join(submitfile::STDOUT_NAME)
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.run_dir.join(submitfile::STDERR_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.run_dir.join(submitfile::EVENT_LOG_NAME)
    }

    /// The full scheduler command line for this job.
    pub fn scheduler_argv(&self) -> Vec<String> {
        let mut argv = vec![self.submit_bin.clone()];

        if self.mode == Mode::Interactive {
            argv.push("-interactive".to_owned());
        }

        argv.push(self.submit_file.display().to_string());
        argv
    }

    /// Hand the job to the scheduler, unless this is a dry run.
    ///
    /// The scheduler inherits our standard streams, which interactive
    /// sessions need. A non-zero exit becomes
    /// [`JobError::SchedulerFailed`](../errors/enum.JobError.html).
    pub fn execute(&self) -> Result<Outcome, Error> {
        let argv = self.scheduler_argv();

        if self.dry_run {
            info!("dry run; not running {}", argv.join(" "));
            return Ok(Outcome::DryRun);
        }

        info!("running {}", argv.join(" "));
        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .status()
            .context(format!("failed to launch {}", self.submit_bin))?;

        if !status.success() {
            return Err(JobError::SchedulerFailed {
                program: self.submit_bin.clone(),
                code: status.code().unwrap_or(1),
            }.into());
        }

        Ok(Outcome::Submitted)
    }
}


/// Write out everything needed to run a job, without running it.
///
/// For batch jobs `command` is the user's argument vector; a leading `--`
/// is dropped and the remainder must not be empty. Interactive jobs ignore
/// `command` and run a shell.
pub fn prepare(mode: Mode, command: &[String], opts: &JobOptions, repo_dir: &Path) -> Result<PreparedJob, Error> {
    prepare_with(mode, command, opts, repo_dir, config::detect_conda_base)
}


fn prepare_with<F>(
    mode: Mode, command: &[String], opts: &JobOptions, repo_dir: &Path, detect_conda: F,
) -> Result<PreparedJob, Error>
    where F: FnOnce() -> Option<String>
{
    let command = match mode {
        Mode::Batch => {
            let command = match command.first() {
                Some(first) if first == arguments::SEPARATOR => &command[1..],
                _ => command,
            };

            if command.is_empty() {
                return Err(JobError::MissingCommand.into());
            }

            command.to_vec()
        },

        Mode::Interactive => INTERACTIVE_COMMAND.iter().map(|s| s.to_string()).collect(),
    };

    let cfg = config::load_config(opts.config.as_ref().map(|p| p.as_path()))?;
    let overrides = opts.overrides();
    let resources = cfg.resolve_resources(&overrides)?;
    let conda = cfg.resolve_conda(&overrides, detect_conda);
    let pin_submit_host = cfg.resolve_pin_submit_host(&overrides);

    let jobname = opts.jobname.clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| mode.default_jobname(repo_dir));
    let (scratch, runs_subdir) = run_location(&cfg, opts, repo_dir);
    let user = host::current_user();

    let run_dir = RunDirRequest {
        scratch: &scratch,
        runs_subdir: &runs_subdir,
        user: &user,
        jobname: &jobname,
        project: opts.project.as_ref().map(|s| s.as_str()),
        tag: opts.tag.as_ref().map(|s| s.as_str()),
    }.allocate()?;

    conda.validate()?;
    rundir::create_run_dir(&run_dir)?;

    let wrapper_script = WrapperScript {
        run_dir: &run_dir,
        repo_dir,
        jobname: &jobname,
        gpus: resources.gpus,
        conda: &conda,
    }.write()?;

    let pin_host = if pin_submit_host { Some(host::fqdn()) } else { None };

    let submit_file = SubmitFile {
        run_dir: &run_dir,
        repo_dir,
        jobname: &jobname,
        resources: &resources,
        pin_host: pin_host.as_ref().map(|s| s.as_str()),
        omit_request_gpus_when_zero: cfg.condor.omit_request_gpus_when_zero,
    }.write()?;

    let mut record = RunRecord::capture(repo_dir, &run_dir, &jobname, mode, &command, &resources, &conda);
    record.project = opts.project.clone();
    record.tag = opts.tag.clone();
    let meta_file = record.write(&run_dir)?;

    arguments::patch_submit_file(&submit_file, &wrapper_script, &command)?;
    info!("prepared {:?} job {} in {}", mode, jobname, run_dir.display());

    Ok(PreparedJob {
        mode,
        jobname,
        repo_dir: repo_dir.to_path_buf(),
        run_dir,
        submit_file,
        wrapper_script,
        meta_file,
        command,
        submit_bin: cfg.condor.submit_bin.clone(),
        dry_run: opts.dry_run,
    })
}


/// The scratch root and runs subdirectory to use.
///
/// The scratch root is tilde-expanded, and a relative one is taken relative
/// to `repo_dir` so that every path in the submit file is absolute.
fn run_location(cfg: &Config, opts: &JobOptions, repo_dir: &Path) -> (PathBuf, String) {
    let scratch = opts.scratch.as_ref().unwrap_or(&cfg.defaults.scratch);
    let runs_subdir = opts.runs_subdir.as_ref().unwrap_or(&cfg.defaults.runs_subdir);
    (repo_dir.join(config::expand_tilde(scratch)), runs_subdir.clone())
}


fn current_repo_dir() -> Result<PathBuf, Error> {
    Ok(env::current_dir().context("failed to determine the current directory")?)
}


/// Submit a batch job running `command` from the current directory.
///
/// Returns the prepared job, whose `run_dir` holds all of its artifacts.
pub fn submit<S: AsRef<str>>(command: &[S], opts: &JobOptions) -> Result<PreparedJob, Error> {
    let command: Vec<String> = command.iter().map(|s| s.as_ref().to_owned()).collect();
    let job = prepare(Mode::Batch, &command, opts, &current_repo_dir()?)?;
    job.execute()?;
    Ok(job)
}


/// Start an interactive session from the current directory.
pub fn interactive(opts: &JobOptions) -> Result<PreparedJob, Error> {
    let job = prepare(Mode::Interactive, &[], opts, &current_repo_dir()?)?;
    job.execute()?;
    Ok(job)
}
