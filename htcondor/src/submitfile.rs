// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Render the HTCondor submit description and the job's wrapper script.

The submit description runs `/bin/bash` on the wrapper script, which in
turn activates the optional conda environment and `exec`s the user's
command. The `arguments` line is deliberately left as a placeholder here:
it's filled in by [`arguments::inject`](../arguments/fn.inject.html), which
knows about HTCondor's quoting rules.

The wrapper exports a few `BAIRCONDOR_*` environment variables. Job
scripts read these, so their names must not change.

*/

use config::{CondaSpec, ResourceSpec};
use failure::{Error, ResultExt};
use shlex;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};


/// Name of the submit description inside the run directory.
pub const SUBMIT_FILE_NAME: &str = "job.sub";

/// Name of the wrapper script inside the run directory.
pub const WRAPPER_SCRIPT_NAME: &str = "run.sh";

/// The program HTCondor actually launches.
pub const EXECUTABLE: &str = "/bin/bash";

/// The line that [`arguments::inject`](../arguments/fn.inject.html) replaces.
pub const ARGS_PLACEHOLDER_LINE: &str = "arguments = __ARGS_PLACEHOLDER__";

pub const STDOUT_NAME: &str = "stdout.txt";
pub const STDERR_NAME: &str = "stderr.txt";
pub const EVENT_LOG_NAME: &str = "condor.log";

pub const RUN_DIR_VAR: &str = "BAIRCONDOR_RUN_DIR";
pub const REPO_DIR_VAR: &str = "BAIRCONDOR_REPO_DIR";
pub const JOBNAME_VAR: &str = "BAIRCONDOR_JOBNAME";
pub const NUM_GPUS_VAR: &str = "BAIRCONDOR_NUM_GPUS";


/// The inputs of a submit description.
#[derive(Clone, Debug)]
pub struct SubmitFile<'a> {
    pub run_dir: &'a Path,
    pub repo_dir: &'a Path,
    pub jobname: &'a str,
    pub resources: &'a ResourceSpec,

    /// If set, the lowercased FQDN the job must run on.
    pub pin_host: Option<&'a str>,

    /// Whether to drop `request_gpus` when no GPUs are wanted.
    pub omit_request_gpus_when_zero: bool,
}

impl<'a> SubmitFile<'a> {
    /// Render the submit description as text.
    pub fn render(&self) -> String {
        let run_dir = self.run_dir.display();

        let mut lines = vec![
            "universe = vanilla".to_owned(),
            format!("initialdir = {}", self.repo_dir.display()),
            format!("executable = {}", EXECUTABLE),
            ARGS_PLACEHOLDER_LINE.to_owned(),
            "getenv = True".to_owned(),
            format!("output = {}/{}", run_dir, STDOUT_NAME),
            format!("error  = {}/{}", run_dir, STDERR_NAME),
            format!("log    = {}/{}", run_dir, EVENT_LOG_NAME),
            format!("request_cpus = {}", self.resources.cpus),
            format!("request_memory = {}", self.resources.mem),
        ];

        if let Some(host) = self.pin_host {
            lines.push(format!("requirements = (toLower(Machine) == \"{}\")", host.to_lowercase()));
        }

        if self.resources.gpus > 0 {
            lines.push(format!("request_gpus = {}", self.resources.gpus));
        } else if !self.omit_request_gpus_when_zero {
            lines.push("request_gpus = 0".to_owned());
        }

        if let Some(ref disk) = self.resources.disk {
            lines.push(format!("request_disk = {}", disk));
        }

        lines.push(format!("+JobBatchName = \"{}\"", self.jobname));

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Write `job.sub` into the run directory and return its path.
    pub fn write(&self) -> Result<PathBuf, Error> {
        let path = self.run_dir.join(SUBMIT_FILE_NAME);
        fs::write(&path, self.render())
            .context(format!("failed to write submit file {}", path.display()))?;
        Ok(path)
    }
}


/// The inputs of the wrapper script.
#[derive(Clone, Debug)]
pub struct WrapperScript<'a> {
    pub run_dir: &'a Path,
    pub repo_dir: &'a Path,
    pub jobname: &'a str,
    pub gpus: u32,
    pub conda: &'a CondaSpec,
}

impl<'a> WrapperScript<'a> {
    /// Render the wrapper script as text.
    ///
    /// This only fails if some value can't be represented in a shell word
    /// at all, i.e. it contains a NUL byte.
    pub fn render(&self) -> Result<String, Error> {
        let run_dir = self.run_dir.display().to_string();
        let repo_dir = self.repo_dir.display().to_string();

        let mut lines = vec![
            "#!/usr/bin/env bash".to_owned(),
            "set -euo pipefail".to_owned(),
            String::new(),
            format!("export {}={}", RUN_DIR_VAR, quote(&run_dir)?),
            format!("export {}={}", REPO_DIR_VAR, quote(&repo_dir)?),
            format!("export {}={}", JOBNAME_VAR, quote(self.jobname)?),
            format!("export {}={}", NUM_GPUS_VAR, self.gpus),
            String::new(),
        ];

        if let Some(ref env) = self.conda.env {
            let base = self.conda.conda_base.as_ref().map(|s| s.as_str()).unwrap_or("");
            let hook = format!("{}/etc/profile.d/conda.sh", base.trim_end_matches('/'));
            lines.push(format!("source {}", quote(&hook)?));
            lines.push(format!("conda activate {}", quote(env)?));
            lines.push(String::new());
        }

        lines.push("# drop the \"--\" separator before the user command".to_owned());
        lines.push("if [[ \"${1:-}\" == \"--\" ]]; then shift; fi".to_owned());
        lines.push(String::new());
        lines.push("exec \"$@\"".to_owned());

        let mut text = lines.join("\n");
        text.push('\n');
        Ok(text)
    }

    /// Write `run.sh` into the run directory, mark it executable, and return
    /// its path.
    pub fn write(&self) -> Result<PathBuf, Error> {
        let path = self.run_dir.join(WRAPPER_SCRIPT_NAME);
        fs::write(&path, self.render()?)
            .context(format!("failed to write wrapper script {}", path.display()))?;

        let mut perms = fs::metadata(&path)
            .context(format!("failed to stat {}", path.display()))?
            .permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(&path, perms)
            .context(format!("failed to make {} executable", path.display()))?;

        Ok(path)
    }
}


fn quote(word: &str) -> Result<String, Error> {
    Ok(shlex::try_quote(word)
        .map_err(|e| format_err!("cannot quote {:?} for the shell: {}", word, e))?
        .into_owned())
}
