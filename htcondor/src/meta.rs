// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! The `meta.json` reproducibility record.

One record is written into each run directory before the job is handed to
the scheduler. Gathering the git state is best-effort: anything that goes
wrong just yields `{"is_repo": false}`.

*/

use chrono::{SecondsFormat, Utc};
use config::{CondaSpec, ResourceSpec};
use driver::Mode;
use failure::{Error, ResultExt};
use host;
use serde_json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};


/// Name of the record inside the run directory.
pub const META_FILE_NAME: &str = "meta.json";


/// Version-control state of the repository a job was submitted from.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct GitInfo {
    pub is_repo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirty: Option<bool>,
}

impl GitInfo {
    /// Probe `repo_dir` with `git`.
    pub fn probe(repo_dir: &Path) -> GitInfo {
        match probe_git(repo_dir) {
            Some(info) => info,
            None => {
                debug!("{} is not a usable git checkout", repo_dir.display());
                GitInfo::default()
            },
        }
    }
}

fn probe_git(repo_dir: &Path) -> Option<GitInfo> {
    let commit = git(repo_dir, &["rev-parse", "HEAD"])?;
    let branch = git(repo_dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let status = git(repo_dir, &["status", "--porcelain"])?;

    Some(GitInfo {
        is_repo: true,
        commit: Some(commit),
        branch: Some(branch),
        dirty: Some(!status.is_empty()),
    })
}

/// Run a git subcommand, returning its trimmed output if it succeeded.
fn git(repo_dir: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if !out.status.success() {
        return None;
    }

    String::from_utf8(out.stdout).ok().map(|s| s.trim().to_owned())
}


/// Everything we record about one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunRecord {
    pub user: String,
    pub hostname: String,
    pub timestamp: String,
    pub repo_dir: String,
    pub run_dir: String,
    pub jobname: String,
    pub mode: Mode,
    pub command: Vec<String>,
    pub resources: ResourceSpec,
    pub conda: CondaSpec,
    pub git: GitInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl RunRecord {
    /// Capture the current user, host, time and git state for a run.
    pub fn capture(
        repo_dir: &Path, run_dir: &Path, jobname: &str, mode: Mode, command: &[String],
        resources: &ResourceSpec, conda: &CondaSpec,
    ) -> RunRecord {
        RunRecord {
            user: host::current_user(),
            hostname: host::hostname().unwrap_or_else(|| "unknown".to_owned()),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            repo_dir: repo_dir.display().to_string(),
            run_dir: run_dir.display().to_string(),
            jobname: jobname.to_owned(),
            mode,
            command: command.to_vec(),
            resources: resources.clone(),
            conda: conda.clone(),
            git: GitInfo::probe(repo_dir),
            project: None,
            tag: None,
        }
    }

    /// Write the record as pretty-printed JSON into `run_dir`.
    pub fn write(&self, run_dir: &Path) -> Result<PathBuf, Error> {
        let path = run_dir.join(META_FILE_NAME);
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        fs::write(&path, text)
            .context(format!("failed to write run metadata {}", path.display()))?;
        Ok(path)
    }
}
