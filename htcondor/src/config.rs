// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Layered configuration and resource resolution.

There are three layers, lowest priority first:

1. the built-in defaults of [`Config::default`];
2. an optional YAML file, by default `~/.config/condorsub/config.yaml`;
3. per-invocation [`Overrides`] coming from the CLI or the library API.

Layers 1 and 2 are merged structurally with [`deep_merge`]: the file only
replaces the keys it actually mentions. Layer 3 is applied field by field
when computing the final [`ResourceSpec`] and [`CondaSpec`].

*/

use dirs;
use errors::JobError;
use failure::{Error, ResultExt};
use serde_yaml_ng::{self, Value};
use shellexpand;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};


/// The number of GPUs requested when nobody says otherwise.
pub const DEFAULT_GPUS: u32 = 1;


/// The merged contents of the built-in defaults and the config file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Config {
    pub defaults: Defaults,
    pub condor: CondorSettings,
    pub conda: CondaSettings,
}

/// The `defaults` section: where runs go and how big they are.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Defaults {
    /// Root under which all run directories are allocated.
    pub scratch: String,

    /// Subdirectory of `scratch` collecting every run.
    pub runs_subdir: String,

    /// CPUs to request per GPU when `--cpus` isn't given.
    pub cpus_per_gpu: u32,

    /// CPUs to request for a job with no GPUs.
    pub cpus_cpu_only: u32,

    /// Memory for GPU jobs, in HTCondor's size syntax. Never parsed.
    pub mem_gpu: String,

    /// Memory for CPU-only jobs.
    pub mem_cpu_only: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            scratch: "~/condor-scratch".to_owned(),
            runs_subdir: "condor-runs".to_owned(),
            cpus_per_gpu: 6,
            cpus_cpu_only: 4,
            mem_gpu: "24G".to_owned(),
            mem_cpu_only: "8G".to_owned(),
        }
    }
}

/// The `condor` section: knobs for the generated submit description.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CondorSettings {
    /// Leave out `request_gpus` entirely for CPU-only jobs.
    pub omit_request_gpus_when_zero: bool,

    /// Restrict jobs to the machine they were submitted from.
    pub pin_submit_host: bool,

    /// The program that accepts submit descriptions.
    pub submit_bin: String,
}

impl Default for CondorSettings {
    fn default() -> Self {
        CondorSettings {
            omit_request_gpus_when_zero: true,
            pin_submit_host: false,
            submit_bin: "condor_submit".to_owned(),
        }
    }
}

/// The `conda` section.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CondaSettings {
    /// Installation root, i.e. the directory holding `etc/profile.d/conda.sh`.
    pub conda_base: Option<String>,
}


/// Per-invocation settings that beat anything in the config file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Overrides {
    pub gpus: Option<u32>,
    pub cpus: Option<u32>,
    pub mem: Option<String>,
    pub disk: Option<String>,
    pub conda_env: Option<String>,
    pub conda_base: Option<String>,
    pub pin_submit_host: Option<bool>,
}


/// A fully resolved resource request.
///
/// `cpus` and `mem` always have concrete values; `disk` is only present if
/// somebody explicitly asked for a disk reservation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResourceSpec {
    pub gpus: u32,
    pub cpus: u32,
    pub mem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<String>,
}

/// Which conda environment to activate, and from where.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CondaSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conda_base: Option<String>,
}

impl CondaSpec {
    /// Check that an environment request can actually be honored.
    ///
    /// Activating an environment needs the installation's shell hook, so an
    /// environment without a base is fatal.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.env.is_some() && self.conda_base.is_none() {
            return Err(JobError::UnresolvedCondaBase);
        }

        Ok(())
    }
}


/// Where we look for the config file if none is given explicitly.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("condorsub").join("config.yaml"))
}


/// Load the configuration, merging the config file over the defaults.
///
/// A missing file is not an error; we just use the defaults. A file that
/// exists but can't be read or parsed is.
pub fn load_config(path: Option<&Path>) -> Result<Config, Error> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                warn!("config file {} does not exist; using built-in defaults", p.display());
                return Ok(Config::default());
            }
            p.to_path_buf()
        },

        None => match default_config_path() {
            Some(ref p) if p.exists() => p.clone(),
            _ => {
                debug!("no config file found; using built-in defaults");
                return Ok(Config::default());
            },
        },
    };

    let text = fs::read_to_string(&path)
        .context(format!("failed to read config file {}", path.display()))?;
    let cfg = config_from_str(&text)
        .context(format!("invalid config file {}", path.display()))?;
    debug!("loaded config from {}", path.display());
    Ok(cfg)
}


/// Parse YAML text and merge it over the built-in defaults.
pub fn config_from_str(text: &str) -> Result<Config, Error> {
    let defaults = serde_yaml_ng::to_value(Config::default())?;
    let user: Value = serde_yaml_ng::from_str(text)?;
    Ok(serde_yaml_ng::from_value(deep_merge(defaults, user))?)
}


/// Recursively overlay one YAML value on another.
///
/// Where both sides are mappings, keys are merged one by one so that
/// anything `overlay` doesn't mention survives from `base`. A null overlay
/// leaves a mapping untouched, which is what an empty YAML section such as
/// `conda:` parses to. Anything else in `overlay` replaces `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Mapping(base)
        },

        (base @ Value::Mapping(_), Value::Null) => base,

        (_, overlay) => overlay,
    }
}


impl Config {
    /// Compute the resources to request.
    ///
    /// A GPU count of zero is a real choice (a CPU-only job) and selects the
    /// CPU-only defaults.
    pub fn resolve_resources(&self, overrides: &Overrides) -> Result<ResourceSpec, JobError> {
        let gpus = overrides.gpus.unwrap_or(DEFAULT_GPUS);
        let cpus_per_gpu = self.defaults.cpus_per_gpu;

        let cpus = match overrides.cpus {
            Some(n) => n,
            None if gpus > 0 => gpus.checked_mul(cpus_per_gpu)
                .ok_or(JobError::ResourceOverflow { gpus, cpus_per_gpu })?,
            None => self.defaults.cpus_cpu_only,
        };

        let mem = overrides.mem.clone().unwrap_or_else(|| {
            if gpus > 0 {
                self.defaults.mem_gpu.clone()
            } else {
                self.defaults.mem_cpu_only.clone()
            }
        });

        Ok(ResourceSpec { gpus, cpus, mem, disk: overrides.disk.clone() })
    }

    /// Work out the conda environment and installation root.
    ///
    /// The base comes from the overrides, then the config file, then
    /// `detect`, which is only called when neither layer has one. The result is not validated here; see
    /// [`CondaSpec::validate`].
    pub fn resolve_conda<F>(&self, overrides: &Overrides, detect: F) -> CondaSpec
        where F: FnOnce() -> Option<String>
    {
        let env = non_empty(overrides.conda_env.clone());

        let conda_base = non_empty(overrides.conda_base.clone())
            .or_else(|| non_empty(self.conda.conda_base.clone()))
            .or_else(|| non_empty(detect()))
            .map(|base| expand_tilde(&base));

        CondaSpec { env, conda_base }
    }

    /// Whether to pin the job to the submit host.
    pub fn resolve_pin_submit_host(&self, overrides: &Overrides) -> bool {
        overrides.pin_submit_host.unwrap_or(self.condor.pin_submit_host)
    }
}


/// Find the conda installation without any help from the user.
///
/// We first ask `conda info --base`; if conda isn't on the `$PATH` or
/// fails, we derive the base from `$CONDA_EXE`, which conda's shell hook
/// sets to `<base>/bin/conda`.
pub fn detect_conda_base() -> Option<String> {
    detect_conda_base_with("conda", env::var("CONDA_EXE").ok())
}


/// The guts of [`detect_conda_base`], with the probed program and the value
/// of `$CONDA_EXE` supplied by the caller.
pub fn detect_conda_base_with(program: &str, conda_exe: Option<String>) -> Option<String> {
    let probed = Command::new(program)
        .args(&["info", "--base"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()
        .and_then(|out| {
            if !out.status.success() {
                return None;
            }
            non_empty(Some(String::from_utf8_lossy(&out.stdout).trim().to_owned()))
        });

    if let Some(base) = probed {
        debug!("conda base from `{} info --base`: {}", program, base);
        return Some(expand_tilde(&base));
    }

    let from_exe = conda_exe.and_then(|exe| base_from_conda_exe(&exe));

    match from_exe {
        Some(ref base) => debug!("conda base from $CONDA_EXE: {}", base),
        None => debug!("could not auto-detect a conda installation"),
    }

    from_exe
}


/// Given `<base>/bin/conda`, return `<base>`.
pub fn base_from_conda_exe(exe: &str) -> Option<String> {
    let base = Path::new(exe).parent()?.parent()?;
    non_empty(base.to_str().map(|s| s.to_owned()))
}


/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    shellexpand::tilde(path).into_owned()
}


fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}
