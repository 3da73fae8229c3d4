// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Errors that stop a submission.

Most failures inside this crate are plain `failure::Error` values built with
`format_err!` or wrapped I/O errors. The variants here are the ones a caller
may want to tell apart: in particular `SchedulerFailed` carries the exit code
that the CLI should reuse as its own.

*/

use failure_derive::Fail;


/// A fatal problem encountered while preparing or submitting a job.
#[derive(Debug, Fail)]
pub enum JobError {
    /// A batch job was requested without anything to run.
    #[fail(display = "a command is required after --")]
    MissingCommand,

    /// The scratch root exists but we can't create anything inside it.
    #[fail(display = "scratch path is not writable: {}", _0)]
    ScratchNotWritable(String),

    /// A conda environment was requested but no installation was found.
    #[fail(display = "--conda-env requires a conda base path; auto-detection failed. \
                      Set --conda-base or conda.conda_base in config.")]
    UnresolvedCondaBase,

    /// A GPU count so large that the derived CPU request can't be expressed.
    #[fail(display = "cannot request {} CPUs per GPU for {} GPUs; pass --cpus explicitly", cpus_per_gpu, gpus)]
    ResourceOverflow {
        gpus: u32,
        cpus_per_gpu: u32,
    },

    /// A job or project name that can't be used as a single directory name.
    #[fail(display = "invalid {} {:?}: it must be one path component without quotes or control characters",
           what, value)]
    InvalidName {
        what: String,
        value: String,
    },

    /// The freshly allocated run directory is already on disk.
    #[fail(display = "run directory already exists: {}", _0)]
    RunDirExists(String),

    /// The generated submit file lost its arguments placeholder.
    #[fail(display = "arguments placeholder not found in submit file {}", _0)]
    MissingPlaceholder(String),

    /// The scheduler's submission tool returned a failing status.
    #[fail(display = "{} exited with code {}", program, code)]
    SchedulerFailed {
        program: String,
        code: i32,
    },
}
