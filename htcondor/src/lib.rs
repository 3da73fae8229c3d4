// Copyright 2017-2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Prepare and submit jobs to the HTCondor workload manager.

This crate turns a user command plus a handful of resource hints into a
per-run directory containing an HTCondor submit description (`job.sub`), a
wrapper script (`run.sh`) and a reproducibility record (`meta.json`), then
hands the submit description to `condor_submit`.

The pipeline is split in two phases. [`driver::prepare`] resolves the
configuration and writes every file; [`driver::PreparedJob::execute`] runs
the scheduler (or skips it for a dry run). The convenience functions
[`submit`] and [`interactive`] do both.

*/

extern crate chrono;
extern crate dirs;
#[macro_use] extern crate failure;
extern crate failure_derive;
extern crate itertools;
extern crate libc;
extern crate rand;
extern crate serde;
#[macro_use] extern crate serde_derive;
extern crate serde_json;
extern crate serde_yaml_ng;
extern crate shellexpand;
extern crate shlex;
#[macro_use] extern crate tracing;
extern crate users;

#[cfg(test)] #[macro_use] extern crate pretty_assertions;
#[cfg(test)] extern crate tempfile;

pub mod arguments;
pub mod config;
pub mod driver;
pub mod errors;
pub mod host;
pub mod meta;
pub mod rundir;
pub mod submitfile;

pub use driver::{interactive, submit, JobOptions, Mode, PreparedJob};
pub use errors::JobError;
