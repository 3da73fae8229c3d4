// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Allocate a fresh directory for one run's artifacts.

Runs live at

```text
<scratch>/<runs_subdir>/<user>/[<project>/]<jobname>/<YYYYmmdd_HHMMSS>_<shortid>
```

The six-character random suffix only has to separate runs started within
the same second. There's no locking: [`create_run_dir`] refuses to reuse an
existing directory, so the unlikely collision is loud rather than silent.

The scratch root itself is created on demand.

*/

use chrono::Local;
use errors::JobError;
use failure::{Error, Fail, ResultExt};
use host;
use rand::{self, Rng};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};


/// Length of the random part of a run directory name.
pub const SHORTID_LEN: usize = 6;

const SHORTID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";


/// Everything that determines where a run directory goes.
#[derive(Clone, Debug)]
pub struct RunDirRequest<'a> {
    pub scratch: &'a Path,
    pub runs_subdir: &'a str,
    pub user: &'a str,
    pub jobname: &'a str,
    pub project: Option<&'a str>,

    /// Recorded in the run metadata; it plays no part in the path.
    pub tag: Option<&'a str>,
}

impl<'a> RunDirRequest<'a> {
    /// Pick a path for a new run.
    ///
    /// The scratch root is created if needed and must be writable. The
    /// returned path itself is not created; see [`create_run_dir`].
    pub fn allocate(&self) -> Result<PathBuf, Error> {
        if let Some(project) = self.project {
            check_name("project", project)?;
        }
        check_name("job name", self.jobname)?;

        fs::create_dir_all(self.scratch)
            .context(format!("failed to create scratch directory {}", self.scratch.display()))?;

        if !host::is_writable(self.scratch) {
            return Err(JobError::ScratchNotWritable(self.scratch.display().to_string()).into());
        }

        let mut path = self.scratch.join(self.runs_subdir).join(self.user);

        if let Some(project) = self.project {
            path.push(project);
        }

        path.push(self.jobname);
        path.push(run_dir_name());
        debug!("allocated run directory {}", path.display());
        Ok(path)
    }
}


/// Make sure `value` names exactly one directory below its parent.
///
/// Job names also end up inside a quoted string in the submit file, so
/// double quotes and control characters are refused as well.
pub fn check_name(what: &str, value: &str) -> Result<(), JobError> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.chars().any(|c| c == '/' || c == '\\' || c == '"' || c.is_control());

    if bad {
        return Err(JobError::InvalidName { what: what.to_owned(), value: value.to_owned() });
    }

    Ok(())
}


/// The leaf name of a run directory: a sortable timestamp plus a short id.
pub fn run_dir_name() -> String {
    format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), shortid())
}


/// A random string of lowercase letters and digits.
pub fn shortid() -> String {
    let mut rng = rand::rng();

    (0..SHORTID_LEN)
        .map(|_| SHORTID_ALPHABET[rng.random_range(0..SHORTID_ALPHABET.len())] as char)
        .collect()
}


/// Create an allocated run directory, failing if it's already there.
pub fn create_run_dir(run_dir: &Path) -> Result<(), Error> {
    if let Some(parent) = run_dir.parent() {
        fs::create_dir_all(parent)
            .context(format!("failed to create directory {}", parent.display()))?;
    }

    match fs::create_dir(run_dir) {
        Ok(()) => Ok(()),
        Err(ref e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(JobError::RunDirExists(run_dir.display().to_string()).into())
        },
        Err(e) => Err(e.context(format!("failed to create run directory {}", run_dir.display())).into()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile;
    use users;

    fn request<'a>(scratch: &'a Path, project: Option<&'a str>) -> RunDirRequest<'a> {
        RunDirRequest {
            scratch,
            runs_subdir: "condor-runs",
            user: "alice",
            jobname: "myjob",
            project,
            tag: None,
        }
    }

    #[test]
    fn path_shape() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = request(dir.path(), None).allocate().unwrap();
        let parts: Vec<_> = run_dir.strip_prefix(dir.path()).unwrap()
            .iter()
            .map(|p| p.to_str().unwrap().to_owned())
            .collect();

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "condor-runs");
        assert_eq!(parts[1], "alice");
        assert_eq!(parts[2], "myjob");

        // YYYYmmdd_HHMMSS_xxxxxx
        let leaf = &parts[3];
        assert_eq!(leaf.len(), 8 + 1 + 6 + 1 + SHORTID_LEN);
        let pieces: Vec<_> = leaf.split('_').collect();
        assert_eq!(pieces.len(), 3);
        assert!(pieces[0].chars().all(|c| c.is_ascii_digit()));
        assert!(pieces[1].chars().all(|c| c.is_ascii_digit()));
        assert!(pieces[2].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn project_goes_before_jobname() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = request(dir.path(), Some("myproject")).allocate().unwrap();
        let rel = run_dir.strip_prefix(dir.path()).unwrap();
        assert!(rel.starts_with("condor-runs/alice/myproject/myjob"));
    }

    #[test]
    fn tag_does_not_change_the_path_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), None);
        req.tag = Some("lr-sweep");
        let run_dir = req.allocate().unwrap();
        assert_eq!(run_dir.strip_prefix(dir.path()).unwrap().iter().count(), 4);
        assert!(!run_dir.to_str().unwrap().contains("lr-sweep"));
    }

    fn assert_invalid_name(result: Result<PathBuf, Error>) {
        match result.unwrap_err().downcast_ref::<JobError>() {
            Some(JobError::InvalidName { .. }) => {},
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn project_cannot_leave_scratch() {
        let dir = tempfile::tempdir().unwrap();
        assert_invalid_name(request(dir.path(), Some("/tmp/escaped")).allocate());
        assert_invalid_name(request(dir.path(), Some("..")).allocate());
        assert_invalid_name(request(dir.path(), Some("a/b")).allocate());
    }

    #[test]
    fn jobname_must_be_one_component() {
        let dir = tempfile::tempdir().unwrap();

        for name in &["", ".", "..", "../up", "with\"quote", "two\nlines"] {
            let mut req = request(dir.path(), None);
            req.jobname = *name;
            assert_invalid_name(req.allocate());
        }

        let mut req = request(dir.path(), None);
        req.jobname = "lr 0.1..sweep";
        assert!(req.allocate().is_ok());
    }

    #[test]
    fn scratch_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("brand-new-scratch");
        let run_dir = request(&scratch, None).allocate().unwrap();
        assert!(scratch.is_dir());
        assert!(run_dir.starts_with(&scratch));
        assert!(!run_dir.exists());
    }

    #[test]
    fn rapid_allocations_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), None);
        let dirs: HashSet<_> = (0..20).map(|_| req.allocate().unwrap()).collect();
        assert_eq!(dirs.len(), 20);
    }

    #[test]
    fn unwritable_scratch_is_fatal() {
        use std::os::unix::fs::PermissionsExt;

        // root can write anywhere
        if users::get_current_uid() == 0 {
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("locked");
        fs::create_dir(&scratch).unwrap();
        fs::set_permissions(&scratch, fs::Permissions::from_mode(0o555)).unwrap();

        let err = request(&scratch, None).allocate().unwrap_err();
        match err.downcast_ref::<JobError>() {
            Some(JobError::ScratchNotWritable(_)) => {},
            other => panic!("unexpected error {:?}", other),
        }

        fs::set_permissions(&scratch, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn create_refuses_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = request(dir.path(), None).allocate().unwrap();
        create_run_dir(&run_dir).unwrap();
        assert!(run_dir.is_dir());

        let err = create_run_dir(&run_dir).unwrap_err();
        match err.downcast_ref::<JobError>() {
            Some(JobError::RunDirExists(_)) => {},
            other => panic!("unexpected error {:?}", other),
        }
    }
}
