// Copyright 2018 Peter Williams <peter@newton.cx> and collaborators
// Licensed under the MIT License

/*! Facts about who we are and where we're running.

All of these are best-effort: they return `Option` or fall back to a
placeholder rather than failing the submission.

*/

use libc;
use std::env;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::process::{Command, Stdio};
use users;


/// The name of the submitting user.
///
/// Environment variables win over the password database so that the
/// behavior matches what the user's shell reports.
pub fn current_user() -> String {
    for var in &["USER", "USERNAME"] {
        if let Ok(v) = env::var(var) {
            if !v.is_empty() {
                return v;
            }
        }
    }

    users::get_current_username()
        .and_then(|n| n.into_string().ok())
        .unwrap_or_else(|| "unknown".to_owned())
}


/// The short hostname of this machine, as reported by `gethostname(2)`.
pub fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };

    if rc != 0 {
        return None;
    }

    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..end].to_vec()).ok()
}


/// The fully-qualified, lowercased name of this machine.
///
/// HTCondor's `Machine` attribute is the FQDN, so this is what we compare
/// against when pinning a job to the submit host. We ask `hostname -f` and
/// fall back to the short name.
pub fn fqdn() -> String {
    let probed = Command::new("hostname")
        .arg("-f")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()
        .and_then(|out| {
            if !out.status.success() {
                return None;
            }

            let text = String::from_utf8_lossy(&out.stdout).trim().to_owned();
            if text.is_empty() { None } else { Some(text) }
        });

    probed
        .or_else(hostname)
        .unwrap_or_else(|| "localhost".to_owned())
        .to_lowercase()
}


/// Whether the current process may create entries inside `path`.
pub fn is_writable(path: &Path) -> bool {
    let c_path = match CString::new(path.as_os_str().as_bytes()) {
        Ok(p) => p,
        Err(_) => return false,
    };

    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}
