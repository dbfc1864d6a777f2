//! Engine configuration (§4.8, §9 Design Note on global state).
//!
//! Hostname is process-wide state in the original source; here it is
//! resolved once and stored on the engine rather than read from a global.

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::error::EngineError;

const HOSTNAME_CAP: usize = 256;
const VMNAME_CAP: usize = 512;
const PATH_CAP: usize = 4096;

/// Per-engine configuration: the addressing components of every published
/// topic (§4.6) other than the per-file path.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub hostname: String,
    pub vmname: String,
}

impl EngineConfig {
    /// Resolves the current hostname via `gethostname(2)` and pairs it with
    /// `vmname`. Mirrors `utils::util::get_hostname`.
    pub fn new(vmname: impl Into<String>) -> Result<Self, EngineError> {
        let hostname = get_hostname()?;
        let vmname = vmname.into();
        if hostname.len() > HOSTNAME_CAP {
            return Err(EngineError::corrupt(
                format!("hostname exceeds {} bytes", HOSTNAME_CAP),
                0,
            ));
        }
        if vmname.len() > VMNAME_CAP {
            return Err(EngineError::corrupt(
                format!("vmname exceeds {} bytes", VMNAME_CAP),
                0,
            ));
        }
        Ok(Self { hostname, vmname })
    }
}

/// Validates a file path against the §6 size cap. Called once per file as
/// the catalog is loaded, not on every event.
pub fn check_path_len(path: &str) -> Result<(), EngineError> {
    if path.len() > PATH_CAP {
        return Err(EngineError::corrupt(
            format!("path exceeds {} bytes", PATH_CAP),
            0,
        ));
    }
    Ok(())
}

fn get_hostname() -> Result<String, EngineError> {
    let mut buf = [0 as c_char; HOSTNAME_CAP + 1];
    // SAFETY: `buf` is a valid, writable buffer of the given length.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return Err(EngineError::Io(std::io::Error::last_os_error()));
    }
    let cstr = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(cstr.to_string_lossy().into_owned())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolves_a_nonempty_hostname() {
        let cfg = EngineConfig::new("vm1").unwrap();
        assert!(!cfg.hostname.is_empty());
        assert_eq!(cfg.vmname, "vm1");
    }

    #[test]
    fn rejects_oversized_path() {
        let long = "/".to_string() + &"a".repeat(PATH_CAP + 1);
        assert!(check_path_len(&long).is_err());
    }
}
