use crate::error::MonitorError;
use crate::probe::InterfaceProbe;
use async_trait::async_trait;
use std::ffi::CString;
use std::io;
use tracing::debug;

/// Up/down state of one named interface.
pub struct LinkProbe {
    iface: String,
}

impl LinkProbe {
    /// Fails if no interface by that name exists right now.
    pub fn new(iface: impl Into<String>) -> Result<Self, MonitorError> {
        let iface = iface.into();
        if !interface_exists(&iface) {
            return Err(MonitorError::InterfaceNotFound(iface));
        }
        Ok(Self { iface })
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }
}

#[async_trait]
impl InterfaceProbe for LinkProbe {
    async fn is_up(&self) -> bool {
        match link_up(&self.iface) {
            Ok(up) => up,
            Err(e) => {
                debug!(iface = %self.iface, error = %e, "cannot read link state");
                false
            }
        }
    }
}

fn interface_exists(name: &str) -> bool {
    let Ok(c_name) = CString::new(name) else {
        return false;
    };
    unsafe { libc::if_nametoindex(c_name.as_ptr()) != 0 }
}

#[cfg(target_os = "linux")]
fn link_up(name: &str) -> io::Result<bool> {
    sysfs::link_up(&std::path::Path::new("/sys/class/net").join(name))
}

#[cfg(target_os = "linux")]
mod sysfs {
    use std::fs;
    use std::io;
    use std::path::Path;

    /// Up means `IFF_UP` plus a link: `operstate` is `up`, or `unknown`
    /// with carrier present (loopback, tun and friends never say `up`).
    pub fn link_up(dir: &Path) -> io::Result<bool> {
        let flags = fs::read_to_string(dir.join("flags"))?;
        let flags = u32::from_str_radix(flags.trim().trim_start_matches("0x"), 16)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if flags & libc::IFF_UP as u32 == 0 {
            return Ok(false);
        }

        let operstate = fs::read_to_string(dir.join("operstate"))?;
        Ok(match operstate.trim() {
            "up" => true,
            "unknown" => carrier(dir),
            _ => false,
        })
    }

    // reading carrier fails with EINVAL while the interface is down
    fn carrier(dir: &Path) -> bool {
        fs::read_to_string(dir.join("carrier"))
            .map(|c| c.trim() == "1")
            .unwrap_or(false)
    }
}

#[cfg(not(target_os = "linux"))]
fn link_up(name: &str) -> io::Result<bool> {
    use std::ffi::CStr;

    let mut addrs: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut addrs) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let mut found = false;
    let mut flags: libc::c_uint = 0;
    let mut cursor = addrs;
    while !cursor.is_null() {
        let entry = unsafe { &*cursor };
        let entry_name = unsafe { CStr::from_ptr(entry.ifa_name) };
        if entry_name.to_bytes() == name.as_bytes() {
            found = true;
            flags |= entry.ifa_flags;
        }
        cursor = entry.ifa_next;
    }
    unsafe { libc::freeifaddrs(addrs) };

    if !found {
        return Err(io::Error::new(io::ErrorKind::NotFound, "interface disappeared"));
    }
    let wanted = (libc::IFF_UP | libc::IFF_RUNNING) as libc::c_uint;
    Ok(flags & wanted == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_interface_is_fatal() {
        let err = LinkProbe::new("pm-does-not-exist0").err().unwrap();
        assert!(matches!(err, MonitorError::InterfaceNotFound(name) if name == "pm-does-not-exist0"));
    }

    #[test]
    fn test_interior_nul_is_missing() {
        assert!(!interface_exists("lo\0"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_loopback_is_up() {
        let probe = LinkProbe::new("lo").unwrap();
        assert_eq!(probe.iface(), "lo");
        assert!(probe.is_up().await);
    }

    #[cfg(target_os = "linux")]
    mod sysfs_state {
        use super::super::sysfs;
        use std::fs;
        use std::path::Path;

        fn iface(dir: &Path, flags: &str, operstate: &str, carrier: Option<&str>) {
            fs::write(dir.join("flags"), format!("{}\n", flags)).unwrap();
            fs::write(dir.join("operstate"), format!("{}\n", operstate)).unwrap();
            if let Some(carrier) = carrier {
                fs::write(dir.join("carrier"), format!("{}\n", carrier)).unwrap();
            }
        }

        #[test]
        fn test_up_with_link() {
            let dir = tempfile::tempdir().unwrap();
            iface(dir.path(), "0x1003", "up", Some("1"));
            assert!(sysfs::link_up(dir.path()).unwrap());
        }

        #[test]
        fn test_admin_down() {
            let dir = tempfile::tempdir().unwrap();
            iface(dir.path(), "0x1002", "up", Some("1"));
            assert!(!sysfs::link_up(dir.path()).unwrap());
        }

        #[test]
        fn test_no_link() {
            let dir = tempfile::tempdir().unwrap();
            iface(dir.path(), "0x1003", "down", Some("0"));
            assert!(!sysfs::link_up(dir.path()).unwrap());

            let dir = tempfile::tempdir().unwrap();
            iface(dir.path(), "0x1003", "lowerlayerdown", None);
            assert!(!sysfs::link_up(dir.path()).unwrap());
        }

        #[test]
        fn test_unknown_operstate_falls_back_to_carrier() {
            let dir = tempfile::tempdir().unwrap();
            iface(dir.path(), "0x9", "unknown", Some("1"));
            assert!(sysfs::link_up(dir.path()).unwrap());

            let dir = tempfile::tempdir().unwrap();
            iface(dir.path(), "0x9", "unknown", None);
            assert!(!sysfs::link_up(dir.path()).unwrap());
        }

        #[test]
        fn test_vanished_interface_errors() {
            let dir = tempfile::tempdir().unwrap();
            assert!(sysfs::link_up(&dir.path().join("gone")).is_err());
        }
    }
}
