//! Scoped removal of proxy environment variables.

use std::ffi::OsString;

use log::debug;

const PROXY_VARIABLES: [&str; 6] = [
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
];
const NO_PROXY_VARIABLES: [&str; 2] = ["NO_PROXY", "no_proxy"];
const LOCAL_NO_PROXY: &str = "127.0.0.1,localhost";

/// Clears proxy variables while alive and restores the previous values on drop.
///
/// Restoration runs on every exit path, unwinding included. The environment
/// is process-global, so only one guard should be held at a time.
#[must_use = "proxy variables are restored as soon as the guard is dropped"]
pub struct ProxyEnvGuard {
    saved: Vec<(&'static str, Option<OsString>)>,
}

impl ProxyEnvGuard {
    pub fn acquire() -> Self {
        let saved: Vec<(&'static str, Option<OsString>)> = PROXY_VARIABLES
            .into_iter()
            .chain(NO_PROXY_VARIABLES)
            .map(|name| (name, std::env::var_os(name)))
            .collect();

        for name in PROXY_VARIABLES {
            std::env::remove_var(name);
        }
        for name in NO_PROXY_VARIABLES {
            std::env::set_var(name, LOCAL_NO_PROXY);
        }
        debug!("Proxy environment cleared for this run");
        Self { saved }
    }
}

impl Drop for ProxyEnvGuard {
    fn drop(&mut self) {
        for (name, previous) in self.saved.drain(..) {
            match previous {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
        debug!("Proxy environment restored");
    }
}
