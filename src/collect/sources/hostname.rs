// src/collect/sources/hostname.rs

use std::ffi::{CStr, CString};
use std::time::Duration;

use anyhow::Context;
use tracing::debug;

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ;

/// Upper bound for the canonical name lookup.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Short hostname and fully qualified domain name.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostnameSource;

impl SourceTask for HostnameSource {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            let want_short = !ctx.is_set(environ::HOSTNAME);
            let want_fqdn = !ctx.is_set(environ::HOSTNAME_FQDN);
            if !want_short && !want_fqdn {
                return Ok(());
            }

            let host = nix::unistd::gethostname()
                .context("reading hostname")?
                .to_string_lossy()
                .into_owned();

            if want_short {
                sink.emit(environ::HOSTNAME, short_hostname(&host)).await;
            }

            if want_fqdn {
                let lookup_host = host.clone();
                let lookup = tokio::time::timeout(
                    LOOKUP_TIMEOUT,
                    tokio::task::spawn_blocking(move || canonical_name(&lookup_host)),
                );

                let fqdn = match ctx.until_cancelled(lookup).await {
                    Some(Ok(Ok(Some(name)))) => name,
                    Some(Ok(Ok(None))) => host.clone(),
                    Some(Ok(Err(err))) => return Err(err).context("canonical name lookup panicked"),
                    Some(Err(_)) => {
                        debug!(host = %host, "canonical name lookup timed out");
                        host.clone()
                    }
                    None => return Ok(()),
                };

                if fqdn.contains('.') {
                    sink.emit(environ::HOSTNAME_FQDN, fqdn).await;
                }
            }
            Ok(())
        })
    }
}

/// Hostname up to the first dot.
pub fn short_hostname(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

/// Canonical name of `host` according to the system resolver.
fn canonical_name(host: &str) -> Option<String> {
    let c_host = CString::new(host).ok()?;

    // SAFETY: addrinfo is a plain C struct for which all-zero is a valid
    // "no hints" value.
    let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = libc::SOCK_DGRAM;
    hints.ai_flags = libc::AI_CANONNAME;

    let mut res: *mut libc::addrinfo = std::ptr::null_mut();
    // SAFETY: all pointers are valid for the duration of the call; `res` is
    // released with freeaddrinfo below.
    let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), std::ptr::null(), &hints, &mut res) };
    if rc != 0 || res.is_null() {
        return None;
    }

    // SAFETY: `res` is a valid list returned by getaddrinfo and
    // `ai_canonname` is either null or a NUL-terminated string owned by it.
    let name = unsafe {
        let canon = (*res).ai_canonname;
        let name = (!canon.is_null()).then(|| CStr::from_ptr(canon).to_string_lossy().into_owned());
        libc::freeaddrinfo(res);
        name
    };

    name.filter(|n| !n.is_empty())
}
