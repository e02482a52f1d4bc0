// src/collect/sources/network.rs

//! Best-effort public network identity.
//!
//! Two independent lookups, each over a client bound to one address family
//! so the answer reflects that family's egress path.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::collect::task::{BoxFuture, EnvSink, SourceTask, TaskContext};
use crate::environ;

pub const DEFAULT_IPV4_URL: &str = "https://ipinfo.io/json";
pub const DEFAULT_IPV6_URL: &str = "https://api6.ipify.org";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static ORG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(AS\d+)\s+(.+)$").expect("org pattern is valid"));

/// Geo-IP answer. Every field is optional; providers omit what they don't know.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IpInfo {
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub loc: Option<String>,
    pub org: Option<String>,
    pub postal: Option<String>,
    pub timezone: Option<String>,
}

/// IPv4 geo-IP lookup, gated on `CHORE_NETWORK_IPV4`.
#[derive(Debug, Clone)]
pub struct Ipv4GeoSource {
    url: String,
}

impl Default for Ipv4GeoSource {
    fn default() -> Self {
        Self::with_url(DEFAULT_IPV4_URL)
    }
}

impl Ipv4GeoSource {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl SourceTask for Ipv4GeoSource {
    fn name(&self) -> &'static str {
        "network-ipv4"
    }

    fn idempotency_key(&self) -> Option<&'static str> {
        Some(environ::NETWORK_IPV4)
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            if ctx.is_set(environ::NETWORK_IPV4) {
                return Ok(());
            }

            let Some(body) = ctx
                .until_cancelled(fetch(&self.url, IpAddr::V4(Ipv4Addr::UNSPECIFIED)))
                .await
            else {
                return Ok(());
            };

            let info: IpInfo = serde_json::from_str(&body?).context("decoding geo-ip response")?;
            let entries = geo_entries(&info);
            debug!(url = %self.url, count = entries.len(), "geo-ip lookup finished");
            sink.emit_all(entries).await;
            Ok(())
        })
    }
}

/// IPv6 address lookup, gated on `CHORE_NETWORK_IPV6`.
#[derive(Debug, Clone)]
pub struct Ipv6Source {
    url: String,
}

impl Default for Ipv6Source {
    fn default() -> Self {
        Self::with_url(DEFAULT_IPV6_URL)
    }
}

impl Ipv6Source {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl SourceTask for Ipv6Source {
    fn name(&self) -> &'static str {
        "network-ipv6"
    }

    fn idempotency_key(&self) -> Option<&'static str> {
        Some(environ::NETWORK_IPV6)
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext, sink: EnvSink) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            if ctx.is_set(environ::NETWORK_IPV6) {
                return Ok(());
            }

            let Some(body) = ctx
                .until_cancelled(fetch(&self.url, IpAddr::V6(Ipv6Addr::UNSPECIFIED)))
                .await
            else {
                return Ok(());
            };

            let body = body?;
            let addr: Ipv6Addr = body
                .trim()
                .parse()
                .with_context(|| format!("'{}' is not an IPv6 address", body.trim()))?;
            sink.emit(environ::NETWORK_IPV6, addr.to_string()).await;
            Ok(())
        })
    }
}

async fn fetch(url: &str, local: IpAddr) -> Result<String> {
    let client = reqwest::Client::builder()
        .local_address(local)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("building HTTP client")?;

    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json, text/plain")
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?;

    let status = response.status();
    if !status.is_success() {
        bail!("{url} answered {status}");
    }

    response
        .text()
        .await
        .with_context(|| format!("reading body from {url}"))
}

/// Translate a geo-ip answer into environment entries.
///
/// `org` like `AS15169 Google LLC` is split into ASN and organization;
/// `loc` like `37.4,-122.0` into latitude and longitude.
pub fn geo_entries(info: &IpInfo) -> Vec<(&'static str, String)> {
    let mut out = Vec::new();
    let mut push = |name: &'static str, value: Option<&str>| {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            out.push((name, v.to_string()));
        }
    };

    push(environ::NETWORK_IPV4, info.ip.as_deref());
    push(environ::NETWORK_HOSTNAME, info.hostname.as_deref());
    push(environ::NETWORK_CITY, info.city.as_deref());
    push(environ::NETWORK_REGION, info.region.as_deref());
    push(environ::NETWORK_COUNTRY, info.country.as_deref());
    push(environ::NETWORK_POSTAL, info.postal.as_deref());
    push(environ::NETWORK_TIMEZONE, info.timezone.as_deref());

    if let Some(org) = info.org.as_deref() {
        match ORG_RE.captures(org.trim()) {
            Some(caps) => {
                push(environ::NETWORK_ASN, caps.get(1).map(|m| m.as_str()));
                push(environ::NETWORK_ORGANIZATION, caps.get(2).map(|m| m.as_str()));
            }
            None => push(environ::NETWORK_ORGANIZATION, Some(org)),
        }
    }

    if let Some((lat, lon)) = info.loc.as_deref().and_then(|loc| loc.split_once(',')) {
        push(environ::NETWORK_LATITUDE, Some(lat));
        push(environ::NETWORK_LONGITUDE, Some(lon));
    }

    out
}
