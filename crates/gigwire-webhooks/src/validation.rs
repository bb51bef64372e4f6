//! URL safety validation (SSRF protection) for outbound webhook requests.
//!
//! Validates a target URL against:
//! - Protocol requirements (HTTPS only in production)
//! - Loopback and `.localhost` hostnames
//! - Cloud metadata endpoints and `.internal` hostnames
//! - Private IPv4 literal ranges, including their IPv4-mapped IPv6 forms
//!
//! The check runs on the literal host of the URL. It does not resolve DNS, so
//! a public hostname that later resolves to a private address is not caught.

use std::net::{Ipv4Addr, Ipv6Addr};

use url::{Host, Url};

use crate::error::WebhookError;

/// AWS/Azure/GCP instance metadata address.
const METADATA_IPV4: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);

/// Hostnames that are never contacted, regardless of mode.
const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "metadata.google.internal"];

/// Hostname suffixes that are never contacted.
const BLOCKED_SUFFIXES: &[&str] = &[".localhost", ".internal"];

// ---------------------------------------------------------------------------
// URL validation
// ---------------------------------------------------------------------------

/// Whether `url` may be contacted by the dispatcher.
///
/// Pure and side-effect free; see [`validate_target_url`] for the reason a
/// URL is rejected.
#[must_use]
pub fn is_allowed(url: &str, production: bool) -> bool {
    validate_target_url(url, production).is_ok()
}

/// Validate a webhook target URL.
///
/// Checks:
/// 1. URL parses as an absolute URL
/// 2. Scheme is `https`, or `http` outside production
/// 3. Host is not loopback, metadata, internal or private
pub fn validate_target_url(url: &str, production: bool) -> Result<(), WebhookError> {
    let parsed =
        Url::parse(url).map_err(|e| WebhookError::InvalidUrl(format!("Invalid URL format: {e}")))?;

    match parsed.scheme() {
        "https" => {}
        "http" if !production => {}
        "http" => {
            return Err(WebhookError::InvalidUrl(
                "Webhook URLs must use HTTPS in production".to_string(),
            ));
        }
        scheme => {
            return Err(WebhookError::InvalidUrl(format!(
                "Unsupported URL scheme: {scheme}"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| WebhookError::InvalidUrl("URL must have a host".to_string()))?;

    validate_host(&host)
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

fn validate_host(host: &Host<&str>) -> Result<(), WebhookError> {
    match host {
        Host::Ipv4(ip) => {
            if is_blocked_ipv4(ip) {
                return Err(WebhookError::SsrfDetected(format!(
                    "Destination host {ip} is a private/internal address"
                )));
            }
        }
        Host::Ipv6(ip) => {
            if *ip == Ipv6Addr::LOCALHOST || ip.is_unspecified() {
                return Err(WebhookError::SsrfDetected(format!(
                    "Destination host [{ip}] is a loopback or unspecified address"
                )));
            }
            // ::ffff:a.b.c.d reaches the IPv4 host on dual-stack sockets.
            if let Some(v4) = ip.to_ipv4_mapped() {
                if is_blocked_ipv4(&v4) {
                    return Err(WebhookError::SsrfDetected(format!(
                        "Destination host [{ip}] maps to private/internal address {v4}"
                    )));
                }
            }
        }
        Host::Domain(name) => validate_hostname(name)?,
    }
    Ok(())
}

/// Reject restricted hostnames (case-insensitive, trailing dot ignored).
pub fn validate_hostname(name: &str) -> Result<(), WebhookError> {
    let lower = name.trim_end_matches('.').to_ascii_lowercase();

    if BLOCKED_HOSTNAMES.contains(&lower.as_str())
        || BLOCKED_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
    {
        return Err(WebhookError::SsrfDetected(format!(
            "Destination host {name} is a restricted internal hostname"
        )));
    }

    // A bare dotted-quad that the URL parser left as a domain still counts.
    if let Ok(ip) = lower.parse::<Ipv4Addr>() {
        if is_blocked_ipv4(&ip) {
            return Err(WebhookError::SsrfDetected(format!(
                "Destination host {ip} is a private/internal address"
            )));
        }
    }

    Ok(())
}

/// Loopback 127/8, private 10/8, 172.16/12, 192.168/16, 0.0.0.0, metadata.
fn is_blocked_ipv4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_unspecified() || *ip == METADATA_IPV4
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
