//! Subject Alternative Name list construction.
//!
//! The first entry always comes from the hostname; caller-supplied entries
//! follow in the order given.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{PkiError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectAltName {
    Dns(String),
    Ip(IpAddr),
}

impl fmt::Display for SubjectAltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectAltName::Dns(name) => write!(f, "DNS:{name}"),
            SubjectAltName::Ip(addr) => write!(f, "IP:{addr}"),
        }
    }
}

impl SubjectAltName {
    /// Entry derived from a bare hostname: dotted quads become `IP:`,
    /// IPv6 literals too, everything else `DNS:`.
    pub fn from_hostname(hostname: &str) -> Result<Self> {
        let hostname = hostname.trim();
        validate_name("hostname", hostname)?;

        if is_dotted_quad(hostname) {
            let addr: Ipv4Addr = hostname.parse().map_err(|_| {
                PkiError::Validation(format!("'{hostname}' looks like an IPv4 address but is not one"))
            })?;
            return Ok(SubjectAltName::Ip(IpAddr::V4(addr)));
        }
        if hostname.contains(':') {
            let addr: Ipv6Addr = hostname.parse().map_err(|_| {
                PkiError::Validation(format!("'{hostname}' is neither a DNS name nor an IP address"))
            })?;
            return Ok(SubjectAltName::Ip(IpAddr::V6(addr)));
        }
        Ok(SubjectAltName::Dns(hostname.to_string()))
    }

    /// Parse one typed entry such as `DNS:registry.local` or `IP:10.0.0.16`.
    pub fn parse_typed(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        let Some((kind, value)) = entry.split_once(':') else {
            return Err(PkiError::Validation(format!(
                "alt name '{entry}' must be prefixed with DNS: or IP:"
            )));
        };
        let value = value.trim();

        match kind.trim().to_ascii_uppercase().as_str() {
            "DNS" => {
                validate_name("DNS alt name", value)?;
                Ok(SubjectAltName::Dns(value.to_string()))
            }
            "IP" => value.parse::<IpAddr>().map(SubjectAltName::Ip).map_err(|_| {
                PkiError::Validation(format!("alt name '{entry}' has an invalid IP address"))
            }),
            other => Err(PkiError::Validation(format!(
                "alt name '{entry}' has unsupported type '{other}' (expected DNS or IP)"
            ))),
        }
    }
}

/// Ordered SAN sequence, hostname entry first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanList {
    entries: Vec<SubjectAltName>,
}

impl SanList {
    /// Build from a hostname plus an optional comma-separated list of typed entries.
    pub fn build(hostname: &str, alt_names: Option<&str>) -> Result<Self> {
        let mut entries = vec![SubjectAltName::from_hostname(hostname)?];
        if let Some(list) = alt_names {
            for raw in list.split(',') {
                if raw.trim().is_empty() {
                    continue;
                }
                entries.push(SubjectAltName::parse_typed(raw)?);
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[SubjectAltName] {
        &self.entries
    }

    /// The entry derived from the hostname.
    pub fn primary(&self) -> &SubjectAltName {
        &self.entries[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for SanList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.entries.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(","))
    }
}

fn is_dotted_quad(value: &str) -> bool {
    let parts: Vec<&str> = value.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| (1..=3).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit()))
}

fn validate_name(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(PkiError::Validation(format!("{what} must not be empty")));
    }
    if value.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(PkiError::Validation(format!(
            "{what} '{value}' must not contain whitespace or commas"
        )));
    }
    Ok(())
}
