//! Newtype wrappers and small value types shared by the manifest model.
//!
//! All name newtypes serialize/deserialize as plain strings so the manifest
//! stays hand-editable.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::net::IpAddr;
use std::ops::Deref;
use std::str::FromStr;

/// Profile sentinel: a service listing it belongs to every profile.
pub const ALL_PROFILES: &str = "all";

/// Placeholder accepted in `host_ip` meaning "use `global.default_host_ip`".
pub const DEFAULT_HOST_IP_PLACEHOLDER: &str = "${default_host_ip}";

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Unique key of a service in the manifest (also its container hostname).
    ServiceName
);

string_newtype!(
    /// Name of a deployment profile, or the [`ALL_PROFILES`] sentinel.
    ProfileName
);

impl ProfileName {
    pub fn is_all(&self) -> bool {
        self.0 == ALL_PROFILES
    }
}

/// Transport protocol of a port binding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(format!("unknown protocol '{other}' (expected tcp or udp)")),
        }
    }
}

/// Host address of a port binding as written in the manifest.
///
/// Either a literal IP address or the `${default_host_ip}` placeholder, which
/// defers to `global.default_host_ip` at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostIp {
    Literal(IpAddr),
    DefaultPlaceholder,
}

impl HostIp {
    /// Resolve against the manifest-wide default.
    pub fn resolve(self, default: IpAddr) -> IpAddr {
        match self {
            Self::Literal(ip) => ip,
            Self::DefaultPlaceholder => default,
        }
    }
}

impl From<IpAddr> for HostIp {
    fn from(ip: IpAddr) -> Self {
        Self::Literal(ip)
    }
}

impl fmt::Display for HostIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(ip) => write!(f, "{ip}"),
            Self::DefaultPlaceholder => f.write_str(DEFAULT_HOST_IP_PLACEHOLDER),
        }
    }
}

impl FromStr for HostIp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == DEFAULT_HOST_IP_PLACEHOLDER {
            return Ok(Self::DefaultPlaceholder);
        }
        trimmed.parse::<IpAddr>().map(Self::Literal).map_err(|_| {
            format!(
                "invalid host_ip '{trimmed}': expected an IP literal or \
                 {DEFAULT_HOST_IP_PLACEHOLDER}"
            )
        })
    }
}

impl Serialize for HostIp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HostIp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
