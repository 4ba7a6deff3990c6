//! Structured validation findings.
//!
//! Diagnostics carry data only; turning them into prose is left to callers.

use serde::{Deserialize, Serialize};
use stackplan_schema::{ProfileName, Protocol, ServiceName};
use std::fmt;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Identity of a host socket: two bindings with equal keys cannot coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BindingKey {
    pub host_ip: IpAddr,
    pub host_port: u16,
    pub protocol: Protocol,
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host_ip {
            IpAddr::V4(ip) => write!(f, "{ip}:{}/{}", self.host_port, self.protocol),
            IpAddr::V6(ip) => write!(f, "[{ip}]:{}/{}", self.host_port, self.protocol),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InactiveReason {
    Disabled,
    NotInProfile,
}

/// Which side of the two-way membership declared the relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredBy {
    /// The service lists the profile, the profile does not list the service.
    Service,
    /// The profile lists the service, the service names other profiles only.
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnknownDependency {
        service: ServiceName,
        dependency: ServiceName,
    },
    UnknownProfileMember {
        profile: ProfileName,
        service: ServiceName,
    },
    UnknownProxyService {
        service: ServiceName,
    },
    UnknownProfile {
        profile: ProfileName,
    },
    UnknownServiceProfile {
        service: ServiceName,
        profile: ProfileName,
    },
    /// `profile` is `None` for the manifest-wide scan that ignores enabled flags.
    PortConflict {
        key: BindingKey,
        services: Vec<ServiceName>,
        profile: Option<ProfileName>,
    },
    InactiveDependency {
        service: ServiceName,
        dependency: ServiceName,
        reason: InactiveReason,
        profile: ProfileName,
    },
    MembershipDisagreement {
        profile: ProfileName,
        service: ServiceName,
        declared_by: DeclaredBy,
    },
    ProxyWithoutPort {
        service: ServiceName,
    },
    EmptyPlan {
        profile: ProfileName,
    },
}

impl DiagnosticKind {
    /// Coarse grouping used for display and exit-code decisions.
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownDependency { .. }
            | Self::UnknownProfileMember { .. }
            | Self::UnknownProxyService { .. }
            | Self::UnknownProfile { .. }
            | Self::UnknownServiceProfile { .. } => "reference",
            Self::PortConflict { .. } => "port_conflict",
            Self::InactiveDependency { .. } => "dependency",
            Self::MembershipDisagreement { .. } => "membership",
            Self::ProxyWithoutPort { .. } | Self::EmptyPlan { .. } => "plan",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind) -> Self {
        Self { severity, kind }
    }

    pub fn error(kind: DiagnosticKind) -> Self {
        Self::new(Severity::Error, kind)
    }

    pub fn warning(kind: DiagnosticKind) -> Self {
        Self::new(Severity::Warning, kind)
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Services named by this finding, in a stable order.
    pub fn services(&self) -> Vec<&ServiceName> {
        match &self.kind {
            DiagnosticKind::UnknownDependency {
                service,
                dependency,
            }
            | DiagnosticKind::InactiveDependency {
                service,
                dependency,
                ..
            } => vec![service, dependency],
            DiagnosticKind::UnknownProfileMember { service, .. }
            | DiagnosticKind::UnknownProxyService { service }
            | DiagnosticKind::UnknownServiceProfile { service, .. }
            | DiagnosticKind::MembershipDisagreement { service, .. }
            | DiagnosticKind::ProxyWithoutPort { service } => vec![service],
            DiagnosticKind::PortConflict { services, .. } => services.iter().collect(),
            DiagnosticKind::UnknownProfile { .. } | DiagnosticKind::EmptyPlan { .. } => Vec::new(),
        }
    }
}

/// Ordered collection of diagnostics produced by one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        self.0.iter().any(Diagnostic::is_fatal)
    }

    pub fn fatal(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| !d.is_fatal())
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fatal = self.fatal().count();
        write!(f, "{fatal} fatal, {} total", self.0.len())
    }
}
