use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::time::Instant;

use crate::delta::Delta;

/// Placeholder for a field the resource does not carry.
pub const MISSING_VALUE: &str = "<none>";
/// Placeholder for a field that cannot be computed.
pub const NA_VALUE: &str = "n/a";
pub const ALL_NAMESPACES_LABEL: &str = "all";

pub fn is_missing(value: &str) -> bool {
    matches!(value.trim(), MISSING_VALUE | NA_VALUE)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Pods,
    Deployments,
    StatefulSets,
    DaemonSets,
    ReplicaSets,
    Jobs,
    CronJobs,
    Services,
    ConfigMaps,
    Secrets,
    ServiceAccounts,
    PersistentVolumeClaims,
    PersistentVolumes,
    Nodes,
    Namespaces,
    Events,
}

impl ResourceKind {
    pub const ALL: [Self; 16] = [
        Self::Pods,
        Self::Deployments,
        Self::StatefulSets,
        Self::DaemonSets,
        Self::ReplicaSets,
        Self::Jobs,
        Self::CronJobs,
        Self::Services,
        Self::ConfigMaps,
        Self::Secrets,
        Self::ServiceAccounts,
        Self::PersistentVolumeClaims,
        Self::PersistentVolumes,
        Self::Nodes,
        Self::Namespaces,
        Self::Events,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Pods => "Pods",
            Self::Deployments => "Deployments",
            Self::StatefulSets => "StatefulSets",
            Self::DaemonSets => "DaemonSets",
            Self::ReplicaSets => "ReplicaSets",
            Self::Jobs => "Jobs",
            Self::CronJobs => "CronJobs",
            Self::Services => "Services",
            Self::ConfigMaps => "ConfigMaps",
            Self::Secrets => "Secrets",
            Self::ServiceAccounts => "ServiceAccounts",
            Self::PersistentVolumeClaims => "PVC",
            Self::PersistentVolumes => "PersistentVolumes",
            Self::Nodes => "Nodes",
            Self::Namespaces => "Namespaces",
            Self::Events => "Events",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "po" | "pod" | "pods" => Some(Self::Pods),
            "deploy" | "dp" | "deployment" | "deployments" => Some(Self::Deployments),
            "sts" | "statefulset" | "statefulsets" => Some(Self::StatefulSets),
            "ds" | "daemonset" | "daemonsets" => Some(Self::DaemonSets),
            "rs" | "replicaset" | "replicasets" => Some(Self::ReplicaSets),
            "job" | "jobs" => Some(Self::Jobs),
            "cj" | "cronjob" | "cronjobs" => Some(Self::CronJobs),
            "svc" | "service" | "services" => Some(Self::Services),
            "cm" | "configmap" | "configmaps" => Some(Self::ConfigMaps),
            "sec" | "secret" | "secrets" => Some(Self::Secrets),
            "sa" | "serviceaccount" | "serviceaccounts" => Some(Self::ServiceAccounts),
            "pvc" | "persistentvolumeclaim" | "persistentvolumeclaims" => {
                Some(Self::PersistentVolumeClaims)
            }
            "pv" | "persistentvolume" | "persistentvolumes" => Some(Self::PersistentVolumes),
            "no" | "node" | "nodes" => Some(Self::Nodes),
            "ns" | "namespace" | "namespaces" => Some(Self::Namespaces),
            "ev" | "event" | "events" => Some(Self::Events),
            _ => None,
        }
    }

    pub fn short_token(self) -> &'static str {
        match self {
            Self::Pods => "po",
            Self::Deployments => "deploy",
            Self::StatefulSets => "sts",
            Self::DaemonSets => "ds",
            Self::ReplicaSets => "rs",
            Self::Jobs => "job",
            Self::CronJobs => "cj",
            Self::Services => "svc",
            Self::ConfigMaps => "cm",
            Self::Secrets => "sec",
            Self::ServiceAccounts => "sa",
            Self::PersistentVolumeClaims => "pvc",
            Self::PersistentVolumes => "pv",
            Self::Nodes => "no",
            Self::Namespaces => "ns",
            Self::Events => "ev",
        }
    }

    pub fn namespaced(self) -> bool {
        !matches!(
            self,
            Self::PersistentVolumes | Self::Nodes | Self::Namespaces
        )
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Scope {
    Namespace(String),
    AllNamespaces,
    NotNamespaced,
}

impl Scope {
    /// Narrows a namespace selection to what `kind` supports.
    pub fn for_kind(kind: ResourceKind, selection: &Scope) -> Self {
        if !kind.namespaced() {
            return Self::NotNamespaced;
        }
        match selection {
            Self::NotNamespaced => Self::AllNamespaces,
            other => other.clone(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::AllNamespaces)
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Namespace(namespace) => Some(namespace),
            _ => None,
        }
    }

    /// Index of the NAME column for rows rendered in this scope.
    pub fn name_column(&self) -> usize {
        if self.is_all() { 1 } else { 0 }
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Namespace(namespace) => write!(f, "{namespace}"),
            Self::AllNamespaces => write!(f, "{ALL_NAMESPACES_LABEL}"),
            Self::NotNamespaced => write!(f, "-"),
        }
    }
}

/// Fully qualified stable key for a resource.
pub fn fqn(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) if !namespace.is_empty() => format!("{namespace}/{name}"),
        _ => name.to_string(),
    }
}

pub fn split_fqn(key: &str) -> (Option<&str>, &str) {
    match key.split_once('/') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, key),
    }
}

/// Rebuilds the stable key of a rendered row from its leading cells.
pub fn key_from_fields(scope: &Scope, fields: &[String]) -> String {
    let cell = |index: usize| fields.get(index).map(|value| value.trim()).unwrap_or("");
    match scope {
        Scope::NotNamespaced => cell(0).to_string(),
        Scope::AllNamespaces => fqn(Some(cell(0)), cell(1)),
        Scope::Namespace(namespace) => fqn(Some(namespace), cell(0)),
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HeaderColumn {
    pub name: String,
    pub numeric: bool,
    pub time: bool,
}

impl HeaderColumn {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let time = name == "AGE";
        Self {
            name,
            numeric: false,
            time,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            numeric: true,
            ..Self::new(name)
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Header {
    pub columns: Vec<HeaderColumn>,
}

impl Header {
    pub fn new(columns: Vec<HeaderColumn>) -> Self {
        Self { columns }
    }

    pub fn from_names(names: &[&str]) -> Self {
        Self::new(names.iter().map(|name| HeaderColumn::new(*name)).collect())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn is_time(&self, index: usize) -> bool {
        self.columns.get(index).is_some_and(|column| column.time)
    }
}

pub type Row = Vec<String>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RowAction {
    Added,
    Modified,
    Unchanged,
    Deleted,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RowEvent {
    pub action: RowAction,
    pub fields: Row,
    pub deltas: Vec<Delta>,
}

impl RowEvent {
    pub fn new(action: RowAction, fields: Row) -> Self {
        let deltas = vec![Delta::None; fields.len()];
        Self {
            action,
            fields,
            deltas,
        }
    }

    pub fn with_deltas(fields: Row, deltas: Vec<Delta>) -> Self {
        debug_assert_eq!(fields.len(), deltas.len());
        Self {
            action: RowAction::Modified,
            fields,
            deltas,
        }
    }

    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }
}

pub type RowEvents = BTreeMap<String, RowEvent>;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableData {
    pub header: Header,
    pub rows: RowEvents,
    pub scope: Scope,
    pub refreshed_at: Option<DateTime<Local>>,
}

impl TableData {
    pub fn new(header: Header, scope: Scope) -> Self {
        Self {
            header,
            rows: RowEvents::new(),
            scope,
            refreshed_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Shallow derived copy sharing header and scope but no rows.
    pub fn empty_like(&self) -> Self {
        Self {
            header: self.header.clone(),
            rows: RowEvents::new(),
            scope: self.scope.clone(),
            refreshed_at: self.refreshed_at,
        }
    }
}

impl Default for TableData {
    fn default() -> Self {
        Self::new(Header::default(), Scope::NotNamespaced)
    }
}

/// Raw rows as returned by an accessor for one list call.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Snapshot {
    pub header: Header,
    pub rows: BTreeMap<String, Row>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlashLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
    pub at: Instant,
}

impl Flash {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Error, message)
    }

    fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Instant::now(),
        }
    }
}
