use ratatui::style::Color;

use crate::model::{ResourceKind, RowAction, RowEvent, Scope};

pub const STD_COLOR: Color = Color::White;
pub const ADD_COLOR: Color = Color::Rgb(125, 211, 252);
pub const MOD_COLOR: Color = Color::Rgb(52, 211, 153);
pub const PENDING_COLOR: Color = Color::Rgb(251, 191, 36);
pub const ERR_COLOR: Color = Color::Rgb(248, 113, 113);
pub const KILL_COLOR: Color = Color::Rgb(140, 156, 178);
pub const COMPLETED_COLOR: Color = Color::Rgb(100, 116, 139);

/// Maps a row's state to its foreground colour.
pub type ColorerFn = fn(&Scope, &RowEvent) -> Color;

pub fn colorer_for(kind: ResourceKind) -> ColorerFn {
    match kind {
        ResourceKind::Pods => pod_colorer,
        ResourceKind::Deployments | ResourceKind::StatefulSets => ready_ratio_colorer,
        ResourceKind::DaemonSets | ResourceKind::ReplicaSets => desired_ready_colorer,
        ResourceKind::Jobs => job_colorer,
        ResourceKind::CronJobs => cronjob_colorer,
        ResourceKind::Namespaces => namespace_colorer,
        ResourceKind::Nodes => node_colorer,
        ResourceKind::PersistentVolumeClaims => pvc_colorer,
        ResourceKind::PersistentVolumes => pv_colorer,
        ResourceKind::Events => event_colorer,
        ResourceKind::Services
        | ResourceKind::ConfigMaps
        | ResourceKind::Secrets
        | ResourceKind::ServiceAccounts => default_colorer,
    }
}

pub fn default_colorer(_scope: &Scope, event: &RowEvent) -> Color {
    match event.action {
        RowAction::Added => ADD_COLOR,
        RowAction::Modified => MOD_COLOR,
        RowAction::Deleted => KILL_COLOR,
        RowAction::Unchanged => STD_COLOR,
    }
}

/// Cell at `index` counted from NAME, shifted past the namespace column.
fn column<'a>(scope: &Scope, event: &'a RowEvent, index: usize) -> &'a str {
    event.field(index + scope.name_column()).trim()
}

fn ratio(value: &str) -> Option<(u64, u64)> {
    let (ready, total) = value.split_once('/')?;
    Some((ready.trim().parse().ok()?, total.trim().parse().ok()?))
}

fn pod_colorer(scope: &Scope, event: &RowEvent) -> Color {
    let status = column(scope, event, 2);
    match status {
        "Running" => match ratio(column(scope, event, 1)) {
            Some((ready, total)) if ready != total => ERR_COLOR,
            _ => default_colorer(scope, event),
        },
        "Completed" | "Succeeded" => COMPLETED_COLOR,
        "Terminating" => KILL_COLOR,
        "Pending" | "ContainerCreating" | "PodInitializing" => PENDING_COLOR,
        status if status.starts_with("Init:") && !status.contains("Err") => PENDING_COLOR,
        _ => ERR_COLOR,
    }
}

fn ready_ratio_colorer(scope: &Scope, event: &RowEvent) -> Color {
    match ratio(column(scope, event, 1)) {
        Some((ready, total)) if ready != total => ERR_COLOR,
        _ => default_colorer(scope, event),
    }
}

fn desired_ready_colorer(scope: &Scope, event: &RowEvent) -> Color {
    let desired = column(scope, event, 1);
    let ready = column(scope, event, 3);
    if desired != ready {
        return ERR_COLOR;
    }
    default_colorer(scope, event)
}

fn job_colorer(scope: &Scope, event: &RowEvent) -> Color {
    match ratio(column(scope, event, 1)) {
        Some((done, total)) if done == total => COMPLETED_COLOR,
        _ => default_colorer(scope, event),
    }
}

fn cronjob_colorer(scope: &Scope, event: &RowEvent) -> Color {
    if column(scope, event, 2) == "true" {
        return COMPLETED_COLOR;
    }
    default_colorer(scope, event)
}

fn namespace_colorer(scope: &Scope, event: &RowEvent) -> Color {
    if column(scope, event, 1) == "Terminating" {
        return KILL_COLOR;
    }
    default_colorer(scope, event)
}

fn node_colorer(scope: &Scope, event: &RowEvent) -> Color {
    let status = column(scope, event, 1);
    if !status.split(',').any(|part| part == "Ready") {
        return ERR_COLOR;
    }
    if status.contains("SchedulingDisabled") {
        return PENDING_COLOR;
    }
    default_colorer(scope, event)
}

fn pvc_colorer(scope: &Scope, event: &RowEvent) -> Color {
    match column(scope, event, 1) {
        "Bound" => default_colorer(scope, event),
        "Pending" => PENDING_COLOR,
        _ => ERR_COLOR,
    }
}

fn pv_colorer(scope: &Scope, event: &RowEvent) -> Color {
    match column(scope, event, 4) {
        "Released" | "Failed" => ERR_COLOR,
        "Available" => PENDING_COLOR,
        _ => default_colorer(scope, event),
    }
}

fn event_colorer(scope: &Scope, event: &RowEvent) -> Color {
    if column(scope, event, 1) == "Warning" {
        return ERR_COLOR;
    }
    default_colorer(scope, event)
}

#[cfg(test)]
mod tests {
    use super::{
        ADD_COLOR, COMPLETED_COLOR, ERR_COLOR, KILL_COLOR, MOD_COLOR, PENDING_COLOR, STD_COLOR,
        colorer_for, default_colorer,
    };
    use crate::model::{ResourceKind, RowAction, RowEvent, Scope};

    fn event(action: RowAction, fields: &[&str]) -> RowEvent {
        RowEvent::new(action, fields.iter().map(|field| field.to_string()).collect())
    }

    #[test]
    fn default_colorer_follows_row_action() {
        let scope = Scope::NotNamespaced;
        assert_eq!(default_colorer(&scope, &event(RowAction::Added, &["a"])), ADD_COLOR);
        assert_eq!(default_colorer(&scope, &event(RowAction::Modified, &["a"])), MOD_COLOR);
        assert_eq!(default_colorer(&scope, &event(RowAction::Deleted, &["a"])), KILL_COLOR);
        assert_eq!(default_colorer(&scope, &event(RowAction::Unchanged, &["a"])), STD_COLOR);
    }

    #[test]
    fn pod_colorer_reads_status_and_readiness() {
        let colorer = colorer_for(ResourceKind::Pods);
        let scope = Scope::Namespace("ns".to_string());
        let running = event(RowAction::Unchanged, &["p", "1/1", "Running", "0"]);
        assert_eq!(colorer(&scope, &running), STD_COLOR);
        let not_ready = event(RowAction::Unchanged, &["p", "0/1", "Running", "0"]);
        assert_eq!(colorer(&scope, &not_ready), ERR_COLOR);
        let crashing = event(RowAction::Unchanged, &["p", "0/1", "CrashLoopBackOff", "4"]);
        assert_eq!(colorer(&scope, &crashing), ERR_COLOR);
        let done = event(RowAction::Unchanged, &["p", "0/1", "Completed", "0"]);
        assert_eq!(colorer(&scope, &done), COMPLETED_COLOR);
    }

    #[test]
    fn namespace_column_shifts_lookups() {
        let colorer = colorer_for(ResourceKind::Pods);
        let pending = event(RowAction::Unchanged, &["ns", "p", "0/1", "Pending", "0"]);
        assert_eq!(colorer(&Scope::AllNamespaces, &pending), PENDING_COLOR);

        let colorer = colorer_for(ResourceKind::Events);
        let warning = event(RowAction::Added, &["ns", "e", "Warning", "BackOff"]);
        assert_eq!(colorer(&Scope::AllNamespaces, &warning), ERR_COLOR);
    }

    #[test]
    fn cluster_scoped_colorers() {
        let scope = Scope::NotNamespaced;
        let node = colorer_for(ResourceKind::Nodes);
        assert_eq!(
            node(&scope, &event(RowAction::Unchanged, &["n1", "NotReady"])),
            ERR_COLOR
        );
        assert_eq!(
            node(&scope, &event(RowAction::Unchanged, &["n1", "Ready"])),
            STD_COLOR
        );
        let namespace = colorer_for(ResourceKind::Namespaces);
        assert_eq!(
            namespace(&scope, &event(RowAction::Unchanged, &["old", "Terminating"])),
            KILL_COLOR
        );
    }
}
