use chrono::Local;
use std::collections::BTreeMap;

use crate::delta::{Delta, delta};
use crate::model::{Header, Row, RowAction, RowEvent, Scope, Snapshot, TableData};

/// Turns successive raw snapshots into identity-stable rows.
///
/// Only the raw fields of the last reconciled snapshot are retained. A failed
/// fetch must not reach `reconcile`; the caller keeps its last good table.
#[derive(Debug, Default)]
pub struct Reconciler {
    previous: Option<BTreeMap<String, Row>>,
}

impl Reconciler {
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn reconcile(&mut self, scope: &Scope, snapshot: Snapshot) -> TableData {
        let Snapshot { header, rows } = snapshot;
        let mut data = TableData::new(header, scope.clone());
        data.refreshed_at = Some(Local::now());

        let previous = self.previous.take().unwrap_or_default();
        for (key, fields) in &rows {
            let event = match previous.get(key) {
                Some(old) => diff_row(&data.header, old, fields),
                None => RowEvent::new(RowAction::Added, fields.clone()),
            };
            data.rows.insert(key.clone(), event);
        }

        self.previous = Some(rows);
        data
    }
}

fn diff_row(header: &Header, old: &Row, new: &Row) -> RowEvent {
    if old.len() != new.len() {
        return RowEvent::new(RowAction::Added, new.clone());
    }

    let deltas = old
        .iter()
        .zip(new.iter())
        .enumerate()
        .map(|(index, (old, new))| {
            if header.is_time(index) {
                Delta::None
            } else {
                delta(old, new)
            }
        })
        .collect::<Vec<_>>();

    if deltas.iter().all(|delta| delta.is_none()) {
        return RowEvent::new(RowAction::Unchanged, new.clone());
    }
    RowEvent::with_deltas(new.clone(), deltas)
}

/// Adds a synthetic row after reconciliation. Fields are padded or cut to the
/// header length.
pub fn inject(data: &mut TableData, key: &str, fields: Row) {
    let mut fields = fields;
    fields.resize(data.header.len(), String::new());
    data.rows
        .insert(key.to_string(), RowEvent::new(RowAction::Unchanged, fields));
}
