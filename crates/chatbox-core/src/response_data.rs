use super::state::round2;
use super::state::ResponseRecord;

/// Collapses runs of consecutive records that share a `merge_sign_id`.
///
/// The later record supplies scalar fields, `running_time` and `total_points`
/// accumulate, and nested detail lists are concatenated and merged the same
/// way. Records without a sign id are kept as they are.
pub fn merge_response_data(records: &[ResponseRecord]) -> Vec<ResponseRecord> {
    let mut merged: Vec<ResponseRecord> = Vec::with_capacity(records.len());
    for record in records {
        let joins_last = merged
            .last()
            .is_some_and(|last| shares_merge_sign(last, record));
        if !joins_last {
            merged.push(record.clone());
        } else if let Some(last) = merged.last_mut() {
            let previous = std::mem::take(last);
            *last = merge_pair(previous, record.clone());
        }
    }
    merged
}

fn shares_merge_sign(left: &ResponseRecord, right: &ResponseRecord) -> bool {
    match (&left.merge_sign_id, &right.merge_sign_id) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn merge_pair(previous: ResponseRecord, current: ResponseRecord) -> ResponseRecord {
    let running_time = match (previous.running_time, current.running_time) {
        (None, None) => None,
        (left, right) => Some(round2(left.unwrap_or(0.0) + right.unwrap_or(0.0))),
    };
    let total_points = match (previous.total_points, current.total_points) {
        (None, None) => None,
        (left, right) => Some(left.unwrap_or(0.0) + right.unwrap_or(0.0)),
    };

    ResponseRecord {
        running_time,
        total_points,
        tool_detail: merge_details(previous.tool_detail, current.tool_detail),
        plugin_detail: merge_details(previous.plugin_detail, current.plugin_detail),
        loop_detail: merge_details(previous.loop_detail, current.loop_detail),
        child_detail: merge_details(previous.child_detail, current.child_detail),
        ..current
    }
}

fn merge_details(
    mut previous: Vec<ResponseRecord>,
    current: Vec<ResponseRecord>,
) -> Vec<ResponseRecord> {
    if current.is_empty() {
        return previous;
    }
    previous.extend(current);
    merge_response_data(&previous)
}

/// Every record followed by its nested tool, plugin, loop and child records,
/// depth first. Records keep their nested lists, and a record without an id
/// takes its `node_id`. Backs the "whole response" inspection view.
pub fn flatten_response_data(records: &[ResponseRecord]) -> Vec<ResponseRecord> {
    let mut flat = Vec::new();
    for record in records {
        push_flat(record, &mut flat);
    }
    flat
}

fn push_flat(record: &ResponseRecord, flat: &mut Vec<ResponseRecord>) {
    let mut entry = record.clone();
    if entry.id.is_empty() {
        entry.id = entry.node_id.clone();
    }
    flat.push(entry);
    for nested in record
        .tool_detail
        .iter()
        .chain(record.plugin_detail.iter())
        .chain(record.loop_detail.iter())
        .chain(record.child_detail.iter())
    {
        push_flat(nested, flat);
    }
}
