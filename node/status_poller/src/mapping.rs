use std::collections::BTreeMap;

use crate::types::ResourceStatus;

/// Maps resource statuses to `up` gauge values keyed by resource ID: 1 if the status is exactly `healthy_status`,
/// 0 otherwise. Comparison is case-sensitive. If an ID is repeated, the last item wins.
pub fn map_statuses(items: &[ResourceStatus], healthy_status: &str) -> BTreeMap<String, u64> {
    items
        .iter()
        .map(|item| {
            let is_up = item.status == healthy_status;
            (item.id.clone(), u64::from(is_up))
        })
        .collect()
}
