use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshot::Snapshot;

/// Differing values of one top-level field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub left: Value,
    pub right: Value,
}

/// Field-wise diff over the top-level fields present in both snapshots.
pub fn diff_snapshots(left: &Snapshot, right: &Snapshot) -> BTreeMap<String, FieldDiff> {
    let (Value::Object(left), Value::Object(right)) = (left.to_document(), right.to_document())
    else {
        return BTreeMap::new();
    };

    left.into_iter()
        .filter_map(|(field, left_value)| {
            let right_value = right.get(&field)?;
            (left_value != *right_value).then(|| {
                (
                    field,
                    FieldDiff {
                        left: left_value,
                        right: right_value.clone(),
                    },
                )
            })
        })
        .collect()
}
