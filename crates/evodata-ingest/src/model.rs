// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request payloads accepted by the ingestion endpoints.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::IngestError;

/// One generation of a run, as posted to `/evolutionary_data`.
///
/// Missing or `null` fields decode to their zero value (`0`, `""`, `[]`,
/// `false`). Syntax errors and values of the wrong type are still rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunUpload {
    /// Caller-supplied run identifier.
    #[serde(deserialize_with = "null_as_default")]
    pub run_id: i64,
    /// Name of the dataset the run was trained on.
    #[serde(deserialize_with = "null_as_default")]
    pub dataset: String,
    /// Serialized trees of the generation, in population order.
    #[serde(deserialize_with = "null_as_default")]
    pub trees: Vec<String>,
    /// Attribute values; row `i` belongs to `trees[i]`, column `j` to attribute `j`.
    #[serde(deserialize_with = "null_as_default")]
    pub attribute_data: Vec<Vec<f64>>,
    /// Whether the run was executed with multithreading.
    #[serde(deserialize_with = "null_as_default")]
    pub is_multithreading_enabled: bool,
    /// One character per attribute column; `'0'` means the column is not recorded.
    #[serde(deserialize_with = "null_as_default")]
    pub metric_config: String,
    /// Elapsed time for the generation.
    #[serde(deserialize_with = "null_as_default")]
    pub time: f64,
}

/// Body of `/end_run`. A missing or `null` `run_id` decodes to `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndRun {
    /// Run to mark completed.
    #[serde(deserialize_with = "null_as_default")]
    pub run_id: i64,
}

/// Decode `null` as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single recorded attribute value of a tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeValue {
    /// Position of the attribute in the metric configuration.
    pub attribute_id: i64,
    /// Attribute value.
    pub value: f64,
}

impl RunUpload {
    /// Positions of the metric configuration that are recorded (not `'0'`).
    pub fn recorded_attributes(&self) -> impl Iterator<Item = usize> + '_ {
        self.metric_config
            .bytes()
            .enumerate()
            .filter(|(_, flag)| *flag != b'0')
            .map(|(position, _)| position)
    }

    /// Resolve the recorded attribute values for every tree.
    ///
    /// The result has one entry per tree, in tree order. Fails with
    /// [`IngestError::AttributeOutOfBounds`] when the attribute matrix lacks a
    /// row for a tree or a column for a recorded attribute.
    pub fn tree_attribute_values(&self) -> Result<Vec<Vec<AttributeValue>>, IngestError> {
        let recorded: Vec<usize> = self.recorded_attributes().collect();

        (0..self.trees.len())
            .map(|tree| {
                recorded
                    .iter()
                    .map(|&attribute| {
                        self.attribute_data
                            .get(tree)
                            .and_then(|row| row.get(attribute))
                            .map(|&value| AttributeValue {
                                attribute_id: attribute as i64,
                                value,
                            })
                            .ok_or(IngestError::AttributeOutOfBounds { tree, attribute })
                    })
                    .collect()
            })
            .collect()
    }
}
