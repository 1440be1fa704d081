use std::collections::BTreeSet;
use std::fmt;

use log::debug;
use thiserror::Error;

use super::model::{ChannelRecord, FieldValue, JoinedMeasurementSet, MeasurementSet};

// ---------------------------------------------------------------------------
// Policy, outcome and errors
// ---------------------------------------------------------------------------

/// What to do when a string field differs between files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Keep the value from the first file and report the discrepancy.
    #[default]
    Warn,
    /// Abort the merge on the first discrepancy.
    Strict,
}

/// A string field whose value in a later file differs from the joined value.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    /// Position of the offending file in the input list.
    pub file_index: usize,
    pub channel: String,
    pub field: String,
    pub expected: FieldValue,
    pub found: FieldValue,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "file #{} channel '{}' field '{}': expected {}, found {}",
            self.file_index, self.channel, self.field, self.expected, self.found
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub joined: JoinedMeasurementSet,
    /// Empty unless files disagreed on a string field (only under [`MergePolicy::Warn`]).
    pub discrepancies: Vec<Discrepancy>,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("nothing to merge: no measurement sets given")]
    Empty,
    #[error("file #{file_index}: channel set differs from the first file (missing {missing:?}, unexpected {unexpected:?})")]
    KeyMismatch {
        file_index: usize,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("file #{file_index} channel '{channel}': '{field}' is not a sequence and cannot be appended")]
    FieldShape {
        file_index: usize,
        channel: String,
        field: String,
    },
    #[error("inconsistent metadata: {0}")]
    Inconsistent(Discrepancy),
}

// ---------------------------------------------------------------------------
// Merger – folds measurement sets into one, in file order
// ---------------------------------------------------------------------------

/// Incremental merge state. The first set defines the schema; every later set
/// is appended to it with [`Merger::absorb`].
#[derive(Debug, Clone)]
pub struct Merger {
    joined: JoinedMeasurementSet,
    policy: MergePolicy,
    absorbed: usize,
    discrepancies: Vec<Discrepancy>,
}

impl Merger {
    pub fn new(first: MeasurementSet, policy: MergePolicy) -> Self {
        Self {
            joined: first,
            policy,
            absorbed: 1,
            discrepancies: Vec::new(),
        }
    }

    /// Append the time-indexed data of `next` and check its string fields.
    ///
    /// On error the merger is left partially updated and should be dropped.
    pub fn absorb(&mut self, next: &MeasurementSet) -> Result<(), MergeError> {
        let file_index = self.absorbed;
        self.check_channels(next, file_index)?;

        for (id, incoming) in &next.channels {
            let Some(joined) = self.joined.channels.get_mut(id) else {
                continue;
            };
            let found = merge_channel(joined, incoming, id, file_index)?;
            for d in found {
                if self.policy == MergePolicy::Strict {
                    return Err(MergeError::Inconsistent(d));
                }
                self.discrepancies.push(d);
            }
        }

        self.absorbed += 1;
        Ok(())
    }

    /// Number of sets folded in so far, including the first.
    pub fn absorbed(&self) -> usize {
        self.absorbed
    }

    pub fn finish(self) -> MergeOutcome {
        MergeOutcome {
            joined: self.joined,
            discrepancies: self.discrepancies,
        }
    }

    fn check_channels(&self, next: &MeasurementSet, file_index: usize) -> Result<(), MergeError> {
        let expected: BTreeSet<&str> = self.joined.channel_ids().collect();
        let actual: BTreeSet<&str> = next.channel_ids().collect();
        if expected == actual {
            return Ok(());
        }
        Err(MergeError::KeyMismatch {
            file_index,
            missing: expected.difference(&actual).map(|s| s.to_string()).collect(),
            unexpected: actual.difference(&expected).map(|s| s.to_string()).collect(),
        })
    }
}

/// Merge an ordered, non-empty list of measurement sets.
///
/// Sequences inside nested sub-records (e.g. `DP.time`, `DP.data`) are
/// concatenated in input order; nothing is sorted or de-duplicated, so files
/// must be given chronologically. Everything else keeps the first file's value.
pub fn join(sets: &[MeasurementSet], policy: MergePolicy) -> Result<MergeOutcome, MergeError> {
    let (first, rest) = sets.split_first().ok_or(MergeError::Empty)?;
    let mut merger = Merger::new(first.clone(), policy);
    for next in rest {
        merger.absorb(next)?;
    }
    Ok(merger.finish())
}

fn merge_channel(
    joined: &mut ChannelRecord,
    incoming: &ChannelRecord,
    channel: &str,
    file_index: usize,
) -> Result<Vec<Discrepancy>, MergeError> {
    let mut discrepancies = Vec::new();

    for (key, value) in &incoming.fields {
        let Some(current) = joined.fields.get_mut(key) else {
            debug!("file #{file_index} channel '{channel}': ignoring field '{key}' absent from the first file");
            continue;
        };

        match value {
            FieldValue::Text(text) => {
                if current.as_text() != Some(text.as_str()) {
                    discrepancies.push(Discrepancy {
                        file_index,
                        channel: channel.to_string(),
                        field: key.clone(),
                        expected: current.clone(),
                        found: value.clone(),
                    });
                }
            }
            FieldValue::Nested(sub) => {
                let FieldValue::Nested(current_sub) = current else {
                    continue;
                };
                for (sub_key, sub_value) in sub {
                    let Some(FieldValue::Sequence(target)) = current_sub.get_mut(sub_key) else {
                        continue;
                    };
                    let Some(items) = sub_value.as_sequence() else {
                        return Err(MergeError::FieldShape {
                            file_index,
                            channel: channel.to_string(),
                            field: format!("{key}.{sub_key}"),
                        });
                    };
                    target.extend_from_slice(items);
                }
            }
            _ => {}
        }
    }

    Ok(discrepancies)
}
