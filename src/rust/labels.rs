use std::collections::{BTreeSet, HashMap};

use crate::error::{Result, SpendcatError};

/// Bidirectional mapping between category names and dense class indices.
///
/// Indices follow the sorted order of the distinct labels seen at fit time.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCodec {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelCodec {
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let distinct: BTreeSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
        if distinct.is_empty() {
            return Err(SpendcatError::EmptyTrainingSet);
        }
        Self::from_classes(distinct.into_iter().map(String::from).collect())
    }

    /// Restores a codec from its class list, which must be sorted and distinct.
    pub fn from_classes(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(SpendcatError::EmptyTrainingSet);
        }
        if classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SpendcatError::ArtifactMismatch(
                "label codec classes are not sorted and distinct".into(),
            ));
        }
        let index = classes
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        Ok(Self { classes, index })
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| SpendcatError::UnknownLabel(label.to_string()))
    }

    /// Encodes every label, failing on the first one not seen at fit time.
    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels.iter().map(|l| self.encode(l.as_ref())).collect()
    }

    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(SpendcatError::IndexOutOfRange {
                index,
                num_classes: self.classes.len(),
            })
    }

    /// Class names aligned with class indices
    pub fn class_names(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
