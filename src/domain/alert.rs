use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{AlertField, RcvtestError, Result};

/// Synthetic alert as submitted by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl Alert {
    pub fn new(labels: HashMap<String, String>, annotations: HashMap<String, String>) -> Self {
        Self {
            labels,
            annotations,
        }
    }
}

/// Ordered label set. Ordering keeps fingerprints and payloads stable no matter
/// how the caller's maps were iterated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Check every name against the label name grammar.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for name in self.0.keys() {
            if !is_valid_label_name(name) {
                return Err(format!("invalid name {:?}", name));
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Alert parameters handed to the delivery layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertParams {
    pub labels: LabelSet,
    pub annotations: LabelSet,
}

impl AlertParams {
    pub fn build(alert: &Alert) -> Result<Self> {
        let params = Self {
            labels: alert.labels.iter().collect(),
            annotations: alert.annotations.iter().collect(),
        };

        params
            .annotations
            .validate()
            .map_err(|reason| RcvtestError::InvalidAlertInput {
                field: AlertField::Annotations,
                reason,
            })?;
        params
            .labels
            .validate()
            .map_err(|reason| RcvtestError::InvalidAlertInput {
                field: AlertField::Labels,
                reason,
            })?;

        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(labels: &[(&str, &str)], annotations: &[(&str, &str)]) -> Alert {
        Alert::new(
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_label_name_grammar() {
        assert!(is_valid_label_name("alertname"));
        assert!(is_valid_label_name("_private"));
        assert!(is_valid_label_name("team_2"));
        assert!(!is_valid_label_name(""));
        assert!(!is_valid_label_name("2fast"));
        assert!(!is_valid_label_name("with-dash"));
        assert!(!is_valid_label_name("dotted.name"));
    }

    #[test]
    fn test_build_empty_alert() {
        let params = AlertParams::build(&Alert::default()).unwrap();
        assert!(params.labels.is_empty());
        assert!(params.annotations.is_empty());
    }

    #[test]
    fn test_build_copies_pairs() {
        let params = AlertParams::build(&alert(
            &[("alertname", "Test"), ("severity", "critical")],
            &[("summary", "disk full")],
        ))
        .unwrap();
        assert_eq!(params.labels.get("alertname"), Some("Test"));
        assert_eq!(params.labels.len(), 2);
        assert_eq!(params.annotations.get("summary"), Some("disk full"));
    }

    #[test]
    fn test_invalid_label_rejected() {
        let err = AlertParams::build(&alert(&[("bad-name", "x")], &[])).unwrap_err();
        match err {
            RcvtestError::InvalidAlertInput { field, reason } => {
                assert_eq!(field, AlertField::Labels);
                assert!(reason.contains("bad-name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_annotation_rejected() {
        let err = AlertParams::build(&alert(&[], &[("", "x")])).unwrap_err();
        assert!(matches!(
            err,
            RcvtestError::InvalidAlertInput {
                field: AlertField::Annotations,
                ..
            }
        ));
    }

    #[test]
    fn test_values_are_unrestricted() {
        let params =
            AlertParams::build(&alert(&[("msg", "ünïcødé / spaces & symbols")], &[])).unwrap();
        assert_eq!(params.labels.get("msg"), Some("ünïcødé / spaces & symbols"));
    }

    #[test]
    fn test_iteration_order_does_not_matter() {
        let a = alert(&[("a", "1"), ("b", "2"), ("c", "3")], &[]);
        let b = alert(&[("c", "3"), ("a", "1"), ("b", "2")], &[]);
        assert_eq!(
            AlertParams::build(&a).unwrap(),
            AlertParams::build(&b).unwrap()
        );
    }
}
