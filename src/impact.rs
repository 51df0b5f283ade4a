//! Classifies each change of a change set by its downstream impact.

use crate::compare::{ChangeSet, ChangeType, SchemaChange, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecommendedAction {
    DataMigrationRequired,
    DataValidation,
    ReferentialIntegrityCheck,
    NoImmediateAction,
}

impl RecommendedAction {
    pub fn description(self) -> &'static str {
        match self {
            Self::DataMigrationRequired => "data migration required",
            Self::DataValidation => "data validation",
            Self::ReferentialIntegrityCheck => "referential integrity check",
            Self::NoImmediateAction => "no immediate action required",
        }
    }

    pub fn for_change(kind: ChangeType) -> Self {
        match kind {
            ChangeType::TableRemoved | ChangeType::ColumnRemoved => Self::DataMigrationRequired,
            ChangeType::TableModified | ChangeType::ColumnModified => Self::DataValidation,
            ChangeType::RelationshipModified => Self::ReferentialIntegrityCheck,
            _ => Self::NoImmediateAction,
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactItem {
    pub change_type: ChangeType,
    pub object_name: String,
    pub details: String,
    pub severity: Severity,
    pub recommended_action: RecommendedAction,
}

impl ImpactItem {
    fn from_change(change: &SchemaChange) -> Self {
        Self {
            change_type: change.change_type,
            object_name: change.object_name.clone(),
            details: change.details.clone(),
            severity: change.severity,
            recommended_action: RecommendedAction::for_change(change.change_type),
        }
    }
}

impl fmt::Display for ImpactItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}): {}",
            self.change_type, self.object_name, self.details, self.recommended_action
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactAnalysis {
    pub breaking_changes: Vec<ImpactItem>,
    pub potential_issues: Vec<ImpactItem>,
    pub notifications: Vec<ImpactItem>,
}

impl ImpactAnalysis {
    pub fn has_breaking_changes(&self) -> bool {
        !self.breaking_changes.is_empty()
    }

    /// Highest severity among all classified changes.
    pub fn max_severity(&self) -> Option<Severity> {
        self.breaking_changes
            .iter()
            .chain(&self.potential_issues)
            .chain(&self.notifications)
            .map(|i| i.severity)
            .max()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImpactAnalyzer;

impl ImpactAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, changes: &ChangeSet) -> ImpactAnalysis {
        let mut analysis = ImpactAnalysis::default();
        for change in &changes.changes {
            let item = ImpactItem::from_change(change);
            match change.change_type {
                ChangeType::TableRemoved | ChangeType::ColumnRemoved => {
                    analysis.breaking_changes.push(item)
                }
                ChangeType::TableModified
                | ChangeType::ColumnModified
                | ChangeType::RelationshipModified => analysis.potential_issues.push(item),
                _ => analysis.notifications.push(item),
            }
        }

        tracing::debug!(
            breaking = analysis.breaking_changes.len(),
            issues = analysis.potential_issues.len(),
            notifications = analysis.notifications.len(),
            "analyzed impact"
        );
        analysis
    }
}

/// Convenience for `ImpactAnalyzer::new().analyze(changes)`.
pub fn analyze(changes: &ChangeSet) -> ImpactAnalysis {
    ImpactAnalyzer::new().analyze(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(kinds: &[ChangeType]) -> ChangeSet {
        ChangeSet::new(
            kinds
                .iter()
                .map(|k| SchemaChange::new(*k, format!("obj_{}", k), ""))
                .collect(),
        )
    }

    #[test]
    fn test_classification() {
        let analysis = analyze(&set(&[
            ChangeType::TableRemoved,
            ChangeType::ColumnModified,
            ChangeType::RelationshipModified,
            ChangeType::IndexAdded,
            ChangeType::RelationshipRemoved,
        ]));
        assert_eq!(analysis.breaking_changes.len(), 1);
        assert_eq!(
            analysis.breaking_changes[0].recommended_action,
            RecommendedAction::DataMigrationRequired
        );
        assert_eq!(analysis.potential_issues.len(), 2);
        assert_eq!(
            analysis.potential_issues[1].recommended_action,
            RecommendedAction::ReferentialIntegrityCheck
        );
        assert_eq!(analysis.notifications.len(), 2);
        assert_eq!(analysis.max_severity(), Some(Severity::High));
    }

    #[test]
    fn test_empty_change_set() {
        let analysis = analyze(&ChangeSet::default());
        assert!(!analysis.has_breaking_changes());
        assert_eq!(analysis.max_severity(), None);
    }

    #[test]
    fn test_item_display() {
        let analysis = analyze(&set(&[ChangeType::ColumnRemoved]));
        assert_eq!(
            analysis.breaking_changes[0].to_string(),
            "ColumnRemoved obj_ColumnRemoved (): data migration required"
        );
    }
}
