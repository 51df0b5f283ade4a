//! Orders a change set into executable migration steps.

use crate::compare::{ChangeSet, ChangeType, SchemaChange};
use crate::ddl::dialect::{BATCH_SEPARATOR, quote_ident, string_literal};
use crate::ddl::DdlGenerator;
use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Change-type groups in execution order. Constraints and indexes that
/// could block a change are removed before it and recreated after.
pub const GROUP_ORDER: [ChangeType; 12] = [
    ChangeType::RelationshipRemoved,
    ChangeType::IndexRemoved,
    ChangeType::TableAdded,
    ChangeType::ColumnAdded,
    ChangeType::TableModified,
    ChangeType::ColumnModified,
    ChangeType::ColumnRemoved,
    ChangeType::TableRemoved,
    ChangeType::IndexModified,
    ChangeType::IndexAdded,
    ChangeType::RelationshipModified,
    ChangeType::RelationshipAdded,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    Validation,
    Backup,
    Schema,
    Data,
    Index,
    Constraint,
}

impl StepType {
    fn for_group(kind: ChangeType) -> Self {
        match kind {
            ChangeType::IndexAdded | ChangeType::IndexRemoved | ChangeType::IndexModified => {
                Self::Index
            }
            ChangeType::RelationshipAdded
            | ChangeType::RelationshipRemoved
            | ChangeType::RelationshipModified => Self::Constraint,
            _ => Self::Schema,
        }
    }

    /// Steps whose commands change the database schema.
    pub fn is_ddl(self) -> bool {
        matches!(self, Self::Schema | Self::Index | Self::Constraint)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "Validation",
            Self::Backup => "Backup",
            Self::Schema => "Schema",
            Self::Data => "Data",
            Self::Index => "Index",
            Self::Constraint => "Constraint",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MigrationOptions {
    #[serde(alias = "allow_table_drop")]
    pub allow_table_drop: bool,
    #[serde(alias = "use_transaction")]
    pub use_transaction: bool,
    #[serde(alias = "create_backup_before_changes")]
    pub create_backup_before_changes: bool,
    /// Backup target. Defaults to `backups/<database>_<timestamp>.bak`.
    #[serde(alias = "backup_path")]
    pub backup_path: Option<String>,
    pub database: String,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            allow_table_drop: false,
            use_transaction: true,
            create_backup_before_changes: true,
            backup_path: None,
            database: "database".to_string(),
        }
    }
}

impl MigrationOptions {
    pub fn resolved_backup_path(&self) -> String {
        self.backup_path.clone().unwrap_or_else(|| {
            format!(
                "backups/{}_{}.bak",
                self.database,
                Utc::now().format("%Y%m%d%H%M%S")
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStep {
    pub order: usize,
    pub step_type: StepType,
    pub description: String,
    pub sql_commands: Vec<String>,
    pub is_reversible: bool,
    pub rollback_commands: Vec<String>,
}

impl MigrationStep {
    fn checkpoint(step_type: StepType, description: impl Into<String>) -> Self {
        Self {
            order: 0,
            step_type,
            description: description.into(),
            sql_commands: Vec::new(),
            is_reversible: true,
            rollback_commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    pub steps: Vec<MigrationStep>,
    /// Table drops left out because `allow_table_drop` was not set.
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
    pub use_transaction: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

impl MigrationPlan {
    pub fn ddl_steps(&self) -> impl Iterator<Item = &MigrationStep> {
        self.steps.iter().filter(|s| s.step_type.is_ddl())
    }

    pub fn is_reversible(&self) -> bool {
        self.steps.iter().all(|s| s.is_reversible)
    }

    /// The whole plan as one script with batch separators. Backups run
    /// outside the transaction.
    pub fn to_script(&self) -> String {
        let mut out = String::new();
        let batch = |out: &mut String, sql: &str| {
            out.push_str(sql);
            out.push('\n');
            out.push_str(BATCH_SEPARATOR);
            out.push_str("\n\n");
        };

        for step in self.steps.iter().filter(|s| s.step_type == StepType::Backup) {
            out.push_str(&format!("-- Step {}: {}\n", step.order, step.description));
            for sql in &step.sql_commands {
                batch(&mut out, sql);
            }
        }
        if self.use_transaction {
            batch(&mut out, "SET XACT_ABORT ON;");
            batch(&mut out, "BEGIN TRANSACTION;");
        }
        for step in self.steps.iter().filter(|s| s.step_type != StepType::Backup) {
            out.push_str(&format!("-- Step {}: {}\n", step.order, step.description));
            for sql in &step.sql_commands {
                batch(&mut out, sql);
            }
        }
        if self.use_transaction {
            batch(&mut out, "COMMIT TRANSACTION;");
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationPlanner {
    generator: DdlGenerator,
    options: MigrationOptions,
}

impl MigrationPlanner {
    pub fn new(options: MigrationOptions) -> Self {
        Self {
            generator: DdlGenerator::new(),
            options,
        }
    }

    pub fn with_generator(generator: DdlGenerator, options: MigrationOptions) -> Self {
        Self { generator, options }
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    pub fn plan(&self, changes: &ChangeSet) -> Result<MigrationPlan> {
        let mut plan = MigrationPlan {
            use_transaction: self.options.use_transaction,
            ..MigrationPlan::default()
        };

        plan.steps.push(MigrationStep::checkpoint(
            StepType::Validation,
            "Validate target database before migration",
        ));

        if self.options.create_backup_before_changes {
            let path = self.options.resolved_backup_path();
            let mut step = MigrationStep::checkpoint(StepType::Backup, format!("Back up database to {}", path));
            step.sql_commands.push(format!(
                "BACKUP DATABASE {} TO DISK = {} WITH INIT;",
                quote_ident(&self.options.database),
                string_literal(&path, true)
            ));
            plan.backup_path = Some(path);
            plan.steps.push(step);
        }

        for kind in GROUP_ORDER {
            let mut group: Vec<&SchemaChange> = changes.of_type(kind).collect();
            if kind == ChangeType::TableRemoved && !self.options.allow_table_drop {
                for change in group.drain(..) {
                    tracing::warn!(table = %change.object_name, "table drop skipped; allow_table_drop is off");
                    plan.skipped.push(change.object_name.clone());
                }
            }
            if group.is_empty() {
                continue;
            }
            group.sort_by_key(|c| c.severity);
            plan.steps.push(self.group_step(kind, &group, &mut plan.warnings)?);
        }

        plan.steps.push(data_step(changes));
        plan.steps.push(MigrationStep::checkpoint(
            StepType::Validation,
            "Verify schema after migration",
        ));

        for (i, step) in plan.steps.iter_mut().enumerate() {
            step.order = i + 1;
        }

        tracing::info!(
            steps = plan.steps.len(),
            skipped = plan.skipped.len(),
            reversible = plan.is_reversible(),
            "planned migration"
        );
        Ok(plan)
    }

    fn group_step(
        &self,
        kind: ChangeType,
        group: &[&SchemaChange],
        warnings: &mut Vec<String>,
    ) -> Result<MigrationStep> {
        let mut step = MigrationStep::checkpoint(
            StepType::for_group(kind),
            format!(
                "{}: {}",
                group_title(kind),
                group.iter().map(|c| c.object_name.as_str()).collect::<Vec<_>>().join(", ")
            ),
        );
        let mut rollbacks = Vec::with_capacity(group.len());
        for change in group {
            let ddl = self.generator.change_ddl(change, self.options.allow_table_drop)?;
            step.sql_commands.extend(ddl.statements);
            step.is_reversible &= ddl.reversible;
            warnings.extend(ddl.warnings);
            rollbacks.push(ddl.rollback);
        }
        if step.is_reversible {
            step.rollback_commands = rollbacks.into_iter().rev().flatten().collect();
        }
        Ok(step)
    }
}

fn group_title(kind: ChangeType) -> &'static str {
    match kind {
        ChangeType::RelationshipRemoved => "Drop foreign keys",
        ChangeType::IndexRemoved => "Drop indexes",
        ChangeType::TableAdded => "Create tables",
        ChangeType::ColumnAdded => "Add columns",
        ChangeType::TableModified => "Update tables",
        ChangeType::ColumnModified => "Alter columns",
        ChangeType::ColumnRemoved => "Drop columns",
        ChangeType::TableRemoved => "Drop tables",
        ChangeType::IndexModified => "Rebuild indexes",
        ChangeType::IndexAdded => "Create indexes",
        ChangeType::RelationshipModified => "Replace foreign keys",
        ChangeType::RelationshipAdded => "Add foreign keys",
    }
}

fn data_step(changes: &ChangeSet) -> MigrationStep {
    let review: Vec<&str> = changes
        .changes
        .iter()
        .filter(|c| matches!(c.change_type, ChangeType::ColumnModified | ChangeType::ColumnRemoved))
        .map(|c| c.object_name.as_str())
        .collect();
    let description = if review.is_empty() {
        "No data migration required".to_string()
    } else {
        format!("Review data in columns: {}", review.join(", "))
    };
    MigrationStep::checkpoint(StepType::Data, description)
}

/// Convenience for `MigrationPlanner::new(options).plan(changes)`.
pub fn plan(changes: &ChangeSet, options: MigrationOptions) -> Result<MigrationPlan> {
    MigrationPlanner::new(options).plan(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::SchemaComparer;
    use crate::model::{ColumnModel, DataType, RelationType, RelationshipModel, SchemaModel, TableModel};

    fn base() -> SchemaModel {
        SchemaModel::new()
            .with_table(
                TableModel::new("Customer")
                    .with_column(ColumnModel::new("Id", DataType::Int).primary_key()),
            )
            .with_table(
                TableModel::new("Order")
                    .with_column(ColumnModel::new("Id", DataType::Int).primary_key())
                    .with_column(ColumnModel::new("CustomerId", DataType::Int).foreign_key())
                    .with_column(ColumnModel::new("Memo", DataType::NVarChar).with_length(20)),
            )
            .with_relationship(RelationshipModel::new("Customer", "Order", RelationType::OneToMany))
    }

    fn options() -> MigrationOptions {
        MigrationOptions {
            backup_path: Some("backups/shop.bak".into()),
            database: "Shop".into(),
            ..MigrationOptions::default()
        }
    }

    fn changes(old: &SchemaModel, new: &SchemaModel) -> ChangeSet {
        SchemaComparer::new().diff(old, new)
    }

    #[test]
    fn test_table_drop_is_gated() {
        let old = base();
        let new = SchemaModel::new().with_table(old.tables[1].clone());
        let plan = plan(&changes(&old, &new), options()).unwrap();

        assert_eq!(plan.skipped, vec!["Customer"]);
        assert!(
            plan.ddl_steps()
                .flat_map(|s| &s.sql_commands)
                .all(|sql| !sql.contains("DROP TABLE"))
        );
        // the foreign key is still dropped
        assert_eq!(plan.ddl_steps().count(), 1);
    }

    #[test]
    fn test_table_drop_allowed() {
        let old = base();
        let new = SchemaModel::new().with_table(old.tables[1].clone());
        let opts = MigrationOptions {
            allow_table_drop: true,
            ..options()
        };
        let plan = plan(&changes(&old, &new), opts).unwrap();
        let drop = plan.steps.iter().find(|s| s.description == "Drop tables: Customer").unwrap();
        assert!(!drop.is_reversible);
        assert!(drop.rollback_commands.is_empty());
        assert!(!plan.is_reversible());
    }

    #[test]
    fn test_step_skeleton_and_order() {
        let old = base();
        let mut new = base();
        new.relationships.clear();
        new.tables[1].columns.push(ColumnModel::new("Note", DataType::NVarChar).with_length(100));
        new.tables[1].columns.retain(|c| c.name != "Memo");
        new.tables.push(
            TableModel::new("Tag").with_column(ColumnModel::new("Id", DataType::Int).primary_key()),
        );
        let plan = plan(&changes(&old, &new), options()).unwrap();

        let kinds: Vec<(usize, StepType)> = plan.steps.iter().map(|s| (s.order, s.step_type)).collect();
        assert_eq!(
            kinds,
            vec![
                (1, StepType::Validation),
                (2, StepType::Backup),
                (3, StepType::Constraint),
                (4, StepType::Schema),
                (5, StepType::Schema),
                (6, StepType::Schema),
                (7, StepType::Data),
                (8, StepType::Validation),
            ]
        );
        assert_eq!(plan.steps[3].description, "Create tables: Tag");
        assert_eq!(plan.steps[4].description, "Add columns: Order.Note");
        assert_eq!(plan.steps[5].description, "Drop columns: Order.Memo");
        assert_eq!(plan.steps[6].description, "Review data in columns: Order.Memo");
        assert_eq!(plan.backup_path.as_deref(), Some("backups/shop.bak"));
    }

    #[test]
    fn test_rollback_reverses_changes() {
        let old = base();
        let mut new = base();
        new.tables.push(TableModel::new("A").with_column(ColumnModel::new("Id", DataType::Int).primary_key()));
        new.tables.push(TableModel::new("B").with_column(ColumnModel::new("Id", DataType::Int).primary_key()));
        let plan = plan(&changes(&old, &new), options()).unwrap();
        let step = plan.steps.iter().find(|s| s.step_type == StepType::Schema).unwrap();
        assert!(step.is_reversible);
        assert!(step.rollback_commands[0].contains("DROP TABLE [dbo].[B]"));
        assert!(step.rollback_commands[1].contains("DROP TABLE [dbo].[A]"));
    }

    #[test]
    fn test_script_wraps_transaction() {
        let old = base();
        let mut new = base();
        new.tables[1].columns.push(ColumnModel::new("Note", DataType::NVarChar).with_length(100));
        let plan = plan(&changes(&old, &new), options()).unwrap();
        let script = plan.to_script();

        let backup = script.find("BACKUP DATABASE [Shop] TO DISK = N'backups/shop.bak'").unwrap();
        let begin = script.find("BEGIN TRANSACTION;").unwrap();
        let add = script.find("ALTER TABLE [dbo].[Order] ADD [Note]").unwrap();
        let commit = script.find("COMMIT TRANSACTION;").unwrap();
        assert!(backup < begin && begin < add && add < commit);
        assert!(script.contains("SET XACT_ABORT ON;"));
    }

    #[test]
    fn test_no_backup_no_transaction() {
        let opts = MigrationOptions {
            use_transaction: false,
            create_backup_before_changes: false,
            ..options()
        };
        let plan = plan(&ChangeSet::default(), opts).unwrap();
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[1].description, "No data migration required");
        assert!(!plan.to_script().contains("TRANSACTION"));
    }
}
