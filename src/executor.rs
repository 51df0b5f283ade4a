//! Database execution boundary and the runner that applies a migration
//! plan through it.

use crate::error::{Result, SchemaError};
use crate::planner::{MigrationPlan, MigrationStep, StepType};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Named parameters bound to a statement, e.g. `@schema`.
pub type Params = IndexMap<String, serde_json::Value>;
/// One result row keyed by column name.
pub type Row = IndexMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ExecutorError(pub String);

/// Connection to the target database. The crate never opens connections
/// itself; callers provide an implementation.
pub trait DatabaseExecutor {
    /// Run a statement and return the number of rows affected.
    fn execute_non_query(&mut self, sql: &str, params: &Params) -> Result<u64, ExecutorError>;

    fn execute_query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, ExecutorError>;

    /// Write a full backup of the database to `path`.
    fn backup(&mut self, path: &str) -> Result<(), ExecutorError>;
}

impl<E: DatabaseExecutor + ?Sized> DatabaseExecutor for &mut E {
    fn execute_non_query(&mut self, sql: &str, params: &Params) -> Result<u64, ExecutorError> {
        (**self).execute_non_query(sql, params)
    }

    fn execute_query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, ExecutorError> {
        (**self).execute_query(sql, params)
    }

    fn backup(&mut self, path: &str) -> Result<(), ExecutorError> {
        (**self).backup(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Orders of the steps that ran, checkpoints included.
    pub steps_run: Vec<usize>,
    pub statements_executed: usize,
    pub rows_affected: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct MigrationRunner<E> {
    executor: E,
}

impl<E: DatabaseExecutor> MigrationRunner<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    /// Apply `plan` step by step. On failure the work done so far is undone:
    /// by `ROLLBACK` inside a transaction, otherwise by replaying the
    /// rollback commands of the failing step (when some of its statements
    /// ran) and then of completed steps in reverse order.
    pub fn run(&mut self, plan: &MigrationPlan) -> Result<RunReport> {
        let mut report = RunReport {
            steps_run: Vec::new(),
            statements_executed: 0,
            rows_affected: 0,
            backup_path: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        let mut in_transaction = false;
        let mut completed: Vec<&MigrationStep> = Vec::new();

        for step in &plan.steps {
            match step.step_type {
                StepType::Validation | StepType::Data => {
                    tracing::info!(step = step.order, "{}", step.description);
                }
                StepType::Backup => {
                    let path = plan.backup_path.clone().unwrap_or_default();
                    self.executor
                        .backup(&path)
                        .map_err(|e| execution(step, e))?;
                    tracing::info!(step = step.order, path = %path, "backup written");
                    report.backup_path = Some(path);
                }
                StepType::Schema | StepType::Index | StepType::Constraint => {
                    if plan.use_transaction && !in_transaction {
                        self.exec("BEGIN TRANSACTION;").map_err(|e| execution(step, e))?;
                        in_transaction = true;
                    }
                    for (done, sql) in step.sql_commands.iter().enumerate() {
                        match self.exec(sql) {
                            Ok(rows) => {
                                report.statements_executed += 1;
                                report.rows_affected += rows;
                            }
                            Err(e) => {
                                tracing::warn!(step = step.order, error = %e, "migration step failed");
                                let partial = (done > 0).then_some(step);
                                self.recover(in_transaction, partial, &completed);
                                return Err(execution(step, e));
                            }
                        }
                    }
                    completed.push(step);
                }
            }
            report.steps_run.push(step.order);
        }

        if in_transaction {
            if let Err(e) = self.exec("COMMIT TRANSACTION;") {
                self.recover(true, None, &completed);
                return Err(SchemaError::Execution {
                    step: plan.steps.len(),
                    message: e.to_string(),
                });
            }
        }

        report.finished_at = Utc::now();
        tracing::info!(
            steps = report.steps_run.len(),
            statements = report.statements_executed,
            "migration applied"
        );
        Ok(report)
    }

    fn exec(&mut self, sql: &str) -> Result<u64, ExecutorError> {
        self.executor.execute_non_query(sql, &Params::new())
    }

    fn recover(
        &mut self,
        in_transaction: bool,
        partial: Option<&MigrationStep>,
        completed: &[&MigrationStep],
    ) {
        if in_transaction {
            tracing::warn!("rolling back transaction");
            if let Err(e) = self.exec("ROLLBACK TRANSACTION;") {
                tracing::warn!(error = %e, "rollback failed");
            }
            return;
        }

        for step in partial.into_iter().chain(completed.iter().rev().copied()) {
            if !step.is_reversible {
                tracing::warn!(step = step.order, "step is not reversible; stopping rollback");
                return;
            }
            tracing::warn!(step = step.order, "reverting step");
            for sql in &step.rollback_commands {
                if let Err(e) = self.exec(sql) {
                    tracing::warn!(step = step.order, error = %e, "rollback command failed");
                }
            }
        }
    }
}

fn execution(step: &MigrationStep, err: ExecutorError) -> SchemaError {
    SchemaError::Execution {
        step: step.order,
        message: err.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compare::SchemaComparer;
    use crate::model::{ColumnModel, DataType, SchemaModel, TableModel};
    use crate::planner::{MigrationOptions, MigrationPlanner};

    /// Records every statement; fails any statement containing `fail_on`.
    #[derive(Default)]
    pub(crate) struct RecordingExecutor {
        pub statements: Vec<String>,
        pub backups: Vec<String>,
        pub fail_on: Option<String>,
        pub rows: Vec<Row>,
    }

    impl DatabaseExecutor for RecordingExecutor {
        fn execute_non_query(&mut self, sql: &str, _params: &Params) -> Result<u64, ExecutorError> {
            self.statements.push(sql.to_string());
            match &self.fail_on {
                Some(needle) if sql.contains(needle.as_str()) => {
                    Err(ExecutorError(format!("cannot run: {}", needle)))
                }
                _ => Ok(1),
            }
        }

        fn execute_query(&mut self, sql: &str, _params: &Params) -> Result<Vec<Row>, ExecutorError> {
            self.statements.push(sql.to_string());
            Ok(self.rows.clone())
        }

        fn backup(&mut self, path: &str) -> Result<(), ExecutorError> {
            self.backups.push(path.to_string());
            Ok(())
        }
    }

    fn plan(use_transaction: bool) -> MigrationPlan {
        let old = SchemaModel::new().with_table(
            TableModel::new("Order").with_column(ColumnModel::new("Id", DataType::Int).primary_key()),
        );
        let mut new = old.clone();
        new.tables[0].columns.push(ColumnModel::new("Note", DataType::NVarChar).with_length(100));
        new.tables.push(
            TableModel::new("Tag").with_column(ColumnModel::new("Id", DataType::Int).primary_key()),
        );
        let changes = SchemaComparer::new().diff(&old, &new);
        MigrationPlanner::new(MigrationOptions {
            use_transaction,
            backup_path: Some("backups/shop.bak".into()),
            ..MigrationOptions::default()
        })
        .plan(&changes)
        .unwrap()
    }

    #[test]
    fn test_run_in_transaction() {
        let mut runner = MigrationRunner::new(RecordingExecutor::default());
        let report = runner.run(&plan(true)).unwrap();
        let exec = runner.into_inner();

        assert_eq!(exec.backups, vec!["backups/shop.bak"]);
        assert_eq!(exec.statements.first().unwrap(), "BEGIN TRANSACTION;");
        assert_eq!(exec.statements.last().unwrap(), "COMMIT TRANSACTION;");
        assert_eq!(report.statements_executed, 2);
        assert_eq!(report.steps_run.len(), 6);
    }

    #[test]
    fn test_failure_rolls_back_transaction() {
        let exec = RecordingExecutor {
            fail_on: Some("[Note]".into()),
            ..RecordingExecutor::default()
        };
        let mut runner = MigrationRunner::new(exec);
        let err = runner.run(&plan(true)).unwrap_err();
        assert!(matches!(err, SchemaError::Execution { step: 4, .. }));
        let exec = runner.into_inner();
        assert_eq!(exec.statements.last().unwrap(), "ROLLBACK TRANSACTION;");
    }

    #[test]
    fn test_failure_replays_rollback_commands() {
        let exec = RecordingExecutor {
            fail_on: Some("[Note]".into()),
            ..RecordingExecutor::default()
        };
        let mut runner = MigrationRunner::new(exec);
        assert!(runner.run(&plan(false)).is_err());
        let exec = runner.into_inner();
        assert_eq!(
            exec.statements.last().unwrap(),
            "IF OBJECT_ID(N'[dbo].[Tag]', N'U') IS NOT NULL DROP TABLE [dbo].[Tag];"
        );
        assert!(!exec.statements.iter().any(|s| s.contains("TRANSACTION")));
    }

    fn step(order: usize, sql: &[&str], rollback: &[&str]) -> MigrationStep {
        MigrationStep {
            order,
            step_type: StepType::Index,
            description: format!("step {}", order),
            sql_commands: sql.iter().map(|s| s.to_string()).collect(),
            is_reversible: true,
            rollback_commands: rollback.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_failure_mid_step_reverts_that_step() {
        let plan = MigrationPlan {
            steps: vec![
                step(1, &["CREATE TABLE [dbo].[Tag] ([Id] INT);"], &["DROP TABLE [dbo].[Tag];"]),
                step(
                    2,
                    &["DROP INDEX [IX_Tag] ON [dbo].[Tag];", "CREATE INDEX [IX_Tag_New] ON [dbo].[Tag] ([Id]);"],
                    &["DROP INDEX [IX_Tag_New] ON [dbo].[Tag];", "CREATE INDEX [IX_Tag] ON [dbo].[Tag] ([Id]);"],
                ),
            ],
            ..MigrationPlan::default()
        };
        let exec = RecordingExecutor {
            fail_on: Some("IX_Tag_New] ON [dbo].[Tag] ([Id])".into()),
            ..RecordingExecutor::default()
        };
        let mut runner = MigrationRunner::new(exec);
        let err = runner.run(&plan).unwrap_err();
        assert!(matches!(err, SchemaError::Execution { step: 2, .. }));

        let exec = runner.into_inner();
        assert_eq!(
            exec.statements[3..],
            [
                "DROP INDEX [IX_Tag_New] ON [dbo].[Tag];",
                "CREATE INDEX [IX_Tag] ON [dbo].[Tag] ([Id]);",
                "DROP TABLE [dbo].[Tag];",
            ]
        );
    }

    #[test]
    fn test_failure_on_first_statement_skips_that_step() {
        let plan = MigrationPlan {
            steps: vec![
                step(1, &["CREATE TABLE [dbo].[Tag] ([Id] INT);"], &["DROP TABLE [dbo].[Tag];"]),
                step(2, &["ALTER TABLE [dbo].[Tag] ADD [Name] INT;"], &["ALTER TABLE [dbo].[Tag] DROP COLUMN [Name];"]),
            ],
            ..MigrationPlan::default()
        };
        let exec = RecordingExecutor {
            fail_on: Some("ADD [Name]".into()),
            ..RecordingExecutor::default()
        };
        let mut runner = MigrationRunner::new(exec);
        assert!(runner.run(&plan).is_err());
        let exec = runner.into_inner();
        assert_eq!(exec.statements.len(), 3);
        assert_eq!(exec.statements[2], "DROP TABLE [dbo].[Tag];");
    }
}
