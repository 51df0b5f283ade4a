//! Structural diff between two schema snapshots.

use crate::error::{Result, SchemaError};
use crate::model::{
    ColumnModel, ForeignKeyBinding, ForeignKeyNaming, IndexModel, MAX_LENGTH, RelationshipModel,
    SchemaModel, TableModel, name_key,
};
use crate::validator::SchemaValidator;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    TableAdded,
    TableRemoved,
    TableModified,
    ColumnAdded,
    ColumnRemoved,
    ColumnModified,
    IndexAdded,
    IndexRemoved,
    IndexModified,
    RelationshipAdded,
    RelationshipRemoved,
    RelationshipModified,
}

impl ChangeType {
    pub const ALL: [ChangeType; 12] = [
        Self::TableAdded,
        Self::TableRemoved,
        Self::TableModified,
        Self::ColumnAdded,
        Self::ColumnRemoved,
        Self::ColumnModified,
        Self::IndexAdded,
        Self::IndexRemoved,
        Self::IndexModified,
        Self::RelationshipAdded,
        Self::RelationshipRemoved,
        Self::RelationshipModified,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TableAdded => "TableAdded",
            Self::TableRemoved => "TableRemoved",
            Self::TableModified => "TableModified",
            Self::ColumnAdded => "ColumnAdded",
            Self::ColumnRemoved => "ColumnRemoved",
            Self::ColumnModified => "ColumnModified",
            Self::IndexAdded => "IndexAdded",
            Self::IndexRemoved => "IndexRemoved",
            Self::IndexModified => "IndexModified",
            Self::RelationshipAdded => "RelationshipAdded",
            Self::RelationshipRemoved => "RelationshipRemoved",
            Self::RelationshipModified => "RelationshipModified",
        }
    }

    pub fn object_type(self) -> ObjectType {
        match self {
            Self::TableAdded | Self::TableRemoved | Self::TableModified => ObjectType::Table,
            Self::ColumnAdded | Self::ColumnRemoved | Self::ColumnModified => ObjectType::Column,
            Self::IndexAdded | Self::IndexRemoved | Self::IndexModified => ObjectType::Index,
            Self::RelationshipAdded | Self::RelationshipRemoved | Self::RelationshipModified => {
                ObjectType::Relationship
            }
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::TableRemoved | Self::ColumnRemoved => Severity::High,
            Self::TableModified | Self::ColumnModified | Self::RelationshipModified => {
                Severity::Medium
            }
            _ => Severity::Low,
        }
    }

    /// Removals counted as breaking: tables, columns and relationships.
    pub fn is_breaking(self) -> bool {
        matches!(
            self,
            Self::TableRemoved | Self::ColumnRemoved | Self::RelationshipRemoved
        )
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    Table,
    Column,
    Index,
    Relationship,
}

/// Risk tier of a change. Ordered so that sorting ascending puts the
/// low-risk changes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Severity {
    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Snapshot of the object a change applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SchemaObject {
    Table(TableModel),
    Column(ColumnModel),
    Index(IndexModel),
    Relationship(RelationshipModel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub object_type: ObjectType,
    /// `Table`, `Table.Column`, `Table.Index` or the relationship name.
    pub object_name: String,
    /// Owning table for column and index changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub details: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<SchemaObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<SchemaObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_binding: Option<ForeignKeyBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_binding: Option<ForeignKeyBinding>,
    /// Indexes of the owning table that cover a modified column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependent_indexes: Vec<String>,
}

impl SchemaChange {
    pub fn new(change_type: ChangeType, object_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            change_type,
            object_type: change_type.object_type(),
            object_name: object_name.into(),
            table: None,
            details: details.into(),
            severity: change_type.severity(),
            before: None,
            after: None,
            old_binding: None,
            new_binding: None,
            dependent_indexes: Vec::new(),
        }
    }

    fn in_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    fn with_before(mut self, object: SchemaObject) -> Self {
        self.before = Some(object);
        self
    }

    fn with_after(mut self, object: SchemaObject) -> Self {
        self.after = Some(object);
        self
    }

    /// Last segment of `object_name`, i.e. the column or index name.
    pub fn member_name(&self) -> &str {
        match &self.table {
            Some(_) => self
                .object_name
                .rsplit_once('.')
                .map(|(_, m)| m)
                .unwrap_or(&self.object_name),
            None => &self.object_name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatistics {
    pub total: usize,
    pub by_type: IndexMap<ChangeType, usize>,
    pub breaking_changes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub changes: Vec<SchemaChange>,
    pub statistics: ChangeStatistics,
}

impl ChangeSet {
    pub fn new(changes: Vec<SchemaChange>) -> Self {
        let mut by_type = IndexMap::new();
        for kind in ChangeType::ALL {
            let count = changes.iter().filter(|c| c.change_type == kind).count();
            if count > 0 {
                by_type.insert(kind, count);
            }
        }
        let breaking_changes = changes.iter().filter(|c| c.change_type.is_breaking()).count();
        Self {
            statistics: ChangeStatistics {
                total: changes.len(),
                by_type,
                breaking_changes,
            },
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn of_type(&self, kind: ChangeType) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter().filter(move |c| c.change_type == kind)
    }

    pub fn count(&self, kind: ChangeType) -> usize {
        self.statistics.by_type.get(&kind).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaComparer {
    naming: ForeignKeyNaming,
}

impl SchemaComparer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_naming(naming: ForeignKeyNaming) -> Self {
        Self { naming }
    }

    /// Diff two models after checking both validate without errors.
    pub fn compare(&self, old: &SchemaModel, new: &SchemaModel) -> Result<ChangeSet> {
        let validator = SchemaValidator::with_naming(self.naming.clone());
        for (side, model) in [("old", old), ("new", new)] {
            let result = validator.validate(model);
            if !result.is_valid {
                return Err(SchemaError::validation(side, result.errors));
            }
        }
        Ok(self.diff(old, new))
    }

    /// Diff two models without the validity precondition.
    pub fn diff(&self, old: &SchemaModel, new: &SchemaModel) -> ChangeSet {
        let mut changes = Vec::new();

        for table in &new.tables {
            match old.table(&table.name) {
                None => changes.push(
                    SchemaChange::new(
                        ChangeType::TableAdded,
                        &table.name,
                        format!("{} columns", table.columns.len()),
                    )
                    .with_after(SchemaObject::Table(table.clone())),
                ),
                Some(previous) => diff_table(previous, table, &mut changes),
            }
        }

        for table in &old.tables {
            if new.table(&table.name).is_none() {
                changes.push(
                    SchemaChange::new(
                        ChangeType::TableRemoved,
                        &table.name,
                        format!("{} columns", table.columns.len()),
                    )
                    .with_before(SchemaObject::Table(table.clone())),
                );
            }
        }

        self.diff_relationships(old, new, &mut changes);

        let set = ChangeSet::new(changes);
        tracing::debug!(
            changes = set.len(),
            breaking = set.statistics.breaking_changes,
            "compared schemas"
        );
        set
    }

    fn diff_relationships(&self, old: &SchemaModel, new: &SchemaModel, changes: &mut Vec<SchemaChange>) {
        let mut unmatched: IndexMap<(String, String), VecDeque<&RelationshipModel>> = IndexMap::new();
        for rel in &old.relationships {
            unmatched.entry(rel.pair_key()).or_default().push_back(rel);
        }

        for rel in &new.relationships {
            let previous = unmatched
                .get_mut(&rel.pair_key())
                .and_then(VecDeque::pop_front);
            match previous {
                None => {
                    let mut change = SchemaChange::new(
                        ChangeType::RelationshipAdded,
                        &rel.name,
                        format!("{} {} {}", rel.source_table, rel.relation_type, rel.target_table),
                    )
                    .with_after(SchemaObject::Relationship(rel.clone()));
                    change.new_binding = rel.binding(new, &self.naming);
                    changes.push(change);
                }
                Some(previous) => {
                    let deltas = relationship_deltas(previous, rel);
                    if !deltas.is_empty() {
                        let mut change = SchemaChange::new(
                            ChangeType::RelationshipModified,
                            &rel.name,
                            deltas.join("; "),
                        )
                        .with_before(SchemaObject::Relationship(previous.clone()))
                        .with_after(SchemaObject::Relationship(rel.clone()));
                        change.old_binding = previous.binding(old, &self.naming);
                        change.new_binding = rel.binding(new, &self.naming);
                        changes.push(change);
                    }
                }
            }
        }

        for rel in unmatched.into_values().flatten() {
            let mut change = SchemaChange::new(
                ChangeType::RelationshipRemoved,
                &rel.name,
                format!("{} {} {}", rel.source_table, rel.relation_type, rel.target_table),
            )
            .with_before(SchemaObject::Relationship(rel.clone()));
            change.old_binding = rel.binding(old, &self.naming);
            changes.push(change);
        }
    }
}

/// Convenience for `SchemaComparer::new().compare(old, new)`.
pub fn compare(old: &SchemaModel, new: &SchemaModel) -> Result<ChangeSet> {
    SchemaComparer::new().compare(old, new)
}

fn diff_table(old: &TableModel, new: &TableModel, changes: &mut Vec<SchemaChange>) {
    let qualified = |member: &str| format!("{}.{}", new.name, member);

    if old.description != new.description {
        changes.push(
            SchemaChange::new(
                ChangeType::TableModified,
                &new.name,
                delta("description", show(&old.description), show(&new.description)),
            )
            .with_before(SchemaObject::Table(old.clone()))
            .with_after(SchemaObject::Table(new.clone())),
        );
    }

    for column in &new.columns {
        match old.column(&column.name) {
            None => changes.push(
                SchemaChange::new(ChangeType::ColumnAdded, qualified(&column.name), column.type_display())
                    .in_table(&new.name)
                    .with_after(SchemaObject::Column(column.clone())),
            ),
            Some(previous) => {
                let deltas = column_deltas(previous, column);
                if !deltas.is_empty() {
                    let mut change = SchemaChange::new(
                        ChangeType::ColumnModified,
                        qualified(&column.name),
                        deltas.join("; "),
                    )
                    .in_table(&new.name)
                    .with_before(SchemaObject::Column(previous.clone()))
                    .with_after(SchemaObject::Column(column.clone()));
                    let key = name_key(&previous.name);
                    change.dependent_indexes = old
                        .indexes
                        .iter()
                        .filter(|i| i.columns.iter().any(|c| name_key(c) == key))
                        .map(|i| i.name.clone())
                        .collect();
                    changes.push(change);
                }
            }
        }
    }
    for column in &old.columns {
        if new.column(&column.name).is_none() {
            changes.push(
                SchemaChange::new(ChangeType::ColumnRemoved, qualified(&column.name), column.type_display())
                    .in_table(&new.name)
                    .with_before(SchemaObject::Column(column.clone())),
            );
        }
    }

    for index in &new.indexes {
        match old.index(&index.name) {
            None => changes.push(
                SchemaChange::new(
                    ChangeType::IndexAdded,
                    qualified(&index.name),
                    format!("({})", index.columns.join(", ")),
                )
                .in_table(&new.name)
                .with_after(SchemaObject::Index(index.clone())),
            ),
            Some(previous) => {
                let deltas = index_deltas(previous, index);
                if !deltas.is_empty() {
                    changes.push(
                        SchemaChange::new(
                            ChangeType::IndexModified,
                            qualified(&index.name),
                            deltas.join("; "),
                        )
                        .in_table(&new.name)
                        .with_before(SchemaObject::Index(previous.clone()))
                        .with_after(SchemaObject::Index(index.clone())),
                    );
                }
            }
        }
    }
    let kept: HashSet<String> = new.indexes.iter().map(|i| name_key(&i.name)).collect();
    for index in &old.indexes {
        if !kept.contains(&name_key(&index.name)) {
            changes.push(
                SchemaChange::new(
                    ChangeType::IndexRemoved,
                    qualified(&index.name),
                    format!("({})", index.columns.join(", ")),
                )
                .in_table(&new.name)
                .with_before(SchemaObject::Index(index.clone())),
            );
        }
    }
}

fn delta(field: &str, old: impl fmt::Display, new: impl fmt::Display) -> String {
    format!("{}: {} -> {}", field, old, new)
}

fn show<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

fn show_length(length: Option<i32>) -> String {
    match length {
        Some(MAX_LENGTH) => "max".to_string(),
        other => show(&other),
    }
}

fn column_deltas(old: &ColumnModel, new: &ColumnModel) -> Vec<String> {
    let mut deltas = Vec::new();
    if old.name != new.name {
        deltas.push(delta("name", &old.name, &new.name));
    }
    if old.data_type != new.data_type {
        deltas.push(delta("type", &old.data_type, &new.data_type));
    }
    if old.length != new.length {
        deltas.push(delta("length", show_length(old.length), show_length(new.length)));
    }
    if old.precision != new.precision {
        deltas.push(delta("precision", show(&old.precision), show(&new.precision)));
    }
    if old.scale != new.scale {
        deltas.push(delta("scale", show(&old.scale), show(&new.scale)));
    }
    if old.is_nullable != new.is_nullable {
        deltas.push(delta("nullable", old.is_nullable, new.is_nullable));
    }
    if old.default_value != new.default_value {
        deltas.push(delta("default", show(&old.default_value), show(&new.default_value)));
    }
    if old.is_primary_key != new.is_primary_key {
        deltas.push(delta("primaryKey", old.is_primary_key, new.is_primary_key));
    }
    if old.is_foreign_key != new.is_foreign_key {
        deltas.push(delta("foreignKey", old.is_foreign_key, new.is_foreign_key));
    }
    if old.description != new.description {
        deltas.push(delta("description", show(&old.description), show(&new.description)));
    }
    deltas
}

fn index_deltas(old: &IndexModel, new: &IndexModel) -> Vec<String> {
    let mut deltas = Vec::new();
    if old.columns != new.columns {
        deltas.push(delta(
            "columns",
            format!("({})", old.columns.join(", ")),
            format!("({})", new.columns.join(", ")),
        ));
    }
    if old.is_unique != new.is_unique {
        deltas.push(delta("unique", old.is_unique, new.is_unique));
    }
    if old.is_clustered != new.is_clustered {
        deltas.push(delta("clustered", old.is_clustered, new.is_clustered));
    }
    deltas
}

fn relationship_deltas(old: &RelationshipModel, new: &RelationshipModel) -> Vec<String> {
    let mut deltas = Vec::new();
    if old.relation_type != new.relation_type {
        deltas.push(delta("type", old.relation_type, new.relation_type));
    }
    if old.name != new.name {
        deltas.push(delta("name", &old.name, &new.name));
    }
    if old.source_column != new.source_column {
        deltas.push(delta("sourceColumn", show(&old.source_column), show(&new.source_column)));
    }
    if old.target_column != new.target_column {
        deltas.push(delta("targetColumn", show(&old.target_column), show(&new.target_column)));
    }
    if old.on_delete != new.on_delete {
        deltas.push(delta("onDelete", old.on_delete, new.on_delete));
    }
    if old.on_update != new.on_update {
        deltas.push(delta("onUpdate", old.on_update, new.on_update));
    }
    deltas
}
