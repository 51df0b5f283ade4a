//! In-memory schema model shared by every stage of the pipeline.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length sentinel meaning `max` for variable-length string and binary types.
pub const MAX_LENGTH: i32 = -1;

/// Case-insensitive lookup key for table, column and index names.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaModel {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub tables: Vec<TableModel>,
    pub relationships: Vec<RelationshipModel>,
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

impl Default for SchemaModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaModel {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: "1.0".to_string(),
            created_at: now,
            modified_at: now,
            tables: Vec::new(),
            relationships: Vec::new(),
            metadata: IndexMap::new(),
        }
    }

    pub fn with_table(mut self, table: TableModel) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipModel) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Find a table by name, ignoring case.
    pub fn table(&self, name: &str) -> Option<&TableModel> {
        let key = name_key(name);
        self.tables.iter().find(|t| name_key(&t.name) == key)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableModel> {
        let key = name_key(name);
        self.tables.iter_mut().find(|t| name_key(&t.name) == key)
    }

    /// Structural equality: tables, columns, indexes and relationships.
    /// Timestamps, version and metadata are not compared.
    pub fn same_structure(&self, other: &SchemaModel) -> bool {
        self.tables == other.tables && self.relationships == other.relationships
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub columns: Vec<ColumnModel>,
    #[serde(default)]
    pub indexes: Vec<IndexModel>,
}

impl TableModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_column(mut self, column: ColumnModel) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: IndexModel) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnModel> {
        let key = name_key(name);
        self.columns.iter().find(|c| name_key(&c.name) == key)
    }

    pub fn index(&self, name: &str) -> Option<&IndexModel> {
        let key = name_key(name);
        self.indexes.iter().find(|i| name_key(&i.name) == key)
    }

    pub fn primary_key_columns(&self) -> Vec<&ColumnModel> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }

    pub fn has_clustered_index(&self) -> bool {
        self.indexes.iter().any(|i| i.is_clustered)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnModel {
    pub name: String,
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnModel {
    /// A nullable column with no size parameters.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            length: None,
            precision: None,
            scale: None,
            is_nullable: true,
            is_primary_key: false,
            is_foreign_key: false,
            default_value: None,
            description: None,
        }
    }

    /// Marks the column as primary key, which also makes it non-nullable.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn foreign_key(mut self) -> Self {
        self.is_foreign_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn with_length(mut self, length: i32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: u32, scale: Option<u32>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Type with its parameters as written in notation, e.g. `nvarchar(max)`
    /// or `decimal(18,2)`.
    pub fn type_display(&self) -> String {
        let base = self.data_type.name();
        if let Some(length) = self.length {
            if length == MAX_LENGTH {
                return format!("{}(max)", base);
            }
            return format!("{}({})", base, length);
        }
        match (self.precision, self.scale) {
            (Some(p), Some(s)) => format!("{}({},{})", base, p, s),
            (Some(p), None) => format!("{}({})", base, p),
            _ => base.to_string(),
        }
    }
}

/// Column data types of the target dialect. Names outside the known set
/// are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Bit,
    Decimal,
    Numeric,
    Money,
    SmallMoney,
    Float,
    Real,
    Char,
    VarChar,
    NChar,
    NVarChar,
    Text,
    NText,
    Binary,
    VarBinary,
    Date,
    Time,
    DateTime,
    DateTime2,
    SmallDateTime,
    DateTimeOffset,
    UniqueIdentifier,
    Xml,
    Other(String),
}

impl DataType {
    /// Parse a type name, ignoring case. A few common aliases are accepted.
    pub fn from_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "tinyint" => Self::TinyInt,
            "smallint" => Self::SmallInt,
            "int" | "integer" => Self::Int,
            "bigint" => Self::BigInt,
            "bit" | "bool" | "boolean" => Self::Bit,
            "decimal" | "dec" => Self::Decimal,
            "numeric" => Self::Numeric,
            "money" => Self::Money,
            "smallmoney" => Self::SmallMoney,
            "float" => Self::Float,
            "real" => Self::Real,
            "char" => Self::Char,
            "varchar" => Self::VarChar,
            "nchar" => Self::NChar,
            "nvarchar" => Self::NVarChar,
            "text" => Self::Text,
            "ntext" => Self::NText,
            "binary" => Self::Binary,
            "varbinary" => Self::VarBinary,
            "date" => Self::Date,
            "time" => Self::Time,
            "datetime" => Self::DateTime,
            "datetime2" => Self::DateTime2,
            "smalldatetime" => Self::SmallDateTime,
            "datetimeoffset" => Self::DateTimeOffset,
            "uniqueidentifier" | "uuid" | "guid" => Self::UniqueIdentifier,
            "xml" => Self::Xml,
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Bit => "bit",
            Self::Decimal => "decimal",
            Self::Numeric => "numeric",
            Self::Money => "money",
            Self::SmallMoney => "smallmoney",
            Self::Float => "float",
            Self::Real => "real",
            Self::Char => "char",
            Self::VarChar => "varchar",
            Self::NChar => "nchar",
            Self::NVarChar => "nvarchar",
            Self::Text => "text",
            Self::NText => "ntext",
            Self::Binary => "binary",
            Self::VarBinary => "varbinary",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::DateTime2 => "datetime2",
            Self::SmallDateTime => "smalldatetime",
            Self::DateTimeOffset => "datetimeoffset",
            Self::UniqueIdentifier => "uniqueidentifier",
            Self::Xml => "xml",
            Self::Other(name) => name,
        }
    }

    /// `char`, `varchar`, `nchar`, `nvarchar`: types that should carry a length.
    pub fn is_string(&self) -> bool {
        matches!(self, Self::Char | Self::VarChar | Self::NChar | Self::NVarChar)
    }

    pub fn is_unicode(&self) -> bool {
        matches!(self, Self::NChar | Self::NVarChar | Self::NText)
    }

    /// Any character type, including the legacy `text`/`ntext`.
    pub fn is_character(&self) -> bool {
        self.is_string() || matches!(self, Self::Text | Self::NText | Self::Xml)
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary | Self::VarBinary)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::TinyInt | Self::SmallInt | Self::Int | Self::BigInt)
    }

    pub fn is_exact_decimal(&self) -> bool {
        matches!(self, Self::Decimal | Self::Numeric)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || self.is_exact_decimal()
            || matches!(self, Self::Money | Self::SmallMoney | Self::Float | Self::Real)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date
                | Self::Time
                | Self::DateTime
                | Self::DateTime2
                | Self::SmallDateTime
                | Self::DateTimeOffset
        )
    }

    /// Types whose single parameter is a precision rather than a length.
    pub fn takes_precision(&self) -> bool {
        matches!(
            self,
            Self::Float | Self::DateTime2 | Self::Time | Self::DateTimeOffset
        )
    }

    pub fn takes_length(&self) -> bool {
        self.is_string() || self.is_binary()
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Inclusive integer range for integer types.
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::TinyInt => Some((0, 255)),
            Self::SmallInt => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::BigInt => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        Self::from_name(&s)
    }
}

impl From<DataType> for String {
    fn from(t: DataType) -> Self {
        t.name().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexModel {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    pub is_clustered: bool,
}

impl IndexModel {
    pub fn new<S: Into<String>>(name: impl Into<String>, columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            is_unique: false,
            is_clustered: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn clustered(mut self) -> Self {
        self.is_clustered = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    #[serde(rename = "1-1")]
    OneToOne,
    #[serde(rename = "1-n")]
    OneToMany,
    #[serde(rename = "n-1")]
    ManyToOne,
    #[serde(rename = "n-m")]
    ManyToMany,
}

impl RelationType {
    pub const ALL: [RelationType; 4] = [
        Self::OneToOne,
        Self::OneToMany,
        Self::ManyToOne,
        Self::ManyToMany,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Self::OneToOne => "1-1",
            Self::OneToMany => "1-n",
            Self::ManyToOne => "n-1",
            Self::ManyToMany => "n-m",
        }
    }

    /// Notation connector between the two endpoints.
    pub fn connector(self) -> &'static str {
        match self {
            Self::OneToOne => "||--||",
            Self::OneToMany => "||--o{",
            Self::ManyToOne => "}o--||",
            Self::ManyToMany => "}o--o{",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::OneToOne => "OneToOne",
            Self::OneToMany => "OneToMany",
            Self::ManyToOne => "ManyToOne",
            Self::ManyToMany => "ManyToMany",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s) || t.symbol().eq_ignore_ascii_case(s))
    }

    pub fn from_connector(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.connector() == s)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
}

impl ReferentialAction {
    pub const ALL: [ReferentialAction; 5] = [
        Self::NoAction,
        Self::Cascade,
        Self::SetNull,
        Self::SetDefault,
        Self::Restrict,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::NoAction => "NoAction",
            Self::Cascade => "Cascade",
            Self::SetNull => "SetNull",
            Self::SetDefault => "SetDefault",
            Self::Restrict => "Restrict",
        }
    }

    /// SQL spelling, e.g. `SET NULL`.
    pub fn sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Restrict => "RESTRICT",
        }
    }

    /// Accepts both `SetNull` and `SET NULL` spellings.
    pub fn from_name(s: &str) -> Option<Self> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect();
        Self::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(&compact))
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipModel {
    pub name: String,
    pub source_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,
    pub target_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_column: Option<String>,
    pub relation_type: RelationType,
    #[serde(default)]
    pub on_delete: ReferentialAction,
    #[serde(default)]
    pub on_update: ReferentialAction,
}

impl RelationshipModel {
    /// An auto-named relationship (`FK_<source>_<target>`).
    pub fn new(
        source_table: impl Into<String>,
        target_table: impl Into<String>,
        relation_type: RelationType,
    ) -> Self {
        let source_table = source_table.into();
        let target_table = target_table.into();
        Self {
            name: Self::default_name(&source_table, &target_table),
            source_table,
            source_column: None,
            target_table,
            target_column: None,
            relation_type,
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }
    }

    pub fn default_name(source: &str, target: &str) -> String {
        format!("FK_{}_{}", source, target)
    }

    pub fn is_auto_named(&self) -> bool {
        self.name == Self::default_name(&self.source_table, &self.target_table)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_columns(mut self, source_column: Option<&str>, target_column: Option<&str>) -> Self {
        self.source_column = source_column.map(str::to_string);
        self.target_column = target_column.map(str::to_string);
        self
    }

    pub fn with_on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn with_on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }

    /// Case-insensitive `(source, target)` key used to match relationships
    /// across snapshots.
    pub fn pair_key(&self) -> (String, String) {
        (name_key(&self.source_table), name_key(&self.target_table))
    }

    /// `(child, parent)` tables of the foreign-key dependency, or `None`
    /// for many-to-many which needs a junction table.
    pub fn dependency(&self) -> Option<(&str, &str)> {
        match self.relation_type {
            RelationType::OneToMany => Some((&self.target_table, &self.source_table)),
            RelationType::ManyToOne | RelationType::OneToOne => {
                Some((&self.source_table, &self.target_table))
            }
            RelationType::ManyToMany => None,
        }
    }

    /// Resolve which table holds the foreign key and which columns take part.
    pub fn binding(&self, model: &SchemaModel, naming: &ForeignKeyNaming) -> Option<ForeignKeyBinding> {
        let (child, parent) = self.dependency()?;
        let (child_column, parent_column) = if self.relation_type != RelationType::OneToMany {
            (&self.source_column, &self.target_column)
        } else {
            (&self.target_column, &self.source_column)
        };

        let (fk_column, fk_column_inferred) = match child_column {
            Some(c) => (c.clone(), false),
            None => (naming.column_for(parent), true),
        };

        let referenced_column = parent_column.clone().unwrap_or_else(|| {
            model
                .table(parent)
                .and_then(|t| t.primary_key_columns().first().map(|c| c.name.clone()))
                .unwrap_or_else(|| "Id".to_string())
        });

        Some(ForeignKeyBinding {
            constraint_name: self.name.clone(),
            child_table: child.to_string(),
            fk_column,
            fk_column_inferred,
            parent_table: parent.to_string(),
            referenced_column,
            on_delete: self.on_delete,
            on_update: self.on_update,
        })
    }
}

/// Naming convention for foreign-key columns that are not spelled out
/// explicitly on a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForeignKeyNaming {
    /// Template where `{table}` is replaced by the referenced table name.
    pub column_template: String,
}

impl Default for ForeignKeyNaming {
    fn default() -> Self {
        Self {
            column_template: "{table}Id".to_string(),
        }
    }
}

impl ForeignKeyNaming {
    pub fn column_for(&self, parent_table: &str) -> String {
        self.column_template.replace("{table}", parent_table)
    }
}

/// A relationship resolved to concrete foreign-key columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyBinding {
    pub constraint_name: String,
    pub child_table: String,
    pub fk_column: String,
    pub fk_column_inferred: bool,
    pub parent_table: String,
    pub referenced_column: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> SchemaModel {
        SchemaModel::new()
            .with_table(
                TableModel::new("Customer")
                    .with_column(ColumnModel::new("CustomerKey", DataType::Int).primary_key()),
            )
            .with_table(
                TableModel::new("Order")
                    .with_column(ColumnModel::new("Id", DataType::Int).primary_key())
                    .with_column(ColumnModel::new("CustomerId", DataType::Int).foreign_key()),
            )
    }

    #[test]
    fn test_type_display() {
        let c = ColumnModel::new("Name", DataType::NVarChar).with_length(50);
        assert_eq!(c.type_display(), "nvarchar(50)");
        let c = ColumnModel::new("Body", DataType::NVarChar).with_length(MAX_LENGTH);
        assert_eq!(c.type_display(), "nvarchar(max)");
        let c = ColumnModel::new("Total", DataType::Decimal).with_precision(18, Some(2));
        assert_eq!(c.type_display(), "decimal(18,2)");
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(DataType::from_name("NVARCHAR"), DataType::NVarChar);
        assert_eq!(DataType::from_name("boolean"), DataType::Bit);
        assert_eq!(DataType::from_name("geography"), DataType::Other("geography".into()));
        assert!(DataType::NChar.is_string());
        assert!(!DataType::Text.is_string());
    }

    #[test]
    fn test_primary_key_is_not_nullable() {
        let c = ColumnModel::new("Id", DataType::Int).primary_key();
        assert!(!c.is_nullable);
    }

    #[test]
    fn test_table_lookup_ignores_case() {
        let model = shop();
        assert!(model.table("customer").is_some());
        assert!(model.table("ORDER").unwrap().column("customerid").is_some());
    }

    #[test]
    fn test_binding_one_to_many_puts_fk_on_target() {
        let model = shop();
        let rel = RelationshipModel::new("Customer", "Order", RelationType::OneToMany);
        let b = rel.binding(&model, &ForeignKeyNaming::default()).unwrap();
        assert_eq!(b.child_table, "Order");
        assert_eq!(b.fk_column, "CustomerId");
        assert!(b.fk_column_inferred);
        assert_eq!(b.parent_table, "Customer");
        assert_eq!(b.referenced_column, "CustomerKey");
    }

    #[test]
    fn test_binding_many_to_one_uses_explicit_columns() {
        let model = shop();
        let rel = RelationshipModel::new("Order", "Customer", RelationType::ManyToOne)
            .with_columns(Some("CustomerId"), Some("CustomerKey"));
        let b = rel.binding(&model, &ForeignKeyNaming::default()).unwrap();
        assert_eq!(b.child_table, "Order");
        assert_eq!(b.fk_column, "CustomerId");
        assert!(!b.fk_column_inferred);
        assert_eq!(b.referenced_column, "CustomerKey");
    }

    #[test]
    fn test_binding_many_to_many_is_none() {
        let rel = RelationshipModel::new("Order", "Customer", RelationType::ManyToMany);
        assert!(rel.binding(&shop(), &ForeignKeyNaming::default()).is_none());
    }

    #[test]
    fn test_custom_fk_naming() {
        let naming = ForeignKeyNaming {
            column_template: "{table}_id".into(),
        };
        assert_eq!(naming.column_for("Customer"), "Customer_id");
    }

    #[test]
    fn test_referential_action_spellings() {
        assert_eq!(ReferentialAction::from_name("SET NULL"), Some(ReferentialAction::SetNull));
        assert_eq!(ReferentialAction::from_name("cascade"), Some(ReferentialAction::Cascade));
        assert_eq!(ReferentialAction::from_name("no_action"), Some(ReferentialAction::NoAction));
        assert_eq!(ReferentialAction::from_name("sometimes"), None);
    }

    #[test]
    fn test_relation_type_lookup() {
        assert_eq!(RelationType::from_connector("||--o{"), Some(RelationType::OneToMany));
        assert_eq!(RelationType::from_name("n-m"), Some(RelationType::ManyToMany));
        assert_eq!(RelationType::from_name("manytoone"), Some(RelationType::ManyToOne));
    }
}
