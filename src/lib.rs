pub mod compare;
pub mod config;
pub mod ddl;
pub mod diagram;
pub mod error;
pub mod executor;
pub mod extract;
pub mod format;
pub mod impact;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod planner;
pub mod serializer;
pub mod sql;
pub mod store;
pub mod validator;

pub use compare::{ChangeSet, ChangeType, SchemaChange, SchemaComparer, Severity};
pub use config::Config;
pub use ddl::{DdlGenerator, DdlOptions};
pub use error::{Result, SchemaError};
pub use executor::{DatabaseExecutor, MigrationRunner};
pub use extract::{CatalogExtractor, DdlScriptExtractor, SchemaExtractor};
pub use format::Format;
pub use impact::{ImpactAnalysis, ImpactAnalyzer};
pub use model::SchemaModel;
pub use parser::NotationParser;
pub use planner::{MigrationOptions, MigrationPlan, MigrationPlanner};
pub use validator::{SchemaValidator, ValidationResult};

use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn parse_source(source: &str) -> Result<SchemaModel, String> {
    format::parse_any(source)
        .1
        .into_result()
        .map_err(|e| e.to_string())
}

/// Render notation (or any detected format) as a T-SQL creation script.
#[wasm_bindgen(js_name = "erdToDdl")]
pub fn erd_to_ddl(source: &str) -> Result<String, String> {
    let model = parse_source(source)?;
    DdlGenerator::new()
        .generate(&model)
        .map(|ddl| ddl.script())
        .map_err(|e| e.to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiffReport {
    changes: ChangeSet,
    impact: ImpactAnalysis,
}

/// Diff two documents; returns the change set and impact analysis as JSON.
#[wasm_bindgen(js_name = "erdDiff")]
pub fn erd_diff(old: &str, new: &str) -> Result<String, String> {
    let old = parse_source(old)?;
    let new = parse_source(new)?;
    let changes = SchemaComparer::new()
        .compare(&old, &new)
        .map_err(|e| e.to_string())?;
    let impact = ImpactAnalyzer::new().analyze(&changes);
    serde_json::to_string(&DiffReport { changes, impact }).map_err(|e| e.to_string())
}

/// Parse and validate; each entry is prefixed with `error: ` or `warning: `.
#[wasm_bindgen(js_name = "erdValidate")]
pub fn erd_validate(source: &str) -> js_sys::Array {
    let messages = js_sys::Array::new();
    for message in validation_messages(source) {
        messages.push(&JsValue::from_str(&message));
    }
    messages
}

fn validation_messages(source: &str) -> Vec<String> {
    let (_, output) = format::parse_any(source);
    if !output.is_ok() {
        return output
            .errors
            .iter()
            .map(|e| format!("error: {}", e))
            .collect();
    }
    let result = SchemaValidator::new().validate(&output.model);
    result
        .errors
        .iter()
        .map(|e| format!("error: {}", e))
        .chain(result.warnings.iter().map(|w| format!("warning: {}", w)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = "erDiagram\n  Customer {\n    int Id PK\n    nvarchar(50) Name\n  }\n";

    #[test]
    fn test_erd_to_ddl() {
        let script = erd_to_ddl(SHOP).unwrap();
        assert!(script.contains("CREATE TABLE [dbo].[Customer]"));
        assert!(erd_to_ddl("erDiagram\n  Customer {\n").is_err());
    }

    #[test]
    fn test_erd_diff_json() {
        let json = erd_diff(SHOP, "erDiagram\n  Tag {\n    int Id PK\n  }\n").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["changes"]["changes"][0]["type"], "TableAdded");
        assert_eq!(value["changes"]["changes"][1]["type"], "TableRemoved");
        assert_eq!(value["changes"]["statistics"]["breakingChanges"], 1);
        assert_eq!(value["impact"]["breakingChanges"][0]["objectName"], "Customer");
    }

    #[test]
    fn test_validation_messages() {
        assert!(validation_messages(SHOP).is_empty());
        let messages = validation_messages("erDiagram\n  Tag {\n    int Id\n  }\n");
        assert_eq!(messages, vec!["warning: Table 'Tag' has no primary key"]);
        let messages = validation_messages("erDiagram\n  Tag {\n");
        assert!(messages[0].starts_with("error: "));
    }
}
