//! Column type and default-value rendering for the target dialect.

use super::dialect::{CURRENT_TIMESTAMP, string_literal};
use crate::model::{ColumnModel, DataType, MAX_LENGTH};
use crate::validator::is_now_keyword;

/// Largest non-`max` length for single-byte character and binary types.
pub const MAX_BYTE_LENGTH: i32 = 8000;
/// Largest non-`max` length for `nchar`/`nvarchar`.
pub const MAX_UNICODE_LENGTH: i32 = 4000;

/// Column type as written in DDL, e.g. `nvarchar(max)` or `decimal(18,2)`.
/// Returns `None` for types the dialect cannot express.
pub fn render_type(column: &ColumnModel) -> Option<String> {
    if !column.data_type.is_known() {
        return None;
    }
    let base = column.data_type.name();

    if column.data_type.takes_length() {
        return Some(match column.length {
            Some(MAX_LENGTH) => format!("{}(max)", base),
            Some(n) => format!("{}({})", base, n),
            None => base.to_string(),
        });
    }

    Some(match (column.precision, column.scale) {
        (Some(p), Some(s)) if column.data_type.is_exact_decimal() => format!("{}({},{})", base, p, s),
        (Some(p), _) if column.data_type.is_exact_decimal() || column.data_type.takes_precision() => {
            format!("{}({})", base, p)
        }
        _ => base.to_string(),
    })
}

/// Dialect-specific size bounds. Returns a description of each violation.
pub fn check_bounds(column: &ColumnModel) -> Vec<String> {
    let mut problems = Vec::new();
    let data_type = &column.data_type;

    if let Some(length) = column.length {
        let limit = if matches!(data_type, DataType::NChar | DataType::NVarChar) {
            MAX_UNICODE_LENGTH
        } else {
            MAX_BYTE_LENGTH
        };
        let allows_max = matches!(
            data_type,
            DataType::VarChar | DataType::NVarChar | DataType::VarBinary
        );
        if length == MAX_LENGTH {
            if !allows_max {
                problems.push(format!("type {} does not support max length", data_type));
            }
        } else if length <= 0 || length > limit {
            problems.push(format!(
                "length {} of {} must be in 1..={} or max",
                length, data_type, limit
            ));
        }
    }

    if let Some(precision) = column.precision {
        match data_type {
            DataType::Float if !(1..=53).contains(&precision) => {
                problems.push(format!("float precision {} must be in 1..=53", precision));
            }
            DataType::DateTime2 | DataType::Time | DataType::DateTimeOffset if precision > 7 => {
                problems.push(format!(
                    "fractional seconds precision {} of {} must be in 0..=7",
                    precision, data_type
                ));
            }
            _ => {}
        }
    }

    problems
}

/// Render a default value as a literal of the column's type.
pub fn default_literal(column: &ColumnModel, value: &str) -> String {
    let trimmed = value.trim();
    let data_type = &column.data_type;

    if trimmed.eq_ignore_ascii_case("null") {
        return "NULL".to_string();
    }
    if (data_type.is_temporal() || !data_type.is_known()) && is_now_keyword(trimmed) {
        return CURRENT_TIMESTAMP.to_string();
    }

    match data_type {
        DataType::Bit => match trimmed.to_lowercase().as_str() {
            "1" | "true" => "1".to_string(),
            "0" | "false" => "0".to_string(),
            _ => string_literal(trimmed, false),
        },
        DataType::UniqueIdentifier => {
            let bare = trimmed.strip_suffix("()").unwrap_or(trimmed);
            if bare.eq_ignore_ascii_case("newid") {
                "NEWID()".to_string()
            } else if bare.eq_ignore_ascii_case("newsequentialid") {
                "NEWSEQUENTIALID()".to_string()
            } else {
                string_literal(trimmed, false)
            }
        }
        t if t.is_numeric() && trimmed.parse::<f64>().is_ok() => trimmed.to_string(),
        t => string_literal(value, t.is_unicode()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_type() {
        let c = ColumnModel::new("A", DataType::NVarChar).with_length(MAX_LENGTH);
        assert_eq!(render_type(&c).unwrap(), "nvarchar(max)");
        let c = ColumnModel::new("A", DataType::Decimal).with_precision(18, Some(2));
        assert_eq!(render_type(&c).unwrap(), "decimal(18,2)");
        let c = ColumnModel::new("A", DataType::DateTime2).with_precision(3, None);
        assert_eq!(render_type(&c).unwrap(), "datetime2(3)");
        let c = ColumnModel::new("A", DataType::Int);
        assert_eq!(render_type(&c).unwrap(), "int");
        let c = ColumnModel::new("A", DataType::from_name("geography"));
        assert!(render_type(&c).is_none());
    }

    #[test]
    fn test_bounds() {
        let ok = ColumnModel::new("A", DataType::VarChar).with_length(8000);
        assert!(check_bounds(&ok).is_empty());
        let wide = ColumnModel::new("A", DataType::NVarChar).with_length(4001);
        assert_eq!(check_bounds(&wide), vec!["length 4001 of nvarchar must be in 1..=4000 or max"]);
        let fixed_max = ColumnModel::new("A", DataType::Char).with_length(MAX_LENGTH);
        assert_eq!(check_bounds(&fixed_max), vec!["type char does not support max length"]);
        let time = ColumnModel::new("A", DataType::Time).with_precision(9, None);
        assert_eq!(check_bounds(&time).len(), 1);
    }

    #[test]
    fn test_default_literals() {
        let name = ColumnModel::new("A", DataType::NVarChar);
        assert_eq!(default_literal(&name, "it's"), "N'it''s'");
        let code = ColumnModel::new("A", DataType::VarChar);
        assert_eq!(default_literal(&code, "x"), "'x'");
        let flag = ColumnModel::new("A", DataType::Bit);
        assert_eq!(default_literal(&flag, "true"), "1");
        assert_eq!(default_literal(&flag, "0"), "0");
        let created = ColumnModel::new("A", DataType::DateTime2);
        assert_eq!(default_literal(&created, "now"), "GETDATE()");
        assert_eq!(default_literal(&created, "2024-01-01"), "'2024-01-01'");
        let total = ColumnModel::new("A", DataType::Decimal);
        assert_eq!(default_literal(&total, "0.00"), "0.00");
        let key = ColumnModel::new("A", DataType::UniqueIdentifier);
        assert_eq!(default_literal(&key, "newid()"), "NEWID()");
    }
}
