//! Text formats a schema model can be read from and written to.

use crate::ddl::{DdlGenerator, DdlOptions};
use crate::error::Result;
use crate::model::SchemaModel;
use crate::parser::{DIAGRAM_KEYWORD, ParseOutput};
use crate::{diagram, parser, serializer, sql};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// T-SQL `CREATE TABLE` scripts.
    Ddl,
    /// `erDiagram` block notation.
    Notation,
    /// Line-oriented `TABLE:` / `RELATIONSHIP:` format.
    Diagram,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown format '{0}' (expected ddl, notation or diagram)")]
pub struct UnknownFormat(String);

impl Format {
    pub const ALL: [Format; 3] = [Self::Ddl, Self::Notation, Self::Diagram];

    pub fn name(self) -> &'static str {
        match self {
            Self::Ddl => "ddl",
            Self::Notation => "notation",
            Self::Diagram => "diagram",
        }
    }

    /// Guess the format from the first meaningful line. Blank lines and
    /// `%` comment lines are skipped.
    pub fn detect(text: &str) -> Self {
        let first = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('%'));
        let Some(line) = first else {
            return Self::Ddl;
        };
        let starts_with = |prefix: &str| {
            line.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        };
        if starts_with(DIAGRAM_KEYWORD) {
            Self::Notation
        } else if ["TABLE:", "INDEX:", "RELATIONSHIP:"].iter().any(|p| starts_with(p)) {
            Self::Diagram
        } else {
            Self::Ddl
        }
    }

    /// Format implied by a file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "sql" => Some(Self::Ddl),
            "erd" | "mmd" => Some(Self::Notation),
            "erdx" | "diagram" => Some(Self::Diagram),
            _ => None,
        }
    }

    pub fn parse(self, text: &str) -> ParseOutput {
        match self {
            Self::Notation => parser::parse(text),
            Self::Diagram => diagram::parse(text),
            Self::Ddl => match sql::parse_sql(text) {
                Ok(model) => ParseOutput {
                    model,
                    errors: Vec::new(),
                },
                Err(e) => ParseOutput {
                    model: SchemaModel::new(),
                    errors: vec![e.to_string()],
                },
            },
        }
    }

    pub fn render(self, model: &SchemaModel, options: &DdlOptions) -> Result<String> {
        Ok(match self {
            Self::Notation => serializer::generate(model),
            Self::Diagram => diagram::generate(model),
            Self::Ddl => DdlGenerator::with_options(options.clone())
                .generate(model)?
                .script(),
        })
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ddl" | "sql" => Ok(Self::Ddl),
            "notation" | "erd" | "erdiagram" => Ok(Self::Notation),
            "diagram" => Ok(Self::Diagram),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Parse `text` in its detected format.
pub fn parse_any(text: &str) -> (Format, ParseOutput) {
    let format = Format::detect(text);
    (format, format.parse(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(Format::detect("erDiagram\n  A { int Id PK }"), Format::Notation);
        assert_eq!(Format::detect("%% @version 2\n\nERDIAGRAM\n"), Format::Notation);
        assert_eq!(Format::detect("TABLE: A (Id:int)"), Format::Diagram);
        assert_eq!(Format::detect("  relationship: R (A -> B)"), Format::Diagram);
        assert_eq!(Format::detect("CREATE TABLE A (Id int)"), Format::Ddl);
        assert_eq!(Format::detect(""), Format::Ddl);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("SQL".parse::<Format>().unwrap(), Format::Ddl);
        assert_eq!("diagram".parse::<Format>().unwrap(), Format::Diagram);
        assert!("svg".parse::<Format>().is_err());
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Format::from_path(Path::new("shop.sql")), Some(Format::Ddl));
        assert_eq!(Format::from_path(Path::new("shop.erd")), Some(Format::Notation));
        assert_eq!(Format::from_path(Path::new("shop")), None);
    }

    #[test]
    fn test_parse_dispatch() {
        let (format, output) = parse_any("TABLE: Customer (Id:int:PrimaryKey=true, Name:nvarchar(50))");
        assert_eq!(format, Format::Diagram);
        assert!(output.is_ok());
        assert_eq!(output.model.tables[0].columns.len(), 2);

        let (format, output) = parse_any("CREATE TABLE Customer (Id int PRIMARY KEY)");
        assert_eq!(format, Format::Ddl);
        assert!(output.model.tables[0].columns[0].is_primary_key);
    }

    #[test]
    fn test_render_between_formats() {
        let model = Format::Diagram
            .parse("TABLE: Tag (Id:int:PrimaryKey=true, Label:nvarchar(40):Nullable=false)")
            .into_result()
            .unwrap();
        let notation = Format::Notation.render(&model, &DdlOptions::default()).unwrap();
        assert!(notation.starts_with("erDiagram"));
        let ddl = Format::Ddl.render(&model, &DdlOptions::default()).unwrap();
        assert!(ddl.contains("CREATE TABLE [dbo].[Tag]"));
        assert!(ddl.contains("GO"));
    }
}
