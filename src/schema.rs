//! Static table registry: columns, default sort and form rules for every table the platform owns.

use crate::store::Order;
use crate::validation::ValidationRule;
use serde_json::Value;
use std::collections::HashMap;

/// Column formats understood by the request validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Email,
    Uuid,
    Cpf,
    Date,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Email => "email",
            Format::Uuid => "uuid",
            Format::Cpf => "cpf",
            Format::Date => "date",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnDef {
    pub name: &'static str,
    pub pg_type: &'static str,
    /// Must be supplied by forms on create.
    pub required: bool,
    pub default: Option<&'static str>,
    pub format: Option<Format>,
    pub max_length: Option<u32>,
    /// Inclusive numeric bounds.
    pub range: Option<(i64, i64)>,
    pub allowed: Option<&'static [&'static str]>,
}

impl ColumnDef {
    /// Optional column.
    pub const fn opt(name: &'static str, pg_type: &'static str) -> Self {
        ColumnDef {
            name,
            pg_type,
            required: false,
            default: None,
            format: None,
            max_length: None,
            range: None,
            allowed: None,
        }
    }

    /// Column the create form must fill.
    pub const fn req(name: &'static str, pg_type: &'static str) -> Self {
        ColumnDef {
            required: true,
            ..ColumnDef::opt(name, pg_type)
        }
    }

    pub const fn default_expr(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    pub const fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub const fn max_len(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }

    pub const fn range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = Some(values);
        self
    }

    fn rule(&self) -> Option<ValidationRule> {
        if !self.required
            && self.format.is_none()
            && self.max_length.is_none()
            && self.range.is_none()
            && self.allowed.is_none()
        {
            return None;
        }
        Some(ValidationRule {
            required: Some(self.required),
            format: self.format.map(|f| f.as_str().to_string()),
            max_length: self.max_length,
            allowed: self
                .allowed
                .map(|vs| vs.iter().map(|v| Value::String(v.to_string())).collect()),
            minimum: self.range.map(|(min, _)| min as f64),
            maximum: self.range.map(|(_, max)| max as f64),
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TableDef {
    pub name: &'static str,
    /// Secretariat or service the table belongs to.
    pub module: &'static str,
    pub columns: &'static [ColumnDef],
    pub order_by: &'static str,
    pub ascending: bool,
}

impl TableDef {
    pub fn default_order(&self) -> Order {
        Order {
            column: self.order_by.to_string(),
            ascending: self.ascending,
        }
    }

    /// Form rules keyed by column.
    pub fn validation(&self) -> HashMap<String, ValidationRule> {
        self.columns
            .iter()
            .filter_map(|c| c.rule().map(|r| (c.name.to_string(), r)))
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        ENVELOPE_COLUMNS.iter().any(|(c, _)| *c == name) || self.columns.iter().any(|c| c.name == name)
    }
}

/// Columns every table carries in addition to its own.
pub const ENVELOPE_COLUMNS: &[(&str, &str)] = &[
    ("id", "UUID PRIMARY KEY DEFAULT gen_random_uuid()"),
    ("tenant_id", "TEXT"),
    ("created_at", "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
    ("updated_at", "TIMESTAMPTZ NOT NULL DEFAULT NOW()"),
];

/// Every registry table, grouped by module.
pub fn all_tables() -> impl Iterator<Item = &'static TableDef> {
    use crate::domains::*;
    use crate::services::{billing, onboarding, protocol, session, tenant};
    [
        session::TABLES,
        tenant::TABLES,
        onboarding::TABLES,
        billing::TABLES,
        protocol::TABLES,
        agricultura::TABLES,
        assistencia_social::TABLES,
        cultura::TABLES,
        educacao::TABLES,
        esportes::TABLES,
        habitacao::TABLES,
        meio_ambiente::TABLES,
        obras_publicas::TABLES,
        planejamento_urbano::TABLES,
        saude::TABLES,
        seguranca_publica::TABLES,
        turismo::TABLES,
    ]
    .into_iter()
    .flatten()
}

pub fn table_def(name: &str) -> Option<&'static TableDef> {
    all_tables().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_names_are_unique_identifiers() {
        let mut seen = HashSet::new();
        for t in all_tables() {
            assert!(crate::sql::is_identifier(t.name), "{}", t.name);
            assert!(seen.insert(t.name), "duplicate table {}", t.name);
            assert!(t.has_column(t.order_by), "{} orders by unknown {}", t.name, t.order_by);
            for c in t.columns {
                assert!(crate::sql::is_identifier(c.name), "{}.{}", t.name, c.name);
                assert!(
                    !ENVELOPE_COLUMNS.iter().any(|(e, _)| *e == c.name),
                    "{} redeclares {}",
                    t.name,
                    c.name
                );
            }
        }
    }

    #[test]
    fn lookup_and_rules() {
        let t = table_def("protocolos").unwrap();
        assert!(t.has_column("status"));
        assert!(t.has_column("tenant_id"));
        assert!(table_def("nope").is_none());

        let rules = table_def("saude_pacientes").unwrap().validation();
        assert_eq!(rules["nome"].required, Some(true));
        assert_eq!(rules["cpf"].format.as_deref(), Some("cpf"));
    }
}
