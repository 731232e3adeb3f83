//! Shapes shared across domains: the row envelope, addresses, contacts and known status values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields every stored row carries. Flattened into each record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    #[serde(default)]
    pub tenant_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Postal address stored as JSONB.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Endereco {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logradouro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numero: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complemento: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bairro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cep: Option<String>,
}

/// Contact channels stored as JSONB.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contato {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub celular: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Status strings in common use. Status columns are free text; nothing enforces these.
pub mod status {
    pub const ATIVO: &str = "ativo";
    pub const INATIVO: &str = "inativo";
    pub const ABERTO: &str = "aberto";
    pub const EM_ANDAMENTO: &str = "em_andamento";
    pub const CONCLUIDO: &str = "concluido";
    pub const CANCELADO: &str = "cancelado";
    pub const PENDENTE: &str = "pendente";
    pub const PAGO: &str = "pago";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_reads_store_rows() {
        let row = json!({
            "id": "6f1c2a8e-3a1b-4c55-9d1e-0a4b7f3e2c10",
            "tenant_id": "sao-jose",
            "created_at": "2026-03-01T12:00:00.000000Z",
            "updated_at": "2026-03-01T12:00:00.000000Z",
        });
        let e: Envelope = serde_json::from_value(row).unwrap();
        assert_eq!(e.tenant_id.as_deref(), Some("sao-jose"));
    }

    #[test]
    fn empty_address_fields_are_omitted() {
        let e = Endereco {
            bairro: Some("Centro".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&e).unwrap(), json!({"bairro": "Centro"}));
    }
}
