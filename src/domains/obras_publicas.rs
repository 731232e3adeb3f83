//! Public works: construction projects and maintenance requests.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "obras_publicas";

pub const OBRAS: TableDef = TableDef {
    name: "obras_publicas_obras",
    module: MODULE,
    columns: &[
        C::req("titulo", "TEXT").max_len(200),
        C::opt("descricao", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("empresa_responsavel", "TEXT"),
        C::opt("orcamento", "NUMERIC(14,2)"),
        C::opt("valor_executado", "NUMERIC(14,2)"),
        C::opt("percentual_concluido", "NUMERIC(5,2)"),
        C::opt("data_inicio", "DATE").format(Format::Date),
        C::opt("previsao_termino", "DATE").format(Format::Date),
        C::opt("status", "TEXT").default_expr("'planejada'"),
    ],
    order_by: "data_inicio",
    ascending: false,
};

pub const MANUTENCOES: TableDef = TableDef {
    name: "obras_publicas_manutencoes",
    module: MODULE,
    columns: &[
        C::req("tipo", "TEXT"),
        C::opt("descricao", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("prioridade", "TEXT").default_expr("'media'"),
        C::opt("data_execucao", "DATE").format(Format::Date),
        C::opt("status", "TEXT").default_expr("'aberto'"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const TABLES: &[TableDef] = &[OBRAS, MANUTENCOES];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Obra {
    #[serde(flatten)]
    pub meta: Envelope,
    pub titulo: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub empresa_responsavel: Option<String>,
    #[serde(default)]
    pub orcamento: Option<f64>,
    #[serde(default)]
    pub valor_executado: Option<f64>,
    #[serde(default)]
    pub percentual_concluido: Option<f64>,
    #[serde(default)]
    pub data_inicio: Option<NaiveDate>,
    #[serde(default)]
    pub previsao_termino: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manutencao {
    #[serde(flatten)]
    pub meta: Envelope,
    pub tipo: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub prioridade: Option<String>,
    #[serde(default)]
    pub data_execucao: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ObrasDashboard {
    pub obras_em_andamento: u64,
    pub obras_concluidas: u64,
    pub orcamento_em_andamento: f64,
    pub manutencoes_abertas: u64,
}

#[derive(Clone)]
pub struct ObrasPublicas {
    pub obras: EntityCrud<Obra>,
    pub manutencoes: EntityCrud<Manutencao>,
}

impl ObrasPublicas {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        ObrasPublicas {
            obras: ctx.bind(&OBRAS, tenant_id),
            manutencoes: ctx.bind(&MANUTENCOES, tenant_id),
        }
    }

    pub async fn dashboard(&self) -> Result<ObrasDashboard, AppError> {
        let filtro_concluida = Filters::new().eq("status", "concluida");
        let filtro_em_andamento = Filters::new().eq("status", status::EM_ANDAMENTO);
        let filtro_aberto = Filters::new().eq("status", status::ABERTO);
        let (em_andamento, obras_concluidas, manutencoes_abertas) = tokio::try_join!(
            self.obras.list(&filtro_em_andamento, None),
            self.obras.stats(&filtro_concluida),
            self.manutencoes.stats(&filtro_aberto),
        )?;
        let orcamento: f64 = em_andamento.iter().filter_map(|o| o.orcamento).sum();
        Ok(ObrasDashboard {
            obras_em_andamento: em_andamento.len() as u64,
            obras_concluidas,
            orcamento_em_andamento: (orcamento * 100.0).round() / 100.0,
            manutencoes_abertas,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn works_newest_start_first_and_running_budget() {
        let store = MemoryStore::new();
        let o = ObrasPublicas::new(&DataContext::with_defaults(Arc::new(store.clone())), "t1");
        for (titulo, inicio, orcamento, status) in [
            ("Ponte", "2025-08-01", 1000.0, "em_andamento"),
            ("Creche", "2026-02-01", 250.5, "em_andamento"),
            ("Praca", "2024-01-10", 80.0, "concluida"),
        ] {
            o.obras
                .create(&json!({"titulo": titulo, "data_inicio": inicio, "orcamento": orcamento, "status": status}))
                .await
                .unwrap();
        }
        o.manutencoes.create(&json!({"tipo": "tapa-buraco", "status": "aberto"})).await.unwrap();
        o.manutencoes.create(&json!({"tipo": "poda", "status": "concluido"})).await.unwrap();

        let titulos: Vec<String> = o
            .obras
            .list(&Filters::new(), None)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.titulo)
            .collect();
        assert_eq!(titulos, ["Creche", "Ponte", "Praca"]);

        let painel = o.dashboard().await.unwrap();
        assert_eq!(painel.obras_em_andamento, 2);
        assert_eq!(painel.obras_concluidas, 1);
        assert_eq!(painel.orcamento_em_andamento, 1250.5);
        assert_eq!(painel.manutencoes_abertas, 1);
    }
}
