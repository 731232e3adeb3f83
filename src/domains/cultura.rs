//! Culture secretariat: cultural venues, events and funded projects.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Contato, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "cultura";

pub const ESPACOS: TableDef = TableDef {
    name: "cultura_espacos",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("tipo", "TEXT"),
        C::opt("capacidade", "INTEGER"),
        C::opt("endereco", "JSONB"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const EVENTOS: TableDef = TableDef {
    name: "cultura_eventos",
    module: MODULE,
    columns: &[
        C::req("titulo", "TEXT").max_len(200),
        C::opt("descricao", "TEXT"),
        C::opt("espaco_id", "UUID").format(Format::Uuid),
        C::req("data_inicio", "DATE").format(Format::Date),
        C::opt("data_fim", "DATE").format(Format::Date),
        C::opt("publico_estimado", "INTEGER"),
        C::opt("status", "TEXT").default_expr("'planejado'"),
    ],
    order_by: "data_inicio",
    ascending: false,
};

pub const PROJETOS: TableDef = TableDef {
    name: "cultura_projetos",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::req("proponente", "TEXT"),
        C::opt("descricao", "TEXT"),
        C::opt("valor_solicitado", "NUMERIC(14,2)"),
        C::opt("valor_aprovado", "NUMERIC(14,2)"),
        C::opt("status", "TEXT").default_expr("'em_analise'"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const TABLES: &[TableDef] = &[ESPACOS, EVENTOS, PROJETOS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EspacoCultural {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub tipo: Option<String>,
    #[serde(default)]
    pub capacidade: Option<i32>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventoCultural {
    #[serde(flatten)]
    pub meta: Envelope,
    pub titulo: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub espaco_id: Option<String>,
    pub data_inicio: NaiveDate,
    #[serde(default)]
    pub data_fim: Option<NaiveDate>,
    #[serde(default)]
    pub publico_estimado: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjetoCultural {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    pub proponente: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub valor_solicitado: Option<f64>,
    #[serde(default)]
    pub valor_aprovado: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CulturaDashboard {
    pub espacos_ativos: u64,
    pub eventos_planejados: u64,
    pub eventos_realizados: u64,
    pub projetos_aprovados: u64,
}

#[derive(Clone)]
pub struct Cultura {
    pub espacos: EntityCrud<EspacoCultural>,
    pub eventos: EntityCrud<EventoCultural>,
    pub projetos: EntityCrud<ProjetoCultural>,
}

impl Cultura {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        Cultura {
            espacos: ctx.bind(&ESPACOS, tenant_id),
            eventos: ctx.bind(&EVENTOS, tenant_id),
            projetos: ctx.bind(&PROJETOS, tenant_id),
        }
    }

    pub async fn eventos_do_espaco(&self, espaco_id: &str) -> Result<Vec<EventoCultural>, AppError> {
        self.eventos.list(&Filters::new().eq("espaco_id", espaco_id), None).await
    }

    pub async fn dashboard(&self) -> Result<CulturaDashboard, AppError> {
        let filtro_planejado = Filters::new().eq("status", "planejado");
        let filtro_realizado = Filters::new().eq("status", "realizado");
        let filtro_aprovado = Filters::new().eq("status", "aprovado");
        let filtro_ativo = Filters::new().eq("status", status::ATIVO);
        let (espacos_ativos, eventos_planejados, eventos_realizados, projetos_aprovados) = tokio::try_join!(
            self.espacos.stats(&filtro_ativo),
            self.eventos.stats(&filtro_planejado),
            self.eventos.stats(&filtro_realizado),
            self.projetos.stats(&filtro_aprovado),
        )?;
        Ok(CulturaDashboard {
            espacos_ativos,
            eventos_planejados,
            eventos_realizados,
            projetos_aprovados,
        })
    }
}
