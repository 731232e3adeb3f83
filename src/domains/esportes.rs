//! Sports secretariat: teams, competitions and sports facilities.
//!
//! Facilities are ordinary store rows here; an empty tenant starts with no facilities.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "esportes";

pub const EQUIPES: TableDef = TableDef {
    name: "esportes_equipes",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::req("modalidade", "TEXT"),
        C::opt("categoria", "TEXT"),
        C::opt("tecnico", "TEXT"),
        C::opt("quantidade_atletas", "INTEGER"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const COMPETICOES: TableDef = TableDef {
    name: "esportes_competicoes",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::req("modalidade", "TEXT"),
        C::req("data_inicio", "DATE").format(Format::Date),
        C::opt("data_fim", "DATE").format(Format::Date),
        C::opt("local", "TEXT"),
        C::opt("status", "TEXT").default_expr("'planejada'"),
    ],
    order_by: "data_inicio",
    ascending: false,
};

pub const RECURSOS: TableDef = TableDef {
    name: "esportes_recursos",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::req("tipo", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("capacidade", "INTEGER"),
        C::opt("disponivel", "BOOLEAN").default_expr("TRUE"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const TABLES: &[TableDef] = &[EQUIPES, COMPETICOES, RECURSOS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Equipe {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    pub modalidade: String,
    #[serde(default)]
    pub categoria: Option<String>,
    #[serde(default)]
    pub tecnico: Option<String>,
    #[serde(default)]
    pub quantidade_atletas: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Competicao {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    pub modalidade: String,
    pub data_inicio: NaiveDate,
    #[serde(default)]
    pub data_fim: Option<NaiveDate>,
    #[serde(default)]
    pub local: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecursoEsportivo {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    pub tipo: String,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub capacidade: Option<i32>,
    #[serde(default)]
    pub disponivel: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EsportesDashboard {
    pub equipes_ativas: u64,
    pub competicoes_em_andamento: u64,
    pub recursos_disponiveis: u64,
}

#[derive(Clone)]
pub struct Esportes {
    pub equipes: EntityCrud<Equipe>,
    pub competicoes: EntityCrud<Competicao>,
    pub recursos: EntityCrud<RecursoEsportivo>,
}

impl Esportes {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        Esportes {
            equipes: ctx.bind(&EQUIPES, tenant_id),
            competicoes: ctx.bind(&COMPETICOES, tenant_id),
            recursos: ctx.bind(&RECURSOS, tenant_id),
        }
    }

    pub async fn equipes_por_modalidade(&self, modalidade: &str) -> Result<Vec<Equipe>, AppError> {
        self.equipes.list(&Filters::new().eq("modalidade", modalidade), None).await
    }

    pub async fn recursos_disponiveis(&self) -> Result<Vec<RecursoEsportivo>, AppError> {
        self.recursos.list(&Filters::new().eq("disponivel", true), None).await
    }

    pub async fn dashboard(&self) -> Result<EsportesDashboard, AppError> {
        let filtro_ativo = Filters::new().eq("status", status::ATIVO);
        let filtro_em_andamento = Filters::new().eq("status", status::EM_ANDAMENTO);
        let filtro_disponivel = Filters::new().eq("disponivel", true);
        let (equipes_ativas, competicoes_em_andamento, recursos_disponiveis) = tokio::try_join!(
            self.equipes.stats(&filtro_ativo),
            self.competicoes.stats(&filtro_em_andamento),
            self.recursos.stats(&filtro_disponivel),
        )?;
        Ok(EsportesDashboard {
            equipes_ativas,
            competicoes_em_andamento,
            recursos_disponiveis,
        })
    }
}
