//! Agriculture secretariat: rural producers, technical assistance visits and support programs.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Contato, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "agricultura";

pub const PRODUTORES: TableDef = TableDef {
    name: "agricultura_produtores",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("cpf", "TEXT").format(Format::Cpf),
        C::opt("propriedade_nome", "TEXT"),
        C::opt("area_hectares", "NUMERIC(12,2)"),
        C::opt("principais_culturas", "JSONB"),
        C::opt("endereco", "JSONB"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const ASSISTENCIAS: TableDef = TableDef {
    name: "agricultura_assistencias_tecnicas",
    module: MODULE,
    columns: &[
        C::req("produtor_id", "UUID").format(Format::Uuid),
        C::req("tipo_assistencia", "TEXT"),
        C::opt("tecnico_responsavel", "TEXT"),
        C::opt("descricao", "TEXT"),
        C::req("data_visita", "DATE").format(Format::Date),
        C::opt("status", "TEXT").default_expr("'agendada'"),
    ],
    order_by: "data_visita",
    ascending: false,
};

pub const PROGRAMAS: TableDef = TableDef {
    name: "agricultura_programas",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("descricao", "TEXT"),
        C::opt("data_inicio", "DATE").format(Format::Date),
        C::opt("data_fim", "DATE").format(Format::Date),
        C::opt("orcamento", "NUMERIC(14,2)"),
        C::opt("vagas", "INTEGER"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "data_inicio",
    ascending: false,
};

pub const TABLES: &[TableDef] = &[PRODUTORES, ASSISTENCIAS, PROGRAMAS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Produtor {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub propriedade_nome: Option<String>,
    #[serde(default)]
    pub area_hectares: Option<f64>,
    #[serde(default)]
    pub principais_culturas: Option<Vec<String>>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistenciaTecnica {
    #[serde(flatten)]
    pub meta: Envelope,
    pub produtor_id: String,
    pub tipo_assistencia: String,
    #[serde(default)]
    pub tecnico_responsavel: Option<String>,
    #[serde(default)]
    pub descricao: Option<String>,
    pub data_visita: NaiveDate,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgramaRural {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub data_inicio: Option<NaiveDate>,
    #[serde(default)]
    pub data_fim: Option<NaiveDate>,
    #[serde(default)]
    pub orcamento: Option<f64>,
    #[serde(default)]
    pub vagas: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AgriculturaDashboard {
    pub produtores_ativos: u64,
    pub assistencias_agendadas: u64,
    pub assistencias_realizadas: u64,
    pub programas_ativos: u64,
}

#[derive(Clone)]
pub struct Agricultura {
    pub produtores: EntityCrud<Produtor>,
    pub assistencias: EntityCrud<AssistenciaTecnica>,
    pub programas: EntityCrud<ProgramaRural>,
}

impl Agricultura {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        Agricultura {
            produtores: ctx.bind(&PRODUTORES, tenant_id),
            assistencias: ctx.bind(&ASSISTENCIAS, tenant_id),
            programas: ctx.bind(&PROGRAMAS, tenant_id),
        }
    }

    pub async fn assistencias_do_produtor(&self, produtor_id: &str) -> Result<Vec<AssistenciaTecnica>, AppError> {
        self.assistencias
            .list(&Filters::new().eq("produtor_id", produtor_id), None)
            .await
    }

    pub async fn dashboard(&self) -> Result<AgriculturaDashboard, AppError> {
        let ativos = Filters::new().eq("status", status::ATIVO);
        let filtro_agendada = Filters::new().eq("status", "agendada");
        let filtro_realizada = Filters::new().eq("status", "realizada");
        let (produtores_ativos, assistencias_agendadas, assistencias_realizadas, programas_ativos) = tokio::try_join!(
            self.produtores.stats(&ativos),
            self.assistencias.stats(&filtro_agendada),
            self.assistencias.stats(&filtro_realizada),
            self.programas.stats(&ativos),
        )?;
        Ok(AgriculturaDashboard {
            produtores_ativos,
            assistencias_agendadas,
            assistencias_realizadas,
            programas_ativos,
        })
    }
}
