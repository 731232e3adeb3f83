//! Social assistance: registered families, granted benefits and service records.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Contato, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "assistencia_social";

pub const FAMILIAS: TableDef = TableDef {
    name: "assistencia_social_familias",
    module: MODULE,
    columns: &[
        C::req("responsavel_nome", "TEXT").max_len(200),
        C::opt("cpf_responsavel", "TEXT").format(Format::Cpf),
        C::opt("nis", "TEXT").max_len(11),
        C::opt("renda_familiar", "NUMERIC(12,2)"),
        C::opt("membros", "INTEGER"),
        C::opt("vulnerabilidades", "JSONB"),
        C::opt("endereco", "JSONB"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "responsavel_nome",
    ascending: true,
};

pub const BENEFICIOS: TableDef = TableDef {
    name: "assistencia_social_beneficios",
    module: MODULE,
    columns: &[
        C::req("familia_id", "UUID").format(Format::Uuid),
        C::req("tipo_beneficio", "TEXT"),
        C::opt("valor", "NUMERIC(12,2)"),
        C::opt("data_concessao", "DATE").format(Format::Date),
        C::opt("data_fim", "DATE").format(Format::Date),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "data_concessao",
    ascending: false,
};

pub const ATENDIMENTOS: TableDef = TableDef {
    name: "assistencia_social_atendimentos",
    module: MODULE,
    columns: &[
        C::opt("familia_id", "UUID").format(Format::Uuid),
        C::req("tipo_atendimento", "TEXT"),
        C::opt("descricao", "TEXT"),
        C::req("data_atendimento", "DATE").format(Format::Date),
        C::opt("profissional", "TEXT"),
        C::opt("status", "TEXT").default_expr("'realizado'"),
    ],
    order_by: "data_atendimento",
    ascending: false,
};

pub const TABLES: &[TableDef] = &[FAMILIAS, BENEFICIOS, ATENDIMENTOS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Familia {
    #[serde(flatten)]
    pub meta: Envelope,
    pub responsavel_nome: String,
    #[serde(default)]
    pub cpf_responsavel: Option<String>,
    #[serde(default)]
    pub nis: Option<String>,
    #[serde(default)]
    pub renda_familiar: Option<f64>,
    #[serde(default)]
    pub membros: Option<i32>,
    #[serde(default)]
    pub vulnerabilidades: Option<Vec<String>>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Beneficio {
    #[serde(flatten)]
    pub meta: Envelope,
    pub familia_id: String,
    pub tipo_beneficio: String,
    #[serde(default)]
    pub valor: Option<f64>,
    #[serde(default)]
    pub data_concessao: Option<NaiveDate>,
    #[serde(default)]
    pub data_fim: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AtendimentoSocial {
    #[serde(flatten)]
    pub meta: Envelope,
    #[serde(default)]
    pub familia_id: Option<String>,
    pub tipo_atendimento: String,
    #[serde(default)]
    pub descricao: Option<String>,
    pub data_atendimento: NaiveDate,
    #[serde(default)]
    pub profissional: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AssistenciaSocialDashboard {
    pub familias_ativas: u64,
    pub beneficios_ativos: u64,
    /// Sum of `valor` over active benefits.
    pub valor_beneficios_ativos: f64,
    pub atendimentos: u64,
}

#[derive(Clone)]
pub struct AssistenciaSocial {
    pub familias: EntityCrud<Familia>,
    pub beneficios: EntityCrud<Beneficio>,
    pub atendimentos: EntityCrud<AtendimentoSocial>,
}

impl AssistenciaSocial {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        AssistenciaSocial {
            familias: ctx.bind(&FAMILIAS, tenant_id),
            beneficios: ctx.bind(&BENEFICIOS, tenant_id),
            atendimentos: ctx.bind(&ATENDIMENTOS, tenant_id),
        }
    }

    pub async fn beneficios_da_familia(&self, familia_id: &str) -> Result<Vec<Beneficio>, AppError> {
        self.beneficios
            .list(&Filters::new().eq("familia_id", familia_id), None)
            .await
    }

    pub async fn dashboard(&self) -> Result<AssistenciaSocialDashboard, AppError> {
        let ativos = Filters::new().eq("status", status::ATIVO);
        let todos = Filters::new();
        let (familias_ativas, beneficios, atendimentos) = tokio::try_join!(
            self.familias.stats(&ativos),
            self.beneficios.list(&ativos, None),
            self.atendimentos.stats(&todos),
        )?;
        let valor: f64 = beneficios.iter().filter_map(|b| b.valor).sum();
        Ok(AssistenciaSocialDashboard {
            familias_ativas,
            beneficios_ativos: beneficios.len() as u64,
            valor_beneficios_ativos: (valor * 100.0).round() / 100.0,
            atendimentos,
        })
    }
}
