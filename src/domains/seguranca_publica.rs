//! Public security: incident reports and patrol rounds.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "seguranca_publica";

pub const OCORRENCIAS: TableDef = TableDef {
    name: "seguranca_publica_ocorrencias",
    module: MODULE,
    columns: &[
        C::req("tipo", "TEXT"),
        C::opt("descricao", "TEXT").max_len(4000),
        C::opt("endereco", "JSONB"),
        C::opt("data_ocorrencia", "TIMESTAMPTZ"),
        C::opt("gravidade", "TEXT").default_expr("'media'"),
        C::opt("status", "TEXT").default_expr("'registrada'"),
    ],
    order_by: "data_ocorrencia",
    ascending: false,
};

pub const RONDAS: TableDef = TableDef {
    name: "seguranca_publica_rondas",
    module: MODULE,
    columns: &[
        C::req("area", "TEXT"),
        C::req("data", "DATE").format(Format::Date),
        C::opt("equipe", "TEXT"),
        C::opt("observacoes", "TEXT"),
        C::opt("status", "TEXT").default_expr("'programada'"),
    ],
    order_by: "data",
    ascending: false,
};

pub const TABLES: &[TableDef] = &[OCORRENCIAS, RONDAS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ocorrencia {
    #[serde(flatten)]
    pub meta: Envelope,
    pub tipo: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub data_ocorrencia: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gravidade: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ronda {
    #[serde(flatten)]
    pub meta: Envelope,
    pub area: String,
    pub data: NaiveDate,
    #[serde(default)]
    pub equipe: Option<String>,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SegurancaDashboard {
    pub ocorrencias_registradas: u64,
    pub ocorrencias_em_atendimento: u64,
    pub ocorrencias_resolvidas: u64,
    pub rondas_programadas: u64,
}

#[derive(Clone)]
pub struct SegurancaPublica {
    pub ocorrencias: EntityCrud<Ocorrencia>,
    pub rondas: EntityCrud<Ronda>,
}

impl SegurancaPublica {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        SegurancaPublica {
            ocorrencias: ctx.bind(&OCORRENCIAS, tenant_id),
            rondas: ctx.bind(&RONDAS, tenant_id),
        }
    }

    pub async fn ocorrencias_por_gravidade(&self, gravidade: &str) -> Result<Vec<Ocorrencia>, AppError> {
        self.ocorrencias.list(&Filters::new().eq("gravidade", gravidade), None).await
    }

    pub async fn dashboard(&self) -> Result<SegurancaDashboard, AppError> {
        let filtro_registrada = Filters::new().eq("status", "registrada");
        let filtro_em_atendimento = Filters::new().eq("status", "em_atendimento");
        let filtro_resolvida = Filters::new().eq("status", "resolvida");
        let filtro_programada = Filters::new().eq("status", "programada");
        let (ocorrencias_registradas, ocorrencias_em_atendimento, ocorrencias_resolvidas, rondas_programadas) =
            tokio::try_join!(
                self.ocorrencias.stats(&filtro_registrada),
                self.ocorrencias.stats(&filtro_em_atendimento),
                self.ocorrencias.stats(&filtro_resolvida),
                self.rondas.stats(&filtro_programada),
            )?;
        Ok(SegurancaDashboard {
            ocorrencias_registradas,
            ocorrencias_em_atendimento,
            ocorrencias_resolvidas,
            rondas_programadas,
        })
    }
}
