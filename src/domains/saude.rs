//! Health secretariat: patients, health units and appointments.
//!
//! Patients are listed by name; appointments newest first. The dashboard counts
//! active patients and units plus appointments by status.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Contato, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "saude";

pub const PACIENTES: TableDef = TableDef {
    name: "saude_pacientes",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("cpf", "TEXT").format(Format::Cpf),
        C::opt("cartao_sus", "TEXT").max_len(15),
        C::opt("data_nascimento", "DATE").format(Format::Date),
        C::opt("sexo", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const UNIDADES: TableDef = TableDef {
    name: "saude_unidades",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::req("tipo", "TEXT"),
        C::opt("cnes", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const AGENDAMENTOS: TableDef = TableDef {
    name: "saude_agendamentos",
    module: MODULE,
    columns: &[
        C::req("paciente_id", "UUID").format(Format::Uuid),
        C::opt("unidade_id", "UUID").format(Format::Uuid),
        C::req("especialidade", "TEXT"),
        C::opt("profissional", "TEXT"),
        C::req("data_hora", "TIMESTAMPTZ"),
        C::opt("observacoes", "TEXT"),
        C::opt("status", "TEXT").default_expr("'agendado'"),
    ],
    order_by: "data_hora",
    ascending: false,
};

pub const TABLES: &[TableDef] = &[PACIENTES, UNIDADES, AGENDAMENTOS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Paciente {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub cartao_sus: Option<String>,
    #[serde(default)]
    pub data_nascimento: Option<NaiveDate>,
    #[serde(default)]
    pub sexo: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnidadeSaude {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    pub tipo: String,
    #[serde(default)]
    pub cnes: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agendamento {
    #[serde(flatten)]
    pub meta: Envelope,
    pub paciente_id: String,
    #[serde(default)]
    pub unidade_id: Option<String>,
    pub especialidade: String,
    #[serde(default)]
    pub profissional: Option<String>,
    pub data_hora: DateTime<Utc>,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SaudeDashboard {
    pub pacientes_ativos: u64,
    pub unidades_ativas: u64,
    pub agendamentos_pendentes: u64,
    pub agendamentos_realizados: u64,
}

/// Health bindings for one tenant.
#[derive(Clone)]
pub struct Saude {
    pub pacientes: EntityCrud<Paciente>,
    pub unidades: EntityCrud<UnidadeSaude>,
    pub agendamentos: EntityCrud<Agendamento>,
}

impl Saude {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        Saude {
            pacientes: ctx.bind(&PACIENTES, tenant_id),
            unidades: ctx.bind(&UNIDADES, tenant_id),
            agendamentos: ctx.bind(&AGENDAMENTOS, tenant_id),
        }
    }

    pub async fn agendamentos_do_paciente(&self, paciente_id: &str) -> Result<Vec<Agendamento>, AppError> {
        self.agendamentos
            .list(&Filters::new().eq("paciente_id", paciente_id), None)
            .await
    }

    pub async fn dashboard(&self) -> Result<SaudeDashboard, AppError> {
        let ativos = Filters::new().eq("status", status::ATIVO);
        let filtro_agendado = Filters::new().eq("status", "agendado");
        let filtro_realizado = Filters::new().eq("status", "realizado");
        let (pacientes_ativos, unidades_ativas, agendamentos_pendentes, agendamentos_realizados) = tokio::try_join!(
            self.pacientes.stats(&ativos),
            self.unidades.stats(&ativos),
            self.agendamentos.stats(&filtro_agendado),
            self.agendamentos.stats(&filtro_realizado),
        )?;
        Ok(SaudeDashboard {
            pacientes_ativos,
            unidades_ativas,
            agendamentos_pendentes,
            agendamentos_realizados,
        })
    }
}
