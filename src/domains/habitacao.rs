//! Housing secretariat: housing programs, applications and housing units.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Contato, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::{Filters, Order};
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "habitacao";

pub const PROGRAMAS: TableDef = TableDef {
    name: "habitacao_programas",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("descricao", "TEXT"),
        C::opt("unidades_previstas", "INTEGER"),
        C::opt("renda_maxima", "NUMERIC(12,2)"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const INSCRICOES: TableDef = TableDef {
    name: "habitacao_inscricoes",
    module: MODULE,
    columns: &[
        C::req("programa_id", "UUID").format(Format::Uuid),
        C::req("responsavel_nome", "TEXT").max_len(200),
        C::opt("cpf", "TEXT").format(Format::Cpf),
        C::opt("renda_familiar", "NUMERIC(12,2)"),
        C::opt("pontuacao", "INTEGER"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'inscrito'"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const UNIDADES: TableDef = TableDef {
    name: "habitacao_unidades",
    module: MODULE,
    columns: &[
        C::req("programa_id", "UUID").format(Format::Uuid),
        C::opt("inscricao_id", "UUID").format(Format::Uuid),
        C::opt("endereco", "JSONB"),
        C::opt("area_m2", "NUMERIC(8,2)"),
        C::opt("status", "TEXT").default_expr("'em_construcao'"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const TABLES: &[TableDef] = &[PROGRAMAS, INSCRICOES, UNIDADES];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgramaHabitacional {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub unidades_previstas: Option<i32>,
    #[serde(default)]
    pub renda_maxima: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Inscricao {
    #[serde(flatten)]
    pub meta: Envelope,
    pub programa_id: String,
    pub responsavel_nome: String,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub renda_familiar: Option<f64>,
    #[serde(default)]
    pub pontuacao: Option<i32>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnidadeHabitacional {
    #[serde(flatten)]
    pub meta: Envelope,
    pub programa_id: String,
    #[serde(default)]
    pub inscricao_id: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub area_m2: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HabitacaoDashboard {
    pub programas_ativos: u64,
    pub inscricoes_pendentes: u64,
    pub unidades_entregues: u64,
}

#[derive(Clone)]
pub struct Habitacao {
    pub programas: EntityCrud<ProgramaHabitacional>,
    pub inscricoes: EntityCrud<Inscricao>,
    pub unidades: EntityCrud<UnidadeHabitacional>,
}

impl Habitacao {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        Habitacao {
            programas: ctx.bind(&PROGRAMAS, tenant_id),
            inscricoes: ctx.bind(&INSCRICOES, tenant_id),
            unidades: ctx.bind(&UNIDADES, tenant_id),
        }
    }

    /// Applications to one program, highest score first.
    pub async fn classificacao(&self, programa_id: &str) -> Result<Vec<Inscricao>, AppError> {
        self.inscricoes
            .list(
                &Filters::new().eq("programa_id", programa_id),
                Some(&Order::desc("pontuacao")),
            )
            .await
    }

    pub async fn dashboard(&self) -> Result<HabitacaoDashboard, AppError> {
        let filtro_inscrito = Filters::new().eq("status", "inscrito");
        let filtro_entregue = Filters::new().eq("status", "entregue");
        let filtro_ativo = Filters::new().eq("status", status::ATIVO);
        let (programas_ativos, inscricoes_pendentes, unidades_entregues) = tokio::try_join!(
            self.programas.stats(&filtro_ativo),
            self.inscricoes.stats(&filtro_inscrito),
            self.unidades.stats(&filtro_entregue),
        )?;
        Ok(HabitacaoDashboard {
            programas_ativos,
            inscricoes_pendentes,
            unidades_entregues,
        })
    }
}
