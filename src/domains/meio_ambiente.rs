//! Environment secretariat: environmental licenses, complaints and protected areas.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "meio_ambiente";

pub const LICENCAS: TableDef = TableDef {
    name: "meio_ambiente_licencas",
    module: MODULE,
    columns: &[
        C::req("requerente", "TEXT").max_len(200),
        C::req("tipo_licenca", "TEXT"),
        C::opt("atividade", "TEXT"),
        C::opt("numero_processo", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("data_emissao", "DATE").format(Format::Date),
        C::opt("data_validade", "DATE").format(Format::Date),
        C::opt("status", "TEXT").default_expr("'em_analise'"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const DENUNCIAS: TableDef = TableDef {
    name: "meio_ambiente_denuncias",
    module: MODULE,
    columns: &[
        C::req("tipo", "TEXT"),
        C::req("descricao", "TEXT").max_len(4000),
        C::opt("endereco", "JSONB"),
        C::opt("anonima", "BOOLEAN").default_expr("FALSE"),
        C::opt("denunciante_nome", "TEXT"),
        C::opt("status", "TEXT").default_expr("'aberta'"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const AREAS_PROTEGIDAS: TableDef = TableDef {
    name: "meio_ambiente_areas_protegidas",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("tipo", "TEXT"),
        C::opt("area_hectares", "NUMERIC(12,2)"),
        C::opt("descricao", "TEXT"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const TABLES: &[TableDef] = &[LICENCAS, DENUNCIAS, AREAS_PROTEGIDAS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LicencaAmbiental {
    #[serde(flatten)]
    pub meta: Envelope,
    pub requerente: String,
    pub tipo_licenca: String,
    #[serde(default)]
    pub atividade: Option<String>,
    #[serde(default)]
    pub numero_processo: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub data_emissao: Option<NaiveDate>,
    #[serde(default)]
    pub data_validade: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DenunciaAmbiental {
    #[serde(flatten)]
    pub meta: Envelope,
    pub tipo: String,
    pub descricao: String,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub anonima: Option<bool>,
    #[serde(default)]
    pub denunciante_nome: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AreaProtegida {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub tipo: Option<String>,
    #[serde(default)]
    pub area_hectares: Option<f64>,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MeioAmbienteDashboard {
    pub licencas_em_analise: u64,
    pub licencas_emitidas: u64,
    pub denuncias_abertas: u64,
    pub areas_protegidas: u64,
    pub hectares_protegidos: f64,
}

#[derive(Clone)]
pub struct MeioAmbiente {
    pub licencas: EntityCrud<LicencaAmbiental>,
    pub denuncias: EntityCrud<DenunciaAmbiental>,
    pub areas_protegidas: EntityCrud<AreaProtegida>,
}

impl MeioAmbiente {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        MeioAmbiente {
            licencas: ctx.bind(&LICENCAS, tenant_id),
            denuncias: ctx.bind(&DENUNCIAS, tenant_id),
            areas_protegidas: ctx.bind(&AREAS_PROTEGIDAS, tenant_id),
        }
    }

    pub async fn dashboard(&self) -> Result<MeioAmbienteDashboard, AppError> {
        let filtro_em_analise = Filters::new().eq("status", "em_analise");
        let filtro_emitida = Filters::new().eq("status", "emitida");
        let filtro_aberta = Filters::new().eq("status", "aberta");
        let filtro_ativo = Filters::new().eq("status", status::ATIVO);
        let (licencas_em_analise, licencas_emitidas, denuncias_abertas, areas) = tokio::try_join!(
            self.licencas.stats(&filtro_em_analise),
            self.licencas.stats(&filtro_emitida),
            self.denuncias.stats(&filtro_aberta),
            self.areas_protegidas.list(&filtro_ativo, None),
        )?;
        let hectares: f64 = areas.iter().filter_map(|a| a.area_hectares).sum();
        Ok(MeioAmbienteDashboard {
            licencas_em_analise,
            licencas_emitidas,
            denuncias_abertas,
            areas_protegidas: areas.len() as u64,
            hectares_protegidos: (hectares * 100.0).round() / 100.0,
        })
    }
}
