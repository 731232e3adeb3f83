//! Urban planning: building permits and urban projects.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "planejamento_urbano";

pub const ALVARAS: TableDef = TableDef {
    name: "planejamento_urbano_alvaras",
    module: MODULE,
    columns: &[
        C::req("requerente", "TEXT").max_len(200),
        C::req("tipo_alvara", "TEXT"),
        C::opt("numero_processo", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("area_construida", "NUMERIC(10,2)"),
        C::opt("data_emissao", "DATE").format(Format::Date),
        C::opt("data_validade", "DATE").format(Format::Date),
        C::opt("status", "TEXT").default_expr("'em_analise'"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const PROJETOS: TableDef = TableDef {
    name: "planejamento_urbano_projetos",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("descricao", "TEXT"),
        C::opt("bairro", "TEXT"),
        C::opt("area_m2", "NUMERIC(12,2)"),
        C::opt("status", "TEXT").default_expr("'em_elaboracao'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const TABLES: &[TableDef] = &[ALVARAS, PROJETOS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alvara {
    #[serde(flatten)]
    pub meta: Envelope,
    pub requerente: String,
    pub tipo_alvara: String,
    #[serde(default)]
    pub numero_processo: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub area_construida: Option<f64>,
    #[serde(default)]
    pub data_emissao: Option<NaiveDate>,
    #[serde(default)]
    pub data_validade: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjetoUrbano {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub bairro: Option<String>,
    #[serde(default)]
    pub area_m2: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PlanejamentoDashboard {
    pub alvaras_em_analise: u64,
    pub alvaras_aprovados: u64,
    pub projetos: u64,
}

#[derive(Clone)]
pub struct PlanejamentoUrbano {
    pub alvaras: EntityCrud<Alvara>,
    pub projetos: EntityCrud<ProjetoUrbano>,
}

impl PlanejamentoUrbano {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        PlanejamentoUrbano {
            alvaras: ctx.bind(&ALVARAS, tenant_id),
            projetos: ctx.bind(&PROJETOS, tenant_id),
        }
    }

    pub async fn projetos_do_bairro(&self, bairro: &str) -> Result<Vec<ProjetoUrbano>, AppError> {
        self.projetos.list(&Filters::new().eq("bairro", bairro), None).await
    }

    pub async fn dashboard(&self) -> Result<PlanejamentoDashboard, AppError> {
        let filtro_em_analise = Filters::new().eq("status", "em_analise");
        let filtro_aprovado = Filters::new().eq("status", "aprovado");
        let todos = Filters::new();
        let (alvaras_em_analise, alvaras_aprovados, projetos) = tokio::try_join!(
            self.alvaras.stats(&filtro_em_analise),
            self.alvaras.stats(&filtro_aprovado),
            self.projetos.stats(&todos),
        )?;
        Ok(PlanejamentoDashboard {
            alvaras_em_analise,
            alvaras_aprovados,
            projetos,
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
    async fn projects_of_a_district_by_name_and_dashboard_counts() {
        let store = MemoryStore::new();
        let p = PlanejamentoUrbano::new(&DataContext::with_defaults(Arc::new(store.clone())), "t1");
        for (nome, bairro) in [("Via Parque", "Centro"), ("Ciclovia", "Centro"), ("Mirante", "Alto")] {
            p.projetos.create(&json!({"nome": nome, "bairro": bairro})).await.unwrap();
        }
        for status in ["em_analise", "aprovado", "aprovado"] {
            p.alvaras
                .create(&json!({"requerente": "Construtora", "tipo_alvara": "obra", "status": status}))
                .await
                .unwrap();
        }

        let nomes: Vec<String> = p
            .projetos_do_bairro("Centro")
            .await
            .unwrap()
            .into_iter()
            .map(|x| x.nome)
            .collect();
        assert_eq!(nomes, ["Ciclovia", "Via Parque"]);

        let painel = p.dashboard().await.unwrap();
        assert_eq!(painel.alvaras_em_analise, 1);
        assert_eq!(painel.alvaras_aprovados, 2);
        assert_eq!(painel.projetos, 3);
    }
}
