//! Tourism: attractions, tourist events and registered businesses.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Contato, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "turismo";

pub const PONTOS: TableDef = TableDef {
    name: "turismo_pontos",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("descricao", "TEXT"),
        C::opt("categoria", "TEXT"),
        C::opt("horario_funcionamento", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const EVENTOS: TableDef = TableDef {
    name: "turismo_eventos",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("descricao", "TEXT"),
        C::req("data_inicio", "DATE").format(Format::Date),
        C::opt("data_fim", "DATE").format(Format::Date),
        C::opt("local", "TEXT"),
        C::opt("status", "TEXT").default_expr("'planejado'"),
    ],
    order_by: "data_inicio",
    ascending: false,
};

pub const ESTABELECIMENTOS: TableDef = TableDef {
    name: "turismo_estabelecimentos",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::req("tipo", "TEXT"),
        C::opt("cadastur", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const TABLES: &[TableDef] = &[PONTOS, EVENTOS, ESTABELECIMENTOS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PontoTuristico {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub categoria: Option<String>,
    #[serde(default)]
    pub horario_funcionamento: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventoTuristico {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    pub data_inicio: NaiveDate,
    #[serde(default)]
    pub data_fim: Option<NaiveDate>,
    #[serde(default)]
    pub local: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Estabelecimento {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    pub tipo: String,
    #[serde(default)]
    pub cadastur: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TurismoDashboard {
    pub pontos_ativos: u64,
    pub eventos_planejados: u64,
    pub estabelecimentos_ativos: u64,
}

#[derive(Clone)]
pub struct Turismo {
    pub pontos: EntityCrud<PontoTuristico>,
    pub eventos: EntityCrud<EventoTuristico>,
    pub estabelecimentos: EntityCrud<Estabelecimento>,
}

impl Turismo {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        Turismo {
            pontos: ctx.bind(&PONTOS, tenant_id),
            eventos: ctx.bind(&EVENTOS, tenant_id),
            estabelecimentos: ctx.bind(&ESTABELECIMENTOS, tenant_id),
        }
    }

    pub async fn pontos_por_categoria(&self, categoria: &str) -> Result<Vec<PontoTuristico>, AppError> {
        self.pontos.list(&Filters::new().eq("categoria", categoria), None).await
    }

    pub async fn dashboard(&self) -> Result<TurismoDashboard, AppError> {
        let ativos = Filters::new().eq("status", status::ATIVO);
        let filtro_planejado = Filters::new().eq("status", "planejado");
        let (pontos_ativos, eventos_planejados, estabelecimentos_ativos) = tokio::try_join!(
            self.pontos.stats(&ativos),
            self.eventos.stats(&filtro_planejado),
            self.estabelecimentos.stats(&ativos),
        )?;
        Ok(TurismoDashboard {
            pontos_ativos,
            eventos_planejados,
            estabelecimentos_ativos,
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
    async fn attractions_of_a_category_by_name_and_dashboard_counts() {
        let store = MemoryStore::new();
        let t = Turismo::new(&DataContext::with_defaults(Arc::new(store.clone())), "t1");
        for (nome, categoria, status) in [
            ("Mirante do Sol", "natureza", "ativo"),
            ("Cachoeira Azul", "natureza", "ativo"),
            ("Museu Historico", "cultura", "inativo"),
        ] {
            t.pontos
                .create(&json!({"nome": nome, "categoria": categoria, "status": status}))
                .await
                .unwrap();
        }
        t.eventos
            .create(&json!({"nome": "Festa do Milho", "data_inicio": "2026-06-20", "status": "planejado"}))
            .await
            .unwrap();
        t.estabelecimentos
            .create(&json!({"nome": "Pousada Rio", "tipo": "hospedagem", "status": "ativo"}))
            .await
            .unwrap();

        let nomes: Vec<String> = t
            .pontos_por_categoria("natureza")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.nome)
            .collect();
        assert_eq!(nomes, ["Cachoeira Azul", "Mirante do Sol"]);

        let painel = t.dashboard().await.unwrap();
        assert_eq!(painel.pontos_ativos, 2);
        assert_eq!(painel.eventos_planejados, 1);
        assert_eq!(painel.estabelecimentos_ativos, 1);
    }
}
