//! Education secretariat: schools, students and teachers.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Contato, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::{Filters, Order};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MODULE: &str = "educacao";

pub const ESCOLAS: TableDef = TableDef {
    name: "educacao_escolas",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("codigo_inep", "TEXT").max_len(8),
        C::opt("tipo", "TEXT"),
        C::opt("capacidade_alunos", "INTEGER"),
        C::opt("endereco", "JSONB"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const ALUNOS: TableDef = TableDef {
    name: "educacao_alunos",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("cpf", "TEXT").format(Format::Cpf),
        C::req("data_nascimento", "DATE").format(Format::Date),
        C::opt("escola_id", "UUID").format(Format::Uuid),
        C::opt("serie", "TEXT"),
        C::opt("turno", "TEXT"),
        C::opt("responsavel_nome", "TEXT"),
        C::opt("contato", "JSONB"),
        C::opt("endereco", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const PROFESSORES: TableDef = TableDef {
    name: "educacao_professores",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("cpf", "TEXT").format(Format::Cpf),
        C::opt("email", "TEXT").format(Format::Email),
        C::opt("disciplina", "TEXT"),
        C::opt("escola_id", "UUID").format(Format::Uuid),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const TABLES: &[TableDef] = &[ESCOLAS, ALUNOS, PROFESSORES];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Escola {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub codigo_inep: Option<String>,
    #[serde(default)]
    pub tipo: Option<String>,
    #[serde(default)]
    pub capacidade_alunos: Option<i32>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Aluno {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub cpf: Option<String>,
    pub data_nascimento: NaiveDate,
    #[serde(default)]
    pub escola_id: Option<String>,
    #[serde(default)]
    pub serie: Option<String>,
    #[serde(default)]
    pub turno: Option<String>,
    #[serde(default)]
    pub responsavel_nome: Option<String>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Professor {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub disciplina: Option<String>,
    #[serde(default)]
    pub escola_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EducacaoDashboard {
    pub escolas_ativas: u64,
    pub alunos_ativos: u64,
    pub professores_ativos: u64,
}

#[derive(Clone)]
pub struct Educacao {
    pub escolas: EntityCrud<Escola>,
    pub alunos: EntityCrud<Aluno>,
    pub professores: EntityCrud<Professor>,
}

impl Educacao {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        Educacao {
            escolas: ctx.bind(&ESCOLAS, tenant_id),
            alunos: ctx.bind(&ALUNOS, tenant_id),
            professores: ctx.bind(&PROFESSORES, tenant_id),
        }
    }

    /// Students of one school, optionally one shift, by name.
    pub async fn alunos_da_escola(&self, escola_id: &str, turno: Option<&str>) -> Result<Vec<Aluno>, AppError> {
        let filters = Filters::new().eq("escola_id", escola_id).eq_opt("turno", turno);
        self.alunos.list(&filters, Some(&Order::asc("nome"))).await
    }

    pub async fn dashboard(&self) -> Result<EducacaoDashboard, AppError> {
        let ativos = Filters::new().eq("status", status::ATIVO);
        let (escolas_ativas, alunos_ativos, professores_ativos) = tokio::try_join!(
            self.escolas.stats(&ativos),
            self.alunos.stats(&ativos),
            self.professores.stats(&ativos),
        )?;
        Ok(EducacaoDashboard {
            escolas_ativas,
            alunos_ativos,
            professores_ativos,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn educacao(store: &MemoryStore, tenant: &str) -> Educacao {
        Educacao::new(&DataContext::with_defaults(Arc::new(store.clone())), tenant)
    }

    async fn matricular(e: &Educacao, escola_id: &str, nome: &str, turno: &str) {
        e.alunos
            .create(&json!({
                "nome": nome,
                "data_nascimento": "2015-03-02",
                "escola_id": escola_id,
                "turno": turno,
                "status": "ativo",
            }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn students_of_a_school_by_name_with_optional_shift() {
        let store = MemoryStore::new();
        let e = educacao(&store, "t1");
        let escola = e.escolas.create(&json!({"nome": "EM Centro"})).await.unwrap();
        let id = escola.meta.id.to_string();
        matricular(&e, &id, "Marina", "manha").await;
        matricular(&e, &id, "Caio", "tarde").await;
        matricular(&e, &id, "Lia", "manha").await;
        matricular(&e, &uuid::Uuid::new_v4().to_string(), "Beto", "manha").await;

        let todos: Vec<String> = e
            .alunos_da_escola(&id, None)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.nome)
            .collect();
        assert_eq!(todos, ["Caio", "Lia", "Marina"]);

        let manha: Vec<String> = e
            .alunos_da_escola(&id, Some("manha"))
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.nome)
            .collect();
        assert_eq!(manha, ["Lia", "Marina"]);
    }

    #[tokio::test]
    async fn schools_list_by_name_and_dashboard_counts_active_rows() {
        let store = MemoryStore::new();
        let e = educacao(&store, "t1");
        for (nome, status) in [("EM Sul", "ativo"), ("EM Norte", "inativo"), ("EM Leste", "ativo")] {
            e.escolas.create(&json!({"nome": nome, "status": status})).await.unwrap();
        }
        let escola = uuid::Uuid::new_v4().to_string();
        matricular(&e, &escola, "Ana", "manha").await;
        e.professores.create(&json!({"nome": "Rita", "status": "ativo"})).await.unwrap();
        e.professores.create(&json!({"nome": "Joao", "status": "afastado"})).await.unwrap();
        educacao(&store, "t2")
            .escolas
            .create(&json!({"nome": "EM Alheia", "status": "ativo"}))
            .await
            .unwrap();

        let nomes: Vec<String> = e
            .escolas
            .list(&Filters::new(), None)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.nome)
            .collect();
        assert_eq!(nomes, ["EM Leste", "EM Norte", "EM Sul"]);

        let painel = e.dashboard().await.unwrap();
        assert_eq!(painel.escolas_ativas, 2);
        assert_eq!(painel.alunos_ativos, 1);
        assert_eq!(painel.professores_ativos, 1);
    }
}
