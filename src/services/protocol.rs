//! Citizen-service protocols: category and service lookup, protocol creation,
//! status changes with an audit trail, assignment and citizen ratings.
//!
//! Status is free text. Any value may follow any other; concurrent updates race
//! and the last write to reach the store wins.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::{Filters, Order};
use crate::validation::RequestValidator;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub const MODULE: &str = "protocolos";

pub const CATEGORIAS: TableDef = TableDef {
    name: "protocolos_categorias",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(120),
        C::opt("descricao", "TEXT"),
        C::opt("icone", "TEXT"),
        C::opt("cor", "TEXT"),
        C::opt("ordem", "INTEGER").default_expr("0"),
        C::opt("ativo", "BOOLEAN").default_expr("TRUE"),
    ],
    order_by: "ordem",
    ascending: true,
};

pub const SERVICOS: TableDef = TableDef {
    name: "protocolos_servicos",
    module: MODULE,
    columns: &[
        C::req("categoria_id", "UUID").format(Format::Uuid),
        C::opt("secretaria_id", "UUID").format(Format::Uuid),
        C::req("nome", "TEXT").max_len(200),
        C::opt("descricao", "TEXT"),
        C::opt("prazo_dias", "INTEGER"),
        C::opt("documentos_necessarios", "JSONB"),
        C::opt("ativo", "BOOLEAN").default_expr("TRUE"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const PROTOCOLOS: TableDef = TableDef {
    name: "protocolos",
    module: MODULE,
    columns: &[
        C::req("numero", "TEXT"),
        C::req("servico_id", "UUID").format(Format::Uuid),
        C::opt("categoria_id", "UUID").format(Format::Uuid),
        C::opt("secretaria_id", "UUID").format(Format::Uuid),
        C::opt("cidadao_id", "TEXT"),
        C::opt("cidadao_nome", "TEXT").max_len(200),
        C::opt("cidadao_email", "TEXT").format(Format::Email),
        C::opt("cidadao_cpf", "TEXT").format(Format::Cpf),
        C::req("assunto", "TEXT").max_len(300),
        C::opt("descricao", "TEXT"),
        C::opt("prioridade", "TEXT").default_expr("'normal'"),
        C::opt("responsavel_id", "TEXT"),
        C::opt("dados_formulario", "JSONB"),
        C::opt("data_vencimento", "DATE").format(Format::Date),
        C::opt("data_conclusao", "TIMESTAMPTZ"),
        C::opt("avaliacao", "INTEGER").range(NOTA_MIN, NOTA_MAX),
        C::opt("status", "TEXT").default_expr("'aberto'"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const HISTORICO: TableDef = TableDef {
    name: "protocolos_historico",
    module: MODULE,
    columns: &[
        C::req("protocolo_id", "UUID").format(Format::Uuid),
        C::req("acao", "TEXT"),
        C::opt("status_anterior", "TEXT"),
        C::opt("status_novo", "TEXT"),
        C::opt("usuario_id", "TEXT"),
        C::opt("observacao", "TEXT"),
    ],
    order_by: "created_at",
    ascending: true,
};

pub const AVALIACOES: TableDef = TableDef {
    name: "protocolos_avaliacoes",
    module: MODULE,
    columns: &[
        C::req("protocolo_id", "UUID").format(Format::Uuid),
        C::opt("cidadao_id", "TEXT"),
        C::req("nota", "INTEGER").range(NOTA_MIN, NOTA_MAX),
        C::opt("comentario", "TEXT").max_len(2000),
    ],
    order_by: "created_at",
    ascending: false,
};

/// Citizen ratings run from 1 to 5.
pub const NOTA_MIN: i64 = 1;
pub const NOTA_MAX: i64 = 5;

pub const TABLES: &[TableDef] = &[CATEGORIAS, SERVICOS, PROTOCOLOS, HISTORICO, AVALIACOES];

/// History actions written by this service.
pub mod acao {
    pub const CRIADO: &str = "criado";
    pub const STATUS_ALTERADO: &str = "status_alterado";
    pub const ATRIBUIDO: &str = "atribuido";
    pub const AVALIADO: &str = "avaliado";
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Categoria {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub icone: Option<String>,
    #[serde(default)]
    pub cor: Option<String>,
    #[serde(default)]
    pub ordem: Option<i32>,
    #[serde(default)]
    pub ativo: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Servico {
    #[serde(flatten)]
    pub meta: Envelope,
    pub categoria_id: String,
    #[serde(default)]
    pub secretaria_id: Option<String>,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub prazo_dias: Option<i64>,
    #[serde(default)]
    pub documentos_necessarios: Option<Vec<String>>,
    #[serde(default)]
    pub ativo: Option<bool>,
}

impl Servico {
    /// Services are active unless explicitly switched off.
    pub fn is_active(&self) -> bool {
        self.ativo.unwrap_or(true)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Protocolo {
    #[serde(flatten)]
    pub meta: Envelope,
    pub numero: String,
    pub servico_id: String,
    #[serde(default)]
    pub categoria_id: Option<String>,
    #[serde(default)]
    pub secretaria_id: Option<String>,
    #[serde(default)]
    pub cidadao_id: Option<String>,
    #[serde(default)]
    pub cidadao_nome: Option<String>,
    #[serde(default)]
    pub cidadao_email: Option<String>,
    #[serde(default)]
    pub cidadao_cpf: Option<String>,
    pub assunto: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub prioridade: Option<String>,
    #[serde(default)]
    pub responsavel_id: Option<String>,
    #[serde(default)]
    pub dados_formulario: Option<Value>,
    #[serde(default)]
    pub data_vencimento: Option<NaiveDate>,
    #[serde(default)]
    pub data_conclusao: Option<DateTime<Utc>>,
    #[serde(default)]
    pub avaliacao: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoricoProtocolo {
    #[serde(flatten)]
    pub meta: Envelope,
    pub protocolo_id: String,
    pub acao: String,
    #[serde(default)]
    pub status_anterior: Option<String>,
    #[serde(default)]
    pub status_novo: Option<String>,
    #[serde(default)]
    pub usuario_id: Option<String>,
    #[serde(default)]
    pub observacao: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Avaliacao {
    #[serde(flatten)]
    pub meta: Envelope,
    pub protocolo_id: String,
    #[serde(default)]
    pub cidadao_id: Option<String>,
    pub nota: i32,
    #[serde(default)]
    pub comentario: Option<String>,
}

/// Citizen request that opens a protocol.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NovoProtocolo {
    pub servico_id: String,
    pub assunto: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub cidadao_id: Option<String>,
    #[serde(default)]
    pub cidadao_nome: Option<String>,
    #[serde(default)]
    pub cidadao_email: Option<String>,
    #[serde(default)]
    pub cidadao_cpf: Option<String>,
    #[serde(default)]
    pub prioridade: Option<String>,
    #[serde(default)]
    pub dados_formulario: Option<Value>,
}

/// `YYYYMMDD-XXXXXXXX`: the opening date followed by eight random hex digits.
pub fn gerar_numero(data: NaiveDate) -> String {
    let sufixo = Uuid::new_v4().simple().to_string();
    format!("{}-{}", data.format("%Y%m%d"), sufixo[..8].to_ascii_uppercase())
}

#[derive(Clone)]
pub struct ProtocolService {
    pub categorias: EntityCrud<Categoria>,
    pub servicos: EntityCrud<Servico>,
    pub protocolos: EntityCrud<Protocolo>,
    pub historico: EntityCrud<HistoricoProtocolo>,
    pub avaliacoes: EntityCrud<Avaliacao>,
}

impl ProtocolService {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        ProtocolService {
            categorias: ctx.bind(&CATEGORIAS, tenant_id),
            servicos: ctx.bind(&SERVICOS, tenant_id),
            protocolos: ctx.bind(&PROTOCOLOS, tenant_id),
            historico: ctx.bind(&HISTORICO, tenant_id),
            avaliacoes: ctx.bind(&AVALIACOES, tenant_id),
        }
    }

    /// Active categories in display order.
    pub async fn list_categories(&self) -> Result<Vec<Categoria>, AppError> {
        self.categorias.list(&Filters::new().eq("ativo", true), None).await
    }

    /// Active services, optionally restricted to one category.
    pub async fn list_services(&self, categoria_id: Option<&str>) -> Result<Vec<Servico>, AppError> {
        let filters = Filters::new().eq("ativo", true).eq_opt("categoria_id", categoria_id);
        self.servicos.list(&filters, None).await
    }

    pub async fn get_service(&self, id: &str) -> Result<Option<Servico>, AppError> {
        self.servicos.get_one(id).await
    }

    async fn get_protocol(&self, id: &str) -> Result<Protocolo, AppError> {
        self.protocolos
            .get_one(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("protocolo {}", id)))
    }

    /// Open a protocol for a service, copying the service's routing onto it.
    pub async fn create_protocol(&self, novo: &NovoProtocolo) -> Result<Protocolo, AppError> {
        let servico = self
            .get_service(&novo.servico_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("servico {}", novo.servico_id)))?;
        if !servico.is_active() {
            return Err(AppError::Validation(format!("servico {} is inactive", servico.nome)));
        }

        let hoje = Utc::now().date_naive();
        let data_vencimento = servico.prazo_dias.map(|d| hoje + Duration::days(d));
        let mut row = Map::new();
        row.insert("numero".into(), json!(gerar_numero(hoje)));
        row.insert("servico_id".into(), json!(servico.meta.id.to_string()));
        row.insert("categoria_id".into(), json!(servico.categoria_id));
        row.insert("secretaria_id".into(), json!(servico.secretaria_id));
        row.insert("assunto".into(), json!(novo.assunto));
        row.insert("descricao".into(), json!(novo.descricao));
        row.insert("cidadao_id".into(), json!(novo.cidadao_id));
        row.insert("cidadao_nome".into(), json!(novo.cidadao_nome));
        row.insert("cidadao_email".into(), json!(novo.cidadao_email));
        row.insert("cidadao_cpf".into(), json!(novo.cidadao_cpf));
        row.insert("prioridade".into(), json!(novo.prioridade.as_deref().unwrap_or("normal")));
        row.insert("dados_formulario".into(), novo.dados_formulario.clone().unwrap_or(Value::Null));
        row.insert("data_vencimento".into(), json!(data_vencimento));
        row.insert("status".into(), json!(status::ABERTO));
        row.retain(|_, v| !v.is_null());
        RequestValidator::validate(&row, &PROTOCOLOS.validation())?;

        let protocolo = self.protocolos.create(&row).await?;
        self.record(
            &protocolo,
            acao::CRIADO,
            None,
            Some(status::ABERTO),
            novo.cidadao_id.as_deref(),
            None,
        )
        .await?;
        tracing::info!(numero = %protocolo.numero, servico = %servico.nome, "protocol created");
        Ok(protocolo)
    }

    /// Write any status and log the transition. `concluido` stamps the completion time.
    pub async fn update_status(
        &self,
        id: &str,
        novo_status: &str,
        usuario_id: Option<&str>,
        observacao: Option<&str>,
    ) -> Result<Protocolo, AppError> {
        if novo_status.trim().is_empty() {
            return Err(AppError::Validation("status is required".into()));
        }
        let atual = self.get_protocol(id).await?;
        let mut patch = json!({ "status": novo_status });
        if novo_status == status::CONCLUIDO {
            patch["data_conclusao"] = json!(Utc::now());
        }
        let atualizado = self.protocolos.update(id, &patch).await?;
        self.record(
            &atualizado,
            acao::STATUS_ALTERADO,
            atual.status.as_deref(),
            Some(novo_status),
            usuario_id,
            observacao,
        )
        .await?;
        tracing::info!(numero = %atualizado.numero, from = ?atual.status, to = novo_status, "protocol status changed");
        Ok(atualizado)
    }

    /// Hand the protocol to an agent.
    pub async fn assign(
        &self,
        id: &str,
        responsavel_id: &str,
        usuario_id: Option<&str>,
    ) -> Result<Protocolo, AppError> {
        if responsavel_id.trim().is_empty() {
            return Err(AppError::Validation("responsavel_id is required".into()));
        }
        let atual = self.get_protocol(id).await?;
        let atualizado = self
            .protocolos
            .update(id, &json!({ "responsavel_id": responsavel_id }))
            .await?;
        let nota = format!("responsavel: {}", responsavel_id);
        self.record(
            &atualizado,
            acao::ATRIBUIDO,
            atual.status.as_deref(),
            atual.status.as_deref(),
            usuario_id,
            Some(&nota),
        )
        .await?;
        Ok(atualizado)
    }

    /// Record a citizen's 1 to 5 grade and mirror it onto the protocol.
    pub async fn submit_rating(
        &self,
        id: &str,
        cidadao_id: Option<&str>,
        nota: i32,
        comentario: Option<&str>,
    ) -> Result<Avaliacao, AppError> {
        if !(NOTA_MIN..=NOTA_MAX).contains(&i64::from(nota)) {
            return Err(AppError::Validation("nota must be between 1 and 5".into()));
        }
        let protocolo = self.get_protocol(id).await?;
        let avaliacao = self
            .avaliacoes
            .create(&json!({
                "protocolo_id": id,
                "cidadao_id": cidadao_id,
                "nota": nota,
                "comentario": comentario,
            }))
            .await?;
        self.protocolos.update(id, &json!({ "avaliacao": nota })).await?;
        self.record(
            &protocolo,
            acao::AVALIADO,
            protocolo.status.as_deref(),
            protocolo.status.as_deref(),
            cidadao_id,
            Some(&format!("nota {}", nota)),
        )
        .await?;
        Ok(avaliacao)
    }

    /// Audit trail, oldest first.
    pub async fn history(&self, id: &str) -> Result<Vec<HistoricoProtocolo>, AppError> {
        self.historico
            .list(&Filters::new().eq("protocolo_id", id), Some(&Order::asc("created_at")))
            .await
    }

    async fn record(
        &self,
        protocolo: &Protocolo,
        acao: &str,
        anterior: Option<&str>,
        novo: Option<&str>,
        usuario_id: Option<&str>,
        observacao: Option<&str>,
    ) -> Result<HistoricoProtocolo, AppError> {
        self.historico
            .create(&json!({
                "protocolo_id": protocolo.meta.id.to_string(),
                "acao": acao,
                "status_anterior": anterior,
                "status_novo": novo,
                "usuario_id": usuario_id,
                "observacao": observacao,
            }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn seeded() -> (MemoryStore, ProtocolService, Servico) {
        let store = MemoryStore::new();
        let svc = ProtocolService::new(&DataContext::with_defaults(Arc::new(store.clone())), "t1");
        let categoria = svc
            .categorias
            .create(&json!({"nome": "Iluminação", "ativo": true, "ordem": 1}))
            .await
            .unwrap();
        let servico = svc
            .servicos
            .create(&json!({
                "categoria_id": categoria.meta.id.to_string(),
                "secretaria_id": "0b7e7c1e-4f7b-4a43-9a4f-3e0cba0d2a11",
                "nome": "Troca de lâmpada",
                "prazo_dias": 5,
                "ativo": true,
            }))
            .await
            .unwrap();
        (store, svc, servico)
    }

    fn pedido(servico: &Servico) -> NovoProtocolo {
        NovoProtocolo {
            servico_id: servico.meta.id.to_string(),
            assunto: "Poste apagado".into(),
            cidadao_id: Some("u-42".into()),
            ..NovoProtocolo::default()
        }
    }

    #[test]
    fn numero_has_date_and_hex_suffix() {
        let n = gerar_numero(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
        let (data, sufixo) = n.split_once('-').unwrap();
        assert_eq!(data, "20260309");
        assert_eq!(sufixo.len(), 8);
        assert!(sufixo.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn creation_copies_routing_and_logs_once() {
        let (_store, svc, servico) = seeded().await;
        let p = svc.create_protocol(&pedido(&servico)).await.unwrap();

        assert_eq!(p.categoria_id.as_deref(), Some(servico.categoria_id.as_str()));
        assert_eq!(p.secretaria_id, servico.secretaria_id);
        assert_eq!(p.status.as_deref(), Some(status::ABERTO));
        assert_eq!(p.meta.tenant_id.as_deref(), Some("t1"));
        assert_eq!(
            p.data_vencimento,
            Some(Utc::now().date_naive() + Duration::days(5))
        );

        let hist = svc.history(&p.meta.id.to_string()).await.unwrap();
        assert_eq!(hist.len(), 1);
        assert_eq!(hist[0].acao, acao::CRIADO);
    }

    #[tokio::test]
    async fn missing_or_inactive_service_is_rejected() {
        let (store, svc, servico) = seeded().await;
        let mut novo = pedido(&servico);
        novo.servico_id = Uuid::new_v4().to_string();
        assert!(matches!(svc.create_protocol(&novo).await, Err(AppError::NotFound(_))));

        svc.servicos
            .update(&servico.meta.id.to_string(), &json!({"ativo": false}))
            .await
            .unwrap();
        assert!(matches!(
            svc.create_protocol(&pedido(&servico)).await,
            Err(AppError::Validation(_))
        ));
        assert!(store.rows("protocolos").is_empty());
    }

    #[tokio::test]
    async fn status_changes_are_free_form_and_audited() {
        let (_store, svc, servico) = seeded().await;
        let p = svc.create_protocol(&pedido(&servico)).await.unwrap();
        let id = p.meta.id.to_string();

        let p = svc.update_status(&id, status::CONCLUIDO, Some("agente"), None).await.unwrap();
        assert!(p.data_conclusao.is_some());
        let p = svc.update_status(&id, status::ABERTO, Some("agente"), Some("reaberto")).await.unwrap();
        assert_eq!(p.status.as_deref(), Some(status::ABERTO));

        let hist = svc.history(&id).await.unwrap();
        let acoes: Vec<_> = hist.iter().map(|h| h.acao.as_str()).collect();
        assert_eq!(acoes, [acao::CRIADO, acao::STATUS_ALTERADO, acao::STATUS_ALTERADO]);
        assert_eq!(hist[1].status_anterior.as_deref(), Some(status::ABERTO));
        assert_eq!(hist[1].status_novo.as_deref(), Some(status::CONCLUIDO));
        assert_eq!(hist[2].observacao.as_deref(), Some("reaberto"));
    }

    #[tokio::test]
    async fn ratings_are_bounded_and_mirrored() {
        let (_store, svc, servico) = seeded().await;
        let p = svc.create_protocol(&pedido(&servico)).await.unwrap();
        let id = p.meta.id.to_string();

        assert!(matches!(svc.submit_rating(&id, None, 0, None).await, Err(AppError::Validation(_))));
        assert!(matches!(svc.submit_rating(&id, None, 6, None).await, Err(AppError::Validation(_))));

        let a = svc.submit_rating(&id, Some("u-42"), 4, Some("rápido")).await.unwrap();
        assert_eq!(a.nota, 4);
        let p = svc.protocolos.get_one(&id).await.unwrap().unwrap();
        assert_eq!(p.avaliacao, Some(4));
        assert_eq!(svc.history(&id).await.unwrap().last().unwrap().acao, acao::AVALIADO);
    }

    #[tokio::test]
    async fn assignment_sets_responsible_agent() {
        let (_store, svc, servico) = seeded().await;
        let p = svc.create_protocol(&pedido(&servico)).await.unwrap();
        let id = p.meta.id.to_string();
        let p = svc.assign(&id, "agente-7", Some("gestor")).await.unwrap();
        assert_eq!(p.responsavel_id.as_deref(), Some("agente-7"));
        assert_eq!(svc.history(&id).await.unwrap()[1].acao, acao::ATRIBUIDO);
        assert!(matches!(svc.assign("missing", "x", None).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn only_active_categories_are_listed() {
        let (_store, svc, _servico) = seeded().await;
        svc.categorias
            .create(&json!({"nome": "Antiga", "ativo": false, "ordem": 2}))
            .await
            .unwrap();
        let cats = svc.list_categories().await.unwrap();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].nome, "Iluminação");
        assert_eq!(svc.list_services(None).await.unwrap().len(), 1);
        assert!(svc.list_services(Some("other")).await.unwrap().is_empty());
    }
}
