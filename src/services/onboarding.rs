//! Tenant onboarding checklist: a fixed catalogue of steps with per-tenant completion rows.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::Envelope;
use crate::schema::{ColumnDef as C, TableDef};
use crate::store::Filters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MODULE: &str = "onboarding";

pub const PROGRESSO: TableDef = TableDef {
    name: "onboarding_progresso",
    module: MODULE,
    columns: &[
        C::req("etapa", "TEXT").one_of(ETAPAS),
        C::opt("concluida", "BOOLEAN").default_expr("FALSE"),
        C::opt("concluida_em", "TIMESTAMPTZ"),
        C::opt("dados", "JSONB"),
    ],
    order_by: "created_at",
    ascending: true,
};

pub const TABLES: &[TableDef] = &[PROGRESSO];

/// Steps in the order a new municipality goes through them.
pub const ETAPAS: &[&str] = &[
    "dados_municipio",
    "identidade_visual",
    "secretarias",
    "usuarios",
    "servicos",
    "publicacao",
];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EtapaProgresso {
    #[serde(flatten)]
    pub meta: Envelope,
    pub etapa: String,
    #[serde(default)]
    pub concluida: Option<bool>,
    #[serde(default)]
    pub concluida_em: Option<DateTime<Utc>>,
    #[serde(default)]
    pub dados: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResumoOnboarding {
    pub total: usize,
    pub concluidas: usize,
    pub percentual: u8,
    pub etapas_concluidas: Vec<String>,
    /// First catalogue step not yet completed; `None` once everything is done.
    pub proxima_etapa: Option<String>,
}

fn known(etapa: &str) -> Result<(), AppError> {
    if ETAPAS.contains(&etapa) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("unknown onboarding step {}", etapa)))
    }
}

#[derive(Clone)]
pub struct OnboardingService {
    progresso: EntityCrud<EtapaProgresso>,
}

impl OnboardingService {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        OnboardingService {
            progresso: ctx.bind(&PROGRESSO, tenant_id),
        }
    }

    async fn row(&self, etapa: &str) -> Result<Option<EtapaProgresso>, AppError> {
        let rows = self.progresso.list(&Filters::new().eq("etapa", etapa), None).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn progress(&self) -> Result<ResumoOnboarding, AppError> {
        let rows = self.progresso.list(&Filters::new().eq("concluida", true), None).await?;
        let feitas: Vec<String> = ETAPAS
            .iter()
            .filter(|e| rows.iter().any(|r| r.etapa == **e))
            .map(|e| e.to_string())
            .collect();
        let proxima = ETAPAS
            .iter()
            .find(|e| !feitas.iter().any(|f| f == **e))
            .map(|e| e.to_string());
        let total = ETAPAS.len();
        Ok(ResumoOnboarding {
            total,
            concluidas: feitas.len(),
            percentual: (feitas.len() * 100 / total) as u8,
            etapas_concluidas: feitas,
            proxima_etapa: proxima,
        })
    }

    /// Mark `etapa` done. Form data, when given, replaces what the step held.
    pub async fn complete_step(&self, etapa: &str, dados: Option<Value>) -> Result<EtapaProgresso, AppError> {
        known(etapa)?;
        let mut patch = json!({
            "etapa": etapa,
            "concluida": true,
            "concluida_em": Utc::now(),
        });
        if let Some(d) = dados {
            patch["dados"] = d;
        }
        let saved = match self.row(etapa).await? {
            Some(r) => self.progresso.update(&r.meta.id.to_string(), &patch).await?,
            None => self.progresso.create(&patch).await?,
        };
        tracing::info!(tenant = ?saved.meta.tenant_id, etapa, "onboarding step completed");
        Ok(saved)
    }

    /// Reopen `etapa`. Resetting a step that was never started is a no-op.
    pub async fn reset_step(&self, etapa: &str) -> Result<(), AppError> {
        known(etapa)?;
        if let Some(r) = self.row(etapa).await? {
            self.progresso
                .update(
                    &r.meta.id.to_string(),
                    &json!({ "concluida": false, "concluida_em": Value::Null }),
                )
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn service(store: &MemoryStore) -> OnboardingService {
        OnboardingService::new(&DataContext::with_defaults(Arc::new(store.clone())), "t1")
    }

    #[tokio::test]
    async fn fresh_tenant_starts_at_the_first_step() {
        let p = service(&MemoryStore::new()).progress().await.unwrap();
        assert_eq!(p.total, 6);
        assert_eq!(p.concluidas, 0);
        assert_eq!(p.percentual, 0);
        assert_eq!(p.proxima_etapa.as_deref(), Some("dados_municipio"));
    }

    #[tokio::test]
    async fn completing_steps_is_idempotent_per_step() {
        let store = MemoryStore::new();
        let svc = service(&store);
        svc.complete_step("dados_municipio", Some(json!({"populacao": 12000}))).await.unwrap();
        svc.complete_step("dados_municipio", None).await.unwrap();
        svc.complete_step("secretarias", None).await.unwrap();
        assert_eq!(store.rows("onboarding_progresso").len(), 2);

        let p = svc.progress().await.unwrap();
        assert_eq!(p.concluidas, 2);
        assert_eq!(p.percentual, 33);
        assert_eq!(p.proxima_etapa.as_deref(), Some("identidade_visual"));
    }

    #[tokio::test]
    async fn reset_reopens_a_step() {
        let store = MemoryStore::new();
        let svc = service(&store);
        for etapa in ETAPAS {
            svc.complete_step(etapa, None).await.unwrap();
        }
        let p = svc.progress().await.unwrap();
        assert_eq!(p.percentual, 100);
        assert_eq!(p.proxima_etapa, None);

        svc.reset_step("usuarios").await.unwrap();
        let p = svc.progress().await.unwrap();
        assert_eq!(p.concluidas, 5);
        assert_eq!(p.proxima_etapa.as_deref(), Some("usuarios"));
        svc.reset_step("publicacao").await.unwrap();
        svc.reset_step("publicacao").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_steps_are_rejected() {
        let store = MemoryStore::new();
        let svc = service(&store);
        assert!(matches!(svc.complete_step("pagamento", None).await, Err(AppError::Validation(_))));
        assert!(matches!(svc.reset_step("pagamento").await, Err(AppError::Validation(_))));
        assert_eq!(store.write_count(), 0);
    }
}
