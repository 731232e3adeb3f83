//! Subscription billing: invoice computation, numbering, batch generation and payment.
//!
//! Batch runs are not transactional. A failure on one subscription is reported
//! and the run moves on; invoices already written stay written.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::store::Filters;
use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const MODULE: &str = "billing";

pub const ASSINATURAS: TableDef = TableDef {
    name: "billing_assinaturas",
    module: MODULE,
    columns: &[
        C::req("plano", "TEXT"),
        C::req("valor_base", "NUMERIC(12,2)"),
        C::opt("ciclo", "TEXT").default_expr("'mensal'").one_of(CICLOS),
        C::opt("valor_modulos_extras", "NUMERIC(12,2)"),
        C::opt("valor_usuarios_extras", "NUMERIC(12,2)"),
        C::opt("valor_armazenamento_extra", "NUMERIC(12,2)"),
        C::opt("valor_suporte_premium", "NUMERIC(12,2)"),
        C::opt("desconto_valor", "NUMERIC(12,2)"),
        C::opt("desconto_percentual", "NUMERIC(5,2)"),
        C::opt("data_inicio", "DATE").format(Format::Date),
        C::opt("proxima_cobranca", "DATE").format(Format::Date),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const FATURAS: TableDef = TableDef {
    name: "billing_faturas",
    module: MODULE,
    columns: &[
        C::req("assinatura_id", "UUID").format(Format::Uuid),
        C::req("numero", "TEXT"),
        C::req("data_referencia", "DATE").format(Format::Date),
        C::opt("itens", "JSONB"),
        C::req("valor_bruto", "NUMERIC(12,2)"),
        C::opt("valor_desconto", "NUMERIC(12,2)").default_expr("0"),
        C::req("valor_liquido", "NUMERIC(12,2)"),
        C::req("data_vencimento", "DATE").format(Format::Date),
        C::opt("data_pagamento", "DATE").format(Format::Date),
        C::opt("status", "TEXT").default_expr("'pendente'"),
    ],
    order_by: "data_referencia",
    ascending: false,
};

/// Accepted billing cycles.
pub const CICLOS: &[&str] = &["mensal", "trimestral", "anual"];

pub const TABLES: &[TableDef] = &[ASSINATURAS, FATURAS];

/// Days between the reference date and the due date.
pub const DIAS_VENCIMENTO: i64 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ciclo {
    Mensal,
    Trimestral,
    Anual,
}

impl Ciclo {
    /// Missing cycle means monthly.
    pub fn parse(s: Option<&str>) -> Result<Self, AppError> {
        match s.map(str::trim).unwrap_or("mensal") {
            "" | "mensal" => Ok(Ciclo::Mensal),
            "trimestral" => Ok(Ciclo::Trimestral),
            "anual" => Ok(Ciclo::Anual),
            other => Err(AppError::Validation(format!("unknown billing cycle {}", other))),
        }
    }

    pub fn months(self) -> u32 {
        match self {
            Ciclo::Mensal => 1,
            Ciclo::Trimestral => 3,
            Ciclo::Anual => 12,
        }
    }

    /// `date` plus one cycle, clamped to the end of shorter months.
    pub fn advance(self, date: NaiveDate) -> Option<NaiveDate> {
        date.checked_add_months(Months::new(self.months()))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Assinatura {
    #[serde(flatten)]
    pub meta: Envelope,
    pub plano: String,
    pub valor_base: f64,
    #[serde(default)]
    pub ciclo: Option<String>,
    #[serde(default)]
    pub valor_modulos_extras: Option<f64>,
    #[serde(default)]
    pub valor_usuarios_extras: Option<f64>,
    #[serde(default)]
    pub valor_armazenamento_extra: Option<f64>,
    #[serde(default)]
    pub valor_suporte_premium: Option<f64>,
    #[serde(default)]
    pub desconto_valor: Option<f64>,
    #[serde(default)]
    pub desconto_percentual: Option<f64>,
    #[serde(default)]
    pub data_inicio: Option<NaiveDate>,
    #[serde(default)]
    pub proxima_cobranca: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemFatura {
    pub descricao: String,
    pub valor: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fatura {
    #[serde(flatten)]
    pub meta: Envelope,
    pub assinatura_id: String,
    pub numero: String,
    pub data_referencia: NaiveDate,
    #[serde(default)]
    pub itens: Vec<ItemFatura>,
    pub valor_bruto: f64,
    #[serde(default)]
    pub valor_desconto: f64,
    pub valor_liquido: f64,
    pub data_vencimento: NaiveDate,
    #[serde(default)]
    pub data_pagamento: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Amounts derived from a subscription, before anything is written.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalculoFatura {
    pub itens: Vec<ItemFatura>,
    pub valor_bruto: f64,
    pub valor_desconto: f64,
    pub valor_liquido: f64,
}

fn centavos(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Base price plus present add-ons, less the fixed and percentage discounts.
/// The discount never exceeds the gross amount.
pub fn compute_invoice(a: &Assinatura) -> CalculoFatura {
    let mut itens = vec![ItemFatura {
        descricao: format!("Plano {}", a.plano),
        valor: centavos(a.valor_base),
    }];
    let adicionais = [
        ("Módulos extras", a.valor_modulos_extras),
        ("Usuários extras", a.valor_usuarios_extras),
        ("Armazenamento extra", a.valor_armazenamento_extra),
        ("Suporte premium", a.valor_suporte_premium),
    ];
    for (descricao, valor) in adicionais {
        if let Some(v) = valor.filter(|v| *v > 0.0) {
            itens.push(ItemFatura {
                descricao: descricao.to_string(),
                valor: centavos(v),
            });
        }
    }

    let bruto = centavos(itens.iter().map(|i| i.valor).sum());
    let percentual = a.desconto_percentual.unwrap_or(0.0).max(0.0);
    let desconto = a.desconto_valor.unwrap_or(0.0).max(0.0) + bruto * percentual / 100.0;
    let desconto = centavos(desconto.min(bruto));
    CalculoFatura {
        itens,
        valor_bruto: bruto,
        valor_desconto: desconto,
        valor_liquido: centavos(bruto - desconto),
    }
}

/// `FAT-YYYYMM-NNNNN`.
pub fn invoice_number(referencia: NaiveDate, sequencia: u64) -> String {
    format!("FAT-{}-{:05}", referencia.format("%Y%m"), sequencia)
}

#[derive(Clone, Debug, Serialize)]
pub struct FalhaLote {
    pub assinatura_id: String,
    pub erro: String,
}

/// Outcome of a batch run, one entry per subscription attempted.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RelatorioLote {
    pub geradas: Vec<Fatura>,
    pub falhas: Vec<FalhaLote>,
}

#[derive(Clone)]
pub struct BillingService {
    assinaturas: EntityCrud<Assinatura>,
    faturas: EntityCrud<Fatura>,
    tenant_id: Option<String>,
}

impl BillingService {
    /// Service spanning every tenant, used by the batch run.
    pub fn new(ctx: &DataContext) -> Self {
        BillingService {
            assinaturas: ctx.table(ASSINATURAS.name).with_default_order(ASSINATURAS.default_order()),
            faturas: ctx.table(FATURAS.name).with_default_order(FATURAS.default_order()),
            tenant_id: None,
        }
    }

    /// Restrict lookups to one tenant's subscriptions and invoices.
    pub fn for_tenant(ctx: &DataContext, tenant_id: &str) -> Self {
        BillingService {
            assinaturas: ctx.bind(&ASSINATURAS, tenant_id),
            faturas: ctx.bind(&FATURAS, tenant_id),
            tenant_id: Some(tenant_id.to_string()),
        }
    }

    pub fn assinaturas(&self) -> &EntityCrud<Assinatura> {
        &self.assinaturas
    }

    pub fn faturas(&self) -> &EntityCrud<Fatura> {
        &self.faturas
    }

    fn visible(&self, row_tenant: Option<&str>) -> bool {
        match &self.tenant_id {
            Some(t) => row_tenant == Some(t.as_str()),
            None => true,
        }
    }

    async fn assinatura(&self, id: &str) -> Result<Assinatura, AppError> {
        self.assinaturas
            .get_one(id)
            .await?
            .filter(|a| self.visible(a.meta.tenant_id.as_deref()))
            .ok_or_else(|| AppError::NotFound(format!("assinatura {}", id)))
    }

    /// Bill one subscription for `referencia` and move its next billing date forward one cycle.
    pub async fn generate_invoice(&self, assinatura_id: &str, referencia: NaiveDate) -> Result<Fatura, AppError> {
        let a = self.assinatura(assinatura_id).await?;
        let ciclo = Ciclo::parse(a.ciclo.as_deref())?;
        let base = a.proxima_cobranca.unwrap_or(referencia);
        let proxima = ciclo
            .advance(base)
            .ok_or_else(|| AppError::Validation(format!("cannot advance billing date {}", base)))?;

        let calculo = compute_invoice(&a);
        let emitidas = self
            .faturas
            .stats(&Filters::new().eq_opt("tenant_id", a.meta.tenant_id.clone()))
            .await?;
        let numero = invoice_number(referencia, emitidas + 1);
        let fatura = self
            .faturas
            .create(&json!({
                "tenant_id": a.meta.tenant_id,
                "assinatura_id": a.meta.id.to_string(),
                "numero": numero,
                "data_referencia": referencia,
                "itens": calculo.itens,
                "valor_bruto": calculo.valor_bruto,
                "valor_desconto": calculo.valor_desconto,
                "valor_liquido": calculo.valor_liquido,
                "data_vencimento": referencia + Duration::days(DIAS_VENCIMENTO),
                "status": status::PENDENTE,
            }))
            .await?;

        self.assinaturas
            .update(assinatura_id, &json!({ "proxima_cobranca": proxima }))
            .await?;
        tracing::info!(
            numero = %fatura.numero,
            tenant = ?a.meta.tenant_id,
            valor = fatura.valor_liquido,
            "invoice generated"
        );
        Ok(fatura)
    }

    /// Bill every active subscription whose next billing date has arrived.
    pub async fn generate_due_invoices(&self, hoje: NaiveDate) -> Result<RelatorioLote, AppError> {
        let ativas = self
            .assinaturas
            .list(&Filters::new().eq("status", status::ATIVO), None)
            .await?;
        let devidas = ativas
            .into_iter()
            .filter(|a| a.proxima_cobranca.map(|d| d <= hoje).unwrap_or(false));

        let mut relatorio = RelatorioLote::default();
        for a in devidas {
            let id = a.meta.id.to_string();
            match self.generate_invoice(&id, hoje).await {
                Ok(f) => relatorio.geradas.push(f),
                Err(e) => {
                    tracing::warn!(assinatura = %id, error = %e, "invoice generation failed");
                    relatorio.falhas.push(FalhaLote {
                        assinatura_id: id,
                        erro: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            geradas = relatorio.geradas.len(),
            falhas = relatorio.falhas.len(),
            "billing batch finished"
        );
        Ok(relatorio)
    }

    pub async fn mark_paid(&self, fatura_id: &str, pago_em: NaiveDate) -> Result<Fatura, AppError> {
        let atual = self
            .faturas
            .get_one(fatura_id)
            .await?
            .filter(|f| self.visible(f.meta.tenant_id.as_deref()))
            .ok_or_else(|| AppError::NotFound(format!("fatura {}", fatura_id)))?;
        self.faturas
            .update(
                &atual.meta.id.to_string(),
                &json!({ "status": status::PAGO, "data_pagamento": pago_em }),
            )
            .await
    }
}
