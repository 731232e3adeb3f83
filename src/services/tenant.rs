//! Per-tenant customization: colors, branding, feature toggles and free-text CSS/JS.
//!
//! Custom CSS and JS are stored and echoed back as given.

use crate::crud::{to_object, DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::Envelope;
use crate::schema::{ColumnDef as C, TableDef};
use crate::storage::{upload_image, FileStorage};
use crate::store::Filters;
use crate::validation::RequestValidator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const MODULE: &str = "tenant";

pub const CUSTOMIZACOES: TableDef = TableDef {
    name: "tenant_customizacoes",
    module: MODULE,
    columns: &[
        C::opt("nome_exibicao", "TEXT").max_len(200),
        C::opt("cor_primaria", "TEXT").max_len(32),
        C::opt("cor_secundaria", "TEXT").max_len(32),
        C::opt("cor_destaque", "TEXT").max_len(32),
        C::opt("cor_fundo", "TEXT").max_len(32),
        C::opt("cor_texto", "TEXT").max_len(32),
        C::opt("fonte", "TEXT").max_len(120),
        C::opt("logo_url", "TEXT"),
        C::opt("favicon_url", "TEXT"),
        C::opt("recursos", "JSONB"),
        C::opt("css_customizado", "TEXT"),
        C::opt("js_customizado", "TEXT"),
    ],
    order_by: "created_at",
    ascending: false,
};

pub const TABLES: &[TableDef] = &[CUSTOMIZACOES];

pub const COR_PRIMARIA: &str = "#1e40af";
pub const COR_SECUNDARIA: &str = "#64748b";
pub const COR_DESTAQUE: &str = "#f59e0b";
pub const COR_FUNDO: &str = "#ffffff";
pub const COR_TEXTO: &str = "#111827";
pub const FONTE: &str = "Inter, system-ui, sans-serif";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Customizacao {
    /// Absent until the tenant saves for the first time.
    #[serde(flatten)]
    pub meta: Option<Envelope>,
    #[serde(default)]
    pub nome_exibicao: Option<String>,
    #[serde(default)]
    pub cor_primaria: Option<String>,
    #[serde(default)]
    pub cor_secundaria: Option<String>,
    #[serde(default)]
    pub cor_destaque: Option<String>,
    #[serde(default)]
    pub cor_fundo: Option<String>,
    #[serde(default)]
    pub cor_texto: Option<String>,
    #[serde(default)]
    pub fonte: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub recursos: Option<BTreeMap<String, bool>>,
    #[serde(default)]
    pub css_customizado: Option<String>,
    #[serde(default)]
    pub js_customizado: Option<String>,
}

/// CSS custom properties for a configuration, falling back to the platform palette.
pub fn theme_variables(cfg: &Customizacao) -> Vec<(&'static str, String)> {
    let pick = |v: &Option<String>, default: &str| {
        v.as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(default)
            .to_string()
    };
    let mut vars = vec![
        ("--cor-primaria", pick(&cfg.cor_primaria, COR_PRIMARIA)),
        ("--cor-secundaria", pick(&cfg.cor_secundaria, COR_SECUNDARIA)),
        ("--cor-destaque", pick(&cfg.cor_destaque, COR_DESTAQUE)),
        ("--cor-fundo", pick(&cfg.cor_fundo, COR_FUNDO)),
        ("--cor-texto", pick(&cfg.cor_texto, COR_TEXTO)),
        ("--fonte-principal", pick(&cfg.fonte, FONTE)),
    ];
    if let Some(logo) = cfg.logo_url.as_deref().filter(|s| !s.is_empty()) {
        vars.push(("--logo-url", format!("url(\"{}\")", logo)));
    }
    vars
}

/// `:root { ... }` followed by the tenant's custom CSS, unmodified.
pub fn stylesheet(cfg: &Customizacao) -> String {
    let mut css = String::from(":root {\n");
    for (name, value) in theme_variables(cfg) {
        let _ = writeln!(css, "  {}: {};", name, value);
    }
    css.push_str("}\n");
    if let Some(custom) = cfg.css_customizado.as_deref().filter(|s| !s.is_empty()) {
        css.push('\n');
        css.push_str(custom);
        if !custom.ends_with('\n') {
            css.push('\n');
        }
    }
    css
}

/// Feature toggles default to enabled.
pub fn feature_enabled(cfg: &Customizacao, key: &str) -> bool {
    cfg.recursos
        .as_ref()
        .and_then(|r| r.get(key).copied())
        .unwrap_or(true)
}

#[derive(Clone)]
pub struct TenantService {
    tenant_id: String,
    customizacoes: EntityCrud<Customizacao>,
}

impl TenantService {
    pub fn new(ctx: &DataContext, tenant_id: &str) -> Self {
        TenantService {
            tenant_id: tenant_id.to_string(),
            customizacoes: ctx.bind(&CUSTOMIZACOES, tenant_id),
        }
    }

    /// The stored configuration, or platform defaults when the tenant has none.
    pub async fn get(&self) -> Result<Customizacao, AppError> {
        let rows = self.customizacoes.list_page(&Filters::new(), None, Some(1), None).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// Merge `patch` into the tenant's configuration row, creating it on first save.
    pub async fn save<P: Serialize + ?Sized>(&self, patch: &P) -> Result<Customizacao, AppError> {
        let mut patch = to_object(patch)?;
        for k in ["id", "tenant_id", "created_at", "updated_at"] {
            patch.remove(k);
        }
        RequestValidator::validate_partial(&patch, &CUSTOMIZACOES.validation())?;

        let saved = match self.get().await?.meta {
            Some(meta) => self.customizacoes.update(&meta.id.to_string(), &patch).await?,
            None => self.customizacoes.create(&patch).await?,
        };
        tracing::info!(tenant = %self.tenant_id, "customization saved");
        Ok(saved)
    }

    /// Store a new logo image and point the configuration at it.
    pub async fn upload_logo(
        &self,
        storage: &dyn FileStorage,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Customizacao, AppError> {
        let prefix = format!("tenants/{}/logo", self.tenant_id);
        let url = upload_image(storage, &prefix, bytes, content_type).await?;
        self.save(&json!({ "logo_url": Value::String(url) })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn service(store: &MemoryStore, tenant: &str) -> TenantService {
        TenantService::new(&DataContext::with_defaults(Arc::new(store.clone())), tenant)
    }

    #[test]
    fn defaults_fill_missing_colors() {
        let cfg = Customizacao {
            cor_primaria: Some("#005f73".into()),
            cor_texto: Some("  ".into()),
            ..Customizacao::default()
        };
        let vars = theme_variables(&cfg);
        assert!(vars.contains(&("--cor-primaria", "#005f73".to_string())));
        assert!(vars.contains(&("--cor-texto", COR_TEXTO.to_string())));
        assert!(!vars.iter().any(|(k, _)| *k == "--logo-url"));
    }

    #[test]
    fn stylesheet_appends_custom_css_verbatim() {
        let cfg = Customizacao {
            css_customizado: Some(".header { display: none }".into()),
            ..Customizacao::default()
        };
        let css = stylesheet(&cfg);
        assert!(css.starts_with(":root {\n  --cor-primaria: #1e40af;\n"));
        assert!(css.ends_with("}\n\n.header { display: none }\n"));
    }

    #[test]
    fn features_default_to_enabled() {
        let mut cfg = Customizacao::default();
        assert!(feature_enabled(&cfg, "protocolos"));
        cfg.recursos = Some(BTreeMap::from([("protocolos".to_string(), false)]));
        assert!(!feature_enabled(&cfg, "protocolos"));
        assert!(feature_enabled(&cfg, "turismo"));
    }

    #[tokio::test]
    async fn save_upserts_one_row_per_tenant() {
        let store = MemoryStore::new();
        let svc = service(&store, "t1");
        assert_eq!(svc.get().await.unwrap(), Customizacao::default());

        svc.save(&json!({"cor_primaria": "#111111", "nome_exibicao": "Prefeitura"}))
            .await
            .unwrap();
        let cfg = svc.save(&json!({"cor_primaria": "#222222"})).await.unwrap();
        assert_eq!(cfg.cor_primaria.as_deref(), Some("#222222"));
        assert_eq!(cfg.nome_exibicao.as_deref(), Some("Prefeitura"));
        assert_eq!(store.rows("tenant_customizacoes").len(), 1);

        service(&store, "t2").save(&json!({"fonte": "Roboto"})).await.unwrap();
        assert_eq!(store.rows("tenant_customizacoes").len(), 2);
        assert_eq!(svc.get().await.unwrap().fonte, None);
    }

    #[tokio::test]
    async fn logo_upload_saves_public_url() {
        let store = MemoryStore::new();
        let storage = MemoryStorage::new();
        let cfg = service(&store, "t1")
            .upload_logo(&storage, vec![0x89, 0x50], "image/png")
            .await
            .unwrap();
        let url = cfg.logo_url.unwrap();
        assert!(url.starts_with("memory://tenants/t1/logo-"));
        assert_eq!(storage.keys().len(), 1);
    }
}
