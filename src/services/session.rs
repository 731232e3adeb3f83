//! Session bootstrap for an already-authenticated user: profile, municipality and branding.

use crate::crud::{DataContext, EntityCrud};
use crate::error::AppError;
use crate::model::{status, Contato, Endereco, Envelope};
use crate::schema::{ColumnDef as C, Format, TableDef};
use crate::services::tenant::{Customizacao, TenantService};
use crate::storage::{upload_image, FileStorage};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const MODULE: &str = "session";

pub const TENANTS: TableDef = TableDef {
    name: "tenants",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("codigo_ibge", "TEXT").max_len(7),
        C::opt("cnpj", "TEXT").max_len(18),
        C::opt("uf", "TEXT").max_len(2),
        C::opt("dominio", "TEXT"),
        C::opt("plano", "TEXT"),
        C::opt("endereco", "JSONB"),
        C::opt("contato", "JSONB"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const PERFIS: TableDef = TableDef {
    name: "perfis_usuarios",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::req("email", "TEXT").format(Format::Email),
        C::opt("tipo_usuario", "TEXT").default_expr("'servidor'"),
        C::opt("secretaria_id", "UUID").format(Format::Uuid),
        C::opt("cargo", "TEXT"),
        C::opt("telefone", "TEXT"),
        C::opt("avatar_url", "TEXT"),
        C::opt("ultimo_acesso", "TIMESTAMPTZ"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const SECRETARIAS: TableDef = TableDef {
    name: "secretarias",
    module: MODULE,
    columns: &[
        C::req("nome", "TEXT").max_len(200),
        C::opt("sigla", "TEXT").max_len(20),
        C::opt("modulo", "TEXT"),
        C::opt("responsavel", "TEXT"),
        C::opt("email", "TEXT").format(Format::Email),
        C::opt("telefone", "TEXT"),
        C::opt("status", "TEXT").default_expr("'ativo'"),
    ],
    order_by: "nome",
    ascending: true,
};

pub const TABLES: &[TableDef] = &[TENANTS, PERFIS, SECRETARIAS];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub codigo_ibge: Option<String>,
    #[serde(default)]
    pub cnpj: Option<String>,
    #[serde(default)]
    pub uf: Option<String>,
    #[serde(default)]
    pub dominio: Option<String>,
    #[serde(default)]
    pub plano: Option<String>,
    #[serde(default)]
    pub endereco: Option<Endereco>,
    #[serde(default)]
    pub contato: Option<Contato>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.status.as_deref().map(|s| s == status::ATIVO).unwrap_or(true)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerfilUsuario {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    pub email: String,
    #[serde(default)]
    pub tipo_usuario: Option<String>,
    #[serde(default)]
    pub secretaria_id: Option<String>,
    #[serde(default)]
    pub cargo: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Secretaria {
    #[serde(flatten)]
    pub meta: Envelope,
    pub nome: String,
    #[serde(default)]
    pub sigla: Option<String>,
    #[serde(default)]
    pub modulo: Option<String>,
    #[serde(default)]
    pub responsavel: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Everything a client needs after sign-in.
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub perfil: PerfilUsuario,
    pub tenant: Tenant,
    pub secretaria: Option<Secretaria>,
    pub customizacao: Customizacao,
}

#[derive(Clone)]
pub struct SessionService {
    ctx: DataContext,
    tenants: EntityCrud<Tenant>,
    perfis: EntityCrud<PerfilUsuario>,
    secretarias: EntityCrud<Secretaria>,
    /// When set, profiles of other tenants read as absent.
    tenant_id: Option<String>,
}

impl SessionService {
    /// Unscoped service, for callers that already trust the user id.
    pub fn new(ctx: &DataContext) -> Self {
        SessionService {
            ctx: ctx.clone(),
            tenant_id: None,
            tenants: ctx.table(TENANTS.name).with_default_order(TENANTS.default_order()),
            perfis: ctx.table(PERFIS.name).with_default_order(PERFIS.default_order()),
            secretarias: ctx
                .table(SECRETARIAS.name)
                .with_default_order(SECRETARIAS.default_order()),
        }
    }

    /// Service acting for one tenant: only that tenant's profiles are reachable.
    pub fn for_tenant(ctx: &DataContext, tenant_id: &str) -> Self {
        SessionService {
            tenant_id: Some(tenant_id.to_string()),
            ..SessionService::new(ctx)
        }
    }

    pub fn tenants(&self) -> &EntityCrud<Tenant> {
        &self.tenants
    }

    pub fn perfis(&self) -> &EntityCrud<PerfilUsuario> {
        &self.perfis
    }

    pub fn secretarias(&self) -> &EntityCrud<Secretaria> {
        &self.secretarias
    }

    async fn perfil(&self, user_id: &str) -> Result<PerfilUsuario, AppError> {
        self.perfis
            .get_one(user_id)
            .await?
            .filter(|p| match &self.tenant_id {
                Some(t) => p.meta.tenant_id.as_deref() == Some(t.as_str()),
                None => true,
            })
            .ok_or_else(|| AppError::NotFound(format!("perfil {}", user_id)))
    }

    /// Load the user's profile, its active municipality and that municipality's branding.
    pub async fn bootstrap(&self, user_id: &str) -> Result<Session, AppError> {
        let perfil = self.perfil(user_id).await?;
        let tenant_id = perfil
            .meta
            .tenant_id
            .clone()
            .ok_or_else(|| AppError::NotFound(format!("perfil {} has no tenant", user_id)))?;
        let tenant = self
            .tenants
            .get_one(&tenant_id)
            .await?
            .filter(Tenant::is_active)
            .ok_or_else(|| AppError::NotFound(format!("active tenant {}", tenant_id)))?;

        let secretaria = async {
            match perfil.secretaria_id.as_deref() {
                Some(id) => self
                    .secretarias
                    .get_one(id)
                    .await
                    .map(|s| s.filter(|s| s.meta.tenant_id.as_deref() == Some(tenant_id.as_str()))),
                None => Ok(None),
            }
        };
        let tenant_service = TenantService::new(&self.ctx, &tenant_id);
        let customizacao = tenant_service.get();
        let (secretaria, customizacao) = tokio::try_join!(secretaria, customizacao)?;

        tracing::debug!(user = user_id, tenant = %tenant_id, "session bootstrapped");
        Ok(Session {
            perfil,
            tenant,
            secretaria,
            customizacao,
        })
    }

    /// Store a profile picture and save its URL on the profile.
    pub async fn upload_avatar(
        &self,
        storage: &dyn FileStorage,
        user_id: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<PerfilUsuario, AppError> {
        let perfil = self.perfil(user_id).await?;
        let url = upload_image(storage, &format!("avatars/{}", perfil.meta.id), bytes, content_type).await?;
        self.perfis.update(user_id, &json!({ "avatar_url": url })).await
    }
}
