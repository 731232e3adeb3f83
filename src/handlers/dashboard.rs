//! Per-secretariat dashboard endpoint: GET /api/v1/painel/:modulo

use crate::crud::DataContext;
use crate::domains::*;
use crate::error::AppError;
use crate::extractors::TenantId;
use crate::response::success_one_ok;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::Value;

fn to_value<T: Serialize>(dashboard: T) -> Result<Value, AppError> {
    Ok(serde_json::to_value(dashboard)?)
}

/// Compute the named module's dashboard for one tenant.
pub async fn module_dashboard(ctx: &DataContext, modulo: &str, tenant: &str) -> Result<Value, AppError> {
    match modulo {
        agricultura::MODULE => to_value(agricultura::Agricultura::new(ctx, tenant).dashboard().await?),
        assistencia_social::MODULE => {
            to_value(assistencia_social::AssistenciaSocial::new(ctx, tenant).dashboard().await?)
        }
        cultura::MODULE => to_value(cultura::Cultura::new(ctx, tenant).dashboard().await?),
        educacao::MODULE => to_value(educacao::Educacao::new(ctx, tenant).dashboard().await?),
        esportes::MODULE => to_value(esportes::Esportes::new(ctx, tenant).dashboard().await?),
        habitacao::MODULE => to_value(habitacao::Habitacao::new(ctx, tenant).dashboard().await?),
        meio_ambiente::MODULE => to_value(meio_ambiente::MeioAmbiente::new(ctx, tenant).dashboard().await?),
        obras_publicas::MODULE => to_value(obras_publicas::ObrasPublicas::new(ctx, tenant).dashboard().await?),
        planejamento_urbano::MODULE => {
            to_value(planejamento_urbano::PlanejamentoUrbano::new(ctx, tenant).dashboard().await?)
        }
        saude::MODULE => to_value(saude::Saude::new(ctx, tenant).dashboard().await?),
        seguranca_publica::MODULE => {
            to_value(seguranca_publica::SegurancaPublica::new(ctx, tenant).dashboard().await?)
        }
        turismo::MODULE => to_value(turismo::Turismo::new(ctx, tenant).dashboard().await?),
        other => Err(AppError::NotFound(format!("module {}", other))),
    }
}

pub async fn dashboard(
    TenantId(tenant): TenantId,
    State(state): State<AppState>,
    Path(modulo): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one_ok(module_dashboard(&state.data, &modulo, &tenant).await?))
}
