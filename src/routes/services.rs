//! Routes for protocols, billing, customization, onboarding, sessions and dashboards.

use crate::handlers::{billing, customization, dashboard, onboarding, protocol, session};
use crate::state::AppState;
use axum::{
    routing::{get, patch, post, put},
    Router,
};

pub fn service_routes(state: AppState) -> Router {
    Router::new()
        .route("/protocolos", post(protocol::create))
        .route("/protocolos/categorias", get(protocol::categories))
        .route("/protocolos/categorias/:id/servicos", get(protocol::services))
        .route("/protocolos/:id/status", patch(protocol::update_status))
        .route("/protocolos/:id/responsavel", patch(protocol::assign))
        .route("/protocolos/:id/avaliacao", post(protocol::rate))
        .route("/protocolos/:id/historico", get(protocol::history))
        .route("/faturamento/assinaturas/:id/faturas", post(billing::generate))
        .route("/faturamento/faturas/:id/pagamento", post(billing::pay))
        .route("/faturamento/lote", post(billing::batch))
        .route("/customizacao", get(customization::get).put(customization::save))
        .route("/customizacao/tema.css", get(customization::theme_css))
        .route("/customizacao/logo", put(customization::upload_logo))
        .route("/onboarding", get(onboarding::progress))
        .route("/onboarding/:etapa", post(onboarding::complete).delete(onboarding::reset))
        .route("/sessao/:user_id", get(session::bootstrap))
        .route("/sessao/:user_id/avatar", put(session::upload_avatar))
        .route("/painel/:modulo", get(dashboard::dashboard))
        .with_state(state)
}
