use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use digiurban::{app, AppState, DataContext, MemoryStorage, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const KEY: &str = "segredo-de-teste";

fn build_app() -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    let state = AppState::new(
        DataContext::with_defaults(Arc::new(store.clone())),
        Arc::new(MemoryStorage::new()),
        Some(KEY.to_string()),
    );
    (app(state), store)
}

async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn request(method: &str, uri: &str, tenant: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = tenant {
        builder = builder.header("X-Tenant-ID", t);
    }
    match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn health_and_ready() {
    let (app, _) = build_app();
    let resp = app.clone().oneshot(request("GET", "/health", None, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(request("GET", "/ready", None, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["database"], "ok");
}

#[tokio::test]
async fn table_routes_require_tenant_and_known_table() {
    let (app, _) = build_app();
    let resp = app
        .clone()
        .oneshot(request("GET", "/api/v1/dados/saude_pacientes", None, None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .oneshot(request("GET", "/api/v1/dados/pg_authid", Some("t1"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn table_crud_is_tenant_scoped() {
    let (app, _) = build_app();
    let uri = "/api/v1/dados/protocolos_categorias";

    let resp = app
        .clone()
        .oneshot(request("POST", uri, Some("t1"), Some(json!({"nome": "Obras", "ordem": 2}))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let criado = body_json(resp).await["data"].clone();
    let id = criado["id"].as_str().unwrap().to_string();
    assert_eq!(criado["tenant_id"], "t1");

    let resp = app
        .clone()
        .oneshot(request("POST", uri, Some("t2"), Some(json!({"nome": "Saude"}))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app.clone().oneshot(request("GET", uri, Some("t1"), None)).await.unwrap();
    let lista = body_json(resp).await;
    assert_eq!(lista["meta"]["count"], 1);
    assert_eq!(lista["data"][0]["nome"], "Obras");

    // other tenants cannot see or touch the row
    let item = format!("{}/{}", uri, id);
    let resp = app.clone().oneshot(request("GET", &item, Some("t2"), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app
        .clone()
        .oneshot(request("PATCH", &item, Some("t2"), Some(json!({"nome": "X"}))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .clone()
        .oneshot(request("PATCH", &item, Some("t1"), Some(json!({"descricao": "Vias e calcadas"}))))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let atualizado = body_json(resp).await["data"].clone();
    assert_eq!(atualizado["nome"], "Obras");
    assert_eq!(atualizado["descricao"], "Vias e calcadas");

    let resp = app
        .clone()
        .oneshot(request("GET", &format!("{}/stats", uri), Some("t1"), None))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"]["count"], 1);

    let resp = app.clone().oneshot(request("DELETE", &item, Some("t1"), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app.oneshot(request("GET", &item, Some("t1"), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_body_is_rejected_before_the_store() {
    let (app, store) = build_app();
    let resp = app
        .oneshot(request(
            "POST",
            "/api/v1/dados/protocolos_categorias",
            Some("t1"),
            Some(json!({"descricao": "sem nome"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn protocol_lifecycle_over_http() {
    let (app, _) = build_app();
    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/dados/protocolos_categorias",
            Some("t1"),
            Some(json!({"nome": "Iluminacao"})),
        ))
        .await
        .unwrap();
    let categoria = body_json(resp).await["data"]["id"].as_str().unwrap().to_string();
    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/dados/protocolos_servicos",
            Some("t1"),
            Some(json!({"categoria_id": categoria, "nome": "Troca de lampada", "prazo_dias": 3})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let servico = body_json(resp).await["data"]["id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/protocolos",
            Some("t1"),
            Some(json!({"servico_id": servico, "assunto": "Poste apagado", "cidadao_id": "u-1"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let protocolo = body_json(resp).await["data"].clone();
    assert_eq!(protocolo["status"], "aberto");
    assert_eq!(protocolo["categoria_id"], categoria);
    let id = protocolo["id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/protocolos/{}/status", id),
            Some("t1"),
            Some(json!({"status": "em_andamento", "usuario_id": "agente-7"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/v1/protocolos/{}/avaliacao", id),
            Some("t1"),
            Some(json!({"nota": 9})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .oneshot(request("GET", &format!("/api/v1/protocolos/{}/historico", id), Some("t1"), None))
        .await
        .unwrap();
    let hist = body_json(resp).await;
    assert_eq!(hist["meta"]["count"], 2);
    assert_eq!(hist["data"][0]["acao"], "criado");
    assert_eq!(hist["data"][1]["status_novo"], "em_andamento");
}

#[tokio::test]
async fn billing_batch_requires_service_key() {
    let (app, _) = build_app();
    let lote = |key: Option<&str>| {
        let mut b = Request::builder()
            .method("POST")
            .uri("/api/v1/faturamento/lote")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(k) = key {
            b = b.header("X-Service-Key", k);
        }
        b.body(Body::from(json!({"hoje": "2026-05-01"}).to_string())).unwrap()
    };

    let resp = app.clone().oneshot(lote(None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let resp = app.clone().oneshot(lote(Some("errada"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/dados/billing_assinaturas",
            Some("t1"),
            Some(json!({
                "plano": "basico",
                "valor_base": 100.0,
                "valor_modulos_extras": 20.0,
                "proxima_cobranca": "2026-05-01",
                "status": "ativo",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app.oneshot(lote(Some(KEY))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let relatorio = body_json(resp).await["data"].clone();
    assert_eq!(relatorio["geradas"].as_array().unwrap().len(), 1);
    assert_eq!(relatorio["geradas"][0]["valor_bruto"], 120.0);
    assert_eq!(relatorio["geradas"][0]["tenant_id"], "t1");
}

#[tokio::test]
async fn theme_stylesheet_uses_defaults_then_saved_colors() {
    let (app, _) = build_app();
    let resp = app
        .clone()
        .oneshot(request("GET", "/api/v1/customizacao/tema.css", Some("t1"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/css"));
    let css = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&css).contains("--cor-primaria: #1e40af;"));

    let resp = app
        .clone()
        .oneshot(request(
            "PUT",
            "/api/v1/customizacao",
            Some("t1"),
            Some(json!({"cor_primaria": "#ff0000", "css_customizado": ".x { color: red; }"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(request("GET", "/api/v1/customizacao/tema.css", Some("t1"), None))
        .await
        .unwrap();
    let css = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let css = String::from_utf8_lossy(&css);
    assert!(css.contains("--cor-primaria: #ff0000;"));
    assert!(css.ends_with(".x { color: red; }\n"));
}

#[tokio::test]
async fn onboarding_steps_over_http() {
    let (app, _) = build_app();
    let resp = app
        .clone()
        .oneshot(request("POST", "/api/v1/onboarding/dados_municipio", Some("t1"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(request("POST", "/api/v1/onboarding/nao_existe", Some("t1"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .clone()
        .oneshot(request("GET", "/api/v1/onboarding", Some("t1"), None))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["data"]["concluidas"], 1);

    let resp = app
        .oneshot(request("DELETE", "/api/v1/onboarding/dados_municipio", Some("t1"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn dashboard_for_unknown_module_is_not_found() {
    let (app, _) = build_app();
    let resp = app
        .clone()
        .oneshot(request("GET", "/api/v1/painel/saude", Some("t1"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(request("GET", "/api/v1/painel/astronomia", Some("t1"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rating_bounds_hold_on_the_generic_table_route() {
    let (app, store) = build_app();
    let protocolo_id = uuid::Uuid::new_v4().to_string();
    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/dados/protocolos_avaliacoes",
            Some("t1"),
            Some(json!({"protocolo_id": protocolo_id, "nota": 42})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(store.write_count(), 0);

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/dados/protocolos_avaliacoes",
            Some("t1"),
            Some(json!({"protocolo_id": protocolo_id, "nota": 4})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/dados/protocolos",
            Some("t1"),
            Some(json!({"numero": "20260501-0000ABCD", "servico_id": protocolo_id, "assunto": "Buraco"})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let id = body_json(resp).await["data"]["id"].as_str().unwrap().to_string();

    let resp = app
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/dados/protocolos/{}", id),
            Some("t1"),
            Some(json!({"avaliacao": 99})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

async fn seed_profile(store: &MemoryStore) -> (String, String) {
    use digiurban::services::SessionService;
    let ctx = DataContext::with_defaults(Arc::new(store.clone()));
    let svc = SessionService::new(&ctx);
    let tenant = svc
        .tenants()
        .create(&json!({"nome": "Prefeitura de Serra Alta", "status": "ativo"}))
        .await
        .unwrap();
    let tenant_id = tenant.meta.id.to_string();
    let perfil = svc
        .perfis()
        .create(&json!({"tenant_id": tenant_id, "nome": "Rui", "email": "rui@serraalta.gov.br"}))
        .await
        .unwrap();
    (tenant_id, perfil.meta.id.to_string())
}

#[tokio::test]
async fn session_routes_are_tenant_scoped() {
    let (app, store) = build_app();
    let (tenant_id, user) = seed_profile(&store).await;
    let uri = format!("/api/v1/sessao/{}", user);

    let resp = app.clone().oneshot(request("GET", &uri, None, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .clone()
        .oneshot(request("GET", &uri, Some("outra-prefeitura"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let avatar = |tenant: &str| {
        Request::builder()
            .method("PUT")
            .uri(format!("{}/avatar", uri))
            .header("X-Tenant-ID", tenant)
            .header(header::CONTENT_TYPE, "image/png")
            .body(Body::from(vec![0x89, 0x50, 0x4e, 0x47]))
            .unwrap()
    };
    let resp = app.clone().oneshot(avatar("outra-prefeitura")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.clone().oneshot(request("GET", &uri, Some(&tenant_id), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let sessao = body_json(resp).await["data"].clone();
    assert_eq!(sessao["perfil"]["nome"], "Rui");
    assert!(sessao["perfil"]["avatar_url"].is_null());

    let resp = app.oneshot(avatar(&tenant_id)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn delete_answers_no_content_without_touching_foreign_rows() {
    let (app, store) = build_app();
    let uri = "/api/v1/dados/protocolos_categorias";
    let resp = app
        .clone()
        .oneshot(request("POST", uri, Some("t1"), Some(json!({"nome": "Obras"}))))
        .await
        .unwrap();
    let id = body_json(resp).await["data"]["id"].as_str().unwrap().to_string();
    let item = format!("{}/{}", uri, id);

    let resp = app.clone().oneshot(request("DELETE", &item, Some("t2"), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.rows("protocolos_categorias").len(), 1);

    let absent = format!("{}/{}", uri, uuid::Uuid::new_v4());
    let resp = app.clone().oneshot(request("DELETE", &absent, Some("t1"), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app.oneshot(request("GET", &item, Some("t1"), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
