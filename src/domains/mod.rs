//! Per-secretariat bindings: record shapes, table definitions and named queries.

pub mod agricultura;
pub mod assistencia_social;
pub mod cultura;
pub mod educacao;
pub mod esportes;
pub mod habitacao;
pub mod meio_ambiente;
pub mod obras_publicas;
pub mod planejamento_urbano;
pub mod saude;
pub mod seguranca_publica;
pub mod turismo;
