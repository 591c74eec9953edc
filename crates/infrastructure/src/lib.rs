//! 基础设施层
//!
//! 持久化网关的 PostgreSQL 实现。

pub mod db;

pub use db::{create_pg_pool, run_migrations, PgMessageRepository};
