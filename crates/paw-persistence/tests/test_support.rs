#![allow(dead_code)]

use once_cell::sync::Lazy;
use paw_persistence::{build_pool, DbConfig, PgPool, PoolProvider};

pub static TEST_POOL: Lazy<Option<PgPool>> = Lazy::new(|| {
    if std::env::var("DATABASE_URL").is_err() {
        return None;
    }
    let cfg = DbConfig::from_env().ok()?;
    match build_pool(&cfg.url, 1, 4) {
        Ok(p) => Some(p),
        Err(e) => {
            eprintln!("No se pudo construir pool de test: {e}");
            None
        }
    }
});

/// Provider sobre el pool compartido, o `None` (test omitido) sin base.
pub fn provider() -> Option<PoolProvider> {
    match TEST_POOL.as_ref() {
        Some(pool) => Some(PoolProvider::new(pool.clone())),
        None => {
            eprintln!("DATABASE_URL no definido: omitiendo test");
            None
        }
    }
}

/// Id aleatorio para no chocar con datos de otras corridas.
pub fn fresh_id() -> i64 {
    (uuid::Uuid::new_v4().as_u128() as i64).abs() % 1_000_000_000_000 + 1
}
