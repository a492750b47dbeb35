//! Configuración central de la aplicación.
//! Carga variables de entorno (.env) una sola vez y arma `AppConfig`, que
//! decide cómo se cablea el despachador (lote, timeout de reclamo, mailer,
//! links compartibles).
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use once_cell::sync::Lazy;
use paw_core::dispatch::{DEFAULT_BATCH_SIZE, DEFAULT_CLAIM_TIMEOUT_MINUTES};
use paw_core::DispatchConfig;

use crate::errors::AppError;

/// Archivo `.env` cargado (si había uno), evaluado una sola vez.
pub static DOTENV: Lazy<Option<PathBuf>> = Lazy::new(|| dotenvy::dotenv().ok());

pub fn load_dotenv() -> Option<&'static PathBuf> {
    DOTENV.as_ref()
}

/// Transporte de correo del despachador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailerKind {
    /// Sólo registra el envío en el log.
    #[default]
    Log,
    /// Encola en la tabla `email_outbox` para un relay externo.
    Outbox,
}

impl FromStr for MailerKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(MailerKind::Log),
            "outbox" => Ok(MailerKind::Outbox),
            other => Err(AppError::Config(format!("PAWFLOW_MAILER debe ser 'log' u 'outbox', recibido {other:?}"))),
        }
    }
}

/// Configuración global de la aplicación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub dispatch: DispatchConfig,
    /// URL pública base para links de contrato/formulario/reserva. Sin ella
    /// los steps que piden links fallan.
    pub share_base_url: Option<String>,
    pub mailer: MailerKind,
    pub mail_from: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { dispatch: DispatchConfig::default(),
               share_base_url: None,
               mailer: MailerKind::default(),
               mail_from: None }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        load_dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero leyendo de `get`; los valores vacíos cuentan
    /// como ausentes.
    pub fn from_lookup<F>(get: F) -> Result<Self, AppError>
        where F: Fn(&str) -> Option<String>
    {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let batch_size = positive(get("PAWFLOW_BATCH_SIZE"), "PAWFLOW_BATCH_SIZE", DEFAULT_BATCH_SIZE as i64)?;
        let timeout = positive(get("PAWFLOW_CLAIM_TIMEOUT_MINUTES"),
                               "PAWFLOW_CLAIM_TIMEOUT_MINUTES",
                               DEFAULT_CLAIM_TIMEOUT_MINUTES)?;
        let mailer = match get("PAWFLOW_MAILER") {
            Some(v) => v.parse()?,
            None => MailerKind::default(),
        };
        Ok(Self { dispatch: DispatchConfig { batch_size: batch_size as usize,
                                             claim_timeout: Duration::minutes(timeout) },
                  share_base_url: get("PAWFLOW_SHARE_BASE_URL"),
                  mailer,
                  mail_from: get("PAWFLOW_MAIL_FROM") })
    }
}

fn positive(raw: Option<String>, var: &str, default: i64) -> Result<i64, AppError> {
    match raw {
        None => Ok(default),
        Some(v) => match v.parse::<i64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(AppError::Config(format!("{var} debe ser un entero positivo, recibido {v:?}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.dispatch.batch_size, 50);
        assert_eq!(cfg.dispatch.claim_timeout, Duration::minutes(30));
    }

    #[test]
    fn reads_every_variable() {
        let cfg = AppConfig::from_lookup(lookup(&[("PAWFLOW_BATCH_SIZE", "10"),
                                                  ("PAWFLOW_CLAIM_TIMEOUT_MINUTES", "5"),
                                                  ("PAWFLOW_SHARE_BASE_URL", "https://studio.example.com"),
                                                  ("PAWFLOW_MAILER", "Outbox"),
                                                  ("PAWFLOW_MAIL_FROM", "hola@studio.example.com")])).unwrap();
        assert_eq!(cfg.dispatch.batch_size, 10);
        assert_eq!(cfg.dispatch.claim_timeout, Duration::minutes(5));
        assert_eq!(cfg.share_base_url.as_deref(), Some("https://studio.example.com"));
        assert_eq!(cfg.mailer, MailerKind::Outbox);
        assert_eq!(cfg.mail_from.as_deref(), Some("hola@studio.example.com"));
    }

    #[test]
    fn rejects_bad_numbers_and_mailers() {
        for pairs in [[("PAWFLOW_BATCH_SIZE", "0")], [("PAWFLOW_CLAIM_TIMEOUT_MINUTES", "-3")], [("PAWFLOW_MAILER", "smtp")]] {
            let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(matches!(err, AppError::Config(_)), "{err}");
            assert_eq!(err.exit_code(), 2);
        }
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[("PAWFLOW_SHARE_BASE_URL", "  "), ("PAWFLOW_BATCH_SIZE", "")])).unwrap();
        assert_eq!(cfg.share_base_url, None);
        assert_eq!(cfg.dispatch.batch_size, 50);
    }
}
