use anyhow::{Context, Result};
use std::{str::FromStr, time::Duration};

/// Límite superior de `MAX_QUEUE_LENGTH`.
pub const MAX_QUEUE_LENGTH_LIMIT: usize = 1_000;
/// Límite superior de `COMMAND_BUFFER`.
pub const COMMAND_BUFFER_LIMIT: usize = 1_024;

/// Parámetros de reproducción que recibe cada sesión de voz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSettings {
    /// Tracks pendientes que acepta una sesión, sin contar el actual.
    pub max_queue_length: usize,
    pub idle_timeout: Duration,
    pub ready_poll_attempts: u32,
    pub ready_poll_interval: Duration,
    pub command_buffer: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_queue_length: 5,
            idle_timeout: Duration::from_secs(300),
            ready_poll_attempts: 6,
            ready_poll_interval: Duration::from_secs(5),
            command_buffer: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Entorno (prod | dev)
    pub app_env: String,

    // Reproducción
    pub max_queue_length: usize,
    pub idle_timeout: Duration,
    pub ready_poll_attempts: u32,
    pub ready_poll_interval: Duration,
    pub command_buffer: usize,
}

impl Config {
    /// Carga `config-<APP_ENV>.env` y `.env` (si existen), luego las variables de entorno.
    pub fn load() -> Result<Self> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "prod".to_string());
        dotenvy::from_filename(format!("config-{app_env}.env")).ok();
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validar configuración antes de retornar
        config.validate()?;

        Ok(config)
    }

    /// Construye la configuración desde cualquier fuente de claves. Las opcionales ausentes usan su valor por defecto.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = PlayerSettings::default();

        Ok(Self {
            discord_token: lookup("DISCORD_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .context("DISCORD_TOKEN is not set")?,
            guild_id: lookup("GUILD_ID")
                .filter(|id| !id.trim().is_empty())
                .map(|id| id.trim().parse::<u64>())
                .transpose()
                .context("GUILD_ID must be a numeric guild id")?,
            app_env: lookup("APP_ENV").unwrap_or_else(|| "prod".to_string()),

            max_queue_length: parse_or(&lookup, "MAX_QUEUE_LENGTH", defaults.max_queue_length)?,
            idle_timeout: Duration::from_secs(parse_or(
                &lookup,
                "IDLE_TIMEOUT_SECONDS",
                defaults.idle_timeout.as_secs(),
            )?),
            ready_poll_attempts: parse_or(
                &lookup,
                "READY_POLL_ATTEMPTS",
                defaults.ready_poll_attempts,
            )?,
            ready_poll_interval: Duration::from_secs(parse_or(
                &lookup,
                "READY_POLL_INTERVAL_SECONDS",
                defaults.ready_poll_interval.as_secs(),
            )?),
            command_buffer: parse_or(&lookup, "COMMAND_BUFFER", defaults.command_buffer)?,
        })
    }

    /// Valida que los valores de configuración sean correctos.
    ///
    /// # Reglas de validación
    ///
    /// - `APP_ENV` debe ser `prod` o `dev`
    /// - Largo de cola, timeout de inactividad y buffer de comandos deben ser mayores a 0
    /// - Largo de cola y buffer de comandos no pueden superar sus límites
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.app_env.as_str(), "prod" | "dev") {
            anyhow::bail!("APP_ENV must be 'prod' or 'dev', got: {}", self.app_env);
        }

        if self.max_queue_length == 0 {
            anyhow::bail!("Max queue length must be greater than 0");
        }

        if self.max_queue_length > MAX_QUEUE_LENGTH_LIMIT {
            anyhow::bail!(
                "Max queue length must be at most {}, got: {}",
                MAX_QUEUE_LENGTH_LIMIT,
                self.max_queue_length
            );
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.command_buffer == 0 {
            anyhow::bail!("Command buffer must be greater than 0");
        }

        if self.command_buffer > COMMAND_BUFFER_LIMIT {
            anyhow::bail!(
                "Command buffer must be at most {}, got: {}",
                COMMAND_BUFFER_LIMIT,
                self.command_buffer
            );
        }

        Ok(())
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            max_queue_length: self.max_queue_length,
            idle_timeout: self.idle_timeout,
            ready_poll_attempts: self.ready_poll_attempts,
            ready_poll_interval: self.ready_poll_interval,
            command_buffer: self.command_buffer,
        }
    }

    /// Resumen de la configuración para el log de inicio.
    ///
    /// Nunca incluye el token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: {} commands ({})\n  \
            Queue: {} tracks, idle disconnect after {}\n  \
            Voice: {} readiness checks every {}, mailbox {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("guild {id}")),
            self.app_env,
            self.max_queue_length,
            humantime::format_duration(self.idle_timeout),
            self.ready_poll_attempts,
            humantime::format_duration(self.ready_poll_interval),
            self.command_buffer,
        )
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_only_token_is_set() {
        let config = config(&[("DISCORD_TOKEN", "secret")]).unwrap();

        assert_eq!(config.guild_id, None);
        assert_eq!(config.app_env, "prod");
        assert_eq!(config.player_settings(), PlayerSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("DISCORD_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config(&[
            ("DISCORD_TOKEN", "secret"),
            ("GUILD_ID", "1234"),
            ("APP_ENV", "dev"),
            ("MAX_QUEUE_LENGTH", "10"),
            ("IDLE_TIMEOUT_SECONDS", "60"),
            ("READY_POLL_ATTEMPTS", "3"),
            ("READY_POLL_INTERVAL_SECONDS", "2"),
        ])
        .unwrap();

        assert_eq!(config.guild_id, Some(1234));
        let settings = config.player_settings();
        assert_eq!(settings.max_queue_length, 10);
        assert_eq!(settings.idle_timeout, Duration::from_secs(60));
        assert_eq!(settings.ready_poll_attempts, 3);
        assert_eq!(settings.ready_poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_garbage_numbers_are_rejected() {
        let error = config(&[("DISCORD_TOKEN", "secret"), ("MAX_QUEUE_LENGTH", "lots")])
            .unwrap_err()
            .to_string();
        assert!(error.contains("MAX_QUEUE_LENGTH"), "{error}");
    }

    #[test]
    fn test_validation_rules() {
        let zero_queue = config(&[("DISCORD_TOKEN", "t"), ("MAX_QUEUE_LENGTH", "0")]).unwrap();
        assert!(zero_queue.validate().is_err());

        let zero_idle = config(&[("DISCORD_TOKEN", "t"), ("IDLE_TIMEOUT_SECONDS", "0")]).unwrap();
        assert!(zero_idle.validate().is_err());

        let staging = config(&[("DISCORD_TOKEN", "t"), ("APP_ENV", "staging")]).unwrap();
        assert!(staging.validate().is_err());
    }

    #[test]
    fn test_oversized_limits_are_rejected() {
        let at_limit = config(&[("DISCORD_TOKEN", "t"), ("MAX_QUEUE_LENGTH", "1000")]).unwrap();
        assert!(at_limit.validate().is_ok());

        let huge_queue = config(&[
            ("DISCORD_TOKEN", "t"),
            ("MAX_QUEUE_LENGTH", "18446744073709551615"),
        ])
        .unwrap();
        let error = huge_queue.validate().unwrap_err().to_string();
        assert!(error.contains("at most 1000"), "{error}");

        let billion = config(&[("DISCORD_TOKEN", "t"), ("MAX_QUEUE_LENGTH", "1000000000")]).unwrap();
        assert!(billion.validate().is_err());

        let huge_buffer = config(&[("DISCORD_TOKEN", "t"), ("COMMAND_BUFFER", "1025")]).unwrap();
        assert!(huge_buffer.validate().is_err());
    }

    #[test]
    fn test_summary_hides_token() {
        let config = config(&[("DISCORD_TOKEN", "super-secret"), ("GUILD_ID", "77")]).unwrap();
        let summary = config.summary();

        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("guild 77"));
        assert!(summary.contains("5m"), "{summary}");
    }
}
