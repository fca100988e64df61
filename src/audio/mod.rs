//! # Módulo de Audio
//!
//! Orquestación de reproducción por guild.
//!
//! ## Arquitectura
//!
//! ### [`player`] - Registro de sesiones
//! - Un [`SessionHandle`](session::SessionHandle) por guild, creado al primer uso
//!
//! ### [`session`] - Sesión de voz
//! - Máquina de estados de la conexión y loop de reproducción en una sola tarea
//! - Precondiciones de comandos y respuestas al usuario
//!
//! ### [`queue`] / [`idle`] - Piezas de la sesión
//! - Cola FIFO acotada con listado de solo lectura
//! - Timer de inactividad con contador de generación
//!
//! ### [`backend`] - Fronteras externas
//! - Traits de transporte de voz, pipeline de audio y notificador
//! - [`songbird_backend`] implementa los dos primeros sobre songbird
//!
//! ## Ejemplo de uso
//!
//! ```rust,ignore
//! let player = AudioPlayer::new(config.player_settings(), services);
//! let session = player.session(guild_id);
//!
//! let enqueued = session.play(invoker, track).await?;
//! session.pause(invoker).await?;
//! session.resume(invoker).await?;
//! session.skip(invoker).await?;
//! ```

pub mod backend;
pub mod idle;
pub mod player;
pub mod queue;
pub mod session;
pub mod songbird_backend;
pub mod track;

#[cfg(test)]
pub(crate) mod testing;
