//! Constructores de mensajes para Discord.

pub mod embeds;
