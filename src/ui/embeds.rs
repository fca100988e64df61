use serenity::{
    all::{Colour, Timestamp},
    builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{backend::Tone, track::Track};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Voice";

/// Tarjeta de "reproduciendo ahora" que se publica al iniciar un track.
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let duration = track
        .duration()
        .map_or_else(|| "live".to_string(), format_duration);

    let mut embed = CreateEmbed::default()
        .author(CreateEmbedAuthor::new("Now playing:"))
        .title(track.title())
        .url(track.url())
        .description(format!("Duration: {duration}"))
        .color(colors::MUSIC_PURPLE)
        .field("Requested by", format!("<@{}>", track.requested_by()), true);

    if let Some(author) = track.author() {
        embed = embed.field("Channel", author, true);
    }
    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Mensaje simple de una línea.
pub fn create_message_embed(text: &str, tone: Tone) -> CreateEmbed {
    let colour: Colour = match tone {
        Tone::Default => colors::INFO_BLUE,
        Tone::Error => colors::ERROR_RED,
    };

    CreateEmbed::default().description(text).color(colour)
}

pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .description(format!("*{}* added to queue", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("Position", position.to_string(), true);

    if let Some(duration) = track.duration() {
        embed = embed.field("Duration", format_duration(duration), true);
    }

    embed
}

pub fn create_queue_embed(tracks: &[Track]) -> CreateEmbed {
    let colour = if tracks.is_empty() {
        colors::NEUTRAL_GRAY
    } else {
        colors::INFO_BLUE
    };

    CreateEmbed::default()
        .title("📋 Queue")
        .description(format_queue(tracks))
        .color(colour)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Listado numerado desde 0; la fila 0 es el track en reproducción.
pub fn format_queue(tracks: &[Track]) -> String {
    if tracks.is_empty() {
        return "Queue is empty".to_string();
    }

    tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            if i == 0 {
                format!("{}. {} -> Now playing", i, track.title())
            } else {
                format!("{}. {}", i, track.title())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(title: &str) -> Track {
        Track::new(title, title, "https://youtu.be/abcdefghijk", UserId::new(3))
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(213)), "3:33");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn test_queue_listing_marks_the_playing_row() {
        let listing = format_queue(&[track("A"), track("B"), track("C")]);
        assert_eq!(listing, "0. A -> Now playing\n1. B\n2. C");
    }

    #[test]
    fn test_empty_queue_listing() {
        assert_eq!(format_queue(&[]), "Queue is empty");
    }

    #[test]
    fn test_now_playing_card() {
        let track = track("Song")
            .with_duration(Duration::from_secs(90))
            .with_thumbnail("https://i.ytimg.com/vi/abcdefghijk/hq.jpg");
        let json = serde_json::to_value(create_now_playing_embed(&track)).unwrap();

        assert_eq!(json["author"]["name"], "Now playing:");
        assert_eq!(json["title"], "Song");
        assert_eq!(json["url"], "https://youtu.be/abcdefghijk");
        assert_eq!(json["description"], "Duration: 1:30");
        assert_eq!(
            json["thumbnail"]["url"],
            "https://i.ytimg.com/vi/abcdefghijk/hq.jpg"
        );
    }

    #[test]
    fn test_error_tone_is_red() {
        let json = serde_json::to_value(create_message_embed("boom", Tone::Error)).unwrap();
        assert_eq!(json["description"], "boom");
        assert_eq!(json["color"], colors::ERROR_RED.0);
    }
}
