//! Text-to-speech clients used by the podcast service.

use anyhow::{Context, Result};
use std::io::Cursor;

pub mod gemini;

pub use gemini::GeminiTtsProvider;

/// Sample rate assumed for raw PCM when the mime type does not carry one.
pub const DEFAULT_PCM_RATE: u32 = 24_000;

/// Synthesised speech as returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Audio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Audio {
    fn is_raw_pcm(&self) -> bool {
        let base = self.mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        base == "audio/l16" || base == "audio/pcm"
    }

    /// Make the audio playable from a file: raw PCM gets a WAV header,
    /// everything else is returned unchanged.
    pub fn into_playable(self) -> Result<Audio> {
        if !self.is_raw_pcm() {
            return Ok(self);
        }
        let rate = pcm_rate(&self.mime_type).unwrap_or(DEFAULT_PCM_RATE);
        let bytes = pcm_to_wav(&self.bytes, rate)?;
        Ok(Audio { bytes, mime_type: "audio/wav".to_string() })
    }

    /// File extension for the audio's mime type.
    pub fn extension(&self) -> &'static str {
        let base = self.mime_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match base.as_str() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" | "audio/opus" => "ogg",
            _ => "bin",
        }
    }
}

#[async_trait::async_trait]
pub trait TtsProvider: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Audio>;
}

/// `audio/L16;codec=pcm;rate=24000` -> 24000
fn pcm_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// Wrap 16-bit little-endian mono PCM in a WAV container.
fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).context("Failed to start WAV container")?;
        for frame in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([frame[0], frame[1]]))
                .context("Failed to write PCM sample")?;
        }
        writer.finalize().context("Failed to finalize WAV container")?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rate_from_mime_type() {
        assert_eq!(pcm_rate("audio/L16;codec=pcm;rate=24000"), Some(24000));
        assert_eq!(pcm_rate("audio/pcm; rate=16000"), Some(16000));
        assert_eq!(pcm_rate("audio/pcm"), None);
    }

    #[test]
    fn raw_pcm_becomes_wav() {
        let audio = Audio {
            bytes: vec![0x01, 0x00, 0xff, 0x7f, 0x00, 0x80],
            mime_type: "audio/L16;codec=pcm;rate=16000".into(),
        };

        let wav = audio.into_playable().unwrap();
        assert_eq!(wav.mime_type, "audio/wav");
        assert_eq!(wav.extension(), "wav");
        assert_eq!(&wav.bytes[..4], b"RIFF");

        let reader = hound::WavReader::new(Cursor::new(wav.bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, i16::MAX, i16::MIN]);
    }

    #[test]
    fn encoded_audio_is_left_alone() {
        let audio = Audio { bytes: b"ID3".to_vec(), mime_type: "audio/mpeg".into() };
        let same = audio.clone().into_playable().unwrap();
        assert_eq!(same, audio);
        assert_eq!(same.extension(), "mp3");
        assert_eq!(Audio { bytes: vec![], mime_type: "application/octet-stream".into() }.extension(), "bin");
    }
}
