//! Synthesized speech payloads.
//!
//! The provider returns raw signed 16-bit little-endian PCM (`audio/L16`)
//! with the sample rate in the mime type parameters. Players need a
//! container, so `to_wav` prepends a canonical 44-byte RIFF header.

const DEFAULT_SAMPLE_RATE: u32 = 24_000;
const BITS_PER_SAMPLE: u16 = 16;
const WAV_HEADER_LEN: usize = 44;
const MAX_SAMPLE_RATE: u32 = 384_000;
const MAX_CHANNELS: u16 = 8;

/// Encoding of the bytes held by `SpeechAudio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    /// Headerless signed 16-bit little-endian PCM.
    Pcm16 { sample_rate: u32, channels: u16 },
    /// Already a WAV container.
    Wav,
}

/// Audio returned by the speech provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    pub encoding: AudioEncoding,
    pub data: Vec<u8>,
}

impl SpeechAudio {
    /// Empty PCM buffer, returned for blank input.
    pub fn empty() -> Self {
        Self {
            encoding: AudioEncoding::Pcm16 {
                sample_rate: DEFAULT_SAMPLE_RATE,
                channels: 1,
            },
            data: Vec::new(),
        }
    }

    /// Builds audio from an inline payload and its mime type.
    ///
    /// Unknown or missing parameters fall back to 24 kHz mono PCM.
    pub fn from_inline(mime_type: Option<&str>, data: Vec<u8>) -> Self {
        let encoding = mime_type.map_or(
            AudioEncoding::Pcm16 {
                sample_rate: DEFAULT_SAMPLE_RATE,
                channels: 1,
            },
            parse_mime_type,
        );
        Self { encoding, data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Playback length in milliseconds, when known.
    pub fn duration_ms(&self) -> Option<u64> {
        match self.encoding {
            AudioEncoding::Pcm16 {
                sample_rate,
                channels,
            } if sample_rate > 0 && channels > 0 => {
                let frame_bytes = u64::from(channels) * u64::from(BITS_PER_SAMPLE / 8);
                let frames = self.data.len() as u64 / frame_bytes;
                Some(frames * 1000 / u64::from(sample_rate))
            }
            _ => None,
        }
    }

    /// Returns a playable WAV file image.
    pub fn to_wav(&self) -> Vec<u8> {
        let (sample_rate, channels) = match self.encoding {
            AudioEncoding::Wav => return self.data.clone(),
            AudioEncoding::Pcm16 {
                sample_rate,
                channels,
            } => (sample_rate, channels),
        };

        // Hand-built encodings skip mime validation.
        let block_align = channels.saturating_mul(BITS_PER_SAMPLE / 8);
        let byte_rate = sample_rate.saturating_mul(u32::from(block_align));
        let data_len = u32::try_from(self.data.len()).unwrap_or(u32::MAX - 36);

        let mut out = Vec::with_capacity(WAV_HEADER_LEN + self.data.len());
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

fn parse_mime_type(mime_type: &str) -> AudioEncoding {
    let mut parts = mime_type.split(';').map(str::trim);
    let essence = parts.next().unwrap_or_default().to_ascii_lowercase();
    if essence == "audio/wav" || essence == "audio/x-wav" || essence == "audio/wave" {
        return AudioEncoding::Wav;
    }

    let mut sample_rate = DEFAULT_SAMPLE_RATE;
    let mut channels = 1;
    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "rate" => {
                sample_rate = value
                    .trim()
                    .parse()
                    .ok()
                    .filter(|rate| (1..=MAX_SAMPLE_RATE).contains(rate))
                    .unwrap_or(DEFAULT_SAMPLE_RATE);
            }
            "channels" => {
                channels = value
                    .trim()
                    .parse()
                    .ok()
                    .filter(|count| (1..=MAX_CHANNELS).contains(count))
                    .unwrap_or(1);
            }
            _ => {}
        }
    }

    AudioEncoding::Pcm16 {
        sample_rate,
        channels,
    }
}
