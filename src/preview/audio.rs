use image::{Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{AppError, Result};
use crate::preview::{Artifact, DerivedVariants};

/// Snippet length bounds, in seconds
const MIN_SNIPPET_SECS: f64 = 1.0;
const MAX_SNIPPET_SECS: f64 = 15.0;
/// Share of the source duration exposed in the preview
const SNIPPET_RATIO: f64 = 0.2;

const THUMB_SIZE: u32 = 512;

pub fn derive(data: &[u8]) -> Result<DerivedVariants> {
    let decoded = decode_all(data)?;

    let frames = decoded.samples.len() / decoded.channels as usize;
    let total_secs = frames as f64 / decoded.sample_rate as f64;
    let snippet_secs = snippet_duration(total_secs);
    let snippet_frames =
        frames.min((snippet_secs * decoded.sample_rate as f64).round() as usize);
    let snippet = &decoded.samples[..snippet_frames * decoded.channels as usize];

    let wav = encode_wav(snippet, decoded.channels, decoded.sample_rate)?;

    Ok(DerivedVariants {
        thumbnail: Some(Artifact {
            bytes: play_glyph_thumbnail()?,
            content_type: "image/png".to_string(),
        }),
        preview: Artifact {
            bytes: wav,
            content_type: "audio/wav".to_string(),
        },
    })
}

/// clamp(20% of total, 1s, 15s)
pub(crate) fn snippet_duration(total_secs: f64) -> f64 {
    (total_secs * SNIPPET_RATIO).clamp(MIN_SNIPPET_SECS, MAX_SNIPPET_SECS)
}

struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

/// Decode the whole stream to interleaved f32 samples
fn decode_all(data: &[u8]) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(
        Box::new(Cursor::new(data.to_vec())),
        Default::default(),
    );

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AppError::Derivation(format!("Unrecognized audio data: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AppError::Derivation("Audio stream has no default track".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AppError::Derivation(format!("Unsupported audio codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let mut channels: u16 = 1;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                return Err(AppError::Derivation(format!("Failed to read audio: {}", e)))
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                let spec = *audio_buf.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;
                let mut sample_buf =
                    SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(audio_buf);
                samples.extend_from_slice(sample_buf.samples());
            }
            // corrupt packets are skipped, matching decoder guidance
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => {
                return Err(AppError::Derivation(format!("Failed to decode audio: {}", e)))
            }
        }
    }

    if samples.is_empty() {
        return Err(AppError::Derivation("Audio stream decoded to nothing".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Write interleaved f32 samples as 16-bit PCM WAV
fn encode_wav(samples: &[f32], channels: u16, sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AppError::Derivation(format!("Failed to start WAV: {}", e)))?;
        for sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(pcm)
                .map_err(|e| AppError::Derivation(format!("Failed to write WAV: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| AppError::Derivation(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

/// Audio has no visual derivative; the thumbnail is a static gray
/// canvas with a play triangle
fn play_glyph_thumbnail() -> Result<Vec<u8>> {
    let mut canvas = RgbImage::from_pixel(THUMB_SIZE, THUMB_SIZE, Rgb([128, 128, 128]));
    let triangle = [
        Point::new(204, 153),
        Point::new(204, 358),
        Point::new(358, 256),
    ];
    draw_polygon_mut(&mut canvas, &triangle, Rgb([255, 255, 255]));

    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(canvas)
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| AppError::Derivation(format!("Failed to encode thumbnail: {}", e)))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_wav(secs: f64, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (secs * sample_rate as f64) as usize;
            for n in 0..frames {
                let t = n as f32 / sample_rate as f32;
                let s = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
                writer.write_sample((s * 20_000.0) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn wav_duration_secs(bytes: &[u8]) -> f64 {
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        reader.duration() as f64 / spec.sample_rate as f64
    }

    #[test]
    fn snippet_duration_is_clamped() {
        assert_eq!(snippet_duration(2.0), 1.0);
        assert_eq!(snippet_duration(30.0), 6.0);
        assert_eq!(snippet_duration(600.0), 15.0);
    }

    #[test]
    fn short_source_gets_one_second_preview() {
        let variants = derive(&sine_wav(4.0, 22_050)).unwrap();
        let d = wav_duration_secs(&variants.preview.bytes);
        assert!((d - 1.0).abs() < 0.05, "got {} seconds", d);
    }

    #[test]
    fn long_source_gets_twenty_percent() {
        let variants = derive(&sine_wav(30.0, 22_050)).unwrap();
        let d = wav_duration_secs(&variants.preview.bytes);
        assert!((d - 6.0).abs() < 0.05, "got {} seconds", d);
    }

    #[test]
    fn thumbnail_is_square_png() {
        let variants = derive(&sine_wav(2.0, 22_050)).unwrap();
        let thumb = variants.thumbnail.unwrap();
        assert_eq!(thumb.content_type, "image/png");
        let img = image::load_from_memory(&thumb.bytes).unwrap();
        assert_eq!((img.width(), img.height()), (512, 512));
    }
}
