//! DTMF tone synthesis.

use std::f32::consts::PI;
use std::path::Path;

use super::AudioError;

/// Renders DTMF digits to a WAV file.
pub trait ToneSynthesizer: Send + Sync {
    /// Write the tones for `digits`, in order, to `output`.
    ///
    /// # Errors
    ///
    /// Returns an error for a digit with no tone or a failed write.
    fn render(&self, digits: &str, output: &Path) -> Result<(), AudioError>;
}

/// Low and high frequency pair for a DTMF key.
#[must_use]
pub fn dtmf_frequencies(key: char) -> Option<(f32, f32)> {
    let low = match key {
        '1' | '2' | '3' | 'A' => 697.0,
        '4' | '5' | '6' | 'B' => 770.0,
        '7' | '8' | '9' | 'C' => 852.0,
        '*' | '0' | '#' | 'D' => 941.0,
        _ => return None,
    };
    let high = match key {
        '1' | '4' | '7' | '*' => 1209.0,
        '2' | '5' | '8' | '0' => 1336.0,
        '3' | '6' | '9' | '#' => 1477.0,
        _ => 1633.0,
    };
    Some((low, high))
}

/// [`ToneSynthesizer`] writing dual sine tones with `hound`.
#[derive(Debug, Clone, Copy)]
pub struct DtmfToneGenerator {
    pub sample_rate: u32,
    /// Length of each tone.
    pub tone_ms: u32,
    /// Silence after each tone.
    pub gap_ms: u32,
    /// Peak level, 0.0 to 1.0.
    pub amplitude: f32,
}

impl Default for DtmfToneGenerator {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            tone_ms: 200,
            gap_ms: 100,
            amplitude: 0.5,
        }
    }
}

impl DtmfToneGenerator {
    fn samples(&self, ms: u32) -> u32 {
        self.sample_rate.saturating_mul(ms) / 1000
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn tone(&self, low: f32, high: f32) -> impl Iterator<Item = i16> + '_ {
        let rate = self.sample_rate as f32;
        (0..self.samples(self.tone_ms)).map(move |n| {
            let t = n as f32 / rate;
            let mixed = ((2.0 * PI * low * t).sin() + (2.0 * PI * high * t).sin()) / 2.0;
            (mixed * self.amplitude * f32::from(i16::MAX)) as i16
        })
    }
}

impl ToneSynthesizer for DtmfToneGenerator {
    fn render(&self, digits: &str, output: &Path) -> Result<(), AudioError> {
        let tones = digits
            .chars()
            .map(|c| dtmf_frequencies(c).ok_or(AudioError::InvalidDigit(c)))
            .collect::<Result<Vec<_>, _>>()?;

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(output, spec)?;
        for (low, high) in tones {
            for sample in self.tone(low, high) {
                writer.write_sample(sample)?;
            }
            for _ in 0..self.samples(self.gap_ms) {
                writer.write_sample(0i16)?;
            }
        }
        writer.finalize()?;
        tracing::debug!(digits, output = %output.display(), "Rendered DTMF tones");
        Ok(())
    }
}
