//! Frame-Akkumulator
//!
//! Entkoppelt die beliebige Stueckelung eingehender Datagramme von der
//! festen Frame-Groesse des Encoders. Samples landen in einem Ring-Buffer
//! mit doppelter Frame-Kapazitaet; sobald ein voller Frame vorliegt, wird
//! er als Kopie herausgegeben. Der Rest bleibt fuer das naechste Datagramm
//! stehen, ohne verschoben zu werden.
//!
//! Was nicht mehr in den Puffer passt, wird verworfen (Overflow-Schutz statt
//! unbegrenztem Wachstum).

use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;
use tracing::debug;

/// Sammelt interleavte f32-Samples zu Frames fester Groesse
pub struct FrameAccumulator {
    puffer: HeapRb<f32>,
    frame_size: usize,
    channels: usize,
    target_samples: usize,
    kapazitaet: usize,
    verworfen: u64,
}

impl FrameAccumulator {
    /// Erstellt einen Akkumulator
    ///
    /// `frame_size` = Samples pro Kanal und Frame, `channels` = Kanalanzahl.
    /// Beide werden auf mindestens 1 angehoben.
    pub fn new(frame_size: usize, channels: usize) -> Self {
        let frame_size = frame_size.max(1);
        let channels = channels.max(1);
        let target_samples = frame_size * channels;
        let kapazitaet = target_samples * 2;

        debug!(
            frame_size,
            channels, target_samples, kapazitaet, "FrameAccumulator erstellt"
        );

        Self {
            puffer: HeapRb::new(kapazitaet),
            frame_size,
            channels,
            target_samples,
            kapazitaet,
            verworfen: 0,
        }
    }

    /// Nimmt einen Chunk auf und gibt alle dadurch vollstaendigen Frames zurueck
    ///
    /// Samples jenseits der freien Kapazitaet werden still verworfen und in
    /// `dropped_samples()` gezaehlt. Die Frames kommen in Ankunftsreihenfolge
    /// und haben immer exakt `target_samples()` Samples.
    pub fn add_samples(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        let kopiert = self.puffer.push_slice(samples);
        let verworfen = samples.len() - kopiert;
        if verworfen > 0 {
            self.verworfen += verworfen as u64;
            debug!(
                verworfen,
                gepuffert = self.buffered(),
                "Akkumulator voll, Samples verworfen"
            );
        }

        let mut frames = Vec::new();
        while self.puffer.occupied_len() >= self.target_samples {
            let mut frame = vec![0.0f32; self.target_samples];
            let gelesen = self.puffer.pop_slice(&mut frame);
            debug_assert_eq!(gelesen, self.target_samples);
            frames.push(frame);
        }

        frames
    }

    /// Anzahl der gepufferten, noch keinem Frame zugeordneten Samples
    pub fn buffered(&self) -> usize {
        self.puffer.occupied_len()
    }

    /// Kopie der gepufferten Samples (aeltestes zuerst)
    pub fn pending_samples(&self) -> Vec<f32> {
        self.puffer.iter().copied().collect()
    }

    /// Gesamtkapazitaet des Puffers in Samples
    pub fn capacity(&self) -> usize {
        self.kapazitaet
    }

    /// Interleavte Samples pro Frame (`frame_size * channels`)
    pub fn target_samples(&self) -> usize {
        self.target_samples
    }

    /// Samples pro Kanal und Frame
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Kanalanzahl
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Seit Erstellung durch Overflow verworfene Samples
    pub fn dropped_samples(&self) -> u64 {
        self.verworfen
    }
}
