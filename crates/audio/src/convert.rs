//! Sample-Konvertierung zwischen PCM-Bytes, f32 und i16
//!
//! Zustandslos. Werte ausserhalb von [-1.0, 1.0] werden begrenzt, nicht
//! abgelehnt.

/// Breite eines PCM-Samples im Datagramm (i16)
pub const SAMPLE_BYTES: usize = 2;

/// Konvertiert ein normalisiertes f32-Sample in ein i16-Sample
///
/// Negative Werte werden mit 32768 skaliert, nicht-negative mit 32767,
/// danach Richtung Null abgeschnitten. Damit gilt exakt:
/// `1.0 -> 32767` und `-1.0 -> -32768`.
#[inline]
pub fn float_to_i16(sample: f32) -> i16 {
    // Rechnung in f64, damit das Abschneiden nicht von f32-Rundung abhaengt
    let s = f64::from(sample.clamp(-1.0, 1.0));
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Konvertiert einen Frame elementweise nach i16
pub fn floats_to_i16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| float_to_i16(s)).collect()
}

/// Interpretiert einen Byte-Puffer als little-endian i16-PCM und normalisiert
///
/// Jedes Sample wird durch 32768 geteilt. Ein einzelnes Restbyte am Ende
/// (ungerade Laenge) wird ignoriert.
pub fn bytes_to_float_samples(buffer: &[u8]) -> Vec<f32> {
    buffer
        .chunks_exact(SAMPLE_BYTES)
        .map(|paar| f32::from(i16::from_le_bytes([paar[0], paar[1]])) / 32768.0)
        .collect()
}

/// Gibt true zurueck wenn der Puffer ein abgeschnittenes Sample enthaelt
#[inline]
pub fn hat_restbyte(buffer: &[u8]) -> bool {
    buffer.len() % SAMPLE_BYTES != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grenzwerte_exakt() {
        assert_eq!(float_to_i16(1.0), 32767);
        assert_eq!(float_to_i16(-1.0), -32768);
        assert_eq!(float_to_i16(0.0), 0);
        assert_eq!(float_to_i16(-0.0), 0);
    }

    #[test]
    fn werte_ausserhalb_werden_begrenzt() {
        assert_eq!(float_to_i16(2.5), 32767);
        assert_eq!(float_to_i16(-7.0), -32768);
        assert_eq!(float_to_i16(f32::INFINITY), 32767);
        assert_eq!(float_to_i16(f32::NEG_INFINITY), -32768);
    }

    #[test]
    fn abschneiden_richtung_null() {
        // 0.5 * 32767 = 16383.5 -> 16383
        assert_eq!(float_to_i16(0.5), 16383);
        // -0.5 * 32768 = -16384 exakt
        assert_eq!(float_to_i16(-0.5), -16384);
        // kleine negative Werte landen bei 0, nicht bei -1
        assert_eq!(float_to_i16(-1.0 / 65536.0), 0);
    }

    #[test]
    fn bytes_little_endian() {
        // 0x0100 = 256, 0xFFFF = -1, 0x8000 = -32768, 0x7FFF = 32767
        let bytes = [0x00, 0x01, 0xFF, 0xFF, 0x00, 0x80, 0xFF, 0x7F];
        let samples = bytes_to_float_samples(&bytes);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 256.0 / 32768.0);
        assert_eq!(samples[1], -1.0 / 32768.0);
        assert_eq!(samples[2], -1.0);
        assert_eq!(samples[3], 32767.0 / 32768.0);
    }

    #[test]
    fn ungerades_restbyte_wird_ignoriert() {
        let bytes = [0x00, 0x40, 0x12];
        assert!(hat_restbyte(&bytes));
        let samples = bytes_to_float_samples(&bytes);
        assert_eq!(samples, vec![0.5]);
    }

    #[test]
    fn leerer_puffer() {
        assert!(bytes_to_float_samples(&[]).is_empty());
        assert!(bytes_to_float_samples(&[0x42]).is_empty());
        assert!(!hat_restbyte(&[]));
    }

    #[test]
    fn round_trip_alle_i16_werte_innerhalb_eins() {
        for wert in i16::MIN..=i16::MAX {
            let bytes = wert.to_le_bytes();
            let float = bytes_to_float_samples(&bytes)[0];
            let zurueck = float_to_i16(float);
            let diff = (i32::from(zurueck) - i32::from(wert)).abs();
            assert!(diff <= 1, "Wert {wert} -> {zurueck} (Differenz {diff})");
            if wert <= 0 {
                // Negative Seite ist verlustfrei
                assert_eq!(zurueck, wert);
            }
        }
    }

    #[test]
    fn frame_konvertierung_elementweise() {
        let frame = [0.0, 1.0, -1.0, 0.25];
        assert_eq!(floats_to_i16(&frame), vec![0, 32767, -32768, 8191]);
    }
}
