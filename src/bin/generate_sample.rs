use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use serde_json::{json, Value as JsonValue};

use lidar_quicklook::data::model::{DataFile, DP, DP_DATA, DP_TIME, LIDAR_RANGE};
use lidar_quicklook::{ChannelRecord, FieldValue, MeasurementSet, Metadata};

/// 2024-03-01T00:00:00Z
const START: f64 = 1_709_251_200.0;
const PROFILE_STEP_S: f64 = 30.0;
const PROFILES_PER_FILE: usize = 120;
const RANGE_BINS: usize = 1000;
const RANGE_STEP_M: f64 = 15.0;

/// Channel id, name, peak backscatter (counts).
const CHANNELS: [(&str, &str, f64); 3] = [
    ("1", "532nm co-polarised", 5e6),
    ("2", "532nm cross-polarised", 4e5),
    ("11", "1064nm", 2e7),
];

#[derive(Parser, Debug)]
#[command(about = "Write synthetic hourly lidar chunks for trying out the plotter")]
struct Args {
    /// Directory that receives the JSON chunks
    #[arg(default_value = ".", value_hint = ValueHint::DirPath)]
    outdir: PathBuf,

    /// Number of consecutive one-hour chunks
    #[arg(default_value_t = 3)]
    files: usize,
}

/// Seeded SplitMix64 stream; the same seed always yields the same files.
struct Noise(u64);

impl Noise {
    fn uniform(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Normal sample (Box-Muller).
    fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(1e-15);
        let u2 = self.uniform();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

/// Aerosol-laden boundary layer with a growing top, plus a thin cloud layer
/// after the first two hours, with multiplicative noise.
fn profile(t: f64, altitudes: &[f64], peak: f64, rng: &mut Noise) -> Vec<f64> {
    let hours = (t - START) / 3600.0;
    let bl_top = 800.0 + 600.0 * (hours / 6.0).min(1.0);
    let cloud = hours > 2.0;

    altitudes
        .iter()
        .map(|&z| {
            let aerosol = if z < bl_top {
                1.0
            } else {
                (-(z - bl_top) / 400.0).exp()
            };
            let cloud_signal = if cloud {
                5.0 * (-((z - 3000.0) / 80.0).powi(2)).exp()
            } else {
                0.0
            };
            let clear_air = 0.02 * (-z / 8000.0).exp();
            let noise = rng.normal(1.0, 0.08).max(0.0);
            peak * (aerosol + cloud_signal + clear_air) * noise
        })
        .collect()
}

fn chunk(index: usize, altitudes: &[f64], rng: &mut Noise) -> MeasurementSet {
    let t0 = START + index as f64 * PROFILES_PER_FILE as f64 * PROFILE_STEP_S;
    let times: Vec<f64> = (0..PROFILES_PER_FILE)
        .map(|i| t0 + i as f64 * PROFILE_STEP_S)
        .collect();

    let mut channels = BTreeMap::new();
    for &(id, name, peak) in &CHANNELS {
        let rows: Vec<JsonValue> = times
            .iter()
            .map(|&t| json!(profile(t, altitudes, peak, rng)))
            .collect();

        let mut dp = BTreeMap::new();
        dp.insert(DP_TIME.to_string(), FieldValue::Sequence(times.iter().map(|&t| json!(t)).collect()));
        dp.insert(DP_DATA.to_string(), FieldValue::Sequence(rows));

        let mut fields = BTreeMap::new();
        fields.insert("serial_number".to_string(), FieldValue::Text("SYN-0001".to_string()));
        fields.insert("channel_name".to_string(), FieldValue::Text(name.to_string()));
        fields.insert(DP.to_string(), FieldValue::Nested(dp));
        fields.insert(
            LIDAR_RANGE.to_string(),
            FieldValue::Sequence(altitudes.iter().map(|&z| json!(z)).collect()),
        );
        channels.insert(id.to_string(), ChannelRecord { fields });
    }
    MeasurementSet { channels }
}

fn main() -> Result<()> {
    env_logger::init();

    let Args { outdir, files } = Args::parse();

    std::fs::create_dir_all(&outdir)
        .with_context(|| format!("creating {}", outdir.display()))?;

    let mut rng = Noise(42);
    let altitudes: Vec<f64> = (0..RANGE_BINS)
        .map(|i| (i as f64 + 0.5) * RANGE_STEP_M)
        .collect();

    for index in 0..files {
        let mut metadata = Metadata::new();
        metadata.insert("instrument".to_string(), FieldValue::Text("synthetic lidar".to_string()));
        metadata.insert("chunk".to_string(), FieldValue::Integer(index as i64));

        let doc = DataFile {
            data_dict: chunk(index, &altitudes, &mut rng),
            metadata_dict: metadata,
        };

        let path = outdir.join(format!("sample_lidar_{index:02}.json"));
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &doc)
            .with_context(|| format!("writing {}", path.display()))?;
        writer.flush()?;
        log::info!("wrote {}", path.display());
    }

    println!(
        "Wrote {files} chunks ({PROFILES_PER_FILE} profiles x {RANGE_BINS} bins, {} channels) to {}",
        CHANNELS.len(),
        outdir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_default_to_three_chunks_in_cwd() {
        let args = Args::try_parse_from(["generate_sample"]).unwrap();
        assert_eq!(args.outdir, PathBuf::from("."));
        assert_eq!(args.files, 3);
    }

    #[test]
    fn args_take_outdir_then_count() {
        let args = Args::try_parse_from(["generate_sample", "out", "5"]).unwrap();
        assert_eq!(args.outdir, PathBuf::from("out"));
        assert_eq!(args.files, 5);
        assert!(Args::try_parse_from(["generate_sample", "out", "many"]).is_err());
    }

    #[test]
    fn noise_is_reproducible_and_bounded() {
        let (mut a, mut b) = (Noise(42), Noise(42));
        for _ in 0..100 {
            let u = a.uniform();
            assert_eq!(u, b.uniform());
            assert!((0.0..1.0).contains(&u));
        }

        let mut n = Noise(7);
        let mean = (0..10_000).map(|_| n.normal(1.0, 0.08)).sum::<f64>() / 10_000.0;
        assert!((mean - 1.0).abs() < 0.01);
    }

    #[test]
    fn chunks_follow_each_other_in_time() {
        let altitudes = [7.5, 22.5, 37.5];
        let mut rng = Noise(1);
        let first = chunk(0, &altitudes, &mut rng);
        let second = chunk(1, &altitudes, &mut rng);

        let ids: Vec<&str> = first.channel_ids().collect();
        assert_eq!(ids, vec!["1", "11", "2"]);

        let t_first = first.channel("1").unwrap().time().unwrap();
        let t_second = second.channel("1").unwrap().time().unwrap();
        assert_eq!(t_first.len(), PROFILES_PER_FILE);
        assert_eq!(t_second[0], t_first[PROFILES_PER_FILE - 1] + PROFILE_STEP_S);

        let data = second.channel("11").unwrap().data().unwrap();
        assert!(data.iter().all(|row| row.len() == altitudes.len()));
    }
}
