use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use rf_coverage::coverage::{ScaleOverride, compute_coverage};
use rf_coverage::geo::LatLon;
use rf_coverage::grid::CenterCalibration;
use rf_coverage::io::Transmitter;
use rf_coverage::pattern::parse_pattern;
use rf_coverage::physics::ProfileEngine;
use rf_coverage::propagation::FreeSpaceModel;
use rf_coverage::terrain::FlatTerrain;
use rf_coverage::units::{Db, Degrees, Kilometers, MegaHertz, Watts};

fn transmitter() -> Transmitter {
    Transmitter {
        name: "Bench".to_string(),
        location: LatLon::new(48.8566, 2.3522),
        power_w: Watts(1000.0),
        antenna_gain_dbi: Db(10.0),
        frequency_mhz: MegaHertz(100.0),
        direction_deg: Degrees(90.0),
        tilt_deg: Degrees(2.0),
        ..Transmitter::default()
    }
}

fn coverage_benchmark(c: &mut Criterion) {
    let tx = transmitter();
    // Cardioid-ish horizontal block, 8 degree vertical lobe.
    let mut text: String = (0..360)
        .map(|az| format!("{az},{:.4}\n", 0.55 + 0.45 * (az as f64).to_radians().cos()))
        .collect();
    text.push_str("999\n");
    for el in -90..=90 {
        text.push_str(&format!("{el},{:.4}\n", (-0.5 * (el as f64 / 8.0).powi(2)).exp()));
    }
    let pattern = parse_pattern(&text);
    let calibration = CenterCalibration::default();

    c.bench_function("compute_coverage 10 km", |b| {
        b.iter(|| {
            compute_coverage(
                black_box(&tx),
                black_box(Some(&pattern)),
                black_box(Some(Kilometers(10.0))),
                ScaleOverride::default(),
                &FreeSpaceModel,
                &calibration,
            )
        })
    });

    let engine = ProfileEngine::default();
    let rx = LatLon::new(48.95, 2.6);
    c.bench_function("compute_profile flat", |b| {
        b.iter(|| {
            engine.compute_profile(
                black_box(&tx),
                black_box(Some(&pattern)),
                tx.location,
                black_box(rx),
                &FlatTerrain::default(),
                &FreeSpaceModel,
            )
        })
    });
}

criterion_group!(benches, coverage_benchmark);
criterion_main!(benches);
