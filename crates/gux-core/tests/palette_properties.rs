use gux_core::palette::{self, distance, nearest, nearest_name, resolve, Rgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn distance_is_symmetric_and_zero_on_identity() {
    let entries = palette::entries();
    for a in entries.iter().step_by(7) {
        assert_eq!(distance(a.rgb, a.rgb), 0.0);
        for b in entries.iter().step_by(11) {
            let ab = distance(a.rgb, b.rgb);
            let ba = distance(b.rgb, a.rgb);
            assert!((ab - ba).abs() < 1e-9, "{} / {}", a.name, b.name);
            assert!(ab >= 0.0);
        }
    }
}

#[test]
fn black_and_white_span_the_lightness_axis() {
    let extreme = distance(Rgb::BLACK, Rgb::WHITE);
    assert!((extreme - 100.0).abs() < 0.5, "ΔE {extreme}");
    let grey = Rgb::new(128, 128, 128);
    assert!(distance(grey, Rgb::WHITE) < extreme);
    assert!(distance(grey, Rgb::BLACK) < extreme);
}

#[test]
fn every_entry_is_its_own_nearest_colour() {
    for entry in palette::entries() {
        let (found, dist) = nearest(entry.rgb);
        assert_eq!(dist, 0.0, "{}", entry.name);
        assert_eq!(found.rgb, entry.rgb);
    }
}

#[test]
fn every_name_round_trips_through_nearest() {
    for entry in palette::entries() {
        let rgb = resolve(entry.name).unwrap();
        assert_eq!(nearest_name(rgb), entry.name);
    }
}

#[test]
fn distance_obeys_triangle_inequality() {
    let entries = palette::entries();
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..5_000 {
        let a = entries[rng.gen_range(0..entries.len())].rgb;
        let b = entries[rng.gen_range(0..entries.len())].rgb;
        let c = Rgb::new(rng.gen(), rng.gen(), rng.gen());
        let direct = distance(a, c);
        let via = distance(a, b) + distance(b, c);
        assert!(direct <= via + 1e-6, "{a} -> {b} -> {c}: {direct} > {via}");
    }
}

#[test]
fn resolve_accepts_every_spelling_of_a_name() {
    let expected = resolve("slate700").unwrap();
    for spelling in ["tw.slate700", "slate-700", "Slate_700", "#334155"] {
        assert_eq!(resolve(spelling).unwrap(), expected, "{spelling}");
    }
    assert!(resolve("tw.not-a-colour").is_err());
}
