//! Integration tests for conservative regridding through the public API.

use mosaic_grid::{cubed_sphere, global_latlon, latlon_tile, FieldBuffer, Mosaic};
use regrid::{
    build_exchange_grid, conservation_report, interpolate_scalar, interpolate_vector, ConserveOrder,
    InterpMethod, InterpOptions, RegridConfig, Regridder, TargetGrid,
};
use test_utils::{assert_approx_eq, init_tracing, smooth_field, tolerance, FIXTURE_MISSING};

fn regional(nlon: usize, nlat: usize, west: f64, east: f64) -> Mosaic {
    Mosaic::new(
        "regional",
        vec![latlon_tile("tile1", nlon, nlat, west, east, -10.0, 10.0).unwrap()],
    )
    .unwrap()
}

/// Sample `f(lon, lat)` at every interior cell center.
fn sample(mosaic: &Mosaic, f: impl Fn(f64, f64) -> f64) -> Vec<FieldBuffer> {
    mosaic
        .tiles()
        .iter()
        .map(|tile| {
            let mut values = Vec::with_capacity(tile.ncells());
            for j in 0..tile.ny() {
                for i in 0..tile.nx() {
                    let c = tile.center_lonlat(i + 1, j + 1);
                    values.push(f(c.lon, c.lat));
                }
            }
            FieldBuffer::from_interior(tile.nx(), tile.ny(), &values, None).unwrap()
        })
        .collect()
}

fn regrid_with(method: InterpMethod, source: &Mosaic, target: &Mosaic, fields: &[FieldBuffer]) -> Vec<regrid::TargetField> {
    let regridder = Regridder::new(RegridConfig {
        method,
        workers: 3,
        ..RegridConfig::default()
    })
    .unwrap();
    let target = TargetGrid::Mosaic(target.clone());
    let weights = regridder.load_or_build_weights(source, &target).unwrap();
    regridder.regrid_scalar(source, &target, &weights, fields).unwrap()
}

// ============================================================================
// Area-weighted means
// ============================================================================

#[test]
fn test_two_by_two_mean() {
    let source = regional(2, 2, 0.0, 20.0);
    let target = regional(1, 1, 0.0, 20.0);
    let fields = vec![FieldBuffer::from_interior(2, 2, &[1.0, 2.0, 3.0, 4.0], None).unwrap()];

    let out = regrid_with(InterpMethod::ConserveOrder1, &source, &target, &fields);
    assert_eq!(out.len(), 1);
    assert_approx_eq!(out[0].get(0, 0), 2.5, tolerance::EXACT);
}

#[test]
fn test_missing_source_cell_skipped() {
    let source = regional(2, 2, 0.0, 20.0);
    let target = regional(1, 1, 0.0, 20.0);
    let values = [1.0, FIXTURE_MISSING, 3.0, 4.0];
    let fields = vec![FieldBuffer::from_interior(2, 2, &values, Some(FIXTURE_MISSING)).unwrap()];

    let out = regrid_with(InterpMethod::ConserveOrder1, &source, &target, &fields);
    assert_approx_eq!(out[0].get(0, 0), 8.0 / 3.0, tolerance::EXACT);
    assert!(!out[0].is_missing(0, 0));
}

#[test]
fn test_all_missing_gives_sentinel() {
    let source = regional(2, 2, 0.0, 20.0);
    let target = regional(1, 1, 0.0, 20.0);
    let fields = vec![FieldBuffer::from_interior(2, 2, &[FIXTURE_MISSING; 4], Some(FIXTURE_MISSING)).unwrap()];

    let out = regrid_with(InterpMethod::ConserveOrder1, &source, &target, &fields);
    assert_eq!(out[0].get(0, 0), FIXTURE_MISSING);
    assert!(out[0].is_missing(0, 0));
}

#[test]
fn test_uncovered_target_cell_is_missing() {
    let source = regional(1, 1, 0.0, 10.0);
    let target = regional(2, 1, 0.0, 20.0);
    let fields = vec![FieldBuffer::constant(1, 1, 5.0)];

    let out = regrid_with(InterpMethod::ConserveOrder1, &source, &target, &fields);
    assert_approx_eq!(out[0].get(0, 0), 5.0, tolerance::EXACT);
    assert_eq!(out[0].get(1, 0), mosaic_grid::DEFAULT_MISSING);
}

#[test]
fn test_target_area_normalization() {
    let source = regional(1, 2, 0.0, 10.0);
    let target = regional(1, 1, 0.0, 20.0);
    let xgrids = build_exchange_grid(&source, &target, ConserveOrder::First, 1).unwrap();
    let fields = vec![FieldBuffer::constant(1, 2, 4.0)];

    let overlap = interpolate_scalar(&xgrids, &fields, &target, &InterpOptions::default()).unwrap();
    assert_approx_eq!(overlap[0].get(0, 0), 4.0, tolerance::EXACT);

    let opts = InterpOptions {
        use_target_area: true,
        ..InterpOptions::default()
    };
    let full = interpolate_scalar(&xgrids, &fields, &target, &opts).unwrap();
    assert_approx_eq!(full[0].get(0, 0), 2.0, 1e-10);
}

// ============================================================================
// Identity and conservation
// ============================================================================

#[test]
fn test_identity_remap() {
    let grid = global_latlon(12, 6).unwrap();
    let fields = sample(&grid, smooth_field);
    let out = regrid_with(InterpMethod::ConserveOrder1, &grid, &grid, &fields);
    for j in 0..6 {
        for i in 0..12 {
            assert_approx_eq!(out[0].get(i, j), fields[0].get(i, j), tolerance::EXACT);
        }
    }
}

#[test]
fn test_first_order_conserves_global_integral() {
    init_tracing();
    let source = global_latlon(18, 9).unwrap();
    let target = global_latlon(8, 5).unwrap();
    let fields = sample(&source, smooth_field);

    let out = regrid_with(InterpMethod::ConserveOrder1, &source, &target, &fields);
    let report = conservation_report(&source, &fields, &target, &out).unwrap();
    assert!(report.relative_error() < tolerance::CONSERVATION, "{report:?}");
}

#[test]
fn test_second_order_conserves_global_integral() {
    let source = global_latlon(18, 9).unwrap();
    let target = global_latlon(8, 5).unwrap();
    let fields = sample(&source, smooth_field);

    let out = regrid_with(InterpMethod::ConserveOrder2, &source, &target, &fields);
    let report = conservation_report(&source, &fields, &target, &out).unwrap();
    assert!(report.relative_error() < tolerance::CONSERVATION, "{report:?}");
}

#[test]
fn test_second_order_keeps_constant() {
    let source = global_latlon(16, 8).unwrap();
    let target = global_latlon(10, 6).unwrap();
    let fields = sample(&source, |_, _| 7.0);

    let out = regrid_with(InterpMethod::ConserveOrder2, &source, &target, &fields);
    assert!(out[0].data.iter().all(|v| (v - 7.0).abs() < 1e-10));
}

#[test]
fn test_cube_to_latlon_constant() {
    let source = cubed_sphere(6).unwrap();
    let target = global_latlon(16, 8).unwrap();
    let fields = sample(&source, |_, _| 3.0);

    let out = regrid_with(InterpMethod::ConserveOrder1, &source, &target, &fields);
    assert!(out[0].data.iter().all(|v| (v - 3.0).abs() < 1e-10));
}

#[test]
fn test_cube_to_latlon_conserves_global_integral() {
    init_tracing();
    let target = global_latlon(36, 18).unwrap();
    // Odd cubes put a pole inside the center cell of the polar faces.
    for n in [6, 7] {
        let source = cubed_sphere(n).unwrap();
        let fields = sample(&source, smooth_field);
        for method in [InterpMethod::ConserveOrder1, InterpMethod::ConserveOrder2] {
            let out = regrid_with(method, &source, &target, &fields);
            assert!(out[0].data.iter().all(|v| *v != mosaic_grid::DEFAULT_MISSING), "C{n} {method:?}");
            let report = conservation_report(&source, &fields, &target, &out).unwrap();
            assert!(report.relative_error() < tolerance::CONSERVATION, "C{n} {method:?}: {report:?}");
        }
    }
}

#[test]
fn test_latlon_to_cube_conserves_global_integral() {
    let source = global_latlon(36, 18).unwrap();
    let fields = sample(&source, smooth_field);
    for n in [6, 7] {
        let target = cubed_sphere(n).unwrap();
        for method in [InterpMethod::ConserveOrder1, InterpMethod::ConserveOrder2] {
            let out = regrid_with(method, &source, &target, &fields);
            assert_eq!(out.len(), 6);
            let report = conservation_report(&source, &fields, &target, &out).unwrap();
            assert!(report.relative_error() < tolerance::CONSERVATION, "C{n} {method:?}: {report:?}");
        }
    }
}

#[test]
fn test_cube_identity_remap() {
    for n in [6, 7] {
        let cube = cubed_sphere(n).unwrap();
        let fields = sample(&cube, smooth_field);
        let out = regrid_with(InterpMethod::ConserveOrder1, &cube, &cube, &fields);
        for (t, field) in fields.iter().enumerate() {
            for j in 0..n {
                for i in 0..n {
                    assert_approx_eq!(out[t].get(i, j), field.get(i, j), 1e-10);
                }
            }
        }
    }
}

#[test]
fn test_worker_count_does_not_change_result() {
    let source = global_latlon(18, 9).unwrap();
    let target = global_latlon(8, 5).unwrap();
    let fields = sample(&source, smooth_field);
    let opts = InterpOptions::default();

    let one = build_exchange_grid(&source, &target, ConserveOrder::First, 1).unwrap();
    let four = build_exchange_grid(&source, &target, ConserveOrder::First, 4).unwrap();
    let a = interpolate_scalar(&one, &fields, &target, &opts).unwrap();
    let b = interpolate_scalar(&four, &fields, &target, &opts).unwrap();
    for (x, y) in a[0].data.iter().zip(&b[0].data) {
        assert_approx_eq!(*x, *y, tolerance::EXACT);
    }
}

// ============================================================================
// Vectors
// ============================================================================

#[test]
fn test_vector_constant_on_latlon() {
    let source = global_latlon(12, 6).unwrap();
    let target = global_latlon(8, 4).unwrap();
    let u = sample(&source, |_, _| 3.0);
    let v = sample(&source, |_, _| -1.0);
    let xgrids = build_exchange_grid(&source, &target, ConserveOrder::First, 2).unwrap();

    let (ou, ov) = interpolate_vector(&xgrids, &u, &v, &source, &target, &InterpOptions::default()).unwrap();
    assert!(ou[0].data.iter().all(|x| (x - 3.0).abs() < 1e-10));
    assert!(ov[0].data.iter().all(|x| (x + 1.0).abs() < 1e-10));
}

/// A 4x2 regional tile whose local vector frame is turned by `angles`.
fn rotated_regional(angles: &[f64]) -> Mosaic {
    let tile = latlon_tile("tile1", 4, 2, 0.0, 40.0, -10.0, 10.0)
        .unwrap()
        .with_rotation(angles)
        .unwrap();
    Mosaic::new("rotated", vec![tile]).unwrap()
}

/// Components of the geographic vector `(east, north)` in a frame turned
/// counter-clockwise by `angle`.
fn to_local(east: f64, north: f64, angle: f64) -> (f64, f64) {
    let (sin, cos) = angle.sin_cos();
    (east * cos + north * sin, -east * sin + north * cos)
}

#[test]
fn test_vector_from_rotated_source() {
    let angles: Vec<f64> = (0..8).map(|k| 0.2 + 0.15 * k as f64).collect();
    let source = rotated_regional(&angles);
    let (east, north) = (3.0, -1.0);
    let (ua, va): (Vec<f64>, Vec<f64>) = angles.iter().map(|&a| to_local(east, north, a)).unzip();
    let u = vec![FieldBuffer::from_interior(4, 2, &ua, None).unwrap()];
    let v = vec![FieldBuffer::from_interior(4, 2, &va, None).unwrap()];
    let opts = InterpOptions::default();

    let plain = regional(2, 1, 0.0, 40.0);
    let xgrids = build_exchange_grid(&source, &plain, ConserveOrder::First, 1).unwrap();
    let (ou, ov) = interpolate_vector(&xgrids, &u, &v, &source, &plain, &opts).unwrap();
    for k in 0..2 {
        assert_approx_eq!(ou[0].data[k], east, 1e-12);
        assert_approx_eq!(ov[0].data[k], north, 1e-12);
    }

    // Back onto the same rotated grid the local components come back.
    let xgrids = build_exchange_grid(&source, &source, ConserveOrder::First, 1).unwrap();
    let (ou, ov) = interpolate_vector(&xgrids, &u, &v, &source, &source, &opts).unwrap();
    for k in 0..8 {
        assert_approx_eq!(ou[0].data[k], ua[k], 1e-12);
        assert_approx_eq!(ov[0].data[k], va[k], 1e-12);
    }
}

#[test]
fn test_vector_onto_rotated_target() {
    let angles: Vec<f64> = (0..8).map(|k| -0.5 + 0.3 * k as f64).collect();
    let target = rotated_regional(&angles);
    let source = regional(8, 4, 0.0, 40.0);
    let u = sample(&source, |_, _| 2.0);
    let v = sample(&source, |_, _| 5.0);

    let regridder = Regridder::new(RegridConfig::default()).unwrap();
    let target_grid = TargetGrid::Mosaic(target);
    let weights = regridder.load_or_build_weights(&source, &target_grid).unwrap();
    let (ou, ov) = regridder.regrid_vector(&source, &target_grid, &weights, &u, &v).unwrap();
    for (k, &angle) in angles.iter().enumerate() {
        let (a, b) = to_local(2.0, 5.0, angle);
        assert_approx_eq!(ou[0].data[k], a, 1e-10);
        assert_approx_eq!(ov[0].data[k], b, 1e-10);
    }
}

#[test]
fn test_vector_missing_in_either_component() {
    let source = regional(2, 1, 0.0, 20.0);
    let target = regional(1, 1, 0.0, 20.0);
    let u = vec![FieldBuffer::from_interior(2, 1, &[1.0, 5.0], Some(FIXTURE_MISSING)).unwrap()];
    let v = vec![FieldBuffer::from_interior(2, 1, &[2.0, FIXTURE_MISSING], Some(FIXTURE_MISSING)).unwrap()];

    let regridder = Regridder::new(RegridConfig::default()).unwrap();
    let target = TargetGrid::Mosaic(target);
    let weights = regridder.load_or_build_weights(&source, &target).unwrap();
    let (ou, ov) = regridder.regrid_vector(&source, &target, &weights, &u, &v).unwrap();
    assert_approx_eq!(ou[0].get(0, 0), 1.0, tolerance::EXACT);
    assert_approx_eq!(ov[0].get(0, 0), 2.0, tolerance::EXACT);
}

#[test]
fn test_field_tile_count_checked() {
    let source = cubed_sphere(4).unwrap();
    let target = global_latlon(8, 4).unwrap();
    let xgrids = build_exchange_grid(&source, &target, ConserveOrder::First, 1).unwrap();
    let fields = vec![FieldBuffer::constant(4, 4, 1.0)];
    assert!(interpolate_scalar(&xgrids, &fields, &target, &InterpOptions::default()).is_err());
}
