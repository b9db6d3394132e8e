//! Integration tests for bilinear regridding from cubed spheres to lat/lon.

use mosaic_grid::{cubed_sphere, global_latlon, FieldBuffer, Mosaic};
use regrid::{
    build_bilinear_index, interpolate_scalar_bilinear, interpolate_vector_bilinear, InterpMethod,
    InterpOptions, LatLonGrid, RegridConfig, RegridError, Regridder, TargetGrid,
};
use test_utils::{
    assert_approx_eq, init_tracing, resolution, smooth_field, solid_body_wind, WEIGHT_SUM_EPS,
};

/// Sample `f(lon, lat)` at every interior cell center of every face.
fn sample(mosaic: &Mosaic, missing: Option<f64>, f: impl Fn(f64, f64) -> f64) -> Vec<FieldBuffer> {
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
            FieldBuffer::from_interior(tile.nx(), tile.ny(), &values, missing).unwrap()
        })
        .collect()
}

fn bilinear_regridder(finer_steps: u32) -> Regridder {
    Regridder::new(RegridConfig {
        method: InterpMethod::Bilinear,
        finer_steps,
        ..RegridConfig::default()
    })
    .unwrap()
}

// ============================================================================
// Stencils
// ============================================================================

#[test]
fn test_weights_sum_to_one() {
    init_tracing();
    let cube = cubed_sphere(resolution::SMALL).unwrap();
    let grid = LatLonGrid::global(36, 19);
    let index = build_bilinear_index(&cube, &grid, 0).unwrap();

    assert_eq!(index.stencils.len(), 36 * 19);
    for s in &index.stencils {
        let sum: f64 = s.weights.iter().sum();
        assert_approx_eq!(sum, 1.0, WEIGHT_SUM_EPS);
        assert!(s.weights.iter().all(|w| *w >= -1e-12), "{s:?}");
        assert!(s.tile < 6);
        assert!(s.i <= resolution::SMALL && s.j <= resolution::SMALL);
    }
}

#[test]
fn test_every_node_located_across_cube_sizes() {
    // Nodes just across face edges, e.g. lon 232..262 and lat -40..-55 on
    // the edge between faces 4 and 6, must be found for every cube size.
    for n in 3..=12 {
        let cube = cubed_sphere(n).unwrap();
        for (nlon, nlat) in [(24, 13), (36, 19), (72, 37)] {
            let index = build_bilinear_index(&cube, &LatLonGrid::global(nlon, nlat), 0)
                .unwrap_or_else(|e| panic!("C{n} onto {nlon}x{nlat}: {e}"));
            assert_eq!(index.stencils.len(), nlon * nlat);
            for s in &index.stencils {
                assert_approx_eq!(s.weights.iter().sum::<f64>(), 1.0, WEIGHT_SUM_EPS);
                assert!(s.weights.iter().all(|w| *w >= -1e-12), "C{n} {nlon}x{nlat}: {s:?}");
            }
        }
    }
}

#[test]
fn test_every_refined_node_located() {
    for n in [4, 5, 7, 8] {
        let cube = cubed_sphere(n).unwrap();
        let index = build_bilinear_index(&cube, &LatLonGrid::global(24, 13), 1)
            .unwrap_or_else(|e| panic!("C{n} with one finer step: {e}"));
        assert_eq!(index.stencils.len(), 48 * 25);
        let fields = sample(&cube, None, |_, _| 2.5);
        let out = interpolate_scalar_bilinear(&index, &cube, &fields, &InterpOptions::default()).unwrap();
        assert!(out.data.iter().all(|v| (v - 2.5).abs() < 1e-10), "C{n}");
    }
}

#[test]
fn test_refined_index_dims() {
    let cube = cubed_sphere(resolution::TINY).unwrap();
    let grid = LatLonGrid::global(12, 7);
    let index = build_bilinear_index(&cube, &grid, 2).unwrap();
    assert_eq!(index.fine_dims(), (48, 25));
    assert_eq!(index.stencils.len(), 48 * 25);
}

#[test]
fn test_non_cube_source_rejected() {
    let source = global_latlon(8, 4).unwrap();
    let err = build_bilinear_index(&source, &LatLonGrid::global(8, 5), 0).unwrap_err();
    assert!(matches!(err, RegridError::Config(_)));
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn test_constant_field_preserved() {
    let cube = cubed_sphere(resolution::SMALL).unwrap();
    let fields = sample(&cube, None, |_, _| 7.0);
    let regridder = bilinear_regridder(0);
    let target = TargetGrid::LatLon(LatLonGrid::global(36, 19));

    let weights = regridder.load_or_build_weights(&cube, &target).unwrap();
    let out = regridder.regrid_scalar(&cube, &target, &weights, &fields).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!((out[0].nx, out[0].ny), (36, 19));
    for v in &out[0].data {
        assert_approx_eq!(*v, 7.0, WEIGHT_SUM_EPS * 10.0);
    }
}

#[test]
fn test_constant_field_preserved_with_finer_steps() {
    let cube = cubed_sphere(resolution::SMALL).unwrap();
    let fields = sample(&cube, None, |_, _| 7.0);
    let regridder = bilinear_regridder(2);
    let target = TargetGrid::LatLon(LatLonGrid::global(18, 10));

    let weights = regridder.load_or_build_weights(&cube, &target).unwrap();
    let out = regridder.regrid_scalar(&cube, &target, &weights, &fields).unwrap();
    assert_eq!((out[0].nx, out[0].ny), (18, 10));
    for v in &out[0].data {
        assert_approx_eq!(*v, 7.0, 1e-8);
    }
}

#[test]
fn test_regional_target() {
    let cube = cubed_sphere(resolution::SMALL).unwrap();
    let grid = LatLonGrid {
        nlon: 10,
        nlat: 9,
        lon_begin: 100.0,
        lon_end: 140.0,
        lat_begin: -20.0,
        lat_end: 20.0,
        center_y: false,
    };
    let index = build_bilinear_index(&cube, &grid, 1).unwrap();
    let fields = sample(&cube, None, |_, _| -2.5);
    let out = interpolate_scalar_bilinear(&index, &cube, &fields, &InterpOptions::default()).unwrap();
    assert!(out.data.iter().all(|v| (v + 2.5).abs() < 1e-8));
}

#[test]
fn test_smooth_field_accuracy() {
    let cube = cubed_sphere(resolution::MEDIUM).unwrap();
    let grid = LatLonGrid::global(36, 19);
    let index = build_bilinear_index(&cube, &grid, 0).unwrap();
    let fields = sample(&cube, None, smooth_field);
    let out = interpolate_scalar_bilinear(&index, &cube, &fields, &InterpOptions::default()).unwrap();

    let lons = grid.node_lons(0);
    let lats = grid.node_lats(0);
    for (j, &lat) in lats.iter().enumerate() {
        for (i, &lon) in lons.iter().enumerate() {
            assert_approx_eq!(out.get(i, j), smooth_field(lon, lat), 0.05);
        }
    }
}

#[test]
fn test_all_missing_gives_sentinel() {
    let cube = cubed_sphere(resolution::TINY).unwrap();
    let fields = sample(&cube, Some(-999.0), |_, _| -999.0);
    let index = build_bilinear_index(&cube, &LatLonGrid::global(12, 7), 1).unwrap();
    let opts = InterpOptions {
        fill_missing: true,
        ..InterpOptions::default()
    };
    let out = interpolate_scalar_bilinear(&index, &cube, &fields, &opts).unwrap();
    assert_eq!(out.missing, -999.0);
    assert!(out.data.iter().all(|v| *v == -999.0));
}

#[test]
fn test_declared_missing_without_missing_values() {
    let cube = cubed_sphere(resolution::TINY).unwrap();
    let fields = sample(&cube, Some(-999.0), |_, _| 1.5);
    let index = build_bilinear_index(&cube, &LatLonGrid::global(12, 7), 0).unwrap();
    let out = interpolate_scalar_bilinear(&index, &cube, &fields, &InterpOptions::default()).unwrap();
    assert!(out.data.iter().all(|v| (v - 1.5).abs() < 1e-9));
}

#[test]
fn test_index_from_other_resolution_rejected() {
    let index = build_bilinear_index(&cubed_sphere(4).unwrap(), &LatLonGrid::global(8, 5), 0).unwrap();
    let cube = cubed_sphere(6).unwrap();
    let fields = sample(&cube, None, |_, _| 1.0);
    assert!(interpolate_scalar_bilinear(&index, &cube, &fields, &InterpOptions::default()).is_err());
}

// ============================================================================
// Vectors
// ============================================================================

#[test]
fn test_solid_body_wind() {
    let u0 = 10.0;
    let cube = cubed_sphere(resolution::SMALL).unwrap();
    let grid = LatLonGrid::global(36, 19);
    let index = build_bilinear_index(&cube, &grid, 0).unwrap();
    let u = sample(&cube, None, |lon, lat| solid_body_wind(u0, lon, lat).0);
    let v = sample(&cube, None, |lon, lat| solid_body_wind(u0, lon, lat).1);

    let (ou, ov) = interpolate_vector_bilinear(&index, &cube, &u, &v, &InterpOptions::default()).unwrap();
    let lats = grid.node_lats(0);
    for (j, &lat) in lats.iter().enumerate() {
        for i in 0..grid.nlon {
            let expected = u0 * lat.cos();
            assert!(
                (ou.get(i, j) - expected).abs() <= 0.05 * u0,
                "u at ({i}, {j}) = {}, expected {expected}",
                ou.get(i, j)
            );
            assert!(ov.get(i, j).abs() <= 0.05 * u0, "v at ({i}, {j}) = {}", ov.get(i, j));
        }
    }
}

#[test]
fn test_vector_through_service() {
    let cube = cubed_sphere(resolution::TINY).unwrap();
    let regridder = bilinear_regridder(1);
    let target = TargetGrid::LatLon(LatLonGrid::global(12, 7));
    let weights = regridder.load_or_build_weights(&cube, &target).unwrap();
    let u = sample(&cube, None, |lon, lat| solid_body_wind(5.0, lon, lat).0);
    let v = sample(&cube, None, |lon, lat| solid_body_wind(5.0, lon, lat).1);

    let (ou, ov) = regridder.regrid_vector(&cube, &target, &weights, &u, &v).unwrap();
    assert_eq!(ou.len(), 1);
    assert_eq!(ov.len(), 1);
    assert_eq!(ou[0].data.len(), 12 * 7);
    assert!(ou[0].data.iter().all(|x| x.is_finite()));
    assert!(ov[0].data.iter().all(|x| x.abs() < 1.0));
}
