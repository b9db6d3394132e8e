//! Integration tests for mosaic construction, contacts and halo exchange.

use mosaic_grid::{cubed_sphere, fix_lon, global_latlon, Edge, FieldBuffer, RADIUS};
use std::f64::consts::{FRAC_PI_2, PI};
use test_utils::assert_approx_eq;

// ============================================================================
// Contacts
// ============================================================================

#[test]
fn test_cubed_sphere_has_twelve_contacts() {
    let cube = cubed_sphere(4).unwrap();
    assert_eq!(cube.ntiles(), 6);
    assert_eq!(cube.contacts().len(), 12);
    // Every tile edge takes part in exactly one contact.
    for t in 0..6 {
        for edge in Edge::ALL {
            let n = cube
                .contacts()
                .iter()
                .filter(|c| (c.tile1 == t && c.edge1 == edge) || (c.tile2 == t && c.edge2 == edge))
                .count();
            assert_eq!(n, 1, "tile {t} edge {edge:?}");
        }
    }
}

#[test]
fn test_global_latlon_is_periodic() {
    let grid = global_latlon(8, 4).unwrap();
    let contacts = grid.contacts();
    assert_eq!(contacts.len(), 1);
    let c = contacts[0];
    assert_eq!((c.tile1, c.tile2), (0, 0));
    assert_eq!((c.edge1, c.edge2), (Edge::West, Edge::East));
    assert!(!c.reversed);
}

// ============================================================================
// Geometry
// ============================================================================

#[test]
fn test_cubed_sphere_area_covers_sphere() {
    let cube = cubed_sphere(8).unwrap();
    let total: f64 = cube
        .tiles()
        .iter()
        .map(|t| t.cell_areas().iter().sum::<f64>())
        .sum();
    let sphere = 4.0 * PI * RADIUS * RADIUS;
    // Cell edges are straight in (lon, lat), not great circles.
    assert_approx_eq!(total / sphere, 1.0, 0.02);
}

#[test]
fn test_cubed_sphere_area_exact_for_odd_and_even_sizes() {
    let sphere = 4.0 * PI * RADIUS * RADIUS;
    for n in [5, 6, 7] {
        let cube = cubed_sphere(n).unwrap();
        let total: f64 = cube
            .tiles()
            .iter()
            .map(|t| t.cell_areas().iter().sum::<f64>())
            .sum();
        assert_approx_eq!(total / sphere, 1.0, 1e-10);
    }
}

#[test]
fn test_odd_cube_pole_cells_are_caps() {
    let cube = cubed_sphere(7).unwrap();
    for face in [4, 5] {
        let tile = &cube.tiles()[face];
        let mut poly = tile.cell_polygon(3, 3);
        let ring_lat = poly[0].lat;
        fix_lon(&mut poly, PI);
        let expected = 2.0 * PI * (1.0 - ring_lat.abs().sin()) * RADIUS * RADIUS;
        assert_approx_eq!(tile.cell_area(3, 3), expected, expected * 1e-9);
        assert!(poly.iter().any(|p| p.lat.abs() == FRAC_PI_2), "face {face}");
    }
}

#[test]
fn test_latlon_area_is_exact() {
    let grid = global_latlon(36, 18).unwrap();
    let total: f64 = grid.tiles()[0].cell_areas().iter().sum();
    let sphere = 4.0 * PI * RADIUS * RADIUS;
    assert_approx_eq!(total / sphere, 1.0, 1e-12);
}

#[test]
fn test_halo_centers_come_from_neighbours() {
    let cube = cubed_sphere(6).unwrap();
    for c in cube.contacts() {
        let t1 = &cube.tiles()[c.tile1];
        let t2 = &cube.tiles()[c.tile2];
        let len = c.edge1.cells(t1.nx(), t1.ny());
        for k in 0..len {
            let (hi, hj) = c.edge1.halo_cell(t1.nx(), t1.ny(), k);
            let (si, sj) = c.edge2.interior_cell(t2.nx(), t2.ny(), c.map_position(k, len));
            assert!((t1.center(hi, hj) - t2.center(si, sj)).norm() < 1e-14);
        }
    }
}

#[test]
fn test_corner_halo_centers_are_unit_vectors() {
    let cube = cubed_sphere(4).unwrap();
    for tile in cube.tiles() {
        for (ii, jj) in [(0, 0), (5, 0), (0, 5), (5, 5)] {
            assert_approx_eq!(tile.center(ii, jj).norm(), 1.0, 1e-12);
        }
    }
}

// ============================================================================
// Field halo exchange
// ============================================================================

#[test]
fn test_update_halo_periodic_latlon() {
    let grid = global_latlon(4, 2).unwrap();
    let values: Vec<f64> = (0..8).map(|v| v as f64).collect();
    let mut fields = vec![FieldBuffer::from_interior(4, 2, &values, None).unwrap()];
    grid.update_halo(&mut fields).unwrap();
    let f = &fields[0];
    // West halo of row 0 is the easternmost cell of row 0.
    assert_eq!(f.halo(0, 1), 3.0);
    assert_eq!(f.halo(5, 2), 4.0);
    // Pole rows have no neighbour and keep the replicated edge value.
    assert_eq!(f.halo(2, 0), 1.0);
    assert_eq!(f.halo(2, 3), 5.0);
}

#[test]
fn test_update_halo_cube_constant() {
    let cube = cubed_sphere(3).unwrap();
    let mut fields: Vec<FieldBuffer> = (0..6).map(|t| FieldBuffer::constant(3, 3, t as f64)).collect();
    cube.update_halo(&mut fields).unwrap();
    for c in cube.contacts() {
        let (hi, hj) = c.edge1.halo_cell(3, 3, 1);
        assert_eq!(fields[c.tile1].halo(hi, hj), c.tile2 as f64);
        let (hi, hj) = c.edge2.halo_cell(3, 3, 1);
        assert_eq!(fields[c.tile2].halo(hi, hj), c.tile1 as f64);
    }
}

#[test]
fn test_update_halo_missing_corner() {
    let grid = global_latlon(2, 2).unwrap();
    let mut fields =
        vec![FieldBuffer::from_interior(2, 2, &[1.0, -9.0, 3.0, 4.0], Some(-9.0)).unwrap()];
    grid.update_halo(&mut fields).unwrap();
    // Corner (0, 0) averages south halo (1, 0) = 1.0 and west halo (0, 1) = -9.0.
    assert_eq!(fields[0].halo(0, 0), -9.0);
}

#[test]
fn test_update_halo_rejects_wrong_tile_count() {
    let cube = cubed_sphere(2).unwrap();
    let mut fields = vec![FieldBuffer::constant(2, 2, 0.0)];
    assert!(cube.update_halo(&mut fields).is_err());
}
