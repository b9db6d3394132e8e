//! Exchange-grid construction.

use super::centroid::{CentroidSums, Centroids};
use super::clip::clip_polygon;
use crate::error::{RegridError, Result};
use crate::types::{ConserveOrder, ExchangeEntry, ExchangeGrid, Partition, SourceCell, TargetCell};
use crate::workers::{map_jobs, plan_jobs, Job};
use mosaic_grid::{fix_lon, mean_lon, poly_area, poly_ctrlat, poly_ctrlon, LonLat, Mosaic, TileGrid};
use std::f64::consts::PI;
use std::time::Instant;
use tracing::{debug, info};

/// Source cells with a mask at or below this value are excluded.
const MASK_THRESHOLD: f64 = 0.5;

/// Overlaps smaller than this fraction of the smaller cell are dropped.
const AREA_RATIO_THRESHOLD: f64 = 1.0e-6;

/// Longitude offsets tried for each target cell. Both polygons are centred
/// near π, so a cell straddling the other's seam overlaps one of its copies.
const LON_SHIFTS: [f64; 3] = [-2.0 * PI, 0.0, 2.0 * PI];

/// One overlap as produced by a worker, before offsets are known.
#[derive(Debug, Clone, Copy)]
struct Fragment {
    source: SourceCell,
    target: TargetCell,
    area: f64,
    /// Eastward and latitude moments, second order only.
    moments: Option<(f64, f64)>,
}

/// A target cell with its bounds, ready for repeated clipping.
///
/// The polygon is already passed through `fix_lon`, so a cell around a pole
/// carries its pole cap.
struct TargetCellGeom {
    cell: TargetCell,
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
    polygon: Vec<LonLat>,
    area: f64,
}

/// Target cells of one worker's domain grouped by row, with row lat bounds.
struct TargetRows {
    rows: Vec<(f64, f64, Vec<TargetCellGeom>)>,
}

fn lat_bounds(poly: &[LonLat]) -> (f64, f64) {
    poly.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.lat), hi.max(p.lat))
    })
}

fn lon_bounds(poly: &[LonLat]) -> (f64, f64) {
    poly.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.lon), hi.max(p.lon))
    })
}

impl TargetRows {
    fn new(tile: &TileGrid, job: &Job, areas: &[f64]) -> Self {
        let d = job.domain;
        let rows = (d.j_start..d.j_end)
            .map(|j| {
                let cells: Vec<TargetCellGeom> = (d.i_start..d.i_end)
                    .map(|i| {
                        let mut polygon = tile.cell_polygon(i, j);
                        fix_lon(&mut polygon, PI);
                        let (lat_min, lat_max) = lat_bounds(&polygon);
                        let (lon_min, lon_max) = lon_bounds(&polygon);
                        TargetCellGeom {
                            cell: TargetCell { i, j },
                            lat_min,
                            lat_max,
                            lon_min,
                            lon_max,
                            polygon,
                            area: areas[tile.cell_index(i, j)],
                        }
                    })
                    .collect();
                let row_min = cells.iter().map(|c| c.lat_min).fold(f64::INFINITY, f64::min);
                let row_max = cells.iter().map(|c| c.lat_max).fold(f64::NEG_INFINITY, f64::max);
                (row_min, row_max, cells)
            })
            .collect();
        Self { rows }
    }
}

/// Builds exchange grids between a source mosaic and every tile of a
/// target mosaic.
///
/// # Example
///
/// ```ignore
/// let xgrids = XgridBuilder::new(&cube, &latlon)
///     .order(ConserveOrder::Second)
///     .workers(4)
///     .build()?;
/// ```
pub struct XgridBuilder<'a> {
    source: &'a Mosaic,
    target: &'a Mosaic,
    order: ConserveOrder,
    workers: usize,
    masks: Option<&'a [Vec<f64>]>,
}

impl<'a> XgridBuilder<'a> {
    pub fn new(source: &'a Mosaic, target: &'a Mosaic) -> Self {
        Self {
            source,
            target,
            order: ConserveOrder::First,
            workers: 1,
            masks: None,
        }
    }

    pub fn order(mut self, order: ConserveOrder) -> Self {
        self.order = order;
        self
    }

    /// Number of row-block workers per target tile.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Per-source-cell masks, one array per source tile. Cells with a mask
    /// at or below 0.5 are skipped; overlap areas are scaled by the mask.
    pub fn source_mask(mut self, masks: &'a [Vec<f64>]) -> Self {
        self.masks = Some(masks);
        self
    }

    /// Compute the exchange grid for every target tile.
    pub fn build(self) -> Result<Vec<ExchangeGrid>> {
        let start = Instant::now();
        let source = self.source;
        let target = self.target;

        if let Some(masks) = self.masks {
            if masks.len() != source.ntiles() {
                return Err(RegridError::config(format!(
                    "{} source masks for {} source tiles",
                    masks.len(),
                    source.ntiles()
                )));
            }
            for (t, (mask, tile)) in masks.iter().zip(source.tiles()).enumerate() {
                if mask.len() != tile.ncells() {
                    return Err(RegridError::config(format!(
                        "source mask {t} has {} values, tile has {} cells",
                        mask.len(),
                        tile.ncells()
                    )));
                }
            }
        }

        let source_areas: Vec<Vec<f64>> = source.tiles().iter().map(|t| t.cell_areas()).collect();
        let target_areas: Vec<Vec<f64>> = target.tiles().iter().map(|t| t.cell_areas()).collect();

        let jobs = plan_jobs(target, self.workers)?;

        let fragments: Vec<Vec<Fragment>> = map_jobs(&jobs, |job| {
            let tile = &target.tiles()[job.target_tile];
            let rows = TargetRows::new(tile, job, &target_areas[job.target_tile]);
            let mut out = Vec::new();
            for (t, src_tile) in source.tiles().iter().enumerate() {
                let before = out.len();
                clip_tile_pair(
                    t,
                    src_tile,
                    &source_areas[t],
                    self.masks.map(|m| m[t].as_slice()),
                    &rows,
                    self.order,
                    &mut out,
                );
                debug!(
                    source_tile = t,
                    target_tile = job.target_tile,
                    rows = ?(job.domain.j_start..job.domain.j_end),
                    overlaps = out.len() - before,
                    "Clipped tile pair"
                );
            }
            Ok(out)
        })?;

        let centroids = match self.order {
            ConserveOrder::First => None,
            ConserveOrder::Second => {
                let partials: Vec<CentroidSums> = map_jobs(&fragments, |frags| {
                    let mut sums = CentroidSums::zeros(source);
                    for f in frags {
                        if let Some((clon, clat)) = f.moments {
                            sums.add(f.source, f.area, clon, clat);
                        }
                    }
                    Ok(sums)
                })?;
                let mut total = CentroidSums::zeros(source);
                for p in &partials {
                    total.merge(p);
                }
                Some(total.finalize(source, &source_areas))
            }
        };

        let partitions: Vec<Partition> = map_jobs(&jobs.iter().zip(fragments).collect::<Vec<_>>(), |(job, frags)| {
            Ok(Partition {
                domain: job.domain,
                entries: frags.iter().map(|f| to_entry(f, centroids.as_ref())).collect(),
            })
        })?;

        let mut xgrids: Vec<ExchangeGrid> = target
            .tiles()
            .iter()
            .enumerate()
            .map(|(n, tile)| ExchangeGrid {
                target_tile: n,
                order: self.order,
                target_nx: tile.nx(),
                target_ny: tile.ny(),
                source_dims: source.tiles().iter().map(|t| (t.nx(), t.ny())).collect(),
                partitions: Vec::new(),
            })
            .collect();
        for (job, partition) in jobs.iter().zip(partitions) {
            xgrids[job.target_tile].partitions.push(partition);
        }

        for x in &xgrids {
            info!(
                target_tile = x.target_tile,
                order = x.order.as_u8(),
                entries = x.len(),
                workers = x.partitions.len(),
                "Built exchange grid"
            );
        }
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Exchange grid setup complete");

        Ok(xgrids)
    }
}

fn to_entry(f: &Fragment, centroids: Option<&Centroids>) -> ExchangeEntry {
    let offset = match (f.moments, centroids) {
        (Some((clon, clat)), Some(c)) => {
            let (cell_lon, cell_lat) = c.get(f.source);
            Some((clon / f.area - cell_lon, clat / f.area - cell_lat))
        }
        _ => None,
    };
    ExchangeEntry {
        source: f.source,
        target: f.target,
        area: f.area,
        offset,
    }
}

/// Clip every source cell of one tile against one worker's target cells.
fn clip_tile_pair(
    source_tile: usize,
    tile: &TileGrid,
    source_areas: &[f64],
    mask: Option<&[f64]>,
    rows: &TargetRows,
    order: ConserveOrder,
    out: &mut Vec<Fragment>,
) {
    for j1 in 0..tile.ny() {
        for i1 in 0..tile.nx() {
            let idx = tile.cell_index(i1, j1);
            let weight = mask.map_or(1.0, |m| m[idx]);
            if weight <= MASK_THRESHOLD {
                continue;
            }

            let mut src = tile.cell_polygon(i1, j1);
            fix_lon(&mut src, PI);
            let (lat_in_min, lat_in_max) = lat_bounds(&src);
            let (lon_in_min, lon_in_max) = lon_bounds(&src);
            let lon_in_avg = mean_lon(&src);

            for (row_min, row_max, cells) in &rows.rows {
                if *row_min >= lat_in_max || *row_max <= lat_in_min {
                    continue;
                }
                for cell in cells {
                    if cell.lat_min >= lat_in_max || cell.lat_max <= lat_in_min {
                        continue;
                    }

                    let mut area = 0.0;
                    let (mut ctrlon, mut ctrlat) = (0.0, 0.0);
                    for shift in LON_SHIFTS {
                        if cell.lon_min + shift >= lon_in_max || cell.lon_max + shift <= lon_in_min {
                            continue;
                        }
                        let dst: Vec<LonLat> = cell
                            .polygon
                            .iter()
                            .map(|p| LonLat::new(p.lon + shift, p.lat))
                            .collect();
                        let overlap = clip_polygon(&src, &dst);
                        if overlap.len() < 3 {
                            continue;
                        }
                        area += poly_area(&overlap);
                        if order == ConserveOrder::Second {
                            ctrlon += poly_ctrlon(&overlap, lon_in_avg);
                            ctrlat += poly_ctrlat(&overlap);
                        }
                    }

                    let area = area * weight;
                    let min_area = source_areas[idx].min(cell.area);
                    if min_area <= 0.0 || area / min_area <= AREA_RATIO_THRESHOLD {
                        continue;
                    }

                    let moments = match order {
                        ConserveOrder::First => None,
                        ConserveOrder::Second => Some((ctrlon * weight, ctrlat * weight)),
                    };
                    out.push(Fragment {
                        source: SourceCell {
                            tile: source_tile,
                            i: i1,
                            j: j1,
                        },
                        target: cell.cell,
                        area,
                        moments,
                    });
                }
            }
        }
    }
}

/// Exchange grids for every target tile. See [`XgridBuilder`].
pub fn build_exchange_grid(
    source: &Mosaic,
    target: &Mosaic,
    order: ConserveOrder,
    workers: usize,
) -> Result<Vec<ExchangeGrid>> {
    XgridBuilder::new(source, target)
        .order(order)
        .workers(workers)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_grid::{cubed_sphere, global_latlon, latlon_tile};
    use test_utils::assert_approx_eq;

    fn regional(nlon: usize, nlat: usize) -> Mosaic {
        Mosaic::new("r", vec![latlon_tile("t", nlon, nlat, 0.0, 2.0, -1.0, 1.0).unwrap()]).unwrap()
    }

    #[test]
    fn test_two_by_two_into_one() {
        let xgrids = build_exchange_grid(&regional(2, 2), &regional(1, 1), ConserveOrder::First, 1).unwrap();
        assert_eq!(xgrids.len(), 1);
        let x = &xgrids[0];
        assert_eq!(x.len(), 4);
        let target_area = regional(1, 1).tiles()[0].cell_area(0, 0);
        assert_approx_eq!(x.total_area(), target_area, target_area * 1e-12);
        assert!(x.entries().all(|e| e.offset.is_none() && e.area > 0.0));
    }

    #[test]
    fn test_pole_cells_fully_distributed() {
        // On an odd cube the center cells of the polar faces contain a pole.
        let cube = cubed_sphere(7).unwrap();
        let target = global_latlon(36, 18).unwrap();
        let xgrids = build_exchange_grid(&cube, &target, ConserveOrder::Second, 2).unwrap();
        for face in [4, 5] {
            let expected = cube.tiles()[face].cell_area(3, 3);
            let pieces: Vec<_> = xgrids[0]
                .entries()
                .filter(|e| e.source.tile == face && e.source.i == 3 && e.source.j == 3)
                .collect();
            assert_eq!(pieces.len(), 36, "face {face}");
            let total: f64 = pieces.iter().map(|e| e.area).sum();
            assert_approx_eq!(total, expected, expected * 1e-10);
        }
    }

    #[test]
    fn test_target_cell_across_seam() {
        let src = Mosaic::new("s", vec![latlon_tile("s", 2, 1, -10.0, 10.0, 0.0, 10.0).unwrap()]).unwrap();
        let dst = Mosaic::new("d", vec![latlon_tile("d", 1, 1, 350.0, 370.0, 0.0, 10.0).unwrap()]).unwrap();
        let xgrids = build_exchange_grid(&src, &dst, ConserveOrder::First, 1).unwrap();
        let expected = dst.tiles()[0].cell_area(0, 0);
        assert_eq!(xgrids[0].len(), 2);
        assert_approx_eq!(xgrids[0].total_area(), expected, expected * 1e-12);
    }

    #[test]
    fn test_disjoint_tiles_give_no_entries() {
        let a = Mosaic::new("a", vec![latlon_tile("a", 2, 2, 0.0, 10.0, 0.0, 10.0).unwrap()]).unwrap();
        let b = Mosaic::new("b", vec![latlon_tile("b", 2, 2, 50.0, 60.0, 0.0, 10.0).unwrap()]).unwrap();
        let xgrids = build_exchange_grid(&a, &b, ConserveOrder::First, 2).unwrap();
        assert!(xgrids[0].is_empty());
    }

    #[test]
    fn test_second_order_offsets_balance() {
        let xgrids =
            build_exchange_grid(&global_latlon(8, 6).unwrap(), &global_latlon(6, 4).unwrap(), ConserveOrder::Second, 3).unwrap();
        let x = &xgrids[0];
        assert_eq!(x.partitions.len(), 3);
        // Area-weighted offsets of a fully covered source cell cancel out.
        let (mut sum_di, mut sum_dj, mut area) = (0.0, 0.0, 0.0);
        for e in x.entries().filter(|e| e.source.i == 3 && e.source.j == 2) {
            let (di, dj) = e.offset.unwrap();
            sum_di += e.area * di;
            sum_dj += e.area * dj;
            area += e.area;
        }
        assert!(area > 0.0);
        assert_approx_eq!(sum_di / area, 0.0, 1e-12);
        assert_approx_eq!(sum_dj / area, 0.0, 1e-12);
    }

    #[test]
    fn test_mask_excludes_cells() {
        let src = regional(2, 2);
        let masks = vec![vec![1.0, 0.0, 1.0, 1.0]];
        let xgrids = XgridBuilder::new(&src, &regional(1, 1)).source_mask(&masks).build().unwrap();
        assert_eq!(xgrids[0].len(), 3);
        assert!(xgrids[0].entries().all(|e| !(e.source.i == 1 && e.source.j == 0)));

        let bad = vec![vec![1.0; 3]];
        assert!(XgridBuilder::new(&src, &regional(1, 1)).source_mask(&bad).build().is_err());
    }
}
