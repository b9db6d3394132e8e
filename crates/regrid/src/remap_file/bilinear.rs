//! Bilinear stencils in remap files.

use super::container::{RemapDataset, VarData};
use crate::bilinear::{BilinearIndex, LatLonGrid, Stencil};
use crate::error::{RegridError, Result};

const METHOD: &str = "bilinear";

/// Encode the stencils as `index[3][nlat][nlon]` (i, j, 1-based tile) and
/// `weight[4][nlat][nlon]`.
pub fn encode_bilinear(index: &BilinearIndex) -> Result<RemapDataset> {
    let (nlon, nlat) = index.fine_dims();
    let plane = nlon * nlat;
    let mut idx = vec![0i32; 3 * plane];
    let mut weight = vec![0.0f64; 4 * plane];
    for (n, s) in index.stencils.iter().enumerate() {
        idx[n] = s.i as i32;
        idx[plane + n] = s.j as i32;
        idx[2 * plane + n] = s.tile as i32 + 1;
        for k in 0..4 {
            weight[k * plane + n] = s.weights[k];
        }
    }

    let mut ds = RemapDataset::new();
    ds.add_dim("nlon", nlon);
    ds.add_dim("nlat", nlat);
    ds.add_dim("three", 3);
    ds.add_dim("four", 4);
    ds.set_attr("method", METHOD);
    ds.set_attr("source_n", index.source_n as u64);
    ds.set_attr("finer_steps", index.finer_steps as u64);
    ds.set_attr("grid", serde_json::to_value(index.grid)?);
    ds.set_attr("created", chrono::Utc::now().to_rfc3339());
    ds.add_var("index", &["three", "nlat", "nlon"], VarData::Int(idx))?;
    ds.add_var("weight", &["four", "nlat", "nlon"], VarData::Double(weight))?;
    Ok(ds)
}

/// Decode stencils and check them against the requested source size,
/// target grid and refinement.
pub fn decode_bilinear(
    ds: &RemapDataset,
    path: &str,
    source_n: usize,
    grid: &LatLonGrid,
    finer_steps: u32,
) -> Result<BilinearIndex> {
    let mismatch = |reason: String| RegridError::cache_mismatch(path, reason);

    let method = ds.attr_str("method")?;
    if method != METHOD {
        return Err(mismatch(format!("file holds '{method}' weights, 'bilinear' requested")));
    }
    let (nlon, nlat) = grid.fine_dims(finer_steps);
    let (fnlon, fnlat) = (ds.dim("nlon")?, ds.dim("nlat")?);
    if (fnlon, fnlat) != (nlon, nlat) {
        return Err(mismatch(format!(
            "grid size is nlon={nlon}, nlat={nlat}, remap file size is nlon={fnlon}, nlat={fnlat}"
        )));
    }
    let cached_n = ds.attr_u64("source_n")? as usize;
    if cached_n != source_n {
        return Err(mismatch(format!("source is C{source_n}, cached weights are for C{cached_n}")));
    }
    let cached_steps = ds.attr_u64("finer_steps")? as u32;
    if cached_steps != finer_steps {
        return Err(mismatch(format!(
            "finer_steps {finer_steps} requested, cached weights use {cached_steps}"
        )));
    }
    if let Ok(cached) = ds.attr("grid") {
        let cached: LatLonGrid = serde_json::from_value(cached.clone())?;
        if cached != *grid {
            return Err(mismatch("target grid bounds differ from cached weights".to_string()));
        }
    }

    let plane = nlon * nlat;
    let idx = ds.var_i32_len("index", 3 * plane)?;
    let weight = ds.var_f64_len("weight", 4 * plane)?;
    let mut stencils = Vec::with_capacity(plane);
    for n in 0..plane {
        let (i, j, tile) = (idx[n], idx[plane + n], idx[2 * plane + n]);
        let max = source_n as i32 + 1;
        if !(0..max).contains(&i) || !(0..max).contains(&j) || !(1..=6).contains(&tile) {
            return Err(mismatch(format!(
                "node {n} has stencil (i={i}, j={j}, tile={tile}) outside the source grid"
            )));
        }
        stencils.push(Stencil {
            tile: tile as usize - 1,
            i: i as usize,
            j: j as usize,
            weights: [
                weight[n],
                weight[plane + n],
                weight[2 * plane + n],
                weight[3 * plane + n],
            ],
        });
    }

    Ok(BilinearIndex {
        grid: *grid,
        finer_steps,
        source_n,
        stencils,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_index() -> BilinearIndex {
        let grid = LatLonGrid::global(2, 2);
        let stencils = (0..4)
            .map(|k| Stencil {
                tile: k % 6,
                i: k,
                j: 1,
                weights: [0.25, 0.25, 0.5, 0.0],
            })
            .collect();
        BilinearIndex {
            grid,
            finer_steps: 0,
            source_n: 4,
            stencils,
        }
    }

    #[test]
    fn test_roundtrip() {
        let index = tiny_index();
        let ds = encode_bilinear(&index).unwrap();
        assert_eq!(ds.var_i32("index").unwrap()[8], 1);
        let back = decode_bilinear(&ds, "mem", 4, &index.grid, 0).unwrap();
        assert_eq!(back, index);
    }

    #[test]
    fn test_size_mismatch() {
        let index = tiny_index();
        let ds = encode_bilinear(&index).unwrap();
        let err = decode_bilinear(&ds, "mem", 4, &LatLonGrid::global(4, 2), 0).unwrap_err();
        assert!(matches!(err, RegridError::CacheMismatch { .. }));
        assert!(decode_bilinear(&ds, "mem", 8, &index.grid, 0).is_err());
    }

    #[test]
    fn test_short_variables_rejected() {
        let index = tiny_index();
        for name in ["index", "weight"] {
            let mut ds = encode_bilinear(&index).unwrap();
            if let Some(var) = ds.vars.get_mut(name) {
                match &mut var.data {
                    VarData::Int(v) => v.truncate(3),
                    VarData::Double(v) => v.truncate(3),
                }
            }
            let err = decode_bilinear(&ds, "mem", 4, &index.grid, 0).unwrap_err();
            assert!(matches!(err, RegridError::Format(_)), "{name}: {err}");
        }
    }
}
