use serde::{Deserialize, Serialize};

use crate::error::{InvalidInputError, Result};

/// Geographic bounds of a grid, passed through untouched from input to output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Default for Extent {
    fn default() -> Self {
        Self { min_x: -180.0, max_x: 180.0, min_y: -90.0, max_y: 90.0 }
    }
}

fn null_as_nan<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Vec<f32>, D::Error> {
    let v: Vec<Option<f32>> = Vec::deserialize(d)?;
    Ok(v.into_iter().map(|x| x.unwrap_or(f32::NAN)).collect())
}

fn nan_as_null<S: serde::Serializer>(data: &[f32], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_seq(data.iter().map(|v| v.is_finite().then_some(*v)))
}

/// One named layer of a multi-band grid. Row-major values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    pub name: String,
    #[serde(deserialize_with = "null_as_nan", serialize_with = "nan_as_null")]
    pub data: Vec<f32>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Vec<f32>) -> Self {
        Self { name: name.into(), data }
    }
}

/// A co-registered stack of bands sharing one width × height raster.
///
/// A cell is no-data when any band holds a non-finite value or the `nodata`
/// sentinel. Band order is significant: feature vectors follow it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub extent: Extent,
    #[serde(default)]
    pub crs: Option<String>,
    #[serde(default)]
    pub nodata: Option<f32>,
    pub bands: Vec<Band>,
}

impl Grid {
    /// Build a grid and check its invariants.
    pub fn new(width: usize, height: usize, bands: Vec<Band>) -> Result<Self> {
        let grid = Self {
            width,
            height,
            extent: Extent::default(),
            crs: None,
            nodata: None,
            bands,
        };
        grid.validate()?;
        Ok(grid)
    }

    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = extent;
        self
    }

    /// Parse a grid from JSON (`null` cells become no-data) and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let grid: Grid = serde_json::from_str(json).map_err(InvalidInputError::from)?;
        grid.validate()?;
        Ok(grid)
    }

    /// Check shape, band naming and emptiness.
    pub fn validate(&self) -> Result<()> {
        let n = self
            .width
            .checked_mul(self.height)
            .ok_or(InvalidInputError::GridTooLarge { width: self.width, height: self.height })?;
        if n == 0 {
            return Err(InvalidInputError::EmptyGrid { width: self.width, height: self.height }.into());
        }
        if self.bands.is_empty() {
            return Err(InvalidInputError::NoBands.into());
        }
        for (i, band) in self.bands.iter().enumerate() {
            if band.name.is_empty() {
                return Err(InvalidInputError::UnnamedBand(i).into());
            }
            if self.bands[..i].iter().any(|b| b.name == band.name) {
                return Err(InvalidInputError::DuplicateBand(band.name.clone()).into());
            }
            if band.data.len() != n {
                return Err(InvalidInputError::BandShapeMismatch {
                    band: band.name.clone(),
                    expected: n,
                    found: band.data.len(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Number of cells (width × height). Grids reaching callers are
    /// validated, so the product fits.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    #[inline]
    pub fn get(&self, band: usize, row: usize, col: usize) -> f32 {
        self.bands[band].data[self.index(row, col)]
    }

    #[inline]
    pub fn set(&mut self, band: usize, row: usize, col: usize, val: f32) {
        let idx = self.index(row, col);
        self.bands[band].data[idx] = val;
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    pub fn band_index(&self, name: &str) -> Option<usize> {
        self.bands.iter().position(|b| b.name == name)
    }

    #[inline]
    fn is_valid_value(&self, v: f32) -> bool {
        v.is_finite() && self.nodata.map_or(true, |nd| v != nd)
    }

    /// True when every band holds a usable value at `cell`.
    #[inline]
    pub fn is_valid(&self, cell: usize) -> bool {
        self.bands.iter().all(|b| self.is_valid_value(b.data[cell]))
    }

    /// Row-major indices of all valid cells, ascending.
    pub fn valid_cells(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.is_valid(i)).collect()
    }

    /// Count of usable values per band, ignoring the other bands.
    pub fn band_valid_count(&self, band: usize) -> usize {
        self.bands[band].data.iter().filter(|&&v| self.is_valid_value(v)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn two_band(w: usize, h: usize) -> Grid {
        let n = w * h;
        Grid::new(
            w,
            h,
            vec![
                Band::new("stock", (0..n).map(|i| i as f32).collect()),
                Band::new("rate", vec![1.0; n]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn nan_and_sentinel_cells_are_no_data() {
        let mut g = two_band(3, 2).with_nodata(-9999.0);
        g.set(0, 0, 1, f32::NAN);
        g.set(1, 1, 2, -9999.0);
        assert!(!g.is_valid(g.index(0, 1)));
        assert!(!g.is_valid(g.index(1, 2)));
        assert_eq!(g.valid_cells(), vec![0, 2, 3, 4]);
        assert_eq!(g.band_valid_count(0), 5);
        assert_eq!(g.band_valid_count(1), 5);
    }

    #[test]
    fn mismatched_band_lengths_are_rejected() {
        let err = Grid::new(2, 2, vec![Band::new("a", vec![0.0; 4]), Band::new("b", vec![0.0; 3])]);
        match err {
            Err(Error::InvalidInput(InvalidInputError::BandShapeMismatch { band, expected, found })) => {
                assert_eq!(band, "b");
                assert_eq!((expected, found), (4, 3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_band_names_are_rejected() {
        let err = Grid::new(1, 1, vec![Band::new("a", vec![0.0]), Band::new("a", vec![1.0])]);
        assert!(matches!(err, Err(Error::InvalidInput(InvalidInputError::DuplicateBand(_)))));
    }

    #[test]
    fn zero_sized_grid_is_rejected() {
        let err = Grid::new(0, 4, vec![Band::new("a", vec![])]);
        assert!(matches!(err, Err(Error::InvalidInput(InvalidInputError::EmptyGrid { .. }))));
    }

    #[test]
    fn overflowing_dimensions_are_rejected() {
        let json = format!(r#"{{"width":{},"height":2,"bands":[{{"name":"a","data":[1.0]}}]}}"#, usize::MAX);
        let err = Grid::from_json(&json);
        assert!(matches!(
            err,
            Err(Error::InvalidInput(InvalidInputError::GridTooLarge { width: usize::MAX, height: 2 }))
        ));
    }

    #[test]
    fn json_nulls_round_trip_as_no_data() {
        let json = r#"{"width":2,"height":1,"bands":[{"name":"a","data":[1.5,null]}]}"#;
        let g = Grid::from_json(json).unwrap();
        assert_eq!(g.valid_cells(), vec![0]);
        let out = serde_json::to_string(&g).unwrap();
        assert!(out.contains("[1.5,null]"), "{out}");
    }
}
