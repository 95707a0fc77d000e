//! 3D addressing of grid property keywords.
//!
//! A property keyword is a flat array in `i`-fastest order: cell `(i, j, k)`
//! of an `nx * ny * nz` grid sits at `i + j*nx + k*nx*ny`.  A *compacted*
//! property stores only the active cells, in the same order, and an
//! [`ActiveMap`] translates between the two numberings.
//!
//! [`GridOverlay`] wraps an owned keyword and borrows the map; it never
//! changes the keyword's length.

use serde::{Deserialize, Serialize};

use crate::error::{EclError, Result};
use crate::kw::{Element, Keyword};

pub const ACTNUM_KW: &str = "ACTNUM";

// ── GridDims ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridDims {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self { Self { nx, ny, nz } }

    pub fn cells(&self) -> usize { self.nx * self.ny * self.nz }

    /// Linear index of `(i, j, k)`.
    pub fn linear(&self, i: usize, j: usize, k: usize) -> Result<usize> {
        if i >= self.nx || j >= self.ny || k >= self.nz {
            return Err(EclError::Index {
                index: (i + j * self.nx + k * self.nx * self.ny) as i64,
                len:   self.cells(),
            });
        }
        Ok(i + j * self.nx + k * self.nx * self.ny)
    }

    pub fn ijk(&self, linear: usize) -> (usize, usize, usize) {
        let layer = self.nx * self.ny;
        (linear % self.nx, (linear % layer) / self.nx, linear / layer)
    }
}

// ── ActiveMap ─────────────────────────────────────────────────────────────────

/// Which cells are active, and their numbering in compacted storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMap {
    dims:             GridDims,
    global_to_active: Vec<Option<usize>>,
    active_to_global: Vec<usize>,
}

impl ActiveMap {
    pub fn all_active(dims: GridDims) -> Self {
        Self {
            dims,
            global_to_active: (0..dims.cells()).map(Some).collect(),
            active_to_global: (0..dims.cells()).collect(),
        }
    }

    /// One flag per cell in linear order.
    pub fn from_mask(dims: GridDims, mask: &[bool]) -> Result<Self> {
        if mask.len() != dims.cells() {
            return Err(EclError::SizeMismatch {
                name:     ACTNUM_KW.to_owned(),
                expected: dims.cells(),
                actual:   mask.len(),
            });
        }
        let mut global_to_active = Vec::with_capacity(mask.len());
        let mut active_to_global = Vec::new();
        for (g, &active) in mask.iter().enumerate() {
            if active {
                global_to_active.push(Some(active_to_global.len()));
                active_to_global.push(g);
            } else {
                global_to_active.push(None);
            }
        }
        Ok(Self { dims, global_to_active, active_to_global })
    }

    /// From an INT `ACTNUM` keyword; any non-zero value marks an active cell.
    pub fn from_actnum(dims: GridDims, actnum: &Keyword) -> Result<Self> {
        let values = actnum.values::<i32>().ok_or_else(|| EclError::TypeMismatch {
            expected: "INT".to_owned(),
            found:    actnum.ecl_type().name().to_owned(),
        })?;
        let mask: Vec<bool> = values.iter().map(|&v| v != 0).collect();
        Self::from_mask(dims, &mask)
    }

    /// The map as an `ACTNUM` keyword of ones and zeros.
    pub fn to_actnum(&self) -> Result<Keyword> {
        let values = self.global_to_active.iter().map(|a| a.is_some() as i32).collect();
        Keyword::new_int(ACTNUM_KW, values)
    }

    pub fn dims(&self) -> GridDims { self.dims }
    pub fn active_count(&self) -> usize { self.active_to_global.len() }

    /// Compacted index of a linear cell index; `None` when inactive.
    pub fn active_index(&self, linear: usize) -> Option<usize> {
        self.global_to_active.get(linear).copied().flatten()
    }

    pub fn global_index(&self, active: usize) -> Option<usize> {
        self.active_to_global.get(active).copied()
    }

    pub fn is_active(&self, i: usize, j: usize, k: usize) -> Result<bool> {
        Ok(self.active_index(self.dims.linear(i, j, k)?).is_some())
    }
}

// ── GridOverlay ───────────────────────────────────────────────────────────────

pub struct GridOverlay<'g, T: Element> {
    keyword:   Keyword,
    grid:      &'g ActiveMap,
    default:   T,
    compacted: bool,
}

impl<'g, T: Element> GridOverlay<'g, T> {
    /// `keyword` must hold one `T` per active cell when `compacted`, one per
    /// cell otherwise.
    pub fn bind(keyword: Keyword, grid: &'g ActiveMap, default: T, compacted: bool) -> Result<Self> {
        if keyword.ecl_type() != T::ECL_TYPE {
            return Err(EclError::TypeMismatch {
                expected: T::ECL_TYPE.name().to_owned(),
                found:    keyword.ecl_type().name().to_owned(),
            });
        }
        let expected = if compacted { grid.active_count() } else { grid.dims().cells() };
        if keyword.len() != expected {
            return Err(EclError::SizeMismatch {
                name:     keyword.name().to_owned(),
                expected,
                actual:   keyword.len(),
            });
        }
        Ok(Self { keyword, grid, default, compacted })
    }

    pub fn keyword(&self) -> &Keyword { &self.keyword }
    pub fn into_keyword(self) -> Keyword { self.keyword }
    pub fn grid(&self) -> &'g ActiveMap { self.grid }
    pub fn dims(&self) -> GridDims { self.grid.dims() }
    pub fn default_value(&self) -> T { self.default }
    pub fn is_compacted(&self) -> bool { self.compacted }

    fn values(&self) -> &[T] { self.keyword.values::<T>().unwrap_or(&[]) }

    /// Storage slot of `(i, j, k)`; `None` for an inactive cell of a
    /// compacted keyword.
    fn slot(&self, i: usize, j: usize, k: usize) -> Result<Option<usize>> {
        let linear = self.grid.dims().linear(i, j, k)?;
        Ok(if self.compacted { self.grid.active_index(linear) } else { Some(linear) })
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Result<T> {
        Ok(match self.slot(i, j, k)? {
            Some(s) => self.values()[s],
            None    => self.default,
        })
    }

    pub fn set(&mut self, i: usize, j: usize, k: usize, value: T) -> Result<()> {
        let s = self.slot(i, j, k)?.ok_or(EclError::InactiveCell { i, j, k })?;
        if let Some(values) = self.keyword.values_mut::<T>() {
            values[s] = value;
        }
        Ok(())
    }

    /// Full-grid copy of the property, the default in inactive cells.
    pub fn scatter(&self) -> Result<Keyword> {
        if !self.compacted {
            return Ok(self.keyword.clone());
        }
        let values = self.values();
        let full = (0..self.grid.dims().cells())
            .map(|g| self.grid.active_index(g).map_or(self.default, |a| values[a]))
            .collect();
        Keyword::from_values(self.keyword.name(), full)
    }

    /// Active cells only, in linear order.
    pub fn compact(&self) -> Result<Keyword> {
        if self.compacted {
            return Ok(self.keyword.clone());
        }
        let values = self.values();
        let active = (0..self.grid.active_count())
            .filter_map(|a| self.grid.global_index(a))
            .map(|g| values[g])
            .collect();
        Keyword::from_values(self.keyword.name(), active)
    }
}
