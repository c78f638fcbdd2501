use std::ops::Range;

use itertools::Itertools;

use super::interpolation::{bracket, lerp, Bracket};
use crate::{
    ananke_errors::AnankeError,
    constants::{LogAge, SolarMass, ISOCHRONE_AGE, ISOCHRONE_M_INI},
};

/// Rows of one isochrone sharing the same log age.
#[derive(Debug, Clone, PartialEq)]
struct AgeSlice {
    log_age: LogAge,
    rows: Range<usize>,
}

/// Numeric content of an isochrone file, stored column-major.
///
/// Rows are sorted by (`Age`, `M_ini`) ascending, which makes each age a contiguous slice with
/// increasing initial mass.
#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneTable {
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
    n_rows: usize,
    mass_index: usize,
    slices: Vec<AgeSlice>,
    slice_ages: Vec<LogAge>,
}

impl IsochroneTable {
    /// Build a table from in-memory rows, e.g. to write it with
    /// [`IsochroneFile::create`](super::isochrone_file::IsochroneFile::create).
    ///
    /// Return
    /// ----------
    /// * `Err(AnankeError::InvalidInput)` under the conditions of [`Self::from_rows`].
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, AnankeError> {
        Self::from_rows(columns, rows).map_err(AnankeError::InvalidInput)
    }

    /// Build a table from rows in any order.
    ///
    /// The rows are stably sorted by (`Age`, `M_ini`). Fails with a human readable reason if a
    /// row has the wrong length, a key column is missing, or a key value is not finite.
    pub(crate) fn from_rows(columns: Vec<String>, mut rows: Vec<Vec<f64>>) -> Result<Self, String> {
        let position = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| format!("missing column '{name}'"))
        };
        let age_index = position(ISOCHRONE_AGE)?;
        let mass_index = position(ISOCHRONE_M_INI)?;

        if let Some((i, row)) = rows.iter().find_position(|r| r.len() != columns.len()) {
            return Err(format!(
                "row {i} has {} values for {} columns",
                row.len(),
                columns.len()
            ));
        }
        if rows.is_empty() {
            return Err("no data rows".into());
        }
        if rows
            .iter()
            .any(|r| !r[age_index].is_finite() || !r[mass_index].is_finite())
        {
            return Err(format!(
                "non-finite {ISOCHRONE_AGE} or {ISOCHRONE_M_INI} value"
            ));
        }

        rows.sort_by(|a, b| {
            a[age_index]
                .total_cmp(&b[age_index])
                .then(a[mass_index].total_cmp(&b[mass_index]))
        });

        let n_rows = rows.len();
        let data: Vec<Vec<f64>> = (0..columns.len())
            .map(|c| rows.iter().map(|row| row[c]).collect())
            .collect();

        let ages = &data[age_index];
        let slices: Vec<AgeSlice> = (0..n_rows)
            .chunk_by(|&i| ages[i].to_bits())
            .into_iter()
            .map(|(bits, group)| {
                let members: Vec<usize> = group.collect();
                AgeSlice {
                    log_age: f64::from_bits(bits),
                    rows: members[0]..members[members.len() - 1] + 1,
                }
            })
            .collect();
        let slice_ages = slices.iter().map(|s| s.log_age).collect();

        Ok(IsochroneTable {
            columns,
            data,
            n_rows,
            mass_index,
            slices,
            slice_ages,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_index(name).map(|i| self.data[i].as_slice())
    }

    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        (index < self.n_rows).then(|| self.data.iter().map(|col| col[index]).collect())
    }

    /// Distinct log ages, ascending.
    pub fn ages(&self) -> &[LogAge] {
        &self.slice_ages
    }

    /// Interpolate the given columns at (`log_age`, `m_ini`).
    ///
    /// Linear in initial mass along the two age slices around `log_age`, then linear in log
    /// age. Returns `None` outside the sampled ages, or outside the mass range of one of the
    /// age slices involved.
    pub fn interpolate(
        &self,
        log_age: LogAge,
        m_ini: SolarMass,
        columns: &[usize],
    ) -> Option<Vec<f64>> {
        match bracket(&self.slice_ages, log_age)? {
            Bracket::Exact(s) => self.interpolate_mass(s, m_ini, columns),
            Bracket::Between {
                lower,
                upper,
                weight,
            } => {
                let young = self.interpolate_mass(lower, m_ini, columns)?;
                let old = self.interpolate_mass(upper, m_ini, columns)?;
                Some(
                    young
                        .iter()
                        .zip(&old)
                        .map(|(&a, &b)| lerp(a, b, weight))
                        .collect(),
                )
            }
        }
    }

    fn interpolate_mass(&self, slice: usize, m_ini: SolarMass, columns: &[usize]) -> Option<Vec<f64>> {
        let rows = self.slices[slice].rows.clone();
        let masses = &self.data[self.mass_index][rows.clone()];
        match bracket(masses, m_ini)? {
            Bracket::Exact(i) => Some(
                columns
                    .iter()
                    .map(|&c| self.data[c][rows.start + i])
                    .collect(),
            ),
            Bracket::Between {
                lower,
                upper,
                weight,
            } => Some(
                columns
                    .iter()
                    .map(|&c| {
                        let column = &self.data[c][rows.clone()];
                        lerp(column[lower], column[upper], weight)
                    })
                    .collect(),
            ),
        }
    }

    /// Iterate over the rows in sorted order.
    pub(crate) fn rows(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.n_rows).map(|i| self.data.iter().map(|col| col[i]).collect())
    }
}
