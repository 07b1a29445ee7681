//! Multigroup cross-section data.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// Macroscopic cross sections of one material.
///
/// `sigma_s[g_in][g_out]` is the transfer cross section from `g_in` into
/// `g_out`. `source[g]` is the angle-integrated external emission density.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub sigma_t: Vec<f64>,
    pub sigma_s: Vec<Vec<f64>>,
    #[serde(default)]
    pub nu_sigma_f: Vec<f64>,
    #[serde(default)]
    pub chi: Vec<f64>,
    #[serde(default)]
    pub source: Vec<f64>,
}

impl Material {
    pub fn new(name: impl Into<String>, sigma_t: Vec<f64>, sigma_s: Vec<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            sigma_t,
            sigma_s,
            nu_sigma_f: Vec::new(),
            chi: Vec::new(),
            source: Vec::new(),
        }
    }

    pub fn with_fission(mut self, nu_sigma_f: Vec<f64>, chi: Vec<f64>) -> Self {
        self.nu_sigma_f = nu_sigma_f;
        self.chi = chi;
        self
    }

    pub fn with_source(mut self, source: Vec<f64>) -> Self {
        self.source = source;
        self
    }

    pub fn n_group(&self) -> usize {
        self.sigma_t.len()
    }

    pub fn is_fissile(&self) -> bool {
        self.nu_sigma_f.iter().any(|&v| v > 0.0)
    }

    pub fn nu_sigma_f(&self, g: usize) -> f64 {
        self.nu_sigma_f.get(g).copied().unwrap_or(0.0)
    }

    pub fn source(&self, g: usize) -> f64 {
        self.source.get(g).copied().unwrap_or(0.0)
    }

    pub fn scatter(&self, g_in: usize, g_out: usize) -> f64 {
        self.sigma_s[g_in][g_out]
    }

    /// Removal cross section of group `g` (total minus self-scatter).
    pub fn removal(&self, g: usize) -> f64 {
        self.sigma_t[g] - self.sigma_s[g][g]
    }

    /// `χ_g ν σ_f,g'` arranged as `[g_in][g_out]`; zero for non-fissile materials.
    pub fn fission_transfer(&self) -> DMatrix<f64> {
        let n = self.n_group();
        if !self.is_fissile() {
            return DMatrix::zeros(n, n);
        }
        DMatrix::from_fn(n, n, |g_in, g_out| {
            self.nu_sigma_f(g_in) * self.chi.get(g_out).copied().unwrap_or(0.0)
        })
    }

    fn validate(&self, n_group: usize) -> TransportResult<()> {
        let bad = |what: &str, len: usize| {
            TransportError::config(format!(
                "material '{}': {what} has {len} entries, expected {n_group}",
                self.name
            ))
        };
        if self.sigma_t.len() != n_group {
            return Err(bad("sigma_t", self.sigma_t.len()));
        }
        if self.sigma_s.len() != n_group {
            return Err(bad("sigma_s", self.sigma_s.len()));
        }
        if let Some(row) = self.sigma_s.iter().find(|r| r.len() != n_group) {
            return Err(bad("a sigma_s row", row.len()));
        }
        for (name, v) in [
            ("nu_sigma_f", &self.nu_sigma_f),
            ("chi", &self.chi),
            ("source", &self.source),
        ] {
            if !v.is_empty() && v.len() != n_group {
                return Err(bad(name, v.len()));
            }
        }
        if self.is_fissile() && self.chi.is_empty() {
            return Err(TransportError::config(format!(
                "material '{}' is fissile but has no fission spectrum",
                self.name
            )));
        }
        if self.sigma_t.iter().any(|&s| s <= 0.0) {
            return Err(TransportError::config(format!(
                "material '{}' has a non-positive total cross section",
                self.name
            )));
        }
        Ok(())
    }
}

/// All materials of a problem, indexed by material id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialLibrary {
    n_group: usize,
    materials: Vec<Material>,
}

impl MaterialLibrary {
    pub fn new(n_group: usize, materials: Vec<Material>) -> TransportResult<Self> {
        if materials.is_empty() {
            return Err(TransportError::config("material library is empty"));
        }
        for m in &materials {
            m.validate(n_group)?;
        }
        Ok(Self { n_group, materials })
    }

    pub fn n_group(&self) -> usize {
        self.n_group
    }

    pub fn n_material(&self) -> usize {
        self.materials.len()
    }

    pub fn get(&self, id: usize) -> &Material {
        &self.materials[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    pub fn any_fissile(&self) -> bool {
        self.materials.iter().any(Material::is_fissile)
    }

    /// True when some material scatters into `g` from `g` itself.
    pub fn has_self_scatter(&self, g: usize) -> bool {
        self.materials.iter().any(|m| m.scatter(g, g) != 0.0)
    }

    pub fn has_scattering(&self) -> bool {
        self.materials
            .iter()
            .any(|m| m.sigma_s.iter().flatten().any(|&s| s != 0.0))
    }

    /// True when some material transfers particles to a lower group index.
    pub fn has_upscatter(&self) -> bool {
        self.materials.iter().any(|m| {
            (0..self.n_group).any(|g_in| (0..g_in).any(|g_out| m.scatter(g_in, g_out) != 0.0))
        })
    }

    /// Checks that every material id referenced by `ids` exists.
    pub fn check_ids(&self, ids: impl IntoIterator<Item = usize>) -> TransportResult<()> {
        for id in ids {
            if id >= self.materials.len() {
                return Err(TransportError::config(format!(
                    "mesh references material {id}, only {} defined",
                    self.materials.len()
                )));
            }
        }
        Ok(())
    }
}
