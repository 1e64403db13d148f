//! 3-D bar lattice on an elastic foundation.
//!
//! Every bar is an axial spring between two nodes. In global coordinates
//! the element stiffness is
//!
//! ```text
//! k_e = dv[e] * (E*A/L) * [ n nᵀ  -n nᵀ]
//!                         [-n nᵀ   n nᵀ]
//! ```
//!
//! where `n` is the unit vector from the start node to the end node and
//! `dv[e]` is the design variable attached to bar `e`. Each node also rests
//! on an isotropic foundation spring so the unconstrained lattice has no
//! rigid-body modes. Mass is lumped at the nodes.
//!
//! With `dofs_per_node == 6` the lattice carries three rotational DOFs per
//! node with a diagonal rotational stiffness and inertia. They couple to
//! nothing, which makes them a convenient stand-in for shell/beam rotations
//! that the modal basis is expected to discard.

use nalgebra::{DVector, Vector3};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

use crate::{MatrixKind, ModelError, Result, StructuralModel, TRANSLATIONAL_DOFS};

/// Axial spring between two nodes (0-based node indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub start: usize,
    pub end: usize,
}

impl Bar {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Material and lumped properties shared by every element of the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatticeProperties {
    /// Young's modulus of the bars
    pub elastic_modulus: f64,
    /// Bar cross-sectional area
    pub area: f64,
    /// Isotropic foundation stiffness per node
    pub foundation_stiffness: f64,
    /// Lumped translational mass per node
    pub nodal_mass: f64,
    /// Diagonal stiffness on rotational DOFs
    pub rotational_stiffness: f64,
    /// Diagonal inertia on rotational DOFs
    pub rotational_inertia: f64,
}

impl Default for LatticeProperties {
    fn default() -> Self {
        Self {
            elastic_modulus: 70e9,
            area: 1e-4,
            foundation_stiffness: 1e3,
            nodal_mass: 1.0,
            rotational_stiffness: 1e4,
            rotational_inertia: 1e-2,
        }
    }
}

/// Bar lattice implementing [`StructuralModel`].
#[derive(Debug, Clone)]
pub struct SpringLattice {
    coordinates: Vec<Vector3<f64>>,
    bars: Vec<Bar>,
    lengths: Vec<f64>,
    properties: LatticeProperties,
    dofs_per_node: usize,
    fixed_nodes: Vec<usize>,
    design_vars: Vec<f64>,
}

impl SpringLattice {
    /// Create a lattice from node coordinates and bar connectivity.
    ///
    /// Design variables start at 1.0 for every bar.
    pub fn new(
        coordinates: Vec<[f64; 3]>,
        bars: Vec<Bar>,
        properties: LatticeProperties,
    ) -> Result<Self> {
        if coordinates.is_empty() {
            return Err(ModelError::InvalidGeometry("lattice has no nodes".into()));
        }
        let coordinates: Vec<Vector3<f64>> =
            coordinates.into_iter().map(Vector3::from).collect();

        let mut lengths = Vec::with_capacity(bars.len());
        for (id, bar) in bars.iter().enumerate() {
            let (Some(a), Some(b)) = (coordinates.get(bar.start), coordinates.get(bar.end))
            else {
                return Err(ModelError::InvalidGeometry(format!(
                    "bar {} references node outside 0..{}",
                    id,
                    coordinates.len()
                )));
            };
            let length = (b - a).norm();
            if length < 1e-10 {
                return Err(ModelError::InvalidGeometry(format!(
                    "bar {} has zero or near-zero length: {}",
                    id, length
                )));
            }
            lengths.push(length);
        }

        let design_vars = vec![1.0; bars.len()];
        Ok(Self {
            coordinates,
            bars,
            lengths,
            properties,
            dofs_per_node: TRANSLATIONAL_DOFS,
            fixed_nodes: Vec::new(),
            design_vars,
        })
    }

    /// Triangular-section spatial truss along the x axis.
    ///
    /// Each of the `bays + 1` stations holds three nodes on a triangle of
    /// circumradius `radius` in the y-z plane. Stations are joined by
    /// longitudinal chords and diagonals.
    pub fn triangular_truss(
        bays: usize,
        bay_length: f64,
        radius: f64,
        properties: LatticeProperties,
    ) -> Result<Self> {
        if bays == 0 {
            return Err(ModelError::InvalidGeometry(
                "truss needs at least one bay".into(),
            ));
        }

        let mut coordinates = Vec::with_capacity((bays + 1) * 3);
        for station in 0..=bays {
            let x = station as f64 * bay_length;
            for corner in 0..3 {
                let angle = 2.0 * std::f64::consts::PI * corner as f64 / 3.0;
                coordinates.push([x, radius * angle.cos(), radius * angle.sin()]);
            }
        }

        let node = |station: usize, corner: usize| station * 3 + corner % 3;
        let mut bars = Vec::new();
        for station in 0..=bays {
            for corner in 0..3 {
                bars.push(Bar::new(node(station, corner), node(station, corner + 1)));
            }
            if station < bays {
                for corner in 0..3 {
                    bars.push(Bar::new(node(station, corner), node(station + 1, corner)));
                    bars.push(Bar::new(
                        node(station, corner),
                        node(station + 1, corner + 1),
                    ));
                }
            }
        }

        Self::new(coordinates, bars, properties)
    }

    /// Carry three rotational DOFs per node in addition to the translations.
    pub fn with_rotational_dofs(mut self) -> Self {
        self.dofs_per_node = 2 * TRANSLATIONAL_DOFS;
        self
    }

    /// Clamp every DOF of the given nodes.
    pub fn with_fixed_nodes(mut self, nodes: &[usize]) -> Result<Self> {
        if let Some(&bad) = nodes.iter().find(|&&n| n >= self.coordinates.len()) {
            return Err(ModelError::InvalidGeometry(format!(
                "fixed node {} outside 0..{}",
                bad,
                self.coordinates.len()
            )));
        }
        self.fixed_nodes = nodes.to_vec();
        self.fixed_nodes.sort_unstable();
        self.fixed_nodes.dedup();
        Ok(self)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn properties(&self) -> &LatticeProperties {
        &self.properties
    }

    pub fn design_vars(&self) -> &[f64] {
        &self.design_vars
    }

    fn assemble_stiffness_coo(&self) -> CooMatrix<f64> {
        let n = self.num_dofs();
        let ndof = self.dofs_per_node;
        let mut coo = CooMatrix::new(n, n);
        let props = &self.properties;

        for (e, bar) in self.bars.iter().enumerate() {
            let length = self.lengths[e];
            let axis = (self.coordinates[bar.end] - self.coordinates[bar.start]) / length;
            let k_axial = self.design_vars[e] * props.elastic_modulus * props.area / length;
            let nodes = [bar.start, bar.end];

            for (a, &node_a) in nodes.iter().enumerate() {
                for (b, &node_b) in nodes.iter().enumerate() {
                    let sign = if a == b { 1.0 } else { -1.0 };
                    for i in 0..TRANSLATIONAL_DOFS {
                        for j in 0..TRANSLATIONAL_DOFS {
                            let value = sign * k_axial * axis[i] * axis[j];
                            if value != 0.0 {
                                coo.push(node_a * ndof + i, node_b * ndof + j, value);
                            }
                        }
                    }
                }
            }
        }

        for node in 0..self.coordinates.len() {
            for d in 0..ndof {
                let value = if d < TRANSLATIONAL_DOFS {
                    props.foundation_stiffness
                } else {
                    props.rotational_stiffness
                };
                coo.push(node * ndof + d, node * ndof + d, value);
            }
        }

        coo
    }

    fn assemble_mass_coo(&self) -> CooMatrix<f64> {
        let n = self.num_dofs();
        let ndof = self.dofs_per_node;
        let mut coo = CooMatrix::new(n, n);
        for node in 0..self.coordinates.len() {
            for d in 0..ndof {
                let value = if d < TRANSLATIONAL_DOFS {
                    self.properties.nodal_mass
                } else {
                    self.properties.rotational_inertia
                };
                coo.push(node * ndof + d, node * ndof + d, value);
            }
        }
        coo
    }
}

impl StructuralModel for SpringLattice {
    fn node_count(&self) -> usize {
        self.coordinates.len()
    }

    fn dofs_per_node(&self) -> usize {
        self.dofs_per_node
    }

    fn design_var_count(&self) -> usize {
        self.bars.len()
    }

    fn set_design_vars(&mut self, design_vars: &[f64]) -> Result<()> {
        if design_vars.len() != self.bars.len() {
            return Err(ModelError::DesignVarCount {
                expected: self.bars.len(),
                actual: design_vars.len(),
            });
        }
        self.design_vars.copy_from_slice(design_vars);
        Ok(())
    }

    fn assemble(&self, kind: MatrixKind) -> Result<CsrMatrix<f64>> {
        let coo = match kind {
            MatrixKind::Stiffness => self.assemble_stiffness_coo(),
            MatrixKind::Mass => self.assemble_mass_coo(),
        };
        let csr = CsrMatrix::from(&coo);
        tracing::debug!(?kind, dofs = csr.nrows(), nnz = csr.nnz(), "assembled lattice operator");
        Ok(csr)
    }

    fn undeformed_coordinates(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.coordinates.len() * TRANSLATIONAL_DOFS,
            self.coordinates.iter().flat_map(|c| c.iter().copied()),
        )
    }

    fn constrained_dofs(&self) -> Vec<usize> {
        let ndof = self.dofs_per_node;
        self.fixed_nodes
            .iter()
            .flat_map(|&node| (0..ndof).map(move |d| node * ndof + d))
            .collect()
    }
}
