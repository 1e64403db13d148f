//! Collective communication for domain-decomposed models.
//!
//! When the structural mesh is split across partitions, each partition owns
//! a subset of nodes and therefore a column slice of the mode-shape matrix.
//! Projections onto the modes produce partial sums that must be added
//! across partitions. The modal operators stay partition-agnostic and call
//! into a [`Communicator`] at these reduction points; the coupling runtime
//! decides what actually moves the data.

use std::sync::{Arc, Barrier, Mutex};

use crate::error::{ModalError, Result};

/// Reduction capability injected into the modal operators.
pub trait Communicator: Send + Sync {
    /// Index of this partition in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of partitions.
    fn size(&self) -> usize;

    /// Replace `buf` on every rank with the element-wise sum over all ranks.
    ///
    /// Collective: every rank must call it, with a buffer of the same
    /// length. Buffers of different lengths fail on every rank with
    /// `DimensionMismatch`. A rank that returns early (for example on an
    /// input error) and skips the call leaves the other ranks blocked, so
    /// inputs must be validated identically on all ranks before reducing.
    fn all_reduce_sum(&self, buf: &mut [f64]) -> Result<()>;
}

/// Single-partition communicator. Reductions are the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_sum(&self, _buf: &mut [f64]) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Accumulator {
    values: Vec<f64>,
    /// Length offered by the first rank that disagreed with rank 0
    mismatch: Option<usize>,
}

struct SharedState {
    accumulator: Mutex<Accumulator>,
    barrier: Barrier,
}

/// In-process communicator where each rank is a thread.
///
/// Ranks reduce through a shared accumulator separated by barriers, so a
/// rank can only start the next collective after every rank finished
/// reading the previous result.
#[derive(Clone)]
pub struct SharedMemoryComm {
    rank: usize,
    size: usize,
    shared: Arc<SharedState>,
}

impl SharedMemoryComm {
    /// Create `size` connected communicators, one per rank.
    pub fn group(size: usize) -> Vec<SharedMemoryComm> {
        let size = size.max(1);
        let shared = Arc::new(SharedState {
            accumulator: Mutex::new(Accumulator::default()),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| SharedMemoryComm {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    fn with_accumulator<T>(&self, f: impl FnOnce(&mut Accumulator) -> T) -> T {
        // Poisoned: another rank panicked mid-collective
        let mut acc = match self.shared.accumulator.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut acc)
    }
}

impl std::fmt::Debug for SharedMemoryComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemoryComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl Communicator for SharedMemoryComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_sum(&self, buf: &mut [f64]) -> Result<()> {
        if self.size == 1 {
            return Ok(());
        }

        if self.rank == 0 {
            self.with_accumulator(|acc| {
                acc.values.clear();
                acc.values.resize(buf.len(), 0.0);
                acc.mismatch = None;
            });
        }
        self.shared.barrier.wait();

        self.with_accumulator(|acc| {
            if acc.values.len() == buf.len() {
                for (a, b) in acc.values.iter_mut().zip(buf.iter()) {
                    *a += *b;
                }
            } else if acc.mismatch.is_none() {
                acc.mismatch = Some(buf.len());
            }
        });
        self.shared.barrier.wait();

        // Every rank sees the same verdict, so all of them leave together
        let outcome = self.with_accumulator(|acc| match acc.mismatch {
            Some(actual) => Err(ModalError::DimensionMismatch {
                what: "all-reduce buffer",
                expected: acc.values.len(),
                actual,
            }),
            None => {
                buf.copy_from_slice(&acc.values);
                Ok(())
            }
        });
        self.shared.barrier.wait();
        outcome
    }
}
