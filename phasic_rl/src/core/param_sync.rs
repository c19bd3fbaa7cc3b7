//! Value-copy synchronization between structurally identical networks.
//!
//! The two phases of PPG train two separate copies of the same architecture,
//! each bound to its own optimizer. Parameters are never aliased between
//! them: they are copied by value at phase switches.
//!
//! ```text
//! fork_parameters(net)        deep copy, fresh ParamIds (new optimizer binding)
//! copy_parameters(src, dst)   dst values := src values, dst ParamIds kept
//! ```
//!
//! Parameters are matched by traversal order, which is deterministic for
//! modules of the same architecture.

use burn::module::{Module, ModuleMapper, Param, ParamId};
use burn::prelude::*;

use super::tensors::to_vec;
use crate::error::{PhasicError, Result};

// ============================================================================
// Mappers
// ============================================================================

/// A parameter flattened to 1D, with its original shape.
struct FlattenedParam<B: Backend> {
    tensor: Tensor<B, 1>,
    shape: Vec<usize>,
}

/// Collects every float parameter of a module in traversal order.
struct ParamExtractor<B: Backend> {
    params: Vec<FlattenedParam<B>>,
    ids: Vec<ParamId>,
}

impl<B: Backend> ParamExtractor<B> {
    fn new() -> Self {
        Self {
            params: Vec::new(),
            ids: Vec::new(),
        }
    }

    fn collect<M: Module<B>>(module: &M) -> Self {
        let mut extractor = Self::new();
        let _ = module.clone().map(&mut extractor);
        extractor
    }
}

impl<B: Backend> ModuleMapper<B> for ParamExtractor<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let shape = val.dims().to_vec();
        let total_size: usize = shape.iter().product();

        self.params.push(FlattenedParam {
            tensor: val.reshape([total_size]),
            shape,
        });
        self.ids.push(param.id.clone());

        param
    }
}

/// Overwrites parameter values with the source values, keeping each ParamId.
struct CopyMapper<B: Backend> {
    source: Vec<FlattenedParam<B>>,
    index: usize,
}

impl<B: Backend> ModuleMapper<B> for CopyMapper<B> {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let idx = self.index;
        self.index += 1;

        let Some(source) = self.source.get(idx) else {
            // Layout was checked before mapping
            return param;
        };

        let target = param.val();
        let require_grad = target.is_require_grad();
        let value = source.tensor.clone().reshape(target.dims()).detach();
        let value = if require_grad { value.require_grad() } else { value };

        Param::initialized(param.id.clone(), value)
    }
}

/// Rebuilds every parameter as a new leaf with a fresh ParamId.
struct ForkMapper;

impl<B: Backend> ModuleMapper<B> for ForkMapper {
    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let val = param.val();
        let require_grad = val.is_require_grad();
        let value = val.detach();
        let value = if require_grad { value.require_grad() } else { value };

        Param::initialized(ParamId::new(), value)
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Shapes of every float parameter, in traversal order.
pub fn parameter_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    ParamExtractor::<B>::collect(module)
        .params
        .into_iter()
        .map(|p| p.shape)
        .collect()
}

/// Parameter ids, in traversal order.
pub fn parameter_ids<B: Backend, M: Module<B>>(module: &M) -> Vec<ParamId> {
    ParamExtractor::<B>::collect(module).ids
}

/// Flattened parameter values, in traversal order.
pub fn parameter_values<B: Backend, M: Module<B>>(module: &M) -> Result<Vec<Vec<f32>>> {
    ParamExtractor::<B>::collect(module)
        .params
        .into_iter()
        .map(|p| to_vec(p.tensor))
        .collect()
}

/// Fail with [`PhasicError::StructureMismatch`] unless both modules share a
/// parameter layout.
pub fn ensure_same_structure<B: Backend, M: Module<B>>(source: &M, destination: &M) -> Result<()> {
    let src = parameter_shapes::<B, M>(source);
    let dst = parameter_shapes::<B, M>(destination);

    if src.len() != dst.len() {
        return Err(PhasicError::StructureMismatch(format!(
            "source has {} parameters, destination has {}",
            src.len(),
            dst.len()
        )));
    }

    if let Some((i, (a, b))) = src.iter().zip(dst.iter()).enumerate().find(|(_, (a, b))| a != b) {
        return Err(PhasicError::StructureMismatch(format!(
            "parameter {} has shape {:?} in source and {:?} in destination",
            i, a, b
        )));
    }

    Ok(())
}

/// Copy every parameter value of `source` into `destination`.
///
/// `destination` keeps its ParamIds, so its optimizer binding is unchanged.
/// `source` is left untouched and the two modules share no storage in the
/// autodiff graph afterwards.
pub fn copy_parameters<B: Backend, M: Module<B>>(source: &M, destination: M) -> Result<M> {
    ensure_same_structure::<B, M>(source, &destination)?;

    let mut mapper = CopyMapper {
        source: ParamExtractor::<B>::collect(source).params,
        index: 0,
    };
    Ok(destination.map(&mut mapper))
}

/// Deep copy a module with fresh ParamIds.
///
/// The copy is structurally identical but parameter-disjoint: gradients and
/// optimizer state of one never reach the other.
pub fn fork_parameters<B: Backend, M: Module<B>>(module: &M) -> M {
    module.clone().map(&mut ForkMapper)
}
