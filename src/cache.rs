//! Deduplication of merged bases by their contributor lists.
use crate::allocators::DimAllocator;
use crate::element::{CellBasis, CellTopology};
use crate::error::Error;
use crate::merged::MergedBasis;
use crate::nalgebra::DefaultAllocator;
use crate::{Real, SmallDim};
use log::trace;
use rustc_hash::FxHashMap;

/// Identity of a basis provider, given by its address.
///
/// Providers are borrowed for the lifetime of the cache, so addresses can not be reused while
/// a key is alive. Zero-sized providers may share an address and should not be used as
/// distinct contributors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderKey(usize);

impl ProviderKey {
    pub fn of<T, D>(basis: &dyn CellBasis<T, D>) -> Self
    where
        T: Real,
        D: SmallDim,
        DefaultAllocator: DimAllocator<T, D>,
    {
        Self(basis as *const _ as *const () as usize)
    }
}

/// Index of a merged basis owned by a [`CombinationCache`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvaluatorId(usize);

impl EvaluatorId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Owns all merged bases of a composite space, with at most one basis per distinct ordered
/// list of contributors.
///
/// Entries are never evicted individually, only cleared all at once.
#[derive(Debug)]
pub struct CombinationCache<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    situations: FxHashMap<Vec<ProviderKey>, EvaluatorId>,
    evaluators: Vec<MergedBasis<'a, T, D>>,
}

impl<'a, T, D> Default for CombinationCache<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn default() -> Self {
        Self {
            situations: FxHashMap::default(),
            evaluators: Vec::new(),
        }
    }
}

impl<'a, T, D> CombinationCache<'a, T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the merged basis for the given contributors, constructing it if this
    /// combination has not been seen before.
    ///
    /// Lookup is by provider identity and order. The smart linking flag and the cell are only
    /// used when a new basis is constructed. If construction fails, the cache is unchanged.
    pub fn get_or_create(
        &mut self,
        contributors: Vec<&'a dyn CellBasis<T, D>>,
        smart_linking: bool,
        cell: &CellTopology,
    ) -> Result<EvaluatorId, Error> {
        let key: Vec<_> = contributors
            .iter()
            .map(|basis| ProviderKey::of(*basis))
            .collect();
        if let Some(id) = self.situations.get(&key) {
            return Ok(*id);
        }

        let merged = MergedBasis::new(contributors, smart_linking, cell)?;
        let id = EvaluatorId(self.evaluators.len());
        trace!(
            "Created merged basis {} with {} contributors and {} dofs on cell {}",
            id.0,
            merged.num_contributors(),
            merged.num_dofs(),
            cell.index
        );
        self.evaluators.push(merged);
        self.situations.insert(key, id);
        Ok(id)
    }

    pub fn get(&self, id: EvaluatorId) -> Option<&MergedBasis<'a, T, D>> {
        self.evaluators.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Iterates over all cached contributor lists and their merged bases.
    pub fn situations(&self) -> impl '_ + Iterator<Item = (&[ProviderKey], EvaluatorId)> {
        self.situations
            .iter()
            .map(|(key, id)| (key.as_slice(), *id))
    }

    pub fn evaluators(&self) -> &[MergedBasis<'a, T, D>] {
        &self.evaluators
    }

    /// Whether any cached contributor list contains the given provider.
    pub fn contains_provider(&self, basis: &dyn CellBasis<T, D>) -> bool {
        let provider = ProviderKey::of(basis);
        self.situations
            .keys()
            .any(|key| key.contains(&provider))
    }

    /// Releases all merged bases.
    ///
    /// Any [`EvaluatorId`] handed out before is invalidated.
    pub fn clear(&mut self) {
        self.situations.clear();
        self.evaluators.clear();
    }
}
