//! Typed, open-ended data blocks carried by sync state, aux state and input.
//!
//! A collection holds at most one block per kind. Blocks are user types implementing
//! [`SyncBlock`]; the collection stores them type-erased and hashes them in kind order so
//! digests stay canonical.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::hash::StateHasher;

/// A data block that can ride along with the simulation state.
pub trait SyncBlock: Any + Clone + Default + Debug + Send + Sync {
    /// Unique kind name. One block per kind per collection.
    const KIND: &'static str;

    /// Feed every field that matters for equality into `hasher`.
    fn hash_into(&self, hasher: &mut StateHasher);
}

/// Object-safe view of a [`SyncBlock`].
pub trait AnySyncBlock: Any + Debug + Send + Sync {
    fn block_kind(&self) -> &'static str;
    fn clone_block(&self) -> Box<dyn AnySyncBlock>;
    fn hash_block(&self, hasher: &mut StateHasher);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: SyncBlock> AnySyncBlock for T {
    fn block_kind(&self) -> &'static str {
        T::KIND
    }

    fn clone_block(&self) -> Box<dyn AnySyncBlock> {
        Box::new(self.clone())
    }

    fn hash_block(&self, hasher: &mut StateHasher) {
        SyncBlock::hash_into(self, hasher);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Default)]
pub struct DataCollection {
    blocks: BTreeMap<&'static str, Box<dyn AnySyncBlock>>,
}

impl Clone for DataCollection {
    fn clone(&self) -> Self {
        Self {
            blocks: self
                .blocks
                .iter()
                .map(|(kind, block)| (*kind, block.clone_block()))
                .collect(),
        }
    }
}

impl DataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `block`, replacing any block of the same kind.
    pub fn add_or_overwrite<T: SyncBlock>(&mut self, block: T) {
        self.blocks.insert(T::KIND, Box::new(block));
    }

    /// Insert a type-erased block, replacing any block of the same kind.
    pub fn add_boxed(&mut self, block: Box<dyn AnySyncBlock>) {
        self.blocks.insert(block.block_kind(), block);
    }

    pub fn find<T: SyncBlock>(&self) -> Option<&T> {
        self.blocks
            .get(T::KIND)
            .and_then(|b| b.as_any().downcast_ref::<T>())
    }

    pub fn find_mut<T: SyncBlock>(&mut self) -> Option<&mut T> {
        self.blocks
            .get_mut(T::KIND)
            .and_then(|b| b.as_any_mut().downcast_mut::<T>())
    }

    /// The stored block of type `T`, or its default.
    pub fn get_or_default<T: SyncBlock>(&self) -> T {
        self.find::<T>().cloned().unwrap_or_default()
    }

    pub fn find_by_kind(&self, kind: &str) -> Option<&dyn AnySyncBlock> {
        self.blocks.get(kind).map(|b| b.as_ref())
    }

    pub fn remove<T: SyncBlock>(&mut self) -> bool {
        self.blocks.remove(T::KIND).is_some()
    }

    #[inline]
    pub fn contains(&self, kind: &str) -> bool {
        self.blocks.contains_key(kind)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in kind order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn AnySyncBlock> {
        self.blocks.values().map(|b| b.as_ref())
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u64(self.blocks.len() as u64);
        for (kind, block) in &self.blocks {
            hasher.update_str(kind);
            block.hash_block(hasher);
        }
    }
}

/// Marks a data kind as persistent: present in every tick's output state.
#[derive(Clone, Copy, Debug)]
pub struct DataPersistence {
    pub kind: &'static str,
    /// Copy the block from the incoming state when present; otherwise start from default.
    pub copy_from_prior_frame: bool,
    pub make_default: fn() -> Box<dyn AnySyncBlock>,
}

impl DataPersistence {
    pub fn of<T: SyncBlock>(copy_from_prior_frame: bool) -> Self {
        fn make<T: SyncBlock>() -> Box<dyn AnySyncBlock> {
            Box::new(T::default())
        }
        Self {
            kind: T::KIND,
            copy_from_prior_frame,
            make_default: make::<T>,
        }
    }

    /// Build this kind's block for a new output state from the `prior` collection.
    pub fn propagate(&self, prior: &DataCollection) -> Box<dyn AnySyncBlock> {
        if self.copy_from_prior_frame {
            if let Some(block) = prior.find_by_kind(self.kind) {
                return block.clone_block();
            }
        }
        (self.make_default)()
    }
}
