// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Append-only list that never moves its items.
///
/// Items live in fixed-capacity blocks that are never reallocated, so references
/// and indices handed out earlier stay valid for the life of the list.
pub struct BlockList<T, const N: usize = 32> {
    blocks: Vec<Vec<T>>,
    len: usize,
}

impl<T, const N: usize> Default for BlockList<T, N> {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            len: 0,
        }
    }
}

impl<T, const N: usize> BlockList<T, N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `item`, returning its index.
    pub fn push(&mut self, item: T) -> usize {
        let needs_block = self.blocks.last().map_or(true, |block| block.len() == N);
        if needs_block {
            self.blocks.push(Vec::with_capacity(N));
        }
        if let Some(block) = self.blocks.last_mut() {
            block.push(item);
        }
        self.len += 1;
        self.len - 1
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.blocks.get(index / N)?.get(index % N)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.blocks.iter().flat_map(|block| block.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::BlockList;

    #[test]
    fn addresses_are_stable() {
        let mut list: BlockList<u64, 4> = BlockList::new();
        list.push(7);
        let first: *const u64 = list.get(0).unwrap();
        for i in 0..100 {
            list.push(i);
        }
        assert_eq!(list.len(), 101);
        assert!(std::ptr::eq(first, list.get(0).unwrap()));
        assert_eq!(list.get(100), Some(&99));
        assert_eq!(list.get(101), None);
        assert_eq!(list.iter().count(), 101);
    }
}
