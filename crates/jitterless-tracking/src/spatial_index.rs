//! Spatial hash over a 2D region, used to keep tracked features spread out.
//!
//! The region is partitioned into a grid of buckets, each holding at most one
//! item. Items live in a dense arena so iteration is cheap and removal is a
//! swap-remove; every bucket stores the arena handle of its item.

use jitterless_core::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Number of sectors along each axis used by [`SpatialIndex::distribution_quality`].
const QUALITY_SECTORS: u32 = 4;

/// Number of columns and rows of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSize {
    pub cols: u32,
    pub rows: u32,
}

impl GridSize {
    pub const fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }

    #[inline]
    pub fn area(self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

/// Discrete bucket coordinate within a [`SpatialIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialKey {
    pub col: u32,
    pub row: u32,
}

impl SpatialKey {
    pub const fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    key: SpatialKey,
    position: Vec2,
    item: T,
}

/// Grid-bucketed map from 2D positions to items, one item per bucket.
#[derive(Debug, Clone)]
pub struct SpatialIndex<T> {
    resolution: GridSize,
    region: Rect,
    key_size: Vec2,
    buckets: Vec<Option<usize>>,
    entries: Vec<Entry<T>>,
}

impl<T> SpatialIndex<T> {
    /// Create an empty index of `resolution` buckets covering `region`.
    pub fn new(resolution: GridSize, region: Rect) -> Self {
        assert!(
            resolution.cols > 0 && resolution.rows > 0,
            "spatial index resolution must be non-zero"
        );
        Self {
            resolution,
            region,
            key_size: region.size() / Vec2::new(resolution.cols as f32, resolution.rows as f32),
            buckets: vec![None; resolution.area()],
            entries: Vec::new(),
        }
    }

    /// Repartition the index, re-inserting live items under their new keys.
    ///
    /// Items whose position falls outside the new region are dropped. When
    /// several items land in the same bucket the last one wins.
    pub fn rescale(&mut self, resolution: GridSize, region: Rect) {
        let entries = std::mem::take(&mut self.entries);
        *self = Self::new(resolution, region);
        for entry in entries {
            self.try_place(entry.position, entry.item);
        }
    }

    pub fn resolution(&self) -> GridSize {
        self.resolution
    }

    pub fn input_region(&self) -> Rect {
        self.region
    }

    /// Size of a single bucket in input coordinates.
    pub fn key_size(&self) -> Vec2 {
        self.key_size
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Check if a position falls inside the input region.
    #[inline]
    pub fn within_bounds(&self, position: Vec2) -> bool {
        self.region.contains(position)
    }

    /// Key of the bucket containing `position`, if it is inside the region.
    pub fn try_key_of(&self, position: Vec2) -> Option<SpatialKey> {
        if !self.within_bounds(position) {
            return None;
        }
        let cell = (position - self.region.min()) / self.key_size;
        Some(SpatialKey::new(
            (cell.x as u32).min(self.resolution.cols - 1),
            (cell.y as u32).min(self.resolution.rows - 1),
        ))
    }

    /// Key of the bucket containing `position`.
    ///
    /// The position must lie inside the input region.
    pub fn key_of(&self, position: Vec2) -> SpatialKey {
        match self.try_key_of(position) {
            Some(key) => key,
            None => panic!("position {position} is outside the spatial index region"),
        }
    }

    /// Centre of the bucket identified by `key`, in input coordinates.
    pub fn key_centre(&self, key: SpatialKey) -> Vec2 {
        self.region.min() + (Vec2::new(key.col as f32, key.row as f32) + 0.5) * self.key_size
    }

    /// Insert or overwrite the item in the bucket containing `position`.
    ///
    /// The position must lie inside the input region.
    pub fn place(&mut self, position: Vec2, item: T) -> &mut T {
        let key = self.key_of(position);
        self.insert(key, position, item)
    }

    /// Insert or overwrite the item in the bucket `key`, positioned at its centre.
    pub fn place_at(&mut self, key: SpatialKey, item: T) -> &mut T {
        let position = self.key_centre(key);
        self.insert(key, position, item)
    }

    /// Like [`SpatialIndex::place`] but returns `false` for positions outside the region.
    pub fn try_place(&mut self, position: Vec2, item: T) -> bool {
        match self.try_key_of(position) {
            Some(key) => {
                self.insert(key, position, item);
                true
            }
            None => false,
        }
    }

    /// Construct an item in the bucket containing `position`.
    pub fn emplace(&mut self, position: Vec2, make: impl FnOnce() -> T) -> &mut T {
        self.place(position, make())
    }

    /// Like [`SpatialIndex::emplace`] but does nothing for positions outside the region.
    pub fn try_emplace(&mut self, position: Vec2, make: impl FnOnce() -> T) -> Option<&mut T> {
        let key = self.try_key_of(position)?;
        Some(self.insert(key, position, make()))
    }

    /// Remove the item in bucket `key`.
    pub fn remove(&mut self, key: SpatialKey) -> Option<T> {
        let bucket = self.bucket_index(key);
        let handle = self.buckets[bucket].take()?;
        let removed = self.entries.swap_remove(handle);

        // The previously last entry now lives at `handle`.
        if let Some(moved) = self.entries.get(handle) {
            let moved_bucket = self.bucket_index(moved.key);
            self.buckets[moved_bucket] = Some(handle);
        }
        Some(removed.item)
    }

    /// Item in bucket `key`. Panics when the bucket is empty.
    pub fn at(&self, key: SpatialKey) -> &T {
        match self.get(key) {
            Some(item) => item,
            None => panic!("no item in spatial index bucket {key:?}"),
        }
    }

    pub fn get(&self, key: SpatialKey) -> Option<&T> {
        let handle = self.buckets[self.bucket_index(key)]?;
        Some(&self.entries[handle].item)
    }

    pub fn get_mut(&mut self, key: SpatialKey) -> Option<&mut T> {
        let handle = self.buckets[self.bucket_index(key)]?;
        Some(&mut self.entries[handle].item)
    }

    pub fn contains(&self, key: SpatialKey) -> bool {
        self.buckets[self.bucket_index(key)].is_some()
    }

    /// Position the item in bucket `key` was placed at.
    pub fn position(&self, key: SpatialKey) -> Option<Vec2> {
        let handle = self.buckets[self.bucket_index(key)]?;
        Some(self.entries[handle].position)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.buckets.fill(None);
    }

    /// Items in insertion order. The order is not stable across removals.
    pub fn iter(&self) -> impl Iterator<Item = (SpatialKey, &T)> {
        self.entries.iter().map(|e| (e.key, &e.item))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SpatialKey, &mut T)> {
        self.entries.iter_mut().map(|e| (e.key, &mut e.item))
    }

    pub fn keys(&self) -> impl Iterator<Item = SpatialKey> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    /// How evenly the items are spread over the region, in [0, 1].
    ///
    /// Grids larger than 4x4 are split into 4x4 sectors and scored by how much
    /// the sector counts exceed the even share. Smaller grids report their
    /// load factor.
    pub fn distribution_quality(&self) -> f32 {
        if self.is_empty() {
            return 1.0;
        }

        let GridSize { cols, rows } = self.resolution;
        if cols <= QUALITY_SECTORS || rows <= QUALITY_SECTORS {
            return self.len() as f32 / self.capacity() as f32;
        }

        let mut sectors = [0usize; (QUALITY_SECTORS * QUALITY_SECTORS) as usize];
        for entry in &self.entries {
            let sx = entry.key.col * QUALITY_SECTORS / cols;
            let sy = entry.key.row * QUALITY_SECTORS / rows;
            sectors[(sy * QUALITY_SECTORS + sx) as usize] += 1;
        }

        let total = self.len() as f32;
        let ideal = total / sectors.len() as f32;
        let excess: f32 = sectors
            .iter()
            .map(|&count| (count as f32 - ideal).max(0.0))
            .sum();

        (1.0 - excess / (total - ideal)).clamp(0.0, 1.0)
    }

    fn insert(&mut self, key: SpatialKey, position: Vec2, item: T) -> &mut T {
        let bucket = self.bucket_index(key);
        let handle = match self.buckets[bucket] {
            Some(handle) => {
                let entry = &mut self.entries[handle];
                entry.position = position;
                entry.item = item;
                handle
            }
            None => {
                self.entries.push(Entry {
                    key,
                    position,
                    item,
                });
                let handle = self.entries.len() - 1;
                self.buckets[bucket] = Some(handle);
                handle
            }
        };
        &mut self.entries[handle].item
    }

    #[inline]
    fn bucket_index(&self, key: SpatialKey) -> usize {
        assert!(
            key.col < self.resolution.cols && key.row < self.resolution.rows,
            "spatial key {key:?} is outside resolution {:?}",
            self.resolution
        );
        (key.row * self.resolution.cols + key.col) as usize
    }
}

impl<T> Index<SpatialKey> for SpatialIndex<T> {
    type Output = T;

    fn index(&self, key: SpatialKey) -> &T {
        self.at(key)
    }
}
