use super::{FlattenedDataset, WindowSample};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::num::NonZeroUsize;

/// A borrowed group of samples processed together
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    samples: Vec<&'a WindowSample>,
}

impl<'a> Batch<'a> {
    pub fn new(samples: Vec<&'a WindowSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[&'a WindowSample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a WindowSample> + '_ {
        self.samples.iter().copied()
    }

    pub fn window_labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.window_label).collect()
    }

    pub fn session_indices(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.session_idx).collect()
    }

    pub fn session_labels(&self) -> Vec<u8> {
        self.samples.iter().map(|s| s.session_label).collect()
    }
}

impl<'a> FromIterator<&'a WindowSample> for Batch<'a> {
    fn from_iter<I: IntoIterator<Item = &'a WindowSample>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Fixed-size batching over a [`FlattenedDataset`]
///
/// With shuffling enabled, each epoch uses its own permutation derived from
/// `seed` and the epoch number, so a run is reproducible end to end.
#[derive(Debug, Clone, Copy)]
pub struct DataLoader<'a> {
    dataset: &'a FlattenedDataset,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
}

impl<'a> DataLoader<'a> {
    /// Sequential loader over `dataset`
    pub fn new(dataset: &'a FlattenedDataset, batch_size: NonZeroUsize) -> Self {
        Self {
            dataset,
            batch_size: batch_size.get(),
            shuffle: false,
            seed: 0,
        }
    }

    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    pub fn dataset(&self) -> &'a FlattenedDataset {
        self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches per epoch (the last one may be short)
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Batches for one epoch
    pub fn batches(&self, epoch: usize) -> Batches<'a> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);
        }
        Batches {
            dataset: self.dataset,
            order,
            batch_size: self.batch_size,
            pos: 0,
        }
    }
}

/// Iterator over the batches of one epoch
#[derive(Debug)]
pub struct Batches<'a> {
    dataset: &'a FlattenedDataset,
    order: Vec<usize>,
    batch_size: usize,
    pos: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Batch<'a>> {
        if self.pos >= self.order.len() {
            return None;
        }
        let end = (self.pos + self.batch_size).min(self.order.len());
        let dataset = self.dataset;
        let batch = self.order[self.pos..end]
            .iter()
            .map(|&i| &dataset[i])
            .collect();
        self.pos = end;
        Some(batch)
    }
}
