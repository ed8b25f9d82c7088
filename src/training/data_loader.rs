use crate::error::{Result, ZeroDceError};
use crate::image_io::{batch_to_tensor, ChwImage};
use crate::validation::{is_image_file, validate_directory};
use candle_core::{Device, Tensor};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::{Path, PathBuf};

/// Low-light images listed from a single folder.
#[derive(Debug, Clone)]
pub struct LowlightDataset {
	files: Vec<PathBuf>,
	image_size: Option<u32>,
}

impl LowlightDataset {
	/// Lists the supported images directly inside `folder`, sorted by path.
	///
	/// With `image_size` every sample is resized to `image_size x image_size`; without it
	/// images keep their own size and batches must be of size 1 unless all sizes agree.
	pub fn from_folder(folder: &Path, image_size: Option<u32>) -> Result<Self> {
		validate_directory(folder)?;
		let pattern = glob::Pattern::escape(folder.to_string_lossy().as_ref()) + "/*";
		let entries = glob::glob(&pattern).map_err(|e| ZeroDceError::Parse(format!("Bad folder pattern: {}", e)))?;

		let mut files: Vec<PathBuf> = entries.filter_map(|entry| entry.ok()).filter(|p| is_image_file(p)).collect();
		files.sort();

		if files.is_empty() {
			return Err(ZeroDceError::EmptyDataset(folder.to_path_buf()));
		}
		info!("Found {} images in {}", files.len(), folder.display());
		Self::from_files(files, image_size)
	}

	pub fn from_files(files: Vec<PathBuf>, image_size: Option<u32>) -> Result<Self> {
		if let Some(first) = files.first() {
			debug!("First sample: {}", first.display());
		} else {
			return Err(ZeroDceError::EmptyDataset(PathBuf::new()));
		}
		Ok(Self { files, image_size })
	}

	pub fn len(&self) -> usize {
		self.files.len()
	}

	pub fn is_empty(&self) -> bool {
		self.files.is_empty()
	}

	pub fn files(&self) -> &[PathBuf] {
		&self.files
	}

	/// Decodes sample `index` as RGB in `[0, 1]`.
	pub fn load(&self, index: usize) -> Result<ChwImage> {
		let path = self.files.get(index).ok_or_else(|| {
			ZeroDceError::InvalidParameter(format!("Sample {} out of range ({} images)", index, self.files.len()))
		})?;
		ChwImage::open(path, self.image_size)
	}
}

/// Batches a dataset into `(B, 3, H, W)` tensors.
pub struct DataLoader {
	dataset: LowlightDataset,
	batch_size: usize,
	shuffle: bool,
	pool: Option<ThreadPool>,
	rng: StdRng,
	device: Device,
}

impl DataLoader {
	/// `num_workers == 0` decodes on the calling thread, otherwise on a dedicated pool.
	pub fn new(
		dataset: LowlightDataset,
		batch_size: usize,
		shuffle: bool,
		num_workers: usize,
		seed: Option<u64>,
		device: Device,
	) -> Result<Self> {
		if batch_size == 0 {
			return Err(ZeroDceError::InvalidParameter("Batch size must be greater than 0".into()));
		}
		let pool = if num_workers > 0 {
			Some(
				ThreadPoolBuilder::new()
					.num_threads(num_workers)
					.thread_name(|i| format!("loader-{}", i))
					.build()
					.map_err(|e| ZeroDceError::Training(format!("Could not start loader threads: {}", e)))?,
			)
		} else {
			None
		};
		let rng = match seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		};

		Ok(Self {
			dataset,
			batch_size,
			shuffle,
			pool,
			rng,
			device,
		})
	}

	pub fn dataset(&self) -> &LowlightDataset {
		&self.dataset
	}

	pub fn batch_size(&self) -> usize {
		self.batch_size
	}

	/// Batches per epoch; the last batch may be short.
	pub fn num_batches(&self) -> usize {
		(self.dataset.len() + self.batch_size - 1) / self.batch_size
	}

	/// Starts a pass over the dataset, reshuffling when enabled.
	pub fn epoch(&mut self) -> EpochIter<'_> {
		let mut order: Vec<usize> = (0..self.dataset.len()).collect();
		if self.shuffle {
			order.shuffle(&mut self.rng);
		}
		EpochIter {
			loader: &*self,
			order,
			position: 0,
		}
	}

	fn load_batch(&self, indices: &[usize]) -> Result<Tensor> {
		let dataset = &self.dataset;
		let images = match &self.pool {
			Some(pool) => pool.install(|| {
				indices
					.par_iter()
					.map(|&i| dataset.load(i))
					.collect::<Result<Vec<_>>>()
			})?,
			None => indices.iter().map(|&i| dataset.load(i)).collect::<Result<Vec<_>>>()?,
		};
		batch_to_tensor(&images, &self.device)
	}
}

pub struct EpochIter<'a> {
	loader: &'a DataLoader,
	order: Vec<usize>,
	position: usize,
}

impl<'a> EpochIter<'a> {
	/// Indices of the samples in this epoch, in visiting order.
	pub fn order(&self) -> &[usize] {
		&self.order
	}
}

impl<'a> Iterator for EpochIter<'a> {
	type Item = Result<Tensor>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.position >= self.order.len() {
			return None;
		}
		let end = (self.position + self.loader.batch_size).min(self.order.len());
		let batch = self.loader.load_batch(&self.order[self.position..end]);
		self.position = end;
		Some(batch)
	}
}
