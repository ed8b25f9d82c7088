use crate::config::TrainConfig;
use crate::constants::file::TRAINING_LOG;
use crate::constants::network::NUMBER_F;
use crate::device::Precision;
use crate::error::{Result, ZeroDceError};
use crate::loss::ZeroReferenceLoss;
use crate::network::{num_parameters, EnhanceNet};
use crate::training::checkpoint::{load_parameters, CheckpointManager, NetworkDescription};
use crate::training::data_loader::DataLoader;
use crate::training::evaluate::evaluate;
use crate::training::grad_scaler::GradScaler;
use crate::training::optimizer::Adam;
use crate::training::scheduler::ReduceLrOnPlateau;
use candle_core::Device;
use candle_nn::VarMap;
use chrono::{DateTime, Utc};
use serde_derive::Serialize;
use std::fs::{self, File};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Statistics of one finished epoch.
#[derive(Debug, Clone, Serialize)]
pub struct EpochRecord {
	/// 1-based.
	pub epoch: usize,
	pub average_loss: f64,
	pub learning_rate: f64,
	pub skipped_steps: usize,
	pub clipped_steps: usize,
	pub val_ssim: Option<f64>,
	pub checkpoint: Option<PathBuf>,
}

/// Run report written to `training_log.json` in the snapshots folder.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
	pub started_at: DateTime<Utc>,
	pub finished_at: DateTime<Utc>,
	pub parameters: usize,
	pub precision: String,
	pub scale_factor: usize,
	pub epochs: Vec<EpochRecord>,
	pub final_learning_rate: f64,
}

impl TrainingSummary {
	pub fn final_loss(&self) -> Option<f64> {
		self.epochs.last().map(|e| e.average_loss)
	}

	pub fn checkpoints(&self) -> Vec<PathBuf> {
		self.epochs.iter().filter_map(|e| e.checkpoint.clone()).collect()
	}
}

/// Owns the network and all optimisation state for one run.
pub struct Trainer {
	config: TrainConfig,
	varmap: VarMap,
	net: EnhanceNet,
	optimizer: Adam,
	scheduler: ReduceLrOnPlateau,
	scaler: GradScaler,
	loss: ZeroReferenceLoss,
	checkpoints: CheckpointManager,
	precision: Precision,
}

impl Trainer {
	/// Builds a fresh network on `device`, loading `pretrain_dir` when `load_pretrain` is set.
	pub fn new(config: TrainConfig, device: &Device) -> Result<Self> {
		config.validate()?;
		let (varmap, net) = EnhanceNet::build(config.scale_factor, device)?;
		if config.load_pretrain {
			info!("Loading pretrained weights from {}", config.pretrain_dir.display());
			load_parameters(&varmap, &config.pretrain_dir, config.scale_factor)?;
		}
		Self::from_parts(config, varmap, net, device)
	}

	pub fn from_parts(config: TrainConfig, varmap: VarMap, net: EnhanceNet, device: &Device) -> Result<Self> {
		config.validate()?;
		let precision = config.precision.for_device(device);
		let net = net.with_compute_dtype(precision.dtype());
		let optimizer = Adam::new(varmap.all_vars(), config.lr, config.weight_decay, config.grad_clip_norm)?;
		let checkpoints = CheckpointManager::new(&config.snapshots_folder, config.snapshot_epoch, config.quantise);

		Ok(Self {
			scheduler: ReduceLrOnPlateau::new(config.lr),
			scaler: GradScaler::new(precision.is_mixed()),
			loss: ZeroReferenceLoss::new(device)?,
			optimizer,
			checkpoints,
			precision,
			varmap,
			net,
			config,
		})
	}

	pub fn network(&self) -> &EnhanceNet {
		&self.net
	}

	pub fn varmap(&self) -> &VarMap {
		&self.varmap
	}

	pub fn learning_rate(&self) -> f64 {
		self.optimizer.learning_rate()
	}

	/// Runs `num_epochs` epochs over `loader`.
	///
	/// With a validation loader the mean SSIM is computed at every checkpoint epoch.
	pub fn train(&mut self, loader: &mut DataLoader, mut val_loader: Option<&mut DataLoader>) -> Result<TrainingSummary> {
		let started_at = Utc::now();
		let parameters = num_parameters(&self.varmap);
		info!(
			parameters,
			precision = %self.precision,
			images = loader.dataset().len(),
			"Beginning Training"
		);

		let mut epochs = Vec::with_capacity(self.config.num_epochs);
		for epoch in 0..self.config.num_epochs {
			let mut record = self.train_epoch(epoch, loader)?;

			if self.checkpoints.should_checkpoint(epoch) {
				let desc = NetworkDescription::from_varmap(&self.varmap, self.net.scale_factor(), NUMBER_F)?;
				let path = self.checkpoints.save(epoch, desc)?;
				info!("Saved checkpoint {}", path.display());
				record.checkpoint = Some(path);

				if let Some(val) = val_loader.as_mut() {
					let score = evaluate(&self.net, val)?;
					info!("Validation SSIM after epoch {}: {:.4}", epoch + 1, score);
					record.val_ssim = Some(score);
				}
			}
			epochs.push(record);
		}

		let summary = TrainingSummary {
			started_at,
			finished_at: Utc::now(),
			parameters,
			precision: self.precision.to_string(),
			scale_factor: self.net.scale_factor(),
			epochs,
			final_learning_rate: self.optimizer.learning_rate(),
		};
		self.write_summary(&summary)?;
		info!("Done");
		Ok(summary)
	}

	/// One pass over `loader`; `epoch` is 0-based.
	pub fn train_epoch(&mut self, epoch: usize, loader: &mut DataLoader) -> Result<EpochRecord> {
		let num_batches = loader.num_batches();
		let mut loss_sum = 0.0f64;
		let mut iterations = 0usize;
		let mut skipped_steps = 0usize;
		let mut clipped_steps = 0usize;

		for (iteration, batch) in loader.epoch().enumerate() {
			let batch = batch?;
			let output = self.net.forward(&batch)?;
			let terms = self.loss.compute(&output.enhanced, &batch, &output.curves)?;

			let grads = self.scaler.scale_loss(&terms.total)?.backward()?;
			let report = self.optimizer.step(grads, &self.scaler)?;
			if self.scaler.update(report.grads_finite) {
				warn!(scale = self.scaler.scale(), "Non-finite gradients, step skipped");
			}
			if report.skipped {
				skipped_steps += 1;
			}
			if report.clipped {
				clipped_steps += 1;
			}

			let loss = terms.total_value()?;
			loss_sum += f64::from(loss);
			iterations += 1;
			debug!(
				tv = terms.total_variation,
				spatial = terms.spatial,
				color = terms.color,
				exposure = terms.exposure,
				grad_norm = report.grad_norm,
				"iteration {}",
				iteration + 1
			);

			if (iteration + 1) % self.config.display_iter == 0 {
				info!(
					"Epoch [{}/{}], Iteration [{}/{}], Loss: {:.4}",
					epoch + 1,
					self.config.num_epochs,
					iteration + 1,
					num_batches,
					loss
				);
			}
		}

		if iterations == 0 {
			return Err(ZeroDceError::Training(format!("Epoch {} produced no batches", epoch + 1)));
		}
		let average_loss = loss_sum / iterations as f64;
		info!("Average Loss for Epoch {}: {:.4}", epoch + 1, average_loss);

		if let Some(lr) = self.scheduler.step(average_loss) {
			info!("Reducing learning rate to {:e}", lr);
			self.optimizer.set_learning_rate(lr);
		}

		Ok(EpochRecord {
			epoch: epoch + 1,
			average_loss,
			learning_rate: self.optimizer.learning_rate(),
			skipped_steps,
			clipped_steps,
			val_ssim: None,
			checkpoint: None,
		})
	}

	fn write_summary(&self, summary: &TrainingSummary) -> Result<()> {
		fs::create_dir_all(&self.config.snapshots_folder)?;
		let path = self.config.snapshots_folder.join(TRAINING_LOG);
		let file = File::create(&path)?;
		serde_json::to_writer_pretty(file, summary)
			.map_err(|e| ZeroDceError::Serialization(format!("{}: {}", path.display(), e)))?;
		debug!("Wrote run report to {}", path.display());
		Ok(())
	}
}
