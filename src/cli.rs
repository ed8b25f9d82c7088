use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

pub fn build_cli() -> ArgMatches<'static> {
	build_app().get_matches()
}

/// Training flags live on the top level, so running without a subcommand trains.
pub fn build_app() -> App<'static, 'static> {
	App::new("zerodce")
		.version("v0.1.0")
		.about("Zero-reference deep curve estimation for low-light image enhancement")
		.settings(&[AppSettings::SubcommandsNegateReqs, AppSettings::VersionlessSubcommands])
		.arg(build_log_level_arg())
		.arg(build_log_format_arg())
		.arg(build_log_file_arg())
		.arg(build_config_arg())
		.arg(
			Arg::with_name("LOWLIGHT_IMAGES_PATH")
				.long("lowlight_images_path")
				.value_name("FOLDER")
				.help("Folder of low-light training images. Default: data/train_data/")
				.empty_values(false),
		)
		.arg(build_val_images_path_arg())
		.arg(
			Arg::with_name("LR")
				.long("lr")
				.value_name("RATE")
				.help("Initial Adam learning rate. Default: 0.0001")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("WEIGHT_DECAY")
				.long("weight_decay")
				.help("L2 penalty added to the gradients. Default: 0.0001")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("GRAD_CLIP_NORM")
				.long("grad_clip_norm")
				.help("Clip gradients to this global norm. Default: no clipping")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("NUM_EPOCHS")
				.long("num_epochs")
				.help("Number of passes over the training set. Default: 100")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("TRAIN_BATCH_SIZE")
				.long("train_batch_size")
				.help("Images per training step. Default: 8")
				.empty_values(false),
		)
		.arg(build_val_batch_size_arg())
		.arg(build_num_workers_arg())
		.arg(
			Arg::with_name("DISPLAY_ITER")
				.long("display_iter")
				.help("Log the batch loss every N iterations. Default: 10")
				.empty_values(false),
		)
		.arg(build_scale_factor_arg())
		.arg(build_image_size_arg())
		.arg(
			Arg::with_name("SNAPSHOTS_FOLDER")
				.long("snapshots_folder")
				.value_name("FOLDER")
				.help("Checkpoints and the run report are written here. Default: snapshots_Zero_DCE++/")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("LOAD_PRETRAIN")
				.long("load_pretrain")
				.value_name("BOOL")
				.help("Start from the weights in --pretrain_dir (true/false). Default: false")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("PRETRAIN_DIR")
				.long("pretrain_dir")
				.value_name("FILE")
				.help("Checkpoint or PyTorch state_dict to start from. Default: snapshots_Zero_DCE++/Epoch99.pth")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("SNAPSHOT_EPOCH")
				.long("snapshot_epoch")
				.help("Save a checkpoint every N epochs. Default: 10")
				.empty_values(false),
		)
		.arg(build_precision_arg())
		.arg(build_device_arg())
		.arg(
			Arg::with_name("SEED")
				.long("seed")
				.help("Seed for the shuffle order")
				.empty_values(false),
		)
		.arg(
			Arg::with_name("QUANTISE")
				.short("q")
				.long("quantise")
				.help("Zero the low 12 mantissa bits of saved parameters for smaller checkpoints"),
		)
		.subcommand(build_evaluate_subcommand())
		.subcommand(build_enhance_subcommand())
		.subcommand(build_generate_config_subcommand())
}

fn build_log_level_arg() -> Arg<'static, 'static> {
	Arg::with_name("LOG_LEVEL")
		.long("log_level")
		.value_name("LEVEL")
		.possible_values(&["trace", "debug", "info", "warn", "error"])
		.help("Log verbosity, RUST_LOG takes precedence. Default: info")
		.global(true)
}

fn build_log_format_arg() -> Arg<'static, 'static> {
	Arg::with_name("LOG_FORMAT")
		.long("log_format")
		.value_name("FORMAT")
		.possible_values(&["compact", "pretty", "json"])
		.help("Console log format. Default: compact")
		.global(true)
}

fn build_log_file_arg() -> Arg<'static, 'static> {
	Arg::with_name("LOG_FILE")
		.long("log_file")
		.value_name("FOLDER")
		.help("Also write JSON logs to a daily rotated file in this folder")
		.global(true)
}

fn build_config_arg() -> Arg<'static, 'static> {
	Arg::with_name("CONFIG")
		.short("c")
		.long("config")
		.value_name("CONFIG_FILE")
		.help("TOML or JSON training configuration; command line flags override it")
		.empty_values(false)
}

fn build_val_images_path_arg() -> Arg<'static, 'static> {
	Arg::with_name("VAL_IMAGES_PATH")
		.long("val_images_path")
		.value_name("FOLDER")
		.help("Validation images, scored with SSIM at every snapshot")
		.empty_values(false)
}

fn build_val_batch_size_arg() -> Arg<'static, 'static> {
	Arg::with_name("VAL_BATCH_SIZE")
		.long("val_batch_size")
		.help("Images per evaluation batch. Default: 8")
		.empty_values(false)
}

fn build_num_workers_arg() -> Arg<'static, 'static> {
	Arg::with_name("NUM_WORKERS")
		.long("num_workers")
		.help("Image decoding threads, 0 decodes on the main thread. Default: 4")
		.empty_values(false)
}

fn build_scale_factor_arg() -> Arg<'static, 'static> {
	Arg::with_name("SCALE_FACTOR")
		.long("scale_factor")
		.help("Estimate curves on images downsampled by this integer factor. Default: 1")
		.empty_values(false)
}

fn build_image_size_arg() -> Arg<'static, 'static> {
	Arg::with_name("IMAGE_SIZE")
		.long("image_size")
		.help("Images are resized to this square size. Default: 512")
		.empty_values(false)
}

fn build_precision_arg() -> Arg<'static, 'static> {
	Arg::with_name("PRECISION")
		.long("precision")
		.possible_values(&["f32", "f16", "bf16", "mixed"])
		.help("Convolution precision, half precision needs a GPU. Default: f32")
}

fn build_device_arg() -> Arg<'static, 'static> {
	Arg::with_name("DEVICE")
		.long("device")
		.possible_values(&["auto", "cpu", "cuda", "gpu"])
		.help("Compute device. Default: auto")
}

fn build_checkpoint_arg() -> Arg<'static, 'static> {
	Arg::with_name("CHECKPOINT")
		.required(true)
		.index(1)
		.help("Checkpoint (.pth) written by training, or a PyTorch state_dict")
}

fn build_evaluate_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("evaluate")
		.about("Mean SSIM between enhanced and input images of a folder")
		.arg(build_checkpoint_arg())
		.arg(
			Arg::with_name("IMAGES_FOLDER")
				.required(true)
				.index(2)
				.help("Folder of images to evaluate"),
		)
		.arg(build_scale_factor_arg())
		.arg(build_image_size_arg())
		.arg(build_val_batch_size_arg())
		.arg(build_num_workers_arg())
		.arg(build_precision_arg())
		.arg(build_device_arg())
}

fn build_enhance_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("enhance")
		.about("Enhance an image, or every image in a folder, with a trained checkpoint")
		.arg(build_checkpoint_arg())
		.arg(
			Arg::with_name("INPUT")
				.required(true)
				.index(2)
				.help("Image file or folder of images"),
		)
		.arg(
			Arg::with_name("OUTPUT")
				.required(true)
				.index(3)
				.help("Output file (.png recommended), or folder when INPUT is a folder"),
		)
		.arg(build_scale_factor_arg())
		.arg(build_precision_arg())
		.arg(build_device_arg())
}

fn build_generate_config_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("generate-config")
		.about("Write a training configuration file with the default values")
		.arg(
			Arg::with_name("OUTPUT_FILE")
				.index(1)
				.help("Configuration file to write. Default: training_config.toml"),
		)
		.arg(
			Arg::with_name("FORMAT")
				.short("f")
				.long("format")
				.possible_values(&["toml", "json"])
				.help("Output format. Default: toml"),
		)
		.arg(
			Arg::with_name("EXAMPLE")
				.short("e")
				.long("example")
				.help("Write a commented example (TOML only)"),
		)
		.arg(
			Arg::with_name("FORCE")
				.long("force")
				.help("Overwrite an existing file"),
		)
}
