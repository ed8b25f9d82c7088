pub mod checkpoint;
pub mod data_loader;
pub mod evaluate;
pub mod grad_scaler;
pub mod optimizer;
pub mod scheduler;
pub mod trainer;

pub use self::checkpoint::{load_parameters, CheckpointManager, NetworkDescription};
pub use self::data_loader::{DataLoader, LowlightDataset};
pub use self::evaluate::evaluate;
pub use self::grad_scaler::GradScaler;
pub use self::optimizer::Adam;
pub use self::scheduler::ReduceLrOnPlateau;
pub use self::trainer::{EpochRecord, Trainer, TrainingSummary};
