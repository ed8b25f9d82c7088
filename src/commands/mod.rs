pub mod enhance;
pub mod evaluate;
pub mod generate_config;
pub mod train;

pub use self::enhance::enhance;
pub use self::evaluate::evaluate;
pub use self::generate_config::generate_config;
pub use self::train::train;
