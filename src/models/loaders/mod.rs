pub mod training_loader;

pub use training_loader::{generate_synthetic, load_or_generate, load_training_csv};
