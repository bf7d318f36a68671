pub mod deepseek;

pub use deepseek::{build_payload, DeepSeekClient};
