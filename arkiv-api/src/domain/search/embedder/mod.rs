mod gemini;
mod mock;
mod splade;

pub use gemini::GeminiEmbedder;
pub use mock::{MockDenseEmbedder, MockSparseEmbedder};
pub use splade::SpladeEmbedder;
