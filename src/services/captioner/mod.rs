pub mod capability;
pub mod dispatcher;
#[cfg(test)]
pub mod mock;
pub mod ollama;
pub mod preprocess;
