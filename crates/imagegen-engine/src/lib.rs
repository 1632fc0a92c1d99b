//! Network side of the pipeline: configuration, the generation client and
//! image downloads.

pub mod client;
pub mod config;
pub mod download;

#[cfg(test)]
mod test_support;

pub use client::{GenerationClient, CANCELLED_MESSAGE, NO_IMAGE_URL_MESSAGE, TIMEOUT_MESSAGE};
pub use config::GeneratorConfig;
pub use download::{DownloadedImage, ImageDownloader};
