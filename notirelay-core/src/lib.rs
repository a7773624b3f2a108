//! # notirelay-core
//!
//! Core library for notirelay - a device notification relay.
//!
//! This library provides:
//! - The captured event record and its construction from raw notifications
//! - The JSON wire format used by the collection endpoint
//! - An HTTP delivery client and the ingestion queue that feeds it
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! ```text
//! RawEvent → CaptureListener → IngestionQueue → codec → DeliveryClient → server
//!                                     └──────────── DeliverySink (logs)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use notirelay_core::relay::{HttpDeliveryClient, IngestionQueue};
//! use notirelay_core::{CaptureListener, Config, RecordBuilder};
//!
//! # async fn run() -> notirelay_core::Result<()> {
//! let config = Config::load()?;
//! let client = HttpDeliveryClient::new(&config.delivery)?;
//! let queue = IngestionQueue::with_tracing(Arc::new(client));
//! let builder = RecordBuilder::new(config.device_id()?)?;
//! let listener = CaptureListener::new(builder, queue, config.capture.listening);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use capture::{CaptureListener, RawEvent, RecordBuilder};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod capture;
pub mod config;
pub mod error;
pub mod logging;
pub mod relay;
pub mod types;
