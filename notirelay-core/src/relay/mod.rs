//! Event delivery pipeline
//!
//! Captured records are handed to an [`IngestionQueue`], which encodes each
//! one with the [`codec`] and submits it through a [`DeliveryClient`].
//!
//! ## Delivery guarantees
//!
//! - `enqueue` never waits on the network
//! - Records are submitted one at a time, in enqueue order
//! - A failed record is reported and dropped; later records are unaffected
//! - Nothing survives a restart
//!
//! ## Usage
//!
//! Point the relay at a server in `~/.config/notirelay/config.toml`:
//!
//! ```toml
//! [delivery]
//! server_url = "http://10.0.2.2:8080"
//! endpoint_path = "/api/notifications"
//! timeout_secs = 30
//! ```

mod client;
pub mod codec;
mod queue;
mod sink;

pub use client::{DeliveryClient, HttpDeliveryClient, Outcome};
pub use codec::WireRecord;
pub use queue::{IngestionQueue, QueueState, RelayStats};
pub use sink::{DeliveryReport, DeliverySink, Disposition, TracingSink};
