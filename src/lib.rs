//! Device-side implementation of the IDE debug link: a binary framing
//! protocol carried over a USB CDC character device, used by a host IDE to
//! attach to a running device, upload and execute scripts, stream a preview
//! framebuffer, upload files with SHA-256 verification, and retrieve a
//! script's standard output.
//!
//! # Example
//!
//! ```rust,no_run
//! use ide_dbg::{DebugLink, LinkConfig, IoLoop};
//! use std::sync::Arc;
//!
//! let config = LinkConfig::new("/dev/ttyUSB0").with_upload_root("/sdcard");
//! let link = Arc::new(DebugLink::new(config));
//! let mut io_loop = IoLoop::new(link.clone());
//! // `io_loop.step(...)` is called in a loop by the embedding firmware's
//! // own worker thread, passing in the transport and hardware collaborators.
//! ```

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod file_upload;
pub mod frame;
pub mod framebuffer;
pub mod interrupt;
pub mod ioloop;
pub mod link;
pub mod ring;
pub mod script;
pub mod transport;


pub use command::Command;
pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use frame::{FrameHeader, FrameParser};
pub use ioloop::IoLoop;
pub use link::DebugLink;
