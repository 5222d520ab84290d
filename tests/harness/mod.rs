//! Integration Test Harness
//!
//! - `TestServer` - Spawns the real loopchain binary on a random port with
//!   its own input directory
//! - `write_png` - Fixture images for the file and folder loaders
//!
//! # Example
//!
//! ```rust,ignore
//! use harness::TestServer;
//!
//! #[tokio::test]
//! async fn test_unknown_key() {
//!     let server = TestServer::start().await.unwrap();
//!     assert_eq!(server.length("image", "nope", 1).await.unwrap(), -1);
//! }
//! ```

mod server;

pub use server::{write_png, TestServer};
