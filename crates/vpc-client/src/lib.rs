//! VPC API Client
//!
//! A Rust client for the cloud VPC (v2) and CVM (v3) APIs used to manage
//! secondary private IP addresses on instance network interfaces.
//! Every request is signed with HmacSHA1 using the account's secret key.
//!
//! # Example
//!
//! ```no_run
//! use vpc_client::{ClientOptions, VpcClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VpcClient::new(ClientOptions {
//!     secret_id: "AKID...".to_string(),
//!     secret_key: "secret".to_string(),
//!     region: "ap-guangzhou".to_string(),
//!     vpc_id: "vpc-abc123".to_string(),
//!     vpc_endpoint: "vpc.api.qcloud.com/v2/index.php".to_string(),
//!     cvm_endpoint: "cvm.tencentcloudapi.com/".to_string(),
//!     ..Default::default()
//! })?;
//!
//! // Resolve the instance running on a node and list its interfaces
//! let instance_id = client.get_instance_id("10.0.0.5".parse()?).await?;
//! let interfaces = client.get_instance_interfaces(&instance_id).await?;
//!
//! // Ask for one more secondary address on the first interface
//! client.assign_private_ip(&interfaces[0].network_interface_id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Interface queries**: describe interfaces by id, instance or bound IP
//! - **Secondary IP actions**: assign, unassign and migrate (single attempt each)
//! - **Mocking**: `VpcClientTrait` plus `MockVpcClient` behind the `test-util` feature

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod vpc_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{ClientOptions, VpcClient};
pub use common::{ApiSurface, Credentials, HttpClient};
pub use error::VpcError;
pub use models::*;
pub use vpc_trait::VpcClientTrait;
#[cfg(feature = "test-util")]
pub use mock::{MockFailure, MockOperation, MockVpcClient};
