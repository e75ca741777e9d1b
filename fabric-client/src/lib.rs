//! Client for the platform REST API and the services around it.
//!
//! All calls go through a [`PlatformTransport`]; the item clients add
//! pagination and long running operation handling on top.

pub mod artifacts;
pub mod connection;
pub mod eventhouse;
pub mod http;
pub mod kusto;
pub mod lakehouse;
pub mod lro;
pub mod onelake;
pub mod pagination;
pub mod pipeline;
pub mod polygon;
pub mod token;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use artifacts::{ArtifactSource, DirArtifacts, MemoryArtifacts};
pub use connection::ConnectionClient;
pub use eventhouse::EventhouseClient;
pub use http::{FabricApi, FabricHttp};
pub use kusto::KustoClient;
pub use lakehouse::LakehouseClient;
pub use lro::LroPoller;
pub use onelake::{lakehouse_file_path, OneLakeClient};
pub use pipeline::DataPipelineClient;
pub use polygon::PolygonClient;
pub use token::{HostTokenExchanger, PassthroughTokenExchanger, TokenExchanger};
pub use transport::{PlatformRequest, PlatformResponse, PlatformTransport, ReqwestTransport, RequestBody};
