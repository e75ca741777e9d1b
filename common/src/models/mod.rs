//! Shared data models.

pub mod item;
pub mod metadata;
pub mod operation;
pub mod query;
pub mod request;

pub use item::{
    Connection, CreateItemRequest, CreateKqlDatabaseRequest, CreateNamedItemRequest, DataPipeline,
    DefinitionPart, Eventhouse, FabricItem, ItemDefinition, ItemReference, KqlDatabase, Lakehouse,
    NamedItem, Page,
};
pub use metadata::{
    ItemKind, ItemMetadata, ItemPayloadIn, ItemPayloadOut, JobInstanceState, JobInstanceStatus,
    JobType,
};
pub use operation::{OperationState, OperationStatus};
pub use query::{ColumnInfo, QueryResult};
pub use request::{ApiKeyRequest, ItemCreateRequest, QueryParams};
