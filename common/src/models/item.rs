//! Platform item models.
//!
//! Shapes returned by the platform REST API. Unknown fields are ignored and
//! missing optional fields default, so new platform properties never break us.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Something the platform lists and we look up by id or display name.
pub trait NamedItem {
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;

    /// Matches either the item id or its display name.
    fn matches(&self, id_or_name: &str) -> bool {
        self.id() == id_or_name || self.display_name() == id_or_name
    }
}

macro_rules! named_item {
    ($($ty:ty),+ $(,)?) => {
        $(impl NamedItem for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn display_name(&self) -> &str {
                &self.display_name
            }
        })+
    };
}

named_item!(FabricItem, Eventhouse, KqlDatabase, Lakehouse, Connection);

/// Reference to an item in a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    pub workspace_id: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
}

impl ItemReference {
    pub fn new(workspace_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            id: id.into(),
            display_name: None,
            item_type: None,
        }
    }

    /// A reference pointing at nothing (empty or nil id).
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() || self.id == uuid::Uuid::nil().to_string()
    }
}

/// Generic item as returned by the workspace items endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FabricItem {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
}

/// Data pipelines carry no properties beyond the generic item.
pub type DataPipeline = FabricItem;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Eventhouse {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub properties: Option<EventhouseProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventhouseProperties {
    #[serde(default)]
    pub query_service_uri: Option<String>,
    #[serde(default)]
    pub ingestion_service_uri: Option<String>,
    #[serde(default)]
    pub databases_item_ids: Vec<String>,
}

impl Eventhouse {
    pub fn query_service_uri(&self) -> Option<&str> {
        self.properties.as_ref()?.query_service_uri.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KqlDatabase {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub properties: Option<KqlDatabaseProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KqlDatabaseProperties {
    #[serde(default)]
    pub parent_eventhouse_item_id: Option<String>,
    #[serde(default)]
    pub query_service_uri: Option<String>,
    #[serde(default)]
    pub ingestion_service_uri: Option<String>,
    #[serde(default)]
    pub database_type: Option<String>,
}

impl KqlDatabase {
    pub fn query_service_uri(&self) -> Option<&str> {
        self.properties.as_ref()?.query_service_uri.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lakehouse {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub properties: Option<LakehouseProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LakehouseProperties {
    #[serde(default)]
    pub one_lake_tables_path: Option<String>,
    #[serde(default)]
    pub one_lake_files_path: Option<String>,
    #[serde(default)]
    pub sql_endpoint_properties: Option<SqlEndpointProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SqlEndpointProperties {
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub provisioning_status: Option<String>,
}

/// A data connection (e.g. to an external REST API).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub gateway_id: Option<String>,
    #[serde(default)]
    pub connectivity_type: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub connection_details: Option<ConnectionDetails>,
    #[serde(default)]
    pub privacy_level: Option<String>,
    #[serde(default)]
    pub credential_details: Option<CredentialDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    #[serde(default, rename = "type")]
    pub connection_type: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDetails {
    #[serde(default)]
    pub credential_type: Option<String>,
    #[serde(default)]
    pub single_sign_on_type: Option<String>,
    #[serde(default)]
    pub connection_encryption: Option<String>,
    #[serde(default)]
    pub skip_test_connection: bool,
}

/// One page of a list call. Follow `continuation_uri` until it is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default)]
    pub continuation_token: Option<String>,
    #[serde(default)]
    pub continuation_uri: Option<String>,
}

impl<T> Page<T> {
    /// URI of the next page, if there is one.
    pub fn next_uri(&self) -> Option<&str> {
        self.continuation_uri.as_deref().filter(|uri| !uri.is_empty())
    }
}

/// `POST .../eventhouses` and `POST .../lakehouses` body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNamedItemRequest {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `POST .../kqlDatabases` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKqlDatabaseRequest {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub creation_payload: KqlDatabaseCreationPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KqlDatabaseCreationPayload {
    pub database_type: String,
    pub parent_eventhouse_item_id: String,
}

impl CreateKqlDatabaseRequest {
    /// A read-write database under the given eventhouse.
    pub fn read_write(
        display_name: impl Into<String>,
        description: Option<String>,
        parent_eventhouse_item_id: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            description,
            creation_payload: KqlDatabaseCreationPayload {
                database_type: "ReadWrite".to_string(),
                parent_eventhouse_item_id: parent_eventhouse_item_id.into(),
            },
        }
    }
}

/// `POST /workspaces/{ws}/items` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub display_name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<ItemDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub parts: Vec<DefinitionPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionPart {
    pub path: String,
    pub payload: String,
    pub payload_type: String,
}

impl DefinitionPart {
    /// A part whose payload is already base64 encoded.
    pub fn inline_base64(path: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            payload: payload.into(),
            payload_type: "InlineBase64".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eventhouse_deserializes_platform_shape() {
        let eventhouse: Eventhouse = serde_json::from_value(json!({
            "id": "eh-1",
            "displayName": "Investments",
            "type": "Eventhouse",
            "workspaceId": "ws-1",
            "properties": {
                "queryServiceUri": "https://trd-abc.z0.kusto.fabric.microsoft.com",
                "databasesItemIds": ["db-1"]
            }
        }))
        .unwrap();

        assert_eq!(
            eventhouse.query_service_uri(),
            Some("https://trd-abc.z0.kusto.fabric.microsoft.com")
        );
        assert!(eventhouse.matches("Investments"));
        assert!(eventhouse.matches("eh-1"));
        assert!(!eventhouse.matches("Other"));
    }

    #[test]
    fn test_page_without_continuation_is_last() {
        let page: Page<FabricItem> = serde_json::from_value(json!({
            "value": [],
            "continuationUri": ""
        }))
        .unwrap();
        assert!(page.next_uri().is_none());
    }

    #[test]
    fn test_kql_database_create_payload_shape() {
        let request = CreateKqlDatabaseRequest::read_write("Investments", None, "eh-1");
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "displayName": "Investments",
                "creationPayload": {
                    "databaseType": "ReadWrite",
                    "parentEventhouseItemId": "eh-1"
                }
            })
        );
    }

    #[test]
    fn test_nil_item_reference_is_empty() {
        assert!(ItemReference::new("ws", "00000000-0000-0000-0000-000000000000").is_empty());
        assert!(!ItemReference::new("ws", "lh-1").is_empty());
    }
}
