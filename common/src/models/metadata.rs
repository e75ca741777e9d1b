//! Workload item metadata.
//!
//! The host creates, updates and reads workload items through the item
//! lifecycle endpoints. Each item type keeps its own metadata shape; the
//! shapes are unified in [`ItemMetadata`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult, ErrorDetail, MISSING_LAKEHOUSE_REFERENCE};
use crate::models::item::{ItemReference, Lakehouse};

/// Item types this workload implements, relative to the workload name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ItemKind {
    SampleWorkloadItem,
    InvestmentInsights,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SampleWorkloadItem => "SampleWorkloadItem",
            Self::InvestmentInsights => "InvestmentInsights",
        }
    }

    /// Resolves a fully qualified item type such as `Org.WorkloadSample.InvestmentInsights`.
    pub fn parse(workload_name: &str, item_type: &str) -> Option<Self> {
        let local = item_type.strip_prefix(workload_name)?.strip_prefix('.')?;
        [Self::SampleWorkloadItem, Self::InvestmentInsights]
            .into_iter()
            .find(|kind| kind.as_str() == local)
    }
}

/// Stored metadata of an Investment Insights item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentInsightsMetadata {
    pub lakehouse: ItemReference,
}

/// Stored metadata of the sample calculator item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SampleItemMetadata {
    pub lakehouse: ItemReference,
    #[serde(default)]
    pub operand1: i64,
    #[serde(default)]
    pub operand2: i64,
    #[serde(default)]
    pub operator: String,
}

/// Metadata of any workload item, tagged by item kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ItemMetadata {
    SampleWorkloadItem(SampleItemMetadata),
    InvestmentInsights(InvestmentInsightsMetadata),
}

impl ItemMetadata {
    /// Metadata of an item created without a payload.
    pub fn default_for(kind: ItemKind) -> Self {
        match kind {
            ItemKind::SampleWorkloadItem => Self::SampleWorkloadItem(SampleItemMetadata::default()),
            ItemKind::InvestmentInsights => {
                Self::InvestmentInsights(InvestmentInsightsMetadata::default())
            }
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::SampleWorkloadItem(_) => ItemKind::SampleWorkloadItem,
            Self::InvestmentInsights(_) => ItemKind::InvestmentInsights,
        }
    }

    pub fn lakehouse(&self) -> &ItemReference {
        match self {
            Self::SampleWorkloadItem(m) => &m.lakehouse,
            Self::InvestmentInsights(m) => &m.lakehouse,
        }
    }

    /// Validates a create/update payload for an item of `kind`.
    ///
    /// The payload must carry the section for its own kind, and that section
    /// must reference a lakehouse.
    pub fn from_payload(
        kind: ItemKind,
        item_type: &str,
        item_id: &str,
        payload: &ItemPayloadIn,
    ) -> AppResult<Self> {
        let missing_lakehouse = || {
            AppError::invalid_item_payload(
                item_type,
                item_id,
                Some(ErrorDetail::new(
                    MISSING_LAKEHOUSE_REFERENCE,
                    "Missing Lakehouse reference",
                )),
            )
        };

        match kind {
            ItemKind::InvestmentInsights => {
                let section = payload
                    .investment_insights_metadata
                    .as_ref()
                    .ok_or_else(|| AppError::invalid_item_payload(item_type, item_id, None))?;
                let lakehouse = section.lakehouse.clone().ok_or_else(missing_lakehouse)?;
                Ok(Self::InvestmentInsights(InvestmentInsightsMetadata { lakehouse }))
            }
            ItemKind::SampleWorkloadItem => {
                let section = payload
                    .item1_metadata
                    .as_ref()
                    .ok_or_else(|| AppError::invalid_item_payload(item_type, item_id, None))?;
                let lakehouse = section.lakehouse.clone().ok_or_else(missing_lakehouse)?;
                Ok(Self::SampleWorkloadItem(SampleItemMetadata {
                    lakehouse,
                    operand1: section.operand1,
                    operand2: section.operand2,
                    operator: section.operator.clone(),
                }))
            }
        }
    }

    /// Metadata as returned to the frontend, with the lakehouse resolved.
    pub fn to_client(&self, lakehouse: Option<Lakehouse>) -> ItemPayloadOut {
        match self {
            Self::InvestmentInsights(_) => ItemPayloadOut {
                investment_insights_metadata: Some(InvestmentInsightsClientMetadata { lakehouse }),
                item1_metadata: None,
            },
            Self::SampleWorkloadItem(m) => ItemPayloadOut {
                item1_metadata: Some(SampleItemClientMetadata {
                    lakehouse,
                    operand1: m.operand1,
                    operand2: m.operand2,
                    operator: m.operator.clone(),
                }),
                investment_insights_metadata: None,
            },
        }
    }
}

/// Item create/update payload sent by the host. One section per item type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayloadIn {
    #[serde(default)]
    pub item1_metadata: Option<SampleItemPayload>,
    #[serde(default)]
    pub investment_insights_metadata: Option<InvestmentInsightsPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentInsightsPayload {
    #[serde(default)]
    pub lakehouse: Option<ItemReference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SampleItemPayload {
    #[serde(default)]
    pub lakehouse: Option<ItemReference>,
    #[serde(default)]
    pub operand1: i64,
    #[serde(default)]
    pub operand2: i64,
    #[serde(default)]
    pub operator: String,
}

/// Item metadata as returned to the frontend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayloadOut {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item1_metadata: Option<SampleItemClientMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_insights_metadata: Option<InvestmentInsightsClientMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentInsightsClientMetadata {
    /// `null` when the lakehouse could not be resolved.
    pub lakehouse: Option<Lakehouse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SampleItemClientMetadata {
    pub lakehouse: Option<Lakehouse>,
    pub operand1: i64,
    pub operand2: i64,
    pub operator: String,
}

/// Jobs the sample item can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    ScheduledJob,
    CalculateAsText,
    CalculateAsParquet,
}

impl JobType {
    /// Parses `{workload}.SampleWorkloadItem.{job}`.
    pub fn parse(workload_name: &str, job_type: &str) -> Option<Self> {
        let prefix = format!("{workload_name}.{}.", ItemKind::SampleWorkloadItem.as_str());
        match job_type.strip_prefix(&prefix)? {
            "ScheduledJob" => Some(Self::ScheduledJob),
            "CalculateAsText" => Some(Self::CalculateAsText),
            "CalculateAsParquet" => Some(Self::CalculateAsParquet),
            _ => None,
        }
    }

    /// Name of the file the job writes to the lakehouse `Files` folder.
    pub fn result_file_name(self, job_instance_id: &str) -> String {
        match self {
            Self::ScheduledJob | Self::CalculateAsText => {
                format!("CalculationResult_{job_instance_id}.txt")
            }
            Self::CalculateAsParquet => format!("CalculationResult_{job_instance_id}.parquet"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum JobInstanceStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// Answer of the job state endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobInstanceState {
    pub status: JobInstanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetail>,
}

impl JobInstanceState {
    pub fn new(status: JobInstanceStatus) -> Self {
        Self {
            status,
            error_details: None,
        }
    }
}
