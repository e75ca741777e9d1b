//! 工作负载条目元数据
//!
//! 宿主通过条目生命周期接口创建、更新和读取条目。元数据保存在进程内存中。

use std::collections::HashMap;

use common::errors::{AppError, AppResult};
use common::models::{
    ItemKind, ItemMetadata, ItemPayloadIn, ItemPayloadOut, JobInstanceState, JobInstanceStatus,
    JobType, Lakehouse,
};
use fabric_client::{lakehouse_file_path, LakehouseClient, OneLakeClient};
use tokio::sync::RwLock;
use tracing::{error, info};

use super::Session;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ItemKey {
    workspace_id: String,
    item_id: String,
}

impl ItemKey {
    fn new(workspace_id: &str, item_id: &str) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            item_id: item_id.to_string(),
        }
    }
}

/// 内存中的条目元数据存储
#[derive(Debug, Default)]
pub struct ItemMetadataStore {
    items: RwLock<HashMap<ItemKey, ItemMetadata>>,
}

impl ItemMetadataStore {
    pub async fn upsert(&self, workspace_id: &str, item_id: &str, metadata: ItemMetadata) {
        self.items
            .write()
            .await
            .insert(ItemKey::new(workspace_id, item_id), metadata);
    }

    pub async fn get(&self, workspace_id: &str, item_id: &str) -> Option<ItemMetadata> {
        self.items
            .read()
            .await
            .get(&ItemKey::new(workspace_id, item_id))
            .cloned()
    }
}

pub struct ItemService<'a> {
    session: &'a Session<'a>,
}

impl<'a> ItemService<'a> {
    pub fn new(session: &'a Session<'a>) -> Self {
        Self { session }
    }

    fn workload_name(&self) -> &str {
        &self.session.state.workload.workload_name
    }

    fn store(&self) -> &ItemMetadataStore {
        &self.session.state.items
    }

    fn kind_of(&self, item_type: &str) -> AppResult<ItemKind> {
        ItemKind::parse(self.workload_name(), item_type)
            .ok_or_else(|| AppError::Unsupported(format!("item type {item_type}")))
    }

    /// 已保存且类型一致的条目元数据
    async fn load(&self, workspace_id: &str, item_type: &str, item_id: &str) -> AppResult<ItemMetadata> {
        let kind = self.kind_of(item_type)?;
        self.store()
            .get(workspace_id, item_id)
            .await
            .filter(|metadata| metadata.kind() == kind)
            .ok_or_else(|| AppError::NotFound(format!("item {item_id}")))
    }

    /// 创建条目；未携带负载时使用默认元数据
    pub async fn create(
        &self,
        workspace_id: &str,
        item_type: &str,
        item_id: &str,
        payload: Option<ItemPayloadIn>,
    ) -> AppResult<()> {
        let kind = self.kind_of(item_type)?;
        let metadata = match payload {
            Some(payload) => ItemMetadata::from_payload(kind, item_type, item_id, &payload)?,
            None => {
                info!(item_type, item_id, "创建条目时未提供负载，使用默认元数据");
                ItemMetadata::default_for(kind)
            }
        };
        self.store().upsert(workspace_id, item_id, metadata).await;
        info!(workspace_id, item_type, item_id, "条目已创建");
        Ok(())
    }

    /// 更新条目；未携带负载时保持原样
    pub async fn update(
        &self,
        workspace_id: &str,
        item_type: &str,
        item_id: &str,
        payload: Option<ItemPayloadIn>,
    ) -> AppResult<()> {
        let existing = self.load(workspace_id, item_type, item_id).await?;
        let Some(payload) = payload else {
            info!(item_type, item_id, "更新条目时未提供负载，保持不变");
            return Ok(());
        };
        let metadata = ItemMetadata::from_payload(existing.kind(), item_type, item_id, &payload)?;
        self.store().upsert(workspace_id, item_id, metadata).await;
        info!(workspace_id, item_type, item_id, "条目已更新");
        Ok(())
    }

    /// 返回给前端的元数据，Lakehouse 引用解析为完整对象
    pub async fn payload(&self, workspace_id: &str, item_type: &str, item_id: &str) -> AppResult<ItemPayloadOut> {
        let metadata = self.load(workspace_id, item_type, item_id).await?;
        let lakehouse = self.resolve_lakehouse(&metadata).await;
        Ok(metadata.to_client(lakehouse))
    }

    /// 引用为空或查询失败时返回 `None`，失败只记录日志
    async fn resolve_lakehouse(&self, metadata: &ItemMetadata) -> Option<Lakehouse> {
        let reference = metadata.lakehouse();
        if reference.is_empty() {
            return None;
        }
        let lookup = async {
            let token = self.session.fabric_token().await?;
            LakehouseClient::new(self.session.api.clone())
                .get_lakehouse_by_id(&token, &reference.workspace_id, &reference.id)
                .await
        };
        match lookup.await {
            Ok(lakehouse) => Some(lakehouse),
            Err(e) => {
                error!(
                    lakehouse_id = %reference.id,
                    workspace_id = %reference.workspace_id,
                    error = %e,
                    "获取 Lakehouse 失败"
                );
                None
            }
        }
    }

    /// 任务结果文件已写入 Lakehouse 即视为完成
    pub async fn job_state(
        &self,
        workspace_id: &str,
        item_type: &str,
        item_id: &str,
        job_type: &str,
        job_instance_id: &str,
    ) -> AppResult<JobInstanceState> {
        let metadata = self.load(workspace_id, item_type, item_id).await?;
        let job = JobType::parse(self.workload_name(), job_type)
            .ok_or_else(|| AppError::Unsupported("Workload job type is not supported".to_string()))?;

        let lakehouse = metadata.lakehouse();
        let path = lakehouse_file_path(
            &lakehouse.workspace_id,
            &lakehouse.id,
            &job.result_file_name(job_instance_id),
        );
        let token = self.session.onelake_token().await?;
        let done = OneLakeClient::new(self.session.api.clone())
            .file_exists(&token, &path)
            .await?;

        Ok(JobInstanceState::new(if done {
            JobInstanceStatus::Completed
        } else {
            JobInstanceStatus::InProgress
        }))
    }
}
