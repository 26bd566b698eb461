use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use fleet_core::{
    models::{DiscoveredItem, ItemCategory, ItemStoreStats},
    traits::ItemStore,
    SchedulerResult,
};

/// 关键词分类表，按顺序匹配，首个命中的分类生效
const CATEGORY_KEYWORDS: &[(ItemCategory, &[&str])] = &[
    (
        ItemCategory::Engineering,
        &[
            "software", "engineer", "developer", "programming", "backend", "frontend",
            "full stack", "fullstack", "devops", "rust", "java", "python", "javascript",
            "typescript", "golang", "kubernetes",
        ],
    ),
    (
        ItemCategory::Data,
        &[
            "data scientist", "data analyst", "data engineer", "machine learning",
            "analytics", "statistics", "sql", "deep learning",
        ],
    ),
    (
        ItemCategory::Design,
        &["designer", "design", "ux", "ui/ux", "figma", "illustrator"],
    ),
    (
        ItemCategory::Product,
        &["product manager", "product owner", "roadmap", "product management"],
    ),
    (
        ItemCategory::Marketing,
        &["marketing", "seo", "content strategy", "social media", "brand"],
    ),
    (
        ItemCategory::Sales,
        &["sales", "account executive", "business development", "quota"],
    ),
    (
        ItemCategory::Support,
        &["customer support", "customer service", "help desk", "helpdesk", "support specialist"],
    ),
];

/// 按关键词表对条目归类
pub fn categorize(item: &DiscoveredItem) -> ItemCategory {
    let text = item.classification_text();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(ItemCategory::Other)
}

/// 内存条目库
pub struct InMemoryItemStore {
    items: RwLock<HashMap<String, DiscoveredItem>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted(mut items: Vec<DiscoveredItem>) -> Vec<DiscoveredItem> {
    items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    items
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn upsert(&self, mut item: DiscoveredItem) -> SchedulerResult<DiscoveredItem> {
        item.category = categorize(&item);

        let mut items = self.items.write().await;
        if let Some(existing) = items.get(&item.id) {
            item.discovered_at = existing.discovered_at;
        }
        debug!(item_id = %item.id, category = %item.category, "写入条目");
        items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    async fn merge(&self, item: DiscoveredItem) -> SchedulerResult<DiscoveredItem> {
        let mut items = self.items.write().await;
        let mut merged = match items.remove(&item.id) {
            Some(mut existing) => {
                existing.merge_detail(item);
                existing
            }
            None => item,
        };
        merged.category = categorize(&merged);
        debug!(item_id = %merged.id, category = %merged.category, "合并条目详情");
        items.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }

    async fn get(&self, id: &str) -> SchedulerResult<Option<DiscoveredItem>> {
        Ok(self.items.read().await.get(id).cloned())
    }

    async fn all(&self) -> SchedulerResult<Vec<DiscoveredItem>> {
        let items = self.items.read().await;
        Ok(sorted(items.values().cloned().collect()))
    }

    async fn by_category(&self, category: ItemCategory) -> SchedulerResult<Vec<DiscoveredItem>> {
        let items = self.items.read().await;
        Ok(sorted(
            items
                .values()
                .filter(|i| i.category == category)
                .cloned()
                .collect(),
        ))
    }

    async fn search(&self, query: &str) -> SchedulerResult<Vec<DiscoveredItem>> {
        let query = query.trim();
        let items = self.items.read().await;
        Ok(sorted(
            items
                .values()
                .filter(|i| query.is_empty() || i.matches_query(query))
                .cloned()
                .collect(),
        ))
    }

    async fn stats(&self) -> SchedulerResult<ItemStoreStats> {
        let items = self.items.read().await;
        let mut stats = ItemStoreStats {
            total: items.len(),
            ..Default::default()
        };
        for item in items.values() {
            *stats.by_category.entry(item.category).or_default() += 1;
            *stats.by_source.entry(item.source.clone()).or_default() += 1;
        }
        Ok(stats)
    }

    async fn clear(&self) -> SchedulerResult<usize> {
        let mut items = self.items.write().await;
        let count = items.len();
        items.clear();
        info!(count, "清空条目库");
        Ok(count)
    }
}
