//! Picks the next unpublished video for a channel, rotating through subfolders.
//!
//! Subfolders are probed cyclically starting at the stored cursor, so each
//! folder is drained before the next one gets a turn. The cursor only moves
//! when a probe finds work in a folder other than the stored one.

use crate::drive::FolderLister;
use crate::models::{Channel, Item, PublishedSet, Subfolder};
use crate::rotation::RotationTracker;
use std::sync::Arc;
use tracing::{debug, info};

/// Pending items fetched per probe; only the first one is ever used.
const PROBE_LIMIT: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    CheckSubfolders,
    NoSubfoldersFallback,
    ScanRotation,
    Exhausted,
    Found,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Persist,
    /// Select without moving the stored cursor.
    Preview,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Found {
        item: Item,
        /// `None` when the root folder itself was the pool.
        subfolder: Option<(usize, Subfolder)>,
    },
    Exhausted,
}

impl Selection {
    pub fn into_item(self) -> Option<Item> {
        match self {
            Selection::Found { item, .. } => Some(item),
            Selection::Exhausted => None,
        }
    }
}

pub struct NextItemSelector {
    lister: Arc<FolderLister>,
    tracker: Arc<RotationTracker>,
}

impl NextItemSelector {
    pub fn new(lister: Arc<FolderLister>, tracker: Arc<RotationTracker>) -> Self {
        Self { lister, tracker }
    }

    pub async fn select(
        &self,
        channel: &Channel,
        published: &PublishedSet,
        mode: CursorMode,
    ) -> Selection {
        let mut state = SelectionState::CheckSubfolders;
        debug!("{}: {:?}", channel.id, state);
        let subfolders = self.lister.list_subfolders(&channel.drive_folder_id).await;

        if subfolders.is_empty() {
            state = SelectionState::NoSubfoldersFallback;
            debug!("{}: {:?}", channel.id, state);
            let item = self
                .lister
                .list_items(&channel.drive_folder_id, published, Some(PROBE_LIMIT))
                .await
                .into_iter()
                .next();
            return match item {
                Some(item) => {
                    info!("{}: picked {} from root folder", channel.id, item.name);
                    Selection::Found {
                        item,
                        subfolder: None,
                    }
                }
                None => {
                    state = SelectionState::Exhausted;
                    info!("{}: {:?}, root folder has no pending videos", channel.id, state);
                    Selection::Exhausted
                }
            };
        }

        state = SelectionState::ScanRotation;
        let count = subfolders.len();
        let cursor = self.tracker.get_cursor(&channel.id).await;
        let start = cursor.current_index % count;
        debug!(
            "{}: {:?} over {} subfolders from index {}",
            channel.id, state, count, start
        );

        for offset in 0..count {
            let index = (start + offset) % count;
            let subfolder = &subfolders[index];
            let Some(item) = self
                .lister
                .list_items(&subfolder.id, published, Some(PROBE_LIMIT))
                .await
                .into_iter()
                .next()
            else {
                debug!("{}: subfolder {} has nothing pending", channel.id, subfolder.name);
                continue;
            };

            if index != cursor.current_index && mode == CursorMode::Persist {
                self.tracker
                    .set_cursor(&channel.id, index, &subfolder.id, &subfolder.name)
                    .await;
            }
            info!(
                "{}: {:?} {} in subfolder {} ({}/{})",
                channel.id,
                SelectionState::Found,
                item.name,
                subfolder.name,
                index + 1,
                count
            );
            return Selection::Found {
                item,
                subfolder: Some((index, subfolder.clone())),
            };
        }

        info!(
            "{}: {:?}, all {} subfolders drained",
            channel.id,
            SelectionState::Exhausted,
            count
        );
        Selection::Exhausted
    }
}
