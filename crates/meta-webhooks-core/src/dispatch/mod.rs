//! Concurrent delivery of a decoded event to its handlers.
//!
//! Fan-out runs in three levels, each a [`group::TaskGroup`] bounded by the
//! number of items it spawns:
//!
//! - one task per entry of the event;
//! - per entry, one task for the changes branch and one for messaging;
//! - per branch, one task per change or messaging item.
//!
//! Every level derives a child [`DispatchContext`]. The first error at any
//! level cancels the rest of the dispatch and is returned once every task
//! has finished.

use crate::error::DispatchError;
use crate::event::{ChangeValue, Entry, Event, Messaging, Subject};
use crate::handler::resolution::{ChangesRoute, EntryRoute, HandlerTable, MessagingRoute};
use crate::handler::HandlerKind;
use std::sync::Arc;
use tracing::{debug, instrument};

mod context;
mod group;

pub use context::DispatchContext;
use group::TaskGroup;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

/// Walks an [`Event`] and calls the resolved handlers.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    table: Arc<HandlerTable>,
}

impl Dispatcher {
    pub fn new(table: HandlerTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    #[instrument(skip(self, ctx, event), fields(subject = %event.subject, entries = event.entries.len()))]
    pub async fn dispatch(
        &self,
        ctx: &DispatchContext,
        event: Arc<Event>,
    ) -> Result<(), DispatchError> {
        if event.entries.is_empty() {
            debug!("Event has no entries; nothing to dispatch");
            return Ok(());
        }

        let mut group = TaskGroup::with_limit(ctx, event.entries.len());
        for index in 0..event.entries.len() {
            let scope = EntryScope {
                table: Arc::clone(&self.table),
                event: Arc::clone(&event),
                index,
            };
            group.spawn(move |ctx| async move { scope.dispatch(&ctx).await });
        }
        group.wait().await
    }
}

/// One entry of a shared event, plus the routes to deliver it with.
#[derive(Clone)]
struct EntryScope {
    table: Arc<HandlerTable>,
    event: Arc<Event>,
    index: usize,
}

impl EntryScope {
    fn subject(&self) -> &Subject {
        &self.event.subject
    }

    fn entry(&self) -> &Entry {
        &self.event.entries[self.index]
    }

    async fn dispatch(&self, ctx: &DispatchContext) -> Result<(), DispatchError> {
        let entry = self.entry();
        debug!(
            entry_id = %entry.id,
            changes = entry.changes.len(),
            messaging = entry.messaging.len(),
            "Dispatching entry"
        );

        match &self.table.entry {
            EntryRoute::Custom(handler) => handler
                .entry(ctx, self.subject(), entry)
                .await
                .map_err(DispatchError::from_handler),
            EntryRoute::Fanout { changes, messaging } => {
                let mut group = TaskGroup::with_limit(ctx, 2);
                if !entry.changes.is_empty() {
                    let branch = ChangesBranch {
                        scope: self.clone(),
                        route: Arc::clone(changes),
                    };
                    group.spawn(move |ctx| async move { branch.dispatch(&ctx).await });
                }
                if !entry.messaging.is_empty() {
                    let branch = MessagingBranch {
                        scope: self.clone(),
                        route: Arc::clone(messaging),
                    };
                    group.spawn(move |ctx| async move { branch.dispatch(&ctx).await });
                }
                group.wait().await
            }
        }
    }

    /// The default routes only know Instagram leaf handlers.
    fn require_instagram(&self) -> Result<(), DispatchError> {
        if self.subject().is_instagram() {
            Ok(())
        } else {
            Err(DispatchError::SubjectNotSupported {
                subject: self.subject().to_string(),
            })
        }
    }
}

/// The changes of one entry and the route they are delivered through.
#[derive(Clone)]
struct ChangesBranch {
    scope: EntryScope,
    route: Arc<ChangesRoute>,
}

impl ChangesBranch {
    async fn dispatch(&self, ctx: &DispatchContext) -> Result<(), DispatchError> {
        let count = self.scope.entry().changes.len();
        let mut group = TaskGroup::with_limit(ctx, count);
        for position in 0..count {
            let branch = self.clone();
            group.spawn(move |ctx| async move { branch.dispatch_change(&ctx, position).await });
        }
        group.wait().await
    }

    async fn dispatch_change(
        &self,
        ctx: &DispatchContext,
        position: usize,
    ) -> Result<(), DispatchError> {
        let entry = self.scope.entry();
        let change = &entry.changes[position];

        match self.route.as_ref() {
            ChangesRoute::Custom(handler) => handler
                .change(ctx, self.scope.subject(), entry, change)
                .await
                .map_err(DispatchError::from_handler),
            ChangesRoute::ByValue {
                mention,
                story_insights,
            } => {
                self.scope.require_instagram()?;
                debug!(
                    entry_id = %entry.id,
                    field = %change.field,
                    media_id = %change.value.media_id(),
                    "Dispatching change"
                );
                match &change.value {
                    ChangeValue::Mention(value) => {
                        let handler = mention.as_ref().ok_or(DispatchError::HandlerNotDefined {
                            handler: HandlerKind::InstagramMention,
                        })?;
                        handler
                            .instagram_mention(ctx, entry, value)
                            .await
                            .map_err(DispatchError::from_handler)
                    }
                    ChangeValue::StoryInsights(value) => {
                        let handler =
                            story_insights
                                .as_ref()
                                .ok_or(DispatchError::HandlerNotDefined {
                                    handler: HandlerKind::InstagramStoryInsights,
                                })?;
                        handler
                            .instagram_story_insights(ctx, entry, value)
                            .await
                            .map_err(DispatchError::from_handler)
                    }
                }
            }
        }
    }
}

/// The messaging items of one entry and the route they are delivered through.
#[derive(Clone)]
struct MessagingBranch {
    scope: EntryScope,
    route: Arc<MessagingRoute>,
}

impl MessagingBranch {
    async fn dispatch(&self, ctx: &DispatchContext) -> Result<(), DispatchError> {
        let count = self.scope.entry().messaging.len();
        let mut group = TaskGroup::with_limit(ctx, count);
        for position in 0..count {
            let branch = self.clone();
            group.spawn(move |ctx| async move { branch.dispatch_item(&ctx, position).await });
        }
        group.wait().await
    }

    async fn dispatch_item(
        &self,
        ctx: &DispatchContext,
        position: usize,
    ) -> Result<(), DispatchError> {
        let entry = self.scope.entry();
        let messaging = &entry.messaging[position];

        match self.route.as_ref() {
            MessagingRoute::Custom(handler) => handler
                .messaging(ctx, self.scope.subject(), entry, messaging)
                .await
                .map_err(DispatchError::from_handler),
            MessagingRoute::ByShape {
                message,
                postback,
                referral,
                ignore_echoes,
            } => {
                self.scope.require_instagram()?;
                debug!(
                    entry_id = %entry.id,
                    kind = messaging.kind(),
                    sender_id = %messaging.header().sender.id,
                    "Dispatching messaging item"
                );
                match messaging {
                    Messaging::Message(event) => {
                        if *ignore_echoes && event.message.is_echo {
                            debug!(message_id = %event.message.id, "Ignoring echo message");
                            return Ok(());
                        }
                        let handler = message.as_ref().ok_or(DispatchError::HandlerNotDefined {
                            handler: HandlerKind::InstagramMessage,
                        })?;
                        handler
                            .instagram_message(ctx, entry, event)
                            .await
                            .map_err(DispatchError::from_handler)
                    }
                    Messaging::Postback(event) => {
                        let handler = postback.as_ref().ok_or(DispatchError::HandlerNotDefined {
                            handler: HandlerKind::InstagramPostback,
                        })?;
                        handler
                            .instagram_postback(ctx, entry, event)
                            .await
                            .map_err(DispatchError::from_handler)
                    }
                    Messaging::Referral(event) => {
                        let handler = referral.as_ref().ok_or(DispatchError::HandlerNotDefined {
                            handler: HandlerKind::InstagramReferral,
                        })?;
                        handler
                            .instagram_referral(ctx, entry, event)
                            .await
                            .map_err(DispatchError::from_handler)
                    }
                }
            }
        }
    }
}
