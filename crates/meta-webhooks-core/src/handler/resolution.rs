//! Resolves registered handlers into the flat table used during dispatch.
//!
//! A coarser capability supersedes every finer one below it. The decision is
//! made once when [`crate::Webhooks`] is built so dispatch only follows the
//! resulting routes.

use super::{
    ChangesHandler, EntryHandler, HandlerKind, InstagramMentionHandler, InstagramMessageHandler,
    InstagramPostbackHandler, InstagramReferralHandler, InstagramStoryInsightsHandler,
    MessagingHandler,
};
use std::sync::Arc;
use tracing::{debug, warn};

#[cfg(test)]
#[path = "resolution_tests.rs"]
mod tests;

/// Handlers as registered by the caller, before resolution.
#[derive(Default, Clone)]
pub(crate) struct HandlerRegistry {
    pub entry: Option<Arc<dyn EntryHandler>>,
    pub changes: Option<Arc<dyn ChangesHandler>>,
    pub messaging: Option<Arc<dyn MessagingHandler>>,
    pub leaves: InstagramLeaves,
}

/// Instagram leaf handler slots.
#[derive(Default, Clone)]
pub(crate) struct InstagramLeaves {
    pub mention: Option<Arc<dyn InstagramMentionHandler>>,
    pub story_insights: Option<Arc<dyn InstagramStoryInsightsHandler>>,
    pub message: Option<Arc<dyn InstagramMessageHandler>>,
    pub postback: Option<Arc<dyn InstagramPostbackHandler>>,
    pub referral: Option<Arc<dyn InstagramReferralHandler>>,
}

impl InstagramLeaves {
    fn change_kinds(&self) -> Vec<HandlerKind> {
        let mut kinds = Vec::new();
        if self.mention.is_some() {
            kinds.push(HandlerKind::InstagramMention);
        }
        if self.story_insights.is_some() {
            kinds.push(HandlerKind::InstagramStoryInsights);
        }
        kinds
    }

    fn messaging_kinds(&self) -> Vec<HandlerKind> {
        let mut kinds = Vec::new();
        if self.message.is_some() {
            kinds.push(HandlerKind::InstagramMessage);
        }
        if self.postback.is_some() {
            kinds.push(HandlerKind::InstagramPostback);
        }
        if self.referral.is_some() {
            kinds.push(HandlerKind::InstagramReferral);
        }
        kinds
    }
}

/// How an entry is handled.
pub(crate) enum EntryRoute {
    Custom(Arc<dyn EntryHandler>),
    Fanout {
        changes: Arc<ChangesRoute>,
        messaging: Arc<MessagingRoute>,
    },
}

/// How a single change is handled.
pub(crate) enum ChangesRoute {
    Custom(Arc<dyn ChangesHandler>),
    ByValue {
        mention: Option<Arc<dyn InstagramMentionHandler>>,
        story_insights: Option<Arc<dyn InstagramStoryInsightsHandler>>,
    },
}

/// How a single messaging item is handled.
pub(crate) enum MessagingRoute {
    Custom(Arc<dyn MessagingHandler>),
    ByShape {
        message: Option<Arc<dyn InstagramMessageHandler>>,
        postback: Option<Arc<dyn InstagramPostbackHandler>>,
        referral: Option<Arc<dyn InstagramReferralHandler>>,
        ignore_echoes: bool,
    },
}

/// Effective routes consulted by the dispatcher.
pub(crate) struct HandlerTable {
    pub entry: EntryRoute,
}

impl HandlerRegistry {
    /// Collapse the registrations into a [`HandlerTable`].
    pub fn resolve(self, ignore_echoes: bool) -> HandlerTable {
        let leaves = self.leaves;
        let change_kinds = leaves.change_kinds();
        let messaging_kinds = leaves.messaging_kinds();

        if let Some(entry) = self.entry {
            let mut shadowed: Vec<String> = Vec::new();
            if self.changes.is_some() {
                shadowed.push("changes".to_string());
            }
            if self.messaging.is_some() {
                shadowed.push("messaging".to_string());
            }
            shadowed.extend(
                change_kinds
                    .iter()
                    .chain(&messaging_kinds)
                    .map(|kind| kind.to_string()),
            );
            if !shadowed.is_empty() {
                warn!(
                    shadowed = ?shadowed,
                    "Entry handler registered; finer handlers will not be called"
                );
            }
            debug!("Resolved entry route to custom entry handler");
            return HandlerTable {
                entry: EntryRoute::Custom(entry),
            };
        }

        let changes = match self.changes {
            Some(handler) => {
                if !change_kinds.is_empty() {
                    warn!(
                        shadowed = ?change_kinds,
                        "Changes handler registered; change leaf handlers will not be called"
                    );
                }
                ChangesRoute::Custom(handler)
            }
            None => ChangesRoute::ByValue {
                mention: leaves.mention,
                story_insights: leaves.story_insights,
            },
        };

        let messaging = match self.messaging {
            Some(handler) => {
                if !messaging_kinds.is_empty() {
                    warn!(
                        shadowed = ?messaging_kinds,
                        "Messaging handler registered; messaging leaf handlers will not be called"
                    );
                }
                MessagingRoute::Custom(handler)
            }
            None => MessagingRoute::ByShape {
                message: leaves.message,
                postback: leaves.postback,
                referral: leaves.referral,
                ignore_echoes,
            },
        };

        debug!(
            custom_changes = matches!(changes, ChangesRoute::Custom(_)),
            custom_messaging = matches!(messaging, MessagingRoute::Custom(_)),
            ignore_echoes,
            "Resolved handler routes"
        );

        HandlerTable {
            entry: EntryRoute::Fanout {
                changes: Arc::new(changes),
                messaging: Arc::new(messaging),
            },
        }
    }
}
