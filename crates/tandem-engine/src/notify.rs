//! Per-notification delivery fan-out.
//!
//! For every freshly created notification row, each channel is evaluated
//! independently against the recipient's preferences and pause state.
//! Suppression of one channel never blocks the others, and nothing here
//! touches a transport — only job descriptors leave this module.

use chrono::Utc;
use tracing::{debug, warn};

use tandem_core::{
    realtime, JobQueue, MembershipRepository, Notification, OutboundJob,
    PushSubscriptionRepository, Result,
};

use crate::store::Store;

/// Enqueue channel delivery jobs for a newly created notification.
///
/// Returns the number of jobs enqueued.
pub async fn fan_out(store: &Store, notification: &Notification) -> Result<usize> {
    let settings = store.memberships.settings(notification.member_id).await?;
    let now = Utc::now();
    let paused = settings.notifications_paused(now);
    let mut enqueued = 0;

    // Email: one schedule marker per recipient; the external scheduler
    // batches everything since the given timestamp.
    if settings.email_notifications_enabled && !paused {
        store
            .jobs
            .enqueue(OutboundJob::ScheduleEmail {
                member_id: notification.member_id,
                notification_created_at: notification.created_at,
            })
            .await?;
        enqueued += 1;
    }

    // Chat-integration message.
    if settings.chat_notifications_active() && !paused && !notification.chat_message_delivered() {
        store
            .jobs
            .enqueue(OutboundJob::DeliverChatMessage {
                notification_id: notification.id,
            })
            .await?;
        enqueued += 1;
    }

    // Web push: one job per active device.
    if !paused {
        match store
            .push_subscriptions
            .active_for_member(notification.member_id)
            .await
        {
            Ok(subscriptions) => {
                for subscription in subscriptions {
                    store
                        .jobs
                        .enqueue(OutboundJob::DeliverPush {
                            notification_id: notification.id,
                            push_subscription_id: subscription.id,
                        })
                        .await?;
                    enqueued += 1;
                }
            }
            Err(error) => {
                // Push lookup failure must not block the other channels.
                warn!(
                    notification_id = %notification.id,
                    %error,
                    "Failed to load push subscriptions; skipping push channel"
                );
            }
        }
    }

    // Realtime hint on the recipient's channel, always — paused members
    // still see their inbox refresh, the client just skips the banner.
    store
        .jobs
        .enqueue(OutboundJob::TriggerRealtimeEvent {
            channel: realtime::member_channel(notification.member_id),
            event: realtime::NEW_NOTIFICATION.to_string(),
            payload: serde_json::to_value(realtime::NewNotificationPayload {
                notification_id: notification.id,
                skip_push: paused,
            })?,
        })
        .await?;
    enqueued += 1;

    debug!(
        notification_id = %notification.id,
        member_id = %notification.member_id,
        job_count = enqueued,
        "Notification fan-out complete"
    );

    Ok(enqueued)
}
