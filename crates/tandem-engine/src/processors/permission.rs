//! Permission event processors.

use async_trait::async_trait;

use tandem_core::{
    AccessPolicy, Event, NotificationReason, PermissionRepository, Result, SubjectKind,
};

use crate::dispatcher::EventProcessor;
use crate::effects::{Effect, Effects};
use crate::store::Store;

/// Handles `(permission, created)`.
///
/// Only note grants notify — sharing a note puts it in the grantee's inbox
/// and subscribes them. Grants on other subject kinds are recorded without
/// fan-out.
pub struct PermissionCreatedProcessor;

#[async_trait]
impl EventProcessor for PermissionCreatedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(permission) = store.permissions.get(event.subject.id).await? else {
            return Ok(Effects::new());
        };

        let mut fx = Effects::new();
        if permission.subject.kind != SubjectKind::Note || event.skip_notifications {
            return Ok(fx);
        }

        fx.subscribe(permission.member_id, permission.subject);
        fx.notify(
            permission.member_id,
            NotificationReason::PermissionGranted,
            permission.subject,
            None,
        );

        Ok(fx)
    }
}

/// Handles `(permission, destroyed)`.
///
/// Revocation discards the grantee's outstanding notifications for the
/// subject and removes their subscription. Follow-ups and favorites are
/// destroyed only when no other permission or project membership still
/// grants access — the access check runs against *current* state, after
/// the revoked row was discarded.
pub struct PermissionDestroyedProcessor;

#[async_trait]
impl EventProcessor for PermissionDestroyedProcessor {
    async fn process(&self, event: &Event, store: &Store) -> Result<Effects> {
        let Some(permission) = store.permissions.get(event.subject.id).await? else {
            return Ok(Effects::new());
        };

        let mut fx = Effects::new();
        let member = permission.member_id;
        let subject = permission.subject;

        fx.push(Effect::DiscardForMemberTarget {
            member_id: member,
            target: subject,
        });
        fx.unsubscribe(member, subject);

        if !store.access.can_view(member, subject).await? {
            fx.push(Effect::DestroyFollowUpsForMember {
                member_id: member,
                subject,
            });
            fx.push(Effect::DestroyFavoritesForMember {
                member_id: member,
                subject,
            });
        }

        Ok(fx)
    }
}
