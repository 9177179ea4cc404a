//! Group lifecycle and membership management.
//!
//! Reading a group needs membership; deleting it or changing who belongs
//! to it needs the creator.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use courier_store::{
    Group, GroupFilter, GroupMembership, MembershipFilter, NewGroup, Repository, StoreError,
};

use crate::access::AccessControl;
use crate::error::{CoreError, Result};
use crate::types::{storable_id, Conversation, Principal};

/// A group together with its member rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDetails {
    pub group: Group,
    pub members: Vec<GroupMembership>,
}

#[derive(Clone)]
pub struct Groups {
    repo: Arc<dyn Repository>,
    access: AccessControl,
}

impl Groups {
    pub fn new(repo: Arc<dyn Repository>, access: AccessControl) -> Self {
        Self { repo, access }
    }

    /// Create a group owned by `principal`, who also becomes its first member.
    pub fn create(&self, principal: Principal, name: &str, description: &str) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidInput("group name can not be empty".into()));
        }

        let group = self.repo.create_group(&NewGroup {
            name: name.to_string(),
            description: description.to_string(),
            creator_id: principal.id(),
        })?;

        info!(%principal, group_id = group.id, "group created");
        Ok(group)
    }

    /// Group data and members, visible to members only.
    pub fn get(&self, principal: Principal, group_id: u64) -> Result<GroupDetails> {
        self.access
            .require_participant(principal, Conversation::group(group_id))?;

        let group = self
            .repo
            .find_groups(&GroupFilter::by_id(group_id))?
            .pop()
            .ok_or_else(|| CoreError::NotFound(format!("group {group_id}")))?;
        let members = self
            .repo
            .find_memberships(&MembershipFilter::of_group(group_id))?;

        Ok(GroupDetails { group, members })
    }

    /// Creator only. Memberships, links and messages go with the group.
    pub fn delete(&self, principal: Principal, group_id: u64) -> Result<()> {
        self.access.require_creator(principal, group_id)?;

        if !self.repo.delete_group(group_id)? {
            return Err(CoreError::NotFound(format!("group {group_id}")));
        }
        info!(%principal, group_id, "group deleted");
        Ok(())
    }

    /// Creator only. Adding an existing member is a conflict, not a second row.
    pub fn add_member(
        &self,
        principal: Principal,
        group_id: u64,
        member_id: u64,
    ) -> Result<GroupMembership> {
        self.access.require_creator(principal, group_id)?;
        storable_id(member_id, "member")?;

        let existing = self
            .repo
            .find_memberships(&MembershipFilter::pair(group_id, member_id))?;
        if !existing.is_empty() {
            return Err(already_member());
        }

        let membership = match self.repo.create_membership(group_id, member_id) {
            Ok(m) => m,
            Err(StoreError::Duplicate) => return Err(already_member()),
            Err(e) => return Err(e.into()),
        };

        info!(%principal, group_id, member_id, "member added");
        Ok(membership)
    }

    /// Creator only. The creator's own membership can not be removed.
    pub fn remove_member(&self, principal: Principal, group_id: u64, member_id: u64) -> Result<()> {
        let group = self.access.require_creator(principal, group_id)?;
        if member_id == group.creator_id {
            return Err(CoreError::InvalidInput(
                "the group creator can not be removed".into(),
            ));
        }

        let removed = self
            .repo
            .delete_memberships(&MembershipFilter::pair(group_id, member_id))?;
        if removed == 0 {
            return Err(CoreError::NotFound(format!(
                "member {member_id} in group {group_id}"
            )));
        }

        info!(%principal, group_id, member_id, "member removed");
        Ok(())
    }
}

fn already_member() -> CoreError {
    CoreError::Conflict("user is already a member".into())
}

#[cfg(test)]
mod tests {
    use courier_store::{GroupMessageFilter, MessageFilter};

    use super::*;
    use crate::testing::messaging;

    #[test]
    fn out_of_range_member_leaves_group_readable() {
        let (m, _db) = messaging();
        let group = m.groups.create(Principal(9), "ops", "").unwrap();

        assert!(matches!(
            m.groups.add_member(Principal(9), group.id, u64::MAX),
            Err(CoreError::InvalidInput(_))
        ));
        let details = m.groups.get(Principal(9), group.id).unwrap();
        assert_eq!(details.members.len(), 1);
    }

    #[test]
    fn out_of_range_creator_is_a_client_error() {
        let (m, _db) = messaging();
        assert!(matches!(
            m.groups.create(Principal(u64::MAX), "ops", ""),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(m.directory.groups_of(Principal(9)).unwrap().is_empty());
    }

    #[test]
    fn create_requires_a_name() {
        let (m, _db) = messaging();
        assert!(matches!(
            m.groups.create(Principal(9), "   ", ""),
            Err(CoreError::InvalidInput(_))
        ));

        let group = m.groups.create(Principal(9), " crew ", "about").unwrap();
        assert_eq!(group.name, "crew");
        assert_eq!(group.creator_id, 9);
    }

    #[test]
    fn membership_management_is_creator_only() {
        let (m, _db) = messaging();
        let group = m.groups.create(Principal(9), "crew", "").unwrap();
        m.groups.add_member(Principal(9), group.id, 11).unwrap();

        assert!(m
            .groups
            .add_member(Principal(11), group.id, 12)
            .unwrap_err()
            .is_not_found());
        assert!(m
            .groups
            .remove_member(Principal(11), group.id, 9)
            .unwrap_err()
            .is_not_found());
        assert!(m.groups.delete(Principal(11), group.id).unwrap_err().is_not_found());

        m.groups.remove_member(Principal(9), group.id, 11).unwrap();
        assert!(matches!(
            m.groups.remove_member(Principal(9), group.id, 11),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn duplicate_membership_conflicts() {
        let (m, db) = messaging();
        let group = m.groups.create(Principal(9), "crew", "").unwrap();
        m.groups.add_member(Principal(9), group.id, 11).unwrap();

        assert!(matches!(
            m.groups.add_member(Principal(9), group.id, 11),
            Err(CoreError::Conflict(_))
        ));
        assert!(matches!(
            m.groups.add_member(Principal(9), group.id, 9),
            Err(CoreError::Conflict(_))
        ));
        assert_eq!(
            db.find_memberships(&MembershipFilter::of_group(group.id))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn creator_can_not_be_removed() {
        let (m, _db) = messaging();
        let group = m.groups.create(Principal(9), "crew", "").unwrap();
        assert!(matches!(
            m.groups.remove_member(Principal(9), group.id, 9),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn get_is_member_only() {
        let (m, _db) = messaging();
        let group = m.groups.create(Principal(9), "crew", "").unwrap();
        m.groups.add_member(Principal(9), group.id, 11).unwrap();

        let details = m.groups.get(Principal(11), group.id).unwrap();
        assert_eq!(details.group, group);
        let members: Vec<u64> = details.members.iter().map(|mm| mm.member_id).collect();
        assert_eq!(members, vec![9, 11]);

        assert!(m.groups.get(Principal(20), group.id).unwrap_err().is_not_found());
    }

    #[test]
    fn delete_fans_out_and_revokes_access() {
        let (m, db) = messaging();
        let group = m.groups.create(Principal(9), "crew", "").unwrap();
        m.groups.add_member(Principal(9), group.id, 11).unwrap();
        m.ledger
            .send(Principal(11), Conversation::group(group.id), "hi")
            .unwrap();

        m.groups.delete(Principal(9), group.id).unwrap();

        assert!(db.find_messages(&MessageFilter::default()).unwrap().is_empty());
        assert!(db
            .find_group_message_links(&GroupMessageFilter::default())
            .unwrap()
            .is_empty());
        assert!(m
            .ledger
            .send(Principal(11), Conversation::group(group.id), "still here?")
            .unwrap_err()
            .is_not_found());
        assert!(m.directory.groups_of(Principal(11)).unwrap().is_empty());
    }
}
