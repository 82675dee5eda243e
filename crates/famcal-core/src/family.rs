//! Family and member types shared by the calendar, tasks and assistant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Parent,
    Child,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberRole::Parent => "parent",
            MemberRole::Child => "child",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parent" => Some(MemberRole::Parent),
            "child" => Some(MemberRole::Child),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub id: String,
    pub name: String,
    pub role: MemberRole,
    /// CSS colour used for this member's events
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mobile: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_you: Option<bool>,
}

/// Colour used when an event references an unknown member.
pub const FALLBACK_MEMBER_COLOR: &str = "#9CA3AF";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<FamilyMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
}

impl Family {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            members: Vec::new(),
            invite_code: None,
        }
    }

    pub fn member(&self, id: &str) -> Option<&FamilyMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Colour for a member id, falling back to neutral grey for unknown ids.
    pub fn member_color(&self, id: &str) -> &str {
        self.member(id)
            .map(|m| m.color.as_str())
            .unwrap_or(FALLBACK_MEMBER_COLOR)
    }

    /// The member flagged as the current user, if any.
    pub fn current_member(&self) -> Option<&FamilyMember> {
        self.members.iter().find(|m| m.is_you == Some(true))
    }

    pub fn parents(&self) -> impl Iterator<Item = &FamilyMember> {
        self.members.iter().filter(|m| m.role == MemberRole::Parent)
    }

    /// Insert or replace a member by id.
    pub fn upsert_member(&mut self, member: FamilyMember) {
        match self.members.iter_mut().find(|m| m.id == member.id) {
            Some(existing) => *existing = member,
            None => self.members.push(member),
        }
    }

    pub fn remove_member(&mut self, id: &str) -> Option<FamilyMember> {
        let index = self.members.iter().position(|m| m.id == id)?;
        Some(self.members.remove(index))
    }
}
